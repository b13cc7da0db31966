//! Download sessions: per-client byte-range tracking over one blob.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::interval::{Interval, IntervalSet};

/// Ranges one client has received of one blob.
///
/// Ranges may arrive in any order and may overlap; completion means the
/// recorded ranges have coalesced into exactly `[0, total_length]`.
#[derive(Debug)]
pub struct ClientProgress {
    received: IntervalSet,
    total_length: u64,
}

impl ClientProgress {
    fn new(total_length: u64) -> Self {
        Self {
            received: IntervalSet::new(),
            total_length,
        }
    }

    /// Record receipt of `length` bytes starting at `offset`, returning
    /// whether this client now holds the whole blob.
    pub fn record_chunk(&mut self, offset: u64, length: u64) -> Result<bool> {
        self.received.add(Interval::new(offset, offset + length)?);
        Ok(self.is_complete())
    }

    /// Complete only once the set is a single interval spanning the blob.
    ///
    /// Matching byte totals split across disjoint intervals do not count.
    pub fn is_complete(&self) -> bool {
        match self.received.as_slice() {
            [only] => only.begin() == 0 && only.end() == self.total_length,
            _ => false,
        }
    }
}

/// Per-blob download state: the blob's length, its deadline, and one
/// [`ClientProgress`] per client identity.
#[derive(Debug)]
pub struct DownloadSession {
    total_length: u64,
    expires_at: DateTime<Utc>,
    clients: HashMap<String, ClientProgress>,
}

impl DownloadSession {
    fn new(total_length: u64, expires_at: DateTime<Utc>) -> Self {
        Self {
            total_length,
            expires_at,
            clients: HashMap::new(),
        }
    }

    /// Progress tracker for `client`, created lazily on first access.
    pub fn client_mut(&mut self, client: &str) -> &mut ClientProgress {
        self.clients
            .entry(client.to_owned())
            .or_insert_with(|| ClientProgress::new(self.total_length))
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Registry of per-blob download sessions, keyed by blob id.
///
/// Sessions and per-client trackers are created lazily when a chunk is
/// acknowledged; everything for a blob is dropped when the blob is removed
/// from the store or the deadline passes.
#[derive(Debug, Default)]
pub struct DownloadRegistry {
    sessions: Mutex<HashMap<Uuid, DownloadSession>>,
}

impl DownloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `client` received `length` bytes of blob `id` starting at
    /// `offset`, returning whether that client now holds the whole blob.
    ///
    /// Creates the blob session (deadline `expires_at`, which must be in the
    /// future) and the per-client tracker if absent.
    pub fn record_chunk(
        &self,
        id: Uuid,
        total_length: u64,
        expires_at: DateTime<Utc>,
        client: &str,
        offset: u64,
        length: u64,
    ) -> Result<bool> {
        let now = Utc::now();
        if expires_at <= now {
            return Err(SessionError::Expired(expires_at));
        }
        let mut sessions = self.sessions.lock();
        if sessions.get(&id).is_some_and(|s| s.is_expired_at(now)) {
            debug!(id = %id, "dropping expired download session");
            sessions.remove(&id);
        }
        let session = sessions
            .entry(id)
            .or_insert_with(|| DownloadSession::new(total_length, expires_at));
        let complete = session.client_mut(client).record_chunk(offset, length)?;
        if complete {
            info!(id = %id, client, "download complete");
        }
        Ok(complete)
    }

    /// Drop all per-client state for blob `id`, e.g. after the blob was
    /// deleted from the store. Returns whether a session was present.
    pub fn remove(&self, id: &Uuid) -> bool {
        self.sessions.lock().remove(id).is_some()
    }

    /// Whether a live session exists for `id`.
    pub fn contains(&self, id: &Uuid) -> bool {
        let now = Utc::now();
        let mut sessions = self.sessions.lock();
        match sessions.get(id) {
            Some(session) if session.is_expired_at(now) => {
                sessions.remove(id);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Drop every session past its deadline, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        before - sessions.len()
    }
}
