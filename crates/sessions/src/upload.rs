//! Upload sessions: strictly ordered chunk acceptance per blob.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, SessionError};

/// Progress of one in-flight upload.
///
/// Chunks must arrive in ascending, gapless index order and may not be
/// empty. The session is complete once the received byte total equals the
/// declared total *and* the declared chunk count has been consumed.
#[derive(Debug)]
pub struct UploadSession {
    total_length: u64,
    chunk_count: u32,
    next_chunk_index: u32,
    received_length: u64,
    complete: bool,
    expires_at: DateTime<Utc>,
}

impl UploadSession {
    fn new(total_length: u64, chunk_count: u32, expires_at: DateTime<Utc>) -> Self {
        Self {
            total_length,
            chunk_count,
            next_chunk_index: 0,
            received_length: 0,
            complete: false,
            expires_at,
        }
    }

    /// Validate and account one chunk, returning whether the upload is now
    /// complete.
    ///
    /// A rejected chunk leaves the session untouched.
    pub fn record_chunk(&mut self, chunk_len: u64, chunk_index: u32) -> Result<bool> {
        if self.complete {
            return Err(SessionError::InvalidChunk("upload is already complete"));
        }
        if chunk_index != self.next_chunk_index {
            return Err(SessionError::InvalidChunk(
                "chunks must be sent in ascending order without gaps",
            ));
        }
        if chunk_len == 0 {
            return Err(SessionError::InvalidChunk("chunk must not be empty"));
        }
        let received = self.received_length + chunk_len;
        if received > self.total_length {
            return Err(SessionError::InvalidChunk(
                "received more data than the declared total length",
            ));
        }
        if received == self.total_length {
            // Byte total alone is not enough: the declared chunk count must
            // line up as well.
            if chunk_index + 1 != self.chunk_count {
                return Err(SessionError::InvalidChunk(
                    "byte total reached with the wrong number of chunks",
                ));
            }
            self.complete = true;
        }
        self.received_length = received;
        self.next_chunk_index += 1;
        Ok(self.complete)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn received_length(&self) -> u64 {
        self.received_length
    }

    pub fn next_chunk_index(&self) -> u32 {
        self.next_chunk_index
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Registry of in-flight uploads, keyed by blob id.
///
/// All accesses go through one mutex, so create-if-absent is atomic against
/// concurrent identical requests. The deadline is fixed at creation and
/// never extended by activity; expired entries are dropped on access and by
/// [`UploadRegistry::purge_expired`].
#[derive(Debug, Default)]
pub struct UploadRegistry {
    sessions: Mutex<HashMap<Uuid, UploadSession>>,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new upload for `id`.
    ///
    /// Fails with [`SessionError::DuplicateUpload`] while a live session for
    /// the same blob exists; a session past its deadline does not count.
    pub fn begin(
        &self,
        id: Uuid,
        total_length: u64,
        chunk_count: u32,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock();
        if let Some(existing) = sessions.get(&id) {
            if !existing.is_expired_at(now) {
                return Err(SessionError::DuplicateUpload(id));
            }
        }
        debug!(id = %id, total_length, chunk_count, "starting upload session");
        sessions.insert(id, UploadSession::new(total_length, chunk_count, expires_at));
        Ok(())
    }

    /// Account one uploaded chunk against the session for `id`.
    ///
    /// Returns whether the upload is now complete; a completed session is
    /// removed from the registry.
    pub fn record_chunk(&self, id: &Uuid, chunk_len: u64, chunk_index: u32) -> Result<bool> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(id)
            .ok_or(SessionError::UnknownUpload(*id))?;
        if session.is_expired_at(now) {
            sessions.remove(id);
            debug!(id = %id, "dropping expired upload session");
            return Err(SessionError::UnknownUpload(*id));
        }
        let complete = session.record_chunk(chunk_len, chunk_index)?;
        if complete {
            info!(id = %id, "upload complete");
            sessions.remove(id);
        }
        Ok(complete)
    }

    /// Deadline of the live session for `id`, if any.
    pub fn expiration(&self, id: &Uuid) -> Option<DateTime<Utc>> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock();
        match sessions.get(id) {
            Some(session) if session.is_expired_at(now) => {
                sessions.remove(id);
                None
            }
            Some(session) => Some(session.expires_at()),
            None => None,
        }
    }

    /// Remove the session for `id`, e.g. on client disconnect.
    ///
    /// Returns whether a session was present.
    pub fn cancel(&self, id: &Uuid) -> bool {
        self.sessions.lock().remove(id).is_some()
    }

    /// Whether a live session exists for `id`.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.expiration(id).is_some()
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

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn in_one_minute() -> DateTime<Utc> {
        Utc::now() + Duration::seconds(60)
    }

    #[test]
    fn accepts_chunks_in_order_and_completes() {
        let registry = UploadRegistry::new();
        let id = Uuid::new_v4();
        registry.begin(id, 30, 3, in_one_minute()).unwrap();

        assert!(!registry.record_chunk(&id, 10, 0).unwrap());
        assert!(!registry.record_chunk(&id, 10, 1).unwrap());
        assert!(registry.record_chunk(&id, 10, 2).unwrap());
        // Completed sessions are destroyed.
        assert!(!registry.contains(&id));
    }

    #[test]
    fn rejects_out_of_order_first_chunk() {
        let registry = UploadRegistry::new();
        let id = Uuid::new_v4();
        registry.begin(id, 20, 2, in_one_minute()).unwrap();

        assert!(matches!(
            registry.record_chunk(&id, 10, 1),
            Err(SessionError::InvalidChunk(_))
        ));
        // Session is untouched and still accepts chunk 0.
        assert!(!registry.record_chunk(&id, 10, 0).unwrap());
    }

    #[test]
    fn rejects_replayed_chunk() {
        let registry = UploadRegistry::new();
        let id = Uuid::new_v4();
        registry.begin(id, 20, 2, in_one_minute()).unwrap();

        registry.record_chunk(&id, 10, 0).unwrap();
        assert!(matches!(
            registry.record_chunk(&id, 10, 0),
            Err(SessionError::InvalidChunk(_))
        ));
    }

    #[test]
    fn rejects_empty_chunk() {
        let registry = UploadRegistry::new();
        let id = Uuid::new_v4();
        registry.begin(id, 20, 2, in_one_minute()).unwrap();

        assert!(matches!(
            registry.record_chunk(&id, 0, 0),
            Err(SessionError::InvalidChunk(_))
        ));
    }

    #[test]
    fn rejects_overflow_past_declared_total() {
        let registry = UploadRegistry::new();
        let id = Uuid::new_v4();
        registry.begin(id, 15, 2, in_one_minute()).unwrap();

        registry.record_chunk(&id, 10, 0).unwrap();
        assert!(matches!(
            registry.record_chunk(&id, 10, 1),
            Err(SessionError::InvalidChunk(_))
        ));
    }

    #[test]
    fn byte_total_with_wrong_chunk_count_never_completes() {
        let registry = UploadRegistry::new();
        let id = Uuid::new_v4();
        // Declared as 3 chunks but the bytes arrive in 2.
        registry.begin(id, 20, 3, in_one_minute()).unwrap();

        registry.record_chunk(&id, 10, 0).unwrap();
        assert!(matches!(
            registry.record_chunk(&id, 10, 1),
            Err(SessionError::InvalidChunk(_))
        ));
        // Still live, still incomplete.
        assert!(registry.contains(&id));
    }

    #[test]
    fn only_one_upload_per_blob() {
        let registry = UploadRegistry::new();
        let id = Uuid::new_v4();
        registry.begin(id, 10, 1, in_one_minute()).unwrap();
        assert!(matches!(
            registry.begin(id, 10, 1, in_one_minute()),
            Err(SessionError::DuplicateUpload(other)) if other == id
        ));
    }

    #[test]
    fn expired_session_is_gone_and_replaceable() {
        let registry = UploadRegistry::new();
        let id = Uuid::new_v4();
        let past = Utc::now() - Duration::seconds(1);
        registry.begin(id, 10, 1, past).unwrap();

        assert!(matches!(
            registry.record_chunk(&id, 10, 0),
            Err(SessionError::UnknownUpload(_))
        ));
        // The slot is free again.
        registry.begin(id, 10, 1, in_one_minute()).unwrap();
    }

    #[test]
    fn cancel_removes_the_session() {
        let registry = UploadRegistry::new();
        let id = Uuid::new_v4();
        registry.begin(id, 10, 1, in_one_minute()).unwrap();
        assert!(registry.cancel(&id));
        assert!(!registry.cancel(&id));
        assert!(matches!(
            registry.record_chunk(&id, 10, 0),
            Err(SessionError::UnknownUpload(_))
        ));
    }

    #[test]
    fn purge_drops_only_expired_sessions() {
        let registry = UploadRegistry::new();
        let live = Uuid::new_v4();
        let dead = Uuid::new_v4();
        registry.begin(live, 10, 1, in_one_minute()).unwrap();
        registry
            .begin(dead, 10, 1, Utc::now() - Duration::seconds(1))
            .unwrap();

        assert_eq!(registry.purge_expired(), 1);
        assert!(registry.contains(&live));
        assert!(!registry.contains(&dead));
    }
}
