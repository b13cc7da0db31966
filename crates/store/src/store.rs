//! The transient blob store: two engine keyspaces behind one handle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use heed::types::Bytes as RawBytes;
use heed::{Database, Env, EnvFlags, EnvOpenOptions, RoTxn};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::metadata::{checksum, BlobMetadata, BlobRecord, MAX_SERIALIZED_LEN};
use crate::transaction::Transaction;

const KEYSPACE_COUNT: u32 = 2;

struct OpenState {
    env: Env,
    data_db: Database<RawBytes, RawBytes>,
    meta_db: Database<RawBytes, RawBytes>,
    dir: PathBuf,
}

struct StoreInner {
    config: StoreConfig,
    state: RwLock<Option<OpenState>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

enum Lookup {
    Absent,
    Stray,
    Present(BlobMetadata, Bytes),
}

/// A store of expiring blobs keyed by UUID.
///
/// Payload and metadata live in two keyspaces of one embedded
/// transactional engine and are written together in a single read-write
/// transaction, so a blob is either fully present or fully absent.
/// Uploading to an existing id appends to its payload.
///
/// The handle is cheap to clone and safe to share across threads. A blob
/// past its expiration date is invisible to reads even before the
/// background sweep physically removes it.
#[derive(Clone)]
pub struct BlobStore {
    inner: Arc<StoreInner>,
}

impl BlobStore {
    /// Create a closed store handle with a validated configuration.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                state: RwLock::new(None),
                sweeper: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn is_open(&self) -> bool {
        self.inner.state.read().is_some()
    }

    /// Open the engine environment, creating the store directory and both
    /// keyspaces if needed, and start the background expiration sweep.
    pub fn open_or_create(&self) -> Result<()> {
        let mut state = self.inner.state.write();
        if state.is_some() {
            return Err(StoreError::AlreadyOpen);
        }
        let dir = self.inner.config.store_dir();
        if let Err(err) = std::fs::create_dir_all(&dir) {
            error!(path = %dir.display(), error = %err, "unable to create store directory");
            return Err(err.into());
        }
        let mut options = EnvOpenOptions::new();
        options
            .map_size(self.inner.config.map_size)
            .max_dbs(KEYSPACE_COUNT)
            .max_readers(self.inner.config.max_readers);
        // Read transactions move across runtime worker threads.
        let env = unsafe {
            options.flags(EnvFlags::NO_TLS);
            options.open(&dir)?
        };
        let (data_db, meta_db) = {
            let mut wtxn = env.write_txn()?;
            let data_db = env.create_database::<RawBytes, RawBytes>(
                &mut wtxn,
                Some(&self.inner.config.data_keyspace),
            )?;
            let meta_db = env.create_database::<RawBytes, RawBytes>(
                &mut wtxn,
                Some(&self.inner.config.meta_keyspace),
            )?;
            wtxn.commit()?;
            (data_db, meta_db)
        };
        info!(path = %dir.display(), map_size = self.inner.config.map_size, "opened blob store");
        *state = Some(OpenState {
            env,
            data_db,
            meta_db,
            dir,
        });
        drop(state);
        self.spawn_sweeper();
        Ok(())
    }

    /// Stop the background sweep and release the engine environment.
    ///
    /// Idempotent; closing a closed store is a no-op.
    pub fn close(&self) {
        if let Some(handle) = self.inner.sweeper.lock().take() {
            handle.abort();
        }
        let mut state = self.inner.state.write();
        if let Some(open) = state.take() {
            info!(path = %open.dir.display(), "closed blob store");
        }
    }

    /// Store `data` under `id`, appending if the blob already exists.
    ///
    /// Reading the current state and writing both the new payload and its
    /// refreshed metadata happen in one read-write transaction. An append
    /// keeps the original creation date; the modification date and the
    /// expiration date are replaced, and the checksum covers the combined
    /// payload.
    pub fn upload(&self, id: Uuid, expires_at: chrono::DateTime<Utc>, data: &[u8]) -> Result<()> {
        self.with_state(|state| {
            let key = id.as_bytes().as_slice();
            let mut txn = Transaction::read_write(&state.env)?;
            let existing = {
                let rtxn = txn.read()?;
                state
                    .meta_db
                    .get(rtxn, key)?
                    .map(BlobMetadata::from_bytes)
                    .transpose()?
            };
            let now = Utc::now();
            let (payload, metadata) = match existing {
                None => {
                    let metadata = BlobMetadata::builder()
                        .id(id)
                        .data_length(data.len() as u64)
                        .checksum(checksum(data))
                        .created_at(now)
                        .modified_at(now)
                        .expires_at(expires_at)
                        .build()?;
                    (data.to_vec(), metadata)
                }
                Some(previous) => {
                    let mut combined = {
                        let rtxn = txn.read()?;
                        state
                            .data_db
                            .get(rtxn, key)?
                            .map(<[u8]>::to_vec)
                            .unwrap_or_default()
                    };
                    combined.extend_from_slice(data);
                    let metadata = previous
                        .to_builder()
                        .data_length(combined.len() as u64)
                        .checksum(checksum(&combined))
                        .modified_at(now)
                        .expires_at(expires_at)
                        .build()?;
                    debug!(id = %id, appended = data.len(), total = combined.len(), "appending to blob");
                    (combined, metadata)
                }
            };
            let encoded = metadata.to_bytes()?;
            let wtxn = txn.write()?;
            state.data_db.put(wtxn, key, payload.as_slice())?;
            state.meta_db.put(wtxn, key, encoded.as_slice())?;
            txn.close()?;
            info!(id = %id, len = payload.len(), "uploaded blob");
            Ok(())
        })
    }

    /// Payload of blob `id`, or `None` if it is absent or expired.
    pub fn download(&self, id: Uuid) -> Result<Option<Bytes>> {
        self.with_state(|state| {
            let key = id.as_bytes().as_slice();
            let mut txn = Transaction::read_only(&state.env)?;
            let payload = {
                let rtxn = txn.read()?;
                match (state.meta_db.get(rtxn, key)?, state.data_db.get(rtxn, key)?) {
                    (Some(raw_meta), Some(raw_data)) => {
                        let metadata = BlobMetadata::from_bytes(raw_meta)?;
                        if metadata.is_expired_at(Utc::now()) {
                            debug!(id = %id, "blob is past its expiration date");
                            None
                        } else {
                            Some(Bytes::copy_from_slice(raw_data))
                        }
                    }
                    _ => None,
                }
            };
            txn.close()?;
            if payload.is_some() {
                info!(id = %id, "downloaded blob");
            }
            Ok(payload)
        })
    }

    /// Metadata of blob `id`, or `None` if it is absent or expired.
    pub fn get_metadata(&self, id: Uuid) -> Result<Option<BlobMetadata>> {
        self.with_state(|state| {
            let key = id.as_bytes().as_slice();
            let mut txn = Transaction::read_only(&state.env)?;
            let metadata = {
                let rtxn = txn.read()?;
                match (state.meta_db.get(rtxn, key)?, state.data_db.get(rtxn, key)?) {
                    (Some(raw_meta), Some(_)) => {
                        let metadata = BlobMetadata::from_bytes(raw_meta)?;
                        if metadata.is_expired_at(Utc::now()) {
                            None
                        } else {
                            Some(metadata)
                        }
                    }
                    _ => None,
                }
            };
            txn.close()?;
            Ok(metadata)
        })
    }

    /// Payload and metadata of blob `id` together, or `None` if absent or
    /// expired.
    ///
    /// A half-present blob, where only one of the two entries survived, is
    /// treated as absent and the stray entry is removed.
    pub fn get_record(&self, id: Uuid) -> Result<Option<BlobRecord>> {
        let lookup = self.with_state(|state| {
            let key = id.as_bytes().as_slice();
            let mut txn = Transaction::read_only(&state.env)?;
            let lookup = {
                let rtxn = txn.read()?;
                match (state.meta_db.get(rtxn, key)?, state.data_db.get(rtxn, key)?) {
                    (None, None) => Lookup::Absent,
                    (Some(_), None) | (None, Some(_)) => Lookup::Stray,
                    (Some(raw_meta), Some(raw_data)) => Lookup::Present(
                        BlobMetadata::from_bytes(raw_meta)?,
                        Bytes::copy_from_slice(raw_data),
                    ),
                }
            };
            txn.close()?;
            Ok(lookup)
        })?;
        match lookup {
            Lookup::Absent => Ok(None),
            Lookup::Stray => {
                warn!(id = %id, "blob is half-present; removing the stray entry");
                self.delete(id)?;
                Ok(None)
            }
            Lookup::Present(metadata, data) => {
                if metadata.is_expired_at(Utc::now()) {
                    return Ok(None);
                }
                Ok(Some(BlobRecord::new(metadata, data)?))
            }
        }
    }

    /// Remove blob `id`, payload and metadata alike. Removing an absent
    /// blob is a no-op.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        self.with_state(|state| {
            let key = id.as_bytes().as_slice();
            let mut txn = Transaction::read_write(&state.env)?;
            let wtxn = txn.write()?;
            let had_data = state.data_db.delete(wtxn, key)?;
            let had_meta = state.meta_db.delete(wtxn, key)?;
            txn.close()?;
            if had_data || had_meta {
                info!(id = %id, "deleted blob");
            }
            Ok(())
        })
    }

    /// Remove every blob in one transaction.
    pub fn delete_all(&self) -> Result<()> {
        self.with_state(|state| {
            let mut txn = Transaction::read_write(&state.env)?;
            let wtxn = txn.write()?;
            state.data_db.clear(wtxn)?;
            state.meta_db.clear(wtxn)?;
            txn.close()?;
            info!("deleted every blob");
            Ok(())
        })
    }

    /// Whether blob `id` should be treated as gone: expired, half-present
    /// or fully absent.
    ///
    /// Both entries are read under one snapshot.
    pub fn is_expired(&self, id: Uuid) -> Result<bool> {
        self.with_state(|state| {
            let mut txn = Transaction::read_only(&state.env)?;
            let expired = Self::is_expired_in(state, txn.read()?, id)?;
            txn.close()?;
            Ok(expired)
        })
    }

    fn is_expired_in(state: &OpenState, rtxn: &RoTxn<'_>, id: Uuid) -> Result<bool> {
        let key = id.as_bytes().as_slice();
        match (state.meta_db.get(rtxn, key)?, state.data_db.get(rtxn, key)?) {
            (Some(raw_meta), Some(_)) => {
                Ok(BlobMetadata::from_bytes(raw_meta)?.is_expired_at(Utc::now()))
            }
            _ => Ok(true),
        }
    }

    /// Remove every expired or half-present blob, returning how many were
    /// removed.
    ///
    /// Candidates are collected under one read snapshot, then removed with
    /// per-blob write transactions; a crash in between only leaves work for
    /// the next sweep.
    pub fn remove_expired(&self) -> Result<usize> {
        let expired = self.with_state(|state| {
            let mut txn = Transaction::read_only(&state.env)?;
            let mut expired = Vec::new();
            {
                let rtxn = txn.read()?;
                let now = Utc::now();
                for entry in state.data_db.iter(rtxn)? {
                    let (key, _) = entry?;
                    let Ok(id) = Uuid::from_slice(key) else {
                        warn!("skipping entry with a malformed key during sweep");
                        continue;
                    };
                    let dead = match state.meta_db.get(rtxn, key)? {
                        Some(raw_meta) => match BlobMetadata::from_bytes(raw_meta) {
                            Ok(metadata) => metadata.is_expired_at(now),
                            Err(err) => {
                                warn!(id = %id, error = %err, "malformed metadata during sweep");
                                true
                            }
                        },
                        None => true,
                    };
                    if dead {
                        expired.push(id);
                    }
                }
            }
            txn.close()?;
            Ok(expired)
        })?;
        if expired.is_empty() {
            return Ok(0);
        }
        for id in &expired {
            info!(id = %id, "removing expired blob");
            self.delete(*id)?;
        }
        Ok(expired.len())
    }

    /// Bytes still available before the memory map is full, after rounding
    /// each keyspace up to whole pages.
    pub fn available_bytes(&self) -> Result<u64> {
        self.with_state(|state| {
            let mut txn = Transaction::read_only(&state.env)?;
            let (available, _) = Self::space_in(state, txn.read()?)?;
            txn.close()?;
            Ok(available)
        })
    }

    /// Whether a payload of `len` bytes fits, reserving one metadata
    /// document on top and rounding up to whole pages.
    pub fn has_enough_space_for(&self, len: u64) -> Result<bool> {
        self.with_state(|state| {
            let mut txn = Transaction::read_only(&state.env)?;
            let (available, page_size) = Self::space_in(state, txn.read()?)?;
            txn.close()?;
            let needed = (len + MAX_SERIALIZED_LEN as u64).div_ceil(page_size) * page_size;
            Ok(available > needed)
        })
    }

    /// Bytes of pages held by the payload keyspace.
    pub fn data_used_bytes(&self) -> Result<u64> {
        self.used_bytes_of(|state| &state.data_db)
    }

    /// Bytes of pages held by the metadata keyspace.
    pub fn meta_used_bytes(&self) -> Result<u64> {
        self.used_bytes_of(|state| &state.meta_db)
    }

    fn used_bytes_of(
        &self,
        db: impl FnOnce(&OpenState) -> &Database<RawBytes, RawBytes>,
    ) -> Result<u64> {
        self.with_state(|state| {
            let mut txn = Transaction::read_only(&state.env)?;
            let stat = db(state).stat(txn.read()?)?;
            txn.close()?;
            Ok(page_bytes(&stat))
        })
    }

    fn space_in(state: &OpenState, rtxn: &RoTxn<'_>) -> Result<(u64, u64)> {
        let data_stat = state.data_db.stat(rtxn)?;
        let meta_stat = state.meta_db.stat(rtxn)?;
        let page_size = u64::from(data_stat.page_size);
        let map_size = state.env.info().map_size as u64;
        let data_pages = page_bytes(&data_stat).div_ceil(page_size);
        let meta_pages = page_bytes(&meta_stat).div_ceil(page_size);
        let available = map_size.saturating_sub(page_size * (data_pages + meta_pages));
        Ok((available, page_size))
    }

    fn with_state<T>(&self, op: impl FnOnce(&OpenState) -> Result<T>) -> Result<T> {
        let guard = self.inner.state.read();
        match guard.as_ref() {
            Some(state) => op(state),
            None => Err(StoreError::NotOpen),
        }
    }

    fn spawn_sweeper(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime available; periodic expiration sweep disabled");
            return;
        };
        let period = Duration::from_secs(self.inner.config.sweep_interval_secs);
        let store = self.clone();
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.remove_expired() {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "expiration sweep removed blobs"),
                    Err(StoreError::NotOpen) => {}
                    Err(err) => warn!(error = %err, "expiration sweep failed"),
                }
            }
        });
        *self.inner.sweeper.lock() = Some(handle);
    }
}

fn page_bytes(stat: &heed::DatabaseStat) -> u64 {
    let pages = (stat.branch_pages + stat.leaf_pages + stat.overflow_pages) as u64;
    u64::from(stat.page_size) * pages
}

#[cfg(test)]
impl BlobStore {
    fn remove_metadata_entry(&self, id: Uuid) -> Result<()> {
        self.with_state(|state| {
            let mut txn = Transaction::read_write(&state.env)?;
            state.meta_db.delete(txn.write()?, id.as_bytes().as_slice())?;
            txn.close()?;
            Ok(())
        })
    }

    fn has_data_entry(&self, id: Uuid) -> Result<bool> {
        self.with_state(|state| {
            let mut txn = Transaction::read_only(&state.env)?;
            let present = state
                .data_db
                .get(txn.read()?, id.as_bytes().as_slice())?
                .is_some();
            txn.close()?;
            Ok(present)
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration as ChronoDuration};
    use rand::RngCore;
    use tempfile::TempDir;

    use super::*;

    fn init_tracing() {
        use std::sync::Once;
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }

    fn test_store(dir: &TempDir) -> BlobStore {
        init_tracing();
        let config = StoreConfig {
            parent_dir: dir.path().to_path_buf(),
            map_size: 4 * 1024 * 1024,
            sweep_interval_secs: 1,
            ..StoreConfig::default()
        };
        BlobStore::new(config).unwrap()
    }

    fn open_store(dir: &TempDir) -> BlobStore {
        let store = test_store(dir);
        store.open_or_create().unwrap();
        store
    }

    fn in_one_minute() -> DateTime<Utc> {
        Utc::now() + ChronoDuration::seconds(60)
    }

    fn random_payload(len: usize) -> Vec<u8> {
        let mut payload = vec![0u8; len];
        rand::rng().fill_bytes(&mut payload);
        payload
    }

    #[tokio::test]
    async fn open_close_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        assert!(!store.is_open());

        store.open_or_create().unwrap();
        assert!(store.is_open());
        assert!(matches!(
            store.open_or_create(),
            Err(StoreError::AlreadyOpen)
        ));

        store.close();
        store.close();
        assert!(!store.is_open());

        store.open_or_create().unwrap();
        assert!(store.is_open());
        store.close();
    }

    #[tokio::test]
    async fn operations_require_an_open_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        let id = Uuid::new_v4();

        assert!(matches!(
            store.upload(id, in_one_minute(), b"x"),
            Err(StoreError::NotOpen)
        ));
        assert!(matches!(store.download(id), Err(StoreError::NotOpen)));
        assert!(matches!(store.get_metadata(id), Err(StoreError::NotOpen)));
        assert!(matches!(store.delete(id), Err(StoreError::NotOpen)));
        assert!(matches!(store.remove_expired(), Err(StoreError::NotOpen)));
        assert!(matches!(store.available_bytes(), Err(StoreError::NotOpen)));
    }

    #[tokio::test]
    async fn upload_download_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let id = Uuid::new_v4();
        let payload = random_payload(4096);

        store.upload(id, in_one_minute(), &payload).unwrap();

        let downloaded = store.download(id).unwrap().unwrap();
        assert_eq!(&downloaded[..], &payload[..]);

        let metadata = store.get_metadata(id).unwrap().unwrap();
        assert_eq!(metadata.id(), id);
        assert_eq!(metadata.data_length(), payload.len() as u64);
        assert_eq!(metadata.checksum(), checksum(&payload));
        store.close();
    }

    #[tokio::test]
    async fn absent_blob_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let id = Uuid::new_v4();

        assert!(store.download(id).unwrap().is_none());
        assert!(store.get_metadata(id).unwrap().is_none());
        assert!(store.get_record(id).unwrap().is_none());
        assert!(store.is_expired(id).unwrap());
        store.close();
    }

    #[tokio::test]
    async fn second_upload_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let id = Uuid::new_v4();
        let first = random_payload(4096);
        let second = random_payload(2048);

        store.upload(id, in_one_minute(), &first).unwrap();
        let created_at = store.get_metadata(id).unwrap().unwrap().created_at();

        std::thread::sleep(Duration::from_millis(5));
        let later_deadline = Utc::now() + ChronoDuration::seconds(120);
        store.upload(id, later_deadline, &second).unwrap();

        let mut combined = first.clone();
        combined.extend_from_slice(&second);
        let downloaded = store.download(id).unwrap().unwrap();
        assert_eq!(&downloaded[..], &combined[..]);

        let metadata = store.get_metadata(id).unwrap().unwrap();
        assert_eq!(metadata.data_length(), combined.len() as u64);
        assert_eq!(metadata.checksum(), checksum(&combined));
        assert_eq!(metadata.created_at(), created_at);
        assert!(metadata.modified_at() > created_at);
        assert_eq!(metadata.expires_at(), later_deadline);
        store.close();
    }

    #[tokio::test]
    async fn expired_blob_is_invisible_before_the_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let id = Uuid::new_v4();

        store
            .upload(id, Utc::now() + ChronoDuration::milliseconds(50), b"soon gone")
            .unwrap();
        assert!(store.download(id).unwrap().is_some());
        assert!(!store.is_expired(id).unwrap());

        std::thread::sleep(Duration::from_millis(80));
        assert!(store.download(id).unwrap().is_none());
        assert!(store.get_metadata(id).unwrap().is_none());
        assert!(store.get_record(id).unwrap().is_none());
        assert!(store.is_expired(id).unwrap());
        // Still physically present until a sweep runs.
        assert!(store.has_data_entry(id).unwrap());
        store.close();
    }

    #[tokio::test]
    async fn remove_expired_deletes_only_expired_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let live = Uuid::new_v4();
        let dead = Uuid::new_v4();

        store.upload(live, in_one_minute(), b"keep me").unwrap();
        store
            .upload(dead, Utc::now() + ChronoDuration::milliseconds(20), b"drop me")
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(store.remove_expired().unwrap(), 1);
        assert!(!store.has_data_entry(dead).unwrap());
        assert!(store.download(live).unwrap().is_some());
        assert_eq!(store.remove_expired().unwrap(), 0);

        // A fresh upload to the old id starts over instead of appending.
        store.upload(dead, in_one_minute(), b"anew").unwrap();
        let metadata = store.get_metadata(dead).unwrap().unwrap();
        assert_eq!(metadata.data_length(), 4);
        store.close();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn background_sweep_removes_expired_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let id = Uuid::new_v4();

        store
            .upload(id, Utc::now() + ChronoDuration::milliseconds(200), b"transient")
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!store.has_data_entry(id).unwrap());
        store.close();
    }

    #[tokio::test]
    async fn half_present_blob_is_healed_on_record_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let id = Uuid::new_v4();

        store.upload(id, in_one_minute(), b"payload").unwrap();
        store.remove_metadata_entry(id).unwrap();

        assert!(store.get_record(id).unwrap().is_none());
        assert!(!store.has_data_entry(id).unwrap());
        store.close();
    }

    #[tokio::test]
    async fn half_present_blob_counts_as_expired() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let id = Uuid::new_v4();

        store.upload(id, in_one_minute(), b"payload").unwrap();
        store.remove_metadata_entry(id).unwrap();

        assert!(store.is_expired(id).unwrap());
        assert_eq!(store.remove_expired().unwrap(), 1);
        assert!(!store.has_data_entry(id).unwrap());
        store.close();
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let id = Uuid::new_v4();

        store.upload(id, in_one_minute(), b"bye").unwrap();
        store.delete(id).unwrap();
        assert!(store.download(id).unwrap().is_none());
        store.delete(id).unwrap();
        store.close();
    }

    #[tokio::test]
    async fn delete_all_empties_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.upload(a, in_one_minute(), b"one").unwrap();
        store.upload(b, in_one_minute(), b"two").unwrap();
        store.delete_all().unwrap();

        assert!(store.download(a).unwrap().is_none());
        assert!(store.download(b).unwrap().is_none());
        store.close();
    }

    #[tokio::test]
    async fn get_record_pairs_payload_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let id = Uuid::new_v4();
        let payload = random_payload(1024);

        store.upload(id, in_one_minute(), &payload).unwrap();
        let record = store.get_record(id).unwrap().unwrap();
        assert_eq!(&record.data()[..], &payload[..]);
        assert_eq!(record.metadata().data_length(), payload.len() as u64);
        store.close();
    }

    #[tokio::test]
    async fn space_accounting_tracks_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let map_size = store.config().map_size as u64;

        let before = store.available_bytes().unwrap();
        assert!(before > 0);
        assert!(before <= map_size);
        assert!(store.has_enough_space_for(1024).unwrap());
        assert!(!store.has_enough_space_for(map_size).unwrap());

        store
            .upload(Uuid::new_v4(), in_one_minute(), &random_payload(64 * 1024))
            .unwrap();
        let after = store.available_bytes().unwrap();
        assert!(after < before);
        assert!(store.data_used_bytes().unwrap() >= 64 * 1024);
        assert!(store.meta_used_bytes().unwrap() > 0);
        store.close();
    }

    #[tokio::test]
    async fn blobs_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let id = Uuid::new_v4();
        let payload = random_payload(512);

        store.upload(id, in_one_minute(), &payload).unwrap();
        store.close();

        store.open_or_create().unwrap();
        let downloaded = store.download(id).unwrap().unwrap();
        assert_eq!(&downloaded[..], &payload[..]);
        store.close();
    }
}
