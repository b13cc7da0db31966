//! Store configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Smallest accepted memory map, one engine page on common platforms.
pub const MIN_MAP_SIZE: usize = 4096;

/// Smallest accepted reader slot count.
pub const MIN_MAX_READERS: u32 = 2;

/// Smallest accepted sweep period in seconds.
pub const MIN_SWEEP_INTERVAL_SECS: u64 = 1;

/// Configuration of a [`crate::BlobStore`].
///
/// `parent_dir` must already exist; the store creates `dir_name` beneath it
/// on open. The two keyspace names must differ. Validated by
/// [`StoreConfig::validate`] before any engine resource is touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Existing directory the store directory is created under.
    pub parent_dir: PathBuf,
    /// Name of the store directory beneath `parent_dir`.
    pub dir_name: String,
    /// Name of the payload keyspace.
    pub data_keyspace: String,
    /// Name of the metadata keyspace.
    pub meta_keyspace: String,
    /// Memory map size in bytes, the hard capacity ceiling.
    pub map_size: usize,
    /// Maximum number of concurrent read transactions.
    pub max_readers: u32,
    /// Period of the background expiration sweep.
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            parent_dir: std::env::temp_dir(),
            dir_name: "db".to_owned(),
            data_keyspace: "blob-data".to_owned(),
            meta_keyspace: "blob-meta".to_owned(),
            map_size: 256 * 1024 * 1024,
            max_readers: 128,
            sweep_interval_secs: 60,
        }
    }
}

impl StoreConfig {
    /// Directory holding the engine files.
    pub fn store_dir(&self) -> PathBuf {
        self.parent_dir.join(&self.dir_name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dir_name.is_empty() {
            return Err(invalid("store directory name must not be empty"));
        }
        if self.data_keyspace.is_empty() || self.meta_keyspace.is_empty() {
            return Err(invalid("keyspace names must not be empty"));
        }
        if self.data_keyspace == self.meta_keyspace {
            return Err(invalid("payload and metadata keyspaces must differ"));
        }
        if self.map_size < MIN_MAP_SIZE {
            return Err(invalid("map size is below one engine page"));
        }
        if self.max_readers < MIN_MAX_READERS {
            return Err(invalid("at least two reader slots are required"));
        }
        if self.sweep_interval_secs < MIN_SWEEP_INTERVAL_SECS {
            return Err(invalid("sweep interval must be at least one second"));
        }
        check_parent_dir(&self.parent_dir)?;
        Ok(())
    }
}

fn invalid(message: &str) -> StoreError {
    StoreError::InvalidConfig(message.to_owned())
}

fn check_parent_dir(parent: &Path) -> Result<()> {
    let meta = std::fs::metadata(parent)
        .map_err(|_| invalid("parent directory does not exist"))?;
    if !meta.is_dir() {
        return Err(invalid("parent path is not a directory"));
    }
    if meta.permissions().readonly() {
        return Err(invalid("parent directory is not writable"));
    }
    Ok(())
}
