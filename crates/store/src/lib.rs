//! Transient blob storage on an embedded transactional engine.
//!
//! Blobs are byte payloads keyed by UUID, each paired with a small JSON
//! metadata document carrying its length, checksum and lifecycle dates.
//! Payloads and metadata live in two keyspaces of one memory-mapped
//! engine environment and are always written together, so readers never
//! observe a blob with only one of its halves committed.
//!
//! Every blob expires. Reads treat a blob past its expiration date as
//! absent, and an opened [`BlobStore`] runs a periodic background sweep
//! that physically removes expired entries.

pub mod config;
pub mod error;
pub mod metadata;
pub mod store;
pub mod transaction;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use metadata::{checksum, BlobMetadata, BlobRecord, MetadataBuilder, MetadataError};
pub use store::BlobStore;
pub use transaction::{Transaction, TransactionError};
