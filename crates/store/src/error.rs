//! Error types for the blob store.

use crate::metadata::MetadataError;
use crate::transaction::TransactionError;

/// Errors that can occur when working with the blob store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Operation invoked on a store that is not open.
    #[error("store is not open")]
    NotOpen,

    /// `open_or_create` on a store that is already open.
    #[error("store is already open")]
    AlreadyOpen,

    /// Rejected store configuration.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    /// IO error, e.g. while creating the store directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage engine error.
    #[error("storage engine error: {0}")]
    Engine(#[from] heed::Error),

    /// Invalid, oversized or malformed blob metadata.
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Transaction misuse.
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
