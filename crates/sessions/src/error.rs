//! Error types for session tracking.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Errors raised by the session registries.
///
/// These are protocol violations from a remote client, surfaced to the
/// transport layer as rejected requests rather than crashes.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Only one upload may be in flight per blob id.
    #[error("an upload session already exists for blob {0}")]
    DuplicateUpload(Uuid),

    /// Chunk received for a blob with no live upload session.
    #[error("no upload session for blob {0}")]
    UnknownUpload(Uuid),

    /// Chunk violates the upload ordering contract.
    #[error("invalid chunk: {0}")]
    InvalidChunk(&'static str),

    /// Session deadline is not in the future.
    #[error("session deadline {0} is not in the future")]
    Expired(DateTime<Utc>),

    /// Interval with begin past end.
    #[error("invalid interval: begin {begin} is after end {end}")]
    InvalidInterval { begin: u64, end: u64 },
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
