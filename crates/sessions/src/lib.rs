//! In-memory, time-bounded session tracking for chunked blob transfers.
//!
//! A transfer front-end consults this crate around every chunk it moves:
//!
//! - [`UploadRegistry`] enforces that the chunks of one upload arrive in
//!   strictly ascending, gapless order and detects when the declared byte
//!   total and chunk count have both been met.
//! - [`DownloadRegistry`] records which byte ranges each client has already
//!   received, in any order, and reports when a single client holds the
//!   whole blob.
//!
//! All state is transient and carries an absolute deadline; expired entries
//! are dropped lazily on access and can be purged in bulk by a periodic
//! caller. Registries are safe to share across request-handling tasks.

pub mod download;
pub mod error;
pub mod interval;
pub mod upload;

pub use download::{ClientProgress, DownloadRegistry, DownloadSession};
pub use error::{Result, SessionError};
pub use interval::{Interval, IntervalSet};
pub use upload::{UploadRegistry, UploadSession};
