//! Asset Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// An asset error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for asset operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Transport-level failure fetching an asset.
    #[display("download failed: {_0}")]
    Download(#[error(not(source))] String),
    /// Writing the fetched bytes (or a derived image) to disk failed.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// A source path for a local operation does not exist.
    #[display("asset not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Download(_) | Self::Io(_))
    }
}
