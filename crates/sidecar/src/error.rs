//! Sidecar Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A sidecar error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sidecar operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The sidecar file could not be written.
    #[display("failed to write sidecar {}: {_1}", _0.display())]
    Write(#[error(not(source))] PathBuf, #[error(not(source))] IoError),
    /// No source path available to point a playback stub at.
    #[display("playback stub has no source paths")]
    EmptyStub,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Write(..))
    }
}
