//! Lookup Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A lookup error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for lookup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No metadata exists for the identifier on any queried source.
    #[display("no metadata found for: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Transport-level failure (connection, TLS, timeout).
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// The source answered with something that is not a metadata record.
    #[display("undecodable response from source: {_0}")]
    Decode(#[error(not(source))] String),
    /// A named source override does not exist.
    #[display("unknown metadata source: {_0}")]
    UnknownSource(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
