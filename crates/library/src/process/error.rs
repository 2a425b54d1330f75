//! Processing Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A processing error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal per-item failure categories.
///
/// Best-effort steps (asset downloads, cropping, watermarking, subtitle
/// moves) never produce these — they log warnings and processing
/// continues. Everything here fails the item and routes its source to the
/// failure holding area.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The metadata collaborator found nothing or failed.
    #[display("metadata lookup failed")]
    Lookup,
    /// Moving/linking the video (or a fragment member) failed.
    #[display("failed to place video file")]
    Placement,
    /// NFO/STRM emission failed; fatal even though placement may have
    /// already succeeded (no rollback of placed files).
    #[display("failed to emit sidecar")]
    Sidecar,
    /// The item overran its absolute processing deadline.
    #[display("processing deadline exceeded")]
    Timeout,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Lookup | Self::Timeout)
    }
}
