//! Watermark rendering contract.
//!
//! Rendering corner marks onto poster/thumbnail images is an external
//! collaborator; the pipeline passes the presentation flags through this
//! seam and treats failures as warnings.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Presentation flags a watermarker may render.
///
/// Mirrors the flag set parsed from filenames; plain bools so the contract
/// stays independent of the pipeline's own flag type.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatermarkFlags {
    pub chinese_subtitle: bool,
    pub leak: bool,
    pub uncensored: bool,
    pub hack: bool,
    pub four_k: bool,
    pub iso: bool,
}

#[async_trait]
pub trait Watermarker: Send + Sync {
    /// Render the given flags onto the poster and thumbnail in place.
    async fn apply(&self, poster: &Path, thumb: &Path, flags: WatermarkFlags) -> Result<()>;
}

/// Watermarker that renders nothing.
#[derive(Debug, Default)]
pub struct NoopWatermarker;

#[async_trait]
impl Watermarker for NoopWatermarker {
    async fn apply(&self, _poster: &Path, _thumb: &Path, _flags: WatermarkFlags) -> Result<()> {
        Ok(())
    }
}
