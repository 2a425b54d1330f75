//! Poster derivation contract.
//!
//! Pixel-level cropping and face detection are external collaborators; the
//! pipeline only needs the seam. The shipped [`PassthroughEditor`] copies
//! the cover verbatim, which is also the correct behaviour for code-only
//! series where no facial crop applies.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use reel_scrape::ImageCut;
use std::path::Path;

#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Derive a poster at `dest` from the cover at `src`.
    ///
    /// `mode` is the source-reported cut hint; `skip_face_detection`
    /// disables any face-aware positioning the implementation would apply.
    async fn crop(&self, mode: ImageCut, src: &Path, dest: &Path, skip_face_detection: bool) -> Result<()>;

    /// Plain byte-for-byte copy of `src` to `dest`.
    async fn copy(&self, src: &Path, dest: &Path) -> Result<()>;
}

/// Editor that never crops: both operations copy the source image.
#[derive(Debug, Default)]
pub struct PassthroughEditor;

#[async_trait]
impl ImageEditor for PassthroughEditor {
    async fn crop(&self, _mode: ImageCut, src: &Path, dest: &Path, _skip_face_detection: bool) -> Result<()> {
        self.copy(src, dest).await
    }

    async fn copy(&self, src: &Path, dest: &Path) -> Result<()> {
        if !tokio::fs::try_exists(src).await.map_err(ErrorKind::Io)? {
            exn::bail!(ErrorKind::NotFound(src.to_path_buf()));
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }
        tokio::fs::copy(src, dest).await.map(|_| ()).or_raise(|| ErrorKind::NotFound(src.to_path_buf()))
    }
}
