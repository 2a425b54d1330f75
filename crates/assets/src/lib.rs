mod download;
pub mod error;
mod image;
mod watermark;

pub use crate::download::{Downloader, image_extension};
pub use crate::image::{ImageEditor, PassthroughEditor};
pub use crate::watermark::{NoopWatermarker, WatermarkFlags, Watermarker};
use std::sync::Arc;

pub type EditorHandle = Arc<dyn ImageEditor + Send + Sync>;
pub type WatermarkerHandle = Arc<dyn Watermarker + Send + Sync>;
