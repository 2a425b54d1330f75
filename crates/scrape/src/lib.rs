pub mod error;
mod http;
#[cfg(feature = "mock")]
mod mock;
mod model;

pub use crate::http::JsonApiSource;
#[cfg(feature = "mock")]
pub use crate::mock::MockSource;
pub use crate::model::{ImageCut, MediaRecord};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub type SourceHandle = Arc<dyn MetadataSource + Send + Sync>;

/// Unified interface for metadata lookup adapters.
///
/// An adapter resolves a stable identifier (the "number") into a
/// [`MediaRecord`]. Callers may steer the lookup with a named source
/// override or a direct URL override; adapters that don't support overrides
/// should ignore them rather than fail.
///
/// Lookup failures come in two flavours the pipeline treats differently:
/// [`NotFound`](error::ErrorKind::NotFound) means the identifier genuinely
/// has no record, anything else is operational and potentially retryable.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Name of the configured adapter (used for logging only).
    fn name(&self) -> &str;

    /// Resolve `number` into a metadata record.
    async fn lookup(
        &self,
        number: &str,
        source_override: Option<&str>,
        url_override: Option<&str>,
    ) -> Result<MediaRecord>;
}
