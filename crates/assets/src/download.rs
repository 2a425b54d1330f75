//! HTTP asset fetching.
//!
//! One [`Downloader`] is shared across all concurrent units of work; the
//! underlying `reqwest` client pools connections per host. Every fetch
//! creates missing parent directories and is safe to call when the target
//! already exists — callers decide the skip policy.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use reqwest::Client;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Valid image extensions recognized in asset URLs.
const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".bmp"];

/// Determine the image extension from an asset URL, defaulting to `.jpg`.
pub fn image_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    IMAGE_EXTENSIONS.iter().find(|ext| path.ends_with(*ext)).copied().unwrap_or(".jpg")
}

/// Shared HTTP fetcher for covers, stills, trailers and portraits.
pub struct Downloader {
    http: Client,
}

impl Downloader {
    /// # Errors
    /// Returns [`ErrorKind::Download`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .or_raise(|| ErrorKind::Download("failed to build HTTP client".into()))?;
        Ok(Self { http })
    }

    /// Fetch `url` into `dest`, creating parent directories as needed.
    ///
    /// Extra `headers` are sent verbatim (referer-locked CDNs). An existing
    /// destination is overwritten; callers that want skip-if-present
    /// semantics check before calling.
    pub async fn fetch(&self, url: &str, dest: &Path, headers: &HashMap<String, String>) -> Result<()> {
        debug!(%url, dest = %dest.display(), "fetching asset");
        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .or_raise(|| ErrorKind::Download(format!("fetch of {url} failed")))?;
        let body = response.bytes().await.or_raise(|| ErrorKind::Download(format!("read of {url} failed")))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }
        tokio::fs::write(dest, &body).await.map_err(ErrorKind::Io)?;
        Ok(())
    }

    /// Fetch the numbered extra stills into an `extrafanart/` directory
    /// under `dest_dir`.
    ///
    /// Individual still failures are skipped; the first still that fetched
    /// fine is not undone by a later one failing.
    pub async fn fetch_stills(
        &self,
        urls: &[String],
        dest_dir: &Path,
        headers: &HashMap<String, String>,
    ) -> Result<usize> {
        let still_dir = dest_dir.join("extrafanart");
        let mut fetched = 0;
        for (index, url) in urls.iter().enumerate() {
            let name = format!("extrafanart-{}{}", index + 1, image_extension(url));
            let dest = still_dir.join(name);
            if dest.exists() {
                continue;
            }
            match self.fetch(url, &dest, headers).await {
                Ok(()) => fetched += 1,
                Err(err) => debug!(%url, error = %err, "skipping still"),
            }
        }
        Ok(fetched)
    }

    /// Fetch actor portraits into a `.actors/` directory under `dest_dir`
    /// (the Kodi convention).
    pub async fn fetch_portraits(
        &self,
        portraits: &HashMap<String, String>,
        dest_dir: &Path,
    ) -> Result<usize> {
        let actors_dir = dest_dir.join(".actors");
        let empty = HashMap::new();
        let mut fetched = 0;
        for (name, url) in portraits {
            if url.is_empty() {
                continue;
            }
            let dest = actors_dir.join(format!("{name}{}", image_extension(url)));
            if dest.exists() {
                continue;
            }
            match self.fetch(url, &dest, &empty).await {
                Ok(()) => fetched += 1,
                Err(err) => debug!(actor = %name, error = %err, "skipping portrait"),
            }
        }
        Ok(fetched)
    }
}
