//! HTTP JSON lookup adapter.
//!
//! Talks to a metadata service exposing `GET {base_url}/{number}` returning
//! a [`MediaRecord`] as JSON. This is the shipped adapter; site-specific
//! scrapers live behind the same trait out of tree.

use crate::error::{ErrorKind, Result};
use crate::model::MediaRecord;
use crate::MetadataSource;
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Lookup adapter backed by a JSON-over-HTTP metadata service.
pub struct JsonApiSource {
    name: String,
    base_url: String,
    http: Client,
}

impl JsonApiSource {
    /// Create an adapter for the service at `base_url`.
    ///
    /// # Errors
    /// Returns [`ErrorKind::Network`] if the HTTP client cannot be built
    /// (TLS backend initialization, mostly).
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .or_raise(|| ErrorKind::Network("failed to build HTTP client".into()))?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl MetadataSource for JsonApiSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(
        &self,
        number: &str,
        source_override: Option<&str>,
        url_override: Option<&str>,
    ) -> Result<MediaRecord> {
        // A URL override bypasses the base URL entirely; a source override
        // is forwarded as a query parameter for the service to interpret.
        let url = match url_override {
            Some(url) => url.to_string(),
            None => format!("{}/{number}", self.base_url),
        };
        debug!(source = %self.name, %url, "looking up metadata");

        let mut request = self.http.get(&url);
        if let Some(source) = source_override {
            request = request.query(&[("source", source)]);
        }

        let response =
            request.send().await.or_raise(|| ErrorKind::Network(format!("request to {url} failed")))?;
        if response.status() == StatusCode::NOT_FOUND {
            exn::bail!(ErrorKind::NotFound(number.to_string()));
        }
        let response =
            response.error_for_status().or_raise(|| ErrorKind::Network(format!("error status from {url}")))?;

        let record: MediaRecord =
            response.json().await.or_raise(|| ErrorKind::Decode(format!("invalid record from {url}")))?;
        if record.number.is_empty() {
            // A record without an identifier is useless downstream; treat it
            // the same as the service not knowing the title at all.
            exn::bail!(ErrorKind::NotFound(number.to_string()));
        }
        Ok(record)
    }
}
