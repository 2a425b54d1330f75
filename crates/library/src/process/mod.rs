//! The three-mode processing pipeline.
//!
//! [`Context`] bundles the configuration and every external collaborator a
//! unit of work touches. [`run`](stream::run) streams batch events with a
//! bounded number of items in flight; [`run_batch`](stream::run_batch)
//! drives that stream to completion and folds the outcomes into
//! [`BatchCounters`](stream::BatchCounters).

pub mod error;
mod item;
mod stream;

pub use self::stream::{BatchCounters, BatchEvent, ProcessOutcome, run, run_batch};
use crate::error::{ErrorKind, Result};
use crate::flags::NamingStyle;
use crate::queue::{self, QueueItem};
use exn::ResultExt;
use reel_assets::{Downloader, EditorHandle, WatermarkerHandle};
use reel_config::{Mode, Settings};
use reel_scrape::{MediaRecord, SourceHandle};
use reel_storage::{PathGenerator, StoreHandle, sanitize_file_name};
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Absolute deadline for a single item's pipeline, measured from the
/// moment its unit of work starts.
pub(crate) const ITEM_DEADLINE: Duration = Duration::from_secs(10 * 60);

/// Shared, read-only state for one batch run.
pub struct Context {
    pub settings: Arc<Settings>,
    pub store: StoreHandle,
    pub source: SourceHandle,
    pub downloader: Arc<Downloader>,
    pub editor: EditorHandle,
    pub watermarker: WatermarkerHandle,
    stub_namer: PathGenerator,
    custom_patterns: Vec<Regex>,
    pub(crate) source_override: Option<String>,
    pub(crate) url_override: Option<String>,
}

impl Context {
    /// Wire up a batch context from configuration and collaborators.
    ///
    /// # Errors
    /// Returns [`ErrorKind::Config`] when the naming-rule template does
    /// not compile — a configuration problem surfaced before any item
    /// starts. Invalid custom identifier regexes are skipped with a
    /// warning instead, matching their best-effort role.
    pub fn new(
        settings: Arc<Settings>,
        store: StoreHandle,
        source: SourceHandle,
        downloader: Arc<Downloader>,
        editor: EditorHandle,
        watermarker: WatermarkerHandle,
    ) -> Result<Self> {
        let stub_namer = settings
            .name_rule
            .naming_rule
            .parse::<PathGenerator>()
            .or_raise(|| ErrorKind::Config)?
            .with_max_title_len(settings.name_rule.max_title_len);
        let custom_patterns = settings
            .name_rule
            .number_regexs
            .split_whitespace()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    warn!(pattern, error = %err, "skipping invalid identifier pattern");
                    None
                },
            })
            .collect();
        Ok(Self {
            settings,
            store,
            source,
            downloader,
            editor,
            watermarker,
            stub_namer,
            custom_patterns,
            source_override: None,
            url_override: None,
        })
    }

    /// Steer every lookup in this batch at a named adapter or a direct
    /// URL. Used by the single-file entry point.
    pub fn with_lookup_overrides(mut self, source: Option<String>, url: Option<String>) -> Self {
        self.source_override = source;
        self.url_override = url;
        self
    }

    pub fn mode(&self) -> Mode {
        self.settings.common.main_mode
    }

    /// Admission width for the concurrency gate; `0` in configuration
    /// normalizes to fully sequential.
    pub fn max_parallel(&self) -> usize {
        self.settings.common.multi_threading.max(1)
    }

    pub fn naming_style(&self) -> NamingStyle {
        if self.settings.common.jellyfin { NamingStyle::Jellyfin } else { NamingStyle::Kodi }
    }

    /// Build the processing queue for `files` using this batch's
    /// identifier patterns and stop counter.
    pub fn build_queue(&self, files: Vec<PathBuf>) -> Vec<QueueItem> {
        queue::build(files, &self.custom_patterns, self.settings.common.stop_counter)
    }

    /// Base name for playback stubs, rendered from the naming rule.
    pub(crate) fn stub_base_name(&self, record: &MediaRecord) -> String {
        match self.stub_namer.generate(record) {
            Ok(base) if !base.is_empty() => sanitize_file_name(&base.replace('/', "-")),
            _ => record.number.clone(),
        }
    }
}
