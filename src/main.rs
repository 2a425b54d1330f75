//! `reel` — batch curation of a local media library.
//!
//! Walks a source folder (or takes a single file), groups multi-part
//! fragments, looks up metadata for each title, and runs every item
//! through the configured processing mode with bounded concurrency.

use clap::Parser;
use miette::{Context as _, Report};
use reel_assets::{Downloader, NoopWatermarker, PassthroughEditor};
use reel_config::{LinkMode, Mode, Settings};
use reel_library::discover;
use reel_library::process::{Context, run_batch};
use reel_library::{MediaFlags, QueueItem};
use reel_scrape::JsonApiSource;
use reel_storage::{MediaStore, StoreOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "reel", version, about = "Organize a media library from raw video files")]
struct Args {
    /// Configuration file (defaults to ./reel.toml when present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Processing mode: 1 = scrape, 2 = organize, 3 = analyze in place.
    #[arg(short, long)]
    mode: Option<u8>,

    /// Source folder to scan (overrides the configured one).
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Process a single file instead of scanning the source folder.
    #[arg(long, conflicts_with = "source")]
    file: Option<PathBuf>,

    /// Identifier to use for --file when the filename is unparseable.
    #[arg(short, long, requires = "file")]
    number: Option<String>,

    /// Named metadata adapter to prefer for this run.
    #[arg(long = "source-name")]
    source_name: Option<String>,

    /// Direct metadata URL override (single-file runs).
    #[arg(long, requires = "file")]
    url: Option<String>,

    /// Maximum items processed simultaneously (0 = sequential).
    #[arg(short, long)]
    parallel: Option<usize>,

    /// Seconds to wait before dispatching each item.
    #[arg(long)]
    sleep: Option<u64>,

    /// Stop after this many queue items.
    #[arg(long)]
    stop_after: Option<usize>,

    /// Use Jellyfin-style multi-part names (-part1) instead of Kodi (-cd1).
    #[arg(long, conflicts_with = "kodi")]
    jellyfin: bool,

    /// Use Kodi-style multi-part names (-cd1).
    #[arg(long)]
    kodi: bool,

    /// Remove empty directories under the configured roots afterwards.
    #[arg(long)]
    delete_empty_dirs: Option<bool>,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut settings =
        Settings::load(args.config.as_deref()).map_err(report).wrap_err("configuration rejected")?;
    apply_overrides(&mut settings, &args).map_err(|message| miette::miette!(message))?;
    let settings = Arc::new(settings);

    let store = Arc::new(
        MediaStore::new(store_options(&settings))
            .map_err(report)
            .wrap_err("invalid location rule")?,
    );
    let source = Arc::new(
        JsonApiSource::new("api", settings.scraper.api_url.as_str())
            .map_err(report)
            .wrap_err("metadata client failed to initialize")?,
    );
    let source_name = args
        .source_name
        .clone()
        .or_else(|| (!settings.scraper.source.is_empty()).then(|| settings.scraper.source.clone()));

    let ctx = Context::new(
        Arc::clone(&settings),
        store,
        source,
        Arc::new(Downloader::new().map_err(report)?),
        Arc::new(PassthroughEditor),
        Arc::new(NoopWatermarker),
    )
    .map_err(report)
    .wrap_err("pipeline configuration rejected")?
    .with_lookup_overrides(source_name, args.url.clone());

    let queue = match &args.file {
        // An explicit identifier bypasses extraction entirely, for files
        // whose names carry nothing parseable.
        Some(file) => match &args.number {
            Some(number) => {
                let filename = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                vec![QueueItem {
                    file_path: file.clone(),
                    number: number.clone(),
                    flags: MediaFlags::parse(&filename),
                    group: None,
                }]
            },
            None => ctx.build_queue(vec![file.clone()]),
        },
        None => {
            let source_folder = PathBuf::from(&settings.common.source_folder);
            let files = discover::media_files(
                &source_folder,
                &settings.media_extensions(),
                &settings.escape_folders(),
            )
            .await;
            tracing::info!(files = files.len(), mode = ?settings.common.main_mode, "starting batch");
            ctx.build_queue(files)
        },
    };
    let counters = run_batch(&ctx, queue).await;
    println!("{} processed, {} failed", counters.processed, counters.failed);
    Ok(())
}

/// Turn an `exn::Exn<E>` into a miette `Report`. `Exn` is not a
/// `std::error::Error` (so `into_diagnostic` does not apply), but it implements
/// `Display` (the top message) and `Debug` (the full frame tree with source
/// locations), which is exactly what `Report::msg` renders from.
fn report<E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static>(exn: E) -> Report {
    Report::msg(exn)
}

fn apply_overrides(settings: &mut Settings, args: &Args) -> Result<(), String> {
    if let Some(mode) = args.mode {
        settings.common.main_mode = Mode::try_from(mode)?;
    }
    if let Some(source) = &args.source {
        settings.common.source_folder = source.to_string_lossy().into_owned();
    }
    if let Some(parallel) = args.parallel {
        settings.common.multi_threading = parallel;
    }
    if let Some(sleep) = args.sleep {
        settings.common.sleep = sleep;
    }
    if let Some(stop_after) = args.stop_after {
        settings.common.stop_counter = stop_after;
    }
    if args.jellyfin {
        settings.common.jellyfin = true;
    }
    if args.kodi {
        settings.common.jellyfin = false;
    }
    if let Some(delete) = args.delete_empty_dirs {
        settings.common.del_empty_folder = delete;
    }
    Ok(())
}

fn store_options(settings: &Settings) -> StoreOptions {
    StoreOptions {
        success_root: PathBuf::from(&settings.common.success_output_folder),
        failed_root: PathBuf::from(&settings.common.failed_output_folder),
        link_mode: settings.common.link_mode,
        failed_move: settings.common.failed_move,
        // Linked or in-place libraries must keep sources where they are;
        // failures are recorded instead of relocated.
        record_failures_only: settings.common.main_mode == Mode::Analysis
            || settings.common.link_mode != LinkMode::Move,
        subtitle_extensions: settings.subtitle_extensions(),
        escape_literals: settings.escape.literals.clone(),
        location_rule: settings.name_rule.location_rule.clone(),
        max_title_len: settings.name_rule.max_title_len,
    }
}
