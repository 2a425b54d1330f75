//! Bounded-concurrency batch execution.
//!
//! [`run`] streams [`BatchEvent`]s for a queue: a window of at most
//! `max_parallel` items is in flight at once, additional items are
//! promoted FIFO as running ones complete. Dispatch order is queue order;
//! completion order is whatever it is — consumers must not assume one.
//!
//! Events follow a strict ordering:
//! 1. [`Started`](BatchEvent::Started) — exactly once.
//! 2. [`QueueBuilt`](BatchEvent::QueueBuilt) — exactly once, with the
//!    queue length.
//! 3. [`Finished`](BatchEvent::Finished) — exactly once per queue item,
//!    success or failure.
//! 4. [`Complete`](BatchEvent::Complete) — exactly once, signalling the
//!    stream is finished.
//!
//! Per-item failures are data ([`ProcessOutcome::result`]), never stream
//! termination: `finished successes + finished failures == queue length`,
//! always.

use super::error::{Error as ProcessError, ErrorKind};
use super::item::process_item;
use super::{Context, ITEM_DEADLINE};
use crate::queue::QueueItem;
use async_stream::stream;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt, pin_mut};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

/// Progress events emitted by [`run`] as it works through a queue.
pub enum BatchEvent {
    /// Processing has begun; emitted exactly once before any other event.
    Started,
    /// The queue has been accepted; the total item count is now known.
    QueueBuilt(u64),
    /// One item finished, successfully or not.
    Finished(ProcessOutcome),
    /// Every queued item has finished; the stream is done.
    Complete,
}

/// The terminal state of one queue item, produced exactly once.
pub struct ProcessOutcome {
    pub file_path: PathBuf,
    pub number: String,
    pub result: Result<(), ProcessError>,
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Batch totals folded from [`ProcessOutcome`]s by the stream consumer.
///
/// Aggregation happens on the consuming side of the stream — single
/// threaded by construction — so no lock is needed to keep
/// `processed + failed` equal to the queue length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounters {
    pub processed: u64,
    pub failed: u64,
}

impl BatchCounters {
    fn absorb(&mut self, outcome: &ProcessOutcome) {
        if outcome.is_success() {
            self.processed += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Stream [`BatchEvent`]s for `queue`, processing up to
/// [`Context::max_parallel`] items concurrently.
///
/// Each unit of work runs the full mode pipeline under an absolute
/// deadline, captures its own error into a [`ProcessOutcome`], and routes
/// its source file to the failure area on error. Nothing an individual
/// item does terminates the stream.
pub fn run<'a>(ctx: &'a Context, queue: Vec<QueueItem>) -> impl Stream<Item = BatchEvent> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield BatchEvent::Started;
        let total = queue.len();
        yield BatchEvent::QueueBuilt(total as u64);

        let mut pending: Vec<_> =
            queue.into_iter().enumerate().map(|(index, item)| process_unit(ctx, item, index, total)).collect();
        let mut in_flight = FuturesUnordered::new();
        in_flight.extend(pending.drain(..ctx.max_parallel().min(pending.len())));
        while let Some(outcome) = in_flight.next().await {
            yield BatchEvent::Finished(outcome);
            // Pop-n-push, but FIFO instead of LIFO.
            if !pending.is_empty() {
                in_flight.push(pending.remove(0));
            }
        }

        yield BatchEvent::Complete;
    })
}

/// One unit of work: deadline, delay, pipeline, failure isolation.
async fn process_unit(ctx: &Context, item: QueueItem, index: usize, total: usize) -> ProcessOutcome {
    let percentage = (index + 1) as f64 / total as f64 * 100.0;
    match &item.group {
        Some(group) => info!(
            "processing [{percentage:.1}% {}/{total}] fragment group {} ({} parts)",
            index + 1,
            item.number,
            group.len(),
        ),
        None => {
            info!("processing [{percentage:.1}% {}/{total}] {}", index + 1, item.file_path.display())
        },
    }

    // Optional inter-dispatch throttle; the slot is held while sleeping,
    // which is exactly the point.
    let delay = ctx.settings.common.sleep;
    if delay > 0 {
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }

    let result = match tokio::time::timeout(ITEM_DEADLINE, process_item(ctx, &item)).await {
        Ok(result) => result,
        Err(_elapsed) => Err(exn::Exn::from(ErrorKind::Timeout)),
    };

    if result.is_err() {
        // Failure isolation must never escalate; an un-isolatable file is
        // a log line, not a batch problem.
        if let Err(isolation_err) = ctx.store.isolate(&item.file_path).await {
            warn!(
                file = %item.file_path.display(),
                error = %isolation_err,
                "failed to isolate failed item"
            );
        }
    }

    ProcessOutcome { file_path: item.file_path, number: item.number, result }
}

/// Drive [`run`] to completion and fold the outcomes into counters.
///
/// After the stream completes, optionally sweeps empty directories under
/// the output, failed, and source roots.
pub async fn run_batch(ctx: &Context, queue: Vec<QueueItem>) -> BatchCounters {
    if queue.is_empty() {
        info!("no items to process");
        return BatchCounters::default();
    }

    let mut counters = BatchCounters::default();
    let events = run(ctx, queue);
    pin_mut!(events);
    while let Some(event) = events.next().await {
        if let BatchEvent::Finished(outcome) = event {
            counters.absorb(&outcome);
            match &outcome.result {
                Ok(()) => info!(number = %outcome.number, "processed successfully"),
                Err(err) => {
                    error!(file = %outcome.file_path.display(), error = %err, "failed to process")
                },
            }
        }
    }
    info!(processed = counters.processed, failed = counters.failed, "processing completed");

    if ctx.settings.common.del_empty_folder {
        for root in [
            &ctx.settings.common.success_output_folder,
            &ctx.settings.common.failed_output_folder,
            &ctx.settings.common.source_folder,
        ] {
            if !root.is_empty() {
                let _ = ctx.store.remove_empty_dirs(std::path::Path::new(root)).await;
            }
        }
    }
    counters
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_assets::{Downloader, NoopWatermarker, PassthroughEditor};
    use reel_config::{Mode, Settings};
    use reel_scrape::{MediaRecord, MockSource};
    use reel_storage::{MediaStore, StoreOptions};
    use std::path::Path;
    use std::sync::Arc;
    use tokio::fs;

    struct Fixture {
        _temp: tempfile::TempDir,
        root: PathBuf,
        source: Arc<MockSource>,
        ctx: Context,
    }

    fn record(number: &str) -> MediaRecord {
        MediaRecord { number: number.into(), actor: "Actor".into(), title: "Title".into(), ..MediaRecord::default() }
    }

    fn fixture(mode: Mode, max_parallel: usize, records: Vec<MediaRecord>) -> Fixture {
        fixture_with_latency(mode, max_parallel, records, None)
    }

    fn fixture_with_latency(
        mode: Mode,
        max_parallel: usize,
        records: Vec<MediaRecord>,
        latency: Option<Duration>,
    ) -> Fixture {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().to_path_buf();

        let mut settings = Settings::default();
        settings.common.main_mode = mode;
        settings.common.multi_threading = max_parallel;
        settings.common.sleep = 0;
        settings.common.del_empty_folder = false;
        settings.common.source_folder = root.join("source").to_string_lossy().into_owned();
        settings.common.success_output_folder = root.join("output").to_string_lossy().into_owned();
        settings.common.failed_output_folder = root.join("failed").to_string_lossy().into_owned();
        let settings = Arc::new(settings);

        let store = Arc::new(
            MediaStore::new(StoreOptions {
                success_root: root.join("output"),
                failed_root: root.join("failed"),
                link_mode: Default::default(),
                failed_move: true,
                record_failures_only: false,
                subtitle_extensions: vec![".srt".into()],
                escape_literals: String::new(),
                location_rule: "{{ actor }}/{{ number }}".into(),
                max_title_len: 50,
            })
            .unwrap(),
        );
        let mut source = MockSource::with_records(records);
        if let Some(latency) = latency {
            source = source.with_latency(latency);
        }
        let source = Arc::new(source);

        let ctx = Context::new(
            Arc::clone(&settings),
            store,
            source.clone(),
            Arc::new(Downloader::new().unwrap()),
            Arc::new(PassthroughEditor),
            Arc::new(NoopWatermarker),
        )
        .unwrap();
        Fixture { _temp: temp, root, source, ctx }
    }

    async fn seed(root: &Path, names: &[&str]) -> Vec<PathBuf> {
        let source_dir = root.join("source");
        fs::create_dir_all(&source_dir).await.unwrap();
        let mut paths = Vec::new();
        for name in names {
            let path = source_dir.join(name);
            fs::write(&path, b"video-bytes").await.unwrap();
            paths.push(path);
        }
        paths
    }

    #[tokio::test]
    async fn test_accounting_invariant_and_isolation() {
        // Item 3 of 5 has no metadata record: it fails, the rest succeed.
        let records = ["AAA-111", "BBB-222", "DDD-444", "EEE-555"].map(record).to_vec();
        let fixture = fixture(Mode::Organizing, 2, records);
        let files =
            seed(&fixture.root, &["AAA-111.mp4", "BBB-222.mp4", "CCC-333.mp4", "DDD-444.mp4", "EEE-555.mp4"])
                .await;

        let queue = fixture.ctx.build_queue(files);
        assert_eq!(queue.len(), 5);
        let counters = run_batch(&fixture.ctx, queue).await;

        assert_eq!(counters.processed + counters.failed, 5);
        assert_eq!(counters, BatchCounters { processed: 4, failed: 1 });
        // The failed source was relocated to the holding area.
        assert!(fixture.root.join("failed/CCC-333.mp4").exists());
        assert!(!fixture.root.join("source/CCC-333.mp4").exists());
        // The others were placed.
        assert!(fixture.root.join("output/Actor/AAA-111/AAA-111.mp4").exists());
        assert!(fixture.root.join("output/Actor/EEE-555/EEE-555.mp4").exists());
    }

    #[tokio::test]
    async fn test_concurrency_bound_respected() {
        let records =
            ["AAA-111", "BBB-222", "CCC-333", "DDD-444", "EEE-555", "FFF-666"].map(record).to_vec();
        let fixture =
            fixture_with_latency(Mode::Organizing, 2, records, Some(Duration::from_millis(30)));
        let files = seed(
            &fixture.root,
            &["AAA-111.mp4", "BBB-222.mp4", "CCC-333.mp4", "DDD-444.mp4", "EEE-555.mp4", "FFF-666.mp4"],
        )
        .await;

        let queue = fixture.ctx.build_queue(files);
        let counters = run_batch(&fixture.ctx, queue).await;
        assert_eq!(counters.processed, 6);
        let peak = fixture.source.peak_in_flight();
        assert!(peak <= 2, "peak in-flight {peak} exceeded bound");
        assert!(peak >= 2, "expected the window to actually fill");
    }

    #[tokio::test]
    async fn test_sequential_when_unbounded_config_is_zero() {
        let records = ["AAA-111", "BBB-222", "CCC-333"].map(record).to_vec();
        // multi_threading = 0 normalizes to one at a time.
        let fixture =
            fixture_with_latency(Mode::Organizing, 0, records, Some(Duration::from_millis(10)));
        let files = seed(&fixture.root, &["AAA-111.mp4", "BBB-222.mp4", "CCC-333.mp4"]).await;

        let counters = run_batch(&fixture.ctx, fixture.ctx.build_queue(files)).await;
        assert_eq!(counters.processed, 3);
        assert_eq!(fixture.source.peak_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_fragment_group_placed_with_part_names() {
        let fixture = fixture(Mode::Organizing, 1, vec![record("ABC-123")]);
        let files = seed(&fixture.root, &["ABC-123-cd2.mp4", "ABC-123-cd1.mp4"]).await;

        let queue = fixture.ctx.build_queue(files);
        assert_eq!(queue.len(), 1, "both parts collapse into one item");
        let counters = run_batch(&fixture.ctx, queue).await;
        assert_eq!(counters, BatchCounters { processed: 1, failed: 0 });

        let title_dir = fixture.root.join("output/Actor/ABC-123");
        assert!(title_dir.join("ABC-123-cd1.mp4").exists());
        assert!(title_dir.join("ABC-123-cd2.mp4").exists());
        assert!(title_dir.join("ABC-123.nfo").exists());
        // Sources are gone.
        assert!(!fixture.root.join("source/ABC-123-cd1.mp4").exists());
    }

    #[tokio::test]
    async fn test_placement_idempotent_on_second_run() {
        let fixture = fixture(Mode::Organizing, 1, vec![record("AAA-111")]);
        let files = seed(&fixture.root, &["AAA-111.mp4"]).await;
        let counters = run_batch(&fixture.ctx, fixture.ctx.build_queue(files)).await;
        assert_eq!(counters.processed, 1);

        let dest = fixture.root.join("output/Actor/AAA-111/AAA-111.mp4");
        fs::write(&dest, b"placed-on-first-run").await.unwrap();

        // Same file shows up again; the occupied destination is skipped,
        // not overwritten, and the item still counts as processed.
        let files = seed(&fixture.root, &["AAA-111.mp4"]).await;
        let counters = run_batch(&fixture.ctx, fixture.ctx.build_queue(files)).await;
        assert_eq!(counters, BatchCounters { processed: 1, failed: 0 });
        assert_eq!(fs::read(&dest).await.unwrap(), b"placed-on-first-run");
    }

    #[tokio::test]
    async fn test_analysis_mode_scrapes_in_place() {
        let fixture = fixture(Mode::Analysis, 1, vec![record("AAA-111")]);
        let files = seed(&fixture.root, &["AAA-111.mp4"]).await;

        let counters = run_batch(&fixture.ctx, fixture.ctx.build_queue(files)).await;
        assert_eq!(counters.processed, 1);
        // Nothing moved; the NFO sits next to the video with a matching base name.
        assert!(fixture.root.join("source/AAA-111.mp4").exists());
        assert!(fixture.root.join("source/AAA-111.nfo").exists());
        assert!(!fixture.root.join("output/Actor").exists());
    }

    #[tokio::test]
    async fn test_event_ordering() {
        let fixture = fixture(Mode::Organizing, 1, vec![record("AAA-111")]);
        let files = seed(&fixture.root, &["AAA-111.mp4"]).await;
        let queue = fixture.ctx.build_queue(files);

        let events = run(&fixture.ctx, queue);
        pin_mut!(events);
        assert!(matches!(events.next().await, Some(BatchEvent::Started)));
        assert!(matches!(events.next().await, Some(BatchEvent::QueueBuilt(1))));
        assert!(matches!(events.next().await, Some(BatchEvent::Finished(_))));
        assert!(matches!(events.next().await, Some(BatchEvent::Complete)));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_subtitles_follow_the_video() {
        let fixture = fixture(Mode::Organizing, 1, vec![record("AAA-111")]);
        let files = seed(&fixture.root, &["AAA-111.mp4"]).await;
        fs::write(fixture.root.join("source/AAA-111.zh.srt"), b"sub").await.unwrap();

        let counters = run_batch(&fixture.ctx, fixture.ctx.build_queue(files)).await;
        assert_eq!(counters.processed, 1);
        assert!(fixture.root.join("output/Actor/AAA-111/AAA-111.zh.srt").exists());
    }
}
