//! In-memory lookup adapter for testing.

use crate::error::{ErrorKind, Result};
use crate::model::MediaRecord;
use crate::MetadataSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory metadata source for testing.
///
/// Serves canned records from a `HashMap` and answers
/// [`NotFound`](ErrorKind::NotFound) for everything else. An optional
/// per-call latency makes concurrent lookups overlap, and an in-flight
/// gauge records the high-water mark of simultaneous callers so tests can
/// assert on concurrency bounds.
///
/// # Examples
///
/// ```
/// use reel_scrape::{MediaRecord, MetadataSource, MockSource};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = MockSource::with_records([MediaRecord {
///     number: "ABC-123".into(),
///     title: "A Title".into(),
///     ..MediaRecord::default()
/// }]);
/// assert_eq!(source.lookup("ABC-123", None, None).await?.title, "A Title");
/// assert!(source.lookup("NOPE-1", None, None).await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct MockSource {
    records: HashMap<String, MediaRecord>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockSource {
    /// Create a mock source pre-populated with records, keyed by `number`.
    ///
    /// Panics if any record has an empty number. If test setup is wrong,
    /// then test should not pass.
    pub fn with_records(records: impl IntoIterator<Item = MediaRecord>) -> Self {
        let mut map = HashMap::new();
        for record in records {
            // The panic here is DELIBERATE. MockSource is intended to be
            // used in tests; panics are expected. There is no error result.
            assert!(!record.number.is_empty(), "MockSource::with_records: record without a number");
            map.insert(record.number.clone(), record);
        }
        Self {
            records: map,
            latency: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Hold each lookup open for `latency` so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Highest number of lookups that were ever in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::with_records([])
    }
}

#[async_trait]
impl MetadataSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn lookup(
        &self,
        number: &str,
        _source_override: Option<&str>,
        _url_override: Option<&str>,
    ) -> Result<MediaRecord> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let result = self
            .records
            .get(number)
            .cloned()
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(number.to_string())));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
