//! Stale-while-revalidate cache for feed results.
//!
//! Results are keyed by request URL. A failed revalidation keeps the
//! previous data around but raises the error flag, and consumers that only
//! render error-free data see nothing. Revalidations of the same key that
//! start within the feed's dedupe interval, or while another one is in
//! flight, reuse the cached state instead of issuing a request.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crime_cluster_crime_models::StreetCrime;
use tokio::sync::RwLock;

use crate::CrimeSource;
use crate::feed_def::FeedDefinition;

/// Resolution state of one cached request.
#[derive(Debug, Clone, Default)]
pub enum FetchState {
    /// Never resolved.
    #[default]
    Pending,
    /// Last fetch succeeded.
    Loaded {
        /// Records from the last successful fetch, verbatim.
        crimes: Arc<Vec<StreetCrime>>,
        /// When the fetch resolved.
        fetched_at: DateTime<Utc>,
    },
    /// Last fetch failed.
    Failed {
        /// Error message of the failed fetch.
        error: String,
        /// Data from an earlier successful fetch, if any.
        previous: Option<Arc<Vec<StreetCrime>>>,
    },
}

impl FetchState {
    /// Whether the error flag is raised.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Short state name for status reporting.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Loaded { .. } => "loaded",
            Self::Failed { .. } => "failed",
        }
    }

    /// The cached data, stale or not.
    #[must_use]
    pub fn data(&self) -> Option<&Arc<Vec<StreetCrime>>> {
        match self {
            Self::Pending => None,
            Self::Loaded { crimes, .. } => Some(crimes),
            Self::Failed { previous, .. } => previous.as_ref(),
        }
    }

    /// The first `max` records when data is present and the error flag is
    /// clear; empty otherwise.
    #[must_use]
    pub fn usable_crimes(&self, max: usize) -> &[StreetCrime] {
        match self {
            Self::Loaded { crimes, .. } => &crimes[..crimes.len().min(max)],
            Self::Pending | Self::Failed { .. } => &[],
        }
    }
}

#[derive(Default)]
struct Entry {
    state: FetchState,
    last_started: Option<Instant>,
    in_flight: Arc<AtomicBool>,
}

/// Marks a key as being fetched; clears the mark when dropped, including
/// when the revalidation future is cancelled mid-fetch.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn start(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::Release);
        Self(Arc::clone(flag))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Per-URL cache of feed results.
#[derive(Default)]
pub struct FeedCache {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl FeedCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state for `key`, [`FetchState::Pending`] when the
    /// key was never requested.
    pub async fn get(&self, key: &str) -> FetchState {
        self.entries
            .read()
            .await
            .get(key)
            .map(|e| e.state.clone())
            .unwrap_or_default()
    }

    /// Fetches `feed` through `source` and stores the outcome.
    ///
    /// Returns the cached state without fetching when a revalidation for the
    /// same URL is in flight or started less than
    /// [`FeedDefinition::dedupe_interval_ms`] ago.
    pub async fn revalidate(&self, source: &dyn CrimeSource, feed: &FeedDefinition) -> FetchState {
        let key = feed.request_url();
        let dedupe = Duration::from_millis(feed.dedupe_interval_ms);

        let in_flight = {
            let mut entries = self.entries.write().await;
            let entry = entries.entry(key.clone()).or_default();

            let recent = entry
                .last_started
                .is_some_and(|started| started.elapsed() < dedupe);
            if entry.in_flight.load(Ordering::Acquire) || recent {
                log::debug!("[{}] Revalidation deduplicated", feed.id);
                return entry.state.clone();
            }

            entry.last_started = Some(Instant::now());
            InFlight::start(&entry.in_flight)
        };

        let result = source.fetch(feed).await;

        let mut entries = self.entries.write().await;
        let entry = entries.entry(key).or_default();
        drop(in_flight);

        entry.state = match result {
            Ok(crimes) => FetchState::Loaded {
                crimes: Arc::new(crimes),
                fetched_at: Utc::now(),
            },
            Err(e) => {
                log::error!("[{}] Fetch failed via {}: {e}", feed.id, source.id());
                FetchState::Failed {
                    error: e.to_string(),
                    previous: entry.state.data().cloned(),
                }
            }
        };

        entry.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use crime_cluster_crime_models::{Location, Street};

    use super::*;
    use crate::SourceError;
    use crate::feed_def::parse_feed_toml;

    struct FakeSource {
        calls: AtomicUsize,
        fail_from_call: usize,
        records: usize,
        delay: Duration,
    }

    impl FakeSource {
        const fn new(records: usize, fail_from_call: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_from_call,
                records,
                delay: Duration::ZERO,
            }
        }

        const fn slow(records: usize, delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new(records, usize::MAX)
            }
        }
    }

    fn crime(id: i64) -> StreetCrime {
        StreetCrime {
            id,
            category: "burglary".to_string(),
            persistent_id: String::new(),
            month: "2019-10".to_string(),
            location: Location {
                latitude: "52.63".to_string(),
                longitude: "-1.13".to_string(),
                street: Street {
                    id: 1,
                    name: "On or near High Street".to_string(),
                },
            },
            location_type: None,
            location_subtype: None,
            context: None,
            outcome_status: None,
        }
    }

    #[async_trait]
    impl CrimeSource for FakeSource {
        fn id(&self) -> &str {
            "fake"
        }

        async fn fetch(&self, _feed: &FeedDefinition) -> Result<Vec<StreetCrime>, SourceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if call >= self.fail_from_call {
                return Err(SourceError::Status {
                    status: 503,
                    url: "https://example.invalid".to_string(),
                });
            }
            Ok((0..self.records)
                .map(|i| crime(i64::try_from(i).unwrap()))
                .collect())
        }
    }

    fn feed(dedupe_interval_ms: u64) -> FeedDefinition {
        let mut feed = parse_feed_toml(
            r#"
            id = "test"
            name = "Test"
            api_url = "https://data.police.uk/api"
            latitude = 52.629729
            longitude = -1.131592
            month = "2019-10"
            "#,
        )
        .unwrap();
        feed.dedupe_interval_ms = dedupe_interval_ms;
        feed
    }

    #[tokio::test]
    async fn unknown_key_is_pending_and_renders_nothing() {
        let cache = FeedCache::new();
        let state = cache.get("nope").await;
        assert!(matches!(state, FetchState::Pending));
        assert!(state.usable_crimes(2000).is_empty());
    }

    #[tokio::test]
    async fn loaded_state_is_truncated_to_max() {
        let cache = FeedCache::new();
        let source = FakeSource::new(2500, usize::MAX);
        let feed = feed(0);

        let state = cache.revalidate(&source, &feed).await;
        assert_eq!(state.name(), "loaded");
        assert_eq!(state.usable_crimes(2000).len(), 2000);
        assert_eq!(state.usable_crimes(2000)[0].id, 0);
        assert_eq!(cache.get(&feed.request_url()).await.usable_crimes(10).len(), 10);
    }

    #[tokio::test]
    async fn repeated_revalidation_is_deduplicated() {
        let cache = FeedCache::new();
        let source = FakeSource::new(3, usize::MAX);
        let feed = feed(60_000);

        cache.revalidate(&source, &feed).await;
        let state = cache.revalidate(&source, &feed).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.usable_crimes(2000).len(), 3);
    }

    #[tokio::test]
    async fn failure_raises_error_flag_and_keeps_previous_data() {
        let cache = FeedCache::new();
        let source = FakeSource::new(3, 1);
        let feed = feed(0);

        cache.revalidate(&source, &feed).await;
        let state = cache.revalidate(&source, &feed).await;

        assert!(state.is_error());
        assert_eq!(state.data().map(|d| d.len()), Some(3));
        assert!(state.usable_crimes(2000).is_empty());
    }

    #[tokio::test]
    async fn failure_without_previous_data() {
        let cache = FeedCache::new();
        let source = FakeSource::new(3, 0);
        let state = cache.revalidate(&source, &feed(0)).await;

        assert!(state.is_error());
        assert!(state.data().is_none());
    }

    #[tokio::test]
    async fn concurrent_revalidation_fetches_once() {
        let cache = FeedCache::new();
        let source = FakeSource::slow(3, Duration::from_millis(50));
        let feed = feed(0);

        let (a, b) = tokio::join!(
            cache.revalidate(&source, &feed),
            cache.revalidate(&source, &feed)
        );

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        let mut names = [a.name(), b.name()];
        names.sort_unstable();
        assert_eq!(names, ["loaded", "pending"]);
    }

    #[tokio::test]
    async fn cancelled_revalidation_does_not_block_later_fetches() {
        let cache = FeedCache::new();
        let source = FakeSource::slow(3, Duration::from_millis(200));
        let feed = feed(0);

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), cache.revalidate(&source, &feed))
                .await;
        assert!(cancelled.is_err());
        assert!(matches!(cache.get(&feed.request_url()).await, FetchState::Pending));

        let state = cache.revalidate(&source, &feed).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(state.name(), "loaded");
        assert_eq!(state.usable_crimes(2000).len(), 3);
    }
}
