use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::aggregator::Aggregator;
use crate::client::{FeedClient, FeedFetcher};
use crate::model::{CategoryMapping, FeedDescriptor};

/// Output of one finished aggregation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub generation: u64,
    pub fetched_at: DateTime<Utc>,
    pub categories: CategoryMapping,
}

/// Runs aggregations over a fixed descriptor list and keeps the newest
/// result. Each run takes a generation ticket; a run that finishes after a
/// newer one has been published is discarded.
pub struct Refresher<F = FeedClient> {
    aggregator: Aggregator<F>,
    descriptors: Vec<FeedDescriptor>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
    latest: RwLock<Option<Arc<Snapshot>>>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<F: FeedFetcher> Refresher<F> {
    pub fn new(aggregator: Aggregator<F>, descriptors: Vec<FeedDescriptor>) -> Self {
        Self {
            aggregator,
            descriptors,
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            latest: RwLock::new(None),
        }
    }

    pub fn descriptors(&self) -> &[FeedDescriptor] {
        &self.descriptors
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub async fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest.read().await.clone()
    }

    /// Hands out the next generation ticket.
    pub fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Stores `categories` unless a newer generation is already published.
    /// Returns whether the snapshot was applied.
    pub async fn publish(&self, generation: u64, categories: CategoryMapping) -> bool {
        let mut latest = self.latest.write().await;

        if let Some(current) = latest.as_ref() {
            if current.generation > generation {
                debug!(
                    generation = generation,
                    current = current.generation,
                    "Discarding superseded aggregation"
                );
                return false;
            }
        }

        *latest = Some(Arc::new(Snapshot {
            generation,
            fetched_at: Utc::now(),
            categories,
        }));
        true
    }

    /// Aggregates every descriptor once and publishes the result.
    ///
    /// Dropping the returned future abandons the run; nothing is published.
    pub async fn refresh(&self) -> bool {
        let generation = self.begin();
        let _guard = InFlight::enter(&self.in_flight);

        info!(
            generation = generation,
            feeds = self.descriptors.len(),
            "Refreshing feeds"
        );
        let categories = self.aggregator.aggregate(&self.descriptors).await;

        self.publish(generation, categories).await
    }
}

/// Interval between scheduled refreshes, at least one minute.
fn refresh_period(interval_minutes: u64) -> Duration {
    Duration::from_secs(interval_minutes.max(1).saturating_mul(60))
}

pub async fn start_background_refresh<F: FeedFetcher>(
    refresher: Arc<Refresher<F>>,
    interval_minutes: u64,
) {
    let interval = refresh_period(interval_minutes);

    info!("Starting initial feed fetch");
    refresher.refresh().await;

    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled feed refresh");
        refresher.refresh().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{rss, StubFetcher};

    fn mapping_with(category: &str, titles: &[&str]) -> CategoryMapping {
        let mut mapping = CategoryMapping::new();
        mapping.extend(
            category,
            crate::parser::parse(&rss(titles)).unwrap(),
        );
        mapping
    }

    fn refresher(fetcher: StubFetcher, descriptors: Vec<FeedDescriptor>) -> Refresher<StubFetcher> {
        Refresher::new(Aggregator::new(fetcher), descriptors)
    }

    mod publish_tests {
        use super::*;

        #[tokio::test]
        async fn test_nothing_published_initially() {
            let refresher = refresher(StubFetcher::new(), Vec::new());
            assert!(refresher.latest().await.is_none());
            assert!(!refresher.is_refreshing());
        }

        #[tokio::test]
        async fn test_generations_increase() {
            let refresher = refresher(StubFetcher::new(), Vec::new());
            let first = refresher.begin();
            let second = refresher.begin();
            assert!(second > first);
        }

        #[tokio::test]
        async fn test_superseded_run_does_not_overwrite_newer() {
            let refresher = refresher(StubFetcher::new(), Vec::new());
            let older = refresher.begin();
            let newer = refresher.begin();

            assert!(refresher.publish(newer, mapping_with("New", &["fresh"])).await);
            assert!(!refresher.publish(older, mapping_with("Old", &["stale"])).await);

            let latest = refresher.latest().await.unwrap();
            assert_eq!(latest.generation, newer);
            assert!(latest.categories.contains("New"));
            assert!(!latest.categories.contains("Old"));
        }

        #[tokio::test]
        async fn test_older_run_applies_while_newer_is_pending() {
            let refresher = refresher(StubFetcher::new(), Vec::new());
            let older = refresher.begin();
            let newer = refresher.begin();

            assert!(refresher.publish(older, mapping_with("Old", &["a"])).await);
            assert!(refresher.publish(newer, mapping_with("New", &["b"])).await);

            assert_eq!(refresher.latest().await.unwrap().generation, newer);
        }
    }

    mod refresh_tests {
        use super::*;

        #[test]
        fn test_refresh_period() {
            assert_eq!(refresh_period(0), Duration::from_secs(60));
            assert_eq!(refresh_period(15), Duration::from_secs(15 * 60));
            assert_eq!(refresh_period(u64::MAX), Duration::from_secs(u64::MAX));
        }

        #[tokio::test]
        async fn test_refresh_publishes_mapping() {
            let fetcher = StubFetcher::new().payload("https://a.example.com/rss", rss(&["a"]));
            let refresher = refresher(
                fetcher,
                vec![FeedDescriptor::new("https://a.example.com/rss", "Tech")],
            );

            assert!(refresher.refresh().await);

            let latest = refresher.latest().await.unwrap();
            assert_eq!(latest.generation, 1);
            assert_eq!(latest.categories.get("Tech").unwrap().len(), 1);
            assert!(!refresher.is_refreshing());
        }

        #[tokio::test]
        async fn test_abandoned_refresh_publishes_nothing() {
            let fetcher = StubFetcher::new().delayed(
                "https://slow.example.com/rss",
                rss(&["late"]),
                Duration::from_secs(5),
            );
            let refresher = refresher(
                fetcher,
                vec![FeedDescriptor::new("https://slow.example.com/rss", "Slow")],
            );

            let abandoned =
                tokio::time::timeout(Duration::from_millis(50), refresher.refresh()).await;

            assert!(abandoned.is_err());
            assert!(refresher.latest().await.is_none());
            assert!(!refresher.is_refreshing());
        }

        #[tokio::test]
        async fn test_is_refreshing_during_run() {
            let fetcher = StubFetcher::new().delayed(
                "https://slow.example.com/rss",
                rss(&["x"]),
                Duration::from_millis(200),
            );
            let refresher = Arc::new(refresher(
                fetcher,
                vec![FeedDescriptor::new("https://slow.example.com/rss", "Slow")],
            ));

            let running = refresher.clone();
            let handle = tokio::spawn(async move { running.refresh().await });

            tokio::time::sleep(Duration::from_millis(50)).await;
            assert!(refresher.is_refreshing());

            assert!(handle.await.unwrap());
            assert!(!refresher.is_refreshing());
        }
    }
}
