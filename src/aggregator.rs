//! Fan-out of fetch + parse over a descriptor list.
//!
//! Every descriptor is handled independently: a validation, fetch or parse
//! failure empties that descriptor's contribution and is handed to the
//! [`ErrorReporter`], but never reaches the caller of
//! [`Aggregator::aggregate`]. Results are merged in descriptor order, not in
//! completion order.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::client::FeedFetcher;
use crate::error::{ErrorKind, FeedError};
use crate::model::{Article, CategoryMapping, FeedDescriptor};
use crate::parser;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// One contained failure, with enough context to find the broken feed.
#[derive(Debug)]
pub struct FeedFailure<'a> {
    pub url: &'a str,
    pub category: &'a str,
    pub error: &'a FeedError,
}

impl FeedFailure<'_> {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Side channel for per-feed failures.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, failure: &FeedFailure<'_>);
}

/// Logs failures as structured `tracing` warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, failure: &FeedFailure<'_>) {
        warn!(
            url = failure.url,
            category = failure.category,
            kind = %failure.kind(),
            error = %failure.error,
            "Feed skipped"
        );
    }
}

pub struct Aggregator<F> {
    fetcher: F,
    reporter: Arc<dyn ErrorReporter>,
    max_concurrency: usize,
}

impl<F: FeedFetcher> Aggregator<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            reporter: Arc::new(TracingReporter),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Caps how many feeds are in flight at once (at least one).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Fetches and parses every descriptor concurrently and groups the
    /// articles by category.
    ///
    /// Every distinct category of `descriptors` is a key of the result, in
    /// first-occurrence order, even when all of its feeds failed.
    pub async fn aggregate(&self, descriptors: &[FeedDescriptor]) -> CategoryMapping {
        let mut mapping = CategoryMapping::from_descriptors(descriptors);
        if descriptors.is_empty() {
            return mapping;
        }

        let mut outcomes: Vec<(usize, Vec<Article>)> = stream::iter(0..descriptors.len())
            .map(|index| self.indexed(index, &descriptors[index]))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        outcomes.sort_by_key(|(index, _)| *index);
        for (index, articles) in outcomes {
            mapping.extend(descriptors[index].bucket(), articles);
        }

        info!(
            feeds = descriptors.len(),
            categories = mapping.len(),
            articles = mapping.article_count(),
            "Aggregation complete"
        );

        mapping
    }

    /// Fetches and parses one feed, stamping each article with its source.
    pub async fn fetch_articles(
        &self,
        descriptor: &FeedDescriptor,
    ) -> Result<Vec<Article>, FeedError> {
        let payload = self.fetcher.fetch(&descriptor.url).await?;
        let feed = parser::parse_document(&payload)?;

        let source = feed
            .title
            .unwrap_or_else(|| descriptor.url.trim().to_string());

        Ok(feed
            .articles
            .into_iter()
            .map(|mut article| {
                if article.source.is_empty() {
                    article.source = source.clone();
                }
                article
            })
            .collect())
    }

    fn indexed<'a>(
        &'a self,
        index: usize,
        descriptor: &'a FeedDescriptor,
    ) -> BoxFuture<'a, (usize, Vec<Article>)> {
        async move { (index, self.collect(descriptor).await) }.boxed()
    }

    async fn collect(&self, descriptor: &FeedDescriptor) -> Vec<Article> {
        match self.fetch_articles(descriptor).await {
            Ok(articles) => articles,
            Err(error) => {
                self.reporter.report(&FeedFailure {
                    url: &descriptor.url,
                    category: descriptor.bucket(),
                    error: &error,
                });
                Vec::new()
            }
        }
    }
}
