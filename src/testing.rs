//! In-memory fetcher and reporter used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::aggregator::{ErrorReporter, FeedFailure};
use crate::client::FeedFetcher;
use crate::error::{ErrorKind, FeedError, FetchCause, FetchError};

pub fn rss(titles: &[&str]) -> String {
    let items: String = titles
        .iter()
        .map(|t| format!("<item><title>{t}</title><link>https://example.com/{t}</link></item>"))
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel>{items}</channel></rss>"#)
}

enum Reply {
    Payload(String),
    Status(u16),
}

/// Serves canned payloads by URL after an optional delay.
#[derive(Default)]
pub struct StubFetcher {
    replies: HashMap<String, (Reply, Duration)>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(mut self, url: &str, body: impl Into<String>) -> Self {
        self.replies
            .insert(url.to_string(), (Reply::Payload(body.into()), Duration::ZERO));
        self
    }

    pub fn delayed(mut self, url: &str, body: impl Into<String>, delay: Duration) -> Self {
        self.replies
            .insert(url.to_string(), (Reply::Payload(body.into()), delay));
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        self.replies
            .insert(url.to_string(), (Reply::Status(status), Duration::ZERO));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = match self.replies.get(url) {
            Some((reply, delay)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                match reply {
                    Reply::Payload(body) => Ok(body.clone()),
                    Reply::Status(code) => {
                        Err(FetchError::new(url, FetchCause::HttpStatus(*code)).into())
                    }
                }
            }
            None => Err(FetchError::new(url, FetchCause::HttpStatus(404)).into()),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Records every reported failure as `(url, category, kind)`.
#[derive(Default)]
pub struct CollectingReporter {
    failures: Mutex<Vec<(String, String, ErrorKind)>>,
}

impl CollectingReporter {
    pub fn failures(&self) -> Vec<(String, String, ErrorKind)> {
        self.failures.lock().unwrap().clone()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, failure: &FeedFailure<'_>) {
        self.failures.lock().unwrap().push((
            failure.url.to_string(),
            failure.category.to_string(),
            failure.kind(),
        ));
    }
}
