//! Newsdesk - a categorised RSS/Atom aggregator
//!
//! Feeds are fetched concurrently through a feed-fetch proxy, parsed into
//! uniform articles and grouped by category. One broken feed never costs
//! the others their articles.

pub mod aggregator;
pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod model;
pub mod parser;
pub mod refresh;
pub mod routes;

#[cfg(test)]
mod testing;

pub use aggregator::{Aggregator, ErrorReporter, FeedFailure, TracingReporter};
pub use client::{FeedClient, FeedFetcher};
pub use error::{ErrorKind, FeedError, FetchCause, FetchError, ParseError, ValidationError};
pub use model::{Article, CategoryMapping, FeedDescriptor, UNCATEGORIZED};
