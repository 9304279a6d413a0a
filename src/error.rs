use std::fmt;

use thiserror::Error;

/// A feed URL was rejected before any request was made.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("feed URL is empty")]
    Empty,
    #[error("feed URL {url:?} is not valid: {source}")]
    Malformed {
        url: String,
        source: url::ParseError,
    },
    #[error("unsupported scheme {scheme:?} in feed URL {url:?} (only http/https allowed)")]
    UnsupportedScheme { url: String, scheme: String },
}

/// Why a request to the proxy did not produce a payload.
#[derive(Debug, Error)]
pub enum FetchCause {
    /// Connection, TLS or body read failure
    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    /// Proxy answered with a non-2xx status
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
}

#[derive(Debug, Error)]
#[error("failed to fetch {url}: {cause}")]
pub struct FetchError {
    pub url: String,
    #[source]
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(url: impl Into<String>, cause: FetchCause) -> Self {
        Self {
            url: url.into(),
            cause,
        }
    }

    pub fn from_reqwest(url: impl Into<String>, err: reqwest::Error) -> Self {
        let cause = if err.is_timeout() {
            FetchCause::Timeout
        } else if let Some(status) = err.status() {
            FetchCause::HttpStatus(status.as_u16())
        } else {
            FetchCause::Network(err)
        };
        Self::new(url, cause)
    }
}

/// The payload could not be read as a feed document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("feed payload is empty")]
    EmptyPayload,
    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },
    #[error("document ended inside <{element}>")]
    UnexpectedEof { element: String },
    #[error("document has no root element")]
    NoRootElement,
}

/// Any failure of the fetch-then-parse pipeline for one feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Fetch(_) => ErrorKind::Fetch,
            Self::Parse(_) => ErrorKind::Parse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Fetch,
    Parse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Fetch => "fetch",
            Self::Parse => "parse",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
