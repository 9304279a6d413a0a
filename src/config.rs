use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::model::FeedDescriptor;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Refresh interval in minutes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    /// Address the HTTP server listens on
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub proxy: ProxyConfig,
    pub feeds: Vec<FeedConfig>,
}

fn default_refresh_interval() -> u64 {
    15
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

/// How feeds are fetched: through `GET {endpoint}/api/news?url=...`.
#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    /// Base URL of the feed-fetch proxy; unset means this server's own route
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on feeds fetched at once by one aggregation
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrency() -> usize {
    8
}

fn default_user_agent() -> String {
    "Newsdesk/1.0 (RSS Aggregator)".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

impl ProxyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub url: String,
    /// Display category; feeds without one land in the catch-all bucket
    #[serde(default)]
    pub category: Option<String>,
}

impl FeedConfig {
    pub fn descriptor(&self) -> FeedDescriptor {
        FeedDescriptor::new(self.url.clone(), self.category.clone().unwrap_or_default())
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Proxy base URL: the configured one, else this server's own listener.
    pub fn proxy_endpoint(&self) -> String {
        self.proxy
            .endpoint
            .clone()
            .unwrap_or_else(|| local_endpoint(&self.bind))
    }

    /// Feed descriptors in file order.
    pub fn descriptors(&self) -> Vec<FeedDescriptor> {
        self.feeds.iter().map(FeedConfig::descriptor).collect()
    }
}

/// URL a client on this host uses to reach a listener bound to `bind`.
fn local_endpoint(bind: &str) -> String {
    match bind.parse::<SocketAddr>() {
        Ok(addr) if addr.ip().is_unspecified() => {
            let loopback = match addr {
                SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            };
            format!("http://{}", SocketAddr::new(loopback, addr.port()))
        }
        Ok(addr) => format!("http://{}", addr),
        Err(_) => format!("http://{}", bind),
    }
}
