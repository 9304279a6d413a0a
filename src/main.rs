use std::sync::Arc;

use newsdesk::config::Config;
use newsdesk::refresh::{start_background_refresh, Refresher};
use newsdesk::routes::{self, AppState};
use newsdesk::{Aggregator, FeedClient};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsdesk=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("NEWSDESK_CONFIG").unwrap_or_else(|_| "feeds.toml".to_string());
    let config = Config::load(&config_path)?;
    info!("Loaded {} feeds from {}", config.feeds.len(), config_path);

    let client = FeedClient::new(&config)?;
    let aggregator = Aggregator::new(client).with_max_concurrency(config.proxy.max_concurrency);
    let refresher = Arc::new(Refresher::new(aggregator, config.descriptors()));

    let upstream = reqwest::Client::builder()
        .timeout(config.proxy.timeout())
        .user_agent(config.proxy.user_agent.as_str())
        .build()?;

    let state = Arc::new(AppState {
        refresher: refresher.clone(),
        upstream,
    });

    let app = routes::router(state)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    // Bind before the first refresh so the proxy route is reachable
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Server starting on http://{}", config.bind);

    tokio::spawn(start_background_refresh(refresher, config.refresh_interval));

    axum::serve(listener, app).await?;

    Ok(())
}
