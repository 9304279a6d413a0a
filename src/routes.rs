use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::validate_feed_url;
use crate::display::{category_views, CategoryView};
use crate::error::{FetchCause, FetchError, ValidationError};
use crate::model::CategoryMapping;
use crate::refresh::Refresher;

pub struct AppState {
    pub refresher: Arc<Refresher>,
    /// Client the `/api/news` proxy uses to reach feed publishers
    pub upstream: reqwest::Client,
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub categories: Vec<CategoryView>,
    pub fetched_at: String,
    pub refreshing: bool,
}

#[derive(Template)]
#[template(path = "refresh_button.html")]
pub struct RefreshButtonTemplate {
    pub refreshing: bool,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadGateway(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code(), format!("Error: {}", self)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError::BadGateway(err.to_string())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/categories", get(categories))
        .route("/api/news", get(news_proxy))
        .route("/refresh", post(refresh))
        .route("/refresh/status", get(refresh_status))
        .route("/health", get(health))
        .with_state(state)
}

/// Latest mapping, or empty buckets for every category before the first run.
async fn current_mapping(state: &AppState) -> (u64, Option<DateTime<Utc>>, CategoryMapping) {
    match state.refresher.latest().await {
        Some(snapshot) => (
            snapshot.generation,
            Some(snapshot.fetched_at),
            snapshot.categories.clone(),
        ),
        None => (
            0,
            None,
            CategoryMapping::from_descriptors(state.refresher.descriptors()),
        ),
    }
}

#[derive(Deserialize)]
pub struct IndexQuery {
    /// Link to highlight as the one currently being read
    #[serde(default)]
    pub active: Option<String>,
}

// Route handlers
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IndexQuery>,
) -> impl IntoResponse {
    let (_, fetched_at, mapping) = current_mapping(&state).await;

    HtmlTemplate(IndexTemplate {
        categories: category_views(&mapping, query.active.as_deref()),
        fetched_at: fetched_at
            .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_default(),
        refreshing: state.refresher.is_refreshing(),
    })
}

#[derive(Serialize)]
pub struct CategoriesResponse {
    pub generation: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    pub categories: CategoryMapping,
}

pub async fn categories(State(state): State<Arc<AppState>>) -> Json<CategoriesResponse> {
    let (generation, fetched_at, categories) = current_mapping(&state).await;
    Json(CategoriesResponse {
        generation,
        fetched_at,
        categories,
    })
}

#[derive(Deserialize)]
pub struct NewsQuery {
    #[serde(default)]
    pub url: String,
}

/// Feed-fetch proxy: returns the document at `url` as text.
///
/// Only URLs of configured feeds are fetched, so the route cannot be used
/// to reach arbitrary hosts.
pub async fn news_proxy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let target = validate_feed_url(&query.url)?;
    let url = query.url.trim();
    if !is_configured_feed(&state.refresher, url) {
        return Err(AppError::Forbidden(format!("{} is not a configured feed", url)));
    }

    let response = state
        .upstream
        .get(target)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::new(url, FetchCause::HttpStatus(status.as_u16())).into());
    }

    let body = response
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    Ok((
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        body,
    ))
}

fn is_configured_feed(refresher: &Refresher, url: &str) -> bool {
    refresher
        .descriptors()
        .iter()
        .any(|descriptor| descriptor.url.trim() == url)
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // Spawn the refresh task
    let refresher = state.refresher.clone();
    tokio::spawn(async move {
        refresher.refresh().await;
    });

    // Return refreshing state immediately
    HtmlTemplate(RefreshButtonTemplate { refreshing: true })
}

pub async fn refresh_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let refreshing = state.refresher.is_refreshing();
    HtmlTemplate(RefreshButtonTemplate { refreshing })
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
