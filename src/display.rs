//! View models for the HTML page.
//!
//! Dates are interpreted here, at render time, never in the parser.

use chrono::DateTime;

use crate::model::{Article, CategoryMapping};

pub const INVALID_DATE: &str = "Invalid Date";
pub const UNTITLED: &str = "No Title";

/// Formats a raw feed date (RFC 2822 or RFC 3339) in the publisher's offset.
pub fn format_published(raw: &str) -> String {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| INVALID_DATE.to_string())
}

pub struct ArticleView {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: String,
    pub source: String,
    pub active: bool,
}

impl ArticleView {
    /// `active_link` is the link the caller is currently showing, if any.
    pub fn new(article: &Article, active_link: Option<&str>) -> Self {
        let title = if article.title.is_empty() {
            UNTITLED.to_string()
        } else {
            article.title.clone()
        };
        let active = !article.link.is_empty() && active_link == Some(article.link.as_str());

        Self {
            title,
            link: article.link.clone(),
            description: article.description.clone(),
            published: format_published(&article.published_at),
            source: article.source.clone(),
            active,
        }
    }
}

pub struct CategoryView {
    pub name: String,
    pub anchor: String,
    pub articles: Vec<ArticleView>,
}

pub fn category_views(mapping: &CategoryMapping, active_link: Option<&str>) -> Vec<CategoryView> {
    mapping
        .categories()
        .iter()
        .enumerate()
        .map(|(index, category)| CategoryView {
            name: category.name.clone(),
            anchor: format!("category-{}", index),
            articles: category
                .articles
                .iter()
                .map(|article| ArticleView::new(article, active_link))
                .collect(),
        })
        .collect()
}
