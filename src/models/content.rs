// src/models/content.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validation::validate_url_string;

pub const CURRENT_AFFAIR_COLUMNS: &str =
    "id, title, summary, content, category, source_url, published_on, created_at";

pub const DOWNLOAD_COLUMNS: &str =
    "id, title, description, category, file_url, download_count, created_at";

/// Represents the 'current_affairs' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CurrentAffair {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    pub source_url: Option<String>,
    pub published_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Represents the 'downloads' table (study material PDFs and the like).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Download {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub file_url: String,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCurrentAffairRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub summary: String,
    #[validate(length(min = 1, max = 50000))]
    pub content: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub source_url: Option<String>,
    /// Defaults to today.
    pub published_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDownloadRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[validate(length(min = 1, max = 500), custom(function = validate_url_string))]
    pub file_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CurrentAffairListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    /// Inclusive lower bound on `published_on`.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on `published_on`.
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
}
