// src/models/blog.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::utils::validation::validate_tags;

pub const BLOG_COLUMNS: &str = "id, slug, title, excerpt, content, tags, author_id, is_published, \
     views, published_at, created_at, updated_at";

/// Represents the 'blog_posts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BlogPost {
    pub id: i64,
    /// Unique URL key.
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    /// Sanitized HTML.
    pub content: String,
    pub tags: Json<Vec<String>>,
    pub author_id: Option<i64>,
    pub is_published: bool,
    /// Read counter, incremented on every public read.
    pub views: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List item without the body.
#[derive(Debug, Serialize, FromRow)]
pub struct BlogSummary {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub tags: Json<Vec<String>>,
    pub views: i64,
    pub published_at: Option<DateTime<Utc>>,
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBlogRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 chars"
    ))]
    pub title: String,

    /// Derived from the title when omitted.
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,

    #[validate(length(max = 500))]
    pub excerpt: Option<String>,

    #[validate(length(
        min = 1,
        max = 100000,
        message = "Content length must be between 1 and 100000 chars"
    ))]
    pub content: String,

    #[validate(custom(function = validate_tags))]
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBlogRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
    #[validate(length(max = 500))]
    pub excerpt: Option<String>,
    #[validate(length(min = 1, max = 100000))]
    pub content: Option<String>,
    #[validate(custom(function = validate_tags))]
    pub tags: Option<Vec<String>>,
    pub is_published: Option<bool>,
}

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct BlogListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub tag: Option<String>,
    /// Search keyword for title match.
    pub q: Option<String>,
}
