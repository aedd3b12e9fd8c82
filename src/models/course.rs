// src/models/course.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validation::validate_url_string;

pub const COURSE_COLUMNS: &str = "id, title, description, category, instructor_id, price_cents, \
     thumbnail_url, is_published, created_at, updated_at";

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub instructor_id: Option<i64>,
    /// Price in the smallest currency unit.
    pub price_cents: i64,
    pub thumbnail_url: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CourseDetailResponse {
    #[serde(flatten)]
    pub course: Course,
    pub instructor_name: Option<String>,
    pub enrollment_count: i64,
}

/// A user's enrollment joined with the course title.
#[derive(Debug, Serialize, FromRow)]
pub struct EnrollmentResponse {
    pub course_id: i64,
    pub title: String,
    pub category: String,
    pub progress: i32,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 10000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    pub instructor_id: Option<i64>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub price_cents: i64,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,
    pub instructor_id: Option<i64>,
    #[validate(range(min = 0))]
    pub price_cents: Option<i64>,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub thumbnail_url: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProgressRequest {
    #[validate(range(min = 0, max = 100))]
    pub progress: i32,
}

#[derive(Debug, Deserialize)]
pub struct CourseListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub q: Option<String>,
}
