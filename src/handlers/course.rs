// src/handlers/course.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        course::{
            COURSE_COLUMNS, Course, CourseDetailResponse, CourseListParams, CreateCourseRequest,
            UpdateCourseRequest, UpdateProgressRequest,
        },
        pagination::{Page, Paginated},
    },
    utils::jwt::AuthUser,
};

async fn fetch_published_course(pool: &PgPool, id: i64) -> Result<Course, AppError> {
    sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1 AND is_published = TRUE"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Course not found".to_string()))
}

pub async fn list_courses(
    State(pool): State<PgPool>,
    Query(params): Query<CourseListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = Page::new(params.page, params.limit);
    let pattern = params.q.as_deref().map(|q| format!("%{}%", q.trim()));

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM courses
         WHERE is_published = TRUE
           AND ($1::TEXT IS NULL OR category = $1)
           AND ($2::TEXT IS NULL OR title ILIKE $2)",
    )
    .bind(params.category.as_deref())
    .bind(pattern.as_deref())
    .fetch_one(&pool)
    .await?;

    let courses = sqlx::query_as::<_, Course>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses
         WHERE is_published = TRUE
           AND ($1::TEXT IS NULL OR category = $1)
           AND ($2::TEXT IS NULL OR title ILIKE $2)
         ORDER BY created_at DESC, id DESC
         LIMIT $3 OFFSET $4"
    ))
    .bind(params.category.as_deref())
    .bind(pattern.as_deref())
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(Paginated::new(courses, total, page)))
}

/// Course detail with the instructor's name and the number of enrolled students.
pub async fn get_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_published_course(&pool, id).await?;

    let (instructor_name, enrollment_count): (Option<String>, i64) = sqlx::query_as(
        "SELECT
            (SELECT name FROM users WHERE id = $1),
            (SELECT COUNT(*) FROM enrollments WHERE course_id = $2)",
    )
    .bind(course.instructor_id)
    .bind(course.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(CourseDetailResponse {
        course,
        instructor_name,
        enrollment_count,
    }))
}

/// Enrolls the caller in a published course.
pub async fn enroll(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = fetch_published_course(&pool, id).await?;

    sqlx::query("INSERT INTO enrollments (user_id, course_id) VALUES ($1, $2)")
        .bind(user.id)
        .bind(course.id)
        .execute(&pool)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "Already enrolled in this course"))?;

    tracing::info!(user_id = user.id, course_id = course.id, "enrolled");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "course_id": course.id, "progress": 0 })),
    ))
}

/// Sets the caller's progress (0..=100) in a course they are enrolled in.
pub async fn update_progress(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let progress: i32 = sqlx::query_scalar(
        "UPDATE enrollments SET progress = $1 WHERE user_id = $2 AND course_id = $3 RETURNING progress",
    )
    .bind(payload.progress)
    .bind(user.id)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Not enrolled in this course".to_string()))?;

    Ok(Json(json!({ "course_id": id, "progress": progress })))
}

/// Staff roles.
pub async fn create_course(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let course = sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (title, description, category, instructor_id, price_cents, thumbnail_url, is_published)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {COURSE_COLUMNS}"
    ))
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.category.trim())
    .bind(payload.instructor_id)
    .bind(payload.price_cents)
    .bind(payload.thumbnail_url.as_deref())
    .bind(payload.is_published)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create course: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn update_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let course = sqlx::query_as::<_, Course>(&format!(
        "UPDATE courses SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            category = COALESCE($3, category),
            instructor_id = COALESCE($4, instructor_id),
            price_cents = COALESCE($5, price_cents),
            thumbnail_url = COALESCE($6, thumbnail_url),
            is_published = COALESCE($7, is_published),
            updated_at = NOW()
         WHERE id = $8
         RETURNING {COURSE_COLUMNS}"
    ))
    .bind(payload.title.as_deref().map(str::trim))
    .bind(payload.description.as_deref())
    .bind(payload.category.as_deref().map(str::trim))
    .bind(payload.instructor_id)
    .bind(payload.price_cents)
    .bind(payload.thumbnail_url.as_deref())
    .bind(payload.is_published)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Course not found".to_string()))?;

    Ok(Json(course))
}

pub async fn delete_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
