// src/handlers/content.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        content::{
            CURRENT_AFFAIR_COLUMNS, CreateCurrentAffairRequest, CreateDownloadRequest, CurrentAffair,
            CurrentAffairListParams, DOWNLOAD_COLUMNS, Download, DownloadListParams,
        },
        pagination::{Page, Paginated},
    },
    utils::html::clean_html,
};

/// Current affairs, newest first. `from` and `to` are inclusive dates.
pub async fn list_current_affairs(
    State(pool): State<PgPool>,
    Query(params): Query<CurrentAffairListParams>,
) -> Result<impl IntoResponse, AppError> {
    if let (Some(from), Some(to)) = (params.from, params.to) {
        if from > to {
            return Err(AppError::BadRequest("'from' must not be after 'to'".to_string()));
        }
    }
    let page = Page::new(params.page, params.limit);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM current_affairs
         WHERE ($1::TEXT IS NULL OR category = $1)
           AND ($2::DATE IS NULL OR published_on >= $2)
           AND ($3::DATE IS NULL OR published_on <= $3)",
    )
    .bind(params.category.as_deref())
    .bind(params.from)
    .bind(params.to)
    .fetch_one(&pool)
    .await?;

    let items = sqlx::query_as::<_, CurrentAffair>(&format!(
        "SELECT {CURRENT_AFFAIR_COLUMNS} FROM current_affairs
         WHERE ($1::TEXT IS NULL OR category = $1)
           AND ($2::DATE IS NULL OR published_on >= $2)
           AND ($3::DATE IS NULL OR published_on <= $3)
         ORDER BY published_on DESC, id DESC
         LIMIT $4 OFFSET $5"
    ))
    .bind(params.category.as_deref())
    .bind(params.from)
    .bind(params.to)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(Paginated::new(items, total, page)))
}

pub async fn get_current_affair(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let item = sqlx::query_as::<_, CurrentAffair>(&format!(
        "SELECT {CURRENT_AFFAIR_COLUMNS} FROM current_affairs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Article not found".to_string()))?;

    Ok(Json(item))
}

/// Staff roles. Content is sanitized; the date defaults to today.
pub async fn create_current_affair(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateCurrentAffairRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let published_on = payload.published_on.unwrap_or_else(|| Utc::now().date_naive());

    let item = sqlx::query_as::<_, CurrentAffair>(&format!(
        "INSERT INTO current_affairs (title, summary, content, category, source_url, published_on)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {CURRENT_AFFAIR_COLUMNS}"
    ))
    .bind(payload.title.trim())
    .bind(payload.summary.trim())
    .bind(clean_html(&payload.content))
    .bind(payload.category.trim())
    .bind(payload.source_url.as_deref())
    .bind(published_on)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create current affair: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn delete_current_affair(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM current_affairs WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Article not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_downloads(
    State(pool): State<PgPool>,
    Query(params): Query<DownloadListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = Page::new(params.page, params.limit);

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM downloads WHERE ($1::TEXT IS NULL OR category = $1)")
            .bind(params.category.as_deref())
            .fetch_one(&pool)
            .await?;

    let items = sqlx::query_as::<_, Download>(&format!(
        "SELECT {DOWNLOAD_COLUMNS} FROM downloads
         WHERE ($1::TEXT IS NULL OR category = $1)
         ORDER BY created_at DESC, id DESC
         LIMIT $2 OFFSET $3"
    ))
    .bind(params.category.as_deref())
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(Paginated::new(items, total, page)))
}

/// Counts a download and hands back the file URL.
pub async fn fetch_download(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let (file_url, download_count): (String, i64) = sqlx::query_as(
        "UPDATE downloads SET download_count = download_count + 1 WHERE id = $1
         RETURNING file_url, download_count",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Download not found".to_string()))?;

    Ok(Json(json!({
        "id": id,
        "file_url": file_url,
        "download_count": download_count,
    })))
}

pub async fn create_download(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateDownloadRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let item = sqlx::query_as::<_, Download>(&format!(
        "INSERT INTO downloads (title, description, category, file_url)
         VALUES ($1, $2, $3, $4)
         RETURNING {DOWNLOAD_COLUMNS}"
    ))
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.category.trim())
    .bind(&payload.file_url)
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn delete_download(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM downloads WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Download not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
