// src/handlers/notification.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgExecutor, PgPool};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        notification::{BroadcastRequest, NOTIFICATION_COLUMNS, Notification, NotificationListParams},
        pagination::{Page, Paginated},
    },
    utils::jwt::AuthUser,
};

/// Inserts one notification. Runs on a pool or inside a caller's transaction.
pub async fn notify_user<'e, E>(
    executor: E,
    user_id: i64,
    title: &str,
    message: &str,
    kind: &str,
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query("INSERT INTO notifications (user_id, title, message, kind) VALUES ($1, $2, $3, $4)")
        .bind(user_id)
        .bind(title)
        .bind(message)
        .bind(kind)
        .execute(executor)
        .await?;
    Ok(())
}

/// Lists the caller's notifications, newest first.
pub async fn list_notifications(
    State(pool): State<PgPool>,
    user: AuthUser,
    Query(params): Query<NotificationListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = Page::new(params.page, params.limit);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE)",
    )
    .bind(user.id)
    .bind(params.unread_only)
    .fetch_one(&pool)
    .await?;

    let items = sqlx::query_as::<_, Notification>(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE)
         ORDER BY created_at DESC, id DESC
         LIMIT $3 OFFSET $4"
    ))
    .bind(user.id)
    .bind(params.unread_only)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(Paginated::new(items, total, page)))
}

pub async fn unread_count(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE")
            .bind(user.id)
            .fetch_one(&pool)
            .await?;

    Ok(Json(json!({ "unread": count })))
}

/// Marks one of the caller's notifications as read.
pub async fn mark_read(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let notification = sqlx::query_as::<_, Notification>(&format!(
        "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2
         RETURNING {NOTIFICATION_COLUMNS}"
    ))
    .bind(id)
    .bind(user.id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Notification not found".to_string()))?;

    Ok(Json(notification))
}

/// Marks every unread notification of the caller as read. Other users' rows are untouched.
pub async fn mark_all_read(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let updated = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE")
        .bind(user.id)
        .execute(&pool)
        .await?
        .rows_affected();

    Ok(Json(json!({ "updated": updated })))
}

pub async fn delete_notification(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Sends a notification to every active user, or to every active user of one role.
/// Admin only. Returns how many notifications were created.
pub async fn broadcast(
    State(pool): State<PgPool>,
    Json(payload): Json<BroadcastRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let role = payload.role.map(|r| r.as_str());
    let sent = sqlx::query(
        "INSERT INTO notifications (user_id, title, message, kind)
         SELECT id, $1, $2, 'announcement' FROM users
         WHERE is_active = TRUE AND ($3::TEXT IS NULL OR role = $3)",
    )
    .bind(&payload.title)
    .bind(&payload.message)
    .bind(role)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to broadcast notification: {:?}", e);
        AppError::from(e)
    })?
    .rows_affected();

    tracing::info!(sent, role = ?role, "broadcast sent");

    Ok((StatusCode::CREATED, Json(json!({ "sent": sent }))))
}
