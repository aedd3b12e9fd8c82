// src/handlers/task.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::notification::notify_user,
    models::{
        pagination::{Page, Paginated},
        task::{CreateTaskRequest, TASK_COLUMNS, Task, TaskListParams, TaskPriority, UpdateTaskRequest},
    },
    utils::{
        jwt::AuthUser,
        role::{MENTOR_ROLES, STAFF_ROLES},
    },
};

async fn fetch_task(pool: &PgPool, id: i64) -> Result<Task, AppError> {
    sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Task not found".to_string()))
}

/// Tasks assigned to or created by the caller.
pub async fn list_tasks(
    State(pool): State<PgPool>,
    user: AuthUser,
    Query(params): Query<TaskListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = Page::new(params.page, params.limit);
    let status = params.status.map(|s| s.as_str());

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tasks
         WHERE (assignee_id = $1 OR created_by = $1) AND ($2::TEXT IS NULL OR status = $2)",
    )
    .bind(user.id)
    .bind(status)
    .fetch_one(&pool)
    .await?;

    let tasks = sqlx::query_as::<_, Task>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE (assignee_id = $1 OR created_by = $1) AND ($2::TEXT IS NULL OR status = $2)
         ORDER BY due_date ASC NULLS LAST, id DESC
         LIMIT $3 OFFSET $4"
    ))
    .bind(user.id)
    .bind(status)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(Paginated::new(tasks, total, page)))
}

/// Creates a task for the caller, or for someone else when the caller is staff
/// or a mentor. Another assignee is notified.
pub async fn create_task(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let assignee_id = payload.assignee_id.unwrap_or(user.id);
    let delegated = assignee_id != user.id;
    if delegated && !(user.is_any(STAFF_ROLES) || user.is_any(MENTOR_ROLES)) {
        return Err(AppError::Forbidden("You can only create tasks for yourself".to_string()));
    }

    let mut tx = pool.begin().await?;

    if delegated {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(assignee_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(AppError::NotFound("Assignee not found".to_string()));
        }
    }

    let task = sqlx::query_as::<_, Task>(&format!(
        "INSERT INTO tasks (title, description, priority, due_date, assignee_id, created_by)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.priority.unwrap_or(TaskPriority::Medium).as_str())
    .bind(payload.due_date)
    .bind(assignee_id)
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;

    if delegated {
        notify_user(
            &mut *tx,
            assignee_id,
            "New task assigned",
            &format!("You have a new task: {}", task.title),
            "task",
        )
        .await?;
    }

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// The assignee or the creator may update a task.
pub async fn update_task(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let task = fetch_task(&pool, id).await?;
    if task.assignee_id != user.id && task.created_by != user.id {
        return Err(AppError::NotFound("Task not found".to_string()));
    }
    if payload.is_empty() {
        return Ok(Json(task));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE tasks SET updated_at = NOW()");
    if let Some(title) = &payload.title {
        builder.push(", title = ").push_bind(title.trim());
    }
    if let Some(description) = &payload.description {
        builder.push(", description = ").push_bind(description);
    }
    if let Some(status) = payload.status {
        builder.push(", status = ").push_bind(status.as_str());
    }
    if let Some(priority) = payload.priority {
        builder.push(", priority = ").push_bind(priority.as_str());
    }
    if let Some(due_date) = payload.due_date {
        builder.push(", due_date = ").push_bind(due_date);
    }
    builder
        .push(" WHERE id = ")
        .push_bind(id)
        .push(format!(" RETURNING {TASK_COLUMNS}"));

    let updated: Task = builder.build_query_as().fetch_one(&pool).await.map_err(|e| {
        tracing::error!("Failed to update task: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(updated))
}

/// Only the creator may delete a task.
pub async fn delete_task(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let task = fetch_task(&pool, id).await?;
    if task.created_by != user.id {
        if task.assignee_id == user.id {
            return Err(AppError::Forbidden("Only the creator can delete this task".to_string()));
        }
        return Err(AppError::NotFound("Task not found".to_string()));
    }

    sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
