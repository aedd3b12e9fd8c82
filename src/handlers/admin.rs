// src/handlers/admin.rs

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
    models::{
        pagination::{Page, Paginated},
        user::{
            AdminCreateUserRequest, AdminUpdateUserRequest, USER_COLUMNS, User, UserListParams,
            normalize_email,
        },
    },
    utils::{hash::hash_password, jwt::AuthUser},
};

async fn fetch_user(pool: &PgPool, id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Lists users, optionally filtered by role and by a name/email search.
/// Admin only.
pub async fn list_users(
    State(pool): State<PgPool>,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = Page::new(params.page, params.limit);
    let role = params.role.map(|r| r.as_str());
    let pattern = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users
         WHERE ($1::TEXT IS NULL OR role = $1)
           AND ($2::TEXT IS NULL OR name ILIKE $2 OR email ILIKE $2)",
    )
    .bind(role)
    .bind(pattern.as_deref())
    .fetch_one(&pool)
    .await?;

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE ($1::TEXT IS NULL OR role = $1)
           AND ($2::TEXT IS NULL OR name ILIKE $2 OR email ILIKE $2)
         ORDER BY id DESC
         LIMIT $3 OFFSET $4"
    ))
    .bind(role)
    .bind(pattern.as_deref())
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(Paginated::new(users, total, page)))
}

pub async fn get_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_user(&pool, id).await?))
}

/// Creates a user with a specific role.
/// The caller must outrank the role being granted.
pub async fn create_user(
    State(pool): State<PgPool>,
    actor: AuthUser,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if !actor.role.can_manage(payload.role) {
        return Err(AppError::Forbidden(format!(
            "Cannot create a user with role '{}'",
            payload.role
        )));
    }

    let email = normalize_email(&payload.email);
    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (name, email, password, role) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
    ))
    .bind(payload.name.trim())
    .bind(&email)
    .bind(&hashed_password)
    .bind(payload.role.as_str())
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::conflict_on_unique(e, format!("Email '{email}' is already registered")))?;

    tracing::info!(actor = actor.id, user_id = user.id, role = %payload.role, "user created by admin");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Updates user information.
/// The caller must outrank both the user's current role and any new role.
pub async fn update_user(
    State(pool): State<PgPool>,
    actor: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let target = fetch_user(&pool, id).await?;
    if target.id != actor.id && !actor.role.can_manage(target.role()?) {
        return Err(AppError::Forbidden("Cannot modify this user".to_string()));
    }
    if let Some(role) = payload.role {
        if target.id == actor.id || !actor.role.can_manage(role) {
            return Err(AppError::Forbidden(format!("Cannot assign role '{role}'")));
        }
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = NOW()");
    if let Some(name) = &payload.name {
        builder.push(", name = ").push_bind(name.trim());
    }
    if let Some(role) = payload.role {
        builder.push(", role = ").push_bind(role.as_str());
    }
    if let Some(is_active) = payload.is_active {
        builder.push(", is_active = ").push_bind(is_active);
    }
    if let Some(password) = &payload.password {
        builder.push(", password = ").push_bind(hash_password(password)?);
    }
    builder
        .push(" WHERE id = ")
        .push_bind(id)
        .push(format!(" RETURNING {USER_COLUMNS}"));

    let user: User = builder
        .build_query_as()
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update user: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(user))
}

/// Deletes a user. Admins cannot delete themselves.
pub async fn delete_user(
    State(pool): State<PgPool>,
    actor: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == actor.id {
        return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
    }

    let target = fetch_user(&pool, id).await?;
    if !actor.role.can_manage(target.role()?) {
        return Err(AppError::Forbidden("Cannot delete this user".to_string()));
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    tracing::info!(actor = actor.id, user_id = id, "user deleted");

    Ok(StatusCode::NO_CONTENT)
}
