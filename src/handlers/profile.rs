// src/handlers/profile.rs

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        course::EnrollmentResponse,
        exam_record::AttemptSummary,
        pagination::{PageQuery, Paginated},
        user::{ChangePasswordRequest, MeResponse, USER_COLUMNS, UpdateProfileRequest, User},
    },
    utils::{
        hash::{hash_password, verify_password},
        jwt::AuthUser,
    },
};

async fn fetch_user(pool: &PgPool, id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Get current user's profile and statistics.
pub async fn get_me(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let me = fetch_user(&pool, user.id).await?;

    let (exam_attempts, quiz_attempts, enrollments, unread_notifications): (i64, i64, i64, i64) =
        sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM exam_attempts WHERE user_id = $1),
                (SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1),
                (SELECT COUNT(*) FROM enrollments WHERE user_id = $1),
                (SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE)
            "#,
        )
        .bind(user.id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(MeResponse {
        user: me,
        exam_attempts,
        quiz_attempts,
        enrollments,
        unread_notifications,
    }))
}

/// Updates name, phone and target exam. Absent fields are kept.
pub async fn update_me(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let updated = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET
            name = COALESCE($1, name),
            phone = COALESCE($2, phone),
            target_exam = COALESCE($3, target_exam),
            updated_at = NOW()
         WHERE id = $4
         RETURNING {USER_COLUMNS}"
    ))
    .bind(payload.name.as_deref().map(str::trim))
    .bind(payload.phone.as_deref())
    .bind(payload.target_exam.as_deref())
    .bind(user.id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(updated))
}

/// Changes the caller's password after verifying the current one.
pub async fn change_password(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let me = fetch_user(&pool, user.id).await?;
    if !verify_password(&payload.current_password, &me.password)? {
        return Err(AppError::AuthError("Current password is incorrect".to_string()));
    }

    let hashed = hash_password(&payload.new_password)?;
    sqlx::query("UPDATE users SET password = $1, updated_at = NOW() WHERE id = $2")
        .bind(&hashed)
        .bind(user.id)
        .execute(&pool)
        .await?;

    tracing::info!(user_id = user.id, "password changed");

    Ok(StatusCode::NO_CONTENT)
}

/// Courses the caller is enrolled in, with progress.
pub async fn my_enrollments(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let enrollments = sqlx::query_as::<_, EnrollmentResponse>(
        r#"
        SELECT e.course_id, c.title, c.category, e.progress, e.enrolled_at
        FROM enrollments e
        JOIN courses c ON c.id = e.course_id
        WHERE e.user_id = $1
        ORDER BY e.enrolled_at DESC
        "#,
    )
    .bind(user.id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch enrollments: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(enrollments))
}

/// The caller's exam attempts, newest first.
pub async fn my_attempts(
    State(pool): State<PgPool>,
    user: AuthUser,
    Query(params): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page();

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exam_attempts WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(&pool)
        .await?;

    let attempts = sqlx::query_as::<_, AttemptSummary>(
        r#"
        SELECT a.id, a.exam_id, e.title AS exam_title, a.status, a.started_at,
               a.submitted_at, a.score, a.percentage
        FROM exam_attempts a
        JOIN exams e ON e.id = a.exam_id
        WHERE a.user_id = $1
        ORDER BY a.started_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(Paginated::new(attempts, total, page)))
}
