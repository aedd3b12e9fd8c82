// src/handlers/mentorship.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::notification::notify_user,
    models::{
        mentorship::{
            BookSessionRequest, MentorshipSession, SESSION_COLUMNS, SessionListParams, SessionStatus,
            UpdateSessionStatusRequest,
        },
        pagination::{Page, Paginated},
        user::MentorSummary,
    },
    utils::{jwt::AuthUser, role::Role},
};

const DEFAULT_SESSION_MINUTES: i32 = 30;

/// Active mentors with the number of sessions they have completed.
pub async fn list_mentors(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let mentors = sqlx::query_as::<_, MentorSummary>(
        r#"
        SELECT u.id, u.name, u.target_exam,
               (SELECT COUNT(*) FROM mentorship_sessions s
                WHERE s.mentor_id = u.id AND s.status = 'completed') AS completed_sessions
        FROM users u
        WHERE u.role = $1 AND u.is_active = TRUE
        ORDER BY u.name, u.id
        "#,
    )
    .bind(Role::Mentor.as_str())
    .fetch_all(&pool)
    .await?;

    Ok(Json(mentors))
}

/// Books a session with a mentor at a future time. The mentor is notified.
pub async fn book_session(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<BookSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.mentor_id == user.id {
        return Err(AppError::BadRequest("You cannot book a session with yourself".to_string()));
    }
    if payload.scheduled_at <= Utc::now() {
        return Err(AppError::BadRequest("Session time must be in the future".to_string()));
    }

    let is_mentor: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND role = $2 AND is_active = TRUE)",
    )
    .bind(payload.mentor_id)
    .bind(Role::Mentor.as_str())
    .fetch_one(&pool)
    .await?;

    if !is_mentor {
        return Err(AppError::NotFound("Mentor not found".to_string()));
    }

    let mut tx = pool.begin().await?;

    let session = sqlx::query_as::<_, MentorshipSession>(&format!(
        "INSERT INTO mentorship_sessions (student_id, mentor_id, topic, notes, scheduled_at, duration_minutes, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {SESSION_COLUMNS}"
    ))
    .bind(user.id)
    .bind(payload.mentor_id)
    .bind(payload.topic.trim())
    .bind(payload.notes.as_deref())
    .bind(payload.scheduled_at)
    .bind(payload.duration_minutes.unwrap_or(DEFAULT_SESSION_MINUTES))
    .bind(SessionStatus::Requested.as_str())
    .fetch_one(&mut *tx)
    .await?;

    notify_user(
        &mut *tx,
        session.mentor_id,
        "New session request",
        &format!("A student requested a session on '{}'", session.topic),
        "mentorship",
    )
    .await?;

    tx.commit().await?;

    tracing::info!(session_id = session.id, mentor_id = session.mentor_id, "mentorship session requested");

    Ok((StatusCode::CREATED, Json(session)))
}

/// Sessions where the caller is the student or the mentor.
pub async fn list_sessions(
    State(pool): State<PgPool>,
    user: AuthUser,
    Query(params): Query<SessionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = Page::new(params.page, params.limit);
    let status = params.status.map(|s| s.as_str());

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM mentorship_sessions
         WHERE (student_id = $1 OR mentor_id = $1) AND ($2::TEXT IS NULL OR status = $2)",
    )
    .bind(user.id)
    .bind(status)
    .fetch_one(&pool)
    .await?;

    let sessions = sqlx::query_as::<_, MentorshipSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM mentorship_sessions
         WHERE (student_id = $1 OR mentor_id = $1) AND ($2::TEXT IS NULL OR status = $2)
         ORDER BY scheduled_at DESC, id DESC
         LIMIT $3 OFFSET $4"
    ))
    .bind(user.id)
    .bind(status)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(Paginated::new(sessions, total, page)))
}

/// Moves a session along its lifecycle.
///
/// * requested -> accepted | declined, accepted -> completed: mentor only.
/// * requested | accepted -> cancelled: either participant.
/// * A meeting link may only be attached when accepting.
pub async fn update_session_status(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSessionStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let session = sqlx::query_as::<_, MentorshipSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM mentorship_sessions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .filter(|s| s.student_id == user.id || s.mentor_id == user.id)
    .ok_or(AppError::NotFound("Session not found".to_string()))?;

    let current: SessionStatus = session.status.parse().map_err(AppError::InternalServerError)?;
    let target = payload.status;
    let actor_is_mentor = session.mentor_id == user.id;

    if !current.can_transition(target, actor_is_mentor) {
        if current.can_transition(target, true) {
            return Err(AppError::Forbidden(format!(
                "Only the mentor can mark a session {target}"
            )));
        }
        return Err(AppError::Conflict(format!(
            "Cannot move a {current} session to {target}"
        )));
    }
    if payload.meeting_link.is_some() && target != SessionStatus::Accepted {
        return Err(AppError::BadRequest(
            "A meeting link can only be set when accepting".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    // Guarded on the status we checked, so a concurrent change loses cleanly.
    let updated = sqlx::query_as::<_, MentorshipSession>(&format!(
        "UPDATE mentorship_sessions SET
            status = $1,
            meeting_link = COALESCE($2, meeting_link),
            updated_at = NOW()
         WHERE id = $3 AND status = $4
         RETURNING {SESSION_COLUMNS}"
    ))
    .bind(target.as_str())
    .bind(payload.meeting_link.as_deref())
    .bind(id)
    .bind(current.as_str())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::Conflict("Session was changed by someone else".to_string()))?;

    let other_party = if actor_is_mentor {
        updated.student_id
    } else {
        updated.mentor_id
    };
    notify_user(
        &mut *tx,
        other_party,
        "Mentorship session update",
        &format!("Your session on '{}' is now {}", updated.topic, target),
        "mentorship",
    )
    .await?;

    tx.commit().await?;

    Ok(Json(updated))
}
