// src/handlers/analytics.rs

use std::collections::BTreeMap;

use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::{
    attempt::scoring::round2, error::AppError, models::exam_record::STATUS_SUBMITTED,
    models::payment::PAYMENT_SUCCEEDED, utils::jwt::AuthUser,
};

/// Platform-wide numbers for the admin dashboard.
#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub users_by_role: BTreeMap<String, i64>,
    pub total_users: i64,
    pub exams: i64,
    pub quizzes: i64,
    pub courses: i64,
    pub exam_attempts: i64,
    pub quiz_attempts: i64,
    pub revenue_cents: i64,
    pub active_subscriptions: i64,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ExamBest {
    pub exam_id: i64,
    pub title: String,
    pub attempts: i64,
    pub best_score: f64,
    pub best_percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct PersonalAnalytics {
    pub exam_attempts: i64,
    pub average_percentage: Option<f64>,
    pub best_percentage: Option<f64>,
    pub quiz_attempts: i64,
    pub enrollments: i64,
    pub exams: Vec<ExamBest>,
}

/// Admin only. The independent counts run concurrently on the pool.
pub async fn overview(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let roles = sqlx::query_as::<_, (String, i64)>("SELECT role, COUNT(*) FROM users GROUP BY role")
        .fetch_all(&pool);
    let catalogue = sqlx::query_as::<_, (i64, i64, i64)>(
        "SELECT
            (SELECT COUNT(*) FROM exams),
            (SELECT COUNT(*) FROM quizzes),
            (SELECT COUNT(*) FROM courses)",
    )
    .fetch_one(&pool);
    let attempts = sqlx::query_as::<_, (i64, i64)>(
        "SELECT
            (SELECT COUNT(*) FROM exam_attempts WHERE status = $1),
            (SELECT COUNT(*) FROM quiz_attempts)",
    )
    .bind(STATUS_SUBMITTED)
    .fetch_one(&pool);
    let revenue = sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM payments WHERE status = $1",
    )
    .bind(PAYMENT_SUCCEEDED)
    .fetch_one(&pool);
    let subscriptions = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(DISTINCT user_id) FROM subscriptions WHERE starts_at <= NOW() AND ends_at > NOW()",
    )
    .fetch_one(&pool);

    let (roles, (exams, quizzes, courses), (exam_attempts, quiz_attempts), revenue_cents, active_subscriptions) =
        tokio::try_join!(roles, catalogue, attempts, revenue, subscriptions).map_err(|e| {
            tracing::error!("Failed to compute analytics overview: {:?}", e);
            AppError::from(e)
        })?;

    let total_users = roles.iter().map(|(_, n)| n).sum();

    Ok(Json(OverviewResponse {
        users_by_role: roles.into_iter().collect(),
        total_users,
        exams,
        quizzes,
        courses,
        exam_attempts,
        quiz_attempts,
        revenue_cents,
        active_subscriptions,
    }))
}

/// The caller's own progress: attempt counts, averages and best result per exam.
pub async fn personal(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let summary = sqlx::query_as::<_, (i64, Option<f64>, Option<f64>, i64, i64)>(
        "SELECT
            (SELECT COUNT(*) FROM exam_attempts WHERE user_id = $1 AND status = $2),
            (SELECT AVG(percentage) FROM exam_attempts WHERE user_id = $1 AND status = $2),
            (SELECT MAX(percentage) FROM exam_attempts WHERE user_id = $1 AND status = $2),
            (SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1),
            (SELECT COUNT(*) FROM enrollments WHERE user_id = $1)",
    )
    .bind(user.id)
    .bind(STATUS_SUBMITTED)
    .fetch_one(&pool);

    let per_exam = sqlx::query_as::<_, ExamBest>(
        r#"
        SELECT a.exam_id, e.title, COUNT(*) AS attempts,
               COALESCE(MAX(a.score), 0) AS best_score,
               COALESCE(MAX(a.percentage), 0) AS best_percentage
        FROM exam_attempts a
        JOIN exams e ON e.id = a.exam_id
        WHERE a.user_id = $1 AND a.status = $2
        GROUP BY a.exam_id, e.title
        ORDER BY best_percentage DESC, a.exam_id
        "#,
    )
    .bind(user.id)
    .bind(STATUS_SUBMITTED)
    .fetch_all(&pool);

    let ((exam_attempts, average, best, quiz_attempts, enrollments), exams) =
        tokio::try_join!(summary, per_exam)?;

    Ok(Json(PersonalAnalytics {
        exam_attempts,
        average_percentage: average.map(round2),
        best_percentage: best,
        quiz_attempts,
        enrollments,
        exams,
    }))
}
