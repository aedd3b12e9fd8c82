// src/handlers/quiz.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    attempt::scoring::round2,
    error::AppError,
    models::{
        exam_record::{LeaderboardParams, competition_ranks},
        pagination::{Page, Paginated},
        quiz::{
            CreateQuizQuestionRequest, CreateQuizRequest, PracticeParams, PublicQuizQuestion,
            QUIZ_COLUMNS, Quiz, QuizDetailResponse, QuizLeaderboardEntry, QuizLeaderboardRow,
            QuizListParams, QuizQuestion, QuizResult, SubmitQuizRequest,
        },
    },
    utils::jwt::AuthUser,
};

/// Points awarded per correct quiz answer.
const POINTS_PER_CORRECT: i32 = 10;

const MAX_PRACTICE_QUESTIONS: i64 = 50;

async fn fetch_published_quiz(pool: &PgPool, id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1 AND is_published = TRUE"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

pub async fn list_quizzes(
    State(pool): State<PgPool>,
    Query(params): Query<QuizListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = Page::new(params.page, params.limit);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM quizzes
         WHERE is_published = TRUE
           AND ($1::TEXT IS NULL OR topic = $1)
           AND ($2::TEXT IS NULL OR difficulty = $2)",
    )
    .bind(params.topic.as_deref())
    .bind(params.difficulty.as_deref())
    .fetch_one(&pool)
    .await?;

    let quizzes = sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes
         WHERE is_published = TRUE
           AND ($1::TEXT IS NULL OR topic = $1)
           AND ($2::TEXT IS NULL OR difficulty = $2)
         ORDER BY created_at DESC, id DESC
         LIMIT $3 OFFSET $4"
    ))
    .bind(params.topic.as_deref())
    .bind(params.difficulty.as_deref())
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(Paginated::new(quizzes, total, page)))
}

/// Quiz with its questions. Answers and explanations are left out.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_published_quiz(&pool, id).await?;

    let questions = sqlx::query_as::<_, PublicQuizQuestion>(
        "SELECT id, content, options FROM quiz_questions WHERE quiz_id = $1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(QuizDetailResponse { quiz, questions }))
}

/// Generates a random practice set.
///
/// Draws `count` questions (default 10) across published quizzes, optionally
/// restricted to one topic. Answers are not included.
pub async fn practice(
    State(pool): State<PgPool>,
    Query(params): Query<PracticeParams>,
) -> Result<impl IntoResponse, AppError> {
    let count = params.count.unwrap_or(10).clamp(1, MAX_PRACTICE_QUESTIONS);

    let questions = sqlx::query_as::<_, PublicQuizQuestion>(
        r#"
        SELECT qq.id, qq.content, qq.options
        FROM quiz_questions qq
        JOIN quizzes q ON q.id = qq.quiz_id
        WHERE q.is_published = TRUE AND ($1::TEXT IS NULL OR q.topic = $1)
        ORDER BY RANDOM()
        LIMIT $2
        "#,
    )
    .bind(params.topic.as_deref())
    .bind(count)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to draw practice questions: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(questions))
}

/// Submits a user's quiz answers and calculates the score.
///
/// * Compares answers with the stored key (exact match after trimming).
/// * Awards 10 points per correct answer.
/// * Answers for questions outside the quiz are ignored.
/// * Every submission is stored in `quiz_attempts`.
pub async fn submit_quiz(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.answers.is_empty() {
        return Err(AppError::BadRequest("No answers submitted".to_string()));
    }

    fetch_published_quiz(&pool, id).await?;

    let questions = sqlx::query_as::<_, QuizQuestion>(
        "SELECT id, quiz_id, content, options, answer, explanation FROM quiz_questions WHERE quiz_id = $1",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    if questions.is_empty() {
        return Err(AppError::BadRequest("Quiz has no questions".to_string()));
    }

    let key: HashMap<i64, &str> = questions.iter().map(|q| (q.id, q.answer.trim())).collect();
    let correct_count = req
        .answers
        .iter()
        .filter(|(q_id, given)| key.get(*q_id).is_some_and(|answer| *answer == given.trim()))
        .count() as i32;
    let total_questions = questions.len() as i32;
    let score = correct_count * POINTS_PER_CORRECT;
    let percentage = round2(f64::from(correct_count) / f64::from(total_questions) * 100.0);

    let attempt_id: i64 = sqlx::query_scalar(
        "INSERT INTO quiz_attempts (quiz_id, user_id, score, correct_count, total_questions)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(id)
    .bind(user.id)
    .bind(score)
    .bind(correct_count)
    .bind(total_questions)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to record quiz attempt: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(QuizResult {
        attempt_id,
        score,
        correct_count,
        total_questions,
        percentage,
    }))
}

/// Best score per user for one quiz. Earlier attempts win ties in order, equal scores share a rank.
pub async fn get_leaderboard(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    fetch_published_quiz(&pool, id).await?;
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    let rows = sqlx::query_as::<_, QuizLeaderboardRow>(
        r#"
        SELECT user_id, name, score, created_at
        FROM (
            SELECT DISTINCT ON (a.user_id) a.user_id, u.name, a.score, a.created_at
            FROM quiz_attempts a
            JOIN users u ON u.id = a.user_id
            WHERE a.quiz_id = $1
            ORDER BY a.user_id, a.score DESC, a.created_at ASC
        ) best
        ORDER BY score DESC, created_at ASC
        LIMIT $2
        "#,
    )
    .bind(id)
    .bind(limit)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch quiz leaderboard: {:?}", e);
        AppError::from(e)
    })?;

    let scores: Vec<i32> = rows.iter().map(|r| r.score).collect();
    let entries: Vec<QuizLeaderboardEntry> = competition_ranks(&scores)
        .into_iter()
        .zip(rows)
        .map(|(rank, r)| QuizLeaderboardEntry {
            rank,
            user_id: r.user_id,
            name: r.name,
            score: r.score,
            created_at: r.created_at,
        })
        .collect();

    Ok(Json(entries))
}

/// Mentor and admin roles.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "INSERT INTO quizzes (title, topic, description, difficulty, time_limit_secs, is_published, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {QUIZ_COLUMNS}"
    ))
    .bind(payload.title.trim())
    .bind(payload.topic.trim())
    .bind(&payload.description)
    .bind(&payload.difficulty)
    .bind(payload.time_limit_secs)
    .bind(payload.is_published)
    .bind(user.id)
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Adds a question to a quiz.
pub async fn add_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateQuizQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if !payload.answer_in_options() {
        return Err(AppError::BadRequest(
            "Answer must be one of the options".to_string(),
        ));
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM quizzes WHERE id = $1)")
        .bind(id)
        .fetch_one(&pool)
        .await?;
    if !exists {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    let question = sqlx::query_as::<_, QuizQuestion>(
        "INSERT INTO quiz_questions (quiz_id, content, options, answer, explanation)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, quiz_id, content, options, answer, explanation",
    )
    .bind(id)
    .bind(&payload.content)
    .bind(SqlJson(&payload.options))
    .bind(&payload.answer)
    .bind(payload.explanation.as_deref())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to insert quiz question: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn delete_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
