// src/handlers/exam.rs

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    attempt::{ExamConfig, ExamSessionState, Submission},
    config::Config,
    error::AppError,
    handlers::notification::notify_user,
    models::{
        exam::{
            CreateExamQuestionRequest, CreateExamRequest, CreateSectionRequest, EXAM_COLUMNS,
            EXAM_QUESTION_COLUMNS, Exam, ExamDetailResponse, ExamListParams, ExamQuestionRow,
            ExamSectionRow, UpdateExamRequest, build_exam_config,
        },
        exam_record::{
            ATTEMPT_COLUMNS, ExamAttempt, LeaderboardParams, LeaderboardRow, STATUS_IN_PROGRESS,
            STATUS_SUBMITTED, StartAttemptRequest, StartAttemptResponse, SubmitAttemptRequest,
            SubmitAttemptResponse, is_late_submission, rank_leaderboard,
        },
        pagination::{Page, Paginated},
    },
    utils::jwt::AuthUser,
};

async fn fetch_exam(pool: &PgPool, id: i64) -> Result<Exam, AppError> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))
}

async fn fetch_published_exam(pool: &PgPool, id: i64) -> Result<Exam, AppError> {
    let exam = fetch_exam(pool, id).await?;
    if !exam.is_published {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }
    Ok(exam)
}

/// Loads sections and questions in display order and assembles the attempt config.
async fn load_exam_config(pool: &PgPool, exam: &Exam) -> Result<ExamConfig, AppError> {
    let sections = sqlx::query_as::<_, ExamSectionRow>(
        "SELECT id, exam_id, title, position FROM exam_sections WHERE exam_id = $1 ORDER BY position, id",
    )
    .bind(exam.id)
    .fetch_all(pool)
    .await?;

    let questions = sqlx::query_as::<_, ExamQuestionRow>(&format!(
        "SELECT {EXAM_QUESTION_COLUMNS} FROM exam_questions WHERE exam_id = $1 ORDER BY position, id"
    ))
    .bind(exam.id)
    .fetch_all(pool)
    .await?;

    build_exam_config(exam, sections, questions)
}

/// Lists published exams, optionally filtered by category and title.
pub async fn list_exams(
    State(pool): State<PgPool>,
    Query(params): Query<ExamListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = Page::new(params.page, params.limit);
    let pattern = params.q.as_deref().map(|q| format!("%{}%", q.trim()));

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM exams
         WHERE is_published = TRUE
           AND ($1::TEXT IS NULL OR category = $1)
           AND ($2::TEXT IS NULL OR title ILIKE $2)",
    )
    .bind(params.category.as_deref())
    .bind(pattern.as_deref())
    .fetch_one(&pool)
    .await?;

    let exams = sqlx::query_as::<_, Exam>(&format!(
        "SELECT {EXAM_COLUMNS} FROM exams
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
    .await
    .map_err(|e| {
        tracing::error!("Failed to list exams: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(Paginated::new(exams, total, page)))
}

/// Exam detail for candidates. The answer key is never serialized.
pub async fn get_exam(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = fetch_published_exam(&pool, id).await?;
    let config = load_exam_config(&pool, &exam).await?;

    Ok(Json(ExamDetailResponse {
        question_count: config.question_count(),
        total_marks: config.total_marks(),
        category: exam.category,
        description: exam.description,
        config,
    }))
}

/// Best submitted attempt per user, ordered by score then time taken.
/// Equal score and time share a rank.
pub async fn get_leaderboard(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse, AppError> {
    fetch_published_exam(&pool, id).await?;
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    let rows = sqlx::query_as::<_, LeaderboardRow>(
        r#"
        SELECT user_id, name, score, percentage, time_taken_secs, submitted_at
        FROM (
            SELECT DISTINCT ON (a.user_id)
                a.user_id,
                u.name,
                COALESCE(a.score, 0) AS score,
                COALESCE(a.percentage, 0) AS percentage,
                COALESCE(a.time_taken_secs, 0) AS time_taken_secs,
                COALESCE(a.submitted_at, a.started_at) AS submitted_at
            FROM exam_attempts a
            JOIN users u ON u.id = a.user_id
            WHERE a.exam_id = $1 AND a.status = $2
            ORDER BY a.user_id, a.score DESC, a.time_taken_secs ASC, a.submitted_at ASC
        ) best
        ORDER BY score DESC, time_taken_secs ASC, submitted_at ASC
        LIMIT $3
        "#,
    )
    .bind(id)
    .bind(STATUS_SUBMITTED)
    .bind(limit)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch leaderboard: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(rank_leaderboard(rows)))
}

/// Starts a timed attempt. The deadline is fixed here from the exam duration.
pub async fn start_attempt(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // The body is optional; an empty one picks the exam's first language.
    let payload: StartAttemptRequest = if body.is_empty() {
        StartAttemptRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let exam = fetch_published_exam(&pool, id).await?;
    let config = Arc::new(load_exam_config(&pool, &exam).await?);

    let language = payload
        .language
        .or_else(|| config.languages.first().cloned())
        .unwrap_or_else(|| "en".to_string());

    let started_at = Utc::now();
    // Rejects empty exams and unsupported languages before anything is stored.
    let session = ExamSessionState::start(config.clone(), &language, started_at)?;
    let deadline = started_at + Duration::minutes(i64::from(config.duration_minutes));

    let attempt_id: i64 = sqlx::query_scalar(
        "INSERT INTO exam_attempts (exam_id, user_id, status, language, started_at, deadline)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING id",
    )
    .bind(exam.id)
    .bind(user.id)
    .bind(STATUS_IN_PROGRESS)
    .bind(&language)
    .bind(started_at)
    .bind(deadline)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to start attempt: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!(attempt_id, exam_id = exam.id, user_id = user.id, "exam attempt started");

    Ok((
        StatusCode::CREATED,
        Json(StartAttemptResponse {
            attempt_id,
            remaining_secs: i64::try_from(session.remaining_secs()).unwrap_or(i64::MAX),
            exam: (*config).clone(),
            language,
            started_at,
            deadline,
        }),
    ))
}

async fn fetch_own_attempt(pool: &PgPool, id: i64, user: &AuthUser) -> Result<ExamAttempt, AppError> {
    let attempt = sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM exam_attempts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.user_id != user.id {
        return Err(AppError::Forbidden("This attempt belongs to another user".to_string()));
    }
    Ok(attempt)
}

/// Scores a submission and closes the attempt.
///
/// * Answers are replayed through the session state machine, so every answer
///   is checked against its question's type and options.
/// * Submissions after the deadline plus the grace period are scored but flagged late.
/// * The status update is guarded on `in_progress`, so a second submit gets 409.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    State(app_config): State<Config>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = fetch_own_attempt(&pool, id, &user).await?;
    if attempt.status == STATUS_SUBMITTED {
        return Err(AppError::Conflict("Attempt already submitted".to_string()));
    }

    let exam = fetch_exam(&pool, attempt.exam_id).await?;
    let config = Arc::new(load_exam_config(&pool, &exam).await?);

    let mut submission = Submission {
        language: payload.language.unwrap_or_else(|| attempt.language.clone()),
        answers: payload.answers,
        marked: payload.marked,
        time_spent: payload.time_spent,
    };

    // Questions deleted while the attempt was open.
    let dropped = submission.retain_known(&config);
    if dropped > 0 {
        tracing::warn!(attempt_id = attempt.id, dropped, "ignoring answers to removed questions");
    }

    let submitted_at = Utc::now();
    let session = ExamSessionState::replay(config, &submission, attempt.started_at, submitted_at)?;
    let result = session.result();
    let is_late = is_late_submission(attempt.deadline, app_config.submit_grace_secs, submitted_at);

    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE exam_attempts SET
            status = $1, language = $2, submitted_at = $3, score = $4, percentage = $5,
            time_taken_secs = $6, is_late = $7, result = $8
         WHERE id = $9 AND status = $10",
    )
    .bind(STATUS_SUBMITTED)
    .bind(&submission.language)
    .bind(submitted_at)
    .bind(result.score)
    .bind(result.percentage)
    .bind(i64::try_from(result.time_taken_secs).unwrap_or(i64::MAX))
    .bind(is_late)
    .bind(SqlJson(&result))
    .bind(attempt.id)
    .bind(STATUS_IN_PROGRESS)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::Conflict("Attempt already submitted".to_string()));
    }

    notify_user(
        &mut *tx,
        user.id,
        "Exam result ready",
        &format!("You scored {} / {} in {}", result.score, result.max_score, exam.title),
        "exam",
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        attempt_id = attempt.id,
        score = result.score,
        is_late,
        "exam attempt submitted"
    );

    Ok(Json(SubmitAttemptResponse {
        attempt_id: attempt.id,
        is_late,
        timed_out: session.is_timed_out(),
        result,
    }))
}

/// Returns one of the caller's attempts, including the stored result once submitted.
pub async fn get_attempt(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_own_attempt(&pool, id, &user).await?))
}

/// Every exam, drafts included.
/// Admin only.
pub async fn admin_list_exams(
    State(pool): State<PgPool>,
    Query(params): Query<ExamListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = Page::new(params.page, params.limit);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exams WHERE ($1::TEXT IS NULL OR category = $1)")
        .bind(params.category.as_deref())
        .fetch_one(&pool)
        .await?;

    let exams = sqlx::query_as::<_, Exam>(&format!(
        "SELECT {EXAM_COLUMNS} FROM exams
         WHERE ($1::TEXT IS NULL OR category = $1)
         ORDER BY id DESC
         LIMIT $2 OFFSET $3"
    ))
    .bind(params.category.as_deref())
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(Paginated::new(exams, total, page)))
}

pub async fn create_exam(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let exam = sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (title, category, description, instructions, languages, duration_minutes, is_published, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {EXAM_COLUMNS}"
    ))
    .bind(payload.title.trim())
    .bind(payload.category.trim())
    .bind(&payload.description)
    .bind(SqlJson(&payload.instructions))
    .bind(SqlJson(&payload.languages))
    .bind(payload.duration_minutes)
    .bind(payload.is_published)
    .bind(user.id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create exam: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(exam)))
}

pub async fn update_exam(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let exam = sqlx::query_as::<_, Exam>(&format!(
        "UPDATE exams SET
            title = COALESCE($1, title),
            category = COALESCE($2, category),
            description = COALESCE($3, description),
            instructions = COALESCE($4, instructions),
            languages = COALESCE($5, languages),
            duration_minutes = COALESCE($6, duration_minutes),
            is_published = COALESCE($7, is_published),
            updated_at = NOW()
         WHERE id = $8
         RETURNING {EXAM_COLUMNS}"
    ))
    .bind(payload.title.as_deref().map(str::trim))
    .bind(payload.category.as_deref().map(str::trim))
    .bind(payload.description.as_deref())
    .bind(payload.instructions.as_ref().map(SqlJson))
    .bind(payload.languages.as_ref().map(SqlJson))
    .bind(payload.duration_minutes)
    .bind(payload.is_published)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    Ok(Json(exam))
}

/// Deletes an exam with its sections, questions and attempts.
pub async fn delete_exam(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM exams WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    tracing::info!(exam_id = id, "exam deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Appends a section. Without an explicit position it goes after the last one.
pub async fn add_section(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateSectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    fetch_exam(&pool, id).await?;

    let section = sqlx::query_as::<_, ExamSectionRow>(
        "INSERT INTO exam_sections (exam_id, title, position)
         VALUES ($1, $2, COALESCE($3, (SELECT COALESCE(MAX(position) + 1, 0) FROM exam_sections WHERE exam_id = $1)))
         RETURNING id, exam_id, title, position",
    )
    .bind(id)
    .bind(payload.title.trim())
    .bind(payload.position)
    .fetch_one(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(section)))
}

/// Adds a question to one of the exam's sections.
pub async fn add_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateExamQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    payload.check_shape()?;

    let section_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM exam_sections WHERE id = $1 AND exam_id = $2)",
    )
    .bind(payload.section_id)
    .bind(id)
    .fetch_one(&pool)
    .await?;

    if !section_exists {
        return Err(AppError::NotFound("Section not found in this exam".to_string()));
    }

    let options = payload.trimmed_options();
    let answers: Vec<String> = payload.correct_answers.iter().map(|a| a.trim().to_string()).collect();

    let question = sqlx::query_as::<_, ExamQuestionRow>(&format!(
        "INSERT INTO exam_questions
            (exam_id, section_id, question_type, content, options, correct_answers, marks, negative_marks, tolerance, explanation, position)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
            COALESCE($11, (SELECT COALESCE(MAX(position) + 1, 0) FROM exam_questions WHERE section_id = $2)))
         RETURNING {EXAM_QUESTION_COLUMNS}"
    ))
    .bind(id)
    .bind(payload.section_id)
    .bind(payload.question_type.as_str())
    .bind(&payload.content)
    .bind(SqlJson(&options))
    .bind(SqlJson(&answers))
    .bind(payload.marks)
    .bind(payload.negative_marks)
    .bind(payload.tolerance)
    .bind(payload.explanation.as_deref())
    .bind(payload.position)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to add exam question: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Questions with their answer keys.
/// Admin only.
pub async fn list_questions(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    fetch_exam(&pool, id).await?;

    let questions = sqlx::query_as::<_, ExamQuestionRow>(&format!(
        "SELECT {EXAM_QUESTION_COLUMNS} FROM exam_questions WHERE exam_id = $1 ORDER BY section_id, position, id"
    ))
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(questions))
}

pub async fn delete_question(
    State(pool): State<PgPool>,
    Path((id, question_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM exam_questions WHERE id = $1 AND exam_id = $2")
        .bind(question_id)
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
