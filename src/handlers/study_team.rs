// src/handlers/study_team.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        pagination::{PageQuery, Paginated},
        study_team::{
            CreateTeamRequest, StudyTeam, StudyTeamDetail, StudyTeamSummary, TEAM_COLUMNS, TeamMember,
            has_room,
        },
    },
    utils::{jwt::AuthUser, role::ADMIN_ROLES},
};

const DEFAULT_MAX_MEMBERS: i32 = 10;

async fn fetch_team(pool: &PgPool, id: i64) -> Result<StudyTeam, AppError> {
    sqlx::query_as::<_, StudyTeam>(&format!("SELECT {TEAM_COLUMNS} FROM study_teams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Team not found".to_string()))
}

async fn fetch_members(pool: &PgPool, team_id: i64) -> Result<Vec<TeamMember>, AppError> {
    let members = sqlx::query_as::<_, TeamMember>(
        "SELECT m.user_id, u.name, m.joined_at
         FROM study_team_members m
         JOIN users u ON u.id = m.user_id
         WHERE m.team_id = $1
         ORDER BY m.joined_at, m.user_id",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;
    Ok(members)
}

pub async fn list_teams(
    State(pool): State<PgPool>,
    Query(params): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page();

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM study_teams")
        .fetch_one(&pool)
        .await?;

    let teams = sqlx::query_as::<_, StudyTeamSummary>(
        r#"
        SELECT t.id, t.name, t.exam_focus, t.owner_id, t.max_members,
               (SELECT COUNT(*) FROM study_team_members m WHERE m.team_id = t.id) AS member_count
        FROM study_teams t
        ORDER BY t.created_at DESC, t.id DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&pool)
    .await?;

    Ok(Json(Paginated::new(teams, total, page)))
}

/// Creates a team; the creator becomes its owner and first member.
pub async fn create_team(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<CreateTeamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    let team = sqlx::query_as::<_, StudyTeam>(&format!(
        "INSERT INTO study_teams (name, description, exam_focus, owner_id, max_members)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {TEAM_COLUMNS}"
    ))
    .bind(payload.name.trim())
    .bind(&payload.description)
    .bind(payload.exam_focus.as_deref())
    .bind(user.id)
    .bind(payload.max_members.unwrap_or(DEFAULT_MAX_MEMBERS))
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO study_team_members (team_id, user_id) VALUES ($1, $2)")
        .bind(team.id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(team_id = team.id, owner_id = user.id, "study team created");

    let members = fetch_members(&pool, team.id).await?;
    Ok((StatusCode::CREATED, Json(StudyTeamDetail { team, members })))
}

pub async fn get_team(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let team = fetch_team(&pool, id).await?;
    let members = fetch_members(&pool, id).await?;
    Ok(Json(StudyTeamDetail { team, members }))
}

/// Joins a team. The team row is locked so two joins cannot overfill it.
pub async fn join_team(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let max_members: i32 = sqlx::query_scalar("SELECT max_members FROM study_teams WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Team not found".to_string()))?;

    let member_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM study_team_members WHERE team_id = $1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    if !has_room(member_count, max_members) {
        return Err(AppError::Conflict("Team is full".to_string()));
    }

    sqlx::query("INSERT INTO study_team_members (team_id, user_id) VALUES ($1, $2)")
        .bind(id)
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "Already a member of this team"))?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Leaves a team. The owner has to delete the team instead.
pub async fn leave_team(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let team = fetch_team(&pool, id).await?;
    if team.owner_id == user.id {
        return Err(AppError::BadRequest(
            "The owner cannot leave; delete the team instead".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM study_team_members WHERE team_id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Not a member of this team".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Owner or admin roles.
pub async fn delete_team(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let team = fetch_team(&pool, id).await?;
    if team.owner_id != user.id && !user.is_any(ADMIN_ROLES) {
        return Err(AppError::Forbidden("Only the owner can delete this team".to_string()));
    }

    sqlx::query("DELETE FROM study_teams WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    tracing::info!(team_id = id, actor = user.id, "study team deleted");

    Ok(StatusCode::NO_CONTENT)
}
