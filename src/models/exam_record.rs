// src/models/exam_record.rs

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::attempt::{Answer, ExamConfig, ExamResult};

pub const ATTEMPT_COLUMNS: &str = "id, exam_id, user_id, status, language, started_at, deadline, \
     submitted_at, score, percentage, time_taken_secs, is_late, result";

pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_SUBMITTED: &str = "submitted";

/// Represents the 'exam_attempts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExamAttempt {
    pub id: i64,
    pub exam_id: i64,
    pub user_id: i64,
    /// 'in_progress' or 'submitted'.
    pub status: String,
    pub language: String,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    pub percentage: Option<f64>,
    pub time_taken_secs: Option<i64>,
    /// Submitted after deadline + grace.
    pub is_late: bool,
    pub result: Option<Json<ExamResult>>,
}

/// Row for a user's attempt history, joined with the exam title.
#[derive(Debug, Serialize, FromRow)]
pub struct AttemptSummary {
    pub id: i64,
    pub exam_id: i64,
    pub exam_title: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    pub percentage: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartAttemptRequest {
    /// Defaults to the exam's first language.
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartAttemptResponse {
    pub attempt_id: i64,
    pub exam: ExamConfig,
    pub language: String,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub remaining_secs: i64,
}

/// DTO for submitting an exam attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    /// Key: question id. Value: option text, list of options, or a number.
    pub answers: HashMap<i64, Answer>,
    /// Question ids flagged for review at submission time.
    #[serde(default)]
    pub marked: Vec<i64>,
    /// Seconds spent per question id.
    #[serde(default)]
    pub time_spent: HashMap<i64, u64>,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitAttemptResponse {
    pub attempt_id: i64,
    pub is_late: bool,
    pub timed_out: bool,
    pub result: ExamResult,
}

/// Best submitted attempt of one user, as read from the database.
#[derive(Debug, Clone, FromRow)]
pub struct LeaderboardRow {
    pub user_id: i64,
    pub name: String,
    pub score: f64,
    pub percentage: f64,
    pub time_taken_secs: i64,
    pub submitted_at: DateTime<Utc>,
}

/// Aggregated struct for displaying the leaderboard.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: i64,
    pub name: String,
    pub score: f64,
    pub percentage: f64,
    pub time_taken_secs: i64,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    pub limit: Option<i64>,
}

/// Standard competition ranking ("1224") over rows already sorted best-first.
/// Adjacent rows with equal keys share a rank.
pub fn competition_ranks<K: PartialEq>(keys: &[K]) -> Vec<usize> {
    let mut ranks = Vec::with_capacity(keys.len());
    for (idx, key) in keys.iter().enumerate() {
        let rank = match idx {
            0 => 1,
            _ if keys[idx - 1] == *key => ranks[idx - 1],
            _ => idx + 1,
        };
        ranks.push(rank);
    }
    ranks
}

/// Ranks rows sorted by score desc then time asc. Ties need equal score and time.
pub fn rank_leaderboard(rows: Vec<LeaderboardRow>) -> Vec<LeaderboardEntry> {
    let keys: Vec<(f64, i64)> = rows.iter().map(|r| (r.score, r.time_taken_secs)).collect();
    competition_ranks(&keys)
        .into_iter()
        .zip(rows)
        .map(|(rank, r)| LeaderboardEntry {
            rank,
            user_id: r.user_id,
            name: r.name,
            score: r.score,
            percentage: r.percentage,
            time_taken_secs: r.time_taken_secs,
            submitted_at: r.submitted_at,
        })
        .collect()
}

/// An attempt is late once it is submitted strictly after `deadline + grace_secs`.
pub fn is_late_submission(deadline: DateTime<Utc>, grace_secs: i64, submitted_at: DateTime<Utc>) -> bool {
    submitted_at > deadline + Duration::seconds(grace_secs)
}
