// src/models/mentorship.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validation::validate_url_string;

pub const SESSION_COLUMNS: &str = "id, student_id, mentor_id, topic, notes, scheduled_at, \
     duration_minutes, status, meeting_link, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Requested,
    Accepted,
    Declined,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Requested => "requested",
            SessionStatus::Accepted => "accepted",
            SessionStatus::Declined => "declined",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    /// Allowed moves. The mentor accepts, declines and completes; either
    /// participant may cancel while the session is still open.
    pub fn can_transition(self, to: SessionStatus, actor_is_mentor: bool) -> bool {
        use SessionStatus::*;
        match (self, to) {
            (Requested, Accepted) | (Requested, Declined) | (Accepted, Completed) => actor_is_mentor,
            (Requested, Cancelled) | (Accepted, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requested" => Ok(SessionStatus::Requested),
            "accepted" => Ok(SessionStatus::Accepted),
            "declined" => Ok(SessionStatus::Declined),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

/// Represents the 'mentorship_sessions' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MentorshipSession {
    pub id: i64,
    pub student_id: i64,
    pub mentor_id: i64,
    pub topic: String,
    pub notes: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: String,
    pub meeting_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BookSessionRequest {
    pub mentor_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub topic: String,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 15, max = 180))]
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSessionStatusRequest {
    pub status: SessionStatus,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub meeting_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<SessionStatus>,
}
