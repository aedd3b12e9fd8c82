// src/models/study_team.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const TEAM_COLUMNS: &str = "id, name, description, exam_focus, owner_id, max_members, created_at";

/// Represents the 'study_teams' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StudyTeam {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub exam_focus: Option<String>,
    pub owner_id: i64,
    pub max_members: i32,
    pub created_at: DateTime<Utc>,
}

/// List row with the current head count.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StudyTeamSummary {
    pub id: i64,
    pub name: String,
    pub exam_focus: Option<String>,
    pub owner_id: i64,
    pub max_members: i32,
    pub member_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TeamMember {
    pub user_id: i64,
    pub name: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StudyTeamDetail {
    #[serde(flatten)]
    pub team: StudyTeam,
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    #[validate(length(max = 100))]
    pub exam_focus: Option<String>,
    #[validate(range(min = 2, max = 100))]
    pub max_members: Option<i32>,
}

/// Join is allowed only while the team has room.
pub fn has_room(member_count: i64, max_members: i32) -> bool {
    member_count < i64::from(max_members)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_check() {
        assert!(has_room(0, 2));
        assert!(has_room(1, 2));
        assert!(!has_room(2, 2));
        assert!(!has_room(11, 10));
    }

    #[test]
    fn create_request_bounds() {
        let req: CreateTeamRequest =
            serde_json::from_str(r#"{"name":"Polity Circle","max_members":1}"#).unwrap();
        assert!(req.validate().is_err());
        let req: CreateTeamRequest = serde_json::from_str(r#"{"name":"Polity Circle"}"#).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.description, "");
    }
}
