// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::utils::validation::validate_string_list;

pub const QUIZ_COLUMNS: &str =
    "id, title, topic, description, difficulty, time_limit_secs, is_published, created_by, created_at";

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    /// Subject area, e.g. "Polity", "Quant".
    pub topic: String,
    pub description: String,
    /// 'easy', 'medium' or 'hard'.
    pub difficulty: String,
    pub time_limit_secs: Option<i32>,
    pub is_published: bool,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Represents the 'quiz_questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizQuestion {
    pub id: i64,
    pub quiz_id: i64,

    /// The text content of the question.
    pub content: String,

    /// List of options (e.g., ["Option A", "Option B"]).
    /// Stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    /// The correct option text.
    pub answer: String,

    /// Explanation of the correct answer.
    pub explanation: Option<String>,
}

/// DTO for sending question to client (excludes answer and explanation).
#[derive(Debug, Serialize, FromRow)]
pub struct PublicQuizQuestion {
    pub id: i64,
    pub content: String,
    pub options: Json<Vec<String>>,
}

impl From<QuizQuestion> for PublicQuizQuestion {
    fn from(q: QuizQuestion) -> Self {
        Self {
            id: q.id,
            content: q.content,
            options: q.options,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuizDetailResponse {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<PublicQuizQuestion>,
}

fn default_difficulty() -> String {
    "medium".to_string()
}

fn validate_difficulty(difficulty: &str) -> Result<(), validator::ValidationError> {
    match difficulty {
        "easy" | "medium" | "hard" => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_difficulty")),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 50))]
    pub topic: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    #[validate(custom(function = validate_difficulty))]
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[validate(range(min = 10, max = 10800))]
    pub time_limit_secs: Option<i32>,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

fn default_true() -> bool {
    true
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[validate(custom(function = validate_string_list))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500))]
    pub answer: String,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

impl CreateQuizQuestionRequest {
    pub fn answer_in_options(&self) -> bool {
        self.options.iter().any(|o| o == &self.answer)
    }
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    /// Key: question id. Value: selected option text.
    pub answers: std::collections::HashMap<i64, String>,
}

#[derive(Debug, Serialize)]
pub struct QuizResult {
    pub attempt_id: i64,
    pub score: i32,
    pub correct_count: i32,
    pub total_questions: i32,
    pub percentage: f64,
}

#[derive(Debug, Deserialize)]
pub struct QuizListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub topic: Option<String>,
    pub difficulty: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PracticeParams {
    pub topic: Option<String>,
    pub count: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct QuizLeaderboardRow {
    pub user_id: i64,
    pub name: String,
    pub score: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct QuizLeaderboardEntry {
    pub rank: usize,
    pub user_id: i64,
    pub name: String,
    pub score: i32,
    pub created_at: DateTime<Utc>,
}
