// src/models/exam.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::{
    attempt::{ExamConfig, ExamQuestion, ExamSection, QuestionType},
    error::AppError,
    utils::validation::validate_string_list,
};

pub const EXAM_COLUMNS: &str = "id, title, category, description, instructions, languages, \
     duration_minutes, is_published, created_by, created_at, updated_at";

pub const EXAM_QUESTION_COLUMNS: &str = "id, exam_id, section_id, question_type, content, options, \
     correct_answers, marks, negative_marks, tolerance, explanation, position";

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Exam {
    pub id: i64,
    pub title: String,
    /// Exam family, e.g. "UPSC", "SSC", "Banking".
    pub category: String,
    pub description: String,
    pub instructions: Json<Vec<String>>,
    /// Language codes the paper is offered in.
    pub languages: Json<Vec<String>>,
    pub duration_minutes: i32,
    pub is_published: bool,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Represents the 'exam_sections' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExamSectionRow {
    pub id: i64,
    pub exam_id: i64,
    pub title: String,
    pub position: i32,
}

/// Represents the 'exam_questions' table. Includes the answer key, so it is
/// only returned from admin endpoints.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExamQuestionRow {
    pub id: i64,
    pub exam_id: i64,
    pub section_id: i64,
    pub question_type: String,
    pub content: String,
    pub options: Json<Vec<String>>,
    pub correct_answers: Json<Vec<String>>,
    pub marks: f64,
    pub negative_marks: f64,
    pub tolerance: f64,
    pub explanation: Option<String>,
    pub position: i32,
}

/// Exam detail for candidates: the attempt config plus catalogue fields.
#[derive(Debug, Serialize)]
pub struct ExamDetailResponse {
    #[serde(flatten)]
    pub config: ExamConfig,
    pub category: String,
    pub description: String,
    pub question_count: usize,
    pub total_marks: f64,
}

/// Assembles the immutable attempt config from stored rows.
///
/// Sections keep the order they are given in (callers sort by position);
/// questions are grouped under their section in the given order.
pub fn build_exam_config(
    exam: &Exam,
    sections: Vec<ExamSectionRow>,
    questions: Vec<ExamQuestionRow>,
) -> Result<ExamConfig, AppError> {
    let mut by_section: HashMap<i64, Vec<ExamQuestion>> = HashMap::new();
    for row in questions {
        let question_type: QuestionType = row
            .question_type
            .parse()
            .map_err(AppError::InternalServerError)?;
        by_section.entry(row.section_id).or_default().push(ExamQuestion {
            id: row.id,
            section_id: row.section_id,
            question_type,
            content: row.content,
            options: row.options.0,
            marks: row.marks,
            negative_marks: row.negative_marks,
            correct_answers: row.correct_answers.0,
            tolerance: row.tolerance,
        });
    }

    let sections = sections
        .into_iter()
        .map(|s| ExamSection {
            questions: by_section.remove(&s.id).unwrap_or_default(),
            id: s.id,
            title: s.title,
        })
        .collect();

    Ok(ExamConfig {
        id: exam.id,
        title: exam.title.clone(),
        duration_minutes: u32::try_from(exam.duration_minutes).unwrap_or(0),
        instructions: exam.instructions.0.clone(),
        languages: exam.languages.0.clone(),
        sections,
    })
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

/// DTO for creating a new exam.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[validate(custom(function = validate_string_list))]
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: i32,
    #[serde(default)]
    pub is_published: bool,
}

/// DTO for updating an exam. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExamRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub instructions: Option<Vec<String>>,
    #[validate(custom(function = validate_string_list))]
    pub languages: Option<Vec<String>>,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSectionRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    pub position: Option<i32>,
}

/// DTO for adding a question to an exam section.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamQuestionRequest {
    pub section_id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 10))]
    pub correct_answers: Vec<String>,
    #[validate(range(min = 0.25, max = 100.0))]
    pub marks: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    #[serde(default)]
    pub negative_marks: f64,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub tolerance: f64,
    #[validate(length(max = 5000))]
    pub explanation: Option<String>,
    pub position: Option<i32>,
}

impl CreateExamQuestionRequest {
    /// Options as stored: surrounding whitespace removed.
    pub fn trimmed_options(&self) -> Vec<String> {
        self.options.iter().map(|o| o.trim().to_string()).collect()
    }

    /// Cross-field rules the derive cannot express.
    pub fn check_shape(&self) -> Result<(), AppError> {
        let bad = |msg: &str| Err(AppError::BadRequest(msg.to_string()));
        match self.question_type {
            QuestionType::Single | QuestionType::Multi => {
                if self.options.len() < 2 {
                    return bad("Choice questions need at least two options");
                }
                if validate_string_list(&self.options).is_err() {
                    return bad("Options must be non-blank and at most 500 characters");
                }
                let options = self.trimmed_options();
                if options.iter().enumerate().any(|(i, o)| options[..i].contains(o)) {
                    return bad("Options must be distinct");
                }
                if self
                    .correct_answers
                    .iter()
                    .any(|a| !options.iter().any(|o| o == a.trim()))
                {
                    return bad("Every correct answer must be one of the options");
                }
                if self.question_type == QuestionType::Single && self.correct_answers.len() != 1 {
                    return bad("Single choice questions have exactly one correct answer");
                }
            }
            QuestionType::Numeric => {
                if !self.options.is_empty() {
                    return bad("Numeric questions do not take options");
                }
                if self.correct_answers.len() != 1
                    || self.correct_answers[0].trim().parse::<f64>().is_err()
                {
                    return bad("Numeric questions need one numeric answer");
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ExamListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    /// Title search.
    pub q: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exam() -> Exam {
        Exam {
            id: 1,
            title: "Prelims Mock".into(),
            category: "UPSC".into(),
            description: String::new(),
            instructions: Json(vec![]),
            languages: Json(vec!["en".into()]),
            duration_minutes: 120,
            is_published: true,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn question_row(id: i64, section_id: i64, qt: &str) -> ExamQuestionRow {
        ExamQuestionRow {
            id,
            exam_id: 1,
            section_id,
            question_type: qt.into(),
            content: "?".into(),
            options: Json(vec!["A".into(), "B".into()]),
            correct_answers: Json(vec!["A".into()]),
            marks: 2.0,
            negative_marks: 0.66,
            tolerance: 0.0,
            explanation: None,
            position: 0,
        }
    }

    #[test]
    fn config_groups_questions_by_section() {
        let sections = vec![
            ExamSectionRow { id: 20, exam_id: 1, title: "Second".into(), position: 0 },
            ExamSectionRow { id: 10, exam_id: 1, title: "First".into(), position: 1 },
        ];
        let questions = vec![
            question_row(1, 10, "single"),
            question_row(2, 20, "multi"),
            question_row(3, 10, "single"),
            question_row(4, 99, "single"),
        ];
        let config = build_exam_config(&exam(), sections, questions).unwrap();
        assert_eq!(config.duration_secs(), 7200);
        assert_eq!(config.sections[0].id, 20);
        assert_eq!(config.sections[0].questions.len(), 1);
        let ids: Vec<i64> = config.sections[1].questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 3]);
        // Orphaned question 4 is dropped.
        assert_eq!(config.question_count(), 3);
    }

    #[test]
    fn config_rejects_unknown_question_type() {
        let sections = vec![ExamSectionRow { id: 10, exam_id: 1, title: "S".into(), position: 0 }];
        let err = build_exam_config(&exam(), sections, vec![question_row(1, 10, "essay")]);
        assert!(matches!(err, Err(AppError::InternalServerError(_))));
    }

    fn request(question_type: QuestionType, options: &[&str], answers: &[&str]) -> CreateExamQuestionRequest {
        CreateExamQuestionRequest {
            section_id: 1,
            question_type,
            content: "Capital of India?".into(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answers: answers.iter().map(|s| s.to_string()).collect(),
            marks: 2.0,
            negative_marks: 0.5,
            tolerance: 0.0,
            explanation: None,
            position: None,
        }
    }

    #[test]
    fn question_shape_rules() {
        assert!(request(QuestionType::Single, &["A", "B"], &["A"]).check_shape().is_ok());
        assert!(request(QuestionType::Single, &["A", "B"], &["A", "B"]).check_shape().is_err());
        assert!(request(QuestionType::Single, &["A"], &["A"]).check_shape().is_err());
        assert!(request(QuestionType::Multi, &["A", "B", "C"], &["A", "C"]).check_shape().is_ok());
        assert!(request(QuestionType::Multi, &["A", "B"], &["Z"]).check_shape().is_err());
        assert!(request(QuestionType::Numeric, &[], &["3.14"]).check_shape().is_ok());
        assert!(request(QuestionType::Numeric, &[], &["pi"]).check_shape().is_err());
        assert!(request(QuestionType::Numeric, &["A", "B"], &["1"]).check_shape().is_err());
    }

    #[test]
    fn padded_options_are_trimmed_and_matched() {
        let req = request(QuestionType::Single, &["Paris ", " London"], &["Paris"]);
        assert!(req.check_shape().is_ok());
        assert_eq!(req.trimmed_options(), vec!["Paris".to_string(), "London".to_string()]);

        let req = request(QuestionType::Multi, &["Paris ", "London"], &[" Paris", "London "]);
        assert!(req.check_shape().is_ok());
    }

    #[test]
    fn options_equal_after_trimming_are_rejected() {
        let err = request(QuestionType::Single, &["Paris", "Paris "], &["Paris"]).check_shape();
        assert!(matches!(err, Err(AppError::BadRequest(msg)) if msg == "Options must be distinct"));
    }

    #[test]
    fn marks_range_is_validated() {
        let mut req = request(QuestionType::Single, &["A", "B"], &["A"]);
        assert!(req.validate().is_ok());
        req.marks = 0.0;
        assert!(req.validate().is_err());
    }
}
