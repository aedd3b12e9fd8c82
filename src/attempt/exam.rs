// src/attempt/exam.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    /// Exactly one option.
    Single,
    /// One or more options; scored by set equality.
    Multi,
    /// Free numeric entry, scored within a tolerance.
    Numeric,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Single => "single",
            QuestionType::Multi => "multi",
            QuestionType::Numeric => "numeric",
        }
    }

    pub fn has_options(&self) -> bool {
        !matches!(self, QuestionType::Numeric)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(QuestionType::Single),
            "multi" => Ok(QuestionType::Multi),
            "numeric" => Ok(QuestionType::Numeric),
            other => Err(format!("unknown question type '{other}'")),
        }
    }
}

/// A candidate's response. Wire form: a string, an array of strings, or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Choice(String),
    Choices(Vec<String>),
    Numeric(f64),
}

/// One question of an exam. Immutable once loaded.
#[derive(Debug, Clone, Serialize)]
pub struct ExamQuestion {
    pub id: i64,
    pub section_id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub options: Vec<String>,
    pub marks: f64,
    pub negative_marks: f64,

    /// Answer key. Never serialized, so an `ExamConfig` is safe to send to candidates.
    #[serde(skip_serializing)]
    pub correct_answers: Vec<String>,
    #[serde(skip_serializing)]
    pub tolerance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamSection {
    pub id: i64,
    pub title: String,
    pub questions: Vec<ExamQuestion>,
}

/// Static description of an exam: ordered sections, instructions and languages.
#[derive(Debug, Clone, Serialize)]
pub struct ExamConfig {
    pub id: i64,
    pub title: String,
    pub duration_minutes: u32,
    pub instructions: Vec<String>,
    pub languages: Vec<String>,
    pub sections: Vec<ExamSection>,
}

impl ExamConfig {
    pub fn duration_secs(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    /// Questions in navigation order, paired with their section index.
    pub fn ordered_questions(&self) -> impl Iterator<Item = (usize, &ExamQuestion)> {
        self.sections
            .iter()
            .enumerate()
            .flat_map(|(idx, s)| s.questions.iter().map(move |q| (idx, q)))
    }

    pub fn question(&self, id: i64) -> Option<&ExamQuestion> {
        self.ordered_questions().map(|(_, q)| q).find(|q| q.id == id)
    }

    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    pub fn total_marks(&self) -> f64 {
        self.ordered_questions().map(|(_, q)| q.marks).sum()
    }

    pub fn supports_language(&self, language: &str) -> bool {
        self.languages.iter().any(|l| l == language)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn question(id: i64, section_id: i64, question_type: QuestionType, key: &[&str]) -> ExamQuestion {
        let options = match question_type {
            QuestionType::Numeric => Vec::new(),
            _ => vec!["A".into(), "B".into(), "C".into(), "D".into()],
        };
        ExamQuestion {
            id,
            section_id,
            question_type,
            content: format!("Question {id}"),
            options,
            marks: 4.0,
            negative_marks: 1.0,
            correct_answers: key.iter().map(|s| s.to_string()).collect(),
            tolerance: 0.01,
        }
    }

    /// Two sections: [1 single "A", 2 multi {"A","C"}] and [3 numeric 9.81, 4 single "D"].
    pub fn sample_config() -> ExamConfig {
        ExamConfig {
            id: 7,
            title: "Mock Test".into(),
            duration_minutes: 10,
            instructions: vec!["Read carefully".into()],
            languages: vec!["en".into(), "hi".into()],
            sections: vec![
                ExamSection {
                    id: 100,
                    title: "General Studies".into(),
                    questions: vec![
                        question(1, 100, QuestionType::Single, &["A"]),
                        question(2, 100, QuestionType::Multi, &["A", "C"]),
                    ],
                },
                ExamSection {
                    id: 200,
                    title: "Aptitude".into(),
                    questions: vec![
                        question(3, 200, QuestionType::Numeric, &["9.81"]),
                        question(4, 200, QuestionType::Single, &["D"]),
                    ],
                },
            ],
        }
    }
}
