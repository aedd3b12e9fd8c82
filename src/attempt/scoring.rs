// src/attempt/scoring.rs

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{
    exam::{Answer, ExamConfig, ExamQuestion, QuestionType},
    session::QuestionState,
};

/// Per-section slice of an `ExamResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionResult {
    pub section_id: i64,
    pub title: String,
    pub total_questions: usize,
    pub attempted: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub score: f64,
    pub max_score: f64,
}

/// Summary computed once from the question states and the answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResult {
    pub exam_id: i64,
    pub total_questions: usize,
    pub attempted: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub unattempted: usize,
    pub marked_for_review: usize,
    /// Marks for correct answers minus negative marks for incorrect ones. May be negative.
    pub score: f64,
    pub max_score: f64,
    /// `score / max_score`, clamped to 0..=100 and rounded to two decimals.
    pub percentage: f64,
    pub time_taken_secs: u64,
    pub sections: Vec<SectionResult>,
}

/// Compares a normalized answer with the key.
pub fn is_correct(question: &ExamQuestion, answer: &Answer) -> bool {
    match (question.question_type, answer) {
        (QuestionType::Single, Answer::Choice(choice)) => question
            .correct_answers
            .first()
            .is_some_and(|key| key.trim() == choice.trim()),
        (QuestionType::Multi, Answer::Choices(choices)) => {
            let given: HashSet<&str> = choices.iter().map(|c| c.trim()).collect();
            let key: HashSet<&str> = question.correct_answers.iter().map(|c| c.trim()).collect();
            !key.is_empty() && given == key
        }
        (QuestionType::Numeric, Answer::Numeric(value)) => question
            .correct_answers
            .first()
            .and_then(|key| key.trim().parse::<f64>().ok())
            .is_some_and(|key| (value - key).abs() <= question.tolerance + f64::EPSILON),
        _ => false,
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Single pass over the exam's questions. Questions with no state count as unattempted.
pub fn evaluate(
    config: &ExamConfig,
    states: &HashMap<i64, QuestionState>,
    time_taken_secs: u64,
) -> ExamResult {
    let mut sections = Vec::with_capacity(config.sections.len());

    for section in &config.sections {
        let mut slice = SectionResult {
            section_id: section.id,
            title: section.title.clone(),
            total_questions: section.questions.len(),
            attempted: 0,
            correct: 0,
            incorrect: 0,
            score: 0.0,
            max_score: 0.0,
        };

        for question in &section.questions {
            slice.max_score += question.marks;
            let Some(answer) = states.get(&question.id).and_then(|s| s.answer.as_ref()) else {
                continue;
            };
            slice.attempted += 1;
            if is_correct(question, answer) {
                slice.correct += 1;
                slice.score += question.marks;
            } else {
                slice.incorrect += 1;
                slice.score -= question.negative_marks;
            }
        }

        sections.push(slice);
    }

    let total_questions = config.question_count();
    let attempted: usize = sections.iter().map(|s| s.attempted).sum();
    let correct = sections.iter().map(|s| s.correct).sum();
    let incorrect = sections.iter().map(|s| s.incorrect).sum();
    let score: f64 = sections.iter().map(|s| s.score).sum();
    let max_score: f64 = sections.iter().map(|s| s.max_score).sum();
    let marked_for_review = config
        .ordered_questions()
        .filter(|(_, q)| states.get(&q.id).is_some_and(|s| s.marked))
        .count();

    let percentage = if max_score > 0.0 {
        round2((score / max_score * 100.0).clamp(0.0, 100.0))
    } else {
        0.0
    };

    ExamResult {
        exam_id: config.id,
        total_questions,
        attempted,
        correct,
        incorrect,
        unattempted: total_questions - attempted,
        marked_for_review,
        score: round2(score),
        max_score,
        percentage,
        time_taken_secs,
        sections,
    }
}
