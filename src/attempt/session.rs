// src/attempt/session.rs

use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::{
    exam::{Answer, ExamConfig, ExamQuestion, QuestionType},
    scoring::{self, ExamResult},
    timer::{Countdown, TimerEvent},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionStatus {
    NotVisited,
    NotAnswered,
    Answered,
    MarkedForReview,
    AnsweredAndMarked,
}

/// Per-question bookkeeping for one attempt.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionState {
    pub status: QuestionStatus,
    pub answer: Option<Answer>,
    pub time_spent_secs: u64,
    pub marked: bool,
    #[serde(skip)]
    visited: bool,
}

impl QuestionState {
    fn new() -> Self {
        Self {
            status: QuestionStatus::NotVisited,
            answer: None,
            time_spent_secs: 0,
            marked: false,
            visited: false,
        }
    }

    fn refresh_status(&mut self) {
        self.status = match (self.answer.is_some(), self.marked) {
            (true, true) => QuestionStatus::AnsweredAndMarked,
            (true, false) => QuestionStatus::Answered,
            (false, true) => QuestionStatus::MarkedForReview,
            (false, false) if self.visited => QuestionStatus::NotAnswered,
            (false, false) => QuestionStatus::NotVisited,
        };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    AlreadySubmitted,
    Paused,
    EmptyExam,
    UnknownQuestion(i64),
    UnknownSection(usize),
    OutOfRange(usize),
    UnsupportedLanguage(String),
    InvalidAnswer { question_id: i64, reason: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AlreadySubmitted => write!(f, "attempt already submitted"),
            SessionError::Paused => write!(f, "attempt is paused"),
            SessionError::EmptyExam => write!(f, "exam has no questions"),
            SessionError::UnknownQuestion(id) => write!(f, "question {id} is not part of this exam"),
            SessionError::UnknownSection(idx) => write!(f, "section index {idx} does not exist"),
            SessionError::OutOfRange(idx) => write!(f, "question index {idx} is out of range"),
            SessionError::UnsupportedLanguage(lang) => write!(f, "language '{lang}' is not offered"),
            SessionError::InvalidAnswer { question_id, reason } => {
                write!(f, "invalid answer for question {question_id}: {reason}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Live state of a single exam attempt: navigation, answers, marks and the countdown.
#[derive(Debug, Clone)]
pub struct ExamSessionState {
    config: Arc<ExamConfig>,
    /// (section index, question id) in navigation order.
    order: Vec<(usize, i64)>,
    current: usize,
    states: HashMap<i64, QuestionState>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    countdown: Countdown,
    language: String,
    submitted: bool,
}

impl ExamSessionState {
    /// Opens an attempt on the first question, which counts as visited.
    pub fn start(
        config: Arc<ExamConfig>,
        language: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if !config.supports_language(language) {
            return Err(SessionError::UnsupportedLanguage(language.to_string()));
        }
        let order: Vec<(usize, i64)> = config.ordered_questions().map(|(s, q)| (s, q.id)).collect();
        if order.is_empty() {
            return Err(SessionError::EmptyExam);
        }
        let states = order.iter().map(|&(_, id)| (id, QuestionState::new())).collect();
        let countdown = Countdown::new(config.duration_secs());

        let mut session = Self {
            config,
            order,
            current: 0,
            states,
            started_at,
            ended_at: None,
            countdown,
            language: language.to_string(),
            submitted: false,
        };
        session.visit(0);
        Ok(session)
    }

    pub fn config(&self) -> &ExamConfig {
        &self.config
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question_id(&self) -> i64 {
        self.order[self.current].1
    }

    pub fn current_section_index(&self) -> usize {
        self.order[self.current].0
    }

    pub fn state(&self, question_id: i64) -> Option<&QuestionState> {
        self.states.get(&question_id)
    }

    pub fn states(&self) -> &HashMap<i64, QuestionState> {
        &self.states
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn remaining_secs(&self) -> u64 {
        self.countdown.remaining_secs()
    }

    pub fn is_paused(&self) -> bool {
        self.countdown.is_paused()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn is_timed_out(&self) -> bool {
        self.countdown.is_expired()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.submitted {
            return Err(SessionError::AlreadySubmitted);
        }
        if self.countdown.is_paused() {
            return Err(SessionError::Paused);
        }
        Ok(())
    }

    fn visit(&mut self, index: usize) {
        self.current = index;
        let id = self.order[index].1;
        if let Some(state) = self.states.get_mut(&id) {
            state.visited = true;
            state.refresh_status();
        }
    }

    fn state_mut(&mut self, question_id: i64) -> Result<&mut QuestionState, SessionError> {
        self.states
            .get_mut(&question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))
    }

    pub fn go_to(&mut self, index: usize) -> Result<i64, SessionError> {
        self.ensure_open()?;
        if index >= self.order.len() {
            return Err(SessionError::OutOfRange(index));
        }
        self.visit(index);
        Ok(self.current_question_id())
    }

    pub fn go_to_question(&mut self, question_id: i64) -> Result<(), SessionError> {
        let index = self
            .order
            .iter()
            .position(|&(_, id)| id == question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;
        self.go_to(index).map(|_| ())
    }

    /// Moves forward; returns `false` (and stays put) on the last question.
    pub fn next(&mut self) -> Result<bool, SessionError> {
        self.ensure_open()?;
        if self.current + 1 >= self.order.len() {
            return Ok(false);
        }
        self.visit(self.current + 1);
        Ok(true)
    }

    /// Moves back; returns `false` (and stays put) on the first question.
    pub fn previous(&mut self) -> Result<bool, SessionError> {
        self.ensure_open()?;
        if self.current == 0 {
            return Ok(false);
        }
        self.visit(self.current - 1);
        Ok(true)
    }

    /// Jumps to the first question of a section.
    pub fn go_to_section(&mut self, section_index: usize) -> Result<i64, SessionError> {
        self.ensure_open()?;
        let index = self
            .order
            .iter()
            .position(|&(s, _)| s == section_index)
            .ok_or(SessionError::UnknownSection(section_index))?;
        self.visit(index);
        Ok(self.current_question_id())
    }

    pub fn select_answer(&mut self, question_id: i64, answer: Answer) -> Result<(), SessionError> {
        self.ensure_open()?;
        let question = self
            .config
            .question(question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;
        let answer = normalize_answer(question, answer)?;

        let state = self.state_mut(question_id)?;
        state.visited = true;
        state.answer = Some(answer);
        state.refresh_status();
        Ok(())
    }

    pub fn clear_response(&mut self, question_id: i64) -> Result<(), SessionError> {
        self.ensure_open()?;
        let state = self.state_mut(question_id)?;
        state.answer = None;
        state.refresh_status();
        Ok(())
    }

    /// Flips the marked-for-review flag and returns its new value.
    pub fn toggle_mark(&mut self, question_id: i64) -> Result<bool, SessionError> {
        self.ensure_open()?;
        let state = self.state_mut(question_id)?;
        state.visited = true;
        state.marked = !state.marked;
        state.refresh_status();
        Ok(state.marked)
    }

    pub fn set_language(&mut self, language: &str) -> Result<(), SessionError> {
        if self.submitted {
            return Err(SessionError::AlreadySubmitted);
        }
        if !self.config.supports_language(language) {
            return Err(SessionError::UnsupportedLanguage(language.to_string()));
        }
        self.language = language.to_string();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.submitted {
            return Err(SessionError::AlreadySubmitted);
        }
        self.countdown.pause();
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.submitted {
            return Err(SessionError::AlreadySubmitted);
        }
        self.countdown.resume();
        Ok(())
    }

    /// Advances the clock. Time is credited to the current question; reaching
    /// zero submits the attempt.
    pub fn tick(&mut self, elapsed_secs: u64) -> Result<Vec<TimerEvent>, SessionError> {
        if self.submitted {
            return Err(SessionError::AlreadySubmitted);
        }
        if self.countdown.is_paused() {
            return Ok(Vec::new());
        }

        let credited = elapsed_secs.min(self.countdown.remaining_secs());
        let current = self.current_question_id();
        if let Some(state) = self.states.get_mut(&current) {
            state.time_spent_secs += credited;
        }

        let events = self.countdown.tick(elapsed_secs);
        if events.contains(&TimerEvent::TimeUp) {
            self.close(self.started_at + secs(self.countdown.elapsed_secs()));
        }
        Ok(events)
    }

    pub fn submit(&mut self, at: DateTime<Utc>) -> Result<(), SessionError> {
        if self.submitted {
            return Err(SessionError::AlreadySubmitted);
        }
        self.close(at);
        Ok(())
    }

    fn close(&mut self, at: DateTime<Utc>) {
        self.submitted = true;
        self.ended_at = Some(at);
    }

    /// Seconds between start and submission, capped at the exam duration.
    pub fn time_taken_secs(&self) -> u64 {
        let end = self.ended_at.unwrap_or(self.started_at);
        let taken = (end - self.started_at).num_seconds().max(0) as u64;
        taken.min(self.config.duration_secs())
    }

    pub fn result(&self) -> ExamResult {
        scoring::evaluate(&self.config, &self.states, self.time_taken_secs())
    }

    /// Rebuilds a finished attempt from a flat submission.
    ///
    /// Answers for unknown questions or of the wrong shape are rejected. The
    /// countdown is advanced by the elapsed wall time, so a submission past the
    /// duration is reported as timed out.
    pub fn replay(
        config: Arc<ExamConfig>,
        submission: &Submission,
        started_at: DateTime<Utc>,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        let mut session = Self::start(config, &submission.language, started_at)?;

        for (&question_id, answer) in &submission.answers {
            session.select_answer(question_id, answer.clone())?;
        }
        for &question_id in &submission.marked {
            let state = session.state_mut(question_id)?;
            if !state.marked {
                session.toggle_mark(question_id)?;
            }
        }
        for (&question_id, &spent) in &submission.time_spent {
            let state = session.state_mut(question_id)?;
            state.visited = true;
            state.time_spent_secs = spent;
            state.refresh_status();
        }

        let elapsed = (submitted_at - started_at).num_seconds().max(0) as u64;
        session.countdown.tick(elapsed);
        if session.countdown.is_expired() {
            let cutoff = started_at + secs(session.countdown.elapsed_secs());
            session.close(cutoff.min(submitted_at));
        } else {
            session.close(submitted_at);
        }
        Ok(session)
    }
}

/// Flat answer payload posted by a client at the end of an attempt.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub language: String,
    pub answers: HashMap<i64, Answer>,
    pub marked: Vec<i64>,
    pub time_spent: HashMap<i64, u64>,
}

impl Submission {
    /// Removes entries for questions that are not part of `config`, returning
    /// how many answers were dropped.
    pub fn retain_known(&mut self, config: &ExamConfig) -> usize {
        let before = self.answers.len();
        self.answers.retain(|id, _| config.question(*id).is_some());
        self.marked.retain(|id| config.question(*id).is_some());
        self.time_spent.retain(|id, _| config.question(*id).is_some());
        before - self.answers.len()
    }
}

fn secs(n: u64) -> Duration {
    Duration::seconds(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Checks an answer against the question's type and options, returning the
/// canonical form (trimmed, de-duplicated, numeric strings parsed).
fn normalize_answer(question: &ExamQuestion, answer: Answer) -> Result<Answer, SessionError> {
    let invalid = |reason: &str| SessionError::InvalidAnswer {
        question_id: question.id,
        reason: reason.to_string(),
    };
    // Stored options may carry padding.
    let is_option = |choice: &str| question.options.iter().any(|o| o.trim() == choice);

    match (question.question_type, answer) {
        (QuestionType::Single, Answer::Choice(choice)) => {
            let choice = choice.trim().to_string();
            if !is_option(&choice) {
                return Err(invalid("not one of the options"));
            }
            Ok(Answer::Choice(choice))
        }
        (QuestionType::Multi, Answer::Choices(choices)) => {
            let mut picked: Vec<String> = Vec::with_capacity(choices.len());
            for choice in choices {
                let choice = choice.trim().to_string();
                if !is_option(&choice) {
                    return Err(invalid("not one of the options"));
                }
                if !picked.contains(&choice) {
                    picked.push(choice);
                }
            }
            if picked.is_empty() {
                return Err(invalid("select at least one option"));
            }
            Ok(Answer::Choices(picked))
        }
        (QuestionType::Numeric, Answer::Numeric(value)) if value.is_finite() => {
            Ok(Answer::Numeric(value))
        }
        (QuestionType::Numeric, Answer::Choice(raw)) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Answer::Numeric)
            .ok_or_else(|| invalid("expected a number")),
        (QuestionType::Numeric, _) => Err(invalid("expected a number")),
        (QuestionType::Single, _) => Err(invalid("expected a single option")),
        (QuestionType::Multi, _) => Err(invalid("expected a list of options")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::exam::fixtures::sample_config;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn session() -> ExamSessionState {
        ExamSessionState::start(Arc::new(sample_config()), "en", t0()).unwrap()
    }

    #[test]
    fn start_visits_first_question_only() {
        let s = session();
        assert_eq!(s.current_question_id(), 1);
        assert_eq!(s.state(1).unwrap().status, QuestionStatus::NotAnswered);
        assert_eq!(s.state(2).unwrap().status, QuestionStatus::NotVisited);
        assert_eq!(s.remaining_secs(), 600);
    }

    #[test]
    fn start_rejects_unknown_language_and_empty_exam() {
        let err = ExamSessionState::start(Arc::new(sample_config()), "fr", t0()).unwrap_err();
        assert_eq!(err, SessionError::UnsupportedLanguage("fr".into()));

        let mut empty = sample_config();
        empty.sections.clear();
        let err = ExamSessionState::start(Arc::new(empty), "en", t0()).unwrap_err();
        assert_eq!(err, SessionError::EmptyExam);
    }

    #[test]
    fn status_transitions() {
        let mut s = session();
        s.select_answer(1, Answer::Choice("B".into())).unwrap();
        assert_eq!(s.state(1).unwrap().status, QuestionStatus::Answered);

        assert!(s.toggle_mark(1).unwrap());
        assert_eq!(s.state(1).unwrap().status, QuestionStatus::AnsweredAndMarked);

        s.clear_response(1).unwrap();
        assert_eq!(s.state(1).unwrap().status, QuestionStatus::MarkedForReview);

        assert!(!s.toggle_mark(1).unwrap());
        assert_eq!(s.state(1).unwrap().status, QuestionStatus::NotAnswered);
    }

    #[test]
    fn navigation_saturates_and_jumps_sections() {
        let mut s = session();
        assert!(!s.previous().unwrap());
        assert!(s.next().unwrap());
        assert_eq!(s.current_question_id(), 2);
        assert_eq!(s.state(2).unwrap().status, QuestionStatus::NotAnswered);

        assert_eq!(s.go_to_section(1).unwrap(), 3);
        assert_eq!(s.current_section_index(), 1);
        assert!(s.next().unwrap());
        assert!(!s.next().unwrap());
        assert_eq!(s.current_question_id(), 4);

        assert_eq!(s.go_to(9), Err(SessionError::OutOfRange(9)));
        assert_eq!(s.go_to_section(5), Err(SessionError::UnknownSection(5)));
        s.go_to_question(2).unwrap();
        assert_eq!(s.current_index(), 1);
    }

    #[test]
    fn answers_are_validated_against_question_type() {
        let mut s = session();
        assert!(matches!(
            s.select_answer(1, Answer::Choice("Z".into())),
            Err(SessionError::InvalidAnswer { question_id: 1, .. })
        ));
        assert!(s.select_answer(1, Answer::Choices(vec!["A".into()])).is_err());
        assert!(s.select_answer(2, Answer::Choices(vec![])).is_err());
        assert_eq!(
            s.select_answer(42, Answer::Choice("A".into())),
            Err(SessionError::UnknownQuestion(42))
        );

        s.select_answer(2, Answer::Choices(vec!["C".into(), " A".into(), "C".into()])).unwrap();
        assert_eq!(
            s.state(2).unwrap().answer,
            Some(Answer::Choices(vec!["C".into(), "A".into()]))
        );

        s.select_answer(3, Answer::Choice(" 9.8 ".into())).unwrap();
        assert_eq!(s.state(3).unwrap().answer, Some(Answer::Numeric(9.8)));
        assert!(s.select_answer(3, Answer::Numeric(f64::NAN)).is_err());
    }

    #[test]
    fn tick_credits_current_question_and_auto_submits() {
        let mut s = session();
        s.tick(30).unwrap();
        s.next().unwrap();
        s.tick(15).unwrap();
        assert_eq!(s.state(1).unwrap().time_spent_secs, 30);
        assert_eq!(s.state(2).unwrap().time_spent_secs, 15);

        let events = s.tick(1_000).unwrap();
        assert_eq!(events.last(), Some(&TimerEvent::TimeUp));
        assert!(s.is_submitted());
        assert!(s.is_timed_out());
        // Only the time that was actually left is credited.
        assert_eq!(s.state(2).unwrap().time_spent_secs, 15 + 555);
        assert_eq!(s.ended_at(), Some(t0() + Duration::seconds(600)));
        assert_eq!(s.time_taken_secs(), 600);
        assert_eq!(s.tick(1), Err(SessionError::AlreadySubmitted));
    }

    #[test]
    fn pause_blocks_mutation_and_time() {
        let mut s = session();
        s.pause().unwrap();
        assert!(s.tick(100).unwrap().is_empty());
        assert_eq!(s.remaining_secs(), 600);
        assert_eq!(s.select_answer(1, Answer::Choice("A".into())), Err(SessionError::Paused));
        s.resume().unwrap();
        s.select_answer(1, Answer::Choice("A".into())).unwrap();
    }

    #[test]
    fn submit_closes_the_session() {
        let mut s = session();
        s.set_language("hi").unwrap();
        assert_eq!(s.language(), "hi");
        assert!(s.set_language("fr").is_err());

        s.submit(t0() + Duration::seconds(90)).unwrap();
        assert_eq!(s.submit(t0()), Err(SessionError::AlreadySubmitted));
        assert_eq!(s.next(), Err(SessionError::AlreadySubmitted));
        assert_eq!(s.time_taken_secs(), 90);
    }

    #[test]
    fn replay_rebuilds_states() {
        let mut submission = Submission {
            language: "en".into(),
            ..Default::default()
        };
        submission.answers.insert(1, Answer::Choice("A".into()));
        submission.answers.insert(3, Answer::Numeric(9.81));
        submission.marked = vec![3, 4];
        submission.time_spent.insert(2, 40);

        let s = ExamSessionState::replay(
            Arc::new(sample_config()),
            &submission,
            t0(),
            t0() + Duration::seconds(300),
        )
        .unwrap();

        assert!(s.is_submitted());
        assert!(!s.is_timed_out());
        assert_eq!(s.state(1).unwrap().status, QuestionStatus::Answered);
        assert_eq!(s.state(2).unwrap().status, QuestionStatus::NotAnswered);
        assert_eq!(s.state(2).unwrap().time_spent_secs, 40);
        assert_eq!(s.state(3).unwrap().status, QuestionStatus::AnsweredAndMarked);
        assert_eq!(s.state(4).unwrap().status, QuestionStatus::MarkedForReview);
        assert_eq!(s.time_taken_secs(), 300);
    }

    #[test]
    fn late_replay_is_capped_at_duration() {
        let submission = Submission {
            language: "en".into(),
            ..Default::default()
        };
        let s = ExamSessionState::replay(
            Arc::new(sample_config()),
            &submission,
            t0(),
            t0() + Duration::seconds(900),
        )
        .unwrap();
        assert!(s.is_timed_out());
        assert_eq!(s.ended_at(), Some(t0() + Duration::seconds(600)));
        assert_eq!(s.time_taken_secs(), 600);
    }

    #[test]
    fn replay_rejects_foreign_questions() {
        let mut submission = Submission {
            language: "en".into(),
            ..Default::default()
        };
        submission.marked = vec![99];
        let err = ExamSessionState::replay(Arc::new(sample_config()), &submission, t0(), t0())
            .unwrap_err();
        assert_eq!(err, SessionError::UnknownQuestion(99));
    }

    #[test]
    fn removed_questions_are_pruned_before_replay() {
        let mut submission = Submission {
            language: "en".into(),
            ..Default::default()
        };
        submission.answers.insert(1, Answer::Choice("A".into()));
        submission.answers.insert(99, Answer::Choice("A".into()));
        submission.marked = vec![4, 99];
        submission.time_spent.insert(99, 30);

        let config = Arc::new(sample_config());
        assert_eq!(submission.retain_known(&config), 1);
        assert_eq!(submission.marked, vec![4]);
        assert!(submission.time_spent.is_empty());

        let s = ExamSessionState::replay(config, &submission, t0(), t0() + Duration::seconds(60))
            .unwrap();
        assert_eq!(s.result().correct, 1);
    }

    #[test]
    fn padded_option_is_selectable() {
        let mut config = sample_config();
        let question = &mut config.sections[0].questions[0];
        question.options = vec!["Paris ".into(), "London".into()];
        question.correct_answers = vec!["Paris".into()];

        let mut s = ExamSessionState::start(Arc::new(config), "en", t0()).unwrap();
        s.select_answer(1, Answer::Choice("Paris ".into())).unwrap();
        assert_eq!(s.state(1).unwrap().answer, Some(Answer::Choice("Paris".into())));
        assert_eq!(s.result().correct, 1);
    }
}
