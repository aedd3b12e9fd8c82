//! Exam attempt domain model.
//!
//! An attempt is tracked by an [`session::ExamSessionState`] built over an
//! immutable [`exam::ExamConfig`]. Clients drive it interactively; the server
//! rebuilds one from a flat submission with [`session::ExamSessionState::replay`]
//! and scores it into an [`scoring::ExamResult`].

pub mod exam;
pub mod scoring;
pub mod session;
pub mod timer;

pub use exam::{Answer, ExamConfig, ExamQuestion, ExamSection, QuestionType};
pub use scoring::{ExamResult, SectionResult};
pub use session::{ExamSessionState, QuestionState, QuestionStatus, SessionError, Submission};
pub use timer::{Countdown, TimerEvent};
