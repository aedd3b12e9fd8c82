// src/models/mod.rs

pub mod blog;
pub mod content;
pub mod course;
pub mod exam;
pub mod exam_record;
pub mod mentorship;
pub mod notification;
pub mod pagination;
pub mod payment;
pub mod quiz;
pub mod study_team;
pub mod task;
pub mod user;
