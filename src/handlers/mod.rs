// src/handlers/mod.rs

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod blog;
pub mod content;
pub mod course;
pub mod exam;
pub mod mentorship;
pub mod notification;
pub mod payment;
pub mod profile;
pub mod quiz;
pub mod study_team;
pub mod task;
