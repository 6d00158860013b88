use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::time::{timestamp, timestamp_option};

/// Study session ("sessions" collection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub session_type: SessionType,
    #[serde(with = "timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "timestamp_option")]
    pub end_time: Option<DateTime<Utc>>,
    /// Minutes, filled in when the session ends
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub lesson_id: Option<String>,
    #[serde(default)]
    pub questions_attempted: u32,
    #[serde(default)]
    pub correct_answers: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Practice,
    Lesson,
    Review,
}

/// Per (user, lesson) progress ("progress" collection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub lesson_id: String,
    pub completion_percentage: f64,
    /// Minutes
    #[serde(default)]
    pub time_spent: f64,
    pub status: ProgressStatus,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Progress {
    pub fn record_id(user_id: &str, lesson_id: &str) -> String {
        format!("{}:{}", user_id, lesson_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub session_type: SessionType,
    pub lesson_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EndSessionRequest {
    #[serde(default)]
    pub questions_attempted: u32,
    #[serde(default)]
    pub correct_answers: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProgressRequest {
    #[validate(range(min = 0.0, max = 100.0, message = "Completion must be between 0 and 100"))]
    pub completion_percentage: f64,
    #[validate(range(min = 0.0, message = "Time spent cannot be negative"))]
    #[serde(default)]
    pub time_spent: f64,
    pub status: ProgressStatus,
}
