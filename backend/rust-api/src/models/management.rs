use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::time::timestamp;

#[derive(Debug, Serialize, Deserialize)]
pub struct TeacherSummary {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub class_count: usize,
    pub student_count: usize,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudentSummary {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub class_name: Option<String>,
    pub teacher_name: Option<String>,
    pub mastery_score: f64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClassSummary {
    pub id: String,
    pub name: String,
    pub subject: String,
    pub teacher_name: String,
    pub student_count: usize,
    pub course_count: usize,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LessonSummary {
    pub id: String,
    pub title: String,
    pub unit_name: String,
    pub course_name: String,
    pub class_name: String,
    pub teacher_name: String,
    pub question_count: usize,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}
