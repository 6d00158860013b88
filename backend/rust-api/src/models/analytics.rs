use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::activity::SessionType;
use crate::utils::time::timestamp;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DashboardMetrics {
    pub total_students: usize,
    pub active_students_today: usize,
    pub average_mastery_score: f64,
    pub total_questions_attempted: u64,
    pub completion_rate: f64,
    pub top_performing_students: Vec<TopPerformer>,
}

impl DashboardMetrics {
    pub fn empty() -> Self {
        DashboardMetrics {
            total_students: 0,
            active_students_today: 0,
            average_mastery_score: 0.0,
            total_questions_attempted: 0,
            completion_rate: 0.0,
            top_performing_students: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopPerformer {
    pub id: String,
    pub name: String,
    pub average_mastery: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudentInsight {
    pub student_id: String,
    pub student_name: String,
    pub mastery_scores: BTreeMap<String, f64>,
    pub recent_activity: Vec<RecentActivity>,
    pub progress_rate: f64,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentActivity {
    #[serde(rename = "type")]
    pub session_type: SessionType,
    #[serde(with = "timestamp")]
    pub start_time: DateTime<Utc>,
    pub duration: Option<f64>,
    pub questions_attempted: u32,
    pub correct_answers: u32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LessonProgress {
    pub lesson_id: String,
    pub lesson_title: String,
    pub average_completion: f64,
    pub struggling_students: usize,
    pub completed_students: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PlatformOverview {
    pub total_teachers: u64,
    pub total_students: u64,
    pub total_classes: u64,
    pub total_lessons: u64,
    pub active_students_today: usize,
    pub average_mastery_score: f64,
}
