use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::time::timestamp;

/// One submission, append-only ("user_answers" collection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAnswer {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub question_id: String,
    pub answer: String,
    pub is_correct: bool,
    /// Seconds taken to answer
    #[serde(default)]
    pub time_taken: Option<f64>,
    #[serde(default)]
    pub hints_used: u32,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Per (user, topic) proficiency in [0, 100] ("masteries" collection)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mastery {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub topic: String,
    pub score: f64,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Mastery {
    pub fn record_id(user_id: &str, topic: &str) -> String {
        format!("{}:{}", user_id, topic)
    }

    pub fn empty(user_id: &str, topic: &str, now: DateTime<Utc>) -> Self {
        Mastery {
            id: Self::record_id(user_id, topic),
            user_id: user_id.to_string(),
            topic: topic.to_string(),
            score: 0.0,
            updated_at: now,
        }
    }
}

/// Points and streak, one row per user ("gamifications" collection)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Gamification {
    /// Same as the user id
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub points: i64,
    pub streak: u32,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Gamification {
    pub fn empty(user_id: &str, now: DateTime<Utc>) -> Self {
        Gamification {
            id: user_id.to_string(),
            user_id: user_id.to_string(),
            points: 0,
            streak: 0,
            badges: Vec::new(),
            updated_at: now,
        }
    }
}

/// Rows written by one submission
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub mastery: Mastery,
    pub gamification: Gamification,
    pub points_earned: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuestionQuery {
    pub lesson_id: Option<String>,
    pub unit_id: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    pub answer: String,
    /// Seconds spent on the question
    #[validate(range(min = 0.0, message = "Time taken cannot be negative"))]
    pub time_taken: Option<f64>,
    #[serde(default)]
    pub hints_used: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub is_correct: bool,
    pub correct_answer: String,
    pub explanation: String,
    pub points_earned: i64,
    pub mastery_increased: bool,
    pub current_streak: u32,
    pub total_points: i64,
}

#[derive(Debug, Deserialize)]
pub struct HintQuery {
    pub hint_level: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HintResponse {
    pub hint: String,
    pub hint_level: u32,
    pub total_hints: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MasteryLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl MasteryLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            MasteryLevel::Expert
        } else if score >= 60.0 {
            MasteryLevel::Advanced
        } else if score >= 40.0 {
            MasteryLevel::Intermediate
        } else {
            MasteryLevel::Beginner
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MasteryView {
    pub topic: String,
    pub score: f64,
    pub level: MasteryLevel,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GamificationSummary {
    pub points: i64,
    pub badges: Vec<String>,
    pub streak: u32,
}

impl From<Option<Gamification>> for GamificationSummary {
    fn from(row: Option<Gamification>) -> Self {
        match row {
            Some(row) => GamificationSummary {
                points: row.points,
                badges: row.badges,
                streak: row.streak,
            },
            None => GamificationSummary {
                points: 0,
                badges: Vec::new(),
                streak: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mastery_levels_follow_thresholds() {
        assert_eq!(MasteryLevel::from_score(0.0), MasteryLevel::Beginner);
        assert_eq!(MasteryLevel::from_score(39.9), MasteryLevel::Beginner);
        assert_eq!(MasteryLevel::from_score(40.0), MasteryLevel::Intermediate);
        assert_eq!(MasteryLevel::from_score(60.0), MasteryLevel::Advanced);
        assert_eq!(MasteryLevel::from_score(80.0), MasteryLevel::Expert);
        assert_eq!(MasteryLevel::from_score(100.0), MasteryLevel::Expert);
    }

    #[test]
    fn missing_gamification_row_summarises_to_zero() {
        let summary = GamificationSummary::from(None);
        assert_eq!(summary.points, 0);
        assert_eq!(summary.streak, 0);
        assert!(summary.badges.is_empty());
    }
}
