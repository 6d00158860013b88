use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::time::timestamp;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub subject: String,
    pub class_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub course_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub unit_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Teaching material metadata; the file itself is hosted elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    #[serde(rename = "_id")]
    pub id: String,
    pub lesson_id: String,
    pub name: String,
    pub file_path: String,
    pub content_type: String,
    pub language: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Mcq,
    ShortAnswer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Practice question stored in the "questions" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    pub lesson_id: String,
    pub question_text: String,
    pub question_type: QuestionType,
    /// Ordered choices, only meaningful for mcq
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub subject: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Question {
    /// Mastery topic key, `{subject}_{difficulty}`. Existing stored rows
    /// depend on this exact layout.
    pub fn topic(&self) -> String {
        format!("{}_{}", self.subject, self.difficulty.as_str())
    }
}

/// Question as shown to a student (no answer key)
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct QuestionView {
    pub id: String,
    pub lesson_id: String,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Option<Vec<String>>,
    pub difficulty: Difficulty,
    pub subject: String,
}

impl From<Question> for QuestionView {
    fn from(question: Question) -> Self {
        let options = match question.question_type {
            QuestionType::Mcq => question.options,
            QuestionType::ShortAnswer => None,
        };
        QuestionView {
            id: question.id,
            lesson_id: question.lesson_id,
            question_text: question.question_text,
            question_type: question.question_type,
            options,
            difficulty: question.difficulty,
            subject: question.subject,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Subject is required"))]
    pub subject: String,
    pub class_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUnitRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: String,
    pub course_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    pub unit_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMaterialRequest {
    pub lesson_id: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "File path is required"))]
    pub file_path: String,
    #[validate(length(min = 1, message = "Content type is required"))]
    pub content_type: String,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub lesson_id: String,
    #[validate(length(min = 1, message = "Question text is required"))]
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Option<Vec<String>>,
    #[validate(length(min = 1, message = "Correct answer is required"))]
    pub correct_answer: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[validate(length(min = 1, message = "Subject is required"))]
    pub subject: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CourseListQuery {
    pub class_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UnitListQuery {
    pub course_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LessonListQuery {
    pub unit_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MaterialListQuery {
    pub lesson_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestionListQuery {
    pub lesson_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(question_type: QuestionType) -> Question {
        Question {
            id: "q1".to_string(),
            lesson_id: "l1".to_string(),
            question_text: "2 + 2?".to_string(),
            question_type,
            options: Some(vec!["3".to_string(), "4".to_string()]),
            correct_answer: "4".to_string(),
            difficulty: Difficulty::Easy,
            subject: "Math".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn topic_joins_subject_and_difficulty() {
        assert_eq!(question(QuestionType::Mcq).topic(), "Math_easy");
    }

    #[test]
    fn view_keeps_options_only_for_mcq() {
        let mcq: QuestionView = question(QuestionType::Mcq).into();
        assert_eq!(mcq.options, Some(vec!["3".to_string(), "4".to_string()]));

        let short: QuestionView = question(QuestionType::ShortAnswer).into();
        assert_eq!(short.options, None);
    }
}
