use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::time::timestamp;

/// Class owned by one teacher, stored in the "classes" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub subject: String,
    pub teacher_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClassRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: String,

    #[validate(length(min = 1, message = "Subject is required"))]
    pub subject: String,
}

#[derive(Debug, Deserialize)]
pub struct EnrollStudentRequest {
    pub student_id: String,
}
