use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::time::{timestamp, timestamp_option};

/// Teacher-authored remediation record ("interventions" collection)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intervention {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub teacher_id: String,
    #[serde(default)]
    pub lesson_id: Option<String>,
    pub intervention_type: InterventionType,
    pub description: String,
    pub priority: InterventionPriority,
    pub status: InterventionStatus,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp_option")]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InterventionType {
    Remedial,
    Enrichment,
    AttentionNeeded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterventionPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl InterventionPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionPriority::Low => "low",
            InterventionPriority::Medium => "medium",
            InterventionPriority::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InterventionStatus {
    Pending,
    InProgress,
    Resolved,
}

impl InterventionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionStatus::Pending => "pending",
            InterventionStatus::InProgress => "in_progress",
            InterventionStatus::Resolved => "resolved",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            InterventionStatus::Pending => 0,
            InterventionStatus::InProgress => 1,
            InterventionStatus::Resolved => 2,
        }
    }

    /// Status only moves forward; resolved is terminal.
    pub fn can_transition_to(&self, next: InterventionStatus) -> bool {
        next.rank() > self.rank()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInterventionRequest {
    pub student_id: String,
    pub intervention_type: InterventionType,
    #[validate(length(min = 1, max = 2000, message = "Description must be between 1 and 2000 characters"))]
    pub description: String,
    #[serde(default)]
    pub priority: InterventionPriority,
    pub lesson_id: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct InterventionFilter {
    #[serde(alias = "status_filter")]
    pub status: Option<InterventionStatus>,
    #[serde(alias = "priority_filter")]
    pub priority: Option<InterventionPriority>,
}

impl InterventionFilter {
    pub fn matches(&self, intervention: &Intervention) -> bool {
        self.status.map_or(true, |s| s == intervention.status)
            && self.priority.map_or(true, |p| p == intervention.priority)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateInterventionRequest {
    pub status: InterventionStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InterventionSummary {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub lesson_id: Option<String>,
    pub intervention_type: InterventionType,
    pub priority: InterventionPriority,
    pub status: InterventionStatus,
    pub description: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp_option")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl InterventionSummary {
    pub fn new(intervention: Intervention, student_name: String) -> Self {
        InterventionSummary {
            id: intervention.id,
            student_id: intervention.student_id,
            student_name,
            lesson_id: intervention.lesson_id,
            intervention_type: intervention.intervention_type,
            priority: intervention.priority,
            status: intervention.status,
            description: intervention.description,
            created_at: intervention.created_at,
            resolved_at: intervention.resolved_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_moves_forward_only() {
        use InterventionStatus::{InProgress, Pending, Resolved};

        assert!(Pending.can_transition_to(InProgress));
        assert!(Pending.can_transition_to(Resolved));
        assert!(InProgress.can_transition_to(Resolved));

        assert!(!InProgress.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Resolved.can_transition_to(Pending));
        assert!(!Resolved.can_transition_to(InProgress));
        assert!(!Resolved.can_transition_to(Resolved));
    }
}
