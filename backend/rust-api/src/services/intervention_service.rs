use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::store::Store;
use crate::error::{AppError, AppResult};
use crate::metrics::INTERVENTION_TRANSITIONS_TOTAL;
use crate::models::intervention::{
    CreateInterventionRequest, Intervention, InterventionFilter, InterventionStatus,
    InterventionSummary,
};

const UNKNOWN_STUDENT: &str = "Unknown";

pub struct InterventionService {
    store: Arc<dyn Store>,
}

impl InterventionService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_intervention(
        &self,
        teacher_id: &str,
        req: CreateInterventionRequest,
    ) -> AppResult<Intervention> {
        req.validate()?;

        let student = self
            .store
            .find_user(&req.student_id)
            .await?
            .filter(|u| u.is_student())
            .ok_or_else(|| AppError::not_found("Student not found"))?;

        let owns_class = match &student.class_id {
            Some(class_id) => self
                .store
                .find_class(class_id)
                .await?
                .map_or(false, |class| class.teacher_id == teacher_id),
            None => false,
        };
        if !owns_class {
            tracing::warn!(
                "Teacher {} cannot open an intervention for student {}",
                teacher_id,
                student.id
            );
            return Err(AppError::forbidden("Access denied"));
        }

        if let Some(lesson_id) = &req.lesson_id {
            if self.store.find_lesson(lesson_id).await?.is_none() {
                return Err(AppError::not_found("Lesson not found"));
            }
        }

        let intervention = Intervention {
            id: Uuid::new_v4().to_string(),
            student_id: student.id,
            teacher_id: teacher_id.to_string(),
            lesson_id: req.lesson_id,
            intervention_type: req.intervention_type,
            description: req.description,
            priority: req.priority,
            status: InterventionStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        };
        self.store.insert_intervention(&intervention).await?;
        tracing::info!(
            "Intervention {} created for student {} (priority {})",
            intervention.id,
            intervention.student_id,
            intervention.priority.as_str()
        );

        Ok(intervention)
    }

    pub async fn list_interventions(
        &self,
        teacher_id: &str,
        filter: &InterventionFilter,
    ) -> AppResult<Vec<InterventionSummary>> {
        let interventions = self.store.list_interventions(teacher_id, filter).await?;

        let mut student_ids: Vec<String> =
            interventions.iter().map(|i| i.student_id.clone()).collect();
        student_ids.sort();
        student_ids.dedup();
        let names: HashMap<String, String> = self
            .store
            .find_users(&student_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.full_name))
            .collect();

        Ok(interventions
            .into_iter()
            .map(|intervention| {
                let name = names
                    .get(&intervention.student_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_STUDENT.to_string());
                InterventionSummary::new(intervention, name)
            })
            .collect())
    }

    pub async fn update_status(
        &self,
        teacher_id: &str,
        intervention_id: &str,
        status: InterventionStatus,
    ) -> AppResult<Intervention> {
        let mut intervention = self
            .store
            .find_intervention(intervention_id)
            .await?
            .ok_or_else(|| AppError::not_found("Intervention not found"))?;

        if intervention.teacher_id != teacher_id {
            return Err(AppError::forbidden("Access denied"));
        }
        if !intervention.status.can_transition_to(status) {
            return Err(AppError::invalid_input(format!(
                "Cannot move intervention from {} to {}",
                intervention.status.as_str(),
                status.as_str()
            )));
        }

        intervention.status = status;
        if status == InterventionStatus::Resolved && intervention.resolved_at.is_none() {
            intervention.resolved_at = Some(Utc::now());
        }

        self.store.update_intervention(&intervention).await?;
        INTERVENTION_TRANSITIONS_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();
        tracing::info!(
            "Intervention {} moved to {}",
            intervention.id,
            status.as_str()
        );

        Ok(intervention)
    }
}
