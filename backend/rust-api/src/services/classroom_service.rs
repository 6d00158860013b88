use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::capability::Actor;
use super::store::Store;
use crate::error::{AppError, AppResult};
use crate::models::classroom::{Class, CreateClassRequest};
use crate::models::user::{UserProfile, UserRole};

pub struct ClassroomService {
    store: Arc<dyn Store>,
}

impl ClassroomService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_class(&self, actor: &Actor, req: CreateClassRequest) -> AppResult<Class> {
        req.validate()?;

        let class = Class {
            id: Uuid::new_v4().to_string(),
            name: req.name,
            subject: req.subject,
            teacher_id: actor.user_id.clone(),
            created_at: Utc::now(),
        };
        self.store.insert_class(&class).await?;
        tracing::info!("Class created: {} by teacher {}", class.id, actor.user_id);

        Ok(class)
    }

    /// Teachers see their own classes, managers see all of them.
    pub async fn list_classes(&self, actor: &Actor) -> AppResult<Vec<Class>> {
        let classes = match actor.role {
            UserRole::Manager => self.store.list_classes().await?,
            _ => self.store.list_classes_by_teacher(&actor.user_id).await?,
        };
        Ok(classes)
    }

    /// Loads a class and checks the actor teaches it.
    pub async fn owned_class(&self, actor: &Actor, class_id: &str) -> AppResult<Class> {
        let class = self
            .store
            .find_class(class_id)
            .await?
            .ok_or_else(|| AppError::not_found("Class not found"))?;
        if class.teacher_id != actor.user_id {
            return Err(AppError::forbidden("Not your class"));
        }
        Ok(class)
    }

    pub async fn enroll_student(
        &self,
        actor: &Actor,
        class_id: &str,
        student_id: &str,
    ) -> AppResult<UserProfile> {
        let class = self.owned_class(actor, class_id).await?;

        let mut student = self
            .store
            .find_user(student_id)
            .await?
            .filter(|u| u.is_student())
            .ok_or_else(|| AppError::not_found("Student not found"))?;

        student.class_id = Some(class.id.clone());
        self.store.update_user(&student).await?;
        tracing::info!("Student {} enrolled in class {}", student.id, class.id);

        Ok(student.into())
    }
}
