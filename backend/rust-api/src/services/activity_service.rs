use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use super::store::Store;
use crate::error::{AppError, AppResult};
use crate::models::activity::{
    EndSessionRequest, Progress, ProgressStatus, Session, StartSessionRequest,
    UpdateProgressRequest,
};

/// Whole minutes are not enough for short practice runs; keep fractions.
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let millis = (end - start).num_milliseconds().max(0);
    millis as f64 / 60_000.0
}

pub struct ActivityService {
    store: Arc<dyn Store>,
}

impl ActivityService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn start_session(&self, user_id: &str, req: StartSessionRequest) -> AppResult<Session> {
        if let Some(lesson_id) = &req.lesson_id {
            if self.store.find_lesson(lesson_id).await?.is_none() {
                return Err(AppError::not_found("Lesson not found"));
            }
        }

        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            session_type: req.session_type,
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            lesson_id: req.lesson_id,
            questions_attempted: 0,
            correct_answers: 0,
        };
        self.store.insert_session(&session).await?;
        tracing::info!("Session started: {} for user {}", session.id, user_id);

        Ok(session)
    }

    pub async fn end_session(
        &self,
        user_id: &str,
        session_id: &str,
        req: EndSessionRequest,
    ) -> AppResult<Session> {
        if req.correct_answers > req.questions_attempted {
            return Err(AppError::invalid_input(
                "Correct answers cannot exceed questions attempted",
            ));
        }

        let mut session = self
            .store
            .find_session(session_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| AppError::not_found("Session not found"))?;

        if session.end_time.is_some() {
            return Err(AppError::conflict("Session already ended"));
        }

        let now = Utc::now();
        session.end_time = Some(now);
        session.duration = Some(duration_minutes(session.start_time, now));
        session.questions_attempted = req.questions_attempted;
        session.correct_answers = req.correct_answers;

        self.store.update_session(&session).await?;
        tracing::info!(
            "Session ended: {} ({} attempted, {} correct)",
            session.id,
            session.questions_attempted,
            session.correct_answers
        );

        Ok(session)
    }

    /// Creates or replaces the (user, lesson) progress row. A completed
    /// status always records 100% completion.
    pub async fn update_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
        req: UpdateProgressRequest,
    ) -> AppResult<Progress> {
        req.validate()?;
        if self.store.find_lesson(lesson_id).await?.is_none() {
            return Err(AppError::not_found("Lesson not found"));
        }

        let completion_percentage = match req.status {
            ProgressStatus::Completed => 100.0,
            _ => req.completion_percentage,
        };

        let progress = Progress {
            id: Progress::record_id(user_id, lesson_id),
            user_id: user_id.to_string(),
            lesson_id: lesson_id.to_string(),
            completion_percentage,
            time_spent: req.time_spent,
            status: req.status,
            updated_at: Utc::now(),
        };
        self.store.upsert_progress(&progress).await?;
        tracing::debug!(
            "Progress updated: user={} lesson={} completion={}",
            user_id,
            lesson_id,
            completion_percentage
        );

        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::SessionType;
    use crate::models::content::Lesson;
    use crate::services::store::MemoryStore;
    use chrono::Duration;

    async fn service_with_lesson() -> ActivityService {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_lesson(&Lesson {
                id: "l1".to_string(),
                title: "Fractions".to_string(),
                unit_id: "u1".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        ActivityService::new(store)
    }

    #[test]
    fn duration_is_in_minutes() {
        let start = Utc::now();
        assert_eq!(duration_minutes(start, start + Duration::seconds(90)), 1.5);
        assert_eq!(duration_minutes(start, start - Duration::seconds(5)), 0.0);
    }

    #[tokio::test]
    async fn completed_status_forces_full_completion() {
        let service = service_with_lesson().await;
        let progress = service
            .update_progress(
                "s1",
                "l1",
                UpdateProgressRequest {
                    completion_percentage: 40.0,
                    time_spent: 12.0,
                    status: ProgressStatus::Completed,
                },
            )
            .await
            .unwrap();
        assert_eq!(progress.completion_percentage, 100.0);
        assert_eq!(progress.id, "s1:l1");
    }

    #[tokio::test]
    async fn session_can_only_end_once() {
        let service = service_with_lesson().await;
        let session = service
            .start_session(
                "s1",
                StartSessionRequest {
                    session_type: SessionType::Practice,
                    lesson_id: Some("l1".to_string()),
                },
            )
            .await
            .unwrap();

        let ended = service
            .end_session(
                "s1",
                &session.id,
                EndSessionRequest {
                    questions_attempted: 5,
                    correct_answers: 3,
                },
            )
            .await
            .unwrap();
        assert!(ended.end_time.is_some());
        assert!(ended.duration.is_some());

        let again = service
            .end_session("s1", &session.id, EndSessionRequest::default())
            .await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn other_users_sessions_are_hidden() {
        let service = service_with_lesson().await;
        let session = service
            .start_session(
                "s1",
                StartSessionRequest {
                    session_type: SessionType::Review,
                    lesson_id: None,
                },
            )
            .await
            .unwrap();

        let err = service
            .end_session("s2", &session.id, EndSessionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
