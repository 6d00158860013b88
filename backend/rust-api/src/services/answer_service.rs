use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::store::Store;
use crate::error::{AppError, AppResult};
use crate::metrics::ANSWERS_SUBMITTED_TOTAL;
use crate::models::practice::{
    AnswerResponse, GamificationSummary, MasteryLevel, MasteryView, SubmitAnswerRequest,
    UserAnswer,
};

const CORRECT_FEEDBACK: &str = "Great job!";
const INCORRECT_FEEDBACK: &str = "Keep practicing!";

/// Trimmed, case-insensitive comparison. No partial credit.
pub fn is_answer_correct(submitted: &str, canonical: &str) -> bool {
    submitted.trim().to_lowercase() == canonical.trim().to_lowercase()
}

pub struct AnswerService {
    store: Arc<dyn Store>,
}

impl AnswerService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn evaluate_answer(
        &self,
        user_id: &str,
        question_id: &str,
        req: &SubmitAnswerRequest,
    ) -> AppResult<AnswerResponse> {
        req.validate()?;

        let question = self
            .store
            .find_question(question_id)
            .await?
            .ok_or_else(|| AppError::not_found("Question not found"))?;

        let is_correct = is_answer_correct(&req.answer, &question.correct_answer);
        let answer = UserAnswer {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            question_id: question.id.clone(),
            answer: req.answer.clone(),
            is_correct,
            time_taken: req.time_taken,
            hints_used: req.hints_used.unwrap_or(0),
            created_at: Utc::now(),
        };

        let topic = question.topic();
        let outcome = self.store.commit_submission(&answer, &topic).await?;

        ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&[if is_correct { "true" } else { "false" }])
            .inc();
        tracing::info!(
            "Answer processed: user={}, question={}, correct={}, topic={}, points={}, streak={}",
            user_id,
            question.id,
            is_correct,
            topic,
            outcome.points_earned,
            outcome.gamification.streak
        );

        Ok(AnswerResponse {
            is_correct,
            correct_answer: question.correct_answer,
            explanation: if is_correct {
                CORRECT_FEEDBACK
            } else {
                INCORRECT_FEEDBACK
            }
            .to_string(),
            points_earned: outcome.points_earned,
            mastery_increased: is_correct,
            current_streak: outcome.gamification.streak,
            total_points: outcome.gamification.points,
        })
    }

    pub async fn list_mastery(&self, user_id: &str) -> AppResult<Vec<MasteryView>> {
        let rows = self
            .store
            .list_mastery_for_users(&[user_id.to_string()])
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| MasteryView {
                level: MasteryLevel::from_score(row.score),
                topic: row.topic,
                score: row.score,
            })
            .collect())
    }

    pub async fn gamification_summary(&self, user_id: &str) -> AppResult<GamificationSummary> {
        Ok(self.store.find_gamification(user_id).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::{Difficulty, Question, QuestionType};
    use crate::services::store::MemoryStore;

    fn chemistry_question() -> Question {
        Question {
            id: "q-chem".to_string(),
            lesson_id: "l1".to_string(),
            question_text: "Symbol for sodium?".to_string(),
            question_type: QuestionType::ShortAnswer,
            options: None,
            correct_answer: "Na".to_string(),
            difficulty: Difficulty::Easy,
            subject: "Chemistry".to_string(),
            created_at: Utc::now(),
        }
    }

    fn submit(answer: &str, time_taken: Option<f64>) -> SubmitAnswerRequest {
        SubmitAnswerRequest {
            answer: answer.to_string(),
            time_taken,
            hints_used: None,
        }
    }

    async fn service_with_question() -> (AnswerService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.insert_question(&chemistry_question()).await.unwrap();
        (AnswerService::new(store.clone()), store)
    }

    #[test]
    fn correctness_ignores_case_and_whitespace() {
        assert!(is_answer_correct("  na ", "Na"));
        assert!(is_answer_correct("PARIS", "Paris"));
        assert!(!is_answer_correct("Nah", "Na"));
        assert!(!is_answer_correct("", "Na"));
    }

    #[tokio::test]
    async fn fast_correct_answer_earns_bonus() {
        let (service, _) = service_with_question().await;

        let response = service
            .evaluate_answer("u1", "q-chem", &submit(" na ", Some(30.0)))
            .await
            .unwrap();

        assert!(response.is_correct);
        assert!(response.mastery_increased);
        assert_eq!(response.points_earned, 15);
        assert_eq!(response.total_points, 15);
        assert_eq!(response.current_streak, 1);
        assert_eq!(response.explanation, "Great job!");
        assert_eq!(response.correct_answer, "Na");
    }

    #[tokio::test]
    async fn slow_correct_answer_earns_base_points() {
        let (service, _) = service_with_question().await;

        let response = service
            .evaluate_answer("u1", "q-chem", &submit("Na", Some(90.0)))
            .await
            .unwrap();
        assert_eq!(response.points_earned, 10);
    }

    #[tokio::test]
    async fn first_incorrect_answer_records_zero_mastery() {
        let (service, store) = service_with_question().await;

        let response = service
            .evaluate_answer("u1", "q-chem", &submit("K", Some(20.0)))
            .await
            .unwrap();

        assert!(!response.is_correct);
        assert!(!response.mastery_increased);
        assert_eq!(response.points_earned, 0);
        assert_eq!(response.current_streak, 0);
        assert_eq!(response.explanation, "Keep practicing!");

        let rows = store
            .list_mastery_for_users(&["u1".to_string()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].topic, "Chemistry_easy");
        assert_eq!(rows[0].score, 0.0);
    }

    #[tokio::test]
    async fn incorrect_answer_resets_streak() {
        let (service, _) = service_with_question().await;

        service
            .evaluate_answer("u1", "q-chem", &submit("Na", None))
            .await
            .unwrap();
        service
            .evaluate_answer("u1", "q-chem", &submit("Na", None))
            .await
            .unwrap();
        let response = service
            .evaluate_answer("u1", "q-chem", &submit("Cl", None))
            .await
            .unwrap();

        assert_eq!(response.current_streak, 0);
        assert_eq!(response.total_points, 20);

        let mastery = service.list_mastery("u1").await.unwrap();
        assert_eq!(mastery[0].score, 8.0);
        assert_eq!(mastery[0].level, MasteryLevel::Beginner);
    }

    #[tokio::test]
    async fn negative_time_taken_is_rejected() {
        let (service, store) = service_with_question().await;

        let err = service
            .evaluate_answer("u1", "q-chem", &submit("Na", Some(-5.0)))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        let summary = service.gamification_summary("u1").await.unwrap();
        assert_eq!(summary.points, 0);
        assert!(store
            .list_mastery_for_users(&["u1".to_string()])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn unknown_question_is_not_found() {
        let (service, _) = service_with_question().await;

        let err = service
            .evaluate_answer("u1", "missing", &submit("Na", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn gamification_summary_defaults_to_zero() {
        let (service, _) = service_with_question().await;
        let summary = service.gamification_summary("nobody").await.unwrap();
        assert_eq!(summary.points, 0);
        assert_eq!(summary.streak, 0);
    }
}
