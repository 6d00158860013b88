use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::store::Store;
use crate::error::{AppError, AppResult};
use crate::metrics::QUESTIONS_SERVED_TOTAL;
use crate::models::content::{Question, QuestionView};
use crate::models::practice::{NextQuestionQuery, UserAnswer};

pub const LOCAL_MASTERY_MAX: f64 = 100.0;
pub const LOCAL_MASTERY_GAIN: f64 = 20.0;
pub const LOCAL_MASTERY_LOSS: f64 = 10.0;

/// Per-question estimate from the user's history. Answers are replayed in
/// chronological order; questions never answered stay at 0.
pub fn local_mastery(pool: &[Question], answers: &[UserAnswer]) -> HashMap<String, f64> {
    let mut scores: HashMap<String, f64> = pool.iter().map(|q| (q.id.clone(), 0.0)).collect();

    let mut ordered: Vec<&UserAnswer> = answers.iter().collect();
    ordered.sort_by_key(|a| a.created_at);

    for answer in ordered {
        if let Some(score) = scores.get_mut(&answer.question_id) {
            *score = if answer.is_correct {
                (*score + LOCAL_MASTERY_GAIN).min(LOCAL_MASTERY_MAX)
            } else {
                (*score - LOCAL_MASTERY_LOSS).max(0.0)
            };
        }
    }

    scores
}

/// Uniform pick among the questions tied at the lowest local mastery.
pub fn pick_least_mastered<'a, R>(
    pool: &'a [Question],
    answers: &[UserAnswer],
    rng: &mut R,
) -> Option<&'a Question>
where
    R: Rng + ?Sized,
{
    let scores = local_mastery(pool, answers);
    let score_of = |q: &Question| scores.get(&q.id).copied().unwrap_or(0.0);

    let min = pool.iter().map(score_of).fold(f64::INFINITY, f64::min);
    let candidates: Vec<&Question> = pool.iter().filter(|q| score_of(q) == min).collect();

    candidates.choose(rng).copied()
}

pub struct QuestionSelector {
    store: Arc<dyn Store>,
    rng: Option<Arc<Mutex<StdRng>>>,
}

impl QuestionSelector {
    pub fn new(store: Arc<dyn Store>, rng: Option<Arc<Mutex<StdRng>>>) -> Self {
        Self { store, rng }
    }

    pub async fn select_next_question(
        &self,
        user_id: &str,
        query: &NextQuestionQuery,
    ) -> AppResult<QuestionView> {
        let pool = self.resolve_pool(query).await?;
        if pool.is_empty() {
            return Err(AppError::not_found("No questions available"));
        }

        let ids: Vec<String> = pool.iter().map(|q| q.id.clone()).collect();
        let answers = self.store.list_answers(user_id, &ids).await?;

        let picked = self
            .choose(&pool, &answers)
            .ok_or_else(|| AppError::not_found("No questions available"))?;

        tracing::debug!(
            "Selected question {} for user {} from pool of {}",
            picked.id,
            user_id,
            pool.len()
        );
        QUESTIONS_SERVED_TOTAL
            .with_label_values(&[picked.difficulty.as_str()])
            .inc();

        Ok(picked.into())
    }

    // Kept synchronous so the thread RNG never lives across an await.
    fn choose(&self, pool: &[Question], answers: &[UserAnswer]) -> Option<Question> {
        match &self.rng {
            Some(seeded) => {
                let mut rng = seeded.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                pick_least_mastered(pool, answers, &mut *rng).cloned()
            }
            None => pick_least_mastered(pool, answers, &mut rand::rng()).cloned(),
        }
    }

    async fn resolve_pool(&self, query: &NextQuestionQuery) -> AppResult<Vec<Question>> {
        let pool = if let Some(lesson_id) = &query.lesson_id {
            self.store
                .list_questions_for_lessons(std::slice::from_ref(lesson_id))
                .await?
        } else if let Some(unit_id) = &query.unit_id {
            let lessons = self
                .store
                .list_lessons_for_units(std::slice::from_ref(unit_id))
                .await?;
            let lesson_ids: Vec<String> = lessons.into_iter().map(|l| l.id).collect();
            self.store.list_questions_for_lessons(&lesson_ids).await?
        } else if let Some(subject) = &query.subject {
            self.store.list_questions_by_subject(subject).await?
        } else {
            self.store.list_questions().await?
        };

        Ok(pool)
    }
}
