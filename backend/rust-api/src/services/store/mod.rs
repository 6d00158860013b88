//! Persistence boundary. Services only see [`Store`]; the MongoDB backend
//! serves production and the in-memory backend serves tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::activity::{Progress, Session};
use crate::models::classroom::Class;
use crate::models::content::{Course, Lesson, Material, Question, Unit};
use crate::models::intervention::{Intervention, InterventionFilter};
use crate::models::practice::{Gamification, Mastery, SubmissionOutcome, UserAnswer};
use crate::models::user::{User, UserRole};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[async_trait]
pub trait Store: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn ping(&self) -> anyhow::Result<()>;

    // Users
    async fn insert_user(&self, user: &User) -> anyhow::Result<()>;
    async fn find_user(&self, id: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn update_user(&self, user: &User) -> anyhow::Result<()>;
    async fn find_users(&self, ids: &[String]) -> anyhow::Result<Vec<User>>;
    async fn list_users_by_role(&self, role: UserRole) -> anyhow::Result<Vec<User>>;
    async fn list_students_in_classes(&self, class_ids: &[String]) -> anyhow::Result<Vec<User>>;
    async fn count_users_by_role(&self, role: UserRole) -> anyhow::Result<u64>;

    // Classes
    async fn insert_class(&self, class: &Class) -> anyhow::Result<()>;
    async fn find_class(&self, id: &str) -> anyhow::Result<Option<Class>>;
    async fn list_classes(&self) -> anyhow::Result<Vec<Class>>;
    async fn list_classes_by_teacher(&self, teacher_id: &str) -> anyhow::Result<Vec<Class>>;
    async fn count_classes(&self) -> anyhow::Result<u64>;

    // Content hierarchy
    async fn insert_course(&self, course: &Course) -> anyhow::Result<()>;
    async fn find_course(&self, id: &str) -> anyhow::Result<Option<Course>>;
    async fn list_courses(&self) -> anyhow::Result<Vec<Course>>;
    async fn list_courses_for_classes(&self, class_ids: &[String]) -> anyhow::Result<Vec<Course>>;

    async fn insert_unit(&self, unit: &Unit) -> anyhow::Result<()>;
    async fn find_unit(&self, id: &str) -> anyhow::Result<Option<Unit>>;
    async fn list_units(&self) -> anyhow::Result<Vec<Unit>>;
    async fn list_units_for_courses(&self, course_ids: &[String]) -> anyhow::Result<Vec<Unit>>;

    async fn insert_lesson(&self, lesson: &Lesson) -> anyhow::Result<()>;
    async fn find_lesson(&self, id: &str) -> anyhow::Result<Option<Lesson>>;
    async fn list_lessons(&self) -> anyhow::Result<Vec<Lesson>>;
    async fn list_lessons_for_units(&self, unit_ids: &[String]) -> anyhow::Result<Vec<Lesson>>;
    async fn count_lessons(&self) -> anyhow::Result<u64>;

    async fn insert_material(&self, material: &Material) -> anyhow::Result<()>;
    async fn list_materials_for_lessons(&self, lesson_ids: &[String])
        -> anyhow::Result<Vec<Material>>;

    async fn insert_question(&self, question: &Question) -> anyhow::Result<()>;
    async fn find_question(&self, id: &str) -> anyhow::Result<Option<Question>>;
    async fn list_questions(&self) -> anyhow::Result<Vec<Question>>;
    async fn list_questions_for_lessons(&self, lesson_ids: &[String])
        -> anyhow::Result<Vec<Question>>;
    async fn list_questions_by_subject(&self, subject: &str) -> anyhow::Result<Vec<Question>>;

    // Practice
    /// The user's answers to the given questions, oldest first.
    async fn list_answers(
        &self,
        user_id: &str,
        question_ids: &[String],
    ) -> anyhow::Result<Vec<UserAnswer>>;
    async fn count_answers_for_users(&self, user_ids: &[String]) -> anyhow::Result<u64>;
    /// Appends the answer and applies the mastery and gamification rules
    /// as one atomic write set.
    async fn commit_submission(
        &self,
        answer: &UserAnswer,
        topic: &str,
    ) -> anyhow::Result<SubmissionOutcome>;
    async fn find_gamification(&self, user_id: &str) -> anyhow::Result<Option<Gamification>>;
    async fn list_mastery_for_users(&self, user_ids: &[String]) -> anyhow::Result<Vec<Mastery>>;

    // Activity
    async fn insert_session(&self, session: &Session) -> anyhow::Result<()>;
    async fn find_session(&self, id: &str) -> anyhow::Result<Option<Session>>;
    async fn update_session(&self, session: &Session) -> anyhow::Result<()>;
    /// Sessions of the given users with `start <= start_time < end`.
    async fn list_sessions_started_between(
        &self,
        user_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Session>>;
    /// Most recent first.
    async fn list_recent_sessions(&self, user_id: &str, limit: usize)
        -> anyhow::Result<Vec<Session>>;

    async fn find_progress(&self, user_id: &str, lesson_id: &str)
        -> anyhow::Result<Option<Progress>>;
    async fn upsert_progress(&self, progress: &Progress) -> anyhow::Result<()>;
    async fn list_progress_for_users(&self, user_ids: &[String]) -> anyhow::Result<Vec<Progress>>;

    // Interventions
    async fn insert_intervention(&self, intervention: &Intervention) -> anyhow::Result<()>;
    async fn find_intervention(&self, id: &str) -> anyhow::Result<Option<Intervention>>;
    async fn update_intervention(&self, intervention: &Intervention) -> anyhow::Result<()>;
    /// The teacher's interventions matching the filter, newest first.
    async fn list_interventions(
        &self,
        teacher_id: &str,
        filter: &InterventionFilter,
    ) -> anyhow::Result<Vec<Intervention>>;
}
