use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    options::IndexOptions,
    Client, ClientSession, Database, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};

use super::Store;
use crate::metrics::observe_store;
use crate::models::activity::{Progress, Session};
use crate::models::classroom::Class;
use crate::models::content::{Course, Lesson, Material, Question, Unit};
use crate::models::intervention::{Intervention, InterventionFilter};
use crate::models::practice::{Gamification, Mastery, SubmissionOutcome, UserAnswer};
use crate::models::user::{User, UserRole};
use crate::services::trackers;
use crate::utils::retry::{retry_when, Backoff};
use crate::utils::time::format_timestamp;

const USERS: &str = "users";
const CLASSES: &str = "classes";
const COURSES: &str = "courses";
const UNITS: &str = "units";
const LESSONS: &str = "lessons";
const MATERIALS: &str = "materials";
const QUESTIONS: &str = "questions";
const ANSWERS: &str = "user_answers";
const MASTERIES: &str = "masteries";
const GAMIFICATIONS: &str = "gamifications";
const SESSIONS: &str = "sessions";
const PROGRESS: &str = "progress";
const INTERVENTIONS: &str = "interventions";

/// MongoDB backend. The submission write set runs in a client-session
/// transaction, so the deployment must be a replica set.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, database: &str) -> Self {
        let db = client.database(database);
        Self { client, db }
    }

    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        let indexes: [(&str, IndexModel); 9] = [
            (
                USERS,
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(unique())
                    .build(),
            ),
            (
                USERS,
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
            ),
            (
                USERS,
                IndexModel::builder()
                    .keys(doc! { "role": 1, "class_id": 1 })
                    .build(),
            ),
            (
                ANSWERS,
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "question_id": 1, "created_at": 1 })
                    .build(),
            ),
            (
                QUESTIONS,
                IndexModel::builder().keys(doc! { "lesson_id": 1 }).build(),
            ),
            (
                MASTERIES,
                IndexModel::builder().keys(doc! { "user_id": 1 }).build(),
            ),
            (
                SESSIONS,
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "start_time": -1 })
                    .build(),
            ),
            (
                PROGRESS,
                IndexModel::builder().keys(doc! { "user_id": 1 }).build(),
            ),
            (
                INTERVENTIONS,
                IndexModel::builder()
                    .keys(doc! { "teacher_id": 1, "created_at": -1 })
                    .build(),
            ),
        ];

        for (collection, model) in indexes {
            self.db
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .with_context(|| format!("Failed to create index on {}", collection))?;
        }

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }

    async fn find_by_id<T>(&self, collection: &'static str, id: &str) -> anyhow::Result<Option<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        observe_store("find_one", collection, async {
            self.db
                .collection::<T>(collection)
                .find_one(doc! { "_id": id })
                .await
                .with_context(|| format!("Failed to load {} from {}", id, collection))
        })
        .await
    }

    async fn find_one<T>(&self, collection: &'static str, filter: Document) -> anyhow::Result<Option<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        observe_store("find_one", collection, async {
            self.db
                .collection::<T>(collection)
                .find_one(filter)
                .await
                .with_context(|| format!("Failed to query {}", collection))
        })
        .await
    }

    async fn list<T>(
        &self,
        collection: &'static str,
        filter: Document,
        sort: Document,
        limit: Option<i64>,
    ) -> anyhow::Result<Vec<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        observe_store("find", collection, async {
            let coll = self.db.collection::<T>(collection);
            let mut action = coll.find(filter).sort(sort);
            if let Some(limit) = limit {
                action = action.limit(limit);
            }
            let cursor = action
                .await
                .with_context(|| format!("Failed to query {}", collection))?;
            cursor
                .try_collect()
                .await
                .with_context(|| format!("Failed to read {} cursor", collection))
        })
        .await
    }

    async fn insert<T>(&self, collection: &'static str, value: &T) -> anyhow::Result<()>
    where
        T: Serialize + Send + Sync,
    {
        observe_store("insert_one", collection, async {
            self.db
                .collection::<T>(collection)
                .insert_one(value)
                .await
                .with_context(|| format!("Failed to insert into {}", collection))?;
            Ok(())
        })
        .await
    }

    /// Replaces the document with `_id == id`. With `upsert` unset, a
    /// missing document is an error.
    async fn replace<T>(
        &self,
        collection: &'static str,
        id: &str,
        value: &T,
        upsert: bool,
    ) -> anyhow::Result<()>
    where
        T: Serialize + Send + Sync,
    {
        observe_store("replace_one", collection, async {
            let result = self
                .db
                .collection::<T>(collection)
                .replace_one(doc! { "_id": id }, value)
                .upsert(upsert)
                .await
                .with_context(|| format!("Failed to update {} in {}", id, collection))?;

            if !upsert && result.matched_count == 0 {
                anyhow::bail!("{} not found in {}", id, collection);
            }
            Ok(())
        })
        .await
    }

    async fn count(&self, collection: &'static str, filter: Document) -> anyhow::Result<u64> {
        observe_store("count_documents", collection, async {
            self.db
                .collection::<Document>(collection)
                .count_documents(filter)
                .await
                .with_context(|| format!("Failed to count {}", collection))
        })
        .await
    }

    async fn submission_transaction(
        &self,
        answer: &UserAnswer,
        topic: &str,
    ) -> mongodb::error::Result<SubmissionOutcome> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        let outcome = match self.write_submission(&mut session, answer, topic).await {
            Ok(outcome) => outcome,
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    tracing::warn!("Failed to abort submission transaction: {}", abort_err);
                }
                return Err(err);
            }
        };

        // Commit may be retried on its own when the result is unknown
        let backoff = Backoff::TRANSACTION;
        let mut retry = 0;
        loop {
            let err = match session.commit_transaction().await {
                Ok(()) => return Ok(outcome),
                Err(err) => err,
            };
            retry += 1;
            let unknown = err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT);
            match backoff.next_delay(retry).filter(|_| unknown) {
                Some(wait) => {
                    tracing::debug!("Commit result unknown, retry {} in {:?}", retry, wait);
                    tokio::time::sleep(wait).await;
                }
                None => {
                    if unknown {
                        tracing::warn!("Commit result still unknown after {} attempts", retry);
                    }
                    if let Err(abort_err) = session.abort_transaction().await {
                        tracing::warn!("Failed to abort submission transaction: {}", abort_err);
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn write_submission(
        &self,
        session: &mut ClientSession,
        answer: &UserAnswer,
        topic: &str,
    ) -> mongodb::error::Result<SubmissionOutcome> {
        let masteries = self.db.collection::<Mastery>(MASTERIES);
        let gamifications = self.db.collection::<Gamification>(GAMIFICATIONS);
        let mastery_id = Mastery::record_id(&answer.user_id, topic);

        self.db
            .collection::<UserAnswer>(ANSWERS)
            .insert_one(answer)
            .session(&mut *session)
            .await?;

        let mastery = masteries
            .find_one(doc! { "_id": &mastery_id })
            .session(&mut *session)
            .await?;
        let gamification = gamifications
            .find_one(doc! { "_id": &answer.user_id })
            .session(&mut *session)
            .await?;

        let outcome = trackers::apply_submission(mastery, gamification, answer, topic);

        masteries
            .replace_one(doc! { "_id": &outcome.mastery.id }, &outcome.mastery)
            .upsert(true)
            .session(&mut *session)
            .await?;
        gamifications
            .replace_one(doc! { "_id": &outcome.gamification.id }, &outcome.gamification)
            .upsert(true)
            .session(&mut *session)
            .await?;

        Ok(outcome)
    }
}

fn by_created() -> Document {
    doc! { "created_at": 1, "_id": 1 }
}

fn in_ids(ids: &[String]) -> Document {
    doc! { "$in": ids.to_vec() }
}

#[async_trait]
impl Store for MongoStore {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> anyhow::Result<()> {
        self.insert(USERS, user).await
    }

    async fn find_user(&self, id: &str) -> anyhow::Result<Option<User>> {
        self.find_by_id(USERS, id).await
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.find_one(USERS, doc! { "username": username }).await
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_one(USERS, doc! { "email": email }).await
    }

    async fn update_user(&self, user: &User) -> anyhow::Result<()> {
        self.replace(USERS, &user.id, user, false).await
    }

    async fn find_users(&self, ids: &[String]) -> anyhow::Result<Vec<User>> {
        self.list(USERS, doc! { "_id": in_ids(ids) }, by_created(), None)
            .await
    }

    async fn list_users_by_role(&self, role: UserRole) -> anyhow::Result<Vec<User>> {
        self.list(USERS, doc! { "role": role.as_str() }, by_created(), None)
            .await
    }

    async fn list_students_in_classes(&self, class_ids: &[String]) -> anyhow::Result<Vec<User>> {
        self.list(
            USERS,
            doc! { "role": UserRole::Student.as_str(), "class_id": in_ids(class_ids) },
            by_created(),
            None,
        )
        .await
    }

    async fn count_users_by_role(&self, role: UserRole) -> anyhow::Result<u64> {
        self.count(USERS, doc! { "role": role.as_str() }).await
    }

    async fn insert_class(&self, class: &Class) -> anyhow::Result<()> {
        self.insert(CLASSES, class).await
    }

    async fn find_class(&self, id: &str) -> anyhow::Result<Option<Class>> {
        self.find_by_id(CLASSES, id).await
    }

    async fn list_classes(&self) -> anyhow::Result<Vec<Class>> {
        self.list(CLASSES, doc! {}, by_created(), None).await
    }

    async fn list_classes_by_teacher(&self, teacher_id: &str) -> anyhow::Result<Vec<Class>> {
        self.list(CLASSES, doc! { "teacher_id": teacher_id }, by_created(), None)
            .await
    }

    async fn count_classes(&self) -> anyhow::Result<u64> {
        self.count(CLASSES, doc! {}).await
    }

    async fn insert_course(&self, course: &Course) -> anyhow::Result<()> {
        self.insert(COURSES, course).await
    }

    async fn find_course(&self, id: &str) -> anyhow::Result<Option<Course>> {
        self.find_by_id(COURSES, id).await
    }

    async fn list_courses(&self) -> anyhow::Result<Vec<Course>> {
        self.list(COURSES, doc! {}, by_created(), None).await
    }

    async fn list_courses_for_classes(&self, class_ids: &[String]) -> anyhow::Result<Vec<Course>> {
        self.list(COURSES, doc! { "class_id": in_ids(class_ids) }, by_created(), None)
            .await
    }

    async fn insert_unit(&self, unit: &Unit) -> anyhow::Result<()> {
        self.insert(UNITS, unit).await
    }

    async fn find_unit(&self, id: &str) -> anyhow::Result<Option<Unit>> {
        self.find_by_id(UNITS, id).await
    }

    async fn list_units(&self) -> anyhow::Result<Vec<Unit>> {
        self.list(UNITS, doc! {}, by_created(), None).await
    }

    async fn list_units_for_courses(&self, course_ids: &[String]) -> anyhow::Result<Vec<Unit>> {
        self.list(UNITS, doc! { "course_id": in_ids(course_ids) }, by_created(), None)
            .await
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> anyhow::Result<()> {
        self.insert(LESSONS, lesson).await
    }

    async fn find_lesson(&self, id: &str) -> anyhow::Result<Option<Lesson>> {
        self.find_by_id(LESSONS, id).await
    }

    async fn list_lessons(&self) -> anyhow::Result<Vec<Lesson>> {
        self.list(LESSONS, doc! {}, by_created(), None).await
    }

    async fn list_lessons_for_units(&self, unit_ids: &[String]) -> anyhow::Result<Vec<Lesson>> {
        self.list(LESSONS, doc! { "unit_id": in_ids(unit_ids) }, by_created(), None)
            .await
    }

    async fn count_lessons(&self) -> anyhow::Result<u64> {
        self.count(LESSONS, doc! {}).await
    }

    async fn insert_material(&self, material: &Material) -> anyhow::Result<()> {
        self.insert(MATERIALS, material).await
    }

    async fn list_materials_for_lessons(
        &self,
        lesson_ids: &[String],
    ) -> anyhow::Result<Vec<Material>> {
        self.list(
            MATERIALS,
            doc! { "lesson_id": in_ids(lesson_ids) },
            by_created(),
            None,
        )
        .await
    }

    async fn insert_question(&self, question: &Question) -> anyhow::Result<()> {
        self.insert(QUESTIONS, question).await
    }

    async fn find_question(&self, id: &str) -> anyhow::Result<Option<Question>> {
        self.find_by_id(QUESTIONS, id).await
    }

    async fn list_questions(&self) -> anyhow::Result<Vec<Question>> {
        self.list(QUESTIONS, doc! {}, by_created(), None).await
    }

    async fn list_questions_for_lessons(
        &self,
        lesson_ids: &[String],
    ) -> anyhow::Result<Vec<Question>> {
        self.list(
            QUESTIONS,
            doc! { "lesson_id": in_ids(lesson_ids) },
            by_created(),
            None,
        )
        .await
    }

    async fn list_questions_by_subject(&self, subject: &str) -> anyhow::Result<Vec<Question>> {
        self.list(QUESTIONS, doc! { "subject": subject }, by_created(), None)
            .await
    }

    async fn list_answers(
        &self,
        user_id: &str,
        question_ids: &[String],
    ) -> anyhow::Result<Vec<UserAnswer>> {
        self.list(
            ANSWERS,
            doc! { "user_id": user_id, "question_id": in_ids(question_ids) },
            by_created(),
            None,
        )
        .await
    }

    async fn count_answers_for_users(&self, user_ids: &[String]) -> anyhow::Result<u64> {
        self.count(ANSWERS, doc! { "user_id": in_ids(user_ids) }).await
    }

    async fn commit_submission(
        &self,
        answer: &UserAnswer,
        topic: &str,
    ) -> anyhow::Result<SubmissionOutcome> {
        observe_store("transaction", ANSWERS, async {
            retry_when(
                Backoff::TRANSACTION,
                |err: &mongodb::error::Error| err.contains_label(TRANSIENT_TRANSACTION_ERROR),
                || self.submission_transaction(answer, topic),
            )
            .await
            .with_context(|| format!("Failed to commit submission {}", answer.id))
        })
        .await
    }

    async fn find_gamification(&self, user_id: &str) -> anyhow::Result<Option<Gamification>> {
        self.find_by_id(GAMIFICATIONS, user_id).await
    }

    async fn list_mastery_for_users(&self, user_ids: &[String]) -> anyhow::Result<Vec<Mastery>> {
        self.list(
            MASTERIES,
            doc! { "user_id": in_ids(user_ids) },
            doc! { "_id": 1 },
            None,
        )
        .await
    }

    async fn insert_session(&self, session: &Session) -> anyhow::Result<()> {
        self.insert(SESSIONS, session).await
    }

    async fn find_session(&self, id: &str) -> anyhow::Result<Option<Session>> {
        self.find_by_id(SESSIONS, id).await
    }

    async fn update_session(&self, session: &Session) -> anyhow::Result<()> {
        self.replace(SESSIONS, &session.id, session, false).await
    }

    async fn list_sessions_started_between(
        &self,
        user_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Session>> {
        self.list(
            SESSIONS,
            doc! {
                "user_id": in_ids(user_ids),
                "start_time": {
                    "$gte": format_timestamp(start),
                    "$lt": format_timestamp(end),
                },
            },
            doc! { "start_time": 1, "_id": 1 },
            None,
        )
        .await
    }

    async fn list_recent_sessions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Session>> {
        self.list(
            SESSIONS,
            doc! { "user_id": user_id },
            doc! { "start_time": -1, "_id": 1 },
            Some(limit as i64),
        )
        .await
    }

    async fn find_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> anyhow::Result<Option<Progress>> {
        self.find_by_id(PROGRESS, &Progress::record_id(user_id, lesson_id))
            .await
    }

    async fn upsert_progress(&self, progress: &Progress) -> anyhow::Result<()> {
        self.replace(PROGRESS, &progress.id, progress, true).await
    }

    async fn list_progress_for_users(&self, user_ids: &[String]) -> anyhow::Result<Vec<Progress>> {
        self.list(
            PROGRESS,
            doc! { "user_id": in_ids(user_ids) },
            doc! { "_id": 1 },
            None,
        )
        .await
    }

    async fn insert_intervention(&self, intervention: &Intervention) -> anyhow::Result<()> {
        self.insert(INTERVENTIONS, intervention).await
    }

    async fn find_intervention(&self, id: &str) -> anyhow::Result<Option<Intervention>> {
        self.find_by_id(INTERVENTIONS, id).await
    }

    async fn update_intervention(&self, intervention: &Intervention) -> anyhow::Result<()> {
        self.replace(INTERVENTIONS, &intervention.id, intervention, false)
            .await
    }

    async fn list_interventions(
        &self,
        teacher_id: &str,
        filter: &InterventionFilter,
    ) -> anyhow::Result<Vec<Intervention>> {
        let mut query = doc! { "teacher_id": teacher_id };
        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        }
        if let Some(priority) = filter.priority {
            query.insert("priority", priority.as_str());
        }

        self.list(
            INTERVENTIONS,
            query,
            doc! { "created_at": -1, "_id": 1 },
            None,
        )
        .await
    }
}
