use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::Store;
use crate::models::activity::{Progress, Session};
use crate::models::classroom::Class;
use crate::models::content::{Course, Lesson, Material, Question, Unit};
use crate::models::intervention::{Intervention, InterventionFilter};
use crate::models::practice::{Gamification, Mastery, SubmissionOutcome, UserAnswer};
use crate::models::user::{User, UserRole};
use crate::services::trackers;

#[derive(Default)]
struct Collections {
    users: HashMap<String, User>,
    classes: HashMap<String, Class>,
    courses: HashMap<String, Course>,
    units: HashMap<String, Unit>,
    lessons: HashMap<String, Lesson>,
    materials: HashMap<String, Material>,
    questions: HashMap<String, Question>,
    answers: Vec<UserAnswer>,
    masteries: HashMap<String, Mastery>,
    gamifications: HashMap<String, Gamification>,
    sessions: HashMap<String, Session>,
    progress: HashMap<String, Progress>,
    interventions: HashMap<String, Intervention>,
}

/// In-process store. Every write happens under one lock, which gives the
/// submission write set the same all-or-nothing behaviour as a transaction.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn id_set(ids: &[String]) -> HashSet<&str> {
    ids.iter().map(String::as_str).collect()
}

/// HashMap iteration order is random; listings sort on a stable key.
fn sorted<T, K, F>(values: impl Iterator<Item = T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> K,
    K: Ord,
{
    let mut out: Vec<T> = values.collect();
    out.sort_by_key(|v| key(v));
    out
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        if data.users.contains_key(&user.id) {
            anyhow::bail!("duplicate user id {}", user.id);
        }
        data.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user(&self, id: &str) -> anyhow::Result<Option<User>> {
        Ok(self.data.read().await.users.get(id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let data = self.data.read().await;
        Ok(data.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let data = self.data.read().await;
        Ok(data.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, user: &User) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        match data.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => anyhow::bail!("user {} does not exist", user.id),
        }
    }

    async fn find_users(&self, ids: &[String]) -> anyhow::Result<Vec<User>> {
        let wanted = id_set(ids);
        let data = self.data.read().await;
        Ok(sorted(
            data.users
                .values()
                .filter(|u| wanted.contains(u.id.as_str()))
                .cloned(),
            |u| (u.created_at, u.id.clone()),
        ))
    }

    async fn list_users_by_role(&self, role: UserRole) -> anyhow::Result<Vec<User>> {
        let data = self.data.read().await;
        Ok(sorted(
            data.users.values().filter(|u| u.role == role).cloned(),
            |u| (u.created_at, u.id.clone()),
        ))
    }

    async fn list_students_in_classes(&self, class_ids: &[String]) -> anyhow::Result<Vec<User>> {
        let wanted = id_set(class_ids);
        let data = self.data.read().await;
        Ok(sorted(
            data.users
                .values()
                .filter(|u| {
                    u.is_student()
                        && u.class_id
                            .as_deref()
                            .map_or(false, |class_id| wanted.contains(class_id))
                })
                .cloned(),
            |u| (u.created_at, u.id.clone()),
        ))
    }

    async fn count_users_by_role(&self, role: UserRole) -> anyhow::Result<u64> {
        let data = self.data.read().await;
        Ok(data.users.values().filter(|u| u.role == role).count() as u64)
    }

    async fn insert_class(&self, class: &Class) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        data.classes.insert(class.id.clone(), class.clone());
        Ok(())
    }

    async fn find_class(&self, id: &str) -> anyhow::Result<Option<Class>> {
        Ok(self.data.read().await.classes.get(id).cloned())
    }

    async fn list_classes(&self) -> anyhow::Result<Vec<Class>> {
        let data = self.data.read().await;
        Ok(sorted(data.classes.values().cloned(), |c| {
            (c.created_at, c.id.clone())
        }))
    }

    async fn list_classes_by_teacher(&self, teacher_id: &str) -> anyhow::Result<Vec<Class>> {
        let data = self.data.read().await;
        Ok(sorted(
            data.classes
                .values()
                .filter(|c| c.teacher_id == teacher_id)
                .cloned(),
            |c| (c.created_at, c.id.clone()),
        ))
    }

    async fn count_classes(&self) -> anyhow::Result<u64> {
        Ok(self.data.read().await.classes.len() as u64)
    }

    async fn insert_course(&self, course: &Course) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        data.courses.insert(course.id.clone(), course.clone());
        Ok(())
    }

    async fn find_course(&self, id: &str) -> anyhow::Result<Option<Course>> {
        Ok(self.data.read().await.courses.get(id).cloned())
    }

    async fn list_courses(&self) -> anyhow::Result<Vec<Course>> {
        let data = self.data.read().await;
        Ok(sorted(data.courses.values().cloned(), |c| {
            (c.created_at, c.id.clone())
        }))
    }

    async fn list_courses_for_classes(&self, class_ids: &[String]) -> anyhow::Result<Vec<Course>> {
        let wanted = id_set(class_ids);
        let data = self.data.read().await;
        Ok(sorted(
            data.courses
                .values()
                .filter(|c| wanted.contains(c.class_id.as_str()))
                .cloned(),
            |c| (c.created_at, c.id.clone()),
        ))
    }

    async fn insert_unit(&self, unit: &Unit) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        data.units.insert(unit.id.clone(), unit.clone());
        Ok(())
    }

    async fn find_unit(&self, id: &str) -> anyhow::Result<Option<Unit>> {
        Ok(self.data.read().await.units.get(id).cloned())
    }

    async fn list_units(&self) -> anyhow::Result<Vec<Unit>> {
        let data = self.data.read().await;
        Ok(sorted(data.units.values().cloned(), |u| {
            (u.created_at, u.id.clone())
        }))
    }

    async fn list_units_for_courses(&self, course_ids: &[String]) -> anyhow::Result<Vec<Unit>> {
        let wanted = id_set(course_ids);
        let data = self.data.read().await;
        Ok(sorted(
            data.units
                .values()
                .filter(|u| wanted.contains(u.course_id.as_str()))
                .cloned(),
            |u| (u.created_at, u.id.clone()),
        ))
    }

    async fn insert_lesson(&self, lesson: &Lesson) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        data.lessons.insert(lesson.id.clone(), lesson.clone());
        Ok(())
    }

    async fn find_lesson(&self, id: &str) -> anyhow::Result<Option<Lesson>> {
        Ok(self.data.read().await.lessons.get(id).cloned())
    }

    async fn list_lessons(&self) -> anyhow::Result<Vec<Lesson>> {
        let data = self.data.read().await;
        Ok(sorted(data.lessons.values().cloned(), |l| {
            (l.created_at, l.id.clone())
        }))
    }

    async fn list_lessons_for_units(&self, unit_ids: &[String]) -> anyhow::Result<Vec<Lesson>> {
        let wanted = id_set(unit_ids);
        let data = self.data.read().await;
        Ok(sorted(
            data.lessons
                .values()
                .filter(|l| wanted.contains(l.unit_id.as_str()))
                .cloned(),
            |l| (l.created_at, l.id.clone()),
        ))
    }

    async fn count_lessons(&self) -> anyhow::Result<u64> {
        Ok(self.data.read().await.lessons.len() as u64)
    }

    async fn insert_material(&self, material: &Material) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        data.materials.insert(material.id.clone(), material.clone());
        Ok(())
    }

    async fn list_materials_for_lessons(
        &self,
        lesson_ids: &[String],
    ) -> anyhow::Result<Vec<Material>> {
        let wanted = id_set(lesson_ids);
        let data = self.data.read().await;
        Ok(sorted(
            data.materials
                .values()
                .filter(|m| wanted.contains(m.lesson_id.as_str()))
                .cloned(),
            |m| (m.created_at, m.id.clone()),
        ))
    }

    async fn insert_question(&self, question: &Question) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        data.questions.insert(question.id.clone(), question.clone());
        Ok(())
    }

    async fn find_question(&self, id: &str) -> anyhow::Result<Option<Question>> {
        Ok(self.data.read().await.questions.get(id).cloned())
    }

    async fn list_questions(&self) -> anyhow::Result<Vec<Question>> {
        let data = self.data.read().await;
        Ok(sorted(data.questions.values().cloned(), |q| {
            (q.created_at, q.id.clone())
        }))
    }

    async fn list_questions_for_lessons(
        &self,
        lesson_ids: &[String],
    ) -> anyhow::Result<Vec<Question>> {
        let wanted = id_set(lesson_ids);
        let data = self.data.read().await;
        Ok(sorted(
            data.questions
                .values()
                .filter(|q| wanted.contains(q.lesson_id.as_str()))
                .cloned(),
            |q| (q.created_at, q.id.clone()),
        ))
    }

    async fn list_questions_by_subject(&self, subject: &str) -> anyhow::Result<Vec<Question>> {
        let data = self.data.read().await;
        Ok(sorted(
            data.questions
                .values()
                .filter(|q| q.subject == subject)
                .cloned(),
            |q| (q.created_at, q.id.clone()),
        ))
    }

    async fn list_answers(
        &self,
        user_id: &str,
        question_ids: &[String],
    ) -> anyhow::Result<Vec<UserAnswer>> {
        let wanted = id_set(question_ids);
        let data = self.data.read().await;
        Ok(sorted(
            data.answers
                .iter()
                .filter(|a| a.user_id == user_id && wanted.contains(a.question_id.as_str()))
                .cloned(),
            |a| a.created_at,
        ))
    }

    async fn count_answers_for_users(&self, user_ids: &[String]) -> anyhow::Result<u64> {
        let wanted = id_set(user_ids);
        let data = self.data.read().await;
        Ok(data
            .answers
            .iter()
            .filter(|a| wanted.contains(a.user_id.as_str()))
            .count() as u64)
    }

    async fn commit_submission(
        &self,
        answer: &UserAnswer,
        topic: &str,
    ) -> anyhow::Result<SubmissionOutcome> {
        let mut data = self.data.write().await;

        let mastery_id = Mastery::record_id(&answer.user_id, topic);
        let outcome = trackers::apply_submission(
            data.masteries.get(&mastery_id).cloned(),
            data.gamifications.get(&answer.user_id).cloned(),
            answer,
            topic,
        );

        data.answers.push(answer.clone());
        data.masteries.insert(mastery_id, outcome.mastery.clone());
        data.gamifications
            .insert(answer.user_id.clone(), outcome.gamification.clone());

        Ok(outcome)
    }

    async fn find_gamification(&self, user_id: &str) -> anyhow::Result<Option<Gamification>> {
        Ok(self.data.read().await.gamifications.get(user_id).cloned())
    }

    async fn list_mastery_for_users(&self, user_ids: &[String]) -> anyhow::Result<Vec<Mastery>> {
        let wanted = id_set(user_ids);
        let data = self.data.read().await;
        Ok(sorted(
            data.masteries
                .values()
                .filter(|m| wanted.contains(m.user_id.as_str()))
                .cloned(),
            |m| m.id.clone(),
        ))
    }

    async fn insert_session(&self, session: &Session) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        data.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find_session(&self, id: &str) -> anyhow::Result<Option<Session>> {
        Ok(self.data.read().await.sessions.get(id).cloned())
    }

    async fn update_session(&self, session: &Session) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        match data.sessions.get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => anyhow::bail!("session {} does not exist", session.id),
        }
    }

    async fn list_sessions_started_between(
        &self,
        user_ids: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Session>> {
        let wanted = id_set(user_ids);
        let data = self.data.read().await;
        Ok(sorted(
            data.sessions
                .values()
                .filter(|s| {
                    wanted.contains(s.user_id.as_str())
                        && s.start_time >= start
                        && s.start_time < end
                })
                .cloned(),
            |s| (s.start_time, s.id.clone()),
        ))
    }

    async fn list_recent_sessions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Session>> {
        let data = self.data.read().await;
        let mut sessions: Vec<Session> = data
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| a.id.cmp(&b.id)));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn find_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> anyhow::Result<Option<Progress>> {
        let id = Progress::record_id(user_id, lesson_id);
        Ok(self.data.read().await.progress.get(&id).cloned())
    }

    async fn upsert_progress(&self, progress: &Progress) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        data.progress.insert(progress.id.clone(), progress.clone());
        Ok(())
    }

    async fn list_progress_for_users(&self, user_ids: &[String]) -> anyhow::Result<Vec<Progress>> {
        let wanted = id_set(user_ids);
        let data = self.data.read().await;
        Ok(sorted(
            data.progress
                .values()
                .filter(|p| wanted.contains(p.user_id.as_str()))
                .cloned(),
            |p| p.id.clone(),
        ))
    }

    async fn insert_intervention(&self, intervention: &Intervention) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        data.interventions
            .insert(intervention.id.clone(), intervention.clone());
        Ok(())
    }

    async fn find_intervention(&self, id: &str) -> anyhow::Result<Option<Intervention>> {
        Ok(self.data.read().await.interventions.get(id).cloned())
    }

    async fn update_intervention(&self, intervention: &Intervention) -> anyhow::Result<()> {
        let mut data = self.data.write().await;
        match data.interventions.get_mut(&intervention.id) {
            Some(existing) => {
                *existing = intervention.clone();
                Ok(())
            }
            None => anyhow::bail!("intervention {} does not exist", intervention.id),
        }
    }

    async fn list_interventions(
        &self,
        teacher_id: &str,
        filter: &InterventionFilter,
    ) -> anyhow::Result<Vec<Intervention>> {
        let data = self.data.read().await;
        let mut out: Vec<Intervention> = data
            .interventions
            .values()
            .filter(|i| i.teacher_id == teacher_id && filter.matches(i))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Language;

    fn student(id: &str, class_id: Option<&str>) -> User {
        User {
            id: id.to_string(),
            username: id.to_string(),
            email: format!("{}@example.com", id),
            password_hash: String::new(),
            full_name: id.to_uppercase(),
            role: UserRole::Student,
            language: Language::En,
            class_id: class_id.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    fn answer(user_id: &str, is_correct: bool) -> UserAnswer {
        UserAnswer {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            question_id: "q1".to_string(),
            answer: "x".to_string(),
            is_correct,
            time_taken: Some(30.0),
            hints_used: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn submissions_accumulate_on_the_same_rows() {
        let store = MemoryStore::new();

        store.commit_submission(&answer("u1", true), "Math_easy").await.unwrap();
        let second = store
            .commit_submission(&answer("u1", true), "Math_easy")
            .await
            .unwrap();

        assert_eq!(second.mastery.score, 10.0);
        assert_eq!(second.gamification.points, 30);
        assert_eq!(second.gamification.streak, 2);

        let masteries = store
            .list_mastery_for_users(&["u1".to_string()])
            .await
            .unwrap();
        assert_eq!(masteries.len(), 1);
        assert_eq!(store.count_answers_for_users(&["u1".to_string()]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn students_are_filtered_by_class() {
        let store = MemoryStore::new();
        store.insert_user(&student("s1", Some("c1"))).await.unwrap();
        store.insert_user(&student("s2", Some("c2"))).await.unwrap();
        store.insert_user(&student("s3", None)).await.unwrap();

        let found = store
            .list_students_in_classes(&["c1".to_string()])
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["s1"]);
    }

    #[tokio::test]
    async fn duplicate_user_ids_are_rejected() {
        let store = MemoryStore::new();
        store.insert_user(&student("s1", None)).await.unwrap();
        assert!(store.insert_user(&student("s1", None)).await.is_err());
    }
}
