use std::collections::HashMap;
use std::sync::Arc;

use super::analytics_service::mean;
use super::store::Store;
use crate::error::AppResult;
use crate::models::classroom::Class;
use crate::models::management::{ClassSummary, LessonSummary, StudentSummary, TeacherSummary};
use crate::models::user::{User, UserRole};
use crate::utils::time::round1;

const UNKNOWN_TEACHER: &str = "Unknown";

fn count_by<'a>(keys: impl Iterator<Item = &'a str>) -> HashMap<&'a str, usize> {
    let mut counts = HashMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Platform-wide listings for managers.
pub struct ManagementService {
    store: Arc<dyn Store>,
}

impl ManagementService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn teacher_names(&self, classes: &[Class]) -> AppResult<HashMap<String, String>> {
        let mut teacher_ids: Vec<String> = classes.iter().map(|c| c.teacher_id.clone()).collect();
        teacher_ids.sort();
        teacher_ids.dedup();
        Ok(self
            .store
            .find_users(&teacher_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.full_name))
            .collect())
    }

    fn teacher_name(names: &HashMap<String, String>, class: &Class) -> String {
        names
            .get(&class.teacher_id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_TEACHER.to_string())
    }

    pub async fn list_teachers(&self) -> AppResult<Vec<TeacherSummary>> {
        let teachers = self.store.list_users_by_role(UserRole::Teacher).await?;
        let classes = self.store.list_classes().await?;
        let students = self.store.list_users_by_role(UserRole::Student).await?;

        let class_owner: HashMap<&str, &str> = classes
            .iter()
            .map(|c| (c.id.as_str(), c.teacher_id.as_str()))
            .collect();
        let class_counts = count_by(classes.iter().map(|c| c.teacher_id.as_str()));
        let student_counts = count_by(students.iter().filter_map(|s| {
            s.class_id
                .as_deref()
                .and_then(|class_id| class_owner.get(class_id).copied())
        }));

        Ok(teachers
            .into_iter()
            .map(|teacher| TeacherSummary {
                class_count: class_counts.get(teacher.id.as_str()).copied().unwrap_or(0),
                student_count: student_counts.get(teacher.id.as_str()).copied().unwrap_or(0),
                id: teacher.id,
                username: teacher.username,
                full_name: teacher.full_name,
                email: teacher.email,
                created_at: teacher.created_at,
            })
            .collect())
    }

    pub async fn list_students(&self) -> AppResult<Vec<StudentSummary>> {
        let students = self.store.list_users_by_role(UserRole::Student).await?;
        let classes = self.store.list_classes().await?;
        let names = self.teacher_names(&classes).await?;
        let classes_by_id: HashMap<&str, &Class> =
            classes.iter().map(|c| (c.id.as_str(), c)).collect();

        let student_ids: Vec<String> = students.iter().map(|s| s.id.clone()).collect();
        let mut scores: HashMap<String, Vec<f64>> = HashMap::new();
        for row in self.store.list_mastery_for_users(&student_ids).await? {
            scores.entry(row.user_id).or_default().push(row.score);
        }

        Ok(students
            .into_iter()
            .map(|student: User| {
                let class = student
                    .class_id
                    .as_deref()
                    .and_then(|id| classes_by_id.get(id).copied());
                let mastery = scores
                    .get(&student.id)
                    .map(|s| mean(s.iter().copied()))
                    .unwrap_or(0.0);
                StudentSummary {
                    class_name: class.map(|c| c.name.clone()),
                    teacher_name: class.map(|c| Self::teacher_name(&names, c)),
                    mastery_score: round1(mastery),
                    id: student.id,
                    username: student.username,
                    full_name: student.full_name,
                    email: student.email,
                    created_at: student.created_at,
                }
            })
            .collect())
    }

    pub async fn list_classes(&self) -> AppResult<Vec<ClassSummary>> {
        let classes = self.store.list_classes().await?;
        let names = self.teacher_names(&classes).await?;
        let class_ids: Vec<String> = classes.iter().map(|c| c.id.clone()).collect();

        let students = self.store.list_students_in_classes(&class_ids).await?;
        let courses = self.store.list_courses_for_classes(&class_ids).await?;
        let student_counts = count_by(students.iter().filter_map(|s| s.class_id.as_deref()));
        let course_counts = count_by(courses.iter().map(|c| c.class_id.as_str()));

        Ok(classes
            .iter()
            .map(|class| ClassSummary {
                id: class.id.clone(),
                name: class.name.clone(),
                subject: class.subject.clone(),
                teacher_name: Self::teacher_name(&names, class),
                student_count: student_counts.get(class.id.as_str()).copied().unwrap_or(0),
                course_count: course_counts.get(class.id.as_str()).copied().unwrap_or(0),
                created_at: class.created_at,
            })
            .collect())
    }

    /// Lessons whose unit, course and class all resolve; orphans are skipped.
    pub async fn list_lessons(&self) -> AppResult<Vec<LessonSummary>> {
        let lessons = self.store.list_lessons().await?;
        let units = self.store.list_units().await?;
        let courses = self.store.list_courses().await?;
        let classes = self.store.list_classes().await?;
        let names = self.teacher_names(&classes).await?;

        let lesson_ids: Vec<String> = lessons.iter().map(|l| l.id.clone()).collect();
        let questions = self.store.list_questions_for_lessons(&lesson_ids).await?;
        let question_counts = count_by(questions.iter().map(|q| q.lesson_id.as_str()));

        let units: HashMap<&str, _> = units.iter().map(|u| (u.id.as_str(), u)).collect();
        let courses: HashMap<&str, _> = courses.iter().map(|c| (c.id.as_str(), c)).collect();
        let classes: HashMap<&str, _> = classes.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut summaries = Vec::with_capacity(lessons.len());
        for lesson in &lessons {
            let Some(unit) = units.get(lesson.unit_id.as_str()) else {
                continue;
            };
            let Some(course) = courses.get(unit.course_id.as_str()) else {
                continue;
            };
            let Some(class) = classes.get(course.class_id.as_str()) else {
                continue;
            };
            summaries.push(LessonSummary {
                id: lesson.id.clone(),
                title: lesson.title.clone(),
                unit_name: unit.name.clone(),
                course_name: course.name.clone(),
                class_name: class.name.clone(),
                teacher_name: Self::teacher_name(&names, class),
                question_count: question_counts.get(lesson.id.as_str()).copied().unwrap_or(0),
                created_at: lesson.created_at,
            });
        }

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::{Course, Lesson, Unit};
    use crate::models::practice::UserAnswer;
    use crate::models::user::Language;
    use crate::services::store::MemoryStore;
    use chrono::Utc;

    fn user(id: &str, role: UserRole, class_id: Option<&str>) -> User {
        User {
            id: id.to_string(),
            username: id.to_string(),
            email: format!("{}@example.com", id),
            password_hash: String::new(),
            full_name: format!("{} name", id),
            role,
            language: Language::En,
            class_id: class_id.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    async fn seeded() -> (Arc<MemoryStore>, ManagementService) {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        for u in [
            user("t1", UserRole::Teacher, None),
            user("t2", UserRole::Teacher, None),
            user("s1", UserRole::Student, Some("c1")),
            user("s2", UserRole::Student, Some("c1")),
            user("s3", UserRole::Student, None),
        ] {
            store.insert_user(&u).await.unwrap();
        }
        store
            .insert_class(&Class {
                id: "c1".to_string(),
                name: "7B".to_string(),
                subject: "Math".to_string(),
                teacher_id: "t1".to_string(),
                created_at: now,
            })
            .await
            .unwrap();
        store
            .insert_course(&Course {
                id: "co1".to_string(),
                name: "Algebra".to_string(),
                description: None,
                subject: "Math".to_string(),
                class_id: "c1".to_string(),
                created_at: now,
            })
            .await
            .unwrap();
        store
            .insert_unit(&Unit {
                id: "u1".to_string(),
                name: "Equations".to_string(),
                course_id: "co1".to_string(),
                created_at: now,
            })
            .await
            .unwrap();
        for (id, unit_id) in [("l1", "u1"), ("orphan", "missing-unit")] {
            store
                .insert_lesson(&Lesson {
                    id: id.to_string(),
                    title: format!("Lesson {}", id),
                    unit_id: unit_id.to_string(),
                    created_at: now,
                })
                .await
                .unwrap();
        }
        let service = ManagementService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn teachers_count_classes_and_students() {
        let (_, service) = seeded().await;
        let teachers = service.list_teachers().await.unwrap();
        let t1 = teachers.iter().find(|t| t.id == "t1").unwrap();
        let t2 = teachers.iter().find(|t| t.id == "t2").unwrap();
        assert_eq!((t1.class_count, t1.student_count), (1, 2));
        assert_eq!((t2.class_count, t2.student_count), (0, 0));
    }

    #[tokio::test]
    async fn students_carry_class_teacher_and_mastery() {
        let (store, service) = seeded().await;
        for topic in ["Math_easy", "Math_hard"] {
            let answer = UserAnswer {
                id: format!("a-{}", topic),
                user_id: "s1".to_string(),
                question_id: "q".to_string(),
                answer: "x".to_string(),
                is_correct: true,
                time_taken: None,
                hints_used: 0,
                created_at: Utc::now(),
            };
            store.commit_submission(&answer, topic).await.unwrap();
        }

        let students = service.list_students().await.unwrap();
        let s1 = students.iter().find(|s| s.id == "s1").unwrap();
        assert_eq!(s1.class_name.as_deref(), Some("7B"));
        assert_eq!(s1.teacher_name.as_deref(), Some("t1 name"));
        assert!(s1.mastery_score > 0.0);

        let s3 = students.iter().find(|s| s.id == "s3").unwrap();
        assert!(s3.class_name.is_none());
        assert_eq!(s3.mastery_score, 0.0);
    }

    #[tokio::test]
    async fn lessons_skip_orphans() {
        let (_, service) = seeded().await;
        let lessons = service.list_lessons().await.unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].course_name, "Algebra");
        assert_eq!(lessons[0].teacher_name, "t1 name");
        assert_eq!(lessons[0].question_count, 0);

        let classes = service.list_classes().await.unwrap();
        assert_eq!(classes[0].student_count, 2);
        assert_eq!(classes[0].course_count, 1);
    }
}
