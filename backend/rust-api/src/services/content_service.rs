use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::capability::Actor;
use super::store::Store;
use crate::error::{AppError, AppResult};
use crate::models::content::{
    Course, CourseListQuery, CreateCourseRequest, CreateLessonRequest, CreateMaterialRequest,
    CreateQuestionRequest, CreateUnitRequest, Lesson, LessonListQuery, Material,
    MaterialListQuery, Question, QuestionListQuery, QuestionType, Unit, UnitListQuery,
};
use crate::models::user::UserRole;

const MIN_MCQ_OPTIONS: usize = 2;

/// Authoring and browsing of the course → unit → lesson hierarchy.
///
/// Visibility follows class membership: students see their own class,
/// teachers see the classes they teach, managers see everything.
pub struct ContentService {
    store: Arc<dyn Store>,
}

impl ContentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// `None` means unrestricted.
    async fn visible_class_ids(&self, actor: &Actor) -> AppResult<Option<Vec<String>>> {
        match actor.role {
            UserRole::Manager => Ok(None),
            UserRole::Teacher => {
                let classes = self.store.list_classes_by_teacher(&actor.user_id).await?;
                Ok(Some(classes.into_iter().map(|c| c.id).collect()))
            }
            UserRole::Student => {
                let user = self
                    .store
                    .find_user(&actor.user_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("User not found"))?;
                Ok(Some(user.class_id.into_iter().collect()))
            }
        }
    }

    async fn check_class_access(&self, actor: &Actor, class_id: &str) -> AppResult<()> {
        match self.visible_class_ids(actor).await? {
            Some(ids) if !ids.iter().any(|id| id == class_id) => {
                Err(AppError::forbidden("Access denied"))
            }
            _ => Ok(()),
        }
    }

    async fn check_class_owner(&self, actor: &Actor, class_id: &str) -> AppResult<()> {
        let owned = self
            .store
            .find_class(class_id)
            .await?
            .map_or(false, |class| class.teacher_id == actor.user_id);
        if owned {
            Ok(())
        } else {
            Err(AppError::forbidden("Access denied"))
        }
    }

    async fn load_course(&self, course_id: &str) -> AppResult<Course> {
        self.store
            .find_course(course_id)
            .await?
            .ok_or_else(|| AppError::not_found("Course not found"))
    }

    async fn load_unit(&self, unit_id: &str) -> AppResult<Unit> {
        self.store
            .find_unit(unit_id)
            .await?
            .ok_or_else(|| AppError::not_found("Unit not found"))
    }

    async fn load_lesson(&self, lesson_id: &str) -> AppResult<Lesson> {
        self.store
            .find_lesson(lesson_id)
            .await?
            .ok_or_else(|| AppError::not_found("Lesson not found"))
    }

    /// Class that owns the lesson, via unit and course.
    async fn class_of_lesson(&self, lesson: &Lesson) -> AppResult<String> {
        let unit = self.load_unit(&lesson.unit_id).await?;
        let course = self.load_course(&unit.course_id).await?;
        Ok(course.class_id)
    }

    // Courses

    pub async fn create_course(&self, actor: &Actor, req: CreateCourseRequest) -> AppResult<Course> {
        req.validate()?;
        let class = self
            .store
            .find_class(&req.class_id)
            .await?
            .filter(|c| c.teacher_id == actor.user_id)
            .ok_or_else(|| AppError::not_found("Class not found or not owned by teacher"))?;

        let course = Course {
            id: Uuid::new_v4().to_string(),
            name: req.name,
            description: req.description,
            subject: req.subject,
            class_id: class.id,
            created_at: Utc::now(),
        };
        self.store.insert_course(&course).await?;
        tracing::info!("Course created: {} in class {}", course.id, course.class_id);

        Ok(course)
    }

    pub async fn list_courses(&self, actor: &Actor, query: &CourseListQuery) -> AppResult<Vec<Course>> {
        let courses = match self.visible_class_ids(actor).await? {
            Some(ids) => self.store.list_courses_for_classes(&ids).await?,
            None => self.store.list_courses().await?,
        };

        Ok(match &query.class_id {
            Some(class_id) => courses
                .into_iter()
                .filter(|c| &c.class_id == class_id)
                .collect(),
            None => courses,
        })
    }

    pub async fn get_course(&self, actor: &Actor, course_id: &str) -> AppResult<Course> {
        let course = self.load_course(course_id).await?;
        self.check_class_access(actor, &course.class_id).await?;
        Ok(course)
    }

    // Units

    pub async fn create_unit(&self, actor: &Actor, req: CreateUnitRequest) -> AppResult<Unit> {
        req.validate()?;
        let course = self.load_course(&req.course_id).await?;
        self.check_class_owner(actor, &course.class_id).await?;

        let unit = Unit {
            id: Uuid::new_v4().to_string(),
            name: req.name,
            course_id: course.id,
            created_at: Utc::now(),
        };
        self.store.insert_unit(&unit).await?;
        tracing::info!("Unit created: {} in course {}", unit.id, unit.course_id);

        Ok(unit)
    }

    pub async fn list_units(&self, actor: &Actor, query: &UnitListQuery) -> AppResult<Vec<Unit>> {
        if let Some(course_id) = &query.course_id {
            let course = self.load_course(course_id).await?;
            self.check_class_access(actor, &course.class_id).await?;
            return Ok(self
                .store
                .list_units_for_courses(std::slice::from_ref(course_id))
                .await?);
        }

        match self.visible_class_ids(actor).await? {
            Some(ids) => {
                let courses = self.store.list_courses_for_classes(&ids).await?;
                let course_ids: Vec<String> = courses.into_iter().map(|c| c.id).collect();
                Ok(self.store.list_units_for_courses(&course_ids).await?)
            }
            None => Ok(self.store.list_units().await?),
        }
    }

    // Lessons

    pub async fn create_lesson(&self, actor: &Actor, req: CreateLessonRequest) -> AppResult<Lesson> {
        req.validate()?;
        let unit = self.load_unit(&req.unit_id).await?;
        let course = self.load_course(&unit.course_id).await?;
        self.check_class_owner(actor, &course.class_id).await?;

        let lesson = Lesson {
            id: Uuid::new_v4().to_string(),
            title: req.title,
            unit_id: unit.id,
            created_at: Utc::now(),
        };
        self.store.insert_lesson(&lesson).await?;
        tracing::info!("Lesson created: {} in unit {}", lesson.id, lesson.unit_id);

        Ok(lesson)
    }

    pub async fn list_lessons(&self, actor: &Actor, query: &LessonListQuery) -> AppResult<Vec<Lesson>> {
        if let Some(unit_id) = &query.unit_id {
            let unit = self.load_unit(unit_id).await?;
            let course = self.load_course(&unit.course_id).await?;
            self.check_class_access(actor, &course.class_id).await?;
            return Ok(self
                .store
                .list_lessons_for_units(std::slice::from_ref(unit_id))
                .await?);
        }

        match self.visible_class_ids(actor).await? {
            Some(ids) => Ok(self.lessons_for_classes(&ids).await?),
            None => Ok(self.store.list_lessons().await?),
        }
    }

    /// Lessons under the given classes, in course → unit → lesson order.
    pub async fn lessons_for_classes(&self, class_ids: &[String]) -> AppResult<Vec<Lesson>> {
        let courses = self.store.list_courses_for_classes(class_ids).await?;
        let mut lessons = Vec::new();
        for course in courses {
            let units = self
                .store
                .list_units_for_courses(std::slice::from_ref(&course.id))
                .await?;
            for unit in units {
                lessons.extend(
                    self.store
                        .list_lessons_for_units(std::slice::from_ref(&unit.id))
                        .await?,
                );
            }
        }
        Ok(lessons)
    }

    // Materials

    pub async fn create_material(
        &self,
        actor: &Actor,
        req: CreateMaterialRequest,
    ) -> AppResult<Material> {
        req.validate()?;
        let lesson = self.load_lesson(&req.lesson_id).await?;
        let class_id = self.class_of_lesson(&lesson).await?;
        self.check_class_owner(actor, &class_id).await?;

        let material = Material {
            id: Uuid::new_v4().to_string(),
            lesson_id: lesson.id,
            name: req.name,
            file_path: req.file_path,
            content_type: req.content_type,
            language: req.language.unwrap_or_else(|| "en".to_string()),
            created_at: Utc::now(),
        };
        self.store.insert_material(&material).await?;
        tracing::info!("Material registered: {} for lesson {}", material.id, material.lesson_id);

        Ok(material)
    }

    pub async fn list_materials(
        &self,
        actor: &Actor,
        query: &MaterialListQuery,
    ) -> AppResult<Vec<Material>> {
        let lesson_ids: Vec<String> = match &query.lesson_id {
            Some(lesson_id) => {
                let lesson = self.load_lesson(lesson_id).await?;
                let class_id = self.class_of_lesson(&lesson).await?;
                self.check_class_access(actor, &class_id).await?;
                vec![lesson.id]
            }
            None => match self.visible_class_ids(actor).await? {
                Some(ids) => self
                    .lessons_for_classes(&ids)
                    .await?
                    .into_iter()
                    .map(|l| l.id)
                    .collect(),
                None => self
                    .store
                    .list_lessons()
                    .await?
                    .into_iter()
                    .map(|l| l.id)
                    .collect(),
            },
        };

        Ok(self.store.list_materials_for_lessons(&lesson_ids).await?)
    }

    // Questions

    pub async fn create_question(
        &self,
        actor: &Actor,
        req: CreateQuestionRequest,
    ) -> AppResult<Question> {
        req.validate()?;
        let options = validate_options(&req)?;

        let lesson = self.load_lesson(&req.lesson_id).await?;
        let class_id = self.class_of_lesson(&lesson).await?;
        self.check_class_owner(actor, &class_id).await?;

        let question = Question {
            id: Uuid::new_v4().to_string(),
            lesson_id: lesson.id,
            question_text: req.question_text,
            question_type: req.question_type,
            options,
            correct_answer: req.correct_answer,
            difficulty: req.difficulty,
            subject: req.subject,
            created_at: Utc::now(),
        };
        self.store.insert_question(&question).await?;
        tracing::info!(
            "Question created: {} in lesson {} (topic {})",
            question.id,
            question.lesson_id,
            question.topic()
        );

        Ok(question)
    }

    /// Questions with answer keys, limited to lessons the teacher owns.
    pub async fn list_questions(
        &self,
        actor: &Actor,
        query: &QuestionListQuery,
    ) -> AppResult<Vec<Question>> {
        let lesson_ids: Vec<String> = match &query.lesson_id {
            Some(lesson_id) => {
                let lesson = self.load_lesson(lesson_id).await?;
                let class_id = self.class_of_lesson(&lesson).await?;
                self.check_class_owner(actor, &class_id).await?;
                vec![lesson.id]
            }
            None => {
                let classes = self.store.list_classes_by_teacher(&actor.user_id).await?;
                let class_ids: Vec<String> = classes.into_iter().map(|c| c.id).collect();
                self.lessons_for_classes(&class_ids)
                    .await?
                    .into_iter()
                    .map(|l| l.id)
                    .collect()
            }
        };

        Ok(self.store.list_questions_for_lessons(&lesson_ids).await?)
    }
}

/// mcq needs at least two options with the answer among them; other
/// types carry no options.
fn validate_options(req: &CreateQuestionRequest) -> AppResult<Option<Vec<String>>> {
    match req.question_type {
        QuestionType::Mcq => {
            let options = req.options.clone().unwrap_or_default();
            if options.len() < MIN_MCQ_OPTIONS {
                return Err(AppError::invalid_input(
                    "Multiple choice questions need at least 2 options",
                ));
            }
            if !options.iter().any(|o| o.trim() == req.correct_answer.trim()) {
                return Err(AppError::invalid_input(
                    "Correct answer must be one of the options",
                ));
            }
            Ok(Some(options))
        }
        QuestionType::ShortAnswer => Ok(None),
    }
}
