use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::content_service::ContentService;
use super::store::Store;
use crate::error::{AppError, AppResult};
use crate::models::activity::{Progress, ProgressStatus, Session};
use crate::models::analytics::{
    DashboardMetrics, LessonProgress, PlatformOverview, RecentActivity, StudentInsight,
    TopPerformer,
};
use crate::models::content::Lesson;
use crate::models::practice::Mastery;
use crate::models::user::{User, UserRole};
use crate::utils::time::{round1, utc_day_bounds};

pub const TOP_PERFORMER_LIMIT: usize = 5;
pub const RECENT_SESSION_LIMIT: usize = 10;
const STRUGGLING_BELOW: f64 = 50.0;

pub const SUPPORT_RECOMMENDATION: &str = "Student needs additional support in core concepts";
pub const ENGAGEMENT_RECOMMENDATION: &str = "Low engagement - consider reaching out to student";
pub const INACTIVE_RECOMMENDATION: &str = "Student has been inactive recently";

pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn distinct_users<'a>(user_ids: impl Iterator<Item = &'a str>) -> usize {
    user_ids.collect::<HashSet<_>>().len()
}

/// Top students by mean mastery, descending, ties by id. Students without
/// any mastery row are left out.
pub fn top_performers(students: &[User], masteries: &[Mastery], limit: usize) -> Vec<TopPerformer> {
    let mut by_user: HashMap<&str, Vec<f64>> = HashMap::new();
    for row in masteries {
        by_user.entry(row.user_id.as_str()).or_default().push(row.score);
    }

    let mut ranked: Vec<(&User, f64)> = students
        .iter()
        .filter_map(|s| {
            by_user
                .get(s.id.as_str())
                .map(|scores| (s, mean(scores.iter().copied())))
        })
        .collect();

    ranked.sort_by(|(a, a_score), (b, b_score)| {
        b_score
            .total_cmp(a_score)
            .then_with(|| a.id.cmp(&b.id))
    });

    ranked
        .into_iter()
        .take(limit)
        .map(|(student, score)| TopPerformer {
            id: student.id.clone(),
            name: student.full_name.clone(),
            average_mastery: round1(score),
        })
        .collect()
}

/// Three independent rules over the student's numbers.
pub fn recommendations(mean_mastery: f64, progress_rate: f64, recent_sessions: usize) -> Vec<String> {
    let mut out = Vec::new();
    if mean_mastery < 50.0 {
        out.push(SUPPORT_RECOMMENDATION.to_string());
    }
    if progress_rate < 30.0 {
        out.push(ENGAGEMENT_RECOMMENDATION.to_string());
    }
    if recent_sessions < 3 {
        out.push(INACTIVE_RECOMMENDATION.to_string());
    }
    out
}

pub fn lesson_progress(lesson: &Lesson, rows: &[&Progress]) -> LessonProgress {
    LessonProgress {
        lesson_id: lesson.id.clone(),
        lesson_title: lesson.title.clone(),
        average_completion: round1(mean(rows.iter().map(|p| p.completion_percentage))),
        struggling_students: rows
            .iter()
            .filter(|p| p.completion_percentage < STRUGGLING_BELOW)
            .count(),
        completed_students: rows
            .iter()
            .filter(|p| p.status == ProgressStatus::Completed)
            .count(),
    }
}

fn active_count(sessions: &[Session]) -> usize {
    distinct_users(sessions.iter().map(|s| s.user_id.as_str()))
}

pub struct AnalyticsService {
    store: Arc<dyn Store>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn teacher_students(&self, teacher_id: &str) -> AppResult<Vec<User>> {
        let classes = self.store.list_classes_by_teacher(teacher_id).await?;
        if classes.is_empty() {
            return Ok(Vec::new());
        }
        let class_ids: Vec<String> = classes.into_iter().map(|c| c.id).collect();
        Ok(self.store.list_students_in_classes(&class_ids).await?)
    }

    pub async fn get_dashboard(&self, teacher_id: &str) -> AppResult<DashboardMetrics> {
        self.dashboard_at(teacher_id, Utc::now()).await
    }

    pub async fn dashboard_at(
        &self,
        teacher_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<DashboardMetrics> {
        let students = self.teacher_students(teacher_id).await?;
        if students.is_empty() {
            return Ok(DashboardMetrics::empty());
        }
        let student_ids: Vec<String> = students.iter().map(|s| s.id.clone()).collect();

        let (day_start, day_end) = utc_day_bounds(now);
        let today = self
            .store
            .list_sessions_started_between(&student_ids, day_start, day_end)
            .await?;
        let masteries = self.store.list_mastery_for_users(&student_ids).await?;
        let total_questions_attempted = self.store.count_answers_for_users(&student_ids).await?;
        let progress = self.store.list_progress_for_users(&student_ids).await?;

        let completed_students = distinct_users(
            progress
                .iter()
                .filter(|p| p.status == ProgressStatus::Completed)
                .map(|p| p.user_id.as_str()),
        );

        Ok(DashboardMetrics {
            total_students: students.len(),
            active_students_today: active_count(&today),
            average_mastery_score: round1(mean(masteries.iter().map(|m| m.score))),
            total_questions_attempted,
            completion_rate: round1(percentage(completed_students, students.len())),
            top_performing_students: top_performers(&students, &masteries, TOP_PERFORMER_LIMIT),
        })
    }

    pub async fn get_student_insight(
        &self,
        teacher_id: &str,
        student_id: &str,
    ) -> AppResult<StudentInsight> {
        let student = self
            .store
            .find_user(student_id)
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
                "Teacher {} denied insight into student {}",
                teacher_id,
                student_id
            );
            return Err(AppError::forbidden("Access denied"));
        }

        let ids = [student.id.clone()];
        let masteries = self.store.list_mastery_for_users(&ids).await?;
        let recent = self
            .store
            .list_recent_sessions(&student.id, RECENT_SESSION_LIMIT)
            .await?;
        let progress = self.store.list_progress_for_users(&ids).await?;

        let completed = progress
            .iter()
            .filter(|p| p.status == ProgressStatus::Completed)
            .count();
        let progress_rate = percentage(completed, progress.len());
        let mean_mastery = mean(masteries.iter().map(|m| m.score));

        let mastery_scores: BTreeMap<String, f64> = masteries
            .into_iter()
            .map(|m| (m.topic, m.score))
            .collect();

        Ok(StudentInsight {
            student_id: student.id,
            student_name: student.full_name,
            mastery_scores,
            recommendations: recommendations(mean_mastery, progress_rate, recent.len()),
            recent_activity: recent
                .into_iter()
                .map(|s| RecentActivity {
                    session_type: s.session_type,
                    start_time: s.start_time,
                    duration: s.duration,
                    questions_attempted: s.questions_attempted,
                    correct_answers: s.correct_answers,
                })
                .collect(),
            progress_rate: round1(progress_rate),
        })
    }

    pub async fn get_class_progress(
        &self,
        teacher_id: &str,
        class_id: &str,
    ) -> AppResult<Vec<LessonProgress>> {
        let class = self
            .store
            .find_class(class_id)
            .await?
            .filter(|c| c.teacher_id == teacher_id)
            .ok_or_else(|| AppError::forbidden("Access denied"))?;

        let class_ids = [class.id.clone()];
        let students = self.store.list_students_in_classes(&class_ids).await?;
        let student_ids: Vec<String> = students.into_iter().map(|s| s.id).collect();
        let progress = self.store.list_progress_for_users(&student_ids).await?;

        let mut by_lesson: HashMap<&str, Vec<&Progress>> = HashMap::new();
        for row in &progress {
            by_lesson.entry(row.lesson_id.as_str()).or_default().push(row);
        }

        let lessons = ContentService::new(self.store.clone())
            .lessons_for_classes(&class_ids)
            .await?;
        let report = lessons
            .iter()
            .map(|lesson| {
                let rows = by_lesson
                    .get(lesson.id.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                lesson_progress(lesson, rows)
            })
            .collect();

        Ok(report)
    }

    pub async fn get_platform_overview(&self) -> AppResult<PlatformOverview> {
        self.platform_overview_at(Utc::now()).await
    }

    pub async fn platform_overview_at(&self, now: DateTime<Utc>) -> AppResult<PlatformOverview> {
        let students = self.store.list_users_by_role(UserRole::Student).await?;
        let student_ids: Vec<String> = students.into_iter().map(|s| s.id).collect();

        let (day_start, day_end) = utc_day_bounds(now);
        let today = self
            .store
            .list_sessions_started_between(&student_ids, day_start, day_end)
            .await?;
        let masteries = self.store.list_mastery_for_users(&student_ids).await?;

        Ok(PlatformOverview {
            total_teachers: self.store.count_users_by_role(UserRole::Teacher).await?,
            total_students: student_ids.len() as u64,
            total_classes: self.store.count_classes().await?,
            total_lessons: self.store.count_lessons().await?,
            active_students_today: active_count(&today),
            average_mastery_score: round1(mean(masteries.iter().map(|m| m.score))),
        })
    }
}
