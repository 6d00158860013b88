//! Role-based capability gate. Every handler names the operation it
//! performs and gets back an [`Actor`] only when the caller's role allows it.

use crate::error::{AppError, AppResult};
use crate::metrics::ACCESS_DENIED_TOTAL;
use crate::middlewares::auth::JwtClaims;
use crate::models::user::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ReadProfile,
    UpdateProfile,
    CreateClass,
    ListClasses,
    EnrollStudent,
    AuthorContent,
    ReadContent,
    ListQuestions,
    SelectQuestion,
    SubmitAnswer,
    RequestHint,
    ViewOwnMastery,
    ViewOwnGamification,
    TrackActivity,
    ViewDashboard,
    ViewStudentInsight,
    ViewClassProgress,
    ManageInterventions,
    ViewPlatformOverview,
    ListPlatformEntities,
}

const ANY_ROLE: &[UserRole] = &[UserRole::Student, UserRole::Teacher, UserRole::Manager];
const STUDENT: &[UserRole] = &[UserRole::Student];
const TEACHER: &[UserRole] = &[UserRole::Teacher];
const MANAGER: &[UserRole] = &[UserRole::Manager];
const STAFF: &[UserRole] = &[UserRole::Teacher, UserRole::Manager];

impl Operation {
    pub fn permitted_roles(self) -> &'static [UserRole] {
        match self {
            Operation::ReadProfile | Operation::UpdateProfile | Operation::ReadContent => ANY_ROLE,
            Operation::CreateClass
            | Operation::EnrollStudent
            | Operation::AuthorContent
            | Operation::ListQuestions
            | Operation::ViewDashboard
            | Operation::ViewStudentInsight
            | Operation::ViewClassProgress
            | Operation::ManageInterventions => TEACHER,
            Operation::ListClasses => STAFF,
            Operation::SelectQuestion
            | Operation::SubmitAnswer
            | Operation::RequestHint
            | Operation::ViewOwnMastery
            | Operation::ViewOwnGamification
            | Operation::TrackActivity => STUDENT,
            Operation::ViewPlatformOverview | Operation::ListPlatformEntities => MANAGER,
        }
    }

    pub fn permits(self, role: UserRole) -> bool {
        self.permitted_roles().contains(&role)
    }

    fn label(self) -> &'static str {
        match self {
            Operation::ReadProfile => "read_profile",
            Operation::UpdateProfile => "update_profile",
            Operation::CreateClass => "create_class",
            Operation::ListClasses => "list_classes",
            Operation::EnrollStudent => "enroll_student",
            Operation::AuthorContent => "author_content",
            Operation::ReadContent => "read_content",
            Operation::ListQuestions => "list_questions",
            Operation::SelectQuestion => "select_question",
            Operation::SubmitAnswer => "submit_answer",
            Operation::RequestHint => "request_hint",
            Operation::ViewOwnMastery => "view_own_mastery",
            Operation::ViewOwnGamification => "view_own_gamification",
            Operation::TrackActivity => "track_activity",
            Operation::ViewDashboard => "view_dashboard",
            Operation::ViewStudentInsight => "view_student_insight",
            Operation::ViewClassProgress => "view_class_progress",
            Operation::ManageInterventions => "manage_interventions",
            Operation::ViewPlatformOverview => "view_platform_overview",
            Operation::ListPlatformEntities => "list_platform_entities",
        }
    }
}

/// Authenticated caller cleared for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: UserRole,
}

impl Actor {
    pub fn authorize(claims: &JwtClaims, operation: Operation) -> AppResult<Actor> {
        if !operation.permits(claims.role) {
            tracing::warn!(
                "Access denied: {} ({}) attempted {}",
                claims.sub,
                claims.role.as_str(),
                operation.label()
            );
            ACCESS_DENIED_TOTAL
                .with_label_values(&[operation.label()])
                .inc();
            return Err(AppError::forbidden(format!(
                "Role '{}' may not perform this action",
                claims.role.as_str()
            )));
        }

        Ok(Actor {
            user_id: claims.sub.clone(),
            role: claims.role,
        })
    }
}
