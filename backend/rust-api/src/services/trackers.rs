//! Mastery and gamification rules applied on every submission.
//!
//! Both store backends call [`apply_submission`] inside their atomic write
//! unit, so these functions never touch storage themselves.

use chrono::{DateTime, Utc};

use crate::models::practice::{Gamification, Mastery, SubmissionOutcome, UserAnswer};

pub const MASTERY_MAX: f64 = 100.0;
pub const MASTERY_GAIN: f64 = 5.0;
pub const MASTERY_LOSS: f64 = 2.0;

pub const POINTS_CORRECT: i64 = 10;
pub const POINTS_SPEED_BONUS: i64 = 5;
/// Answers faster than this (seconds) earn the speed bonus
pub const SPEED_BONUS_THRESHOLD_SECS: f64 = 60.0;

pub fn next_mastery_score(current: f64, is_correct: bool) -> f64 {
    if is_correct {
        (current + MASTERY_GAIN).min(MASTERY_MAX)
    } else {
        (current - MASTERY_LOSS).max(0.0)
    }
}

pub fn points_for(is_correct: bool, time_taken: Option<f64>) -> i64 {
    if !is_correct {
        return 0;
    }
    match time_taken {
        Some(secs) if secs < SPEED_BONUS_THRESHOLD_SECS => POINTS_CORRECT + POINTS_SPEED_BONUS,
        _ => POINTS_CORRECT,
    }
}

pub fn update_mastery(
    row: Option<Mastery>,
    user_id: &str,
    topic: &str,
    is_correct: bool,
    now: DateTime<Utc>,
) -> Mastery {
    let mut mastery = row.unwrap_or_else(|| Mastery::empty(user_id, topic, now));
    mastery.score = next_mastery_score(mastery.score, is_correct);
    mastery.updated_at = now;
    mastery
}

/// Returns the updated row and the points delta applied.
pub fn update_gamification(
    row: Option<Gamification>,
    user_id: &str,
    is_correct: bool,
    time_taken: Option<f64>,
    now: DateTime<Utc>,
) -> (Gamification, i64) {
    let mut gamification = row.unwrap_or_else(|| Gamification::empty(user_id, now));
    let earned = points_for(is_correct, time_taken);

    if is_correct {
        gamification.points += earned;
        gamification.streak += 1;
    } else {
        gamification.streak = 0;
    }
    gamification.updated_at = now;

    (gamification, earned)
}

pub fn apply_submission(
    mastery: Option<Mastery>,
    gamification: Option<Gamification>,
    answer: &UserAnswer,
    topic: &str,
) -> SubmissionOutcome {
    let now = answer.created_at;
    let mastery = update_mastery(mastery, &answer.user_id, topic, answer.is_correct, now);
    let (gamification, points_earned) = update_gamification(
        gamification,
        &answer.user_id,
        answer.is_correct,
        answer.time_taken,
        now,
    );

    SubmissionOutcome {
        mastery,
        gamification,
        points_earned,
    }
}
