//! Performance feedback adaptation
//!
//! Weekly feedback (completed sessions, perceived effort, heart rate) nudges
//! the athlete's performance factor, which scales every future plan.

use serde::Serialize;

use crate::error::{CoachError, Result};
use crate::models::{
    AthleteProfile, FeedbackRecord, NewFeedback, MAX_PERFORMANCE_FACTOR, MIN_PERFORMANCE_FACTOR,
};
use crate::store::Store;

const CONSISTENCY_WEIGHT: f64 = 0.3;
const EFFORT_WEIGHT: f64 = 0.4;
const HEART_RATE_WEIGHT: f64 = 0.3;

/// Easy-run heart rate as a share of the baseline trial average
const EASY_HEART_RATE_RATIO: f64 = 0.9;

/// Stored feedback together with the factor it produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackOutcome {
    pub record: FeedbackRecord,
    pub performance_factor: f64,
}

pub struct PerformanceAdapter;

impl PerformanceAdapter {
    /// Effort factor from the mean perceived effort (0-10).
    ///
    /// Thresholds are checked in the order `< 4`, `< 6`, `> 8`, `> 6`, so a
    /// mean effort of exactly 6 matches none of them and keeps 1.0.
    pub fn effort_factor(mean_effort: f64) -> f64 {
        if mean_effort < 4.0 {
            1.15
        } else if mean_effort < 6.0 {
            1.05
        } else if mean_effort > 8.0 {
            0.85
        } else if mean_effort > 6.0 {
            0.95
        } else {
            1.0
        }
    }

    /// Heart-rate factor against the expected easy-run heart rate
    pub fn heart_rate_factor(mean_heart_rate: Option<f64>, baseline_heart_rate: f64) -> f64 {
        let Some(actual) = mean_heart_rate else {
            return 1.0;
        };
        let expected = baseline_heart_rate * EASY_HEART_RATE_RATIO;

        if actual > expected * 1.15 {
            0.85
        } else if actual > expected * 1.05 {
            0.95
        } else if actual < expected * 0.85 {
            1.15
        } else if actual < expected * 0.95 {
            1.05
        } else {
            1.0
        }
    }

    /// New performance factor for the athlete, clamped to [0.7, 1.3]
    pub fn update_performance_factor(athlete: &AthleteProfile, feedback: &NewFeedback) -> f64 {
        let consistency_ratio = f64::from(feedback.consistency) / f64::from(athlete.days_per_week);
        let effort = Self::effort_factor(feedback.mean_effort);
        let heart_rate =
            Self::heart_rate_factor(feedback.mean_heart_rate, athlete.baseline.avg_heart_rate);

        let weighted = consistency_ratio * CONSISTENCY_WEIGHT
            + effort * EFFORT_WEIGHT
            + heart_rate * HEART_RATE_WEIGHT;

        (weighted * athlete.performance_factor).clamp(MIN_PERFORMANCE_FACTOR, MAX_PERFORMANCE_FACTOR)
    }

    pub fn validate(athlete: &AthleteProfile, feedback: &NewFeedback) -> Result<()> {
        if feedback.week == 0 {
            return Err(CoachError::invalid("week", feedback.week, "must be at least 1"));
        }
        if feedback.consistency > athlete.days_per_week {
            return Err(CoachError::invalid(
                "consistency",
                feedback.consistency,
                format!("cannot exceed {} training days per week", athlete.days_per_week),
            ));
        }
        if !(0.0..=10.0).contains(&feedback.mean_effort) {
            return Err(CoachError::invalid(
                "mean_effort",
                feedback.mean_effort,
                "must be between 0 and 10",
            ));
        }
        if let Some(heart_rate) = feedback.mean_heart_rate {
            if !(heart_rate.is_finite() && heart_rate > 0.0) {
                return Err(CoachError::invalid(
                    "mean_heart_rate",
                    heart_rate,
                    "must be greater than zero",
                ));
            }
        }
        Ok(())
    }

    /// Record weekly feedback and persist the resulting performance factor
    pub fn submit<S: Store>(store: &mut S, feedback: &NewFeedback) -> Result<FeedbackOutcome> {
        let athlete = store.get_athlete(&feedback.athlete_id)?;
        Self::validate(&athlete, feedback)?;

        let performance_factor = Self::update_performance_factor(&athlete, feedback);
        let record = store.append_feedback_and_update_factor(feedback, performance_factor)?;

        Ok(FeedbackOutcome {
            record,
            performance_factor,
        })
    }
}
