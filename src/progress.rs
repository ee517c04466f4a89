//! Aggregate progress reporting

use serde::Serialize;

use crate::error::Result;
use crate::models::{AthleteProfile, FeedbackRecord, WeeklyPlan};
use crate::store::Store;

/// Number of feedback records included in a report
pub const RECENT_FEEDBACK_LIMIT: usize = 5;

/// Plan and workout statistics for one athlete
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub athlete_id: String,
    pub total_plans: usize,
    pub target_weeks: u32,
    pub total_workouts: usize,
    pub completed_workouts: usize,
    /// Completed over total workouts, in percent
    pub completion_rate: f64,
    /// Generated plans over target weeks, in percent, capped at 100
    pub progress_percentage: f64,
    pub performance_factor: f64,
    /// Most recent submissions first
    pub recent_feedback: Vec<FeedbackRecord>,
}

impl ProgressReport {
    pub fn for_athlete<S: Store>(store: &S, athlete_id: &str) -> Result<Self> {
        let athlete = store.get_athlete(athlete_id)?;
        let plans = store.list_plans(athlete_id)?;
        let feedback = store.list_feedback(athlete_id)?;
        Ok(Self::from_records(&athlete, &plans, feedback))
    }

    pub fn from_records(
        athlete: &AthleteProfile,
        plans: &[WeeklyPlan],
        mut feedback: Vec<FeedbackRecord>,
    ) -> Self {
        let total_workouts: usize = plans.iter().map(|plan| plan.workouts.len()).sum();
        let completed_workouts = plans
            .iter()
            .flat_map(|plan| &plan.workouts)
            .filter(|workout| workout.completed)
            .count();

        let completion_rate = if total_workouts > 0 {
            completed_workouts as f64 / total_workouts as f64 * 100.0
        } else {
            0.0
        };
        let progress_percentage = if athlete.plan_weeks > 0 {
            (plans.len() as f64 / f64::from(athlete.plan_weeks) * 100.0).min(100.0)
        } else {
            0.0
        };

        // newest first; equal timestamps keep the reverse of the stored order
        feedback.reverse();
        feedback.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        feedback.truncate(RECENT_FEEDBACK_LIMIT);

        Self {
            athlete_id: athlete.id.clone(),
            total_plans: plans.len(),
            target_weeks: athlete.plan_weeks,
            total_workouts,
            completed_workouts,
            completion_rate,
            progress_percentage,
            performance_factor: athlete.performance_factor,
            recent_feedback: feedback,
        }
    }
}
