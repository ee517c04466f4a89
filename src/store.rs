//! Persistence contract consumed by the planning engine
//!
//! Implementations must make `create_plan_atomic` and
//! `append_feedback_and_update_factor` all-or-nothing, and must reject a
//! second plan for the same (athlete, week) with `CoachError::AlreadyExists`.

use crate::error::Result;
use crate::models::{
    AthleteProfile, ExamRecord, ExamType, FeedbackRecord, NewAthlete, NewExam, NewFeedback,
    NewPlan, NewWorkout, WeeklyPlan, Workout, WorkoutMetrics,
};

pub trait Store {
    /// Persist a validated onboarding profile with the default performance factor
    fn create_athlete(&mut self, athlete: &NewAthlete) -> Result<AthleteProfile>;

    /// Fails with `NotFound` when the athlete does not exist
    fn get_athlete(&self, athlete_id: &str) -> Result<AthleteProfile>;

    /// Insert a plan header and all its workouts as one unit
    fn create_plan_atomic(&mut self, header: &NewPlan, workouts: &[NewWorkout]) -> Result<WeeklyPlan>;

    fn find_plan(&self, athlete_id: &str, week: u32) -> Result<Option<WeeklyPlan>>;

    /// All plans of an athlete ordered by week
    fn list_plans(&self, athlete_id: &str) -> Result<Vec<WeeklyPlan>>;

    /// Append a feedback record and overwrite the performance factor as one unit
    fn append_feedback_and_update_factor(
        &mut self,
        feedback: &NewFeedback,
        new_factor: f64,
    ) -> Result<FeedbackRecord>;

    /// Feedback ordered by week, then by submission order. Duplicates are kept.
    fn list_feedback(&self, athlete_id: &str) -> Result<Vec<FeedbackRecord>>;

    fn add_exam(&mut self, exam: &NewExam) -> Result<ExamRecord>;

    /// Exams ordered newest exam date first
    fn list_exams(&self, athlete_id: &str) -> Result<Vec<ExamRecord>>;

    /// Most recent exam of one type, by exam date then creation time
    fn latest_exam(&self, athlete_id: &str, exam_type: ExamType) -> Result<Option<ExamRecord>>;

    /// Record realized metrics. Fails if the workout is already completed.
    fn mark_workout_complete(&mut self, workout_id: &str, metrics: &WorkoutMetrics) -> Result<Workout>;
}
