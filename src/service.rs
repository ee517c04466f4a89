//! Caller-facing coaching operations
//!
//! [`CoachService`] owns a [`Store`] and a [`PlanOrchestrator`] and exposes
//! one method per operation a transport (CLI, HTTP handler, ...) needs.

use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::PlannerSettings;
use crate::error::{CoachError, Result};
use crate::exams::{ExamAdjuster, ExamAdjustments};
use crate::feedback::{FeedbackOutcome, PerformanceAdapter};
use crate::models::{
    AthleteProfile, ExamRecord, FeedbackRecord, NewAthlete, NewExam, NewFeedback, WeeklyPlan,
    Workout, WorkoutMetrics,
};
use crate::paces::{PaceCalculator, TrainingPaces};
use crate::planner::{PlanOrchestrator, PlanOutcome};
use crate::progress::ProgressReport;
use crate::store::Store;

/// A newly created athlete with the paces derived from onboarding data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AthleteCreated {
    pub athlete: AthleteProfile,
    pub paces: TrainingPaces,
}

/// Generated or existing plan, with exam adjustments for new plans
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanResponse {
    pub outcome: PlanOutcome,
    pub exam_adjustments: Option<ExamAdjustments>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackHistory {
    pub athlete_id: String,
    pub records: Vec<FeedbackRecord>,
    pub total: usize,
    pub current_performance_factor: f64,
}

pub struct CoachService<S: Store, R: Rng = StdRng> {
    store: S,
    orchestrator: PlanOrchestrator<R>,
    include_exam_adjustments: bool,
}

impl<S: Store> CoachService<S, StdRng> {
    /// Service with standard planning tables, seeded from configuration
    pub fn from_settings(store: S, settings: &PlannerSettings) -> Self {
        let orchestrator = match settings.seed {
            Some(seed) => PlanOrchestrator::with_seed(seed),
            None => PlanOrchestrator::from_entropy(),
        };
        Self::new(store, orchestrator, settings.include_exam_adjustments)
    }
}

impl<S: Store, R: Rng> CoachService<S, R> {
    pub fn new(store: S, orchestrator: PlanOrchestrator<R>, include_exam_adjustments: bool) -> Self {
        Self {
            store,
            orchestrator,
            include_exam_adjustments,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn create_athlete(&mut self, athlete: &NewAthlete) -> Result<AthleteCreated> {
        athlete.validate()?;
        // Reject unusable pace inputs before anything is written
        let paces = PaceCalculator::for_new_athlete(athlete)?;

        let athlete = self.store.create_athlete(athlete)?;
        info!(athlete_id = %athlete.id, level = %athlete.level, weeks = athlete.plan_weeks, "athlete created");
        Ok(AthleteCreated { athlete, paces })
    }

    pub fn get_athlete(&self, athlete_id: &str) -> Result<AthleteProfile> {
        self.store.get_athlete(athlete_id)
    }

    pub fn training_paces(&self, athlete_id: &str) -> Result<TrainingPaces> {
        let athlete = self.store.get_athlete(athlete_id)?;
        PaceCalculator::for_athlete(&athlete)
    }

    /// Generate the plan for a week, or return the one already stored.
    ///
    /// Exam adjustments are evaluated before anything is written, so a
    /// failure there leaves no plan behind and the call can be retried.
    pub fn generate_plan(&mut self, athlete_id: &str, week: u32) -> Result<PlanResponse> {
        let pending_adjustments = if self.include_exam_adjustments
            && self.store.find_plan(athlete_id, week)?.is_none()
        {
            Some(ExamAdjuster::for_athlete(&self.store, athlete_id)?)
        } else {
            None
        };

        let outcome = self
            .orchestrator
            .generate_weekly_plan(&mut self.store, athlete_id, week)?;

        let exam_adjustments = pending_adjustments.filter(|_| outcome.is_created());

        let plan = outcome.plan();
        if outcome.is_created() {
            info!(
                athlete_id,
                week,
                phase = %plan.phase,
                volume_km = plan.total_volume_km,
                workouts = plan.workouts.len(),
                "weekly plan generated"
            );
        } else {
            debug!(athlete_id, week, plan_id = %plan.id, "weekly plan already exists");
        }

        Ok(PlanResponse {
            outcome,
            exam_adjustments,
        })
    }

    pub fn get_plan(&self, athlete_id: &str, week: u32) -> Result<WeeklyPlan> {
        self.store.get_athlete(athlete_id)?;
        self.store
            .find_plan(athlete_id, week)?
            .ok_or_else(|| CoachError::not_found("Plan", format!("{} week {}", athlete_id, week)))
    }

    pub fn list_plans(&self, athlete_id: &str) -> Result<Vec<WeeklyPlan>> {
        self.store.get_athlete(athlete_id)?;
        self.store.list_plans(athlete_id)
    }

    pub fn complete_workout(&mut self, workout_id: &str, metrics: &WorkoutMetrics) -> Result<Workout> {
        let workout = self.store.mark_workout_complete(workout_id, metrics)?;
        info!(workout_id, athlete_id = %workout.athlete_id, "workout completed");
        Ok(workout)
    }

    pub fn submit_feedback(&mut self, feedback: &NewFeedback) -> Result<FeedbackOutcome> {
        let outcome = PerformanceAdapter::submit(&mut self.store, feedback)?;
        info!(
            athlete_id = %feedback.athlete_id,
            week = feedback.week,
            factor = outcome.performance_factor,
            "performance factor updated"
        );
        Ok(outcome)
    }

    pub fn feedback_history(&self, athlete_id: &str) -> Result<FeedbackHistory> {
        let athlete = self.store.get_athlete(athlete_id)?;
        let records = self.store.list_feedback(athlete_id)?;
        Ok(FeedbackHistory {
            athlete_id: athlete.id,
            total: records.len(),
            records,
            current_performance_factor: athlete.performance_factor,
        })
    }

    pub fn add_exam(&mut self, exam: &NewExam) -> Result<ExamRecord> {
        let record = self.store.add_exam(exam)?;
        info!(athlete_id = %record.athlete_id, exam_type = %record.exam_type(), "exam recorded");
        Ok(record)
    }

    pub fn list_exams(&self, athlete_id: &str) -> Result<Vec<ExamRecord>> {
        self.store.get_athlete(athlete_id)?;
        self.store.list_exams(athlete_id)
    }

    pub fn exam_adjustments(&self, athlete_id: &str) -> Result<ExamAdjustments> {
        ExamAdjuster::for_athlete(&self.store, athlete_id)
    }

    pub fn progress(&self, athlete_id: &str) -> Result<ProgressReport> {
        ProgressReport::for_athlete(&self.store, athlete_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteStore;
    use crate::models::{
        BaselineTrial, ExamResult, ExamType, ExperienceLevel, NewPlan, NewWorkout, Sex,
        TimedDistance, Vo2maxTest,
    };
    use chrono::NaiveDate;
    use std::cell::Cell;

    fn service() -> CoachService<SqliteStore> {
        CoachService::new(
            SqliteStore::open_in_memory().unwrap(),
            PlanOrchestrator::with_seed(17),
            true,
        )
    }

    fn new_athlete() -> NewAthlete {
        NewAthlete {
            age: 30,
            weight_kg: 70.0,
            sex: Sex::Male,
            level: ExperienceLevel::Intermediate,
            goal: TimedDistance::new(21.1, 120.0),
            plan_weeks: 12,
            days_per_week: 4,
            baseline: BaselineTrial {
                result: TimedDistance::new(5.0, 25.0),
                avg_heart_rate: 165.0,
                perceived_effort: 8,
            },
            three_km_time_minutes: None,
        }
    }

    #[test]
    fn test_create_athlete_returns_paces() {
        let mut service = service();
        let created = service.create_athlete(&new_athlete()).unwrap();

        assert!((created.paces.easy - 6.0).abs() < 1e-9);
        assert_eq!(service.training_paces(&created.athlete.id).unwrap(), created.paces);
    }

    #[test]
    fn test_invalid_athlete_is_not_stored() {
        let mut service = service();
        let mut athlete = new_athlete();
        athlete.days_per_week = 8;

        let err = service.create_athlete(&athlete).unwrap_err();
        assert!(matches!(err, CoachError::InvalidInput { ref field, .. } if field == "days_per_week"));
    }

    #[test]
    fn test_exam_adjustments_only_for_new_plans() {
        let mut service = service();
        let athlete = service.create_athlete(&new_athlete()).unwrap().athlete;
        service
            .add_exam(&NewExam {
                athlete_id: athlete.id.clone(),
                result: ExamResult::Vo2max(Vo2maxTest {
                    vo2max: Some(60.0),
                    ..Default::default()
                }),
                exam_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            })
            .unwrap();

        let first = service.generate_plan(&athlete.id, 1).unwrap();
        let adjustments = first.exam_adjustments.unwrap();
        assert!((adjustments.volume_factor - 1.1).abs() < 1e-9);
        // advisory only: volume is the unadjusted (20 + 3) * 0.7
        assert!((first.outcome.plan().total_volume_km - 16.1).abs() < 1e-9);

        let second = service.generate_plan(&athlete.id, 1).unwrap();
        assert!(!second.outcome.is_created());
        assert!(second.exam_adjustments.is_none());
    }

    #[test]
    fn test_exam_adjustments_can_be_disabled() {
        let mut service = CoachService::new(
            SqliteStore::open_in_memory().unwrap(),
            PlanOrchestrator::with_seed(2),
            false,
        );
        let athlete = service.create_athlete(&new_athlete()).unwrap().athlete;
        let response = service.generate_plan(&athlete.id, 1).unwrap();
        assert!(response.outcome.is_created());
        assert!(response.exam_adjustments.is_none());
    }

    #[test]
    fn test_feedback_history_reports_current_factor() {
        let mut service = service();
        let athlete = service.create_athlete(&new_athlete()).unwrap().athlete;
        service
            .submit_feedback(&NewFeedback {
                athlete_id: athlete.id.clone(),
                week: 1,
                consistency: 3,
                mean_effort: 3.0,
                mean_heart_rate: None,
                notes: Some("legs felt fresh".to_string()),
            })
            .unwrap();

        let history = service.feedback_history(&athlete.id).unwrap();
        assert_eq!(history.total, 1);
        assert_eq!(history.records[0].notes.as_deref(), Some("legs felt fresh"));
        assert!((history.current_performance_factor - 0.985).abs() < 1e-9);
    }

    #[test]
    fn test_lookups_for_unknown_athlete() {
        let service = service();
        assert!(matches!(service.list_plans("ghost"), Err(CoachError::NotFound { .. })));
        assert!(matches!(service.list_exams("ghost"), Err(CoachError::NotFound { .. })));
        assert!(matches!(service.progress("ghost"), Err(CoachError::NotFound { .. })));
        assert!(matches!(service.get_plan("ghost", 1), Err(CoachError::NotFound { .. })));
    }

    #[test]
    fn test_missing_plan_is_not_found() {
        let mut service = service();
        let athlete = service.create_athlete(&new_athlete()).unwrap().athlete;
        let err = service.get_plan(&athlete.id, 3).unwrap_err();
        assert!(matches!(err, CoachError::NotFound { ref entity, .. } if entity == "Plan"));
    }

    /// SQLite store whose first `failing_exam_reads` exam lookups fail
    struct FlakyExamStore {
        inner: SqliteStore,
        failing_exam_reads: Cell<u32>,
    }

    impl Store for FlakyExamStore {
        fn create_athlete(&mut self, athlete: &NewAthlete) -> Result<AthleteProfile> {
            self.inner.create_athlete(athlete)
        }
        fn get_athlete(&self, athlete_id: &str) -> Result<AthleteProfile> {
            self.inner.get_athlete(athlete_id)
        }
        fn create_plan_atomic(&mut self, header: &NewPlan, workouts: &[NewWorkout]) -> Result<WeeklyPlan> {
            self.inner.create_plan_atomic(header, workouts)
        }
        fn find_plan(&self, athlete_id: &str, week: u32) -> Result<Option<WeeklyPlan>> {
            self.inner.find_plan(athlete_id, week)
        }
        fn list_plans(&self, athlete_id: &str) -> Result<Vec<WeeklyPlan>> {
            self.inner.list_plans(athlete_id)
        }
        fn append_feedback_and_update_factor(
            &mut self,
            feedback: &NewFeedback,
            new_factor: f64,
        ) -> Result<FeedbackRecord> {
            self.inner.append_feedback_and_update_factor(feedback, new_factor)
        }
        fn list_feedback(&self, athlete_id: &str) -> Result<Vec<FeedbackRecord>> {
            self.inner.list_feedback(athlete_id)
        }
        fn add_exam(&mut self, exam: &NewExam) -> Result<ExamRecord> {
            self.inner.add_exam(exam)
        }
        fn list_exams(&self, athlete_id: &str) -> Result<Vec<ExamRecord>> {
            self.inner.list_exams(athlete_id)
        }
        fn latest_exam(&self, athlete_id: &str, exam_type: ExamType) -> Result<Option<ExamRecord>> {
            if self.failing_exam_reads.get() > 0 {
                self.failing_exam_reads.set(self.failing_exam_reads.get() - 1);
                return Err(CoachError::persistence(
                    "load latest exam",
                    rusqlite::Error::InvalidQuery,
                ));
            }
            self.inner.latest_exam(athlete_id, exam_type)
        }
        fn mark_workout_complete(&mut self, workout_id: &str, metrics: &WorkoutMetrics) -> Result<Workout> {
            self.inner.mark_workout_complete(workout_id, metrics)
        }
    }

    #[test]
    fn test_failed_exam_read_leaves_no_plan_behind() {
        let mut inner = SqliteStore::open_in_memory().unwrap();
        let athlete = inner.create_athlete(&new_athlete()).unwrap();
        inner
            .add_exam(&NewExam {
                athlete_id: athlete.id.clone(),
                result: ExamResult::Vo2max(Vo2maxTest {
                    vo2max: Some(60.0),
                    ..Default::default()
                }),
                exam_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            })
            .unwrap();

        let store = FlakyExamStore {
            inner,
            failing_exam_reads: Cell::new(1),
        };
        let mut service = CoachService::new(store, PlanOrchestrator::with_seed(5), true);

        let err = service.generate_plan(&athlete.id, 1).unwrap_err();
        assert!(matches!(err, CoachError::PersistenceFailure { .. }));
        assert!(service.store().list_plans(&athlete.id).unwrap().is_empty());

        let retry = service.generate_plan(&athlete.id, 1).unwrap();
        assert!(retry.outcome.is_created());
        let adjustments = retry.exam_adjustments.unwrap();
        assert!((adjustments.volume_factor - 1.1).abs() < 1e-9);
        assert_eq!(service.store().list_plans(&athlete.id).unwrap().len(), 1);
    }
}
