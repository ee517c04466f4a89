//! Weekly plan orchestration
//!
//! Combines phase resolution, volume sizing, pace derivation and random
//! workout selection into one persisted weekly plan. Generation is
//! idempotent per (athlete, week): an existing plan is returned unchanged.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::{CoachError, Result};
use crate::models::{AthleteProfile, ExperienceLevel, NewPlan, NewWorkout, WeeklyPlan, WorkoutType};
use crate::paces::PaceCalculator;
use crate::phases::{PhaseScheduler, PhaseSpec};
use crate::store::Store;
use crate::workouts::WorkoutGenerator;

/// Weekly volume before the phase multiplier, in km
const BASE_VOLUME_KM: f64 = 20.0;
const WEEKLY_INCREMENT_KM: f64 = 3.0;

/// Upper weekly volume per experience level, in km
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeCaps {
    pub beginner: f64,
    pub intermediate: f64,
    pub advanced: f64,
}

impl VolumeCaps {
    pub fn standard() -> Self {
        Self {
            beginner: 35.0,
            intermediate: 50.0,
            advanced: 70.0,
        }
    }

    pub fn cap_for(&self, level: ExperienceLevel) -> f64 {
        match level {
            ExperienceLevel::Beginner => self.beginner,
            ExperienceLevel::Intermediate => self.intermediate,
            ExperienceLevel::Advanced => self.advanced,
        }
    }
}

impl Default for VolumeCaps {
    fn default() -> Self {
        Self::standard()
    }
}

/// Result of a generation request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "plan", rename_all = "snake_case")]
pub enum PlanOutcome {
    /// A new plan was persisted by this call
    Created(WeeklyPlan),
    /// A plan for this week already existed and was returned untouched
    Existing(WeeklyPlan),
}

impl PlanOutcome {
    pub fn plan(&self) -> &WeeklyPlan {
        match self {
            PlanOutcome::Created(plan) | PlanOutcome::Existing(plan) => plan,
        }
    }

    pub fn into_plan(self) -> WeeklyPlan {
        match self {
            PlanOutcome::Created(plan) | PlanOutcome::Existing(plan) => plan,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, PlanOutcome::Created(_))
    }
}

/// Guarantee `long` and `recovery` are both scheduled.
///
/// A missing long run takes the first slot and a missing recovery run takes
/// the last. When one mandatory type already occupies the slot the other one
/// needs, it is moved to the opposite end instead of being overwritten. A
/// single-slot week can only hold one of them and ends up as recovery.
pub fn repair_mandatory_types(selection: &mut [WorkoutType]) {
    if selection.is_empty() {
        return;
    }
    let last = selection.len() - 1;

    if !selection.contains(&WorkoutType::Long) {
        if last > 0 && selection[0] == WorkoutType::Recovery {
            selection.swap(0, last);
        }
        selection[0] = WorkoutType::Long;
    }
    if !selection.contains(&WorkoutType::Recovery) {
        if last > 0 && selection[last] == WorkoutType::Long {
            selection.swap(0, last);
        }
        selection[last] = WorkoutType::Recovery;
    }
}

/// Builds and persists weekly plans
pub struct PlanOrchestrator<R: Rng = StdRng> {
    scheduler: PhaseScheduler,
    generator: WorkoutGenerator,
    caps: VolumeCaps,
    rng: R,
}

impl PlanOrchestrator<StdRng> {
    /// Standard tables with a deterministic selection sequence
    pub fn with_seed(seed: u64) -> Self {
        Self::new(
            PhaseScheduler::default(),
            WorkoutGenerator::default(),
            VolumeCaps::standard(),
            StdRng::seed_from_u64(seed),
        )
    }

    /// Standard tables with an OS-seeded selection sequence
    pub fn from_entropy() -> Self {
        Self::new(
            PhaseScheduler::default(),
            WorkoutGenerator::default(),
            VolumeCaps::standard(),
            StdRng::from_entropy(),
        )
    }
}

impl<R: Rng> PlanOrchestrator<R> {
    pub fn new(
        scheduler: PhaseScheduler,
        generator: WorkoutGenerator,
        caps: VolumeCaps,
        rng: R,
    ) -> Self {
        Self {
            scheduler,
            generator,
            caps,
            rng,
        }
    }

    pub fn scheduler(&self) -> &PhaseScheduler {
        &self.scheduler
    }

    /// Weekly volume in km for `week`, capped by experience level
    pub fn weekly_volume(&self, week: u32, phase: &PhaseSpec, athlete: &AthleteProfile) -> f64 {
        let base = BASE_VOLUME_KM + WEEKLY_INCREMENT_KM * f64::from(week);
        let volume = base * phase.volume_multiplier * athlete.performance_factor;
        volume.min(self.caps.cap_for(athlete.level))
    }

    /// Draw distinct workout types for the week, then repair mandatory ones
    pub fn select_workout_types(&mut self, phase: &PhaseSpec, days_per_week: u32) -> Vec<WorkoutType> {
        let mut pool = phase.eligible.to_vec();
        let count = (days_per_week as usize).min(pool.len());
        let (picked, _) = pool.partial_shuffle(&mut self.rng, count);

        let mut selection = picked.to_vec();
        repair_mandatory_types(&mut selection);
        selection
    }

    /// Return the plan for (athlete, week), creating it when missing
    pub fn generate_weekly_plan<S: Store>(
        &mut self,
        store: &mut S,
        athlete_id: &str,
        week: u32,
    ) -> Result<PlanOutcome> {
        let athlete = store.get_athlete(athlete_id)?;
        if let Some(plan) = store.find_plan(athlete_id, week)? {
            return Ok(PlanOutcome::Existing(plan));
        }

        let (header, workouts) = self.draft_plan(&athlete, week)?;

        match store.create_plan_atomic(&header, &workouts) {
            Ok(plan) => Ok(PlanOutcome::Created(plan)),
            // Lost a race with a concurrent writer: the winner's plan stands
            Err(err @ CoachError::AlreadyExists { .. }) => match store.find_plan(athlete_id, week)? {
                Some(plan) => Ok(PlanOutcome::Existing(plan)),
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Plan header and workouts for a week, not yet persisted
    pub fn draft_plan(
        &mut self,
        athlete: &AthleteProfile,
        week: u32,
    ) -> Result<(NewPlan, Vec<NewWorkout>)> {
        let phase = self.scheduler.resolve(week, athlete.plan_weeks)?.clone();
        let volume = self.weekly_volume(week, &phase, athlete);
        let paces = PaceCalculator::for_athlete(athlete)?;
        let selection = self.select_workout_types(&phase, athlete.days_per_week);

        let workouts = selection
            .iter()
            .zip(1u32..)
            .map(|(&workout_type, day)| {
                let generated = self.generator.generate(
                    workout_type,
                    &phase,
                    volume,
                    &paces,
                    athlete.performance_factor,
                )?;
                Ok(NewWorkout {
                    day,
                    workout_type,
                    distance_km: round_to_tenth(generated.distance_km),
                    target_pace: generated.target_pace,
                    description: generated.description,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let header = NewPlan {
            athlete_id: athlete.id.clone(),
            week,
            phase: phase.phase,
            phase_description: phase.description.to_string(),
            total_volume_km: volume,
        };

        Ok((header, workouts))
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteStore;
    use crate::models::{
        BaselineTrial, ExamRecord, ExamType, FeedbackRecord, NewAthlete, NewExam, NewFeedback,
        Phase, Sex, TimedDistance, Workout, WorkoutMetrics,
    };
    use crate::phases::STANDARD_PHASES;
    use crate::workouts::MIN_WORKOUT_DISTANCE_KM;
    use proptest::prelude::*;
    use std::cell::Cell;

    fn new_athlete(level: ExperienceLevel, days_per_week: u32) -> NewAthlete {
        NewAthlete {
            age: 30,
            weight_kg: 70.0,
            sex: Sex::Male,
            level,
            goal: TimedDistance::new(21.1, 120.0),
            plan_weeks: 12,
            days_per_week,
            baseline: BaselineTrial {
                result: TimedDistance::new(5.0, 25.0),
                avg_heart_rate: 165.0,
                perceived_effort: 8,
            },
            three_km_time_minutes: None,
        }
    }

    fn seeded_store(level: ExperienceLevel, days: u32) -> (SqliteStore, AthleteProfile) {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let athlete = store.create_athlete(&new_athlete(level, days)).unwrap();
        (store, athlete)
    }

    #[test]
    fn test_week_one_plan() {
        let (mut store, athlete) = seeded_store(ExperienceLevel::Intermediate, 4);
        let mut orchestrator = PlanOrchestrator::with_seed(42);

        let outcome = orchestrator
            .generate_weekly_plan(&mut store, &athlete.id, 1)
            .unwrap();
        assert!(outcome.is_created());

        let plan = outcome.plan();
        assert_eq!(plan.phase, Phase::Base);
        // (20 + 3) * 0.7 * 1.0
        assert!((plan.total_volume_km - 16.1).abs() < 1e-9);
        assert_eq!(plan.workouts.len(), 4);

        let days: Vec<u32> = plan.workouts.iter().map(|w| w.day).collect();
        assert_eq!(days, vec![1, 2, 3, 4]);

        let types: Vec<WorkoutType> = plan.workouts.iter().map(|w| w.workout_type).collect();
        assert!(types.contains(&WorkoutType::Long));
        assert!(types.contains(&WorkoutType::Recovery));
        for workout in &plan.workouts {
            assert!(workout.distance_km >= MIN_WORKOUT_DISTANCE_KM);
            assert_eq!(workout.distance_km, round_to_tenth(workout.distance_km));
            assert!(!workout.completed);
        }
    }

    #[test]
    fn test_generation_is_idempotent() {
        let (mut store, athlete) = seeded_store(ExperienceLevel::Beginner, 3);
        let mut orchestrator = PlanOrchestrator::with_seed(1);

        let first = orchestrator
            .generate_weekly_plan(&mut store, &athlete.id, 5)
            .unwrap();
        let second = orchestrator
            .generate_weekly_plan(&mut store, &athlete.id, 5)
            .unwrap();

        assert!(first.is_created());
        assert!(!second.is_created());
        assert_eq!(first.plan().id, second.plan().id);
        assert_eq!(second.plan().workouts.len(), first.plan().workouts.len());
        assert_eq!(store.list_plans(&athlete.id).unwrap().len(), 1);
    }

    #[test]
    fn test_same_seed_same_selection() {
        let (mut store_a, athlete_a) = seeded_store(ExperienceLevel::Advanced, 5);
        let (mut store_b, athlete_b) = seeded_store(ExperienceLevel::Advanced, 5);

        let plan_a = PlanOrchestrator::with_seed(9)
            .generate_weekly_plan(&mut store_a, &athlete_a.id, 6)
            .unwrap()
            .into_plan();
        let plan_b = PlanOrchestrator::with_seed(9)
            .generate_weekly_plan(&mut store_b, &athlete_b.id, 6)
            .unwrap()
            .into_plan();

        let types = |plan: &WeeklyPlan| -> Vec<WorkoutType> {
            plan.workouts.iter().map(|w| w.workout_type).collect()
        };
        assert_eq!(types(&plan_a), types(&plan_b));
    }

    #[test]
    fn test_selection_is_bounded_by_eligible_types() {
        let (mut store, athlete) = seeded_store(ExperienceLevel::Advanced, 7);
        let mut orchestrator = PlanOrchestrator::with_seed(3);

        // week 1 of 12 is base, which has five eligible types
        let plan = orchestrator
            .generate_weekly_plan(&mut store, &athlete.id, 1)
            .unwrap()
            .into_plan();
        assert_eq!(plan.workouts.len(), 5);
    }

    #[test]
    fn test_volume_is_capped_by_level() {
        let orchestrator = PlanOrchestrator::with_seed(0);
        let peak = orchestrator.scheduler().spec(Phase::Peak).unwrap().clone();

        let mut profile = SqliteStore::open_in_memory()
            .unwrap()
            .create_athlete(&new_athlete(ExperienceLevel::Beginner, 4))
            .unwrap();
        profile.performance_factor = 1.3;

        // (20 + 30) * 1.0 * 1.3 = 65
        assert_eq!(orchestrator.weekly_volume(10, &peak, &profile), 35.0);
        profile.level = ExperienceLevel::Intermediate;
        assert_eq!(orchestrator.weekly_volume(10, &peak, &profile), 50.0);
        profile.level = ExperienceLevel::Advanced;
        assert!((orchestrator.weekly_volume(10, &peak, &profile) - 65.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_athlete_and_bad_week() {
        let (mut store, athlete) = seeded_store(ExperienceLevel::Beginner, 3);
        let mut orchestrator = PlanOrchestrator::with_seed(5);

        assert!(matches!(
            orchestrator.generate_weekly_plan(&mut store, "missing", 1),
            Err(CoachError::NotFound { .. })
        ));
        assert!(matches!(
            orchestrator.generate_weekly_plan(&mut store, &athlete.id, 13),
            Err(CoachError::InvalidInput { ref field, .. }) if field == "week_index"
        ));
        assert!(store.list_plans(&athlete.id).unwrap().is_empty());
    }

    /// Hides existing plans from early lookups to simulate a concurrent writer
    struct RacingStore {
        inner: SqliteStore,
        hidden_lookups: Cell<u32>,
    }

    impl Store for RacingStore {
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
            if self.hidden_lookups.get() > 0 {
                self.hidden_lookups.set(self.hidden_lookups.get() - 1);
                return Ok(None);
            }
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
            self.inner.latest_exam(athlete_id, exam_type)
        }
        fn mark_workout_complete(&mut self, workout_id: &str, metrics: &WorkoutMetrics) -> Result<Workout> {
            self.inner.mark_workout_complete(workout_id, metrics)
        }
    }

    #[test]
    fn test_losing_writer_observes_existing_plan() {
        let (mut inner, athlete) = seeded_store(ExperienceLevel::Intermediate, 4);
        let winner = PlanOrchestrator::with_seed(11)
            .generate_weekly_plan(&mut inner, &athlete.id, 2)
            .unwrap()
            .into_plan();

        let mut racing = RacingStore {
            inner,
            hidden_lookups: Cell::new(1),
        };
        let outcome = PlanOrchestrator::with_seed(12)
            .generate_weekly_plan(&mut racing, &athlete.id, 2)
            .unwrap();

        assert!(!outcome.is_created());
        let plan = outcome.into_plan();
        assert_eq!(plan.id, winner.id);
        let ids = |plan: &WeeklyPlan| -> Vec<String> {
            plan.workouts.iter().map(|w| w.id.clone()).collect()
        };
        assert_eq!(ids(&plan), ids(&winner));
        assert_eq!(racing.list_plans(&athlete.id).unwrap().len(), 1);
    }

    #[test]
    fn test_repair_keeps_both_mandatory_types() {
        use WorkoutType::*;

        let mut only_recovery_first = [Recovery, Easy, Fartlek];
        repair_mandatory_types(&mut only_recovery_first);
        assert_eq!(only_recovery_first, [Long, Easy, Recovery]);

        let mut only_long_last = [Easy, Tempo, Long];
        repair_mandatory_types(&mut only_long_last);
        assert_eq!(only_long_last, [Long, Tempo, Recovery]);

        let mut neither = [Easy, Tempo];
        repair_mandatory_types(&mut neither);
        assert_eq!(neither, [Long, Recovery]);

        let mut single = [Easy];
        repair_mandatory_types(&mut single);
        assert_eq!(single, [Recovery]);
    }

    proptest! {
        #[test]
        fn test_repaired_selection_contains_mandatory_types(
            phase_index in 0usize..4,
            days in 2u32..=7,
            seed in any::<u64>(),
        ) {
            let mut orchestrator = PlanOrchestrator::with_seed(seed);
            let phase = &STANDARD_PHASES[phase_index];

            let selection = orchestrator.select_workout_types(phase, days);

            prop_assert_eq!(selection.len(), (days as usize).min(phase.eligible.len()));
            prop_assert!(selection.contains(&WorkoutType::Long));
            prop_assert!(selection.contains(&WorkoutType::Recovery));
            for (i, workout_type) in selection.iter().enumerate() {
                prop_assert!(phase.is_eligible(*workout_type));
                prop_assert!(!selection[i + 1..].contains(workout_type));
            }
        }
    }
}
