//! Training pace derivation
//!
//! Derives the six training paces from a baseline time trial and the race
//! goal. All paces are fractional minutes per kilometer; `format_pace` is
//! the only place they are turned into `mm:ss`.

use serde::{Deserialize, Serialize};

use crate::error::{CoachError, Result};
use crate::models::{AthleteProfile, NewAthlete, TimedDistance};

/// Distance of the short trial preferred over the baseline trial
pub const SHORT_TRIAL_KM: f64 = 3.0;

/// How the goal compares with current fitness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalBand {
    /// Goal pace more than 20% slower than the trial pace
    Conservative,
    /// Goal pace within [0.9, 1.2] of the trial pace
    NearCurrent,
    /// Goal pace more than 10% faster than the trial pace
    Ambitious,
}

/// Derived training paces (minutes per kilometer)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingPaces {
    pub easy: f64,
    pub long: f64,
    pub tempo: f64,
    pub interval: f64,
    pub threshold: f64,
    pub race_pace: f64,
    /// Raw goal pace
    pub goal: f64,
    pub band: GoalBand,
}

pub struct PaceCalculator;

impl PaceCalculator {
    /// Calculate training paces from a trial result and a goal
    pub fn calculate(trial: &TimedDistance, goal: &TimedDistance) -> Result<TrainingPaces> {
        validate_effort("trial", trial)?;
        validate_effort("goal", goal)?;

        let trial_pace = trial.pace_min_per_km();
        let goal_pace = goal.pace_min_per_km();
        let ratio = goal_pace / trial_pace;

        let paces = if ratio > 1.2 {
            TrainingPaces {
                easy: trial_pace * 1.15,
                long: trial_pace * 1.10,
                tempo: trial_pace * 0.95,
                interval: trial_pace * 0.85,
                threshold: trial_pace * 0.90,
                race_pace: goal_pace,
                goal: goal_pace,
                band: GoalBand::Conservative,
            }
        } else if ratio < 0.9 {
            TrainingPaces {
                easy: goal_pace * 1.30,
                long: goal_pace * 1.20,
                tempo: goal_pace * 1.05,
                interval: goal_pace * 0.90,
                threshold: goal_pace,
                race_pace: goal_pace * 0.95,
                goal: goal_pace,
                band: GoalBand::Ambitious,
            }
        } else {
            TrainingPaces {
                easy: trial_pace * 1.20,
                long: trial_pace * 1.15,
                tempo: trial_pace * 0.95,
                interval: trial_pace * 0.85,
                threshold: trial_pace * 0.90,
                race_pace: goal_pace,
                goal: goal_pace,
                band: GoalBand::NearCurrent,
            }
        };

        Ok(paces)
    }

    /// The trial used for pace derivation: the 3 km trial when recorded,
    /// otherwise the baseline trial.
    pub fn preferred_trial(athlete: &AthleteProfile) -> TimedDistance {
        select_trial(athlete.three_km_time_minutes, athlete.baseline.result)
    }

    pub fn for_athlete(athlete: &AthleteProfile) -> Result<TrainingPaces> {
        Self::calculate(&Self::preferred_trial(athlete), &athlete.goal)
    }

    /// Paces for onboarding data that has not been stored yet
    pub fn for_new_athlete(athlete: &NewAthlete) -> Result<TrainingPaces> {
        let trial = select_trial(athlete.three_km_time_minutes, athlete.baseline.result);
        Self::calculate(&trial, &athlete.goal)
    }
}

fn select_trial(three_km_time_minutes: Option<f64>, baseline: TimedDistance) -> TimedDistance {
    match three_km_time_minutes {
        Some(minutes) => TimedDistance::new(SHORT_TRIAL_KM, minutes),
        None => baseline,
    }
}

fn validate_effort(label: &str, effort: &TimedDistance) -> Result<()> {
    if !(effort.distance_km.is_finite() && effort.distance_km > 0.0) {
        return Err(CoachError::invalid(
            format!("{}.distance_km", label),
            effort.distance_km,
            "must be greater than zero",
        ));
    }
    if !(effort.time_minutes.is_finite() && effort.time_minutes > 0.0) {
        return Err(CoachError::invalid(
            format!("{}.time_minutes", label),
            effort.time_minutes,
            "must be greater than zero",
        ));
    }
    Ok(())
}

/// Render a pace as `m:ss` per kilometer.
///
/// The pace is rounded to the nearest whole second before it is split into
/// minutes and seconds, so 5.1 renders as `5:06` and 5.999 as `6:00`
/// (never `5:60`). Negative or non-finite paces render as `-:--`.
pub fn format_pace(pace_min_per_km: f64) -> String {
    if !pace_min_per_km.is_finite() || pace_min_per_km < 0.0 {
        return "-:--".to_string();
    }
    let total_seconds = (pace_min_per_km * 60.0).round() as u64;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}
