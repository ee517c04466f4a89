//! Single-workout generation
//!
//! Turns a workout type, the active phase, the weekly volume and the derived
//! paces into a distance and target pace. Pure: nothing here touches storage.

use serde::{Deserialize, Serialize};

use crate::error::{CoachError, Result};
use crate::models::{Phase, WorkoutType, MAX_PERFORMANCE_FACTOR, MIN_PERFORMANCE_FACTOR};
use crate::paces::TrainingPaces;
use crate::phases::PhaseSpec;

/// Shortest distance any workout is scheduled for
pub const MIN_WORKOUT_DISTANCE_KM: f64 = 3.0;

/// Which derived pace a workout type targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceSource {
    Easy,
    Long,
    Tempo,
    Interval,
    RacePace,
    /// Midpoint between easy and tempo pace
    EasyTempoMidpoint,
}

impl PaceSource {
    fn pick(&self, paces: &TrainingPaces) -> f64 {
        match self {
            PaceSource::Easy => paces.easy,
            PaceSource::Long => paces.long,
            PaceSource::Tempo => paces.tempo,
            PaceSource::Interval => paces.interval,
            PaceSource::RacePace => paces.race_pace,
            PaceSource::EasyTempoMidpoint => (paces.easy + paces.tempo) / 2.0,
        }
    }
}

/// How one workout type is sized and paced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkoutTemplate {
    pub workout_type: WorkoutType,
    /// Share of the weekly volume, taken in isolation
    pub volume_fraction: f64,
    pub pace_source: PaceSource,
    pub pace_multiplier: f64,
    pub description: &'static str,
}

/// Phase-specific distance correction for long and race-pace runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseCorrection {
    pub phase: Phase,
    pub long: f64,
    pub race_pace: f64,
}

pub const STANDARD_TEMPLATES: [WorkoutTemplate; 8] = [
    WorkoutTemplate {
        workout_type: WorkoutType::Recovery,
        volume_fraction: 0.15,
        pace_source: PaceSource::Easy,
        pace_multiplier: 1.10,
        description: "Recovery run for active regeneration",
    },
    WorkoutTemplate {
        workout_type: WorkoutType::Easy,
        volume_fraction: 0.20,
        pace_source: PaceSource::Easy,
        pace_multiplier: 1.0,
        description: "Continuous run at a conversational pace",
    },
    WorkoutTemplate {
        workout_type: WorkoutType::Long,
        volume_fraction: 0.35,
        pace_source: PaceSource::Long,
        pace_multiplier: 1.0,
        description: "Long run to build endurance",
    },
    WorkoutTemplate {
        workout_type: WorkoutType::Progressive,
        volume_fraction: 0.25,
        pace_source: PaceSource::EasyTempoMidpoint,
        pace_multiplier: 1.0,
        description: "Starts easy and finishes at a moderate pace",
    },
    WorkoutTemplate {
        workout_type: WorkoutType::Fartlek,
        volume_fraction: 0.25,
        pace_source: PaceSource::Interval,
        pace_multiplier: 1.0,
        description: "Speed play with free-form pace changes",
    },
    WorkoutTemplate {
        workout_type: WorkoutType::Tempo,
        volume_fraction: 0.20,
        pace_source: PaceSource::Tempo,
        pace_multiplier: 1.0,
        description: "Sustained effort at lactate threshold",
    },
    WorkoutTemplate {
        workout_type: WorkoutType::Interval,
        volume_fraction: 0.15,
        pace_source: PaceSource::Interval,
        pace_multiplier: 1.0,
        description: "High-intensity repetitions with recovery jogs",
    },
    WorkoutTemplate {
        workout_type: WorkoutType::RacePace,
        volume_fraction: 0.20,
        pace_source: PaceSource::RacePace,
        pace_multiplier: 1.0,
        description: "Specific work at goal race pace",
    },
];

pub const STANDARD_CORRECTIONS: [PhaseCorrection; 4] = [
    PhaseCorrection { phase: Phase::Base, long: 0.9, race_pace: 0.7 },
    PhaseCorrection { phase: Phase::Build, long: 1.0, race_pace: 0.8 },
    PhaseCorrection { phase: Phase::Peak, long: 1.1, race_pace: 1.0 },
    PhaseCorrection { phase: Phase::Taper, long: 0.7, race_pace: 0.8 },
];

/// Sizing and pacing rules for every workout type
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutTable {
    templates: Vec<WorkoutTemplate>,
    corrections: Vec<PhaseCorrection>,
    min_distance_km: f64,
}

impl WorkoutTable {
    pub fn standard() -> Self {
        Self {
            templates: STANDARD_TEMPLATES.to_vec(),
            corrections: STANDARD_CORRECTIONS.to_vec(),
            min_distance_km: MIN_WORKOUT_DISTANCE_KM,
        }
    }

    pub fn template(&self, workout_type: WorkoutType) -> Option<&WorkoutTemplate> {
        self.templates.iter().find(|t| t.workout_type == workout_type)
    }

    fn correction(&self, phase: Phase, workout_type: WorkoutType) -> f64 {
        let Some(correction) = self.corrections.iter().find(|c| c.phase == phase) else {
            return 1.0;
        };
        match workout_type {
            WorkoutType::Long => correction.long,
            WorkoutType::RacePace => correction.race_pace,
            _ => 1.0,
        }
    }
}

impl Default for WorkoutTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// A sized and paced workout, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedWorkout {
    pub workout_type: WorkoutType,
    pub description: String,
    pub distance_km: f64,
    /// Target pace in minutes per kilometer
    pub target_pace: f64,
}

#[derive(Debug, Clone, Default)]
pub struct WorkoutGenerator {
    table: WorkoutTable,
}

impl WorkoutGenerator {
    pub fn new(table: WorkoutTable) -> Self {
        Self { table }
    }

    /// Generate one workout of `workout_type` for the given phase and week volume
    pub fn generate(
        &self,
        workout_type: WorkoutType,
        phase: &PhaseSpec,
        weekly_volume_km: f64,
        paces: &TrainingPaces,
        performance_factor: f64,
    ) -> Result<GeneratedWorkout> {
        if !phase.is_eligible(workout_type) {
            return Err(CoachError::invalid(
                "workout_type",
                workout_type,
                format!("not scheduled during the {} phase", phase.phase),
            ));
        }
        if !(weekly_volume_km.is_finite() && weekly_volume_km > 0.0) {
            return Err(CoachError::invalid(
                "weekly_volume_km",
                weekly_volume_km,
                "must be greater than zero",
            ));
        }
        if !(MIN_PERFORMANCE_FACTOR..=MAX_PERFORMANCE_FACTOR).contains(&performance_factor) {
            return Err(CoachError::invalid(
                "performance_factor",
                performance_factor,
                "must be between 0.7 and 1.3",
            ));
        }
        let template = self.table.template(workout_type).ok_or_else(|| {
            CoachError::invalid("workout_type", workout_type, "no template configured")
        })?;

        let distance = template.volume_fraction * weekly_volume_km * performance_factor
            * self.table.correction(phase.phase, workout_type);
        let distance_km = distance.max(self.table.min_distance_km);
        let target_pace = template.pace_source.pick(paces) * template.pace_multiplier;

        Ok(GeneratedWorkout {
            workout_type,
            description: template.description.to_string(),
            distance_km,
            target_pace,
        })
    }
}
