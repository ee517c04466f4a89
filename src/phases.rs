//! Training phase scheduling
//!
//! Maps a week of the plan onto base, build, peak or taper. Phase boundaries
//! are fractions of the plan length, inclusive of the upper bound, so a tie
//! resolves to the earlier phase.

use serde::Serialize;

use crate::error::{CoachError, Result};
use crate::models::{Phase, WorkoutType};

/// Static description of one training phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSpec {
    pub phase: Phase,
    /// Last week of the phase as a fraction of the plan length (inclusive)
    pub upper_fraction: f64,
    pub volume_multiplier: f64,
    pub intensity_multiplier: f64,
    pub description: &'static str,
    /// Workout types that may be scheduled during this phase
    pub eligible: &'static [WorkoutType],
}

impl PhaseSpec {
    pub fn is_eligible(&self, workout_type: WorkoutType) -> bool {
        self.eligible.contains(&workout_type)
    }
}

use WorkoutType::*;

/// Standard four-phase periodization
pub const STANDARD_PHASES: [PhaseSpec; 4] = [
    PhaseSpec {
        phase: Phase::Base,
        upper_fraction: 0.25,
        volume_multiplier: 0.70,
        intensity_multiplier: 0.80,
        description: "Aerobic base development",
        eligible: &[Easy, Long, Progressive, Fartlek, Recovery],
    },
    PhaseSpec {
        phase: Phase::Build,
        upper_fraction: 0.60,
        volume_multiplier: 0.90,
        intensity_multiplier: 1.00,
        description: "Increasing volume and intensity",
        eligible: &[Easy, Long, Tempo, Interval, Progressive, Recovery],
    },
    PhaseSpec {
        phase: Phase::Peak,
        upper_fraction: 0.85,
        volume_multiplier: 1.00,
        intensity_multiplier: 1.10,
        description: "Race-specific pace work",
        eligible: &[Easy, Long, Tempo, Interval, RacePace, Recovery],
    },
    PhaseSpec {
        phase: Phase::Taper,
        upper_fraction: 1.0,
        volume_multiplier: 0.60,
        intensity_multiplier: 0.70,
        description: "Reduced volume for recovery before the race",
        eligible: &[Easy, Long, Tempo, Recovery, Fartlek],
    },
];

/// Ordered phase table. The last entry catches every remaining week.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTable {
    phases: Vec<PhaseSpec>,
}

impl PhaseTable {
    pub fn standard() -> Self {
        Self {
            phases: STANDARD_PHASES.to_vec(),
        }
    }

    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Resolves the active phase for a week of the plan
#[derive(Debug, Clone)]
pub struct PhaseScheduler {
    table: PhaseTable,
}

impl PhaseScheduler {
    pub fn new(table: PhaseTable) -> Self {
        Self { table }
    }

    /// Phase for `week` (1-based) of a plan lasting `total_weeks`
    pub fn resolve(&self, week: u32, total_weeks: u32) -> Result<&PhaseSpec> {
        if total_weeks == 0 {
            return Err(CoachError::invalid("total_weeks", total_weeks, "must be at least 1"));
        }
        if week == 0 || week > total_weeks {
            return Err(CoachError::invalid(
                "week_index",
                week,
                format!("must be between 1 and {}", total_weeks),
            ));
        }

        let week = f64::from(week);
        let total = f64::from(total_weeks);
        let phases = self.table.phases();
        let spec = phases
            .iter()
            .find(|spec| week <= total * spec.upper_fraction)
            .or_else(|| phases.last())
            .ok_or_else(|| CoachError::invalid("phase_table", "empty", "no phases configured"))?;

        Ok(spec)
    }

    /// Static description of a phase
    pub fn spec(&self, phase: Phase) -> Option<&PhaseSpec> {
        self.table.phases().iter().find(|spec| spec.phase == phase)
    }
}

impl Default for PhaseScheduler {
    fn default() -> Self {
        Self::new(PhaseTable::standard())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twelve_week_boundaries() {
        let scheduler = PhaseScheduler::default();
        let phases: Vec<Phase> = (1..=12)
            .map(|week| scheduler.resolve(week, 12).unwrap().phase)
            .collect();

        assert_eq!(
            phases,
            vec![
                Phase::Base,
                Phase::Base,
                Phase::Base,
                Phase::Build,
                Phase::Build,
                Phase::Build,
                Phase::Build,
                Phase::Peak,
                Phase::Peak,
                Phase::Peak,
                Phase::Taper,
                Phase::Taper,
            ]
        );
    }

    #[test]
    fn test_ties_resolve_to_earlier_phase() {
        let scheduler = PhaseScheduler::default();
        // 25% of 4 weeks is exactly week 1
        assert_eq!(scheduler.resolve(1, 4).unwrap().phase, Phase::Base);
        // 60% of 10 weeks is exactly week 6
        assert_eq!(scheduler.resolve(6, 10).unwrap().phase, Phase::Build);
        assert_eq!(scheduler.resolve(7, 10).unwrap().phase, Phase::Peak);
    }

    #[test]
    fn test_phases_are_monotonic() {
        let scheduler = PhaseScheduler::default();
        for total in 1..=30 {
            let mut previous = 0;
            for week in 1..=total {
                let spec = scheduler.resolve(week, total).unwrap();
                let index = STANDARD_PHASES
                    .iter()
                    .position(|s| s.phase == spec.phase)
                    .unwrap();
                assert!(index >= previous, "week {week}/{total} went backwards");
                previous = index;
            }
        }
    }

    #[test]
    fn test_single_week_plan_is_taper() {
        let scheduler = PhaseScheduler::default();
        assert_eq!(scheduler.resolve(1, 1).unwrap().phase, Phase::Taper);
    }

    #[test]
    fn test_rejects_out_of_range_weeks() {
        let scheduler = PhaseScheduler::default();
        assert!(scheduler.resolve(0, 12).is_err());
        assert!(scheduler.resolve(13, 12).is_err());
        assert!(scheduler.resolve(1, 0).is_err());
    }

    #[test]
    fn test_phase_multipliers_and_whitelists() {
        let scheduler = PhaseScheduler::default();

        let peak = scheduler.spec(Phase::Peak).unwrap();
        assert_eq!(peak.volume_multiplier, 1.0);
        assert_eq!(peak.intensity_multiplier, 1.1);
        assert!(peak.is_eligible(WorkoutType::RacePace));
        assert!(!peak.is_eligible(WorkoutType::Progressive));
        assert!(!peak.is_eligible(WorkoutType::Fartlek));

        let base = scheduler.spec(Phase::Base).unwrap();
        assert!(!base.is_eligible(WorkoutType::Tempo));

        let build = scheduler.spec(Phase::Build).unwrap();
        assert_eq!(build.eligible.len(), 6);
        assert!(build.is_eligible(WorkoutType::Interval));
        assert!(build.is_eligible(WorkoutType::Progressive));
        assert!(!build.is_eligible(WorkoutType::Fartlek));
        assert!(!build.is_eligible(WorkoutType::RacePace));

        for spec in &STANDARD_PHASES {
            assert!(spec.is_eligible(WorkoutType::Long));
            assert!(spec.is_eligible(WorkoutType::Recovery));
        }
    }
}
