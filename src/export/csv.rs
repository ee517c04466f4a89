use serde::Serialize;

use super::ExportError;
use crate::models::WeeklyPlan;
use crate::paces::format_pace;

/// One CSV row per scheduled workout
#[derive(Debug, Serialize)]
struct WorkoutRecord<'a> {
    week: u32,
    phase: &'a str,
    day: u32,
    workout_type: &'a str,
    distance_km: f64,
    target_pace_min_per_km: f64,
    target_pace: String,
    completed: bool,
    description: &'a str,
}

/// Flatten plans into CSV, ordered as given
pub fn plans_to_csv(plans: &[WeeklyPlan]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for plan in plans {
        for workout in &plan.workouts {
            writer
                .serialize(WorkoutRecord {
                    week: plan.week,
                    phase: plan.phase.as_str(),
                    day: workout.day,
                    workout_type: workout.workout_type.as_str(),
                    distance_km: workout.distance_km,
                    target_pace_min_per_km: workout.target_pace,
                    target_pace: format_pace(workout.target_pace),
                    completed: workout.completed,
                    description: &workout.description,
                })
                .map_err(|e| ExportError::SerializationError(e.to_string()))?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::SerializationError(e.to_string()))
}
