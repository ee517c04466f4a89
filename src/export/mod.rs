//! Plan presentation: JSON, CSV and terminal tables
//!
//! Paces stay fractional minutes per kilometer in every structured output
//! and gain an `mm:ss` rendering alongside.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::models::{Phase, WeeklyPlan, Workout, WorkoutType};
use crate::paces::format_pace;

pub mod csv;
pub mod json;
pub mod text;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Text,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "text" | "txt" | "table" => Ok(ExportFormat::Text),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Presentation view of one workout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutView {
    pub id: String,
    pub day: u32,
    pub workout_type: WorkoutType,
    pub distance_km: f64,
    pub target_pace: f64,
    /// `target_pace` as `m:ss` per km
    pub pace: String,
    pub description: String,
    pub completed: bool,
}

impl From<&Workout> for WorkoutView {
    fn from(workout: &Workout) -> Self {
        Self {
            id: workout.id.clone(),
            day: workout.day,
            workout_type: workout.workout_type,
            distance_km: workout.distance_km,
            target_pace: workout.target_pace,
            pace: format_pace(workout.target_pace),
            description: workout.description.clone(),
            completed: workout.completed,
        }
    }
}

/// Presentation view of a weekly plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanView {
    pub id: String,
    pub athlete_id: String,
    pub week: u32,
    pub phase: Phase,
    pub phase_description: String,
    pub total_volume_km: f64,
    pub workouts: Vec<WorkoutView>,
}

impl From<&WeeklyPlan> for PlanView {
    fn from(plan: &WeeklyPlan) -> Self {
        Self {
            id: plan.id.clone(),
            athlete_id: plan.athlete_id.clone(),
            week: plan.week,
            phase: plan.phase,
            phase_description: plan.phase_description.clone(),
            total_volume_km: plan.total_volume_km,
            workouts: plan.workouts.iter().map(WorkoutView::from).collect(),
        }
    }
}

/// Render plans in the requested format
pub fn render_plans(plans: &[WeeklyPlan], format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => {
            let views: Vec<PlanView> = plans.iter().map(PlanView::from).collect();
            json::to_pretty_json(&views)
        }
        ExportFormat::Csv => csv::plans_to_csv(plans),
        ExportFormat::Text => Ok(plans
            .iter()
            .map(text::plan_table)
            .collect::<Vec<_>>()
            .join("\n\n")),
    }
}

/// Write rendered plans to a file
pub fn export_plans<P: AsRef<Path>>(
    plans: &[WeeklyPlan],
    format: ExportFormat,
    output_path: P,
) -> Result<(), ExportError> {
    let rendered = render_plans(plans, format)?;
    std::fs::write(output_path, rendered)?;
    Ok(())
}
