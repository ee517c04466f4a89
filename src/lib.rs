// Library interface for RunCoach modules
// The binary and integration tests build on this crate

pub mod config;
pub mod database;
pub mod error;
pub mod exams;
pub mod export;
pub mod feedback;
pub mod logging;
pub mod models;
pub mod paces;
pub mod phases;
pub mod planner;
pub mod progress;
pub mod service;
pub mod store;
pub mod workouts;

// Re-export commonly used types for convenience
pub use models::*;
pub use config::AppConfig;
pub use database::SqliteStore;
pub use error::{CoachError, ErrorSeverity, Result};
pub use exams::{ExamAdjuster, ExamAdjustments};
pub use feedback::{FeedbackOutcome, PerformanceAdapter};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use paces::{format_pace, GoalBand, PaceCalculator, TrainingPaces};
pub use phases::{PhaseScheduler, PhaseSpec, PhaseTable};
pub use planner::{PlanOrchestrator, PlanOutcome, VolumeCaps};
pub use progress::ProgressReport;
pub use service::{AthleteCreated, CoachService, FeedbackHistory, PlanResponse};
pub use store::Store;
pub use workouts::{GeneratedWorkout, WorkoutGenerator, WorkoutTable};
