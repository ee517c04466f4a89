use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoachError, Result};

/// Lower bound of the performance factor
pub const MIN_PERFORMANCE_FACTOR: f64 = 0.7;
/// Upper bound of the performance factor
pub const MAX_PERFORMANCE_FACTOR: f64 = 1.3;
/// Performance factor assigned at onboarding
pub const DEFAULT_PERFORMANCE_FACTOR: f64 = 1.0;

/// Workout types the planner can schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
    Easy,
    Long,
    Progressive,
    Fartlek,
    Tempo,
    Interval,
    /// Race-pace session, labelled `pace`
    #[serde(rename = "pace")]
    RacePace,
    Recovery,
}

impl WorkoutType {
    pub const ALL: [WorkoutType; 8] = [
        WorkoutType::Easy,
        WorkoutType::Long,
        WorkoutType::Progressive,
        WorkoutType::Fartlek,
        WorkoutType::Tempo,
        WorkoutType::Interval,
        WorkoutType::RacePace,
        WorkoutType::Recovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutType::Easy => "easy",
            WorkoutType::Long => "long",
            WorkoutType::Progressive => "progressive",
            WorkoutType::Fartlek => "fartlek",
            WorkoutType::Tempo => "tempo",
            WorkoutType::Interval => "interval",
            WorkoutType::RacePace => "pace",
            WorkoutType::Recovery => "recovery",
        }
    }
}

impl fmt::Display for WorkoutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkoutType {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(WorkoutType::Easy),
            "long" => Ok(WorkoutType::Long),
            "progressive" => Ok(WorkoutType::Progressive),
            "fartlek" => Ok(WorkoutType::Fartlek),
            "tempo" => Ok(WorkoutType::Tempo),
            "interval" => Ok(WorkoutType::Interval),
            "pace" | "race_pace" | "race-pace" => Ok(WorkoutType::RacePace),
            "recovery" => Ok(WorkoutType::Recovery),
            _ => Err(CoachError::invalid("workout_type", s, "unknown workout type")),
        }
    }
}

/// Training phases, in the order they occur within a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Base,
    Build,
    Peak,
    Taper,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Base => "base",
            Phase::Build => "build",
            Phase::Peak => "peak",
            Phase::Taper => "taper",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "base" => Ok(Phase::Base),
            "build" => Ok(Phase::Build),
            "peak" => Ok(Phase::Peak),
            "taper" => Ok(Phase::Taper),
            _ => Err(CoachError::invalid("phase", s, "unknown training phase")),
        }
    }
}

/// Self-reported running experience
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Beginner => "beginner",
            ExperienceLevel::Intermediate => "intermediate",
            ExperienceLevel::Advanced => "advanced",
        }
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExperienceLevel {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(ExperienceLevel::Beginner),
            "intermediate" => Ok(ExperienceLevel::Intermediate),
            "advanced" => Ok(ExperienceLevel::Advanced),
            _ => Err(CoachError::invalid(
                "level",
                s,
                "expected beginner, intermediate or advanced",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }
}

impl FromStr for Sex {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "M" | "MALE" => Ok(Sex::Male),
            "F" | "FEMALE" => Ok(Sex::Female),
            _ => Err(CoachError::invalid("sex", s, "expected M or F")),
        }
    }
}

/// A distance covered in a given time, used for both goals and trials
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedDistance {
    /// Distance in kilometers
    pub distance_km: f64,
    /// Elapsed time in minutes
    pub time_minutes: f64,
}

impl TimedDistance {
    pub fn new(distance_km: f64, time_minutes: f64) -> Self {
        Self {
            distance_km,
            time_minutes,
        }
    }

    /// Pace in minutes per kilometer. Callers validate the distance first.
    pub fn pace_min_per_km(&self) -> f64 {
        self.time_minutes / self.distance_km
    }
}

/// Baseline time trial recorded at onboarding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineTrial {
    /// Distance and time of the trial (normally 5 km)
    pub result: TimedDistance,
    /// Average heart rate during the trial (bpm)
    pub avg_heart_rate: f64,
    /// Perceived effort on a 0-10 scale
    pub perceived_effort: u8,
}

/// Athlete profile created at onboarding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteProfile {
    /// Unique athlete identifier
    pub id: String,

    /// Age in years
    pub age: u32,

    /// Weight in kilograms
    pub weight_kg: f64,

    pub sex: Sex,

    pub level: ExperienceLevel,

    /// Target race distance and time
    pub goal: TimedDistance,

    /// Plan length in weeks
    pub plan_weeks: u32,

    /// Training days per week
    pub days_per_week: u32,

    /// Baseline time trial (distance, time, heart rate, effort)
    pub baseline: BaselineTrial,

    /// Optional 3 km trial time in minutes, preferred for pace derivation
    pub three_km_time_minutes: Option<f64>,

    /// Adaptive multiplier in [0.7, 1.3], updated from weekly feedback
    pub performance_factor: f64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Onboarding input for a new athlete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAthlete {
    pub age: u32,
    pub weight_kg: f64,
    pub sex: Sex,
    pub level: ExperienceLevel,
    pub goal: TimedDistance,
    pub plan_weeks: u32,
    pub days_per_week: u32,
    pub baseline: BaselineTrial,
    pub three_km_time_minutes: Option<f64>,
}

impl NewAthlete {
    /// Reject onboarding data the planner cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.age == 0 {
            return Err(CoachError::invalid("age", self.age, "must be positive"));
        }
        require_positive("weight_kg", self.weight_kg)?;
        require_positive("goal.distance_km", self.goal.distance_km)?;
        require_positive("goal.time_minutes", self.goal.time_minutes)?;
        require_positive("baseline.distance_km", self.baseline.result.distance_km)?;
        require_positive("baseline.time_minutes", self.baseline.result.time_minutes)?;
        require_positive("baseline.avg_heart_rate", self.baseline.avg_heart_rate)?;
        if self.baseline.perceived_effort > 10 {
            return Err(CoachError::invalid(
                "baseline.perceived_effort",
                self.baseline.perceived_effort,
                "must be between 0 and 10",
            ));
        }
        if let Some(minutes) = self.three_km_time_minutes {
            require_positive("three_km_time_minutes", minutes)?;
        }
        if self.plan_weeks == 0 {
            return Err(CoachError::invalid("plan_weeks", self.plan_weeks, "must be at least 1"));
        }
        if !(1..=7).contains(&self.days_per_week) {
            return Err(CoachError::invalid(
                "days_per_week",
                self.days_per_week,
                "must be between 1 and 7",
            ));
        }
        Ok(())
    }
}

/// Fails unless `value` is a finite number greater than zero
pub(crate) fn require_positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CoachError::invalid(field, value, "must be greater than zero"))
    }
}

/// Realized metrics reported when a workout is completed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutMetrics {
    /// Perceived effort on a 0-10 scale
    pub perceived_effort: Option<u8>,
    /// Average heart rate (bpm)
    pub avg_heart_rate: Option<f64>,
    /// Realized time in minutes
    pub time_minutes: Option<f64>,
}

impl WorkoutMetrics {
    pub fn validate(&self) -> Result<()> {
        if let Some(effort) = self.perceived_effort {
            if effort > 10 {
                return Err(CoachError::invalid(
                    "perceived_effort",
                    effort,
                    "must be between 0 and 10",
                ));
            }
        }
        if let Some(hr) = self.avg_heart_rate {
            require_positive("avg_heart_rate", hr)?;
        }
        if let Some(minutes) = self.time_minutes {
            require_positive("time_minutes", minutes)?;
        }
        Ok(())
    }
}

/// A single scheduled run, owned by its weekly plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub plan_id: String,
    pub athlete_id: String,
    /// Day slot within the week (1-based)
    pub day: u32,
    pub workout_type: WorkoutType,
    /// Planned distance in kilometers, never below 3.0
    pub distance_km: f64,
    /// Target pace in minutes per kilometer
    pub target_pace: f64,
    pub description: String,
    pub completed: bool,
    pub metrics: WorkoutMetrics,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Workout row handed to the store when a plan is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkout {
    pub day: u32,
    pub workout_type: WorkoutType,
    pub distance_km: f64,
    pub target_pace: f64,
    pub description: String,
}

/// One week of training for one athlete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPlan {
    pub id: String,
    pub athlete_id: String,
    /// Week index (1-based)
    pub week: u32,
    pub phase: Phase,
    pub phase_description: String,
    /// Total weekly volume in kilometers
    pub total_volume_km: f64,
    pub created_at: DateTime<Utc>,
    /// Workouts ordered by day
    pub workouts: Vec<Workout>,
}

/// Plan header handed to the store when a plan is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlan {
    pub athlete_id: String,
    pub week: u32,
    pub phase: Phase,
    pub phase_description: String,
    pub total_volume_km: f64,
}

/// Weekly feedback submitted by the athlete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub athlete_id: String,
    pub week: u32,
    /// Workouts completed this week
    pub consistency: u32,
    /// Mean perceived effort (0-10)
    pub mean_effort: f64,
    pub mean_heart_rate: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeedback {
    pub athlete_id: String,
    pub week: u32,
    pub consistency: u32,
    pub mean_effort: f64,
    pub mean_heart_rate: Option<f64>,
    pub notes: Option<String>,
}

/// Medical exam categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamType {
    BodyComposition,
    LungFunction,
    Vo2max,
}

impl ExamType {
    /// Evaluation order used by the exam adjustment
    pub const ALL: [ExamType; 3] = [
        ExamType::BodyComposition,
        ExamType::LungFunction,
        ExamType::Vo2max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::BodyComposition => "body_composition",
            ExamType::LungFunction => "lung_function",
            ExamType::Vo2max => "vo2max",
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamType {
    type Err = CoachError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "body_composition" => Ok(ExamType::BodyComposition),
            "lung_function" => Ok(ExamType::LungFunction),
            "vo2max" => Ok(ExamType::Vo2max),
            _ => Err(CoachError::invalid(
                "exam_type",
                s,
                "expected body_composition, lung_function or vo2max",
            )),
        }
    }
}

/// Bioimpedance body composition results
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyComposition {
    pub body_weight_kg: Option<f64>,
    pub body_fat_percent: Option<f64>,
    pub lean_mass_kg: Option<f64>,
    pub fat_mass_kg: Option<f64>,
    pub body_water_percent: Option<f64>,
    pub bone_mass_kg: Option<f64>,
    /// Basal metabolic rate (kcal/day)
    pub basal_metabolic_rate: Option<f64>,
}

/// Spirometry results
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LungFunction {
    /// Forced vital capacity (liters)
    pub fvc_liters: Option<f64>,
    /// Forced expiratory volume in one second (liters)
    pub fev1_liters: Option<f64>,
    /// FEV1/FVC ratio as a percentage
    pub fev1_fvc_ratio: Option<f64>,
    /// Peak expiratory flow (liters/minute)
    pub peak_expiratory_flow: Option<f64>,
}

/// Cardiopulmonary exercise test results
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vo2maxTest {
    /// VO2max (ml/kg/min)
    pub vo2max: Option<f64>,
    pub max_heart_rate: Option<f64>,
    /// Anaerobic threshold (ml/kg/min)
    pub anaerobic_threshold: Option<f64>,
    /// Ventilatory threshold (ml/kg/min)
    pub ventilatory_threshold: Option<f64>,
    pub aerobic_power: Option<f64>,
}

/// Structured exam payload, tagged by exam type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "exam_type", rename_all = "snake_case")]
pub enum ExamResult {
    BodyComposition(BodyComposition),
    LungFunction(LungFunction),
    Vo2max(Vo2maxTest),
}

impl ExamResult {
    pub fn exam_type(&self) -> ExamType {
        match self {
            ExamResult::BodyComposition(_) => ExamType::BodyComposition,
            ExamResult::LungFunction(_) => ExamType::LungFunction,
            ExamResult::Vo2max(_) => ExamType::Vo2max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamRecord {
    pub id: String,
    pub athlete_id: String,
    pub result: ExamResult,
    pub exam_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl ExamRecord {
    pub fn exam_type(&self) -> ExamType {
        self.result.exam_type()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExam {
    pub athlete_id: String,
    pub result: ExamResult,
    pub exam_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_new_athlete() -> NewAthlete {
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
    fn test_workout_type_labels() {
        for workout_type in WorkoutType::ALL {
            let parsed: WorkoutType = workout_type.as_str().parse().unwrap();
            assert_eq!(parsed, workout_type);
        }
        assert_eq!("race-pace".parse::<WorkoutType>().unwrap(), WorkoutType::RacePace);
        assert!("sprint".parse::<WorkoutType>().is_err());
    }

    #[test]
    fn test_race_pace_serializes_as_pace() {
        let json = serde_json::to_string(&WorkoutType::RacePace).unwrap();
        assert_eq!(json, "\"pace\"");
    }

    #[test]
    fn test_sex_and_level_normalization() {
        assert_eq!(" f ".parse::<Sex>().unwrap(), Sex::Female);
        assert_eq!("Advanced".parse::<ExperienceLevel>().unwrap(), ExperienceLevel::Advanced);
        assert!("elite".parse::<ExperienceLevel>().is_err());
    }

    #[test]
    fn test_new_athlete_validation() {
        assert!(sample_new_athlete().validate().is_ok());

        let mut athlete = sample_new_athlete();
        athlete.days_per_week = 0;
        assert!(matches!(
            athlete.validate(),
            Err(CoachError::InvalidInput { ref field, .. }) if field == "days_per_week"
        ));

        let mut athlete = sample_new_athlete();
        athlete.goal.distance_km = 0.0;
        assert!(athlete.validate().is_err());

        let mut athlete = sample_new_athlete();
        athlete.three_km_time_minutes = Some(f64::NAN);
        assert!(athlete.validate().is_err());
    }

    #[test]
    fn test_exam_result_tagging() {
        let result = ExamResult::Vo2max(Vo2maxTest {
            vo2max: Some(52.0),
            ..Default::default()
        });
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"exam_type\":\"vo2max\""));

        let parsed: ExamResult =
            serde_json::from_str(r#"{"exam_type":"lung_function","fev1_fvc_ratio":65.0}"#).unwrap();
        assert_eq!(parsed.exam_type(), ExamType::LungFunction);
    }
}
