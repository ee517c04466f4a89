use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::models::{ExamRecord, FeedbackRecord, WeeklyPlan};
use crate::paces::{format_pace, TrainingPaces};
use crate::progress::ProgressReport;

#[derive(Tabled)]
struct WorkoutRow {
    #[tabled(rename = "Day")]
    day: u32,
    #[tabled(rename = "Type")]
    workout_type: String,
    #[tabled(rename = "Distance (km)")]
    distance: String,
    #[tabled(rename = "Pace (/km)")]
    pace: String,
    #[tabled(rename = "Done")]
    done: &'static str,
    #[tabled(rename = "Workout ID")]
    id: String,
    #[tabled(rename = "Description")]
    description: String,
}

#[derive(Tabled)]
struct PaceRow {
    #[tabled(rename = "Zone")]
    zone: &'static str,
    #[tabled(rename = "Pace (/km)")]
    pace: String,
}

#[derive(Tabled)]
struct FeedbackRow {
    #[tabled(rename = "Week")]
    week: u32,
    #[tabled(rename = "Sessions")]
    consistency: u32,
    #[tabled(rename = "Effort")]
    effort: String,
    #[tabled(rename = "Avg HR")]
    heart_rate: String,
    #[tabled(rename = "Notes")]
    notes: String,
}

#[derive(Tabled)]
struct ExamRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Type")]
    exam_type: String,
    #[tabled(rename = "Exam ID")]
    id: String,
}

/// Plan header line followed by a table of its workouts
pub fn plan_table(plan: &WeeklyPlan) -> String {
    let rows = plan.workouts.iter().map(|workout| WorkoutRow {
        day: workout.day,
        workout_type: workout.workout_type.to_string(),
        distance: format!("{:.1}", workout.distance_km),
        pace: format_pace(workout.target_pace),
        done: if workout.completed { "yes" } else { "" },
        id: workout.id.clone(),
        description: workout.description.clone(),
    });

    format!(
        "Week {} | {} ({}) | {:.1} km\n{}",
        plan.week,
        plan.phase,
        plan.phase_description,
        plan.total_volume_km,
        Table::new(rows).with(Style::rounded())
    )
}

pub fn paces_table(paces: &TrainingPaces) -> String {
    let rows = [
        ("easy", paces.easy),
        ("long", paces.long),
        ("tempo", paces.tempo),
        ("interval", paces.interval),
        ("threshold", paces.threshold),
        ("race pace", paces.race_pace),
    ]
    .into_iter()
    .map(|(zone, pace)| PaceRow {
        zone,
        pace: format_pace(pace),
    });

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn feedback_table(records: &[FeedbackRecord]) -> String {
    let rows = records.iter().map(|record| FeedbackRow {
        week: record.week,
        consistency: record.consistency,
        effort: format!("{:.1}", record.mean_effort),
        heart_rate: record
            .mean_heart_rate
            .map_or_else(String::new, |hr| format!("{:.0}", hr)),
        notes: record.notes.clone().unwrap_or_default(),
    });

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn exams_table(records: &[ExamRecord]) -> String {
    let rows = records.iter().map(|record| ExamRow {
        date: record.exam_date.format("%Y-%m-%d").to_string(),
        exam_type: record.exam_type().to_string(),
        id: record.id.clone(),
    });

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn progress_summary(report: &ProgressReport) -> String {
    let mut lines = vec![
        format!("Plans generated:     {} of {} weeks", report.total_plans, report.target_weeks),
        format!("Progress:            {:.1}%", report.progress_percentage),
        format!(
            "Workouts completed:  {} of {} ({:.1}%)",
            report.completed_workouts, report.total_workouts, report.completion_rate
        ),
        format!("Performance factor:  {:.3}", report.performance_factor),
    ];

    if !report.recent_feedback.is_empty() {
        lines.push(String::new());
        lines.push("Recent feedback:".to_string());
        lines.push(feedback_table(&report.recent_feedback));
    }

    lines.join("\n")
}
