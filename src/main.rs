use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use runcoach::export::{self, text, ExportFormat};
use runcoach::{
    format_pace, AppConfig, BaselineTrial, CoachError, CoachService, ExamResult, ExamType,
    ExperienceLevel, LogLevel, NewAthlete, NewExam, NewFeedback, Sex, SqliteStore, TimedDistance,
    WorkoutMetrics,
};

/// RunCoach - adaptive running plan generator
///
/// Builds periodized weekly running plans from a baseline time trial and a
/// race goal, and adapts future weeks from feedback and medical exams.
#[derive(Parser)]
#[command(name = "runcoach")]
#[command(version)]
#[command(about = "Adaptive running plan generator", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured database file
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    output: OutputFormat,

    /// Increase verbosity of log output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
struct AthleteArg {
    /// Athlete ID (defaults to the configured athlete)
    #[arg(short, long)]
    athlete: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure application settings
    #[command(subcommand)]
    Config(ConfigCommand),

    #[command(flatten)]
    Coach(CoachCommand),
}

/// Commands that work against the athlete database
#[derive(Subcommand)]
enum CoachCommand {
    /// Manage athlete profiles
    #[command(subcommand)]
    Athlete(AthleteCommand),

    /// Show derived training paces
    Paces(AthleteArg),

    /// Generate, show and export weekly plans
    #[command(subcommand)]
    Plan(PlanCommand),

    /// Record workout results
    #[command(subcommand)]
    Workout(WorkoutCommand),

    /// Submit and review weekly feedback
    #[command(subcommand)]
    Feedback(FeedbackCommand),

    /// Record and review medical exams
    #[command(subcommand)]
    Exam(ExamCommand),

    /// Show overall progress towards the goal
    Progress(AthleteArg),
}

#[derive(Subcommand)]
enum AthleteCommand {
    /// Create an athlete from onboarding data
    Create(CreateAthleteArgs),

    /// Show an athlete profile
    Show(AthleteArg),
}

#[derive(Args)]
struct CreateAthleteArgs {
    /// Age in years
    #[arg(long)]
    age: u32,

    /// Weight in kilograms
    #[arg(long)]
    weight: f64,

    /// Sex (M or F)
    #[arg(long)]
    sex: String,

    /// Experience level (beginner, intermediate, advanced)
    #[arg(long)]
    level: String,

    /// Goal race distance in km
    #[arg(long)]
    goal_km: f64,

    /// Goal race time in minutes
    #[arg(long)]
    goal_minutes: f64,

    /// Plan length in weeks
    #[arg(long)]
    weeks: u32,

    /// Training days per week
    #[arg(long)]
    days: u32,

    /// Baseline trial distance in km
    #[arg(long, default_value = "5.0")]
    trial_km: f64,

    /// Baseline trial time in minutes
    #[arg(long)]
    trial_minutes: f64,

    /// Average heart rate during the baseline trial
    #[arg(long)]
    trial_hr: f64,

    /// Perceived effort of the baseline trial (0-10)
    #[arg(long)]
    trial_effort: u8,

    /// Optional 3 km trial time in minutes
    #[arg(long)]
    three_km_minutes: Option<f64>,

    /// Store the new athlete as the default in the config file
    #[arg(long)]
    set_default: bool,
}

#[derive(Subcommand)]
enum PlanCommand {
    /// Generate the plan for a week (returns the existing one if present)
    Generate {
        #[command(flatten)]
        athlete: AthleteArg,

        /// Week number, starting at 1
        #[arg(short, long)]
        week: u32,
    },

    /// Show the stored plan for a week
    Show {
        #[command(flatten)]
        athlete: AthleteArg,

        #[arg(short, long)]
        week: u32,
    },

    /// List all stored plans
    List(AthleteArg),

    /// Export all stored plans to a file
    Export {
        #[command(flatten)]
        athlete: AthleteArg,

        /// Output file path
        #[arg(long)]
        file: PathBuf,

        /// Export format (csv, json, text)
        #[arg(short = 'f', long, default_value = "csv")]
        format: String,
    },
}

#[derive(Subcommand)]
enum WorkoutCommand {
    /// Mark a workout complete with realized metrics
    Complete {
        /// Workout ID
        id: String,

        /// Perceived effort (0-10)
        #[arg(long)]
        effort: Option<u8>,

        /// Average heart rate
        #[arg(long)]
        heart_rate: Option<f64>,

        /// Realized time in minutes
        #[arg(long)]
        time_minutes: Option<f64>,
    },
}

#[derive(Subcommand)]
enum FeedbackCommand {
    /// Submit weekly feedback and update the performance factor
    Submit {
        #[command(flatten)]
        athlete: AthleteArg,

        #[arg(short, long)]
        week: u32,

        /// Workouts completed this week
        #[arg(long)]
        consistency: u32,

        /// Mean perceived effort (0-10)
        #[arg(long)]
        effort: f64,

        /// Mean heart rate
        #[arg(long)]
        heart_rate: Option<f64>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List feedback history
    List(AthleteArg),
}

#[derive(Subcommand)]
enum ExamCommand {
    /// Add an exam record
    Add {
        #[command(flatten)]
        athlete: AthleteArg,

        /// Exam type (body_composition, lung_function, vo2max)
        #[arg(short = 't', long = "type")]
        exam_type: String,

        /// Exam date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Exam values as a JSON object, e.g. '{"vo2max": 52.0}'
        #[arg(long)]
        data: String,
    },

    /// List exams, newest first
    List(AthleteArg),

    /// Show the adjustments derived from the latest exams
    Adjustments(AthleteArg),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<CoachError>() {
                Some(coach_err) => eprintln!("{} {}", "Error:".red().bold(), coach_err.user_message()),
                None => eprintln!("{} {:#}", "Error:".red().bold(), err),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;

    let mut log_config = config.logging.clone();
    log_config.level = match cli.verbose {
        0 => log_config.level,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    runcoach::logging::init_logging(&log_config)?;

    let command = match cli.command {
        Commands::Config(command) => return run_config(&command, &mut config, cli.config),
        Commands::Coach(command) => command,
    };

    let database_path = cli
        .database
        .unwrap_or_else(|| config.storage.database_path.clone());
    if let Some(parent) = database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
    }
    let store = SqliteStore::open(&database_path)
        .with_context(|| format!("Failed to open database: {}", database_path.display()))?;
    let mut service = CoachService::from_settings(store, &config.planner);
    let output = cli.output;

    match command {
        CoachCommand::Athlete(AthleteCommand::Create(args)) => {
            let set_default = args.set_default;
            let created = service.create_athlete(&new_athlete(args)?)?;
            if set_default {
                config.default_athlete_id = Some(created.athlete.id.clone());
                save_config(&mut config, cli.config)?;
            }
            emit(output, &created, || {
                format!(
                    "{}\n  ID: {}\n\n{}",
                    "✓ Athlete created".green().bold(),
                    created.athlete.id,
                    text::paces_table(&created.paces)
                )
            })?;
        }

        CoachCommand::Athlete(AthleteCommand::Show(arg)) => {
            let athlete = service.get_athlete(&config.resolve_athlete(arg.athlete.as_deref())?)?;
            emit(output, &athlete, || {
                format!(
                    "{}\n  ID: {}\n  Level: {}\n  Goal: {:.1} km in {:.0} min ({}/km)\n  Plan: {} weeks, {} days per week\n  Performance factor: {:.3}",
                    "Athlete".bold(),
                    athlete.id,
                    athlete.level,
                    athlete.goal.distance_km,
                    athlete.goal.time_minutes,
                    format_pace(athlete.goal.pace_min_per_km()),
                    athlete.plan_weeks,
                    athlete.days_per_week,
                    athlete.performance_factor
                )
            })?;
        }

        CoachCommand::Paces(arg) => {
            let paces = service.training_paces(&config.resolve_athlete(arg.athlete.as_deref())?)?;
            emit(output, &paces, || text::paces_table(&paces))?;
        }

        CoachCommand::Plan(PlanCommand::Generate { athlete, week }) => {
            let athlete_id = config.resolve_athlete(athlete.athlete.as_deref())?;
            let response = service.generate_plan(&athlete_id, week)?;
            emit(output, &response, || {
                let status = if response.outcome.is_created() {
                    "✓ Plan generated".green().bold()
                } else {
                    "Plan already exists for this week".yellow().bold()
                };
                let mut lines = vec![status.to_string(), text::plan_table(response.outcome.plan())];
                if let Some(adjustments) = &response.exam_adjustments {
                    if !adjustments.is_neutral() {
                        lines.push(format!(
                            "{} volume x{:.2}, intensity x{:.2}, recovery x{:.2}",
                            "Exam adjustments (advisory):".cyan().bold(),
                            adjustments.volume_factor,
                            adjustments.intensity_factor,
                            adjustments.recovery_factor
                        ));
                        lines.extend(adjustments.recommendations.iter().map(|r| format!("  - {}", r)));
                    }
                }
                lines.join("\n")
            })?;
        }

        CoachCommand::Plan(PlanCommand::Show { athlete, week }) => {
            let athlete_id = config.resolve_athlete(athlete.athlete.as_deref())?;
            let plan = service.get_plan(&athlete_id, week)?;
            emit(output, &export::PlanView::from(&plan), || text::plan_table(&plan))?;
        }

        CoachCommand::Plan(PlanCommand::List(arg)) => {
            let plans = service.list_plans(&config.resolve_athlete(arg.athlete.as_deref())?)?;
            let views: Vec<export::PlanView> = plans.iter().map(export::PlanView::from).collect();
            emit(output, &views, || {
                if plans.is_empty() {
                    "No plans generated yet".dimmed().to_string()
                } else {
                    plans.iter().map(text::plan_table).collect::<Vec<_>>().join("\n\n")
                }
            })?;
        }

        CoachCommand::Plan(PlanCommand::Export { athlete, file, format }) => {
            let athlete_id = config.resolve_athlete(athlete.athlete.as_deref())?;
            let format: ExportFormat = format.parse()?;
            let plans = service.list_plans(&athlete_id)?;
            export::export_plans(&plans, format, &file)?;
            println!(
                "{} {} plans to {}",
                "✓ Exported".green().bold(),
                plans.len(),
                file.display()
            );
        }

        CoachCommand::Workout(WorkoutCommand::Complete { id, effort, heart_rate, time_minutes }) => {
            let metrics = WorkoutMetrics {
                perceived_effort: effort,
                avg_heart_rate: heart_rate,
                time_minutes,
            };
            let workout = service.complete_workout(&id, &metrics)?;
            emit(output, &workout, || {
                format!(
                    "{} day {} {} ({:.1} km)",
                    "✓ Completed".green().bold(),
                    workout.day,
                    workout.workout_type,
                    workout.distance_km
                )
            })?;
        }

        CoachCommand::Feedback(FeedbackCommand::Submit { athlete, week, consistency, effort, heart_rate, notes }) => {
            let feedback = NewFeedback {
                athlete_id: config.resolve_athlete(athlete.athlete.as_deref())?,
                week,
                consistency,
                mean_effort: effort,
                mean_heart_rate: heart_rate,
                notes,
            };
            let outcome = service.submit_feedback(&feedback)?;
            emit(output, &outcome, || {
                format!(
                    "{} new performance factor: {:.3}",
                    "✓ Feedback recorded,".green().bold(),
                    outcome.performance_factor
                )
            })?;
        }

        CoachCommand::Feedback(FeedbackCommand::List(arg)) => {
            let history = service.feedback_history(&config.resolve_athlete(arg.athlete.as_deref())?)?;
            emit(output, &history, || {
                format!(
                    "{}\nCurrent performance factor: {:.3}",
                    text::feedback_table(&history.records),
                    history.current_performance_factor
                )
            })?;
        }

        CoachCommand::Exam(ExamCommand::Add { athlete, exam_type, date, data }) => {
            let exam = NewExam {
                athlete_id: config.resolve_athlete(athlete.athlete.as_deref())?,
                result: parse_exam(&exam_type, &data)?,
                exam_date: date,
            };
            let record = service.add_exam(&exam)?;
            emit(output, &record, || {
                format!("{} {} exam {}", "✓ Recorded".green().bold(), record.exam_type(), record.id)
            })?;
        }

        CoachCommand::Exam(ExamCommand::List(arg)) => {
            let exams = service.list_exams(&config.resolve_athlete(arg.athlete.as_deref())?)?;
            emit(output, &exams, || text::exams_table(&exams))?;
        }

        CoachCommand::Exam(ExamCommand::Adjustments(arg)) => {
            let adjustments =
                service.exam_adjustments(&config.resolve_athlete(arg.athlete.as_deref())?)?;
            emit(output, &adjustments, || {
                let mut lines = vec![format!(
                    "volume x{:.2}, intensity x{:.2}, recovery x{:.2}",
                    adjustments.volume_factor,
                    adjustments.intensity_factor,
                    adjustments.recovery_factor
                )];
                if let Some(percent) = adjustments.threshold_percent {
                    lines.push(format!("Anaerobic threshold at {:.1}% of VO2max", percent));
                }
                lines.extend(adjustments.recommendations.iter().map(|r| format!("  - {}", r)));
                lines.join("\n")
            })?;
        }

        CoachCommand::Progress(arg) => {
            let report = service.progress(&config.resolve_athlete(arg.athlete.as_deref())?)?;
            emit(output, &report, || text::progress_summary(&report))?;
        }

    }

    Ok(())
}

fn run_config(command: &ConfigCommand, config: &mut AppConfig, path: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("{}", toml::to_string_pretty(config)?);
        }
        ConfigCommand::Init => {
            let path = save_config(config, path)?;
            println!("{} {}", "✓ Configuration written to".green().bold(), path.display());
        }
    }
    Ok(())
}

fn save_config(config: &mut AppConfig, path: Option<PathBuf>) -> Result<PathBuf> {
    let path = path.unwrap_or_else(AppConfig::default_config_path);
    config.save_to_file(&path)?;
    Ok(path)
}

fn new_athlete(args: CreateAthleteArgs) -> Result<NewAthlete> {
    let sex: Sex = args.sex.parse()?;
    let level: ExperienceLevel = args.level.parse()?;

    Ok(NewAthlete {
        age: args.age,
        weight_kg: args.weight,
        sex,
        level,
        goal: TimedDistance::new(args.goal_km, args.goal_minutes),
        plan_weeks: args.weeks,
        days_per_week: args.days,
        baseline: BaselineTrial {
            result: TimedDistance::new(args.trial_km, args.trial_minutes),
            avg_heart_rate: args.trial_hr,
            perceived_effort: args.trial_effort,
        },
        three_km_time_minutes: args.three_km_minutes,
    })
}

/// Build a typed exam payload from its type name and a JSON object of values
fn parse_exam(exam_type: &str, data: &str) -> Result<ExamResult> {
    let exam_type: ExamType = exam_type.parse()?;
    let mut values: serde_json::Value =
        serde_json::from_str(data).context("Exam data must be a JSON object")?;
    let object = values
        .as_object_mut()
        .context("Exam data must be a JSON object")?;
    object.insert(
        "exam_type".to_string(),
        serde_json::Value::String(exam_type.as_str().to_string()),
    );

    serde_json::from_value(values).context("Exam data does not match the exam type")
}

/// Print `value` as JSON, or the text rendering
fn emit<T: Serialize>(output: OutputFormat, value: &T, render: impl FnOnce() -> String) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", render()),
    }
    Ok(())
}
