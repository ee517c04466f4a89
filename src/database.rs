use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoachError, Result};
use crate::models::{
    AthleteProfile, BaselineTrial, ExamRecord, ExamType, FeedbackRecord, NewAthlete, NewExam,
    NewFeedback, NewPlan, NewWorkout, TimedDistance, WeeklyPlan, Workout, WorkoutMetrics,
    DEFAULT_PERFORMANCE_FACTOR,
};
use crate::store::Store;

/// Attach the failing operation to a rusqlite error
trait PersistContext<T> {
    fn during(self, operation: &str) -> Result<T>;
}

impl<T> PersistContext<T> for rusqlite::Result<T> {
    fn during(self, operation: &str) -> Result<T> {
        self.map_err(|e| CoachError::persistence(operation, e))
    }
}

const ATHLETE_COLUMNS: &str = "id, age, weight_kg, sex, level, goal_distance_km, goal_time_minutes, \
     plan_weeks, days_per_week, trial_distance_km, trial_time_minutes, trial_avg_heart_rate, \
     trial_perceived_effort, three_km_time_minutes, performance_factor, created_at";

const PLAN_COLUMNS: &str =
    "id, athlete_id, week, phase, phase_description, total_volume_km, created_at";

const WORKOUT_COLUMNS: &str = "id, plan_id, athlete_id, day, workout_type, distance_km, target_pace, \
     description, completed, perceived_effort, avg_heart_rate, time_minutes, created_at, completed_at";

const FEEDBACK_COLUMNS: &str =
    "id, athlete_id, week, consistency, mean_effort, mean_heart_rate, notes, created_at";

const EXAM_COLUMNS: &str = "id, athlete_id, exam_type, payload, exam_date, created_at";

/// SQLite-backed store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create or open a database at the specified path
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).during("open database")?;
        conn.busy_timeout(Duration::from_secs(5))
            .during("set busy timeout")?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .during("enable WAL")?;
        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().during("open database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)
            .during("enable foreign keys")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize database schema with tables and indexes
    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS athletes (
                    id TEXT PRIMARY KEY,
                    age INTEGER NOT NULL,
                    weight_kg REAL NOT NULL,
                    sex TEXT NOT NULL,
                    level TEXT NOT NULL,
                    goal_distance_km REAL NOT NULL,
                    goal_time_minutes REAL NOT NULL,
                    plan_weeks INTEGER NOT NULL,
                    days_per_week INTEGER NOT NULL,
                    trial_distance_km REAL NOT NULL,
                    trial_time_minutes REAL NOT NULL,
                    trial_avg_heart_rate REAL NOT NULL,
                    trial_perceived_effort INTEGER NOT NULL,
                    three_km_time_minutes REAL,
                    performance_factor REAL NOT NULL DEFAULT 1.0
                        CHECK (performance_factor BETWEEN 0.7 AND 1.3),
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS training_plans (
                    id TEXT PRIMARY KEY,
                    athlete_id TEXT NOT NULL REFERENCES athletes (id),
                    week INTEGER NOT NULL,
                    phase TEXT NOT NULL,
                    phase_description TEXT NOT NULL,
                    total_volume_km REAL NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE (athlete_id, week)
                );

                CREATE TABLE IF NOT EXISTS workouts (
                    id TEXT PRIMARY KEY,
                    plan_id TEXT NOT NULL REFERENCES training_plans (id) ON DELETE CASCADE,
                    athlete_id TEXT NOT NULL REFERENCES athletes (id),
                    day INTEGER NOT NULL,
                    workout_type TEXT NOT NULL,
                    distance_km REAL NOT NULL CHECK (distance_km >= 3.0),
                    target_pace REAL NOT NULL,
                    description TEXT NOT NULL,
                    completed BOOLEAN NOT NULL DEFAULT FALSE,
                    perceived_effort INTEGER,
                    avg_heart_rate REAL,
                    time_minutes REAL,
                    created_at TEXT NOT NULL,
                    completed_at TEXT
                );

                CREATE TABLE IF NOT EXISTS feedback (
                    id TEXT PRIMARY KEY,
                    athlete_id TEXT NOT NULL REFERENCES athletes (id),
                    week INTEGER NOT NULL,
                    consistency INTEGER NOT NULL,
                    mean_effort REAL NOT NULL,
                    mean_heart_rate REAL,
                    notes TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS exams (
                    id TEXT PRIMARY KEY,
                    athlete_id TEXT NOT NULL REFERENCES athletes (id),
                    exam_type TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    exam_date TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_workouts_plan_day ON workouts (plan_id, day);
                CREATE INDEX IF NOT EXISTS idx_feedback_athlete_week ON feedback (athlete_id, week);
                CREATE INDEX IF NOT EXISTS idx_exams_athlete_type ON exams (athlete_id, exam_type, exam_date);
                "#,
            )
            .during("initialize schema")
    }

    fn athlete_exists(tx: &Transaction, athlete_id: &str) -> rusqlite::Result<bool> {
        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM athletes WHERE id = ?1",
            params![athlete_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn plan_exists(tx: &Transaction, athlete_id: &str, week: u32) -> rusqlite::Result<bool> {
        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM training_plans WHERE athlete_id = ?1 AND week = ?2",
            params![athlete_id, week],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn load_workouts(conn: &Connection, plan_id: &str) -> rusqlite::Result<Vec<Workout>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM workouts WHERE plan_id = ?1 ORDER BY day",
            WORKOUT_COLUMNS
        ))?;
        let workouts = stmt
            .query_map(params![plan_id], workout_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(workouts)
    }

    fn load_workout(conn: &Connection, workout_id: &str) -> rusqlite::Result<Option<Workout>> {
        conn.query_row(
            &format!("SELECT {} FROM workouts WHERE id = ?1", WORKOUT_COLUMNS),
            params![workout_id],
            workout_from_row,
        )
        .optional()
    }

    fn with_workouts(&self, mut plan: WeeklyPlan) -> rusqlite::Result<WeeklyPlan> {
        plan.workouts = Self::load_workouts(&self.conn, &plan.id)?;
        Ok(plan)
    }
}

impl Store for SqliteStore {
    fn create_athlete(&mut self, athlete: &NewAthlete) -> Result<AthleteProfile> {
        athlete.validate()?;

        let profile = AthleteProfile {
            id: Uuid::new_v4().to_string(),
            age: athlete.age,
            weight_kg: athlete.weight_kg,
            sex: athlete.sex,
            level: athlete.level,
            goal: athlete.goal,
            plan_weeks: athlete.plan_weeks,
            days_per_week: athlete.days_per_week,
            baseline: athlete.baseline,
            three_km_time_minutes: athlete.three_km_time_minutes,
            performance_factor: DEFAULT_PERFORMANCE_FACTOR,
            created_at: Utc::now(),
        };

        self.conn
            .execute(
                &format!(
                    "INSERT INTO athletes ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                    ATHLETE_COLUMNS
                ),
                params![
                    profile.id,
                    profile.age,
                    profile.weight_kg,
                    profile.sex.as_str(),
                    profile.level.as_str(),
                    profile.goal.distance_km,
                    profile.goal.time_minutes,
                    profile.plan_weeks,
                    profile.days_per_week,
                    profile.baseline.result.distance_km,
                    profile.baseline.result.time_minutes,
                    profile.baseline.avg_heart_rate,
                    profile.baseline.perceived_effort,
                    profile.three_km_time_minutes,
                    profile.performance_factor,
                    profile.created_at,
                ],
            )
            .during("create athlete")?;

        debug!(athlete_id = %profile.id, level = %profile.level, "athlete created");
        Ok(profile)
    }

    fn get_athlete(&self, athlete_id: &str) -> Result<AthleteProfile> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM athletes WHERE id = ?1", ATHLETE_COLUMNS),
                params![athlete_id],
                athlete_from_row,
            )
            .optional()
            .during("load athlete")?
            .ok_or_else(|| CoachError::not_found("Athlete", athlete_id))
    }

    fn create_plan_atomic(&mut self, header: &NewPlan, workouts: &[NewWorkout]) -> Result<WeeklyPlan> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .during("begin plan transaction")?;

        if !Self::athlete_exists(&tx, &header.athlete_id).during("check athlete")? {
            return Err(CoachError::not_found("Athlete", header.athlete_id.as_str()));
        }
        if Self::plan_exists(&tx, &header.athlete_id, header.week).during("check plan")? {
            return Err(CoachError::AlreadyExists {
                athlete_id: header.athlete_id.clone(),
                week: header.week,
            });
        }

        let now = Utc::now();
        let plan_id = Uuid::new_v4().to_string();
        tx.execute(
            &format!("INSERT INTO training_plans ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)", PLAN_COLUMNS),
            params![
                plan_id,
                header.athlete_id,
                header.week,
                header.phase.as_str(),
                header.phase_description,
                header.total_volume_km,
                now,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                CoachError::AlreadyExists {
                    athlete_id: header.athlete_id.clone(),
                    week: header.week,
                }
            } else {
                CoachError::persistence("insert plan", e)
            }
        })?;

        let mut stored = Vec::with_capacity(workouts.len());
        for workout in workouts {
            let stored_workout = Workout {
                id: Uuid::new_v4().to_string(),
                plan_id: plan_id.clone(),
                athlete_id: header.athlete_id.clone(),
                day: workout.day,
                workout_type: workout.workout_type,
                distance_km: workout.distance_km,
                target_pace: workout.target_pace,
                description: workout.description.clone(),
                completed: false,
                metrics: WorkoutMetrics::default(),
                created_at: now,
                completed_at: None,
            };
            tx.execute(
                r#"
                INSERT INTO workouts (
                    id, plan_id, athlete_id, day, workout_type, distance_km, target_pace,
                    description, completed, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, FALSE, ?9)
                "#,
                params![
                    stored_workout.id,
                    stored_workout.plan_id,
                    stored_workout.athlete_id,
                    stored_workout.day,
                    stored_workout.workout_type.as_str(),
                    stored_workout.distance_km,
                    stored_workout.target_pace,
                    stored_workout.description,
                    stored_workout.created_at,
                ],
            )
            .during("insert workout")?;
            stored.push(stored_workout);
        }

        tx.commit().during("commit plan")?;
        debug!(
            athlete_id = %header.athlete_id,
            week = header.week,
            workouts = stored.len(),
            "plan committed"
        );

        Ok(WeeklyPlan {
            id: plan_id,
            athlete_id: header.athlete_id.clone(),
            week: header.week,
            phase: header.phase,
            phase_description: header.phase_description.clone(),
            total_volume_km: header.total_volume_km,
            created_at: now,
            workouts: stored,
        })
    }

    fn find_plan(&self, athlete_id: &str, week: u32) -> Result<Option<WeeklyPlan>> {
        let plan = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM training_plans WHERE athlete_id = ?1 AND week = ?2",
                    PLAN_COLUMNS
                ),
                params![athlete_id, week],
                plan_from_row,
            )
            .optional()
            .during("find plan")?;

        match plan {
            Some(plan) => Ok(Some(self.with_workouts(plan).during("load plan workouts")?)),
            None => Ok(None),
        }
    }

    fn list_plans(&self, athlete_id: &str) -> Result<Vec<WeeklyPlan>> {
        let headers = {
            let mut stmt = self
                .conn
                .prepare(&format!(
                    "SELECT {} FROM training_plans WHERE athlete_id = ?1 ORDER BY week",
                    PLAN_COLUMNS
                ))
                .during("list plans")?;
            let headers = stmt
                .query_map(params![athlete_id], plan_from_row)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .during("list plans")?;
            headers
        };

        headers
            .into_iter()
            .map(|plan| self.with_workouts(plan).during("load plan workouts"))
            .collect()
    }

    fn append_feedback_and_update_factor(
        &mut self,
        feedback: &NewFeedback,
        new_factor: f64,
    ) -> Result<FeedbackRecord> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .during("begin feedback transaction")?;

        let updated = tx
            .execute(
                "UPDATE athletes SET performance_factor = ?1 WHERE id = ?2",
                params![new_factor, feedback.athlete_id],
            )
            .during("update performance factor")?;
        if updated == 0 {
            return Err(CoachError::not_found("Athlete", feedback.athlete_id.as_str()));
        }

        let record = FeedbackRecord {
            id: Uuid::new_v4().to_string(),
            athlete_id: feedback.athlete_id.clone(),
            week: feedback.week,
            consistency: feedback.consistency,
            mean_effort: feedback.mean_effort,
            mean_heart_rate: feedback.mean_heart_rate,
            notes: feedback.notes.clone(),
            created_at: Utc::now(),
        };
        tx.execute(
            &format!("INSERT INTO feedback ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)", FEEDBACK_COLUMNS),
            params![
                record.id,
                record.athlete_id,
                record.week,
                record.consistency,
                record.mean_effort,
                record.mean_heart_rate,
                record.notes,
                record.created_at,
            ],
        )
        .during("insert feedback")?;

        tx.commit().during("commit feedback")?;
        debug!(athlete_id = %record.athlete_id, week = record.week, new_factor, "feedback committed");
        Ok(record)
    }

    fn list_feedback(&self, athlete_id: &str) -> Result<Vec<FeedbackRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM feedback WHERE athlete_id = ?1 ORDER BY week ASC, rowid ASC",
                FEEDBACK_COLUMNS
            ))
            .during("list feedback")?;
        let records = stmt
            .query_map(params![athlete_id], feedback_from_row)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .during("list feedback")?;
        Ok(records)
    }

    fn add_exam(&mut self, exam: &NewExam) -> Result<ExamRecord> {
        // Existence check keeps the error a NotFound instead of a constraint failure
        self.get_athlete(&exam.athlete_id)?;

        let record = ExamRecord {
            id: Uuid::new_v4().to_string(),
            athlete_id: exam.athlete_id.clone(),
            result: exam.result,
            exam_date: exam.exam_date,
            created_at: Utc::now(),
        };
        let payload = serde_json::to_value(record.result)?;

        self.conn
            .execute(
                &format!("INSERT INTO exams ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)", EXAM_COLUMNS),
                params![
                    record.id,
                    record.athlete_id,
                    record.exam_type().as_str(),
                    payload,
                    record.exam_date,
                    record.created_at,
                ],
            )
            .during("insert exam")?;

        debug!(athlete_id = %record.athlete_id, exam_type = %record.exam_type(), "exam stored");
        Ok(record)
    }

    fn list_exams(&self, athlete_id: &str) -> Result<Vec<ExamRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM exams WHERE athlete_id = ?1 \
                 ORDER BY exam_date DESC, created_at DESC, rowid DESC",
                EXAM_COLUMNS
            ))
            .during("list exams")?;
        let rows = stmt
            .query_map(params![athlete_id], StoredExam::from_row)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .during("list exams")?;
        rows.into_iter().map(StoredExam::into_record).collect()
    }

    fn latest_exam(&self, athlete_id: &str, exam_type: ExamType) -> Result<Option<ExamRecord>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM exams WHERE athlete_id = ?1 AND exam_type = ?2 \
                     ORDER BY exam_date DESC, created_at DESC, rowid DESC LIMIT 1",
                    EXAM_COLUMNS
                ),
                params![athlete_id, exam_type.as_str()],
                StoredExam::from_row,
            )
            .optional()
            .during("load latest exam")?
            .map(StoredExam::into_record)
            .transpose()
    }

    fn mark_workout_complete(&mut self, workout_id: &str, metrics: &WorkoutMetrics) -> Result<Workout> {
        metrics.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .during("begin completion transaction")?;

        let workout = Self::load_workout(&tx, workout_id)
            .during("load workout")?
            .ok_or_else(|| CoachError::not_found("Workout", workout_id))?;
        if workout.completed {
            return Err(CoachError::invalid(
                "workout_id",
                workout_id,
                "workout is already completed",
            ));
        }

        tx.execute(
            r#"
            UPDATE workouts
            SET completed = TRUE, perceived_effort = ?1, avg_heart_rate = ?2,
                time_minutes = ?3, completed_at = ?4
            WHERE id = ?5
            "#,
            params![
                metrics.perceived_effort,
                metrics.avg_heart_rate,
                metrics.time_minutes,
                Utc::now(),
                workout_id,
            ],
        )
        .during("complete workout")?;

        let completed = Self::load_workout(&tx, workout_id)
            .during("reload workout")?
            .ok_or_else(|| CoachError::not_found("Workout", workout_id))?;
        tx.commit().during("commit completion")?;

        debug!(workout_id, "workout completed");
        Ok(completed)
    }
}

fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Parse a text column through the model's `FromStr`
fn text_column<T>(row: &Row, column: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = CoachError>,
{
    let raw: String = row.get(column)?;
    raw.parse().map_err(|e: CoachError| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
    })
}

fn athlete_from_row(row: &Row) -> rusqlite::Result<AthleteProfile> {
    Ok(AthleteProfile {
        id: row.get("id")?,
        age: row.get("age")?,
        weight_kg: row.get("weight_kg")?,
        sex: text_column(row, "sex")?,
        level: text_column(row, "level")?,
        goal: TimedDistance::new(row.get("goal_distance_km")?, row.get("goal_time_minutes")?),
        plan_weeks: row.get("plan_weeks")?,
        days_per_week: row.get("days_per_week")?,
        baseline: BaselineTrial {
            result: TimedDistance::new(
                row.get("trial_distance_km")?,
                row.get("trial_time_minutes")?,
            ),
            avg_heart_rate: row.get("trial_avg_heart_rate")?,
            perceived_effort: row.get("trial_perceived_effort")?,
        },
        three_km_time_minutes: row.get("three_km_time_minutes")?,
        performance_factor: row.get("performance_factor")?,
        created_at: row.get("created_at")?,
    })
}

fn plan_from_row(row: &Row) -> rusqlite::Result<WeeklyPlan> {
    Ok(WeeklyPlan {
        id: row.get("id")?,
        athlete_id: row.get("athlete_id")?,
        week: row.get("week")?,
        phase: text_column(row, "phase")?,
        phase_description: row.get("phase_description")?,
        total_volume_km: row.get("total_volume_km")?,
        created_at: row.get("created_at")?,
        workouts: Vec::new(), // loaded separately
    })
}

fn workout_from_row(row: &Row) -> rusqlite::Result<Workout> {
    Ok(Workout {
        id: row.get("id")?,
        plan_id: row.get("plan_id")?,
        athlete_id: row.get("athlete_id")?,
        day: row.get("day")?,
        workout_type: text_column(row, "workout_type")?,
        distance_km: row.get("distance_km")?,
        target_pace: row.get("target_pace")?,
        description: row.get("description")?,
        completed: row.get("completed")?,
        metrics: WorkoutMetrics {
            perceived_effort: row.get("perceived_effort")?,
            avg_heart_rate: row.get("avg_heart_rate")?,
            time_minutes: row.get("time_minutes")?,
        },
        created_at: row.get("created_at")?,
        completed_at: row.get("completed_at")?,
    })
}

fn feedback_from_row(row: &Row) -> rusqlite::Result<FeedbackRecord> {
    Ok(FeedbackRecord {
        id: row.get("id")?,
        athlete_id: row.get("athlete_id")?,
        week: row.get("week")?,
        consistency: row.get("consistency")?,
        mean_effort: row.get("mean_effort")?,
        mean_heart_rate: row.get("mean_heart_rate")?,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
    })
}

/// Exam row as stored, with the payload still undecoded
struct StoredExam {
    id: String,
    athlete_id: String,
    payload: serde_json::Value,
    exam_date: NaiveDate,
    created_at: DateTime<Utc>,
}

impl StoredExam {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            athlete_id: row.get("athlete_id")?,
            payload: row.get("payload")?,
            exam_date: row.get("exam_date")?,
            created_at: row.get("created_at")?,
        })
    }

    /// A payload that no longer matches its exam type is a `Serialization` error
    fn into_record(self) -> Result<ExamRecord> {
        Ok(ExamRecord {
            id: self.id,
            athlete_id: self.athlete_id,
            result: serde_json::from_value(self.payload)?,
            exam_date: self.exam_date,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ExamResult, ExperienceLevel, Phase, Sex, Vo2maxTest, WorkoutType,
    };
    use chrono::NaiveDate;

    fn new_athlete() -> NewAthlete {
        NewAthlete {
            age: 35,
            weight_kg: 68.0,
            sex: Sex::Female,
            level: ExperienceLevel::Beginner,
            goal: TimedDistance::new(10.0, 60.0),
            plan_weeks: 8,
            days_per_week: 3,
            baseline: BaselineTrial {
                result: TimedDistance::new(5.0, 30.0),
                avg_heart_rate: 170.0,
                perceived_effort: 7,
            },
            three_km_time_minutes: Some(17.0),
        }
    }

    fn header(athlete_id: &str, week: u32) -> NewPlan {
        NewPlan {
            athlete_id: athlete_id.to_string(),
            week,
            phase: Phase::Base,
            phase_description: "Aerobic base development".to_string(),
            total_volume_km: 16.1,
        }
    }

    fn workout(day: u32, workout_type: WorkoutType, distance_km: f64) -> NewWorkout {
        NewWorkout {
            day,
            workout_type,
            distance_km,
            target_pace: 6.5,
            description: "test".to_string(),
        }
    }

    #[test]
    fn test_athlete_round_trip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let created = store.create_athlete(&new_athlete()).unwrap();

        let loaded = store.get_athlete(&created.id).unwrap();
        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.level, ExperienceLevel::Beginner);
        assert_eq!(loaded.three_km_time_minutes, Some(17.0));
        assert_eq!(loaded.performance_factor, DEFAULT_PERFORMANCE_FACTOR);
    }

    #[test]
    fn test_missing_athlete_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.get_athlete("nobody"),
            Err(CoachError::NotFound { .. })
        ));
    }

    #[test]
    fn test_plan_key_is_unique() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let athlete = store.create_athlete(&new_athlete()).unwrap();
        let workouts = vec![workout(1, WorkoutType::Long, 5.6), workout(2, WorkoutType::Recovery, 3.0)];

        let plan = store.create_plan_atomic(&header(&athlete.id, 1), &workouts).unwrap();
        assert_eq!(plan.workouts.len(), 2);

        let err = store
            .create_plan_atomic(&header(&athlete.id, 1), &workouts)
            .unwrap_err();
        assert!(matches!(err, CoachError::AlreadyExists { week: 1, .. }));

        let found = store.find_plan(&athlete.id, 1).unwrap().unwrap();
        assert_eq!(found.id, plan.id);
        assert_eq!(found.workouts.len(), 2);
    }

    #[test]
    fn test_failed_workout_insert_leaves_no_header() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let athlete = store.create_athlete(&new_athlete()).unwrap();
        // second row violates the distance floor constraint
        let workouts = vec![workout(1, WorkoutType::Long, 5.6), workout(2, WorkoutType::Easy, 1.0)];

        let err = store
            .create_plan_atomic(&header(&athlete.id, 2), &workouts)
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(store.find_plan(&athlete.id, 2).unwrap().is_none());
        assert!(store.list_plans(&athlete.id).unwrap().is_empty());
    }

    #[test]
    fn test_feedback_for_missing_athlete_is_rolled_back() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let feedback = NewFeedback {
            athlete_id: "ghost".to_string(),
            week: 1,
            consistency: 3,
            mean_effort: 5.0,
            mean_heart_rate: None,
            notes: None,
        };

        let err = store.append_feedback_and_update_factor(&feedback, 1.1).unwrap_err();
        assert!(matches!(err, CoachError::NotFound { .. }));
        assert!(store.list_feedback("ghost").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_feedback_is_kept_in_order() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let athlete = store.create_athlete(&new_athlete()).unwrap();
        for (week, effort) in [(2, 5.0), (1, 4.0), (2, 7.0)] {
            let feedback = NewFeedback {
                athlete_id: athlete.id.clone(),
                week,
                consistency: 3,
                mean_effort: effort,
                mean_heart_rate: Some(150.0),
                notes: Some("ok".to_string()),
            };
            store.append_feedback_and_update_factor(&feedback, 1.05).unwrap();
        }

        let history = store.list_feedback(&athlete.id).unwrap();
        let efforts: Vec<f64> = history.iter().map(|f| f.mean_effort).collect();
        assert_eq!(efforts, vec![4.0, 5.0, 7.0]);
        assert_eq!(store.get_athlete(&athlete.id).unwrap().performance_factor, 1.05);
    }

    #[test]
    fn test_latest_exam_prefers_newest_exam_date() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let athlete = store.create_athlete(&new_athlete()).unwrap();
        for (day, vo2max) in [(10, 48.0), (20, 51.0), (5, 40.0)] {
            store
                .add_exam(&NewExam {
                    athlete_id: athlete.id.clone(),
                    result: ExamResult::Vo2max(Vo2maxTest {
                        vo2max: Some(vo2max),
                        ..Default::default()
                    }),
                    exam_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
                })
                .unwrap();
        }

        let latest = store
            .latest_exam(&athlete.id, ExamType::Vo2max)
            .unwrap()
            .unwrap();
        assert_eq!(latest.exam_date, NaiveDate::from_ymd_opt(2024, 3, 20).unwrap());
        assert!(store
            .latest_exam(&athlete.id, ExamType::LungFunction)
            .unwrap()
            .is_none());
        assert_eq!(store.list_exams(&athlete.id).unwrap().len(), 3);
    }

    #[test]
    fn test_corrupt_exam_payload_is_not_retryable() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let athlete = store.create_athlete(&new_athlete()).unwrap();
        let record = store
            .add_exam(&NewExam {
                athlete_id: athlete.id.clone(),
                result: ExamResult::Vo2max(Vo2maxTest {
                    vo2max: Some(52.0),
                    ..Default::default()
                }),
                exam_date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            })
            .unwrap();
        store
            .conn
            .execute(
                "UPDATE exams SET payload = ?1 WHERE id = ?2",
                params![r#"{"exam_type":"vo2max","vo2max":"very high"}"#, record.id],
            )
            .unwrap();

        let err = store.latest_exam(&athlete.id, ExamType::Vo2max).unwrap_err();
        assert!(matches!(err, CoachError::Serialization(_)));
        assert!(!err.is_retryable());
        assert!(matches!(
            store.list_exams(&athlete.id).unwrap_err(),
            CoachError::Serialization(_)
        ));
    }

    #[test]
    fn test_workout_completes_once() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let athlete = store.create_athlete(&new_athlete()).unwrap();
        let plan = store
            .create_plan_atomic(&header(&athlete.id, 1), &[workout(1, WorkoutType::Long, 5.6)])
            .unwrap();
        let workout_id = plan.workouts[0].id.clone();

        let metrics = WorkoutMetrics {
            perceived_effort: Some(6),
            avg_heart_rate: Some(152.0),
            time_minutes: Some(38.5),
        };
        let completed = store.mark_workout_complete(&workout_id, &metrics).unwrap();
        assert!(completed.completed);
        assert!(completed.completed_at.is_some());
        assert_eq!(completed.metrics, metrics);

        let err = store
            .mark_workout_complete(&workout_id, &WorkoutMetrics::default())
            .unwrap_err();
        assert!(matches!(err, CoachError::InvalidInput { .. }));
        let reloaded = store.find_plan(&athlete.id, 1).unwrap().unwrap();
        assert_eq!(reloaded.workouts[0].metrics, metrics);
    }
}
