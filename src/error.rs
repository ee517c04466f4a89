//! Unified error hierarchy for RunCoach
//!
//! Every planning operation reports failures through [`CoachError`]. Business
//! rule violations carry the offending field and value so callers can build
//! a user-facing message without re-deriving context.

use thiserror::Error;

/// Top-level error type for all RunCoach operations
#[derive(Debug, Error)]
pub enum CoachError {
    /// Malformed or out-of-range input
    #[error("Invalid {field}={value}: {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// Referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A plan already exists for this (athlete, week) pair
    #[error("Plan already exists for athlete {athlete_id}, week {week}")]
    AlreadyExists { athlete_id: String, week: u32 },

    /// An atomic write could not commit
    #[error("Persistence failure during {operation}: {source}")]
    PersistenceFailure {
        operation: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Stored payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for RunCoach operations
pub type Result<T> = std::result::Result<T, CoachError>;

impl CoachError {
    pub fn invalid(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        CoachError::InvalidInput {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoachError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn persistence(operation: impl Into<String>, source: rusqlite::Error) -> Self {
        CoachError::PersistenceFailure {
            operation: operation.into(),
            source,
        }
    }

    /// Check if error is retryable. Callers retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoachError::PersistenceFailure { .. })
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoachError::AlreadyExists { .. } => ErrorSeverity::Info,
            CoachError::InvalidInput { .. } | CoachError::NotFound { .. } => {
                ErrorSeverity::Warning
            }
            CoachError::PersistenceFailure { .. } => ErrorSeverity::Error,
            CoachError::Serialization(_) => ErrorSeverity::Critical,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            CoachError::InvalidInput { field, value, reason } => {
                format!("The value '{}' for {} is not accepted: {}", value, field, reason)
            }
            CoachError::NotFound { entity, id } => {
                format!("Could not find {} with id {}", entity.to_lowercase(), id)
            }
            CoachError::AlreadyExists { week, .. } => {
                format!("A plan for week {} has already been generated", week)
            }
            CoachError::PersistenceFailure { .. } => {
                "Unable to save your changes. Please try again.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Stored data is unreadable
    Critical,
    /// Operation failed but the system can continue
    Error,
    /// Rejected input
    Warning,
    /// Expected outcome reported through the error channel
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
