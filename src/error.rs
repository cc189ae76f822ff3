use thiserror::Error;

use crate::dependencies::DependencyPreview;
use crate::persistence::PersistenceError;
use crate::recurrence::RecurrenceError;

/// Failure of a timetable operation.
///
/// Callers branch on the variant: validation and conflicts are user-fixable,
/// a blocked delete carries the records that would be removed, and not-found
/// is returned identically for missing ids and ids owned by another user.
#[derive(Debug, Error)]
pub enum TimetableError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("{message}")]
    Conflict { message: String },
    #[error(
        "slot {} has {} lesson(s), {} entry and {} activity depending on it",
        .0.slot_id, .0.lessons_count, .0.entries_count, .0.activities_count
    )]
    DeleteBlocked(Box<DependencyPreview>),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),
    #[error(transparent)]
    Persistence(PersistenceError),
}

pub type TimetableResult<T> = Result<T, TimetableError>;

impl TimetableError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        TimetableError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        TimetableError::Conflict {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        TimetableError::NotFound { entity, id }
    }

    /// The offending field of a validation error.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            TimetableError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Stable machine-readable kind, used as the `error` key of API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            TimetableError::Validation { .. } => "invalid_request",
            TimetableError::Recurrence(_) => "invalid_request",
            TimetableError::Conflict { .. } => "conflict",
            TimetableError::DeleteBlocked(_) => "has_dependencies",
            TimetableError::NotFound { .. } => "not_found",
            TimetableError::Persistence(_) => "internal_error",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, TimetableError::Conflict { .. })
    }
}

impl From<PersistenceError> for TimetableError {
    fn from(value: PersistenceError) -> Self {
        match value {
            PersistenceError::UniqueViolation(message) => TimetableError::Conflict { message },
            other => TimetableError::Persistence(other),
        }
    }
}

impl From<rusqlite::Error> for TimetableError {
    fn from(value: rusqlite::Error) -> Self {
        PersistenceError::from(value).into()
    }
}
