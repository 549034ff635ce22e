use crate::schedule::types::{AppointmentStatus, Conflict};

/// Faults raised by a storage backend
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode or decode CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("stored row for {id} is unreadable: {reason}")]
    CorruptRow { id: String, reason: String },
    #[error("appointment {0} already exists")]
    DuplicateId(String),
    #[error("appointment {0} does not exist in storage")]
    MissingId(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Outcomes of a scheduling operation that the caller is expected to handle
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("invalid appointment: {0}")]
    Validation(String),
    #[error("shift overlaps {} existing appointment(s)", .0.len())]
    Conflict(Vec<Conflict>),
    #[error("cannot change status from {from} to {to}")]
    InvalidStateTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    #[error("not authorized: {0}")]
    Authorization(String),
    #[error("appointment {0} not found")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(#[from] StorageError),
}

impl SchedulingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        SchedulingError::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        SchedulingError::Authorization(msg.into())
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulingError::Validation(_) => "validation_error",
            SchedulingError::Conflict(_) => "conflict_error",
            SchedulingError::InvalidStateTransition { .. } => "invalid_state_transition",
            SchedulingError::Authorization(_) => "authorization_error",
            SchedulingError::NotFound(_) => "not_found",
            SchedulingError::Internal(_) => "internal_error",
        }
    }
}

pub type SchedulingResult<T> = std::result::Result<T, SchedulingError>;
pub type StorageResult<T> = std::result::Result<T, StorageError>;
