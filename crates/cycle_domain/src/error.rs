use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CycleError {
    #[error("day range needs at least one day, got {0}")]
    InvalidDuration(i64),

    #[error("cycle ends on {end} before it starts on {start}")]
    InvalidInterval { start: NaiveDate, end: NaiveDate },

    #[error("no dates selected")]
    EmptySelection,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),
}

/// Failure reported by the persistence collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("cycle storage unavailable: {0}")]
    Unavailable(String),

    #[error("cycle storage rejected the request: {0}")]
    Rejected(String),
}

/// Failure reported by (or on the way to) the predictor collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PredictionError {
    #[error("prediction needs at least two recorded cycles, have {have}")]
    InsufficientHistory { have: usize },

    #[error("malformed prediction: {0}")]
    Malformed(String),

    #[error("predictor declined: {0}")]
    Rejected(String),

    #[error("predictor unavailable: {0}")]
    Unavailable(String),
}

impl CycleError {
    /// Errors the user should never see as a failure, only as "nothing happened".
    pub fn is_noop(&self) -> bool {
        matches!(self, CycleError::EmptySelection)
    }
}
