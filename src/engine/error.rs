//! Error types for the forecasting engine.
//!
//! Domain failures are typed so callers can distinguish "not enough data"
//! from an internal error; infrastructure failures from the storage layer
//! arrive wrapped as `Storage`.

use chrono::NaiveDate;
use thiserror::Error;

/// Typed failure taxonomy for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The input series is too short for the requested computation.
    #[error("insufficient data: {actual} point(s) supplied, {required} required")]
    InsufficientData { required: usize, actual: usize },

    /// The model id does not exist in the registry.
    #[error("unknown model id {0}")]
    UnknownModel(u32),

    /// The forecast id does not exist in the store.
    #[error("unknown forecast id {0}")]
    UnknownForecast(i64),

    /// An outcome is already recorded for this forecast and date.
    #[error("outcome already recorded for forecast {forecast_id} on {date}")]
    DuplicateOutcome { forecast_id: i64, date: NaiveDate },

    /// The outcome date is not among the forecast's predicted dates.
    #[error("date {date} was not predicted by forecast {forecast_id}")]
    DateNotPredicted { forecast_id: i64, date: NaiveDate },

    /// A denominator collapsed to zero where no sentinel applies.
    #[error("division by zero: {0}")]
    DivisionByZero(&'static str),

    /// A scheduled task body failed; caught at the per-task boundary.
    #[error("task execution failed: {0}")]
    TaskExecutionFailure(String),

    /// Failure in the persistence layer.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Result type with the engine error.
pub type Result<T> = std::result::Result<T, EngineError>;
