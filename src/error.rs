use thiserror::Error;

/// Errors that abort an evaluation run.
///
/// Every variant is fatal for the current run; there is no partial-success
/// mode and nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// Required setting missing or invalid at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller supplied an unusable request (e.g. neither table nor currency).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Not enough rows after the start boundary to label a full day.
    #[error("Insufficient history: {rows} rows available, at least {required} required (start must precede the latest data by more than one day)")]
    InsufficientHistory { rows: usize, required: usize },

    /// The model endpoint answered with a non-success status or an unusable body.
    #[error("Prediction service error: {status} - {reason}")]
    PredictionService { status: u16, reason: String },

    /// Lag lookups or series joins could not be aligned on timestamps.
    #[error("Data alignment error: {0}")]
    DataAlignment(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<sqlx::Error> for EvaluationError {
    fn from(err: sqlx::Error) -> Self {
        EvaluationError::DataSource(err.to_string())
    }
}

impl From<std::io::Error> for EvaluationError {
    fn from(err: std::io::Error) -> Self {
        EvaluationError::DataSource(err.to_string())
    }
}

impl From<csv::Error> for EvaluationError {
    fn from(err: csv::Error) -> Self {
        EvaluationError::DataSource(err.to_string())
    }
}

pub type EvalResult<T> = Result<T, EvaluationError>;
