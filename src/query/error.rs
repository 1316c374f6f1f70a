use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised while analyzing a parsed query
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("Invalid where expression: {0}")]
    InvalidWhereExpression(String),
    #[error("Invalid use of function {0} in a time expression")]
    InvalidFunctionInTimeContext(String),
    #[error("{0} isn't a valid time string")]
    InvalidTimeString(String),
    #[error("Cannot use '{0}' in a time expression")]
    InvalidTimeOperator(String),
    #[error("Invalid where clause, time must appear twice to specify start and end time")]
    ConflictingOrTimeBounds,
    #[error("Invalid time condition: {0}")]
    InvalidTimeCondition(String),
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
    #[error("Start time {start} is after end time {end}")]
    InvertedTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl QueryError {
    /// Short, stable name of the error kind, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidWhereExpression(_) => "invalid_where_expression",
            Self::InvalidFunctionInTimeContext(_) => "invalid_function_in_time_context",
            Self::InvalidTimeString(_) => "invalid_time_string",
            Self::InvalidTimeOperator(_) => "invalid_time_operator",
            Self::ConflictingOrTimeBounds => "conflicting_or_time_bounds",
            Self::InvalidTimeCondition(_) => "invalid_time_condition",
            Self::InvalidDuration(_) => "invalid_duration",
            Self::InvertedTimeRange { .. } => "inverted_time_range",
        }
    }
}

/// Result type for query analysis operations
pub type QueryResult<T> = Result<T, QueryError>;
