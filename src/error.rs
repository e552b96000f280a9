use thiserror::Error;

use crate::api::ApiError;
use crate::time_range::TimeRangeError;

pub type Result<T> = std::result::Result<T, LoggingMcpError>;

#[derive(Debug, Error)]
pub enum LoggingMcpError {
    #[error("config error: {0}")]
    Config(String),

    #[error("regex error: {pattern} - {reason}")]
    Regex { pattern: String, reason: String },

    #[error(transparent)]
    TimeRange(#[from] TimeRangeError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
