//! Error type for the pipeline services
//!
//! Row-level problems (validation drops, store constraint rejections, skipped
//! fetch units) never surface here: they are recovered inside a stage and
//! counted in its report. This type carries the whole-call failures.

use thiserror::Error;

use crate::data::{DataError, SqliteError};

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing or unusable site assumptions; fatal for the whole call
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Forecast rejected before touching the store
    #[error("Invalid forecast: {field}: {reason}")]
    InvalidForecast { field: &'static str, reason: String },

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Store unavailable or failing outside of row constraints
    #[error(transparent)]
    Data(#[from] DataError),
}

impl PipelineError {
    pub fn missing_site(site: &str) -> Self {
        Self::Configuration(format!("no site assumptions configured for '{}'", site))
    }

    pub fn invalid_forecast(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidForecast {
            field,
            reason: reason.into(),
        }
    }

    /// True when retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Data(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<SqliteError> for PipelineError {
    fn from(e: SqliteError) -> Self {
        Self::Data(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            PipelineError::missing_site("S9").to_string(),
            "Configuration error: no site assumptions configured for 'S9'"
        );
        assert_eq!(
            PipelineError::invalid_forecast("horizon", "49 is outside [1, 48]").to_string(),
            "Invalid forecast: horizon: 49 is outside [1, 48]"
        );
    }

    #[test]
    fn test_from_sqlite_error() {
        let err: PipelineError = SqliteError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, PipelineError::Data(DataError::Sqlite(_))));
        assert!(err.is_transient());
        assert!(!PipelineError::InvalidArgument("hours".into()).is_transient());
    }
}
