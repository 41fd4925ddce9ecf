//! Error taxonomy shared by the analytics components

use thiserror::Error;

/// Errors produced while computing analytics for a tick or loading static data
///
/// Degraded conditions (an out-of-range time step, an implausible position
/// jump, an empty track path) are not errors: components skip the update and
/// carry on.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Reference data required for a computation is missing
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// A snapshot field is malformed (non-finite, out of range)
    #[error("invalid input: {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// Reading a backing record failed
    #[error("i/o error reading {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// A backing record exists but could not be parsed
    #[error("failed to parse {key}: {reason}")]
    Parse { key: String, reason: String },
}

impl AnalyticsError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// Short machine-readable kind, used in frame issues
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataUnavailable(_) => "data_unavailable",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Io { .. } => "io",
            Self::Parse { .. } => "parse",
        }
    }
}

pub type Result<T, E = AnalyticsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalyticsError::invalid("brake", "2.0 is outside [0, 1]");
        assert_eq!(err.to_string(), "invalid input: brake: 2.0 is outside [0, 1]");
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn test_data_unavailable_kind() {
        let err = AnalyticsError::DataUnavailable("reference lap for monza".into());
        assert_eq!(err.kind(), "data_unavailable");
        assert!(err.to_string().contains("monza"));
    }
}
