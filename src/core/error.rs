use thiserror::Error;

#[derive(Error, Debug)]
pub enum RollupError {
    #[error("Invalid pattern regexp {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown aggregation function {0:?}")]
    UnknownAggregation(String),

    #[error("Invalid retention in pattern {pattern:?}: {message}")]
    InvalidRetention { pattern: String, message: String },

    #[error("Rollup retention not found for metric {0:?}")]
    RetentionNotFound(String),

    #[error("Rollup function not found for metric {0:?}")]
    AggregationNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for rollup operations
pub type Result<T> = std::result::Result<T, RollupError>;

impl RollupError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new retention error for the pattern identified by `pattern`
    pub fn invalid_retention<P: Into<String>, S: Into<String>>(pattern: P, msg: S) -> Self {
        Self::InvalidRetention {
            pattern: pattern.into(),
            message: msg.into(),
        }
    }

    /// Returns true for errors raised while compiling a rule set.
    ///
    /// A rule set that failed with one of these must be discarded as a whole.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPattern { .. } | Self::UnknownAggregation(_) | Self::InvalidRetention { .. }
        )
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidPattern { .. } | Self::UnknownAggregation(_) | Self::InvalidRetention { .. } => {
                "compile"
            },
            Self::RetentionNotFound(_) | Self::AggregationNotFound(_) => "resolve",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RollupError::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");
        assert_eq!(err.category(), "config");
        assert!(!err.is_compile_error());
    }

    #[test]
    fn test_compile_errors() {
        let err = RollupError::UnknownAggregation("median".to_string());
        assert_eq!(err.to_string(), "Unknown aggregation function \"median\"");
        assert!(err.is_compile_error());

        let err = RollupError::invalid_retention("^a", "precision must be greater than 0");
        assert_eq!(err.category(), "compile");
    }

    #[test]
    fn test_resolve_errors() {
        let err = RollupError::RetentionNotFound("a.b.c".to_string());
        assert_eq!(err.to_string(), "Rollup retention not found for metric \"a.b.c\"");
        assert_eq!(err.category(), "resolve");
        assert!(!err.is_compile_error());
    }
}
