use thiserror::Error;

/// Error types surfaced by the simulator.
///
/// Programming errors (violated book invariants, sequence regressions) are
/// not represented here: those panic and abort the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Scenario name does not map to a known configuration
    #[error("unknown scenario '{name}' (expected one of: calm, thin, spike)")]
    UnknownScenario { name: String },

    /// Configuration failed validation
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Event log read/write failure. Fatal: determinism requires a complete log
    #[error("event log I/O error: {message}")]
    LogIo { message: String },

    /// General file I/O failure outside the event log
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization/deserialization failure
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// Internal error indicating a broken assumption
    #[error("internal error: {details}")]
    Internal { details: String },
}

/// Result type alias for simulator operations
pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    /// Create a configuration validation error
    pub fn invalid_config<S: Into<String>>(reason: S) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an event log I/O error
    pub fn log_io<S: Into<String>>(message: S) -> Self {
        Self::LogIo {
            message: message.into(),
        }
    }

    /// Create an internal error with details
    pub fn internal<S: Into<String>>(details: S) -> Self {
        Self::Internal {
            details: details.into(),
        }
    }

    /// Check whether the caller may keep going after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::UnknownScenario { .. } => false,
            Self::InvalidConfig { .. } => false,
            Self::LogIo { .. } => false,
            Self::Io { .. } => true,
            Self::Serialization { .. } => false,
            Self::Internal { .. } => false,
        }
    }

    /// Get error severity level for logging
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnknownScenario { .. } => ErrorSeverity::Error,
            Self::InvalidConfig { .. } => ErrorSeverity::Error,
            Self::LogIo { .. } => ErrorSeverity::Critical,
            Self::Io { .. } => ErrorSeverity::Warning,
            Self::Serialization { .. } => ErrorSeverity::Error,
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }
}

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
            Self::Critical => tracing::Level::ERROR,
        }
    }
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SimError {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidConfig {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::UnknownScenario {
            name: "storm".to_string(),
        };
        assert!(err.to_string().contains("unknown scenario 'storm'"));
        assert!(!err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_error_helpers() {
        let err = SimError::invalid_config("seed missing");
        assert_eq!(err.to_string(), "invalid configuration: seed missing");

        let err = SimError::log_io("disk full");
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_conversions() {
        let json_err = serde_json::from_str::<i32>("not json").unwrap_err();
        let sim_err: SimError = json_err.into();
        assert!(matches!(sim_err, SimError::Serialization { .. }));

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let sim_err: SimError = io_err.into();
        assert!(matches!(sim_err, SimError::Io { .. }));
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(
            ErrorSeverity::Warning.to_tracing_level(),
            tracing::Level::WARN
        );
        assert_eq!(
            ErrorSeverity::Critical.to_tracing_level(),
            tracing::Level::ERROR
        );
    }
}
