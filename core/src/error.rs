//! Error handling for entity resolution and progress computation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for progress operations
pub type Result<T> = std::result::Result<T, ProgressError>;

/// Errors raised while resolving entities and computing progress.
///
/// Only host contract violations (an enumerated state or unit the resolver
/// does not know) and I/O failures are surfaced as errors. Recoverable
/// conditions such as a missing entity or a degenerate range are reported
/// through validity flags and [`ConfigMessage`]s instead.
#[derive(Error, Debug)]
pub enum ProgressError {
    /// Timer entity reported a state outside idle/active/paused
    #[error("Unknown timer state '{state}' for {entity}")]
    UnknownTimerState { entity: String, state: String },

    /// Duration entity reported a unit missing from the conversion table
    #[error("Unknown duration unit '{unit}'")]
    UnknownDurationUnit { unit: String },

    /// Timer timestamp or clock string could not be parsed
    #[error("Invalid timestamp for {entity}: {reason}")]
    InvalidTimestamp { entity: String, reason: String },

    /// Custom theme table failed validation
    #[error("Invalid custom theme at entry {index}: {reason}")]
    InvalidTheme { index: usize, reason: String },

    /// Configuration value rejected
    #[error("Invalid configuration: {field} - {reason}")]
    Config { field: String, reason: String },

    /// Configuration or snapshot file could not be parsed
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what failed to parse
        message: String,
        /// Optional source error for chaining
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O error while reading or writing files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProgressError {
    /// Create an unknown timer state error
    pub fn unknown_timer_state(entity: impl Into<String>, state: impl Into<String>) -> Self {
        Self::UnknownTimerState {
            entity: entity.into(),
            state: state.into(),
        }
    }

    /// Create an unknown duration unit error
    pub fn unknown_duration_unit(unit: impl Into<String>) -> Self {
        Self::UnknownDurationUnit { unit: unit.into() }
    }

    /// Create an invalid timestamp error
    pub fn invalid_timestamp(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid theme error
    pub fn invalid_theme(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidTheme {
            index,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a parse error with a simple message
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a parse error with a source error
    pub fn parse_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Check if the card can keep refreshing after this error.
    ///
    /// Classification errors point at a host contract violation and stay
    /// fatal for the entity until its state changes.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ProgressError::UnknownTimerState { .. } => false,
            ProgressError::UnknownDurationUnit { .. } => false,
            ProgressError::InvalidTimestamp { .. } => true,
            ProgressError::InvalidTheme { .. } => true,
            ProgressError::Config { .. } => true,
            ProgressError::Parse { .. } => false,
            ProgressError::Io(_) => true,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ProgressError::UnknownTimerState { .. } => "classification",
            ProgressError::UnknownDurationUnit { .. } => "classification",
            ProgressError::InvalidTimestamp { .. } => "timer",
            ProgressError::InvalidTheme { .. } => "theme",
            ProgressError::Config { .. } => "config",
            ProgressError::Parse { .. } => "parse",
            ProgressError::Io(_) => "io",
        }
    }
}

/// Severity attached to a configuration message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational hint
    Info,
    /// Card keeps working with a fallback
    Warning,
    /// Card shows the not-available state
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Structured message for recoverable configuration problems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMessage {
    pub content: String,
    pub severity: Severity,
}

impl ConfigMessage {
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            severity: Severity::Warning,
        }
    }

    pub fn info(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            severity: Severity::Info,
        }
    }

    /// True when the card cannot render a value because of this message
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ConfigMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = ProgressError::unknown_timer_state("timer.tea", "running");
        assert!(matches!(err, ProgressError::UnknownTimerState { .. }));
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "classification");
        assert_eq!(err.to_string(), "Unknown timer state 'running' for timer.tea");

        let err = ProgressError::unknown_duration_unit("x");
        assert_eq!(err.to_string(), "Unknown duration unit 'x'");

        let err = ProgressError::invalid_theme(1, "gap between bands");
        assert!(err.is_recoverable());
        assert_eq!(err.category(), "theme");
    }

    #[test]
    fn test_config_message() {
        let msg = ConfigMessage::error("entity required");
        assert!(msg.is_blocking());
        assert_eq!(msg.to_string(), "[error] entity required");

        assert!(!ConfigMessage::warning("theme ignored").is_blocking());
        assert!(Severity::Error > Severity::Warning);
    }
}
