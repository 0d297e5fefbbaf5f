//! Error handling for the recorder
//!
//! Out-of-sequence calls on the recorder (recording while idle, playing an
//! empty log, ending twice) are not errors and never show up here. This type
//! covers the environment failures that break the playback contract, plus
//! the config file plumbing around it.

use thiserror::Error;

/// Main error type for recorder operations
#[derive(Error, Debug)]
pub enum RecorderError {
    /// The deferred-task primitive could not accept a timer
    #[error("Scheduler unavailable: {0}")]
    SchedulerUnavailable(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RecorderError>,
    },
}

impl RecorderError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        RecorderError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error (or the error it wraps) is a scheduler failure
    pub fn is_scheduler_unavailable(&self) -> bool {
        match self {
            RecorderError::SchedulerUnavailable(_) => true,
            RecorderError::WithContext { source, .. } => source.is_scheduler_unavailable(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for RecorderError {
    fn from(err: serde_json::Error) -> Self {
        RecorderError::Serialization(err.to_string())
    }
}

/// Result type alias for recorder operations
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| RecorderError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| RecorderError::from(e).with_context(f()))
    }
}
