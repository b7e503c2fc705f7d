// src/error.rs

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Call-level failures. Per-path access problems are never reported through
/// this type; they travel as [`crate::cache::AccessWarning`] values.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cancelled")]
    Cancelled,

    #[error("invalid command {command:?}: {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    CommandFailed { program: String, status: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("provider {0:?} not found")]
    UnknownProvider(String),

    #[error("provider {0:?} requires clean_cmd")]
    MissingCleanCommand(String),

    #[error("provider {name:?}: {source}")]
    Provider {
        name: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("a clean of {0:?} is already running")]
    Busy(String),
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}

/// A call-level error paired with whatever was computed before it fired.
pub struct Failed<T> {
    pub partial: T,
    pub error: EngineError,
}

impl<T> Failed<T> {
    pub fn new(partial: T, error: EngineError) -> Self {
        Failed { partial, error }
    }

    pub fn into_parts(self) -> (T, EngineError) {
        (self.partial, self.error)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Failed<U> {
        Failed {
            partial: f(self.partial),
            error: self.error,
        }
    }
}

impl<T> fmt::Debug for Failed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failed")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Failed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T> std::error::Error for Failed<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Result of an engine call that may stop early but still owes its caller
/// the partial value.
pub type Outcome<T> = Result<T, Failed<T>>;
