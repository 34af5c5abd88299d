//! Crate-wide error type.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while configuring or running the engine.
#[derive(Error, Debug)]
pub enum RaffiError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse error in {path} at line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("worker thread panicked: {0}")]
    WorkerPanic(String),
}

pub type Result<T> = std::result::Result<T, RaffiError>;

impl RaffiError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RaffiError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        RaffiError::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}
