// src/error.rs

//! Error types for x10
//!
//! A single error enum is shared by every subsystem. Command handlers in the
//! binary wrap these with `anyhow` context before reporting them.

use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Unknown atom or FQN
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Malformed or unreadable persisted document
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Advisory lock could not be acquired
    #[error("Lock error: {0}")]
    LockError(String),

    /// The resolver could not prove a complete dependency closure
    #[error("Incomplete resolution: {0}")]
    IncompleteResolution(String),

    /// A stage or trigger script exited unsuccessfully
    #[error("Script failed with {status}")]
    ScriptExecutionError {
        status: String,
        stdout: Vec<String>,
        stderr: Vec<String>,
    },

    /// A package is already being built further up the build chain
    #[error("Circular build dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Archive error: {0}")]
    ArchiveError(String),

    #[error("Trigger '{name}' failed: {message}")]
    TriggerError { name: String, message: String },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::StorageError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_dependency_display() {
        let err = Error::CyclicDependency(vec![
            "a-1_0".to_string(),
            "b-1_0".to_string(),
            "a-1_0".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Circular build dependency: a-1_0 -> b-1_0 -> a-1_0"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::IoError(msg) if msg.contains("denied")));
    }
}
