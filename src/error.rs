//! Error types for the command bridge.

use serde::{Serialize, Serializer};
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;

/// Classification of a failed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Request rejected before it reached a queue
    Validation,
    /// Waiter gave up; the command may still be queued or running
    Timeout,
    /// Payload faulted while the dispatcher ran it
    Execution,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Timeout => "TIMEOUT_ERROR",
            ErrorKind::Execution => "EXECUTION_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure carried back to the caller in the response body.
///
/// Serializes as its bare message, which is what the wire protocol exposes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CommandError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Execution, message)
    }

    /// Timeout failure for a waiter that gave up after `secs` seconds
    /// Whole-second timeouts keep one decimal place: `30.0s`, `0.05s`.
    pub fn timed_out(secs: f64) -> Self {
        let secs = if secs.is_finite() && secs.fract() == 0.0 {
            format!("{:.1}", secs)
        } else {
            secs.to_string()
        };
        Self::new(
            ErrorKind::Timeout,
            format!("Execution timed out after {}s", secs),
        )
    }
}

impl Serialize for CommandError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.message)
    }
}

/// Bridge-level errors (configuration, lifecycle, transport)
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("Bridge is already running")]
    AlreadyRunning,

    #[error("Bridge is not running")]
    NotRunning,

    #[error("Listener thread failed: {0}")]
    Server(String),

    #[error("Client request failed: {0}")]
    Client(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        BridgeError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::Client(err.to_string())
    }
}
