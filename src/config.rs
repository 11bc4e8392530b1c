//! Configuration System
//!
//! Layered configuration for the listener, the scheduler and logging. Sources merge in
//! precedence order via the `config` crate; see [`ConfigLoader`].

use crate::error::BridgeError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Command execution settings
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// How long `stop` lets in-flight requests finish (milliseconds)
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_grace_ms() -> u64 {
    500
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl ServerConfig {
    /// Resolve host and port to a bindable address
    pub fn socket_addr(&self) -> Result<SocketAddr, BridgeError> {
        let target = format!("{}:{}", self.host, self.port);
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| BridgeError::InvalidAddress(format!("{}: {}", target, e)))?
            .next()
            .ok_or(BridgeError::InvalidAddress(target))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Wait bound for requests that do not specify `timeout` (seconds)
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: f64,

    /// Host tick period used by the standalone binary (milliseconds)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_timeout_secs() -> f64 {
    30.0
}

fn default_tick_interval_ms() -> u64 {
    16
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl ExecutionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Server(String),
    Execution(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Server(msg) => write!(f, "Server: {}", msg),
            ValidationError::Execution(msg) => write!(f, "Execution: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl BridgeConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.server.host.trim().is_empty() {
            errors.push(ValidationError::Server("host cannot be empty".to_string()));
        }
        if self.server.port == 0 {
            errors.push(ValidationError::Server("port must be non-zero".to_string()));
        }

        let timeout = self.execution.default_timeout_secs;
        if !timeout.is_finite() || timeout <= 0.0 {
            errors.push(ValidationError::Execution(format!(
                "default_timeout_secs must be a positive number (got {})",
                timeout
            )));
        }
        if self.execution.tick_interval_ms == 0 {
            errors.push(ValidationError::Execution(
                "tick_interval_ms must be non-zero".to_string(),
            ));
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding all problems into one error
    pub fn validated(self) -> Result<Self, BridgeError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            BridgeError::Config(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.execution.default_timeout_secs)
    }
}
