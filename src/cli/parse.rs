//! CLI parse: clap types for skillbridge. No behavior beyond argument decoding.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

/// Skillbridge CLI - run and talk to the command bridge
#[derive(Parser)]
#[command(name = "skillbridge")]
#[command(about = "Thread-safe command bridge: HTTP in, host-thread execution out")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (config/ is read from here)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off, except for `serve`)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the bridge and tick the host loop until Ctrl-C
    Serve {
        /// Listen host (overrides server.host)
        #[arg(long)]
        host: Option<String>,
        /// Listen port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
        /// Host tick interval in milliseconds (overrides execution.tick_interval_ms)
        #[arg(long)]
        tick_ms: Option<u64>,
    },
    /// Query a running bridge's health endpoint
    Health {
        /// Bridge base URL (default: derived from server config)
        #[arg(long)]
        url: Option<String>,
    },
    /// Submit a command to a running bridge and wait for its outcome
    Exec {
        /// Execution lane (editor or game)
        #[arg(long, default_value = "editor")]
        mode: String,
        /// Inline payload
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        script: Option<String>,
        /// Read the payload from a file
        #[arg(long)]
        file: Option<PathBuf>,
        /// Parameter as key=value; values parse as JSON, falling back to a string
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
        /// Seconds to wait for completion
        #[arg(long)]
        timeout: Option<f64>,
        /// Bridge base URL (default: derived from server config)
        #[arg(long)]
        url: Option<String>,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Serve { .. } => "serve",
            Commands::Health { .. } => "health",
            Commands::Exec { .. } => "exec",
        }
    }
}

/// Parse a `key=value` parameter
pub fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid parameter '{}': expected key=value", raw))?;
    if key.is_empty() {
        return Err(format!("invalid parameter '{}': empty key", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
