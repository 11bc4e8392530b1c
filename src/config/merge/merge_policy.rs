//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080_i64)?
        .set_default("server.shutdown_grace_ms", 500_i64)?
        .set_default("execution.default_timeout_secs", 30.0)?
        .set_default("execution.tick_interval_ms", 16_i64)
}
