//! Workspace config files: config/config.toml, then config/{SKILLBRIDGE_ENV}.toml

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_ENV: &str = "development";

/// Candidate files under `workspace_root`, lowest precedence first
pub fn workspace_config_paths(workspace_root: &Path) -> [PathBuf; 2] {
    let env_name = std::env::var("SKILLBRIDGE_ENV")
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_ENV.to_string());
    let dir = workspace_root.join("config");
    [dir.join("config.toml"), dir.join(format!("{}.toml", env_name))]
}

/// Layer whichever workspace files exist onto the builder.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = workspace_config_paths(workspace_root)
        .into_iter()
        .filter(|path| path.is_file())
        .fold(builder, |builder, path| {
            debug!(config_path = %path.display(), "Loading workspace configuration");
            builder.add_source(File::from(path))
        });
    Ok(builder)
}
