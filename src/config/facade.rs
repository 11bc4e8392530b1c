//! Config loading entry points: defaults, files, then environment.

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::BridgeConfig;
use config::{ConfigBuilder, ConfigError, Environment, File};
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `SKILLBRIDGE__SERVER__PORT=9000`
const ENV_PREFIX: &str = "SKILLBRIDGE";
const ENV_SEPARATOR: &str = "__";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load layered configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, global file, workspace files, environment.
    pub fn load(workspace_root: &Path) -> Result<BridgeConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        Self::finish(builder)
    }

    /// Load from one explicit file, skipping global and workspace discovery
    pub fn load_from_file(path: &Path) -> Result<BridgeConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?.add_source(File::from(path));
        Self::finish(builder)
    }

    /// Location of the global config file, if it can be determined
    pub fn xdg_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    fn finish(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<BridgeConfig, ConfigError> {
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
