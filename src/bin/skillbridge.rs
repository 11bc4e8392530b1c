//! Skillbridge CLI Binary
//!
//! Runs the command bridge in the foreground, or talks to a running one.

use anyhow::{anyhow, Context};
use clap::Parser;
use skillbridge::cli::{map_error, Cli, Commands, RunContext};
use skillbridge::config::ConfigLoader;
use skillbridge::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    // Build logging config from CLI args, env vars, and config file
    let logging_config = build_logging_config(&cli);

    // Initialize logging early
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!(command = cli.command.name(), "Skillbridge CLI starting");

    match run(&cli) {
        Ok(exit_code) => {
            info!(exit_code, "Command completed");
            process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    let context = RunContext::new(cli.workspace.clone(), cli.config.clone())
        .map_err(|e| anyhow!(map_error(&e)))
        .context("Error loading configuration")?;

    let output = context
        .execute(&cli.command)
        .map_err(|e| anyhow!(map_error(&e)))
        .with_context(|| format!("{} failed", cli.command.name()))?;

    println!("{}", output.text);
    Ok(output.exit_code)
}

/// Build logging configuration from CLI args, environment, and config file
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    // Client commands stay quiet unless asked; serve always logs
    let serving = matches!(cli.command, Commands::Serve { .. });
    if !cli.verbose && !serving {
        return LoggingConfig {
            level: "off".to_string(),
            ..LoggingConfig::default()
        };
    }

    let mut config = match cli.config {
        Some(ref config_path) => ConfigLoader::load_from_file(config_path)
            .map(|c| c.logging)
            .unwrap_or_default(),
        None => ConfigLoader::load(&cli.workspace)
            .map(|c| c.logging)
            .unwrap_or_default(),
    };

    // CLI arguments take priority
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    } else if cli.verbose && config.level == "info" {
        config.level = "debug".to_string();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }

    config
}
