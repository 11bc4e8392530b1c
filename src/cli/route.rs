//! CLI route: single route table and run context.

use crate::bridge::Bridge;
use crate::cli::output::format_response;
use crate::cli::parse::Commands;
use crate::config::{BridgeConfig, ConfigLoader};
use crate::error::BridgeError;
use crate::host::TickHost;
use crate::script::{HostState, ScriptInterpreter};
use crate::server::ExecuteRequest;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Result of a CLI command: text to print and the process exit code
#[derive(Debug)]
pub struct RunOutput {
    pub text: String,
    pub exit_code: i32,
}

impl RunOutput {
    fn ok(text: String) -> Self {
        Self { text, exit_code: 0 }
    }
}

/// Runtime context for CLI execution: workspace and resolved configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: BridgeConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, BridgeError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<RunOutput, BridgeError> {
        let started = Instant::now();
        let result = match command {
            Commands::Serve {
                host,
                port,
                tick_ms,
            } => self.handle_serve(host.clone(), *port, *tick_ms),
            Commands::Health { url } => self.handle_health(url.as_deref()),
            Commands::Exec {
                mode,
                script,
                file,
                params,
                timeout,
                url,
            } => {
                let script = match (script, file) {
                    (Some(script), _) => script.clone(),
                    (None, Some(path)) => std::fs::read_to_string(path)?,
                    (None, None) => String::new(),
                };
                let request = ExecuteRequest {
                    mode: mode.clone(),
                    script,
                    params: Some(Value::Object(params.iter().cloned().collect::<Map<_, _>>())),
                    timeout: *timeout,
                };
                self.handle_exec(&request, url.as_deref())
            }
        };
        debug!(
            command = command.name(),
            duration_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "CLI command finished"
        );
        result
    }

    fn handle_serve(
        &self,
        host: Option<String>,
        port: Option<u16>,
        tick_ms: Option<u64>,
    ) -> Result<RunOutput, BridgeError> {
        let mut config = self.config.clone();
        if let Some(host) = host {
            config.server.host = host;
        }
        if let Some(port) = port {
            config.server.port = port;
        }
        if let Some(tick_ms) = tick_ms {
            config.execution.tick_interval_ms = tick_ms;
        }
        let config = config.validated()?;

        let tick_interval = config.execution.tick_interval();
        let bridge = Bridge::new(config);
        let addr = bridge.start()?;

        let stop = Arc::new(AtomicBool::new(false));
        spawn_signal_watcher(Arc::clone(&stop))?;

        let mut scheduler = bridge.scheduler(ScriptInterpreter, HostState::new());
        let mut host = TickHost::new();
        let handle = host.register(move |delta| {
            let report = scheduler.on_tick(delta);
            if !report.is_idle() {
                debug!(
                    executed = report.executed,
                    failed = report.failed,
                    "Tick drained commands"
                );
            }
        });

        info!(addr = %addr, "Serving; press Ctrl-C to stop");
        host.run(tick_interval, &stop);
        host.unregister(handle);
        bridge.stop()?;

        Ok(RunOutput::ok(format!(
            "Bridge on {} stopped after {} ticks",
            addr,
            host.ticks()
        )))
    }

    fn handle_health(&self, url: Option<&str>) -> Result<RunOutput, BridgeError> {
        let url = format!("{}/health", self.base_url(url));
        let body = block_on(async move {
            let response = reqwest::get(&url).await?.error_for_status()?;
            Ok::<Value, BridgeError>(response.json::<Value>().await?)
        })?;
        Ok(RunOutput::ok(format_response(&body)))
    }

    fn handle_exec(
        &self,
        request: &ExecuteRequest,
        url: Option<&str>,
    ) -> Result<RunOutput, BridgeError> {
        let url = format!("{}/execute", self.base_url(url));
        let body = block_on(async move {
            let response = reqwest::Client::new().post(&url).json(request).send().await?;
            Ok::<Value, BridgeError>(response.json::<Value>().await?)
        })?;

        let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);
        Ok(RunOutput {
            text: format_response(&body),
            exit_code: if success { 0 } else { 1 },
        })
    }

    fn base_url(&self, url: Option<&str>) -> String {
        match url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = match self.config.server.host.as_str() {
                    "0.0.0.0" => "127.0.0.1",
                    "::" => "[::1]",
                    host => host,
                };
                format!("http://{}:{}", host, self.config.server.port)
            }
        }
    }
}

fn block_on<F, T>(future: F) -> Result<T, BridgeError>
where
    F: std::future::Future<Output = Result<T, BridgeError>>,
{
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(future)
}

/// Set `stop` when the process receives Ctrl-C
fn spawn_signal_watcher(stop: Arc<AtomicBool>) -> Result<(), BridgeError> {
    std::thread::Builder::new()
        .name("skillbridge-signal".to_string())
        .spawn(move || {
            let waited = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| e.to_string())
                .and_then(|runtime| {
                    runtime
                        .block_on(tokio::signal::ctrl_c())
                        .map_err(|e| e.to_string())
                });
            match waited {
                Ok(()) => info!("Shutdown requested"),
                Err(e) => error!(error = %e, "Signal handler failed; stopping"),
            }
            stop.store(true, Ordering::Release);
        })?;
    Ok(())
}
