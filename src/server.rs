//! Request Listener
//!
//! HTTP front end. `POST /execute` enqueues a command on its lane and parks a blocking worker
//! thread on the command's completion signal; `GET /health` reports queue depths.
//!
//! Validation failures are the only non-200 responses. Execution errors and timeouts come back
//! as `200 {"success": false, "error": ...}`, so callers must inspect `success`.

use crate::context::{ExecutionContext, Outcome, WaitStatus};
use crate::error::CommandError;
use crate::lane::Lane;
use crate::queue::{LaneSet, QueueSizes};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Application state
#[derive(Clone)]
pub struct ServerState {
    lanes: Arc<LaneSet>,
    default_timeout: Duration,
}

impl ServerState {
    pub fn new(lanes: Arc<LaneSet>, default_timeout: Duration) -> Self {
        Self {
            lanes,
            default_timeout,
        }
    }
}

// API types
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub queue_sizes: Value,
}

impl HealthResponse {
    fn running(sizes: &QueueSizes) -> Self {
        Self {
            status: "running".to_string(),
            version: VERSION.to_string(),
            queue_sizes: serde_json::to_value(sizes).unwrap_or_else(|_| json!({})),
        }
    }
}

/// Body of `POST /execute`, before validation
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Seconds to wait for completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

fn default_mode() -> String {
    Lane::Editor.as_str().to_string()
}

/// A request that passed validation and can be enqueued
#[derive(Debug)]
pub struct CommandRequest {
    pub lane: Lane,
    pub script: String,
    pub params: Map<String, Value>,
    pub timeout: Duration,
}

impl ExecuteRequest {
    /// Decode a raw request body
    pub fn from_body(body: &[u8]) -> Result<Self, CommandError> {
        serde_json::from_slice(body).map_err(|e| CommandError::validation(format!("Bad request: {}", e)))
    }

    pub fn validate(self, default_timeout: Duration) -> Result<CommandRequest, CommandError> {
        let lane: Lane = self
            .mode
            .parse()
            .map_err(|e: crate::lane::UnknownLane| CommandError::validation(e.to_string()))?;

        let params = match self.params {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(CommandError::validation(
                    "Bad request: 'params' must be an object",
                ))
            }
        };

        let timeout = match self.timeout {
            None => default_timeout,
            Some(secs) => Duration::try_from_secs_f64(secs).map_err(|_| {
                CommandError::validation(format!(
                    "Bad request: 'timeout' must be a non-negative number of seconds (got {})",
                    secs
                ))
            })?,
        };

        Ok(CommandRequest {
            lane,
            script: self.script,
            params,
            timeout,
        })
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/execute", post(execute))
        .fallback(not_found)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

// Health check endpoint
async fn health_check(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse::running(&state.lanes.sizes()))
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}

async fn execute(State(state): State<ServerState>, body: Bytes) -> Response {
    let request = match ExecuteRequest::from_body(&body)
        .and_then(|request| request.validate(state.default_timeout))
    {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejected execute request");
            return (StatusCode::BAD_REQUEST, Json(Outcome::err(e))).into_response();
        }
    };

    let ctx = Arc::new(ExecutionContext::new(
        request.lane,
        request.script,
        request.params,
        request.timeout,
    ));
    state.lanes.push(Arc::clone(&ctx));
    info!(
        command_id = %ctx.id(),
        lane = %ctx.lane(),
        script_len = ctx.script().len(),
        timeout_ms = ctx.timeout().as_millis() as u64,
        "Queued command"
    );

    let waiter = Arc::clone(&ctx);
    match tokio::task::spawn_blocking(move || await_outcome(&waiter)).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => {
            error!(command_id = %ctx.id(), error = %e, "Waiter task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Outcome::err(CommandError::execution(format!(
                    "Waiter task failed: {}",
                    e
                )))),
            )
                .into_response()
        }
    }
}

/// Block the current thread until the command completes or its timeout elapses.
///
/// The deadline runs from when the command was queued, so time spent waiting for a blocking
/// thread counts against it.
pub fn await_outcome(ctx: &ExecutionContext) -> Outcome {
    let started = Instant::now();
    match ctx.wait(ctx.remaining()) {
        WaitStatus::Signaled => {
            let outcome = ctx.to_outcome();
            info!(
                command_id = %ctx.id(),
                lane = %ctx.lane(),
                success = outcome.success,
                waited_ms = started.elapsed().as_millis() as u64,
                "Command finished"
            );
            outcome
        }
        WaitStatus::TimedOut => {
            warn!(
                command_id = %ctx.id(),
                lane = %ctx.lane(),
                state = ?ctx.state(),
                "Waiter timed out; command stays queued and may still run"
            );
            Outcome::err(CommandError::timed_out(ctx.timeout().as_secs_f64()))
        }
    }
}
