//! CLI output: error mapping and response rendering.

use crate::error::BridgeError;
use serde_json::Value;

/// Map bridge errors to a string for CLI output.
pub fn map_error(e: &BridgeError) -> String {
    match e {
        BridgeError::Client(msg) => format!("Could not reach bridge: {}", msg),
        other => other.to_string(),
    }
}

/// Pretty-print a JSON response body
pub fn format_response(body: &Value) -> String {
    serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string())
}
