//! End-to-end tests against a bridge bound to a real socket

use super::test_utils::HostThread;
use serde_json::{json, Value};
use skillbridge::config::BridgeConfig;
use skillbridge::Bridge;
use std::time::{Duration, Instant};

fn start_bridge() -> (Bridge, String) {
    let mut config = BridgeConfig::default();
    config.server.port = 0;
    config.execution.default_timeout_secs = 5.0;
    let bridge = Bridge::new(config);
    let addr = bridge.start().unwrap();
    (bridge, format!("http://{}", addr))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_execute_over_tcp() {
    let (bridge, base) = start_bridge();
    let host = HostThread::spawn(bridge.lanes());

    let client = reqwest::Client::new();
    let body: Value = client
        .post(format!("{}/execute", base))
        .json(&json!({"mode": "game", "script": "result['sum'] = params['a'] + params['b']", "params": {"a": 2, "b": 3}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"success": true, "result": {"sum": 5}}));

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "running");

    host.stop();
    bridge.stop().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_default_timeout_applies_when_omitted() {
    let mut config = BridgeConfig::default();
    config.server.port = 0;
    config.execution.default_timeout_secs = 0.05;
    let bridge = Bridge::new(config);
    let addr = bridge.start().unwrap();

    let response = reqwest::Client::new()
        .post(format!("http://{}/execute", addr))
        .json(&json!({"script": "result = 1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Execution timed out after 0.05s");

    bridge.stop().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_returns_promptly_with_undrained_waiter() {
    let mut config = BridgeConfig::default();
    config.server.port = 0;
    config.server.shutdown_grace_ms = 100;
    let bridge = Bridge::new(config);
    let addr = bridge.start().unwrap();
    let lanes = bridge.lanes();

    // Nothing ticks, so this waiter could only be released by its 30 s timeout
    let pending = tokio::spawn(
        reqwest::Client::new()
            .post(format!("http://{}/execute", addr))
            .json(&json!({"script": "result = 1", "timeout": 30}))
            .send(),
    );
    let deadline = Instant::now() + Duration::from_secs(5);
    while lanes.sizes().total() == 0 {
        assert!(Instant::now() < deadline, "request never reached the lanes");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let started = Instant::now();
    bridge.stop().unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_secs(3), "stop took {:?}", elapsed);
    assert!(!bridge.is_running());

    assert!(pending.await.unwrap().is_err());
    assert_eq!(lanes.sizes().total(), 1);
}

#[test]
fn test_stopped_bridge_refuses_connections() {
    let (bridge, base) = start_bridge();
    bridge.stop().unwrap();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let result = runtime.block_on(async {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap()
            .get(format!("{}/health", base))
            .send()
            .await
    });
    assert!(result.is_err());
}
