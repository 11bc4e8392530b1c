//! Shared test utilities for integration tests
//!
//! Provides a background "privileged" host thread that ticks a scheduler over a lane set,
//! and helpers for building commands.

use serde_json::Map;
use skillbridge::dispatcher::Dispatcher;
use skillbridge::host::TickHost;
use skillbridge::queue::LaneSet;
use skillbridge::scheduler::Scheduler;
use skillbridge::script::{HostState, ScriptInterpreter};
use skillbridge::{ExecutionContext, Lane};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Global mutex to serialize environment variable access across tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Run `f` with the given environment variables set, restoring them afterwards
pub fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(k, _)| (k.to_string(), std::env::var(k).ok()))
        .collect();
    for (k, v) in vars {
        std::env::set_var(k, v);
    }
    let result = f();
    for (k, original) in saved {
        match original {
            Some(v) => std::env::set_var(&k, v),
            None => std::env::remove_var(&k),
        }
    }
    result
}

pub fn command(lane: Lane, script: &str) -> Arc<ExecutionContext> {
    Arc::new(ExecutionContext::new(
        lane,
        script,
        Map::new(),
        Duration::from_secs(5),
    ))
}

/// A host thread ticking a [`Scheduler`] with the reference interpreter until stopped
pub struct HostThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<HostState>>,
}

impl HostThread {
    pub fn spawn(lanes: Arc<LaneSet>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("test-host".to_string())
            .spawn(move || {
                let scheduler = Rc::new(RefCell::new(Scheduler::new(
                    lanes,
                    Dispatcher::new(ScriptInterpreter, HostState::new()),
                )));
                let ticking = Rc::clone(&scheduler);
                let mut host = TickHost::new();
                host.register(move |delta| {
                    ticking.borrow_mut().on_tick(delta);
                });
                host.run(Duration::from_millis(1), &flag);
                drop(host);

                let state = scheduler.borrow().dispatcher().environment().clone();
                state
            })
            .unwrap();
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop ticking and return the host state the scripts left behind
    pub fn stop(mut self) -> HostState {
        self.stop.store(true, Ordering::Release);
        self.handle.take().unwrap().join().unwrap()
    }
}

impl Drop for HostThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
