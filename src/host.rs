//! Host tick source
//!
//! Stand-in for the host application's frame loop. Callbacks are registered explicitly and run
//! on whichever thread calls [`TickHost::tick`]; that thread is the privileged one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Handle returned by [`TickHost::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

type TickCallback = Box<dyn FnMut(Duration)>;

#[derive(Default)]
pub struct TickHost {
    callbacks: Vec<(TickHandle, TickCallback)>,
    next_handle: u64,
    last_tick: Option<Instant>,
    ticks: u64,
}

impl TickHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked once per tick with the time since the previous tick
    pub fn register<F>(&mut self, callback: F) -> TickHandle
    where
        F: FnMut(Duration) + 'static,
    {
        self.next_handle += 1;
        let handle = TickHandle(self.next_handle);
        self.callbacks.push((handle, Box::new(callback)));
        debug!(handle = handle.0, "Registered tick callback");
        handle
    }

    /// Remove a callback. Returns `false` if the handle was not registered.
    pub fn unregister(&mut self, handle: TickHandle) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(h, _)| *h != handle);
        let removed = self.callbacks.len() != before;
        if removed {
            debug!(handle = handle.0, "Unregistered tick callback");
        }
        removed
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run every callback once, in registration order
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = self
            .last_tick
            .map(|last| now.duration_since(last))
            .unwrap_or_default();
        self.last_tick = Some(now);
        self.ticks += 1;
        for (_, callback) in self.callbacks.iter_mut() {
            callback(delta);
        }
        delta
    }

    /// Tick every `interval` on the current thread until `stop` is set
    pub fn run(&mut self, interval: Duration, stop: &AtomicBool) {
        info!(
            interval_ms = interval.as_millis() as u64,
            callbacks = self.callbacks.len(),
            "Host tick loop started"
        );
        while !stop.load(Ordering::Acquire) {
            let started = Instant::now();
            self.tick();
            if let Some(remaining) = interval.checked_sub(started.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
        info!(ticks = self.ticks, "Host tick loop stopped");
    }
}
