//! Scheduler Loop
//!
//! The per-tick callback body. Runs only on the host's privileged thread: each tick drains the
//! lanes in [`Lane::ALL`] order and dispatches every drained command, in order, to completion.

use crate::dispatcher::{DispatchOutcome, Dispatcher, PayloadInterpreter};
use crate::lane::Lane;
use crate::queue::LaneSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Counts for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub executed: usize,
    pub failed: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.executed == 0
    }
}

pub struct Scheduler<I: PayloadInterpreter> {
    lanes: Arc<LaneSet>,
    dispatcher: Dispatcher<I>,
    ticks: u64,
}

impl<I: PayloadInterpreter> Scheduler<I> {
    pub fn new(lanes: Arc<LaneSet>, dispatcher: Dispatcher<I>) -> Self {
        Self {
            lanes,
            dispatcher,
            ticks: 0,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<I> {
        &self.dispatcher
    }

    /// Number of ticks processed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Tick callback: drain every lane and run what was drained.
    pub fn on_tick(&mut self, delta: Duration) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport::default();
        for lane in Lane::ALL {
            self.drain_lane(lane, &mut report);
        }
        if !report.is_idle() {
            debug!(
                tick = self.ticks,
                delta_ms = delta.as_millis() as u64,
                executed = report.executed,
                failed = report.failed,
                "Tick processed commands"
            );
        }
        report
    }

    fn drain_lane(&mut self, lane: Lane, report: &mut TickReport) {
        let queue = self.lanes.queue(lane);
        if queue.is_empty() {
            return;
        }

        for ctx in queue.drain() {
            match self.dispatcher.execute(&ctx) {
                DispatchOutcome::Completed => report.executed += 1,
                DispatchOutcome::Failed(_) => {
                    report.executed += 1;
                    report.failed += 1;
                }
                DispatchOutcome::Skipped => {}
            }
        }
    }
}
