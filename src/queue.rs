//! Command Queues
//!
//! One mutex-guarded FIFO per lane. Producers push from any thread; the scheduler drains a
//! whole lane at once by swapping the backlog out under the lock.

use crate::context::ExecutionContext;
use crate::lane::Lane;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// Thread-safe FIFO of pending commands for one lane
#[derive(Debug, Default)]
pub struct CommandQueue {
    items: Mutex<Vec<Arc<ExecutionContext>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command to the tail
    pub fn push(&self, ctx: Arc<ExecutionContext>) {
        ctx.mark_queued();
        let mut items = self.items.lock();
        items.push(ctx);
        trace!(queue_size = items.len(), "Pushed command");
    }

    /// Remove and return everything pending, in push order.
    ///
    /// The backlog is swapped for an empty vector, so a push racing with this call lands wholly
    /// before (and is returned) or wholly after (and waits for the next drain).
    pub fn drain(&self) -> Vec<Arc<ExecutionContext>> {
        std::mem::take(&mut *self.items.lock())
    }

    /// Snapshot of the pending count, for diagnostics only
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

/// Per-lane pending counts, keyed by lane name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueueSizes(pub BTreeMap<Lane, usize>);

impl QueueSizes {
    pub fn get(&self, lane: Lane) -> usize {
        self.0.get(&lane).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}

/// The full set of lane queues, shared by the listener and the scheduler
#[derive(Debug, Default)]
pub struct LaneSet {
    queues: [CommandQueue; Lane::COUNT],
}

impl LaneSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, lane: Lane) -> &CommandQueue {
        &self.queues[lane.index()]
    }

    /// Route a command to the queue of its own lane
    pub fn push(&self, ctx: Arc<ExecutionContext>) {
        self.queue(ctx.lane()).push(ctx);
    }

    pub fn drain(&self, lane: Lane) -> Vec<Arc<ExecutionContext>> {
        self.queue(lane).drain()
    }

    pub fn sizes(&self) -> QueueSizes {
        QueueSizes(
            Lane::ALL
                .iter()
                .map(|&lane| (lane, self.queue(lane).len()))
                .collect(),
        )
    }
}
