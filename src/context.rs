//! Execution Context
//!
//! Per-command state shared between the thread that submitted the command (the waiter) and the
//! privileged thread that runs it (the executor). The completion signal is a one-shot flag
//! guarded by the same mutex as the result and error, so a waiter that observes the signal also
//! observes the finalized outcome.

use crate::error::CommandError;
use crate::lane::Lane;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Command ID for log correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(u64);

impl CommandId {
    /// Generate the next command ID
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        CommandId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a command on the executor side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Created,
    Queued,
    Executing,
    CompletedOk,
    CompletedError,
}

impl CommandState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CommandState::CompletedOk | CommandState::CompletedError)
    }
}

/// How a call to [`ExecutionContext::wait`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Signaled,
    TimedOut,
}

/// Serializable outcome of a command, as returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl Outcome {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(error: CommandError) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<Value, CommandError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[derive(Debug)]
struct Slot {
    state: CommandState,
    result: Value,
    error: Option<CommandError>,
    /// Set when the waiter stopped waiting before completion
    abandoned: bool,
}

/// One unit of requested work plus its completion signal
#[derive(Debug)]
pub struct ExecutionContext {
    id: CommandId,
    lane: Lane,
    script: String,
    params: Map<String, Value>,
    timeout: Duration,
    created_at: Instant,
    slot: Mutex<Slot>,
    done: Condvar,
}

impl ExecutionContext {
    pub fn new(
        lane: Lane,
        script: impl Into<String>,
        params: Map<String, Value>,
        timeout: Duration,
    ) -> Self {
        Self {
            id: CommandId::next(),
            lane,
            script: script.into(),
            params,
            timeout,
            created_at: Instant::now(),
            slot: Mutex::new(Slot {
                state: CommandState::Created,
                result: Value::Object(Map::new()),
                error: None,
                abandoned: false,
            }),
            done: Condvar::new(),
        }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Caller-specified wait bound
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time since the context was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// What is left of the timeout, measured from creation
    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.age())
    }

    pub fn state(&self) -> CommandState {
        self.slot.lock().state
    }

    pub fn is_complete(&self) -> bool {
        self.state().is_terminal()
    }

    /// Block until the command completes or `timeout` elapses.
    ///
    /// Timing out leaves the command untouched: if it is drained later it still runs and its
    /// outcome is finalized with nobody reading it.
    pub fn wait(&self, timeout: Duration) -> WaitStatus {
        let mut slot = self.slot.lock();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            while !slot.state.is_terminal() {
                self.done.wait(&mut slot);
            }
            return WaitStatus::Signaled;
        };

        while !slot.state.is_terminal() {
            if self.done.wait_until(&mut slot, deadline).timed_out() {
                if slot.state.is_terminal() {
                    break;
                }
                slot.abandoned = true;
                return WaitStatus::TimedOut;
            }
        }
        WaitStatus::Signaled
    }

    /// Current outcome: the error if one is set, otherwise the result.
    pub fn to_outcome(&self) -> Outcome {
        let slot = self.slot.lock();
        match &slot.error {
            Some(error) => Outcome::err(error.clone()),
            None => Outcome::ok(slot.result.clone()),
        }
    }

    pub(crate) fn mark_queued(&self) {
        let mut slot = self.slot.lock();
        if slot.state == CommandState::Created {
            slot.state = CommandState::Queued;
        }
    }

    /// Move into `Executing` and hand the result container to the executor.
    ///
    /// Returns `None` if the command already started or finished.
    pub(crate) fn begin(&self) -> Option<Value> {
        let mut slot = self.slot.lock();
        match slot.state {
            CommandState::Created | CommandState::Queued => {
                slot.state = CommandState::Executing;
                Some(std::mem::take(&mut slot.result))
            }
            _ => None,
        }
    }

    /// Finalize the outcome and fire the completion signal.
    ///
    /// Returns `true` if the waiter had already given up. No-op on a terminal context.
    pub(crate) fn complete(&self, result: Value, error: Option<CommandError>) -> bool {
        let mut slot = self.slot.lock();
        if slot.state.is_terminal() {
            return slot.abandoned;
        }
        slot.state = if error.is_some() {
            CommandState::CompletedError
        } else {
            CommandState::CompletedOk
        };
        slot.result = result;
        slot.error = error;
        let abandoned = slot.abandoned;
        drop(slot);
        self.done.notify_all();
        abandoned
    }
}
