//! Dispatcher
//!
//! Runs one command's payload against the injected interpreter on the privileged thread and
//! finalizes its outcome. Faults (interpreter errors and panics alike) become an
//! `EXECUTION_ERROR` on the command; nothing propagates to the caller of [`Dispatcher::execute`].
//! The completion signal fires exactly once on every exit path.

use crate::context::ExecutionContext;
use crate::error::CommandError;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Scope a payload runs in.
///
/// `result` starts as the command's result container. Payloads may mutate it in place or replace
/// it outright; whatever it holds when interpretation ends becomes the command's result.
pub struct Namespace<'a, E> {
    pub environment: &'a mut E,
    pub params: &'a Map<String, Value>,
    pub result: Value,
}

/// Fault raised by a payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptFault {
    pub message: String,
}

impl ScriptFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Capability that executes payloads. Supplied by the host.
pub trait PayloadInterpreter {
    /// Host state handed to every payload
    type Environment;

    fn interpret(
        &self,
        script: &str,
        namespace: &mut Namespace<'_, Self::Environment>,
    ) -> Result<(), ScriptFault>;
}

/// What happened to a dispatched command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed,
    Failed(CommandError),
    /// The command had already been dispatched; nothing ran
    Skipped,
}

impl DispatchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DispatchOutcome::Failed(_))
    }
}

/// Signals completion on drop unless already signaled
struct CompletionGuard<'a> {
    ctx: &'a ExecutionContext,
    result: Value,
    error: Option<CommandError>,
    signaled: bool,
}

impl<'a> CompletionGuard<'a> {
    fn new(ctx: &'a ExecutionContext, result: Value) -> Self {
        Self {
            ctx,
            result,
            error: None,
            signaled: false,
        }
    }

    /// Returns `true` if the waiter had already given up
    fn signal(&mut self) -> bool {
        if self.signaled {
            return false;
        }
        self.signaled = true;
        self.ctx
            .complete(std::mem::take(&mut self.result), self.error.take())
    }
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.signal();
    }
}

/// Executes commands against an interpreter and the host environment it owns
pub struct Dispatcher<I: PayloadInterpreter> {
    interpreter: I,
    environment: I::Environment,
}

impl<I: PayloadInterpreter> Dispatcher<I> {
    pub fn new(interpreter: I, environment: I::Environment) -> Self {
        Self {
            interpreter,
            environment,
        }
    }

    pub fn environment(&self) -> &I::Environment {
        &self.environment
    }

    /// Run one command to completion and signal its waiter.
    pub fn execute(&mut self, ctx: &ExecutionContext) -> DispatchOutcome {
        let Some(initial) = ctx.begin() else {
            warn!(
                command_id = %ctx.id(),
                lane = %ctx.lane(),
                "Command already dispatched, skipping"
            );
            return DispatchOutcome::Skipped;
        };

        let started = Instant::now();
        let mut guard = CompletionGuard::new(ctx, initial);

        let mut namespace = Namespace {
            environment: &mut self.environment,
            params: ctx.params(),
            result: std::mem::take(&mut guard.result),
        };
        let interpreter = &self.interpreter;
        let run = panic::catch_unwind(AssertUnwindSafe(|| {
            interpreter.interpret(ctx.script(), &mut namespace)
        }));
        guard.result = namespace.result;

        guard.error = match run {
            Ok(Ok(())) => None,
            Ok(Err(fault)) => Some(CommandError::execution(fault.message)),
            Err(payload) => Some(CommandError::execution(format!(
                "payload panicked: {}",
                panic_message(payload.as_ref())
            ))),
        };
        let outcome = match &guard.error {
            Some(error) => DispatchOutcome::Failed(error.clone()),
            None => DispatchOutcome::Completed,
        };

        let abandoned = guard.signal();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            DispatchOutcome::Failed(error) => warn!(
                command_id = %ctx.id(),
                lane = %ctx.lane(),
                elapsed_ms,
                error = %error,
                "Command failed"
            ),
            _ => debug!(
                command_id = %ctx.id(),
                lane = %ctx.lane(),
                elapsed_ms,
                "Command completed"
            ),
        }
        if abandoned {
            // Known fire-and-forget gap: the caller timed out, so this outcome is never read.
            warn!(
                command_id = %ctx.id(),
                lane = %ctx.lane(),
                age_ms = ctx.age().as_millis() as u64,
                "Command finished after its waiter timed out; outcome discarded"
            );
        }

        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
