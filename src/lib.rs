//! Skillbridge: Thread-Safe Command Bridge
//!
//! Accepts commands over HTTP from any thread, queues them per execution lane, and runs them
//! on the single privileged host thread when the host ticks. Callers block on a per-command
//! completion signal with a timeout and receive a JSON outcome.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod lane;
pub mod logging;
pub mod queue;
pub mod scheduler;
pub mod script;
pub mod server;

pub use bridge::Bridge;
pub use context::{ExecutionContext, Outcome, WaitStatus};
pub use dispatcher::{Dispatcher, Namespace, PayloadInterpreter, ScriptFault};
pub use error::{BridgeError, CommandError, ErrorKind};
pub use lane::Lane;
pub use queue::{CommandQueue, LaneSet};
pub use scheduler::Scheduler;
