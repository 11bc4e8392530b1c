//! Execution lanes
//!
//! The closed set of named queues a command can be routed to. The order of [`Lane::ALL`] is the
//! order in which the scheduler drains lanes within one tick.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    /// Editor-world commands
    Editor,
    /// Play-in-editor / game-world commands
    Game,
}

impl Lane {
    /// Drain order within one tick
    pub const ALL: [Lane; Lane::COUNT] = [Lane::Editor, Lane::Game];

    pub const COUNT: usize = 2;

    pub fn as_str(self) -> &'static str {
        match self {
            Lane::Editor => "editor",
            Lane::Game => "game",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown lane name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown mode: {0}. Use 'editor' or 'game'.")]
pub struct UnknownLane(pub String);

impl FromStr for Lane {
    type Err = UnknownLane;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "editor" => Ok(Lane::Editor),
            "game" => Ok(Lane::Game),
            other => Err(UnknownLane(other.to_string())),
        }
    }
}
