//! Terminal state of an orchestrated run.

use serde::{Deserialize, Serialize};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    /// Worker exited with status 0.
    Completed,
    /// Worker ran but exited with a nonzero status.
    Failed,
    /// Worker process could not be started.
    LaunchFailed,
    /// Reading the worker's output failed mid-run.
    StreamFailed,
    /// Any other failure in the orchestration sequence.
    Errored,
}

impl RunOutcome {
    /// Returns true only for a clean worker exit.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}
