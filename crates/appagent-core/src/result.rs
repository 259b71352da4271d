//! Outcome record of one orchestrated run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::message::{error_message, failure_message, success_message};
use crate::{RunId, RunOutcome};

/// Result of one orchestrated run.
///
/// Produced exactly once per run and handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Run this result belongs to.
    pub run_id: RunId,

    /// How the run ended.
    pub outcome: RunOutcome,

    /// True only when the worker exited with status 0.
    pub succeeded: bool,

    /// Templated message for the display layer.
    pub message: String,

    /// Worker exit code, when the worker ran to termination.
    pub exit_code: Option<i32>,

    /// Screenshot the worker left in its run directory, if one was found.
    pub artifact_path: Option<PathBuf>,

    /// Sanitized log accumulated during the run (partial on failure).
    pub log: String,
}

impl ExecutionResult {
    /// The worker exited with `exit_code`; 0 is success, anything else a failure.
    pub fn exited(
        run_id: RunId,
        description: &str,
        exit_code: i32,
        artifact_path: Option<PathBuf>,
        log: String,
    ) -> Self {
        if exit_code == 0 {
            Self {
                run_id,
                outcome: RunOutcome::Completed,
                succeeded: true,
                message: success_message(description, artifact_path.as_deref()),
                exit_code: Some(exit_code),
                artifact_path,
                log,
            }
        } else {
            Self {
                run_id,
                outcome: RunOutcome::Failed,
                succeeded: false,
                message: failure_message(description, exit_code),
                exit_code: Some(exit_code),
                artifact_path,
                log,
            }
        }
    }

    /// The run was aborted before a clean exit; no artifact is claimed.
    pub fn errored(
        run_id: RunId,
        description: &str,
        outcome: RunOutcome,
        error: &str,
        log: String,
    ) -> Self {
        Self {
            run_id,
            succeeded: outcome.is_success(),
            outcome,
            message: error_message(description, error),
            exit_code: None,
            artifact_path: None,
            log,
        }
    }
}
