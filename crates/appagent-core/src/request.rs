//! Task submission.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// A task submitted for execution by the worker.
///
/// Built once through [`TaskRequest::new`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    description: String,
    privacy_protection: bool,
}

impl TaskRequest {
    /// Create a request from a free-text description.
    ///
    /// Surrounding whitespace is trimmed; an empty description is rejected.
    pub fn new(description: impl AsRef<str>, privacy_protection: bool) -> Result<Self, CoreError> {
        let description = description.as_ref().trim();
        if description.is_empty() {
            return Err(CoreError::InvalidInput(
                "task description must not be empty".to_string(),
            ));
        }

        Ok(Self {
            description: description.to_string(),
            privacy_protection,
        })
    }

    /// The trimmed task description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the worker should run its privacy-protection behaviour.
    pub fn privacy_protection(&self) -> bool {
        self.privacy_protection
    }
}
