//! User-facing result messages.
//!
//! The display layer renders these as markdown.

use std::path::Path;

/// Substring of an artifact path that marks a privacy-protection capture.
const PRIVACY_MARKER: &str = "privacy";

/// Message for a worker that exited with status 0.
pub fn success_message(description: &str, artifact_path: Option<&Path>) -> String {
    let mut message = format!(
        "✅ **Task completed successfully!**\n\nTask: '{}'\n\nThe task was executed using AppAgent with real-time mobile device interaction.",
        description
    );

    let privacy_capture = artifact_path
        .map(|p| p.to_string_lossy().contains(PRIVACY_MARKER))
        .unwrap_or(false);
    if privacy_capture {
        message.push_str(
            "\n\n🔒 **Privacy protection activated** - Clicked unrelated content to mislead recommendation algorithms.",
        );
    }

    message
}

/// Message for a worker that exited with a nonzero status.
pub fn failure_message(description: &str, exit_code: i32) -> String {
    format!(
        "❌ **Task execution failed**\n\nTask: '{}'\n\nProcess returned with code: {}",
        description, exit_code
    )
}

/// Message for a run that could not complete (launch, stream or internal error).
pub fn error_message(description: &str, error: &str) -> String {
    format!(
        "❌ **Error executing task**\n\nTask: '{}'\n\nError: {}",
        description, error
    )
}
