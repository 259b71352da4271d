//! JSON lines output of run events to stdout.

use std::io::{self, Write};

use appagent_core::ExecutionResult;
use serde::Serialize;

/// JSON event types that can be emitted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonEventType {
    RunStarted,
    LogUpdated,
    RunFinished,
}

/// A JSON event to be output to stdout.
#[derive(Debug, Clone, Serialize)]
pub struct JsonEvent {
    pub event: JsonEventType,
    pub timestamp: String,
    pub data: serde_json::Value,
}

impl JsonEvent {
    /// Create a new JSON event with the current timestamp.
    pub fn new(event: JsonEventType, data: serde_json::Value) -> Self {
        Self {
            event,
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    /// Output this event as a JSON line to stdout.
    pub fn emit(&self) -> io::Result<()> {
        let json = serde_json::to_string(self)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", json)?;
        stdout.flush()
    }
}

/// Emit a run_started event.
pub fn emit_run_started(description: &str, privacy_protection: bool) -> io::Result<()> {
    JsonEvent::new(
        JsonEventType::RunStarted,
        serde_json::json!({
            "description": description,
            "privacy_protection": privacy_protection,
        }),
    )
    .emit()
}

/// Emit a log_updated event carrying the full accumulated log.
pub fn emit_log_updated(log: &str) -> io::Result<()> {
    JsonEvent::new(
        JsonEventType::LogUpdated,
        serde_json::json!({
            "log": log,
        }),
    )
    .emit()
}

/// Emit a run_finished event with the final result.
pub fn emit_run_finished(result: &ExecutionResult) -> io::Result<()> {
    JsonEvent::new(
        JsonEventType::RunFinished,
        serde_json::to_value(result)?,
    )
    .emit()
}
