//! Display sinks for the command line.

use std::io::{self, Write};
use std::sync::Mutex;

use appagent_runner::{LogSink, RunnerError, LINE_BREAK};
use async_trait::async_trait;
use tracing::debug;

use crate::json_output::emit_log_updated;

/// Prints the newly appended part of the log to stdout.
///
/// The runner hands over the whole log on every update; since the log only
/// grows, the sink remembers how much it already printed.
#[derive(Debug, Default)]
pub struct TerminalSink {
    printed: Mutex<usize>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogSink for TerminalSink {
    async fn on_update(&self, full_text: &str) -> Result<(), RunnerError> {
        let mut printed = self
            .printed
            .lock()
            .map_err(|_| RunnerError::Sink("terminal sink lock poisoned".to_string()))?;

        let fresh = render_fresh(full_text, *printed);
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(fresh.as_bytes())
            .and_then(|()| stdout.flush())
            .map_err(|e| RunnerError::Sink(e.to_string()))?;

        *printed = full_text.len();
        Ok(())
    }
}

/// Emits a `log_updated` JSON event per update.
#[derive(Debug, Default)]
pub struct JsonSink;

#[async_trait]
impl LogSink for JsonSink {
    async fn on_update(&self, full_text: &str) -> Result<(), RunnerError> {
        debug!(len = full_text.len(), "Emitting log update");
        emit_log_updated(full_text).map_err(|e| RunnerError::Sink(e.to_string()))
    }
}

/// The part of `full_text` after `printed` bytes, with markers as newlines.
fn render_fresh(full_text: &str, printed: usize) -> String {
    full_text
        .get(printed..)
        .unwrap_or_default()
        .replace(LINE_BREAK, "\n")
}
