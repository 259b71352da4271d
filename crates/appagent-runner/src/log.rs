//! Run log accumulation and display sinks.
//!
//! Each run owns one [`LogBuffer`]. After every append the orchestrator hands
//! the complete buffer content to a [`LogSink`]; sinks never see deltas.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::RunnerError;

/// Append-only sanitized log of a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBuffer {
    text: String,
}

impl LogBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append sanitized text.
    pub fn append(&mut self, sanitized: &str) {
        self.text.push_str(sanitized);
    }

    /// The accumulated text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consume the buffer and return the accumulated text.
    pub fn into_string(self) -> String {
        self.text
    }
}

/// Receiver of live log updates.
///
/// Implement this trait to render a run's log as it grows.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Called after each append with the full accumulated log.
    async fn on_update(&self, full_text: &str) -> Result<(), RunnerError>;
}

/// A sink that forwards every snapshot over an unbounded channel.
///
/// # Example
///
/// ```rust,no_run
/// use appagent_runner::ChannelSink;
///
/// let (sink, mut rx) = ChannelSink::new();
///
/// tokio::spawn(async move {
///     while let Some(snapshot) = rx.recv().await {
///         println!("{}", snapshot);
///     }
/// });
/// ```
pub struct ChannelSink {
    update_tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    /// Create a sink and the receiver of its snapshots.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { update_tx: tx }, rx)
    }
}

#[async_trait]
impl LogSink for ChannelSink {
    async fn on_update(&self, full_text: &str) -> Result<(), RunnerError> {
        trace!(len = full_text.len(), "Forwarding log snapshot");
        self.update_tx
            .send(full_text.to_string())
            .map_err(|_| RunnerError::ChannelClosed)
    }
}

/// A sink that discards updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl LogSink for NullSink {
    async fn on_update(&self, _full_text: &str) -> Result<(), RunnerError> {
        Ok(())
    }
}
