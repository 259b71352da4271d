//! Error types for the task runner.

use thiserror::Error;

/// Errors that can occur while orchestrating a worker run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The worker process could not be started.
    #[error("Failed to launch worker '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The pipe carrying the worker's merged output could not be set up.
    #[error("Failed to create worker output pipe: {0}")]
    OutputPipe(#[source] std::io::Error),

    /// Reading the worker's merged output failed.
    #[error("Failed to read worker output: {0}")]
    Stream(#[source] std::io::Error),

    /// Writing the task description to the worker's input failed.
    #[error("Failed to write task to worker input: {0}")]
    Stdin(#[source] std::io::Error),

    /// Waiting for the worker to terminate failed.
    #[error("Failed to wait for worker: {0}")]
    Wait(#[source] std::io::Error),

    /// The workspace root could not be created or listed.
    #[error("Workspace error at '{path}': {source}")]
    Workspace {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The transient task description file could not be written.
    #[error("Failed to write task description file: {0}")]
    DescriptionFile(#[source] std::io::Error),

    /// An artifact file name pattern did not parse.
    #[error("Invalid artifact pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// A run is already in flight on this orchestrator.
    #[error("Another task is already running")]
    Busy,

    /// A background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A display sink rejected an update.
    #[error("Display sink error: {0}")]
    Sink(String),

    /// Channel send error.
    #[error("Channel closed")]
    ChannelClosed,

    /// A worker stdio handle was not available after spawn.
    #[error("Worker {0} handle unavailable")]
    MissingPipe(&'static str),
}
