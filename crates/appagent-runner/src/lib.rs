//! Task execution orchestrator for AppAgent.
//!
//! This crate launches the external mobile-automation worker, streams and
//! sanitizes its output for live display, waits for it to finish and then
//! finds the screenshot the worker left in the workspace.
//!
//! # Example
//!
//! ```rust,no_run
//! use appagent_core::TaskRequest;
//! use appagent_runner::{ChannelSink, Orchestrator, OrchestratorConfig};
//!
//! async fn run_task() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new(
//!         OrchestratorConfig::default().with_workspace_root("./tasks"),
//!     )?;
//!
//!     let (sink, mut rx) = ChannelSink::new();
//!     tokio::spawn(async move {
//!         while let Some(log) = rx.recv().await {
//!             println!("{}", log);
//!         }
//!     });
//!
//!     let request = TaskRequest::new("Send an email to my main contact", true)?;
//!     let result = orchestrator.execute(request, &sink).await;
//!
//!     println!("{} -> {:?}", result.message, result.artifact_path);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod locator;
mod log;
mod orchestrator;
pub mod sanitize;
mod workspace;

// Re-export main types
pub use config::{ArtifactPatterns, OrchestratorConfig, WorkerCommand};
pub use error::RunnerError;
pub use locator::ArtifactLocator;
pub use log::{ChannelSink, LogBuffer, LogSink, NullSink};
pub use orchestrator::Orchestrator;
pub use sanitize::{sanitize, StreamSanitizer, LINE_BREAK};
pub use workspace::WorkspaceSnapshot;
