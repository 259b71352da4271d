//! Command line configuration for a task run.

use std::path::PathBuf;

use appagent_runner::{ArtifactPatterns, OrchestratorConfig, WorkerCommand};
use clap::Args;

/// Options of the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Task description sent to the worker
    pub description: String,

    /// Enable the worker's privacy protection mode
    #[arg(long)]
    pub privacy: bool,

    /// Workspace root holding one directory per worker run
    #[arg(long, default_value = "./tasks")]
    pub workspace: PathBuf,

    /// Worker executable
    #[arg(long, default_value = "python3")]
    pub program: String,

    /// Worker argument (repeatable; defaults to the task executor in general mode)
    #[arg(long = "arg", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Directory the worker is started in
    #[arg(long, default_value = ".")]
    pub working_dir: PathBuf,

    /// Environment variable carrying the privacy flag
    #[arg(long, default_value = "PRIVACY_PROTECTION")]
    pub privacy_env: String,

    /// Export the task description file path under this variable
    #[arg(long)]
    pub description_file_env: Option<String>,

    /// File pattern of annotated screenshots
    #[arg(long, default_value = "*_labeled.png")]
    pub labeled_pattern: String,

    /// File pattern of plain screenshots
    #[arg(long, default_value = "*.png")]
    pub image_pattern: String,

    /// Keep single-character output lines as they are
    #[arg(long)]
    pub no_repair: bool,

    /// Emit JSON lines events instead of the terminal display
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Build the orchestrator configuration.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let args = if self.args.is_empty() {
            WorkerCommand::default().args
        } else {
            self.args.clone()
        };

        OrchestratorConfig {
            worker: WorkerCommand {
                program: self.program.clone(),
                args,
                working_dir: self.working_dir.clone(),
            },
            workspace_root: self.workspace.clone(),
            privacy_env_var: self.privacy_env.clone(),
            description_file_env_var: self.description_file_env.clone(),
            artifacts: ArtifactPatterns {
                labeled_pattern: self.labeled_pattern.clone(),
                image_pattern: self.image_pattern.clone(),
            },
            repair_fragmented_output: !self.no_repair,
        }
    }
}
