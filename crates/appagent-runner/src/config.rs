//! Orchestrator configuration.

use std::path::PathBuf;

/// How to launch the worker process.
///
/// The argument list is fixed for the lifetime of an orchestrator; task text
/// only ever travels over the worker's input stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    /// Executable to run (PATH lookup applies).
    pub program: String,

    /// Arguments selecting the worker's operating mode.
    pub args: Vec<String>,

    /// Directory the worker is started in.
    pub working_dir: PathBuf,
}

impl Default for WorkerCommand {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec![
                "scripts/task_executor.py".to_string(),
                "--app".to_string(),
                "general".to_string(),
            ],
            working_dir: PathBuf::from("."),
        }
    }
}

/// File name patterns used to pick the artifact inside a run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPatterns {
    /// Annotated screenshots, preferred when present.
    pub labeled_pattern: String,

    /// Any screenshot; fallback when no labeled one exists.
    pub image_pattern: String,
}

impl Default for ArtifactPatterns {
    fn default() -> Self {
        Self {
            labeled_pattern: "*_labeled.png".to_string(),
            image_pattern: "*.png".to_string(),
        }
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Worker launch command.
    pub worker: WorkerCommand,

    /// Directory holding one subdirectory per worker run.
    pub workspace_root: PathBuf,

    /// Environment variable carrying the privacy flag ("true"/"false").
    pub privacy_env_var: String,

    /// When set, the description file path is exported under this name.
    pub description_file_env_var: Option<String>,

    /// Artifact naming conventions.
    pub artifacts: ArtifactPatterns,

    /// Apply the single-character line repair rules of the sanitizer.
    pub repair_fragmented_output: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker: WorkerCommand::default(),
            workspace_root: PathBuf::from("./tasks"),
            privacy_env_var: "PRIVACY_PROTECTION".to_string(),
            description_file_env_var: None,
            artifacts: ArtifactPatterns::default(),
            repair_fragmented_output: true,
        }
    }
}

impl OrchestratorConfig {
    /// Replace the worker command.
    pub fn with_worker(
        mut self,
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.worker.program = program.into();
        self.worker.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the worker's working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.worker.working_dir = dir.into();
        self
    }

    /// Set the workspace root.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    /// Export the description file path to the worker under `name`.
    pub fn with_description_file_env(mut self, name: impl Into<String>) -> Self {
        self.description_file_env_var = Some(name.into());
        self
    }

    /// Enable or disable the fragment repair rules.
    pub fn with_fragment_repair(mut self, enabled: bool) -> Self {
        self.repair_fragmented_output = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.worker.program, "python3");
        assert_eq!(
            config.worker.args,
            vec!["scripts/task_executor.py", "--app", "general"]
        );
        assert_eq!(config.workspace_root, PathBuf::from("./tasks"));
        assert_eq!(config.privacy_env_var, "PRIVACY_PROTECTION");
        assert!(config.description_file_env_var.is_none());
        assert!(config.repair_fragmented_output);
    }

    #[test]
    fn test_config_builder() {
        let config = OrchestratorConfig::default()
            .with_worker("/bin/sh", ["worker.sh"])
            .with_working_dir("/tmp")
            .with_workspace_root("/tmp/tasks")
            .with_description_file_env("TASK_FILE")
            .with_fragment_repair(false);

        assert_eq!(config.worker.program, "/bin/sh");
        assert_eq!(config.worker.args, vec!["worker.sh"]);
        assert_eq!(config.worker.working_dir, PathBuf::from("/tmp"));
        assert_eq!(config.workspace_root, PathBuf::from("/tmp/tasks"));
        assert_eq!(config.description_file_env_var.as_deref(), Some("TASK_FILE"));
        assert!(!config.repair_fragmented_output);
    }
}
