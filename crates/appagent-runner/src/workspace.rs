//! Snapshots of the run directories under the workspace root.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::RunnerError;

/// Names of the run directories present under the workspace root at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceSnapshot {
    dirs: BTreeSet<String>,
}

impl WorkspaceSnapshot {
    /// Capture the directories under `root`, creating `root` first if absent.
    ///
    /// Plain files under the root are ignored, as are names that are not valid UTF-8.
    pub fn capture(root: &Path) -> Result<Self, RunnerError> {
        let workspace_err = |source| RunnerError::Workspace {
            path: root.display().to_string(),
            source,
        };

        fs::create_dir_all(root).map_err(workspace_err)?;

        let mut dirs = BTreeSet::new();
        for entry in fs::read_dir(root).map_err(workspace_err)? {
            let entry = entry.map_err(workspace_err)?;
            if !entry.file_type().map_err(workspace_err)?.is_dir() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                dirs.insert(name);
            }
        }

        debug!(root = %root.display(), dirs = dirs.len(), "Captured workspace snapshot");
        Ok(Self { dirs })
    }

    /// Directory names present in `self` but not in `before`.
    pub fn created_since(&self, before: &WorkspaceSnapshot) -> BTreeSet<String> {
        self.dirs.difference(&before.dirs).cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for WorkspaceSnapshot {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            dirs: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_creates_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("tasks");

        let snapshot = WorkspaceSnapshot::capture(&root).unwrap();

        assert!(root.is_dir());
        assert_eq!(snapshot, WorkspaceSnapshot::default());
    }

    #[test]
    fn test_capture_lists_only_directories() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("run_001")).unwrap();
        fs::create_dir(tmp.path().join("run_002")).unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let snapshot = WorkspaceSnapshot::capture(tmp.path()).unwrap();

        let expected: WorkspaceSnapshot = ["run_001", "run_002"].into_iter().collect();
        assert_eq!(snapshot, expected);
    }

    #[test]
    fn test_created_since() {
        let before: WorkspaceSnapshot = ["run_001"].into_iter().collect();
        let after: WorkspaceSnapshot = ["run_001", "run_002", "run_003"].into_iter().collect();

        let created = after.created_since(&before);
        assert_eq!(
            created.into_iter().collect::<Vec<_>>(),
            vec!["run_002".to_string(), "run_003".to_string()]
        );
        assert!(before.created_since(&before).is_empty());
    }
}
