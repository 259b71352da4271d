//! Discovery of the screenshot a finished worker run left behind.
//!
//! The worker creates one directory per run under the workspace root. The
//! locator diffs the before/after snapshots, picks the newest created
//! directory and returns the last labeled screenshot in it, falling back to
//! the last plain screenshot.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use glob::{MatchOptions, Pattern};
use tracing::{debug, info, warn};

use crate::config::ArtifactPatterns;
use crate::error::RunnerError;
use crate::workspace::WorkspaceSnapshot;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Finds the artifact of a completed run.
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    labeled: Pattern,
    image: Pattern,
}

impl ArtifactLocator {
    /// Build a locator from file name patterns.
    pub fn new(patterns: &ArtifactPatterns) -> Result<Self, RunnerError> {
        Ok(Self {
            labeled: Pattern::new(&patterns.labeled_pattern)?,
            image: Pattern::new(&patterns.image_pattern)?,
        })
    }

    /// Locate the artifact produced between the two snapshots.
    ///
    /// Returns `None` when no run directory was created or it holds no image.
    pub fn locate(
        &self,
        before: &WorkspaceSnapshot,
        after: &WorkspaceSnapshot,
        root: &Path,
    ) -> Option<PathBuf> {
        let created = after.created_since(before);
        if created.is_empty() {
            debug!(root = %root.display(), "No run directory created");
            return None;
        }

        let run_dir = newest_dir(root, created.iter().map(String::as_str))?;
        info!(run_dir = %run_dir.display(), candidates = created.len(), "Selected run directory");

        let files = match list_files(&run_dir) {
            Ok(files) => files,
            Err(e) => {
                warn!(run_dir = %run_dir.display(), error = %e, "Failed to list run directory");
                return None;
            }
        };

        let artifact = last_matching(&files, &self.labeled)
            .or_else(|| last_matching(&files, &self.image))
            .map(|name| run_dir.join(name));

        match &artifact {
            Some(path) => info!(artifact = %path.display(), "Located artifact"),
            None => debug!(run_dir = %run_dir.display(), "Run directory holds no image"),
        }
        artifact
    }
}

impl Default for ArtifactLocator {
    fn default() -> Self {
        Self {
            labeled: Pattern::new("*_labeled.png").expect("labeled pattern"),
            image: Pattern::new("*.png").expect("image pattern"),
        }
    }
}

/// Pick the directory with the latest creation time.
///
/// Equal timestamps resolve to the greatest name, so the choice is stable.
fn newest_dir<'a>(root: &Path, names: impl Iterator<Item = &'a str>) -> Option<PathBuf> {
    names
        .filter_map(|name| {
            let path = root.join(name);
            match created_at(&path) {
                Ok(time) => Some((time, name, path)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable run directory");
                    None
                }
            }
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)))
        .map(|(_, _, path)| path)
}

/// Creation time, or modification time where the platform has no birth time.
fn created_at(path: &Path) -> std::io::Result<SystemTime> {
    let metadata = fs::metadata(path)?;
    metadata.created().or_else(|_| metadata.modified())
}

/// Names of the regular files in `dir`, sorted ascending.
fn list_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn last_matching<'a>(sorted_names: &'a [String], pattern: &Pattern) -> Option<&'a str> {
    sorted_names
        .iter()
        .rev()
        .find(|name| pattern.matches_with(name, MATCH_OPTIONS))
        .map(String::as_str)
}
