//! On-disk artifact layout
//!
//! ```text
//! {root}/{group}/aggregate_data.csv
//! {root}/{group}/trial_summary.csv
//! {root}/{group}/group_summary.csv
//! {root}/{A}_vs_{B}/group_comparison.csv
//! {root}/{A}_vs_{B}/aggregate_summary.csv
//! ```
//!
//! A stage's files are rendered in memory, written next to their targets
//! under temporary names and renamed into place. Files from an earlier run
//! are set aside first. If any step fails the stage's new files are removed
//! and the earlier files are put back.

use crate::columns::TRIAL_INDEX;
use crate::compare::Comparison;
use crate::error::{PipelineError, Result};
use crate::group::GroupArtifacts;
use crate::table::Table;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const AGGREGATE_FILE: &str = "aggregate_data.csv";
pub const TRIAL_SUMMARY_FILE: &str = "trial_summary.csv";
pub const GROUP_SUMMARY_FILE: &str = "group_summary.csv";
pub const COMPARISON_FILE: &str = "group_comparison.csv";
pub const COMBINED_AGGREGATE_FILE: &str = "aggregate_summary.csv";

/// Maps groups and comparisons to artifact paths under one root
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn group_dir(&self, group: &str) -> PathBuf {
        self.root.join(group)
    }

    pub fn comparison_dir(&self, group_a: &str, group_b: &str) -> PathBuf {
        self.root.join(format!("{}_vs_{}", group_a, group_b))
    }

    /// Persist the three group tables
    pub fn save_group(&self, artifacts: &GroupArtifacts) -> Result<Vec<PathBuf>> {
        let paths = write_stage(
            &self.group_dir(&artifacts.name),
            &[
                (AGGREGATE_FILE, &artifacts.aggregate),
                (TRIAL_SUMMARY_FILE, &artifacts.trial_summary),
                (GROUP_SUMMARY_FILE, &artifacts.group_summary),
            ],
        )?;
        info!(group = %artifacts.name, files = paths.len(), "group artifacts persisted");
        Ok(paths)
    }

    /// Load previously persisted group tables
    ///
    /// # Errors
    /// `NotFound` when the group has no artifact directory.
    pub fn load_group(&self, group: &str) -> Result<GroupArtifacts> {
        let dir = self.group_dir(group);
        if !dir.is_dir() {
            return Err(PipelineError::NotFound(group.to_string()));
        }

        Ok(GroupArtifacts {
            name: group.to_string(),
            aggregate: Table::read_csv(&dir.join(AGGREGATE_FILE), None)?,
            trial_summary: Table::read_csv(&dir.join(TRIAL_SUMMARY_FILE), Some(TRIAL_INDEX))?,
            group_summary: Table::read_csv(&dir.join(GROUP_SUMMARY_FILE), None)?,
        })
    }

    /// Delete a group's artifact directory; a missing directory is fine
    pub fn remove_group(&self, group: &str) -> Result<()> {
        let dir = self.group_dir(group);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::io(dir, e)),
        }
    }

    /// Persist the comparison and combined aggregate tables
    pub fn save_comparison(&self, comparison: &Comparison) -> Result<Vec<PathBuf>> {
        let paths = write_stage(
            &self.comparison_dir(&comparison.group_a, &comparison.group_b),
            &[
                (COMPARISON_FILE, &comparison.table),
                (COMBINED_AGGREGATE_FILE, &comparison.combined),
            ],
        )?;
        info!(
            group_a = %comparison.group_a,
            group_b = %comparison.group_b,
            "comparison artifacts persisted"
        );
        Ok(paths)
    }
}

fn hidden_path(target: &Path, suffix: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}", name, suffix))
}

fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to clean up artifact");
            }
        }
    }
}

/// Move set-aside files back over their targets
fn restore(backups: &[(PathBuf, PathBuf)]) {
    for (target, backup) in backups {
        if let Err(e) = fs::rename(backup, target) {
            warn!(path = %target.display(), error = %e, "failed to restore previous artifact");
        }
    }
}

/// Write all `files` into `dir`, all or nothing
///
/// On failure the directory holds exactly the files it held before.
fn write_stage(dir: &Path, files: &[(&str, &Table)]) -> Result<Vec<PathBuf>> {
    let rendered: Vec<(PathBuf, String)> = files
        .iter()
        .map(|(name, table)| (dir.join(name), table.to_csv()))
        .collect();

    fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;

    let mut staged = Vec::with_capacity(rendered.len());
    for (target, content) in &rendered {
        let temp = hidden_path(target, "tmp");
        if let Err(e) = fs::write(&temp, content) {
            staged.push(temp.clone());
            discard(&staged);
            return Err(PipelineError::io(temp, e));
        }
        staged.push(temp);
    }

    // previous artifacts; directories in the way are not ours to move
    let mut backups = Vec::new();
    for (target, _) in &rendered {
        if !target.is_file() {
            continue;
        }
        let backup = hidden_path(target, "bak");
        if let Err(e) = fs::rename(target, &backup) {
            restore(&backups);
            discard(&staged);
            return Err(PipelineError::io(target.clone(), e));
        }
        backups.push((target.clone(), backup));
    }

    let mut placed = Vec::with_capacity(rendered.len());
    for (temp, (target, _)) in staged.iter().zip(&rendered) {
        if let Err(e) = fs::rename(temp, target) {
            discard(&placed);
            restore(&backups);
            discard(&staged);
            return Err(PipelineError::io(target.clone(), e));
        }
        placed.push(target.clone());
    }

    let set_aside: Vec<PathBuf> = backups.into_iter().map(|(_, backup)| backup).collect();
    discard(&set_aside);

    Ok(placed)
}
