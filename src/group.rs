//! Groups of trials and the repository that owns them
//!
//! A group is a named, non-empty set of trials recorded under one condition.
//! Analysing it produces the aggregate, trial-summary and group-summary
//! tables; until then the group has no statistics and cannot be compared.

use crate::aggregate::aggregate;
use crate::columns::{derived, stat_column, Statistic, NORMALLY_DISTRIBUTED_SUFFIX, P_VALUE_SUFFIX};
use crate::config::{CoreCount, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::group_summary::summarize_group;
use crate::measurement::infer_core_count;
use crate::preprocess::Trial;
use crate::table::Table;
use crate::trial_summary::summarize_trials;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Derived tables of one analysed group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupArtifacts {
    pub name: String,
    pub aggregate: Table,
    pub trial_summary: Table,
    pub group_summary: Table,
}

/// Headline statistics of one trial-summary metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub metric: String,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub normality_pvalue: Option<f64>,
    pub normally_distributed: Option<bool>,
}

impl GroupArtifacts {
    /// Ids of the summarized trials, in row order
    pub fn trial_ids(&self) -> Vec<&str> {
        self.trial_summary
            .index()
            .map(|index| index.labels.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn metric_summaries(&self) -> Vec<MetricSummary> {
        let row = |column: String| self.group_summary.value(&column, 0);
        self.trial_summary
            .column_names()
            .map(|metric| MetricSummary {
                metric: metric.to_string(),
                mean: row(stat_column(metric, Statistic::Mean)),
                std: row(stat_column(metric, Statistic::Std)),
                min: row(stat_column(metric, Statistic::Min)),
                max: row(stat_column(metric, Statistic::Max)),
                normality_pvalue: row(derived(metric, P_VALUE_SUFFIX)),
                normally_distributed: row(derived(metric, NORMALLY_DISTRIBUTED_SUFFIX))
                    .map(|flag| flag == 1.0),
            })
            .collect()
    }

    /// Human-readable summary of the group statistics
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();
        let trials = self.trial_ids();

        report.push_str(&format!("📦 GROUP: {}\n\n", self.name));
        report.push_str(&format!("Trials: {} ({})\n", trials.len(), trials.join(", ")));
        report.push_str(&format!(
            "Timeline: {} samples\n",
            self.aggregate.row_count()
        ));

        report.push_str("\n📈 Trial metrics:\n");
        for summary in self.metric_summaries() {
            let Some(mean) = summary.mean else {
                report.push_str(&format!("  {}: no data\n", summary.metric));
                continue;
            };
            let std = summary
                .std
                .map(|s| format!(" ± {:.4}", s))
                .unwrap_or_default();
            let normality = match (summary.normally_distributed, summary.normality_pvalue) {
                (Some(true), Some(p)) => format!("normal (p = {:.4})", p),
                (Some(false), Some(p)) => format!("not normal (p = {:.4})", p),
                _ => "normality untested".to_string(),
            };
            report.push_str(&format!(
                "  {}: {:.4}{}, {}\n",
                summary.metric, mean, std, normality
            ));
        }

        report
    }
}

/// A named set of trials
#[derive(Debug, Clone)]
pub struct Group {
    name: String,
    folder: Option<PathBuf>,
    trials: Vec<Trial>,
    artifacts: Option<GroupArtifacts>,
}

/// Group names become directory names
fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PipelineError::configuration("group name must not be empty"));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(PipelineError::configuration(format!(
            "group name '{}' is not usable as a directory name",
            name
        )));
    }
    Ok(())
}

/// Whether two group names collide (Unicode case-insensitive)
pub fn same_name(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

impl Group {
    /// Create a group from already loaded trials, ordered by id
    ///
    /// # Errors
    /// `Configuration` for an invalid name or an empty trial list.
    pub fn new(name: impl Into<String>, mut trials: Vec<Trial>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        if trials.is_empty() {
            return Err(PipelineError::configuration(format!(
                "group '{}' has no trials",
                name
            )));
        }
        trials.sort_by(|a, b| a.id().cmp(b.id()));

        Ok(Self {
            name,
            folder: None,
            trials,
            artifacts: None,
        })
    }

    /// Load every `*.csv` file in `folder` as a trial
    ///
    /// # Errors
    /// `Configuration` when the folder is missing or holds no trial files;
    /// `Data` when a trial file cannot be parsed.
    pub fn from_folder(name: impl Into<String>, folder: &Path) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        if !folder.is_dir() {
            return Err(PipelineError::configuration(format!(
                "trial folder '{}' for group '{}' does not exist",
                folder.display(),
                name
            )));
        }

        let entries = fs::read_dir(folder).map_err(|e| PipelineError::io(folder, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| PipelineError::io(folder, e))?.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if is_csv && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(PipelineError::configuration(format!(
                "trial folder '{}' for group '{}' contains no CSV files",
                folder.display(),
                name
            )));
        }

        let trials = paths
            .iter()
            .map(|path| Trial::load(path))
            .collect::<Result<Vec<_>>>()?;
        debug!(group = %name, trials = trials.len(), "loaded trial folder");

        let mut group = Self::new(name, trials)?;
        group.folder = Some(folder.to_path_buf());
        Ok(group)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source folder, when loaded from disk
    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// Statistics, once [`Group::analyze`] succeeded
    pub fn artifacts(&self) -> Option<&GroupArtifacts> {
        self.artifacts.as_ref()
    }

    /// Number of cores the trial summary covers
    pub fn core_count(&self, setting: CoreCount) -> usize {
        match setting {
            CoreCount::Fixed(n) => n,
            CoreCount::Inferred => infer_core_count(
                self.trials
                    .iter()
                    .flat_map(|trial| trial.table().column_names()),
            ),
        }
    }

    /// Aggregate, summarize and test the group
    ///
    /// All three tables are computed before any is stored, so a failure
    /// leaves the group without statistics.
    pub fn analyze(&mut self, config: &PipelineConfig) -> Result<&GroupArtifacts> {
        let core_count = self.core_count(config.core_count);

        let aggregate = aggregate(&self.name, &self.trials)?;
        let trial_summary = summarize_trials(&self.trials, core_count)?;
        let group_summary = summarize_group(&trial_summary, config)?;

        info!(
            group = %self.name,
            trials = self.trials.len(),
            core_count,
            "group analysed"
        );

        Ok(&*self.artifacts.insert(GroupArtifacts {
            name: self.name.clone(),
            aggregate,
            trial_summary,
            group_summary,
        }))
    }
}

/// Owns all groups; names are unique ignoring case
#[derive(Debug, Default)]
pub struct GroupRepository {
    groups: Vec<Group>,
}

impl GroupRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.groups
            .iter()
            .position(|g| same_name(&g.name, name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Add a group
    ///
    /// # Errors
    /// `Configuration` when a group with the same name exists.
    pub fn add(&mut self, group: Group) -> Result<&Group> {
        if let Some(existing) = self.position(&group.name) {
            return Err(PipelineError::configuration(format!(
                "group '{}' already exists as '{}'",
                group.name, self.groups[existing].name
            )));
        }
        self.groups.push(group);
        Ok(&self.groups[self.groups.len() - 1])
    }

    pub fn find(&self, name: &str) -> Option<&Group> {
        self.position(name).map(|i| &self.groups[i])
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.position(name).map(move |i| &mut self.groups[i])
    }

    /// Remove a group and hand it back
    ///
    /// # Errors
    /// `NotFound` for an unknown name.
    pub fn remove(&mut self, name: &str) -> Result<Group> {
        let position = self
            .position(name)
            .ok_or_else(|| PipelineError::NotFound(name.to_string()))?;
        Ok(self.groups.remove(position))
    }

    /// Groups in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
