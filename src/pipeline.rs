//! Pipeline service
//!
//! Wires the stages together behind the collaborator interface: create a
//! group from a trial folder, delete it, and compare two groups. Every
//! operation validates first and persists last, so a failure leaves the
//! artifact directory as it was.

use crate::artifacts::ArtifactStore;
use crate::compare::{compare_groups, Comparison};
use crate::config::{ExperimentConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::group::{Group, GroupArtifacts, GroupRepository};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Groups, configuration and artifact store of one session
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    repository: GroupRepository,
    store: ArtifactStore,
}

/// Outcome of a batch experiment
#[derive(Debug, Serialize)]
pub struct ExperimentReport {
    pub groups: Vec<String>,
    pub comparisons: Vec<Comparison>,
}

impl Pipeline {
    /// # Errors
    /// `Configuration` when the configuration does not validate.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate().map_err(PipelineError::Configuration)?;
        let store = ArtifactStore::new(config.output_dir.clone());
        Ok(Self {
            config,
            repository: GroupRepository::new(),
            store,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Load, analyse and persist a group
    ///
    /// # Errors
    /// - `Configuration` for a duplicate name, a missing folder or a folder
    ///   without trials
    /// - `Data` / `Statistical` from the analysis stages
    pub fn create_group(&mut self, name: &str, folder: &Path) -> Result<&Group> {
        if let Some(existing) = self.repository.find(name) {
            return Err(PipelineError::configuration(format!(
                "group '{}' already exists as '{}'",
                name,
                existing.name()
            )));
        }

        let mut group = Group::from_folder(name, folder)?;
        let artifacts = group.analyze(&self.config)?;
        self.store.save_group(artifacts)?;

        info!(group = name, folder = %folder.display(), "group created");
        self.repository.add(group)
    }

    /// Drop a group and its persisted artifacts
    ///
    /// # Errors
    /// `NotFound` for an unknown name.
    pub fn delete_group(&mut self, name: &str) -> Result<Group> {
        let group = self.repository.remove(name)?;
        self.store.remove_group(group.name())?;
        info!(group = %group.name(), "group deleted");
        Ok(group)
    }

    pub fn find_group(&self, name: &str) -> Option<&Group> {
        self.repository.find(name)
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.repository.iter()
    }

    /// Statistics of a group: in memory when created in this session,
    /// otherwise from its persisted artifacts
    pub fn group_statistics(&self, name: &str) -> Result<GroupArtifacts> {
        match self.repository.find(name) {
            Some(group) => group.artifacts().cloned().ok_or_else(|| {
                PipelineError::configuration(format!("group '{}' has not been analysed", name))
            }),
            None => self.store.load_group(name),
        }
    }

    /// Compare exactly two groups and persist the result
    ///
    /// # Errors
    /// - `Configuration` unless exactly two distinct groups are named
    /// - `NotFound` when a group is neither loaded nor persisted
    /// - `Statistical` when a metric cannot be tested
    pub fn compare(&self, names: &[&str]) -> Result<Comparison> {
        if names.len() != 2 {
            return Err(PipelineError::configuration(format!(
                "comparison needs exactly 2 groups, got {}",
                names.len()
            )));
        }

        let statistics = names
            .iter()
            .map(|name| self.group_statistics(name))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&GroupArtifacts> = statistics.iter().collect();

        let comparison = compare_groups(&refs, &self.config)?;
        self.store.save_comparison(&comparison)?;
        Ok(comparison)
    }

    /// Create every group of an experiment, then run its comparisons
    pub fn run_experiment(&mut self, experiment: &ExperimentConfig) -> Result<ExperimentReport> {
        let mut groups = Vec::with_capacity(experiment.groups.len());
        for source in &experiment.groups {
            let group = self.create_group(&source.name, &source.folder)?;
            groups.push(group.name().to_string());
        }

        let mut comparisons = Vec::with_capacity(experiment.comparisons.len());
        for pair in &experiment.comparisons {
            let names: Vec<&str> = pair.iter().map(String::as_str).collect();
            comparisons.push(self.compare(&names)?);
        }

        Ok(ExperimentReport {
            groups,
            comparisons,
        })
    }

    /// Artifact directory of a group
    pub fn group_dir(&self, name: &str) -> PathBuf {
        self.store.group_dir(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_group(root: &Path, name: &str, energies: &[f64]) -> PathBuf {
        let folder = root.join("raw").join(name);
        fs::create_dir_all(&folder).unwrap();
        for (i, energy) in energies.iter().enumerate() {
            fs::write(
                folder.join(format!("run_{}.csv", i)),
                format!("Time,Delta,CPU_ENERGY (J)\n0,0,0\n100,100,{}\n", energy),
            )
            .unwrap();
        }
        folder
    }

    fn pipeline(root: &Path) -> Pipeline {
        Pipeline::new(PipelineConfig {
            output_dir: root.join("out"),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            significance_level: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_create_find_delete() {
        let dir = TempDir::new().unwrap();
        let folder = write_group(dir.path(), "base", &[10.0, 12.0, 11.0]);
        let mut pipeline = pipeline(dir.path());

        pipeline.create_group("base", &folder).unwrap();
        assert!(pipeline.find_group("BASE").is_some());
        assert!(pipeline.group_dir("base").join("group_summary.csv").is_file());

        let err = pipeline.create_group("Base", &folder).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));

        pipeline.delete_group("base").unwrap();
        assert!(pipeline.find_group("base").is_none());
        assert!(!pipeline.group_dir("base").exists());
        assert!(matches!(
            pipeline.delete_group("base"),
            Err(PipelineError::NotFound(_))
        ));
    }

    #[test]
    fn test_compare_uses_persisted_statistics() {
        let dir = TempDir::new().unwrap();
        let base = write_group(dir.path(), "base", &[10.0, 12.0, 11.0]);
        let opt = write_group(dir.path(), "opt", &[20.0, 22.0, 19.0]);

        let mut first = pipeline(dir.path());
        first.create_group("base", &base).unwrap();
        first.create_group("opt", &opt).unwrap();

        let fresh = pipeline(dir.path());
        let comparison = fresh.compare(&["base", "opt"]).unwrap();
        assert_eq!(comparison.metrics[0].metric, "CPU_Total_Energy (J)");
        assert!(fresh
            .store()
            .comparison_dir("base", "opt")
            .join("group_comparison.csv")
            .is_file());
    }

    #[test]
    fn test_compare_wrong_count_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let folder = write_group(dir.path(), "base", &[10.0, 12.0, 11.0]);
        let mut pipeline = pipeline(dir.path());
        pipeline.create_group("base", &folder).unwrap();

        let err = pipeline.compare(&["base"]).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        let entries: Vec<_> = fs::read_dir(dir.path().join("out")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_compare_unknown_group() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(dir.path());
        assert!(matches!(
            pipeline.compare(&["a", "b"]),
            Err(PipelineError::NotFound(_))
        ));
    }
}
