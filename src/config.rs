// Configuration for the aggregation and comparison pipeline
//
// PipelineConfig carries the statistical thresholds and output location;
// ExperimentConfig describes a batch of groups and the pairs to compare.
// Both load from TOML and every field falls back to its default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of persisted artifacts
pub const DEFAULT_OUTPUT_DIR: &str = "csv-data/output";

/// How many per-core scalar metrics a trial summary carries
///
/// ```toml
/// core_count = { fixed = 8 }
/// # or
/// core_count = "inferred"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreCount {
    /// Always summarize cores `0..n`; cores missing from a trial yield nulls
    Fixed(usize),
    /// Highest `CORE{i}_` energy/power column across the group's trials
    Inferred,
}

impl Default for CoreCount {
    fn default() -> Self {
        CoreCount::Fixed(8)
    }
}

/// Mapping from a comparison p-value to the `_significant` flag
///
/// The dashboards built on these artifacts read the flag with the legacy
/// polarity, so that stays the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificanceRule {
    /// `p >= alpha` sets the flag (legacy dashboard semantics)
    #[default]
    AtLeastAlpha,
    /// `p < alpha` sets the flag (null hypothesis rejected)
    BelowAlpha,
}

impl SignificanceRule {
    pub fn is_significant(self, pvalue: f64, alpha: f64) -> bool {
        match self {
            SignificanceRule::AtLeastAlpha => pvalue >= alpha,
            SignificanceRule::BelowAlpha => pvalue < alpha,
        }
    }
}

/// Statistical thresholds and output location
///
/// # Example
/// ```
/// use energy_stats::config::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.significance_level, 0.05);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory of group and comparison artifacts
    pub output_dir: PathBuf,

    /// Alpha for the cross-group test
    pub significance_level: f64,

    /// Alpha for Shapiro-Wilk; `p >= alpha` counts as normally distributed
    pub normality_level: f64,

    /// Trials required before the normality test runs (at least 3)
    pub min_normality_samples: usize,

    pub core_count: CoreCount,

    pub significance_rule: SignificanceRule,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            significance_level: 0.05,
            normality_level: 0.05,
            min_normality_samples: 3,
            core_count: CoreCount::default(),
            significance_rule: SignificanceRule::default(),
        }
    }
}

impl PipelineConfig {
    /// Textbook semantics: significant means `p < alpha`, cores inferred
    /// from the trial columns
    pub fn conventional() -> Self {
        Self {
            core_count: CoreCount::Inferred,
            significance_rule: SignificanceRule::BelowAlpha,
            ..Self::default()
        }
    }

    /// Load from a TOML file and validate
    ///
    /// # Example TOML
    /// ```toml
    /// output_dir = "results"
    /// significance_level = 0.01
    /// core_count = "inferred"
    /// significance_rule = "below_alpha"
    /// ```
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        let config: Self = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML pipeline configuration")?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.significance_level) {
            return Err(format!(
                "significance_level must be in [0, 1], got {}",
                self.significance_level
            ));
        }

        if !(0.0..=1.0).contains(&self.normality_level) {
            return Err(format!(
                "normality_level must be in [0, 1], got {}",
                self.normality_level
            ));
        }

        if self.min_normality_samples < 3 {
            return Err(format!(
                "min_normality_samples must be >= 3 for Shapiro-Wilk, got {}",
                self.min_normality_samples
            ));
        }

        if self.core_count == CoreCount::Fixed(0) {
            return Err("core_count must be at least 1 when fixed".to_string());
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err("output_dir must not be empty".to_string());
        }

        Ok(())
    }
}

/// One group of an experiment file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSource {
    pub name: String,
    /// Directory of trial CSV files
    pub folder: PathBuf,
}

/// Batch description for `energy-stats run`
///
/// # Example TOML
/// ```toml
/// comparisons = [["baseline", "optimized"]]
///
/// [pipeline]
/// significance_rule = "below_alpha"
///
/// [[group]]
/// name = "baseline"
/// folder = "raw/baseline"
///
/// [[group]]
/// name = "optimized"
/// folder = "raw/optimized"
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Overrides the pipeline configuration given on the command line
    #[serde(default)]
    pub pipeline: Option<PipelineConfig>,

    #[serde(default, rename = "group")]
    pub groups: Vec<GroupSource>,

    /// Group name lists; each must name exactly two groups
    #[serde(default)]
    pub comparisons: Vec<Vec<String>>,
}

impl ExperimentConfig {
    /// Load from a TOML file
    ///
    /// Relative group folders resolve against the file's directory.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read experiment file: {}", path.display()))?;
        let mut experiment: Self = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML experiment definition")?;

        if let Some(pipeline) = &experiment.pipeline {
            pipeline.validate().map_err(anyhow::Error::msg)?;
        }

        if let Some(base) = path.parent() {
            for group in &mut experiment.groups {
                if group.folder.is_relative() {
                    group.folder = base.join(&group.folder);
                }
            }
        }

        Ok(experiment)
    }
}
