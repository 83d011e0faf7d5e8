//! energy-stats - Trial aggregation and statistical group comparison for
//! energy measurements
//!
//! This library turns folders of repeated measurement runs into per-group
//! aggregate statistics, per-trial scalar metrics with normality assessment,
//! and significance-tested comparisons between two groups, persisted as CSV
//! artifacts.

pub mod aggregate;
pub mod artifacts;
pub mod cli;
pub mod columns;
pub mod compare;
pub mod config;
pub mod error;
pub mod group;
pub mod group_summary;
pub mod measurement;
pub mod pipeline;
pub mod preprocess;
pub mod statistics;
pub mod table;
pub mod trial_summary;

pub use error::{PipelineError, Result};
