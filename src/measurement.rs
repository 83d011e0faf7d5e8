//! Measurement catalog
//!
//! Static mapping from a measurement type to the raw column patterns it
//! matches, its display unit and the analyses it feeds. Scalar metrics
//! (total energy, peak power) are named from the same catalog.

use crate::table::Table;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Analyses a measurement can take part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Context {
    /// Per-timestamp aggregation across trials
    OverTime,
    /// Per-trial scalar summary and group statistics
    Statistics,
    /// Cross-group hypothesis testing
    SignificanceTest,
}

/// Raw measurement families found in trial files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementType {
    SystemPower,
    SystemEnergy,
    CpuEnergy,
    CpuPower,
    CoreEnergy,
    CorePower,
    CoreVoltage,
    Frequencies,
    CpuUsage,
    Memory,
    Temperature,
    Gpu,
}

/// Catalog record of a measurement type
#[derive(Debug)]
pub struct MeasurementSpec {
    /// Anchored regular expressions; per-core patterns capture the core number
    pub patterns: &'static [&'static str],
    pub unit: &'static str,
    pub contexts: &'static [Context],
}

const OVER_TIME: &[Context] = &[Context::OverTime];
const ALL_CONTEXTS: &[Context] = &[
    Context::OverTime,
    Context::Statistics,
    Context::SignificanceTest,
];

impl MeasurementType {
    pub const ALL: [MeasurementType; 12] = [
        MeasurementType::SystemPower,
        MeasurementType::SystemEnergy,
        MeasurementType::CpuEnergy,
        MeasurementType::CpuPower,
        MeasurementType::CoreEnergy,
        MeasurementType::CorePower,
        MeasurementType::CoreVoltage,
        MeasurementType::Frequencies,
        MeasurementType::CpuUsage,
        MeasurementType::Memory,
        MeasurementType::Temperature,
        MeasurementType::Gpu,
    ];

    pub fn spec(self) -> &'static MeasurementSpec {
        match self {
            MeasurementType::SystemPower => &MeasurementSpec {
                patterns: &[r"^SYSTEM_POWER \((W|Watts)\)$"],
                unit: "watt",
                contexts: OVER_TIME,
            },
            MeasurementType::SystemEnergy => &MeasurementSpec {
                patterns: &[r"^SYSTEM_ENERGY \(J\)$"],
                unit: "joule",
                contexts: OVER_TIME,
            },
            MeasurementType::CpuEnergy => &MeasurementSpec {
                patterns: &[r"^CPU_ENERGY \(J\)$", r"^PACKAGE_ENERGY \(J\)$"],
                unit: "joule",
                contexts: ALL_CONTEXTS,
            },
            MeasurementType::CpuPower => &MeasurementSpec {
                patterns: &[r"^CPU_POWER \((W|Watts)\)$", r"^PACKAGE_POWER \((W|Watts)\)$"],
                unit: "watt",
                contexts: ALL_CONTEXTS,
            },
            MeasurementType::CoreEnergy => &MeasurementSpec {
                patterns: &[r"^CORE(\d+)_ENERGY \(J\)$"],
                unit: "joule",
                contexts: ALL_CONTEXTS,
            },
            MeasurementType::CorePower => &MeasurementSpec {
                patterns: &[r"^CORE(\d+)_POWER \((W|Watts)\)$"],
                unit: "watt",
                contexts: ALL_CONTEXTS,
            },
            MeasurementType::CoreVoltage => &MeasurementSpec {
                patterns: &[r"^CORE(\d+)_VOLT \(V\)$"],
                unit: "volt",
                contexts: OVER_TIME,
            },
            MeasurementType::Frequencies => &MeasurementSpec {
                patterns: &[r"^CPU_FREQUENCY_\d+$", r"^CORE\d+_FREQ \(MHZ\)$"],
                unit: "MHz",
                contexts: OVER_TIME,
            },
            MeasurementType::CpuUsage => &MeasurementSpec {
                patterns: &[r"^CPU_USAGE_\d+$"],
                unit: "percent",
                contexts: OVER_TIME,
            },
            MeasurementType::Memory => &MeasurementSpec {
                patterns: &[
                    r"^TOTAL_MEMORY$",
                    r"^TOTAL_SWAP$",
                    r"^USED_MEMORY$",
                    r"^USED_SWAP$",
                ],
                unit: "bytes",
                contexts: OVER_TIME,
            },
            MeasurementType::Temperature => &MeasurementSpec {
                patterns: &[r"^CPU_TEMP_\d+$"],
                unit: "celsius",
                contexts: OVER_TIME,
            },
            MeasurementType::Gpu => &MeasurementSpec {
                patterns: &[r"^GPU\d*_"],
                unit: "none",
                contexts: OVER_TIME,
            },
        }
    }

    pub fn unit(self) -> &'static str {
        self.spec().unit
    }

    pub fn supports(self, context: Context) -> bool {
        self.spec().contexts.contains(&context)
    }

    fn regexes(self) -> &'static [Regex] {
        COMPILED
            .get(&self)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether a raw column belongs to this measurement type
    pub fn matches(self, column: &str) -> bool {
        self.regexes().iter().any(|re| re.is_match(column))
    }

    /// First measurement type whose patterns match `column`
    pub fn classify(column: &str) -> Option<MeasurementType> {
        Self::ALL.into_iter().find(|m| m.matches(column))
    }

    /// First of `names` matching this type, in pattern priority order
    pub fn find_in<'a>(self, names: &[&'a str]) -> Option<&'a str> {
        self.regexes()
            .iter()
            .find_map(|re| names.iter().copied().find(|name| re.is_match(name)))
    }

    /// First column of `table` matching this type, in pattern priority order
    pub fn find_column(self, table: &Table) -> Option<&str> {
        let names: Vec<&str> = table.column_names().collect();
        self.find_in(&names)
    }

    /// Column of `table` holding this per-core measurement for `core`
    pub fn find_core_column(self, table: &Table, core: usize) -> Option<&str> {
        table
            .column_names()
            .find(|name| self.core_number(name) == Some(core))
    }

    /// Core number captured from a per-core column name
    pub fn core_number(self, column: &str) -> Option<usize> {
        self.regexes().iter().find_map(|re| {
            re.captures(column)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok())
        })
    }
}

lazy_static! {
    static ref COMPILED: HashMap<MeasurementType, Vec<Regex>> = MeasurementType::ALL
        .into_iter()
        .map(|m| {
            let regexes = m
                .spec()
                .patterns
                .iter()
                .map(|p| Regex::new(p).expect("catalog patterns are valid"))
                .collect();
            (m, regexes)
        })
        .collect();
}

/// Number of cores seen in per-core energy or power columns
///
/// Returns highest core number + 1, or 0 when no per-core columns exist.
pub fn infer_core_count<'a>(columns: impl IntoIterator<Item = &'a str>) -> usize {
    columns
        .into_iter()
        .filter_map(|name| {
            MeasurementType::CoreEnergy
                .core_number(name)
                .or_else(|| MeasurementType::CorePower.core_number(name))
        })
        .map(|core| core + 1)
        .max()
        .unwrap_or(0)
}

/// Whole-CPU or single-core scope of a scalar metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Cpu,
    Core(usize),
}

/// Reduction applied to one trial's time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    /// Energy consumed over the whole trial
    TotalEnergy,
    /// Highest power sample of the trial
    PeakPower,
}

/// Per-trial scalar metric such as `CPU_Total_Energy (J)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalarMetric {
    pub scope: Scope,
    pub kind: ScalarKind,
}

lazy_static! {
    static ref SCALAR_NAME: Regex =
        Regex::new(r"^(CPU|CORE(\d+))_(Total_Energy \(J\)|Peak_Power \(W\))$")
            .expect("scalar metric pattern is valid");
}

impl ScalarMetric {
    pub fn new(scope: Scope, kind: ScalarKind) -> Self {
        Self { scope, kind }
    }

    /// Metrics summarized for a trial, whole-CPU first, then per core
    pub fn summary_set(core_count: usize) -> Vec<ScalarMetric> {
        let kinds = [ScalarKind::TotalEnergy, ScalarKind::PeakPower];
        let mut metrics: Vec<ScalarMetric> =
            kinds.iter().map(|k| ScalarMetric::new(Scope::Cpu, *k)).collect();
        for core in 0..core_count {
            metrics.extend(kinds.iter().map(|k| ScalarMetric::new(Scope::Core(core), *k)));
        }
        metrics
    }

    pub fn column_name(&self) -> String {
        let scope = match self.scope {
            Scope::Cpu => "CPU".to_string(),
            Scope::Core(core) => format!("CORE{}", core),
        };
        let kind = match self.kind {
            ScalarKind::TotalEnergy => "Total_Energy (J)",
            ScalarKind::PeakPower => "Peak_Power (W)",
        };
        format!("{}_{}", scope, kind)
    }

    /// Inverse of [`ScalarMetric::column_name`]
    pub fn parse(name: &str) -> Option<Self> {
        let caps = SCALAR_NAME.captures(name)?;
        let scope = match caps.get(2) {
            Some(core) => Scope::Core(core.as_str().parse().ok()?),
            None => Scope::Cpu,
        };
        let kind = if caps[3].starts_with("Total_Energy") {
            ScalarKind::TotalEnergy
        } else {
            ScalarKind::PeakPower
        };
        Some(Self { scope, kind })
    }

    /// Raw measurement the metric is computed from
    pub fn source(&self) -> MeasurementType {
        match (self.scope, self.kind) {
            (Scope::Cpu, ScalarKind::TotalEnergy) => MeasurementType::CpuEnergy,
            (Scope::Cpu, ScalarKind::PeakPower) => MeasurementType::CpuPower,
            (Scope::Core(_), ScalarKind::TotalEnergy) => MeasurementType::CoreEnergy,
            (Scope::Core(_), ScalarKind::PeakPower) => MeasurementType::CorePower,
        }
    }

    pub fn unit(&self) -> &'static str {
        self.source().unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_raw_columns() {
        assert_eq!(
            MeasurementType::classify("CPU_ENERGY (J)"),
            Some(MeasurementType::CpuEnergy)
        );
        assert_eq!(
            MeasurementType::classify("PACKAGE_POWER (Watts)"),
            Some(MeasurementType::CpuPower)
        );
        assert_eq!(
            MeasurementType::classify("CORE12_POWER (W)"),
            Some(MeasurementType::CorePower)
        );
        assert_eq!(
            MeasurementType::classify("USED_SWAP"),
            Some(MeasurementType::Memory)
        );
        assert_eq!(MeasurementType::classify("Delta"), None);
    }

    #[test]
    fn test_core_number_capture() {
        assert_eq!(MeasurementType::CoreEnergy.core_number("CORE7_ENERGY (J)"), Some(7));
        assert_eq!(MeasurementType::CoreEnergy.core_number("CORE7_POWER (W)"), None);
    }

    #[test]
    fn test_infer_core_count() {
        let columns = ["Time", "CORE0_ENERGY (J)", "CORE3_POWER (W)", "CPU_POWER (W)"];
        assert_eq!(infer_core_count(columns), 4);
        assert_eq!(infer_core_count(["Time", "CPU_POWER (W)"]), 0);
    }

    #[test]
    fn test_scalar_metric_names() {
        let names: Vec<String> = ScalarMetric::summary_set(1)
            .iter()
            .map(ScalarMetric::column_name)
            .collect();
        assert_eq!(
            names,
            vec![
                "CPU_Total_Energy (J)",
                "CPU_Peak_Power (W)",
                "CORE0_Total_Energy (J)",
                "CORE0_Peak_Power (W)",
            ]
        );
    }

    #[test]
    fn test_scalar_metric_parse() {
        let metric = ScalarMetric::parse("CORE5_Peak_Power (W)").unwrap();
        assert_eq!(metric, ScalarMetric::new(Scope::Core(5), ScalarKind::PeakPower));
        assert_eq!(metric.unit(), "watt");
        assert_eq!(
            ScalarMetric::parse("CPU_Total_Energy (J)").unwrap().source(),
            MeasurementType::CpuEnergy
        );
        assert!(ScalarMetric::parse("CPU_POWER (W)").is_none());
    }

    #[test]
    fn test_contexts() {
        assert!(MeasurementType::CpuEnergy.supports(Context::SignificanceTest));
        assert!(!MeasurementType::Memory.supports(Context::Statistics));
        assert!(MeasurementType::Memory.supports(Context::OverTime));
    }

    #[test]
    fn test_find_column_priority() {
        let mut table = Table::new();
        table.push_column("PACKAGE_ENERGY (J)", vec![0.0]).unwrap();
        table.push_column("CPU_ENERGY (J)", vec![0.0]).unwrap();
        assert_eq!(
            MeasurementType::CpuEnergy.find_column(&table),
            Some("CPU_ENERGY (J)")
        );
    }
}
