// Cross-group comparison
//
// For every metric both group summaries carry a `_mean` for:
// - absolute and relative difference of the means
// - joint normality from the groups' Shapiro-Wilk flags
// - Welch's t-test when both groups look normal, Mann-Whitney U otherwise,
//   on the raw per-trial values
// - significance flag under the configured rule
//
// The combined aggregate table lines both groups' time series up side by
// side for plotting.

use crate::columns::{
    derived, mean_base, stat_column, Statistic, ABS_DIFF_SUFFIX, NORMALLY_DISTRIBUTED_SUFFIX,
    NORMAL_SUFFIX, PVALUE_SUFFIX, REL_DIFF_SUFFIX, SIGNIFICANT_SUFFIX, TIME,
};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::group::{same_name, GroupArtifacts};
use crate::measurement::ScalarMetric;
use crate::statistics::{mann_whitney_u, sorted_finite, welch_t_test, TestError, TestKind};
use crate::table::Table;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Comparison result for one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub metric: String,
    /// Unit of a catalogued scalar metric
    pub unit: Option<String>,
    pub mean_a: f64,
    pub mean_b: f64,
    pub abs_diff: f64,
    /// `abs_diff / |mean_a|`, infinite when `mean_a` is 0
    pub rel_diff: f64,
    pub joint_normal: bool,
    /// Test that produced the p-value
    pub test: Option<TestKind>,
    pub pvalue: Option<f64>,
    pub significant: Option<bool>,
}

/// Outcome of comparing two groups
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub group_a: String,
    pub group_b: String,
    pub significance_level: f64,
    pub metrics: Vec<MetricComparison>,
    /// One-row comparison table
    #[serde(skip)]
    pub table: Table,
    /// Both groups' aggregate tables side by side
    #[serde(skip)]
    pub combined: Table,
}

/// Compare exactly two groups
///
/// # Errors
/// - `Configuration` unless given two distinct groups
/// - `Statistical` when a metric has exactly one trial value in a group
pub fn compare_groups(groups: &[&GroupArtifacts], config: &PipelineConfig) -> Result<Comparison> {
    let [a, b] = groups else {
        return Err(PipelineError::configuration(format!(
            "comparison needs exactly 2 groups, got {}",
            groups.len()
        )));
    };
    if same_name(&a.name, &b.name) {
        return Err(PipelineError::configuration(format!(
            "cannot compare group '{}' with itself",
            a.name
        )));
    }

    let mut metrics = Vec::new();
    let mut table = Table::new();

    for column in a.group_summary.column_names() {
        let Some(base) = mean_base(column) else {
            continue;
        };
        if !b.group_summary.has_column(column) {
            debug!(metric = base, group = %b.name, "metric missing, skipped");
            continue;
        }

        let metric = compare_metric(base, a, b, config)?;
        push_metric_columns(&mut table, &metric, &a.name, &b.name)?;
        metrics.push(metric);
    }

    let combined = combine_aggregates(a, b)?;
    info!(
        group_a = %a.name,
        group_b = %b.name,
        metrics = metrics.len(),
        "groups compared"
    );

    Ok(Comparison {
        group_a: a.name.clone(),
        group_b: b.name.clone(),
        significance_level: config.significance_level,
        metrics,
        table,
        combined,
    })
}

fn summary_value(group: &GroupArtifacts, column: &str) -> f64 {
    group.group_summary.value(column, 0).unwrap_or(f64::NAN)
}

fn is_normal(group: &GroupArtifacts, base: &str) -> bool {
    group
        .group_summary
        .value(&derived(base, NORMALLY_DISTRIBUTED_SUFFIX), 0)
        == Some(1.0)
}

fn compare_metric(
    base: &str,
    a: &GroupArtifacts,
    b: &GroupArtifacts,
    config: &PipelineConfig,
) -> Result<MetricComparison> {
    let mean_a = summary_value(a, &stat_column(base, Statistic::Mean));
    let mean_b = summary_value(b, &stat_column(base, Statistic::Mean));
    let abs_diff = (mean_b - mean_a).abs();
    let rel_diff = if mean_a == 0.0 {
        f64::INFINITY
    } else {
        abs_diff / mean_a.abs()
    };
    let joint_normal = is_normal(a, base) && is_normal(b, base);

    let scalar = ScalarMetric::parse(base);
    let outcome = run_test(base, a, b, joint_normal)?;

    let pvalue = outcome.map(|(_, p)| p);
    let significant = pvalue.map(|p| {
        config
            .significance_rule
            .is_significant(p, config.significance_level)
    });

    Ok(MetricComparison {
        metric: base.to_string(),
        unit: scalar.map(|m| m.unit().to_string()),
        mean_a,
        mean_b,
        abs_diff,
        rel_diff,
        joint_normal,
        test: outcome.map(|(kind, _)| kind),
        pvalue,
        significant,
    })
}

/// Per-trial samples of `base`, `None` when the column is absent or all null
fn samples(group: &GroupArtifacts, base: &str) -> Result<Option<Vec<f64>>> {
    let Some(values) = group.trial_summary.values(base) else {
        return Ok(None);
    };
    let samples = sorted_finite(values);
    match samples.len() {
        0 => Ok(None),
        1 => Err(PipelineError::statistical(
            base,
            format!("group '{}' has a single trial value", group.name),
        )),
        _ => Ok(Some(samples)),
    }
}

fn run_test(
    base: &str,
    a: &GroupArtifacts,
    b: &GroupArtifacts,
    joint_normal: bool,
) -> Result<Option<(TestKind, f64)>> {
    let (Some(xs), Some(ys)) = (samples(a, base)?, samples(b, base)?) else {
        debug!(metric = base, "no trial values, p-value left empty");
        return Ok(None);
    };

    let result = if joint_normal {
        welch_t_test(&xs, &ys)
    } else {
        mann_whitney_u(&xs, &ys)
    };

    match result {
        Ok(outcome) if outcome.statistic.is_finite() && outcome.pvalue.is_finite() => {
            Ok(Some((outcome.kind, outcome.pvalue)))
        }
        Ok(outcome) => {
            warn!(
                metric = base,
                test = %outcome.kind,
                statistic = outcome.statistic,
                pvalue = outcome.pvalue,
                "undefined test result, p-value left empty"
            );
            Ok(None)
        }
        Err(e @ (TestError::ZeroRange | TestError::ZeroVariance)) => {
            warn!(metric = base, reason = %e, "p-value left empty");
            Ok(None)
        }
        Err(e) => Err(PipelineError::statistical(base, e.to_string())),
    }
}

fn flag(value: Option<bool>) -> f64 {
    match value {
        Some(true) => 1.0,
        Some(false) => 0.0,
        None => f64::NAN,
    }
}

fn push_metric_columns(
    table: &mut Table,
    metric: &MetricComparison,
    name_a: &str,
    name_b: &str,
) -> Result<()> {
    let base = metric.metric.as_str();
    let cells = [
        (derived(base, name_a), metric.mean_a),
        (derived(base, name_b), metric.mean_b),
        (derived(base, ABS_DIFF_SUFFIX), metric.abs_diff),
        (derived(base, REL_DIFF_SUFFIX), metric.rel_diff),
        (derived(base, NORMAL_SUFFIX), flag(Some(metric.joint_normal))),
        (derived(base, PVALUE_SUFFIX), metric.pvalue.unwrap_or(f64::NAN)),
        (derived(base, SIGNIFICANT_SUFFIX), flag(metric.significant)),
    ];
    for (name, value) in cells {
        table.push_column(name, vec![value])?;
    }
    Ok(())
}

/// Both aggregate tables side by side
///
/// `Time` comes from the first group, extended by the second group's
/// timeline when that one is longer. Every other column is suffixed with its
/// group name; shorter columns are padded with nulls.
pub fn combine_aggregates(a: &GroupArtifacts, b: &GroupArtifacts) -> Result<Table> {
    let rows = a.aggregate.row_count().max(b.aggregate.row_count());

    let mut time: Vec<f64> = a.aggregate.values(TIME).unwrap_or_default().to_vec();
    if let Some(b_time) = b.aggregate.values(TIME) {
        if b_time.len() > time.len() {
            let start = time.len();
            time.extend_from_slice(&b_time[start..]);
        }
    }
    time.resize(rows, f64::NAN);

    let mut combined = Table::new();
    combined.push_column(TIME, time)?;

    for group in [a, b] {
        for column in group.aggregate.columns() {
            if column.name == TIME {
                continue;
            }
            let mut values = column.values.clone();
            values.resize(rows, f64::NAN);
            combined.push_column(derived(&column.name, &group.name), values)?;
        }
    }

    Ok(combined)
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{:.4}", value)
    }
}

impl Comparison {
    /// Metrics whose significance flag is set
    pub fn significant_metrics(&self) -> Vec<&str> {
        self.metrics
            .iter()
            .filter(|m| m.significant == Some(true))
            .map(|m| m.metric.as_str())
            .collect()
    }

    /// Human-readable comparison report
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();

        report.push_str(&format!(
            "📊 COMPARISON: {} vs {}\n\n",
            self.group_a, self.group_b
        ));
        report.push_str(&format!("Metrics compared: {}\n", self.metrics.len()));
        report.push_str(&format!(
            "Significance level: {}\n",
            self.significance_level
        ));

        let significant = self.significant_metrics();
        if !significant.is_empty() {
            report.push_str(&format!(
                "Flagged significant ({}): {}\n",
                significant.len(),
                significant.join(", ")
            ));
        }

        if !self.metrics.is_empty() {
            report.push_str("\n📈 Metrics:\n");
        }
        for metric in &self.metrics {
            let unit = metric
                .unit
                .as_deref()
                .map(|u| format!(" [{}]", u))
                .unwrap_or_default();
            report.push_str(&format!("  {}{}\n", metric.metric, unit));
            report.push_str(&format!(
                "    mean: {} = {}, {} = {}\n",
                self.group_a,
                format_value(metric.mean_a),
                self.group_b,
                format_value(metric.mean_b)
            ));
            report.push_str(&format!(
                "    diff: {} abs, {} rel\n",
                format_value(metric.abs_diff),
                format_value(metric.rel_diff)
            ));
            match (metric.test, metric.pvalue) {
                (Some(kind), Some(p)) => {
                    let marker = if metric.significant == Some(true) {
                        "⚠️ "
                    } else {
                        "✅"
                    };
                    report.push_str(&format!("    {} {}: p = {:.4}\n", marker, kind, p));
                }
                _ => report.push_str("    ⏭️  not tested\n"),
            }
        }

        report
    }
}
