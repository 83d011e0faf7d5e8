//! Cross-trial statistics of the trial-summary metrics
//!
//! One row: for every metric the seven descriptive statistics over its
//! non-null trial values, followed by the Shapiro-Wilk p-value and the 0/1
//! normality flag. Both are null when the metric cannot be tested.

use crate::columns::{
    derived, stat_column, Statistic, NORMALLY_DISTRIBUTED_SUFFIX, P_VALUE_SUFFIX,
};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::statistics::{shapiro_wilk, sorted_finite, NormalityTest, Summary, TestError};
use crate::table::Table;
use tracing::{debug, warn};

/// Normality test of one metric, `None` when untestable
pub fn assess_normality(
    metric: &str,
    values: &[f64],
    config: &PipelineConfig,
) -> Result<Option<NormalityTest>> {
    let samples = sorted_finite(values);
    if samples.len() < config.min_normality_samples.max(3) {
        debug!(
            metric,
            samples = samples.len(),
            "too few trials for normality test"
        );
        return Ok(None);
    }

    match shapiro_wilk(&samples) {
        Ok(test) => Ok(Some(test)),
        Err(e @ (TestError::ZeroRange | TestError::TooManySamples { .. })) => {
            warn!(metric, reason = %e, "normality not testable");
            Ok(None)
        }
        Err(TestError::InsufficientSamples { .. }) => Ok(None),
        Err(e) => Err(PipelineError::statistical(metric, e.to_string())),
    }
}

/// Group-summary table from a trial-summary table
pub fn summarize_group(trial_summary: &Table, config: &PipelineConfig) -> Result<Table> {
    let mut output = Table::new();

    for column in trial_summary.columns() {
        let summary = Summary::of(&column.values);
        for statistic in Statistic::ALL {
            output.push_column(stat_column(&column.name, statistic), vec![summary.get(statistic)])?;
        }

        let normality = assess_normality(&column.name, &column.values, config)?;
        let (pvalue, flag) = match normality {
            Some(test) => (
                test.pvalue,
                if test.is_normal(config.normality_level) {
                    1.0
                } else {
                    0.0
                },
            ),
            None => (f64::NAN, f64::NAN),
        };
        output.push_column(derived(&column.name, P_VALUE_SUFFIX), vec![pvalue])?;
        output.push_column(derived(&column.name, NORMALLY_DISTRIBUTED_SUFFIX), vec![flag])?;
    }

    Ok(output)
}
