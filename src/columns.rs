//! Column naming conventions shared by all artifacts
//!
//! Dashboards select columns by literal name, so every derived column name
//! in the crate is built here.

/// Timeline column (milliseconds since the first sample)
pub const TIME: &str = "Time";

/// Sampling interval column (milliseconds)
pub const DELTA: &str = "Delta";

/// Row index of the trial summary table
pub const TRIAL_INDEX: &str = "Trial";

/// Group summary: normality test p-value
pub const P_VALUE_SUFFIX: &str = "p_value";

/// Group summary: 1 when the normality test accepts, 0 when it rejects
pub const NORMALLY_DISTRIBUTED_SUFFIX: &str = "normally_distributed";

/// Comparison: `|mean_B - mean_A|`
pub const ABS_DIFF_SUFFIX: &str = "abs_diff";

/// Comparison: `abs_diff / |mean_A|`
pub const REL_DIFF_SUFFIX: &str = "rel_diff";

/// Comparison: joint normality of both groups
pub const NORMAL_SUFFIX: &str = "normal";

/// Comparison: hypothesis test p-value
pub const PVALUE_SUFFIX: &str = "pvalue";

/// Comparison: significance flag
pub const SIGNIFICANT_SUFFIX: &str = "significant";

/// Descriptive statistic computed for every aggregated or summarized metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    Mean,
    Std,
    Median,
    Min,
    Max,
    LowerQuartile,
    UpperQuartile,
}

impl Statistic {
    /// Output order of the statistic columns
    pub const ALL: [Statistic; 7] = [
        Statistic::Mean,
        Statistic::Std,
        Statistic::Median,
        Statistic::Min,
        Statistic::Max,
        Statistic::LowerQuartile,
        Statistic::UpperQuartile,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Std => "std",
            Statistic::Median => "median",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::LowerQuartile => "LQ",
            Statistic::UpperQuartile => "UQ",
        }
    }
}

/// `{base}_{suffix}`
pub fn derived(base: &str, suffix: &str) -> String {
    format!("{}_{}", base, suffix)
}

/// `{base}_{statistic}`, e.g. `CPU_POWER (W)_median`
pub fn stat_column(base: &str, statistic: Statistic) -> String {
    derived(base, statistic.suffix())
}

/// Base metric of a `_mean` column
pub fn mean_base(column: &str) -> Option<&str> {
    column.strip_suffix("_mean")
}

/// Wide-table column of one trial, `{trial_id}:{column}`
pub fn trial_column(trial_id: &str, column: &str) -> String {
    format!("{}:{}", trial_id, column)
}
