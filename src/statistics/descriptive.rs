// Descriptive statistics over f64 samples
//
// Quantiles use linear interpolation between closest ranks (R-7), the same
// definition spreadsheet tools and pandas use, so LQ/UQ match what the
// dashboards have always shown.

use crate::columns::Statistic;
use statrs::statistics::Statistics;

/// Arithmetic mean, `NaN` for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    values.iter().mean()
}

/// Sample standard deviation (n - 1 denominator), `NaN` below two samples
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    values.iter().std_dev()
}

/// Quantile `q` in `[0, 1]` of ascending `sorted` data
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        len => {
            let index = q.clamp(0.0, 1.0) * (len - 1) as f64;
            let lower = index.floor() as usize;
            let upper = index.ceil() as usize;

            if lower == upper {
                sorted[lower]
            } else {
                let weight = index - lower as f64;
                sorted[lower] * (1.0 - weight) + sorted[upper] * weight
            }
        }
    }
}

/// Non-NaN values in ascending order
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// The seven statistics reported for every metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Number of non-null samples the summary was computed from
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub lower_quartile: f64,
    pub upper_quartile: f64,
}

impl Summary {
    /// Summarize `values`, skipping `NaN` entries
    ///
    /// An empty input yields `NaN` for every statistic.
    pub fn of(values: &[f64]) -> Self {
        let sorted = sorted_finite(values);
        Self {
            count: sorted.len(),
            mean: mean(&sorted),
            std: sample_std(&sorted),
            median: percentile(&sorted, 0.5),
            min: sorted.first().copied().unwrap_or(f64::NAN),
            max: sorted.last().copied().unwrap_or(f64::NAN),
            lower_quartile: percentile(&sorted, 0.25),
            upper_quartile: percentile(&sorted, 0.75),
        }
    }

    pub fn get(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Mean => self.mean,
            Statistic::Std => self.std,
            Statistic::Median => self.median,
            Statistic::Min => self.min,
            Statistic::Max => self.max,
            Statistic::LowerQuartile => self.lower_quartile,
            Statistic::UpperQuartile => self.upper_quartile,
        }
    }
}
