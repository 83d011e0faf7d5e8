// Two-sample hypothesis tests (two-sided)
//
// - Welch's t-test (unequal variances, Welch-Satterthwaite degrees of
//   freedom) for normally distributed trial metrics. Computed in f64: energy
//   totals sit at magnitudes where f32 rounds distinct trials together.
// - Mann-Whitney U is the rank-based fallback when normality cannot be
//   assumed for both groups.

use super::TestError;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use statrs::statistics::Statistics;

/// Minimum samples per group for either test
const MIN_SAMPLES: usize = 2;

/// Largest smaller-sample size for which the exact U distribution is used
const EXACT_MAX_SMALLER: usize = 8;

/// Which test produced a p-value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// Welch's unequal-variance t-test
    Welch,
    /// Mann-Whitney U rank test
    MannWhitney,
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestKind::Welch => write!(f, "Welch t-test"),
            TestKind::MannWhitney => write!(f, "Mann-Whitney U"),
        }
    }
}

/// Outcome of a two-sample test
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestOutcome {
    pub kind: TestKind,
    /// t statistic (Welch) or U of the first sample (Mann-Whitney)
    pub statistic: f64,
    /// Two-sided p-value
    pub pvalue: f64,
}

fn check_sizes(a: &[f64], b: &[f64]) -> Result<(), TestError> {
    let smallest = a.len().min(b.len());
    if smallest < MIN_SAMPLES {
        return Err(TestError::InsufficientSamples {
            required: MIN_SAMPLES,
            actual: smallest,
        });
    }
    Ok(())
}

/// Welch's two-sided t-test
///
/// # Example
/// ```
/// use energy_stats::statistics::welch_t_test;
///
/// let baseline = [10.0, 12.0, 11.0];
/// let candidate = [20.0, 22.0, 19.0];
///
/// let outcome = welch_t_test(&baseline, &candidate).unwrap();
/// assert!(outcome.pvalue < 0.05);
/// ```
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<TestOutcome, TestError> {
    check_sizes(a, b)?;

    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (ma, mb) = (a.iter().mean(), b.iter().mean());
    let sa = a.iter().variance() / na;
    let sb = b.iter().variance() / nb;

    let se2 = sa + sb;
    if se2 <= 0.0 {
        return Err(if ma == mb {
            TestError::ZeroRange
        } else {
            TestError::ZeroVariance
        });
    }

    let statistic = (ma - mb) / se2.sqrt();
    let df = se2 * se2 / (sa * sa / (na - 1.0) + sb * sb / (nb - 1.0));
    if !statistic.is_finite() || !df.is_finite() {
        return Err(TestError::Computation(format!(
            "non-finite t statistic {} with {} degrees of freedom",
            statistic, df
        )));
    }

    let t = StudentsT::new(0.0, 1.0, df).map_err(|e| TestError::Computation(e.to_string()))?;
    let pvalue = 2.0 * t.sf(statistic.abs());

    Ok(TestOutcome {
        kind: TestKind::Welch,
        statistic,
        pvalue: pvalue.clamp(0.0, 1.0),
    })
}

/// Mann-Whitney U two-sided test
///
/// Uses the exact null distribution of U when the smaller sample has at most
/// 8 values and there are no ties; otherwise the normal approximation with
/// tie correction and continuity correction.
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> Result<TestOutcome, TestError> {
    check_sizes(a, b)?;

    let n1 = a.len();
    let n2 = b.len();
    let (ranks, tie_sizes) = rank_with_ties(a, b);

    let rank_sum_a: f64 = ranks[..n1].iter().sum();
    let u1 = rank_sum_a - (n1 * (n1 + 1)) as f64 / 2.0;
    let u2 = (n1 * n2) as f64 - u1;
    let u = u1.max(u2);

    let has_ties = tie_sizes.iter().any(|&t| t > 1);
    let pvalue = if n1.min(n2) <= EXACT_MAX_SMALLER && !has_ties {
        2.0 * exact_upper_tail(u.round() as usize, n1, n2)
    } else {
        asymptotic_pvalue(u, n1, n2, &tie_sizes)?
    };

    Ok(TestOutcome {
        kind: TestKind::MannWhitney,
        statistic: u1,
        pvalue: pvalue.clamp(0.0, 1.0),
    })
}

/// Average ranks (1-based) of `a` followed by `b`, plus the size of every tie block
fn rank_with_ties(a: &[f64], b: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let combined: Vec<f64> = a.iter().chain(b).copied().collect();
    let mut order: Vec<usize> = (0..combined.len()).collect();
    order.sort_by(|&i, &j| combined[i].total_cmp(&combined[j]));

    let mut ranks = vec![0.0; combined.len()];
    let mut tie_sizes = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && combined[order[end]] == combined[order[start]] {
            end += 1;
        }
        // positions start..end share the average of ranks start+1..=end
        let average = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = average;
        }
        tie_sizes.push(end - start);
        start = end;
    }

    (ranks, tie_sizes)
}

/// P(U >= u) under H0 for sample sizes `n1`, `n2` without ties
///
/// The frequencies of U are the coefficients of the Gaussian binomial
/// coefficient [n1 + n2 choose m]_q with m = min(n1, n2), built up one factor
/// (1 - q^(n+i)) / (1 - q^i) at a time.
fn exact_upper_tail(u: usize, n1: usize, n2: usize) -> f64 {
    let m = n1.min(n2);
    let n = n1.max(n2);
    let len = m * n + 1;

    let mut freq = vec![0i128; len];
    freq[0] = 1;
    for i in 1..=m {
        let up = n + i;
        for k in (up..len).rev() {
            freq[k] -= freq[k - up];
        }
        for k in i..len {
            freq[k] += freq[k - i];
        }
    }

    let total: i128 = freq.iter().sum();
    let tail: i128 = freq.iter().skip(u).sum();
    tail as f64 / total as f64
}

fn asymptotic_pvalue(
    u: f64,
    n1: usize,
    n2: usize,
    tie_sizes: &[usize],
) -> Result<f64, TestError> {
    let n = (n1 + n2) as f64;
    let mu = (n1 * n2) as f64 / 2.0;
    let tie_term: f64 = tie_sizes
        .iter()
        .map(|&t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum();
    let variance = (n1 * n2) as f64 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if variance <= 0.0 {
        return Err(TestError::ZeroRange);
    }

    let z = (u - mu - 0.5) / variance.sqrt();
    let normal = Normal::new(0.0, 1.0).map_err(|e| TestError::Computation(e.to_string()))?;
    Ok(2.0 * normal.sf(z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks_average_ties() {
        let (ranks, ties) = rank_with_ties(&[1.0, 2.0], &[2.0, 3.0]);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
        assert_eq!(ties, vec![1, 2, 1]);
    }

    #[test]
    fn test_exact_distribution_small() {
        // n1 = n2 = 2: U takes 0,1,2,2,3,4 over the 6 arrangements
        assert!((exact_upper_tail(4, 2, 2) - 1.0 / 6.0).abs() < 1e-12);
        assert!((exact_upper_tail(2, 2, 2) - 4.0 / 6.0).abs() < 1e-12);
        assert!((exact_upper_tail(0, 2, 2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mann_whitney_complete_separation() {
        // U = 9 is the maximum; P(U >= 9) = 1/20, two-sided 0.1
        let outcome = mann_whitney_u(&[10.0, 12.0, 11.0], &[20.0, 22.0, 19.0]).unwrap();
        assert_eq!(outcome.kind, TestKind::MannWhitney);
        assert_eq!(outcome.statistic, 0.0);
        assert!((outcome.pvalue - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_mann_whitney_identical_samples() {
        let outcome = mann_whitney_u(&[1.0, 2.0, 3.0], &[1.5, 2.5, 3.5]).unwrap();
        assert!(outcome.pvalue > 0.5);
        assert!(outcome.pvalue <= 1.0);
    }

    #[test]
    fn test_mann_whitney_with_ties_uses_normal_approximation() {
        let a = [1.0, 2.0, 2.0, 3.0, 4.0];
        let b = [6.0, 7.0, 7.0, 8.0, 9.0];
        let outcome = mann_whitney_u(&a, &b).unwrap();
        assert!(outcome.pvalue < 0.05);
        assert!(outcome.pvalue > 0.0);
    }

    #[test]
    fn test_mann_whitney_all_tied() {
        assert_eq!(
            mann_whitney_u(&[5.0, 5.0, 5.0], &[5.0, 5.0, 5.0]),
            Err(TestError::ZeroRange)
        );
    }

    #[test]
    fn test_insufficient_samples() {
        assert!(matches!(
            mann_whitney_u(&[1.0], &[2.0, 3.0]),
            Err(TestError::InsufficientSamples { required: 2, actual: 1 })
        ));
        assert!(matches!(
            welch_t_test(&[1.0, 2.0], &[]),
            Err(TestError::InsufficientSamples { required: 2, actual: 0 })
        ));
    }

    #[test]
    fn test_welch_detects_shift() {
        let outcome = welch_t_test(&[10.0, 12.0, 11.0], &[20.0, 22.0, 19.0]).unwrap();
        assert_eq!(outcome.kind, TestKind::Welch);
        assert!(outcome.statistic < 0.0);
        assert!(outcome.pvalue < 0.05, "p = {}", outcome.pvalue);
    }

    #[test]
    fn test_welch_matches_reference_values() {
        // t, df and p from the closed-form Welch-Satterthwaite test
        let outcome = welch_t_test(&[10.0, 12.0, 11.0], &[20.0, 22.0, 19.0]).unwrap();
        assert!((outcome.statistic + 8.854377).abs() < 1e-5);
        assert!((outcome.pvalue - 0.0017241).abs() < 1e-6);

        let outcome =
            welch_t_test(&[10.0, 11.5, 12.0, 10.5], &[12.0, 13.5, 11.8, 14.1]).unwrap();
        assert!((outcome.statistic + 2.551219).abs() < 1e-5);
        assert!((outcome.pvalue - 0.045073).abs() < 1e-5);
    }

    #[test]
    fn test_welch_large_magnitude_close_samples() {
        // 1e6 + hundredths are indistinguishable in f32
        let a = [1e6 + 0.01, 1e6 + 0.02, 1e6 + 0.03];
        let b = [1e6 + 0.04, 1e6 + 0.05, 1e6 + 0.07];
        let outcome = welch_t_test(&a, &b).unwrap();
        assert!(outcome.statistic.is_finite());
        assert!((outcome.statistic + 3.162278).abs() < 1e-4);
        assert!((outcome.pvalue - 0.041915).abs() < 1e-4);
    }

    #[test]
    fn test_welch_zero_variance() {
        assert_eq!(
            welch_t_test(&[5.0, 5.0, 5.0], &[7.0, 7.0, 7.0]),
            Err(TestError::ZeroVariance)
        );
        assert_eq!(
            welch_t_test(&[5.0, 5.0], &[5.0, 5.0, 5.0]),
            Err(TestError::ZeroRange)
        );
    }

    #[test]
    fn test_welch_one_constant_sample() {
        // degrees of freedom fall back to the varying sample's n - 1
        let outcome = welch_t_test(&[5.0, 5.0, 5.0], &[6.0, 7.0, 8.0]).unwrap();
        assert!((outcome.statistic + 2.0 * 3f64.sqrt()).abs() < 1e-9);
        assert!(outcome.pvalue > 0.0 && outcome.pvalue < 0.1);
    }

    #[test]
    fn test_welch_similar_samples() {
        let outcome =
            welch_t_test(&[10.0, 12.0, 11.0, 13.0, 10.0], &[11.0, 13.0, 10.0, 12.0, 11.0])
                .unwrap();
        assert!(outcome.pvalue >= 0.05, "p = {}", outcome.pvalue);
    }
}
