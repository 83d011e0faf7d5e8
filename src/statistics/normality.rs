// Shapiro-Wilk W test for normality
//
// Royston, P. (1995). Remark AS R94: A remark on algorithm AS 181, the
// W-test for normality. Applied Statistics 44(4), 547-551.
//
// Coefficients a_i come from Royston's polynomial approximation to the
// expected normal order statistics; the p-value uses his normalizing
// transformations (exact arcsine form for n = 3, small-sample branch for
// n <= 11, log-normal branch above).

use super::TestError;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::{FRAC_1_SQRT_2, PI};

const MIN_SAMPLES: usize = 3;
const MAX_SAMPLES: usize = 5000;

const G: [f64; 2] = [-2.273, 0.459];
const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.07119, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];

/// Result of a Shapiro-Wilk test
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalityTest {
    /// W statistic in (0, 1]
    pub statistic: f64,
    /// Probability of a W this small under normality
    pub pvalue: f64,
}

impl NormalityTest {
    /// Normality is accepted when the p-value reaches `alpha`
    pub fn is_normal(&self, alpha: f64) -> bool {
        self.pvalue >= alpha
    }
}

/// Run the Shapiro-Wilk test on `values`
///
/// # Errors
/// - fewer than 3 or more than 5000 samples
/// - all samples identical (W undefined)
pub fn shapiro_wilk(values: &[f64]) -> Result<NormalityTest, TestError> {
    let n = values.len();
    if n < MIN_SAMPLES {
        return Err(TestError::InsufficientSamples {
            required: MIN_SAMPLES,
            actual: n,
        });
    }
    if n > MAX_SAMPLES {
        return Err(TestError::TooManySamples {
            max: MAX_SAMPLES,
            actual: n,
        });
    }

    let mut x = values.to_vec();
    x.sort_by(f64::total_cmp);
    if x[n - 1] - x[0] <= 0.0 {
        return Err(TestError::ZeroRange);
    }

    let normal = Normal::new(0.0, 1.0).map_err(|e| TestError::Computation(e.to_string()))?;
    let a = coefficients(n, &normal);

    let mean = x.iter().sum::<f64>() / n as f64;
    let ss: f64 = x.iter().map(|v| (v - mean) * (v - mean)).sum();
    let numerator: f64 = a
        .iter()
        .enumerate()
        .map(|(i, ai)| ai * (x[n - 1 - i] - x[i]))
        .sum();
    let statistic = (numerator * numerator / ss).min(1.0);

    Ok(NormalityTest {
        statistic,
        pvalue: pvalue(statistic, n, &normal),
    })
}

/// Polynomial `c[0] + c[1] x + c[2] x^2 + ...`
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, coef| acc * x + coef)
}

/// Upper-half weights a_1 >= a_2 >= ... (antisymmetric lower half implied)
fn coefficients(n: usize, normal: &Normal) -> Vec<f64> {
    let half = n / 2;
    if n == 3 {
        return vec![FRAC_1_SQRT_2];
    }

    let an25 = n as f64 + 0.25;
    let m: Vec<f64> = (1..=half)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / an25))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / (n as f64).sqrt();

    let mut a = vec![0.0; half];
    let a1 = poly(&C1, rsn) - m[0] / ssumm2;
    a[0] = a1;

    let (first, fac) = if n > 5 {
        let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
        a[1] = a2;
        let fac = ((summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1])
            / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2))
            .sqrt();
        (2, fac)
    } else {
        let fac = ((summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
        (1, fac)
    };

    for i in first..half {
        a[i] = -m[i] / fac;
    }
    a
}

fn pvalue(w: f64, n: usize, normal: &Normal) -> f64 {
    if w >= 1.0 {
        return 1.0;
    }

    if n == 3 {
        let p = 6.0 / PI * (w.sqrt().asin() - PI / 3.0);
        return p.clamp(0.0, 1.0);
    }

    let an = n as f64;
    let w1 = (1.0 - w).ln();
    let (y, m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if w1 >= gamma {
            return 0.0;
        }
        (-(gamma - w1).ln(), poly(&C3, an), poly(&C4, an).exp())
    } else {
        let xx = an.ln();
        (w1, poly(&C5, xx), poly(&C6, xx).exp())
    };

    normal.sf((y - m) / s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poly_matches_expansion() {
        assert_eq!(poly(&[1.0, 2.0, 3.0], 2.0), 1.0 + 4.0 + 12.0);
    }

    #[test]
    fn test_coefficients_n4() {
        let normal = Normal::new(0.0, 1.0).unwrap();
        let a = coefficients(4, &normal);
        // Published table values: 0.6872, 0.1677
        assert!((a[0] - 0.6872).abs() < 0.002, "a1 = {}", a[0]);
        assert!((a[1] - 0.1677).abs() < 0.002, "a2 = {}", a[1]);
    }

    #[test]
    fn test_equally_spaced_three_is_perfectly_normal() {
        let result = shapiro_wilk(&[10.0, 12.0, 11.0]).unwrap();
        assert!((result.statistic - 1.0).abs() < 1e-9);
        assert!((result.pvalue - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_three_samples_exact_pvalue() {
        // W = 4.5 / (14/3) = 0.964286; p = 6/pi * (asin(sqrt(W)) - pi/3)
        let result = shapiro_wilk(&[20.0, 22.0, 19.0]).unwrap();
        assert!((result.statistic - 0.964286).abs() < 1e-4);
        assert!((result.pvalue - 0.637).abs() < 0.01, "p = {}", result.pvalue);
        assert!(result.is_normal(0.05));
    }

    #[test]
    fn test_rejects_outlier_heavy_sample() {
        let values = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.2, 50.0];
        let result = shapiro_wilk(&values).unwrap();
        assert!(result.statistic < 0.5);
        assert!(result.pvalue < 0.05, "p = {}", result.pvalue);
        assert!(!result.is_normal(0.05));
    }

    #[test]
    fn test_accepts_evenly_spread_large_sample() {
        let values: Vec<f64> = (1..=20).map(f64::from).collect();
        let result = shapiro_wilk(&values).unwrap();
        assert!(result.statistic > 0.9);
        assert!(result.pvalue > 0.05, "p = {}", result.pvalue);
    }

    #[test]
    fn test_insufficient_samples() {
        assert_eq!(
            shapiro_wilk(&[1.0, 2.0]),
            Err(TestError::InsufficientSamples {
                required: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_zero_range() {
        assert_eq!(shapiro_wilk(&[4.0, 4.0, 4.0]), Err(TestError::ZeroRange));
    }
}
