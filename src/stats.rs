//! Statistical primitives for experiment analysis
//!
//! Small, pure functions: a polynomial normal-CDF approximation, the pooled
//! two-proportion z-test, and descriptive statistics over conversion values.
//!
//! ## Known limitations
//!
//! The z-test uses the normal approximation without continuity correction,
//! and the CDF approximation is accurate to about 1.5e-7. Both are adequate
//! for the dashboard-grade verdicts produced here; a rigorous analysis
//! would reach for an exact binomial test on small samples.

/// Exposed users each group needs before the normal approximation is
/// trusted. Below this floor no significance test is run at all.
pub const MIN_GROUP_SIZE: u64 = 30;

/// Two-tailed significance threshold.
pub const ALPHA: f64 = 0.05;

/// z quantile for a 95% confidence interval.
pub const Z_95: f64 = 1.96;

// Abramowitz & Stegun 7.1.26 erf coefficients
#[allow(clippy::excessive_precision)] // These are published numerical constants
const A1: f64 = 0.254_829_592;
#[allow(clippy::excessive_precision)]
const A2: f64 = -0.284_496_736;
#[allow(clippy::excessive_precision)]
const A3: f64 = 1.421_413_741;
#[allow(clippy::excessive_precision)]
const A4: f64 = -1.453_152_027;
#[allow(clippy::excessive_precision)]
const A5: f64 = 1.061_405_429;
const P: f64 = 0.327_591_1;

/// Standard normal CDF via the Abramowitz & Stegun 7.1.26 polynomial
/// approximation of erf (max absolute error ~1.5e-7).
#[must_use]
pub fn normal_cdf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / std::f64::consts::SQRT_2;

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    0.5 * (1.0 + sign * y)
}

/// Outcome of a pooled two-proportion z-test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoProportionTest {
    /// Test statistic; 0 when the pooled standard error is 0.
    pub z: f64,
    /// Two-tailed p-value.
    pub p_value: f64,
    /// Pooled standard error of the rate difference.
    pub std_error: f64,
}

impl TwoProportionTest {
    /// Whether the difference is significant at [`ALPHA`].
    #[must_use]
    pub fn is_significant(&self) -> bool {
        self.p_value < ALPHA
    }
}

/// Pooled two-proportion z-test for conversion rates `p1` (treatment, group
/// size `n1`) vs `p2` (control, group size `n2`).
///
/// Callers are expected to enforce the [`MIN_GROUP_SIZE`] floor; this
/// function computes the statistic unconditionally.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn two_proportion_z_test(p1: f64, n1: u64, p2: f64, n2: u64) -> TwoProportionTest {
    let n1 = n1 as f64;
    let n2 = n2 as f64;

    let pooled = (p1 * n1 + p2 * n2) / (n1 + n2);
    let std_error = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    let z = if std_error > 0.0 {
        (p1 - p2) / std_error
    } else {
        0.0
    };
    let p_value = 2.0 * (1.0 - normal_cdf(z.abs()));

    TwoProportionTest {
        z,
        p_value,
        std_error,
    }
}

/// Arithmetic mean; `None` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation with the n-1 denominator; `None` for fewer
/// than two values.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Median as the element at index `len / 2` of the sorted values; `None`
/// for an empty slice. For even counts this is the upper middle element,
/// not the midpoint average.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(sorted[sorted.len() / 2])
}
