//! Two-proportion z-test over per-arm assignment and conversion counts.

use super::ArmTotals;

/// Outcome of the significance computation for one test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZTestResult {
    pub z_score: f64,
    /// Two-tailed p-value.
    pub p_value: f64,
}

/// Standard two-proportion z-test with pooled variance. Returns `None` when
/// either arm has no assignments or the pooled variance collapses (all or
/// no conversions everywhere), in which case no inference is possible.
pub fn two_proportion_z_test(totals: &ArmTotals) -> Option<ZTestResult> {
    let n_a = totals.assigned_a as f64;
    let n_b = totals.assigned_b as f64;
    if n_a == 0.0 || n_b == 0.0 {
        return None;
    }

    let p_a = totals.converted_a as f64 / n_a;
    let p_b = totals.converted_b as f64 / n_b;
    let pooled = (totals.converted_a + totals.converted_b) as f64 / (n_a + n_b);
    let variance = pooled * (1.0 - pooled) * (1.0 / n_a + 1.0 / n_b);
    if variance <= 0.0 {
        return None;
    }

    let z_score = (p_b - p_a) / variance.sqrt();
    let p_value = 2.0 * (1.0 - standard_normal_cdf(z_score.abs()));

    Some(ZTestResult { z_score, p_value })
}

fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Abramowitz & Stegun 7.1.26 rational approximation, max error 1.5e-7,
/// ample for a 5% significance gate.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}
