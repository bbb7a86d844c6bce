//! Shapiro-Wilk test for normality.
//!
//! Royston's (1995) approximation (algorithm AS R94):
//!
//! - the `a` coefficients come from expected normal order statistics
//!   `m_i = Φ⁻¹((i - 3/8) / (n + 1/4))`, with polynomial corrections for the
//!   two most extreme weights
//! - `W = (Σ a_i (x_(n+1-i) - x_(i)))² / Σ (x_i - x̄)²`
//! - the p-value is exact for `n = 3`, otherwise `ln(1 - W)` is normalized
//!   with separate polynomial fits for `4 <= n <= 11` and `n >= 12`
//!
//! The approximation is validated up to n = 5000; larger samples are still
//! evaluated, matching common statistical packages.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::stats::{StatError, StatResult, ensure_finite};

const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.5440, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

/// Relative range below which a sample is treated as constant.
const SMALL_RANGE: f64 = 1e-19;

/// Result of a Shapiro-Wilk test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapiroWilk {
    pub w: f64,
    pub p_value: f64,
}

/// Run the Shapiro-Wilk test on `sample` (any order).
pub fn shapiro_wilk(sample: &[f64]) -> StatResult<ShapiroWilk> {
    let n = sample.len();
    if n < 3 {
        return Err(StatError::TooFewObservations { needed: 3, got: n });
    }
    ensure_finite(sample)?;

    let mut x = sample.to_vec();
    x.sort_by(f64::total_cmp);

    let range = x[n - 1] - x[0];
    if range < SMALL_RANGE {
        return Err(StatError::ZeroRange);
    }

    let a = coefficients(n)?;

    // Scale by the range to keep the sums well conditioned.
    let scaled: Vec<f64> = x.iter().map(|v| v / range).collect();
    let mean = scaled.iter().sum::<f64>() / n as f64;
    let ss: f64 = scaled.iter().map(|v| (v - mean) * (v - mean)).sum();
    let b: f64 = a
        .iter()
        .enumerate()
        .map(|(i, ai)| ai * (scaled[n - 1 - i] - scaled[i]))
        .sum();
    let w = (b * b / ss).min(1.0);

    let p_value = p_value(w, n)?;
    Ok(ShapiroWilk { w, p_value })
}

/// The `n / 2` antisymmetric weights `a_1 >= a_2 >= ...` (largest first).
fn coefficients(n: usize) -> StatResult<Vec<f64>> {
    let half = n / 2;
    if n == 3 {
        return Ok(vec![std::f64::consts::FRAC_1_SQRT_2]);
    }

    let normal = standard_normal()?;
    let an = n as f64;
    let an25 = an + 0.25;

    // m_i are negative for the lower half; weights are -m_i / scale.
    let m: Vec<f64> = (1..=half)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / an25))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / an.sqrt();

    let a1 = poly(&C1, rsn) - m[0] / ssumm2;

    let mut a = vec![0.0; half];
    let (first_free, fac) = if n > 5 {
        let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
        let fac = ((summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1])
            / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2))
            .sqrt();
        a[1] = a2;
        (2, fac)
    } else {
        let fac = ((summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
        (1, fac)
    };
    a[0] = a1;
    for i in first_free..half {
        a[i] = -m[i] / fac;
    }

    if a.iter().all(|v| v.is_finite()) {
        Ok(a)
    } else {
        Err(StatError::Distribution("non-finite Shapiro-Wilk coefficients".to_string()))
    }
}

fn p_value(w: f64, n: usize) -> StatResult<f64> {
    if n == 3 {
        // Exact: P = 6/π (asin(√W) - π/3).
        let p = 6.0 / std::f64::consts::PI * (w.sqrt().asin() - std::f64::consts::FRAC_PI_3);
        return Ok(p.clamp(0.0, 1.0));
    }

    let w1 = 1.0 - w;
    if w1 <= 0.0 {
        return Ok(1.0);
    }
    let an = n as f64;
    let mut y = w1.ln();

    let (m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if y >= gamma {
            return Ok(1e-99);
        }
        y = -(gamma - y).ln();
        (poly(&C3, an), poly(&C4, an).exp())
    } else {
        let ln_n = an.ln();
        (poly(&C5, ln_n), poly(&C6, ln_n).exp())
    };

    let dist = Normal::new(m, s).map_err(|e| StatError::Distribution(e.to_string()))?;
    Ok(dist.sf(y).clamp(0.0, 1.0))
}

/// `Σ c_k x^k`.
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, &ck| acc * x + ck)
}

fn standard_normal() -> StatResult<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| StatError::Distribution(e.to_string()))
}
