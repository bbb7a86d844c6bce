//! Mann-Whitney U rank test (two-sided).
//!
//! Method selection:
//! - **exact** null distribution when the smaller sample has at most
//!   `EXACT_MAX_N` points and there are no ties
//! - otherwise the **normal approximation** with tie and continuity corrections
//!
//! The exact distribution of `U` for sizes `(m, k)` is given by the
//! coefficients of the Gaussian binomial `[m + k choose m]_q`, built as
//! `Π_{i=1..m} (1 - q^(k+i)) / (1 - q^i)`.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::stats::{StatError, StatResult, TestStatistic, ensure_finite, midranks};

const EXACT_MAX_N: usize = 8;

/// Which null distribution produced the p-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MannWhitneyMethod {
    Exact,
    Asymptotic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MannWhitney {
    /// `test.statistic` is `U` for the first sample.
    pub test: TestStatistic,
    pub method: MannWhitneyMethod,
}

/// Two-sided Mann-Whitney U test of `a` vs `b`.
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> StatResult<MannWhitney> {
    for sample in [a, b] {
        if sample.is_empty() {
            return Err(StatError::TooFewObservations { needed: 1, got: 0 });
        }
        ensure_finite(sample)?;
    }

    let (n1, n2) = (a.len(), b.len());
    let combined: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
    let (ranks, tie_term) = midranks(&combined);

    let r1: f64 = ranks[..n1].iter().sum();
    let u1 = r1 - (n1 * (n1 + 1)) as f64 / 2.0;
    let total = (n1 * n2) as f64;
    let u = u1.max(total - u1);

    let has_ties = tie_term > 0.0;
    if n1.min(n2) <= EXACT_MAX_N && !has_ties {
        let p_value = exact_p_value(n1, n2, u);
        return Ok(MannWhitney {
            test: TestStatistic { statistic: u1, p_value },
            method: MannWhitneyMethod::Exact,
        });
    }

    let n = (n1 + n2) as f64;
    let mu = total / 2.0;
    let variance = total / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if !(variance.is_finite() && variance > 0.0) {
        return Err(StatError::ZeroVariance);
    }
    let z = (u - mu - 0.5) / variance.sqrt();

    let normal = Normal::new(0.0, 1.0).map_err(|e| StatError::Distribution(e.to_string()))?;
    let p_value = (2.0 * normal.sf(z)).clamp(0.0, 1.0);

    Ok(MannWhitney {
        test: TestStatistic { statistic: u1, p_value },
        method: MannWhitneyMethod::Asymptotic,
    })
}

/// `2 · P(U >= u)` under the exact null distribution, clipped to 1.
fn exact_p_value(n1: usize, n2: usize, u: f64) -> f64 {
    let counts = u_distribution(n1, n2);
    let total: f64 = counts.iter().sum();
    // U is an integer when there are no ties.
    let start = u.round().max(0.0) as usize;
    let upper: f64 = counts.iter().skip(start).sum();
    (2.0 * upper / total).clamp(0.0, 1.0)
}

/// Number of rank arrangements yielding each `U = 0..=n1·n2`.
fn u_distribution(n1: usize, n2: usize) -> Vec<f64> {
    let m = n1.min(n2);
    let k = n1.max(n2);
    let degree = m * k;

    let mut c = vec![0.0; degree + 1];
    c[0] = 1.0;
    for i in 1..=m {
        // Divide by (1 - q^i), truncated at `degree`.
        for j in i..=degree {
            c[j] += c[j - i];
        }
        // Multiply by (1 - q^(k + i)).
        let shift = k + i;
        for j in (shift..=degree).rev() {
            c[j] -= c[j - shift];
        }
    }
    c
}
