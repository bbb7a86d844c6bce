//! Welch's two-sample t-test (unequal variances).

use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::stats::{StatError, StatResult, TestStatistic, ensure_finite, mean, sample_variance};

/// Welch's t-test output, with the Welch–Satterthwaite degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchT {
    pub test: TestStatistic,
    pub df: f64,
}

/// Two-sided Welch's t-test of `a` vs `b` (`t` is positive when `mean(a) > mean(b)`).
pub fn welch_t_test(a: &[f64], b: &[f64]) -> StatResult<WelchT> {
    for sample in [a, b] {
        if sample.len() < 2 {
            return Err(StatError::TooFewObservations {
                needed: 2,
                got: sample.len(),
            });
        }
        ensure_finite(sample)?;
    }

    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (m1, m2) = (mean(a).unwrap_or(0.0), mean(b).unwrap_or(0.0));
    let (v1, v2) = (
        sample_variance(a).unwrap_or(0.0),
        sample_variance(b).unwrap_or(0.0),
    );

    let se1 = v1 / n1;
    let se2 = v2 / n2;
    let se = (se1 + se2).sqrt();
    if !(se.is_finite() && se > 0.0) {
        return Err(StatError::ZeroVariance);
    }

    let t = (m1 - m2) / se;
    let df = (se1 + se2).powi(2) / (se1 * se1 / (n1 - 1.0) + se2 * se2 / (n2 - 1.0));
    if !(t.is_finite() && df.is_finite() && df > 0.0) {
        return Err(StatError::ZeroVariance);
    }

    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| StatError::Distribution(e.to_string()))?;
    let p_value = (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0);

    Ok(WelchT {
        test: TestStatistic { statistic: t, p_value },
        df,
    })
}
