//! Pre/post comparison of a single metric.
//!
//! `compare` never fails: empty sides become [`Comparison::NoData`] and any
//! statistical dead end becomes a `None` p-value with an
//! [`Significance::Unavailable`] verdict.

use log::debug;
use serde::Serialize;

use crate::analysis::period::monthly_values;
use crate::analysis::summary::{MetricSummary, summarize};
use crate::domain::{Dataset, MetricSpec, SampleMode};
use crate::stats::{mann_whitney_u, shapiro_wilk, welch_t_test};

/// p-values strictly below this are "significant".
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;
/// Both sides must exceed this Shapiro-Wilk p-value for the t-test to be used.
pub const NORMALITY_LEVEL: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMethod {
    WelchT,
    MannWhitneyU,
}

impl TestMethod {
    pub fn label(self) -> &'static str {
        match self {
            TestMethod::WelchT => "Welch's t-test",
            TestMethod::MannWhitneyU => "Mann-Whitney U",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    Significant,
    NotSignificant,
    Unavailable,
}

impl Significance {
    pub fn from_p_value(p_value: Option<f64>) -> Self {
        match p_value {
            Some(p) if p < SIGNIFICANCE_LEVEL => Significance::Significant,
            Some(_) => Significance::NotSignificant,
            None => Significance::Unavailable,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Significance::Significant => "significant",
            Significance::NotSignificant => "not significant",
            Significance::Unavailable => "unavailable",
        }
    }
}

/// Which test ran, on how many samples, and what it concluded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestOutcome {
    pub method: TestMethod,
    pub p_value: Option<f64>,
    pub significance: Significance,
    pub pre_samples: usize,
    pub post_samples: usize,
    /// Shapiro-Wilk p-values, when the normality check could run.
    pub pre_normality_p: Option<f64>,
    pub post_normality_p: Option<f64>,
    /// Why the p-value is unavailable.
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactStats {
    pub pre: MetricSummary,
    pub post: MetricSummary,
    pub change: f64,
    pub change_percent: f64,
    pub test: TestOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Comparison {
    /// At least one side had no value for the metric.
    NoData { pre_count: usize, post_count: usize },
    Computed(ImpactStats),
}

/// Outcome of comparing one metric (optionally within one group).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactResult {
    pub metric: MetricSpec,
    pub group: Option<String>,
    pub comparison: Comparison,
}

impl ImpactResult {
    pub fn stats(&self) -> Option<&ImpactStats> {
        match &self.comparison {
            Comparison::Computed(stats) => Some(stats),
            Comparison::NoData { .. } => None,
        }
    }

    pub fn p_value(&self) -> Option<f64> {
        self.stats().and_then(|s| s.test.p_value)
    }

    /// "significant", "not significant", "unavailable" or "no data".
    pub fn verdict(&self) -> &'static str {
        match &self.comparison {
            Comparison::Computed(stats) => stats.test.significance.label(),
            Comparison::NoData { .. } => "no data",
        }
    }

    fn labeled(mut self, group: Option<String>) -> Self {
        self.group = group;
        self
    }
}

/// Compare `metric` between the pre- and post-period datasets.
pub fn compare(pre: &Dataset, post: &Dataset, metric: &MetricSpec, mode: SampleMode) -> ImpactResult {
    let (Some(pre_summary), Some(post_summary)) = (summarize(pre, &metric.name), summarize(post, &metric.name)) else {
        let pre_count = pre.values(&metric.name).len();
        let post_count = post.values(&metric.name).len();
        debug!("{}: no data (pre={pre_count}, post={post_count})", metric.name);
        return ImpactResult {
            metric: metric.clone(),
            group: None,
            comparison: Comparison::NoData { pre_count, post_count },
        };
    };

    let change = post_summary.mean - pre_summary.mean;
    let change_percent = if pre_summary.mean == 0.0 {
        0.0
    } else {
        change / pre_summary.mean * 100.0
    };

    let (pre_samples, post_samples) = match mode {
        SampleMode::Raw => (pre.values(&metric.name), post.values(&metric.name)),
        SampleMode::Monthly => (monthly_values(pre, metric), monthly_values(post, metric)),
    };
    let test = run_test(&metric.name, &pre_samples, &post_samples);

    ImpactResult {
        metric: metric.clone(),
        group: None,
        comparison: Comparison::Computed(ImpactStats {
            pre: pre_summary,
            post: post_summary,
            change,
            change_percent,
            test,
        }),
    }
}

/// Same as [`compare`], labeled with `group`.
pub fn compare_in_group(
    pre: &Dataset,
    post: &Dataset,
    metric: &MetricSpec,
    mode: SampleMode,
    group: &str,
) -> ImpactResult {
    compare(pre, post, metric, mode).labeled(Some(group.to_string()))
}

/// Normality-gated choice between Welch's t-test and Mann-Whitney U.
fn run_test(metric: &str, pre: &[f64], post: &[f64]) -> TestOutcome {
    let pre_normality = shapiro_wilk(pre);
    let post_normality = shapiro_wilk(post);

    let method = match (&pre_normality, &post_normality) {
        (Ok(a), Ok(b)) if a.p_value > NORMALITY_LEVEL && b.p_value > NORMALITY_LEVEL => TestMethod::WelchT,
        (Ok(a), Ok(b)) => {
            debug!(
                "{metric}: normality rejected (pre p={:.4}, post p={:.4}), using Mann-Whitney U",
                a.p_value, b.p_value
            );
            TestMethod::MannWhitneyU
        }
        (Err(e), _) | (_, Err(e)) => {
            debug!("{metric}: normality check unavailable ({e}), using Mann-Whitney U");
            TestMethod::MannWhitneyU
        }
    };

    let p_value = match method {
        TestMethod::WelchT => welch_t_test(pre, post).map(|r| r.test.p_value),
        TestMethod::MannWhitneyU => mann_whitney_u(pre, post).map(|r| r.test.p_value),
    };
    let (p_value, note) = match p_value {
        Ok(p) => (Some(p), None),
        Err(e) => {
            debug!("{metric}: {} unavailable ({e})", method.label());
            (None, Some(e.to_string()))
        }
    };

    TestOutcome {
        method,
        p_value,
        significance: Significance::from_p_value(p_value),
        pre_samples: pre.len(),
        post_samples: post.len(),
        pre_normality_p: pre_normality.ok().map(|r| r.p_value),
        post_normality_p: post_normality.ok().map(|r| r.p_value),
        note,
    }
}
