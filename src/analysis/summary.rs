//! Per-side descriptive summaries.

use serde::Serialize;

use crate::domain::Dataset;
use crate::stats::{mean, sample_std_dev};

/// Descriptive statistics of one metric on one side of the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub count: usize,
    pub mean: f64,
    pub sum: f64,
    /// Sample standard deviation; `None` below two observations.
    pub std_dev: Option<f64>,
}

/// Summarize `metric` over `dataset`.
///
/// Returns `None` ("unavailable") when the dataset holds no value for the
/// metric; callers must check before computing ratios.
pub fn summarize(dataset: &Dataset, metric: &str) -> Option<MetricSummary> {
    let values = dataset.values(metric);
    let mean = mean(&values)?;
    Some(MetricSummary {
        count: values.len(),
        mean,
        sum: values.iter().sum(),
        std_dev: sample_std_dev(&values),
    })
}
