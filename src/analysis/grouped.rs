//! Per-group comparisons and group shares.

use serde::Serialize;

use crate::analysis::impact::{ImpactResult, compare_in_group};
use crate::domain::{Dataset, MetricSpec, SampleMode};

/// Group labels ranked by their post-period sum of `metric`, descending.
///
/// Groups seen only before the boundary rank with a sum of zero. Equal sums
/// keep first-appearance order (post records first, then pre). Labels are
/// matched the way [`Dataset::with_category`] matches them (trimmed,
/// ASCII case-insensitive); the first spelling seen names the group.
pub fn rank_groups(pre: &Dataset, post: &Dataset, metric: &str, group_key: &str) -> Vec<(String, f64)> {
    rank_by_sum([(post, true), (pre, false)], metric, group_key)
}

/// Group labels of `dataset` ranked by their total of `metric`, descending.
pub fn groups_by_total(dataset: &Dataset, metric: &str, group_key: &str) -> Vec<(String, f64)> {
    rank_by_sum([(dataset, true)], metric, group_key)
}

fn rank_by_sum<const N: usize>(sources: [(&Dataset, bool); N], metric: &str, group_key: &str) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = Vec::new();
    for (dataset, counts) in sources {
        for r in dataset.records() {
            let Some(label) = r.category(group_key).map(str::trim) else {
                continue;
            };
            let add = if counts { r.metric(metric).unwrap_or(0.0) } else { 0.0 };
            match ranked.iter_mut().find(|(g, _)| g.eq_ignore_ascii_case(label)) {
                Some((_, total)) => *total += add,
                None => ranked.push((label.to_string(), add)),
            }
        }
    }
    // `sort_by` is stable.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// Compare `metric` within the `top_n` groups of `group_key`.
///
/// Returns exactly `min(top_n, groups)` results ordered by descending
/// post-period magnitude.
pub fn compare_grouped(
    pre: &Dataset,
    post: &Dataset,
    metric: &MetricSpec,
    group_key: &str,
    top_n: usize,
    mode: SampleMode,
) -> Vec<ImpactResult> {
    rank_groups(pre, post, &metric.name, group_key)
        .into_iter()
        .take(top_n)
        .map(|(group, _)| compare_named(pre, post, metric, group_key, &group, mode))
        .collect()
}

/// Compare `metric` for one named group, whether or not it is in the top N.
pub fn compare_named(
    pre: &Dataset,
    post: &Dataset,
    metric: &MetricSpec,
    group_key: &str,
    group: &str,
    mode: SampleMode,
) -> ImpactResult {
    compare_in_group(
        &pre.with_category(group_key, group),
        &post.with_category(group_key, group),
        metric,
        mode,
        group,
    )
}

/// A group's share of a metric's total on each side of the boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupShare {
    pub group: String,
    pub metric: String,
    /// Percent of the pre-period total; `None` when that total is zero.
    pub pre_percent: Option<f64>,
    pub post_percent: Option<f64>,
    /// `post_percent - pre_percent`, in percentage points.
    pub change_points: Option<f64>,
}

pub fn group_share(pre: &Dataset, post: &Dataset, metric: &str, group_key: &str, group: &str) -> GroupShare {
    let pre_percent = share(pre, metric, group_key, group);
    let post_percent = share(post, metric, group_key, group);
    GroupShare {
        group: group.to_string(),
        metric: metric.to_string(),
        pre_percent,
        post_percent,
        change_points: pre_percent.zip(post_percent).map(|(a, b)| b - a),
    }
}

/// Share of `group` in the total of `metric` over `dataset`, in percent.
pub fn share(dataset: &Dataset, metric: &str, group_key: &str, group: &str) -> Option<f64> {
    let total: f64 = dataset.values(metric).iter().sum();
    if total == 0.0 {
        return None;
    }
    let part: f64 = dataset.with_category(group_key, group).values(metric).iter().sum();
    Some(part / total * 100.0)
}
