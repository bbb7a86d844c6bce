//! Monthly trend tables: whole-dataset rows and per-group breakdowns.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::analysis::grouped::share;
use crate::analysis::period::monthly_aggregate;
use crate::domain::{Aggregation, Dataset, MetricSpec, Record, YearMonth};

/// Group whose monthly share of `metric` is tracked alongside the trend.
#[derive(Debug, Clone, Copy)]
pub struct TrendFocus<'a> {
    pub group_key: &'a str,
    pub group: &'a str,
    pub metric: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRow {
    pub month: YearMonth,
    /// One entry per requested metric, in order; `None` for months without a value.
    pub values: Vec<Option<f64>>,
    pub focus_share: Option<f64>,
}

/// One row per month present in `dataset`, ascending.
pub fn monthly_trend(dataset: &Dataset, metrics: &[MetricSpec], focus: Option<TrendFocus<'_>>) -> Vec<TrendRow> {
    let mut rows: BTreeMap<YearMonth, Vec<Option<f64>>> = BTreeMap::new();
    for r in dataset.records() {
        rows.entry(r.month()).or_insert_with(|| vec![None; metrics.len()]);
    }
    for (idx, metric) in metrics.iter().enumerate() {
        for (month, value) in monthly_aggregate(dataset, metric) {
            if let Some(values) = rows.get_mut(&month) {
                values[idx] = Some(value);
            }
        }
    }

    rows.into_iter()
        .map(|(month, values)| {
            let focus_share = focus.and_then(|f| {
                let in_month = dataset.filter(|r| r.month() == month);
                share(&in_month, f.metric, f.group_key, f.group)
            });
            TrendRow {
                month,
                values,
                focus_share,
            }
        })
        .collect()
}

/// Monthly values of one metric broken down by group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTrend {
    pub metric: MetricSpec,
    pub group_key: String,
    pub groups: Vec<String>,
    pub rows: Vec<GroupTrendRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTrendRow {
    pub month: YearMonth,
    /// The month's value over every record, not just the listed groups.
    pub total: Option<f64>,
    /// One entry per group, in `GroupTrend::groups` order.
    pub values: Vec<Option<f64>>,
    /// Percent of `total` per group. Additive metrics only; a group without
    /// records in a month has a share of zero.
    pub shares: Vec<Option<f64>>,
}

impl GroupTrend {
    /// Whether shares of the total are meaningful for this metric.
    pub fn has_shares(&self) -> bool {
        self.metric.aggregation == Aggregation::Sum
    }
}

/// One row per month present in `dataset` with the value of `metric` for
/// each of `groups` and each group's share of the month total.
pub fn group_monthly_trend(dataset: &Dataset, metric: &MetricSpec, group_key: &str, groups: &[String]) -> GroupTrend {
    let months: BTreeSet<YearMonth> = dataset.records().iter().map(Record::month).collect();
    let totals: BTreeMap<YearMonth, f64> = monthly_aggregate(dataset, metric).into_iter().collect();
    let per_group: Vec<BTreeMap<YearMonth, f64>> = groups
        .iter()
        .map(|g| monthly_aggregate(&dataset.with_category(group_key, g), metric).into_iter().collect())
        .collect();
    let additive = metric.aggregation == Aggregation::Sum;

    let rows = months
        .into_iter()
        .map(|month| {
            let total = totals.get(&month).copied();
            let values: Vec<Option<f64>> = per_group.iter().map(|m| m.get(&month).copied()).collect();
            let shares = values
                .iter()
                .map(|v| match total {
                    Some(t) if additive && t != 0.0 => Some(v.unwrap_or(0.0) / t * 100.0),
                    _ => None,
                })
                .collect();
            GroupTrendRow {
                month,
                total,
                values,
                shares,
            }
        })
        .collect();

    GroupTrend {
        metric: metric.clone(),
        group_key: group_key.to_string(),
        groups: groups.to_vec(),
        rows,
    }
}
