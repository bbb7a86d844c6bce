//! Period splitting and monthly aggregation.

use std::collections::BTreeMap;

use crate::domain::{Aggregation, Dataset, MetricSpec, PeriodBoundary, YearMonth};
use crate::stats::mean;

/// Partition `dataset` into `(pre, post)` around `boundary`.
///
/// `pre = {r : r.date < cutoff}` and `post = {r : r.date >= cutoff}`; every
/// record lands on exactly one side and either side may be empty.
pub fn split_by_boundary(dataset: &Dataset, boundary: &PeriodBoundary) -> (Dataset, Dataset) {
    let (post, pre): (Vec<_>, Vec<_>) = dataset
        .records()
        .iter()
        .cloned()
        .partition(|r| boundary.is_post(r.date));
    (Dataset::new(pre), Dataset::new(post))
}

/// One value per calendar month, ascending: the sum or mean of `metric`
/// depending on its aggregation kind. Months with no value are omitted.
pub fn monthly_aggregate(dataset: &Dataset, metric: &MetricSpec) -> Vec<(YearMonth, f64)> {
    let mut by_month: BTreeMap<YearMonth, Vec<f64>> = BTreeMap::new();
    for r in dataset.records() {
        if let Some(v) = r.metric(&metric.name) {
            by_month.entry(r.month()).or_default().push(v);
        }
    }

    by_month
        .into_iter()
        .filter_map(|(month, values)| {
            let value = match metric.aggregation {
                Aggregation::Sum => values.iter().sum(),
                Aggregation::Mean => mean(&values)?,
            };
            Some((month, value))
        })
        .collect()
}

/// Just the monthly values of [`monthly_aggregate`].
pub fn monthly_values(dataset: &Dataset, metric: &MetricSpec) -> Vec<f64> {
    monthly_aggregate(dataset, metric).into_iter().map(|(_, v)| v).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundaryAlign, Record};
    use chrono::NaiveDate;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn monthly_dataset() -> Dataset {
        let mut records = Vec::new();
        for month in 1..=10 {
            for v in [1.0, 2.0] {
                records.push(
                    Record::new(ymd(2025, month, 1))
                        .with_metric("volume", v * f64::from(month))
                        .with_metric("price", v),
                );
            }
        }
        Dataset::new(records)
    }

    #[test]
    fn split_is_a_disjoint_partition() {
        let ds = monthly_dataset();
        for day in [1, 9, 28] {
            for align in [BoundaryAlign::Exact, BoundaryAlign::Month] {
                let boundary = PeriodBoundary::new(ymd(2025, 4, day), align);
                let (pre, post) = split_by_boundary(&ds, &boundary);
                assert_eq!(pre.len() + post.len(), ds.len());
                assert!(pre.records().iter().all(|r| r.date < boundary.cutoff()));
                assert!(post.records().iter().all(|r| r.date >= boundary.cutoff()));
                let mut union: Vec<_> = pre.records().iter().chain(post.records()).cloned().collect();
                union.sort_by(|a, b| a.date.cmp(&b.date).then(a.metric("volume").partial_cmp(&b.metric("volume")).unwrap()));
                let mut original = ds.records().to_vec();
                original.sort_by(|a, b| a.date.cmp(&b.date).then(a.metric("volume").partial_cmp(&b.metric("volume")).unwrap()));
                assert_eq!(union, original);
            }
        }
    }

    #[test]
    fn tariff_split_gives_three_and_seven_months() {
        let ds = monthly_dataset();
        let boundary = PeriodBoundary::new(ymd(2025, 4, 9), BoundaryAlign::Month);
        let (pre, post) = split_by_boundary(&ds, &boundary);
        let volume = MetricSpec::new("volume", "kg", Aggregation::Sum);
        assert_eq!(monthly_values(&pre, &volume).len(), 3);
        assert_eq!(monthly_values(&post, &volume).len(), 7);
    }

    #[test]
    fn either_side_may_be_empty() {
        let ds = monthly_dataset();
        let early = PeriodBoundary::new(ymd(2020, 1, 1), BoundaryAlign::Exact);
        let (pre, post) = split_by_boundary(&ds, &early);
        assert!(pre.is_empty());
        assert_eq!(post.len(), ds.len());

        let (pre, post) = split_by_boundary(&Dataset::default(), &early);
        assert!(pre.is_empty() && post.is_empty());
    }

    #[test]
    fn monthly_aggregation_sums_or_averages() {
        let ds = monthly_dataset();
        let volume = MetricSpec::new("volume", "kg", Aggregation::Sum);
        let price = MetricSpec::new("price", "USD/kg", Aggregation::Mean);

        let v = monthly_aggregate(&ds, &volume);
        assert_eq!(v.len(), 10);
        assert_eq!(v[0], (YearMonth { year: 2025, month: 1 }, 3.0));
        assert_eq!(v[9].1, 30.0);

        let p = monthly_values(&ds, &price);
        assert!(p.iter().all(|&x| (x - 1.5).abs() < 1e-12));
    }
}
