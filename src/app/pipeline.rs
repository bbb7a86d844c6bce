//! Shared analysis pipeline used by the `analyze` and `trend` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> window -> per segment: split -> compare / top-N groups / focus group -> trend
//!
//! The commands can then focus on presentation (printing, exports, charts).

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::analysis::{
    GroupShare, GroupTrend, ImpactResult, TrendFocus, TrendRow, compare, compare_grouped, compare_named,
    group_monthly_trend, group_share, groups_by_total, monthly_trend, split_by_boundary,
};
use crate::domain::{CategoryFilter, Dataset, DateWindow, MetricSpec, PeriodBoundary, SampleMode, SourceProfile};
use crate::error::AppError;
use crate::io::ingest::{IngestedData, load_dataset};

/// Monthly trend of one segment.
#[derive(Debug, Clone, Serialize)]
pub struct TrendTable {
    pub segment: String,
    pub metrics: Vec<MetricSpec>,
    /// Focus group whose share of the magnitude metric is tracked.
    pub focus: Option<String>,
    pub rows: Vec<TrendRow>,
    /// Per-group breakdown of every metric (top-N groups plus the focus group).
    pub groups: Vec<GroupTrend>,
}

/// All comparisons computed for one segment.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentReport {
    pub name: String,
    pub pre_records: usize,
    pub post_records: usize,
    /// One result per metric over the whole segment.
    pub results: Vec<ImpactResult>,
    /// Top-N groups (ranked by the magnitude metric), every metric per group.
    pub grouped: Vec<ImpactResult>,
    /// The focus group, every metric.
    pub focus: Vec<ImpactResult>,
    pub focus_share: Option<GroupShare>,
    pub trend: TrendTable,
}

/// All computed outputs of a single `tariff analyze` run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRun {
    pub title: String,
    pub input: PathBuf,
    pub boundary: PeriodBoundary,
    pub sample_mode: SampleMode,
    pub window: Option<DateWindow>,
    pub group_by: Option<String>,
    pub top_n: usize,
    pub rows_read: usize,
    pub rows_used: usize,
    pub rows_skipped: usize,
    pub segments: Vec<SegmentReport>,
}

/// Load `input` with `profile` and run every comparison.
pub fn run_analysis(input: &Path, profile: &SourceProfile) -> Result<AnalysisRun, AppError> {
    profile.validate()?;
    let ingest = load_dataset(input, profile)?;
    analyze_ingested(input, profile, &ingest)
}

/// Run every comparison on already-ingested data.
pub fn analyze_ingested(input: &Path, profile: &SourceProfile, ingest: &IngestedData) -> Result<AnalysisRun, AppError> {
    let full = &ingest.dataset;
    if let Some((first, last)) = full.date_range() {
        info!("records span {first} .. {last}");
    }
    let windowed = match &profile.window {
        Some(window) => full.within(window),
        None => full.clone(),
    };
    if windowed.is_empty() {
        return Err(AppError::no_data(format!(
            "No records fall inside the analysis window{}.",
            profile
                .window
                .map(|w| format!(" {}..{}", w.start, w.end))
                .unwrap_or_default()
        )));
    }

    let metrics = profile.metric_specs();
    let magnitude = profile.magnitude_metric();
    let segments = profile
        .effective_segments()
        .iter()
        .map(|segment| {
            let scoped = apply_filters(&windowed, &segment.filters);
            let (pre, post) = split_by_boundary(&scoped, &profile.boundary);
            info!(
                "segment '{}': {} pre-period / {} post-period records",
                segment.name,
                pre.len(),
                post.len()
            );
            if pre.is_empty() || post.is_empty() {
                warn!(
                    "segment '{}': {} period is empty",
                    segment.name,
                    if pre.is_empty() { "pre" } else { "post" }
                );
            }

            let trend = build_trend(
                &segment.name,
                &apply_filters(full, &segment.filters),
                &metrics,
                magnitude.as_ref(),
                profile,
            );
            compare_segment(&segment.name, &pre, &post, &metrics, magnitude.as_ref(), profile, trend)
        })
        .collect();

    Ok(AnalysisRun {
        title: profile.title.clone(),
        input: input.to_path_buf(),
        boundary: profile.boundary,
        sample_mode: profile.sample_mode,
        window: profile.window,
        group_by: profile.group_by.clone(),
        top_n: profile.top_n,
        rows_read: ingest.rows_read,
        rows_used: ingest.rows_used,
        rows_skipped: ingest.row_errors.len(),
        segments,
    })
}

/// Load `input` and build the monthly trend of every segment (no comparisons).
pub fn run_trend(input: &Path, profile: &SourceProfile) -> Result<Vec<TrendTable>, AppError> {
    profile.validate()?;
    let ingest = load_dataset(input, profile)?;
    let metrics = profile.metric_specs();
    let magnitude = profile.magnitude_metric();
    Ok(profile
        .effective_segments()
        .iter()
        .map(|segment| {
            build_trend(
                &segment.name,
                &apply_filters(&ingest.dataset, &segment.filters),
                &metrics,
                magnitude.as_ref(),
                profile,
            )
        })
        .collect())
}

fn compare_segment(
    name: &str,
    pre: &Dataset,
    post: &Dataset,
    metrics: &[MetricSpec],
    magnitude: Option<&MetricSpec>,
    profile: &SourceProfile,
    trend: TrendTable,
) -> SegmentReport {
    let mode = profile.sample_mode;
    let results = metrics.iter().map(|m| compare(pre, post, m, mode)).collect();

    let mut grouped = Vec::new();
    let mut focus = Vec::new();
    let mut focus_share = None;
    if let (Some(key), Some(magnitude)) = (profile.group_by.as_deref(), magnitude) {
        for lead in compare_grouped(pre, post, magnitude, key, profile.top_n, mode) {
            let group = lead.group.clone().unwrap_or_default();
            for m in metrics {
                if m.name == magnitude.name {
                    grouped.push(lead.clone());
                } else {
                    grouped.push(compare_named(pre, post, m, key, &group, mode));
                }
            }
        }

        if let Some(group) = profile.focus.as_deref() {
            focus = metrics
                .iter()
                .map(|m| compare_named(pre, post, m, key, group, mode))
                .collect();
            focus_share = Some(group_share(pre, post, &magnitude.name, key, group));
        }
    }

    SegmentReport {
        name: name.to_string(),
        pre_records: pre.len(),
        post_records: post.len(),
        results,
        grouped,
        focus,
        focus_share,
        trend,
    }
}

fn build_trend(
    segment: &str,
    dataset: &Dataset,
    metrics: &[MetricSpec],
    magnitude: Option<&MetricSpec>,
    profile: &SourceProfile,
) -> TrendTable {
    let focus = match (profile.group_by.as_deref(), profile.focus.as_deref(), magnitude) {
        (Some(group_key), Some(group), Some(metric)) => Some(TrendFocus {
            group_key,
            group,
            metric: &metric.name,
        }),
        _ => None,
    };
    let groups = match (profile.group_by.as_deref(), magnitude) {
        (Some(key), Some(magnitude)) => {
            let labels = trend_groups(dataset, &magnitude.name, key, profile.top_n, profile.focus.as_deref());
            metrics
                .iter()
                .map(|m| group_monthly_trend(dataset, m, key, &labels))
                .collect()
        }
        _ => Vec::new(),
    };

    TrendTable {
        segment: segment.to_string(),
        metrics: metrics.to_vec(),
        focus: focus.map(|f| f.group.to_string()),
        rows: monthly_trend(dataset, metrics, focus),
        groups,
    }
}

/// The `top_n` largest groups over the whole dataset, plus the focus group.
fn trend_groups(dataset: &Dataset, metric: &str, key: &str, top_n: usize, focus: Option<&str>) -> Vec<String> {
    let mut labels: Vec<String> = groups_by_total(dataset, metric, key)
        .into_iter()
        .take(top_n)
        .map(|(g, _)| g)
        .collect();
    if let Some(focus) = focus {
        if !labels.iter().any(|g| g.eq_ignore_ascii_case(focus.trim())) {
            labels.push(focus.trim().to_string());
        }
    }
    labels
}

fn apply_filters(dataset: &Dataset, filters: &[CategoryFilter]) -> Dataset {
    filters
        .iter()
        .fold(dataset.clone(), |ds, f| ds.with_category(&f.category, &f.value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Record, Source};
    use chrono::NaiveDate;

    fn ingest(records: Vec<Record>) -> IngestedData {
        let n = records.len();
        IngestedData {
            dataset: Dataset::new(records),
            row_errors: Vec::new(),
            rows_read: n,
            rows_used: n,
        }
    }

    fn record(month: u32, partner: &str, volume: f64, value: f64) -> Record {
        Record::new(NaiveDate::from_ymd_opt(2025, month, 1).unwrap())
            .with_metric("volume", volume)
            .with_metric("value", value)
            .with_metric("price", value / volume)
            .with_category("partner", partner)
            .with_category("product", "soybean")
    }

    fn generic_records() -> Vec<Record> {
        let mut out = Vec::new();
        for month in 1..=10 {
            let after = month >= 4;
            out.push(record(month, "China", if after { 50.0 } else { 100.0 }, 200.0 + f64::from(month)));
            out.push(record(month, "Spain", 40.0 + f64::from(month), 80.0));
            out.push(record(month, "Egypt", 10.0, 20.0 + f64::from(month)));
        }
        out
    }

    #[test]
    fn generic_profile_produces_grouped_and_focus_results() {
        let mut profile = Source::Generic.profile();
        profile.top_n = 2;
        let run = analyze_ingested(Path::new("mem.csv"), &profile, &ingest(generic_records())).unwrap();

        assert_eq!(run.segments.len(), 1);
        let seg = &run.segments[0];
        assert_eq!(seg.pre_records, 9);
        assert_eq!(seg.post_records, 21);
        assert_eq!(seg.results.len(), 3);
        // 2 groups x 3 metrics, group-major.
        assert_eq!(seg.grouped.len(), 6);
        assert_eq!(seg.grouped[0].group.as_deref(), Some("China"));
        assert_eq!(seg.grouped[3].group.as_deref(), Some("Spain"));
        assert_eq!(seg.focus.len(), 3);

        let share = seg.focus_share.as_ref().unwrap();
        assert!(share.change_points.unwrap() < 0.0);

        assert_eq!(seg.trend.rows.len(), 10);
        assert_eq!(seg.trend.focus.as_deref(), Some("China"));
    }

    #[test]
    fn trend_breaks_every_metric_down_by_top_groups_and_focus() {
        let mut profile = Source::Generic.profile();
        profile.top_n = 1;
        profile.focus = Some("egypt".to_string());
        let run = analyze_ingested(Path::new("mem.csv"), &profile, &ingest(generic_records())).unwrap();
        let trend = &run.segments[0].trend;

        assert_eq!(trend.groups.len(), 3);
        let volume = &trend.groups[0];
        assert_eq!(volume.metric.name, "volume");
        assert_eq!(volume.group_key, "partner");
        assert_eq!(volume.groups, ["China", "egypt"]);
        assert_eq!(volume.rows.len(), 10);
        // January: China 100, Spain 41, Egypt 10.
        assert_eq!(volume.rows[0].total, Some(151.0));
        assert_eq!(volume.rows[0].values, vec![Some(100.0), Some(10.0)]);
        assert!((volume.rows[0].shares[0].unwrap() - 100.0 / 151.0 * 100.0).abs() < 1e-9);

        // price is a mean, so no shares.
        assert!(trend.groups[2].rows.iter().all(|r| r.shares.iter().all(Option::is_none)));
    }

    #[test]
    fn no_group_key_means_no_group_trend() {
        let mut profile = Source::Generic.profile();
        profile.group_by = None;
        profile.focus = None;
        let run = analyze_ingested(Path::new("mem.csv"), &profile, &ingest(generic_records())).unwrap();
        assert!(run.segments[0].trend.groups.is_empty());
    }

    #[test]
    fn window_without_records_is_no_data() {
        let mut profile = Source::Generic.profile();
        profile.window = DateWindow::year(2019);
        let err = analyze_ingested(Path::new("mem.csv"), &profile, &ingest(generic_records())).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_NO_DATA);
    }

    #[test]
    fn segments_filter_before_comparing() {
        let profile = Source::China.profile();
        let date = |m| NaiveDate::from_ymd_opt(2025, m, 1).unwrap();
        let mut records = Vec::new();
        for m in 1..=6 {
            records.push(
                Record::new(date(m))
                    .with_metric("price", 5.0)
                    .with_metric("amount", 10.0)
                    .with_metric("value", 50.0)
                    .with_category("partner", "USA")
                    .with_category("product", "GM Yellow Soybean"),
            );
            records.push(
                Record::new(date(m))
                    .with_metric("amount", 1.0)
                    .with_category("partner", "Brazil")
                    .with_category("product", "GM Yellow Soybean"),
            );
        }
        let run = analyze_ingested(Path::new("mem.csv"), &profile, &ingest(records)).unwrap();
        assert_eq!(run.segments.len(), 2);
        assert_eq!(run.segments[0].pre_records + run.segments[0].post_records, 6);
        // No black soybean exports at all.
        assert_eq!(run.segments[1].results[0].verdict(), "no data");
    }
}
