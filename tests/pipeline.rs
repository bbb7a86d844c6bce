use chrono::NaiveDate;

use tariff_impact::analysis::{Comparison, Significance};
use tariff_impact::app::pipeline::{TrendTable, run_analysis, run_trend};
use tariff_impact::data::{SampleConfig, write_sample_csv};
use tariff_impact::domain::{BoundaryAlign, PeriodBoundary, Source, YearMonth};
use tariff_impact::io::{write_group_trend_csv, write_results_csv, write_run_json, write_trend_csv};

fn sample_config() -> SampleConfig {
    SampleConfig {
        seed: 2025,
        start: YearMonth { year: 2024, month: 10 },
        months: 12,
        partners: 5,
        boundary: PeriodBoundary::new(NaiveDate::from_ymd_opt(2025, 4, 9).unwrap(), BoundaryAlign::Month),
    }
}

#[test]
fn generated_sample_shows_significant_drop_for_focus_partner() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.csv");
    assert_eq!(write_sample_csv(&input, &sample_config()).unwrap(), 12 * 5 * 2);

    let run = run_analysis(&input, &Source::Generic.profile()).unwrap();
    assert_eq!(run.rows_used, 120);
    assert_eq!(run.rows_skipped, 0);
    assert_eq!(run.segments.len(), 1);

    let segment = &run.segments[0];
    assert_eq!(segment.pre_records, 60);
    assert_eq!(segment.post_records, 60);

    // volume, value and the derived price
    let names: Vec<&str> = segment.results.iter().map(|r| r.metric.name.as_str()).collect();
    assert_eq!(names, ["volume", "value", "price"]);

    // 5 groups x 3 metrics, the largest post-period partner first.
    assert_eq!(segment.grouped.len(), 15);
    assert_eq!(segment.grouped[0].group.as_deref(), Some("European Union"));

    let china_volume = &segment.focus[0];
    assert_eq!(china_volume.group.as_deref(), Some("China"));
    assert_eq!(china_volume.metric.name, "volume");
    let Comparison::Computed(stats) = &china_volume.comparison else {
        panic!("expected computed comparison for China volume");
    };
    assert!(stats.change_percent < -50.0, "change was {}", stats.change_percent);
    assert_eq!(stats.test.significance, Significance::Significant);

    let share = segment.focus_share.as_ref().unwrap();
    assert!(share.post_percent.unwrap() < share.pre_percent.unwrap());

    assert_eq!(segment.trend.rows.len(), 12);
}

#[test]
fn exports_cover_every_result() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.csv");
    write_sample_csv(&input, &sample_config()).unwrap();
    let run = run_analysis(&input, &Source::Generic.profile()).unwrap();

    let results = dir.path().join("results.csv");
    write_results_csv(&results, &run).unwrap();
    let text = std::fs::read_to_string(&results).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("segment,scope,group,metric,unit,"));
    // 3 overall + 15 top + 3 focus
    assert_eq!(lines.count(), 21);

    let json = dir.path().join("run.json");
    write_run_json(&json, &run).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(doc["segments"].as_array().unwrap().len(), 1);
    assert_eq!(doc["rows_used"], 120);

    let trend = dir.path().join("trend.csv");
    let tables: Vec<&TrendTable> = run.segments.iter().map(|s| &s.trend).collect();
    write_trend_csv(&trend, &tables).unwrap();
    let text = std::fs::read_to_string(&trend).unwrap();
    // header + 12 months
    assert_eq!(text.lines().count(), 13);
}

#[test]
fn trend_matches_analysis_trend() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.csv");
    write_sample_csv(&input, &sample_config()).unwrap();
    let profile = Source::Generic.profile();

    let run = run_analysis(&input, &profile).unwrap();
    let trends = run_trend(&input, &profile).unwrap();
    assert_eq!(trends.len(), 1);
    assert_eq!(trends[0].rows, run.segments[0].trend.rows);
}

#[test]
fn group_trend_splits_every_month_across_partners() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.csv");
    write_sample_csv(&input, &sample_config()).unwrap();
    let run = run_analysis(&input, &Source::Generic.profile()).unwrap();
    let trend = &run.segments[0].trend;

    // One breakdown per metric; all 5 partners make the top 5.
    assert_eq!(trend.groups.len(), 3);
    let volume = &trend.groups[0];
    assert_eq!(volume.metric.name, "volume");
    assert_eq!(volume.groups.len(), 5);
    assert!(volume.groups.iter().any(|g| g == "China"));
    assert!(!trend.groups[2].has_shares());

    for row in &volume.rows {
        let shares: f64 = row.shares.iter().map(|s| s.unwrap()).sum();
        assert!((shares - 100.0).abs() < 1e-6, "{}: {shares}", row.month);
    }

    let china = volume.groups.iter().position(|g| g == "China").unwrap();
    let first = volume.rows.first().unwrap().shares[china].unwrap();
    let last = volume.rows.last().unwrap().shares[china].unwrap();
    assert!(last < first, "China share went from {first} to {last}");

    let path = dir.path().join("groups.csv");
    let tables: Vec<&TrendTable> = run.segments.iter().map(|s| &s.trend).collect();
    write_group_trend_csv(&path, &tables).unwrap();
    // header + 3 metrics x 12 months x 5 partners
    assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1 + 3 * 12 * 5);
}

#[test]
fn missing_input_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = run_analysis(&dir.path().join("absent.csv"), &Source::Generic.profile()).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
