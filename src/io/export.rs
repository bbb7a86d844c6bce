//! Export run results to CSV and JSON.
//!
//! The CSV exports are meant to be easy to consume in spreadsheets or
//! downstream scripts: one row per comparison, with every value that could
//! not be computed written as the literal `unavailable`.

use std::fs::File;
use std::path::Path;

use log::info;

use crate::analysis::{Comparison, ImpactResult, MetricSummary};
use crate::app::pipeline::{AnalysisRun, TrendTable};
use crate::error::AppError;

pub const UNAVAILABLE: &str = "unavailable";

const RESULT_HEADER: [&str; 18] = [
    "segment",
    "scope",
    "group",
    "metric",
    "unit",
    "pre_count",
    "pre_mean",
    "pre_std",
    "pre_sum",
    "post_count",
    "post_mean",
    "post_std",
    "post_sum",
    "change",
    "change_percent",
    "test",
    "p_value",
    "significance",
];

/// Write one row per comparison of `run` to a CSV file.
pub fn write_results_csv(path: &Path, run: &AnalysisRun) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::output(format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writer
        .write_record(RESULT_HEADER)
        .map_err(|e| AppError::output(format!("Failed to write export CSV header: {e}")))?;

    for segment in &run.segments {
        let scoped = [("overall", &segment.results), ("top", &segment.grouped), ("focus", &segment.focus)];
        for (scope, results) in scoped {
            for r in results {
                writer
                    .write_record(result_row(&segment.name, scope, r))
                    .map_err(|e| AppError::output(format!("Failed to write export CSV row: {e}")))?;
            }
        }
    }

    writer
        .flush()
        .map_err(|e| AppError::output(format!("Failed to write export CSV: {e}")))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn result_row(segment: &str, scope: &str, r: &ImpactResult) -> Vec<String> {
    let mut row = vec![
        segment.to_string(),
        scope.to_string(),
        r.group.clone().unwrap_or_default(),
        r.metric.name.clone(),
        r.metric.unit.clone(),
    ];

    match &r.comparison {
        Comparison::Computed(s) => {
            push_summary(&mut row, &s.pre);
            push_summary(&mut row, &s.post);
            row.push(fmt_value(s.change));
            row.push(fmt_value(s.change_percent));
            row.push(s.test.method.label().to_string());
            row.push(s.test.p_value.map(fmt_p).unwrap_or_else(|| UNAVAILABLE.to_string()));
            row.push(s.test.significance.label().to_string());
        }
        Comparison::NoData { pre_count, post_count } => {
            for count in [pre_count, post_count] {
                row.push(count.to_string());
                row.extend(std::iter::repeat_n(UNAVAILABLE.to_string(), 3));
            }
            row.extend(std::iter::repeat_n(UNAVAILABLE.to_string(), 4));
            row.push(r.verdict().to_string());
        }
    }
    row
}

fn push_summary(row: &mut Vec<String>, s: &MetricSummary) {
    row.push(s.count.to_string());
    row.push(fmt_value(s.mean));
    row.push(s.std_dev.map(fmt_value).unwrap_or_else(|| UNAVAILABLE.to_string()));
    row.push(fmt_value(s.sum));
}

/// Write the monthly trend of every segment to one CSV file.
///
/// Columns are `segment,month,<metric>...` plus `<focus>_share_pct` when a
/// focus group is tracked; months without a value are left empty.
pub fn write_trend_csv(path: &Path, tables: &[&TrendTable]) -> Result<(), AppError> {
    let Some(first) = tables.first() else {
        return Err(AppError::no_data("No trend rows to export."));
    };
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::output(format!("Failed to create trend CSV '{}': {e}", path.display())))?;

    let mut header = vec!["segment".to_string(), "month".to_string()];
    header.extend(first.metrics.iter().map(|m| m.name.clone()));
    if let Some(focus) = &first.focus {
        header.push(format!("{}_share_pct", focus.to_lowercase().replace(' ', "_")));
    }
    writer
        .write_record(&header)
        .map_err(|e| AppError::output(format!("Failed to write trend CSV header: {e}")))?;

    for table in tables {
        for row in &table.rows {
            let mut record = vec![table.segment.clone(), row.month.to_string()];
            record.extend(row.values.iter().map(|v| v.map(fmt_value).unwrap_or_default()));
            if first.focus.is_some() {
                record.push(row.focus_share.map(fmt_value).unwrap_or_default());
            }
            writer
                .write_record(&record)
                .map_err(|e| AppError::output(format!("Failed to write trend CSV row: {e}")))?;
        }
    }

    writer
        .flush()
        .map_err(|e| AppError::output(format!("Failed to write trend CSV: {e}")))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Write every group trend of `tables` in long form: one row per segment,
/// metric, month and group, with the month total and the group's share.
pub fn write_group_trend_csv(path: &Path, tables: &[&TrendTable]) -> Result<(), AppError> {
    if tables.iter().all(|t| t.groups.is_empty()) {
        return Err(AppError::no_data("No group trends to export; set a group key with --group-by."));
    }
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::output(format!("Failed to create group trend CSV '{}': {e}", path.display())))?;

    writer
        .write_record(["segment", "metric", "unit", "month", "group", "value", "total", "share_pct"])
        .map_err(|e| AppError::output(format!("Failed to write group trend CSV header: {e}")))?;

    for table in tables {
        for trend in &table.groups {
            for row in &trend.rows {
                for (idx, group) in trend.groups.iter().enumerate() {
                    let cell = |v: Option<f64>| v.map(fmt_value).unwrap_or_default();
                    let record = [
                        table.segment.clone(),
                        trend.metric.name.clone(),
                        trend.metric.unit.clone(),
                        row.month.to_string(),
                        group.clone(),
                        cell(row.values.get(idx).copied().flatten()),
                        cell(row.total),
                        cell(row.shares.get(idx).copied().flatten()),
                    ];
                    writer
                        .write_record(&record)
                        .map_err(|e| AppError::output(format!("Failed to write group trend CSV row: {e}")))?;
                }
            }
        }
    }

    writer
        .flush()
        .map_err(|e| AppError::output(format!("Failed to write group trend CSV: {e}")))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Write the full run (settings, every comparison, trends) as pretty JSON.
pub fn write_run_json(path: &Path, run: &AnalysisRun) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::output(format!("Failed to create JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, run).map_err(|e| AppError::output(format!("Failed to write JSON: {e}")))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn fmt_value(v: f64) -> String {
    format!("{v:.4}")
}

fn fmt_p(p: f64) -> String {
    format!("{p:.6}")
}
