//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the analysis code stays clean and testable
//! - output changes are localized (and easy to snapshot-test)

use crate::analysis::{Comparison, GroupShare, GroupTrend, ImpactResult};
use crate::app::pipeline::{AnalysisRun, SegmentReport, TrendTable};
use crate::domain::SampleMode;
use crate::report::assessment;

/// Run header: input accounting and analysis settings.
pub fn format_run_header(run: &AnalysisRun) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== tariff - {} ===\n", run.title));
    out.push_str(&format!(
        "Input: {} | rows read={} used={} skipped={}\n",
        run.input.display(),
        run.rows_read,
        run.rows_used,
        run.rows_skipped
    ));
    out.push_str(&format!("Boundary: {}\n", run.boundary));
    let samples = match run.sample_mode {
        SampleMode::Raw => "raw values",
        SampleMode::Monthly => "monthly aggregates",
    };
    out.push_str(&format!("Test samples: {samples}\n"));
    if let Some(w) = &run.window {
        out.push_str(&format!("Window: {} .. {}\n", w.start, w.end));
    }

    out
}

/// All tables and the assessment of one segment.
pub fn format_segment(segment: &SegmentReport, group_by: Option<&str>) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n--- {} (pre={} records, post={} records) ---\n",
        segment.name, segment.pre_records, segment.post_records
    ));
    out.push_str(&format_results_table(&segment.results, false));

    if !segment.grouped.is_empty() {
        let mut groups: Vec<&str> = segment.grouped.iter().filter_map(|r| r.group.as_deref()).collect();
        groups.dedup();
        out.push_str(&format!(
            "\nTop {} {} by post-period magnitude:\n",
            groups.len(),
            group_by.unwrap_or("groups")
        ));
        out.push_str(&format_results_table(&segment.grouped, true));
    }

    if let Some(focus) = segment.focus.first().and_then(|r| r.group.as_deref()) {
        out.push_str(&format!("\nFocus: {focus}\n"));
        out.push_str(&format_results_table(&segment.focus, false));
    }
    if let Some(share) = &segment.focus_share {
        out.push_str(&format_share(share));
    }

    out.push_str("\nComprehensive assessment:\n");
    for r in segment.results.iter().chain(segment.focus.iter()) {
        out.push_str(&format!("- {}\n", assessment(r)));
    }

    out
}

fn format_results_table(results: &[ImpactResult], with_group: bool) -> String {
    let mut out = String::new();

    let group_col = if with_group { format!("{:<16} ", "group") } else { String::new() };
    out.push_str(
        format!(
            "{group_col}{:<10} {:<8} {:>14} {:>14} {:>14} {:>9} {:<15} {:>11} {:<15}",
            "metric", "unit", "pre_mean", "post_mean", "change", "change%", "test", "p_value", "verdict"
        )
        .trim_end(),
    );
    out.push('\n');

    let group_rule = if with_group { format!("{:-<16} ", "") } else { String::new() };
    out.push_str(&format!(
        "{group_rule}{:-<10} {:-<8} {:-<14} {:-<14} {:-<14} {:-<9} {:-<15} {:-<11} {:-<15}\n",
        "", "", "", "", "", "", "", "", ""
    ));

    for r in results {
        let group_col = if with_group {
            format!("{:<16} ", truncate(r.group.as_deref().unwrap_or(""), 16))
        } else {
            String::new()
        };
        let line = match &r.comparison {
            Comparison::Computed(s) => format!(
                "{group_col}{:<10} {:<8} {:>14} {:>14} {:>14} {:>8.2}% {:<15} {:>11} {:<15}",
                truncate(&r.metric.name, 10),
                truncate(&r.metric.unit, 8),
                fmt_num(s.pre.mean),
                fmt_num(s.post.mean),
                fmt_num(s.change),
                s.change_percent,
                s.test.method.label(),
                s.test.p_value.map(|p| format!("{p:.4}")).unwrap_or_else(|| "unavailable".to_string()),
                s.test.significance.label(),
            ),
            Comparison::NoData { pre_count, post_count } => format!(
                "{group_col}{:<10} {:<8} {:>14} {:>14} {:>14} {:>9} {:<15} {:>11} {:<15}",
                truncate(&r.metric.name, 10),
                truncate(&r.metric.unit, 8),
                format!("n={pre_count}"),
                format!("n={post_count}"),
                "-",
                "-",
                "-",
                "-",
                r.verdict(),
            ),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

fn format_share(share: &GroupShare) -> String {
    let pct = |v: Option<f64>| v.map(|x| format!("{x:.2}%")).unwrap_or_else(|| "unavailable".to_string());
    let points = share
        .change_points
        .map(|x| format!("{x:+.2} pp"))
        .unwrap_or_else(|| "unavailable".to_string());
    format!(
        "{} share of {}: {} -> {} ({points})\n",
        share.group,
        share.metric,
        pct(share.pre_percent),
        pct(share.post_percent)
    )
}

/// Monthly trend table of one segment.
pub fn format_trend(table: &TrendTable) -> String {
    let mut out = String::new();

    out.push_str(&format!("\nMonthly trend: {}\n", table.segment));
    let mut header = format!("{:<8}", "month");
    for m in &table.metrics {
        header.push_str(&format!(" {:>16}", truncate(&format!("{} ({})", m.name, m.unit), 16)));
    }
    if let Some(focus) = &table.focus {
        header.push_str(&format!(" {:>12}", truncate(&format!("{focus} %"), 12)));
    }
    out.push_str(header.trim_end());
    out.push('\n');

    for row in &table.rows {
        let mut line = format!("{:<8}", row.month.to_string());
        for v in &row.values {
            let cell = v.map(fmt_num).unwrap_or_else(|| "-".to_string());
            line.push_str(&format!(" {cell:>16}"));
        }
        if table.focus.is_some() {
            let cell = row.focus_share.map(|s| format!("{s:.2}")).unwrap_or_else(|| "-".to_string());
            line.push_str(&format!(" {cell:>12}"));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

/// Monthly value of every listed group next to the month total, with each
/// group's share for additive metrics.
pub fn format_group_trend(segment: &str, trend: &GroupTrend) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\nMonthly {} ({}) by {}: {}\n",
        trend.metric.name, trend.metric.unit, trend.group_key, segment
    ));
    let mut header = format!("{:<8} {:>16}", "month", "total");
    for g in &trend.groups {
        header.push_str(&format!(" {:>16}", truncate(g, 16)));
        if trend.has_shares() {
            header.push_str(&format!(" {:>8}", "%"));
        }
    }
    out.push_str(header.trim_end());
    out.push('\n');

    let dash = || "-".to_string();
    for row in &trend.rows {
        let total = row.total.map(fmt_num).unwrap_or_else(dash);
        let mut line = format!("{:<8} {total:>16}", row.month.to_string());
        for (idx, _) in trend.groups.iter().enumerate() {
            let cell = row.values.get(idx).copied().flatten().map(fmt_num).unwrap_or_else(dash);
            line.push_str(&format!(" {cell:>16}"));
            if trend.has_shares() {
                let share = row
                    .shares
                    .get(idx)
                    .copied()
                    .flatten()
                    .map(|s| format!("{s:.2}"))
                    .unwrap_or_else(dash);
                line.push_str(&format!(" {share:>8}"));
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

/// Two decimals, with thousands separators for readability of trade volumes.
fn fmt_num(v: f64) -> String {
    let s = format!("{:.2}", v.abs());
    let (int, frac) = s.split_once('.').unwrap_or((s.as_str(), "00"));
    let mut grouped = String::new();
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if v < 0.0 && s != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{GroupTrendRow, TrendRow, compare};
    use crate::domain::{Aggregation, Dataset, MetricSpec, Record, SampleMode, YearMonth};
    use chrono::NaiveDate;

    #[test]
    fn numbers_get_thousands_separators() {
        assert_eq!(fmt_num(1234567.891), "1,234,567.89");
        assert_eq!(fmt_num(-7.5), "-7.50");
        assert_eq!(fmt_num(999.0), "999.00");
        assert_eq!(fmt_num(-0.001), "0.00");
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("Non-GM Yellow Soybean", 10), "Non-GM Ye.");
        assert_eq!(truncate("USA", 10), "USA");
    }

    #[test]
    fn no_data_rows_are_rendered_distinctly() {
        let metric = MetricSpec::new("value", "USD", Aggregation::Sum);
        let pre = Dataset::new(vec![
            Record::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()).with_metric("value", 1.0),
        ]);
        let r = compare(&pre, &Dataset::default(), &metric, SampleMode::Raw);
        let table = format_results_table(&[r], false);
        let last = table.lines().last().unwrap();
        assert!(last.starts_with("value"));
        assert!(last.contains("n=1"));
        assert!(last.ends_with("no data"));
    }

    #[test]
    fn trend_table_snapshot() {
        let table = TrendTable {
            segment: "All records".to_string(),
            metrics: vec![MetricSpec::new("value", "USD", Aggregation::Sum)],
            focus: Some("China".to_string()),
            rows: vec![
                TrendRow {
                    month: YearMonth { year: 2025, month: 3 },
                    values: vec![Some(1500.0)],
                    focus_share: Some(40.0),
                },
                TrendRow {
                    month: YearMonth { year: 2025, month: 4 },
                    values: vec![None],
                    focus_share: None,
                },
            ],
            groups: Vec::new(),
        };
        let expected = concat!(
            "\nMonthly trend: All records\n",
            "month         value (USD)      China %\n",
            "2025-03          1,500.00        40.00\n",
            "2025-04                 -            -\n",
        );
        assert_eq!(format_trend(&table), expected);
    }

    #[test]
    fn group_trend_snapshot() {
        let trend = GroupTrend {
            metric: MetricSpec::new("value", "USD", Aggregation::Sum),
            group_key: "country".to_string(),
            groups: vec!["China".to_string(), "Spain".to_string()],
            rows: vec![
                GroupTrendRow {
                    month: YearMonth { year: 2025, month: 3 },
                    total: Some(2000.0),
                    values: vec![Some(1500.0), None],
                    shares: vec![Some(75.0), Some(0.0)],
                },
                GroupTrendRow {
                    month: YearMonth { year: 2025, month: 4 },
                    total: Some(400.0),
                    values: vec![Some(100.0), Some(300.0)],
                    shares: vec![Some(25.0), Some(75.0)],
                },
            ],
        };
        let expected = concat!(
            "\nMonthly value (USD) by country: Brazil\n",
            "month               total            China        %            Spain        %\n",
            "2025-03          2,000.00         1,500.00    75.00                -     0.00\n",
            "2025-04            400.00           100.00    25.00           300.00    75.00\n",
        );
        assert_eq!(format_group_trend("Brazil", &trend), expected);

        // Mean metrics carry no share columns.
        let price = GroupTrend {
            metric: MetricSpec::new("price", "USD/kg", Aggregation::Mean),
            ..trend
        };
        assert!(!format_group_trend("Brazil", &price).contains('%'));
    }
}
