//! Charts of monthly series with the period boundary marked.
//!
//! - terminal plot (`ascii`)
//! - SVG files via `plotters` (`svg`)
//!
//! Both render a [`MonthlySeries`]: one value per month, x positions are the
//! month indices, and the boundary sits between the last pre-period month and
//! the first post-period month.

pub mod ascii;
pub mod svg;

pub use ascii::*;
pub use svg::*;

use crate::analysis::GroupTrendRow;
use crate::app::pipeline::TrendTable;
use crate::domain::{PeriodBoundary, YearMonth};

/// One plottable monthly series.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySeries {
    pub title: String,
    pub unit: String,
    pub points: Vec<(YearMonth, f64)>,
    /// Number of leading points before the boundary.
    pub pre_points: usize,
}

impl MonthlySeries {
    /// X position of the boundary marker, if both periods have points.
    pub fn boundary_x(&self) -> Option<f64> {
        if self.pre_points == 0 || self.pre_points >= self.points.len() {
            return None;
        }
        Some(self.pre_points as f64 - 0.5)
    }

    /// `(0, n - 1)`, widened to `(0, 1)` for a single point.
    pub fn x_range(&self) -> (f64, f64) {
        (0.0, (self.points.len().saturating_sub(1)).max(1) as f64)
    }

    pub fn y_range(&self) -> Option<(f64, f64)> {
        let min = self.points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max = self.points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        if !(min.is_finite() && max.is_finite()) {
            return None;
        }
        if max > min {
            Some((min, max))
        } else {
            Some((min - 1.0, max + 1.0))
        }
    }

    /// Month label at x position `x` (nearest index).
    pub fn month_label(&self, x: f64) -> String {
        let idx = x.round();
        if idx < 0.0 {
            return String::new();
        }
        self.points
            .get(idx as usize)
            .map(|(m, _)| m.to_string())
            .unwrap_or_default()
    }
}

/// One series per metric of `table`, then one per group and metric (plus each
/// group's share of additive metrics), skipping empty ones.
///
/// Without a group breakdown the focus share gets its own series.
pub fn trend_series(table: &TrendTable, boundary: &PeriodBoundary) -> Vec<MonthlySeries> {
    let mut out = Vec::new();
    let mut push = |title: String, unit: String, points: Vec<(YearMonth, f64)>| {
        if points.is_empty() {
            return;
        }
        // Records sit on the first of their month, so a month is pre-period
        // exactly when its first day is.
        let pre_points = points.iter().filter(|(m, _)| !boundary.is_post(m.first_day())).count();
        out.push(MonthlySeries {
            title,
            unit,
            points,
            pre_points,
        });
    };

    for (idx, metric) in table.metrics.iter().enumerate() {
        let points = table
            .rows
            .iter()
            .filter_map(|r| r.values.get(idx).copied().flatten().map(|v| (r.month, v)))
            .collect();
        push(metric.name.clone(), metric.unit.clone(), points);
    }

    if table.groups.is_empty() {
        if let Some(focus) = &table.focus {
            let points = table
                .rows
                .iter()
                .filter_map(|r| r.focus_share.map(|v| (r.month, v)))
                .collect();
            push(format!("{focus} share"), "%".to_string(), points);
        }
    }

    for g in &table.groups {
        for (idx, group) in g.groups.iter().enumerate() {
            push(
                format!("{} {group}", g.metric.name),
                g.metric.unit.clone(),
                group_column(&g.rows, |r| r.values.get(idx).copied().flatten()),
            );
            if g.has_shares() {
                push(
                    format!("{group} share of {}", g.metric.name),
                    "%".to_string(),
                    group_column(&g.rows, |r| r.shares.get(idx).copied().flatten()),
                );
            }
        }
    }
    out
}

fn group_column(rows: &[GroupTrendRow], pick: impl Fn(&GroupTrendRow) -> Option<f64>) -> Vec<(YearMonth, f64)> {
    rows.iter().filter_map(|r| pick(r).map(|v| (r.month, v))).collect()
}

/// File-name friendly version of `s`.
pub fn slug(s: &str) -> String {
    let mut out = String::new();
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}
