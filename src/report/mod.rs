//! Reporting: console formatting and one-line impact assessments.

pub mod format;

pub use format::*;

use crate::analysis::{Comparison, ImpactResult, Significance};

/// Direction of the mean change across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increased,
    Decreased,
    Unchanged,
}

impl Direction {
    pub fn of(change: f64) -> Self {
        if change > 0.0 {
            Direction::Increased
        } else if change < 0.0 {
            Direction::Decreased
        } else {
            Direction::Unchanged
        }
    }
}

/// One-line verdict, e.g. `value: decreased by 37.50% after boundary, impact significant`.
pub fn assessment(result: &ImpactResult) -> String {
    let label = match &result.group {
        Some(group) => format!("{} ({group})", result.metric.name),
        None => result.metric.name.clone(),
    };

    let Comparison::Computed(stats) = &result.comparison else {
        return format!("{label}: no data on one side of the boundary");
    };

    let movement = match Direction::of(stats.change) {
        Direction::Increased => format!("increased by {:.2}%", stats.change_percent.abs()),
        Direction::Decreased => format!("decreased by {:.2}%", stats.change_percent.abs()),
        Direction::Unchanged => "unchanged".to_string(),
    };
    let impact = match stats.test.significance {
        Significance::Significant => "impact significant",
        Significance::NotSignificant => "impact not significant",
        Significance::Unavailable => "significance unavailable",
    };
    format!("{label}: {movement} after boundary, {impact}")
}
