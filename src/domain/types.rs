//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - built once by ingest and then filtered into sub-datasets
//! - serialized into profiles and exported result documents
//! - reused unchanged by every source profile

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How a metric is rolled up into one value per calendar month.
///
/// Volume and value metrics are additive (`Sum`); prices and ratios are not
/// (`Mean`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
}

/// Which samples feed the significance test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SampleMode {
    /// Test the raw record values of each side.
    Raw,
    /// Aggregate each side into one value per calendar month first.
    Monthly,
}

/// How the boundary date is applied to record dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryAlign {
    /// Compare record dates against the boundary date as given.
    Exact,
    /// Cut at the first day of the boundary's month.
    ///
    /// Monthly sources store every record on the 1st, so an exact cut at
    /// e.g. 2025-04-09 would put the whole tariff month in the pre-period.
    Month,
}

/// The fixed cutoff separating the pre- and post-period of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodBoundary {
    pub date: NaiveDate,
    pub align: BoundaryAlign,
}

impl PeriodBoundary {
    pub fn new(date: NaiveDate, align: BoundaryAlign) -> Self {
        Self { date, align }
    }

    /// The date actually used for `pre = date < cutoff`, `post = date >= cutoff`.
    pub fn cutoff(&self) -> NaiveDate {
        match self.align {
            BoundaryAlign::Exact => self.date,
            BoundaryAlign::Month => YearMonth::from_date(self.date).first_day(),
        }
    }

    pub fn is_post(&self, date: NaiveDate) -> bool {
        date >= self.cutoff()
    }
}

impl fmt::Display for PeriodBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.align {
            BoundaryAlign::Exact => write!(f, "{}", self.date),
            BoundaryAlign::Month => write!(f, "{} (month of {})", self.cutoff(), self.date),
        }
    }
}

/// Inclusive date range used to restrict the analysis (e.g. a single year).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// The calendar year `year`, January 1st through December 31st.
    pub fn year(year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }
}

/// A calendar month (the monthly aggregation key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(self) -> NaiveDate {
        // `month` always comes from a valid date or `succ`, so day 1 exists.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn succ(self) -> Self {
        if self.month >= 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A metric to analyse: its name in the dataset, display unit and monthly roll-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub unit: String,
    pub aggregation: Aggregation,
}

impl MetricSpec {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, aggregation: Aggregation) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            aggregation,
        }
    }
}

/// One normalized trade row (a transaction or a monthly aggregate).
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Normalized to the first day of its month by ingest.
    pub date: NaiveDate,
    pub metrics: BTreeMap<String, f64>,
    /// Decoded categorical labels (e.g. `partner -> "USA"`).
    pub categories: BTreeMap<String, String>,
}

impl Record {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            metrics: BTreeMap::new(),
            categories: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_category(mut self, key: impl Into<String>, label: impl Into<String>) -> Self {
        self.categories.insert(key.into(), label.into());
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn category(&self, key: &str) -> Option<&str> {
        self.categories.get(key).map(String::as_str)
    }

    pub fn month(&self) -> YearMonth {
        YearMonth::from_date(self.date)
    }
}

/// An immutable collection of records sharing one schema.
///
/// Every filtering step returns a new `Dataset`; nothing is mutated in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn filter(&self, mut keep: impl FnMut(&Record) -> bool) -> Dataset {
        Dataset::new(self.records.iter().filter(|r| keep(*r)).cloned().collect())
    }

    pub fn within(&self, window: &DateWindow) -> Dataset {
        self.filter(|r| window.contains(r.date))
    }

    /// Records whose `key` category equals `label` (case-insensitive).
    pub fn with_category(&self, key: &str, label: &str) -> Dataset {
        let label = label.trim();
        self.filter(|r| {
            r.category(key)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(label))
        })
    }

    /// All present values of `metric`, in record order.
    pub fn values(&self, metric: &str) -> Vec<f64> {
        self.records.iter().filter_map(|r| r.metric(metric)).collect()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.records.iter().map(|r| r.date).min()?;
        let max = self.records.iter().map(|r| r.date).max()?;
        Some((min, max))
    }
}
