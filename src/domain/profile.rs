//! Source profiles: per-source column mapping and analysis settings.
//!
//! Every supported input family (Argentina export records, Brazil export
//! records, the merged China customs file, the generic schema written by
//! `tariff sample`) is described by one `SourceProfile`. The analyzer itself
//! never sees source column names; ingest uses the profile to build a
//! normalized `Dataset` and the pipeline uses it to pick metrics, segments and
//! grouping.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::{Aggregation, BoundaryAlign, DateWindow, MetricSpec, PeriodBoundary, SampleMode};
use crate::error::AppError;

/// Built-in source presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Argentina soybean export records (FECHA_, PESO_NETO_KILOS, ...).
    Argentina,
    /// Brazil soybean exports by destination country (Year, Month, Country, US$ FOB).
    Brazil,
    /// Merged China customs file with dummy-encoded partner/product columns.
    China,
    /// Normalized schema written by `tariff sample`.
    Generic,
}

impl Source {
    pub fn profile(self) -> SourceProfile {
        match self {
            Source::Argentina => argentina_profile(),
            Source::Brazil => brazil_profile(),
            Source::China => china_profile(),
            Source::Generic => generic_profile(),
        }
    }
}

/// Where a record's date comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateSource {
    /// A single date-like column (`YYYY-MM-DD`, `YYYYMM`, ...).
    Column { column: String },
    /// Separate year and month columns.
    YearMonth { year: String, month: String },
}

/// A numeric source column mapped to a metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricColumn {
    pub column: String,
    pub name: String,
    pub unit: String,
    pub aggregation: Aggregation,
}

impl MetricColumn {
    pub fn spec(&self) -> MetricSpec {
        MetricSpec::new(&self.name, &self.unit, self.aggregation)
    }
}

/// A metric computed from two other metrics (`numerator / denominator`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedMetric {
    pub name: String,
    pub unit: String,
    pub numerator: String,
    pub denominator: String,
    pub aggregation: Aggregation,
}

impl DerivedMetric {
    pub fn spec(&self) -> MetricSpec {
        MetricSpec::new(&self.name, &self.unit, self.aggregation)
    }
}

/// One indicator column of a dummy-encoded category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub column: String,
    pub label: String,
}

/// How a categorical attribute is decoded into a human label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryDecoder {
    /// A single column holding a code or label. Known codes are mapped via
    /// `labels`; anything else is kept verbatim.
    Code {
        column: String,
        #[serde(default)]
        labels: BTreeMap<String, String>,
    },
    /// A dummy-encoded category with one level dropped: the first set
    /// indicator wins, all-zero rows decode to `baseline`.
    OneHot {
        indicators: Vec<Indicator>,
        baseline: String,
    },
}

impl CategoryDecoder {
    /// Source columns this decoder reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            CategoryDecoder::Code { column, .. } => vec![column.as_str()],
            CategoryDecoder::OneHot { indicators, .. } => {
                indicators.iter().map(|i| i.column.as_str()).collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryColumn {
    pub name: String,
    pub decoder: CategoryDecoder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilter {
    pub category: String,
    pub value: String,
}

/// A named slice of the dataset analysed as its own pre/post comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    #[serde(default)]
    pub filters: Vec<CategoryFilter>,
}

/// Full description of one input family and how to analyse it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
    pub title: String,
    pub date: DateSource,
    pub metrics: Vec<MetricColumn>,
    #[serde(default)]
    pub derived: Vec<DerivedMetric>,
    #[serde(default)]
    pub categories: Vec<CategoryColumn>,
    /// Empty means a single segment covering every record.
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub group_by: Option<String>,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// A group compared individually (and reported as a share of the total).
    #[serde(default)]
    pub focus: Option<String>,
    /// Restricts the pre/post comparison; trends always use the full dataset.
    #[serde(default)]
    pub window: Option<DateWindow>,
    pub boundary: PeriodBoundary,
    pub sample_mode: SampleMode,
}

fn default_top_n() -> usize {
    10
}

impl SourceProfile {
    /// All analysed metrics: mapped columns first, then derived ones.
    pub fn metric_specs(&self) -> Vec<MetricSpec> {
        self.metrics
            .iter()
            .map(MetricColumn::spec)
            .chain(self.derived.iter().map(DerivedMetric::spec))
            .collect()
    }

    /// The segments to analyse (a single catch-all when none are configured).
    pub fn effective_segments(&self) -> Vec<Segment> {
        if self.segments.is_empty() {
            vec![Segment {
                name: "All records".to_string(),
                filters: Vec::new(),
            }]
        } else {
            self.segments.clone()
        }
    }

    /// Metric used for group ranking and shares: the first additive metric,
    /// else the first metric.
    pub fn magnitude_metric(&self) -> Option<MetricSpec> {
        let specs = self.metric_specs();
        specs
            .iter()
            .find(|m| m.aggregation == Aggregation::Sum)
            .or_else(|| specs.first())
            .cloned()
    }

    /// Check internal consistency before any data is read.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.metrics.is_empty() {
            return Err(AppError::input(format!("Profile '{}' defines no metrics.", self.title)));
        }

        let mut names = HashSet::new();
        for spec in self.metric_specs() {
            if !names.insert(spec.name.clone()) {
                return Err(AppError::input(format!("Duplicate metric name `{}` in profile.", spec.name)));
            }
        }

        let base: HashSet<&str> = self.metrics.iter().map(|m| m.name.as_str()).collect();
        for d in &self.derived {
            for operand in [&d.numerator, &d.denominator] {
                if !base.contains(operand.as_str()) {
                    return Err(AppError::input(format!(
                        "Derived metric `{}` refers to unknown metric `{operand}`.",
                        d.name
                    )));
                }
            }
        }

        let categories: HashSet<&str> = self.categories.iter().map(|c| c.name.as_str()).collect();
        if let Some(key) = &self.group_by {
            if !categories.contains(key.as_str()) {
                return Err(AppError::input(format!("`group_by` refers to unknown category `{key}`.")));
            }
        }
        if self.focus.is_some() && self.group_by.is_none() {
            return Err(AppError::input("A focus group requires `group_by` to be set."));
        }
        for segment in &self.segments {
            for f in &segment.filters {
                if !categories.contains(f.category.as_str()) {
                    return Err(AppError::input(format!(
                        "Segment '{}' filters on unknown category `{}`.",
                        segment.name, f.category
                    )));
                }
            }
        }
        for c in &self.categories {
            let columns = c.decoder.columns();
            if columns.is_empty() {
                return Err(AppError::input(format!("Category `{}` has no indicator columns.", c.name)));
            }
            let mut seen = HashSet::new();
            for column in columns {
                if column.trim().is_empty() {
                    return Err(AppError::input(format!("Category `{}` has an empty column name.", c.name)));
                }
                if !seen.insert(column) {
                    return Err(AppError::input(format!(
                        "Category `{}` reads column `{column}` more than once.",
                        c.name
                    )));
                }
            }
        }

        if self.top_n == 0 {
            return Err(AppError::input("`top_n` must be >= 1."));
        }
        if let Some(w) = &self.window {
            if w.start > w.end {
                return Err(AppError::input(format!(
                    "Invalid analysis window: {} is after {}.",
                    w.start, w.end
                )));
            }
        }
        Ok(())
    }
}

/// The US tariff date all built-in profiles split on.
pub fn tariff_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 9).unwrap_or(NaiveDate::MIN)
}

fn tariff_boundary() -> PeriodBoundary {
    PeriodBoundary::new(tariff_date(), BoundaryAlign::Month)
}

fn metric(column: &str, name: &str, unit: &str, aggregation: Aggregation) -> MetricColumn {
    MetricColumn {
        column: column.to_string(),
        name: name.to_string(),
        unit: unit.to_string(),
        aggregation,
    }
}

fn indicator(column: &str, label: &str) -> Indicator {
    Indicator {
        column: column.to_string(),
        label: label.to_string(),
    }
}

fn filter(category: &str, value: &str) -> CategoryFilter {
    CategoryFilter {
        category: category.to_string(),
        value: value.to_string(),
    }
}

fn argentina_profile() -> SourceProfile {
    SourceProfile {
        title: "Argentina Soybean Export".to_string(),
        date: DateSource::Column {
            column: "FECHA_".to_string(),
        },
        metrics: vec![
            metric("PESO_NETO_KILOS", "volume", "kg", Aggregation::Sum),
            metric("MONTO_FOB_DOLAR", "value", "USD", Aggregation::Sum),
            metric("PRECIO_PROMEDIO", "price", "USD/kg", Aggregation::Mean),
        ],
        derived: Vec::new(),
        categories: Vec::new(),
        segments: Vec::new(),
        group_by: None,
        top_n: default_top_n(),
        focus: None,
        window: DateWindow::year(2025),
        boundary: tariff_boundary(),
        sample_mode: SampleMode::Monthly,
    }
}

fn brazil_profile() -> SourceProfile {
    SourceProfile {
        title: "Brazil Soybean Export".to_string(),
        date: DateSource::YearMonth {
            year: "Year".to_string(),
            month: "Month".to_string(),
        },
        metrics: vec![metric("US$ FOB", "value", "USD", Aggregation::Sum)],
        derived: Vec::new(),
        categories: vec![CategoryColumn {
            name: "country".to_string(),
            decoder: CategoryDecoder::Code {
                column: "Country".to_string(),
                labels: BTreeMap::new(),
            },
        }],
        segments: Vec::new(),
        group_by: Some("country".to_string()),
        top_n: 10,
        focus: Some("China".to_string()),
        window: DateWindow::year(2025),
        boundary: tariff_boundary(),
        sample_mode: SampleMode::Monthly,
    }
}

fn china_profile() -> SourceProfile {
    SourceProfile {
        title: "China Soybean Trade with USA".to_string(),
        date: DateSource::Column {
            column: "date".to_string(),
        },
        metrics: vec![
            metric("price", "price", "CNY/kg", Aggregation::Mean),
            metric("amount", "amount", "kg", Aggregation::Sum),
            metric("CNY", "value", "CNY", Aggregation::Sum),
        ],
        derived: Vec::new(),
        categories: vec![
            CategoryColumn {
                name: "partner".to_string(),
                decoder: CategoryDecoder::OneHot {
                    indicators: vec![indicator("410", "Brazil"), indicator("502", "USA")],
                    baseline: "Argentina".to_string(),
                },
            },
            CategoryColumn {
                name: "product".to_string(),
                decoder: CategoryDecoder::OneHot {
                    indicators: vec![
                        indicator("12019019", "GM Yellow Soybean"),
                        indicator("12019020", "Black Soybean"),
                    ],
                    baseline: "Non-GM Yellow Soybean".to_string(),
                },
            },
        ],
        segments: vec![
            Segment {
                name: "China import from USA".to_string(),
                filters: vec![filter("partner", "USA"), filter("product", "GM Yellow Soybean")],
            },
            Segment {
                name: "China export to USA".to_string(),
                filters: vec![filter("partner", "USA"), filter("product", "Black Soybean")],
            },
        ],
        group_by: None,
        top_n: default_top_n(),
        focus: None,
        window: None,
        boundary: tariff_boundary(),
        sample_mode: SampleMode::Raw,
    }
}

fn generic_profile() -> SourceProfile {
    SourceProfile {
        title: "Soybean Trade".to_string(),
        date: DateSource::Column {
            column: "date".to_string(),
        },
        metrics: vec![
            metric("volume_kg", "volume", "kg", Aggregation::Sum),
            metric("value_usd", "value", "USD", Aggregation::Sum),
        ],
        derived: vec![DerivedMetric {
            name: "price".to_string(),
            unit: "USD/kg".to_string(),
            numerator: "value".to_string(),
            denominator: "volume".to_string(),
            aggregation: Aggregation::Mean,
        }],
        categories: vec![
            CategoryColumn {
                name: "partner".to_string(),
                decoder: CategoryDecoder::Code {
                    column: "partner".to_string(),
                    labels: BTreeMap::new(),
                },
            },
            CategoryColumn {
                name: "product".to_string(),
                decoder: CategoryDecoder::Code {
                    column: "product".to_string(),
                    labels: BTreeMap::new(),
                },
            },
        ],
        segments: Vec::new(),
        group_by: Some("partner".to_string()),
        top_n: 5,
        focus: Some("China".to_string()),
        window: None,
        boundary: tariff_boundary(),
        sample_mode: SampleMode::Monthly,
    }
}
