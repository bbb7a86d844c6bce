//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - normalized trade records and immutable datasets (`Record`, `Dataset`)
//! - the period boundary and analysis window (`PeriodBoundary`, `DateWindow`)
//! - metric descriptions (`MetricSpec`, `Aggregation`)
//! - per-source configuration (`SourceProfile`) and its built-in presets

pub mod profile;
pub mod types;

pub use profile::*;
pub use types::*;
