//! Input/output helpers.
//!
//! - CSV ingest + normalization (`ingest`)
//! - result exports (CSV/JSON) (`export`)
//! - profile JSON read/write (`profile`)

pub mod export;
pub mod ingest;
pub mod profile;

pub use export::*;
pub use ingest::*;
pub use profile::*;
