//! Data sources that do not come from an input file.
//!
//! - synthetic trade records in the generic schema (`sample`)

pub mod sample;

pub use sample::*;
