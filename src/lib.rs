//! `tariff-impact` library crate.
//!
//! The binary (`tariff`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the analyzer can be driven by any source profile, not just the built-in ones
//! - code stays easy to navigate as the project grows

pub mod analysis;
pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod plot;
pub mod report;
pub mod stats;
