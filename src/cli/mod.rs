//! Command-line parsing for the tariff impact analyzer.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the statistics/analysis code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{BoundaryAlign, SampleMode, Source, YearMonth};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tariff", version, about = "Pre/post tariff impact analysis of trade records")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compare every metric before and after the boundary and print the assessment.
    Analyze(AnalyzeArgs),
    /// Print (and optionally plot/export) the monthly trend of every segment.
    Trend(TrendArgs),
    /// Write a synthetic dataset in the generic schema.
    Sample(SampleArgs),
    /// Write a built-in source profile to JSON as a starting point for custom sources.
    Profile(ProfileArgs),
}

/// Input file and the profile describing it.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// CSV file to analyze.
    #[arg(short = 'i', long, value_name = "CSV")]
    pub input: PathBuf,

    #[command(flatten)]
    pub select: ProfileSelect,
}

/// Exactly one of a built-in source or a profile JSON file.
#[derive(Debug, Args, Clone)]
#[group(required = true, multiple = false)]
pub struct ProfileSelect {
    /// Built-in source preset.
    #[arg(short = 's', long, value_enum)]
    pub source: Option<Source>,

    /// Source profile JSON (see `tariff profile`).
    #[arg(long, value_name = "JSON")]
    pub profile: Option<PathBuf>,
}

/// Settings that override the selected profile.
#[derive(Debug, Args, Clone, Default)]
pub struct OverrideArgs {
    /// Boundary date (YYYY-MM-DD).
    #[arg(long, env = "TARIFF_BOUNDARY")]
    pub boundary: Option<NaiveDate>,

    /// How the boundary date is applied to record dates.
    #[arg(long, value_enum)]
    pub align: Option<BoundaryAlign>,

    /// Restrict the analysis to one calendar year.
    #[arg(long, conflicts_with = "all_dates")]
    pub year: Option<i32>,

    /// Drop the profile's analysis window and use every record.
    #[arg(long)]
    pub all_dates: bool,

    /// Samples fed to the significance test.
    #[arg(long, value_enum)]
    pub sample_mode: Option<SampleMode>,

    /// Category key to rank and compare groups by.
    #[arg(long)]
    pub group_by: Option<String>,

    /// Number of top groups to compare.
    #[arg(long)]
    pub top: Option<usize>,

    /// Group reported individually (with its share of the total).
    #[arg(long)]
    pub focus: Option<String>,
}

/// Terminal plot and SVG chart options.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Render ASCII plots of the monthly series in the terminal.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 16)]
    pub height: usize,

    /// Write SVG charts of every trend series (plus group overlays) into this directory.
    #[arg(long, value_name = "DIR")]
    pub chart_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    /// Export one row per result to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the full run to JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Export the monthly trend tables to CSV.
    #[arg(long = "export-trend", value_name = "CSV")]
    pub export_trend: Option<PathBuf>,

    /// Export the per-group monthly trend (long form) to CSV.
    #[arg(long = "export-groups", value_name = "CSV")]
    pub export_groups: Option<PathBuf>,

    #[command(flatten)]
    pub plot: PlotArgs,
}

#[derive(Debug, Args, Clone)]
pub struct TrendArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    /// Export the monthly trend tables to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the per-group monthly trend (long form) to CSV.
    #[arg(long = "export-groups", value_name = "CSV")]
    pub export_groups: Option<PathBuf>,

    #[command(flatten)]
    pub plot: PlotArgs,
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Output CSV file.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub output: PathBuf,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// First month (YYYY-MM).
    #[arg(long, default_value = "2024-10", value_parser = parse_year_month)]
    pub start: YearMonth,

    /// Number of months to generate.
    #[arg(long, default_value_t = 12)]
    pub months: usize,

    /// Number of trade partners.
    #[arg(long, default_value_t = 5)]
    pub partners: usize,

    /// Boundary date (YYYY-MM-DD); defaults to the tariff date.
    #[arg(long, env = "TARIFF_BOUNDARY")]
    pub boundary: Option<NaiveDate>,
}

#[derive(Debug, Args, Clone)]
pub struct ProfileArgs {
    /// Built-in source preset to write.
    #[arg(short = 's', long, value_enum)]
    pub source: Source,

    /// Output JSON file.
    #[arg(short = 'o', long, value_name = "JSON")]
    pub output: PathBuf,
}

/// Parse `YYYY-MM` (or a full date) into a month.
pub fn parse_year_month(s: &str) -> Result<YearMonth, String> {
    let s = s.trim();
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map(YearMonth::from_date)
        .map_err(|_| format!("expected YYYY-MM, got '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn year_month_values() {
        assert_eq!(parse_year_month("2025-04").unwrap(), YearMonth { year: 2025, month: 4 });
        assert_eq!(parse_year_month("2025-04-09").unwrap(), YearMonth { year: 2025, month: 4 });
        assert!(parse_year_month("April").is_err());
    }

    #[test]
    fn source_and_profile_are_exclusive() {
        let err = Cli::try_parse_from([
            "tariff", "analyze", "-i", "x.csv", "--source", "brazil", "--profile", "p.json",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);

        assert!(Cli::try_parse_from(["tariff", "analyze", "-i", "x.csv"]).is_err());
    }

    #[test]
    fn analyze_flags_parse() {
        let cli = Cli::try_parse_from([
            "tariff",
            "analyze",
            "-i",
            "x.csv",
            "--source",
            "generic",
            "--boundary",
            "2025-04-09",
            "--sample-mode",
            "raw",
            "--top",
            "3",
            "--plot",
        ])
        .unwrap();
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.input.select.source, Some(Source::Generic));
        assert_eq!(args.overrides.boundary, NaiveDate::from_ymd_opt(2025, 4, 9));
        assert_eq!(args.overrides.sample_mode, Some(SampleMode::Raw));
        assert_eq!(args.overrides.top, Some(3));
        assert!(args.plot.plot);
        assert!(args.export.is_none());
        assert!(args.export_groups.is_none());
    }

    #[test]
    fn trend_takes_a_group_key_and_group_export() {
        let cli = Cli::try_parse_from([
            "tariff",
            "trend",
            "-i",
            "x.csv",
            "--source",
            "brazil",
            "--group-by",
            "country",
            "--export-groups",
            "groups.csv",
        ])
        .unwrap();
        let Command::Trend(args) = cli.command else {
            panic!("expected trend");
        };
        assert_eq!(args.overrides.group_by.as_deref(), Some("country"));
        assert_eq!(args.export_groups, Some(PathBuf::from("groups.csv")));
    }
}
