//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves the source profile and applies overrides
//! - runs the analysis or trend pipeline
//! - prints reports/plots
//! - writes optional exports and charts

use clap::Parser;

use crate::app::pipeline::TrendTable;
use crate::cli::{AnalyzeArgs, Command, InputArgs, OverrideArgs, PlotArgs, ProfileArgs, SampleArgs, TrendArgs};
use crate::data::{SampleConfig, write_sample_csv};
use crate::domain::{DateWindow, PeriodBoundary, SourceProfile, tariff_date};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `tariff` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Analyze(args) => handle_analyze(args),
        Command::Trend(args) => handle_trend(args),
        Command::Sample(args) => handle_sample(args),
        Command::Profile(args) => handle_profile(args),
    }
}

fn handle_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let profile = resolve_profile(&args.input, &args.overrides)?;
    let run = pipeline::run_analysis(&args.input.input, &profile)?;

    print!("{}", crate::report::format_run_header(&run));
    for segment in &run.segments {
        print!("{}", crate::report::format_segment(segment, run.group_by.as_deref()));
    }

    let tables: Vec<&TrendTable> = run.segments.iter().map(|s| &s.trend).collect();
    render_plots(&tables, &run.boundary, &args.plot)?;

    // Optional exports.
    if let Some(path) = &args.export {
        crate::io::export::write_results_csv(path, &run)?;
    }
    if let Some(path) = &args.export_json {
        crate::io::export::write_run_json(path, &run)?;
    }
    if let Some(path) = &args.export_trend {
        crate::io::export::write_trend_csv(path, &tables)?;
    }
    if let Some(path) = &args.export_groups {
        crate::io::export::write_group_trend_csv(path, &tables)?;
    }

    Ok(())
}

fn handle_trend(args: TrendArgs) -> Result<(), AppError> {
    let profile = resolve_profile(&args.input, &args.overrides)?;
    let trends = pipeline::run_trend(&args.input.input, &profile)?;
    let tables: Vec<&TrendTable> = trends.iter().collect();

    println!("=== tariff - {} ===", profile.title);
    println!("Boundary: {}", profile.boundary);
    for table in &tables {
        print!("{}", crate::report::format_trend(table));
        for group_trend in &table.groups {
            print!("{}", crate::report::format_group_trend(&table.segment, group_trend));
        }
    }

    render_plots(&tables, &profile.boundary, &args.plot)?;

    if let Some(path) = &args.export {
        crate::io::export::write_trend_csv(path, &tables)?;
    }
    if let Some(path) = &args.export_groups {
        crate::io::export::write_group_trend_csv(path, &tables)?;
    }

    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let config = SampleConfig {
        seed: args.seed,
        start: args.start,
        months: args.months,
        partners: args.partners,
        boundary: PeriodBoundary::new(
            args.boundary.unwrap_or_else(tariff_date),
            crate::domain::BoundaryAlign::Month,
        ),
    };
    let rows = write_sample_csv(&args.output, &config)?;
    println!("Wrote {rows} rows to {}", args.output.display());
    Ok(())
}

fn handle_profile(args: ProfileArgs) -> Result<(), AppError> {
    crate::io::profile::write_profile_json(&args.output, &args.source.profile())?;
    println!("Wrote {:?} profile to {}", args.source, args.output.display());
    Ok(())
}

fn render_plots(tables: &[&TrendTable], boundary: &PeriodBoundary, args: &PlotArgs) -> Result<(), AppError> {
    if args.plot {
        for table in tables {
            for series in crate::plot::trend_series(table, boundary) {
                println!("\n[{}]", table.segment);
                print!("{}", crate::plot::render_ascii_plot(&series, args.width, args.height));
            }
        }
    }
    if let Some(dir) = &args.chart_dir {
        let written = crate::plot::write_svg_charts(dir, tables, boundary)?;
        println!("Wrote {} chart(s) to {}", written.len(), dir.display());
    }
    Ok(())
}

/// Built-in preset or profile JSON, with CLI overrides applied and validated.
pub fn resolve_profile(input: &InputArgs, overrides: &OverrideArgs) -> Result<SourceProfile, AppError> {
    let mut profile = match (&input.select.source, &input.select.profile) {
        (Some(source), _) => source.profile(),
        (None, Some(path)) => crate::io::profile::read_profile_json(path)?,
        (None, None) => return Err(AppError::input("One of --source or --profile is required.")),
    };
    apply_overrides(&mut profile, overrides)?;
    profile.validate()?;
    Ok(profile)
}

pub fn apply_overrides(profile: &mut SourceProfile, overrides: &OverrideArgs) -> Result<(), AppError> {
    if let Some(date) = overrides.boundary {
        profile.boundary.date = date;
    }
    if let Some(align) = overrides.align {
        profile.boundary.align = align;
    }
    if overrides.all_dates {
        profile.window = None;
    }
    if let Some(year) = overrides.year {
        profile.window = Some(DateWindow::year(year).ok_or_else(|| AppError::input(format!("Invalid year: {year}")))?);
    }
    if let Some(mode) = overrides.sample_mode {
        profile.sample_mode = mode;
    }
    if let Some(key) = &overrides.group_by {
        profile.group_by = Some(key.clone());
    }
    if let Some(top) = overrides.top {
        profile.top_n = top;
    }
    if let Some(focus) = &overrides.focus {
        profile.focus = Some(focus.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundaryAlign, SampleMode, Source};
    use chrono::NaiveDate;

    #[test]
    fn overrides_replace_profile_settings() {
        let mut profile = Source::Argentina.profile();
        let overrides = OverrideArgs {
            boundary: NaiveDate::from_ymd_opt(2025, 3, 15),
            align: Some(BoundaryAlign::Exact),
            year: Some(2024),
            sample_mode: Some(SampleMode::Raw),
            top: Some(2),
            ..OverrideArgs::default()
        };
        apply_overrides(&mut profile, &overrides).unwrap();

        assert_eq!(profile.boundary.cutoff(), NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(profile.window, DateWindow::year(2024));
        assert_eq!(profile.sample_mode, SampleMode::Raw);
        assert_eq!(profile.top_n, 2);
    }

    #[test]
    fn no_overrides_keep_the_preset() {
        let mut profile = Source::Brazil.profile();
        apply_overrides(&mut profile, &OverrideArgs::default()).unwrap();
        assert_eq!(profile, Source::Brazil.profile());
    }

    #[test]
    fn all_dates_drops_the_window() {
        let mut profile = Source::Argentina.profile();
        let overrides = OverrideArgs {
            all_dates: true,
            ..OverrideArgs::default()
        };
        apply_overrides(&mut profile, &overrides).unwrap();
        assert!(profile.window.is_none());
    }
}
