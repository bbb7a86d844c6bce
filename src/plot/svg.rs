//! SVG line charts rendered with Plotters.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use plotters::prelude::*;

use crate::analysis::GroupTrend;
use crate::app::pipeline::TrendTable;
use crate::domain::PeriodBoundary;
use crate::error::AppError;
use crate::plot::{MonthlySeries, slug, trend_series};

const CHART_SIZE: (u32, u32) = (960, 540);

/// Line colors of the group overlay, cycled past the end.
const GROUP_COLORS: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

/// Write one SVG per series of every trend table into `dir`, plus one chart
/// per group breakdown with a line for every group and the month total.
///
/// Files are named `<segment>_<series>.svg` and
/// `<segment>_<metric>_by_<key>.svg`; returns the written paths.
pub fn write_svg_charts(dir: &Path, tables: &[&TrendTable], boundary: &PeriodBoundary) -> Result<Vec<PathBuf>, AppError> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::output(format!("Failed to create chart directory '{}': {e}", dir.display())))?;

    let mut written = Vec::new();
    for table in tables {
        for series in trend_series(table, boundary) {
            let path = dir.join(format!("{}_{}.svg", slug(&table.segment), slug(&series.title)));
            let caption = format!("{}: monthly {}", table.segment, series.title);
            render_svg(&path, &series, &caption)
                .map_err(|e| AppError::output(format!("Failed to render chart '{}': {e}", path.display())))?;
            info!("wrote {}", path.display());
            written.push(path);
        }
        for g in &table.groups {
            if g.rows.is_empty() {
                continue;
            }
            let path = dir.join(format!(
                "{}_{}_by_{}.svg",
                slug(&table.segment),
                slug(&g.metric.name),
                slug(&g.group_key)
            ));
            let caption = format!("{}: monthly {} by {}", table.segment, g.metric.name, g.group_key);
            render_group_svg(&path, g, boundary, &caption)
                .map_err(|e| AppError::output(format!("Failed to render chart '{}': {e}", path.display())))?;
            info!("wrote {}", path.display());
            written.push(path);
        }
    }
    Ok(written)
}

fn render_svg(path: &Path, series: &MonthlySeries, caption: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (x0, x1) = series.x_range();
    let (y0, y1) = series.y_range().ok_or("series has no finite values")?;
    let pad = (y1 - y0) * 0.05;
    let (y0, y1) = (y0 - pad, y1 + pad);

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(x0 - 0.5..x1 + 0.5, y0..y1)?;

    chart
        .configure_mesh()
        .x_labels(series.points.len().min(12))
        .x_label_formatter(&|x| series.month_label(*x))
        .x_desc("month")
        .y_desc(series.unit.as_str())
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            series.points.iter().enumerate().map(|(i, &(_, y))| (i as f64, y)),
            &BLUE,
        ))?
        .label(series.title.as_str())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

    if let Some(bx) = series.boundary_x() {
        chart
            .draw_series(LineSeries::new(vec![(bx, y0), (bx, y1)], RED.stroke_width(2)))?
            .label("boundary")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn render_group_svg(
    path: &Path,
    trend: &GroupTrend,
    boundary: &PeriodBoundary,
    caption: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    // The month total doubles as the x axis: every row has a position.
    let axis = MonthlySeries {
        title: "total".to_string(),
        unit: trend.metric.unit.clone(),
        points: trend.rows.iter().map(|r| (r.month, r.total.unwrap_or(f64::NAN))).collect(),
        pre_points: trend
            .rows
            .iter()
            .filter(|r| !boundary.is_post(r.month.first_day()))
            .count(),
    };

    let mut lines: Vec<(String, Vec<(f64, f64)>)> = vec![(
        "total".to_string(),
        trend
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.total.map(|v| (i as f64, v)))
            .collect(),
    )];
    for (idx, group) in trend.groups.iter().enumerate() {
        let points = trend
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.values.get(idx).copied().flatten().map(|v| (i as f64, v)))
            .collect();
        lines.push((group.clone(), points));
    }

    let values = lines.iter().flat_map(|(_, pts)| pts.iter().map(|p| p.1));
    let y0 = values.clone().fold(f64::INFINITY, f64::min);
    let y1 = values.fold(f64::NEG_INFINITY, f64::max);
    if !(y0.is_finite() && y1.is_finite()) {
        return Err("group trend has no finite values".into());
    }
    let (y0, y1) = if y1 > y0 { (y0, y1) } else { (y0 - 1.0, y1 + 1.0) };
    let pad = (y1 - y0) * 0.05;
    let (y0, y1) = (y0 - pad, y1 + pad);
    let (x0, x1) = axis.x_range();

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(x0 - 0.5..x1 + 0.5, y0..y1)?;

    chart
        .configure_mesh()
        .x_labels(axis.points.len().min(12))
        .x_label_formatter(&|x| axis.month_label(*x))
        .x_desc("month")
        .y_desc(axis.unit.as_str())
        .draw()?;

    for (i, (label, points)) in lines.into_iter().enumerate() {
        let color = if i == 0 { BLACK } else { GROUP_COLORS[(i - 1) % GROUP_COLORS.len()] };
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    if let Some(bx) = axis.boundary_x() {
        chart
            .draw_series(LineSeries::new(vec![(bx, y0), (bx, y1)], RED.stroke_width(2)))?
            .label("boundary")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{GroupTrendRow, TrendRow};
    use crate::domain::{Aggregation, BoundaryAlign, MetricSpec, YearMonth};
    use chrono::NaiveDate;

    #[test]
    fn writes_one_svg_per_series() {
        let table = TrendTable {
            segment: "China import from USA".to_string(),
            metrics: vec![MetricSpec::new("amount", "kg", Aggregation::Sum)],
            focus: None,
            rows: (1..=8)
                .map(|m| TrendRow {
                    month: YearMonth { year: 2025, month: m },
                    values: vec![Some(100.0 - f64::from(m) * 5.0)],
                    focus_share: None,
                })
                .collect(),
            groups: Vec::new(),
        };
        let boundary = PeriodBoundary::new(NaiveDate::from_ymd_opt(2025, 4, 9).unwrap(), BoundaryAlign::Month);

        let dir = tempfile::tempdir().unwrap();
        let written = write_svg_charts(dir.path(), &[&table], &boundary).unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("china_import_from_usa_amount.svg"));

        let svg = std::fs::read_to_string(&written[0]).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("boundary"));
    }

    #[test]
    fn group_breakdown_gets_an_overlay_chart() {
        let months = || (1..=6).map(|m| YearMonth { year: 2025, month: m });
        let table = TrendTable {
            segment: "Brazil".to_string(),
            metrics: vec![MetricSpec::new("value", "USD", Aggregation::Sum)],
            focus: Some("China".to_string()),
            rows: months()
                .map(|month| TrendRow {
                    month,
                    values: vec![Some(100.0)],
                    focus_share: Some(70.0),
                })
                .collect(),
            groups: vec![GroupTrend {
                metric: MetricSpec::new("value", "USD", Aggregation::Sum),
                group_key: "country".to_string(),
                groups: vec!["China".to_string(), "Spain".to_string()],
                rows: months()
                    .map(|month| GroupTrendRow {
                        month,
                        total: Some(100.0),
                        values: vec![Some(70.0), Some(30.0)],
                        shares: vec![Some(70.0), Some(30.0)],
                    })
                    .collect(),
            }],
        };
        let boundary = PeriodBoundary::new(NaiveDate::from_ymd_opt(2025, 4, 9).unwrap(), BoundaryAlign::Month);

        let dir = tempfile::tempdir().unwrap();
        let written = write_svg_charts(dir.path(), &[&table], &boundary).unwrap();
        // value, 2 groups x (value + share), and the overlay.
        assert_eq!(written.len(), 6);
        let overlay = written.last().unwrap();
        assert!(overlay.ends_with("brazil_value_by_country.svg"));

        let svg = std::fs::read_to_string(overlay).unwrap();
        assert!(svg.contains("Spain"));
        assert!(svg.contains("total"));
    }
}
