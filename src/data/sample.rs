//! Synthetic monthly trade records in the generic schema.
//!
//! The generator produces one record per month, partner and product with
//! multiplicative noise around a per-partner baseline. From the boundary month
//! on, the first partner's volume drops sharply and the others pick up part of
//! the slack, so a run of `tariff analyze --source generic` on the output shows
//! a clear, significant break.

use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use log::info;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::Serialize;

use crate::domain::{PeriodBoundary, YearMonth};
use crate::error::AppError;

/// Partners in order of baseline volume; the first one is hit by the tariff.
pub const PARTNERS: [&str; 8] = [
    "China",
    "European Union",
    "Mexico",
    "Japan",
    "Egypt",
    "Indonesia",
    "Taiwan",
    "Vietnam",
];

const PRODUCTS: [(&str, f64); 2] = [("GM Yellow Soybean", 1.0), ("Non-GM Yellow Soybean", 0.25)];

/// Baseline monthly volume of the largest partner, in kg.
const BASE_VOLUME_KG: f64 = 2.5e9;
/// USD per kg.
const BASE_PRICE: f64 = 0.42;
const VOLUME_NOISE: f64 = 0.08;
const PRICE_NOISE: f64 = 0.03;
/// Post-boundary volume multiplier for the first partner.
const TARIFF_HIT: f64 = 0.15;
/// Post-boundary volume multiplier for everyone else.
const DIVERSION: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleConfig {
    pub seed: u64,
    pub start: YearMonth,
    pub months: usize,
    pub partners: usize,
    pub boundary: PeriodBoundary,
}

/// One row of the generic schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRow {
    pub date: NaiveDate,
    pub partner: String,
    pub product: String,
    pub volume_kg: f64,
    pub value_usd: f64,
}

pub fn generate_sample(config: &SampleConfig) -> Result<Vec<SampleRow>, AppError> {
    if config.months == 0 {
        return Err(AppError::input("Sample month count must be > 0."));
    }
    if config.partners == 0 || config.partners > PARTNERS.len() {
        return Err(AppError::input(format!(
            "Sample partner count must be between 1 and {}.",
            PARTNERS.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0).map_err(|e| AppError::output(format!("Noise distribution error: {e}")))?;

    let mut rows = Vec::with_capacity(config.months * config.partners * PRODUCTS.len());
    let mut month = config.start;
    for _ in 0..config.months {
        let date = month.first_day();
        let post = config.boundary.is_post(date);

        for (rank, partner) in PARTNERS.iter().take(config.partners).enumerate() {
            // Each partner is roughly 60% the size of the one before it.
            let partner_scale = 0.6_f64.powi(rank as i32);
            let shock = match (post, rank) {
                (false, _) => 1.0,
                (true, 0) => TARIFF_HIT,
                (true, _) => DIVERSION,
            };

            for &(product, product_scale) in &PRODUCTS {
                let noise = (1.0 + VOLUME_NOISE * normal.sample(&mut rng)).max(0.05);
                let volume = BASE_VOLUME_KG * partner_scale * product_scale * shock * noise;
                let price = BASE_PRICE * (1.0 + PRICE_NOISE * normal.sample(&mut rng)).max(0.5);

                rows.push(SampleRow {
                    date,
                    partner: partner.to_string(),
                    product: product.to_string(),
                    volume_kg: round2(volume),
                    value_usd: round2(volume * price),
                });
            }
        }
        month = month.succ();
    }

    Ok(rows)
}

/// Write `rows` as CSV with a header line.
pub fn write_sample<W: Write>(out: W, rows: &[SampleRow]) -> Result<(), AppError> {
    let mut wtr = csv::Writer::from_writer(out);
    for row in rows {
        wtr.serialize(row)
            .map_err(|e| AppError::output(format!("Failed to write sample row: {e}")))?;
    }
    wtr.flush()
        .map_err(|e| AppError::output(format!("Failed to flush sample CSV: {e}")))?;
    Ok(())
}

/// Generate a sample and write it to `path`.
pub fn write_sample_csv(path: &Path, config: &SampleConfig) -> Result<usize, AppError> {
    let rows = generate_sample(config)?;
    let file = std::fs::File::create(path)
        .map_err(|e| AppError::output(format!("Failed to create sample CSV '{}': {e}", path.display())))?;
    write_sample(file, &rows)?;
    info!("wrote {} sample rows to {}", rows.len(), path.display());
    Ok(rows.len())
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
