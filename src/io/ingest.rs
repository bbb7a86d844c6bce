//! CSV ingest and normalization.
//!
//! Turns a source-specific trade CSV into a normalized `Dataset`, guided by a
//! `SourceProfile`:
//! - **Strict schema**: every column the profile names must exist (exit code 2)
//! - **Row-level validation**: bad rows are skipped and reported
//! - **Decode once**: code and one-hot columns become category labels here
//! - **No analysis logic**: windows and boundaries are applied downstream

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use log::{info, warn};

use crate::domain::{CategoryDecoder, Dataset, DateSource, Record, SourceProfile, YearMonth};
use crate::error::AppError;

/// Row errors echoed individually to the log; the rest are only counted.
const LOGGED_ROW_ERRORS: usize = 5;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the normalized dataset plus row accounting.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: Dataset,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load `path` according to `profile`.
pub fn load_dataset(path: &Path, profile: &SourceProfile) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    let data = read_dataset(file, profile)?;
    info!(
        "{}: read {} rows, used {}",
        path.display(),
        data.rows_read,
        data.rows_used
    );
    Ok(data)
}

/// Parse CSV text from any reader according to `profile`.
pub fn read_dataset<R: Read>(input: R, profile: &SourceProfile) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    let plan = ColumnPlan::resolve(profile, &header_map)?;

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|row| plan.parse_row(&row));
        match parsed {
            Ok(record) => records.push(record),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        warn!("skipped {} malformed rows", row_errors.len());
        for e in row_errors.iter().take(LOGGED_ROW_ERRORS) {
            warn!("  line {}: {}", e.line, e.message);
        }
    }

    let rows_used = records.len();
    if rows_used == 0 {
        return Err(AppError::no_data("No valid rows remain after normalization."));
    }

    Ok(IngestedData {
        dataset: Dataset::new(records),
        row_errors,
        rows_read,
        rows_used,
    })
}

/// Column indices resolved against the CSV header.
#[derive(Debug)]
struct ColumnPlan {
    date: DatePlan,
    metrics: Vec<(usize, String)>,
    derived: Vec<DerivedPlan>,
    categories: Vec<(String, DecoderPlan)>,
}

#[derive(Debug)]
enum DatePlan {
    Column(usize),
    YearMonth { year: usize, month: usize },
}

#[derive(Debug)]
struct DerivedPlan {
    name: String,
    numerator: String,
    denominator: String,
}

#[derive(Debug)]
enum DecoderPlan {
    Code {
        idx: usize,
        labels: BTreeMap<String, String>,
    },
    OneHot {
        indicators: Vec<(usize, String)>,
        baseline: String,
    },
}

impl ColumnPlan {
    fn resolve(profile: &SourceProfile, header_map: &HashMap<String, usize>) -> Result<Self, AppError> {
        let mut missing = Vec::new();
        let mut col = |name: &str| -> usize {
            match header_map.get(&normalize_header_name(name)) {
                Some(&idx) => idx,
                None => {
                    missing.push(name.to_string());
                    usize::MAX
                }
            }
        };

        let date = match &profile.date {
            DateSource::Column { column } => DatePlan::Column(col(column)),
            DateSource::YearMonth { year, month } => DatePlan::YearMonth {
                year: col(year),
                month: col(month),
            },
        };
        let metrics = profile
            .metrics
            .iter()
            .map(|m| (col(&m.column), m.name.clone()))
            .collect();
        let categories = profile
            .categories
            .iter()
            .map(|c| {
                let plan = match &c.decoder {
                    CategoryDecoder::Code { column, labels } => DecoderPlan::Code {
                        idx: col(column),
                        labels: labels.clone(),
                    },
                    CategoryDecoder::OneHot { indicators, baseline } => DecoderPlan::OneHot {
                        indicators: indicators
                            .iter()
                            .map(|i| (col(&i.column), i.label.clone()))
                            .collect(),
                        baseline: baseline.clone(),
                    },
                };
                (c.name.clone(), plan)
            })
            .collect();

        if !missing.is_empty() {
            return Err(AppError::input(format!(
                "Missing required column(s) for profile '{}': {}",
                profile.title,
                missing.iter().map(|m| format!("`{m}`")).collect::<Vec<_>>().join(", ")
            )));
        }

        let derived = profile
            .derived
            .iter()
            .map(|d| DerivedPlan {
                name: d.name.clone(),
                numerator: d.numerator.clone(),
                denominator: d.denominator.clone(),
            })
            .collect();

        Ok(Self {
            date,
            metrics,
            derived,
            categories,
        })
    }

    fn parse_row(&self, row: &StringRecord) -> Result<Record, String> {
        let date = match self.date {
            DatePlan::Column(idx) => parse_month(get_required(row, idx, "date")?)?,
            DatePlan::YearMonth { year, month } => {
                let year = parse_integer(get_required(row, year, "year")?)?;
                let month = parse_integer(get_required(row, month, "month")?)?;
                i32::try_from(year)
                    .ok()
                    .zip(u32::try_from(month).ok())
                    .and_then(|(y, m)| NaiveDate::from_ymd_opt(y, m, 1))
                    .ok_or_else(|| format!("Invalid year/month {year}/{month}."))?
            }
        };

        let mut record = Record::new(date);
        for (idx, name) in &self.metrics {
            if let Some(raw) = get_optional(row, *idx) {
                let value = parse_number(raw).map_err(|e| format!("`{name}`: {e}"))?;
                record.metrics.insert(name.clone(), value);
            }
        }
        if record.metrics.is_empty() {
            return Err("Row has no metric values.".to_string());
        }

        for d in &self.derived {
            let ratio = record
                .metric(&d.numerator)
                .zip(record.metric(&d.denominator))
                .filter(|(_, den)| *den != 0.0)
                .map(|(num, den)| round2(num / den));
            if let Some(v) = ratio {
                record.metrics.insert(d.name.clone(), v);
            }
        }

        for (name, decoder) in &self.categories {
            if let Some(label) = decoder.decode(row)? {
                record.categories.insert(name.clone(), label);
            }
        }

        Ok(record)
    }
}

impl DecoderPlan {
    fn decode(&self, row: &StringRecord) -> Result<Option<String>, String> {
        match self {
            DecoderPlan::Code { idx, labels } => Ok(get_optional(row, *idx)
                .map(|code| labels.get(code).cloned().unwrap_or_else(|| code.to_string()))),
            DecoderPlan::OneHot { indicators, baseline } => {
                for (idx, label) in indicators {
                    if is_set(get_optional(row, *idx))? {
                        return Ok(Some(label.clone()));
                    }
                }
                Ok(Some(baseline.clone()))
            }
        }
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_lowercase()
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, what: &str) -> Result<&'a str, String> {
    get_optional(record, idx).ok_or_else(|| format!("Missing required value: {what}"))
}

fn get_optional(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a date-like field and normalize it to the first of its month.
///
/// Slash and dash dates with the year last are read month first
/// (`04/09/2025` is April 9); day first is the fallback when the leading
/// number cannot be a month (`25/04/2025`).
fn parse_month(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 6] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%d/%m/%Y", "%d-%m-%Y"];
    // Date-time values ("2025-04-09 00:00:00") are matched on their date prefix.
    let prefix = s.get(..10).unwrap_or(s);
    for candidate in [s, prefix] {
        for fmt in FMTS {
            if let Ok(d) = NaiveDate::parse_from_str(candidate, fmt) {
                return Ok(YearMonth::from_date(d).first_day());
            }
        }
    }
    parse_year_month(s).ok_or_else(|| {
        format!("Invalid date '{s}'. Expected one of: YYYY-MM-DD, YYYY/MM/DD, MM/DD/YYYY, DD/MM/YYYY, YYYYMM, YYYY-MM.")
    })
}

/// `YYYYMM`, `YYYY-MM` or `YYYY/MM`.
fn parse_year_month(s: &str) -> Option<NaiveDate> {
    if !s.is_ascii() {
        return None;
    }
    let (year, month) = match s.len() {
        6 if s.bytes().all(|b| b.is_ascii_digit()) => (&s[..4], &s[4..]),
        7 if matches!(s.as_bytes()[4], b'-' | b'/') => (&s[..4], &s[5..]),
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

/// Numbers may carry thousands separators (`1,234,567.5`).
fn parse_number(s: &str) -> Result<f64, String> {
    let cleaned: String = s.chars().filter(|c| !matches!(c, ',' | '_' | ' ')).collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("Invalid number '{s}'."))
}

/// Integers, also when exported as `4.0`.
fn parse_integer(s: &str) -> Result<i64, String> {
    let v = parse_number(s)?;
    if v.fract() == 0.0 && v.abs() < 1e9 {
        Ok(v as i64)
    } else {
        Err(format!("Invalid integer '{s}'."))
    }
}

/// Indicator cells: empty or zero is unset; `1`, `1.0`, `true`, `yes` are set.
fn is_set(s: Option<&str>) -> Result<bool, String> {
    let Some(s) = s else { return Ok(false) };
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" => return Ok(true),
        "false" | "no" => return Ok(false),
        _ => {}
    }
    parse_number(s).map(|v| v != 0.0)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Source;
    use crate::error::{EXIT_INPUT, EXIT_NO_DATA};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_formats_normalize_to_month_start() {
        for s in [
            "2025-04-09",
            "2025/04/09",
            "04/09/2025",
            "04-09-2025",
            "25/04/2025",
            "25-04-2025",
            "202504",
            "2025-04",
            "2025-04-09 00:00:00",
            "2025-04-09T12:30:00",
        ] {
            assert_eq!(parse_month(s).unwrap(), ymd(2025, 4, 1), "format {s}");
        }
        // Month first when both readings are valid.
        assert_eq!(parse_month("09/04/2025").unwrap(), ymd(2025, 9, 1));
        assert!(parse_month("April 2025").is_err());
        assert!(parse_month("202513").is_err());
        assert!(parse_month("13/13/2025").is_err());
    }

    #[test]
    fn numbers_accept_thousands_separators() {
        assert_eq!(parse_number("1,234,567.5").unwrap(), 1_234_567.5);
        assert_eq!(parse_number("-12").unwrap(), -12.0);
        assert!(parse_number("n/a").is_err());
        assert!(parse_number("inf").is_err());
        assert_eq!(parse_integer("4.0").unwrap(), 4);
        assert!(parse_integer("4.5").is_err());
    }

    #[test]
    fn argentina_schema_with_bom_and_case_insensitive_headers() {
        let csv = "\u{feff}fecha_,Peso_Neto_Kilos,MONTO_FOB_DOLAR,PRECIO_PROMEDIO\n\
                   2025-01-15,\"1,000\",400,0.4\n\
                   2025-04-20,2000,700,\n\
                   not-a-date,1,1,1\n";
        let data = read_dataset(csv.as_bytes(), &Source::Argentina.profile()).unwrap();
        assert_eq!(data.rows_read, 3);
        assert_eq!(data.rows_used, 2);
        assert_eq!(data.row_errors.len(), 1);
        assert_eq!(data.row_errors[0].line, 4);

        let records = data.dataset.records();
        assert_eq!(records[0].date, ymd(2025, 1, 1));
        assert_eq!(records[0].metric("volume"), Some(1000.0));
        assert_eq!(records[1].metric("price"), None);
    }

    #[test]
    fn year_month_columns_and_code_categories() {
        let csv = "Year,Month,Country,US$ FOB\n2025,3,China,100\n2025,4,Spain,50\n";
        let data = read_dataset(csv.as_bytes(), &Source::Brazil.profile()).unwrap();
        let records = data.dataset.records();
        assert_eq!(records[0].date, ymd(2025, 3, 1));
        assert_eq!(records[0].category("country"), Some("China"));
        assert_eq!(records[1].metric("value"), Some(50.0));
    }

    #[test]
    fn one_hot_columns_decode_to_labels() {
        let csv = "date,410,502,12019019,12019020,amount,CNY,price\n\
                   2025-01-01,0,1,1,0,10,50,5\n\
                   2025-01-01,0,0,0,0,10,50,5\n\
                   2025-01-01,1,0,0,1.0,10,50,5\n";
        let data = read_dataset(csv.as_bytes(), &Source::China.profile()).unwrap();
        let r = data.dataset.records();
        assert_eq!(r[0].category("partner"), Some("USA"));
        assert_eq!(r[0].category("product"), Some("GM Yellow Soybean"));
        assert_eq!(r[1].category("partner"), Some("Argentina"));
        assert_eq!(r[1].category("product"), Some("Non-GM Yellow Soybean"));
        assert_eq!(r[2].category("partner"), Some("Brazil"));
        assert_eq!(r[2].category("product"), Some("Black Soybean"));
    }

    #[test]
    fn derived_price_is_rounded_and_skips_zero_denominator() {
        let csv = "date,partner,product,volume_kg,value_usd\n\
                   2025-01-01,China,soybean,3,10\n\
                   2025-02-01,China,soybean,0,10\n";
        let data = read_dataset(csv.as_bytes(), &Source::Generic.profile()).unwrap();
        let r = data.dataset.records();
        assert_eq!(r[0].metric("price"), Some(3.33));
        assert_eq!(r[1].metric("price"), None);
    }

    #[test]
    fn missing_columns_are_input_errors() {
        let csv = "date,amount\n2025-01-01,1\n";
        let err = read_dataset(csv.as_bytes(), &Source::China.profile()).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert!(err.to_string().contains("`CNY`"));
    }

    #[test]
    fn no_valid_rows_is_no_data() {
        let csv = "Year,Month,Country,US$ FOB\n2025,13,China,100\n";
        let err = read_dataset(csv.as_bytes(), &Source::Brazil.profile()).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_NO_DATA);
    }
}
