//! CSV ingest for observation series.
//!
//! Accepted schemas (header names are case-insensitive):
//!
//! - `day,active`: integer day offsets
//! - `date,active`: ISO dates (`YYYY-MM-DD`), converted to offsets from the first date
//!
//! `active_cases` is accepted as an alias for `active`. The input is expected
//! to be clean already; any unparseable row fails the load with its line number.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::domain::{Observation, ObservationSeries};
use crate::error::AppError;

/// Loaded series plus what we learned about its time axis.
#[derive(Debug, Clone)]
pub struct IngestedSeries {
    pub series: ObservationSeries,
    /// Calendar date of day 0, when the file was dated.
    pub start_date: Option<NaiveDate>,
    pub rows_read: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeColumn {
    Day(usize),
    Date(usize),
}

pub fn load_observations(path: &Path) -> Result<IngestedSeries, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let time = if let Some(&idx) = header_map.get("day") {
        TimeColumn::Day(idx)
    } else if let Some(&idx) = header_map.get("date") {
        TimeColumn::Date(idx)
    } else {
        return Err(AppError::new(
            2,
            "CSV must have a 'day' or 'date' column.",
        ));
    };
    let active_idx = header_map
        .get("active")
        .or_else(|| header_map.get("active_cases"))
        .copied()
        .ok_or_else(|| AppError::new(2, "CSV must have an 'active' column."))?;

    let mut days = Vec::new();
    let mut dated = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header and lines are 1-based.
        let line = idx + 2;
        rows_read += 1;
        let record =
            result.map_err(|e| AppError::new(2, format!("CSV parse error on line {line}: {e}")))?;

        let active = parse_field::<f64>(&record, active_idx, "active", line)?;
        match time {
            TimeColumn::Day(i) => {
                let day = parse_field::<u32>(&record, i, "day", line)?;
                days.push(Observation { day, active });
            }
            TimeColumn::Date(i) => {
                let raw = field(&record, i, "date", line)?;
                let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                    AppError::new(2, format!("Invalid date '{raw}' on line {line}: {e}"))
                })?;
                dated.push((date, active));
            }
        }
    }

    if rows_read == 0 {
        return Err(AppError::new(3, format!("CSV '{}' has no data rows.", path.display())));
    }

    let (series, start_date) = match time {
        TimeColumn::Day(_) => (ObservationSeries::new(days)?, None),
        TimeColumn::Date(_) => {
            let start = dated.first().map(|r| r.0);
            (ObservationSeries::from_dated(&dated)?, start)
        }
    };

    Ok(IngestedSeries {
        series,
        start_date,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn field<'r>(record: &'r StringRecord, idx: usize, name: &str, line: usize) -> Result<&'r str, AppError> {
    record
        .get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::new(2, format!("Missing '{name}' on line {line}.")))
}

fn parse_field<T: std::str::FromStr>(
    record: &StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    let raw = field(record, idx, name, line)?;
    raw.parse::<T>()
        .map_err(|e| AppError::new(2, format!("Invalid {name} '{raw}' on line {line}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn reads_day_offsets() {
        let f = write_csv("Day,Active\n0,1\n2,4.5\n5,10\n");
        let data = load_observations(f.path()).unwrap();
        assert_eq!(data.rows_read, 3);
        assert_eq!(data.start_date, None);
        assert_eq!(data.series.days(), vec![0.0, 2.0, 5.0]);
        assert_eq!(data.series.active(), vec![1.0, 4.5, 10.0]);
    }

    #[test]
    fn converts_dates_to_offsets() {
        let f = write_csv("\u{feff}date,active_cases\n2020-02-24,200\n2020-02-26,300\n2020-03-01,900\n");
        let data = load_observations(f.path()).unwrap();
        assert_eq!(data.start_date, NaiveDate::from_ymd_opt(2020, 2, 24));
        assert_eq!(data.series.days(), vec![0.0, 2.0, 6.0]);
    }

    #[test]
    fn bad_rows_fail_with_line_number() {
        let f = write_csv("day,active\n0,1\n1,abc\n");
        let err = load_observations(f.path()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn missing_columns_are_reported() {
        let f = write_csv("t,cases\n0,1\n");
        let err = load_observations(f.path()).unwrap_err();
        assert!(err.to_string().contains("'day' or 'date'"));
    }

    #[test]
    fn non_increasing_days_are_a_config_error() {
        let f = write_csv("day,active\n0,1\n3,2\n3,4\n");
        let err = load_observations(f.path()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
