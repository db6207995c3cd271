//! CSV price files.
//!
//! Two layouts are read: one `<CODE>.csv` per asset with `date,price`
//! columns, used as an ingestion source, and a wide matrix with a date
//! column followed by one column per asset, loaded without the store.

use crate::domain::asset::normalize_code;
use crate::domain::error::MelaoError;
use crate::domain::price::RawPrice;
use crate::domain::price_matrix::PriceMatrix;
use crate::ports::price_source_port::PriceSource;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CsvPriceSource {
    base_path: PathBuf,
}

impl CsvPriceSource {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }
}

fn parse_cell_date(cell: Option<&str>) -> Option<NaiveDate> {
    cell.and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
}

fn parse_cell_price(cell: Option<&str>) -> Option<f64> {
    cell.filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
}

impl PriceSource for CsvPriceSource {
    /// Unparseable cells become missing values; the store rejects those rows.
    fn fetch(&self, code: &str) -> Result<Vec<RawPrice>, MelaoError> {
        let path = self.csv_path(code);
        let fetch_err = |reason: String| MelaoError::Fetch {
            code: code.to_string(),
            reason,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| fetch_err(format!("failed to read {}: {}", path.display(), e)))?;

        let mut records = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| fetch_err(format!("CSV parse error: {}", e)))?;
            records.push(RawPrice {
                date: parse_cell_date(record.get(0)),
                price: parse_cell_price(record.get(1)),
            });
        }

        records.sort_by_key(|r| r.date);
        Ok(records)
    }
}

/// Load a wide price matrix: first column dates, one column per asset code.
/// Empty cells are missing observations.
pub fn load_matrix_csv(path: &Path) -> Result<PriceMatrix, MelaoError> {
    let invalid = |reason: String| MelaoError::InvalidData { reason };

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| invalid(format!("failed to read {}: {}", path.display(), e)))?;

    let headers = rdr
        .headers()
        .map_err(|e| invalid(format!("CSV header error: {}", e)))?
        .clone();
    let codes: Vec<String> = headers.iter().skip(1).map(normalize_code).collect();
    if codes.is_empty() {
        return Err(invalid("matrix has no asset columns".into()));
    }

    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| invalid(format!("CSV parse error: {}", e)))?;
        let date = parse_cell_date(record.get(0))
            .ok_or_else(|| invalid(format!("row {}: invalid date", line + 2)))?;
        let cells: Vec<Option<f64>> = (1..=codes.len())
            .map(|i| parse_cell_price(record.get(i)).filter(|p| p.is_finite() && *p > 0.0))
            .collect();
        rows.push((date, cells));
    }

    PriceMatrix::from_rows(codes, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        fs::write(
            path.join("BTCUSD.csv"),
            "date,price\n\
             2024-01-16,42100.5\n\
             2024-01-15,41800.0\n\
             not-a-date,1.0\n\
             2024-01-17,\n",
        )
        .unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_returns_sorted_records() {
        let (_dir, path) = setup_test_data();
        let source = CsvPriceSource::new(path);
        let records = source.fetch("BTCUSD").unwrap();

        assert_eq!(records.len(), 4);
        // Missing dates sort first.
        assert_eq!(records[0].date, None);
        assert_eq!(records[1], RawPrice::new(d(15), 41800.0));
        assert_eq!(records[2], RawPrice::new(d(16), 42100.5));
        assert_eq!(records[3].price, None);
    }

    #[test]
    fn fetch_missing_file_is_fetch_error() {
        let (_dir, path) = setup_test_data();
        let source = CsvPriceSource::new(path);
        let err = source.fetch("XYZ").unwrap_err();
        assert!(matches!(err, MelaoError::Fetch { code, .. } if code == "XYZ"));
    }

    #[test]
    fn load_matrix_csv_reads_wide_layout() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("prices.csv");
        fs::write(
            &file,
            "Date,btcusd,ETHUSD\n\
             2024-01-02,101,\n\
             2024-01-01,100,20\n",
        )
        .unwrap();

        let matrix = load_matrix_csv(&file).unwrap();
        assert_eq!(matrix.codes(), &["BTCUSD".to_string(), "ETHUSD".to_string()]);
        assert_eq!(matrix.dates(), &[d(1), d(2)]);
        assert_eq!(matrix.column("ETHUSD").unwrap(), &[Some(20.0), None]);
    }

    #[test]
    fn load_matrix_csv_rejects_bad_dates() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("prices.csv");
        fs::write(&file, "date,A\n01/02/2024,5\n").unwrap();
        assert!(matches!(
            load_matrix_csv(&file),
            Err(MelaoError::InvalidData { .. })
        ));
    }
}
