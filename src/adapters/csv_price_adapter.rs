//! CSV price table adapter.
//!
//! Column 0 holds the date key, every other column one instrument's prices.
//! Cells keep the type they were written with so the validator can flag
//! text that merely looks numeric to a human.

use crate::domain::error::MptError;
use crate::domain::price_matrix::{Cell, PriceMatrix};
use crate::ports::price_port::PricePort;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

pub const TEMPLATE_INSTRUMENTS: [&str; 3] = ["stock A", "stock B", "stock C"];

pub struct CsvPriceAdapter {
    path: PathBuf,
}

impl CsvPriceAdapter {
    /// Accepts only file names mentioning `csv`.
    pub fn new(path: PathBuf) -> Result<Self, MptError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !name.to_lowercase().contains("csv") {
            return Err(MptError::UnsupportedFileType { file: name });
        }
        Ok(Self { path })
    }
}

impl PricePort for CsvPriceAdapter {
    fn load_prices(&self) -> Result<PriceMatrix, MptError> {
        let content = fs::read(&self.path)?;
        parse_prices(content.as_slice())
    }
}

pub fn parse_prices<R: Read>(reader: R) -> Result<PriceMatrix, MptError> {
    let mut rdr = csv::Reader::from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| MptError::MalformedFile {
            reason: format!("CSV header error: {}", e),
        })?
        .clone();
    if headers.len() < 2 {
        return Err(MptError::MalformedFile {
            reason: "expected a date column and at least one instrument column".into(),
        });
    }
    let instruments: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

    let mut dates = Vec::new();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| MptError::MalformedFile {
            reason: format!("CSV parse error: {}", e),
        })?;
        let date = record.get(0).ok_or_else(|| MptError::MalformedFile {
            reason: "missing date column".into(),
        })?;
        dates.push(date.trim().to_string());
        rows.push(record.iter().skip(1).map(parse_cell).collect());
    }

    PriceMatrix::new(dates, instruments, rows)
}

fn parse_cell(raw: &str) -> Cell {
    let s = raw.trim();
    if s.is_empty() {
        return Cell::Missing;
    }
    if let Ok(v) = s.parse::<i64>() {
        return Cell::Int(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_nan() => Cell::Missing,
        Ok(v) if v.is_infinite() => Cell::Text(s.to_string()),
        Ok(v) => Cell::Float(v),
        Err(_) => Cell::Text(s.to_string()),
    }
}

/// Upload template: a date column followed by one column per instrument.
pub fn template() -> String {
    let mut out = format!("date,{}\n", TEMPLATE_INSTRUMENTS.join(","));
    for (i, day) in ["2024-01-02", "2024-01-03", "2024-01-04"].iter().enumerate() {
        let prices: Vec<String> = (0..TEMPLATE_INSTRUMENTS.len())
            .map(|j| format!("{:.2}", 100.0 * (j + 1) as f64 + i as f64))
            .collect();
        out.push_str(&format!("{},{}\n", day, prices.join(",")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::validate;
    use tempfile::TempDir;

    const PRICES: &str = "date,BHP,CBA\n\
        2024-01-15,100.0,50\n\
        2024-01-16,105.5,51\n\
        2024-01-17,110.0,n/a\n";

    #[test]
    fn load_prices_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prices.csv");
        fs::write(&path, PRICES).unwrap();

        let matrix = CsvPriceAdapter::new(path).unwrap().load_prices().unwrap();
        assert_eq!(matrix.instruments, vec!["BHP", "CBA"]);
        assert_eq!(matrix.dates, vec!["2024-01-15", "2024-01-16", "2024-01-17"]);
        assert_eq!(matrix.rows[1][0], Cell::Float(105.5));
        assert_eq!(matrix.rows[1][1], Cell::Int(51));
        assert_eq!(matrix.rows[2][1], Cell::Text("n/a".into()));
    }

    #[test]
    fn infinite_values_are_text() {
        let matrix = parse_prices("date,A,B\n2024-01-01,inf,-Infinity\n".as_bytes()).unwrap();
        assert_eq!(matrix.rows[0][0], Cell::Text("inf".into()));
        assert_eq!(matrix.rows[0][1], Cell::Text("-Infinity".into()));
        assert_eq!(
            validate(&matrix),
            vec![crate::domain::validation::ValidationIssue::NonNumericValues]
        );
    }

    #[test]
    fn non_csv_file_name_is_rejected() {
        let err = CsvPriceAdapter::new(PathBuf::from("/tmp/prices.xlsx")).err().unwrap();
        assert!(matches!(err, MptError::UnsupportedFileType { file } if file == "prices.xlsx"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvPriceAdapter::new(dir.path().join("absent.csv")).unwrap();
        assert!(matches!(adapter.load_prices(), Err(MptError::Io(_))));
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let err = parse_prices("date,A,B\n2024-01-01,1,2\n2024-01-02,3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MptError::MalformedFile { .. }));
    }

    #[test]
    fn date_only_file_is_malformed() {
        let err = parse_prices("date\n2024-01-01\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MptError::MalformedFile { .. }));
    }

    #[test]
    fn empty_and_nan_cells_are_missing() {
        let m = parse_prices("date,A,B\n2024-01-01,,NaN\n".as_bytes()).unwrap();
        assert_eq!(m.rows[0], vec![Cell::Missing, Cell::Missing]);
    }

    #[test]
    fn template_parses_and_validates() {
        let m = parse_prices(template().as_bytes()).unwrap();
        assert_eq!(m.instruments, TEMPLATE_INSTRUMENTS.to_vec());
        assert_eq!(m.row_count(), 3);
        assert!(validate(&m).is_empty());
    }
}
