#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use mptfolio::domain::error::MptError;
use mptfolio::domain::price_matrix::PriceMatrix;
use mptfolio::domain::session::DateRange;
use mptfolio::domain::window::DATE_FORMAT;
use mptfolio::ports::price_port::PricePort;

pub const INSTRUMENTS: [&str; 3] = ["stock A", "stock B", "stock C"];

pub struct MockPricePort {
    pub matrix: Option<PriceMatrix>,
    pub error: Option<String>,
}

impl MockPricePort {
    pub fn with_matrix(matrix: PriceMatrix) -> Self {
        Self {
            matrix: Some(matrix),
            error: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            matrix: None,
            error: Some(reason.to_string()),
        }
    }
}

impl PricePort for MockPricePort {
    fn load_prices(&self) -> Result<PriceMatrix, MptError> {
        if let Some(reason) = &self.error {
            return Err(MptError::MalformedFile {
                reason: reason.clone(),
            });
        }
        self.matrix.clone().ok_or(MptError::NoData)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
    DateRange::new(start, end)
}

/// Consecutive calendar days starting 2024-01-01.
pub fn day(offset: u64) -> NaiveDate {
    date(2024, 1, 1).checked_add_days(Days::new(offset)).unwrap()
}

/// Deterministic, non-collinear daily prices for the three template instruments.
pub fn synthetic_prices(rows: usize) -> PriceMatrix {
    let dates = (0..rows)
        .map(|t| day(t as u64).format(DATE_FORMAT).to_string())
        .collect();
    let mut level = [100.0_f64, 50.0, 20.0];
    let mut prices = Vec::with_capacity(rows);
    for t in 0..rows {
        if t > 0 {
            for (i, p) in level.iter_mut().enumerate() {
                let k = (i + 1) as f64;
                let r = 0.0005 * k + 0.01 * k * ((t as f64) * (1.3 + 0.7 * k) + k).sin();
                *p *= r.exp();
            }
        }
        prices.push(level.to_vec());
    }
    PriceMatrix::from_prices(
        dates,
        INSTRUMENTS.iter().map(|s| s.to_string()).collect(),
        prices,
    )
    .unwrap()
}

pub fn instruments() -> Vec<String> {
    INSTRUMENTS.iter().map(|s| s.to_string()).collect()
}

pub fn write_prices_csv(matrix: &PriceMatrix, path: &std::path::Path) {
    let mut text = format!("date,{}\n", matrix.instruments.join(","));
    for (date, row) in matrix.dates.iter().zip(&matrix.rows) {
        let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        text.push_str(&format!("{},{}\n", date, cells.join(",")));
    }
    std::fs::write(path, text).unwrap();
}
