//! Price table (dates × instruments) and the log-return series derived from it.

use crate::domain::error::MptError;
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// One cell of an ingested price table, typed the way the reader saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Numeric value of an `Int` or `Float` cell.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::Text(_) | Cell::Missing => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Int(_) | Cell::Float(_))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Missing => Ok(()),
        }
    }
}

/// Dates (row keys, kept as the raw text) × instruments (column keys).
///
/// `rows[i][j]` is the cell for `dates[i]` and `instruments[j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatrix {
    pub dates: Vec<String>,
    pub instruments: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl PriceMatrix {
    pub fn new(
        dates: Vec<String>,
        instruments: Vec<String>,
        rows: Vec<Vec<Cell>>,
    ) -> Result<Self, MptError> {
        if dates.len() != rows.len() {
            return Err(MptError::MalformedFile {
                reason: format!("{} date keys for {} rows", dates.len(), rows.len()),
            });
        }
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != instruments.len())
        {
            return Err(MptError::MalformedFile {
                reason: format!(
                    "row {} has {} cells, expected {}",
                    dates[i],
                    row.len(),
                    instruments.len()
                ),
            });
        }
        for (i, name) in instruments.iter().enumerate() {
            if instruments[..i].contains(name) {
                return Err(MptError::MalformedFile {
                    reason: format!("duplicate instrument column: {}", name),
                });
            }
        }
        Ok(Self {
            dates,
            instruments,
            rows,
        })
    }

    /// Builds a fully numeric matrix; used by tests and synthetic data.
    pub fn from_prices(
        dates: Vec<String>,
        instruments: Vec<String>,
        prices: Vec<Vec<f64>>,
    ) -> Result<Self, MptError> {
        let rows = prices
            .into_iter()
            .map(|r| r.into_iter().map(Cell::Float).collect())
            .collect();
        Self::new(dates, instruments, rows)
    }

    pub fn row_count(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn instrument_index(&self, instrument: &str) -> Option<usize> {
        self.instruments.iter().position(|i| i == instrument)
    }

    /// Date keys in ascending order, as offered to date pickers.
    pub fn sorted_dates(&self) -> Vec<String> {
        let mut dates = self.dates.clone();
        dates.sort();
        dates
    }

    /// Fails with `EmptyWindow` when the matrix has no rows.
    pub fn ensure_non_empty(&self, start: &str, end: &str) -> Result<(), MptError> {
        if self.is_empty() {
            return Err(MptError::EmptyWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(())
    }

    /// Price at (`row`, `col`). Fails with `NonNumericCell` for text or
    /// missing cells and `NonPositivePrice` for zero, negative or infinite ones.
    pub fn price(&self, row: usize, col: usize) -> Result<f64, MptError> {
        let value = self.rows[row][col]
            .as_f64()
            .ok_or_else(|| MptError::NonNumericCell {
                instrument: self.instruments[col].clone(),
                date: self.dates[row].clone(),
            })?;
        if !value.is_finite() || value <= 0.0 {
            return Err(MptError::NonPositivePrice {
                instrument: self.instruments[col].clone(),
                date: self.dates[row].clone(),
                value,
            });
        }
        Ok(value)
    }

    /// The first `max_rows` rows and `max_instruments` instrument columns.
    pub fn preview(&self, max_rows: usize, max_instruments: usize) -> PriceMatrix {
        let rows = self.row_count().min(max_rows);
        let cols = self.instruments.len().min(max_instruments);
        PriceMatrix {
            dates: self.dates[..rows].to_vec(),
            instruments: self.instruments[..cols].to_vec(),
            rows: self.rows[..rows].iter().map(|r| r[..cols].to_vec()).collect(),
        }
    }
}

/// Log-returns, rows = dates, columns = instruments.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    pub dates: Vec<String>,
    pub instruments: Vec<String>,
    pub values: DMatrix<f64>,
}

impl ReturnSeries {
    pub fn row_count(&self) -> usize {
        self.values.nrows()
    }

    pub fn instrument_count(&self) -> usize {
        self.values.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    pub fn column(&self, instrument: &str) -> Option<Vec<f64>> {
        let j = self.instruments.iter().position(|i| i == instrument)?;
        Some(self.values.column(j).iter().copied().collect())
    }

    /// The trailing `days` rows (all rows if `days` exceeds the length).
    pub fn tail(&self, days: usize) -> ReturnSeries {
        let n = self.row_count();
        let start = n.saturating_sub(days);
        ReturnSeries {
            dates: self.dates[start..].to_vec(),
            instruments: self.instruments.clone(),
            values: self
                .values
                .view((start, 0), (n - start, self.instrument_count()))
                .into_owned(),
        }
    }

    /// Column means; NaN for an empty series.
    pub fn mean(&self) -> DVector<f64> {
        let n = self.row_count() as f64;
        DVector::from_iterator(
            self.instrument_count(),
            self.values.column_iter().map(|c| c.sum() / n),
        )
    }

    /// Sample covariance (`n - 1` denominator); NaN with fewer than 2 rows.
    pub fn covariance(&self) -> DMatrix<f64> {
        let n = self.row_count();
        let k = self.instrument_count();
        if n < 2 {
            return DMatrix::from_element(k, k, f64::NAN);
        }
        let mean = self.mean();
        let mut centered = self.values.clone();
        for (j, mut col) in centered.column_iter_mut().enumerate() {
            col.add_scalar_mut(-mean[j]);
        }
        let cov = centered.transpose() * &centered / (n - 1) as f64;
        // Force exact symmetry against rounding in the product.
        (&cov + cov.transpose()) * 0.5
    }
}
