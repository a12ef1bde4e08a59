//! Column/date-range selection and the price → log-return transform.

use crate::domain::error::MptError;
use crate::domain::price_matrix::{PriceMatrix, ReturnSeries};
use chrono::NaiveDate;
use nalgebra::DMatrix;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(key: &str) -> Result<NaiveDate, MptError> {
    NaiveDate::parse_from_str(key, DATE_FORMAT).map_err(|_| MptError::InvalidDate {
        date: key.to_string(),
    })
}

/// Restricts `matrix` to `instruments` (in the requested order) and to rows
/// with `start <= date <= end`.
///
/// An empty result is returned as an empty matrix, not an error; use
/// [`PriceMatrix::ensure_non_empty`] where rows are required.
pub fn select(
    matrix: &PriceMatrix,
    instruments: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceMatrix, MptError> {
    let columns = instruments
        .iter()
        .map(|name| {
            matrix
                .instrument_index(name)
                .ok_or_else(|| MptError::UnknownInstrument {
                    instrument: name.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut dates = Vec::new();
    let mut rows = Vec::new();
    for (key, row) in matrix.dates.iter().zip(&matrix.rows) {
        let date = parse_date(key)?;
        if date < start || date > end {
            continue;
        }
        dates.push(key.clone());
        rows.push(columns.iter().map(|&j| row[j].clone()).collect());
    }

    Ok(PriceMatrix {
        dates,
        instruments: instruments.to_vec(),
        rows,
    })
}

/// `ln(p[t] / p[t-1])` per instrument; the first row is dropped.
pub fn to_log_returns(matrix: &PriceMatrix) -> Result<ReturnSeries, MptError> {
    let k = matrix.instruments.len();
    let n = matrix.row_count().saturating_sub(1);

    let mut values = DMatrix::zeros(n, k);
    for t in 1..matrix.row_count() {
        for j in 0..k {
            let prev = matrix.price(t - 1, j)?;
            let curr = matrix.price(t, j)?;
            values[(t - 1, j)] = (curr / prev).ln();
        }
    }

    Ok(ReturnSeries {
        dates: matrix.dates.iter().skip(1).cloned().collect(),
        instruments: matrix.instruments.clone(),
        values,
    })
}
