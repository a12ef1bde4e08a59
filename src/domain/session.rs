//! Session state: the currently loaded price table and the entry points the
//! presentation layer calls against it.

use crate::domain::backtest::{self, BacktestConfig, BacktestResult};
use crate::domain::error::MptError;
use crate::domain::price_matrix::{PriceMatrix, ReturnSeries};
use crate::domain::statistics::{self, HistogramBin, Measure};
use crate::domain::validation::{self, ValidationIssue};
use crate::domain::window::{select, to_log_returns, DATE_FORMAT};
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use nalgebra::DMatrix;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioRequest {
    pub instruments: Vec<String>,
    pub estimation: DateRange,
    pub evaluation: DateRange,
}

/// Holds one price table at a time; replacing it swaps the whole table.
#[derive(Debug, Default, Clone)]
pub struct Session {
    prices: Option<Arc<PriceMatrix>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(matrix: PriceMatrix) -> Self {
        Self {
            prices: Some(Arc::new(matrix)),
        }
    }

    pub fn load(&mut self, port: &dyn PricePort) -> Result<(), MptError> {
        let matrix = port.load_prices()?;
        tracing::info!(
            "Loaded {} rows x {} instruments",
            matrix.row_count(),
            matrix.instruments.len()
        );
        self.replace(matrix);
        Ok(())
    }

    pub fn replace(&mut self, matrix: PriceMatrix) {
        self.prices = Some(Arc::new(matrix));
    }

    pub fn is_loaded(&self) -> bool {
        self.prices.is_some()
    }

    /// Shared handle to the current table; unaffected by later replacements.
    pub fn snapshot(&self) -> Option<Arc<PriceMatrix>> {
        self.prices.clone()
    }

    pub fn prices(&self) -> Result<&PriceMatrix, MptError> {
        self.prices.as_deref().ok_or(MptError::NoData)
    }

    pub fn instruments(&self) -> Result<&[String], MptError> {
        Ok(&self.prices()?.instruments)
    }

    pub fn validate(&self) -> Result<Vec<ValidationIssue>, MptError> {
        Ok(validation::validate(self.prices()?))
    }

    /// Log-returns of `instruments` between `range.start` and `range.end`.
    pub fn returns_view(
        &self,
        instruments: &[String],
        range: DateRange,
    ) -> Result<ReturnSeries, MptError> {
        let selected = select(self.prices()?, instruments, range.start, range.end)?;
        selected.ensure_non_empty(
            &range.start.format(DATE_FORMAT).to_string(),
            &range.end.format(DATE_FORMAT).to_string(),
        )?;
        to_log_returns(&selected)
    }

    pub fn describe_instrument(
        &self,
        instrument: &str,
        range: DateRange,
    ) -> Result<Vec<(Measure, f64)>, MptError> {
        let column = self.instrument_returns(instrument, range)?;
        Ok(statistics::describe(&column))
    }

    pub fn return_histogram(
        &self,
        instrument: &str,
        range: DateRange,
        bins: usize,
    ) -> Result<Vec<HistogramBin>, MptError> {
        let column = self.instrument_returns(instrument, range)?;
        Ok(statistics::histogram(&column, bins))
    }

    pub fn correlation(
        &self,
        instruments: &[String],
        range: DateRange,
    ) -> Result<DMatrix<f64>, MptError> {
        let returns = self.returns_view(instruments, range)?;
        Ok(statistics::correlation(&returns))
    }

    pub fn run_portfolio(
        &self,
        request: &PortfolioRequest,
        config: &BacktestConfig,
    ) -> Result<BacktestResult, MptError> {
        let estimation = self.returns_view(&request.instruments, request.estimation)?;
        let evaluation = self.returns_view(&request.instruments, request.evaluation)?;
        backtest::run_backtest(&estimation, &evaluation, config)
    }

    fn instrument_returns(&self, instrument: &str, range: DateRange) -> Result<Vec<f64>, MptError> {
        let returns = self.returns_view(&[instrument.to_string()], range)?;
        returns
            .column(instrument)
            .ok_or_else(|| MptError::UnknownInstrument {
                instrument: instrument.to_string(),
            })
    }
}
