//! Result table output port.

use crate::domain::backtest::{BacktestResult, PerformanceRecord};
use crate::domain::error::MptError;
use crate::domain::statistics::Measure;
use std::path::Path;

/// Port for writing the tables the core produces.
pub trait ReportPort {
    fn write_records(
        &self,
        records: &[PerformanceRecord],
        instruments: &[String],
        output_path: &Path,
    ) -> Result<(), MptError>;

    fn write_statistics(
        &self,
        stats: &[(Measure, f64)],
        output_path: &Path,
    ) -> Result<(), MptError>;

    /// Default implementation: writes only the records of the result.
    fn write_backtest(
        &self,
        result: &BacktestResult,
        instruments: &[String],
        output_path: &Path,
    ) -> Result<(), MptError> {
        self.write_records(&result.records, instruments, output_path)
    }
}
