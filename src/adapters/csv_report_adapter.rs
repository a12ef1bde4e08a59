//! CSV report adapter implementing ReportPort.
//!
//! Writes the backtest table in long format (one row per strategy and window
//! length) so it can be pivoted or charted per strategy downstream.

use crate::domain::backtest::PerformanceRecord;
use crate::domain::error::MptError;
use crate::domain::statistics::Measure;
use crate::ports::report_port::ReportPort;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn records_to_writer<W: Write>(
        records: &[PerformanceRecord],
        instruments: &[String],
        out: W,
    ) -> Result<(), MptError> {
        let mut wtr = csv::Writer::from_writer(out);
        let mut header = vec![
            "days".to_string(),
            "strategy".to_string(),
            "ExpReturn".to_string(),
            "Risk".to_string(),
            "Sharpe".to_string(),
        ];
        header.extend(instruments.iter().map(|i| format!("w_{}", i)));
        wtr.write_record(&header).map_err(csv_error)?;

        for r in records {
            let mut row = vec![
                r.days.to_string(),
                r.strategy.to_string(),
                r.exp_return.to_string(),
                r.risk.to_string(),
                r.sharpe.to_string(),
            ];
            row.extend(r.weights.iter().map(|w| w.to_string()));
            wtr.write_record(&row).map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn statistics_to_writer<W: Write>(
        stats: &[(Measure, f64)],
        out: W,
    ) -> Result<(), MptError> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(["Measure", "Value"]).map_err(csv_error)?;
        for (measure, value) in stats {
            wtr.write_record([measure.to_string(), value.to_string()])
                .map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn csv_error(e: csv::Error) -> MptError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => MptError::Io(io),
        other => MptError::Io(std::io::Error::other(format!("{:?}", other))),
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_records(
        &self,
        records: &[PerformanceRecord],
        instruments: &[String],
        output_path: &Path,
    ) -> Result<(), MptError> {
        let file = File::create(output_path)?;
        Self::records_to_writer(records, instruments, file)
    }

    fn write_statistics(
        &self,
        stats: &[(Measure, f64)],
        output_path: &Path,
    ) -> Result<(), MptError> {
        let file = File::create(output_path)?;
        Self::statistics_to_writer(stats, file)
    }
}
