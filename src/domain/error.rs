//! Domain error types.

use crate::domain::allocator::Objective;

/// Top-level error type for mptfolio.
#[derive(Debug, thiserror::Error)]
pub enum MptError {
    #[error("unsupported file type: {file} (expected a .csv file)")]
    UnsupportedFileType { file: String },

    #[error("malformed price file: {reason}")]
    MalformedFile { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no price data loaded")]
    NoData,

    #[error("unknown instrument: {instrument}")]
    UnknownInstrument { instrument: String },

    #[error("no rows between {start} and {end}")]
    EmptyWindow { start: String, end: String },

    #[error("invalid date key: {date}")]
    InvalidDate { date: String },

    #[error("non-numeric value for {instrument} on {date}")]
    NonNumericCell { instrument: String, date: String },

    #[error("price for {instrument} on {date} must be finite and positive, got {value}")]
    NonPositivePrice {
        instrument: String,
        date: String,
        value: f64,
    },

    #[error("instrument mismatch: estimation {estimation:?}, evaluation {evaluation:?}")]
    InstrumentMismatch {
        estimation: Vec<String>,
        evaluation: Vec<String>,
    },

    #[error("insufficient data for {what}: have {rows} rows, need {minimum}")]
    InsufficientData {
        what: String,
        rows: usize,
        minimum: usize,
    },

    #[error("{objective} solver did not converge after {iterations} iterations")]
    OptimizationDidNotConverge {
        objective: Objective,
        iterations: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&MptError> for std::process::ExitCode {
    fn from(err: &MptError) -> Self {
        let code: u8 = match err {
            MptError::Io(_) => 1,
            MptError::ConfigParse { .. }
            | MptError::ConfigMissing { .. }
            | MptError::ConfigInvalid { .. } => 2,
            MptError::UnsupportedFileType { .. } | MptError::MalformedFile { .. } => 3,
            MptError::OptimizationDidNotConverge { .. } => 4,
            MptError::NoData
            | MptError::UnknownInstrument { .. }
            | MptError::EmptyWindow { .. }
            | MptError::InvalidDate { .. }
            | MptError::NonNumericCell { .. }
            | MptError::NonPositivePrice { .. }
            | MptError::InstrumentMismatch { .. }
            | MptError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
