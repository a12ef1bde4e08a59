//! Configuration validation.
//!
//! Validates all config fields before a backtest runs.

use crate::domain::error::MptError;
use crate::domain::window::DATE_FORMAT;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::collections::HashSet;

pub fn validate_portfolio_config(config: &dyn ConfigPort) -> Result<(), MptError> {
    validate_data_path(config)?;
    validate_instruments(config)?;
    validate_range(config, "estimation_start", "estimation_end")?;
    validate_range(config, "evaluation_start", "evaluation_end")?;
    validate_risk_free_rate(config)?;
    Ok(())
}

pub fn validate_solver_config(config: &dyn ConfigPort) -> Result<(), MptError> {
    validate_max_iterations(config)?;
    validate_tolerance(config)?;
    validate_min_window(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> MptError {
    MptError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_data_path(config: &dyn ConfigPort) -> Result<(), MptError> {
    match config.get_string("data", "path") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(MptError::ConfigMissing {
            section: "data".to_string(),
            key: "path".to_string(),
        }),
    }
}

fn validate_instruments(config: &dyn ConfigPort) -> Result<(), MptError> {
    let instruments = config
        .get_list("portfolio", "instruments")
        .ok_or_else(|| MptError::ConfigMissing {
            section: "portfolio".to_string(),
            key: "instruments".to_string(),
        })?;
    if instruments.is_empty() {
        return Err(invalid(
            "portfolio",
            "instruments",
            "at least one instrument is required",
        ));
    }
    let mut seen = HashSet::new();
    for name in &instruments {
        if !seen.insert(name) {
            return Err(invalid(
                "portfolio",
                "instruments",
                &format!("duplicate instrument: {}", name),
            ));
        }
    }
    Ok(())
}

pub fn parse_config_date(config: &dyn ConfigPort, key: &str) -> Result<NaiveDate, MptError> {
    match config.get_string("portfolio", key) {
        None => Err(MptError::ConfigMissing {
            section: "portfolio".to_string(),
            key: key.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| {
            invalid(
                "portfolio",
                key,
                &format!("invalid {} format, expected YYYY-MM-DD", key),
            )
        }),
    }
}

fn validate_range(config: &dyn ConfigPort, start_key: &str, end_key: &str) -> Result<(), MptError> {
    let start = parse_config_date(config, start_key)?;
    let end = parse_config_date(config, end_key)?;
    if start > end {
        return Err(invalid(
            "portfolio",
            start_key,
            &format!("{} must not be after {}", start_key, end_key),
        ));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), MptError> {
    if let Some(raw) = config.get_string("portfolio", "risk_free_rate") {
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => {}
            _ => {
                return Err(invalid(
                    "portfolio",
                    "risk_free_rate",
                    "risk_free_rate must be a finite number",
                ));
            }
        }
    }
    Ok(())
}

fn validate_max_iterations(config: &dyn ConfigPort) -> Result<(), MptError> {
    let value = config.get_int("solver", "max_iterations", 1000);
    if value < 1 {
        return Err(invalid(
            "solver",
            "max_iterations",
            "max_iterations must be at least 1",
        ));
    }
    Ok(())
}

fn validate_tolerance(config: &dyn ConfigPort) -> Result<(), MptError> {
    let value = config.get_double("solver", "tolerance", 1e-10);
    if !(value > 0.0 && value.is_finite()) {
        return Err(invalid("solver", "tolerance", "tolerance must be positive"));
    }
    Ok(())
}

fn validate_min_window(config: &dyn ConfigPort) -> Result<(), MptError> {
    let value = config.get_int("backtest", "min_window", 3);
    if value < 2 {
        return Err(invalid(
            "backtest",
            "min_window",
            "min_window must be at least 2 (covariance needs two observations)",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const VALID: &str = r#"
[data]
path = prices.csv

[portfolio]
instruments = A, B, C
estimation_start = 2023-01-01
estimation_end = 2023-06-30
evaluation_start = 2023-07-01
evaluation_end = 2023-12-31
risk_free_rate = 0.0

[solver]
max_iterations = 500
tolerance = 1e-9

[backtest]
min_window = 3
"#;

    fn adapter(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn without(key: &str) -> String {
        VALID
            .lines()
            .filter(|l| !l.starts_with(key))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn replaced(key: &str, value: &str) -> String {
        VALID
            .lines()
            .map(|l| {
                if l.starts_with(key) {
                    format!("{} = {}", key, value)
                } else {
                    l.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn valid_config_passes() {
        let a = adapter(VALID);
        assert!(validate_portfolio_config(&a).is_ok());
        assert!(validate_solver_config(&a).is_ok());
    }

    #[test]
    fn missing_data_path() {
        let err = validate_portfolio_config(&adapter(&without("path"))).unwrap_err();
        assert!(matches!(err, MptError::ConfigMissing { key, .. } if key == "path"));
    }

    #[test]
    fn missing_instruments() {
        let err = validate_portfolio_config(&adapter(&without("instruments"))).unwrap_err();
        assert!(matches!(err, MptError::ConfigMissing { key, .. } if key == "instruments"));
    }

    #[test]
    fn duplicate_instruments() {
        let err =
            validate_portfolio_config(&adapter(&replaced("instruments", "A, B, A"))).unwrap_err();
        assert!(matches!(err, MptError::ConfigInvalid { key, .. } if key == "instruments"));
    }

    #[test]
    fn bad_date_format() {
        let err = validate_portfolio_config(&adapter(&replaced("evaluation_end", "31/12/2023")))
            .unwrap_err();
        assert!(matches!(err, MptError::ConfigInvalid { key, .. } if key == "evaluation_end"));
    }

    #[test]
    fn reversed_range() {
        let err = validate_portfolio_config(&adapter(&replaced("estimation_start", "2024-01-01")))
            .unwrap_err();
        assert!(matches!(err, MptError::ConfigInvalid { key, .. } if key == "estimation_start"));
    }

    #[test]
    fn non_numeric_risk_free_rate() {
        let err = validate_portfolio_config(&adapter(&replaced("risk_free_rate", "five")))
            .unwrap_err();
        assert!(matches!(err, MptError::ConfigInvalid { key, .. } if key == "risk_free_rate"));
    }

    #[test]
    fn zero_iterations() {
        let err = validate_solver_config(&adapter(&replaced("max_iterations", "0"))).unwrap_err();
        assert!(matches!(err, MptError::ConfigInvalid { key, .. } if key == "max_iterations"));
    }

    #[test]
    fn non_positive_tolerance() {
        let err = validate_solver_config(&adapter(&replaced("tolerance", "0"))).unwrap_err();
        assert!(matches!(err, MptError::ConfigInvalid { key, .. } if key == "tolerance"));
    }

    #[test]
    fn min_window_below_two() {
        let err = validate_solver_config(&adapter(&replaced("min_window", "1"))).unwrap_err();
        assert!(matches!(err, MptError::ConfigInvalid { key, .. } if key == "min_window"));
    }

    #[test]
    fn solver_section_is_optional() {
        assert!(validate_solver_config(&adapter("[data]\npath = x.csv\n")).is_ok());
    }
}
