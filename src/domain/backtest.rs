//! Rolling estimation-window backtest.
//!
//! For every window length `d` the trailing `d` estimation rows are used to
//! fit min-risk and max-Sharpe weights; those weights and the naive
//! equal-weight vector are then scored against one fixed evaluation window.

use crate::domain::allocator::{self, Allocation, SolverOptions};
use crate::domain::error::MptError;
use crate::domain::price_matrix::ReturnSeries;
use crate::domain::risk::{self, equal_weights};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::fmt;

pub const DEFAULT_MIN_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    MinRisk,
    MaxEff,
    Naive,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::MinRisk, Strategy::MaxEff, Strategy::Naive];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::MinRisk => write!(f, "min_risk"),
            Strategy::MaxEff => write!(f, "max_eff"),
            Strategy::Naive => write!(f, "naive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub risk_free_rate: f64,
    pub solver: SolverOptions,
    /// Shortest estimation window tried.
    pub min_window: usize,
    /// Solve window lengths on the rayon pool; output order is unchanged.
    pub parallel: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            solver: SolverOptions::default(),
            min_window: DEFAULT_MIN_WINDOW,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceRecord {
    pub exp_return: f64,
    pub risk: f64,
    pub sharpe: f64,
    pub strategy: Strategy,
    pub days: usize,
    /// Weights in the instrument order of the input series.
    pub weights: Vec<f64>,
}

impl PerformanceRecord {
    pub fn is_finite(&self) -> bool {
        self.exp_return.is_finite() && self.risk.is_finite() && self.sharpe.is_finite()
    }
}

/// A (strategy, window) pair dropped because its solve was rejected.
#[derive(Debug)]
pub struct WindowFailure {
    pub strategy: Strategy,
    pub days: usize,
    pub error: MptError,
}

#[derive(Debug, Default)]
pub struct BacktestResult {
    /// Strategy-major (min_risk, max_eff, naive), ascending `days` within each.
    pub records: Vec<PerformanceRecord>,
    pub failures: Vec<WindowFailure>,
    /// Solves kept although the solver ran out of iterations.
    pub non_converged: usize,
}

impl BacktestResult {
    pub fn for_strategy(&self, strategy: Strategy) -> impl Iterator<Item = &PerformanceRecord> {
        self.records.iter().filter(move |r| r.strategy == strategy)
    }
}

struct WindowFit {
    days: usize,
    min_risk: Result<Allocation, MptError>,
    max_eff: Result<Allocation, MptError>,
}

/// Statistics of the held-out window every weight vector is scored on.
struct Evaluation {
    periods: usize,
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
    risk_free_rate: f64,
}

impl Evaluation {
    fn score(&self, strategy: Strategy, days: usize, weights: &DVector<f64>) -> PerformanceRecord {
        PerformanceRecord {
            exp_return: risk::expected_return(&self.mean, self.periods, weights),
            risk: risk::portfolio_risk(&self.covariance, self.periods, weights),
            sharpe: risk::sharpe(
                &self.mean,
                &self.covariance,
                self.periods,
                self.risk_free_rate,
                weights,
            ),
            strategy,
            days,
            weights: weights.iter().copied().collect(),
        }
    }
}

pub fn run_backtest(
    estimation: &ReturnSeries,
    evaluation: &ReturnSeries,
    config: &BacktestConfig,
) -> Result<BacktestResult, MptError> {
    if estimation.instruments != evaluation.instruments {
        return Err(MptError::InstrumentMismatch {
            estimation: estimation.instruments.clone(),
            evaluation: evaluation.instruments.clone(),
        });
    }
    if estimation.instrument_count() == 0 {
        return Err(MptError::InsufficientData {
            what: "instrument selection".into(),
            rows: 0,
            minimum: 1,
        });
    }
    if evaluation.row_count() < 2 {
        return Err(MptError::InsufficientData {
            what: "evaluation window".into(),
            rows: evaluation.row_count(),
            minimum: 2,
        });
    }

    let eval = Evaluation {
        periods: evaluation.row_count() + 1,
        mean: evaluation.mean(),
        covariance: evaluation.covariance(),
        risk_free_rate: config.risk_free_rate,
    };
    let naive = equal_weights(estimation.instrument_count());

    let windows: Vec<usize> = (config.min_window..estimation.row_count()).collect();
    if windows.is_empty() {
        tracing::warn!(
            "estimation window has {} rows; need more than {} for any record",
            estimation.row_count(),
            config.min_window
        );
    }
    tracing::info!(
        "Running backtest: {} instruments, {} window lengths, evaluation horizon {}",
        estimation.instrument_count(),
        windows.len(),
        eval.periods
    );

    let fit = |days: usize| fit_window(estimation, days, config);
    let fits: Vec<WindowFit> = if config.parallel {
        windows.par_iter().map(|&d| fit(d)).collect()
    } else {
        windows.iter().map(|&d| fit(d)).collect()
    };

    let mut result = BacktestResult::default();
    for strategy in Strategy::ALL {
        for window in &fits {
            let allocation = match strategy {
                Strategy::MinRisk => &window.min_risk,
                Strategy::MaxEff => &window.max_eff,
                Strategy::Naive => {
                    result.records.push(eval.score(strategy, window.days, &naive));
                    continue;
                }
            };
            if let Ok(a) = allocation {
                if !a.converged {
                    result.non_converged += 1;
                }
                result
                    .records
                    .push(eval.score(strategy, window.days, &a.weights));
            }
        }
    }

    for window in fits {
        for (strategy, outcome) in [
            (Strategy::MinRisk, window.min_risk),
            (Strategy::MaxEff, window.max_eff),
        ] {
            if let Err(error) = outcome {
                tracing::warn!("skipping {} at {} days: {}", strategy, window.days, error);
                result.failures.push(WindowFailure {
                    strategy,
                    days: window.days,
                    error,
                });
            }
        }
    }

    if result.non_converged > 0 {
        tracing::warn!(
            "{} solves hit the iteration budget; their best-effort weights were kept",
            result.non_converged
        );
    }
    tracing::info!(
        "Backtest complete: {} records, {} skipped",
        result.records.len(),
        result.failures.len()
    );

    Ok(result)
}

fn fit_window(estimation: &ReturnSeries, days: usize, config: &BacktestConfig) -> WindowFit {
    let slice = estimation.tail(days);
    let mean = slice.mean();
    let covariance = slice.covariance();

    let min_risk = allocator::minimize_risk(&covariance, days, &config.solver);
    let max_eff = allocator::maximize_sharpe(
        &mean,
        &covariance,
        days,
        config.risk_free_rate,
        &config.solver,
    );
    tracing::debug!(
        days,
        min_risk_converged = min_risk.as_ref().map(|a| a.converged).unwrap_or(false),
        max_eff_converged = max_eff.as_ref().map(|a| a.converged).unwrap_or(false),
        "fitted estimation window"
    );

    WindowFit {
        days,
        min_risk,
        max_eff,
    }
}
