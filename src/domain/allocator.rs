//! Long-only weight allocation on the unit simplex.
//!
//! Both problems are solved by projected gradient descent: a step along the
//! negative gradient is projected back onto `{w : wᵢ >= 0, Σwᵢ = 1}`, with a
//! Barzilai-Borwein step guess and a backtracking line search that keeps the
//! objective monotone. Portfolio variance is convex on the simplex, so
//! `minimize_risk` reaches the global optimum; the negative Sharpe ratio is
//! not, and `maximize_sharpe` may stop at a local one.

use crate::domain::error::MptError;
use crate::domain::risk::{equal_weights, portfolio_risk, sharpe};
use nalgebra::{DMatrix, DVector};
use std::fmt;

const MAX_BACKTRACKS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Objective {
    MinRisk,
    MaxSharpe,
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::MinRisk => write!(f, "min-risk"),
            Objective::MaxSharpe => write!(f, "max-sharpe"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// Iteration budget per start point.
    pub max_iterations: usize,
    /// Largest weight change (max norm) still counted as stationary.
    pub tolerance: f64,
    /// Return the best-effort point when the budget runs out instead of
    /// failing with `OptimizationDidNotConverge`.
    pub accept_non_converged: bool,
    /// Also start from every simplex vertex and keep the best result.
    pub multi_start: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-10,
            accept_non_converged: true,
            multi_start: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub weights: DVector<f64>,
    pub converged: bool,
    pub iterations: usize,
    /// Risk for `MinRisk`, Sharpe ratio for `MaxSharpe`, at `weights`.
    pub value: f64,
}

/// Weights minimizing `portfolio_risk(covariance, periods, w)`.
pub fn minimize_risk(
    covariance: &DMatrix<f64>,
    periods: usize,
    options: &SolverOptions,
) -> Result<Allocation, MptError> {
    let scaled = covariance * periods as f64;
    // Variance shares its minimizer with risk and stays smooth at zero.
    let objective = |w: &DVector<f64>| w.dot(&(&scaled * w));
    let gradient = |w: &DVector<f64>| (&scaled * w) * 2.0;

    let solution = solve(
        Objective::MinRisk,
        covariance.nrows(),
        objective,
        gradient,
        options,
    )?;
    let value = portfolio_risk(covariance, periods, &solution.weights);
    Ok(Allocation { value, ..solution })
}

/// Weights maximizing `sharpe(mean_returns, covariance, periods, rf, w)`.
pub fn maximize_sharpe(
    mean_returns: &DVector<f64>,
    covariance: &DMatrix<f64>,
    periods: usize,
    risk_free_rate: f64,
    options: &SolverOptions,
) -> Result<Allocation, MptError> {
    let p = periods as f64;
    let objective =
        |w: &DVector<f64>| -sharpe(mean_returns, covariance, periods, risk_free_rate, w);
    let gradient = |w: &DVector<f64>| {
        let sigma_w = covariance * w * p;
        let risk = w.dot(&sigma_w).sqrt();
        let excess = mean_returns.dot(w) * p - risk_free_rate;
        // d(-S)/dw = -(p·μ)/σ + excess·(p·Σw)/σ³
        (sigma_w * (excess / risk.powi(3))) - (mean_returns * (p / risk))
    };

    let solution = solve(
        Objective::MaxSharpe,
        covariance.nrows(),
        objective,
        gradient,
        options,
    )?;
    Ok(Allocation {
        value: -solution.value,
        ..solution
    })
}

fn solve<F, G>(
    kind: Objective,
    n: usize,
    objective: F,
    gradient: G,
    options: &SolverOptions,
) -> Result<Allocation, MptError>
where
    F: Fn(&DVector<f64>) -> f64,
    G: Fn(&DVector<f64>) -> DVector<f64>,
{
    if n == 0 {
        return Err(MptError::InsufficientData {
            what: format!("{} allocation", kind),
            rows: 0,
            minimum: 1,
        });
    }
    if n == 1 {
        let weights = DVector::from_element(1, 1.0);
        let value = objective(&weights);
        return Ok(Allocation {
            weights,
            converged: true,
            iterations: 0,
            value,
        });
    }

    let mut best = descend(equal_weights(n), &objective, &gradient, options);
    if options.multi_start {
        for i in 0..n {
            let mut vertex = DVector::zeros(n);
            vertex[i] = 1.0;
            let candidate = descend(vertex, &objective, &gradient, options);
            if candidate.value.is_finite() && !(best.value <= candidate.value) {
                best = candidate;
            }
        }
    }

    if !best.converged {
        if !options.accept_non_converged {
            return Err(MptError::OptimizationDidNotConverge {
                objective: kind,
                iterations: best.iterations,
            });
        }
        tracing::debug!(
            "{} solver stopped after {} iterations without converging; keeping best point",
            kind,
            best.iterations
        );
    }
    Ok(best)
}

/// One projected-gradient run from `start`. `value` is the raw objective.
fn descend<F, G>(start: DVector<f64>, objective: &F, gradient: &G, options: &SolverOptions) -> Allocation
where
    F: Fn(&DVector<f64>) -> f64,
    G: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut w = project_simplex(&start);
    let mut fw = objective(&w);
    let mut g = gradient(&w);
    let mut step = f64::NAN;
    let mut prev: Option<(DVector<f64>, DVector<f64>)> = None;

    if !fw.is_finite() || g.iter().any(|x| !x.is_finite()) {
        return Allocation {
            weights: w,
            converged: false,
            iterations: 0,
            value: fw,
        };
    }

    for iteration in 1..=options.max_iterations {
        let gnorm = g.amax();
        if gnorm == 0.0 {
            return Allocation {
                weights: w,
                converged: true,
                iterations: iteration - 1,
                value: fw,
            };
        }

        step = match &prev {
            Some((s, y)) => {
                let sy = s.dot(y);
                if sy > 0.0 { s.dot(s) / sy } else { step * 2.0 }
            }
            None => 1.0 / gnorm,
        };
        if !step.is_finite() || step <= 0.0 {
            step = 1.0 / gnorm;
        }

        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let candidate = project_simplex(&(&w - &g * step));
            let d = &candidate - &w;
            if d.amax() == 0.0 {
                break;
            }
            let fc = objective(&candidate);
            if fc.is_finite() && fc <= fw + g.dot(&d) + d.norm_squared() / (2.0 * step) {
                accepted = Some((candidate, fc, d));
                break;
            }
            step *= 0.5;
        }

        // No representable decrease left: converged only at a stationary point.
        let Some((candidate, fc, d)) = accepted else {
            let converged = is_stationary(&w, &g, options.tolerance);
            return Allocation {
                weights: w,
                converged,
                iterations: iteration,
                value: fw,
            };
        };

        let g_new = gradient(&candidate);
        if g_new.iter().any(|x| !x.is_finite()) {
            return Allocation {
                weights: candidate,
                converged: false,
                iterations: iteration,
                value: fc,
            };
        }

        let moved = d.amax();
        prev = Some((d, &g_new - &g));
        w = candidate;
        fw = fc;
        g = g_new;

        if moved <= options.tolerance {
            return Allocation {
                weights: w,
                converged: true,
                iterations: iteration,
                value: fw,
            };
        }
    }

    Allocation {
        weights: w,
        converged: false,
        iterations: options.max_iterations,
        value: fw,
    }
}

/// Euclidean projection onto the probability simplex.
/// Projected-gradient residual with a unit step on the normalized gradient.
fn is_stationary(w: &DVector<f64>, g: &DVector<f64>, tolerance: f64) -> bool {
    let gnorm = g.amax();
    if gnorm == 0.0 {
        return true;
    }
    let residual = (project_simplex(&(w - g / gnorm)) - w).amax();
    residual <= tolerance.sqrt()
}

pub fn project_simplex(v: &DVector<f64>) -> DVector<f64> {
    let mut sorted: Vec<f64> = v.iter().copied().collect();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (i, u) in sorted.iter().enumerate() {
        cumulative += u;
        let t = (cumulative - 1.0) / (i + 1) as f64;
        if u - t > 0.0 {
            theta = t;
        }
    }
    v.map(|x| (x - theta).max(0.0))
}
