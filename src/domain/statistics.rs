//! Descriptive statistics for return series.
//!
//! `describe` yields the five-number summary block followed by the higher
//! moments, in a fixed display order. Quantiles interpolate linearly between
//! order statistics; kurtosis and skewness use the bias-corrected sample
//! estimators.

use crate::domain::price_matrix::ReturnSeries;
use nalgebra::DMatrix;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Count,
    Mean,
    Std,
    Min,
    Q25,
    Median,
    Q75,
    Max,
    Kurtosis,
    Skewness,
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Measure::Count => "count",
            Measure::Mean => "mean",
            Measure::Std => "std",
            Measure::Min => "min",
            Measure::Q25 => "25%",
            Measure::Median => "50%",
            Measure::Q75 => "75%",
            Measure::Max => "max",
            Measure::Kurtosis => "kurtosis",
            Measure::Skewness => "skewness",
        };
        write!(f, "{}", s)
    }
}

pub fn describe(series: &[f64]) -> Vec<(Measure, f64)> {
    let n = series.len();
    let mut sorted = series.to_vec();
    sorted.sort_by(f64::total_cmp);

    let (min, max) = match (sorted.first(), sorted.last()) {
        (Some(&lo), Some(&hi)) => (lo, hi),
        _ => (f64::NAN, f64::NAN),
    };

    vec![
        (Measure::Count, n as f64),
        (Measure::Mean, mean(series)),
        (Measure::Std, sample_std(series)),
        (Measure::Min, min),
        (Measure::Q25, quantile(&sorted, 0.25)),
        (Measure::Median, quantile(&sorted, 0.5)),
        (Measure::Q75, quantile(&sorted, 0.75)),
        (Measure::Max, max),
        (Measure::Kurtosis, kurtosis(series)),
        (Measure::Skewness, skewness(series)),
    ]
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn sample_std(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return f64::NAN;
    }
    let m = mean(xs);
    let ss: f64 = xs.iter().map(|x| (x - m).powi(2)).sum();
    (ss / (xs.len() - 1) as f64).sqrt()
}

/// Linear interpolation on an ascending slice; NaN when empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Sums of squared, cubed and fourth-power deviations from the mean.
fn central_sums(xs: &[f64]) -> (f64, f64, f64) {
    let m = mean(xs);
    xs.iter().fold((0.0, 0.0, 0.0), |(s2, s3, s4), x| {
        let d = x - m;
        let d2 = d * d;
        (s2 + d2, s3 + d2 * d, s4 + d2 * d2)
    })
}

/// Bias-corrected sample skewness (G1). NaN below 3 observations.
fn skewness(xs: &[f64]) -> f64 {
    let n = xs.len() as f64;
    if xs.len() < 3 {
        return f64::NAN;
    }
    let (s2, s3, _) = central_sums(xs);
    let m2 = s2 / n;
    let m3 = s3 / n;
    if m2 == 0.0 {
        return 0.0;
    }
    (n * (n - 1.0)).sqrt() / (n - 2.0) * m3 / m2.powf(1.5)
}

/// Bias-corrected sample excess kurtosis (G2). NaN below 4 observations.
fn kurtosis(xs: &[f64]) -> f64 {
    let n = xs.len() as f64;
    if xs.len() < 4 {
        return f64::NAN;
    }
    let (s2, _, s4) = central_sums(xs);
    if s2 == 0.0 {
        return 0.0;
    }
    let adj = 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));
    let numer = n * (n + 1.0) * (n - 1.0) * s4;
    let denom = (n - 2.0) * (n - 3.0) * s2 * s2;
    numer / denom - adj
}

/// Pearson correlation between the return columns.
pub fn correlation(series: &ReturnSeries) -> DMatrix<f64> {
    let cov = series.covariance();
    let k = cov.nrows();
    DMatrix::from_fn(k, k, |i, j| {
        if i == j && cov[(i, i)] > 0.0 {
            1.0
        } else {
            cov[(i, j)] / (cov[(i, i)] * cov[(j, j)]).sqrt()
        }
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width bins spanning `[min, max]`; the last bin is closed.
pub fn histogram(series: &[f64], bins: usize) -> Vec<HistogramBin> {
    let finite: Vec<f64> = series.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }
    let lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        return vec![HistogramBin {
            lower: lo,
            upper: hi,
            count: finite.len(),
        }];
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for x in &finite {
        let idx = (((x - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: lo + width * i as f64,
            upper: if i + 1 == bins {
                hi
            } else {
                lo + width * (i + 1) as f64
            },
            count,
        })
        .collect()
}
