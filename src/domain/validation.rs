//! Structural checks on an ingested price table.
//!
//! Each check runs independently; a table passes when no issues are found.

use crate::domain::price_matrix::PriceMatrix;
use crate::domain::window::parse_date;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    DatesNotAscending,
    InvalidDateFormat,
    NonNumericValues,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ValidationIssue::DatesNotAscending => "Dates are not in ascending order.",
            ValidationIssue::InvalidDateFormat => "Date format is not valid.",
            ValidationIssue::NonNumericValues => "Some of values are not of int / float type.",
        };
        write!(f, "{}", msg)
    }
}

pub fn validate(matrix: &PriceMatrix) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if matrix.dates.windows(2).any(|w| w[0] >= w[1]) {
        issues.push(ValidationIssue::DatesNotAscending);
    }

    if matrix.dates.iter().any(|d| parse_date(d).is_err()) {
        issues.push(ValidationIssue::InvalidDateFormat);
    }

    if matrix
        .rows
        .iter()
        .any(|row| row.iter().any(|cell| !cell.is_numeric()))
    {
        issues.push(ValidationIssue::NonNumericValues);
    }

    issues
}
