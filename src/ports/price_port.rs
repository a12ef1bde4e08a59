//! Price table source port.

use crate::domain::error::MptError;
use crate::domain::price_matrix::PriceMatrix;

pub trait PricePort {
    /// Reads the whole price table (dates × instruments).
    fn load_prices(&self) -> Result<PriceMatrix, MptError>;
}
