//! Auxiliary value types: arbitrary-precision decimals and integer ranges.

pub mod decimal;
pub mod range;

pub use decimal::{Decimal, DecimalError, MathContext, RoundingMode};
pub use range::{IntRange, IntRangeIter};
