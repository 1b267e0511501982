//! Arbitrary-precision decimal arithmetic.
//!
//! A [`Decimal`] is stored as `coefficient * 10^exponent` with a `BigInt`
//! coefficient, following the General Decimal Arithmetic model. Results of
//! arithmetic are rounded to the precision of the governing [`MathContext`];
//! division additionally honors an explicit scale when one is configured.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

/// Rounding mode applied when a result exceeds the context precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum RoundingMode {
    /// Round to nearest, ties to the even neighbor (IEEE 754 default).
    #[default]
    HalfEven,
    /// Round to nearest, ties away from zero.
    HalfUp,
    /// Truncate toward zero.
    Down,
    /// Round away from zero.
    Up,
    /// Round toward negative infinity.
    Floor,
    /// Round toward positive infinity.
    Ceiling,
}

/// Precision and rounding configuration for decimal arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MathContext {
    /// Maximum number of significant digits in a result. Zero means unlimited.
    pub precision: u32,
    pub rounding: RoundingMode,
}

impl Default for MathContext {
    fn default() -> Self {
        // same default magnitude as IEEE 754-2008 decimal128
        Self {
            precision: 34,
            rounding: RoundingMode::HalfEven,
        }
    }
}

/// A finite decimal number with arbitrary precision.
#[derive(Debug, Clone)]
pub struct Decimal {
    coefficient: BigInt,
    /// Power of ten; negative exponents place digits after the decimal point.
    exponent: i32,
}

impl Decimal {
    #[must_use]
    pub fn new(coefficient: BigInt, exponent: i32) -> Self {
        Self { coefficient, exponent }
    }

    #[must_use]
    pub fn zero() -> Self {
        Self::new(BigInt::zero(), 0)
    }

    #[must_use]
    pub fn from_i64(v: i64) -> Self {
        Self::new(BigInt::from(v), 0)
    }

    #[must_use]
    pub fn from_bigint(v: BigInt) -> Self {
        Self::new(v, 0)
    }

    /// Converts a finite float through its shortest decimal representation.
    /// Returns `None` for NaN and infinities.
    #[must_use]
    pub fn try_from_f64(v: f64) -> Option<Self> {
        if !v.is_finite() {
            return None;
        }
        // the shortest round-tripping form keeps user-visible digits exact
        Self::from_str(&format!("{v}")).ok()
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.coefficient.is_zero()
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.coefficient.is_negative()
    }

    /// Number of digits after the decimal point (never negative).
    #[must_use]
    pub fn scale(&self) -> u32 {
        if self.exponent < 0 { self.exponent.unsigned_abs() } else { 0 }
    }

    #[must_use]
    pub fn neg(&self) -> Self {
        Self::new(-self.coefficient.clone(), self.exponent)
    }

    #[must_use]
    pub fn abs(&self) -> Self {
        Self::new(self.coefficient.abs(), self.exponent)
    }

    /// Strips trailing zero digits from the coefficient, raising the exponent.
    #[must_use]
    pub fn normalized(&self) -> Self {
        if self.coefficient.is_zero() {
            return Self::zero();
        }
        let mut coefficient = self.coefficient.clone();
        let mut exponent = self.exponent;
        let ten = BigInt::from(10);
        loop {
            let (q, r) = coefficient.div_rem(&ten);
            if r.is_zero() {
                coefficient = q;
                exponent += 1;
            } else {
                break;
            }
        }
        Self::new(coefficient, exponent)
    }

    /// Aligns two decimals to a common (minimum) exponent.
    fn aligned(&self, other: &Self) -> (BigInt, BigInt, i32) {
        let exponent = self.exponent.min(other.exponent);
        let a = rescale(&self.coefficient, self.exponent, exponent);
        let b = rescale(&other.coefficient, other.exponent, exponent);
        (a, b, exponent)
    }

    #[must_use]
    pub fn add(&self, other: &Self, ctx: MathContext) -> Self {
        let (a, b, exponent) = self.aligned(other);
        Self::new(a + b, exponent).rounded(ctx)
    }

    #[must_use]
    pub fn sub(&self, other: &Self, ctx: MathContext) -> Self {
        let (a, b, exponent) = self.aligned(other);
        Self::new(a - b, exponent).rounded(ctx)
    }

    #[must_use]
    pub fn mul(&self, other: &Self, ctx: MathContext) -> Self {
        Self::new(
            &self.coefficient * &other.coefficient,
            self.exponent.saturating_add(other.exponent),
        )
        .rounded(ctx)
    }

    /// Division carried out to `scale` fractional digits when given, otherwise
    /// to the context precision, with the context rounding mode.
    pub fn div(&self, other: &Self, ctx: MathContext, scale: Option<u32>) -> Result<Self, DecimalError> {
        if other.is_zero() {
            return Err(DecimalError::DivisionByZero);
        }
        let digits = scale.unwrap_or_else(|| if ctx.precision == 0 { 34 } else { ctx.precision });
        // compute (a / b) * 10^digits, then round the integer quotient
        let (a, b, _) = self.aligned(other);
        let shifted = a * pow10(digits);
        let (q, r) = shifted.div_rem(&b);
        let q = round_quotient(q, &r, &b, ctx.rounding);
        Ok(Self::new(q, -(digits as i32)).rounded(ctx))
    }

    /// Remainder with the sign of the dividend, matching integer `%`.
    pub fn rem(&self, other: &Self, ctx: MathContext) -> Result<Self, DecimalError> {
        if other.is_zero() {
            return Err(DecimalError::DivisionByZero);
        }
        let (a, b, exponent) = self.aligned(other);
        let (_, r) = a.div_rem(&b);
        Ok(Self::new(r, exponent).rounded(ctx))
    }

    /// Rounds to at most `ctx.precision` significant digits.
    #[must_use]
    fn rounded(self, ctx: MathContext) -> Self {
        if ctx.precision == 0 {
            return self;
        }
        let digits = decimal_digits(&self.coefficient);
        if digits <= ctx.precision {
            return self;
        }
        let drop = digits - ctx.precision;
        let divisor = pow10(drop);
        let (q, r) = self.coefficient.div_rem(&divisor);
        let q = round_quotient(q, &r, &divisor, ctx.rounding);
        Self::new(q, self.exponent.saturating_add(drop as i32))
    }

    /// Lossy conversion for mixed float/decimal comparison.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        let coefficient = self.coefficient.to_f64().unwrap_or(f64::NAN);
        coefficient * 10f64.powi(self.exponent)
    }

    /// Exact integer value, if this decimal has no fractional part.
    #[must_use]
    pub fn to_bigint_exact(&self) -> Option<BigInt> {
        let norm = self.normalized();
        if norm.exponent >= 0 {
            Some(norm.coefficient * pow10(norm.exponent as u32))
        } else {
            None
        }
    }

    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        let (a, b, _) = self.aligned(other);
        a.cmp(&b)
    }
}

fn rescale(coefficient: &BigInt, from: i32, to: i32) -> BigInt {
    debug_assert!(from >= to);
    coefficient * pow10((from - to) as u32)
}

fn pow10(digits: u32) -> BigInt {
    BigInt::from(10).pow(digits)
}

fn decimal_digits(v: &BigInt) -> u32 {
    if v.is_zero() {
        return 1;
    }
    v.abs().to_str_radix(10).len() as u32
}

/// Adjusts a truncated quotient `q` (remainder `r`, divisor `d`) per `mode`.
fn round_quotient(q: BigInt, r: &BigInt, d: &BigInt, mode: RoundingMode) -> BigInt {
    if r.is_zero() {
        return q;
    }
    let negative = r.is_negative() != d.is_negative();
    let bump = |q: BigInt| if negative { q - 1 } else { q + 1 };
    let twice: BigInt = r.abs() * 2;
    let d_abs = d.abs();
    match mode {
        RoundingMode::Down => q,
        RoundingMode::Up => bump(q),
        RoundingMode::Floor => {
            if negative {
                q - 1
            } else {
                q
            }
        }
        RoundingMode::Ceiling => {
            if negative {
                q
            } else {
                q + 1
            }
        }
        RoundingMode::HalfUp => {
            if twice >= d_abs {
                bump(q)
            } else {
                q
            }
        }
        RoundingMode::HalfEven => match twice.cmp(&d_abs) {
            Ordering::Less => q,
            Ordering::Greater => bump(q),
            Ordering::Equal => {
                if q.is_odd() {
                    bump(q)
                } else {
                    q
                }
            }
        },
    }
}

/// Failures specific to decimal computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecimalError {
    #[error("decimal division by zero")]
    DivisionByZero,
    #[error("invalid decimal literal")]
    InvalidLiteral,
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DecimalError::InvalidLiteral);
        }
        let (mantissa, exp_part) = match s.find(['e', 'E']) {
            Some(pos) => {
                let exp: i32 = s[pos + 1..].parse().map_err(|_| DecimalError::InvalidLiteral)?;
                (&s[..pos], exp)
            }
            None => (s, 0),
        };
        let (int_part, frac_part) = match mantissa.find('.') {
            Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
            None => (mantissa, ""),
        };
        let mut digits = String::with_capacity(int_part.len() + frac_part.len());
        digits.push_str(int_part);
        digits.push_str(frac_part);
        if digits.is_empty() || digits == "-" || digits == "+" {
            return Err(DecimalError::InvalidLiteral);
        }
        let coefficient = BigInt::from_str(&digits).map_err(|_| DecimalError::InvalidLiteral)?;
        let exponent = exp_part
            .checked_sub(frac_part.len() as i32)
            .ok_or(DecimalError::InvalidLiteral)?;
        Ok(Self::new(coefficient, exponent))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exponent >= 0 {
            let value = &self.coefficient * pow10(self.exponent as u32);
            return write!(f, "{value}");
        }
        let scale = self.exponent.unsigned_abs() as usize;
        let digits = self.coefficient.abs().to_str_radix(10);
        let sign = if self.coefficient.is_negative() { "-" } else { "" };
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{sign}{int_part}.{frac_part}")
        } else {
            write!(f, "{sign}0.{zeros}{digits}", zeros = "0".repeat(scale - digits.len()))
        }
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl Hash for Decimal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let norm = self.normalized();
        norm.coefficient.hash(state);
        norm.exponent.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parse_and_display_round_trip() {
        assert_eq!(dec("12.345").to_string(), "12.345");
        assert_eq!(dec("-0.007").to_string(), "-0.007");
        assert_eq!(dec("1e3").to_string(), "1000");
        assert_eq!(dec("2.5e-2").to_string(), "0.025");
    }

    #[test]
    fn trailing_zeros_compare_equal_but_display_distinct() {
        assert_eq!(dec("1.10"), dec("1.1"));
        assert_eq!(dec("1.10").to_string(), "1.10");
    }

    #[test]
    fn add_aligns_exponents() {
        let ctx = MathContext::default();
        assert_eq!(dec("0.1").add(&dec("0.02"), ctx), dec("0.12"));
    }

    #[test]
    fn div_honors_scale_and_rounding() {
        let ctx = MathContext {
            precision: 34,
            rounding: RoundingMode::HalfUp,
        };
        let q = dec("1").div(&dec("3"), ctx, Some(4)).unwrap();
        assert_eq!(q.to_string(), "0.3333");
        let q = dec("2").div(&dec("3"), ctx, Some(4)).unwrap();
        assert_eq!(q.to_string(), "0.6667");
    }

    #[test]
    fn div_by_zero_is_an_error() {
        let ctx = MathContext::default();
        assert_eq!(
            dec("1").div(&Decimal::zero(), ctx, None),
            Err(DecimalError::DivisionByZero)
        );
    }

    #[test]
    fn half_even_breaks_ties_to_even() {
        let ctx = MathContext {
            precision: 2,
            rounding: RoundingMode::HalfEven,
        };
        // 0.125 rounded to two significant digits: 0.12 (ties to even)
        let v = dec("0.125").rounded(ctx);
        assert_eq!(v.to_string(), "0.12");
    }

    #[test]
    fn exact_integer_extraction() {
        assert_eq!(dec("42.00").to_bigint_exact(), Some(BigInt::from(42)));
        assert_eq!(dec("1e2").to_bigint_exact(), Some(BigInt::from(100)));
        assert_eq!(dec("0.5").to_bigint_exact(), None);
    }
}
