//! Uniform arithmetic, coercion and comparison over [`Value`] operands.
//!
//! Every binary operator in the language funnels through one method on
//! [`Arithmetic`], chosen by the runtime tags of the two operands. The
//! numeric promotion lattice runs byte → short → int → long → float →
//! double → bigint → decimal; a result is narrowed back to the shared
//! operand width when it fits and promoted to the next width that holds it
//! when it does not (`long` overflow promotes to bigint).
//!
//! The null policy is governed by `strict`: under strict arithmetic a null
//! operand to any numeric operation is an error; otherwise null coerces to
//! the zero of the result type. Bitwise operations always coerce null to
//! zero, and equality treats null as an ordinary comparable value.

use std::sync::Arc;

use ahash::AHashMap;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;

use crate::{
    introspect::ClassRegistry,
    types::{Decimal, IntRange, MathContext},
    value::{partial_compare, ListRef, MapRef, SetRef, Value},
};

/// Compiled patterns for `=~`, shared process-wide. Bounded by eviction of
/// an arbitrary entry once the cap is reached; scripts rarely use more
/// than a handful of distinct patterns.
static REGEX_CACHE: Lazy<Mutex<AHashMap<String, Arc<Regex>>>> = Lazy::new(|| Mutex::new(AHashMap::new()));

const REGEX_CACHE_CAP: usize = 256;

fn cached_full_match_regex(pattern: &str) -> Result<Arc<Regex>, String> {
    if let Some(re) = REGEX_CACHE.lock().get(pattern) {
        return Ok(Arc::clone(re));
    }
    // the operator is a full match, not a search
    let re = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| format!("invalid pattern: {e}"))?;
    let re = Arc::new(re);
    let mut cache = REGEX_CACHE.lock();
    if cache.len() >= REGEX_CACHE_CAP {
        if let Some(evict) = cache.keys().next().cloned() {
            cache.remove(&evict);
        }
    }
    cache.insert(pattern.to_owned(), Arc::clone(&re));
    Ok(re)
}

/// Operation failure rendered as a message; the interpreter attaches the
/// span and wraps it into an `ArithmeticError`.
pub(crate) type ArithResult<T> = Result<T, String>;

/// Width ranks along the promotion lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Big,
    Dec,
}

/// A numeric operand after coercion, paired with its lattice rank.
#[derive(Debug, Clone)]
enum Operand {
    Int(i64, Rank),
    Float(f64, Rank),
    Big(BigInt),
    Dec(Decimal),
}

impl Operand {
    fn rank(&self) -> Rank {
        match self {
            Self::Int(_, r) | Self::Float(_, r) => *r,
            Self::Big(_) => Rank::Big,
            Self::Dec(_) => Rank::Dec,
        }
    }
}

/// The arithmetic configuration for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Arithmetic {
    /// Strict null policy: null numeric operands fail instead of zeroing.
    pub strict: bool,
    pub math_context: MathContext,
    /// Fractional digits for decimal division; `None` means context
    /// precision governs.
    pub math_scale: Option<u32>,
}

impl Default for Arithmetic {
    fn default() -> Self {
        Self {
            strict: true,
            math_context: MathContext::default(),
            math_scale: None,
        }
    }
}

impl Arithmetic {
    /// Addition, or string concatenation when either operand is a string.
    pub fn add(&self, lhs: &Value, rhs: &Value) -> ArithResult<Value> {
        if matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_)) {
            let mut out = lhs.to_display_string();
            out.push_str(&rhs.to_display_string());
            return Ok(Value::Str(Arc::from(out.as_str())));
        }
        self.numeric_binary(lhs, rhs, "+", |a, b, ctx| match (a, b) {
            (Operand::Int(x, r), Operand::Int(y, s)) => Ok(int_result(x.checked_add(y), r.max(s), BigInt::from(x) + y)),
            (a, b) => float_or_wide(a, b, ctx, |x, y| x + y, |x, y| x + y, |x, y, c| x.add(&y, c)),
        })
    }

    pub fn subtract(&self, lhs: &Value, rhs: &Value) -> ArithResult<Value> {
        self.numeric_binary(lhs, rhs, "-", |a, b, ctx| match (a, b) {
            (Operand::Int(x, r), Operand::Int(y, s)) => Ok(int_result(x.checked_sub(y), r.max(s), BigInt::from(x) - y)),
            (a, b) => float_or_wide(a, b, ctx, |x, y| x - y, |x, y| x - y, |x, y, c| x.sub(&y, c)),
        })
    }

    pub fn multiply(&self, lhs: &Value, rhs: &Value) -> ArithResult<Value> {
        self.numeric_binary(lhs, rhs, "*", |a, b, ctx| match (a, b) {
            (Operand::Int(x, r), Operand::Int(y, s)) => Ok(int_result(x.checked_mul(y), r.max(s), BigInt::from(x) * y)),
            (a, b) => float_or_wide(a, b, ctx, |x, y| x * y, |x, y| x * y, |x, y, c| x.mul(&y, c)),
        })
    }

    /// Division. `int / int` stays integral when the quotient is exact and
    /// promotes to floating otherwise; a zero divisor is an error under
    /// strict arithmetic and yields zero under lenient.
    pub fn divide(&self, lhs: &Value, rhs: &Value) -> ArithResult<Value> {
        let scale = self.math_scale;
        let strict = self.strict;
        self.numeric_binary(lhs, rhs, "/", move |a, b, ctx| match (a, b) {
            (Operand::Int(x, r), Operand::Int(y, s)) => {
                if y == 0 {
                    return if strict {
                        Err("division by zero".to_owned())
                    } else {
                        Ok(narrow_int(0, r.max(s)))
                    };
                }
                if x % y == 0 {
                    Ok(narrow_int(x / y, r.max(s)))
                } else {
                    Ok(Value::F64(x as f64 / y as f64))
                }
            }
            (a, b) => {
                let wide = a.rank().max(b.rank());
                match wide {
                    Rank::Dec => {
                        let (x, y) = (to_decimal(a)?, to_decimal(b)?);
                        if y.is_zero() {
                            return if strict {
                                Err("division by zero".to_owned())
                            } else {
                                Ok(Value::decimal(Decimal::zero()))
                            };
                        }
                        x.div(&y, ctx, scale).map(Value::decimal).map_err(|e| e.to_string())
                    }
                    Rank::Big => {
                        let (x, y) = (to_bigint_wide(a)?, to_bigint_wide(b)?);
                        if y.is_zero() {
                            return if strict {
                                Err("division by zero".to_owned())
                            } else {
                                Ok(Value::big(BigInt::zero()))
                            };
                        }
                        if (&x % &y).is_zero() {
                            Ok(Value::big(x / y))
                        } else {
                            let q = Decimal::from_bigint(x)
                                .div(&Decimal::from_bigint(y), ctx, scale)
                                .map_err(|e| e.to_string())?;
                            Ok(Value::decimal(q))
                        }
                    }
                    _ => {
                        let (x, y) = (to_f64(&a), to_f64(&b));
                        if y == 0.0 && strict {
                            return Err("division by zero".to_owned());
                        }
                        Ok(float_value(x / y, wide))
                    }
                }
            }
        })
    }

    /// Remainder, with the divisor-zero policy of [`Arithmetic::divide`].
    pub fn modulo(&self, lhs: &Value, rhs: &Value) -> ArithResult<Value> {
        let strict = self.strict;
        self.numeric_binary(lhs, rhs, "%", move |a, b, ctx| match (a, b) {
            (Operand::Int(x, r), Operand::Int(y, s)) => {
                if y == 0 {
                    return if strict {
                        Err("modulo by zero".to_owned())
                    } else {
                        Ok(narrow_int(0, r.max(s)))
                    };
                }
                Ok(narrow_int(x % y, r.max(s)))
            }
            (a, b) => {
                let wide = a.rank().max(b.rank());
                match wide {
                    Rank::Dec => {
                        let (x, y) = (to_decimal(a)?, to_decimal(b)?);
                        if y.is_zero() {
                            return if strict {
                                Err("modulo by zero".to_owned())
                            } else {
                                Ok(Value::decimal(Decimal::zero()))
                            };
                        }
                        x.rem(&y, ctx).map(Value::decimal).map_err(|e| e.to_string())
                    }
                    Rank::Big => {
                        let (x, y) = (to_bigint_wide(a)?, to_bigint_wide(b)?);
                        if y.is_zero() {
                            return if strict {
                                Err("modulo by zero".to_owned())
                            } else {
                                Ok(Value::big(BigInt::zero()))
                            };
                        }
                        Ok(Value::big(x % y))
                    }
                    _ => {
                        let (x, y) = (to_f64(&a), to_f64(&b));
                        if y == 0.0 && strict {
                            return Err("modulo by zero".to_owned());
                        }
                        Ok(float_value(x % y, wide))
                    }
                }
            }
        })
    }

    /// Unary minus, preserving operand width; overflow promotes.
    pub fn negate(&self, operand: &Value) -> ArithResult<Value> {
        let op = self.coerce_numeric(operand, "-")?;
        Ok(match op {
            Operand::Int(x, r) => match x.checked_neg() {
                Some(v) => narrow_int(v, r),
                None => Value::big(-BigInt::from(x)),
            },
            Operand::Float(x, r) => float_value(-x, r),
            Operand::Big(x) => Value::big(-x),
            Operand::Dec(x) => Value::decimal(x.neg()),
        })
    }

    /// Value equality. Boolean/string pairs compare through the string form,
    /// string/number pairs compare numerically when the string parses, and
    /// everything else uses deep structural equality.
    #[must_use]
    pub fn equals(&self, lhs: &Value, rhs: &Value) -> bool {
        match (lhs, rhs) {
            (Value::Str(s), Value::Bool(b)) | (Value::Bool(b), Value::Str(s)) => {
                s.eq_ignore_ascii_case(if *b { "true" } else { "false" })
            }
            (Value::Str(s), v) | (v, Value::Str(s)) if v.is_numeric() => {
                match parse_numeric_str(s) {
                    Ok(parsed) => parsed.deep_eq(v),
                    Err(_) => false,
                }
            }
            _ => lhs.deep_eq(rhs),
        }
    }

    /// Ordered comparison for `< <= > >=`.
    pub fn compare(&self, lhs: &Value, rhs: &Value, op: &str) -> ArithResult<std::cmp::Ordering> {
        if lhs.is_null() || rhs.is_null() {
            if self.strict {
                return Err(format!("null operand to '{op}'"));
            }
            let l = if lhs.is_null() { &Value::I32(0) } else { lhs };
            let r = if rhs.is_null() { &Value::I32(0) } else { rhs };
            return self.compare(l, r, op);
        }
        // coerce a lone string against a number
        let coerced;
        let (lhs, rhs) = match (lhs, rhs) {
            (Value::Str(s), v) if v.is_numeric() => {
                coerced = parse_numeric_str(s)?;
                (&coerced, v)
            }
            (v, Value::Str(s)) if v.is_numeric() => {
                coerced = parse_numeric_str(s)?;
                (v, &coerced)
            }
            pair => pair,
        };
        partial_compare(lhs, rhs)
            .ok_or_else(|| format!("cannot compare {} {op} {}", lhs.type_name(), rhs.type_name()))
    }

    /// Bitwise operations work on 64-bit signed integers; null coerces to
    /// zero regardless of the strict setting.
    pub fn bitwise(&self, lhs: &Value, rhs: &Value, op: BitwiseOp) -> ArithResult<Value> {
        let x = self.to_bits(lhs)?;
        let y = self.to_bits(rhs)?;
        Ok(Value::I64(match op {
            BitwiseOp::And => x & y,
            BitwiseOp::Or => x | y,
            BitwiseOp::Xor => x ^ y,
            BitwiseOp::Shl => x.wrapping_shl(y as u32 & 63),
            BitwiseOp::Shr => x.wrapping_shr(y as u32 & 63),
            BitwiseOp::Ushr => ((x as u64).wrapping_shr(y as u32 & 63)) as i64,
        }))
    }

    pub fn bit_not(&self, operand: &Value) -> ArithResult<Value> {
        Ok(Value::I64(!self.to_bits(operand)?))
    }

    /// `=~`: regex full-match when the right side is a string, otherwise
    /// membership in a collection, map key set or range.
    pub fn matches(&self, lhs: &Value, rhs: &Value) -> ArithResult<bool> {
        match rhs {
            Value::Str(pattern) => {
                let re = cached_full_match_regex(pattern)?;
                Ok(re.is_match(&lhs.to_display_string()))
            }
            Value::List(list) => Ok(list.snapshot().iter().any(|v| self.equals(v, lhs))),
            Value::Set(set) => Ok(set.contains(lhs)),
            Value::Map(map) => Ok(map.contains_key(lhs)),
            Value::Range(range) => match integer_of(lhs) {
                Some(v) => Ok(range.contains(v)),
                None => Ok(false),
            },
            _ => Err(format!("cannot match against {}", rhs.type_name())),
        }
    }

    pub fn starts_with(&self, lhs: &Value, rhs: &Value) -> ArithResult<bool> {
        match (lhs, rhs) {
            (Value::Null, _) | (_, Value::Null) => Ok(false),
            _ => Ok(lhs.to_display_string().starts_with(&rhs.to_display_string())),
        }
    }

    pub fn ends_with(&self, lhs: &Value, rhs: &Value) -> ArithResult<bool> {
        match (lhs, rhs) {
            (Value::Null, _) | (_, Value::Null) => Ok(false),
            _ => Ok(lhs.to_display_string().ends_with(&rhs.to_display_string())),
        }
    }

    /// Builds the inclusive range for `a .. b`.
    pub fn range(&self, lhs: &Value, rhs: &Value) -> ArithResult<Value> {
        let from = integer_of(lhs).ok_or_else(|| format!("range bound must be an integer, got {}", lhs.type_name()))?;
        let to = integer_of(rhs).ok_or_else(|| format!("range bound must be an integer, got {}", rhs.type_name()))?;
        Ok(Value::Range(IntRange::new(from, to)))
    }

    /// Coerces for typed declarations and storage narrowing.
    pub fn to_i64(&self, v: &Value) -> ArithResult<i64> {
        match self.coerce_numeric(v, "int coercion")? {
            Operand::Int(x, _) => Ok(x),
            Operand::Float(x, _) => Ok(x as i64),
            Operand::Big(x) => x.to_i64().ok_or_else(|| "bigint out of long range".to_owned()),
            Operand::Dec(x) => x
                .to_bigint_exact()
                .and_then(|b| b.to_i64())
                .ok_or_else(|| "decimal out of long range".to_owned()),
        }
    }

    pub fn to_f64(&self, v: &Value) -> ArithResult<f64> {
        match self.coerce_numeric(v, "float coercion")? {
            Operand::Int(x, _) => Ok(x as f64),
            Operand::Float(x, _) => Ok(x),
            Operand::Big(x) => Ok(x.to_f64().unwrap_or(f64::INFINITY)),
            Operand::Dec(x) => Ok(x.to_f64()),
        }
    }

    fn to_bits(&self, v: &Value) -> ArithResult<i64> {
        match v {
            Value::Null => Ok(0),
            Value::Bool(b) => Ok(i64::from(*b)),
            _ => self.to_i64(v),
        }
    }

    /// Shared numeric path: coerce both operands, delegate to `op`.
    fn numeric_binary(
        &self,
        lhs: &Value,
        rhs: &Value,
        name: &str,
        op: impl FnOnce(Operand, Operand, MathContext) -> ArithResult<Value>,
    ) -> ArithResult<Value> {
        let a = self.coerce_numeric(lhs, name)?;
        let b = self.coerce_numeric(rhs, name)?;
        // lift both operands to the wider corner of the lattice
        let wide = a.rank().max(b.rank());
        let mut a = lift(a, wide)?;
        let mut b = lift(b, wide)?;
        // a fractional float lifted to the bigint rank lands on decimal;
        // re-align the other operand in that case
        let realigned = a.rank().max(b.rank());
        if realigned != wide {
            a = lift(a, realigned)?;
            b = lift(b, realigned)?;
        }
        op(a, b, self.math_context)
    }

    /// Tags a value as a numeric operand, applying string/bool/char/null
    /// coercions.
    fn coerce_numeric(&self, v: &Value, op: &str) -> ArithResult<Operand> {
        match v {
            Value::Null => {
                if self.strict {
                    Err(format!("null operand to '{op}'"))
                } else {
                    Ok(Operand::Int(0, Rank::I32))
                }
            }
            Value::Bool(b) => Ok(Operand::Int(i64::from(*b), Rank::I32)),
            Value::Char(c) => Ok(Operand::Int(i64::from(u32::from(*c)), Rank::I32)),
            Value::I8(x) => Ok(Operand::Int(i64::from(*x), Rank::I8)),
            Value::I16(x) => Ok(Operand::Int(i64::from(*x), Rank::I16)),
            Value::I32(x) => Ok(Operand::Int(i64::from(*x), Rank::I32)),
            Value::I64(x) => Ok(Operand::Int(*x, Rank::I64)),
            Value::F32(x) => Ok(Operand::Float(f64::from(*x), Rank::F32)),
            Value::F64(x) => Ok(Operand::Float(*x, Rank::F64)),
            Value::BigInt(x) => Ok(Operand::Big((**x).clone())),
            Value::Decimal(x) => Ok(Operand::Dec((**x).clone())),
            Value::Str(s) => match parse_numeric_str(s) {
                Ok(parsed) => self.coerce_numeric(&parsed, op),
                Err(e) => Err(e),
            },
            other => Err(format!("cannot coerce {} for '{op}'", other.type_name())),
        }
    }

    /// Literal builder for `[a, b, c]`; `sequence` marks a trailing ellipsis.
    #[must_use]
    pub fn array_builder(&self, immutable: bool, sequence: bool) -> ArrayBuilder {
        ArrayBuilder {
            items: Vec::new(),
            immutable,
            sequence,
        }
    }

    #[must_use]
    pub fn set_builder(&self, immutable: bool) -> SetBuilder {
        SetBuilder {
            items: Vec::new(),
            immutable,
        }
    }

    #[must_use]
    pub fn map_builder(&self, immutable: bool) -> MapBuilder {
        MapBuilder {
            pairs: Vec::new(),
            immutable,
        }
    }
}

/// Bitwise operator selector for [`Arithmetic::bitwise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
}

/// Accumulates array-literal entries; `create` materializes a fresh list
/// and computes the common-ancestor element class over non-null entries.
pub struct ArrayBuilder {
    items: Vec<Value>,
    immutable: bool,
    sequence: bool,
}

impl ArrayBuilder {
    pub fn add(&mut self, value: Value) {
        self.items.push(value);
    }

    #[must_use]
    pub fn create(self, registry: &ClassRegistry) -> Value {
        let element_class = if self.sequence {
            None
        } else {
            common_ancestor(&self.items, registry)
        };
        let list = if self.immutable {
            ListRef::immutable(self.items)
        } else {
            ListRef::new(self.items)
        };
        list.set_element_class(element_class);
        Value::List(list)
    }
}

pub struct SetBuilder {
    items: Vec<Value>,
    immutable: bool,
}

impl SetBuilder {
    pub fn add(&mut self, value: Value) {
        self.items.push(value);
    }

    #[must_use]
    pub fn create(self) -> Value {
        Value::Set(if self.immutable {
            SetRef::immutable(self.items)
        } else {
            SetRef::new(self.items)
        })
    }
}

pub struct MapBuilder {
    pairs: Vec<(Value, Value)>,
    immutable: bool,
}

impl MapBuilder {
    pub fn put(&mut self, key: Value, value: Value) {
        self.pairs.push((key, value));
    }

    #[must_use]
    pub fn create(self) -> Value {
        Value::Map(if self.immutable {
            MapRef::immutable(self.pairs)
        } else {
            MapRef::new(self.pairs)
        })
    }
}

/// Intersects the supertype chains of every non-null entry and picks the
/// first common name. Nulls contribute no constraint; a root-object result
/// types the array loosely (`None`).
fn common_ancestor(items: &[Value], registry: &ClassRegistry) -> Option<Arc<str>> {
    let mut common: Option<Vec<Arc<str>>> = None;
    for item in items {
        if item.is_null() {
            continue;
        }
        let chain = type_chain(item, registry);
        common = Some(match common {
            None => chain,
            Some(prev) => prev.into_iter().filter(|t| chain.contains(t)).collect(),
        });
    }
    let first = common?.into_iter().next()?;
    if first.as_ref() == ClassRegistry::ROOT_CLASS {
        None
    } else {
        Some(first)
    }
}

/// Own type first, then supertypes in declaration order (subclasses before
/// superclasses, classes before interfaces), ending at the root.
fn type_chain(v: &Value, registry: &ClassRegistry) -> Vec<Arc<str>> {
    match v {
        Value::Object(obj) => {
            let mut chain = registry.ancestry(obj.class_name());
            chain.push(Arc::from(ClassRegistry::ROOT_CLASS));
            chain
        }
        other => vec![Arc::from(other.type_name()), Arc::from(ClassRegistry::ROOT_CLASS)],
    }
}

// ---- numeric helpers ----

/// Narrows an i64 back to the given width when it fits, otherwise promotes
/// to the next width that holds it.
fn narrow_int(v: i64, rank: Rank) -> Value {
    match rank {
        Rank::I8 => {
            if let Ok(x) = i8::try_from(v) {
                return Value::I8(x);
            }
            narrow_int(v, Rank::I16)
        }
        Rank::I16 => {
            if let Ok(x) = i16::try_from(v) {
                return Value::I16(x);
            }
            narrow_int(v, Rank::I32)
        }
        Rank::I32 => {
            if let Ok(x) = i32::try_from(v) {
                return Value::I32(x);
            }
            Value::I64(v)
        }
        _ => Value::I64(v),
    }
}

/// Integer result with overflow promotion to bigint.
fn int_result(checked: Option<i64>, rank: Rank, wide: BigInt) -> Value {
    match checked {
        Some(v) => narrow_int(v, rank),
        None => Value::big(wide),
    }
}

fn float_value(v: f64, rank: Rank) -> Value {
    if rank <= Rank::F32 {
        Value::F32(v as f32)
    } else {
        Value::F64(v)
    }
}

/// Applies the op at the wider operand's corner of the lattice. Both
/// operands have already been lifted to the same rank.
fn float_or_wide(
    a: Operand,
    b: Operand,
    ctx: MathContext,
    ff: impl FnOnce(f64, f64) -> f64,
    bf: impl FnOnce(BigInt, BigInt) -> BigInt,
    df: impl FnOnce(Decimal, Decimal, MathContext) -> Decimal,
) -> ArithResult<Value> {
    match (a, b) {
        (Operand::Dec(x), Operand::Dec(y)) => Ok(Value::decimal(df(x, y, ctx))),
        (Operand::Big(x), Operand::Big(y)) => Ok(Value::big(bf(x, y))),
        (Operand::Float(x, r), Operand::Float(y, s)) => Ok(float_value(ff(x, y), r.max(s))),
        (a, b) => {
            let wide = a.rank().max(b.rank());
            let (x, y) = (to_f64(&a), to_f64(&b));
            Ok(float_value(ff(x, y), wide))
        }
    }
}

/// Lifts an operand to the target rank. Fractional floats meeting the
/// bigint rank promote once more to decimal so no digits are lost.
fn lift(op: Operand, target: Rank) -> ArithResult<Operand> {
    match target {
        Rank::Dec => Ok(Operand::Dec(to_decimal(op)?)),
        Rank::Big => match op {
            Operand::Float(x, _) if x.fract() != 0.0 => Decimal::try_from_f64(x)
                .map(Operand::Dec)
                .ok_or_else(|| "cannot widen non-finite float".to_owned()),
            other => to_bigint_wide(other).map(Operand::Big),
        },
        Rank::F32 | Rank::F64 => Ok(match op {
            Operand::Int(x, _) => Operand::Float(x as f64, target),
            Operand::Float(x, _) => Operand::Float(x, target),
            other => other,
        }),
        _ => Ok(op),
    }
}

fn to_f64(op: &Operand) -> f64 {
    match op {
        Operand::Int(x, _) => *x as f64,
        Operand::Float(x, _) => *x,
        Operand::Big(x) => x.to_f64().unwrap_or(f64::INFINITY),
        Operand::Dec(x) => x.to_f64(),
    }
}

fn to_bigint_wide(op: Operand) -> ArithResult<BigInt> {
    match op {
        Operand::Int(x, _) => Ok(BigInt::from(x)),
        Operand::Float(x, _) => {
            if x.is_finite() {
                Ok(BigInt::from_f64(x.trunc()).unwrap_or_default())
            } else {
                Err("cannot widen non-finite float".to_owned())
            }
        }
        Operand::Big(x) => Ok(x),
        Operand::Dec(x) => x.to_bigint_exact().ok_or_else(|| "decimal is not integral".to_owned()),
    }
}

fn to_decimal(op: Operand) -> ArithResult<Decimal> {
    match op {
        Operand::Int(x, _) => Ok(Decimal::from_i64(x)),
        Operand::Float(x, _) => Decimal::try_from_f64(x).ok_or_else(|| "cannot widen non-finite float".to_owned()),
        Operand::Big(x) => Ok(Decimal::from_bigint(x)),
        Operand::Dec(x) => Ok(x),
    }
}

/// Exact integer content of a value, for range bounds and membership.
fn integer_of(v: &Value) -> Option<i64> {
    match v {
        Value::I8(x) => Some(i64::from(*x)),
        Value::I16(x) => Some(i64::from(*x)),
        Value::I32(x) => Some(i64::from(*x)),
        Value::I64(x) => Some(*x),
        Value::BigInt(x) => x.to_i64(),
        Value::F32(x) if x.fract() == 0.0 => Some(f64::from(*x) as i64),
        Value::F64(x) if x.fract() == 0.0 => Some(*x as i64),
        Value::Char(c) => Some(i64::from(u32::from(*c))),
        _ => None,
    }
}

/// Parses a string operand: decimal/scientific forms coerce to double,
/// integer forms to int/long depending on size.
fn parse_numeric_str(s: &str) -> ArithResult<Value> {
    let t = s.trim();
    if t.is_empty() {
        return Err("cannot coerce empty string to number".to_owned());
    }
    if t.contains(['.', 'e', 'E']) {
        t.parse::<f64>()
            .map(Value::F64)
            .map_err(|_| format!("cannot coerce '{s}' to number"))
    } else {
        match t.parse::<i64>() {
            Ok(v) => Ok(narrow_int(v, Rank::I32)),
            Err(_) => t
                .parse::<BigInt>()
                .map(Value::big)
                .map_err(|_| format!("cannot coerce '{s}' to number")),
        }
    }
}
