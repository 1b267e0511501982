//! Lexical frames: compile-time slot layouts and runtime cells.
//!
//! The parser assigns every declared variable a slot in its enclosing
//! function frame. A [`FrameLayout`] describes the slots (declared type,
//! `final` flag, whether an inner lambda captures the slot); a [`Frame`] is
//! the per-evaluation storage. Captured slots are heap cells
//! (`Arc<RwLock<Value>>`) shared by reference between the declaring frame
//! and every closure that captures them, so writes on either side are
//! visible to the other.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{arithmetic::Arithmetic, types::Decimal, value::Value};

/// Reference to a variable from inside one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VarRef {
    /// Slot in the current frame (parameters occupy the leading slots).
    Local(u16),
    /// Slot imported from the enclosing frame at closure creation.
    Capture(u16),
}

/// Declared type tag of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeclaredType {
    #[default]
    Any,
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    BigInt,
    F32,
    F64,
    Decimal,
    Str,
}

impl DeclaredType {
    /// The zero value a declared-but-uninitialized slot holds.
    #[must_use]
    pub fn zero(self) -> Value {
        match self {
            Self::Any => Value::Null,
            Self::Bool => Value::Bool(false),
            Self::Char => Value::Char('\0'),
            Self::I8 => Value::I8(0),
            Self::I16 => Value::I16(0),
            Self::I32 => Value::I32(0),
            Self::I64 => Value::I64(0),
            Self::BigInt => Value::big(0),
            Self::F32 => Value::F32(0.0),
            Self::F64 => Value::F64(0.0),
            Self::Decimal => Value::decimal(Decimal::zero()),
            Self::Str => Value::str(""),
        }
    }

    /// Coerces `value` into this slot's storage type; an error means the
    /// declared type cannot absorb the value.
    pub fn absorb(self, value: Value, arithmetic: &Arithmetic) -> Result<Value, String> {
        match self {
            Self::Any => Ok(value),
            Self::Bool => match &value {
                Value::Bool(_) => Ok(value),
                Value::Str(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Value::Str(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                v if v.is_numeric() => Ok(Value::Bool(v.is_truthy())),
                v => Err(absorb_error("boolean", v)),
            },
            Self::Char => match &value {
                Value::Char(_) => Ok(value),
                Value::Str(s) if s.chars().count() == 1 => Ok(Value::Char(s.chars().next().unwrap())),
                v if v.is_numeric() => {
                    let code = arithmetic.to_i64(v)?;
                    u32::try_from(code)
                        .ok()
                        .and_then(char::from_u32)
                        .map(Value::Char)
                        .ok_or_else(|| absorb_error("char", v))
                }
                v => Err(absorb_error("char", v)),
            },
            Self::I8 => narrowing("byte", &value, arithmetic, |v| i8::try_from(v).map(Value::I8).ok()),
            Self::I16 => narrowing("short", &value, arithmetic, |v| i16::try_from(v).map(Value::I16).ok()),
            Self::I32 => narrowing("int", &value, arithmetic, |v| i32::try_from(v).map(Value::I32).ok()),
            Self::I64 => narrowing("long", &value, arithmetic, |v| Some(Value::I64(v))),
            Self::BigInt => match &value {
                Value::BigInt(_) => Ok(value),
                v if v.is_numeric() || matches!(v, Value::Str(_)) => arithmetic.to_i64(v).map(Value::big),
                v => Err(absorb_error("bigint", v)),
            },
            Self::F32 => arithmetic.to_f64(&value).map(|v| Value::F32(v as f32)),
            Self::F64 => arithmetic.to_f64(&value).map(Value::F64),
            Self::Decimal => match &value {
                Value::Decimal(_) => Ok(value),
                Value::Str(s) => s
                    .parse::<Decimal>()
                    .map(Value::decimal)
                    .map_err(|_| absorb_error("decimal", &value)),
                v if v.is_numeric() => {
                    let d = match v {
                        Value::F32(x) => Decimal::try_from_f64(f64::from(*x)),
                        Value::F64(x) => Decimal::try_from_f64(*x),
                        other => Some(Decimal::from_i64(arithmetic.to_i64(other)?)),
                    };
                    d.map(Value::decimal).ok_or_else(|| absorb_error("decimal", v))
                }
                v => Err(absorb_error("decimal", v)),
            },
            Self::Str => match &value {
                Value::Str(_) => Ok(value),
                v => Ok(Value::str(v.to_display_string())),
            },
        }
    }
}

fn absorb_error(target: &str, value: &Value) -> String {
    format!("cannot assign {} to {target} variable", value.type_name())
}

/// Integral narrowing: exact integer values that fit the width are stored;
/// anything else is a runtime error.
fn narrowing(
    target: &str,
    value: &Value,
    arithmetic: &Arithmetic,
    fit: impl FnOnce(i64) -> Option<Value>,
) -> Result<Value, String> {
    let wide = arithmetic.to_i64(value)?;
    fit(wide).ok_or_else(|| format!("value {wide} out of range for {target}"))
}

/// Compile-time description of one local slot.
#[derive(Debug, Clone)]
pub(crate) struct SlotDesc {
    pub name: Arc<str>,
    pub declared: DeclaredType,
    pub is_final: bool,
    /// Some inner lambda shares this slot; the runtime cell is heap-backed.
    pub captured: bool,
}

/// Compile-time description of one captured variable.
#[derive(Debug, Clone)]
pub(crate) struct CaptureDesc {
    pub name: Arc<str>,
    /// Where the cell lives in the frame the closure was created in.
    pub outer: VarRef,
    pub is_final: bool,
}

/// Slot plan for one function frame. Parameters occupy `0..params`.
#[derive(Debug, Clone, Default)]
pub(crate) struct FrameLayout {
    pub slots: Vec<SlotDesc>,
    pub captures: Vec<CaptureDesc>,
    pub params: u16,
}

impl FrameLayout {
    pub fn local_names(&self) -> Vec<Arc<str>> {
        self.slots.iter().map(|s| Arc::clone(&s.name)).collect()
    }

    pub fn capture_names(&self) -> Vec<Arc<str>> {
        self.captures.iter().map(|c| Arc::clone(&c.name)).collect()
    }
}

/// Storage for one local slot.
#[derive(Debug)]
enum CellStorage {
    Plain(Value),
    Shared(Arc<RwLock<Value>>),
}

#[derive(Debug)]
struct Cell {
    storage: CellStorage,
    initialized: bool,
}

/// Per-evaluation storage for one frame.
#[derive(Debug)]
pub(crate) struct Frame {
    locals: Vec<Cell>,
    captures: Vec<Arc<RwLock<Value>>>,
}

impl Frame {
    /// Allocates a frame for `layout`; captured slots get heap cells.
    pub fn new(layout: &FrameLayout, captures: Vec<Arc<RwLock<Value>>>) -> Self {
        debug_assert_eq!(captures.len(), layout.captures.len());
        let locals = layout
            .slots
            .iter()
            .map(|desc| {
                let zero = desc.declared.zero();
                let storage = if desc.captured {
                    CellStorage::Shared(Arc::new(RwLock::new(zero)))
                } else {
                    CellStorage::Plain(zero)
                };
                Cell {
                    storage,
                    initialized: false,
                }
            })
            .collect();
        Self { locals, captures }
    }

    pub fn get(&self, var: VarRef) -> Value {
        match var {
            VarRef::Local(i) => match &self.locals[i as usize].storage {
                CellStorage::Plain(v) => v.clone(),
                CellStorage::Shared(cell) => cell.read().clone(),
            },
            VarRef::Capture(i) => self.captures[i as usize].read().clone(),
        }
    }

    /// Raw write without final/type checks; used to bind parameters.
    pub fn bind(&mut self, index: u16, value: Value) {
        let cell = &mut self.locals[index as usize];
        match &mut cell.storage {
            CellStorage::Plain(slot) => *slot = value,
            CellStorage::Shared(shared) => *shared.write() = value,
        }
        cell.initialized = true;
    }

    /// Checked assignment applying declared-type coercion and the `final`
    /// rule.
    pub fn assign(&mut self, layout: &FrameLayout, var: VarRef, value: Value, arithmetic: &Arithmetic) -> Result<(), String> {
        match var {
            VarRef::Local(i) => {
                let desc = &layout.slots[i as usize];
                if desc.is_final && self.locals[i as usize].initialized {
                    return Err(format!("variable '{}' is final", desc.name));
                }
                let value = desc.declared.absorb(value, arithmetic)?;
                self.bind(i, value);
                Ok(())
            }
            VarRef::Capture(i) => {
                let desc = &layout.captures[i as usize];
                if desc.is_final {
                    return Err(format!("variable '{}' is final", desc.name));
                }
                *self.captures[i as usize].write() = value;
                Ok(())
            }
        }
    }

    /// The heap cell behind a slot, for building closures over it.
    pub fn cell(&self, var: VarRef) -> Arc<RwLock<Value>> {
        match var {
            VarRef::Local(i) => match &self.locals[i as usize].storage {
                CellStorage::Shared(cell) => Arc::clone(cell),
                CellStorage::Plain(_) => unreachable!("capture of a non-shared slot"),
            },
            VarRef::Capture(i) => Arc::clone(&self.captures[i as usize]),
        }
    }
}
