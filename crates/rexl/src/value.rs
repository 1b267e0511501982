//! The runtime value type.
//!
//! [`Value`] is a single tagged union covering every runtime shape the
//! language knows: null, booleans, characters, four signed integer widths,
//! arbitrary-precision integers, two float widths, arbitrary-precision
//! decimals, strings, the three collection kinds, inclusive integer ranges,
//! opaque host objects, method references and scripts (closures).
//!
//! Immediate values are stored inline; collections are shared mutable
//! handles (`Arc<RwLock<…>>`) so hosts and concurrent evaluations observe
//! each other's mutations, which the concurrency model requires. Containers
//! built from immutable literals carry a flag that rejects in-place
//! mutation.

use std::{cmp::Ordering, fmt, sync::Arc};

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero};
use parking_lot::RwLock;

use crate::{
    program::Closure,
    types::{Decimal, IntRange},
};

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    BigInt(Arc<BigInt>),
    F32(f32),
    F64(f64),
    Decimal(Arc<Decimal>),
    /// Immutable string; cheap to clone and share across threads.
    Str(Arc<str>),
    List(ListRef),
    Set(SetRef),
    Map(MapRef),
    Range(IntRange),
    /// Opaque host object handle; behavior comes from the class registry.
    Object(HostRef),
    /// A method bound to a receiver or to a class name.
    MethodRef(Arc<MethodRef>),
    /// A closure, lambda or curried program; callable like a function.
    Script(Arc<Closure>),
}

impl Value {
    #[must_use]
    pub fn str(s: impl AsRef<str>) -> Self {
        Self::Str(Arc::from(s.as_ref()))
    }

    #[must_use]
    pub fn big(v: impl Into<BigInt>) -> Self {
        Self::BigInt(Arc::new(v.into()))
    }

    #[must_use]
    pub fn decimal(d: Decimal) -> Self {
        Self::Decimal(Arc::new(d))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::I8(_)
                | Self::I16(_)
                | Self::I32(_)
                | Self::I64(_)
                | Self::BigInt(_)
                | Self::F32(_)
                | Self::F64(_)
                | Self::Decimal(_)
        )
    }

    /// The script-visible type name, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Char(_) => "char",
            Self::I8(_) => "byte",
            Self::I16(_) => "short",
            Self::I32(_) => "int",
            Self::I64(_) => "long",
            Self::BigInt(_) => "bigint",
            Self::F32(_) => "float",
            Self::F64(_) => "double",
            Self::Decimal(_) => "decimal",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Range(_) => "range",
            Self::Object(_) => "object",
            Self::MethodRef(_) => "method",
            Self::Script(_) => "script",
        }
    }

    /// Truth coercion: null is false, numbers compare against zero, strings
    /// are true only when they spell `true` (case-insensitive), collections
    /// are true when non-empty.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Char(c) => *c != '\0',
            Self::I8(v) => *v != 0,
            Self::I16(v) => *v != 0,
            Self::I32(v) => *v != 0,
            Self::I64(v) => *v != 0,
            Self::BigInt(v) => !v.is_zero(),
            Self::F32(v) => *v != 0.0,
            Self::F64(v) => *v != 0.0,
            Self::Decimal(d) => !d.is_zero(),
            Self::Str(s) => s.eq_ignore_ascii_case("true"),
            Self::List(l) => !l.is_empty(),
            Self::Set(s) => !s.is_empty(),
            Self::Map(m) => !m.is_empty(),
            Self::Range(_) | Self::Object(_) | Self::MethodRef(_) | Self::Script(_) => true,
        }
    }

    /// The `empty` operator: null, empty strings/collections and numeric
    /// zero are empty; everything else is not.
    #[must_use]
    pub fn is_empty_value(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Str(s) => s.is_empty(),
            Self::List(l) => l.is_empty(),
            Self::Set(s) => s.is_empty(),
            Self::Map(m) => m.is_empty(),
            Self::I8(v) => *v == 0,
            Self::I16(v) => *v == 0,
            Self::I32(v) => *v == 0,
            Self::I64(v) => *v == 0,
            Self::BigInt(v) => v.is_zero(),
            Self::F32(v) => *v == 0.0,
            Self::F64(v) => *v == 0.0,
            Self::Decimal(d) => d.is_zero(),
            _ => false,
        }
    }

    /// The `size` operator; `None` for scalars without a size.
    #[must_use]
    pub fn size_of(&self) -> Option<i64> {
        match self {
            Self::Str(s) => Some(s.chars().count() as i64),
            Self::List(l) => Some(l.len() as i64),
            Self::Set(s) => Some(s.len() as i64),
            Self::Map(m) => Some(m.len() as i64),
            Self::Range(r) => Some(r.size() as i64),
            _ => None,
        }
    }

    /// String form used by concatenation and error messages. Null renders
    /// empty so non-strict string building degrades quietly.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Deep structural equality: numeric operands compare by value across
    /// widths (exactly when either side is arbitrary-precision), containers
    /// compare element-wise, objects compare by handle identity.
    #[must_use]
    pub fn deep_eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (numeric_repr(self), numeric_repr(other)) {
            return a.eq_value(&b);
        }
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Char(a), Self::Str(b)) | (Self::Str(b), Self::Char(a)) => {
                let mut buf = [0u8; 4];
                b.as_ref() == &*a.encode_utf8(&mut buf)
            }
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                let (a, b) = (a.snapshot(), b.snapshot());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
            }
            (Self::Set(a), Self::Set(b)) => {
                let (a, b) = (a.snapshot(), b.snapshot());
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.deep_eq(y)))
            }
            (Self::Map(a), Self::Map(b)) => {
                let (a, b) = (a.snapshot(), b.snapshot());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.iter().any(|(k2, v2)| k == k2 && v.deep_eq(v2)))
            }
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(&a.0, &b.0),
            (Self::Script(a), Self::Script(b)) => Arc::ptr_eq(a, b),
            (Self::MethodRef(a), Self::MethodRef(b)) => a.name == b.name && a.target.same_target(&b.target),
            _ => false,
        }
    }

    /// Canonical hashable form for use as a map key or set element.
    #[must_use]
    pub fn as_key(&self) -> ValueKey {
        match self {
            Self::Null => ValueKey::Null,
            Self::Bool(b) => ValueKey::Bool(*b),
            Self::Char(c) => ValueKey::Char(*c),
            Self::I8(v) => ValueKey::Int(i64::from(*v)),
            Self::I16(v) => ValueKey::Int(i64::from(*v)),
            Self::I32(v) => ValueKey::Int(i64::from(*v)),
            Self::I64(v) => ValueKey::Int(*v),
            Self::BigInt(v) => match v.to_i64() {
                Some(small) => ValueKey::Int(small),
                None => ValueKey::BigInt((**v).clone()),
            },
            Self::F32(v) => float_key(f64::from(*v)),
            Self::F64(v) => float_key(*v),
            Self::Decimal(d) => match d.to_bigint_exact() {
                Some(int) => match int.to_i64() {
                    Some(small) => ValueKey::Int(small),
                    None => ValueKey::BigInt(int),
                },
                None => ValueKey::Decimal(d.normalized()),
            },
            Self::Str(s) => ValueKey::Str(Arc::clone(s)),
            Self::Range(r) => ValueKey::Range(r.from, r.to),
            Self::List(l) => ValueKey::Identity(Arc::as_ptr(&l.0) as usize),
            Self::Set(s) => ValueKey::Identity(Arc::as_ptr(&s.0) as usize),
            Self::Map(m) => ValueKey::Identity(Arc::as_ptr(&m.0) as usize),
            Self::Object(o) => ValueKey::Identity(Arc::as_ptr(&o.0).cast::<()>() as usize),
            Self::MethodRef(m) => ValueKey::Identity(Arc::as_ptr(m) as usize),
            Self::Script(s) => ValueKey::Identity(Arc::as_ptr(s) as usize),
        }
    }
}

/// Numeric content of a value, lifted to a comparable representation.
enum Numeric {
    Int(i64),
    Big(BigInt),
    Float(f64),
    Dec(Decimal),
}

impl Numeric {
    fn eq_value(&self, other: &Self) -> bool {
        use Numeric::{Big, Dec, Float, Int};
        match (self, other) {
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            // arbitrary-precision operands compare exactly
            (Big(a), Big(b)) => a == b,
            (Big(a), Int(b)) | (Int(b), Big(a)) => *a == BigInt::from(*b),
            // an integral float converts exactly; a fractional one can never
            // equal an integer
            (Big(a), Float(b)) | (Float(b), Big(a)) => {
                b.is_finite() && b.fract() == 0.0 && BigInt::from_f64(*b).is_some_and(|exact| exact == *a)
            }
            (Dec(a), Dec(b)) => a == b,
            (Dec(a), Int(b)) | (Int(b), Dec(a)) => *a == Decimal::from_i64(*b),
            (Dec(a), Big(b)) | (Big(b), Dec(a)) => *a == Decimal::from_bigint(b.clone()),
            (Dec(a), Float(b)) | (Float(b), Dec(a)) => Decimal::try_from_f64(*b).is_some_and(|d| d == *a),
        }
    }
}

fn numeric_repr(v: &Value) -> Option<Numeric> {
    match v {
        Value::I8(x) => Some(Numeric::Int(i64::from(*x))),
        Value::I16(x) => Some(Numeric::Int(i64::from(*x))),
        Value::I32(x) => Some(Numeric::Int(i64::from(*x))),
        Value::I64(x) => Some(Numeric::Int(*x)),
        Value::BigInt(x) => Some(Numeric::Big((**x).clone())),
        Value::F32(x) => Some(Numeric::Float(f64::from(*x))),
        Value::F64(x) => Some(Numeric::Float(*x)),
        Value::Decimal(x) => Some(Numeric::Dec((**x).clone())),
        _ => None,
    }
}

fn float_key(v: f64) -> ValueKey {
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
        ValueKey::Int(v as i64)
    } else {
        ValueKey::FloatBits(v.to_bits())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Char(c) => write!(f, "{c}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::BigInt(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Str(s) => f.write_str(s),
            Self::List(l) => {
                f.write_str("[")?;
                for (i, item) in l.snapshot().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Set(s) => {
                f.write_str("{")?;
                for (i, item) in s.snapshot().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
            Self::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.snapshot().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}", k = k.display())?;
                }
                f.write_str("}")
            }
            Self::Range(r) => write!(f, "{r}"),
            Self::Object(o) => write!(f, "{}@{:p}", o.class_name(), Arc::as_ptr(&o.0)),
            Self::MethodRef(m) => write!(f, "{m}"),
            Self::Script(_) => f.write_str("script"),
        }
    }
}

/// Canonical hashable key form of a value.
///
/// Integer-valued numerics of any width normalize to `Int`, so `1`, `1l` and
/// `1.0` address the same map slot, matching the language's cross-width
/// equality. Mutable containers and host objects key by handle identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Char(char),
    Int(i64),
    BigInt(BigInt),
    FloatBits(u64),
    Decimal(Decimal),
    Str(Arc<str>),
    Range(i64, i64),
    Identity(usize),
}

impl ValueKey {
    /// Display form for rendering map keys.
    fn display(&self) -> String {
        match self {
            Self::Null => "null".to_owned(),
            Self::Bool(b) => b.to_string(),
            Self::Char(c) => c.to_string(),
            Self::Int(v) => v.to_string(),
            Self::BigInt(v) => v.to_string(),
            Self::FloatBits(bits) => f64::from_bits(*bits).to_string(),
            Self::Decimal(d) => d.to_string(),
            Self::Str(s) => s.to_string(),
            Self::Range(a, b) => format!("({a}..{b})"),
            Self::Identity(id) => format!("@{id:x}"),
        }
    }

    /// Reconstructs a value from the key form, for iteration over sets and
    /// map key views. Identity keys cannot be reconstructed.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Char(c) => Value::Char(*c),
            Self::Int(v) => {
                if let Ok(small) = i32::try_from(*v) {
                    Value::I32(small)
                } else {
                    Value::I64(*v)
                }
            }
            Self::BigInt(v) => Value::big(v.clone()),
            Self::FloatBits(bits) => Value::F64(f64::from_bits(*bits)),
            Self::Decimal(d) => Value::decimal(d.clone()),
            Self::Str(s) => Value::Str(Arc::clone(s)),
            Self::Range(a, b) => Value::Range(IntRange::new(*a, *b)),
            Self::Identity(_) => Value::Null,
        }
    }
}

/// Shared mutable list handle.
#[derive(Debug, Clone)]
pub struct ListRef(Arc<ListInner>);

#[derive(Debug)]
struct ListInner {
    items: RwLock<Vec<Value>>,
    immutable: bool,
    /// Common-ancestor element class computed by the literal builder, when
    /// the literal was materialized as a typed array.
    element_class: RwLock<Option<Arc<str>>>,
}

impl ListRef {
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self(Arc::new(ListInner {
            items: RwLock::new(items),
            immutable: false,
            element_class: RwLock::new(None),
        }))
    }

    #[must_use]
    pub fn immutable(items: Vec<Value>) -> Self {
        Self(Arc::new(ListInner {
            items: RwLock::new(items),
            immutable: true,
            element_class: RwLock::new(None),
        }))
    }

    #[must_use]
    pub fn is_immutable(&self) -> bool {
        self.0.immutable
    }

    pub fn set_element_class(&self, class: Option<Arc<str>>) {
        *self.0.element_class.write() = class;
    }

    #[must_use]
    pub fn element_class(&self) -> Option<Arc<str>> {
        self.0.element_class.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.items.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.items.read().is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.items.read().get(index).cloned()
    }

    /// Copies out the current elements; mutations after the copy are not
    /// reflected.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.items.read().clone()
    }

    pub fn set(&self, index: usize, value: Value) -> Result<(), MutationError> {
        self.check_mutable()?;
        let mut items = self.0.items.write();
        if index >= items.len() {
            items.resize(index + 1, Value::Null);
        }
        items[index] = value;
        Ok(())
    }

    pub fn push(&self, value: Value) -> Result<(), MutationError> {
        self.check_mutable()?;
        self.0.items.write().push(value);
        Ok(())
    }

    pub fn remove_at(&self, index: usize) -> Result<Option<Value>, MutationError> {
        self.check_mutable()?;
        let mut items = self.0.items.write();
        if index < items.len() {
            Ok(Some(items.remove(index)))
        } else {
            Ok(None)
        }
    }

    pub fn clear(&self) -> Result<(), MutationError> {
        self.check_mutable()?;
        self.0.items.write().clear();
        Ok(())
    }

    fn check_mutable(&self) -> Result<(), MutationError> {
        if self.0.immutable {
            Err(MutationError)
        } else {
            Ok(())
        }
    }
}

/// Shared mutable set handle; insertion order is preserved.
#[derive(Debug, Clone)]
pub struct SetRef(Arc<SetInner>);

#[derive(Debug)]
struct SetInner {
    // keyed by canonical form, keeping the original value for iteration
    items: RwLock<IndexMap<ValueKey, Value, ahash::RandomState>>,
    immutable: bool,
}

impl SetRef {
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self::build(items, false)
    }

    #[must_use]
    pub fn immutable(items: Vec<Value>) -> Self {
        Self::build(items, true)
    }

    fn build(items: Vec<Value>, immutable: bool) -> Self {
        let mut map = IndexMap::with_hasher(ahash::RandomState::new());
        for item in items {
            map.insert(item.as_key(), item);
        }
        Self(Arc::new(SetInner {
            items: RwLock::new(map),
            immutable,
        }))
    }

    #[must_use]
    pub fn is_immutable(&self) -> bool {
        self.0.immutable
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.items.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.items.read().is_empty()
    }

    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.0.items.read().contains_key(&value.as_key())
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.items.read().values().cloned().collect()
    }

    pub fn insert(&self, value: Value) -> Result<bool, MutationError> {
        if self.0.immutable {
            return Err(MutationError);
        }
        Ok(self.0.items.write().insert(value.as_key(), value).is_none())
    }

    pub fn remove(&self, value: &Value) -> Result<bool, MutationError> {
        if self.0.immutable {
            return Err(MutationError);
        }
        Ok(self.0.items.write().shift_remove(&value.as_key()).is_some())
    }

    pub fn clear(&self) -> Result<(), MutationError> {
        if self.0.immutable {
            return Err(MutationError);
        }
        self.0.items.write().clear();
        Ok(())
    }
}

/// Shared mutable map handle; insertion order is preserved.
#[derive(Debug, Clone)]
pub struct MapRef(Arc<MapInner>);

#[derive(Debug)]
struct MapInner {
    entries: RwLock<IndexMap<ValueKey, Value, ahash::RandomState>>,
    immutable: bool,
}

impl MapRef {
    #[must_use]
    pub fn new(pairs: Vec<(Value, Value)>) -> Self {
        Self::build(pairs, false)
    }

    #[must_use]
    pub fn immutable(pairs: Vec<(Value, Value)>) -> Self {
        Self::build(pairs, true)
    }

    fn build(pairs: Vec<(Value, Value)>, immutable: bool) -> Self {
        let mut map = IndexMap::with_hasher(ahash::RandomState::new());
        for (k, v) in pairs {
            map.insert(k.as_key(), v);
        }
        Self(Arc::new(MapInner {
            entries: RwLock::new(map),
            immutable,
        }))
    }

    #[must_use]
    pub fn is_immutable(&self) -> bool {
        self.0.immutable
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.entries.read().is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0.entries.read().get(&key.as_key()).cloned()
    }

    #[must_use]
    pub fn contains_key(&self, key: &Value) -> bool {
        self.0.entries.read().contains_key(&key.as_key())
    }

    pub fn insert(&self, key: Value, value: Value) -> Result<Option<Value>, MutationError> {
        if self.0.immutable {
            return Err(MutationError);
        }
        Ok(self.0.entries.write().insert(key.as_key(), value))
    }

    pub fn remove(&self, key: &Value) -> Result<Option<Value>, MutationError> {
        if self.0.immutable {
            return Err(MutationError);
        }
        Ok(self.0.entries.write().shift_remove(&key.as_key()))
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<(ValueKey, Value)> {
        self.0.entries.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.0.entries.read().keys().map(ValueKey::to_value).collect()
    }

    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.0.entries.read().values().cloned().collect()
    }
}

/// In-place mutation attempted on an immutable container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationError;

/// Behavior contract for host objects handed to the engine.
///
/// The engine never reflects over Rust types; hosts register a
/// [`crate::introspect::ClassDescriptor`] naming the properties, methods and
/// constructors of each class, and every instance reports its class name
/// through this trait.
pub trait HostObject: std::any::Any + Send + Sync + fmt::Debug {
    /// The registered class name for descriptor lookup.
    fn class_name(&self) -> &str;

    /// Downcast support for property/method closures.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Cheap cloneable handle to a host object.
#[derive(Debug, Clone)]
pub struct HostRef(pub(crate) Arc<dyn HostObject>);

impl HostRef {
    #[must_use]
    pub fn new(object: Arc<dyn HostObject>) -> Self {
        Self(object)
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        self.0.class_name()
    }

    #[must_use]
    pub fn object(&self) -> &dyn HostObject {
        self.0.as_ref()
    }

    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// What a method reference is bound to.
#[derive(Debug, Clone)]
pub enum MethodTarget {
    /// `obj::name` - bound to a live receiver.
    Instance(HostRef),
    /// `Class::name` or `Class::new` - bound to a class by name.
    Class(Arc<str>),
}

impl MethodTarget {
    fn same_target(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Instance(a), Self::Instance(b)) => a.same_instance(b),
            (Self::Class(a), Self::Class(b)) => a == b,
            _ => false,
        }
    }
}

/// A method reference value: exactly one target plus a method name.
/// Invoked like a script; `new` on a class target names the constructor.
#[derive(Debug, Clone)]
pub struct MethodRef {
    pub target: MethodTarget,
    pub name: Arc<str>,
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            MethodTarget::Instance(obj) => write!(f, "{}::{}", obj.class_name(), self.name),
            MethodTarget::Class(class) => write!(f, "{class}::{}", self.name),
        }
    }
}

/// Equality delegates to [`Value::deep_eq`]; handy for hosts and tests.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

/// Ordered comparison between values where one is defined: numbers by
/// widest-type value, strings lexicographically, chars as strings.
#[must_use]
pub fn partial_compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (numeric_repr(a), numeric_repr(b)) {
        return numeric_compare(&x, &y);
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Char(x), Value::Char(y)) => Some(x.cmp(y)),
        (Value::Str(x), Value::Char(y)) => {
            let mut buf = [0u8; 4];
            Some(x.as_ref().cmp(&*y.encode_utf8(&mut buf)))
        }
        (Value::Char(x), Value::Str(y)) => {
            let mut buf = [0u8; 4];
            let s: &str = x.encode_utf8(&mut buf);
            Some(s.cmp(y.as_ref()))
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn numeric_compare(a: &Numeric, b: &Numeric) -> Option<Ordering> {
    use Numeric::{Big, Dec, Float, Int};
    match (a, b) {
        (Int(x), Int(y)) => Some(x.cmp(y)),
        (Float(x), Float(y)) => x.partial_cmp(y),
        (Int(x), Float(y)) => (*x as f64).partial_cmp(y),
        (Float(x), Int(y)) => x.partial_cmp(&(*y as f64)),
        (Big(x), Big(y)) => Some(x.cmp(y)),
        (Big(x), Int(y)) => Some(x.cmp(&BigInt::from(*y))),
        (Int(x), Big(y)) => Some(BigInt::from(*x).cmp(y)),
        (Big(x), Float(y)) => Decimal::try_from_f64(*y).map(|d| Decimal::from_bigint(x.clone()).cmp(&d)),
        (Float(x), Big(y)) => Decimal::try_from_f64(*x).map(|d| d.cmp(&Decimal::from_bigint(y.clone()))),
        (Dec(x), Dec(y)) => Some(x.cmp(y)),
        (Dec(x), Int(y)) => Some(x.cmp(&Decimal::from_i64(*y))),
        (Int(x), Dec(y)) => Some(Decimal::from_i64(*x).cmp(y)),
        (Dec(x), Big(y)) => Some(x.cmp(&Decimal::from_bigint(y.clone()))),
        (Big(x), Dec(y)) => Some(Decimal::from_bigint(x.clone()).cmp(y)),
        (Dec(x), Float(y)) => Decimal::try_from_f64(*y).map(|d| x.cmp(&d)),
        (Float(x), Dec(y)) => Decimal::try_from_f64(*x).map(|d| d.cmp(y)),
    }
}
