//! Host-object introspection and the per-call-site accessor cache.
//!
//! The engine performs no runtime reflection. Hosts register a
//! [`ClassDescriptor`] per class naming its superclasses/interfaces (in
//! declaration order), property getters/setters, overloaded methods and
//! constructors as boxed closures. Every `obj.name`, `obj.name = v`,
//! `obj.m(args)` and `new(Class, args)` resolves against these descriptors,
//! gated by the sandbox and permissions.
//!
//! Call sites cache the resolved accessor in an [`AccessorSlot`] guarded by
//! the receiver's class name. Slots are shared-lock read and write-lock
//! replaced; concurrent resolvers race benignly because every resolution
//! for the same class produces an equivalent accessor and the last install
//! wins.

use std::{fmt, sync::Arc};

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::{
    permissions::Permissions,
    sandbox::Sandbox,
    value::{HostObject, HostRef, MutationError, Value},
};

/// Declared parameter kind for overload selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    Any,
    Bool,
    Char,
    /// 32-bit-or-narrower integer.
    Int,
    /// Any integer width.
    Long,
    Float,
    Double,
    /// Any numeric operand.
    Number,
    Str,
    List,
    Map,
    Set,
    /// A host object assignable to the named class.
    Object(Arc<str>),
}

impl ParamKind {
    /// Whether an argument value can bind this parameter after numeric
    /// widening and unboxing.
    fn accepts(&self, arg: &Value, registry: &ClassRegistry) -> bool {
        match self {
            Self::Any => true,
            Self::Bool => matches!(arg, Value::Bool(_)),
            Self::Char => matches!(arg, Value::Char(_)),
            Self::Int => matches!(arg, Value::I8(_) | Value::I16(_) | Value::I32(_)),
            Self::Long => matches!(
                arg,
                Value::I8(_) | Value::I16(_) | Value::I32(_) | Value::I64(_) | Value::BigInt(_)
            ),
            Self::Float => matches!(arg, Value::F32(_)) || Self::Int.accepts(arg, registry),
            Self::Double | Self::Number => arg.is_numeric(),
            Self::Str => matches!(arg, Value::Str(_) | Value::Null),
            Self::List => matches!(arg, Value::List(_) | Value::Null),
            Self::Map => matches!(arg, Value::Map(_) | Value::Null),
            Self::Set => matches!(arg, Value::Set(_) | Value::Null),
            Self::Object(class) => match arg {
                Value::Null => true,
                Value::Object(obj) => {
                    class.as_ref() == ClassRegistry::ROOT_CLASS
                        || registry.ancestry(obj.class_name()).iter().any(|c| c == class)
                }
                _ => class.as_ref() == ClassRegistry::ROOT_CLASS,
            },
        }
    }

    /// `self` is at least as specific as `other` (subtype-or-equal along
    /// the widening chain int ⊑ long ⊑ float ⊑ double ⊑ number ⊑ any).
    fn at_least_as_specific(&self, other: &Self, registry: &ClassRegistry) -> bool {
        if self == other || matches!(other, Self::Any) {
            return true;
        }
        match (self, other) {
            (Self::Int, Self::Long | Self::Float | Self::Double | Self::Number) => true,
            (Self::Long, Self::Float | Self::Double | Self::Number) => true,
            (Self::Float, Self::Double | Self::Number) => true,
            (Self::Double, Self::Number) => true,
            (Self::Object(a), Self::Object(b)) => registry.ancestry(a).iter().any(|c| c == b),
            _ => false,
        }
    }
}

/// Getter closure over a host object.
pub type GetterFn = Arc<dyn Fn(&dyn HostObject) -> Result<Value, String> + Send + Sync>;
/// Setter closure over a host object.
pub type SetterFn = Arc<dyn Fn(&dyn HostObject, Value) -> Result<(), String> + Send + Sync>;
/// Method invocation closure; the receiver is `None` for constructors and
/// static methods.
pub type InvokeFn = Arc<dyn Fn(Option<&dyn HostObject>, &[Value]) -> Result<Value, String> + Send + Sync>;

/// A registered property.
#[derive(Clone)]
pub struct PropertyDef {
    pub getter: Option<GetterFn>,
    pub setter: Option<SetterFn>,
}

/// One method overload (or constructor).
#[derive(Clone)]
pub struct MethodDef {
    pub params: Vec<ParamKind>,
    /// The last parameter kind absorbs any surplus arguments.
    pub varargs: bool,
    pub invoke: InvokeFn,
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("params", &self.params)
            .field("varargs", &self.varargs)
            .finish_non_exhaustive()
    }
}

impl MethodDef {
    fn applicable(&self, args: &[Value], registry: &ClassRegistry) -> bool {
        if self.varargs {
            if args.len() + 1 < self.params.len() {
                return false;
            }
            let fixed = self.params.len().saturating_sub(1);
            let rest = self.params.last();
            args.iter().enumerate().all(|(i, arg)| {
                let kind = if i < fixed { &self.params[i] } else { rest.unwrap_or(&ParamKind::Any) };
                kind.accepts(arg, registry)
            })
        } else {
            args.len() == self.params.len()
                && self.params.iter().zip(args).all(|(kind, arg)| kind.accepts(arg, registry))
        }
    }

    /// Strictly more specific: every parameter at least as specific and one
    /// strictly narrower (or fixed-arity beating varargs).
    fn more_specific_than(&self, other: &Self, registry: &ClassRegistry) -> bool {
        if !self.varargs && other.varargs {
            return true;
        }
        if self.varargs && !other.varargs {
            return false;
        }
        if self.params.len() != other.params.len() {
            return false;
        }
        let all = self
            .params
            .iter()
            .zip(&other.params)
            .all(|(a, b)| a.at_least_as_specific(b, registry));
        all && self.params != other.params
    }
}

/// Host-registered runtime type descriptor.
///
/// `supers` lists superclasses and interfaces in declaration order,
/// subclasses before superclasses, classes before interfaces; the order
/// drives common-ancestor computation for array literals and inherited
/// sandbox lookups.
#[derive(Clone)]
pub struct ClassDescriptor {
    pub name: Arc<str>,
    pub supers: Vec<Arc<str>>,
    pub properties: AHashMap<String, PropertyDef>,
    pub methods: AHashMap<String, Vec<MethodDef>>,
    pub constructors: Vec<MethodDef>,
}

impl Default for ClassDescriptor {
    fn default() -> Self {
        Self {
            name: Arc::from(""),
            supers: Vec::new(),
            properties: AHashMap::new(),
            methods: AHashMap::new(),
            constructors: Vec::new(),
        }
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("supers", &self.supers)
            .finish_non_exhaustive()
    }
}

impl ClassDescriptor {
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn extends(mut self, super_name: impl AsRef<str>) -> Self {
        self.supers.push(Arc::from(super_name.as_ref()));
        self
    }

    #[must_use]
    pub fn property(mut self, name: impl Into<String>, getter: Option<GetterFn>, setter: Option<SetterFn>) -> Self {
        self.properties.insert(name.into(), PropertyDef { getter, setter });
        self
    }

    #[must_use]
    pub fn method(mut self, name: impl Into<String>, params: Vec<ParamKind>, invoke: InvokeFn) -> Self {
        self.methods.entry(name.into()).or_default().push(MethodDef {
            params,
            varargs: false,
            invoke,
        });
        self
    }

    #[must_use]
    pub fn constructor(mut self, params: Vec<ParamKind>, invoke: InvokeFn) -> Self {
        self.constructors.push(MethodDef {
            params,
            varargs: false,
            invoke,
        });
        self
    }
}

/// Registry of host class descriptors, shared by everything the engine
/// hands out. Registration happens at engine setup; lookups are read-locked
/// and cheap.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: Arc<RwLock<AHashMap<Arc<str>, Arc<ClassDescriptor>>>>,
}

impl ClassRegistry {
    /// The implicit root every class chain terminates at.
    pub const ROOT_CLASS: &'static str = "Object";

    pub fn register(&self, descriptor: ClassDescriptor) {
        let name = Arc::clone(&descriptor.name);
        self.classes.write().insert(name, Arc::new(descriptor));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.read().get(name).cloned()
    }

    /// The class itself plus all transitive supertypes, in declaration
    /// order, deduplicated.
    #[must_use]
    pub fn ancestry(&self, name: &str) -> Vec<Arc<str>> {
        let mut out: Vec<Arc<str>> = vec![Arc::from(name)];
        let mut i = 0;
        while i < out.len() {
            if let Some(desc) = self.get(&out[i]) {
                for parent in &desc.supers {
                    if !out.iter().any(|seen| seen == parent) {
                        out.push(Arc::clone(parent));
                    }
                }
            }
            i += 1;
        }
        out
    }
}

/// A resolved accessor cached at one call site.
#[derive(Clone)]
pub(crate) enum CachedAccessor {
    Getter { class: Arc<str>, getter: GetterFn },
    Method { class: Arc<str>, def: Arc<MethodDef> },
}

/// Per-call-site cache slot. Read under a shared lock; atomically replaced
/// when the receiver class no longer matches.
#[derive(Default)]
pub(crate) struct AccessorSlot {
    slot: RwLock<Option<CachedAccessor>>,
}

impl fmt::Debug for AccessorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessorSlot")
    }
}

impl AccessorSlot {
    fn load(&self) -> Option<CachedAccessor> {
        self.slot.read().clone()
    }

    fn store(&self, accessor: CachedAccessor) {
        *self.slot.write() = Some(accessor);
    }
}

/// Access failure classified for error mapping.
#[derive(Debug, Clone)]
pub(crate) enum AccessError {
    Property(String),
    Method(String),
    Ambiguous(String),
    Arithmetic(String),
}

impl AccessError {
    pub fn undefined_property(name: &str) -> Self {
        Self::Property(format!("undefined property '{name}'"))
    }

    pub fn undefined_method(name: &str) -> Self {
        Self::Method(format!("undefined method '{name}'"))
    }

    pub fn immutable(name: &str) -> Self {
        Self::Method(format!("'{name}' on an immutable collection"))
    }
}

impl From<MutationError> for AccessError {
    fn from(_: MutationError) -> Self {
        Self::Method("cannot modify an immutable collection".to_owned())
    }
}

pub(crate) type AccessResult<T> = Result<T, AccessError>;

/// Property lookup strategy for ambiguous containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyStrategy {
    /// Bean-style pseudo-properties win over map keys: `map.size` is the
    /// entry count.
    #[default]
    BeanFirst,
    /// Map keys win: `map.size` reads the `"size"` key.
    MapFirst,
}

/// One evaluation's view over registry + sandbox + permissions.
pub(crate) struct Introspector<'a> {
    pub registry: &'a ClassRegistry,
    pub sandbox: &'a Sandbox,
    pub permissions: &'a Permissions,
    pub strategy: PropertyStrategy,
}

impl Introspector<'_> {
    // ---- property read ----

    pub fn get_property(&self, target: &Value, name: &str, slot: Option<&AccessorSlot>) -> AccessResult<Value> {
        match target {
            Value::Object(obj) => self.object_get(obj, name, slot),
            Value::Map(map) => match self.strategy {
                PropertyStrategy::BeanFirst => match map_pseudo_property(map, name) {
                    Some(v) => Ok(v),
                    None => map
                        .get(&Value::str(name))
                        .ok_or_else(|| AccessError::undefined_property(name)),
                },
                PropertyStrategy::MapFirst => match map.get(&Value::str(name)) {
                    Some(v) => Ok(v),
                    None => map_pseudo_property(map, name).ok_or_else(|| AccessError::undefined_property(name)),
                },
            },
            Value::List(list) => {
                if let Ok(index) = name.parse::<usize>() {
                    return list.get(index).ok_or_else(|| AccessError::undefined_property(name));
                }
                match name {
                    "size" | "length" => Ok(Value::I32(list.len() as i32)),
                    "empty" => Ok(Value::Bool(list.is_empty())),
                    _ => Err(AccessError::undefined_property(name)),
                }
            }
            Value::Set(set) => match name {
                "size" => Ok(Value::I32(set.len() as i32)),
                "empty" => Ok(Value::Bool(set.is_empty())),
                _ => Err(AccessError::undefined_property(name)),
            },
            Value::Str(s) => match name {
                "size" | "length" => Ok(Value::I32(s.chars().count() as i32)),
                "empty" => Ok(Value::Bool(s.is_empty())),
                _ => {
                    if let Ok(index) = name.parse::<usize>() {
                        s.chars()
                            .nth(index)
                            .map(Value::Char)
                            .ok_or_else(|| AccessError::undefined_property(name))
                    } else {
                        Err(AccessError::undefined_property(name))
                    }
                }
            },
            Value::Range(r) => match name {
                "size" => Ok(Value::I64(r.size() as i64)),
                "from" => Ok(Value::I64(r.from)),
                "to" => Ok(Value::I64(r.to)),
                _ => Err(AccessError::undefined_property(name)),
            },
            _ => Err(AccessError::undefined_property(name)),
        }
    }

    fn object_get(&self, obj: &HostRef, name: &str, slot: Option<&AccessorSlot>) -> AccessResult<Value> {
        let class = obj.class_name();
        // fast path: the call site already resolved this class
        if let Some(CachedAccessor::Getter { class: cached, getter }) = slot.and_then(AccessorSlot::load) {
            if cached.as_ref() == class {
                return getter(obj.object()).map_err(AccessError::Property);
            }
        }
        let chain = self.registry.ancestry(class);
        let real = self
            .check_read(&chain, name)
            .ok_or_else(|| AccessError::undefined_property(name))?;
        for class_name in &chain {
            let Some(desc) = self.registry.get(class_name) else { continue };
            if let Some(prop) = desc.properties.get(real.as_ref()) {
                if let Some(getter) = &prop.getter {
                    if let Some(slot) = slot {
                        slot.store(CachedAccessor::Getter {
                            class: Arc::from(class),
                            getter: Arc::clone(getter),
                        });
                    }
                    return getter(obj.object()).map_err(AccessError::Property);
                }
            }
            // duck-typed generic get(String)
            if let Some(overloads) = desc.methods.get("get") {
                if self.check_execute(&chain, "get") {
                    let args = [Value::str(real.as_ref())];
                    if let Some(def) = overloads.iter().find(|d| d.applicable(&args, self.registry)) {
                        return (def.invoke)(Some(obj.object()), &args).map_err(AccessError::Property);
                    }
                }
            }
        }
        Err(AccessError::undefined_property(name))
    }

    // ---- property write ----

    pub fn set_property(&self, target: &Value, name: &str, value: Value) -> AccessResult<()> {
        match target {
            Value::Object(obj) => {
                let chain = self.registry.ancestry(obj.class_name());
                let real = self
                    .check_write(&chain, name)
                    .ok_or_else(|| AccessError::undefined_property(name))?;
                for class_name in &chain {
                    let Some(desc) = self.registry.get(class_name) else { continue };
                    if let Some(prop) = desc.properties.get(real.as_ref()) {
                        if let Some(setter) = &prop.setter {
                            return setter(obj.object(), value).map_err(AccessError::Property);
                        }
                    }
                }
                Err(AccessError::undefined_property(name))
            }
            Value::Map(map) => {
                map.insert(Value::str(name), value)?;
                Ok(())
            }
            Value::List(list) => match name.parse::<usize>() {
                Ok(index) => {
                    list.set(index, value)?;
                    Ok(())
                }
                Err(_) => Err(AccessError::undefined_property(name)),
            },
            _ => Err(AccessError::undefined_property(name)),
        }
    }

    // ---- indexed access ----

    pub fn get_index(&self, target: &Value, key: &Value) -> AccessResult<Value> {
        match target {
            Value::List(list) => {
                let index = index_of(key).ok_or_else(|| AccessError::Property("invalid list index".to_owned()))?;
                list.get(index)
                    .ok_or_else(|| AccessError::Property(format!("index {index} out of bounds")))
            }
            Value::Map(map) => {
                if key.is_null() && !self.sandbox.allows_null_key() {
                    return Err(AccessError::Property("null key".to_owned()));
                }
                Ok(map.get(key).unwrap_or(Value::Null))
            }
            Value::Str(s) => {
                let index = index_of(key).ok_or_else(|| AccessError::Property("invalid string index".to_owned()))?;
                s.chars()
                    .nth(index)
                    .map(Value::Char)
                    .ok_or_else(|| AccessError::Property(format!("index {index} out of bounds")))
            }
            // fall through to the property path on the key's string form
            other => self.get_property(other, &key.to_display_string(), None),
        }
    }

    pub fn set_index(&self, target: &Value, key: &Value, value: Value) -> AccessResult<()> {
        match target {
            Value::List(list) => {
                let index = index_of(key).ok_or_else(|| AccessError::Property("invalid list index".to_owned()))?;
                list.set(index, value)?;
                Ok(())
            }
            Value::Map(map) => {
                if key.is_null() && !self.sandbox.allows_null_key() {
                    return Err(AccessError::Property("null key".to_owned()));
                }
                map.insert(key.clone(), value)?;
                Ok(())
            }
            other => self.set_property(other, &key.to_display_string(), value),
        }
    }

    // ---- method invocation ----

    pub fn invoke(&self, target: &Value, name: &str, args: &[Value], slot: Option<&AccessorSlot>) -> AccessResult<Value> {
        match target {
            Value::Object(obj) => self.object_invoke(obj, name, args, slot),
            other => builtin_invoke(other, name, args).unwrap_or_else(|| Err(AccessError::undefined_method(name))),
        }
    }

    fn object_invoke(&self, obj: &HostRef, name: &str, args: &[Value], slot: Option<&AccessorSlot>) -> AccessResult<Value> {
        let class = obj.class_name();
        if let Some(CachedAccessor::Method { class: cached, def }) = slot.and_then(AccessorSlot::load) {
            if cached.as_ref() == class && def.applicable(args, self.registry) {
                return (def.invoke)(Some(obj.object()), args).map_err(AccessError::Method);
            }
        }
        let chain = self.registry.ancestry(class);
        let real = self
            .check_exec_alias(&chain, name)
            .ok_or_else(|| AccessError::undefined_method(name))?;
        let mut overloads: Vec<MethodDef> = Vec::new();
        for class_name in &chain {
            if let Some(desc) = self.registry.get(class_name) {
                if let Some(defs) = desc.methods.get(real.as_ref()) {
                    // a subclass override shadows the inherited signature
                    for def in defs {
                        if !overloads.iter().any(|seen| seen.params == def.params && seen.varargs == def.varargs) {
                            overloads.push(def.clone());
                        }
                    }
                }
            }
        }
        let def = self.select_overload(&overloads, args, name)?;
        if let Some(slot) = slot {
            slot.store(CachedAccessor::Method {
                class: Arc::from(class),
                def: Arc::new(def.clone()),
            });
        }
        (def.invoke)(Some(obj.object()), args).map_err(AccessError::Method)
    }

    /// Best-match selection; structural ambiguity is never silently broken.
    fn select_overload<'m>(&self, overloads: &'m [MethodDef], args: &[Value], name: &str) -> AccessResult<&'m MethodDef> {
        let applicable: Vec<&MethodDef> = overloads.iter().filter(|d| d.applicable(args, self.registry)).collect();
        match applicable.len() {
            0 => Err(AccessError::undefined_method(name)),
            1 => Ok(applicable[0]),
            _ => {
                for candidate in &applicable {
                    if applicable
                        .iter()
                        .all(|other| std::ptr::eq(*candidate, *other) || candidate.more_specific_than(other, self.registry))
                    {
                        return Ok(candidate);
                    }
                }
                Err(AccessError::Ambiguous(format!("ambiguous method invocation '{name}'")))
            }
        }
    }

    /// Static-style invocation for `Class::method` references; the method
    /// closure receives no receiver.
    pub fn invoke_static(&self, class_name: &str, name: &str, args: &[Value]) -> AccessResult<Value> {
        let chain = self.registry.ancestry(class_name);
        let real = self
            .check_exec_alias(&chain, name)
            .ok_or_else(|| AccessError::undefined_method(name))?;
        let mut overloads: Vec<MethodDef> = Vec::new();
        for class_name in &chain {
            if let Some(desc) = self.registry.get(class_name) {
                if let Some(defs) = desc.methods.get(real.as_ref()) {
                    for def in defs {
                        if !overloads.iter().any(|seen| seen.params == def.params && seen.varargs == def.varargs) {
                            overloads.push(def.clone());
                        }
                    }
                }
            }
        }
        let def = self.select_overload(&overloads, args, name)?;
        (def.invoke)(None, args).map_err(AccessError::Method)
    }

    /// Constructor invocation for `new(Class, args...)`.
    pub fn construct(&self, class_name: &str, args: &[Value]) -> AccessResult<Value> {
        let desc = self
            .registry
            .get(class_name)
            .ok_or_else(|| AccessError::undefined_method(class_name))?;
        let chain = self.registry.ancestry(class_name);
        if self.check_exec_alias(&chain, "new").is_none() {
            return Err(AccessError::undefined_method(class_name));
        }
        let def = self.select_overload(&desc.constructors, args, class_name)?;
        (def.invoke)(None, args).map_err(AccessError::Method)
    }

    // ---- sandbox/permission gates ----

    /// Read gate: alias rewrite plus axis check. `None` means denied.
    fn check_read(&self, chain: &[Arc<str>], name: &str) -> Option<Arc<str>> {
        let real = self.sandbox.read(chain, name)?;
        if self.permissions.allows_read(chain, real.as_ref()) {
            Some(real)
        } else {
            None
        }
    }

    fn check_write(&self, chain: &[Arc<str>], name: &str) -> Option<Arc<str>> {
        let real = self.sandbox.write(chain, name)?;
        if self.permissions.allows_write(chain, real.as_ref()) {
            Some(real)
        } else {
            None
        }
    }

    fn check_exec_alias(&self, chain: &[Arc<str>], name: &str) -> Option<Arc<str>> {
        let real = self.sandbox.execute(chain, name)?;
        if self.permissions.allows_execute(chain, real.as_ref()) {
            Some(real)
        } else {
            None
        }
    }

    fn check_execute(&self, chain: &[Arc<str>], name: &str) -> bool {
        self.check_exec_alias(chain, name).is_some()
    }
}

fn map_pseudo_property(map: &crate::value::MapRef, name: &str) -> Option<Value> {
    match name {
        "size" => Some(Value::I32(map.len() as i32)),
        "empty" => Some(Value::Bool(map.is_empty())),
        "keys" => Some(Value::List(crate::value::ListRef::new(map.keys()))),
        "values" => Some(Value::List(crate::value::ListRef::new(map.values()))),
        _ => None,
    }
}

fn index_of(key: &Value) -> Option<usize> {
    match key {
        Value::I8(v) => usize::try_from(*v).ok(),
        Value::I16(v) => usize::try_from(*v).ok(),
        Value::I32(v) => usize::try_from(*v).ok(),
        Value::I64(v) => usize::try_from(*v).ok(),
        Value::F64(v) if v.fract() == 0.0 => usize::try_from(*v as i64).ok(),
        Value::Str(s) => s.parse().ok(),
        _ => None,
    }
}

/// Built-in methods on container and string values. Returns `None` when the
/// receiver has no such method, so callers can fall back to an undefined
/// error.
fn builtin_invoke(target: &Value, name: &str, args: &[Value]) -> Option<AccessResult<Value>> {
    let result = match (target, name, args) {
        (v, "toString", []) => Ok(Value::str(v.to_display_string())),
        (v, "size", []) => v
            .size_of()
            .map(Value::I64)
            .ok_or_else(|| AccessError::undefined_method("size")),
        (v, "isEmpty", []) => Ok(Value::Bool(v.is_empty_value())),

        (Value::List(list), "add", [item]) => list
            .push(item.clone())
            .map(|()| Value::Bool(true))
            .map_err(|_| AccessError::immutable("add")),
        (Value::List(list), "get", [index]) => match index_of(index) {
            Some(i) => Ok(list.get(i).unwrap_or(Value::Null)),
            None => Err(AccessError::Property("invalid list index".to_owned())),
        },
        (Value::List(list), "contains", [item]) => Ok(Value::Bool(list.snapshot().iter().any(|v| v.deep_eq(item)))),
        (Value::List(list), "indexOf", [item]) => Ok(Value::I32(
            list.snapshot()
                .iter()
                .position(|v| v.deep_eq(item))
                .map_or(-1, |i| i as i32),
        )),
        (Value::List(list), "remove", [index]) => match index_of(index) {
            Some(i) => list
                .remove_at(i)
                .map(|v| v.unwrap_or(Value::Null))
                .map_err(|_| AccessError::immutable("remove")),
            None => Err(AccessError::Property("invalid list index".to_owned())),
        },
        (Value::List(list), "clear", []) => list
            .clear()
            .map(|()| Value::Null)
            .map_err(|_| AccessError::immutable("clear")),

        (Value::Set(set), "add", [item]) => set
            .insert(item.clone())
            .map(Value::Bool)
            .map_err(|_| AccessError::immutable("add")),
        (Value::Set(set), "contains", [item]) => Ok(Value::Bool(set.contains(item))),
        (Value::Set(set), "remove", [item]) => set
            .remove(item)
            .map(Value::Bool)
            .map_err(|_| AccessError::immutable("remove")),
        (Value::Set(set), "clear", []) => set
            .clear()
            .map(|()| Value::Null)
            .map_err(|_| AccessError::immutable("clear")),

        (Value::Map(map), "get", [key]) => Ok(map.get(key).unwrap_or(Value::Null)),
        (Value::Map(map), "put", [key, value]) => map
            .insert(key.clone(), value.clone())
            .map(|prev| prev.unwrap_or(Value::Null))
            .map_err(|_| AccessError::immutable("put")),
        (Value::Map(map), "containsKey", [key]) => Ok(Value::Bool(map.contains_key(key))),
        (Value::Map(map), "remove", [key]) => map
            .remove(key)
            .map(|prev| prev.unwrap_or(Value::Null))
            .map_err(|_| AccessError::immutable("remove")),
        (Value::Map(map), "keySet", []) => Ok(Value::Set(crate::value::SetRef::new(map.keys()))),
        (Value::Map(map), "values", []) => Ok(Value::List(crate::value::ListRef::new(map.values()))),

        (Value::Str(s), "length", []) => Ok(Value::I32(s.chars().count() as i32)),
        (Value::Str(s), "contains", [needle]) => Ok(Value::Bool(s.contains(&needle.to_display_string()))),
        (Value::Str(s), "startsWith", [prefix]) => Ok(Value::Bool(s.starts_with(&prefix.to_display_string()))),
        (Value::Str(s), "endsWith", [suffix]) => Ok(Value::Bool(s.ends_with(&suffix.to_display_string()))),
        (Value::Str(s), "indexOf", [needle]) => Ok(Value::I32(
            s.find(&needle.to_display_string()).map_or(-1, |i| s[..i].chars().count() as i32),
        )),
        (Value::Str(s), "toUpperCase", []) => Ok(Value::str(s.to_uppercase())),
        (Value::Str(s), "toLowerCase", []) => Ok(Value::str(s.to_lowercase())),
        (Value::Str(s), "trim", []) => Ok(Value::str(s.trim())),
        (Value::Str(s), "substring", [from]) => match index_of(from) {
            Some(i) => Ok(Value::str(s.chars().skip(i).collect::<String>())),
            None => Err(AccessError::Property("invalid string index".to_owned())),
        },
        (Value::Str(s), "substring", [from, to]) => match (index_of(from), index_of(to)) {
            (Some(i), Some(j)) if i <= j => Ok(Value::str(s.chars().skip(i).take(j - i).collect::<String>())),
            _ => Err(AccessError::Property("invalid string index".to_owned())),
        },

        (Value::Range(r), "contains", [v]) => match v {
            Value::I32(x) => Ok(Value::Bool(r.contains(i64::from(*x)))),
            Value::I64(x) => Ok(Value::Bool(r.contains(*x))),
            _ => Ok(Value::Bool(false)),
        },
        _ => return None,
    };
    Some(result)
}
