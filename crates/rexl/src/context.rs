//! Evaluation contexts and per-evaluation options.
//!
//! A [`Context`] supplies variables to an evaluation, optionally resolves
//! namespaces for `ns:fn(...)` calls, processes annotations, and may
//! override the engine's option defaults for one evaluation. Contexts use
//! interior mutability (`&self` methods) so one context can be shared by
//! concurrent evaluations; atomicity across evaluations is the host's
//! concern.

use std::sync::{atomic::AtomicBool, Arc};

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::{
    error::EvalError,
    introspect::{ClassRegistry, Introspector, PropertyStrategy},
    permissions::Permissions,
    sandbox::Sandbox,
    types::MathContext,
    value::{HostRef, Value},
};

/// Engine-wide option defaults, overrideable per evaluation via
/// [`Context::options`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Unknown variables and methods fail; when false they evaluate to
    /// null and are logged at debug level.
    pub strict: bool,
    /// Errors do not throw; they log a warning and the failing expression
    /// yields null.
    pub silent: bool,
    /// A null receiver in a property/method chain yields null instead of
    /// an error.
    pub safe: bool,
    /// Null operands to numeric operators fail instead of zero-coercing.
    pub strict_arithmetic: bool,
    /// An external cancel raises `CancelError` at the next statement
    /// boundary; when false a cancelled evaluation simply returns null.
    pub cancellable: bool,
    pub math_context: MathContext,
    /// Fractional digits for decimal division; `None` lets the context
    /// precision govern.
    pub math_scale: Option<u32>,
    /// External cancellation flag for this evaluation, observed at
    /// statement boundaries and loop iterations.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            strict: true,
            silent: false,
            safe: false,
            strict_arithmetic: true,
            cancellable: true,
            math_context: MathContext::default(),
            math_scale: None,
            cancel: None,
        }
    }
}

/// The annotation processing callable handed to
/// [`Context::process_annotation`]; runs the annotated statement.
pub type AnnotationBody<'a> = dyn FnMut() -> Result<Value, EvalError> + 'a;

/// Variable supplier for one evaluation.
pub trait Context: Send + Sync {
    fn has(&self, name: &str) -> bool;

    fn get(&self, name: &str) -> Option<Value>;

    /// Binds or updates a variable. Read-only contexts return an error
    /// message.
    fn set(&self, name: &str, value: Value) -> Result<(), String>;

    /// Resolves a namespace prefix for `ns:fn(...)`; `None` defers to the
    /// engine's registered namespaces.
    fn resolve_namespace(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Per-evaluation option overrides.
    fn options(&self) -> Option<EngineOptions> {
        None
    }

    /// Handles `@name(args) stmt`. Returning `None` marks the annotation
    /// unknown; `Some(result)` becomes the statement's value. The `body`
    /// callable evaluates the annotated statement and may be invoked any
    /// number of times (including zero).
    fn process_annotation(&self, _name: &str, _args: &[Value], _body: &mut AnnotationBody<'_>) -> Option<Result<Value, EvalError>> {
        None
    }
}

/// Plain name→value map context.
#[derive(Debug, Default)]
pub struct MapContext {
    vars: RwLock<AHashMap<String, Value>>,
    options: Option<EngineOptions>,
}

impl MapContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context carrying per-evaluation option overrides.
    #[must_use]
    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            vars: RwLock::new(AHashMap::new()),
            options: Some(options),
        }
    }

    #[must_use]
    pub fn with_var(self, name: impl Into<String>, value: Value) -> Self {
        self.vars.write().insert(name.into(), value);
        self
    }
}

impl Context for MapContext {
    fn has(&self, name: &str) -> bool {
        self.vars.read().contains_key(name)
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.vars.read().get(name).cloned()
    }

    fn set(&self, name: &str, value: Value) -> Result<(), String> {
        self.vars.write().insert(name.to_owned(), value);
        Ok(())
    }

    fn options(&self) -> Option<EngineOptions> {
        self.options.clone()
    }
}

/// A host object serving as a context: its registered properties behave as
/// variables.
pub struct ObjectContext {
    object: HostRef,
    registry: ClassRegistry,
    sandbox: Sandbox,
    permissions: Permissions,
}

impl ObjectContext {
    #[must_use]
    pub fn new(object: HostRef, registry: ClassRegistry) -> Self {
        Self {
            object,
            registry,
            sandbox: Sandbox::default(),
            permissions: Permissions::unrestricted(),
        }
    }

    fn introspector(&self) -> Introspector<'_> {
        Introspector {
            registry: &self.registry,
            sandbox: &self.sandbox,
            permissions: &self.permissions,
            strategy: PropertyStrategy::default(),
        }
    }
}

impl Context for ObjectContext {
    fn has(&self, name: &str) -> bool {
        self.introspector()
            .get_property(&Value::Object(self.object.clone()), name, None)
            .is_ok()
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.introspector()
            .get_property(&Value::Object(self.object.clone()), name, None)
            .ok()
    }

    fn set(&self, name: &str, value: Value) -> Result<(), String> {
        self.introspector()
            .set_property(&Value::Object(self.object.clone()), name, value)
            .map_err(|_| format!("cannot write variable '{name}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_context_round_trip() {
        let ctx = MapContext::new().with_var("x", Value::I32(42));
        assert!(ctx.has("x"));
        assert_eq!(ctx.get("x"), Some(Value::I32(42)));
        ctx.set("y", Value::str("hi")).unwrap();
        assert_eq!(ctx.get("y"), Some(Value::str("hi")));
        assert!(!ctx.has("z"));
    }

    #[test]
    fn dotted_names_are_plain_keys() {
        let ctx = MapContext::new();
        ctx.set("froboz.value", Value::I32(10)).unwrap();
        assert!(ctx.has("froboz.value"));
        assert_eq!(ctx.get("froboz.value"), Some(Value::I32(10)));
    }
}
