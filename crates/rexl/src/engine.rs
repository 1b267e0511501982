//! The engine façade: configuration, compilation and convenience access.
//!
//! An [`Engine`] is built once (arithmetic options, sandbox, permissions,
//! class registry, cache capacity, property strategy, namespaces) and then
//! shared freely: it carries only immutable or lock-guarded state, so
//! compiled programs may be executed from any number of threads.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::{
    cache::ProgramCache,
    context::EngineOptions,
    error::{ErrorKind, EvalError, EvalResult, Span},
    introspect::{ClassDescriptor, ClassRegistry, Introspector, PropertyStrategy},
    parser::parse_script,
    permissions::Permissions,
    program::{Closure, CollectMode, Program},
    sandbox::Sandbox,
    types::MathContext,
    value::{Value, ValueKey},
};

pub(crate) struct EngineCore {
    pub options: EngineOptions,
    pub sandbox: Sandbox,
    pub permissions: Permissions,
    pub registry: ClassRegistry,
    pub strategy: PropertyStrategy,
    pub collect_mode: CollectMode,
    pub namespaces: AHashMap<String, Value>,
    pub cache: ProgramCache,
    /// `@synchronized` monitors, keyed by value; created on first use and
    /// retained for the engine's lifetime.
    monitors: Mutex<AHashMap<ValueKey, Arc<Mutex<()>>>>,
}

impl EngineCore {
    pub fn monitor(&self, key: &Value) -> Arc<Mutex<()>> {
        let mut monitors = self.monitors.lock();
        Arc::clone(monitors.entry(key.as_key()).or_default())
    }

    fn introspector(&self) -> Introspector<'_> {
        Introspector {
            registry: &self.registry,
            sandbox: &self.sandbox,
            permissions: &self.permissions,
            strategy: self.strategy,
        }
    }
}

/// The expression/script engine.
///
/// # Example
/// ```
/// use rexl::{Engine, MapContext, Value};
///
/// let engine = Engine::new();
/// let script = engine.compile("var total = 0; for (var i : 1..4) { total = total + i }; total").unwrap();
/// assert_eq!(script.execute(&MapContext::new(), &[]).unwrap(), Value::I32(10));
/// ```
#[derive(Clone)]
pub struct Engine {
    core: Arc<EngineCore>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with default options, an open sandbox and unrestricted
    /// permissions.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub(crate) fn from_core(core: Arc<EngineCore>) -> Self {
        Self { core }
    }

    /// Registers a host class descriptor; may be called after build.
    pub fn register_class(&self, descriptor: ClassDescriptor) {
        self.core.registry.register(descriptor);
    }

    #[must_use]
    pub fn registry(&self) -> &ClassRegistry {
        &self.core.registry
    }

    /// Compiles (or fetches from cache) a parameterless program.
    pub fn compile(&self, source: &str) -> EvalResult<Program> {
        self.compile_with_params(source, &[])
    }

    /// Compiles a program with named parameters bound at execute time.
    pub fn compile_with_params(&self, source: &str, params: &[&str]) -> EvalResult<Program> {
        let key = if params.is_empty() {
            source.to_owned()
        } else {
            format!("{}\u{0}{source}", params.join(","))
        };
        let body = match self.core.cache.get(&key) {
            Some(body) => body,
            None => {
                let params: Vec<Arc<str>> = params.iter().map(|p| Arc::from(*p)).collect();
                let body = Arc::new(parse_script(source, &params)?);
                // a failed parse never reaches this point
                self.core.cache.put(key, Arc::clone(&body));
                body
            }
        };
        Ok(Program {
            core: Arc::clone(&self.core),
            closure: Arc::new(Closure::top_level(body)),
        })
    }

    /// (hits, misses) of the program cache.
    #[must_use]
    pub fn cache_stats(&self) -> (u64, u64) {
        self.core.cache.stats()
    }

    // ---- convenience operations; same sandbox, no program required ----

    /// Reads `obj.path`, walking dot-separated segments.
    pub fn get_property(&self, target: &Value, path: &str) -> EvalResult<Value> {
        let intro = self.core.introspector();
        let mut current = target.clone();
        for segment in path.split('.') {
            current = intro
                .get_property(&current, segment, None)
                .map_err(|e| convenience_error(e))?;
        }
        Ok(current)
    }

    /// Writes `obj.path = value`; intermediate segments are read.
    pub fn set_property(&self, target: &Value, path: &str, value: Value) -> EvalResult<()> {
        let intro = self.core.introspector();
        let mut current = target.clone();
        let segments: Vec<&str> = path.split('.').collect();
        for segment in &segments[..segments.len() - 1] {
            current = intro
                .get_property(&current, segment, None)
                .map_err(|e| convenience_error(e))?;
        }
        intro
            .set_property(&current, segments[segments.len() - 1], value)
            .map_err(|e| convenience_error(e))
    }

    pub fn invoke_method(&self, target: &Value, name: &str, args: &[Value]) -> EvalResult<Value> {
        self.core
            .introspector()
            .invoke(target, name, args, None)
            .map_err(|e| convenience_error(e))
    }

    pub fn new_instance(&self, class: &str, args: &[Value]) -> EvalResult<Value> {
        self.core
            .introspector()
            .construct(class, args)
            .map_err(|e| convenience_error(e))
    }
}

fn convenience_error(err: crate::introspect::AccessError) -> EvalError {
    use crate::introspect::AccessError;
    let span = Span::default();
    match err {
        AccessError::Property(m) => EvalError::new(ErrorKind::Property, span, m),
        AccessError::Method(m) => EvalError::new(ErrorKind::Method, span, m),
        AccessError::Ambiguous(m) => EvalError::new(ErrorKind::AmbiguousMethod, span, m),
        AccessError::Arithmetic(m) => EvalError::new(ErrorKind::Arithmetic, span, m),
    }
}

/// Configures and builds an [`Engine`].
pub struct EngineBuilder {
    options: EngineOptions,
    sandbox: Sandbox,
    permissions: Permissions,
    registry: ClassRegistry,
    strategy: PropertyStrategy,
    collect_mode: CollectMode,
    cache_capacity: usize,
    namespaces: AHashMap<String, Value>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            options: EngineOptions::default(),
            sandbox: Sandbox::default(),
            permissions: Permissions::unrestricted(),
            registry: ClassRegistry::default(),
            strategy: PropertyStrategy::default(),
            collect_mode: CollectMode::default(),
            cache_capacity: 512,
            namespaces: AHashMap::new(),
        }
    }
}

impl EngineBuilder {
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    #[must_use]
    pub fn silent(mut self, silent: bool) -> Self {
        self.options.silent = silent;
        self
    }

    #[must_use]
    pub fn safe(mut self, safe: bool) -> Self {
        self.options.safe = safe;
        self
    }

    #[must_use]
    pub fn strict_arithmetic(mut self, strict: bool) -> Self {
        self.options.strict_arithmetic = strict;
        self
    }

    #[must_use]
    pub fn cancellable(mut self, cancellable: bool) -> Self {
        self.options.cancellable = cancellable;
        self
    }

    #[must_use]
    pub fn math_context(mut self, context: MathContext) -> Self {
        self.options.math_context = context;
        self
    }

    #[must_use]
    pub fn math_scale(mut self, scale: u32) -> Self {
        self.options.math_scale = Some(scale);
        self
    }

    #[must_use]
    pub fn sandbox(mut self, sandbox: Sandbox) -> Self {
        self.sandbox = sandbox;
        self
    }

    #[must_use]
    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn strategy(mut self, strategy: PropertyStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn collect_mode(mut self, mode: CollectMode) -> Self {
        self.collect_mode = mode;
        self
    }

    /// Program cache capacity; zero disables caching.
    #[must_use]
    pub fn cache(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Registers a namespace for `ns:fn(...)` calls. The value is either a
    /// host object (its methods become the functions) or a map of
    /// name→script.
    #[must_use]
    pub fn namespace(mut self, name: impl Into<String>, value: Value) -> Self {
        self.namespaces.insert(name.into(), value);
        self
    }

    /// Registers a host class descriptor.
    #[must_use]
    pub fn class(self, descriptor: ClassDescriptor) -> Self {
        self.registry.register(descriptor);
        self
    }

    #[must_use]
    pub fn build(self) -> Engine {
        Engine {
            core: Arc::new(EngineCore {
                options: self.options,
                sandbox: self.sandbox,
                permissions: self.permissions,
                registry: self.registry,
                strategy: self.strategy,
                collect_mode: self.collect_mode,
                namespaces: self.namespaces,
                cache: ProgramCache::new(self.cache_capacity),
                monitors: Mutex::new(AHashMap::new()),
            }),
        }
    }
}
