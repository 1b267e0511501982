//! Compiled programs and closures.
//!
//! A [`ScriptBody`] is the shareable compile product: source text,
//! parameter names, frame layout and root node. A [`Closure`] pairs a body
//! with captured cells and curried arguments; the public [`Program`] wraps
//! a closure with its owning engine. Parsing happens once; a program may be
//! executed any number of times, concurrently, against different contexts.

use std::{fmt, sync::Arc};

use parking_lot::RwLock;

use crate::{
    ast::{Node, NodeKind},
    context::Context,
    engine::{Engine, EngineCore},
    error::{ErrorKind, EvalError, EvalResult},
    interpreter::execute_closure,
    scope::FrameLayout,
    value::Value,
};

/// How [`Program::variables`] treats constant bracket subscripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectMode {
    /// `a['b']` and `a[1]` append to the dotted path.
    #[default]
    All,
    /// Only dot-accessed segments are appended.
    ReferencesOnly,
}

/// The immutable compile product of one script or lambda.
pub struct ScriptBody {
    source: Arc<str>,
    params: Vec<Arc<str>>,
    layout: FrameLayout,
    root: Node,
    expression: bool,
}

impl fmt::Debug for ScriptBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptBody")
            .field("source", &self.source)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl ScriptBody {
    pub(crate) fn new(source: &str, params: Vec<Arc<str>>, layout: FrameLayout, root: Node, expression: bool) -> Self {
        Self {
            source: Arc::from(source),
            params,
            layout,
            root,
            expression,
        }
    }

    pub(crate) fn parameters(&self) -> &[Arc<str>] {
        &self.params
    }

    pub(crate) fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub(crate) fn root(&self) -> &Node {
        &self.root
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn is_expression(&self) -> bool {
        self.expression
    }
}

/// A runtime script value: body + captured cells + curried arguments.
#[derive(Debug)]
pub struct Closure {
    pub(crate) body: Arc<ScriptBody>,
    /// Cells shared by reference with the frame the closure was created in.
    pub(crate) captures: Vec<Arc<RwLock<Value>>>,
    /// Arguments bound by currying, filling leading parameters.
    pub(crate) bound: Vec<Value>,
}

impl Closure {
    pub(crate) fn top_level(body: Arc<ScriptBody>) -> Self {
        Self {
            body,
            captures: Vec::new(),
            bound: Vec::new(),
        }
    }

    /// Parameters not yet bound by currying.
    pub(crate) fn unbound(&self) -> &[Arc<str>] {
        &self.body.parameters()[self.bound.len().min(self.body.parameters().len())..]
    }

    pub(crate) fn curried(&self, args: &[Value]) -> Self {
        let mut bound = self.bound.clone();
        bound.extend(args.iter().cloned());
        Self {
            body: Arc::clone(&self.body),
            captures: self.captures.clone(),
            bound,
        }
    }
}

/// A compiled program bound to its engine.
///
/// # Example
/// ```
/// use rexl::{Engine, MapContext, Value};
///
/// let engine = Engine::new();
/// let program = engine.compile("x + 1").unwrap();
/// let ctx = MapContext::new().with_var("x", Value::I32(41));
/// assert_eq!(program.execute(&ctx, &[]).unwrap(), Value::I32(42));
/// ```
#[derive(Clone)]
pub struct Program {
    pub(crate) core: Arc<EngineCore>,
    pub(crate) closure: Arc<Closure>,
}

impl Program {
    /// Runs the program, binding `args` to its unbound parameters in
    /// order. Surplus arguments are ignored; missing ones are null.
    pub fn execute(&self, context: &dyn Context, args: &[Value]) -> EvalResult<Value> {
        let options = context.options().unwrap_or_else(|| self.core.options.clone());
        let result = execute_closure(&self.core, context, &options, &self.closure, args);
        match result {
            Err(e)
                if options.silent
                    && e.catchable()
                    && e.kind != ErrorKind::Parse
                    && e.kind != ErrorKind::AmbiguousMethod =>
            {
                log::warn!("silent evaluation failure: {e}");
                Ok(Value::Null)
            }
            other => other.map_err(|e| e.located(self.closure.body.source())),
        }
    }

    /// Expression-only evaluation; statement programs are rejected.
    pub fn evaluate(&self, context: &dyn Context) -> EvalResult<Value> {
        if !self.closure.body.is_expression() {
            return Err(EvalError::new(
                ErrorKind::Parse,
                self.closure.body.root().span,
                "not an expression; use execute",
            ));
        }
        self.execute(context, &[])
    }

    /// Binds leading parameters, returning a program with the remaining
    /// unbound list. No evaluation happens at curry time.
    #[must_use]
    pub fn curry(&self, args: &[Value]) -> Self {
        Self {
            core: Arc::clone(&self.core),
            closure: Arc::new(self.closure.curried(args)),
        }
    }

    /// The program as a script value, callable from other programs (e.g.
    /// bound into a context or namespace map).
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Script(Arc::clone(&self.closure))
    }

    /// A deferred invocation; errors surface when the thunk is called.
    #[must_use]
    pub fn callable<'a>(&self, context: &'a dyn Context, args: &[Value]) -> ProgramCall<'a> {
        ProgramCall {
            program: self.clone(),
            context,
            args: args.to_vec(),
        }
    }

    #[must_use]
    pub fn engine(&self) -> Engine {
        Engine::from_core(Arc::clone(&self.core))
    }

    /// All declared parameter names.
    #[must_use]
    pub fn parameters(&self) -> Vec<String> {
        self.closure.body.parameters().iter().map(|p| p.to_string()).collect()
    }

    /// Parameters not yet bound by currying.
    #[must_use]
    pub fn unbound_parameters(&self) -> Vec<String> {
        self.closure.unbound().iter().map(|p| p.to_string()).collect()
    }

    /// Local variable names, excluding parameters.
    #[must_use]
    pub fn local_variables(&self) -> Vec<String> {
        let layout = self.closure.body.layout();
        layout
            .slots
            .iter()
            .skip(layout.params as usize)
            .map(|s| s.name.to_string())
            .collect()
    }

    /// Captured variable names.
    #[must_use]
    pub fn captured_variables(&self) -> Vec<String> {
        self.closure
            .body
            .layout()
            .captures
            .iter()
            .map(|c| c.name.to_string())
            .collect()
    }

    /// The set of external references the program reads, each as a dotted
    /// path. Constant bracket subscripts append to the path in
    /// [`CollectMode::All`].
    #[must_use]
    pub fn variables(&self) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        collect_variables(self.closure.body.root(), self.core.collect_mode, &mut out);
        out
    }

    #[must_use]
    pub fn source_text(&self) -> &str {
        self.closure.body.source()
    }

    /// The source re-rendered from the parsed tree.
    #[must_use]
    pub fn parsed_text(&self) -> String {
        let NodeKind::Block(body) = &self.closure.body.root().kind else {
            return self.closure.body.root().rendered();
        };
        let mut out = String::new();
        for (i, stmt) in body.iter().enumerate() {
            if i > 0 {
                out.push_str("; ");
            }
            stmt.render(&mut out);
        }
        out
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parsed_text())
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program").field("source", &self.source_text()).finish()
    }
}

/// Deferred program invocation produced by [`Program::callable`].
pub struct ProgramCall<'a> {
    program: Program,
    context: &'a dyn Context,
    args: Vec<Value>,
}

impl ProgramCall<'_> {
    pub fn call(self) -> EvalResult<Value> {
        self.program.execute(self.context, &self.args)
    }
}

// ---- external variable collection ----

fn collect_variables(node: &Node, mode: CollectMode, out: &mut Vec<Vec<String>>) {
    if let Some(path) = reference_path(node, mode) {
        if !out.contains(&path) {
            out.push(path);
        }
        // still scan subscript keys for nested references
        if let NodeKind::GetIndex { keys, .. } = &node.kind {
            for key in keys {
                collect_variables(key, mode, out);
            }
        }
        return;
    }
    each_child(node, &mut |child| collect_variables(child, mode, out));
}

/// A pure dotted reference path rooted at a context variable, or `None`.
fn reference_path(node: &Node, mode: CollectMode) -> Option<Vec<String>> {
    match &node.kind {
        NodeKind::ContextVar(name) => Some(vec![name.to_string()]),
        NodeKind::GetProp {
            object, name, safe: false, ..
        } => {
            let mut path = reference_path(object, mode)?;
            path.push(name.to_string());
            Some(path)
        }
        NodeKind::GetIndex {
            object,
            keys,
            safe: false,
        } if mode == CollectMode::All && keys.len() == 1 => {
            let segment = constant_segment(&keys[0])?;
            let mut path = reference_path(object, mode)?;
            path.push(segment);
            Some(path)
        }
        _ => None,
    }
}

fn constant_segment(node: &Node) -> Option<String> {
    match &node.kind {
        NodeKind::Literal(crate::ast::Literal::Str(s)) => Some(s.to_string()),
        NodeKind::Literal(crate::ast::Literal::Int(v)) => Some(v.to_string()),
        _ => None,
    }
}

/// Invokes `visit` on every direct child node.
fn each_child(node: &Node, visit: &mut dyn FnMut(&Node)) {
    match &node.kind {
        NodeKind::Literal(_) | NodeKind::Var(..) | NodeKind::ContextVar(_) | NodeKind::Break | NodeKind::Continue => {}
        NodeKind::ListLit { items, .. } | NodeKind::SetLit { items, .. } => items.iter().for_each(&mut *visit),
        NodeKind::MapLit { pairs, .. } => {
            for (k, v) in pairs {
                visit(k);
                visit(v);
            }
        }
        NodeKind::GetProp { object, .. } => visit(object),
        NodeKind::GetIndex { object, keys, .. } => {
            visit(object);
            keys.iter().for_each(&mut *visit);
        }
        NodeKind::MethodCall { object, args, .. } => {
            visit(object);
            args.iter().for_each(&mut *visit);
        }
        NodeKind::CallValue { callee, args } => {
            visit(callee);
            args.iter().for_each(&mut *visit);
        }
        NodeKind::NamespaceCall { args, .. } | NodeKind::New { args } => args.iter().for_each(&mut *visit),
        NodeKind::MethodRefOf { target, .. } => visit(target),
        NodeKind::Unary { operand, .. } => visit(operand),
        NodeKind::Binary { lhs, rhs, .. } => {
            visit(lhs);
            visit(rhs);
        }
        NodeKind::Ternary { cond, then, otherwise } => {
            visit(cond);
            visit(then);
            visit(otherwise);
        }
        NodeKind::Assign { target, value, .. } => {
            visit(target);
            visit(value);
        }
        NodeKind::IncDec { target, .. } => visit(target),
        NodeKind::Decl { init, .. } => {
            if let Some(init) = init {
                visit(init);
            }
        }
        NodeKind::DeclMulti { init, .. } => visit(init),
        NodeKind::Block(body) => body.iter().for_each(&mut *visit),
        NodeKind::If { cond, then, otherwise } => {
            visit(cond);
            visit(then);
            if let Some(otherwise) = otherwise {
                visit(otherwise);
            }
        }
        NodeKind::While { cond, body } => {
            visit(cond);
            visit(body);
        }
        NodeKind::DoWhile { body, cond } => {
            visit(body);
            visit(cond);
        }
        NodeKind::ForEach { iterable, body, .. } => {
            visit(iterable);
            visit(body);
        }
        NodeKind::ForClassic {
            init,
            cond,
            update,
            body,
        } => {
            for part in [init, cond, update].into_iter().flatten() {
                visit(part);
            }
            visit(body);
        }
        NodeKind::Return(value) => {
            if let Some(value) = value {
                visit(value);
            }
        }
        NodeKind::Throw(value) => visit(value),
        NodeKind::Try {
            resources,
            body,
            catch,
            finally,
        } => {
            resources.iter().for_each(&mut *visit);
            visit(body);
            if let Some(catch) = catch {
                visit(&catch.body);
            }
            if let Some(finally) = finally {
                visit(finally);
            }
        }
        NodeKind::Switch { subject, cases, .. } => {
            visit(subject);
            for case in cases {
                case.labels.iter().for_each(&mut *visit);
                visit(&case.body);
            }
        }
        NodeKind::Lambda(body) => visit(body.root()),
        NodeKind::Annotation { args, body, .. } => {
            args.iter().for_each(&mut *visit);
            visit(body);
        }
        NodeKind::Filter { object, predicate } => {
            visit(object);
            visit(predicate);
        }
        NodeKind::Project { object, projector } => {
            visit(object);
            visit(projector);
        }
    }
}
