//! The tree-walking evaluator.
//!
//! Control flow travels as a sum-typed signal rather than unwinding:
//! every node evaluation returns `Flow<Value>` where the error side carries
//! `Return`/`Break`/`Continue` or a typed failure. `try/finally` traps and
//! re-projects signals; the program boundary converts them to results.
//! Cancellation is observed at statement boundaries and loop iterations
//! only.

use std::sync::{atomic::Ordering, Arc};

use smallvec::SmallVec;

use crate::{
    arithmetic::{Arithmetic, BitwiseOp},
    ast::{BinOp, Node, NodeKind, SwitchCase, UnOp},
    context::{Context, EngineOptions},
    engine::EngineCore,
    error::{ErrorKind, EvalError, EvalResult, Span},
    introspect::{AccessError, AccessorSlot, Introspector},
    program::{Closure, ScriptBody},
    scope::{Frame, FrameLayout, VarRef},
    types::IntRangeIter,
    value::{MethodRef, MethodTarget, Value},
};

/// Hard ceiling on script-level call nesting.
const MAX_CALL_DEPTH: usize = 192;

/// Argument vectors are almost always tiny; keep them off the heap.
type Args = SmallVec<[Value; 4]>;

/// Non-local exits flowing out of node evaluation.
#[derive(Debug)]
pub(crate) enum Signal {
    Fail(EvalError),
    Return(Value),
    Break(Span),
    Continue(Span),
}

impl From<EvalError> for Signal {
    fn from(e: EvalError) -> Self {
        Self::Fail(e)
    }
}

pub(crate) type Flow<T> = Result<T, Signal>;

/// Runs a closure against a context; the entry point used by programs,
/// lambdas and method references alike.
pub(crate) fn execute_closure(
    core: &EngineCore,
    context: &dyn Context,
    options: &EngineOptions,
    closure: &Closure,
    args: &[Value],
) -> EvalResult<Value> {
    run_closure(core, context, options, closure, args, 0)
}

fn run_closure(
    core: &EngineCore,
    context: &dyn Context,
    options: &EngineOptions,
    closure: &Closure,
    args: &[Value],
    depth: usize,
) -> EvalResult<Value> {
    let body = &closure.body;
    let mut frame = Frame::new(body.layout(), closure.captures.clone());
    // curried arguments fill leading parameters; surplus call arguments are
    // ignored, missing ones stay null
    let params = body.parameters().len();
    let supplied = closure.bound.iter().chain(args.iter());
    for (index, value) in supplied.take(params).enumerate() {
        frame.bind(index as u16, value.clone());
    }
    let mut interp = Interpreter {
        core,
        context,
        options,
        arithmetic: Arithmetic {
            strict: options.strict_arithmetic,
            math_context: options.math_context,
            math_scale: options.math_scale,
        },
        layout: body.layout(),
        frame,
        depth,
    };
    match interp.eval(body.root()) {
        Ok(v) | Err(Signal::Return(v)) => Ok(v),
        Err(Signal::Fail(e)) => Err(e),
        Err(Signal::Break(span)) => Err(EvalError::parse(span, "'break' outside of a loop")),
        Err(Signal::Continue(span)) => Err(EvalError::parse(span, "'continue' outside of a loop")),
    }
}

struct Interpreter<'a> {
    core: &'a EngineCore,
    context: &'a dyn Context,
    options: &'a EngineOptions,
    arithmetic: Arithmetic,
    layout: &'a FrameLayout,
    frame: Frame,
    depth: usize,
}

impl Interpreter<'_> {
    fn introspector(&self) -> Introspector<'_> {
        Introspector {
            registry: &self.core.registry,
            sandbox: &self.core.sandbox,
            permissions: &self.core.permissions,
            strategy: self.core.strategy,
        }
    }

    /// Cancellation check; runs at statement boundaries and loop
    /// iterations.
    fn check_cancel(&self, span: Span) -> Flow<()> {
        if let Some(flag) = &self.options.cancel {
            if flag.load(Ordering::Acquire) {
                return if self.options.cancellable {
                    Err(EvalError::cancel(span).into())
                } else {
                    Err(Signal::Return(Value::Null))
                };
            }
        }
        Ok(())
    }

    fn access_error(&self, err: AccessError, span: Span) -> EvalError {
        match err {
            AccessError::Property(m) => EvalError::new(ErrorKind::Property, span, m),
            AccessError::Method(m) => EvalError::new(ErrorKind::Method, span, m),
            AccessError::Ambiguous(m) => EvalError::new(ErrorKind::AmbiguousMethod, span, m),
            AccessError::Arithmetic(m) => EvalError::new(ErrorKind::Arithmetic, span, m),
        }
    }

    /// Lenient-mode interception: unknown variables, properties and
    /// methods evaluate to null when `strict` is off.
    fn soften(&self, err: EvalError) -> Flow<Value> {
        if !self.options.strict
            && matches!(err.kind, ErrorKind::Variable | ErrorKind::Property | ErrorKind::Method)
        {
            log::debug!("lenient evaluation: {}", err.message);
            return Ok(Value::Null);
        }
        Err(err.into())
    }

    // ---- the dispatcher ----

    fn eval(&mut self, node: &Node) -> Flow<Value> {
        let span = node.span;
        match &node.kind {
            NodeKind::Literal(lit) => Ok(lit.to_value()),
            NodeKind::ListLit {
                items,
                immutable,
                sequence,
            } => {
                let mut builder = self.arithmetic.array_builder(*immutable, *sequence);
                for item in items {
                    builder.add(self.eval(item)?);
                }
                Ok(builder.create(&self.core.registry))
            }
            NodeKind::SetLit { items, immutable } => {
                let mut builder = self.arithmetic.set_builder(*immutable);
                for item in items {
                    builder.add(self.eval(item)?);
                }
                Ok(builder.create())
            }
            NodeKind::MapLit { pairs, immutable } => {
                let mut builder = self.arithmetic.map_builder(*immutable);
                for (key, value) in pairs {
                    let key = self.eval(key)?;
                    let value = self.eval(value)?;
                    builder.put(key, value);
                }
                Ok(builder.create())
            }
            NodeKind::Var(var, _) => Ok(self.frame.get(*var)),
            NodeKind::ContextVar(name) => self.read_context_var(name, span),
            NodeKind::GetProp {
                object,
                name,
                safe,
                antish,
                slot,
            } => self.eval_get_prop(object, name, *safe, antish.as_deref(), slot, span),
            NodeKind::GetIndex { object, keys, safe } => {
                let target = match self.eval_receiver(object)? {
                    Some(v) => v,
                    None => return Ok(Value::Null),
                };
                if target.is_null() {
                    return if *safe || self.options.safe {
                        Ok(Value::Null)
                    } else {
                        Err(EvalError::new(ErrorKind::Property, span, "indexed access on null").into())
                    };
                }
                let mut current = target;
                for key in keys {
                    let key = self.eval(key)?;
                    match self.introspector().get_index(&current, &key) {
                        Ok(v) => current = v,
                        Err(e) => return self.soften(self.access_error(e, span)),
                    }
                }
                Ok(current)
            }
            NodeKind::MethodCall {
                object,
                name,
                args,
                safe,
                slot,
            } => self.eval_method_call(object, name, args, *safe, slot, span),
            NodeKind::CallValue { callee, args } => self.eval_call_value(callee, args, span),
            NodeKind::NamespaceCall { ns, name, args } => self.eval_namespace_call(ns, name, args, span),
            NodeKind::New { args } => {
                let class = self.eval(&args[0])?;
                let Value::Str(class_name) = class else {
                    return Err(EvalError::method(span, &class.to_display_string()).into());
                };
                let mut ctor_args = Args::new();
                for arg in &args[1..] {
                    ctor_args.push(self.eval(arg)?);
                }
                self.introspector()
                    .construct(&class_name, &ctor_args)
                    .map_err(|e| self.access_error(e, span).into())
            }
            NodeKind::MethodRefOf { target, name } => self.eval_method_ref(target, name, span),
            NodeKind::Unary { op, operand } => self.eval_unary(*op, operand, span),
            NodeKind::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, span),
            NodeKind::Ternary { cond, then, otherwise } => {
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            NodeKind::Assign { target, op, value } => self.eval_assign(target, *op, value, span),
            NodeKind::IncDec {
                target,
                increment,
                prefix,
            } => {
                let old = self.eval(target)?;
                let one = Value::I32(1);
                let new = if *increment {
                    self.arithmetic.add(&old, &one)
                } else {
                    self.arithmetic.subtract(&old, &one)
                }
                .map_err(|m| EvalError::arithmetic(span, m))?;
                self.write_target(target, new.clone(), span)?;
                Ok(if *prefix { new } else { old })
            }
            NodeKind::Decl { var, init, .. } => {
                let value = match init {
                    Some(init) => {
                        let value = self.eval(init)?;
                        self.frame
                            .assign(self.layout, VarRef::Local(*var), value, &self.arithmetic)
                            .map_err(|m| EvalError::new(ErrorKind::Variable, span, m))?;
                        self.frame.get(VarRef::Local(*var))
                    }
                    None => self.frame.get(VarRef::Local(*var)),
                };
                Ok(value)
            }
            NodeKind::DeclMulti { vars, init, .. } => {
                let value = self.eval(init)?;
                let items = match &value {
                    Value::List(list) => list.snapshot(),
                    Value::Set(set) => set.snapshot(),
                    other => vec![other.clone()],
                };
                for (i, var) in vars.iter().enumerate() {
                    // extra elements are ignored, missing ones become null
                    let item = items.get(i).cloned().unwrap_or(Value::Null);
                    self.frame
                        .assign(self.layout, VarRef::Local(*var), item, &self.arithmetic)
                        .map_err(|m| EvalError::new(ErrorKind::Variable, span, m))?;
                }
                Ok(value)
            }
            NodeKind::Block(body) => self.eval_block(body),
            NodeKind::If { cond, then, otherwise } => {
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)
                } else if let Some(otherwise) = otherwise {
                    self.eval(otherwise)
                } else {
                    Ok(Value::Null)
                }
            }
            NodeKind::While { cond, body } => {
                let mut last = Value::Null;
                while self.eval(cond)?.is_truthy() {
                    self.check_cancel(span)?;
                    match self.eval(body) {
                        Ok(v) => last = v,
                        Err(Signal::Break(_)) => break,
                        Err(Signal::Continue(_)) => {}
                        Err(other) => return Err(other),
                    }
                }
                Ok(last)
            }
            NodeKind::DoWhile { body, cond } => {
                let mut last = Value::Null;
                loop {
                    self.check_cancel(span)?;
                    match self.eval(body) {
                        Ok(v) => last = v,
                        Err(Signal::Break(_)) => break,
                        Err(Signal::Continue(_)) => {}
                        Err(other) => return Err(other),
                    }
                    if !self.eval(cond)?.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            NodeKind::ForEach {
                var,
                iterable,
                body,
                expand,
                ..
            } => {
                let iterable = self.eval(iterable)?;
                let mut last = Value::Null;
                let mut run_item = |interp: &mut Self, item: Value| -> Flow<LoopStep> {
                    interp.check_cancel(span)?;
                    interp.frame.bind(*var, item);
                    match interp.eval(body) {
                        Ok(v) => {
                            Ok(LoopStep::Value(v))
                        }
                        Err(Signal::Break(_)) => Ok(LoopStep::Stop),
                        Err(Signal::Continue(_)) => Ok(LoopStep::Skip),
                        Err(other) => Err(other),
                    }
                };
                'outer: for item in value_iter(&iterable) {
                    if *expand {
                        // flatten one level of nested iterables
                        if iterable_like(&item) {
                            for inner in value_iter(&item) {
                                match run_item(self, inner)? {
                                    LoopStep::Value(v) => last = v,
                                    LoopStep::Skip => {}
                                    LoopStep::Stop => break 'outer,
                                }
                            }
                            continue;
                        }
                    }
                    match run_item(self, item)? {
                        LoopStep::Value(v) => last = v,
                        LoopStep::Skip => {}
                        LoopStep::Stop => break,
                    }
                }
                Ok(last)
            }
            NodeKind::ForClassic {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.eval(init)?;
                }
                let mut last = Value::Null;
                loop {
                    if let Some(cond) = cond {
                        if !self.eval(cond)?.is_truthy() {
                            break;
                        }
                    }
                    self.check_cancel(span)?;
                    match self.eval(body) {
                        Ok(v) => last = v,
                        Err(Signal::Break(_)) => break,
                        Err(Signal::Continue(_)) => {}
                        Err(other) => return Err(other),
                    }
                    if let Some(update) = update {
                        self.eval(update)?;
                    }
                }
                Ok(last)
            }
            NodeKind::Break => Err(Signal::Break(span)),
            NodeKind::Continue => Err(Signal::Continue(span)),
            NodeKind::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(value)?,
                    None => Value::Null,
                };
                Err(Signal::Return(value))
            }
            NodeKind::Throw(value) => {
                let value = self.eval(value)?;
                Err(EvalError::thrown(span, value).into())
            }
            NodeKind::Try {
                resources,
                body,
                catch,
                finally,
            } => self.eval_try(resources, body, catch.as_deref(), finally.as_deref(), span),
            NodeKind::Switch {
                subject,
                cases,
                expression,
            } => self.eval_switch(subject, cases, *expression, span),
            NodeKind::Lambda(body) => Ok(Value::Script(Arc::new(self.make_closure(body)))),
            NodeKind::Annotation { name, args, body } => self.eval_annotation(name, args, body, span),
            NodeKind::Filter { object, predicate } => {
                let items: Vec<Value> = value_iter(&self.eval(object)?).collect();
                let predicate = self.eval(predicate)?;
                let mut kept = Vec::new();
                for (index, item) in items.into_iter().enumerate() {
                    if self.apply_selector(&predicate, index, &item, span)?.is_truthy() {
                        kept.push(item);
                    }
                }
                Ok(Value::List(crate::value::ListRef::new(kept)))
            }
            NodeKind::Project { object, projector } => {
                let items: Vec<Value> = value_iter(&self.eval(object)?).collect();
                let projector = self.eval(projector)?;
                let mut mapped = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    mapped.push(self.apply_selector(&projector, index, &item, span)?);
                }
                Ok(Value::List(crate::value::ListRef::new(mapped)))
            }
        }
    }

    // ---- helpers per construct ----

    fn eval_block(&mut self, body: &[Node]) -> Flow<Value> {
        let mut last = Value::Null;
        for stmt in body {
            self.check_cancel(stmt.span)?;
            match self.eval(stmt) {
                Ok(v) => last = v,
                // under silent the failing statement yields null and the
                // program continues; structural ambiguity always surfaces
                Err(Signal::Fail(e))
                    if self.options.silent
                        && e.catchable()
                        && e.kind != ErrorKind::Parse
                        && e.kind != ErrorKind::AmbiguousMethod =>
                {
                    log::warn!("silent evaluation failure: {}", e.message);
                    last = Value::Null;
                }
                Err(other) => return Err(other),
            }
        }
        Ok(last)
    }

    fn read_context_var(&mut self, name: &str, span: Span) -> Flow<Value> {
        if self.context.has(name) {
            return Ok(self.context.get(name).unwrap_or(Value::Null));
        }
        if self.options.strict {
            Err(EvalError::variable(span, name).into())
        } else {
            log::debug!("undefined variable '{name}' evaluates to null");
            Ok(Value::Null)
        }
    }

    /// Evaluates a chain receiver; `None` means the chain short-circuits
    /// to null under safe semantics.
    fn eval_receiver(&mut self, object: &Node) -> Flow<Option<Value>> {
        match self.eval(object) {
            Ok(v) => Ok(Some(v)),
            Err(Signal::Fail(e))
                if self.options.safe && matches!(e.kind, ErrorKind::Variable | ErrorKind::Property) =>
            {
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    fn eval_get_prop(
        &mut self,
        object: &Node,
        name: &str,
        safe: bool,
        antish: Option<&str>,
        slot: &AccessorSlot,
        span: Span,
    ) -> Flow<Value> {
        let receiver = match self.eval(object) {
            Ok(v) => v,
            Err(Signal::Fail(e)) if matches!(e.kind, ErrorKind::Variable | ErrorKind::Property) => {
                // the graph walk failed; try the ant-style dotted key
                if let Some(key) = antish {
                    if let Some(v) = self.antish_lookup(key) {
                        return Ok(v);
                    }
                }
                if self.options.safe || safe {
                    return Ok(Value::Null);
                }
                return Err(e.into());
            }
            Err(other) => return Err(other),
        };
        if receiver.is_null() {
            return if safe || self.options.safe {
                Ok(Value::Null)
            } else {
                self.soften(EvalError::new(
                    ErrorKind::Property,
                    span,
                    format!("property '{name}' of null"),
                ))
            };
        }
        let resolved = self.introspector().get_property(&receiver, name, Some(slot));
        match resolved {
            Ok(v) => Ok(v),
            Err(err) => {
                if let Some(key) = antish {
                    if let Some(v) = self.antish_lookup(key) {
                        return Ok(v);
                    }
                }
                self.soften(self.access_error(err, span))
            }
        }
    }

    /// Ant-style resolution: graph-walk the longest context-bound prefix,
    /// then fall back to the full dotted key.
    fn antish_lookup(&mut self, key: &str) -> Option<Value> {
        let segments: Vec<&str> = key.split('.').collect();
        for i in (2..segments.len()).rev() {
            let prefix = segments[..i].join(".");
            if self.context.has(&prefix) {
                let mut current = self.context.get(&prefix)?;
                let mut ok = true;
                for segment in &segments[i..] {
                    match self.introspector().get_property(&current, segment, None) {
                        Ok(v) => current = v,
                        Err(_) => {
                            ok = false;
                            break;
                        }
                    }
                }
                if ok {
                    return Some(current);
                }
            }
        }
        if self.context.has(key) {
            return self.context.get(key);
        }
        None
    }

    fn eval_method_call(
        &mut self,
        object: &Node,
        name: &str,
        args: &[Node],
        safe: bool,
        slot: &AccessorSlot,
        span: Span,
    ) -> Flow<Value> {
        let receiver = match self.eval_receiver(object)? {
            Some(v) => v,
            None => return Ok(Value::Null),
        };
        if receiver.is_null() {
            return if safe || self.options.safe {
                Ok(Value::Null)
            } else {
                self.soften(EvalError::method(span, name))
            };
        }
        let mut arg_values = Args::new();
        for arg in args {
            arg_values.push(self.eval(arg)?);
        }
        // a script-valued property is callable as a method
        if let Value::Script(closure) = &receiver {
            if name == "call" {
                return self.call_closure(closure, &arg_values, span);
            }
        }
        let invoked = self.introspector().invoke(&receiver, name, &arg_values, Some(slot));
        match invoked {
            Ok(v) => Ok(v),
            Err(err) => {
                // fall back to a callable property of the receiver
                let fallback = self.introspector().get_property(&receiver, name, None);
                if let Ok(Value::Script(closure)) = fallback {
                    return self.call_closure(&closure, &arg_values, span);
                }
                self.soften(self.access_error(err, span))
            }
        }
    }

    fn eval_call_value(&mut self, callee: &Node, args: &[Node], span: Span) -> Flow<Value> {
        let callee_name = match &callee.kind {
            NodeKind::Var(_, name) | NodeKind::ContextVar(name) => Some(Arc::clone(name)),
            _ => None,
        };
        let target = self.eval(callee)?;
        let mut arg_values = Args::new();
        for arg in args {
            arg_values.push(self.eval(arg)?);
        }
        self.call_value(&target, &arg_values, callee_name.as_deref(), span)
    }

    fn call_value(&mut self, target: &Value, args: &[Value], name: Option<&str>, span: Span) -> Flow<Value> {
        match target {
            Value::Script(closure) => self.call_closure(closure, args, span),
            Value::MethodRef(method) => self.call_method_ref(method, args, span),
            other => {
                let label = name.map_or_else(|| other.type_name().to_owned(), ToOwned::to_owned);
                Err(EvalError::method(span, &label).into())
            }
        }
    }

    pub(crate) fn call_closure(&mut self, closure: &Closure, args: &[Value], span: Span) -> Flow<Value> {
        if self.depth + 1 > MAX_CALL_DEPTH {
            return Err(EvalError::new(ErrorKind::Method, span, "call depth exceeded").into());
        }
        run_closure(self.core, self.context, self.options, closure, args, self.depth + 1).map_err(Signal::Fail)
    }

    fn call_method_ref(&mut self, method: &MethodRef, args: &[Value], span: Span) -> Flow<Value> {
        match &method.target {
            MethodTarget::Instance(obj) => self
                .introspector()
                .invoke(&Value::Object(obj.clone()), &method.name, args, None)
                .map_err(|e| self.access_error(e, span).into()),
            MethodTarget::Class(class) => {
                if method.name.as_ref() == "new" {
                    self.introspector()
                        .construct(class, args)
                        .map_err(|e| self.access_error(e, span).into())
                } else {
                    self.introspector()
                        .invoke_static(class, &method.name, args)
                        .map_err(|e| self.access_error(e, span).into())
                }
            }
        }
    }

    fn eval_namespace_call(&mut self, ns: &str, name: &str, args: &[Node], span: Span) -> Flow<Value> {
        let namespace = self
            .context
            .resolve_namespace(ns)
            .or_else(|| self.core.namespaces.get(ns).cloned())
            .ok_or_else(|| Signal::from(EvalError::method(span, &format!("{ns}:{name}"))))?;
        let mut arg_values = Args::new();
        for arg in args {
            arg_values.push(self.eval(arg)?);
        }
        match &namespace {
            Value::Map(map) => {
                let function = map
                    .get(&Value::str(name))
                    .ok_or_else(|| Signal::from(EvalError::method(span, &format!("{ns}:{name}"))))?;
                self.call_value(&function, &arg_values, Some(name), span)
            }
            other => self
                .introspector()
                .invoke(other, name, &arg_values, None)
                .map_err(|e| self.access_error(e, span).into()),
        }
    }

    fn eval_method_ref(&mut self, target: &Node, name: &str, span: Span) -> Flow<Value> {
        // `Klass::name` refers to the class when the name is not a variable
        if let NodeKind::ContextVar(class) = &target.kind {
            if !self.context.has(class) && self.core.registry.get(class).is_some() {
                return Ok(Value::MethodRef(Arc::new(MethodRef {
                    target: MethodTarget::Class(Arc::clone(class)),
                    name: Arc::from(name),
                })));
            }
        }
        let value = self.eval(target)?;
        match value {
            Value::Object(obj) => Ok(Value::MethodRef(Arc::new(MethodRef {
                target: MethodTarget::Instance(obj),
                name: Arc::from(name),
            }))),
            Value::Str(class) => Ok(Value::MethodRef(Arc::new(MethodRef {
                target: MethodTarget::Class(class),
                name: Arc::from(name),
            }))),
            other => Err(EvalError::method(span, &format!("{}::{name}", other.type_name())).into()),
        }
    }

    fn eval_unary(&mut self, op: UnOp, operand: &Node, span: Span) -> Flow<Value> {
        if op == UnOp::Empty {
            // `empty nosuchvar` is true rather than an error
            return match self.eval(operand) {
                Ok(v) => Ok(Value::Bool(v.is_empty_value())),
                Err(Signal::Fail(e)) if e.kind == ErrorKind::Variable => Ok(Value::Bool(true)),
                Err(other) => Err(other),
            };
        }
        let value = self.eval(operand)?;
        match op {
            UnOp::Not => Ok(Value::Bool(!value.is_truthy())),
            UnOp::Neg => self
                .arithmetic
                .negate(&value)
                .map_err(|m| EvalError::arithmetic(span, m).into()),
            UnOp::BitNot => self
                .arithmetic
                .bit_not(&value)
                .map_err(|m| EvalError::arithmetic(span, m).into()),
            UnOp::Size => value
                .size_of()
                .map(Value::I64)
                .ok_or_else(|| EvalError::arithmetic(span, format!("no size for {}", value.type_name())).into()),
            UnOp::Empty => unreachable!("handled above"),
        }
    }

    fn eval_binary(&mut self, op: BinOp, lhs: &Node, rhs: &Node, span: Span) -> Flow<Value> {
        // short-circuit forms first
        match op {
            BinOp::And => {
                let l = self.eval(lhs)?;
                if !l.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval(rhs)?;
                return Ok(Value::Bool(r.is_truthy()));
            }
            BinOp::Or => {
                let l = self.eval(lhs)?;
                if l.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval(rhs)?;
                return Ok(Value::Bool(r.is_truthy()));
            }
            BinOp::Elvis => {
                let l = self.eval(lhs)?;
                return if l.is_truthy() { Ok(l) } else { self.eval(rhs) };
            }
            BinOp::NullCoalesce => {
                // lenient variable resolution on the left side
                let l = match self.eval(lhs) {
                    Ok(v) => v,
                    Err(Signal::Fail(e)) if e.kind == ErrorKind::Variable => Value::Null,
                    Err(other) => return Err(other),
                };
                let take_right = l.is_null() || (!self.options.strict && l.is_empty_value());
                return if take_right { self.eval(rhs) } else { Ok(l) };
            }
            _ => {}
        }
        let l = self.eval(lhs)?;
        let r = self.eval(rhs)?;
        let arith = |r: Result<Value, String>| -> Flow<Value> { r.map_err(|m| EvalError::arithmetic(span, m).into()) };
        match op {
            BinOp::Add => arith(self.arithmetic.add(&l, &r)),
            BinOp::Sub => arith(self.arithmetic.subtract(&l, &r)),
            BinOp::Mul => arith(self.arithmetic.multiply(&l, &r)),
            BinOp::Div => arith(self.arithmetic.divide(&l, &r)),
            BinOp::Mod => arith(self.arithmetic.modulo(&l, &r)),
            BinOp::BitAnd => arith(self.arithmetic.bitwise(&l, &r, BitwiseOp::And)),
            BinOp::BitOr => arith(self.arithmetic.bitwise(&l, &r, BitwiseOp::Or)),
            BinOp::BitXor => arith(self.arithmetic.bitwise(&l, &r, BitwiseOp::Xor)),
            BinOp::Shl => arith(self.arithmetic.bitwise(&l, &r, BitwiseOp::Shl)),
            BinOp::Shr => arith(self.arithmetic.bitwise(&l, &r, BitwiseOp::Shr)),
            BinOp::Ushr => arith(self.arithmetic.bitwise(&l, &r, BitwiseOp::Ushr)),
            BinOp::Eq => Ok(Value::Bool(self.arithmetic.equals(&l, &r))),
            BinOp::Ne => Ok(Value::Bool(!self.arithmetic.equals(&l, &r))),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let ordering = self
                    .arithmetic
                    .compare(&l, &r, &op.to_string())
                    .map_err(|m| EvalError::arithmetic(span, m))?;
                Ok(Value::Bool(match op {
                    BinOp::Lt => ordering.is_lt(),
                    BinOp::Le => ordering.is_le(),
                    BinOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
            BinOp::Match => arith(self.arithmetic.matches(&l, &r).map(Value::Bool)),
            BinOp::NotMatch => arith(self.arithmetic.matches(&l, &r).map(|b| Value::Bool(!b))),
            BinOp::StartsWith => arith(self.arithmetic.starts_with(&l, &r).map(Value::Bool)),
            BinOp::NotStartsWith => arith(self.arithmetic.starts_with(&l, &r).map(|b| Value::Bool(!b))),
            BinOp::EndsWith => arith(self.arithmetic.ends_with(&l, &r).map(Value::Bool)),
            BinOp::NotEndsWith => arith(self.arithmetic.ends_with(&l, &r).map(|b| Value::Bool(!b))),
            BinOp::Range => arith(self.arithmetic.range(&l, &r)),
            BinOp::And | BinOp::Or | BinOp::Elvis | BinOp::NullCoalesce => unreachable!("handled above"),
        }
    }

    fn eval_assign(&mut self, target: &Node, op: Option<BinOp>, value: &Node, span: Span) -> Flow<Value> {
        let new = match op {
            None => self.eval(value)?,
            Some(op) => {
                let current = self.eval(target)?;
                let rhs = self.eval(value)?;
                self.apply_binop(op, &current, &rhs, span)?
            }
        };
        self.write_target(target, new.clone(), span)?;
        Ok(new)
    }

    fn apply_binop(&mut self, op: BinOp, l: &Value, r: &Value, span: Span) -> Flow<Value> {
        let arith = |r: Result<Value, String>| -> Flow<Value> { r.map_err(|m| EvalError::arithmetic(span, m).into()) };
        match op {
            BinOp::Add => arith(self.arithmetic.add(l, r)),
            BinOp::Sub => arith(self.arithmetic.subtract(l, r)),
            BinOp::Mul => arith(self.arithmetic.multiply(l, r)),
            BinOp::Div => arith(self.arithmetic.divide(l, r)),
            BinOp::Mod => arith(self.arithmetic.modulo(l, r)),
            BinOp::BitAnd => arith(self.arithmetic.bitwise(l, r, BitwiseOp::And)),
            BinOp::BitOr => arith(self.arithmetic.bitwise(l, r, BitwiseOp::Or)),
            BinOp::BitXor => arith(self.arithmetic.bitwise(l, r, BitwiseOp::Xor)),
            BinOp::Shl => arith(self.arithmetic.bitwise(l, r, BitwiseOp::Shl)),
            BinOp::Shr => arith(self.arithmetic.bitwise(l, r, BitwiseOp::Shr)),
            BinOp::Ushr => arith(self.arithmetic.bitwise(l, r, BitwiseOp::Ushr)),
            other => Err(EvalError::parse(span, format!("operator '{other}' cannot be compound-assigned")).into()),
        }
    }

    fn write_target(&mut self, target: &Node, value: Value, span: Span) -> Flow<()> {
        match &target.kind {
            NodeKind::Var(var, name) => self
                .frame
                .assign(self.layout, *var, value, &self.arithmetic)
                .map_err(|m| EvalError::new(ErrorKind::Variable, span, format!("{m} ('{name}')")).into()),
            NodeKind::ContextVar(name) => self
                .context
                .set(name, value)
                .map_err(|m| EvalError::new(ErrorKind::Variable, span, m).into()),
            NodeKind::GetProp {
                object, name, antish, ..
            } => {
                let receiver = match self.eval(object) {
                    Ok(v) => Some(v),
                    Err(Signal::Fail(e))
                        if antish.is_some() && matches!(e.kind, ErrorKind::Variable | ErrorKind::Property) =>
                    {
                        None
                    }
                    Err(other) => return Err(other),
                };
                match receiver {
                    Some(v) if !v.is_null() => self
                        .introspector()
                        .set_property(&v, name, value)
                        .map_err(|e| self.access_error(e, span).into()),
                    // a purely-global dotted path creates/updates the key
                    _ if antish.is_some() => {
                        let key = antish.as_deref().expect("checked");
                        self.context
                            .set(key, value)
                            .map_err(|m| EvalError::new(ErrorKind::Variable, span, m).into())
                    }
                    _ => Err(EvalError::new(
                        ErrorKind::Property,
                        span,
                        format!("property '{name}' of null"),
                    )
                    .into()),
                }
            }
            NodeKind::GetIndex { object, keys, .. } => {
                let receiver = self.eval(object)?;
                if receiver.is_null() {
                    return Err(EvalError::new(ErrorKind::Property, span, "indexed access on null").into());
                }
                let mut current = receiver;
                for key in &keys[..keys.len() - 1] {
                    let key = self.eval(key)?;
                    current = self
                        .introspector()
                        .get_index(&current, &key)
                        .map_err(|e| self.access_error(e, span))?;
                }
                let last = self.eval(&keys[keys.len() - 1])?;
                self.introspector()
                    .set_index(&current, &last, value)
                    .map_err(|e| self.access_error(e, span).into())
            }
            _ => Err(EvalError::parse(span, "invalid assignment target").into()),
        }
    }

    fn eval_try(
        &mut self,
        resources: &[Node],
        body: &Node,
        catch: Option<&crate::ast::CatchClause>,
        finally: Option<&Node>,
        span: Span,
    ) -> Flow<Value> {
        // open resources in order; any failure skips the body but still
        // closes what was opened
        let mut opened: Vec<Value> = Vec::with_capacity(resources.len());
        let mut outcome: Flow<Value> = Ok(Value::Null);
        for resource in resources {
            match self.eval(resource) {
                Ok(v) => opened.push(v),
                Err(sig) => {
                    outcome = Err(sig);
                    break;
                }
            }
        }
        if outcome.is_ok() {
            outcome = self.eval(body);
        }
        // close in reverse declaration order on every exit path
        for resource in opened.iter().rev() {
            let _ = self.introspector().invoke(resource, "close", &[], None);
        }
        // catch anything catchable; the binding is read-only
        let outcome = match outcome {
            Err(Signal::Fail(e)) if e.catchable() && catch.is_some() => {
                let clause = catch.expect("checked");
                let payload = e.thrown.clone().unwrap_or_else(|| Value::str(&e.message));
                self.frame.bind(clause.var, payload);
                self.eval(&clause.body)
            }
            other => other,
        };
        // flow control inside finally replaces any pending signal
        if let Some(finally) = finally {
            match self.eval(finally) {
                Ok(_) => outcome,
                Err(signal) => Err(signal),
            }
        } else {
            let _ = span;
            outcome
        }
    }

    fn eval_switch(&mut self, subject: &Node, cases: &[SwitchCase], expression: bool, span: Span) -> Flow<Value> {
        let subject = self.eval(subject)?;
        // labels are evaluated once at entry, in declaration order
        let mut matched = None;
        let mut default_index = None;
        'outer: for (index, case) in cases.iter().enumerate() {
            if case.labels.is_empty() {
                default_index = Some(index);
                continue;
            }
            for label in &case.labels {
                let label = self.eval(label)?;
                if self.arithmetic.equals(&subject, &label) {
                    matched = Some(index);
                    break 'outer;
                }
            }
        }
        let start = matched.or(default_index);
        if expression {
            let Some(index) = start else {
                return Err(EvalError::switch(span).into());
            };
            self.eval(&cases[index].body)
        } else {
            let Some(index) = start else {
                return Ok(Value::Null);
            };
            // fall through until break or the end
            let mut last = Value::Null;
            for case in &cases[index..] {
                match self.eval(&case.body) {
                    Ok(v) => last = v,
                    Err(Signal::Break(_)) => return Ok(last),
                    Err(other) => return Err(other),
                }
            }
            Ok(last)
        }
    }

    fn make_closure(&mut self, body: &Arc<ScriptBody>) -> Closure {
        let captures = body
            .layout()
            .captures
            .iter()
            .map(|capture| self.frame.cell(capture.outer))
            .collect();
        Closure {
            body: Arc::clone(body),
            captures,
            bound: Vec::new(),
        }
    }

    fn eval_annotation(&mut self, name: &str, args: &[Node], body: &Node, span: Span) -> Flow<Value> {
        let mut arg_values = Args::new();
        for arg in args {
            arg_values.push(self.eval(arg)?);
        }
        if name == "synchronized" {
            // per-value mutual exclusion within this engine; null runs
            // unlocked
            let key = arg_values.first().cloned().unwrap_or(Value::Null);
            let monitor = if key.is_null() {
                None
            } else {
                Some(self.core.monitor(&key))
            };
            let _guard = monitor.as_ref().map(|m| m.lock());
            return self.eval(body);
        }
        // route through the context; encode control-flow signals so they
        // survive the host boundary
        let context = self.context;
        let mut pending: Option<Signal> = None;
        let result = {
            let pending = &mut pending;
            let mut body_fn = || -> Result<Value, EvalError> {
                match self.eval(body) {
                    Ok(v) => Ok(v),
                    Err(Signal::Fail(e)) => Err(e),
                    Err(signal) => {
                        *pending = Some(signal);
                        Ok(Value::Null)
                    }
                }
            };
            context.process_annotation(name, &arg_values, &mut body_fn)
        };
        match result {
            Some(Ok(v)) => {
                if let Some(signal) = pending {
                    return Err(signal);
                }
                Ok(v)
            }
            Some(Err(e)) => Err(e.into()),
            None => {
                if self.options.strict && !self.options.silent {
                    Err(EvalError::annotation(span, name, "is unknown").into())
                } else {
                    log::warn!("unknown annotation '@{name}' ignored");
                    Ok(Value::Null)
                }
            }
        }
    }

    fn apply_selector(&mut self, selector: &Value, index: usize, item: &Value, span: Span) -> Flow<Value> {
        match selector {
            Value::Script(closure) => {
                // arity selects (element) or (index, element)
                let args: Vec<Value> = if closure.body.parameters().len() >= 2 {
                    vec![Value::I64(index as i64), item.clone()]
                } else {
                    vec![item.clone()]
                };
                self.call_closure(closure, &args, span)
            }
            other => self.call_value(other, &[item.clone()], None, span),
        }
    }
}

enum LoopStep {
    Value(Value),
    Skip,
    Stop,
}

fn iterable_like(v: &Value) -> bool {
    matches!(
        v,
        Value::List(_) | Value::Set(_) | Value::Map(_) | Value::Range(_) | Value::Str(_)
    )
}

/// Iteration over a value: collections by element, maps by entry (as
/// `[key, value]` pairs), ranges by number, strings by character, scalars
/// once.
fn value_iter(value: &Value) -> ValueIter {
    match value {
        Value::Null => ValueIter::Items(Vec::new().into_iter()),
        Value::List(list) => ValueIter::Items(list.snapshot().into_iter()),
        Value::Set(set) => ValueIter::Items(set.snapshot().into_iter()),
        Value::Map(map) => {
            let entries: Vec<Value> = map
                .snapshot()
                .into_iter()
                .map(|(k, v)| Value::List(crate::value::ListRef::new(vec![k.to_value(), v])))
                .collect();
            ValueIter::Items(entries.into_iter())
        }
        Value::Range(range) => ValueIter::Range(range.iter()),
        Value::Str(s) => ValueIter::Items(s.chars().map(Value::Char).collect::<Vec<_>>().into_iter()),
        scalar => ValueIter::Items(vec![scalar.clone()].into_iter()),
    }
}

enum ValueIter {
    Items(std::vec::IntoIter<Value>),
    Range(IntRangeIter),
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            Self::Items(items) => items.next(),
            Self::Range(range) => range.next().map(|v| {
                if let Ok(small) = i32::try_from(v) {
                    Value::I32(small)
                } else {
                    Value::I64(v)
                }
            }),
        }
    }
}
