//! Shared fixtures for the integration suites: a default engine, a
//! one-line evaluation helper and a small family of host classes.
#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicI64, AtomicUsize, Ordering},
    Arc, Mutex,
};

use rexl::{ClassDescriptor, Engine, HostObject, HostRef, MapContext, ParamKind, Value};

/// Evaluates `source` on a fresh default engine and empty context.
pub fn eval(source: &str) -> Value {
    Engine::new()
        .compile(source)
        .unwrap_or_else(|e| panic!("parse '{source}': {e}"))
        .execute(&MapContext::new(), &[])
        .unwrap_or_else(|e| panic!("execute '{source}': {e}"))
}

/// Evaluates `source` against a prepared context.
pub fn eval_ctx(engine: &Engine, source: &str, ctx: &MapContext) -> Value {
    engine
        .compile(source)
        .unwrap_or_else(|e| panic!("parse '{source}': {e}"))
        .execute(ctx, &[])
        .unwrap_or_else(|e| panic!("execute '{source}': {e}"))
}

// ---- Counter: unsynchronized read-modify-write, needs external locking ----

#[derive(Debug, Default)]
pub struct Counter {
    value: Mutex<i64>,
}

impl Counter {
    pub fn total(&self) -> i64 {
        *self.value.lock().unwrap()
    }
}

impl HostObject for Counter {
    fn class_name(&self) -> &str {
        "Counter"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn counter_descriptor() -> ClassDescriptor {
    ClassDescriptor::new("Counter")
        .method(
            "inc",
            vec![],
            Arc::new(|recv, _args| {
                let counter = downcast::<Counter>(recv)?;
                // deliberately racy without external synchronization
                let read = *counter.value.lock().unwrap();
                std::thread::yield_now();
                *counter.value.lock().unwrap() = read + 1;
                Ok(Value::Null)
            }),
        )
        .property(
            "count",
            Some(Arc::new(|recv| {
                let counter = downcast_ref::<Counter>(recv)?;
                Ok(Value::I64(counter.total()))
            })),
            None,
        )
}

// ---- Circuit: a closable resource that fails on demand ----

#[derive(Debug, Default)]
pub struct Circuit {
    pub closed: AtomicUsize,
}

impl HostObject for Circuit {
    fn class_name(&self) -> &str {
        "Circuit"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn circuit_descriptor() -> ClassDescriptor {
    ClassDescriptor::new("Circuit")
        .method(
            "raise",
            vec![],
            Arc::new(|_recv, _args| Err("circuit raised".to_owned())),
        )
        .method(
            "close",
            vec![],
            Arc::new(|recv, _args| {
                let circuit = downcast::<Circuit>(recv)?;
                circuit.closed.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }),
        )
}

// ---- Bean hierarchy for cached-setter races and common-ancestor typing ----

#[derive(Debug, Default)]
pub struct SubA {
    pub value: AtomicI64,
}

#[derive(Debug, Default)]
pub struct SubB {
    pub value: AtomicI64,
}

impl HostObject for SubA {
    fn class_name(&self) -> &str {
        "SubA"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl HostObject for SubB {
    fn class_name(&self) -> &str {
        "SubB"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn bean_descriptors() -> Vec<ClassDescriptor> {
    vec![
        ClassDescriptor::new("BeanBase"),
        ClassDescriptor::new("SubA").extends("BeanBase").property(
            "value",
            Some(Arc::new(|recv| {
                Ok(Value::I64(downcast_ref::<SubA>(recv)?.value.load(Ordering::SeqCst)))
            })),
            Some(Arc::new(|recv, v| {
                let Value::I64(v) = widen(v) else {
                    return Err("expected a number".to_owned());
                };
                downcast_ref::<SubA>(recv)?.value.store(v, Ordering::SeqCst);
                Ok(())
            })),
        ),
        ClassDescriptor::new("SubB").extends("BeanBase").property(
            "value",
            Some(Arc::new(|recv| {
                Ok(Value::I64(downcast_ref::<SubB>(recv)?.value.load(Ordering::SeqCst)))
            })),
            Some(Arc::new(|recv, v| {
                let Value::I64(v) = widen(v) else {
                    return Err("expected a number".to_owned());
                };
                downcast_ref::<SubB>(recv)?.value.store(v, Ordering::SeqCst);
                Ok(())
            })),
        ),
    ]
}

fn widen(v: Value) -> Value {
    match v {
        Value::I8(x) => Value::I64(i64::from(x)),
        Value::I16(x) => Value::I64(i64::from(x)),
        Value::I32(x) => Value::I64(i64::from(x)),
        other => other,
    }
}

// ---- the class family of the common-ancestor scenario ----

#[derive(Debug)]
pub struct Marked(pub &'static str);

impl HostObject for Marked {
    fn class_name(&self) -> &str {
        self.0
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn interface_family() -> Vec<ClassDescriptor> {
    vec![
        ClassDescriptor::new("Inter0"),
        ClassDescriptor::new("ClassA").extends("Inter0"),
        ClassDescriptor::new("ClassB").extends("ClassA").extends("Inter0"),
        ClassDescriptor::new("ClassC").extends("ClassB").extends("Inter0"),
        ClassDescriptor::new("ClassD").extends("Inter0"),
    ]
}

pub fn object(name: &'static str) -> Value {
    Value::Object(HostRef::new(Arc::new(Marked(name))))
}

// ---- overload fixture ----

#[derive(Debug, Default)]
pub struct Overloaded;

impl HostObject for Overloaded {
    fn class_name(&self) -> &str {
        "Overloaded"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn overloaded_descriptor() -> ClassDescriptor {
    ClassDescriptor::new("Overloaded")
        .method(
            "pick",
            vec![ParamKind::Int],
            Arc::new(|_recv, _args| Ok(Value::str("int"))),
        )
        .method(
            "pick",
            vec![ParamKind::Double],
            Arc::new(|_recv, _args| Ok(Value::str("double"))),
        )
        .method(
            "pick",
            vec![ParamKind::Str],
            Arc::new(|_recv, _args| Ok(Value::str("string"))),
        )
        // two unrelated single-argument overloads: ambiguous for null
        .method(
            "clash",
            vec![ParamKind::List],
            Arc::new(|_recv, _args| Ok(Value::str("list"))),
        )
        .method(
            "clash",
            vec![ParamKind::Map],
            Arc::new(|_recv, _args| Ok(Value::str("map"))),
        )
}

fn downcast<'a, T: 'static>(recv: Option<&'a dyn HostObject>) -> Result<&'a T, String> {
    downcast_ref(recv.ok_or_else(|| "missing receiver".to_owned())?)
}

fn downcast_ref<T: 'static>(recv: &dyn HostObject) -> Result<&T, String> {
    recv.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| "unexpected receiver class".to_owned())
}
