//! Host-object introspection: registered properties and methods, overload
//! selection, constructors, method references, strategies and the
//! common-ancestor element typing of array literals.

mod common;

use std::sync::Arc;

use common::{bean_descriptors, interface_family, object, overloaded_descriptor, Overloaded};
use pretty_assertions::assert_eq;
use rexl::{
    ClassDescriptor, Engine, ErrorKind, HostRef, MapContext, ObjectContext, ParamKind, PropertyStrategy, Value,
};

fn engine_with_beans() -> Engine {
    let mut builder = Engine::builder();
    for descriptor in bean_descriptors() {
        builder = builder.class(descriptor);
    }
    builder.build()
}

// =============================================================================
// 1. property get/set through descriptors
// =============================================================================

#[test]
fn registered_property_reads_and_writes() {
    let engine = engine_with_beans();
    let bean = Value::Object(HostRef::new(Arc::new(common::SubA::default())));
    let ctx = MapContext::new().with_var("o", bean);
    let program = engine.compile("o.value = 41; o.value + 1").unwrap();
    assert_eq!(program.execute(&ctx, &[]).unwrap(), Value::I64(42));
}

#[test]
fn unknown_property_is_a_property_error() {
    let engine = engine_with_beans();
    let bean = Value::Object(HostRef::new(Arc::new(common::SubA::default())));
    let ctx = MapContext::new().with_var("o", bean);
    let err = engine.compile("o.nosuch").unwrap().execute(&ctx, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Property);
    assert!(err.message.contains("undefined property"), "{}", err.message);
}

#[test]
fn engine_convenience_property_access() {
    let engine = engine_with_beans();
    let bean = Value::Object(HostRef::new(Arc::new(common::SubA::default())));
    engine.set_property(&bean, "value", Value::I64(7)).unwrap();
    assert_eq!(engine.get_property(&bean, "value").unwrap(), Value::I64(7));
}

// =============================================================================
// 2. overload selection
// =============================================================================

#[test]
fn best_match_overload_by_argument_type() {
    let engine = Engine::builder().class(overloaded_descriptor()).build();
    let ctx = MapContext::new().with_var("o", Value::Object(HostRef::new(Arc::new(Overloaded))));
    assert_eq!(
        engine.compile("o.pick(1)").unwrap().execute(&ctx, &[]).unwrap(),
        Value::str("int")
    );
    assert_eq!(
        engine.compile("o.pick(1.5)").unwrap().execute(&ctx, &[]).unwrap(),
        Value::str("double")
    );
    assert_eq!(
        engine.compile("o.pick('x')").unwrap().execute(&ctx, &[]).unwrap(),
        Value::str("string")
    );
}

#[test]
fn structural_ambiguity_is_always_surfaced() {
    // null is applicable to both clash(list) and clash(map); neither is
    // more specific, and silent mode must not hide it
    let engine = Engine::builder().class(overloaded_descriptor()).silent(true).build();
    let ctx = MapContext::new().with_var("o", Value::Object(HostRef::new(Arc::new(Overloaded))));
    let err = engine.compile("o.clash(null)").unwrap().execute(&ctx, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::AmbiguousMethod);
}

#[test]
fn unknown_method_is_a_method_error() {
    let engine = Engine::builder().class(overloaded_descriptor()).build();
    let ctx = MapContext::new().with_var("o", Value::Object(HostRef::new(Arc::new(Overloaded))));
    let err = engine.compile("o.nosuch(1)").unwrap().execute(&ctx, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Method);
}

// =============================================================================
// 3. constructors and method references
// =============================================================================

fn point_descriptor() -> ClassDescriptor {
    #[derive(Debug)]
    struct Point {
        x: i64,
        y: i64,
    }
    impl rexl::HostObject for Point {
        fn class_name(&self) -> &str {
            "Point"
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }
    ClassDescriptor::new("Point")
        .constructor(
            vec![ParamKind::Long, ParamKind::Long],
            Arc::new(|_recv, args| {
                let x = long_of(&args[0]);
                let y = long_of(&args[1]);
                Ok(Value::Object(HostRef::new(Arc::new(Point { x, y }))))
            }),
        )
        .property(
            "x",
            Some(Arc::new(|recv| {
                let p = recv.as_any().downcast_ref::<Point>().ok_or("not a Point")?;
                Ok(Value::I64(p.x))
            })),
            None,
        )
        .method(
            "manhattan",
            vec![],
            Arc::new(|recv, _args| {
                let p = recv
                    .and_then(|r| r.as_any().downcast_ref::<Point>())
                    .ok_or("not a Point")?;
                Ok(Value::I64(p.x.abs() + p.y.abs()))
            }),
        )
}

fn long_of(v: &Value) -> i64 {
    match v {
        Value::I32(x) => i64::from(*x),
        Value::I64(x) => *x,
        _ => 0,
    }
}

#[test]
fn new_constructs_through_the_registry() {
    let engine = Engine::builder().class(point_descriptor()).build();
    let ctx = MapContext::new();
    let v = engine
        .compile("new('Point', 3, -4).manhattan()")
        .unwrap()
        .execute(&ctx, &[])
        .unwrap();
    assert_eq!(v, Value::I64(7));
    assert_eq!(
        engine.compile("new('Point', 5, 6).x").unwrap().execute(&ctx, &[]).unwrap(),
        Value::I64(5)
    );
}

#[test]
fn engine_new_instance_convenience() {
    let engine = Engine::builder().class(point_descriptor()).build();
    let p = engine.new_instance("Point", &[Value::I64(1), Value::I64(2)]).unwrap();
    assert_eq!(engine.invoke_method(&p, "manhattan", &[]).unwrap(), Value::I64(3));
}

#[test]
fn class_method_reference_constructs() {
    let engine = Engine::builder().class(point_descriptor()).build();
    let ctx = MapContext::new();
    let v = engine
        .compile("var make = Point::new; make(2, 2).manhattan()")
        .unwrap()
        .execute(&ctx, &[])
        .unwrap();
    assert_eq!(v, Value::I64(4));
}

#[test]
fn instance_method_reference_binds_the_receiver() {
    let engine = Engine::builder().class(point_descriptor()).build();
    let p = engine.new_instance("Point", &[Value::I64(3), Value::I64(4)]).unwrap();
    let ctx = MapContext::new().with_var("p", p);
    let v = engine
        .compile("var m = p::manhattan; m()")
        .unwrap()
        .execute(&ctx, &[])
        .unwrap();
    assert_eq!(v, Value::I64(7));
}

// =============================================================================
// 4. common-ancestor element typing (array literals)
// =============================================================================

#[test]
fn array_literal_element_type_is_the_shared_interface() {
    let mut builder = Engine::builder();
    for descriptor in interface_family() {
        builder = builder.class(descriptor);
    }
    let engine = builder.build();
    let ctx = MapContext::new()
        .with_var("a", object("ClassC"))
        .with_var("b", object("ClassA"))
        .with_var("c", object("ClassB"))
        .with_var("d", object("ClassD"));
    let v = engine.compile("[ a, b, c, d ]").unwrap().execute(&ctx, &[]).unwrap();
    let Value::List(list) = v else { panic!("expected list") };
    assert_eq!(list.element_class().as_deref(), Some("Inter0"));
}

#[test]
fn nulls_contribute_no_type_constraint() {
    let mut builder = Engine::builder();
    for descriptor in interface_family() {
        builder = builder.class(descriptor);
    }
    let engine = builder.build();
    let ctx = MapContext::new().with_var("a", object("ClassA"));
    let v = engine.compile("[ null, a ]").unwrap().execute(&ctx, &[]).unwrap();
    let Value::List(list) = v else { panic!("expected list") };
    assert_eq!(list.element_class().as_deref(), Some("ClassA"));
}

#[test]
fn trailing_ellipsis_materializes_an_untyped_sequence() {
    let mut builder = Engine::builder();
    for descriptor in interface_family() {
        builder = builder.class(descriptor);
    }
    let engine = builder.build();
    let ctx = MapContext::new().with_var("a", object("ClassA"));
    let v = engine.compile("[ a, ... ]").unwrap().execute(&ctx, &[]).unwrap();
    let Value::List(list) = v else { panic!("expected list") };
    assert_eq!(list.element_class(), None);
}

// =============================================================================
// 5. map strategies and object contexts
// =============================================================================

#[test]
fn bean_first_strategy_reads_pseudo_properties() {
    let engine = Engine::builder().strategy(PropertyStrategy::BeanFirst).build();
    let ctx = MapContext::new();
    let v = engine
        .compile("var m = {'size' : 99}; m.size")
        .unwrap()
        .execute(&ctx, &[])
        .unwrap();
    assert_eq!(v, Value::I32(1));
}

#[test]
fn map_first_strategy_reads_keys() {
    let engine = Engine::builder().strategy(PropertyStrategy::MapFirst).build();
    let ctx = MapContext::new();
    let v = engine
        .compile("var m = {'size' : 99}; m.size")
        .unwrap()
        .execute(&ctx, &[])
        .unwrap();
    assert_eq!(v, Value::I32(99));
}

#[test]
fn host_object_as_context_exposes_properties_as_variables() {
    let engine = engine_with_beans();
    let bean = Arc::new(common::SubA::default());
    bean.value.store(41, std::sync::atomic::Ordering::SeqCst);
    let ctx = ObjectContext::new(HostRef::new(bean), engine.registry().clone());
    let v = engine.compile("value + 1").unwrap().execute(&ctx, &[]).unwrap();
    assert_eq!(v, Value::I64(42));
}

// =============================================================================
// 6. safe navigation
// =============================================================================

#[test]
fn safe_navigation_short_circuits_null() {
    let engine = Engine::new();
    let ctx = MapContext::new().with_var("a", Value::Null);
    assert_eq!(engine.compile("a?.b").unwrap().execute(&ctx, &[]).unwrap(), Value::Null);
    assert_eq!(engine.compile("a?.b()").unwrap().execute(&ctx, &[]).unwrap(), Value::Null);
}

#[test]
fn safe_option_nullifies_broken_chains() {
    let engine = Engine::builder().safe(true).build();
    let ctx = MapContext::new().with_var("a", Value::Null);
    assert_eq!(engine.compile("a.b.c").unwrap().execute(&ctx, &[]).unwrap(), Value::Null);
}
