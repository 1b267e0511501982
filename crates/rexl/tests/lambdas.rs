//! Closures, captures, currying and method references.

mod common;

use common::eval;
use pretty_assertions::assert_eq;
use rexl::{Engine, ErrorKind, MapContext, Value};

// =============================================================================
// 1. recursion and capture
// =============================================================================

/// A lambda bound to a `var` can call itself through the captured slot.
#[test]
fn recursive_factorial() {
    assert_eq!(
        eval("var fact = (x) -> { if (x <= 1) 1 else x * fact(x - 1) }; fact(5)"),
        Value::I32(120)
    );
}

/// An inner `var` shadows instead of writing through; unrelated outer
/// names go to the context.
#[test]
fn inner_declaration_shadows_the_capture() {
    assert_eq!(
        eval("var y = 20; var s = (x, z) -> { var t = 22; x + z + t }; t = 54; s(10, 0)"),
        Value::I32(32)
    );
}

/// Writes to a captured name update the outer binding.
#[test]
fn capture_is_by_reference() {
    assert_eq!(eval("var c = 0; var inc = () -> c = c + 1; inc(); inc(); inc(); c"), Value::I32(3));
}

/// Mutation is visible in both directions.
#[test]
fn outer_writes_are_visible_inside() {
    assert_eq!(
        eval("var n = 1; var read = () -> n; n = 5; read()"),
        Value::I32(5)
    );
}

#[test]
fn capture_threads_through_nested_lambdas() {
    assert_eq!(
        eval("var a = 10; var outer = () -> { var inner = () -> a + 1; inner() }; outer()"),
        Value::I32(11)
    );
}

#[test]
fn lambda_forms_all_evaluate() {
    assert_eq!(eval("var f = function(x) { x * 2 }; f(21)"), Value::I32(42));
    assert_eq!(eval("var f = function { 21 + 21 }; f()"), Value::I32(42));
    assert_eq!(eval("var f = (x, y) -> { x + y }; f(40, 2)"), Value::I32(42));
    assert_eq!(eval("var f = x -> x + x; f(21)"), Value::I32(42));
    assert_eq!(eval("var f = x => x + x; f(21)"), Value::I32(42));
    // immediate invocation
    assert_eq!(eval("((x) -> x + 1)(41)"), Value::I32(42));
}

#[test]
fn surplus_arguments_are_ignored_and_missing_are_null() {
    assert_eq!(eval("var f = (x) -> x; f(1, 2, 3)"), Value::I32(1));
    assert_eq!(eval("var f = (x, y) -> y == null; f(1)"), Value::Bool(true));
}

// =============================================================================
// 2. calling a non-callable
// =============================================================================

#[test]
fn calling_a_number_is_a_method_error() {
    let engine = Engine::new();
    let err = engine
        .compile("var total = 10; total('tt')")
        .unwrap()
        .execute(&MapContext::new(), &[])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Method);
    assert!(err.message.contains("total"), "{}", err.message);
}

// =============================================================================
// 3. curry
// =============================================================================

#[test]
fn curry_binds_leading_parameters() {
    let engine = Engine::new();
    let program = engine.compile_with_params("x * y + z", &["x", "y", "z"]).unwrap();
    let ctx = MapContext::new();
    let direct = program.execute(&ctx, &[Value::I32(2), Value::I32(3), Value::I32(4)]).unwrap();

    let curried = program.curry(&[Value::I32(2)]);
    assert_eq!(curried.unbound_parameters(), vec!["y".to_owned(), "z".to_owned()]);
    let from_curry = curried.execute(&ctx, &[Value::I32(3), Value::I32(4)]).unwrap();
    assert_eq!(direct, from_curry);

    // curry twice
    let more = curried.curry(&[Value::I32(3)]);
    assert_eq!(more.execute(&ctx, &[Value::I32(4)]).unwrap(), Value::I32(10));
}

#[test]
fn script_level_curry_through_values() {
    assert_eq!(eval("var add = (x, y) -> x + y; var add2 = add; add2(40, 2)"), Value::I32(42));
}

#[test]
fn callable_defers_errors_to_the_call() {
    let engine = Engine::new();
    let program = engine.compile("nosuchvar + 1").unwrap();
    let ctx = MapContext::new();
    let thunk = program.callable(&ctx, &[]);
    let err = thunk.call().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Variable);
}

// =============================================================================
// 4. program metadata
// =============================================================================

#[test]
fn parameters_and_locals_are_reported() {
    let engine = Engine::new();
    let program = engine
        .compile_with_params("var local = x + 1; local", &["x"])
        .unwrap();
    assert_eq!(program.parameters(), vec!["x".to_owned()]);
    assert_eq!(program.local_variables(), vec!["local".to_owned()]);
    assert!(program.captured_variables().is_empty());
}

#[test]
fn lambdas_passed_as_arguments() {
    assert_eq!(
        eval("var apply = (f, v) -> f(v); apply(x -> x * 2, 21)"),
        Value::I32(42)
    );
}

#[test]
fn lambda_returned_from_lambda_keeps_its_environment() {
    assert_eq!(
        eval("var make = (n) -> { () -> n + 1 }; var f = make(41); f()"),
        Value::I32(42)
    );
}
