//! Engine façade behavior: the program cache, option modes, ant-style
//! dotted globals, variable collection, namespaces, cancellation and
//! source round-trips.

mod common;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use common::eval_ctx;
use pretty_assertions::assert_eq;
use rexl::{CollectMode, Context, Engine, EngineOptions, ErrorKind, MapContext, Value};

// =============================================================================
// 1. program cache
// =============================================================================

#[test]
fn same_source_hits_the_cache() {
    let engine = Engine::new();
    engine.compile("a + b").unwrap();
    engine.compile("a + b").unwrap();
    engine.compile("a + b").unwrap();
    let (hits, misses) = engine.cache_stats();
    assert_eq!((hits, misses), (2, 1));
}

#[test]
fn different_sources_do_not_collide() {
    let engine = Engine::new();
    engine.compile("a + b").unwrap();
    engine.compile("a - b").unwrap();
    let (hits, _) = engine.cache_stats();
    assert_eq!(hits, 0);
}

#[test]
fn parse_failure_never_populates_the_cache() {
    let engine = Engine::new();
    assert!(engine.compile("a +").is_err());
    assert!(engine.compile("a +").is_err());
    let (hits, _) = engine.cache_stats();
    assert_eq!(hits, 0);
}

#[test]
fn parameterized_programs_cache_under_their_parameters() {
    let engine = Engine::new();
    engine.compile_with_params("x + 1", &["x"]).unwrap();
    engine.compile("x + 1").unwrap();
    // the two keys differ, so the second compile is a miss
    let (hits, misses) = engine.cache_stats();
    assert_eq!((hits, misses), (0, 2));
}

// =============================================================================
// 2. re-parse round-trip
// =============================================================================

#[test]
fn parsed_text_reparses_to_an_equivalent_program() {
    let engine = Engine::new();
    let sources = [
        "1 + 2 * 3",
        "var t = 0; for (var i : 1..4) { t = t + i }; t",
        "empty(x) ? 'e' : 'f'",
        "var f = (a, b) -> a * b; f(6, 7)",
        "switch (2) { case 1 -> 'a'; case 2 -> 'b'; default -> 'c' }",
    ];
    let ctx = MapContext::new().with_var("x", Value::str("v"));
    for source in sources {
        let original = engine.compile(source).unwrap();
        let rendered = original.parsed_text();
        let reparsed = engine
            .compile(&rendered)
            .unwrap_or_else(|e| panic!("{source} -> {rendered}: {e}"));
        assert_eq!(
            original.execute(&ctx, &[]).unwrap(),
            reparsed.execute(&ctx, &[]).unwrap(),
            "{source} -> {rendered}"
        );
    }
}

#[test]
fn evaluate_accepts_expressions_only() {
    let engine = Engine::new();
    let ctx = MapContext::new().with_var("x", Value::I32(41));
    assert_eq!(engine.compile("x + 1").unwrap().evaluate(&ctx).unwrap(), Value::I32(42));

    let script = engine.compile("var y = 1; y + 1").unwrap();
    let err = script.evaluate(&ctx).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Parse);
    // execute still works on the same program
    assert_eq!(script.execute(&ctx, &[]).unwrap(), Value::I32(2));
}

// =============================================================================
// 3. option modes
// =============================================================================

#[test]
fn strict_mode_fails_on_unknown_variables() {
    let engine = Engine::new();
    let err = engine.compile("nosuch").unwrap().execute(&MapContext::new(), &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Variable);
}

#[test]
fn lenient_mode_nulls_unknown_variables() {
    let engine = Engine::builder().strict(false).build();
    let v = engine.compile("nosuch").unwrap().execute(&MapContext::new(), &[]).unwrap();
    assert_eq!(v, Value::Null);
}

#[test]
fn silent_mode_swallows_errors_and_continues() {
    let engine = Engine::builder().silent(true).build();
    let v = engine
        .compile("nosuch; 42")
        .unwrap()
        .execute(&MapContext::new(), &[])
        .unwrap();
    assert_eq!(v, Value::I32(42));
}

#[test]
fn context_options_override_engine_defaults() {
    let engine = Engine::new();
    let lenient = MapContext::with_options(EngineOptions {
        strict: false,
        ..EngineOptions::default()
    });
    let v = engine.compile("nosuch").unwrap().execute(&lenient, &[]).unwrap();
    assert_eq!(v, Value::Null);
}

// =============================================================================
// 4. cancellation
// =============================================================================

#[test]
fn cancel_flag_raises_at_a_statement_boundary() {
    let engine = Engine::new();
    let cancel = Arc::new(AtomicBool::new(true));
    let ctx = MapContext::with_options(EngineOptions {
        cancel: Some(cancel),
        ..EngineOptions::default()
    });
    let err = engine
        .compile("var t = 0; while (true) { t = t + 1 }; t")
        .unwrap()
        .execute(&ctx, &[])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cancel);
}

#[test]
fn non_cancellable_evaluation_returns_null_instead() {
    let engine = Engine::builder().cancellable(false).build();
    let cancel = Arc::new(AtomicBool::new(true));
    let ctx = MapContext::with_options(EngineOptions {
        cancellable: false,
        cancel: Some(cancel),
        ..EngineOptions::default()
    });
    let v = engine
        .compile("var t = 0; while (true) { t = t + 1 }; t")
        .unwrap()
        .execute(&ctx, &[])
        .unwrap();
    assert_eq!(v, Value::Null);
}

#[test]
fn cancellation_interrupts_a_running_loop() {
    let engine = Engine::new();
    let cancel = Arc::new(AtomicBool::new(false));
    let ctx = MapContext::with_options(EngineOptions {
        cancel: Some(Arc::clone(&cancel)),
        ..EngineOptions::default()
    });
    let program = engine.compile("var t = 0; while (true) { t = t + 1 }; t").unwrap();
    std::thread::scope(|scope| {
        let canceller = scope.spawn(|| {
            std::thread::sleep(std::time::Duration::from_millis(20));
            cancel.store(true, Ordering::Release);
        });
        let err = program.execute(&ctx, &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancel);
        canceller.join().unwrap();
    });
}

// =============================================================================
// 5. ant-style dotted globals
// =============================================================================

#[test]
fn dotted_key_is_read_when_the_graph_walk_fails() {
    let engine = Engine::new();
    let ctx = MapContext::new();
    ctx.set("froboz.value", Value::I32(10)).unwrap();
    assert_eq!(eval_ctx(&engine, "froboz.value", &ctx), Value::I32(10));
    assert_eq!(eval_ctx(&engine, "froboz.value + 1", &ctx), Value::I32(11));
}

#[test]
fn assignment_to_a_global_dotted_path_creates_the_key() {
    let engine = Engine::new();
    let ctx = MapContext::new();
    assert_eq!(eval_ctx(&engine, "quux.gee = 7", &ctx), Value::I32(7));
    assert_eq!(ctx.get("quux.gee"), Some(Value::I32(7)));
    // and updates it
    eval_ctx(&engine, "quux.gee = 9", &ctx);
    assert_eq!(ctx.get("quux.gee"), Some(Value::I32(9)));
}

#[test]
fn graph_walk_wins_over_the_dotted_key() {
    let engine = Engine::new();
    let ctx = MapContext::new();
    // froboz is a real map; its property walk resolves first
    eval_ctx(&engine, "froboz = {'value' : 1}", &ctx);
    ctx.set("froboz.value", Value::I32(99)).unwrap();
    assert_eq!(eval_ctx(&engine, "froboz.value", &ctx), Value::I32(1));
}

#[test]
fn longest_bound_prefix_is_walked_first() {
    let engine = Engine::new();
    let ctx = MapContext::new();
    ctx.set("a.b", Value::Map(rexl::MapRef::new(vec![(Value::str("c"), Value::I32(5))])))
        .unwrap();
    assert_eq!(eval_ctx(&engine, "a.b.c", &ctx), Value::I32(5));
}

#[test]
fn local_declaration_disables_antish_interpretation() {
    let engine = Engine::new();
    let ctx = MapContext::new();
    ctx.set("froboz.value", Value::I32(10)).unwrap();
    let err = engine
        .compile("var froboz = 3; froboz.value")
        .unwrap()
        .execute(&ctx, &[])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Property);
}

// =============================================================================
// 6. variable collection
// =============================================================================

fn sorted(mut paths: Vec<Vec<String>>) -> Vec<Vec<String>> {
    paths.sort();
    paths
}

#[test]
fn variables_collects_dotted_paths() {
    let engine = Engine::new();
    let program = engine.compile("a.b.c + d").unwrap();
    assert_eq!(
        sorted(program.variables()),
        vec![
            vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
            vec!["d".to_owned()],
        ]
    );
}

#[test]
fn collect_all_appends_constant_subscripts() {
    let engine = Engine::new();
    let program = engine.compile("a['b'] + c[1]").unwrap();
    assert_eq!(
        sorted(program.variables()),
        vec![
            vec!["a".to_owned(), "b".to_owned()],
            vec!["c".to_owned(), "1".to_owned()],
        ]
    );
}

#[test]
fn references_only_ignores_subscripts() {
    let engine = Engine::builder().collect_mode(CollectMode::ReferencesOnly).build();
    let program = engine.compile("a['b'] + c.d").unwrap();
    assert_eq!(
        sorted(program.variables()),
        vec![vec!["a".to_owned()], vec!["c".to_owned(), "d".to_owned()]]
    );
}

#[test]
fn local_variables_are_not_collected() {
    let engine = Engine::new();
    let program = engine.compile("var x = outer; x + 1").unwrap();
    assert_eq!(program.variables(), vec![vec!["outer".to_owned()]]);
}

// =============================================================================
// 7. namespaces
// =============================================================================

#[test]
fn namespace_call_through_the_engine_registry() {
    let engine = Engine::new();
    // a map namespace binds names to script values
    let double = engine.compile_with_params("x * 2", &["x"]).unwrap();
    let ns = rexl::MapRef::new(vec![(Value::str("double"), double.to_value())]);
    let engine = Engine::builder().namespace("m", Value::Map(ns)).build();
    let v = engine
        .compile("m:double(21)")
        .unwrap()
        .execute(&MapContext::new(), &[])
        .unwrap();
    assert_eq!(v, Value::I32(42));
}

#[test]
fn context_namespace_resolver_wins() {
    struct NsContext {
        inner: MapContext,
        ns: Value,
    }
    impl rexl::Context for NsContext {
        fn has(&self, name: &str) -> bool {
            self.inner.has(name)
        }
        fn get(&self, name: &str) -> Option<Value> {
            self.inner.get(name)
        }
        fn set(&self, name: &str, value: Value) -> Result<(), String> {
            self.inner.set(name, value)
        }
        fn resolve_namespace(&self, name: &str) -> Option<Value> {
            (name == "m").then(|| self.ns.clone())
        }
    }
    let base = Engine::new();
    let triple = base.compile_with_params("x * 3", &["x"]).unwrap();
    let ctx = NsContext {
        inner: MapContext::new(),
        ns: Value::Map(rexl::MapRef::new(vec![(Value::str("triple"), triple.to_value())])),
    };
    let v = base.compile("m:triple(14)").unwrap().execute(&ctx, &[]).unwrap();
    assert_eq!(v, Value::I32(42));
}

#[test]
fn unknown_namespace_is_a_method_error() {
    let engine = Engine::new();
    let err = engine
        .compile("nope:fn(1)")
        .unwrap()
        .execute(&MapContext::new(), &[])
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Method);
}
