//! Sandbox and permission gating observed through full evaluations:
//! allow/block lists, aliasing, opacity and composed permission trees.

mod common;

use std::sync::Arc;

use common::bean_descriptors;
use pretty_assertions::assert_eq;
use rexl::{ClassDescriptor, Engine, ErrorKind, HostRef, MapContext, Permissions, Sandbox, Value};

fn secretive_descriptor() -> ClassDescriptor {
    ClassDescriptor::new("acct.Account")
        .property("balance", Some(Arc::new(|_recv| Ok(Value::I64(100)))), None)
        .property("secret", Some(Arc::new(|_recv| Ok(Value::str("hunter2")))), None)
        .method("audit", vec![], Arc::new(|_recv, _args| Ok(Value::str("audited"))))
}

#[derive(Debug)]
struct Account;

impl rexl::HostObject for Account {
    fn class_name(&self) -> &str {
        "acct.Account"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn account() -> Value {
    Value::Object(HostRef::new(Arc::new(Account)))
}

fn ctx_with_account() -> MapContext {
    MapContext::new().with_var("acct", account())
}

// =============================================================================
// 1. allow-lists
// =============================================================================

#[test]
fn allow_list_admits_only_named_members() {
    let mut sandbox = Sandbox::new();
    sandbox.allow("acct.Account").reading(&["balance"]).executing(&["audit"]);
    let engine = Engine::builder().sandbox(sandbox).class(secretive_descriptor()).build();
    let ctx = ctx_with_account();

    assert_eq!(
        engine.compile("acct.balance").unwrap().execute(&ctx, &[]).unwrap(),
        Value::I64(100)
    );
    assert_eq!(
        engine.compile("acct.audit()").unwrap().execute(&ctx, &[]).unwrap(),
        Value::str("audited")
    );
    let err = engine.compile("acct.secret").unwrap().execute(&ctx, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Property);
}

/// Blocked members report "undefined"; an existing-but-blocked member is
/// indistinguishable from one that never existed.
#[test]
fn sandbox_denial_is_opaque() {
    let mut sandbox = Sandbox::new();
    sandbox.allow("acct.Account").reading(&["balance"]);
    let engine = Engine::builder().sandbox(sandbox).class(secretive_descriptor()).build();
    let ctx = ctx_with_account();

    let blocked = engine.compile("acct.secret").unwrap().execute(&ctx, &[]).unwrap_err();
    let missing = engine.compile("acct.nothere").unwrap().execute(&ctx, &[]).unwrap_err();
    assert_eq!(blocked.kind, missing.kind);
    let normalize = |m: &str| m.replace("secret", "X").replace("nothere", "X");
    assert_eq!(normalize(&blocked.message), normalize(&missing.message));
}

// =============================================================================
// 2. block-lists and aliasing
// =============================================================================

#[test]
fn block_list_hides_named_members_only() {
    let mut sandbox = Sandbox::new();
    sandbox.block("acct.Account").hiding(&["secret"]);
    let engine = Engine::builder().sandbox(sandbox).class(secretive_descriptor()).build();
    let ctx = ctx_with_account();

    assert_eq!(
        engine.compile("acct.balance").unwrap().execute(&ctx, &[]).unwrap(),
        Value::I64(100)
    );
    let err = engine.compile("acct.secret").unwrap().execute(&ctx, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Property);
}

#[test]
fn alias_renames_the_script_visible_member() {
    let mut sandbox = Sandbox::new();
    sandbox.allow("acct.Account").alias("funds", "balance");
    let engine = Engine::builder().sandbox(sandbox).class(secretive_descriptor()).build();
    let ctx = ctx_with_account();

    assert_eq!(
        engine.compile("acct.funds").unwrap().execute(&ctx, &[]).unwrap(),
        Value::I64(100)
    );
    // the host name itself is no longer visible
    let err = engine.compile("acct.balance").unwrap().execute(&ctx, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Property);
}

// =============================================================================
// 3. inheritance
// =============================================================================

#[test]
fn inheriting_sandbox_blocks_through_the_super_chain() {
    let mut sandbox = Sandbox::new();
    sandbox.block("BeanBase");
    let mut builder = Engine::builder().sandbox(sandbox);
    for descriptor in bean_descriptors() {
        builder = builder.class(descriptor);
    }
    let engine = builder.build();
    let ctx = MapContext::new().with_var("o", Value::Object(HostRef::new(Arc::new(common::SubA::default()))));
    let err = engine.compile("o.value").unwrap().execute(&ctx, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Property);
}

#[test]
fn non_inheriting_sandbox_checks_only_the_declared_class() {
    let mut sandbox = Sandbox::non_inheritable();
    sandbox.block("BeanBase");
    let mut builder = Engine::builder().sandbox(sandbox);
    for descriptor in bean_descriptors() {
        builder = builder.class(descriptor);
    }
    let engine = builder.build();
    let ctx = MapContext::new().with_var("o", Value::Object(HostRef::new(Arc::new(common::SubA::default()))));
    assert_eq!(
        engine.compile("o.value").unwrap().execute(&ctx, &[]).unwrap(),
        Value::I64(0)
    );
}

// =============================================================================
// 4. permissions
// =============================================================================

#[test]
fn package_denial_gates_every_class_in_it() {
    let permissions = Permissions::parse(&["acct {}"]).unwrap();
    let engine = Engine::builder()
        .permissions(permissions)
        .class(secretive_descriptor())
        .build();
    let ctx = ctx_with_account();
    let err = engine.compile("acct.balance").unwrap().execute(&ctx, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Property);
}

#[test]
fn member_denial_gates_only_that_member() {
    let permissions = Permissions::parse(&["acct { Account { secret; } }"]).unwrap();
    let engine = Engine::builder()
        .permissions(permissions)
        .class(secretive_descriptor())
        .build();
    let ctx = ctx_with_account();
    assert_eq!(
        engine.compile("acct.balance").unwrap().execute(&ctx, &[]).unwrap(),
        Value::I64(100)
    );
    let err = engine.compile("acct.secret").unwrap().execute(&ctx, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Property);
}

#[test]
fn composed_permissions_layer_denials() {
    let base = Permissions::unrestricted();
    let composed = base.compose(&["acct { Account { audit(); } }"]).unwrap();
    let engine = Engine::builder()
        .permissions(composed)
        .class(secretive_descriptor())
        .build();
    let ctx = ctx_with_account();
    assert_eq!(
        engine.compile("acct.balance").unwrap().execute(&ctx, &[]).unwrap(),
        Value::I64(100)
    );
    let err = engine.compile("acct.audit()").unwrap().execute(&ctx, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Method);
}

#[test]
fn restricted_permissions_deny_by_default() {
    let engine = Engine::builder()
        .permissions(Permissions::restricted())
        .class(secretive_descriptor())
        .build();
    let ctx = ctx_with_account();
    let err = engine.compile("acct.balance").unwrap().execute(&ctx, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Property);
}
