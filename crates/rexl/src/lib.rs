//! An embeddable, sandboxed expression and script language engine.
//!
//! Hosts compile short textual programs once, then evaluate them
//! repeatedly against contexts that supply variables, namespaced functions
//! and host-object graphs. Typical uses are rule engines, template
//! engines, configuration logic and dynamic field access on host data.
//!
//! ```
//! use rexl::{Engine, MapContext, Value};
//!
//! let engine = Engine::new();
//! let program = engine.compile("greeting + ', ' + name + '!'").unwrap();
//! let ctx = MapContext::new()
//!     .with_var("greeting", Value::str("Hello"))
//!     .with_var("name", Value::str("world"));
//! assert_eq!(program.execute(&ctx, &[]).unwrap(), Value::str("Hello, world!"));
//! ```

mod arithmetic;
mod ast;
mod cache;
mod context;
mod engine;
mod error;
mod interpreter;
mod introspect;
mod lexer;
mod parser;
pub mod permissions;
pub mod sandbox;
mod scope;
mod types;
mod value;
mod program;

pub use crate::{
    arithmetic::Arithmetic,
    context::{AnnotationBody, Context, EngineOptions, MapContext, ObjectContext},
    engine::{Engine, EngineBuilder},
    error::{ErrorKind, EvalError, EvalResult, Span},
    introspect::{
        ClassDescriptor, ClassRegistry, GetterFn, InvokeFn, MethodDef, ParamKind, PropertyDef, PropertyStrategy,
        SetterFn,
    },
    permissions::{PermissionAxis, Permissions},
    program::{CollectMode, Program, ProgramCall},
    sandbox::{ClassSandbox, Sandbox},
    scope::DeclaredType,
    types::{Decimal, IntRange, MathContext, RoundingMode},
    value::{HostObject, HostRef, ListRef, MapRef, MethodRef, MethodTarget, SetRef, Value, ValueKey},
};
