//! The expression/script AST.
//!
//! Nodes pair a [`NodeKind`] with the source [`Span`] it was parsed from.
//! Variable references are resolved at parse time into frame slots
//! ([`VarRef`]) or left as context lookups; property and method call sites
//! carry an [`AccessorSlot`] so repeated evaluations reuse the resolved
//! accessor. The AST is immutable after parsing and shared across threads;
//! the accessor slots are the only interior-mutable state.

use std::sync::Arc;

use num_bigint::BigInt;
use strum::Display;

use crate::{
    error::Span,
    introspect::AccessorSlot,
    program::ScriptBody,
    scope::{DeclaredType, VarRef},
    types::Decimal,
    value::Value,
};

/// Binary operators. The display form is the operator's source spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub(crate) enum BinOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "^")]
    BitXor,
    #[strum(serialize = "<<")]
    Shl,
    #[strum(serialize = ">>")]
    Shr,
    #[strum(serialize = ">>>")]
    Ushr,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "=~")]
    Match,
    #[strum(serialize = "!~")]
    NotMatch,
    #[strum(serialize = "=^")]
    StartsWith,
    #[strum(serialize = "!^")]
    NotStartsWith,
    #[strum(serialize = "=$")]
    EndsWith,
    #[strum(serialize = "!$")]
    NotEndsWith,
    #[strum(serialize = "..")]
    Range,
    #[strum(serialize = "??")]
    NullCoalesce,
    #[strum(serialize = "?:")]
    Elvis,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub(crate) enum UnOp {
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "-")]
    Neg,
    #[strum(serialize = "~")]
    BitNot,
    #[strum(serialize = "empty")]
    Empty,
    #[strum(serialize = "size")]
    Size,
}

/// A constant literal, materialized freshly on every evaluation for
/// containers but shared for scalars.
#[derive(Debug, Clone)]
pub(crate) enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Long(i64),
    Big(Arc<BigInt>),
    Float(f32),
    Double(f64),
    Dec(Arc<Decimal>),
    Str(Arc<str>),
    Char(char),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(v) => {
                if let Ok(small) = i32::try_from(*v) {
                    Value::I32(small)
                } else {
                    Value::I64(*v)
                }
            }
            Self::Long(v) => Value::I64(*v),
            Self::Big(v) => Value::BigInt(Arc::clone(v)),
            Self::Float(v) => Value::F32(*v),
            Self::Double(v) => Value::F64(*v),
            Self::Dec(v) => Value::Decimal(Arc::clone(v)),
            Self::Str(s) => Value::Str(Arc::clone(s)),
            Self::Char(c) => Value::Char(*c),
        }
    }
}

/// A `catch (binding) { handler }` clause. The binding is read-only.
#[derive(Debug)]
pub(crate) struct CatchClause {
    pub var: u16,
    pub name: Arc<str>,
    pub body: Box<Node>,
}

/// One switch case. `labels` empty marks the `default` arm.
#[derive(Debug)]
pub(crate) struct SwitchCase {
    pub labels: Vec<Node>,
    pub body: Node,
    pub span: Span,
}

/// An AST node with its source span.
#[derive(Debug)]
pub(crate) struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Literal(Literal),
    ListLit {
        items: Vec<Node>,
        immutable: bool,
        /// Trailing ellipsis: materialize as an ordered sequence, untyped.
        sequence: bool,
    },
    SetLit {
        items: Vec<Node>,
        immutable: bool,
    },
    MapLit {
        pairs: Vec<(Node, Node)>,
        immutable: bool,
    },
    /// A resolved frame variable.
    Var(VarRef, Arc<str>),
    /// An unresolved name, read from the context at runtime.
    ContextVar(Arc<str>),
    GetProp {
        object: Box<Node>,
        name: Arc<str>,
        safe: bool,
        /// Full dotted key for ant-style global fallback, when the chain is
        /// made of plain identifiers rooted at a context variable.
        antish: Option<Arc<str>>,
        slot: AccessorSlot,
    },
    GetIndex {
        object: Box<Node>,
        keys: Vec<Node>,
        safe: bool,
    },
    MethodCall {
        object: Box<Node>,
        name: Arc<str>,
        args: Vec<Node>,
        safe: bool,
        slot: AccessorSlot,
    },
    /// Calling an arbitrary callable expression: `f(x)`, `(a -> a)(2)`.
    CallValue {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    /// `ns:fn(args)` through the context/engine namespace resolver.
    NamespaceCall {
        ns: Arc<str>,
        name: Arc<str>,
        args: Vec<Node>,
    },
    /// `new(Class, args...)`; the first element names the class.
    New {
        args: Vec<Node>,
    },
    /// `expr::name` or `expr::new`.
    MethodRefOf {
        target: Box<Node>,
        name: Arc<str>,
    },
    Unary {
        op: UnOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Ternary {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    Assign {
        target: Box<Node>,
        /// `Some` for compound assignment (`+=` carries `Add`).
        op: Option<BinOp>,
        value: Box<Node>,
    },
    IncDec {
        target: Box<Node>,
        increment: bool,
        prefix: bool,
    },
    Decl {
        var: u16,
        name: Arc<str>,
        declared: DeclaredType,
        is_final: bool,
        init: Option<Box<Node>>,
    },
    /// Destructuring `var (x, y) = expr`.
    DeclMulti {
        vars: Vec<u16>,
        names: Vec<Arc<str>>,
        init: Box<Node>,
    },
    Block(Vec<Node>),
    If {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Option<Box<Node>>,
    },
    While {
        cond: Box<Node>,
        body: Box<Node>,
    },
    DoWhile {
        body: Box<Node>,
        cond: Box<Node>,
    },
    ForEach {
        var: u16,
        name: Arc<str>,
        iterable: Box<Node>,
        body: Box<Node>,
        /// `...expr`: flatten one level of nested iterables.
        expand: bool,
    },
    ForClassic {
        init: Option<Box<Node>>,
        cond: Option<Box<Node>>,
        update: Option<Box<Node>>,
        body: Box<Node>,
    },
    Break,
    Continue,
    Return(Option<Box<Node>>),
    Throw(Box<Node>),
    Try {
        /// Resource declarations, closed in reverse order on any exit.
        resources: Vec<Node>,
        body: Box<Node>,
        catch: Option<Box<CatchClause>>,
        finally: Option<Box<Node>>,
    },
    Switch {
        subject: Box<Node>,
        cases: Vec<SwitchCase>,
        /// Expression form (`->` arms) errors without a match; statement
        /// form falls through.
        expression: bool,
    },
    Lambda(Arc<ScriptBody>),
    Annotation {
        name: Arc<str>,
        args: Vec<Node>,
        body: Box<Node>,
    },
    /// `coll.(predicate)` keeps elements the predicate accepts.
    Filter {
        object: Box<Node>,
        predicate: Box<Node>,
    },
    /// `coll.[projector]` maps elements through the projector.
    Project {
        object: Box<Node>,
        projector: Box<Node>,
    },
}

// ---- source re-rendering ----

impl Node {
    /// Renders a parse-equivalent source form. Sub-expressions are
    /// parenthesized conservatively so the output re-parses with the same
    /// structure.
    pub fn render(&self, out: &mut String) {
        match &self.kind {
            NodeKind::Literal(lit) => render_literal(lit, out),
            NodeKind::ListLit {
                items,
                immutable,
                sequence,
            } => {
                if *immutable {
                    out.push('#');
                }
                out.push('[');
                join(items, out, ", ");
                if *sequence {
                    if !items.is_empty() {
                        out.push_str(", ");
                    }
                    out.push_str("...");
                }
                out.push(']');
            }
            NodeKind::SetLit { items, immutable } => {
                if *immutable {
                    out.push('#');
                }
                out.push('{');
                join(items, out, ", ");
                out.push('}');
            }
            NodeKind::MapLit { pairs, immutable } => {
                if *immutable {
                    out.push('#');
                }
                out.push('{');
                if pairs.is_empty() {
                    out.push(':');
                }
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    k.render(out);
                    out.push_str(" : ");
                    v.render(out);
                }
                out.push('}');
            }
            NodeKind::Var(_, name) | NodeKind::ContextVar(name) => out.push_str(name),
            NodeKind::GetProp { object, name, safe, .. } => {
                object.render(out);
                out.push_str(if *safe { "?." } else { "." });
                out.push_str(name);
            }
            NodeKind::GetIndex { object, keys, safe } => {
                object.render(out);
                if *safe {
                    out.push('?');
                }
                out.push('[');
                join(keys, out, ", ");
                out.push(']');
            }
            NodeKind::MethodCall {
                object,
                name,
                args,
                safe,
                ..
            } => {
                object.render(out);
                out.push_str(if *safe { "?." } else { "." });
                out.push_str(name);
                out.push('(');
                join(args, out, ", ");
                out.push(')');
            }
            NodeKind::CallValue { callee, args } => {
                callee.render(out);
                out.push('(');
                join(args, out, ", ");
                out.push(')');
            }
            NodeKind::NamespaceCall { ns, name, args } => {
                out.push_str(ns);
                out.push(':');
                out.push_str(name);
                out.push('(');
                join(args, out, ", ");
                out.push(')');
            }
            NodeKind::New { args } => {
                out.push_str("new(");
                join(args, out, ", ");
                out.push(')');
            }
            NodeKind::MethodRefOf { target, name } => {
                target.render(out);
                out.push_str("::");
                out.push_str(name);
            }
            NodeKind::Unary { op, operand } => {
                match op {
                    UnOp::Empty | UnOp::Size => {
                        out.push_str(&op.to_string());
                        out.push(' ');
                    }
                    other => out.push_str(&other.to_string()),
                }
                out.push('(');
                operand.render(out);
                out.push(')');
            }
            NodeKind::Binary { op, lhs, rhs } => {
                out.push('(');
                lhs.render(out);
                out.push(' ');
                out.push_str(&op.to_string());
                out.push(' ');
                rhs.render(out);
                out.push(')');
            }
            NodeKind::Ternary { cond, then, otherwise } => {
                out.push('(');
                cond.render(out);
                out.push_str(" ? ");
                then.render(out);
                out.push_str(" : ");
                otherwise.render(out);
                out.push(')');
            }
            NodeKind::Assign { target, op, value } => {
                target.render(out);
                match op {
                    Some(op) => {
                        out.push(' ');
                        out.push_str(&op.to_string());
                        out.push_str("= ");
                    }
                    None => out.push_str(" = "),
                }
                value.render(out);
            }
            NodeKind::IncDec {
                target,
                increment,
                prefix,
            } => {
                let sym = if *increment { "++" } else { "--" };
                if *prefix {
                    out.push_str(sym);
                }
                target.render(out);
                if !*prefix {
                    out.push_str(sym);
                }
            }
            NodeKind::Decl {
                name,
                declared,
                is_final,
                init,
                ..
            } => {
                if *is_final {
                    out.push_str("const ");
                } else if *declared == DeclaredType::Any {
                    out.push_str("var ");
                }
                if *declared != DeclaredType::Any {
                    out.push_str(declared_keyword(*declared));
                    out.push(' ');
                }
                out.push_str(name);
                if let Some(init) = init {
                    out.push_str(" = ");
                    init.render(out);
                }
            }
            NodeKind::DeclMulti { names, init, .. } => {
                out.push_str("var (");
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(name);
                }
                out.push_str(") = ");
                init.render(out);
            }
            NodeKind::Block(body) => {
                out.push_str("{ ");
                for stmt in body {
                    stmt.render(out);
                    out.push_str("; ");
                }
                out.push('}');
            }
            NodeKind::If { cond, then, otherwise } => {
                out.push_str("if (");
                cond.render(out);
                out.push_str(") ");
                then.render(out);
                if let Some(otherwise) = otherwise {
                    out.push_str(" else ");
                    otherwise.render(out);
                }
            }
            NodeKind::While { cond, body } => {
                out.push_str("while (");
                cond.render(out);
                out.push_str(") ");
                body.render(out);
            }
            NodeKind::DoWhile { body, cond } => {
                out.push_str("do ");
                body.render(out);
                out.push_str(" while (");
                cond.render(out);
                out.push(')');
            }
            NodeKind::ForEach {
                name,
                iterable,
                body,
                expand,
                ..
            } => {
                out.push_str("for (var ");
                out.push_str(name);
                out.push_str(" : ");
                if *expand {
                    out.push_str("...");
                }
                iterable.render(out);
                out.push_str(") ");
                body.render(out);
            }
            NodeKind::ForClassic {
                init,
                cond,
                update,
                body,
            } => {
                out.push_str("for (");
                if let Some(init) = init {
                    init.render(out);
                }
                out.push_str("; ");
                if let Some(cond) = cond {
                    cond.render(out);
                }
                out.push_str("; ");
                if let Some(update) = update {
                    update.render(out);
                }
                out.push_str(") ");
                body.render(out);
            }
            NodeKind::Break => out.push_str("break"),
            NodeKind::Continue => out.push_str("continue"),
            NodeKind::Return(value) => {
                out.push_str("return");
                if let Some(value) = value {
                    out.push(' ');
                    value.render(out);
                }
            }
            NodeKind::Throw(value) => {
                out.push_str("throw ");
                value.render(out);
            }
            NodeKind::Try {
                resources,
                body,
                catch,
                finally,
            } => {
                out.push_str("try");
                if !resources.is_empty() {
                    out.push('(');
                    join(resources, out, "; ");
                    out.push(')');
                }
                out.push(' ');
                body.render(out);
                if let Some(catch) = catch {
                    out.push_str(" catch (const ");
                    out.push_str(&catch.name);
                    out.push_str(") ");
                    catch.body.render(out);
                }
                if let Some(finally) = finally {
                    out.push_str(" finally ");
                    finally.render(out);
                }
            }
            NodeKind::Switch {
                subject,
                cases,
                expression,
            } => {
                out.push_str("switch (");
                subject.render(out);
                out.push_str(") { ");
                for case in cases {
                    if case.labels.is_empty() {
                        out.push_str("default");
                    } else {
                        out.push_str("case ");
                        join(&case.labels, out, ", ");
                    }
                    if *expression {
                        out.push_str(" -> ");
                        case.body.render(out);
                        out.push_str("; ");
                    } else {
                        out.push_str(" : ");
                        case.body.render(out);
                        out.push_str("; ");
                    }
                }
                out.push('}');
            }
            NodeKind::Lambda(body) => {
                out.push('(');
                for (i, param) in body.parameters().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(param);
                }
                out.push_str(") -> ");
                body.root().render(out);
            }
            NodeKind::Annotation { name, args, body } => {
                out.push('@');
                out.push_str(name);
                if !args.is_empty() {
                    out.push('(');
                    join(args, out, ", ");
                    out.push(')');
                }
                out.push(' ');
                body.render(out);
            }
            NodeKind::Filter { object, predicate } => {
                object.render(out);
                out.push_str(".(");
                predicate.render(out);
                out.push(')');
            }
            NodeKind::Project { object, projector } => {
                object.render(out);
                out.push_str(".[");
                projector.render(out);
                out.push(']');
            }
        }
    }

    /// The rendered source form of this node.
    pub fn rendered(&self) -> String {
        let mut out = String::new();
        self.render(&mut out);
        out
    }
}

fn join(nodes: &[Node], out: &mut String, sep: &str) {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        node.render(out);
    }
}

fn render_literal(lit: &Literal, out: &mut String) {
    match lit {
        Literal::Null => out.push_str("null"),
        Literal::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Literal::Int(v) => out.push_str(&v.to_string()),
        Literal::Long(v) => {
            out.push_str(&v.to_string());
            out.push('l');
        }
        Literal::Big(v) => {
            out.push_str(&v.to_string());
            out.push('H');
        }
        Literal::Float(v) => {
            out.push_str(&v.to_string());
            out.push('f');
        }
        Literal::Double(v) => {
            out.push_str(&v.to_string());
            if v.fract() == 0.0 && !v.to_string().contains(['.', 'e']) {
                out.push_str(".0");
            }
        }
        Literal::Dec(v) => {
            out.push_str(&v.to_string());
            out.push('B');
        }
        Literal::Str(s) => {
            out.push('\'');
            for c in s.chars() {
                match c {
                    '\'' => out.push_str("\\'"),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    '\r' => out.push_str("\\r"),
                    other => out.push(other),
                }
            }
            out.push('\'');
        }
        Literal::Char(c) => {
            // chars re-render as one-character strings; typed declarations
            // coerce them back
            out.push('\'');
            out.push(*c);
            out.push('\'');
        }
    }
}

fn declared_keyword(declared: DeclaredType) -> &'static str {
    match declared {
        DeclaredType::Any => "var",
        DeclaredType::Bool => "boolean",
        DeclaredType::Char => "char",
        DeclaredType::I8 => "byte",
        DeclaredType::I16 => "short",
        DeclaredType::I32 => "int",
        DeclaredType::I64 => "long",
        DeclaredType::BigInt => "bigint",
        DeclaredType::F32 => "float",
        DeclaredType::F64 => "double",
        DeclaredType::Decimal => "decimal",
        DeclaredType::Str => "string",
    }
}
