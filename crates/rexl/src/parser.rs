//! Recursive-descent parser producing the [`crate::ast`] nodes.
//!
//! Scope resolution happens inline: every declaration claims a slot in the
//! enclosing function frame, identifier references resolve to local slots,
//! capture slots (threaded through intermediate lambdas) or context
//! lookups, and re-declaring a name in the same lexical block is rejected
//! here. Chains of plain identifiers rooted at a context variable carry
//! their full dotted form for ant-style global resolution.

use std::sync::Arc;

use ahash::AHashMap;

use crate::{
    ast::{BinOp, CatchClause, Literal, Node, NodeKind, SwitchCase, UnOp},
    error::{EvalError, EvalResult, Span},
    introspect::AccessorSlot,
    lexer::{tokenize, TokKind, Token},
    program::ScriptBody,
    scope::{CaptureDesc, DeclaredType, FrameLayout, SlotDesc, VarRef},
};

/// Guard against pathological nesting blowing the parse stack.
const MAX_NESTING_DEPTH: u16 = 200;

/// Parses a full script with optional named parameters.
pub(crate) fn parse_script(source: &str, params: &[Arc<str>]) -> EvalResult<ScriptBody> {
    let tokens = tokenize(source).map_err(|e| e.located(source))?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        source,
        frames: vec![FrameBuilder::new(params)?],
        depth: 0,
        suppress_ns: 0,
        suppress_lambda: 0,
    };
    let mut body = Vec::new();
    while !parser.at_end() {
        body.push(parser.parse_statement().map_err(|e| e.located(source))?);
        while parser.eat(&TokKind::Semi) {}
    }
    let expression = match body.as_slice() {
        [] => true,
        [only] => is_expression(only),
        _ => false,
    };
    let span = Span::new(0, source.len() as u32);
    let root = Node::new(NodeKind::Block(body), span);
    let frame = parser.frames.pop().expect("script frame");
    Ok(ScriptBody::new(source, params.to_vec(), frame.finish(), root, expression))
}

fn is_expression(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::Literal(_)
            | NodeKind::ListLit { .. }
            | NodeKind::SetLit { .. }
            | NodeKind::MapLit { .. }
            | NodeKind::Var(..)
            | NodeKind::ContextVar(_)
            | NodeKind::GetProp { .. }
            | NodeKind::GetIndex { .. }
            | NodeKind::MethodCall { .. }
            | NodeKind::CallValue { .. }
            | NodeKind::NamespaceCall { .. }
            | NodeKind::New { .. }
            | NodeKind::MethodRefOf { .. }
            | NodeKind::Unary { .. }
            | NodeKind::Binary { .. }
            | NodeKind::Ternary { .. }
            | NodeKind::Assign { .. }
            | NodeKind::IncDec { .. }
            | NodeKind::Lambda(_)
            | NodeKind::Filter { .. }
            | NodeKind::Project { .. }
    )
}

/// Scope bookkeeping for one function frame under construction.
struct FrameBuilder {
    slots: Vec<SlotDesc>,
    captures: Vec<CaptureDesc>,
    capture_map: AHashMap<String, u16>,
    /// Innermost-last stack of lexical blocks: visible name → slot.
    blocks: Vec<AHashMap<String, u16>>,
    params: u16,
}

impl FrameBuilder {
    fn new(params: &[Arc<str>]) -> EvalResult<Self> {
        let mut builder = Self {
            slots: Vec::new(),
            captures: Vec::new(),
            capture_map: AHashMap::new(),
            blocks: vec![AHashMap::new()],
            params: params.len() as u16,
        };
        for name in params {
            builder
                .declare(name, DeclaredType::Any, false)
                .map_err(|msg| EvalError::parse(Span::default(), msg))?;
        }
        Ok(builder)
    }

    fn declare(&mut self, name: &str, declared: DeclaredType, is_final: bool) -> Result<u16, String> {
        let block = self.blocks.last_mut().expect("at least one block");
        if block.contains_key(name) {
            return Err(format!("variable '{name}' is already declared"));
        }
        let index = self.slots.len() as u16;
        self.slots.push(SlotDesc {
            name: Arc::from(name),
            declared,
            is_final,
            captured: false,
        });
        block.insert(name.to_owned(), index);
        Ok(index)
    }

    fn lookup(&self, name: &str) -> Option<u16> {
        self.blocks.iter().rev().find_map(|block| block.get(name).copied())
    }

    fn finish(self) -> FrameLayout {
        FrameLayout {
            slots: self.slots,
            captures: self.captures,
            params: self.params,
        }
    }
}

struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'src str,
    frames: Vec<FrameBuilder>,
    depth: u16,
    /// Non-zero while parsing positions where `ident : ident (` is not a
    /// namespace call (ternary branches, map keys, case labels).
    suppress_ns: u32,
    /// Non-zero while parsing case labels, where `ident ->` belongs to the
    /// switch arm rather than starting a lambda.
    suppress_lambda: u32,
}

impl Parser<'_> {
    // ---- token plumbing ----

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&TokKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, ahead: usize) -> Option<&TokKind> {
        self.tokens.get(self.pos + ahead).map(|t| &t.kind)
    }

    fn peek_span(&self) -> Span {
        self.tokens.get(self.pos).map_or_else(
            || Span::new(self.source.len() as u32, self.source.len() as u32),
            |t| t.span,
        )
    }

    fn prev_span(&self) -> Span {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map_or(Span::default(), |t| t.span)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokKind, what: &str) -> EvalResult<Span> {
        if self.peek() == Some(kind) {
            let span = self.peek_span();
            self.pos += 1;
            Ok(span)
        } else {
            Err(self.error_here(format!("expected {what}")))
        }
    }

    fn error_here(&self, message: impl Into<String>) -> EvalError {
        EvalError::parse(self.peek_span(), message)
    }

    fn enter(&mut self) -> EvalResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.error_here("expression nesting too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ---- scope plumbing ----

    fn frame(&mut self) -> &mut FrameBuilder {
        self.frames.last_mut().expect("at least one frame")
    }

    fn declare(&mut self, name: &str, declared: DeclaredType, is_final: bool) -> EvalResult<u16> {
        let span = self.prev_span();
        self.frame()
            .declare(name, declared, is_final)
            .map_err(|msg| EvalError::parse(span, msg))
    }

    fn push_block(&mut self) {
        self.frame().blocks.push(AHashMap::new());
    }

    fn pop_block(&mut self) {
        self.frame().blocks.pop();
    }

    fn resolve_name(&mut self, name: &str) -> Option<VarRef> {
        self.resolve_in_frame(self.frames.len() - 1, name)
    }

    /// Resolves in frame `fi`, threading captures through every lambda
    /// between the declaration and the use.
    fn resolve_in_frame(&mut self, fi: usize, name: &str) -> Option<VarRef> {
        if let Some(index) = self.frames[fi].lookup(name) {
            return Some(VarRef::Local(index));
        }
        if let Some(ci) = self.frames[fi].capture_map.get(name).copied() {
            return Some(VarRef::Capture(ci));
        }
        if fi == 0 {
            return None;
        }
        let outer = self.resolve_in_frame(fi - 1, name)?;
        let is_final = match outer {
            VarRef::Local(ix) => {
                let slot = &mut self.frames[fi - 1].slots[ix as usize];
                slot.captured = true;
                slot.is_final
            }
            VarRef::Capture(ci) => self.frames[fi - 1].captures[ci as usize].is_final,
        };
        let frame = &mut self.frames[fi];
        let ci = frame.captures.len() as u16;
        frame.captures.push(CaptureDesc {
            name: Arc::from(name),
            outer,
            is_final,
        });
        frame.capture_map.insert(name.to_owned(), ci);
        Some(VarRef::Capture(ci))
    }

    // ---- statements ----

    fn parse_statement(&mut self) -> EvalResult<Node> {
        self.enter()?;
        let result = self.parse_statement_inner();
        self.leave();
        result
    }

    fn parse_statement_inner(&mut self) -> EvalResult<Node> {
        let start = self.peek_span();
        match self.peek() {
            Some(TokKind::LBrace) => self.parse_block(),
            Some(TokKind::If) => self.parse_if(),
            Some(TokKind::While) => self.parse_while(),
            Some(TokKind::Do) => self.parse_do_while(),
            Some(TokKind::For) => self.parse_for(),
            Some(TokKind::Break) => {
                self.advance();
                Ok(Node::new(NodeKind::Break, start))
            }
            Some(TokKind::Continue) => {
                self.advance();
                Ok(Node::new(NodeKind::Continue, start))
            }
            Some(TokKind::Return) => {
                self.advance();
                let value = if matches!(self.peek(), None | Some(TokKind::Semi | TokKind::RBrace)) {
                    None
                } else {
                    Some(Box::new(self.parse_expression()?))
                };
                Ok(Node::new(NodeKind::Return(value), start.to(self.prev_span())))
            }
            Some(TokKind::Throw) => {
                self.advance();
                let value = Box::new(self.parse_expression()?);
                Ok(Node::new(NodeKind::Throw(value), start.to(self.prev_span())))
            }
            Some(TokKind::Try) => self.parse_try(),
            Some(TokKind::Switch) => self.parse_switch(),
            Some(TokKind::Var | TokKind::Let | TokKind::Const | TokKind::Final) => self.parse_declaration(),
            Some(TokKind::At) => self.parse_annotation(),
            Some(TokKind::Ident(name)) if declared_type_of(name).is_some() && matches!(self.peek_at(1), Some(TokKind::Ident(_))) => {
                self.parse_typed_declaration()
            }
            _ => self.parse_expression(),
        }
    }

    fn parse_block(&mut self) -> EvalResult<Node> {
        let start = self.expect(&TokKind::LBrace, "'{'")?;
        self.push_block();
        let mut body = Vec::new();
        while !matches!(self.peek(), Some(TokKind::RBrace) | None) {
            body.push(self.parse_statement()?);
            while self.eat(&TokKind::Semi) {}
        }
        self.pop_block();
        let end = self.expect(&TokKind::RBrace, "'}'")?;
        Ok(Node::new(NodeKind::Block(body), start.to(end)))
    }

    fn parse_if(&mut self) -> EvalResult<Node> {
        let start = self.expect(&TokKind::If, "'if'")?;
        self.expect(&TokKind::LParen, "'('")?;
        let cond = Box::new(self.parse_expression()?);
        self.expect(&TokKind::RParen, "')'")?;
        let then = Box::new(self.parse_statement()?);
        let otherwise = if self.eat(&TokKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Node::new(
            NodeKind::If { cond, then, otherwise },
            start.to(self.prev_span()),
        ))
    }

    fn parse_while(&mut self) -> EvalResult<Node> {
        let start = self.expect(&TokKind::While, "'while'")?;
        self.expect(&TokKind::LParen, "'('")?;
        let cond = Box::new(self.parse_expression()?);
        self.expect(&TokKind::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Node::new(NodeKind::While { cond, body }, start.to(self.prev_span())))
    }

    fn parse_do_while(&mut self) -> EvalResult<Node> {
        let start = self.expect(&TokKind::Do, "'do'")?;
        let body = Box::new(self.parse_statement()?);
        self.expect(&TokKind::While, "'while'")?;
        self.expect(&TokKind::LParen, "'('")?;
        let cond = Box::new(self.parse_expression()?);
        let end = self.expect(&TokKind::RParen, "')'")?;
        Ok(Node::new(NodeKind::DoWhile { body, cond }, start.to(end)))
    }

    fn parse_for(&mut self) -> EvalResult<Node> {
        let start = self.expect(&TokKind::For, "'for'")?;
        self.expect(&TokKind::LParen, "'('")?;
        self.push_block();
        // for-each: `for (var x : iterable)`
        if matches!(self.peek(), Some(TokKind::Var | TokKind::Let))
            && matches!(self.peek_at(1), Some(TokKind::Ident(_)))
            && self.peek_at(2) == Some(&TokKind::Colon)
        {
            self.advance();
            let name = self.ident("loop variable")?;
            let var = self.declare(&name, DeclaredType::Any, false)?;
            self.expect(&TokKind::Colon, "':'")?;
            let expand = self.eat(&TokKind::Ellipsis);
            let iterable = Box::new(self.parse_expression()?);
            self.expect(&TokKind::RParen, "')'")?;
            let body = Box::new(self.parse_statement()?);
            self.pop_block();
            return Ok(Node::new(
                NodeKind::ForEach {
                    var,
                    name,
                    iterable,
                    body,
                    expand,
                },
                start.to(self.prev_span()),
            ));
        }
        // classic: `for (init; cond; update)`
        let init = if self.peek() == Some(&TokKind::Semi) {
            None
        } else {
            Some(Box::new(self.parse_statement()?))
        };
        self.expect(&TokKind::Semi, "';'")?;
        let cond = if self.peek() == Some(&TokKind::Semi) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect(&TokKind::Semi, "';'")?;
        let update = if self.peek() == Some(&TokKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect(&TokKind::RParen, "')'")?;
        let body = Box::new(self.parse_statement()?);
        self.pop_block();
        Ok(Node::new(
            NodeKind::ForClassic { init, cond, update, body },
            start.to(self.prev_span()),
        ))
    }

    fn parse_try(&mut self) -> EvalResult<Node> {
        let start = self.expect(&TokKind::Try, "'try'")?;
        self.push_block();
        let mut resources = Vec::new();
        if self.eat(&TokKind::LParen) {
            while self.peek() != Some(&TokKind::RParen) {
                resources.push(self.parse_statement()?);
                if !self.eat(&TokKind::Semi) {
                    break;
                }
            }
            self.expect(&TokKind::RParen, "')'")?;
        }
        let body = Box::new(self.parse_block()?);
        self.pop_block();
        let catch = if self.eat(&TokKind::Catch) {
            self.expect(&TokKind::LParen, "'('")?;
            // the binding modifier is optional; the binding is read-only
            // either way
            if matches!(self.peek(), Some(TokKind::Var | TokKind::Let | TokKind::Const | TokKind::Final)) {
                self.advance();
            }
            let name = self.ident("catch binding")?;
            self.expect(&TokKind::RParen, "')'")?;
            self.push_block();
            let var = self.declare(&name, DeclaredType::Any, true)?;
            let body = self.parse_block()?;
            self.pop_block();
            Some(Box::new(CatchClause { var, name, body: Box::new(body) }))
        } else {
            None
        };
        let finally = if self.eat(&TokKind::Finally) {
            Some(Box::new(self.parse_block()?))
        } else {
            None
        };
        Ok(Node::new(
            NodeKind::Try {
                resources,
                body,
                catch,
                finally,
            },
            start.to(self.prev_span()),
        ))
    }

    fn parse_switch(&mut self) -> EvalResult<Node> {
        let start = self.expect(&TokKind::Switch, "'switch'")?;
        self.expect(&TokKind::LParen, "'('")?;
        let subject = Box::new(self.parse_expression()?);
        self.expect(&TokKind::RParen, "')'")?;
        self.expect(&TokKind::LBrace, "'{'")?;
        self.push_block();
        let mut cases: Vec<SwitchCase> = Vec::new();
        let mut expression = None;
        while !matches!(self.peek(), Some(TokKind::RBrace) | None) {
            let case_span = self.peek_span();
            let labels = if self.eat(&TokKind::Default) {
                Vec::new()
            } else {
                self.expect(&TokKind::Case, "'case' or 'default'")?;
                let mut labels = Vec::new();
                self.suppress_ns += 1;
                self.suppress_lambda += 1;
                loop {
                    labels.push(self.parse_conditional()?);
                    if !self.eat(&TokKind::Comma) {
                        break;
                    }
                }
                self.suppress_lambda -= 1;
                self.suppress_ns -= 1;
                labels
            };
            let arrow_form = match self.peek() {
                Some(TokKind::Arrow) => true,
                Some(TokKind::Colon) => false,
                _ => return Err(self.error_here("expected '->' or ':' after case labels")),
            };
            self.advance();
            match expression {
                None => expression = Some(arrow_form),
                Some(prev) if prev != arrow_form => {
                    return Err(self.error_here("cannot mix '->' and ':' switch forms"));
                }
                Some(_) => {}
            }
            let body = if arrow_form {
                let body = self.parse_statement()?;
                self.eat(&TokKind::Semi);
                body
            } else {
                // statements up to the next label or the end; empty bodies
                // fall through
                let body_start = self.peek_span();
                let mut stmts = Vec::new();
                while !matches!(
                    self.peek(),
                    Some(TokKind::Case | TokKind::Default | TokKind::RBrace) | None
                ) {
                    stmts.push(self.parse_statement()?);
                    while self.eat(&TokKind::Semi) {}
                }
                Node::new(NodeKind::Block(stmts), body_start.to(self.prev_span()))
            };
            cases.push(SwitchCase {
                labels,
                body,
                span: case_span.to(self.prev_span()),
            });
        }
        self.pop_block();
        let end = self.expect(&TokKind::RBrace, "'}'")?;
        Ok(Node::new(
            NodeKind::Switch {
                subject,
                cases,
                expression: expression.unwrap_or(true),
            },
            start.to(end),
        ))
    }

    fn parse_declaration(&mut self) -> EvalResult<Node> {
        let start = self.peek_span();
        let is_final = match self.peek() {
            Some(TokKind::Const) => {
                self.advance();
                true
            }
            Some(TokKind::Final) => {
                self.advance();
                // `final var x` and bare `final x`
                self.eat(&TokKind::Var);
                true
            }
            _ => {
                self.advance();
                false
            }
        };
        // optional type after const/final
        let declared = match self.peek() {
            Some(TokKind::Ident(name)) if declared_type_of(name).is_some() && matches!(self.peek_at(1), Some(TokKind::Ident(_))) => {
                let t = declared_type_of(name).expect("checked");
                self.advance();
                t
            }
            _ => DeclaredType::Any,
        };
        // destructuring `var (x, y) = expr`
        if declared == DeclaredType::Any && self.eat(&TokKind::LParen) {
            let mut names = Vec::new();
            loop {
                names.push(self.ident("variable name")?);
                if !self.eat(&TokKind::Comma) {
                    break;
                }
            }
            self.expect(&TokKind::RParen, "')'")?;
            self.expect(&TokKind::Assign, "'='")?;
            let init = Box::new(self.parse_expression()?);
            let mut vars = Vec::new();
            for name in &names {
                vars.push(self.declare(name, DeclaredType::Any, is_final)?);
            }
            return Ok(Node::new(
                NodeKind::DeclMulti { vars, names, init },
                start.to(self.prev_span()),
            ));
        }
        let name = self.ident("variable name")?;
        // declared before the initializer parses, so a lambda initializer
        // can capture the name recursively
        let var = self.declare(&name, declared, is_final)?;
        let init = if self.eat(&TokKind::Assign) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        if is_final && init.is_none() {
            return Err(EvalError::parse(
                start.to(self.prev_span()),
                format!("final variable '{name}' must be initialized"),
            ));
        }
        Ok(Node::new(
            NodeKind::Decl {
                var,
                name,
                declared,
                is_final,
                init,
            },
            start.to(self.prev_span()),
        ))
    }

    fn parse_typed_declaration(&mut self) -> EvalResult<Node> {
        let start = self.peek_span();
        let Some(TokKind::Ident(type_name)) = self.peek().cloned() else {
            return Err(self.error_here("expected type name"));
        };
        let declared = declared_type_of(&type_name).expect("caller checked");
        self.advance();
        let name = self.ident("variable name")?;
        let init = if self.eat(&TokKind::Assign) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        let var = self.declare(&name, declared, false)?;
        Ok(Node::new(
            NodeKind::Decl {
                var,
                name,
                declared,
                is_final: false,
                init,
            },
            start.to(self.prev_span()),
        ))
    }

    fn parse_annotation(&mut self) -> EvalResult<Node> {
        let start = self.expect(&TokKind::At, "'@'")?;
        let name = self.ident("annotation name")?;
        let mut args = Vec::new();
        if self.eat(&TokKind::LParen) {
            while self.peek() != Some(&TokKind::RParen) {
                args.push(self.parse_expression()?);
                if !self.eat(&TokKind::Comma) {
                    break;
                }
            }
            self.expect(&TokKind::RParen, "')'")?;
        }
        let body = Box::new(self.parse_statement()?);
        Ok(Node::new(
            NodeKind::Annotation { name, args, body },
            start.to(self.prev_span()),
        ))
    }

    // ---- expressions ----

    fn parse_expression(&mut self) -> EvalResult<Node> {
        self.enter()?;
        let result = self.parse_assignment();
        self.leave();
        result
    }

    fn parse_assignment(&mut self) -> EvalResult<Node> {
        let target = self.parse_conditional()?;
        let op = match self.peek() {
            Some(TokKind::Assign) => None,
            Some(TokKind::PlusAssign) => Some(BinOp::Add),
            Some(TokKind::MinusAssign) => Some(BinOp::Sub),
            Some(TokKind::StarAssign) => Some(BinOp::Mul),
            Some(TokKind::SlashAssign) => Some(BinOp::Div),
            Some(TokKind::PercentAssign) => Some(BinOp::Mod),
            Some(TokKind::AmpAssign) => Some(BinOp::BitAnd),
            Some(TokKind::PipeAssign) => Some(BinOp::BitOr),
            Some(TokKind::CaretAssign) => Some(BinOp::BitXor),
            Some(TokKind::ShlAssign) => Some(BinOp::Shl),
            Some(TokKind::ShrAssign) => Some(BinOp::Shr),
            Some(TokKind::UshrAssign) => Some(BinOp::Ushr),
            _ => return Ok(target),
        };
        if !is_lvalue(&target) {
            return Err(EvalError::parse(target.span, "invalid assignment target"));
        }
        self.advance();
        let value = Box::new(self.parse_assignment()?);
        let span = target.span.to(value.span);
        Ok(Node::new(
            NodeKind::Assign {
                target: Box::new(target),
                op,
                value,
            },
            span,
        ))
    }

    fn parse_conditional(&mut self) -> EvalResult<Node> {
        let cond = self.parse_or()?;
        match self.peek() {
            Some(TokKind::Question) => {
                self.advance();
                self.suppress_ns += 1;
                let then = Box::new(self.parse_conditional()?);
                self.suppress_ns -= 1;
                self.expect(&TokKind::Colon, "':'")?;
                let otherwise = Box::new(self.parse_conditional()?);
                let span = cond.span.to(otherwise.span);
                Ok(Node::new(
                    NodeKind::Ternary {
                        cond: Box::new(cond),
                        then,
                        otherwise,
                    },
                    span,
                ))
            }
            Some(TokKind::QuestionColon) => {
                self.advance();
                let rhs = self.parse_conditional()?;
                Ok(binary(BinOp::Elvis, cond, rhs))
            }
            Some(TokKind::QuestionQuestion) => {
                self.advance();
                let rhs = self.parse_conditional()?;
                Ok(binary(BinOp::NullCoalesce, cond, rhs))
            }
            _ => Ok(cond),
        }
    }

    fn parse_or(&mut self) -> EvalResult<Node> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(TokKind::PipePipe | TokKind::OrKw)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> EvalResult<Node> {
        let mut lhs = self.parse_bit_or()?;
        while matches!(self.peek(), Some(TokKind::AmpAmp | TokKind::AndKw)) {
            self.advance();
            let rhs = self.parse_bit_or()?;
            lhs = binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bit_or(&mut self) -> EvalResult<Node> {
        let mut lhs = self.parse_bit_xor()?;
        while self.peek() == Some(&TokKind::Pipe) {
            self.advance();
            let rhs = self.parse_bit_xor()?;
            lhs = binary(BinOp::BitOr, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bit_xor(&mut self) -> EvalResult<Node> {
        let mut lhs = self.parse_bit_and()?;
        while self.peek() == Some(&TokKind::Caret) {
            self.advance();
            let rhs = self.parse_bit_and()?;
            lhs = binary(BinOp::BitXor, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bit_and(&mut self) -> EvalResult<Node> {
        let mut lhs = self.parse_equality()?;
        while self.peek() == Some(&TokKind::Amp) {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = binary(BinOp::BitAnd, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> EvalResult<Node> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(TokKind::EqEq | TokKind::EqKw) => BinOp::Eq,
                Some(TokKind::NotEq | TokKind::NeKw) => BinOp::Ne,
                Some(TokKind::Match) => BinOp::Match,
                Some(TokKind::NotMatch) => BinOp::NotMatch,
                Some(TokKind::StartsWith) => BinOp::StartsWith,
                Some(TokKind::NotStartsWith) => BinOp::NotStartsWith,
                Some(TokKind::EndsWith) => BinOp::EndsWith,
                Some(TokKind::NotEndsWith) => BinOp::NotEndsWith,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_relational(&mut self) -> EvalResult<Node> {
        let mut lhs = self.parse_range()?;
        loop {
            let op = match self.peek() {
                Some(TokKind::Lt) => BinOp::Lt,
                Some(TokKind::Le) => BinOp::Le,
                Some(TokKind::Gt) => BinOp::Gt,
                Some(TokKind::Ge) => BinOp::Ge,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_range()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_range(&mut self) -> EvalResult<Node> {
        let lhs = self.parse_shift()?;
        if self.peek() == Some(&TokKind::DotDot) {
            self.advance();
            let rhs = self.parse_shift()?;
            return Ok(binary(BinOp::Range, lhs, rhs));
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> EvalResult<Node> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(TokKind::Shl) => BinOp::Shl,
                Some(TokKind::Shr) => BinOp::Shr,
                Some(TokKind::Ushr) => BinOp::Ushr,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_additive(&mut self) -> EvalResult<Node> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(TokKind::Plus) => BinOp::Add,
                Some(TokKind::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> EvalResult<Node> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(TokKind::Star) => BinOp::Mul,
                Some(TokKind::Slash) => BinOp::Div,
                Some(TokKind::Percent) => BinOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> EvalResult<Node> {
        self.enter()?;
        let result = self.parse_unary_inner();
        self.leave();
        result
    }

    fn parse_unary_inner(&mut self) -> EvalResult<Node> {
        let start = self.peek_span();
        let op = match self.peek() {
            Some(TokKind::Bang | TokKind::NotKw) => Some(UnOp::Not),
            Some(TokKind::Minus) => Some(UnOp::Neg),
            Some(TokKind::Tilde) => Some(UnOp::BitNot),
            Some(TokKind::Empty) => Some(UnOp::Empty),
            Some(TokKind::Size) => Some(UnOp::Size),
            Some(TokKind::Inc | TokKind::Decr) => {
                let increment = self.peek() == Some(&TokKind::Inc);
                self.advance();
                let target = self.parse_unary()?;
                if !is_lvalue(&target) {
                    return Err(EvalError::parse(target.span, "invalid increment target"));
                }
                let span = start.to(target.span);
                return Ok(Node::new(
                    NodeKind::IncDec {
                        target: Box::new(target),
                        increment,
                        prefix: true,
                    },
                    span,
                ));
            }
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = Box::new(self.parse_unary()?);
            let span = start.to(operand.span);
            return Ok(Node::new(NodeKind::Unary { op, operand }, span));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> EvalResult<Node> {
        let mut node = self.parse_primary()?;
        // dotted-chain tracking for ant-style globals
        let mut antish: Option<String> = match &node.kind {
            NodeKind::ContextVar(name) => Some(name.to_string()),
            _ => None,
        };
        loop {
            match self.peek() {
                Some(TokKind::Dot) => {
                    self.advance();
                    match self.peek().cloned() {
                        // `coll.(predicate)` filter
                        Some(TokKind::LParen) => {
                            self.advance();
                            let predicate = Box::new(self.parse_expression()?);
                            let end = self.expect(&TokKind::RParen, "')'")?;
                            let span = node.span.to(end);
                            node = Node::new(
                                NodeKind::Filter {
                                    object: Box::new(node),
                                    predicate,
                                },
                                span,
                            );
                            antish = None;
                        }
                        // `coll.[projector]` projection
                        Some(TokKind::LBracket) => {
                            self.advance();
                            let projector = Box::new(self.parse_expression()?);
                            let end = self.expect(&TokKind::RBracket, "']'")?;
                            let span = node.span.to(end);
                            node = Node::new(
                                NodeKind::Project {
                                    object: Box::new(node),
                                    projector,
                                },
                                span,
                            );
                            antish = None;
                        }
                        _ => {
                            let name = self.member_name()?;
                            node = self.finish_member(node, name, false, &mut antish)?;
                        }
                    }
                }
                Some(TokKind::QuestionDot) => {
                    self.advance();
                    let name = self.member_name()?;
                    antish = None;
                    node = self.finish_member(node, name, true, &mut antish)?;
                }
                Some(TokKind::LBracket) => {
                    self.advance();
                    let mut keys = Vec::new();
                    loop {
                        keys.push(self.parse_expression()?);
                        if !self.eat(&TokKind::Comma) {
                            break;
                        }
                    }
                    let end = self.expect(&TokKind::RBracket, "']'")?;
                    let span = node.span.to(end);
                    node = Node::new(
                        NodeKind::GetIndex {
                            object: Box::new(node),
                            keys,
                            safe: false,
                        },
                        span,
                    );
                    antish = None;
                }
                Some(TokKind::LParen) => {
                    self.advance();
                    let mut args = Vec::new();
                    while self.peek() != Some(&TokKind::RParen) {
                        args.push(self.parse_expression()?);
                        if !self.eat(&TokKind::Comma) {
                            break;
                        }
                    }
                    let end = self.expect(&TokKind::RParen, "')'")?;
                    let span = node.span.to(end);
                    node = Node::new(
                        NodeKind::CallValue {
                            callee: Box::new(node),
                            args,
                        },
                        span,
                    );
                    antish = None;
                }
                Some(TokKind::ColonColon) => {
                    self.advance();
                    let name = if self.eat(&TokKind::New) {
                        Arc::from("new")
                    } else {
                        self.member_name()?
                    };
                    let span = node.span.to(self.prev_span());
                    node = Node::new(
                        NodeKind::MethodRefOf {
                            target: Box::new(node),
                            name,
                        },
                        span,
                    );
                    antish = None;
                }
                Some(TokKind::Inc | TokKind::Decr) if is_lvalue(&node) => {
                    let increment = self.peek() == Some(&TokKind::Inc);
                    let end = self.peek_span();
                    self.advance();
                    let span = node.span.to(end);
                    node = Node::new(
                        NodeKind::IncDec {
                            target: Box::new(node),
                            increment,
                            prefix: false,
                        },
                        span,
                    );
                    antish = None;
                }
                _ => return Ok(node),
            }
        }
    }

    /// Completes `.name` / `?.name` into a property access or method call.
    fn finish_member(&mut self, object: Node, name: Arc<str>, safe: bool, antish: &mut Option<String>) -> EvalResult<Node> {
        if self.peek() == Some(&TokKind::LParen) {
            self.advance();
            let mut args = Vec::new();
            while self.peek() != Some(&TokKind::RParen) {
                args.push(self.parse_expression()?);
                if !self.eat(&TokKind::Comma) {
                    break;
                }
            }
            let end = self.expect(&TokKind::RParen, "')'")?;
            let span = object.span.to(end);
            *antish = None;
            return Ok(Node::new(
                NodeKind::MethodCall {
                    object: Box::new(object),
                    name,
                    args,
                    safe,
                    slot: AccessorSlot::default(),
                },
                span,
            ));
        }
        let span = object.span.to(self.prev_span());
        let antish_key = if safe {
            None
        } else {
            antish.as_mut().map(|prefix| {
                prefix.push('.');
                prefix.push_str(&name);
                Arc::from(prefix.as_str())
            })
        };
        if safe {
            *antish = None;
        }
        Ok(Node::new(
            NodeKind::GetProp {
                object: Box::new(object),
                name,
                safe,
                antish: antish_key,
                slot: AccessorSlot::default(),
            },
            span,
        ))
    }

    /// A member name after `.`; accepts the few keywords that double as
    /// member names.
    fn member_name(&mut self) -> EvalResult<Arc<str>> {
        match self.peek().cloned() {
            Some(TokKind::Ident(name)) => {
                self.advance();
                Ok(name)
            }
            Some(TokKind::Size) => {
                self.advance();
                Ok(Arc::from("size"))
            }
            Some(TokKind::Empty) => {
                self.advance();
                Ok(Arc::from("empty"))
            }
            Some(TokKind::New) => {
                self.advance();
                Ok(Arc::from("new"))
            }
            Some(TokKind::Int(v)) => {
                self.advance();
                Ok(Arc::from(v.to_string().as_str()))
            }
            _ => Err(self.error_here("expected member name")),
        }
    }

    fn ident(&mut self, what: &str) -> EvalResult<Arc<str>> {
        match self.peek().cloned() {
            Some(TokKind::Ident(name)) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_here(format!("expected {what}"))),
        }
    }

    fn parse_primary(&mut self) -> EvalResult<Node> {
        let start = self.peek_span();
        let Some(kind) = self.peek().cloned() else {
            return Err(self.error_here("unexpected end of input"));
        };
        match kind {
            TokKind::Int(v) => self.literal(Literal::Int(v)),
            TokKind::Long(v) => self.literal(Literal::Long(v)),
            TokKind::Big(v) => self.literal(Literal::Big(v)),
            TokKind::Float(v) => self.literal(Literal::Float(v)),
            TokKind::Double(v) => self.literal(Literal::Double(v)),
            TokKind::Dec(v) => self.literal(Literal::Dec(v)),
            TokKind::Str(s) => self.literal(Literal::Str(s)),
            TokKind::True => self.literal(Literal::Bool(true)),
            TokKind::False => self.literal(Literal::Bool(false)),
            TokKind::Null => self.literal(Literal::Null),
            TokKind::Ident(name) => {
                // single-parameter lambda: `x -> expr` / `x => expr`
                if self.suppress_lambda == 0 && matches!(self.peek_at(1), Some(TokKind::Arrow | TokKind::FatArrow)) {
                    self.advance();
                    self.advance();
                    return self.parse_lambda_body(vec![name], start);
                }
                // namespace call: `ns:fn(args)`
                if self.suppress_ns == 0
                    && self.peek_at(1) == Some(&TokKind::Colon)
                    && matches!(self.peek_at(2), Some(TokKind::Ident(_)))
                    && self.peek_at(3) == Some(&TokKind::LParen)
                {
                    self.advance();
                    self.advance();
                    let func = self.ident("function name")?;
                    self.expect(&TokKind::LParen, "'('")?;
                    let mut args = Vec::new();
                    while self.peek() != Some(&TokKind::RParen) {
                        args.push(self.parse_expression()?);
                        if !self.eat(&TokKind::Comma) {
                            break;
                        }
                    }
                    let end = self.expect(&TokKind::RParen, "')'")?;
                    return Ok(Node::new(
                        NodeKind::NamespaceCall {
                            ns: name,
                            name: func,
                            args,
                        },
                        start.to(end),
                    ));
                }
                self.advance();
                match self.resolve_name(&name) {
                    Some(var) => Ok(Node::new(NodeKind::Var(var, name), start)),
                    None => Ok(Node::new(NodeKind::ContextVar(name), start)),
                }
            }
            TokKind::Function => {
                self.advance();
                let mut params = Vec::new();
                if self.eat(&TokKind::LParen) {
                    while self.peek() != Some(&TokKind::RParen) {
                        params.push(self.ident("parameter name")?);
                        if !self.eat(&TokKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokKind::RParen, "')'")?;
                }
                self.parse_lambda_body(params, start)
            }
            TokKind::New => {
                self.advance();
                self.expect(&TokKind::LParen, "'('")?;
                let mut args = Vec::new();
                while self.peek() != Some(&TokKind::RParen) {
                    args.push(self.parse_expression()?);
                    if !self.eat(&TokKind::Comma) {
                        break;
                    }
                }
                let end = self.expect(&TokKind::RParen, "')'")?;
                if args.is_empty() {
                    return Err(EvalError::parse(start.to(end), "new() requires a class argument"));
                }
                Ok(Node::new(NodeKind::New { args }, start.to(end)))
            }
            TokKind::LParen => {
                // lambda parameter list or parenthesized expression
                if self.suppress_lambda == 0 {
                    if let Some(params) = self.try_lambda_params() {
                        return self.parse_lambda_body(params, start);
                    }
                }
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokKind::RParen, "')'")?;
                Ok(inner)
            }
            TokKind::LBracket | TokKind::HashBracket => {
                let immutable = kind == TokKind::HashBracket;
                self.advance();
                let mut items = Vec::new();
                let mut sequence = false;
                while self.peek() != Some(&TokKind::RBracket) {
                    if self.eat(&TokKind::Ellipsis) {
                        sequence = true;
                        break;
                    }
                    items.push(self.parse_expression()?);
                    if !self.eat(&TokKind::Comma) {
                        break;
                    }
                }
                let end = self.expect(&TokKind::RBracket, "']'")?;
                Ok(Node::new(
                    NodeKind::ListLit {
                        items,
                        immutable,
                        sequence,
                    },
                    start.to(end),
                ))
            }
            TokKind::LBrace | TokKind::HashBrace => {
                let immutable = kind == TokKind::HashBrace;
                self.advance();
                self.parse_braced_literal(immutable, start)
            }
            _ => Err(self.error_here("unexpected token")),
        }
    }

    fn literal(&mut self, lit: Literal) -> EvalResult<Node> {
        let span = self.peek_span();
        self.advance();
        Ok(Node::new(NodeKind::Literal(lit), span))
    }

    /// Set or map literal after the opening brace.
    fn parse_braced_literal(&mut self, immutable: bool, start: Span) -> EvalResult<Node> {
        // `{:}` empty map, `{}` empty set
        if self.eat(&TokKind::Colon) {
            let end = self.expect(&TokKind::RBrace, "'}'")?;
            return Ok(Node::new(
                NodeKind::MapLit {
                    pairs: Vec::new(),
                    immutable,
                },
                start.to(end),
            ));
        }
        if self.peek() == Some(&TokKind::RBrace) {
            let end = self.expect(&TokKind::RBrace, "'}'")?;
            return Ok(Node::new(
                NodeKind::SetLit {
                    items: Vec::new(),
                    immutable,
                },
                start.to(end),
            ));
        }
        self.suppress_ns += 1;
        let first = self.parse_expression()?;
        self.suppress_ns -= 1;
        if self.eat(&TokKind::Colon) {
            let value = self.parse_expression()?;
            let mut pairs = vec![(first, value)];
            while self.eat(&TokKind::Comma) {
                self.suppress_ns += 1;
                let key = self.parse_expression()?;
                self.suppress_ns -= 1;
                self.expect(&TokKind::Colon, "':'")?;
                let value = self.parse_expression()?;
                pairs.push((key, value));
            }
            let end = self.expect(&TokKind::RBrace, "'}'")?;
            Ok(Node::new(NodeKind::MapLit { pairs, immutable }, start.to(end)))
        } else {
            let mut items = vec![first];
            while self.eat(&TokKind::Comma) {
                items.push(self.parse_expression()?);
            }
            let end = self.expect(&TokKind::RBrace, "'}'")?;
            Ok(Node::new(NodeKind::SetLit { items, immutable }, start.to(end)))
        }
    }

    /// Looks ahead for `( ident, ident ) ->` and consumes through the
    /// arrow when it matches.
    fn try_lambda_params(&mut self) -> Option<Vec<Arc<str>>> {
        debug_assert_eq!(self.peek(), Some(&TokKind::LParen));
        let mut ahead = 1;
        let mut params = Vec::new();
        loop {
            match self.peek_at(ahead) {
                Some(TokKind::RParen) => {
                    ahead += 1;
                    break;
                }
                Some(TokKind::Ident(name)) => {
                    params.push(Arc::clone(name));
                    ahead += 1;
                    match self.peek_at(ahead) {
                        Some(TokKind::Comma) => ahead += 1,
                        Some(TokKind::RParen) => {
                            ahead += 1;
                            break;
                        }
                        _ => return None,
                    }
                }
                _ => return None,
            }
        }
        if matches!(self.peek_at(ahead), Some(TokKind::Arrow | TokKind::FatArrow)) {
            self.pos += ahead + 1;
            Some(params)
        } else {
            None
        }
    }

    /// Parses a lambda body (block or single expression) in a fresh frame.
    fn parse_lambda_body(&mut self, params: Vec<Arc<str>>, start: Span) -> EvalResult<Node> {
        let body_source_start = start.start as usize;
        self.frames.push(FrameBuilder::new(&params)?);
        let result = if self.peek() == Some(&TokKind::LBrace) {
            self.parse_block()
        } else {
            self.parse_expression()
        };
        let root = match result {
            Ok(root) => root,
            Err(e) => {
                self.frames.pop();
                return Err(e);
            }
        };
        let frame = self.frames.pop().expect("lambda frame");
        let end = self.prev_span().end as usize;
        let source = &self.source[body_source_start.min(self.source.len())..end.min(self.source.len())];
        let expression = is_expression(&root);
        let span = start.to(self.prev_span());
        let body = ScriptBody::new(source, params, frame.finish(), root, expression);
        Ok(Node::new(NodeKind::Lambda(Arc::new(body)), span))
    }
}

fn binary(op: BinOp, lhs: Node, rhs: Node) -> Node {
    let span = lhs.span.to(rhs.span);
    Node::new(
        NodeKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

fn is_lvalue(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::Var(..) | NodeKind::ContextVar(_) | NodeKind::GetProp { .. } | NodeKind::GetIndex { .. }
    )
}

fn declared_type_of(name: &str) -> Option<DeclaredType> {
    Some(match name {
        "boolean" => DeclaredType::Bool,
        "char" => DeclaredType::Char,
        "byte" => DeclaredType::I8,
        "short" => DeclaredType::I16,
        "int" => DeclaredType::I32,
        "long" => DeclaredType::I64,
        "bigint" => DeclaredType::BigInt,
        "float" => DeclaredType::F32,
        "double" => DeclaredType::F64,
        "decimal" => DeclaredType::Decimal,
        "string" => DeclaredType::Str,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ScriptBody {
        parse_script(source, &[]).unwrap()
    }

    fn parse_err(source: &str) -> EvalError {
        parse_script(source, &[]).unwrap_err()
    }

    #[test]
    fn expression_flag() {
        assert!(parse("1 + 2").is_expression());
        assert!(parse("a.b.c").is_expression());
        assert!(!parse("var x = 1; x + 1").is_expression());
        assert!(!parse("while (true) { }").is_expression());
    }

    #[test]
    fn redeclaration_in_same_block_is_rejected() {
        let err = parse_err("var x = 1; var x = 2");
        assert!(err.message.contains("already declared"), "{}", err.message);
    }

    #[test]
    fn shadowing_in_nested_block_is_allowed() {
        parse("var x = 1; { var x = 2; }");
    }

    #[test]
    fn uninitialized_const_is_rejected() {
        let err = parse_err("const x");
        assert!(err.message.contains("must be initialized"), "{}", err.message);
    }

    #[test]
    fn lambda_captures_enclosing_local() {
        let body = parse("var n = 1; var f = () -> n + 1; f()");
        // the outer frame's `n` slot must be marked captured
        let n_slot = body.layout().slots.iter().find(|s| s.name.as_ref() == "n").unwrap();
        assert!(n_slot.captured);
    }

    #[test]
    fn lambda_forms() {
        parse("var f = function(x) { x * 2 }; f(3)");
        parse("var f = function { 21 + 21 }; f()");
        parse("var f = (x, y) -> { x + y }; f(1, 2)");
        parse("var f = x -> x + x; f(4)");
        parse("var f = x => x + x; f(4)");
    }

    #[test]
    fn ternary_colon_is_not_a_namespace_call() {
        parse("a ? b : c(1)");
        parse("{ 'k' : f(1) }");
    }

    #[test]
    fn namespace_call_form() {
        let body = parse("math:abs(-3)");
        let NodeKind::Block(stmts) = &body.root().kind else { panic!() };
        assert!(matches!(stmts[0].kind, NodeKind::NamespaceCall { .. }));
    }

    #[test]
    fn antish_chain_is_tracked() {
        let body = parse("froboz.value.pi");
        let NodeKind::Block(stmts) = &body.root().kind else { panic!() };
        let NodeKind::GetProp { antish, .. } = &stmts[0].kind else { panic!() };
        assert_eq!(antish.as_deref(), Some("froboz.value.pi"));
    }

    #[test]
    fn antish_is_disabled_for_declared_roots() {
        let body = parse("var froboz = 1; froboz.value");
        let NodeKind::Block(stmts) = &body.root().kind else { panic!() };
        let NodeKind::GetProp { antish, .. } = &stmts[1].kind else { panic!() };
        assert!(antish.is_none());
    }

    #[test]
    fn switch_forms() {
        parse("switch (x) { case 1, 2 -> 'a'; default -> 'b' }");
        parse("switch (x) { case 1 : y = 1; break; default : y = 2; }");
        let err = parse_err("switch (x) { case 1 -> 'a'; case 2 : 'b'; }");
        assert!(err.message.contains("mix"), "{}", err.message);
    }

    #[test]
    fn try_with_resources() {
        parse("try (let r = acquire()) { r.use2() } catch (const e) { 42 } finally { 169 }");
    }

    #[test]
    fn destructuring_declaration() {
        parse("var (x, y) = [1, 2]; x + y");
    }

    #[test]
    fn rendered_source_reparses() {
        let sources = [
            "1 + 2 * 3",
            "[1, 2, 3]",
            "#{ 'a' : 1 }",
            "a.b.c",
            "empty(x) ? 1 : 2",
            "var f = (x) -> { x + 1 }; f(1)",
            "for (var i : 1..3) { i }",
        ];
        for source in sources {
            let rendered = parse(source).root().rendered();
            parse_script(&rendered, &[]).unwrap_or_else(|e| panic!("{source} -> {rendered}: {e}"));
        }
    }

    #[test]
    fn typed_declarations() {
        parse("int x = 1; long y = 2; boolean b = true; double d = 1.5; x + y");
    }

    #[test]
    fn multidimensional_index() {
        let body = parse("a[1, 2]");
        let NodeKind::Block(stmts) = &body.root().kind else { panic!() };
        let NodeKind::GetIndex { keys, .. } = &stmts[0].kind else { panic!() };
        assert_eq!(keys.len(), 2);
    }
}
