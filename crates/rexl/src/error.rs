//! Error taxonomy for parse and evaluation failures.
//!
//! Every failure the engine can produce is an [`EvalError`] carrying an
//! [`ErrorKind`], the source span where it was detected and a rendered
//! message. User-level `throw` travels as `ErrorKind::Throw` with the thrown
//! value attached, so `try/catch` can rebind it without re-parsing messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::value::Value;

/// Result alias used by the public compile/execute surface.
pub type EvalResult<T> = Result<T, EvalError>;

/// Byte range into the original source text.
///
/// Spans are half-open offsets; line/column rendering happens at the program
/// boundary where the source text is available (see [`EvalError::located`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    #[must_use]
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Extends this span to cover `other` as well.
    #[must_use]
    pub fn to(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Computes 1-based line and column of the span start within `source`.
    #[must_use]
    pub fn line_column(self, source: &str) -> (u32, u32) {
        let upto = &source[..(self.start as usize).min(source.len())];
        let line = upto.matches('\n').count() as u32 + 1;
        let column = upto.rsplit('\n').next().map_or(0, |s| s.chars().count()) as u32 + 1;
        (line, column)
    }
}

/// Classification of engine failures.
///
/// The string representation is the public error-kind name
/// (e.g. `VariableError`), matching what hosts switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Lexical or grammatical failure. Never hidden by silent mode.
    #[strum(serialize = "ParseError")]
    Parse,
    /// Unknown variable under strict mode.
    #[strum(serialize = "VariableError")]
    Variable,
    /// Unknown or blocked property read/write.
    #[strum(serialize = "PropertyError")]
    Property,
    /// Unknown, ambiguous or blocked method/constructor.
    #[strum(serialize = "MethodError")]
    Method,
    /// Two applicable overloads, neither more specific than the other.
    /// Surfaced even under silent mode.
    #[strum(serialize = "AmbiguousMethodError")]
    AmbiguousMethod,
    /// Invalid numeric coercion, or null operand / divide-by-zero under
    /// strict arithmetic.
    #[strum(serialize = "ArithmeticError")]
    Arithmetic,
    /// Unknown or failing annotation under strict mode.
    #[strum(serialize = "AnnotationError")]
    Annotation,
    /// No matching case and no default in a switch expression.
    #[strum(serialize = "SwitchError")]
    Switch,
    /// External cancellation observed at a statement boundary.
    #[strum(serialize = "CancelError")]
    Cancel,
    /// User-level `throw expr`; the value rides in [`EvalError::thrown`].
    #[strum(serialize = "ThrowError")]
    Throw,
}

/// A parse or evaluation failure.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub kind: ErrorKind,
    pub span: Span,
    pub message: String,
    /// The user value carried by `throw expr`; `None` for engine errors.
    pub thrown: Option<Value>,
    /// 1-based line/column, filled in once the source text is known.
    pub location: Option<(u32, u32)>,
}

impl EvalError {
    #[must_use]
    pub fn new(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
            thrown: None,
            location: None,
        }
    }

    /// A user `throw`; renders with the thrown value's string form.
    #[must_use]
    pub fn thrown(span: Span, value: Value) -> Self {
        Self {
            kind: ErrorKind::Throw,
            span,
            message: value.to_display_string(),
            thrown: Some(value),
            location: None,
        }
    }

    /// Attaches line/column information computed against `source`.
    #[must_use]
    pub fn located(mut self, source: &str) -> Self {
        if self.location.is_none() {
            self.location = Some(self.span.line_column(source));
        }
        self
    }

    /// True when `try/catch` may capture this error. Cancellation is the
    /// only kind that always escapes user handlers.
    #[must_use]
    pub fn catchable(&self) -> bool {
        self.kind != ErrorKind::Cancel
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some((line, column)) => write!(f, "{}@{line}:{column} {}", self.kind, self.message),
            None => write!(f, "{} {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for EvalError {}

/// Shorthand constructors for the kinds raised all over the interpreter.
impl EvalError {
    pub(crate) fn parse(span: Span, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, span, message)
    }

    pub(crate) fn variable(span: Span, name: &str) -> Self {
        Self::new(ErrorKind::Variable, span, format!("undefined variable '{name}'"))
    }

    pub(crate) fn property(span: Span, name: &str) -> Self {
        Self::new(ErrorKind::Property, span, format!("undefined property '{name}'"))
    }

    pub(crate) fn method(span: Span, name: &str) -> Self {
        Self::new(ErrorKind::Method, span, format!("undefined method '{name}'"))
    }

    pub(crate) fn ambiguous(span: Span, name: &str) -> Self {
        Self::new(
            ErrorKind::AmbiguousMethod,
            span,
            format!("ambiguous method invocation '{name}'"),
        )
    }

    pub(crate) fn arithmetic(span: Span, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Arithmetic, span, message)
    }

    pub(crate) fn annotation(span: Span, name: &str, detail: &str) -> Self {
        Self::new(ErrorKind::Annotation, span, format!("annotation '@{name}' {detail}"))
    }

    pub(crate) fn switch(span: Span) -> Self {
        Self::new(ErrorKind::Switch, span, "no matching case and no default".to_owned())
    }

    pub(crate) fn cancel(span: Span) -> Self {
        Self::new(ErrorKind::Cancel, span, "evaluation cancelled".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_column_of_multiline_span() {
        let source = "a + b\nc +\n  d";
        let span = Span::new(12, 13);
        assert_eq!(span.line_column(source), (3, 3));
    }

    #[test]
    fn kind_names_render_like_the_public_taxonomy() {
        assert_eq!(ErrorKind::Variable.to_string(), "VariableError");
        assert_eq!(ErrorKind::AmbiguousMethod.to_string(), "AmbiguousMethodError");
        assert_eq!(ErrorKind::Cancel.to_string(), "CancelError");
    }

    #[test]
    fn cancel_is_not_catchable() {
        let err = EvalError::cancel(Span::default());
        assert!(!err.catchable());
        assert!(EvalError::variable(Span::default(), "x").catchable());
    }
}
