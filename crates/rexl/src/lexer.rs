//! Hand-rolled tokenizer for the expression/script surface.
//!
//! Comments are `// line`, `/* block */` and `## line`; whitespace is
//! insignificant outside literals. Numeric literals take the suffixes
//! `l`/`L` (long), `f`/`F` (float), `d`/`D` (double), `h`/`H` (big
//! integer) and `b`/`B` (big decimal). Strings are single- or
//! double-quoted with `\uXXXX` escapes.

use std::{str::FromStr, sync::Arc};

use num_bigint::BigInt;

use crate::{
    error::{EvalError, EvalResult, Span},
    types::Decimal,
};

/// One lexical token with its source span.
#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokKind {
    Ident(Arc<str>),
    Int(i64),
    Long(i64),
    Big(Arc<BigInt>),
    Float(f32),
    Double(f64),
    Dec(Arc<Decimal>),
    Str(Arc<str>),

    // keywords
    If,
    Else,
    While,
    Do,
    For,
    Break,
    Continue,
    Return,
    Var,
    Let,
    Const,
    Final,
    Function,
    New,
    True,
    False,
    Null,
    Try,
    Catch,
    Finally,
    Throw,
    Switch,
    Case,
    Default,
    AndKw,
    OrKw,
    NotKw,
    EqKw,
    NeKw,
    Empty,
    Size,

    // punctuation and operators
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    HashBracket,
    HashBrace,
    Comma,
    Semi,
    Colon,
    ColonColon,
    Dot,
    DotDot,
    Ellipsis,
    At,
    Question,
    QuestionDot,
    QuestionQuestion,
    QuestionColon,
    Arrow,
    FatArrow,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,
    UshrAssign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    Tilde,
    Bang,
    Inc,
    Decr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Ushr,
    Match,
    NotMatch,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
}

fn keyword(ident: &str) -> Option<TokKind> {
    Some(match ident {
        "if" => TokKind::If,
        "else" => TokKind::Else,
        "while" => TokKind::While,
        "do" => TokKind::Do,
        "for" => TokKind::For,
        "break" => TokKind::Break,
        "continue" => TokKind::Continue,
        "return" => TokKind::Return,
        "var" => TokKind::Var,
        "let" => TokKind::Let,
        "const" => TokKind::Const,
        "final" => TokKind::Final,
        "function" => TokKind::Function,
        "new" => TokKind::New,
        "true" => TokKind::True,
        "false" => TokKind::False,
        "null" => TokKind::Null,
        "try" => TokKind::Try,
        "catch" => TokKind::Catch,
        "finally" => TokKind::Finally,
        "throw" => TokKind::Throw,
        "switch" => TokKind::Switch,
        "case" => TokKind::Case,
        "default" => TokKind::Default,
        "and" => TokKind::AndKw,
        "or" => TokKind::OrKw,
        "not" => TokKind::NotKw,
        "eq" => TokKind::EqKw,
        "ne" => TokKind::NeKw,
        "empty" => TokKind::Empty,
        "size" => TokKind::Size,
        _ => return None,
    })
}

/// Tokenizes `source`; any failure is a `ParseError`.
pub(crate) fn tokenize(source: &str) -> EvalResult<Vec<Token>> {
    Lexer {
        source,
        bytes: source.as_bytes(),
        pos: 0,
        tokens: Vec::new(),
    }
    .run()
}

struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn run(mut self) -> EvalResult<Vec<Token>> {
        while self.pos < self.bytes.len() {
            let start = self.pos;
            let c = self.current_char();
            match c {
                c if c.is_whitespace() => {
                    self.pos += c.len_utf8();
                }
                '/' if self.peek_byte(1) == Some(b'/') => self.skip_line_comment(),
                '#' if self.peek_byte(1) == Some(b'#') => self.skip_line_comment(),
                '/' if self.peek_byte(1) == Some(b'*') => self.skip_block_comment(start)?,
                '\'' | '"' => self.lex_string(c)?,
                c if c.is_ascii_digit() => self.lex_number()?,
                c if c.is_alphabetic() || c == '_' || c == '$' => self.lex_ident(),
                _ => self.lex_operator()?,
            }
        }
        Ok(self.tokens)
    }

    fn current_char(&self) -> char {
        self.source[self.pos..].chars().next().expect("in bounds")
    }

    fn peek_byte(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn push(&mut self, kind: TokKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start as u32, self.pos as u32),
        });
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self, start: usize) -> EvalResult<()> {
        self.pos += 2;
        while self.pos + 1 < self.bytes.len() {
            if self.bytes[self.pos] == b'*' && self.bytes[self.pos + 1] == b'/' {
                self.pos += 2;
                return Ok(());
            }
            self.pos += 1;
        }
        Err(EvalError::parse(
            Span::new(start as u32, self.pos as u32),
            "unterminated block comment",
        ))
    }

    fn lex_string(&mut self, quote: char) -> EvalResult<()> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.source[self.pos..].chars().next() else {
                return Err(EvalError::parse(
                    Span::new(start as u32, self.pos as u32),
                    "unterminated string literal",
                ));
            };
            self.pos += c.len_utf8();
            if c == quote {
                break;
            }
            if c == '\\' {
                let Some(esc) = self.source[self.pos..].chars().next() else {
                    return Err(EvalError::parse(
                        Span::new(start as u32, self.pos as u32),
                        "unterminated escape",
                    ));
                };
                self.pos += esc.len_utf8();
                match esc {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '\\' => out.push('\\'),
                    '\'' => out.push('\''),
                    '"' => out.push('"'),
                    'u' => {
                        let hex = self.source.get(self.pos..self.pos + 4).ok_or_else(|| {
                            EvalError::parse(Span::new(start as u32, self.pos as u32), "truncated \\u escape")
                        })?;
                        let code = u32::from_str_radix(hex, 16).map_err(|_| {
                            EvalError::parse(Span::new(start as u32, self.pos as u32), "invalid \\u escape")
                        })?;
                        let c = char::from_u32(code).ok_or_else(|| {
                            EvalError::parse(Span::new(start as u32, self.pos as u32), "invalid \\u code point")
                        })?;
                        out.push(c);
                        self.pos += 4;
                    }
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            } else {
                out.push(c);
            }
        }
        self.push(TokKind::Str(Arc::from(out.as_str())), start);
        Ok(())
    }

    fn lex_number(&mut self) -> EvalResult<()> {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let mut is_real = false;
        // fraction, but never consume the `..` range operator
        if self.peek_byte(0) == Some(b'.') && self.peek_byte(1).is_some_and(|b| b.is_ascii_digit()) {
            is_real = true;
            self.pos += 1;
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        if matches!(self.peek_byte(0), Some(b'e' | b'E'))
            && self
                .peek_byte(1)
                .is_some_and(|b| b.is_ascii_digit() || b == b'+' || b == b'-')
        {
            is_real = true;
            self.pos += 2;
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        let digits = &self.source[start..self.pos];
        let span = |lexer: &Self| Span::new(start as u32, lexer.pos as u32);

        // width/precision suffix, only when it terminates the literal
        let suffix = match self.peek_byte(0) {
            Some(s @ (b'l' | b'L' | b'f' | b'F' | b'd' | b'D' | b'h' | b'H' | b'b' | b'B'))
                if !self
                    .peek_byte(1)
                    .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_') =>
            {
                self.pos += 1;
                Some(s.to_ascii_lowercase())
            }
            _ => None,
        };

        let kind = match suffix {
            Some(b'l') => {
                if is_real {
                    return Err(EvalError::parse(span(&self), "long suffix on a real literal"));
                }
                TokKind::Long(
                    digits
                        .parse()
                        .map_err(|_| EvalError::parse(span(&self), "integer literal out of range"))?,
                )
            }
            Some(b'h') => {
                if is_real {
                    return Err(EvalError::parse(span(&self), "bigint suffix on a real literal"));
                }
                TokKind::Big(Arc::new(
                    BigInt::from_str(digits).map_err(|_| EvalError::parse(span(&self), "invalid bigint literal"))?,
                ))
            }
            Some(b'b') => TokKind::Dec(Arc::new(
                Decimal::from_str(digits).map_err(|_| EvalError::parse(span(&self), "invalid decimal literal"))?,
            )),
            Some(b'f') => TokKind::Float(
                digits
                    .parse()
                    .map_err(|_| EvalError::parse(span(&self), "invalid float literal"))?,
            ),
            Some(b'd') => TokKind::Double(
                digits
                    .parse()
                    .map_err(|_| EvalError::parse(span(&self), "invalid double literal"))?,
            ),
            None if is_real => TokKind::Double(
                digits
                    .parse()
                    .map_err(|_| EvalError::parse(span(&self), "invalid double literal"))?,
            ),
            None => match digits.parse::<i64>() {
                Ok(v) => TokKind::Int(v),
                // an unsuffixed literal wider than long becomes a bigint
                Err(_) => TokKind::Big(Arc::new(
                    BigInt::from_str(digits).map_err(|_| EvalError::parse(span(&self), "invalid integer literal"))?,
                )),
            },
            Some(_) => unreachable!("suffix set is closed"),
        };
        self.push(kind, start);
        Ok(())
    }

    fn lex_ident(&mut self) {
        let start = self.pos;
        while let Some(c) = self.source[self.pos..].chars().next() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        let kind = keyword(text).unwrap_or_else(|| TokKind::Ident(Arc::from(text)));
        self.push(kind, start);
    }

    fn lex_operator(&mut self) -> EvalResult<()> {
        let start = self.pos;
        // longest match first
        const TABLE: &[(&str, TokKind)] = &[
            (">>>=", TokKind::UshrAssign),
            (">>>", TokKind::Ushr),
            (">>=", TokKind::ShrAssign),
            ("<<=", TokKind::ShlAssign),
            ("...", TokKind::Ellipsis),
            (">>", TokKind::Shr),
            ("<<", TokKind::Shl),
            (">=", TokKind::Ge),
            ("<=", TokKind::Le),
            ("==", TokKind::EqEq),
            ("=~", TokKind::Match),
            ("=^", TokKind::StartsWith),
            ("=$", TokKind::EndsWith),
            ("=>", TokKind::FatArrow),
            ("!=", TokKind::NotEq),
            ("!~", TokKind::NotMatch),
            ("!^", TokKind::NotStartsWith),
            ("!$", TokKind::NotEndsWith),
            ("&&", TokKind::AmpAmp),
            ("&=", TokKind::AmpAssign),
            ("||", TokKind::PipePipe),
            ("|=", TokKind::PipeAssign),
            ("^=", TokKind::CaretAssign),
            ("+=", TokKind::PlusAssign),
            ("++", TokKind::Inc),
            ("-=", TokKind::MinusAssign),
            ("--", TokKind::Decr),
            ("->", TokKind::Arrow),
            ("*=", TokKind::StarAssign),
            ("/=", TokKind::SlashAssign),
            ("%=", TokKind::PercentAssign),
            ("?.", TokKind::QuestionDot),
            ("??", TokKind::QuestionQuestion),
            ("?:", TokKind::QuestionColon),
            ("::", TokKind::ColonColon),
            ("..", TokKind::DotDot),
            ("#[", TokKind::HashBracket),
            ("#{", TokKind::HashBrace),
            ("(", TokKind::LParen),
            (")", TokKind::RParen),
            ("[", TokKind::LBracket),
            ("]", TokKind::RBracket),
            ("{", TokKind::LBrace),
            ("}", TokKind::RBrace),
            (",", TokKind::Comma),
            (";", TokKind::Semi),
            (":", TokKind::Colon),
            (".", TokKind::Dot),
            ("@", TokKind::At),
            ("?", TokKind::Question),
            ("=", TokKind::Assign),
            ("+", TokKind::Plus),
            ("-", TokKind::Minus),
            ("*", TokKind::Star),
            ("/", TokKind::Slash),
            ("%", TokKind::Percent),
            ("&", TokKind::Amp),
            ("|", TokKind::Pipe),
            ("^", TokKind::Caret),
            ("~", TokKind::Tilde),
            ("!", TokKind::Bang),
            ("<", TokKind::Lt),
            (">", TokKind::Gt),
        ];
        let rest = &self.source[self.pos..];
        for (text, kind) in TABLE {
            if rest.starts_with(text) {
                self.pos += text.len();
                self.push(kind.clone(), start);
                return Ok(());
            }
        }
        Err(EvalError::parse(
            Span::new(start as u32, start as u32 + 1),
            format!("unexpected character '{}'", self.current_char()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn numeric_suffixes() {
        assert_eq!(kinds("1"), vec![TokKind::Int(1)]);
        assert_eq!(kinds("1l"), vec![TokKind::Long(1)]);
        assert_eq!(kinds("2.5"), vec![TokKind::Double(2.5)]);
        assert_eq!(kinds("2.5f"), vec![TokKind::Float(2.5)]);
        assert_eq!(kinds("10H"), vec![TokKind::Big(Arc::new(BigInt::from(10)))]);
        assert!(matches!(kinds("1.5B")[0], TokKind::Dec(_)));
    }

    #[test]
    fn range_is_not_a_fraction() {
        assert_eq!(
            kinds("1..3"),
            vec![TokKind::Int(1), TokKind::DotDot, TokKind::Int(3)]
        );
    }

    #[test]
    fn integer_property_is_dot_then_int() {
        assert_eq!(
            kinds("a.0"),
            vec![TokKind::Ident(Arc::from("a")), TokKind::Dot, TokKind::Int(0)]
        );
    }

    #[test]
    fn strings_and_escapes() {
        assert_eq!(kinds("'a\\u0041b'"), vec![TokKind::Str(Arc::from("aAb"))]);
        assert_eq!(kinds("\"x\\ny\""), vec![TokKind::Str(Arc::from("x\ny"))]);
    }

    #[test]
    fn comment_forms() {
        assert_eq!(kinds("1 // x\n+ 2"), vec![TokKind::Int(1), TokKind::Plus, TokKind::Int(2)]);
        assert_eq!(kinds("1 /* x */ + 2"), vec![TokKind::Int(1), TokKind::Plus, TokKind::Int(2)]);
        assert_eq!(kinds("1 ## x\n+ 2"), vec![TokKind::Int(1), TokKind::Plus, TokKind::Int(2)]);
    }

    #[test]
    fn compound_operators() {
        assert_eq!(kinds(">>>="), vec![TokKind::UshrAssign]);
        assert_eq!(kinds("a ?. b")[1], TokKind::QuestionDot);
        assert_eq!(kinds("x ?: y")[1], TokKind::QuestionColon);
        assert_eq!(kinds("#['a']")[0], TokKind::HashBracket);
    }

    #[test]
    fn unsuffixed_wide_literal_becomes_bigint() {
        let ks = kinds("99999999999999999999");
        assert!(matches!(&ks[0], TokKind::Big(_)));
    }
}
