//! Token types produced by the [`crate::language::lexer::Lexer`].

use crate::base::Span;

/// The concrete numeric width a `number` token carries, derived from
/// its optional suffix or, absent one, from whether the literal text
/// contained a decimal point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericTag {
    I8,
    I16,
    I32,
    I64,
    U,
    U8,
    U16,
    U32,
    U64,
    F,
    D,
    /// No suffix, no decimal point.
    Int,
    /// No suffix, decimal point present.
    Double,
}

impl NumericTag {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "i8" => NumericTag::I8,
            "i16" => NumericTag::I16,
            "i32" => NumericTag::I32,
            "i64" => NumericTag::I64,
            "u" => NumericTag::U,
            "u8" => NumericTag::U8,
            "u16" => NumericTag::U16,
            "u32" => NumericTag::U32,
            "u64" => NumericTag::U64,
            "f" => NumericTag::F,
            "d" => NumericTag::D,
            _ => return None,
        })
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumericTag::F | NumericTag::D | NumericTag::Double)
    }
}

/// The decoded payload of a `number` token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberValue {
    Int(i64),
    Double(f64),
}

/// One segment of an interpolated string: either literal text or a
/// `{name}` variable reference.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpPart {
    pub is_variable: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // --- keywords ---
    Print,
    Log,
    Input,
    Yeet,
    Snag,
    Invoke,
    Enum,
    /// Throw keyword (`~>kaboom{expr}`), required by `ThrowStmt`.
    Kaboom,
    Nil,
    True,
    False,

    // --- block-open tokens: value is the raw, unparsed body text ---
    LoopOpen(String),
    WhenOpen(String),
    MorphOpen(String),

    // --- bare block tokens ---
    Else,
    Try,
    Oops,
    End,

    /// An operator token. The payload is always the LD's `emit`
    /// spelling, never the source-level `symbol`.
    Op(String),

    // --- structure ---
    Action,
    Range,
    Colon,

    // --- syntax action-words ---
    Emit,
    Grab,
    Val,
    With,
    Cases,

    // --- punctuation ---
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,

    // --- literals ---
    Number(NumberValue, NumericTag),
    Str(String),
    InterpStr(Vec<InterpPart>),
    Ident(String),

    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn line(&self) -> usize {
        self.span.line
    }
}
