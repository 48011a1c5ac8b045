//! Hand-rolled scanner: source text → token stream.
//!
//! Every keyword, operator, and literal-prefix spelling comes from the
//! [`LanguageDefinition`]; only the surrounding wrapper punctuation
//! (`~>`, `<~`, `>>`, and the brace used to delimit a block-open
//! construct's raw body) and the grouping/punctuation glyphs
//! `( ) [ ] { } ,` are fixed scanner grammar regardless of the active
//! language definition.

use crate::base::Span;
use crate::language::langdef::LanguageDefinition;
use crate::language::token::{InterpPart, NumberValue, NumericTag, Token, TokenKind};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum LexErrorKind {
    UnterminatedString,
    UnterminatedBlock,
    BadNumericSuffix(String),
    UnrecognizedBlockMarker,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match &self.kind {
            LexErrorKind::UnterminatedString => "unterminated string literal".to_string(),
            LexErrorKind::UnterminatedBlock => "unterminated block-open construct".to_string(),
            LexErrorKind::BadNumericSuffix(s) => format!("invalid numeric suffix '{s}'"),
            LexErrorKind::UnrecognizedBlockMarker => "unrecognized block marker".to_string(),
        };
        write!(f, "{msg} at {}:{}", self.line, self.col)
    }
}

impl std::error::Error for LexError {}

const NUMERIC_SUFFIXES: &[&str] = &[
    "i64", "i32", "i16", "i8", "u64", "u32", "u16", "u8", "u", "f", "d",
];

pub struct Lexer<'a> {
    ld: &'a LanguageDefinition,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, ld: &'a LanguageDefinition) -> Self {
        Self { ld, bytes: source.as_bytes(), pos: 0, line: 1, col: 1 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while self.pos < self.bytes.len() {
            self.skip_horizontal_ws();
            if self.pos >= self.bytes.len() {
                break;
            }
            if self.starts_with(&self.ld.literals.comment) {
                self.skip_to_newline();
                continue;
            }
            if self.current() == b'\n' {
                let span = self.span_here(1);
                self.advance_byte();
                tokens.push(Token::new(TokenKind::Newline, span));
                continue;
            }
            if self.starts_with("<~") {
                tokens.push(self.lex_block_marker()?);
                continue;
            }
            if self.starts_with("~>") {
                tokens.push(self.lex_statement_keyword()?);
                continue;
            }
            if let Some(tok) = self.try_bare_keyword() {
                tokens.push(tok);
                continue;
            }
            if let Some(tok) = self.try_operator() {
                tokens.push(tok);
                continue;
            }
            if let Some(tok) = self.try_structure() {
                tokens.push(tok);
                continue;
            }
            if let Some(tok) = self.try_punct() {
                tokens.push(tok);
                continue;
            }
            if let Some(tok) = self.try_number()? {
                tokens.push(tok);
                continue;
            }
            if self.current() == self.ld.literals.string_delim as u8 {
                tokens.push(self.lex_string()?);
                continue;
            }
            if let Some(tok) = self.try_syntax_word() {
                tokens.push(tok);
                continue;
            }
            if let Some(tok) = self.try_identifier() {
                tokens.push(tok);
                continue;
            }
            // step 13: unrecognized character, skipped silently.
            self.advance_byte();
        }
        tokens.push(Token::new(TokenKind::Eof, self.span_here(0)));
        Ok(tokens)
    }

    // ---- low-level cursor helpers ----

    fn current(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn rest(&self) -> &str {
        std::str::from_utf8(&self.bytes[self.pos..]).unwrap_or("")
    }

    fn starts_with(&self, needle: &str) -> bool {
        !needle.is_empty() && self.rest().starts_with(needle)
    }

    fn span_here(&self, len: usize) -> Span {
        Span::new(self.line, self.col, self.pos, self.pos + len)
    }

    fn advance_byte(&mut self) {
        if self.bytes[self.pos] == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance_byte();
        }
    }

    fn skip_horizontal_ws(&mut self) {
        while self.pos < self.bytes.len() && matches!(self.current(), b' ' | b'\t' | b'\r') {
            self.advance_byte();
        }
    }

    fn skip_to_newline(&mut self) {
        while self.pos < self.bytes.len() && self.current() != b'\n' {
            self.advance_byte();
        }
    }

    /// True if `word` occurs at the current position and is not
    /// immediately followed by an identifier-continuation character
    /// (so a keyword never shadows a longer identifier sharing its
    /// prefix).
    fn word_matches(&self, word: &str) -> bool {
        if word.is_empty() || !self.starts_with(word) {
            return false;
        }
        match self.bytes.get(self.pos + word.len()) {
            Some(b) => !(b.is_ascii_alphanumeric() || *b == b'_'),
            None => true,
        }
    }

    // ---- block markers: "<~" ... ----

    fn lex_block_marker(&mut self) -> Result<Token, LexError> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance_by(2); // consume "<~"

        if self.starts_with(">>") {
            self.advance_by(2);
            return Ok(Token::new(
                TokenKind::End,
                Span::new(start_line, start_col, self.pos, self.pos),
            ));
        }

        let bare = [
            (&self.ld.blocks.else_kw, TokenKind::Else),
            (&self.ld.blocks.try_kw, TokenKind::Try),
            (&self.ld.blocks.oops, TokenKind::Oops),
        ];
        for (word, kind) in bare {
            if self.word_matches(word) && self.bytes.get(self.pos + word.len()) == Some(&b'>') {
                self.advance_by(word.len());
                if !self.starts_with(">>") {
                    return Err(LexError {
                        kind: LexErrorKind::UnrecognizedBlockMarker,
                        line: start_line,
                        col: start_col,
                    });
                }
                self.advance_by(2);
                return Ok(Token::new(kind, Span::new(start_line, start_col, self.pos, self.pos)));
            }
        }

        let open = [
            (&self.ld.blocks.loop_kw, 0u8),
            (&self.ld.blocks.when, 1u8),
            (&self.ld.blocks.morph, 2u8),
        ];
        for (word, which) in open {
            if self.word_matches(word) && self.bytes.get(self.pos + word.len()) == Some(&b'{') {
                self.advance_by(word.len() + 1); // word + '{'
                let suffix = &self.ld.blocks.block_suffix;
                let body_start = self.pos;
                loop {
                    if self.pos >= self.bytes.len() {
                        return Err(LexError {
                            kind: LexErrorKind::UnterminatedBlock,
                            line: start_line,
                            col: start_col,
                        });
                    }
                    if self.starts_with(suffix) {
                        break;
                    }
                    self.advance_byte();
                }
                let body = std::str::from_utf8(&self.bytes[body_start..self.pos])
                    .unwrap_or("")
                    .to_string();
                self.advance_by(suffix.len());
                let kind = match which {
                    0 => TokenKind::LoopOpen(body),
                    1 => TokenKind::WhenOpen(body),
                    _ => TokenKind::MorphOpen(body),
                };
                return Ok(Token::new(kind, Span::new(start_line, start_col, self.pos, self.pos)));
            }
        }

        Err(LexError {
            kind: LexErrorKind::UnrecognizedBlockMarker,
            line: start_line,
            col: start_col,
        })
    }

    // ---- statement/expression keywords: "~>" ... ----

    fn lex_statement_keyword(&mut self) -> Result<Token, LexError> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance_by(2); // consume "~>"

        let words: [(&str, TokenKind); 7] = [
            (&self.ld.keywords.print, TokenKind::Print),
            (&self.ld.keywords.log, TokenKind::Log),
            (&self.ld.keywords.snag, TokenKind::Snag),
            (&self.ld.keywords.yeet, TokenKind::Yeet),
            (&self.ld.keywords.invoke, TokenKind::Invoke),
            (&self.ld.keywords.enum_kw, TokenKind::Enum),
            (&self.ld.keywords.kaboom, tok_kaboom()),
        ];
        for (word, kind) in words {
            if self.word_matches(word) {
                self.advance_by(word.len());
                return Ok(Token::new(kind, Span::new(start_line, start_col, self.pos, self.pos)));
            }
        }
        Err(LexError {
            kind: LexErrorKind::UnrecognizedBlockMarker,
            line: start_line,
            col: start_col,
        })
    }

    fn try_bare_keyword(&mut self) -> Option<Token> {
        let words: [(&str, TokenKind); 4] = [
            (&self.ld.keywords.input, TokenKind::Input),
            (&self.ld.keywords.nil, TokenKind::Nil),
            (&self.ld.keywords.true_kw, TokenKind::True),
            (&self.ld.keywords.false_kw, TokenKind::False),
        ];
        for (word, kind) in words {
            if self.word_matches(word) {
                let span = self.span_here(word.len());
                self.advance_by(word.len());
                return Some(Token::new(kind, span));
            }
        }
        None
    }

    fn try_operator(&mut self) -> Option<Token> {
        for (_name, spec) in self.ld.operators.match_order() {
            if self.starts_with(&spec.symbol) {
                let span = self.span_here(spec.symbol.len());
                let emit = spec.emit.clone();
                self.advance_by(spec.symbol.len());
                return Some(Token::new(TokenKind::Op(emit), span));
            }
        }
        None
    }

    fn try_structure(&mut self) -> Option<Token> {
        let structure = [
            (&self.ld.structure.action, TokenKind::Action),
            (&self.ld.structure.range, TokenKind::Range),
            (&self.ld.structure.colon, TokenKind::Colon),
        ];
        for (word, kind) in structure {
            if self.starts_with(word) {
                let span = self.span_here(word.len());
                self.advance_by(word.len());
                return Some(Token::new(kind, span));
            }
        }
        None
    }

    fn try_punct(&mut self) -> Option<Token> {
        let kind = match self.current() {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b',' => TokenKind::Comma,
            _ => return None,
        };
        let span = self.span_here(1);
        self.advance_byte();
        Some(Token::new(kind, span))
    }

    fn try_number(&mut self) -> Result<Option<Token>, LexError> {
        let start_line = self.line;
        let start_col = self.col;
        let has_prefix = self.current() == self.ld.literals.number_prefix as u8;
        let mut probe = self.pos + if has_prefix { 1 } else { 0 };
        let probe_start = probe;
        if probe < self.bytes.len() && self.bytes[probe] == b'-' {
            probe += 1;
        }
        let digits_start = probe;
        while probe < self.bytes.len() && self.bytes[probe].is_ascii_digit() {
            probe += 1;
        }
        if probe == digits_start {
            return Ok(None); // no digits: not a number at all
        }
        let mut has_dot = false;
        if probe < self.bytes.len()
            && self.bytes[probe] == b'.'
            && self.bytes.get(probe + 1).is_some_and(|b| b.is_ascii_digit())
        {
            has_dot = true;
            probe += 1;
            while probe < self.bytes.len() && self.bytes[probe].is_ascii_digit() {
                probe += 1;
            }
        }
        let text_end = probe;
        let mut suffix: Option<&'static str> = None;
        for candidate in NUMERIC_SUFFIXES {
            if self.bytes[probe..].starts_with(candidate.as_bytes()) {
                let after = probe + candidate.len();
                let boundary_ok = self.bytes.get(after).is_none_or_alnum_boundary();
                if boundary_ok {
                    suffix = Some(candidate);
                    break;
                }
            }
        }
        let mut end = text_end;
        if let Some(s) = suffix {
            end = text_end + s.len();
        } else {
            // check for a run of letters that *isn't* a valid suffix
            let mut bad_end = text_end;
            while bad_end < self.bytes.len() && self.bytes[bad_end].is_ascii_alphabetic() {
                bad_end += 1;
            }
            if bad_end > text_end {
                let bad = std::str::from_utf8(&self.bytes[text_end..bad_end]).unwrap_or("");
                return Err(LexError {
                    kind: LexErrorKind::BadNumericSuffix(bad.to_string()),
                    line: start_line,
                    col: start_col,
                });
            }
        }

        let text = std::str::from_utf8(&self.bytes[probe_start..text_end]).unwrap_or("");
        let tag = match suffix.and_then(NumericTag::from_suffix) {
            Some(t) => t,
            None if has_dot => NumericTag::Double,
            None => NumericTag::Int,
        };
        let value = if tag.is_float() {
            NumberValue::Double(text.parse::<f64>().unwrap_or(0.0))
        } else {
            NumberValue::Int(text.parse::<i64>().unwrap_or(0))
        };

        let len = end - self.pos;
        let span = self.span_here(len);
        self.advance_by(len);
        Ok(Some(Token::new(TokenKind::Number(value, tag), span)))
    }

    fn lex_string(&mut self) -> Result<Token, LexError> {
        let start_line = self.line;
        let start_col = self.col;
        let delim = self.ld.literals.string_delim as u8;
        self.advance_byte(); // opening delimiter

        let mut parts: Vec<InterpPart> = Vec::new();
        let mut literal = String::new();
        let mut has_variable = false;
        loop {
            if self.pos >= self.bytes.len() {
                return Err(LexError {
                    kind: LexErrorKind::UnterminatedString,
                    line: start_line,
                    col: start_col,
                });
            }
            let b = self.current();
            if b == delim {
                self.advance_byte();
                break;
            }
            if b == b'\\' {
                self.advance_byte();
                if self.pos >= self.bytes.len() {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedString,
                        line: start_line,
                        col: start_col,
                    });
                }
                let escaped = self.current();
                let resolved = match escaped {
                    b'n' => '\n',
                    b't' => '\t',
                    b'r' => '\r',
                    b'\\' => '\\',
                    b'"' => '"',
                    other => other as char,
                };
                literal.push(resolved);
                self.advance_byte();
                continue;
            }
            if b == b'{' {
                // try to read a {name} interpolation placeholder
                let save_pos = self.pos;
                let save_line = self.line;
                let save_col = self.col;
                self.advance_byte();
                let name_start = self.pos;
                while self.pos < self.bytes.len()
                    && (self.current().is_ascii_alphanumeric() || self.current() == b'_')
                {
                    self.advance_byte();
                }
                let name_end = self.pos;
                if name_end > name_start && self.pos < self.bytes.len() && self.current() == b'}' {
                    self.advance_byte();
                    if !literal.is_empty() {
                        parts.push(InterpPart { is_variable: false, text: std::mem::take(&mut literal) });
                    }
                    let name = std::str::from_utf8(&self.bytes[name_start..name_end]).unwrap_or("");
                    parts.push(InterpPart { is_variable: true, text: name.to_string() });
                    has_variable = true;
                    continue;
                } else {
                    self.pos = save_pos;
                    self.line = save_line;
                    self.col = save_col;
                    literal.push('{');
                    self.advance_byte();
                    continue;
                }
            }
            literal.push(b as char);
            self.advance_byte();
        }
        let span = Span::new(start_line, start_col, self.pos, self.pos);
        if has_variable {
            if !literal.is_empty() {
                parts.push(InterpPart { is_variable: false, text: literal });
            }
            Ok(Token::new(TokenKind::InterpStr(parts), span))
        } else {
            Ok(Token::new(TokenKind::Str(literal), span))
        }
    }

    fn try_syntax_word(&mut self) -> Option<Token> {
        let words = [
            (&self.ld.syntax.emit, TokenKind::Emit),
            (&self.ld.syntax.grab, TokenKind::Grab),
            (&self.ld.syntax.val, TokenKind::Val),
            (&self.ld.syntax.with, TokenKind::With),
            (&self.ld.syntax.cases, TokenKind::Cases),
        ];
        for (word, kind) in words {
            if self.word_matches(word) {
                let span = self.span_here(word.len());
                self.advance_by(word.len());
                return Some(Token::new(kind, span));
            }
        }
        None
    }

    fn try_identifier(&mut self) -> Option<Token> {
        let b = self.current();
        if !(b.is_ascii_alphabetic() || b == b'_') {
            return None;
        }
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.current().is_ascii_alphanumeric() || self.current() == b'_')
        {
            self.advance_byte();
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("").to_string();
        let span = Span::new(self.line, self.col, start, self.pos);
        Some(Token::new(TokenKind::Ident(text), span))
    }
}

/// `Kaboom` (throw) has no dedicated `TokenKind` variant of its own;
/// it is represented as `TokenKind::Yeet`'s sibling via a distinct
/// marker so the parser can tell return and throw apart. See
/// `TokenKind::Kaboom`.
fn tok_kaboom() -> TokenKind {
    TokenKind::Kaboom
}

trait OptByteExt {
    fn is_none_or_alnum_boundary(&self) -> bool;
}

impl OptByteExt for Option<&u8> {
    fn is_none_or_alnum_boundary(&self) -> bool {
        match self {
            None => true,
            Some(b) => !(b.is_ascii_alphanumeric() || **b == b'_'),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        let ld = LanguageDefinition::canonical();
        Lexer::new(src, &ld).tokenize().expect("lex ok")
    }

    #[test]
    fn lexes_print_statement() {
        let toks = lex("~>frob{a1}::emit(\"hello\")");
        let kinds: Vec<_> = toks.iter().map(|t| &t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &TokenKind::Print,
                &TokenKind::LBrace,
                &TokenKind::Ident("a1".into()),
                &TokenKind::RBrace,
                &TokenKind::Action,
                &TokenKind::Emit,
                &TokenKind::LParen,
                &TokenKind::Str("hello".into()),
                &TokenKind::RParen,
                &TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_loop_open_with_raw_body() {
        let toks = lex("<~loop{i:#0..#3}>>");
        assert_eq!(toks[0].kind, TokenKind::LoopOpen("i:#0..#3".into()));
        assert_eq!(toks[1].kind, TokenKind::Eof);
    }

    #[test]
    fn lexes_bare_end_marker() {
        let toks = lex("<~>>");
        assert_eq!(toks[0].kind, TokenKind::End);
    }

    #[test]
    fn lexes_operators_longest_first() {
        let toks = lex("x <lte> y");
        assert!(toks.iter().any(|t| t.kind == TokenKind::Op("<=".into())));
    }

    #[test]
    fn lexes_numeric_suffixes() {
        let toks = lex("#42i32");
        match &toks[0].kind {
            TokenKind::Number(NumberValue::Int(42), NumericTag::I32) => {}
            other => panic!("unexpected token {other:?}"),
        }
    }

    #[test]
    fn lexes_interpolated_string() {
        let toks = lex("\"hi {name}!\"");
        match &toks[0].kind {
            TokenKind::InterpStr(parts) => {
                assert_eq!(parts.len(), 3);
                assert!(!parts[0].is_variable);
                assert!(parts[1].is_variable);
                assert_eq!(parts[1].text, "name");
            }
            other => panic!("unexpected token {other:?}"),
        }
    }

    #[test]
    fn skips_line_comments() {
        let toks = lex("@@ comment\n~>yeet{#1}");
        // newline then Yeet, LBrace, Number, RBrace, Eof
        assert!(toks.iter().any(|t| t.kind == TokenKind::Yeet));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let ld = LanguageDefinition::canonical();
        let err = Lexer::new("\"unterminated", &ld).tokenize().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let ld = LanguageDefinition::canonical();
        let err = Lexer::new("<~loop{i:#0..#3", &ld).tokenize().unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnterminatedBlock);
    }
}
