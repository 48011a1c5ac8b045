//! Recursive-descent parser: token stream → [`Program`].

mod error;

pub use error::{ParseError, ParseErrorKind};

use crate::language::ast::{
    DictPair, Expr, IfStmt, InterpPart, Literal, LoopStmt, Program, Stmt, TryStmt,
};
use crate::language::langdef::LanguageDefinition;
use crate::language::lexer::Lexer;
use crate::language::token::{NumberValue, Token, TokenKind};

pub fn parse(tokens: Vec<Token>, ld: &LanguageDefinition) -> Result<Program, ParseError> {
    let filtered: Vec<Token> = tokens.into_iter().filter(|t| t.kind != TokenKind::Newline).collect();
    let mut parser = Parser { tokens: filtered, pos: 0, ld };
    let mut statements = Vec::new();
    while !parser.at_eof() {
        statements.push(parser.parse_statement()?);
    }
    Ok(Program { statements })
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    ld: &'a LanguageDefinition,
}

fn kind_name(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Print => "print".into(),
        TokenKind::Log => "log".into(),
        TokenKind::Input => "input".into(),
        TokenKind::Yeet => "yeet".into(),
        TokenKind::Snag => "snag".into(),
        TokenKind::Invoke => "invoke".into(),
        TokenKind::Enum => "enum".into(),
        TokenKind::Kaboom => "kaboom".into(),
        TokenKind::Nil => "nil".into(),
        TokenKind::True => "true".into(),
        TokenKind::False => "false".into(),
        TokenKind::LoopOpen(_) => "loop-open".into(),
        TokenKind::WhenOpen(_) => "when-open".into(),
        TokenKind::MorphOpen(_) => "morph-open".into(),
        TokenKind::Else => "else".into(),
        TokenKind::Try => "try".into(),
        TokenKind::Oops => "oops".into(),
        TokenKind::End => "end".into(),
        TokenKind::Op(s) => format!("operator '{s}'"),
        TokenKind::Action => "action".into(),
        TokenKind::Range => "range".into(),
        TokenKind::Colon => "colon".into(),
        TokenKind::Emit => "emit".into(),
        TokenKind::Grab => "grab".into(),
        TokenKind::Val => "val".into(),
        TokenKind::With => "with".into(),
        TokenKind::Cases => "cases".into(),
        TokenKind::LParen => "(".into(),
        TokenKind::RParen => ")".into(),
        TokenKind::LBracket => "[".into(),
        TokenKind::RBracket => "]".into(),
        TokenKind::LBrace => "{".into(),
        TokenKind::RBrace => "}".into(),
        TokenKind::Comma => ",".into(),
        TokenKind::Number(..) => "number".into(),
        TokenKind::Str(_) => "string".into(),
        TokenKind::InterpStr(_) => "interpolated string".into(),
        TokenKind::Ident(_) => "identifier".into(),
        TokenKind::Newline => "newline".into(),
        TokenKind::Eof => "eof".into(),
    }
}

fn text_of(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(s) | TokenKind::Str(s) | TokenKind::Op(s) => s.clone(),
        TokenKind::LoopOpen(s) | TokenKind::WhenOpen(s) | TokenKind::MorphOpen(s) => s.clone(),
        TokenKind::Number(NumberValue::Int(n), _) => n.to_string(),
        TokenKind::Number(NumberValue::Double(n), _) => n.to_string(),
        other => kind_name(other),
    }
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn line(&self) -> usize {
        self.peek().line()
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let got = self.peek();
        ParseError {
            kind: ParseErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                got: kind_name(&got.kind),
                got_text: text_of(&got.kind),
            },
            line: got.line(),
        }
    }

    fn expect(&mut self, matches_kind: impl Fn(&TokenKind) -> bool, expected: &str) -> Result<Token, ParseError> {
        if matches_kind(&self.peek().kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    // ---- statements ----

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match &self.peek().kind {
            TokenKind::Print => self.parse_print_log(false),
            TokenKind::Log => self.parse_print_log(true),
            TokenKind::Snag => self.parse_var_decl(),
            TokenKind::LoopOpen(_) => self.parse_loop(),
            TokenKind::WhenOpen(_) => self.parse_when(),
            TokenKind::MorphOpen(_) => self.parse_morph(),
            TokenKind::Yeet => self.parse_yeet(),
            TokenKind::Kaboom => self.parse_kaboom(),
            TokenKind::Enum => self.parse_enum(),
            TokenKind::Try => self.parse_try(),
            other => Err(ParseError {
                kind: ParseErrorKind::UnrecognizedStatement { token: kind_name(other) },
                line: self.line(),
            }),
        }
    }

    /// Parses statements until `end | else | oops | eof`, without
    /// consuming the sentinel.
    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        while !matches!(
            self.peek().kind,
            TokenKind::End | TokenKind::Else | TokenKind::Oops | TokenKind::Eof
        ) {
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    /// Consumes an optional discarded `{identifier}` tag group, as seen
    /// after `print`/`log` in the canonical surface form
    /// (`~>frob{a1}::emit(...)`).
    fn skip_optional_tag(&mut self) -> Result<(), ParseError> {
        if matches!(self.peek().kind, TokenKind::LBrace) {
            self.advance();
            self.expect_ident()?;
            self.expect(|k| matches!(k, TokenKind::RBrace), "}")?;
        }
        Ok(())
    }

    fn parse_print_log(&mut self, is_log: bool) -> Result<Stmt, ParseError> {
        self.advance(); // print | log
        self.skip_optional_tag()?;
        self.expect(|k| matches!(k, TokenKind::Action), "action separator")?;
        self.expect(|k| matches!(k, TokenKind::Emit), "emit")?;
        self.expect(|k| matches!(k, TokenKind::LParen), "(")?;
        let expr = self.parse_expr()?;
        self.expect(|k| matches!(k, TokenKind::RParen), ")")?;
        Ok(if is_log { Stmt::Log(expr) } else { Stmt::Print(expr) })
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // snag
        self.expect(|k| matches!(k, TokenKind::LBrace), "{")?;
        let name = self.expect_ident()?;
        self.expect(|k| matches!(k, TokenKind::RBrace), "}")?;
        self.expect(|k| matches!(k, TokenKind::Action), "action separator")?;
        self.expect(|k| matches!(k, TokenKind::Val), "val")?;
        self.expect(|k| matches!(k, TokenKind::LParen), "(")?;
        let value = self.parse_expr()?;
        self.expect(|k| matches!(k, TokenKind::RParen), ")")?;
        Ok(Stmt::VarDecl { name, value })
    }

    fn parse_yeet(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // yeet
        self.expect(|k| matches!(k, TokenKind::LBrace), "{")?;
        let expr = self.parse_expr()?;
        self.expect(|k| matches!(k, TokenKind::RBrace), "}")?;
        Ok(Stmt::Return(expr))
    }

    fn parse_kaboom(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // kaboom
        self.expect(|k| matches!(k, TokenKind::LBrace), "{")?;
        let expr = self.parse_expr()?;
        self.expect(|k| matches!(k, TokenKind::RBrace), "}")?;
        Ok(Stmt::Throw(expr))
    }

    fn parse_enum(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // enum
        self.expect(|k| matches!(k, TokenKind::LBrace), "{")?;
        let name = self.expect_ident()?;
        self.expect(|k| matches!(k, TokenKind::RBrace), "}")?;
        self.expect(|k| matches!(k, TokenKind::Action), "action separator")?;
        self.expect(|k| matches!(k, TokenKind::Cases), "cases")?;
        self.expect(|k| matches!(k, TokenKind::LParen), "(")?;
        let mut cases = Vec::new();
        if !matches!(self.peek().kind, TokenKind::RParen) {
            loop {
                cases.push(self.expect_ident()?);
                if matches!(self.peek().kind, TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(|k| matches!(k, TokenKind::RParen), ")")?;
        Ok(Stmt::EnumDef { name, cases })
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // try
        let try_body = self.parse_block()?;
        let (catch_body, catch_var) = if matches!(self.peek().kind, TokenKind::Oops) {
            self.advance();
            let catch_var = if matches!(self.peek().kind, TokenKind::LBrace) {
                self.advance();
                let name = self.expect_ident()?;
                self.expect(|k| matches!(k, TokenKind::RBrace), "}")?;
                Some(name)
            } else {
                None
            };
            (Some(self.parse_block()?), catch_var)
        } else {
            (None, None)
        };
        self.expect(|k| matches!(k, TokenKind::End), "<~>>")?;
        Ok(Stmt::Try(TryStmt { try_body, catch_body, catch_var }))
    }

    fn parse_when(&mut self) -> Result<Stmt, ParseError> {
        let body = match self.advance().kind {
            TokenKind::WhenOpen(b) => b,
            _ => unreachable!("dispatch guarantees WhenOpen"),
        };
        let condition = parse_expr_str(&body, self.ld)?;
        let then_body = self.parse_block()?;
        let else_body = if matches!(self.peek().kind, TokenKind::Else) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };
        self.expect(|k| matches!(k, TokenKind::End), "<~>>")?;
        Ok(Stmt::If(IfStmt { condition, then_body, else_body }))
    }

    fn parse_loop(&mut self) -> Result<Stmt, ParseError> {
        let body = match self.advance().kind {
            TokenKind::LoopOpen(b) => b,
            _ => unreachable!("dispatch guarantees LoopOpen"),
        };
        let (var, start, end, collection, condition) = parse_loop_spec(&body, self.ld)?;
        let loop_body = self.parse_block()?;
        self.expect(|k| matches!(k, TokenKind::End), "<~>>")?;
        Ok(Stmt::Loop(LoopStmt { var, start, end, collection, condition, body: loop_body }))
    }

    fn parse_morph(&mut self) -> Result<Stmt, ParseError> {
        let body = match self.advance().kind {
            TokenKind::MorphOpen(b) => b,
            _ => unreachable!("dispatch guarantees MorphOpen"),
        };
        let (name, params) = parse_function_signature(&body)?;
        let func_body = self.parse_block()?;
        self.expect(|k| matches!(k, TokenKind::End), "<~>>")?;
        Ok(Stmt::FuncDef { name, params, body: func_body })
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.op_is("||") {
            let op = self.take_op();
            let right = self.parse_and()?;
            left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.op_is("&&") {
            let op = self.take_op();
            let right = self.parse_equality()?;
            left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.op_is("==") || self.op_is("!=") {
            let op = self.take_op();
            let right = self.parse_comparison()?;
            left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        while self.op_is("<=") || self.op_is("<") || self.op_is(">=") || self.op_is(">") {
            let op = self.take_op();
            let right = self.parse_additive()?;
            left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        while self.op_is("+") || self.op_is("-") {
            let op = self.take_op();
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        while self.op_is("*") || self.op_is("/") || self.op_is("%") {
            let op = self.take_op();
            let right = self.parse_unary()?;
            left = Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.op_is("!") {
            let op = self.take_op();
            let operand = self.parse_unary()?;
            Ok(Expr::UnaryOp { op, operand: Box::new(operand) })
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        while matches!(self.peek().kind, TokenKind::LBracket) {
            self.advance();
            let index = self.parse_expr()?;
            self.expect(|k| matches!(k, TokenKind::RBracket), "]")?;
            expr = Expr::IndexAccess { container: Box::new(expr), index: Box::new(index) };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::LParen => {
                self.advance();
                let first = self.parse_expr()?;
                if matches!(self.peek().kind, TokenKind::Comma) {
                    let mut items = vec![first];
                    while matches!(self.peek().kind, TokenKind::Comma) {
                        self.advance();
                        if matches!(self.peek().kind, TokenKind::RParen) {
                            break;
                        }
                        items.push(self.parse_expr()?);
                    }
                    self.expect(|k| matches!(k, TokenKind::RParen), ")")?;
                    Ok(Expr::TupleLiteral(items))
                } else {
                    self.expect(|k| matches!(k, TokenKind::RParen), ")")?;
                    Ok(first)
                }
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !matches!(self.peek().kind, TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if matches!(self.peek().kind, TokenKind::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(|k| matches!(k, TokenKind::RBracket), "]")?;
                Ok(Expr::ArrayLiteral(items))
            }
            TokenKind::LBrace => self.parse_dict_or_empty(),
            TokenKind::Number(value, tag) => {
                self.advance();
                let literal = match value {
                    NumberValue::Int(n) => Literal::Int(n),
                    NumberValue::Double(n) => Literal::Double(n),
                };
                Ok(Expr::Literal { value: literal, numeric_tag: Some(tag) })
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal { value: Literal::Str(s), numeric_tag: None })
            }
            TokenKind::InterpStr(parts) => {
                self.advance();
                let parts = parts
                    .into_iter()
                    .map(|p| InterpPart { is_variable: p.is_variable, text: p.text })
                    .collect();
                Ok(Expr::StringInterpolation(parts))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal { value: Literal::Bool(true), numeric_tag: None })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal { value: Literal::Bool(false), numeric_tag: None })
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::Literal { value: Literal::None, numeric_tag: None })
            }
            TokenKind::Input => {
                self.advance();
                self.expect(|k| matches!(k, TokenKind::Action), "action separator")?;
                self.expect(|k| matches!(k, TokenKind::Grab), "grab")?;
                self.expect(|k| matches!(k, TokenKind::LParen), "(")?;
                let prompt = self.parse_expr()?;
                self.expect(|k| matches!(k, TokenKind::RParen), ")")?;
                Ok(Expr::Input { prompt: Box::new(prompt) })
            }
            TokenKind::Invoke => {
                self.advance();
                self.expect(|k| matches!(k, TokenKind::LBrace), "{")?;
                let name = self.expect_ident()?;
                self.expect(|k| matches!(k, TokenKind::RBrace), "}")?;
                self.expect(|k| matches!(k, TokenKind::Action), "action separator")?;
                self.expect(|k| matches!(k, TokenKind::With), "with")?;
                self.expect(|k| matches!(k, TokenKind::LParen), "(")?;
                let mut args = Vec::new();
                if !matches!(self.peek().kind, TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if matches!(self.peek().kind, TokenKind::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(|k| matches!(k, TokenKind::RParen), ")")?;
                Ok(Expr::FuncCall { name, args })
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::VarRef(name))
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Disambiguates `{}`/`{k: v, …}` dicts via one token of lookahead
    /// after `{`; backtracks to the saved position if neither shape
    /// matches.
    fn parse_dict_or_empty(&mut self) -> Result<Expr, ParseError> {
        let saved = self.pos;
        self.advance(); // {
        if matches!(self.peek().kind, TokenKind::RBrace) {
            self.advance();
            return Ok(Expr::DictLiteral(Vec::new()));
        }
        let first_key = self.parse_expr();
        if let Ok(key) = first_key {
            if matches!(self.peek().kind, TokenKind::Colon) {
                self.advance();
                let value = self.parse_expr()?;
                let mut pairs = vec![DictPair { key, value }];
                while matches!(self.peek().kind, TokenKind::Comma) {
                    self.advance();
                    if matches!(self.peek().kind, TokenKind::RBrace) {
                        break;
                    }
                    let k = self.parse_expr()?;
                    self.expect(|k| matches!(k, TokenKind::Colon), ":")?;
                    let v = self.parse_expr()?;
                    pairs.push(DictPair { key: k, value: v });
                }
                self.expect(|k| matches!(k, TokenKind::RBrace), "}")?;
                return Ok(Expr::DictLiteral(pairs));
            }
        }
        self.pos = saved;
        Err(self.unexpected("dict literal"))
    }

    fn op_is(&self, emit: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Op(s) if s == emit)
    }

    fn take_op(&mut self) -> String {
        match self.advance().kind {
            TokenKind::Op(s) => s,
            _ => unreachable!("op_is guarantees Op"),
        }
    }
}

/// Re-lexes and parses a standalone expression from a block-open
/// body's raw text (`when`'s condition, or a loop's while-condition
/// fallback).
fn parse_expr_str(src: &str, ld: &LanguageDefinition) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(src, ld).tokenize().map_err(|e| ParseError {
        kind: ParseErrorKind::UnexpectedToken {
            expected: "valid expression".into(),
            got: "lexical error".into(),
            got_text: e.to_string(),
        },
        line: e.line,
    })?;
    let filtered: Vec<Token> = tokens.into_iter().filter(|t| t.kind != TokenKind::Newline).collect();
    let mut parser = Parser { tokens: filtered, pos: 0, ld };
    parser.parse_expr()
}

/// Parses a loop block-open's raw body into its shape: `var : start ..
/// end` (numeric range), `var : collection` (collection iteration), or
/// a bare condition (`var` becomes the sentinel `_`).
fn parse_loop_spec(
    body: &str,
    ld: &LanguageDefinition,
) -> Result<(String, Option<Expr>, Option<Expr>, Option<Expr>, Option<Expr>), ParseError> {
    let tokens = Lexer::new(body, ld).tokenize().map_err(|e| ParseError {
        kind: ParseErrorKind::UnexpectedToken {
            expected: "valid loop spec".into(),
            got: "lexical error".into(),
            got_text: e.to_string(),
        },
        line: e.line,
    })?;
    let filtered: Vec<Token> = tokens.into_iter().filter(|t| t.kind != TokenKind::Newline).collect();

    if let Some(Token { kind: TokenKind::Ident(var), .. }) = filtered.first() {
        if matches!(filtered.get(1).map(|t| &t.kind), Some(TokenKind::Colon)) {
            let var = var.clone();
            let rest: Vec<Token> = filtered[2..].to_vec();
            let mut parser = Parser { tokens: rest, pos: 0, ld };
            let first = parser.parse_expr()?;
            if matches!(parser.peek().kind, TokenKind::Range) {
                parser.advance();
                let second = parser.parse_expr()?;
                return Ok((var, Some(first), Some(second), None, None));
            }
            return Ok((var, None, None, Some(first), None));
        }
    }
    let condition = parse_expr_str(body, ld)?;
    Ok(("_".to_string(), None, None, None, Some(condition)))
}

/// Parses a `morph` block-open's raw body, `name(param, param, …)`,
/// trimming whitespace and filtering empty parameter names.
fn parse_function_signature(body: &str) -> Result<(String, Vec<String>), ParseError> {
    let open = body.find('(');
    let close = body.rfind(')');
    let (open, close) = match (open, close) {
        (Some(o), Some(c)) if o < c => (o, c),
        _ => {
            return Err(ParseError {
                kind: ParseErrorKind::InvalidFunctionSignature { text: body.to_string() },
                line: 0,
            })
        }
    };
    let name = body[..open].trim();
    if name.is_empty() || !name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
        return Err(ParseError {
            kind: ParseErrorKind::InvalidFunctionSignature { text: body.to_string() },
            line: 0,
        });
    }
    let params: Vec<String> = body[open + 1..close]
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    Ok((name.to_string(), params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::lexer::Lexer;

    fn parse_src(src: &str) -> Program {
        let ld = LanguageDefinition::canonical();
        let tokens = Lexer::new(src, &ld).tokenize().expect("lex ok");
        parse(tokens, &ld).expect("parse ok")
    }

    #[test]
    fn parses_print_statement() {
        let program = parse_src("~>frob{a1}::emit(\"hello\")");
        assert_eq!(program.statements.len(), 1);
        match &program.statements[0] {
            Stmt::Print(Expr::Literal { value: Literal::Str(s), .. }) => assert_eq!(s, "hello"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_var_decl_and_binary_op() {
        let program = parse_src("~>snag{x}::val(#2 <+> #3)");
        match &program.statements[0] {
            Stmt::VarDecl { name, value: Expr::BinaryOp { op, .. } } => {
                assert_eq!(name, "x");
                assert_eq!(op, "+");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_numeric_range_loop() {
        let program = parse_src("<~loop{i:#0..#3}>> ~>frob{a}::emit(i) <~>>");
        match &program.statements[0] {
            Stmt::Loop(LoopStmt { var, start: Some(_), end: Some(_), collection: None, condition: None, body }) => {
                assert_eq!(var, "i");
                assert_eq!(body.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_when_else() {
        let program =
            parse_src("<~when{x <lt> y}>> ~>frob{a}::emit(#1) <~else>> ~>frob{a}::emit(#0) <~>>");
        match &program.statements[0] {
            Stmt::If(IfStmt { else_body: Some(eb), .. }) => assert_eq!(eb.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_morph_and_call() {
        let program = parse_src(
            "<~morph{add(a, b)}>> ~>yeet{a <+> b} <~>> ~>frob{a}::emit(~>invoke{add}::with(#10, #20))",
        );
        assert_eq!(program.statements.len(), 2);
        match &program.statements[0] {
            Stmt::FuncDef { name, params, .. } => {
                assert_eq!(name, "add");
                assert_eq!(params, &vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_enum_and_index() {
        let program = parse_src(
            "~>enum{Color}::cases(Red, Green, Blue) ~>snag{c}::val(Color[\"Red\"])",
        );
        match &program.statements[0] {
            Stmt::EnumDef { name, cases } => {
                assert_eq!(name, "Color");
                assert_eq!(cases.len(), 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &program.statements[1] {
            Stmt::VarDecl { value: Expr::IndexAccess { .. }, .. } => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unrecognized_statement_is_an_error() {
        let ld = LanguageDefinition::canonical();
        let tokens = Lexer::new("<~>>", &ld).tokenize().expect("lex ok");
        let err = parse(tokens, &ld).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnrecognizedStatement { .. }));
    }
}
