//! The front-end pipeline: Language Definition → Lexer → Parser → AST.

pub mod ast;
pub mod langdef;
pub mod lexer;
pub mod parser;
pub mod token;

pub use langdef::LanguageDefinition;
pub use lexer::{LexError, Lexer};
pub use parser::{parse, ParseError};
pub use token::Token;

/// Lexes then parses `source` under `ld`, returning the parsed
/// [`ast::Program`]. The two stages are exposed separately
/// (`tokenize`/`parse`) for callers that want the raw token stream.
pub fn parse_program(source: &str, ld: &LanguageDefinition) -> Result<ast::Program, FrontendError> {
    let tokens = Lexer::new(source, ld).tokenize()?;
    Ok(parse(tokens, ld)?)
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrontendError {
    Lex(LexError),
    Parse(ParseError),
}

impl std::fmt::Display for FrontendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrontendError::Lex(e) => write!(f, "{e}"),
            FrontendError::Parse(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for FrontendError {}

impl From<LexError> for FrontendError {
    fn from(e: LexError) -> Self {
        FrontendError::Lex(e)
    }
}

impl From<ParseError> for FrontendError {
    fn from(e: ParseError) -> Self {
        FrontendError::Parse(e)
    }
}
