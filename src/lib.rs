//! JibJab (JJ): a lexer, parser, tree-walking interpreter, and
//! from-scratch ARM64 Mach-O native backend for the JJ toy language.

pub mod base;
pub mod compile;
pub mod language;

pub use base::Span;
pub use compile::{native, run_or_exit, Interpreter, RuntimeError, Value};
pub use language::{parse_program, FrontendError, LanguageDefinition};

use language::ast::Program;
use std::path::Path;

/// Parses `source` under `ld` into an AST, the single entry point both
/// back ends consume.
pub fn parse(source: &str, ld: &LanguageDefinition) -> Result<Program, FrontendError> {
    parse_program(source, ld)
}

/// Parses then tree-walks `source`, matching `run_or_exit`'s
/// fatal-error-on-stderr behavior for parse failures too.
pub fn interpret(source: &str, ld: &LanguageDefinition) {
    match parse_program(source, ld) {
        Ok(program) => run_or_exit(&program),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Parses `source` under `ld` and writes a standalone ARM64 Mach-O
/// executable to `path`.
pub fn compile_native(
    source: &str,
    ld: &LanguageDefinition,
    path: &Path,
) -> Result<(), CompileNativeError> {
    let program = parse_program(source, ld)?;
    native::write_executable(&program, path)?;
    Ok(())
}

#[derive(Debug)]
pub enum CompileNativeError {
    Frontend(FrontendError),
    Native(compile::native::branch::NativeError),
}

impl std::fmt::Display for CompileNativeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileNativeError::Frontend(e) => write!(f, "{e}"),
            CompileNativeError::Native(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CompileNativeError {}

impl From<FrontendError> for CompileNativeError {
    fn from(e: FrontendError) -> Self {
        CompileNativeError::Frontend(e)
    }
}

impl From<compile::native::branch::NativeError> for CompileNativeError {
    fn from(e: compile::native::branch::NativeError) -> Self {
        CompileNativeError::Native(e)
    }
}
