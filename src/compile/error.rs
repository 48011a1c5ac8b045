use super::value::Value;
use std::fmt;

/// Fatal interpreter failures, plus `UncaughtThrow` for a `ThrowStmt`
/// that escapes every enclosing `TryStmt`.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    UndefinedVariable { name: String },
    UndefinedFunction { name: String },
    NotIndexable,
    IndexOutOfBounds,
    DivisionByZero,
    UnknownOperator { op: String },
    UncaughtThrow { value: Value },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UndefinedVariable { name } => write!(f, "undefined variable '{name}'"),
            RuntimeError::UndefinedFunction { name } => write!(f, "undefined function '{name}'"),
            RuntimeError::NotIndexable => write!(f, "value is not indexable"),
            RuntimeError::IndexOutOfBounds => write!(f, "index out of bounds"),
            RuntimeError::DivisionByZero => write!(f, "division by zero"),
            RuntimeError::UnknownOperator { op } => write!(f, "unknown operator '{op}'"),
            RuntimeError::UncaughtThrow { value } => {
                write!(f, "uncaught throw: {}", value.stringify())
            }
        }
    }
}

impl std::error::Error for RuntimeError {}
