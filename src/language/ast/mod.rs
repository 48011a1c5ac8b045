//! The AST: a closed sum type, one variant per node. Dispatch over it
//! is always by `match`, never a virtual call.

use crate::language::token::NumericTag;

/// Root node: an ordered list of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Print(Expr),
    Log(Expr),
    /// Declaration/assignment unified; scoping is the interpreter's job.
    VarDecl { name: String, value: Expr },
    Loop(LoopStmt),
    If(IfStmt),
    FuncDef { name: String, params: Vec<String>, body: Vec<Stmt> },
    Return(Expr),
    Throw(Expr),
    EnumDef { name: String, cases: Vec<String> },
    Try(TryStmt),
    Comment(String),
}

/// Exactly one of `{start, end}`, `collection`, or `condition` is
/// populated.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopStmt {
    pub var: String,
    pub start: Option<Expr>,
    pub end: Option<Expr>,
    pub collection: Option<Expr>,
    pub condition: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_body: Vec<Stmt>,
    pub else_body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub try_body: Vec<Stmt>,
    pub catch_body: Option<Vec<Stmt>>,
    pub catch_var: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Double(f64),
    Str(String),
    Bool(bool),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpPart {
    pub is_variable: bool,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DictPair {
    pub key: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    VarRef(String),
    /// `numeric_tag` is only ever `Some` for `Literal::Int`/`Literal::Double`.
    Literal { value: Literal, numeric_tag: Option<NumericTag> },
    StringInterpolation(Vec<InterpPart>),
    /// `op` is always the LD's emit-string.
    BinaryOp { left: Box<Expr>, op: String, right: Box<Expr> },
    UnaryOp { op: String, operand: Box<Expr> },
    FuncCall { name: String, args: Vec<Expr> },
    ArrayLiteral(Vec<Expr>),
    DictLiteral(Vec<DictPair>),
    TupleLiteral(Vec<Expr>),
    IndexAccess { container: Box<Expr>, index: Box<Expr> },
    Input { prompt: Box<Expr> },
}
