//! Tree-walking interpreter over the AST.

use super::error::RuntimeError;
use super::value::Value;
use crate::language::ast::{
    DictPair, Expr, IfStmt, InterpPart, Literal, LoopStmt, Program, Stmt, TryStmt,
};
use rustc_hash::FxHashMap;

struct FuncDef {
    params: Vec<String>,
    body: Vec<Stmt>,
}

/// `Return` is threaded as a normal `Ok` value, never as a Rust error.
/// `Throw` rides the `Err` channel instead since it is an exceptional
/// unwind a `TryStmt` may intercept at any enclosing frame, not just a
/// function boundary.
enum Flow {
    Error(RuntimeError),
    Throw(Value),
}

impl From<RuntimeError> for Flow {
    fn from(e: RuntimeError) -> Self {
        Flow::Error(e)
    }
}

type EvalResult<T> = Result<T, Flow>;

pub struct Interpreter {
    scopes: Vec<FxHashMap<String, Value>>,
    functions: FxHashMap<String, FuncDef>,
    enums: FxHashMap<String, Vec<String>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            scopes: vec![FxHashMap::default()],
            functions: FxHashMap::default(),
            enums: FxHashMap::default(),
        }
    }

    /// Runs `program`, writing `print`/`log` output to stdout.
    pub fn run(&mut self, program: &Program) -> Result<(), RuntimeError> {
        match self.exec_block(&program.statements) {
            Ok(_) => Ok(()),
            Err(Flow::Error(e)) => Err(e),
            Err(Flow::Throw(value)) => Err(RuntimeError::UncaughtThrow { value }),
        }
    }

    // ---- statement execution ----

    /// Runs `stmts` in order; stops and returns early if one yields a
    /// `Return` signal.
    fn exec_block(&mut self, stmts: &[Stmt]) -> EvalResult<Option<Value>> {
        for stmt in stmts {
            if let Some(ret) = self.exec_stmt(stmt)? {
                return Ok(Some(ret));
            }
        }
        Ok(None)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> EvalResult<Option<Value>> {
        match stmt {
            Stmt::Print(expr) => {
                let value = self.eval_expr(expr)?;
                print_value(expr, &value);
                Ok(None)
            }
            Stmt::Log(expr) => {
                let value = self.eval_expr(expr)?;
                print_value(expr, &value);
                Ok(None)
            }
            Stmt::VarDecl { name, value } => {
                let value = self.eval_expr(value)?;
                self.scopes.last_mut().expect("at least one scope").insert(name.clone(), value);
                Ok(None)
            }
            Stmt::Loop(loop_stmt) => self.exec_loop(loop_stmt),
            Stmt::If(if_stmt) => self.exec_if(if_stmt),
            Stmt::FuncDef { name, params, body } => {
                self.functions.insert(
                    name.clone(),
                    FuncDef { params: params.clone(), body: body.clone() },
                );
                Ok(None)
            }
            Stmt::Return(expr) => {
                let value = self.eval_expr(expr)?;
                Ok(Some(value))
            }
            Stmt::Throw(expr) => {
                let value = self.eval_expr(expr)?;
                Err(Flow::Throw(value))
            }
            Stmt::EnumDef { name, cases } => {
                self.enums.insert(name.clone(), cases.clone());
                Ok(None)
            }
            Stmt::Try(try_stmt) => self.exec_try(try_stmt),
            Stmt::Comment(_) => Ok(None),
        }
    }

    fn exec_loop(&mut self, loop_stmt: &LoopStmt) -> EvalResult<Option<Value>> {
        let LoopStmt { var, start, end, collection, condition, body } = loop_stmt;
        if let (Some(start), Some(end)) = (start, end) {
            let start = self.eval_expr(start)?.as_f64().unwrap_or(0.0) as i64;
            let end = self.eval_expr(end)?.as_f64().unwrap_or(0.0) as i64;
            for i in start..end {
                self.scopes.last_mut().expect("scope").insert(var.clone(), Value::Int(i));
                if let Some(ret) = self.exec_block(body)? {
                    return Ok(Some(ret));
                }
            }
        } else if let Some(collection) = collection {
            let items = match self.eval_expr(collection)? {
                Value::List(items) => items,
                _ => return Err(RuntimeError::NotIndexable.into()),
            };
            for item in items {
                self.scopes.last_mut().expect("scope").insert(var.clone(), item);
                if let Some(ret) = self.exec_block(body)? {
                    return Ok(Some(ret));
                }
            }
        } else if let Some(condition) = condition {
            while self.eval_expr(condition)?.truthy() {
                if let Some(ret) = self.exec_block(body)? {
                    return Ok(Some(ret));
                }
            }
        }
        Ok(None)
    }

    fn exec_if(&mut self, if_stmt: &IfStmt) -> EvalResult<Option<Value>> {
        if self.eval_expr(&if_stmt.condition)?.truthy() {
            self.exec_block(&if_stmt.then_body)
        } else if let Some(else_body) = &if_stmt.else_body {
            self.exec_block(else_body)
        } else {
            Ok(None)
        }
    }

    fn exec_try(&mut self, try_stmt: &TryStmt) -> EvalResult<Option<Value>> {
        match self.exec_block(&try_stmt.try_body) {
            Err(Flow::Throw(value)) => {
                if let Some(catch_body) = &try_stmt.catch_body {
                    if let Some(var) = &try_stmt.catch_var {
                        self.scopes.last_mut().expect("scope").insert(var.clone(), value);
                    }
                    self.exec_block(catch_body)
                } else {
                    Err(Flow::Throw(value))
                }
            }
            other => other,
        }
    }

    // ---- expression evaluation ----

    fn eval_expr(&mut self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::VarRef(name) => self.lookup(name),
            Expr::Literal { value, .. } => Ok(literal_to_value(value)),
            Expr::StringInterpolation(parts) => self.eval_interpolation(parts),
            Expr::BinaryOp { left, op, right } => {
                let left = self.eval_expr(left)?;
                let right = self.eval_expr(right)?;
                binary_op(&left, op, &right)
            }
            Expr::UnaryOp { op, operand } => {
                let value = self.eval_expr(operand)?;
                unary_op(op, &value)
            }
            Expr::FuncCall { name, args } => self.call_function(name, args),
            Expr::ArrayLiteral(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval_expr(item))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::List(values))
            }
            Expr::DictLiteral(pairs) => self.eval_dict(pairs),
            Expr::TupleLiteral(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval_expr(item))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::List(values))
            }
            Expr::IndexAccess { container, index } => self.eval_index(container, index),
            Expr::Input { prompt } => {
                let prompt = self.eval_expr(prompt)?;
                Ok(Value::Str(read_line(&prompt.stringify())))
            }
        }
    }

    fn lookup(&self, name: &str) -> EvalResult<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Ok(value.clone());
            }
        }
        Err(RuntimeError::UndefinedVariable { name: name.to_string() }.into())
    }

    fn eval_interpolation(&mut self, parts: &[InterpPart]) -> EvalResult<Value> {
        let mut out = String::new();
        for part in parts {
            if part.is_variable {
                out.push_str(&self.lookup(&part.text)?.stringify());
            } else {
                out.push_str(&part.text);
            }
        }
        Ok(Value::Str(out))
    }

    fn eval_dict(&mut self, pairs: &[DictPair]) -> EvalResult<Value> {
        let mut map = FxHashMap::default();
        for pair in pairs {
            let key = self.eval_expr(&pair.key)?.stringify();
            let value = self.eval_expr(&pair.value)?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }

    /// Handles both `enum["Case"]` lookups (where `container` names a
    /// registered enum rather than a bound variable) and ordinary
    /// list/map indexing.
    fn eval_index(&mut self, container: &Expr, index: &Expr) -> EvalResult<Value> {
        if let Expr::VarRef(name) = container {
            if let Some(cases) = self.enums.get(name).cloned() {
                let key = self.eval_expr(index)?.stringify();
                return cases
                    .into_iter()
                    .find(|case| *case == key)
                    .map(Value::Str)
                    .ok_or_else(|| RuntimeError::IndexOutOfBounds.into());
            }
        }
        let container = self.eval_expr(container)?;
        let index = self.eval_expr(index)?;
        match (container, index) {
            (Value::List(items), Value::Int(i)) => {
                let i = i as usize;
                items.get(i).cloned().ok_or_else(|| RuntimeError::IndexOutOfBounds.into())
            }
            (Value::Map(map), Value::Str(key)) => {
                map.get(&key).cloned().ok_or_else(|| RuntimeError::IndexOutOfBounds.into())
            }
            _ => Err(RuntimeError::NotIndexable.into()),
        }
    }

    fn call_function(&mut self, name: &str, args: &[Expr]) -> EvalResult<Value> {
        let def = self
            .functions
            .get(name)
            .map(|d| (d.params.clone(), d.body.clone()))
            .ok_or_else(|| RuntimeError::UndefinedFunction { name: name.to_string() })?;
        let (params, body) = def;

        let arg_values = args.iter().map(|a| self.eval_expr(a)).collect::<EvalResult<Vec<_>>>()?;

        let mut frame = FxHashMap::default();
        for (i, param) in params.iter().enumerate() {
            frame.insert(param.clone(), arg_values.get(i).cloned().unwrap_or(Value::None));
        }
        self.scopes.push(frame);
        let result = self.exec_block(&body);
        self.scopes.pop();
        Ok(result?.unwrap_or(Value::None))
    }
}

fn literal_to_value(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::Int(*n),
        Literal::Double(n) => Value::Double(*n),
        Literal::Str(s) => Value::Str(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::None => Value::None,
    }
}

/// Numeric widening: int promotes to double when either operand is
/// double. `+` concatenates strings, and falls back to
/// stringify-then-concatenate for any other mixed pairing.
fn binary_op(left: &Value, op: &str, right: &Value) -> EvalResult<Value> {
    match op {
        "&&" => return Ok(Value::Bool(left.truthy() && right.truthy())),
        "||" => return Ok(Value::Bool(left.truthy() || right.truthy())),
        "==" => return Ok(Value::Bool(left == right)),
        "!=" => return Ok(Value::Bool(left != right)),
        _ => {}
    }

    if op == "+" {
        if let (Value::Str(a), Value::Str(b)) = (left, right) {
            return Ok(Value::Str(format!("{a}{b}")));
        }
        if !left.is_numeric() || !right.is_numeric() {
            return Ok(Value::Str(format!("{}{}", left.stringify(), right.stringify())));
        }
    }

    if !left.is_numeric() || !right.is_numeric() {
        return Err(RuntimeError::UnknownOperator { op: op.to_string() }.into());
    }

    let both_int = matches!((left, right), (Value::Int(_), Value::Int(_)));
    if both_int {
        let (Value::Int(a), Value::Int(b)) = (left, right) else { unreachable!() };
        let (a, b) = (*a, *b);
        return Ok(match op {
            "+" => Value::Int(a + b),
            "-" => Value::Int(a - b),
            "*" => Value::Int(a * b),
            "/" => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero.into());
                }
                Value::Int(a / b)
            }
            "%" => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero.into());
                }
                Value::Int(a % b)
            }
            "<" => Value::Bool(a < b),
            "<=" => Value::Bool(a <= b),
            ">" => Value::Bool(a > b),
            ">=" => Value::Bool(a >= b),
            other => return Err(RuntimeError::UnknownOperator { op: other.to_string() }.into()),
        });
    }

    let a = left.as_f64().expect("numeric");
    let b = right.as_f64().expect("numeric");
    Ok(match op {
        "+" => Value::Double(a + b),
        "-" => Value::Double(a - b),
        "*" => Value::Double(a * b),
        "/" => Value::Double(a / b),
        "%" => Value::Double(a % b),
        "<" => Value::Bool(a < b),
        "<=" => Value::Bool(a <= b),
        ">" => Value::Bool(a > b),
        ">=" => Value::Bool(a >= b),
        other => return Err(RuntimeError::UnknownOperator { op: other.to_string() }.into()),
    })
}

/// A bare string-literal `Print` expression is a direct write: its
/// bytes go out exactly as written, so an embedded trailing `\n`
/// escape is the only newline in the output. Every other expression
/// shape (including a `VarRef` that happens to hold a string, e.g. a
/// resolved enum case) prints through `stringify` with an appended
/// newline, matching the native backend's `print_int`/`print_float`
/// helpers, which always emit a trailing newline.
fn print_value(expr: &Expr, value: &Value) {
    use std::io::Write;
    if matches!(expr, Expr::Literal { value: Literal::Str(_), .. }) {
        print!("{}", value.stringify());
    } else {
        println!("{}", value.stringify());
    }
    std::io::stdout().flush().ok();
}

fn read_line(prompt: &str) -> String {
    use std::io::Write;
    print!("{prompt}");
    std::io::stdout().flush().ok();
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).ok();
    line.trim_end_matches(['\n', '\r']).to_string()
}

fn unary_op(op: &str, value: &Value) -> EvalResult<Value> {
    match op {
        "!" => Ok(Value::Bool(!value.truthy())),
        other => Err(RuntimeError::UnknownOperator { op: other.to_string() }.into()),
    }
}

/// Runs `program` and, on a fatal runtime error, prints a diagnostic
/// and exits the process with status 1.
pub fn run_or_exit(program: &Program) {
    let mut interpreter = Interpreter::new();
    if let Err(e) = interpreter.run(program) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{parse_program, LanguageDefinition};

    fn run_source(src: &str) -> Result<(), RuntimeError> {
        let ld = LanguageDefinition::canonical();
        let program = parse_program(src, &ld).expect("parse ok");
        Interpreter::new().run(&program)
    }

    #[test]
    fn var_decl_and_addition_succeed() {
        let ok = run_source("~>snag{x}::val(#2) ~>snag{y}::val(#3) ~>frob{a}::emit(x <+> y)");
        assert!(ok.is_ok());
    }

    #[test]
    fn undefined_variable_is_fatal() {
        let err = run_source("~>frob{a}::emit(missing)").unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedVariable { .. }));
    }

    #[test]
    fn division_by_zero_is_fatal() {
        let err = run_source("~>frob{a}::emit(#1 </> #0)").unwrap_err();
        assert_eq!(err, RuntimeError::DivisionByZero);
    }

    #[test]
    fn function_call_returns_value() {
        let ld = LanguageDefinition::canonical();
        let program = parse_program(
            "<~morph{add(a, b)}>> ~>yeet{a <+> b} <~>> ~>snag{r}::val(~>invoke{add}::with(#10, #20))",
            &ld,
        )
        .expect("parse ok");
        let mut interp = Interpreter::new();
        interp.run(&program).expect("run ok");
        assert_eq!(interp.lookup("r").unwrap(), Value::Int(30));
    }

    #[test]
    fn enum_index_resolves_to_case_name() {
        let ld = LanguageDefinition::canonical();
        let program = parse_program(
            "~>enum{Color}::cases(Red, Green, Blue) ~>snag{c}::val(Color[\"Red\"])",
            &ld,
        )
        .expect("parse ok");
        let mut interp = Interpreter::new();
        interp.run(&program).expect("run ok");
        assert_eq!(interp.lookup("c").unwrap(), Value::Str("Red".into()));
    }
}
