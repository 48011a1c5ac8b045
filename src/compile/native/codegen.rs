//! Expression/statement codegen and the two print-syscall helpers.
//!
//! Registers: `x0`/`w0` (and `x1`/`w1`) are the expression stack-machine
//! accumulator and its scratch partner; `d0`/`d1` play the same role
//! for floats. `x19..x26` stage `FuncCall` arguments before they are
//! copied into `x0..x7`. `x29` is the frame pointer; locals live at
//! negative offsets from it, `-16` and down.

use super::arm64;
use super::branch::{BranchKind, BranchTable, NativeError};
use super::buffer::{CodeBuffer, DataBuffer};
use crate::language::ast::{Expr, IfStmt, Literal, LoopStmt, Program, Stmt};
use rustc_hash::{FxHashMap, FxHashSet};

const WRITE_SYSCALL_CLASS: u16 = 0x2000; // unix syscalls: 0x2000000 | number
const SYS_WRITE: u16 = 0x0004;
const SYS_EXIT: u16 = 0x0001;
const STACK_BUF_LEN: u32 = 32;

pub struct CompiledProgram {
    pub code: Vec<u8>,
    pub data: Vec<u8>,
    pub main_offset: usize,
}

pub struct Codegen {
    code: CodeBuffer,
    data: DataBuffer,
    branches: BranchTable,
    scopes: Vec<FxHashMap<String, i32>>,
    float_vars: Vec<FxHashSet<String>>,
    next_slot: Vec<i32>,
    enums: FxHashMap<String, Vec<String>>,
    return_labels: Vec<String>,
    label_counter: usize,
    print_int_label: String,
    print_float_label: String,
}

impl Codegen {
    pub fn compile(program: &Program) -> Result<CompiledProgram, NativeError> {
        let mut cg = Codegen {
            code: CodeBuffer::new(),
            data: DataBuffer::new(),
            branches: BranchTable::new(),
            scopes: vec![FxHashMap::default()],
            float_vars: vec![FxHashSet::default()],
            next_slot: vec![-16],
            enums: FxHashMap::default(),
            return_labels: Vec::new(),
            label_counter: 0,
            print_int_label: "_print_int".to_string(),
            print_float_label: "_print_float".to_string(),
        };

        let int_label = cg.print_int_label.clone();
        cg.branches.define_label(&int_label, cg.code.offset());
        cg.emit_print_int();
        let float_label = cg.print_float_label.clone();
        cg.branches.define_label(&float_label, cg.code.offset());
        cg.emit_print_float();

        for stmt in &program.statements {
            if let Stmt::EnumDef { name, cases } = stmt {
                cg.enums.insert(name.clone(), cases.clone());
            }
        }

        let funcs: Vec<(&String, &Vec<String>, &Vec<Stmt>)> = program
            .statements
            .iter()
            .filter_map(|s| match s {
                Stmt::FuncDef { name, params, body } => Some((name, params, body)),
                _ => None,
            })
            .collect();
        for (name, params, body) in &funcs {
            cg.branches.define_label(&format!("_func_{name}"), cg.code.offset());
            cg.emit_function(name, params, body)?;
        }

        let main_offset = cg.code.offset();
        cg.emit_prologue();
        for stmt in &program.statements {
            if !matches!(stmt, Stmt::FuncDef { .. }) {
                cg.emit_stmt(stmt)?;
            }
        }
        cg.emit_exit();

        cg.branches.patch_all(&mut cg.code)?;

        Ok(CompiledProgram { code: cg.code.bytes().to_vec(), data: cg.data.bytes().to_vec(), main_offset })
    }

    fn fresh_label(&mut self, tag: &str) -> String {
        self.label_counter += 1;
        format!("_{tag}{}", self.label_counter)
    }

    fn alloc_slot(&mut self, name: &str, is_float: bool) -> i32 {
        if let Some(&slot) = self.scopes.last().unwrap().get(name) {
            return slot;
        }
        let slot = *self.next_slot.last().unwrap();
        *self.next_slot.last_mut().unwrap() -= 8;
        self.scopes.last_mut().unwrap().insert(name.to_string(), slot);
        if is_float {
            self.float_vars.last_mut().unwrap().insert(name.to_string());
        }
        slot
    }

    fn slot_of(&self, name: &str) -> Option<i32> {
        self.scopes.last().unwrap().get(name).copied()
    }

    fn is_float_var(&self, name: &str) -> bool {
        self.float_vars.last().unwrap().contains(name)
    }

    // ---- print_int / print_float helpers ----

    /// `x0` holds the value to print. Converts digit-by-digit into a
    /// stack buffer via repeated `udiv #10`/`msub`, prepends a sign,
    /// writes it, then writes a trailing newline.
    fn emit_print_int(&mut self) {
        self.code.push(arm64::stp64_preindex(29, 30, 31, -2));
        self.code.push(arm64::mov64(29, 31));
        self.code.push(arm64::sub64_imm(31, 31, STACK_BUF_LEN));

        self.code.push(arm64::movz32(2, 0)); // w2 = sign flag (1 = negative)
        self.code.push(arm64::cmp32_imm(0, 0));
        let skip_neg = self.fresh_label("skip_neg");
        self.branches.emit(&mut self.code, &skip_neg, BranchKind::Bge);
        self.code.push(arm64::movz32(2, 1));
        self.code.push(arm64::sub32_reg(0, 31, 0)); // w0 = 0 - w0 (negate; Rn=31 reads as WZR here)
        self.branches.define_label(&skip_neg, self.code.offset());

        // x3 = write cursor, starts at the last byte of the scratch buffer.
        self.code.push(arm64::add64_imm(3, 31, STACK_BUF_LEN - 1));
        self.code.push(arm64::movz32(1, 10));
        let digit_loop = self.fresh_label("digits");
        self.branches.define_label(&digit_loop, self.code.offset());
        self.code.push(arm64::udiv32(4, 0, 1)); // w4 = w0 / 10
        self.code.push(arm64::mul32(5, 4, 1)); // w5 = w4 * 10
        self.code.push(arm64::sub32_reg(5, 0, 5)); // w5 = w0 - w5 (remainder digit)
        self.code.push(arm64::add32_imm(5, 5, b'0' as u32));
        self.code.push(arm64::stur32(5, 3, 0));
        self.code.push(arm64::sub64_imm(3, 3, 1));
        self.code.push(arm64::mov32(0, 4));
        self.code.push(arm64::cmp32_imm(0, 0));
        self.branches.emit(&mut self.code, &digit_loop, BranchKind::Bgt);

        self.code.push(arm64::cmp32_imm(2, 0));
        let skip_sign = self.fresh_label("skip_sign");
        self.branches.emit(&mut self.code, &skip_sign, BranchKind::Beq);
        self.code.push(arm64::movz32(5, b'-' as u16));
        self.code.push(arm64::stur32(5, 3, 0));
        self.code.push(arm64::sub64_imm(3, 3, 1));
        self.branches.define_label(&skip_sign, self.code.offset());

        self.code.push(arm64::add64_imm(3, 3, 1)); // cursor -> first written byte
        self.code.push(arm64::add64_imm(4, 31, STACK_BUF_LEN)); // x4 = sp + buf_len
        self.code.push(arm64::sub64_reg(4, 4, 3)); // x4 = length written

        self.code.push(arm64::mov64(1, 3)); // x1 = buf ptr
        self.code.push(arm64::mov64(2, 4)); // x2 = length
        self.code.push(arm64::movz32(0, 1)); // w0 = stdout fd
        self.emit_write_syscall();

        self.emit_write_byte(b'\n');

        self.code.push(arm64::add64_imm(31, 31, STACK_BUF_LEN));
        self.code.push(arm64::ldp64_postindex(29, 30, 31, 2));
        self.code.push(arm64::ret());
    }

    /// Writes a single literal byte to stdout via a 16-byte scratch slot.
    fn emit_write_byte(&mut self, byte: u8) {
        self.code.push(arm64::sub64_imm(31, 31, 16));
        self.code.push(arm64::movz32(5, byte as u16));
        self.code.push(arm64::stur32(5, 31, 0));
        self.code.push(arm64::movz32(0, 1));
        self.code.push(arm64::mov64(1, 31));
        self.code.push(arm64::movz32(2, 1));
        self.emit_write_syscall();
        self.code.push(arm64::add64_imm(31, 31, 16));
    }

    /// `d0` holds the value to print. Whole-number part printed via
    /// `print_int`'s digit routine, then a `.` and six fractional
    /// digits obtained by repeated `*10`/`fcvtzs`/`fsub`.
    fn emit_print_float(&mut self) {
        self.code.push(arm64::stp64_preindex(29, 30, 31, -4));
        self.code.push(arm64::mov64(29, 31));
        self.code.push(arm64::stp64_preindex(19, 20, 31, -2));

        self.code.push(arm64::fcvtzs_w_d(19, 0)); // w19 = truncated integer part
        self.code.push(arm64::scvtf_d_w(1, 19)); // d1 = float(integer part)
        self.code.push(arm64::fsub(2, 0, 1)); // d2 = fractional remainder

        self.code.push(arm64::mov32(0, 19));
        self.branches.emit(&mut self.code, &self.print_int_label.clone(), BranchKind::Bl);
        self.emit_write_byte(b'.');

        let ten_off = self.data.intern_double(10.0);
        for _ in 0..6 {
            self.emit_load_data_addr(3, ten_off);
            self.code.push(arm64::ldur_d(3, 3, 0));
            self.code.push(arm64::fmul(2, 2, 3));
            self.code.push(arm64::fcvtzs_w_d(19, 2));
            self.code.push(arm64::add32_imm(5, 19, b'0' as u32));
            self.emit_write_byte_from_w5();
            self.code.push(arm64::scvtf_d_w(1, 19));
            self.code.push(arm64::fsub(2, 2, 1));
        }
        self.emit_write_byte(b'\n');

        self.code.push(arm64::ldp64_postindex(19, 20, 31, 2));
        self.code.push(arm64::ldp64_postindex(29, 30, 31, 4));
        self.code.push(arm64::ret());
    }

    fn emit_write_byte_from_w5(&mut self) {
        self.code.push(arm64::sub64_imm(31, 31, 16));
        self.code.push(arm64::stur32(5, 31, 0));
        self.code.push(arm64::movz32(0, 1));
        self.code.push(arm64::mov64(1, 31));
        self.code.push(arm64::movz32(2, 1));
        self.emit_write_syscall();
        self.code.push(arm64::add64_imm(31, 31, 16));
    }

    fn emit_write_syscall(&mut self) {
        self.code.push(arm64::movz64(16, WRITE_SYSCALL_CLASS, 1));
        self.code.push(arm64::movk64(16, SYS_WRITE, 0));
        self.code.push(arm64::svc(0x80));
    }

    fn emit_exit(&mut self) {
        self.code.push(arm64::movz32(0, 0));
        self.code.push(arm64::movz64(16, WRITE_SYSCALL_CLASS, 1));
        self.code.push(arm64::movk64(16, SYS_EXIT, 0));
        self.code.push(arm64::svc(0x80));
    }

    fn emit_prologue(&mut self) {
        self.code.push(arm64::stp64_preindex(29, 30, 31, -2));
        self.code.push(arm64::stp64_preindex(19, 20, 31, -2));
        self.code.push(arm64::mov64(29, 31));
        self.code.push(arm64::sub64_imm(31, 31, 256));
    }

    fn emit_epilogue(&mut self) {
        self.code.push(arm64::add64_imm(31, 31, 256));
        self.code.push(arm64::ldp64_postindex(19, 20, 31, 2));
        self.code.push(arm64::ldp64_postindex(29, 30, 31, 2));
        self.code.push(arm64::ret());
    }

    fn emit_load_data_addr(&mut self, rd: u32, data_off: usize) {
        self.code.push(arm64::adrp_placeholder(rd));
        self.code.push(arm64::add64_imm(rd, rd, data_off as u32));
    }

    fn emit_function(&mut self, name: &str, params: &[String], body: &[Stmt]) -> Result<(), NativeError> {
        self.scopes.push(FxHashMap::default());
        self.float_vars.push(FxHashSet::default());
        self.next_slot.push(-16);
        let ret_label = format!("_ret_{name}");
        self.return_labels.push(ret_label.clone());

        self.emit_prologue();
        for (i, param) in params.iter().enumerate().take(8) {
            let slot = self.alloc_slot(param, false);
            self.code.push(arm64::stur64(i as u32, 29, slot));
        }
        for stmt in body {
            self.emit_stmt(stmt)?;
        }
        self.branches.define_label(&ret_label, self.code.offset());
        self.emit_epilogue();

        self.return_labels.pop();
        self.scopes.pop();
        self.float_vars.pop();
        self.next_slot.pop();
        Ok(())
    }

    // ---- statement codegen ----

    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<(), NativeError> {
        match stmt {
            Stmt::Print(expr) => self.emit_print(expr),
            Stmt::Log(expr) => self.emit_print(expr),
            Stmt::VarDecl { name, value } => self.emit_var_decl(name, value),
            Stmt::Loop(loop_stmt) => self.emit_loop(loop_stmt),
            Stmt::If(if_stmt) => self.emit_if(if_stmt),
            Stmt::Return(expr) => self.emit_return(expr),
            Stmt::EnumDef { name, cases } => {
                self.enums.insert(name.clone(), cases.clone());
                for case in cases {
                    self.data.intern_string(case);
                }
                Ok(())
            }
            Stmt::FuncDef { .. } => Ok(()), // hoisted in a separate pass
            Stmt::Throw(_) | Stmt::Try(_) | Stmt::Comment(_) => {
                // Exception handling has no native-code counterpart;
                // left for the interpreter.
                Ok(())
            }
        }
    }

    fn emit_print(&mut self, expr: &Expr) -> Result<(), NativeError> {
        if self.is_float_expr(expr) {
            self.emit_expr_into_d0(expr)?;
            self.branches.emit(&mut self.code, &self.print_float_label.clone(), BranchKind::Bl);
        } else {
            self.emit_expr_into_x0(expr)?;
            self.branches.emit(&mut self.code, &self.print_int_label.clone(), BranchKind::Bl);
        }
        Ok(())
    }

    fn emit_var_decl(&mut self, name: &str, value: &Expr) -> Result<(), NativeError> {
        if self.is_float_expr(value) {
            self.emit_expr_into_d0(value)?;
            let slot = self.alloc_slot(name, true);
            self.code.push(arm64::stur_d(0, 29, slot));
        } else {
            self.emit_expr_into_x0(value)?;
            let slot = self.alloc_slot(name, false);
            self.code.push(arm64::stur32(0, 29, slot));
        }
        Ok(())
    }

    /// Only the numeric-range form is supported by the native backend;
    /// collection and while forms are silent no-ops here.
    fn emit_loop(&mut self, loop_stmt: &LoopStmt) -> Result<(), NativeError> {
        let (start, end) = match (&loop_stmt.start, &loop_stmt.end) {
            (Some(s), Some(e)) => (s, e),
            _ => return Ok(()),
        };
        self.emit_expr_into_x0(start)?;
        let var_slot = self.alloc_slot(&loop_stmt.var, false);
        self.code.push(arm64::stur32(0, 29, var_slot));

        self.emit_expr_into_x0(end)?;
        let end_slot = *self.next_slot.last().unwrap();
        *self.next_slot.last_mut().unwrap() -= 8;
        self.code.push(arm64::stur32(0, 29, end_slot));

        let loop_label = self.fresh_label("L");
        let end_label = self.fresh_label("E");
        self.branches.define_label(&loop_label, self.code.offset());
        self.code.push(arm64::ldur32(0, 29, var_slot));
        self.code.push(arm64::ldur32(1, 29, end_slot));
        self.code.push(arm64::cmp32_reg(0, 1));
        self.branches.emit(&mut self.code, &end_label, BranchKind::Bge);

        for stmt in &loop_stmt.body {
            self.emit_stmt(stmt)?;
        }

        self.code.push(arm64::ldur32(0, 29, var_slot));
        self.code.push(arm64::add32_imm(0, 0, 1));
        self.code.push(arm64::stur32(0, 29, var_slot));
        self.branches.emit(&mut self.code, &loop_label, BranchKind::B);
        self.branches.define_label(&end_label, self.code.offset());
        Ok(())
    }

    fn emit_if(&mut self, if_stmt: &IfStmt) -> Result<(), NativeError> {
        let else_label = self.fresh_label("else");
        let end_label = self.fresh_label("endif");

        if let Expr::BinaryOp { left, op, right } = &if_stmt.condition {
            if self.is_float_expr(left) || self.is_float_expr(right) {
                self.emit_expr_into_d0(left)?;
                self.code.push(arm64::sub64_imm(31, 31, 16));
                self.code.push(arm64::stur_d(0, 31, 0));
                self.emit_expr_into_d0(right)?;
                self.code.push(arm64::ldur_d(1, 31, 0));
                self.code.push(arm64::add64_imm(31, 31, 16));
                self.code.push(arm64::fcmp(1, 0));
                self.branches.emit(&mut self.code, &else_label, inverted_kind(op));
                for stmt in &if_stmt.then_body {
                    self.emit_stmt(stmt)?;
                }
                self.finish_if(&else_label, &end_label, if_stmt.else_body.as_deref())?;
                return Ok(());
            }
        }

        self.emit_expr_into_x0(&if_stmt.condition)?;
        self.code.push(arm64::cmp32_imm(0, 0));
        self.branches.emit(&mut self.code, &else_label, BranchKind::Beq);
        for stmt in &if_stmt.then_body {
            self.emit_stmt(stmt)?;
        }
        self.finish_if(&else_label, &end_label, if_stmt.else_body.as_deref())?;
        Ok(())
    }

    fn finish_if(
        &mut self,
        else_label: &str,
        end_label: &str,
        else_body: Option<&[Stmt]>,
    ) -> Result<(), NativeError> {
        if else_body.is_some() {
            self.branches.emit(&mut self.code, end_label, BranchKind::B);
        }
        self.branches.define_label(else_label, self.code.offset());
        if let Some(else_body) = else_body {
            for stmt in else_body {
                self.emit_stmt(stmt)?;
            }
            self.branches.define_label(end_label, self.code.offset());
        }
        Ok(())
    }

    fn emit_return(&mut self, expr: &Expr) -> Result<(), NativeError> {
        self.emit_expr_into_x0(expr)?;
        let label = self
            .return_labels
            .last()
            .cloned()
            .unwrap_or_else(|| "_ret_main".to_string());
        self.branches.emit(&mut self.code, &label, BranchKind::B);
        Ok(())
    }

    // ---- expression codegen (integer path, into x0/w0) ----

    fn emit_expr_into_x0(&mut self, expr: &Expr) -> Result<(), NativeError> {
        match expr {
            Expr::Literal { value: Literal::Int(n), .. } => self.emit_load_int(*n),
            Expr::Literal { value: Literal::Bool(b), .. } => {
                self.code.push(arm64::movz32(0, *b as u16));
                Ok(())
            }
            Expr::Literal { value: Literal::None, .. } => {
                self.code.push(arm64::movz32(0, 0));
                Ok(())
            }
            Expr::VarRef(name) => {
                if let Some(slot) = self.slot_of(name) {
                    self.code.push(arm64::ldur32(0, 29, slot));
                } else if let Some(cases) = self.enums.get(name).cloned() {
                    let off = cases.first().map(|c| self.data.intern_string(c)).unwrap_or(0);
                    self.emit_load_data_addr(0, off);
                }
                Ok(())
            }
            Expr::BinaryOp { left, op, right } => self.emit_binary_int(left, op, right),
            Expr::UnaryOp { op, operand } if op == "!" => {
                self.emit_expr_into_x0(operand)?;
                self.code.push(arm64::cmp32_imm(0, 0));
                self.code.push(arm64::cset32(0, arm64::COND_EQ));
                Ok(())
            }
            Expr::FuncCall { name, args } => self.emit_call(name, args),
            _ => Ok(()),
        }
    }

    fn emit_load_int(&mut self, n: i64) -> Result<(), NativeError> {
        let unsigned = n as u32 as u64;
        self.code.push(arm64::movz32(0, (unsigned & 0xFFFF) as u16));
        let high = ((unsigned >> 16) & 0xFFFF) as u16;
        if high != 0 {
            self.code.push(arm64::movk64(0, high, 1));
        }
        Ok(())
    }

    fn emit_binary_int(&mut self, left: &Expr, op: &str, right: &Expr) -> Result<(), NativeError> {
        self.emit_expr_into_x0(left)?;
        self.code.push(arm64::stp64_preindex(0, 0, 31, -2));
        self.emit_expr_into_x0(right)?;
        self.code.push(arm64::mov32(1, 0));
        self.code.push(arm64::ldp64_postindex(0, 0, 31, 2));
        match op {
            "+" => self.code.push(arm64::add32_reg(0, 0, 1)),
            "-" => self.code.push(arm64::sub32_reg(0, 0, 1)),
            "*" => self.code.push(arm64::mul32(0, 0, 1)),
            "/" => self.code.push(arm64::sdiv32(0, 0, 1)),
            "%" => {
                self.code.push(arm64::sdiv32(2, 0, 1));
                self.code.push(arm64::msub32(0, 2, 1, 0));
            }
            "==" => {
                self.code.push(arm64::cmp32_reg(0, 1));
                self.code.push(arm64::cset32(0, arm64::COND_EQ));
            }
            "!=" => {
                self.code.push(arm64::cmp32_reg(0, 1));
                self.code.push(arm64::cset32(0, arm64::COND_NE));
            }
            "<" => {
                self.code.push(arm64::cmp32_reg(0, 1));
                self.code.push(arm64::cset32(0, arm64::COND_LT));
            }
            "<=" => {
                self.code.push(arm64::cmp32_reg(0, 1));
                self.code.push(arm64::cset32(0, arm64::COND_LE));
            }
            ">" => {
                self.code.push(arm64::cmp32_reg(0, 1));
                self.code.push(arm64::cset32(0, arm64::COND_GT));
            }
            ">=" => {
                self.code.push(arm64::cmp32_reg(0, 1));
                self.code.push(arm64::cset32(0, arm64::COND_GE));
            }
            _ => {}
        }
        Ok(())
    }

    fn emit_call(&mut self, name: &str, args: &[Expr]) -> Result<(), NativeError> {
        for (i, arg) in args.iter().enumerate().take(8) {
            self.emit_expr_into_x0(arg)?;
            self.code.push(arm64::mov32(19 + i as u32, 0));
        }
        for i in 0..args.len().min(8) {
            self.code.push(arm64::mov32(i as u32, 19 + i as u32));
        }
        self.branches.emit(&mut self.code, &format!("_func_{name}"), BranchKind::Bl);
        Ok(())
    }

    // ---- expression codegen (float path, into d0) ----

    fn emit_expr_into_d0(&mut self, expr: &Expr) -> Result<(), NativeError> {
        match expr {
            Expr::Literal { value: Literal::Double(n), .. } => {
                let off = self.data.intern_double(*n);
                self.emit_load_data_addr(0, off);
                self.code.push(arm64::ldur_d(0, 0, 0));
                Ok(())
            }
            Expr::VarRef(name) => {
                if let Some(slot) = self.slot_of(name) {
                    self.code.push(arm64::ldur_d(0, 29, slot));
                }
                Ok(())
            }
            Expr::BinaryOp { left, op, right } => {
                self.emit_expr_into_d0(left)?;
                self.code.push(arm64::sub64_imm(31, 31, 16));
                self.code.push(arm64::stur_d(0, 31, 0));
                self.emit_expr_into_d0(right)?;
                self.code.push(arm64::ldur_d(1, 31, 0));
                self.code.push(arm64::add64_imm(31, 31, 16));
                match op.as_str() {
                    "+" => self.code.push(arm64::fadd(0, 1, 0)),
                    "-" => self.code.push(arm64::fsub(0, 1, 0)),
                    "*" => self.code.push(arm64::fmul(0, 1, 0)),
                    _ => {}
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Is `expr` float-typed? Any `Literal::Double`, any variable
    /// tracked in the current scope's `float_vars`, or any `BinaryOp`
    /// with a float operand.
    fn is_float_expr(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Literal { value: Literal::Double(_), .. } => true,
            Expr::VarRef(name) => self.is_float_var(name),
            Expr::BinaryOp { left, right, .. } => {
                self.is_float_expr(left) || self.is_float_expr(right)
            }
            Expr::UnaryOp { operand, .. } => self.is_float_expr(operand),
            _ => false,
        }
    }
}

fn inverted_kind(op: &str) -> BranchKind {
    match op {
        "==" => BranchKind::Bne,
        "!=" => BranchKind::Beq,
        "<" => BranchKind::Bge,
        "<=" => BranchKind::Bgt,
        ">" => BranchKind::Ble,
        ">=" => BranchKind::Blt,
        _ => BranchKind::Bne,
    }
}
