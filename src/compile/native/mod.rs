//! ARM64 Mach-O native code generator: the from-scratch alternative to
//! the tree-walking interpreter.
//!
//! No object file, no linker, no libc: `write_executable` emits a
//! complete `MH_EXECUTE` Mach-O binary that talks to the kernel only
//! through raw `svc #0x80` syscalls.

pub mod arm64;
pub mod branch;
pub mod buffer;
pub mod codegen;
pub mod macho;

use crate::language::ast::Program;
use branch::NativeError;
use std::path::Path;

/// Compiles `program` to ARM64 machine code and writes a standalone,
/// executable Mach-O binary at `path`.
pub fn write_executable(program: &Program, path: &Path) -> Result<(), NativeError> {
    let compiled = codegen::Codegen::compile(program)?;
    macho::write_executable(&compiled, path)
}
