//! Labels and branch patching: every branch site is recorded and
//! resolved in a single pass at the end of compilation.

use super::arm64;
use super::buffer::CodeBuffer;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    B,
    Bl,
    Beq,
    Bne,
    Bge,
    Ble,
    Bgt,
    Blt,
}

struct Site {
    offset: usize,
    label: String,
    kind: BranchKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeError {
    pub message: String,
}

impl std::fmt::Display for NativeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for NativeError {}

#[derive(Default)]
pub struct BranchTable {
    sites: Vec<Site>,
    labels: FxHashMap<String, usize>,
}

impl BranchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_label(&mut self, name: &str, offset: usize) {
        self.labels.insert(name.to_string(), offset);
    }

    /// Appends a placeholder branch word at the buffer's current
    /// offset and records it to be patched once `label` is known.
    pub fn emit(&mut self, code: &mut CodeBuffer, label: &str, kind: BranchKind) {
        let offset = code.offset();
        code.push(0);
        self.sites.push(Site { offset, label: label.to_string(), kind });
    }

    pub fn patch_all(&self, code: &mut CodeBuffer) -> Result<(), NativeError> {
        for site in &self.sites {
            let target = *self.labels.get(&site.label).ok_or_else(|| NativeError {
                message: format!("unresolved branch label '{}'", site.label),
            })?;
            let delta_instrs = (target as i64 - site.offset as i64) / 4;
            let word = match site.kind {
                BranchKind::B => arm64::b(delta_instrs as i32),
                BranchKind::Bl => arm64::bl(delta_instrs as i32),
                BranchKind::Beq => arm64::b_cond(delta_instrs as i32, arm64::COND_EQ),
                BranchKind::Bne => arm64::b_cond(delta_instrs as i32, arm64::COND_NE),
                BranchKind::Bge => arm64::b_cond(delta_instrs as i32, arm64::COND_GE),
                BranchKind::Ble => arm64::b_cond(delta_instrs as i32, arm64::COND_LE),
                BranchKind::Bgt => arm64::b_cond(delta_instrs as i32, arm64::COND_GT),
                BranchKind::Blt => arm64::b_cond(delta_instrs as i32, arm64::COND_LT),
            };
            code.patch(site.offset, word);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patches_forward_branch_to_defined_label() {
        let mut code = CodeBuffer::new();
        let mut branches = BranchTable::new();
        branches.emit(&mut code, "_end", BranchKind::B);
        code.push(arm64::ret());
        branches.define_label("_end", code.offset());
        branches.patch_all(&mut code).expect("patch ok");
        let word = u32::from_le_bytes(code.bytes()[0..4].try_into().unwrap());
        assert_eq!(word & 0xFC00_0000, 0x1400_0000);
    }

    #[test]
    fn unresolved_label_is_an_error() {
        let mut code = CodeBuffer::new();
        let mut branches = BranchTable::new();
        branches.emit(&mut code, "_missing", BranchKind::B);
        assert!(branches.patch_all(&mut code).is_err());
    }
}
