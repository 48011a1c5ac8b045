//! Mach-O executable assembly: header, three segments, nine load
//! commands, and the ADRP/ADD fix-up pass.

use super::arm64;
use super::branch::NativeError;
use super::codegen::CompiledProgram;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

const PAGE_SIZE: u64 = 0x4000; // 16 KiB
const TEXT_VM_BASE: u64 = 0x1_0000_0000;

const MH_MAGIC_64: u32 = 0xFEED_FACF;
const CPU_TYPE_ARM64: u32 = 0x0100_000C;
/// The non-ARM64E "ALL" subtype's literal value, rather than the `0`
/// most toolchains use.
const CPU_SUBTYPE_ARM64_ALL: u32 = 0x0000_0002;
const MH_EXECUTE: u32 = 0x2;
const MH_NOUNDEFS: u32 = 0x1;
const MH_DYLDLINK: u32 = 0x4;
const MH_TWOLEVEL: u32 = 0x80;
const MH_PIE: u32 = 0x20_0000;

const LC_SEGMENT_64: u32 = 0x19;
const LC_SYMTAB: u32 = 0x2;
const LC_DYLD_CHAINED_FIXUPS: u32 = 0x8000_0034;
const LC_DYLD_EXPORTS_TRIE: u32 = 0x8000_0033;
const LC_MAIN: u32 = 0x8000_0028;
const LC_LOAD_DYLINKER: u32 = 0xE;
const LC_BUILD_VERSION: u32 = 0x32;

const VM_PROT_NONE: u32 = 0;
const VM_PROT_READ: u32 = 0x1;
const VM_PROT_WRITE: u32 = 0x2;
const VM_PROT_EXECUTE: u32 = 0x4;

/// Runs the ADRP/ADD fix-up pass, assembles the Mach-O executable, and
/// writes it to `path` with mode `0755`.
pub fn write_executable(compiled: &CompiledProgram, path: &Path) -> Result<(), NativeError> {
    let mut code = compiled.code.clone();
    let mut data = compiled.data.clone();
    while data.len() % 8 != 0 {
        data.push(0);
    }

    let header_and_commands_size = header_size() + load_commands_size();
    let text_file_offset: u64 = 0; // __TEXT covers the whole file from offset 0
    let text_vm_addr = TEXT_VM_BASE;
    let code_file_offset = align_up(header_and_commands_size as u64, 16);
    let data_file_offset = align_up(code_file_offset + code.len() as u64, 8);
    let text_segment_size = align_up(data_file_offset + data.len() as u64, PAGE_SIZE);

    let data_vm_addr = text_vm_addr + data_file_offset;
    fixup_adrp_add(&mut code, text_vm_addr + code_file_offset, data_vm_addr)?;

    let linkedit_file_offset = text_segment_size;
    let linkedit_vm_addr = text_vm_addr + linkedit_file_offset;
    let linkedit_size = PAGE_SIZE;

    let entry_off = code_file_offset + compiled.main_offset as u64;

    let mut out = Vec::new();
    write_mach_header(&mut out);
    write_pagezero(&mut out);
    write_text_segment(
        &mut out,
        text_vm_addr,
        text_segment_size,
        code_file_offset,
        code.len() as u64,
        data_file_offset,
        data.len() as u64,
    );
    write_linkedit_segment(&mut out, linkedit_vm_addr, linkedit_size, linkedit_file_offset);
    write_dylinker_command(&mut out);
    write_build_version_command(&mut out);
    write_symtab_command(&mut out, linkedit_file_offset);
    write_chained_fixups_command(&mut out);
    write_exports_trie_command(&mut out);
    write_main_command(&mut out, entry_off);

    while (out.len() as u64) < code_file_offset {
        out.push(0);
    }
    out.extend_from_slice(&code);
    while (out.len() as u64) < data_file_offset {
        out.push(0);
    }
    out.extend_from_slice(&data);
    while (out.len() as u64) < text_segment_size {
        out.push(0);
    }
    while (out.len() as u64) < linkedit_file_offset + linkedit_size {
        out.push(0);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| NativeError { message: e.to_string() })?;
        }
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o755)
        .open(path)
        .map_err(|e| NativeError { message: e.to_string() })?;
    file.write_all(&out).map_err(|e| NativeError { message: e.to_string() })?;
    Ok(())
}

fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) / align * align
}

fn header_size() -> usize {
    32 // mach_header_64
}

fn load_commands_size() -> usize {
    // __PAGEZERO, __TEXT, __LINKEDIT, LC_LOAD_DYLINKER, LC_BUILD_VERSION,
    // LC_SYMTAB, LC_DYLD_CHAINED_FIXUPS, LC_DYLD_EXPORTS_TRIE, LC_MAIN
    let segment_64_no_sections = 72;
    let text_segment = segment_64_no_sections + 2 * 80; // two sections: __text, __cstring
    segment_64_no_sections // __PAGEZERO
        + text_segment
        + segment_64_no_sections // __LINKEDIT
        + 24 // LC_LOAD_DYLINKER (cmdsize rounded to 8, name "/usr/lib/dyld" fits in 24)
        + 24 // LC_BUILD_VERSION (no tool entries)
        + 24 // LC_SYMTAB
        + 16 // LC_DYLD_CHAINED_FIXUPS
        + 16 // LC_DYLD_EXPORTS_TRIE
        + 24 // LC_MAIN
}

fn write_mach_header(out: &mut Vec<u8>) {
    out.extend_from_slice(&MH_MAGIC_64.to_le_bytes());
    out.extend_from_slice(&CPU_TYPE_ARM64.to_le_bytes());
    out.extend_from_slice(&CPU_SUBTYPE_ARM64_ALL.to_le_bytes());
    out.extend_from_slice(&MH_EXECUTE.to_le_bytes());
    out.extend_from_slice(&9u32.to_le_bytes()); // ncmds
    out.extend_from_slice(&(load_commands_size() as u32).to_le_bytes());
    out.extend_from_slice(&(MH_NOUNDEFS | MH_DYLDLINK | MH_TWOLEVEL | MH_PIE).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved
}

fn write_segment_64_header(
    out: &mut Vec<u8>,
    cmdsize: u32,
    name: &[u8; 16],
    vmaddr: u64,
    vmsize: u64,
    fileoff: u64,
    filesize: u64,
    maxprot: u32,
    initprot: u32,
    nsects: u32,
    flags: u32,
) {
    out.extend_from_slice(&LC_SEGMENT_64.to_le_bytes());
    out.extend_from_slice(&cmdsize.to_le_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(&vmaddr.to_le_bytes());
    out.extend_from_slice(&vmsize.to_le_bytes());
    out.extend_from_slice(&fileoff.to_le_bytes());
    out.extend_from_slice(&filesize.to_le_bytes());
    out.extend_from_slice(&maxprot.to_le_bytes());
    out.extend_from_slice(&initprot.to_le_bytes());
    out.extend_from_slice(&nsects.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
}

fn segment_name(name: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = name.as_bytes();
    buf[..bytes.len()].copy_from_slice(bytes);
    buf
}

fn write_pagezero(out: &mut Vec<u8>) {
    write_segment_64_header(
        out,
        72,
        &segment_name("__PAGEZERO"),
        0,
        TEXT_VM_BASE,
        0,
        0,
        VM_PROT_NONE,
        VM_PROT_NONE,
        0,
        0,
    );
}

fn write_section_64(
    out: &mut Vec<u8>,
    sectname: &str,
    segname: &str,
    addr: u64,
    size: u64,
    offset: u32,
    align: u32,
    flags: u32,
) {
    out.extend_from_slice(&segment_name(sectname));
    out.extend_from_slice(&segment_name(segname));
    out.extend_from_slice(&addr.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&align.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // reloff
    out.extend_from_slice(&0u32.to_le_bytes()); // nreloc
    out.extend_from_slice(&0u32.to_le_bytes()); // flags (S_REGULAR)
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved1
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved2
    out.extend_from_slice(&0u32.to_le_bytes()); // reserved3
}

#[allow(clippy::too_many_arguments)]
fn write_text_segment(
    out: &mut Vec<u8>,
    vmaddr: u64,
    vmsize: u64,
    code_off: u64,
    code_size: u64,
    data_off: u64,
    data_size: u64,
) {
    let cmdsize = 72 + 2 * 80;
    write_segment_64_header(
        out,
        cmdsize,
        &segment_name("__TEXT"),
        vmaddr,
        vmsize,
        0,
        vmsize,
        VM_PROT_READ | VM_PROT_EXECUTE,
        VM_PROT_READ | VM_PROT_EXECUTE,
        2,
        0,
    );
    write_section_64(
        out,
        "__text",
        "__TEXT",
        vmaddr + code_off,
        code_size,
        code_off as u32,
        2,
        0x8000_0400, // S_ATTR_SOME_INSTRUCTIONS | S_ATTR_PURE_INSTRUCTIONS
    );
    write_section_64(out, "__cstring", "__TEXT", vmaddr + data_off, data_size, data_off as u32, 0, 0x2);
}

fn write_linkedit_segment(out: &mut Vec<u8>, vmaddr: u64, vmsize: u64, fileoff: u64) {
    write_segment_64_header(
        out,
        72,
        &segment_name("__LINKEDIT"),
        vmaddr,
        vmsize,
        fileoff,
        vmsize,
        VM_PROT_READ,
        VM_PROT_READ,
        0,
        0,
    );
}

fn write_dylinker_command(out: &mut Vec<u8>) {
    let name = b"/usr/lib/dyld\0\0\0";
    out.extend_from_slice(&LC_LOAD_DYLINKER.to_le_bytes());
    out.extend_from_slice(&24u32.to_le_bytes());
    out.extend_from_slice(&12u32.to_le_bytes()); // offset of name within command
    out.extend_from_slice(name);
}

fn write_build_version_command(out: &mut Vec<u8>) {
    out.extend_from_slice(&LC_BUILD_VERSION.to_le_bytes());
    out.extend_from_slice(&24u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes()); // PLATFORM_MACOS
    out.extend_from_slice(&0x000B_0000u32.to_le_bytes()); // minos 11.0.0
    out.extend_from_slice(&0x000E_0000u32.to_le_bytes()); // sdk 14.0.0
    out.extend_from_slice(&0u32.to_le_bytes()); // ntools
}

fn write_symtab_command(out: &mut Vec<u8>, linkedit_off: u64) {
    out.extend_from_slice(&LC_SYMTAB.to_le_bytes());
    out.extend_from_slice(&24u32.to_le_bytes());
    out.extend_from_slice(&(linkedit_off as u32).to_le_bytes()); // symoff
    out.extend_from_slice(&0u32.to_le_bytes()); // nsyms
    out.extend_from_slice(&(linkedit_off as u32).to_le_bytes()); // stroff
    out.extend_from_slice(&1u32.to_le_bytes()); // strsize (one nul byte)
}

fn write_chained_fixups_command(out: &mut Vec<u8>) {
    out.extend_from_slice(&LC_DYLD_CHAINED_FIXUPS.to_le_bytes());
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
}

fn write_exports_trie_command(out: &mut Vec<u8>) {
    out.extend_from_slice(&LC_DYLD_EXPORTS_TRIE.to_le_bytes());
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
}

fn write_main_command(out: &mut Vec<u8>, entry_off: u64) {
    out.extend_from_slice(&LC_MAIN.to_le_bytes());
    out.extend_from_slice(&24u32.to_le_bytes());
    out.extend_from_slice(&entry_off.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes()); // stacksize (0 = default)
}

/// Scans `code` in 4-byte steps; every `ADRP` word has its page delta
/// against `data_vm_addr` patched in, and the immediately following
/// `ADD (immediate)` has the data section's low-12 address bits added
/// onto its existing immediate.
fn fixup_adrp_add(code: &mut [u8], code_vm_addr: u64, data_vm_addr: u64) -> Result<(), NativeError> {
    let mut i = 0usize;
    while i + 4 <= code.len() {
        let word = u32::from_le_bytes(code[i..i + 4].try_into().unwrap());
        if arm64::is_adrp(word) {
            let adrp_vm_addr = code_vm_addr + i as u64;
            let page_delta = ((data_vm_addr >> 12) as i64) - ((adrp_vm_addr >> 12) as i64);
            let fixed = arm64::adrp_set_delta(word, page_delta);
            code[i..i + 4].copy_from_slice(&fixed.to_le_bytes());

            if i + 8 <= code.len() {
                let next = u32::from_le_bytes(code[i + 4..i + 8].try_into().unwrap());
                if arm64::is_add_imm(next) {
                    let existing_low12 = (next >> 10) & 0xFFF;
                    let low12 = ((data_vm_addr & 0xFFF) as u32 + existing_low12) & 0xFFF;
                    let fixed_add = arm64::add64_imm_set_low12(next, low12);
                    code[i + 4..i + 8].copy_from_slice(&fixed_add.to_le_bytes());
                }
            }
        }
        i += 4;
    }
    Ok(())
}
