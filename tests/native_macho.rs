//! Mach-O well-formedness of the native backend's output.

use jibjab::{compile_native, LanguageDefinition};
use tempfile::NamedTempFile;

fn compiled_bytes(source: &str) -> Vec<u8> {
    let ld = LanguageDefinition::canonical();
    let out = NamedTempFile::new().expect("tempfile");
    compile_native(source, &ld, out.path()).expect("compiles");
    std::fs::read(out.path()).expect("read output")
}

#[test]
fn emits_mach_header_64_arm64_executable() {
    let bytes = compiled_bytes(r#"~>frob{a1}::emit(#42)"#);
    let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let cputype = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    let filetype = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
    let ncmds = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
    assert_eq!(magic, 0xFEED_FACF);
    assert_eq!(cputype, 0x0100_000C);
    assert_eq!(filetype, 0x2); // MH_EXECUTE
    assert_eq!(ncmds, 9);
}

#[test]
fn output_file_has_executable_mode() {
    use std::os::unix::fs::PermissionsExt;
    let ld = LanguageDefinition::canonical();
    let out = NamedTempFile::new().expect("tempfile");
    compile_native(r#"~>frob{a1}::emit(#1)"#, &ld, out.path()).expect("compiles");
    let mode = std::fs::metadata(out.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
}

#[test]
fn load_commands_include_pagezero_text_and_linkedit_segments() {
    let bytes = compiled_bytes(r#"~>frob{a1}::emit(#1)"#);
    let mut offset = 32usize; // past mach_header_64
    let mut seen_segments = Vec::new();
    for _ in 0..9 {
        let cmd = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        let cmdsize = u32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().unwrap());
        if cmd == 0x19 {
            // LC_SEGMENT_64: segname starts right after cmd/cmdsize.
            let name_bytes = &bytes[offset + 8..offset + 24];
            let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(16);
            seen_segments.push(String::from_utf8_lossy(&name_bytes[..name_end]).to_string());
        }
        offset += cmdsize as usize;
    }
    assert_eq!(seen_segments, vec!["__PAGEZERO", "__TEXT", "__LINKEDIT"]);
}

#[test]
fn adrp_add_pairs_target_addresses_within_the_text_segment() {
    let bytes = compiled_bytes(r#"~>frob{a1}::emit("fixture\n")"#);
    let mut seen_adrp = false;
    let mut i = 0usize;
    while i + 8 <= bytes.len() {
        let word = u32::from_le_bytes(bytes[i..i + 4].try_into().unwrap());
        if word & 0x9F00_0000 == 0x9000_0000 {
            let next = u32::from_le_bytes(bytes[i + 4..i + 8].try_into().unwrap());
            let is_add_imm = next & 0xFF80_0000 == 0x9100_0000 || next & 0xFF80_0000 == 0x1100_0000;
            if is_add_imm {
                seen_adrp = true;
                break;
            }
        }
        i += 4;
    }
    assert!(seen_adrp, "expected at least one ADRP/ADD pair for the interned string literal");
}
