//! The six seed scenarios from the canonical source table, run
//! end-to-end through `parse` + `Interpreter::run`.

use jibjab::{parse, Interpreter, LanguageDefinition};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use tempfile::NamedTempFile;

extern "C" {
    fn dup(fd: i32) -> i32;
    fn dup2(old: i32, new: i32) -> i32;
    fn close(fd: i32) -> i32;
}

/// Temporarily redirects the process's real stdout (fd 1) to a named
/// tempfile, runs `f`, restores fd 1, and returns whatever was
/// written. `Interpreter::run` writes via `println!`, which always
/// targets fd 1, so nothing short of fd-level redirection observes it.
fn capture_stdout(f: impl FnOnce()) -> String {
    std::io::stdout().flush().ok();
    let tmp = NamedTempFile::new().expect("tempfile");
    let saved = unsafe { dup(1) };
    unsafe { dup2(tmp.as_raw_fd(), 1) };

    f();

    std::io::stdout().flush().ok();
    unsafe { dup2(saved, 1) };
    unsafe { close(saved) };

    std::fs::read_to_string(tmp.path()).expect("read captured output")
}

fn run(source: &str) {
    let ld = LanguageDefinition::canonical();
    let program = parse(source, &ld).expect("parses");
    let mut interp = Interpreter::new();
    interp.run(&program).expect("runs");
}

#[test]
fn scenario_1_print_literal_string() {
    let out = capture_stdout(|| run(r#"~>frob{a1}::emit("hello\n")"#));
    assert_eq!(out, "hello\n");
}

#[test]
fn scenario_2_print_sum_of_two_vars() {
    let out = capture_stdout(|| {
        run(
            r#"
            ~>snag{x}::val(#2)
            ~>snag{y}::val(#3)
            ~>frob{a1}::emit(x <+> y)
            "#,
        )
    });
    assert_eq!(out, "5\n");
}

#[test]
fn scenario_3_range_loop_prints_each_index() {
    let out = capture_stdout(|| {
        run(
            r#"
            <~loop{i:#0..#3}>>
            ~>frob{a1}::emit(i)
            <~>>
            "#,
        )
    });
    assert_eq!(out, "0\n1\n2\n");
}

#[test]
fn scenario_4_when_picks_then_branch() {
    let out = capture_stdout(|| {
        run(
            r#"
            ~>snag{x}::val(#1)
            ~>snag{y}::val(#2)
            <~when{x <lt> y}>>
            ~>frob{a1}::emit("then-branch")
            <~else>>
            ~>frob{a1}::emit("else-branch")
            <~>>
            "#,
        )
    });
    assert_eq!(out, "then-branch");
}

#[test]
fn scenario_4_when_picks_else_branch() {
    let out = capture_stdout(|| {
        run(
            r#"
            ~>snag{x}::val(#2)
            ~>snag{y}::val(#1)
            <~when{x <lt> y}>>
            ~>frob{a1}::emit("then-branch")
            <~else>>
            ~>frob{a1}::emit("else-branch")
            <~>>
            "#,
        )
    });
    assert_eq!(out, "else-branch");
}

#[test]
fn scenario_5_function_call_returns_sum() {
    let out = capture_stdout(|| {
        run(
            r#"
            <~morph{add(a, b)}>>
            ~>yeet{a <+> b}
            <~>>
            ~>frob{a1}::emit(~>invoke{add}::with(#10, #20))
            "#,
        )
    });
    assert_eq!(out, "30\n");
}

#[test]
fn scenario_6_enum_index_resolves_to_case_name() {
    let out = capture_stdout(|| {
        run(
            r#"
            ~>enum{Color}::cases(Red, Green, Blue)
            ~>snag{c}::val(Color["Red"])
            ~>frob{a1}::emit(c)
            "#,
        )
    });
    assert_eq!(out, "Red\n");
}
