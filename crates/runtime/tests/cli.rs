//! Exercises the `ember` binary the way a user would: write a script to
//! disk, invoke the compiled binary on it, check the exit code.

use std::io::Write;
use std::process::Command;

use tempfile::NamedTempFile;

fn write_script(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp script file");
    file.write_all(contents.as_bytes()).expect("write script");
    file
}

fn run_binary(path: &std::path::Path, extra_args: &[&str]) -> std::process::ExitStatus {
    Command::new(env!("CARGO_BIN_EXE_ember"))
        .arg(path)
        .args(extra_args)
        .status()
        .expect("spawn ember binary")
}

#[test]
fn well_formed_script_exits_zero() {
    let script = write_script("print(1 + 1);\n");
    let status = run_binary(script.path(), &[]);
    assert_eq!(status.code(), Some(0));
}

#[test]
fn compile_error_exits_65() {
    let script = write_script("var 1x = 2;\n");
    let status = run_binary(script.path(), &[]);
    assert_eq!(status.code(), Some(65));
}

#[test]
fn runtime_error_exits_70() {
    let script = write_script("print(undefined_name);\n");
    let status = run_binary(script.path(), &[]);
    assert_eq!(status.code(), Some(70));
}

#[test]
fn missing_file_exits_74() {
    let status = run_binary(std::path::Path::new("/nonexistent/path/does-not-exist.ember"), &[]);
    assert_eq!(status.code(), Some(74));
}

#[test]
fn sanitize_flag_allows_elided_semicolons() {
    let script = write_script("var x = 1\nprint(x)\n");
    let status = run_binary(script.path(), &["--sanitize"]);
    assert_eq!(status.code(), Some(0));
}
