use std::fs;

use jackc::{compile_file, compile_source};
use tempfile::tempdir;

#[test]
fn test_end_to_end_seven() {
    let vm = compile_source("class A { function int seven() { return 7; } }", 0).unwrap();
    assert_eq!(vm, "function A.seven 0\npush constant 7\nreturn\n");
}

#[test]
fn test_recompiling_same_source_is_byte_identical() {
    let source = "class A { field int x; constructor A new() { let x = 0; return this; } }";
    let first = compile_source(source, 0).unwrap();
    let second = compile_source(source, 0).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_compile_directory_writes_one_vm_per_jack_file() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("Main.jack"),
        "class Main { function void main() { do Output.printInt(1+2); return; } }",
    )
    .unwrap();
    fs::write(
        dir.path().join("Helper.jack"),
        "class Helper { function int id(int n) { return n; } }",
    )
    .unwrap();
    fs::write(dir.path().join("readme.txt"), "not jack").unwrap();

    let files = jackc::resolve_jack_files(dir.path());
    assert_eq!(files.len(), 2);
    for path in &files {
        compile_file(path).unwrap_or_else(|(d, _)| panic!("{}", d.message));
    }

    let main_vm = fs::read_to_string(dir.path().join("Main.vm")).unwrap();
    assert!(main_vm.contains("call Output.printInt 1"));
    let helper_vm = fs::read_to_string(dir.path().join("Helper.vm")).unwrap();
    assert_eq!(helper_vm, "function Helper.id 0\npush argument 0\nreturn\n");
    assert!(!dir.path().join("readme.vm").exists());
}

#[test]
fn test_compile_directory_does_not_descend_into_subdirectories() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("Main.jack"),
        "class Main { function void main() { return; } }",
    )
    .unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("Nested.jack"), "class Nested { }").unwrap();

    let files = jackc::resolve_jack_files(dir.path());
    assert_eq!(files.len(), 1);
    assert_eq!(files[0], dir.path().join("Main.jack"));

    for path in &files {
        compile_file(path).unwrap_or_else(|(d, _)| panic!("{}", d.message));
    }
    assert!(!sub.join("Nested.vm").exists());
}

#[test]
fn test_empty_class_body_emits_nothing() {
    let vm = compile_source("class Nothing { }", 0).unwrap();
    assert_eq!(vm, "");
}

#[test]
fn test_every_function_header_matches_var_count() {
    let vm = compile_source(
        "class A { function void f() { var int a; var int b; var int c; return; } }",
        0,
    )
    .unwrap();
    assert!(vm.starts_with("function A.f 3\n"));
}

#[test]
fn test_void_return_is_preceded_by_push_constant_zero() {
    let vm = compile_source("class A { function void f() { return; } }", 0).unwrap();
    assert_eq!(vm, "function A.f 0\npush constant 0\nreturn\n");
}

#[test]
fn test_call_argument_count_includes_pushed_receiver() {
    let vm = compile_source(
        "class A { method void run() { do helper(1, 2); return; } }",
        0,
    )
    .unwrap();
    // 2 explicit args + the implicit pushed receiver (pointer 0) = 3.
    assert!(vm.contains("call A.helper 3"));
}

#[test]
fn test_lexical_error_reported_with_span() {
    let err = compile_source("class A { @ }", 0).unwrap_err();
    assert!(err.message.contains("unknown token"));
}

#[test]
fn test_undeclared_identifier_is_fatal() {
    let err = compile_source(
        "class A { function void f() { let missing = 1; return; } }",
        0,
    )
    .unwrap_err();
    assert!(err.message.contains("undeclared identifier"));
}
