use std::fs;
use std::path::{Path, PathBuf};

use crate::compiler::CompilationEngine;
use crate::diagnostic::Diagnostic;
use crate::tokenizer::Tokenizer;

/// The outcome of compiling one source file.
pub struct CompiledFile {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
}

/// Compiles Jack source text into VM text. Tokenization errors are
/// reported first; if any exist, compilation never starts (the tokenizer
/// and engine each halt on their first error, per this compiler's
/// fatal-only policy).
pub fn compile_source(source: &str, file_id: u16) -> Result<String, Diagnostic> {
    let (tokenizer, mut diagnostics) = Tokenizer::new(source, file_id);
    if let Some(first) = diagnostics.drain(..).next() {
        return Err(first);
    }
    CompilationEngine::new(tokenizer).compile_class()
}

/// Compiles a single `.jack` file in place, writing the sibling `.vm`
/// file. Returns the diagnostic rendered against the source on failure.
pub fn compile_file(path: &Path) -> Result<CompiledFile, (Diagnostic, String)> {
    let source = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error: cannot read '{}': {}", path.display(), e);
        std::process::exit(1);
    });

    match compile_source(&source, 0) {
        Ok(vm) => {
            let output_path = path.with_extension("vm");
            if let Err(e) = fs::write(&output_path, vm) {
                eprintln!("error: cannot write '{}': {}", output_path.display(), e);
                std::process::exit(1);
            }
            Ok(CompiledFile {
                source_path: path.to_path_buf(),
                output_path,
            })
        }
        Err(diag) => Err((diag, source)),
    }
}

/// Resolves the CLI's single positional argument into the list of
/// `.jack` files to compile: the path itself if it names a file
/// (regardless of extension), or every case-insensitively `.jack` file
/// that is a direct child of it if it names a directory. Subdirectories
/// are not descended into.
pub fn resolve_jack_files(input: &Path) -> Vec<PathBuf> {
    if input.is_dir() {
        collect_jack_files(input)
    } else if input.is_file() {
        vec![input.to_path_buf()]
    } else {
        eprintln!(
            "error: '{}' is not a file or directory",
            input.display()
        );
        std::process::exit(1);
    }
}

fn collect_jack_files(dir: &Path) -> Vec<PathBuf> {
    let mut result = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return result,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file()
            && path
                .extension()
                .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case("jack"))
        {
            result.push(path);
        }
    }
    result.sort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_compile_source_simple() {
        let vm = compile_source("class A { function int seven() { return 7; } }", 0).unwrap();
        assert_eq!(vm, "function A.seven 0\npush constant 7\nreturn\n");
    }

    #[test]
    fn test_compile_source_lex_error_short_circuits() {
        let err = compile_source("class A { @ }", 0).unwrap_err();
        assert!(err.message.contains("unknown token"));
    }

    #[test]
    fn test_compile_source_parse_error() {
        let err = compile_source("class A { function void f( ", 0).unwrap_err();
        assert!(err.message.contains("expected"));
    }

    #[test]
    fn test_collect_jack_files_case_insensitive_and_sorted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Zeta.JACK"), "class Zeta {}").unwrap();
        fs::write(dir.path().join("Alpha.jack"), "class Alpha {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let files = resolve_jack_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["Alpha.jack", "Zeta.JACK"]);
    }

    #[test]
    fn test_collect_jack_files_does_not_descend_into_subdirectories() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Main.jack"), "class Main {}").unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("Foo.jack"), "class Foo {}").unwrap();

        let files = resolve_jack_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["Main.jack"]);
    }

    #[test]
    fn test_resolve_single_file_regardless_of_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Main.weird");
        fs::write(&path, "class Main {}").unwrap();
        let files = resolve_jack_files(&path);
        assert_eq!(files, vec![path]);
    }

    #[test]
    fn test_compile_file_writes_sibling_vm() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Main.jack");
        fs::write(&path, "class Main { function void main() { return; } }").unwrap();

        let result = compile_file(&path).unwrap_or_else(|(d, _)| panic!("{}", d.message));
        assert_eq!(result.output_path, dir.path().join("Main.vm"));
        let vm = fs::read_to_string(&result.output_path).unwrap();
        assert_eq!(vm, "function Main.main 0\npush constant 0\nreturn\n");
    }
}
