//! End-to-end pipeline tests: preprocessed multi-file input down to
//! textual LLVM IR

use csl_cli::preprocess::Preprocessor;
use csl_ir::{translate, LlvmBackend, TranslateOptions};
use csl_parser::parse;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

fn compile_files(entry: &Path, include: &[PathBuf]) -> String {
    let source = Preprocessor::new(include).process(entry).expect("preprocess");
    let ast = parse(&source).expect("parse");
    let module = translate(&ast, TranslateOptions::default()).expect("translate");
    LlvmBackend::new(&module).emit_to_string().expect("emit")
}

#[test]
fn test_multi_file_program() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "limits.csl",
        "int limit = 10; /* shared bound */\n",
    );
    let main = write_file(
        dir.path(),
        "main.csl",
        "#include \"limits.csl\"\n\
         // sum everything below the shared bound\n\
         def main(): int {\n\
             int s = 0;\n\
             for (int i = 0; i < limit; i = i + 1) { s += i; }\n\
             return s;\n\
         }\n",
    );

    let out = compile_files(&main, &[dir.path().to_path_buf()]);
    assert!(out.starts_with("@limit = global i32 10\n"), "{}", out);
    assert!(out.contains("define i32 @main() {"), "{}", out);
    assert!(out.contains("load i32, i32* @limit"), "{}", out);
    assert!(out.ends_with("}\n"), "{}", out);
}

#[test]
fn test_include_is_transitive_and_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "base.csl", "int base;\n");
    write_file(dir.path(), "mid.csl", "#include \"base.csl\"\nint mid;\n");
    let main = write_file(
        dir.path(),
        "main.csl",
        "#include \"mid.csl\"\n#include \"base.csl\"\ndef main(): int { return base + mid; }\n",
    );

    let out = compile_files(&main, &[dir.path().to_path_buf()]);
    assert_eq!(out.matches("@base = global").count(), 1, "{}", out);
    assert_eq!(out.matches("@mid = global").count(), 1, "{}", out);
}

#[test]
fn test_compile_error_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let main = write_file(dir.path(), "main.csl", "def f() { break; }\n");
    let source = Preprocessor::new(&[]).process(&main).unwrap();
    let ast = parse(&source).unwrap();
    let err = translate(&ast, TranslateOptions::default()).unwrap_err();
    assert!(err.to_string().contains("'break' must be inside loop"), "{}", err);
}
