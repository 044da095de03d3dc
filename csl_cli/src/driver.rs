//! The compilation pipeline: preprocess, parse, translate, emit, and
//! optionally invoke the native compiler on the emitted IR

use crate::preprocess::Preprocessor;
use anyhow::{bail, Context, Result};
use csl_ir::{translate, LlvmBackend, TranslateOptions};
use csl_parser::parse;
use log::{debug, info};
use std::fs;
use std::path::PathBuf;
use std::process::Command;

/// Name of the native compiler fed with the emitted IR
const NATIVE_COMPILER: &str = "clang";

pub struct CompileConfig {
    pub input: PathBuf,
    pub emit_llvm: bool,
    pub output: PathBuf,
    pub include: Vec<PathBuf>,
    pub lazy_bool: bool,
    pub native_args: Vec<String>,
}

pub fn run(config: &CompileConfig) -> Result<()> {
    let source = Preprocessor::new(&config.include).process(&config.input)?;
    debug!("preprocessed source: {} bytes", source.len());

    let ast = parse(&source)?;
    debug!("parsed {} top-level nodes", ast.children.len());

    let options = TranslateOptions { lazy_bool: config.lazy_bool, ..TranslateOptions::default() };
    let module = translate(&ast, options)?;
    debug!(
        "translated {} globals, {} functions",
        module.globals.len(),
        module.functions.len()
    );

    let ll_path = config.input.with_extension("ll");
    let mut out = fs::File::create(&ll_path)
        .with_context(|| format!("cannot create {}", ll_path.display()))?;
    if let Err(err) = LlvmBackend::new(&module).write(&mut out) {
        drop(out);
        let _ = fs::remove_file(&ll_path);
        return Err(err.into());
    }
    info!("wrote {}", ll_path.display());

    if config.emit_llvm {
        return Ok(());
    }

    let status = Command::new(NATIVE_COMPILER)
        .arg(&ll_path)
        .arg("-o")
        .arg(&config.output)
        .args(&config.native_args)
        .status()
        .with_context(|| format!("failed to run {}", NATIVE_COMPILER))?;
    let _ = fs::remove_file(&ll_path);
    if !status.success() {
        bail!("{} exited with {}", NATIVE_COMPILER, status);
    }
    info!("wrote {}", config.output.display());
    Ok(())
}
