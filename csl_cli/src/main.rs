//! CSL compiler command-line interface
//!
//! Preprocesses and compiles a CSL source file to textual LLVM IR, then
//! hands the result to the system's native compiler unless asked to stop
//! at the IR.

use anyhow::Result;
use clap::Parser;
use csl_cli::driver;
use std::path::PathBuf;

/// The CSL compiler
#[derive(Parser)]
#[command(name = "cslc")]
#[command(about = "Compiler for the CSL language, emitting LLVM IR")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Input source file
    input: PathBuf,

    /// Stop after writing the .ll file and keep it
    #[arg(long)]
    emit_llvm: bool,

    /// Native output path
    #[arg(short, long, default_value = "a.out")]
    output: PathBuf,

    /// Additional include search paths
    #[arg(short = 'I', long = "include", value_name = "PATH")]
    include: Vec<PathBuf>,

    /// Lower `and`/`or` with short-circuit evaluation
    #[arg(long)]
    lazy_bool: bool,

    /// Arguments forwarded to the native compiler
    #[arg(last = true)]
    native_args: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        eprintln!("cslc: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = driver::CompileConfig {
        input: cli.input.clone(),
        emit_llvm: cli.emit_llvm,
        output: cli.output.clone(),
        include: cli.include.clone(),
        lazy_bool: cli.lazy_bool,
        native_args: cli.native_args.clone(),
    };
    driver::run(&config)
}
