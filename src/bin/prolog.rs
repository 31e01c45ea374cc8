//! CLI entry point (§6.3): `prolog <program-file>` compiles the program once
//! and enters the REPL. With no arguments, print usage and exit 0 rather than
//! treating it as an argument error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// A compiler and abstract-machine interpreter for a minimal pure-Prolog subset.
#[derive(Parser, Debug)]
#[command(name = "prolog", about, version)]
struct Cli {
    /// Source file of facts, rules and (optionally) an initial set of clauses to load.
    program_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(program_file) = cli.program_file else {
        print_usage();
        return ExitCode::SUCCESS;
    };

    match prolog_vm::repl::run(&program_file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    println!("usage: prolog <program-file>");
}
