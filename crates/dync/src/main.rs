//! `dync` — command-line front end for the dynamo driver compiler.
//!
//! Loads a driver specification, compiles every driver it names, and
//! emits either generated C source or a pretty-printed AST.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::{debug, LevelFilter};

use dynamo_core::visitors::{AstPrinter, CGenerator};
use dynamo_core::{Compiler, SpecsFile};

/// Compiler for the dynamo hardware-driver DSL.
#[derive(Parser)]
#[command(name = "dync", version, about)]
struct Cli {
    /// Path to the driver specification file.
    specs: PathBuf,

    /// Write the generated output to this file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// What to emit.
    #[arg(long, value_enum, default_value_t = Emit::C)]
    emit: Emit,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Emit {
    /// Generated C source.
    C,
    /// Pretty-printed AST.
    Ast,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .init();

    let specs = SpecsFile::load(&cli.specs)
        .with_context(|| format!("failed to load specification {}", cli.specs.display()))?;
    let compiler = Compiler::new(specs);

    let output = match cli.emit {
        Emit::C => {
            let mut generator = CGenerator::new();
            compiler.compile(&mut generator)?;
            generator.source()
        }
        Emit::Ast => {
            let mut printer = AstPrinter::new();
            compiler.compile(&mut printer)?;
            printer.into_output()
        }
    };

    match &cli.output {
        Some(path) => {
            fs::write(path, &output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            debug!("wrote {} bytes to {}", output.len(), path.display());
        }
        None => print!("{output}"),
    }

    Ok(())
}
