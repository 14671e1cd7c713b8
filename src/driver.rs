//! Command line front end. Runs the pipeline up to the requested stage
//! and hands finished assembly to the system assembler.

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{bail, Context};
use clap::Parser;
use rmc_cfg::Cfg;
use rmc_ir::Ir;
use rmc_parser::lexer::Lexer;
use rmc_symbols::{run_checks, SymbolTable};

use crate::emit::EmitAsm;

/// Compiler for the mC language, targeting 32 bit x86.
#[derive(Debug, Parser)]
#[command(name = "rmc", version)]
pub struct Options {
    /// Source file to compile.
    pub input: PathBuf,

    /// Stop after lexing and print the tokens.
    #[arg(long, group = "stage")]
    pub lex: bool,

    /// Stop after parsing and print the syntax tree.
    #[arg(long, group = "stage")]
    pub parse: bool,

    /// Stop after the semantic checks.
    #[arg(long, group = "stage")]
    pub check: bool,

    /// Stop after IR generation and print the row table.
    #[arg(long, group = "stage")]
    pub ir: bool,

    /// Stop after splitting each function into basic blocks and print
    /// them.
    #[arg(long, group = "stage")]
    pub cfg: bool,

    /// Stop after assembly generation and print the instructions.
    #[arg(long, group = "stage")]
    pub codegen: bool,

    /// Write the assembly file instead of assembling it.
    #[arg(short = 'S', group = "stage")]
    pub assembly: bool,

    /// Where to place the binary, or the assembly file with -S.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Lex,
    Parse,
    Check,
    Ir,
    Cfg,
    Codegen,
    Assembly,
    #[default]
    Compile,
}

impl Options {
    fn stage(&self) -> Stage {
        if self.lex {
            Stage::Lex
        } else if self.parse {
            Stage::Parse
        } else if self.check {
            Stage::Check
        } else if self.ir {
            Stage::Ir
        } else if self.cfg {
            Stage::Cfg
        } else if self.codegen {
            Stage::Codegen
        } else if self.assembly {
            Stage::Assembly
        } else {
            Stage::Compile
        }
    }
}

pub fn run(options: &Options) -> anyhow::Result<()> {
    let stage = options.stage();
    let source = fs::read_to_string(&options.input)
        .with_context(|| format!("could not read {}", options.input.display()))?;

    if stage == Stage::Lex {
        for token in Lexer::new(source) {
            let token = token?;
            println!("{:?}", token.kind);
        }
        return Ok(());
    }

    let mut parser = rmc_parser::Parser::try_build(Lexer::new(source))?;
    let program = parser.parse_program()?;
    if stage == Stage::Parse {
        println!("{program:#?}");
        return Ok(());
    }

    let table = SymbolTable::build(&program)?;
    run_checks(&program, &table)?;
    if stage == Stage::Check {
        return Ok(());
    }

    let ir = rmc_irgen::generate(&program, &table)?;
    if stage == Stage::Ir {
        print!("{ir}");
        return Ok(());
    }

    if stage == Stage::Cfg {
        for start in ir.function_starts() {
            println!("{}:", ir.function_name(start).unwrap_or("?"));
            print!("{}", Cfg::build(&ir, start));
        }
        return Ok(());
    }

    let assembly = rmc_asmgen::generate(&ir)?;
    if stage == Stage::Codegen {
        println!("{assembly:#?}");
        return Ok(());
    }

    let assembly_file = match (&options.output, stage) {
        (Some(path), Stage::Assembly) => path.clone(),
        _ => options.input.with_extension("s"),
    };
    fs::write(&assembly_file, assembly.emit(0))
        .with_context(|| format!("could not write {}", assembly_file.display()))?;
    if stage == Stage::Assembly {
        return Ok(());
    }

    let output_file = options
        .output
        .clone()
        .unwrap_or_else(|| options.input.with_extension(""));
    assemble(&assembly_file, &output_file)?;

    if let Err(err) = fs::remove_file(&assembly_file) {
        log::warn!("could not remove {}: {err}", assembly_file.display());
    }

    Ok(())
}

/// Runs the pipeline on `source` up to IR generation and returns the
/// row stream.
pub fn compile_to_ir(source: &str) -> anyhow::Result<Ir> {
    let mut parser = rmc_parser::Parser::try_build(Lexer::new(source.to_owned()))?;
    let program = parser.parse_program()?;
    let table = SymbolTable::build(&program)?;
    run_checks(&program, &table)?;
    let ir = rmc_irgen::generate(&program, &table)?;

    Ok(ir)
}

/// Runs the pipeline on `source` and returns the finished assembly text.
pub fn compile_to_assembly(source: &str) -> anyhow::Result<String> {
    let ir = compile_to_ir(source)?;
    let assembly = rmc_asmgen::generate(&ir)?;

    Ok(assembly.emit(0))
}

fn assemble(assembly_file: &Path, output_file: &Path) -> anyhow::Result<()> {
    let status = Command::new("gcc")
        .arg("-m32")
        .arg(assembly_file)
        .arg("-o")
        .arg(output_file)
        .status()
        .context("could not start gcc")?;

    if !status.success() {
        bail!("gcc exited with {status}");
    }

    Ok(())
}
