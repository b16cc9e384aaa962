//! # `lice` Executable
//!
//! The command-line entry point: reads an entire C translation unit from
//! standard input, compiles it, and writes the result to standard output.
//! `--dump-ast` switches to printing a parenthesised s-expression dump of
//! the parsed program instead of generating assembly.

use std::io::{self, Read, Write};
use std::process;

use clap::{Arg, ArgAction, Command};

mod ast;
mod codegen;
mod compiler;
mod debug;

use compiler::Mode;

fn main() {
    let matches = Command::new("lice")
        .version("0.1.0")
        .about("a single-pass C subset compiler to x86-64 AT&T assembly")
        .arg(
            Arg::new("dump-ast")
                .long("dump-ast")
                .action(ArgAction::SetTrue)
                .help("print a parenthesised s-expression dump of the AST and exit"),
        )
        .get_matches();

    let mode = if matches.get_flag("dump-ast") {
        Mode::DumpAst
    } else {
        Mode::Compile
    };

    if let Err(e) = run(mode) {
        eprintln!("lice: {e}");
        process::exit(1);
    }
}

fn run(mode: Mode) -> Result<(), compiler::CompileError> {
    let mut source = String::new();
    io::stdin().read_to_string(&mut source)?;

    let output = compiler::run(&source, mode)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(output.as_bytes())?;
    Ok(())
}
