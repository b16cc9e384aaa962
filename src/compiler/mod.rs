//! # Compiler Module
//!
//! Aggregates the lexer, fused parser/semantics, AST dumper, and code
//! generator, and exposes the single-pass pipeline the `lice` binary drives:
//! read a translation unit, parse it, and either dump its AST or lower it
//! straight to assembly text. There is no separate analysis pass or
//! assembler/linker invocation — `parser::parse` performs semantic checking
//! as it builds the typed AST, and this crate's job ends at emitting `.s`
//! text.

pub mod ast_dump;
pub mod constant;
pub mod error;
pub mod lexer;
pub mod parser;

pub use error::CompileError;
pub use parser::parse;

use crate::ast::nodes::Program;
use crate::codegen;

/// What the driver should do with a successfully parsed [`Program`].
pub enum Mode {
    /// Lower straight to assembly text.
    Compile,
    /// Print a parenthesised s-expression dump of the AST instead of
    /// generating code.
    DumpAst,
}

/// Runs the full pipeline over `source`, returning the text that should be
/// written to standard output.
pub fn run(source: &str, mode: Mode) -> Result<String, CompileError> {
    crate::debug::log_compiler(&format!("parsing {} bytes of input", source.len()));
    let timer = crate::debug::PerfTimer::new("parse");
    let program: Program = parse(source)?;
    timer.finish();

    match mode {
        Mode::DumpAst => Ok(ast_dump::dump_program(&program)),
        Mode::Compile => {
            let timer = crate::debug::PerfTimer::new("codegen");
            let asm = codegen::generate(&program)?;
            timer.finish();
            Ok(asm)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_trivial_program_to_assembly() {
        let asm = run("int main(void) { return 0; }", Mode::Compile).unwrap();
        assert!(asm.contains("main:"));
    }

    #[test]
    fn dumps_the_ast_instead_of_assembly() {
        let dump = run("int main(void) { return 0; }", Mode::DumpAst).unwrap();
        assert!(dump.starts_with("(function main"));
    }

    #[test]
    fn propagates_a_syntax_error() {
        let result = run("int main(void) { return 0", Mode::Compile);
        assert!(matches!(result, Err(CompileError::SyntaxError { .. })));
    }
}
