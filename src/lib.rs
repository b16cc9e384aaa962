//! # `lice` Compiler Crate
//!
//! A single-pass compiler for a subset of C90/C99, emitting AT&T-syntax
//! x86-64 assembly. This crate exposes the pipeline the `lice` binary
//! drives: [`compiler::parse`] builds a typed AST while checking it for
//! semantic errors, [`codegen::generate`] lowers that AST to assembly text,
//! and [`compiler::ast_dump::dump_program`] renders it as an s-expression
//! for inspection instead.

/// Typed AST node and type descriptor definitions.
pub mod ast;
/// Lowers a parsed [`ast::nodes::Program`] to x86-64 AT&T assembly.
pub mod codegen;
/// Lexing, parsing, semantic checking, and the AST dumper.
pub mod compiler;
/// Environment-gated debug logging and phase timing.
pub mod debug;

pub use compiler::error::CompileError;
pub use compiler::{Mode, parse};

/// Runs the full pipeline over `source`, returning either generated
/// assembly text or an AST dump, per `mode`.
pub fn compile(source: &str, mode: Mode) -> Result<String, CompileError> {
    compiler::run(source, mode)
}
