//! # Code Generation Module
//!
//! Orchestrates translation of a parsed [`Program`] into a single AT&T-syntax
//! x86-64 assembly listing: a `.text` section holding one prologue/body/
//! epilogue per function definition, followed by the `.data`/`.bss`/
//! `.rodata` image for globals, string literals, and floating-point
//! constants.
//!
//! Per-function frame layout and statement/expression lowering are handled
//! by the submodules; this module only sequences them and emits the System
//! V prologue that spills incoming register arguments to their stack slots.

pub mod common;
pub mod data_section;
pub mod expression_generator;
pub mod statement_generator;

use std::rc::Rc;

use crate::ast::nodes::{FunctionDef, Program, TopLevel};
use crate::ast::types::TypeKind;
use crate::codegen::common::{CodeGen, INT_ARG_REGS, INT_ARG_REGS_8, INT_ARG_REGS_16, INT_ARG_REGS_32, is_float_class, layout_frame};
use crate::codegen::statement_generator::StatementGenerator;
use crate::compiler::error::CompileError;

/// Lowers an entire translation unit to assembly text.
pub fn generate(program: &Program) -> Result<String, CompileError> {
    let mut cg = CodeGen::new();
    cg.emit_raw(".text");

    for item in &program.items {
        if let TopLevel::Function(f) = item {
            generate_function(&mut cg, f);
        }
    }

    let data = data_section::generate_data_section(&program.items, &program.strings, &program.floats)?;

    let mut out = cg.out;
    out.push_str(&data);
    Ok(out)
}

fn generate_function(cg: &mut CodeGen, f: &Rc<FunctionDef>) {
    let frame_size = layout_frame(&f.locals.borrow());

    if !f.is_static {
        cg.emit_raw(format!(".global {}", f.name));
    }
    cg.emit_label(&f.name);
    cg.emit("pushq %rbp");
    cg.emit("movq %rsp, %rbp");
    if frame_size > 0 {
        cg.emit(format!("subq ${frame_size}, %rsp"));
    }

    spill_params(cg, f);

    StatementGenerator::gen_stmt(cg, &f.body);

    // A function whose body doesn't end in an explicit `return` still
    // needs an epilogue; a preceding `return` already emitted its own
    // `leave`/`ret` pair, so this one is simply unreachable in that case.
    cg.emit("leave");
    cg.emit("ret");
}

/// Moves each parameter out of its incoming System V register into its
/// stack slot. The parser rejects any parameter list or call with more
/// than six arguments (`declarations.rs::parse_param_list_named`,
/// `expression_parser.rs::parse_call`), so at most six integer-class and
/// six floating-class parameters ever reach this function; the `< 6` /
/// `< 8` guards below are just defense against that invariant.
fn spill_params(cg: &mut CodeGen, f: &Rc<FunctionDef>) {
    let mut int_idx = 0usize;
    let mut float_idx = 0usize;

    for param in &f.params {
        let offset = param.offset.get();
        if is_float_class(&param.ty) {
            if float_idx < 8 {
                let mov = if param.ty.borrow().kind == TypeKind::Float { "movss" } else { "movsd" };
                cg.emit(format!("{mov} %xmm{float_idx}, {offset}(%rbp)"));
            }
            float_idx += 1;
        } else {
            if int_idx < 6 {
                let size = param.ty.borrow().size;
                let (reg, mov) = match size {
                    1 => (INT_ARG_REGS_8[int_idx], "movb"),
                    2 => (INT_ARG_REGS_16[int_idx], "movw"),
                    4 => (INT_ARG_REGS_32[int_idx], "movl"),
                    _ => (INT_ARG_REGS[int_idx], "movq"),
                };
                cg.emit(format!("{mov} {reg}, {offset}(%rbp)"));
            }
            int_idx += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> String {
        let program = crate::compiler::parser::parse(source).expect("parse failed");
        generate(&program).expect("codegen failed")
    }

    #[test]
    fn emits_a_global_label_and_leave_ret_epilogue() {
        let asm = compile("int add(int a, int b) { return a + b; }");
        assert!(asm.contains(".global add"));
        assert!(asm.contains("add:"));
        assert!(asm.contains("addq %rcx, %rax"));
        assert!(asm.contains("leave"));
        assert!(asm.contains("ret"));
    }

    #[test]
    fn spills_integer_parameters_to_the_stack() {
        let asm = compile("int add(int a, int b) { return a + b; }");
        assert!(asm.contains("movl %edi,"));
        assert!(asm.contains("movl %esi,"));
    }

    #[test]
    fn static_function_has_no_globl_directive() {
        let asm = compile("static int helper(void) { return 1; }");
        assert!(!asm.contains(".global helper"));
        assert!(asm.contains("helper:"));
    }

    #[test]
    fn emits_a_data_section_for_an_initialised_global() {
        let asm = compile("int counter = 42;\nint main(void) { return counter; }");
        assert!(asm.contains(".data"));
        assert!(asm.contains("counter:"));
        assert!(asm.contains(".long 42"));
    }

    #[test]
    fn switch_dispatch_precedes_the_case_bodies() {
        let asm = compile(
            "int classify(int x) { switch (x) { case 1: return 10; case 2: return 20; default: return 0; } }",
        );
        let dispatch_pos = asm.find("cmpq $1, %rax").expect("dispatch chain missing");
        let case_pos = asm.find("movq $10, %rax").expect("case body missing");
        assert!(dispatch_pos < case_pos, "dispatch chain must precede case bodies");
    }
}
