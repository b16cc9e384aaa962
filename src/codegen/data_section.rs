//! # Static Data Emission
//!
//! Emits the `.data`/`.bss` image for global variables (including static
//! locals, which share the same `TopLevel::GlobalVar`-shaped storage), the
//! `.rodata` string pool, and the bit patterns backing floating-point
//! literals. Global initialisers are limited to the forms a linker can
//! actually resolve at load time: integer constants, `&`-of another global
//! (optionally offset by a field/array constant), and string/float literal
//! addresses.

use crate::ast::nodes::{Expr, ExprKind, FloatLit, StringLit, TopLevel, UnaryOp, Var};
use crate::compiler::error::CompileError;

/// A static initialiser reduced to either a plain constant or a
/// symbol-plus-addend relocation.
enum StaticOperand {
    Int(i64),
    Symbol { label: String, addend: i64 },
}

pub fn generate_data_section(items: &[TopLevel], strings: &[std::rc::Rc<StringLit>], floats: &[std::rc::Rc<FloatLit>]) -> Result<String, CompileError> {
    let mut out = String::new();

    emit_globals(&mut out, items)?;
    emit_strings(&mut out, strings);
    emit_floats(&mut out, floats);

    Ok(out)
}

fn emit_globals(out: &mut String, items: &[TopLevel]) -> Result<(), CompileError> {
    for item in items {
        let TopLevel::GlobalVar { var, init } = item else {
            continue;
        };
        // A static local's unique generated label lives in `var.label`
        // alongside ordinary file-scope globals, so both are emitted here.
        let label = var.label.borrow().clone().unwrap_or_else(|| var.name.clone());
        let size = var.ty.borrow().size.max(1);

        if init.is_empty() {
            // `.lcomm` both reserves the space and defines the symbol; no
            // section switch or explicit alignment directive is needed.
            out.push_str(&format!(".lcomm {label}, {size}\n"));
            continue;
        }

        out.push_str(".data\n");
        if !var.is_static {
            out.push_str(&format!(".global {label}\n"));
        }
        out.push_str(&format!(".align {}\n", var.ty.borrow().align()));
        out.push_str(&format!("{label}:\n"));

        let mut cursor = 0i64;
        for elem in init {
            if elem.offset > cursor {
                out.push_str(&format!(".zero {}\n", elem.offset - cursor));
            }
            emit_init_elem(out, &elem.ty, &elem.value)?;
            cursor = elem.offset + elem.ty.borrow().size;
        }
        if size > cursor {
            out.push_str(&format!(".zero {}\n", size - cursor));
        }
    }
    Ok(())
}

fn emit_init_elem(out: &mut String, ty: &crate::ast::types::TypeRef, value: &Expr) -> Result<(), CompileError> {
    let kind = ty.borrow().kind;
    if kind.is_floating() {
        let ExprKind::FloatLit(lit) = &value.kind else {
            return Err(CompileError::semantic("static floating initialiser must be a constant"));
        };
        if lit.is_float {
            out.push_str(&format!(".long {}\n", (lit.value as f32).to_bits()));
        } else {
            out.push_str(&format!(".quad {}\n", lit.value.to_bits()));
        }
        return Ok(());
    }

    let operand = eval_static(value)?;
    let directive = match ty.borrow().size {
        1 => ".byte",
        2 => ".word",
        4 => ".long",
        _ => ".quad",
    };
    match operand {
        StaticOperand::Int(v) => out.push_str(&format!("{directive} {v}\n")),
        StaticOperand::Symbol { label, addend } => {
            if addend == 0 {
                out.push_str(&format!("{directive} {label}\n"));
            } else {
                out.push_str(&format!("{directive} {label}+{addend}\n"));
            }
        }
    }
    Ok(())
}

fn eval_static(expr: &Expr) -> Result<StaticOperand, CompileError> {
    match &expr.kind {
        ExprKind::IntLit(v) => Ok(StaticOperand::Int(*v)),
        ExprKind::Cast(inner) => eval_static(inner),
        ExprKind::Unary { op, operand } => {
            let inner = eval_static(operand)?;
            match (op, inner) {
                (UnaryOp::Pos, v) => Ok(v),
                (UnaryOp::Neg, StaticOperand::Int(v)) => Ok(StaticOperand::Int(-v)),
                (UnaryOp::BitNot, StaticOperand::Int(v)) => Ok(StaticOperand::Int(!v)),
                _ => Err(CompileError::semantic("expression is not a valid static initialiser")),
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            use crate::ast::nodes::BinOp;
            let (l, r) = (eval_static(lhs)?, eval_static(rhs)?);
            match (op, l, r) {
                (BinOp::Add, StaticOperand::Symbol { label, addend }, StaticOperand::Int(v))
                | (BinOp::Add, StaticOperand::Int(v), StaticOperand::Symbol { label, addend }) => {
                    Ok(StaticOperand::Symbol { label, addend: addend + v })
                }
                (BinOp::Sub, StaticOperand::Symbol { label, addend }, StaticOperand::Int(v)) => {
                    Ok(StaticOperand::Symbol { label, addend: addend - v })
                }
                (BinOp::Add, StaticOperand::Int(a), StaticOperand::Int(b)) => Ok(StaticOperand::Int(a + b)),
                (BinOp::Sub, StaticOperand::Int(a), StaticOperand::Int(b)) => Ok(StaticOperand::Int(a - b)),
                (BinOp::Mul, StaticOperand::Int(a), StaticOperand::Int(b)) => Ok(StaticOperand::Int(a * b)),
                _ => Err(CompileError::semantic("expression is not a valid static initialiser")),
            }
        }
        ExprKind::AddrOf(inner) => addr_of_static(inner),
        ExprKind::StringLit(lit) => Ok(StaticOperand::Symbol { label: lit.label.clone(), addend: 0 }),
        ExprKind::GlobalVar(var) => var
            .const_value
            .get()
            .map(StaticOperand::Int)
            .ok_or_else(|| CompileError::semantic(format!("'{}' is not a compile-time constant", var.name))),
        _ => Err(CompileError::semantic("expression is not a valid static initialiser")),
    }
}

fn addr_of_static(expr: &Expr) -> Result<StaticOperand, CompileError> {
    match &expr.kind {
        ExprKind::GlobalVar(var) | ExprKind::LocalVar(var) => Ok(global_label(var)),
        ExprKind::Field { target, offset } => {
            let base = addr_of_static(target)?;
            match base {
                StaticOperand::Symbol { label, addend } => Ok(StaticOperand::Symbol { label, addend: addend + offset }),
                StaticOperand::Int(_) => Err(CompileError::semantic("cannot take address of a non-static value")),
            }
        }
        _ => Err(CompileError::semantic("address-of target is not statically known")),
    }
}

fn global_label(var: &std::rc::Rc<Var>) -> StaticOperand {
    let label = var.label.borrow().clone().unwrap_or_else(|| var.name.clone());
    StaticOperand::Symbol { label, addend: 0 }
}

fn emit_strings(out: &mut String, strings: &[std::rc::Rc<StringLit>]) {
    if strings.is_empty() {
        return;
    }
    out.push_str(".data\n");
    for lit in strings {
        out.push_str(&format!("{}:\n", lit.label));
        out.push_str(&format!(".string \"{}\"\n", escape_string(&lit.bytes)));
    }
}

/// Renders raw bytes as a GNU-as `.string`-quoted literal: printable ASCII
/// other than `"` and `\` passes through, everything else becomes a
/// 3-digit octal escape.
fn escape_string(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' => s.push_str("\\\""),
            b'\\' => s.push_str("\\\\"),
            0x20..=0x7e => s.push(b as char),
            _ => s.push_str(&format!("\\{:03o}", b)),
        }
    }
    s
}

fn emit_floats(out: &mut String, floats: &[std::rc::Rc<FloatLit>]) {
    if floats.is_empty() {
        return;
    }
    out.push_str(".data\n");
    for lit in floats {
        out.push_str(&format!(".align {}\n", if lit.is_float { 4 } else { 8 }));
        out.push_str(&format!("{}:\n", lit.label));
        if lit.is_float {
            out.push_str(&format!(".long {}\n", (lit.value as f32).to_bits()));
        } else {
            out.push_str(&format!(".quad {}\n", lit.value.to_bits()));
        }
    }
}
