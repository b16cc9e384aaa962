//! # AST Dump
//!
//! Renders a parsed [`Program`] as a parenthesised s-expression, one form
//! per top-level item, for the `--dump-ast` driver mode. The format is not
//! meant to be re-parsed; it only has to be deterministic.

use std::fmt::Write as _;

use crate::ast::nodes::{BinOp, Expr, ExprKind, IncDec, Program, Stmt, TopLevel, UnaryOp};
use crate::ast::types::{Type, TypeKind};

pub fn dump_program(program: &Program) -> String {
    let mut out = String::new();
    for item in &program.items {
        dump_top_level(&mut out, item);
        out.push('\n');
    }
    out
}

fn dump_top_level(out: &mut String, item: &TopLevel) {
    match item {
        TopLevel::Function(f) => {
            write!(out, "(function {} (", f.name).unwrap();
            for (i, p) in f.params.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write!(out, "({} {})", p.name, type_name(&p.ty.borrow())).unwrap();
            }
            out.push_str(") ");
            dump_stmt(out, &f.body);
            out.push(')');
        }
        TopLevel::GlobalVar { var, init } => {
            write!(out, "(global {} {}", var.name, type_name(&var.ty.borrow())).unwrap();
            for elem in init {
                out.push(' ');
                write!(out, "(init {} ", elem.offset).unwrap();
                dump_expr(out, &elem.value);
                out.push(')');
            }
            out.push(')');
        }
    }
}

fn dump_stmt(out: &mut String, stmt: &Stmt) {
    match stmt {
        Stmt::Expr(e) => {
            out.push_str("(expr ");
            dump_expr(out, e);
            out.push(')');
        }
        Stmt::Decl { var, init } => {
            write!(out, "(decl {} {}", var.name, type_name(&var.ty.borrow())).unwrap();
            for elem in init {
                out.push(' ');
                write!(out, "(init {} ", elem.offset).unwrap();
                dump_expr(out, &elem.value);
                out.push(')');
            }
            out.push(')');
        }
        Stmt::Compound(stmts) => {
            out.push_str("(block");
            for s in stmts {
                out.push(' ');
                dump_stmt(out, s);
            }
            out.push(')');
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        } => {
            out.push_str("(if ");
            dump_expr(out, cond);
            out.push(' ');
            dump_stmt(out, then_branch);
            if let Some(e) = else_branch {
                out.push(' ');
                dump_stmt(out, e);
            }
            out.push(')');
        }
        Stmt::While { cond, body } => {
            out.push_str("(while ");
            dump_expr(out, cond);
            out.push(' ');
            dump_stmt(out, body);
            out.push(')');
        }
        Stmt::DoWhile { body, cond } => {
            out.push_str("(do-while ");
            dump_stmt(out, body);
            out.push(' ');
            dump_expr(out, cond);
            out.push(')');
        }
        Stmt::For {
            init,
            cond,
            step,
            body,
        } => {
            out.push_str("(for ");
            match init {
                Some(s) => dump_stmt(out, s),
                None => out.push_str("()"),
            }
            out.push(' ');
            match cond {
                Some(e) => dump_expr(out, e),
                None => out.push_str("()"),
            }
            out.push(' ');
            match step {
                Some(e) => dump_expr(out, e),
                None => out.push_str("()"),
            }
            out.push(' ');
            dump_stmt(out, body);
            out.push(')');
        }
        Stmt::Switch { selector, body } => {
            out.push_str("(switch ");
            dump_expr(out, selector);
            out.push(' ');
            dump_stmt(out, body);
            out.push(')');
        }
        Stmt::Case(v) => {
            write!(out, "(case {v})").unwrap();
        }
        Stmt::Default => out.push_str("(default)"),
        Stmt::Break => out.push_str("(break)"),
        Stmt::Continue => out.push_str("(continue)"),
        Stmt::Return(e) => {
            out.push_str("(return");
            if let Some(e) = e {
                out.push(' ');
                dump_expr(out, e);
            }
            out.push(')');
        }
        Stmt::Goto(target) => {
            write!(out, "(goto {})", target.name).unwrap();
        }
        Stmt::Label(label) => {
            write!(out, "(label {label})").unwrap();
        }
        Stmt::Empty => out.push_str("(empty)"),
    }
}

fn dump_expr(out: &mut String, expr: &Expr) {
    match &expr.kind {
        ExprKind::IntLit(v) => {
            write!(out, "{v}").unwrap();
        }
        ExprKind::FloatLit(lit) => {
            write!(out, "{}", lit.value).unwrap();
        }
        ExprKind::StringLit(lit) => {
            write!(out, "(str {})", lit.label).unwrap();
        }
        ExprKind::LocalVar(v) | ExprKind::GlobalVar(v) => {
            out.push_str(&v.name);
        }
        ExprKind::Call {
            name,
            args,
            is_vararg,
            ..
        } => {
            write!(out, "(call {name}{}", if *is_vararg { "..." } else { "" }).unwrap();
            for a in args {
                out.push(' ');
                dump_expr(out, a);
            }
            out.push(')');
        }
        ExprKind::AddrOf(inner) => {
            out.push_str("(addr-of ");
            dump_expr(out, inner);
            out.push(')');
        }
        ExprKind::Deref(inner) => {
            out.push_str("(deref ");
            dump_expr(out, inner);
            out.push(')');
        }
        ExprKind::Field { target, offset } => {
            write!(out, "(field {offset} ").unwrap();
            dump_expr(out, target);
            out.push(')');
        }
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            out.push_str("(ternary ");
            dump_expr(out, cond);
            out.push(' ');
            dump_expr(out, then_expr);
            out.push(' ');
            dump_expr(out, else_expr);
            out.push(')');
        }
        ExprKind::Cast(inner) => {
            write!(out, "(cast {} ", type_name(&expr.ty.borrow())).unwrap();
            dump_expr(out, inner);
            out.push(')');
        }
        ExprKind::IncDec { op, target } => {
            let name = match op {
                IncDec::PreInc => "pre-inc",
                IncDec::PreDec => "pre-dec",
                IncDec::PostInc => "post-inc",
                IncDec::PostDec => "post-dec",
            };
            write!(out, "({name} ").unwrap();
            dump_expr(out, target);
            out.push(')');
        }
        ExprKind::Unary { op, operand } => {
            let name = match op {
                UnaryOp::Neg => "neg",
                UnaryOp::Pos => "pos",
                UnaryOp::Not => "not",
                UnaryOp::BitNot => "bnot",
            };
            write!(out, "({name} ").unwrap();
            dump_expr(out, operand);
            out.push(')');
        }
        ExprKind::Binary { op, lhs, rhs } => {
            write!(out, "({} ", bin_op_name(*op)).unwrap();
            dump_expr(out, lhs);
            out.push(' ');
            dump_expr(out, rhs);
            out.push(')');
        }
        ExprKind::Assign { lhs, rhs } => {
            out.push_str("(assign ");
            dump_expr(out, lhs);
            out.push(' ');
            dump_expr(out, rhs);
            out.push(')');
        }
        ExprKind::CompoundAssign { op, lhs, rhs } => {
            write!(out, "({}-assign ", bin_op_name(*op)).unwrap();
            dump_expr(out, lhs);
            out.push(' ');
            dump_expr(out, rhs);
            out.push(')');
        }
    }
}

fn bin_op_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
        BinOp::Mod => "mod",
        BinOp::Shl => "shl",
        BinOp::Shr => "shr",
        BinOp::BitAnd => "band",
        BinOp::BitOr => "bor",
        BinOp::BitXor => "bxor",
        BinOp::Eq => "eq",
        BinOp::Ne => "ne",
        BinOp::Lt => "lt",
        BinOp::Gt => "gt",
        BinOp::Le => "le",
        BinOp::Ge => "ge",
        BinOp::LogAnd => "and",
        BinOp::LogOr => "or",
    }
}

fn type_name(t: &Type) -> String {
    match t.kind {
        TypeKind::Void => "void".to_string(),
        TypeKind::Char => if t.is_unsigned { "uchar" } else { "char" }.to_string(),
        TypeKind::Short => if t.is_unsigned { "ushort" } else { "short" }.to_string(),
        TypeKind::Int => if t.is_unsigned { "uint" } else { "int" }.to_string(),
        TypeKind::Long => if t.is_unsigned { "ulong" } else { "long" }.to_string(),
        TypeKind::LLong => if t.is_unsigned { "ullong" } else { "llong" }.to_string(),
        TypeKind::Float => "float".to_string(),
        TypeKind::Double => "double".to_string(),
        TypeKind::LDouble => "ldouble".to_string(),
        TypeKind::Pointer => format!("(ptr {})", type_name(&t.pointee.as_ref().unwrap().borrow())),
        TypeKind::Array => format!("(array {} {})", t.length, type_name(&t.pointee.as_ref().unwrap().borrow())),
        TypeKind::Structure => {
            let kw = if t.is_struct { "struct" } else { "union" };
            format!("({kw} {})", t.tag.as_deref().unwrap_or("<anon>"))
        }
        TypeKind::Function => "function".to_string(),
        TypeKind::Stub => format!("(stub {})", t.tag.as_deref().unwrap_or("")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::parse;

    #[test]
    fn dumps_a_function_with_a_return_statement() {
        let program = parse("int main(void) { return 0; }").unwrap();
        let dump = dump_program(&program);
        assert!(dump.starts_with("(function main ()"));
        assert!(dump.contains("(return 0)"));
    }

    #[test]
    fn dump_is_byte_identical_across_runs() {
        let program = parse("int x = 1 + 2;").unwrap();
        assert_eq!(dump_program(&program), dump_program(&program));
    }
}
