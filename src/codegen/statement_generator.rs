//! # Statement Code Generator
//!
//! Lowers a typed [`Stmt`] to AT&T-syntax x86-64. Loop and switch constructs
//! manage their break/continue/case labels through [`CodeGen`]'s stacks,
//! saved and restored around each nested construct so an inner loop's
//! `continue` doesn't leak into an outer one's.

use std::mem;

use crate::ast::nodes::{InitElem, Stmt, Var};
use crate::codegen::common::CodeGen;
use crate::codegen::common::SwitchContext;
use crate::codegen::expression_generator::ExpressionGenerator;

pub struct StatementGenerator;

impl StatementGenerator {
    pub fn gen_stmt(cg: &mut CodeGen, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => ExpressionGenerator::gen_expr(cg, e),
            Stmt::Decl { var, init } => Self::gen_decl(cg, var, init),
            Stmt::Compound(stmts) => {
                for s in stmts {
                    Self::gen_stmt(cg, s);
                }
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => Self::gen_if(cg, cond, then_branch, else_branch),
            Stmt::While { cond, body } => Self::gen_while(cg, cond, body),
            Stmt::DoWhile { body, cond } => Self::gen_do_while(cg, body, cond),
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => Self::gen_for(cg, init, cond, step, body),
            Stmt::Switch { selector, body } => Self::gen_switch(cg, selector, body),
            Stmt::Case(value) => {
                let label = cg.fresh_label();
                cg.switches
                    .last_mut()
                    .expect("internal error: case outside switch")
                    .cases
                    .push((*value, label.clone()));
                cg.emit_label(&label);
            }
            Stmt::Default => {
                let label = cg.fresh_label();
                cg.switches
                    .last_mut()
                    .expect("internal error: default outside switch")
                    .default_label = Some(label.clone());
                cg.emit_label(&label);
            }
            Stmt::Break => {
                let label = cg.break_labels.last().expect("internal error: break outside loop/switch").clone();
                cg.emit(format!("jmp {label}"));
            }
            Stmt::Continue => {
                let label = cg.continue_labels.last().expect("internal error: continue outside loop").clone();
                cg.emit(format!("jmp {label}"));
            }
            Stmt::Return(value) => {
                if let Some(e) = value {
                    ExpressionGenerator::gen_expr(cg, e);
                }
                cg.emit("leave");
                cg.emit("ret");
            }
            Stmt::Goto(target) => {
                let label = target.resolved_label.borrow().clone().expect("internal error: unresolved goto");
                cg.emit(format!("jmp {label}"));
            }
            Stmt::Label(label) => cg.emit_label(label),
            Stmt::Empty => {}
        }
    }

    fn gen_decl(cg: &mut CodeGen, var: &std::rc::Rc<Var>, init: &[InitElem]) {
        for elem in init {
            Self::gen_var_addr(cg, var);
            if elem.offset != 0 {
                cg.emit(format!("addq ${}, %rax", elem.offset));
            }
            cg.emit("pushq %rax");
            ExpressionGenerator::gen_expr(cg, &elem.value);
            cg.emit("popq %rcx");
            ExpressionGenerator::store_value(cg, &elem.ty, "%rcx");
        }
    }

    fn gen_var_addr(cg: &mut CodeGen, var: &std::rc::Rc<Var>) {
        if var.is_local {
            cg.emit(format!("leaq {}(%rbp), %rax", var.offset.get()));
        } else {
            let label = var.label.borrow().clone().unwrap_or_else(|| var.name.clone());
            cg.emit(format!("leaq {label}(%rip), %rax"));
        }
    }

    fn gen_if(cg: &mut CodeGen, cond: &crate::ast::nodes::Expr, then_branch: &Stmt, else_branch: &Option<Box<Stmt>>) {
        let else_label = cg.fresh_label();
        let end_label = cg.fresh_label();
        ExpressionGenerator::gen_expr(cg, cond);
        cg.emit("testq %rax, %rax");
        cg.emit(format!("jz {}", if else_branch.is_some() { &else_label } else { &end_label }));
        Self::gen_stmt(cg, then_branch);
        if let Some(else_branch) = else_branch {
            cg.emit(format!("jmp {end_label}"));
            cg.emit_label(&else_label);
            Self::gen_stmt(cg, else_branch);
        }
        cg.emit_label(&end_label);
    }

    fn gen_while(cg: &mut CodeGen, cond: &crate::ast::nodes::Expr, body: &Stmt) {
        let start_label = cg.fresh_label();
        let end_label = cg.fresh_label();
        cg.emit_label(&start_label);
        ExpressionGenerator::gen_expr(cg, cond);
        cg.emit("testq %rax, %rax");
        cg.emit(format!("jz {end_label}"));
        cg.push_loop_labels(end_label.clone(), start_label.clone());
        Self::gen_stmt(cg, body);
        cg.pop_loop_labels();
        cg.emit(format!("jmp {start_label}"));
        cg.emit_label(&end_label);
    }

    fn gen_do_while(cg: &mut CodeGen, body: &Stmt, cond: &crate::ast::nodes::Expr) {
        let start_label = cg.fresh_label();
        let continue_label = cg.fresh_label();
        let end_label = cg.fresh_label();
        cg.emit_label(&start_label);
        cg.push_loop_labels(end_label.clone(), continue_label.clone());
        Self::gen_stmt(cg, body);
        cg.pop_loop_labels();
        cg.emit_label(&continue_label);
        ExpressionGenerator::gen_expr(cg, cond);
        cg.emit("testq %rax, %rax");
        cg.emit(format!("jnz {start_label}"));
        cg.emit_label(&end_label);
    }

    fn gen_for(
        cg: &mut CodeGen,
        init: &Option<Box<Stmt>>,
        cond: &Option<crate::ast::nodes::Expr>,
        step: &Option<crate::ast::nodes::Expr>,
        body: &Stmt,
    ) {
        if let Some(init) = init {
            Self::gen_stmt(cg, init);
        }
        let start_label = cg.fresh_label();
        let continue_label = cg.fresh_label();
        let end_label = cg.fresh_label();
        cg.emit_label(&start_label);
        if let Some(cond) = cond {
            ExpressionGenerator::gen_expr(cg, cond);
            cg.emit("testq %rax, %rax");
            cg.emit(format!("jz {end_label}"));
        }
        cg.push_loop_labels(end_label.clone(), continue_label.clone());
        Self::gen_stmt(cg, body);
        cg.pop_loop_labels();
        cg.emit_label(&continue_label);
        if let Some(step) = step {
            ExpressionGenerator::gen_expr(cg, step);
        }
        cg.emit(format!("jmp {start_label}"));
        cg.emit_label(&end_label);
    }

    /// Generates the body first into a scratch buffer to collect the
    /// `(value, label)` pairs contributed by `case`/`default`, then emits
    /// the dispatch chain ahead of the spliced-in body. `break` inside the
    /// body (collected via the loop-label stack) jumps past it.
    fn gen_switch(cg: &mut CodeGen, selector: &crate::ast::nodes::Expr, body: &Stmt) {
        let end_label = cg.fresh_label();
        cg.switches.push(SwitchContext {
            end_label: end_label.clone(),
            cases: Vec::new(),
            default_label: None,
        });
        cg.break_labels.push(end_label.clone());

        let saved = mem::take(&mut cg.out);
        Self::gen_stmt(cg, body);
        let body_code = mem::replace(&mut cg.out, saved);

        cg.break_labels.pop();
        let ctx = cg.switches.pop().expect("internal error: switch context missing");

        ExpressionGenerator::gen_expr(cg, selector);
        for (value, label) in &ctx.cases {
            cg.emit(format!("cmpq ${value}, %rax"));
            cg.emit(format!("je {label}"));
        }
        match &ctx.default_label {
            Some(label) => cg.emit(format!("jmp {label}")),
            None => cg.emit(format!("jmp {end_label}")),
        }
        cg.out.push_str(&body_code);
        cg.emit_label(&end_label);
    }
}
