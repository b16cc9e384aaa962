//! # Expression Code Generator
//!
//! Lowers a typed [`Expr`] to AT&T-syntax x86-64. Integer-class results are
//! left in `%rax` (sub-registers as the type narrows); floating-class
//! results are left in `%xmm0`. [`ExpressionGenerator::gen_addr`] computes
//! the address of an lvalue into `%rax` and is shared by assignment,
//! address-of, increment/decrement, and field access.

use crate::ast::nodes::{BinOp, Expr, ExprKind, IncDec, UnaryOp, Var};
use crate::ast::types::{TypeKind, TypeRef};
use crate::codegen::common::{CodeGen, INT_ARG_REGS};

pub struct ExpressionGenerator;

impl ExpressionGenerator {
    pub fn gen_expr(cg: &mut CodeGen, expr: &Expr) {
        match &expr.kind {
            ExprKind::IntLit(v) => cg.emit(format!("movq ${v}, %rax")),
            ExprKind::FloatLit(lit) => {
                let reg = if lit.is_float { "movss" } else { "movsd" };
                cg.emit(format!("{reg} {}(%rip), %xmm0", lit.label));
            }
            ExprKind::StringLit(lit) => cg.emit(format!("leaq {}(%rip), %rax", lit.label)),
            ExprKind::LocalVar(var) | ExprKind::GlobalVar(var) => Self::gen_var_load(cg, var, &expr.ty),
            ExprKind::Call {
                name,
                args,
                param_types,
                is_vararg,
            } => Self::gen_call(cg, name, args, param_types.as_deref(), *is_vararg),
            ExprKind::AddrOf(inner) => Self::gen_addr(cg, inner),
            ExprKind::Deref(inner) => {
                Self::gen_expr(cg, inner);
                Self::load_value(cg, &expr.ty, "%rax");
            }
            ExprKind::Field { target, offset } => {
                Self::gen_field_addr(cg, target, *offset);
                Self::load_value(cg, &expr.ty, "%rax");
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => Self::gen_ternary(cg, cond, then_expr, else_expr),
            ExprKind::Cast(inner) => {
                Self::gen_expr(cg, inner);
                Self::gen_convert(cg, &inner.ty, &expr.ty);
            }
            ExprKind::IncDec { op, target } => Self::gen_incdec(cg, *op, target),
            ExprKind::Unary { op, operand } => Self::gen_unary(cg, *op, operand),
            ExprKind::Binary { op, lhs, rhs } => Self::gen_binary(cg, *op, lhs, rhs, &expr.ty),
            ExprKind::Assign { lhs, rhs } => Self::gen_assign(cg, lhs, rhs),
            ExprKind::CompoundAssign { op, lhs, rhs } => Self::gen_compound_assign(cg, *op, lhs, rhs),
        }
    }

    /// Computes the address of an lvalue into `%rax`.
    pub fn gen_addr(cg: &mut CodeGen, expr: &Expr) {
        match &expr.kind {
            ExprKind::LocalVar(var) => Self::gen_var_addr(cg, var),
            ExprKind::GlobalVar(var) => Self::gen_var_addr(cg, var),
            ExprKind::Deref(inner) => Self::gen_expr(cg, inner),
            ExprKind::Field { target, offset } => Self::gen_field_addr(cg, target, *offset),
            other => panic!("internal error: {other:?} is not an lvalue"),
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

    /// `target.field` addresses through `target`'s own address; `target->field`
    /// addresses through `target`'s pointer value. Disambiguated by whether
    /// `target`'s static type is the aggregate itself or a pointer to one.
    fn gen_field_addr(cg: &mut CodeGen, target: &Expr, offset: i64) {
        let is_pointer = target.ty.borrow().kind == TypeKind::Pointer;
        if is_pointer {
            Self::gen_expr(cg, target);
        } else {
            Self::gen_addr(cg, target);
        }
        if offset != 0 {
            cg.emit(format!("addq ${offset}, %rax"));
        }
    }

    fn gen_var_load(cg: &mut CodeGen, var: &std::rc::Rc<Var>, result_ty: &TypeRef) {
        let declared_array = var.ty.borrow().kind == TypeKind::Array;
        Self::gen_var_addr(cg, var);
        if !declared_array {
            // An array variable decays to its own address, already in %rax.
            Self::load_value(cg, result_ty, "%rax");
        }
    }

    /// Loads the value pointed to by `addr_reg` into `%rax`/`%xmm0`,
    /// widening/sign-extending as the type demands. A no-op for
    /// array/structure results, whose "value" is the address itself.
    fn load_value(cg: &mut CodeGen, ty: &TypeRef, addr_reg: &str) {
        let t = ty.borrow();
        match t.kind {
            TypeKind::Array | TypeKind::Structure | TypeKind::Function | TypeKind::Stub => {}
            TypeKind::Float => cg.emit(format!("movss ({addr_reg}), %xmm0")),
            TypeKind::Double | TypeKind::LDouble => cg.emit(format!("movsd ({addr_reg}), %xmm0")),
            _ => {
                let unsigned = t.is_unsigned;
                match (t.size, unsigned) {
                    (1, false) => cg.emit(format!("movsbq ({addr_reg}), %rax")),
                    (1, true) => cg.emit(format!("movzbq ({addr_reg}), %rax")),
                    (2, false) => cg.emit(format!("movswq ({addr_reg}), %rax")),
                    (2, true) => cg.emit(format!("movzwq ({addr_reg}), %rax")),
                    (4, false) => cg.emit(format!("movslq ({addr_reg}), %rax")),
                    (4, true) => cg.emit(format!("movl ({addr_reg}), %eax")),
                    _ => cg.emit(format!("movq ({addr_reg}), %rax")),
                }
            }
        }
    }

    /// Stores `%rax`/`%xmm0` through the address held in `addr_reg`.
    pub(crate) fn store_value(cg: &mut CodeGen, ty: &TypeRef, addr_reg: &str) {
        let t = ty.borrow();
        match t.kind {
            TypeKind::Float => cg.emit(format!("movss %xmm0, ({addr_reg})")),
            TypeKind::Double | TypeKind::LDouble => cg.emit(format!("movsd %xmm0, ({addr_reg})")),
            TypeKind::Structure => {
                // %rax holds the source address; copy the declared size
                // into addr_reg word-at-a-time, then byte-at-a-time.
                let mut copied = 0i64;
                cg.emit("movq %rax, %rsi");
                while copied + 8 <= t.size {
                    cg.emit(format!("movq {copied}(%rsi), %rdx"));
                    cg.emit(format!("movq %rdx, {copied}({addr_reg})"));
                    copied += 8;
                }
                while copied < t.size {
                    cg.emit(format!("movb {copied}(%rsi), %dl"));
                    cg.emit(format!("movb %dl, {copied}({addr_reg})"));
                    copied += 1;
                }
            }
            _ => {
                let (reg, op) = match t.size {
                    1 => ("%al", "movb"),
                    2 => ("%ax", "movw"),
                    4 => ("%eax", "movl"),
                    _ => ("%rax", "movq"),
                };
                cg.emit(format!("{op} {reg}, ({addr_reg})"));
            }
        }
    }

    fn gen_ternary(cg: &mut CodeGen, cond: &Expr, then_expr: &Expr, else_expr: &Expr) {
        let else_label = cg.fresh_label();
        let end_label = cg.fresh_label();
        Self::gen_expr(cg, cond);
        cg.emit("testq %rax, %rax");
        cg.emit(format!("jz {else_label}"));
        Self::gen_expr(cg, then_expr);
        cg.emit(format!("jmp {end_label}"));
        cg.emit_label(&else_label);
        Self::gen_expr(cg, else_expr);
        cg.emit_label(&end_label);
    }

    fn gen_convert(cg: &mut CodeGen, from: &TypeRef, to: &TypeRef) {
        let (fk, tk) = (from.borrow().kind, to.borrow().kind);
        let from_float = fk.is_floating();
        let to_float = tk.is_floating();
        match (from_float, to_float) {
            (false, true) => {
                let op = if tk == TypeKind::Float { "cvtsi2ssq" } else { "cvtsi2sdq" };
                cg.emit(format!("{op} %rax, %xmm0"));
            }
            (true, false) => {
                let op = if fk == TypeKind::Float { "cvttss2siq" } else { "cvttsd2siq" };
                cg.emit(format!("{op} %xmm0, %rax"));
            }
            (true, true) => {
                if fk != tk {
                    if tk == TypeKind::Float {
                        cg.emit("cvtsd2ss %xmm0, %xmm0");
                    } else {
                        cg.emit("cvtss2sd %xmm0, %xmm0");
                    }
                }
            }
            (false, false) => {
                let t = to.borrow();
                match t.size {
                    1 => cg.emit(if t.is_unsigned { "movzbq %al, %rax" } else { "movsbq %al, %rax" }),
                    2 => cg.emit(if t.is_unsigned { "movzwq %ax, %rax" } else { "movswq %ax, %rax" }),
                    4 => cg.emit(if t.is_unsigned { "movl %eax, %eax" } else { "movslq %eax, %rax" }),
                    _ => {}
                }
            }
        }
    }

    fn gen_incdec(cg: &mut CodeGen, op: IncDec, target: &Expr) {
        Self::gen_addr(cg, target);
        cg.emit("pushq %rax");
        Self::load_value(cg, &target.ty, "%rax");
        let is_float = target.ty.borrow().kind.is_floating();
        let step = Self::pointer_step(&target.ty);
        if is_float {
            cg.emit("movsd %xmm0, %xmm1");
            cg.emit(format!("movq ${step}, %rax"));
            cg.emit("cvtsi2sdq %rax, %xmm0");
            match op {
                IncDec::PreInc | IncDec::PostInc => cg.emit("addsd %xmm1, %xmm0"),
                IncDec::PreDec | IncDec::PostDec => {
                    cg.emit("movsd %xmm1, %xmm2");
                    cg.emit("subsd %xmm0, %xmm2");
                    cg.emit("movsd %xmm2, %xmm0");
                }
            }
            cg.emit("popq %rcx");
            Self::store_value(cg, &target.ty, "%rcx");
            if matches!(op, IncDec::PostInc | IncDec::PostDec) {
                cg.emit("movsd %xmm1, %xmm0");
            }
        } else {
            cg.emit("movq %rax, %rbx");
            match op {
                IncDec::PreInc | IncDec::PostInc => cg.emit(format!("addq ${step}, %rax")),
                IncDec::PreDec | IncDec::PostDec => cg.emit(format!("subq ${step}, %rax")),
            }
            cg.emit("popq %rcx");
            Self::store_value(cg, &target.ty, "%rcx");
            if matches!(op, IncDec::PostInc | IncDec::PostDec) {
                cg.emit("movq %rbx, %rax");
            }
        }
    }

    fn pointer_step(ty: &TypeRef) -> i64 {
        let t = ty.borrow();
        if t.kind == TypeKind::Pointer {
            t.pointee.as_ref().map(|p| p.borrow().size.max(1)).unwrap_or(1)
        } else {
            1
        }
    }

    fn gen_unary(cg: &mut CodeGen, op: UnaryOp, operand: &Expr) {
        Self::gen_expr(cg, operand);
        let is_float = operand.ty.borrow().kind.is_floating();
        match op {
            UnaryOp::Pos => {}
            UnaryOp::Neg => {
                if is_float {
                    cg.emit("xorpd %xmm1, %xmm1");
                    cg.emit("subsd %xmm0, %xmm1");
                    cg.emit("movsd %xmm1, %xmm0");
                } else {
                    cg.emit("negq %rax");
                }
            }
            UnaryOp::BitNot => cg.emit("notq %rax"),
            UnaryOp::Not => {
                cg.emit("testq %rax, %rax");
                cg.emit("sete %al");
                cg.emit("movzbq %al, %rax");
            }
        }
    }

    fn gen_binary(cg: &mut CodeGen, op: BinOp, lhs: &Expr, rhs: &Expr, result_ty: &TypeRef) {
        if matches!(op, BinOp::LogAnd | BinOp::LogOr) {
            return Self::gen_short_circuit(cg, op, lhs, rhs);
        }
        let float_op = lhs.ty.borrow().kind.is_floating() || rhs.ty.borrow().kind.is_floating();
        if float_op {
            return Self::gen_float_binary(cg, op, lhs, rhs);
        }

        let lhs_is_ptr = lhs.ty.borrow().kind.is_pointer_like();
        let rhs_is_ptr = rhs.ty.borrow().kind.is_pointer_like();

        Self::gen_expr(cg, lhs);
        cg.emit("pushq %rax");
        Self::gen_expr(cg, rhs);
        cg.emit("movq %rax, %rcx");
        cg.emit("popq %rax");

        if op == BinOp::Add && lhs_is_ptr && !rhs_is_ptr {
            let step = Self::pointer_step(&lhs.ty);
            cg.emit(format!("imulq ${step}, %rcx"));
        } else if op == BinOp::Add && rhs_is_ptr && !lhs_is_ptr {
            let step = Self::pointer_step(&rhs.ty);
            cg.emit(format!("imulq ${step}, %rax"));
        } else if op == BinOp::Sub && lhs_is_ptr && !rhs_is_ptr {
            let step = Self::pointer_step(&lhs.ty);
            cg.emit(format!("imulq ${step}, %rcx"));
        }

        match op {
            BinOp::Add => cg.emit("addq %rcx, %rax"),
            BinOp::Sub => {
                cg.emit("subq %rcx, %rax");
                if lhs_is_ptr && rhs_is_ptr {
                    let step = Self::pointer_step(&lhs.ty);
                    cg.emit(format!("movq ${step}, %rcx"));
                    cg.emit("cqto");
                    cg.emit("idivq %rcx");
                }
            }
            BinOp::Mul => cg.emit("imulq %rcx, %rax"),
            BinOp::Div | BinOp::Mod => {
                let unsigned = result_ty.borrow().is_unsigned;
                if unsigned {
                    cg.emit("xorq %rdx, %rdx");
                    cg.emit("divq %rcx");
                } else {
                    cg.emit("cqto");
                    cg.emit("idivq %rcx");
                }
                if op == BinOp::Mod {
                    cg.emit("movq %rdx, %rax");
                }
            }
            BinOp::Shl => cg.emit("shlq %cl, %rax"),
            BinOp::Shr => {
                if result_ty.borrow().is_unsigned {
                    cg.emit("shrq %cl, %rax");
                } else {
                    cg.emit("sarq %cl, %rax");
                }
            }
            BinOp::BitAnd => cg.emit("andq %rcx, %rax"),
            BinOp::BitOr => cg.emit("orq %rcx, %rax"),
            BinOp::BitXor => cg.emit("xorq %rcx, %rax"),
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                cg.emit("cmpq %rcx, %rax");
                let unsigned = lhs.ty.borrow().is_unsigned || rhs.ty.borrow().is_unsigned;
                let setcc = match (op, unsigned) {
                    (BinOp::Eq, _) => "sete",
                    (BinOp::Ne, _) => "setne",
                    (BinOp::Lt, false) => "setl",
                    (BinOp::Lt, true) => "setb",
                    (BinOp::Gt, false) => "setg",
                    (BinOp::Gt, true) => "seta",
                    (BinOp::Le, false) => "setle",
                    (BinOp::Le, true) => "setbe",
                    (BinOp::Ge, false) => "setge",
                    (BinOp::Ge, true) => "setae",
                    _ => unreachable!(),
                };
                cg.emit(format!("{setcc} %al"));
                cg.emit("movzbq %al, %rax");
            }
            BinOp::LogAnd | BinOp::LogOr => unreachable!("handled above"),
        }
    }

    fn gen_float_binary(cg: &mut CodeGen, op: BinOp, lhs: &Expr, rhs: &Expr) {
        let single = lhs.ty.borrow().kind == TypeKind::Float && rhs.ty.borrow().kind == TypeKind::Float;
        let suffix = if single { "ss" } else { "sd" };
        Self::gen_expr(cg, lhs);
        if !single && lhs.ty.borrow().kind == TypeKind::Float {
            cg.emit("cvtss2sd %xmm0, %xmm0");
        }
        cg.emit("subq $8, %rsp");
        cg.emit(format!("mov{suffix} %xmm0, (%rsp)"));
        Self::gen_expr(cg, rhs);
        if !single && rhs.ty.borrow().kind == TypeKind::Float {
            cg.emit("cvtss2sd %xmm0, %xmm0");
        }
        cg.emit("movaps %xmm0, %xmm1");
        cg.emit(format!("mov{suffix} (%rsp), %xmm0"));
        cg.emit("addq $8, %rsp");
        match op {
            BinOp::Add => cg.emit(format!("add{suffix} %xmm1, %xmm0")),
            BinOp::Sub => cg.emit(format!("sub{suffix} %xmm1, %xmm0")),
            BinOp::Mul => cg.emit(format!("mul{suffix} %xmm1, %xmm0")),
            BinOp::Div => cg.emit(format!("div{suffix} %xmm1, %xmm0")),
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                cg.emit(format!("ucomi{suffix} %xmm1, %xmm0"));
                let setcc = match op {
                    BinOp::Eq => "sete",
                    BinOp::Ne => "setne",
                    BinOp::Lt => "setb",
                    BinOp::Gt => "seta",
                    BinOp::Le => "setbe",
                    BinOp::Ge => "setae",
                    _ => unreachable!(),
                };
                cg.emit(format!("{setcc} %al"));
                cg.emit("movzbq %al, %rax");
            }
            _ => panic!("internal error: non-arithmetic float operator {op:?}"),
        }
    }

    fn gen_short_circuit(cg: &mut CodeGen, op: BinOp, lhs: &Expr, rhs: &Expr) {
        let short_label = cg.fresh_label();
        let end_label = cg.fresh_label();
        Self::gen_expr(cg, lhs);
        cg.emit("testq %rax, %rax");
        match op {
            BinOp::LogAnd => cg.emit(format!("jz {short_label}")),
            BinOp::LogOr => cg.emit(format!("jnz {short_label}")),
            _ => unreachable!(),
        }
        Self::gen_expr(cg, rhs);
        cg.emit("testq %rax, %rax");
        cg.emit("setne %al");
        cg.emit("movzbq %al, %rax");
        cg.emit(format!("jmp {end_label}"));
        cg.emit_label(&short_label);
        cg.emit(format!("movq ${}, %rax", if op == BinOp::LogAnd { 0 } else { 1 }));
        cg.emit_label(&end_label);
    }

    fn gen_assign(cg: &mut CodeGen, lhs: &Expr, rhs: &Expr) {
        Self::gen_addr(cg, lhs);
        cg.emit("pushq %rax");
        Self::gen_expr(cg, rhs);
        if lhs.ty.borrow().kind != TypeKind::Structure {
            Self::gen_convert(cg, &rhs.ty, &lhs.ty);
        }
        cg.emit("popq %rcx");
        Self::store_value(cg, &lhs.ty, "%rcx");
    }

    fn gen_compound_assign(cg: &mut CodeGen, op: BinOp, lhs: &Expr, rhs: &Expr) {
        Self::gen_addr(cg, lhs);
        cg.emit("movq %rax, %rcx");
        Self::load_value(cg, &lhs.ty, "%rcx");
        let is_float = lhs.ty.borrow().kind.is_floating();
        if is_float {
            cg.emit("subq $8, %rsp");
            cg.emit("movsd %xmm0, (%rsp)");
        } else {
            cg.emit("pushq %rax");
        }
        cg.emit("pushq %rcx");
        Self::gen_expr(cg, rhs);
        Self::gen_convert(cg, &rhs.ty, &lhs.ty);
        cg.emit("popq %rcx");
        if is_float {
            cg.emit("movaps %xmm0, %xmm1");
            cg.emit("movsd (%rsp), %xmm0");
            cg.emit("addq $8, %rsp");
            let suffix = if lhs.ty.borrow().kind == TypeKind::Float { "ss" } else { "sd" };
            match op {
                BinOp::Add => cg.emit(format!("add{suffix} %xmm1, %xmm0")),
                BinOp::Sub => cg.emit(format!("sub{suffix} %xmm1, %xmm0")),
                BinOp::Mul => cg.emit(format!("mul{suffix} %xmm1, %xmm0")),
                BinOp::Div => cg.emit(format!("div{suffix} %xmm1, %xmm0")),
                _ => panic!("internal error: non-arithmetic compound assignment on float"),
            }
        } else {
            cg.emit("movq %rax, %rbx");
            cg.emit("popq %rax");
            match op {
                BinOp::Add => cg.emit("addq %rbx, %rax"),
                BinOp::Sub => cg.emit("subq %rbx, %rax"),
                BinOp::Mul => cg.emit("imulq %rbx, %rax"),
                BinOp::Div => {
                    cg.emit("movq %rbx, %rcx");
                    cg.emit("cqto");
                    cg.emit("idivq %rcx");
                }
                BinOp::Mod => {
                    cg.emit("movq %rbx, %rcx");
                    cg.emit("cqto");
                    cg.emit("idivq %rcx");
                    cg.emit("movq %rdx, %rax");
                }
                BinOp::Shl => {
                    cg.emit("movq %rbx, %rcx");
                    cg.emit("shlq %cl, %rax");
                }
                BinOp::Shr => {
                    cg.emit("movq %rbx, %rcx");
                    cg.emit("sarq %cl, %rax");
                }
                BinOp::BitAnd => cg.emit("andq %rbx, %rax"),
                BinOp::BitOr => cg.emit("orq %rbx, %rax"),
                BinOp::BitXor => cg.emit("xorq %rbx, %rax"),
                _ => panic!("internal error: non-arithmetic compound assignment operator"),
            }
        }
        cg.emit("popq %rcx");
        Self::store_value(cg, &lhs.ty, "%rcx");
    }

    /// Evaluates arguments left-to-right onto the stack, then pops them into
    /// the System V register file in reverse. Arguments beyond the sixth
    /// integer or eighth floating register are not supported.
    fn gen_call(cg: &mut CodeGen, name: &str, args: &[Expr], param_types: Option<&[TypeRef]>, is_vararg: bool) {
        for arg in args {
            Self::gen_expr(cg, arg);
            if arg.ty.borrow().kind.is_floating() {
                cg.emit("subq $8, %rsp");
                cg.emit("movsd %xmm0, (%rsp)");
            } else {
                cg.emit("pushq %rax");
            }
        }

        let mut int_used = 0usize;
        let mut float_used = 0usize;
        for (i, arg) in args.iter().enumerate().rev() {
            let declared_float = param_types
                .and_then(|p| p.get(i))
                .map(crate::codegen::common::is_float_class)
                .unwrap_or_else(|| arg.ty.borrow().kind.is_floating());
            if declared_float {
                if float_used < 8 {
                    cg.emit(format!("movsd (%rsp), %xmm{float_used}"));
                }
                cg.emit("addq $8, %rsp");
                float_used += 1;
            } else {
                if int_used < 6 {
                    cg.emit(format!("popq {}", INT_ARG_REGS[int_used]));
                } else {
                    cg.emit("popq %rax");
                }
                int_used += 1;
            }
        }

        if is_vararg {
            cg.emit(format!("movq ${float_used}, %rax"));
        }
        cg.emit(format!("call {name}"));
    }
}
