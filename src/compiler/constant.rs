//! # Compile-time Constant Evaluation
//!
//! `parse_evaluate` folds an already-parsed expression tree down to a single
//! `i64`, for array bounds, `case` labels, enumerator values, and static
//! initialisers that happen to reduce to a constant. Only integer literals,
//! casts between integer types, and the arithmetic/bitwise/comparison
//! operators over integer operands are supported; anything else (a
//! non-constant subexpression, a floating operand, a function call) is a
//! semantic error at the call site.

use crate::ast::nodes::{BinOp, Expr, ExprKind, UnaryOp};
use crate::compiler::error::CompileError;

pub fn parse_evaluate(expr: &Expr) -> Result<i64, CompileError> {
    match &expr.kind {
        ExprKind::IntLit(v) => Ok(*v),
        ExprKind::Cast(inner) => parse_evaluate(inner),
        ExprKind::Unary { op, operand } => {
            let v = parse_evaluate(operand)?;
            Ok(match op {
                UnaryOp::Neg => -v,
                UnaryOp::Pos => v,
                UnaryOp::Not => (v == 0) as i64,
                UnaryOp::BitNot => !v,
            })
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let l = parse_evaluate(lhs)?;
            let r = parse_evaluate(rhs)?;
            Ok(match op {
                BinOp::Add => l.wrapping_add(r),
                BinOp::Sub => l.wrapping_sub(r),
                BinOp::Mul => l.wrapping_mul(r),
                BinOp::Div => {
                    if r == 0 {
                        return Err(CompileError::semantic("division by zero in constant expression"));
                    }
                    l.wrapping_div(r)
                }
                BinOp::Mod => {
                    if r == 0 {
                        return Err(CompileError::semantic("division by zero in constant expression"));
                    }
                    l.wrapping_rem(r)
                }
                BinOp::Shl => l.wrapping_shl(r as u32),
                BinOp::Shr => l.wrapping_shr(r as u32),
                BinOp::BitAnd => l & r,
                BinOp::BitOr => l | r,
                BinOp::BitXor => l ^ r,
                BinOp::Eq => (l == r) as i64,
                BinOp::Ne => (l != r) as i64,
                BinOp::Lt => (l < r) as i64,
                BinOp::Gt => (l > r) as i64,
                BinOp::Le => (l <= r) as i64,
                BinOp::Ge => (l >= r) as i64,
                BinOp::LogAnd => ((l != 0) && (r != 0)) as i64,
                BinOp::LogOr => ((l != 0) || (r != 0)) as i64,
            })
        }
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            if parse_evaluate(cond)? != 0 {
                parse_evaluate(then_expr)
            } else {
                parse_evaluate(else_expr)
            }
        }
        ExprKind::GlobalVar(var) => var
            .const_value
            .get()
            .ok_or_else(|| CompileError::semantic(format!("'{}' is not a constant expression", var.name))),
        _ => Err(CompileError::semantic("expression is not a compile-time constant")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::Primitives;

    fn int(v: i64, prim: &Primitives) -> Expr {
        Expr {
            kind: ExprKind::IntLit(v),
            ty: prim.int.clone(),
        }
    }

    #[test]
    fn folds_arithmetic_and_bitwise_operators() {
        let prim = Primitives::new();
        let expr = Expr {
            kind: ExprKind::Binary {
                op: BinOp::Shl,
                lhs: Box::new(int(1, &prim)),
                rhs: Box::new(int(4, &prim)),
            },
            ty: prim.int.clone(),
        };
        assert_eq!(parse_evaluate(&expr).unwrap(), 16);
    }

    #[test]
    fn rejects_division_by_zero() {
        let prim = Primitives::new();
        let expr = Expr {
            kind: ExprKind::Binary {
                op: BinOp::Div,
                lhs: Box::new(int(1, &prim)),
                rhs: Box::new(int(0, &prim)),
            },
            ty: prim.int.clone(),
        };
        assert!(parse_evaluate(&expr).is_err());
    }
}
