//! # Expression Parser
//!
//! Implements operator-precedence parsing for C expressions, fused with the
//! semantic actions the grammar requires as it goes: array-to-pointer
//! decay, the usual arithmetic conversions, pointer arithmetic scaling,
//! lvalue checks, and `sizeof`/cast handling.

use crate::ast::nodes::{BinOp, Expr, ExprKind, IncDec, UnaryOp};
use crate::ast::types::{Type, TypeKind, TypeRef};
use crate::compiler::error::CompileError;
use crate::compiler::lexer::{punct, Token};
use crate::compiler::parser::common::Parser;
use crate::compiler::parser::declarations::DeclarationParser;

pub struct ExpressionParser;

impl ExpressionParser {
    pub fn parse_expression(p: &mut Parser) -> Result<Expr, CompileError> {
        Self::parse_assignment(p)
    }

    /// Array-to-pointer decay, applied whenever an expression is consumed
    /// as the operand of a non-assignment operator.
    pub(crate) fn decay(e: Expr) -> Expr {
        let is_array = e.ty.borrow().kind == TypeKind::Array;
        if !is_array {
            return e;
        }
        let pointee = e.ty.borrow().pointee.clone().unwrap();
        Expr {
            kind: e.kind,
            ty: Type::pointer_to(pointee),
        }
    }

    fn check_lvalue(e: &Expr) -> Result<(), CompileError> {
        match &e.kind {
            ExprKind::LocalVar(_) | ExprKind::GlobalVar(_) | ExprKind::Deref(_) | ExprKind::Field { .. } => {
                Ok(())
            }
            _ => Err(CompileError::semantic("expression is not assignable")),
        }
    }

    pub fn parse_assignment(p: &mut Parser) -> Result<Expr, CompileError> {
        let lhs = Self::parse_conditional(p)?;
        let compound_op = match p.peek()? {
            Some(Token::Punct(c)) => match *c {
                x if x == '=' as i32 => None,
                punct::PLUS_EQ => Some(BinOp::Add),
                punct::MINUS_EQ => Some(BinOp::Sub),
                punct::STAR_EQ => Some(BinOp::Mul),
                punct::SLASH_EQ => Some(BinOp::Div),
                punct::PERCENT_EQ => Some(BinOp::Mod),
                punct::AND_EQ => Some(BinOp::BitAnd),
                punct::OR_EQ => Some(BinOp::BitOr),
                punct::XOR_EQ => Some(BinOp::BitXor),
                punct::SHL_EQ => Some(BinOp::Shl),
                punct::SHR_EQ => Some(BinOp::Shr),
                _ => return Ok(lhs),
            },
            _ => return Ok(lhs),
        };
        let is_plain_assign = matches!(p.peek()?, Some(Token::Punct(c)) if *c == '=' as i32);
        if !is_plain_assign && compound_op.is_none() {
            return Ok(lhs);
        }
        Self::check_lvalue(&lhs)?;
        p.advance()?;
        let rhs = Self::decay(Self::parse_assignment(p)?);
        let ty = lhs.ty.clone();
        if let Some(op) = compound_op {
            Ok(Expr {
                kind: ExprKind::CompoundAssign {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                ty,
            })
        } else {
            Ok(Expr {
                kind: ExprKind::Assign {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                ty,
            })
        }
    }

    fn parse_conditional(p: &mut Parser) -> Result<Expr, CompileError> {
        let cond = Self::parse_binary(p, 0)?;
        if !p.eat_punct('?' as i32)? {
            return Ok(cond);
        }
        let then_expr = Self::decay(Self::parse_expression(p)?);
        p.expect_punct(':' as i32)?;
        let else_expr = Self::decay(Self::parse_conditional(p)?);
        let ty = then_expr.ty.clone();
        Ok(Expr {
            kind: ExprKind::Ternary {
                cond: Box::new(Self::decay(cond)),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            ty,
        })
    }

    /// Binary operator levels, lowest first; precedence climbing folds all
    /// of them into one loop.
    fn precedence_of(code: i32) -> Option<(u8, BinOp)> {
        Some(match code {
            punct::OR_OR => (1, BinOp::LogOr),
            punct::AND_AND => (2, BinOp::LogAnd),
            x if x == '|' as i32 => (3, BinOp::BitOr),
            x if x == '^' as i32 => (4, BinOp::BitXor),
            x if x == '&' as i32 => (5, BinOp::BitAnd),
            punct::EQ_EQ => (6, BinOp::Eq),
            punct::NOT_EQ => (6, BinOp::Ne),
            x if x == '<' as i32 => (7, BinOp::Lt),
            x if x == '>' as i32 => (7, BinOp::Gt),
            punct::LE => (7, BinOp::Le),
            punct::GE => (7, BinOp::Ge),
            punct::SHL => (8, BinOp::Shl),
            punct::SHR => (8, BinOp::Shr),
            x if x == '+' as i32 => (9, BinOp::Add),
            x if x == '-' as i32 => (9, BinOp::Sub),
            x if x == '*' as i32 => (10, BinOp::Mul),
            x if x == '/' as i32 => (10, BinOp::Div),
            x if x == '%' as i32 => (10, BinOp::Mod),
            _ => return None,
        })
    }

    fn parse_binary(p: &mut Parser, min_prec: u8) -> Result<Expr, CompileError> {
        let mut left = Self::decay(Self::parse_unary(p)?);
        loop {
            let Some(Token::Punct(code)) = p.peek()?.copied() else {
                break;
            };
            let Some((prec, op)) = Self::precedence_of(code) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            p.advance()?;
            let right = Self::decay(Self::parse_binary(p, prec + 1)?);
            left = Self::make_binary(p, op, left, right)?;
        }
        Ok(left)
    }

    fn make_binary(p: &mut Parser, op: BinOp, lhs: Expr, rhs: Expr) -> Result<Expr, CompileError> {
        let lhs_ptr = lhs.ty.borrow().kind == TypeKind::Pointer;
        let rhs_ptr = rhs.ty.borrow().kind == TypeKind::Pointer;

        let ty = match op {
            BinOp::Add if lhs_ptr => lhs.ty.clone(),
            BinOp::Add if rhs_ptr => rhs.ty.clone(),
            BinOp::Sub if lhs_ptr && rhs_ptr => p.prim.long.clone(),
            BinOp::Sub if lhs_ptr => lhs.ty.clone(),
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::LogAnd
            | BinOp::LogOr => p.prim.int.clone(),
            BinOp::Shl | BinOp::Shr => lhs.ty.clone(),
            _ => crate::ast::types::usual_arithmetic_conversion(&lhs.ty, &rhs.ty, &p.prim),
        };
        Ok(Expr {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        })
    }

    fn parse_unary(p: &mut Parser) -> Result<Expr, CompileError> {
        if let Some(Token::Punct(code)) = p.peek()?.copied() {
            let unary_op = match code {
                x if x == '-' as i32 => Some(UnaryOp::Neg),
                x if x == '+' as i32 => Some(UnaryOp::Pos),
                x if x == '!' as i32 => Some(UnaryOp::Not),
                x if x == '~' as i32 => Some(UnaryOp::BitNot),
                _ => None,
            };
            if let Some(op) = unary_op {
                p.advance()?;
                let operand = Self::decay(Self::parse_unary(p)?);
                let ty = if op == UnaryOp::Not { p.prim.int.clone() } else { operand.ty.clone() };
                return Ok(Expr {
                    kind: ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    ty,
                });
            }
            if code == '&' as i32 {
                p.advance()?;
                let operand = Self::parse_unary(p)?;
                Self::check_lvalue(&operand)?;
                let ty = Type::pointer_to(operand.ty.clone());
                return Ok(Expr {
                    kind: ExprKind::AddrOf(Box::new(operand)),
                    ty,
                });
            }
            if code == '*' as i32 {
                p.advance()?;
                let operand = Self::decay(Self::parse_unary(p)?);
                let ty = operand
                    .ty
                    .borrow()
                    .pointee
                    .clone()
                    .ok_or_else(|| CompileError::semantic("cannot dereference a non-pointer"))?;
                return Ok(Expr {
                    kind: ExprKind::Deref(Box::new(operand)),
                    ty,
                });
            }
            if code == punct::INCREMENT || code == punct::DECREMENT {
                p.advance()?;
                let operand = Self::parse_unary(p)?;
                Self::check_lvalue(&operand)?;
                let op = if code == punct::INCREMENT { IncDec::PreInc } else { IncDec::PreDec };
                let ty = operand.ty.clone();
                return Ok(Expr {
                    kind: ExprKind::IncDec {
                        op,
                        target: Box::new(operand),
                    },
                    ty,
                });
            }
            if code == '(' as i32 {
                if let Some(ty) = Self::try_parse_type_name(p)? {
                    let operand = Self::decay(Self::parse_unary(p)?);
                    return Ok(Expr {
                        kind: ExprKind::Cast(Box::new(operand)),
                        ty,
                    });
                }
            }
        }
        if p.eat_keyword("sizeof")? {
            return Self::parse_sizeof(p);
        }
        Self::parse_postfix(p)
    }

    fn parse_sizeof(p: &mut Parser) -> Result<Expr, CompileError> {
        let size = if p.check_punct('(' as i32)? {
            if let Some(ty) = Self::try_parse_type_name(p)? {
                ty.borrow().size
            } else {
                p.expect_punct('(' as i32)?;
                let inner = Self::parse_expression(p)?;
                p.expect_punct(')' as i32)?;
                inner.ty.borrow().size
            }
        } else {
            let inner = Self::parse_unary(p)?;
            inner.ty.borrow().size
        };
        Ok(Expr {
            kind: ExprKind::IntLit(size),
            ty: p.prim.long.clone(),
        })
    }

    /// Speculatively parses `( type-name )`. Consumes the tokens and
    /// returns `Some(ty)` on success; otherwise unrolls back to before the
    /// `(`, returning `None`.
    fn try_parse_type_name(p: &mut Parser) -> Result<Option<TypeRef>, CompileError> {
        if !p.check_punct('(' as i32)? {
            return Ok(None);
        }
        p.advance()?;
        if !DeclarationParser::starts_decl_specs(p)? {
            p.unget(Token::Punct('(' as i32));
            return Ok(None);
        }
        let spec = DeclarationParser::parse_decl_specs(p)?;
        let mut ty = spec.ty;
        while p.eat_punct('*' as i32)? {
            ty = Type::pointer_to(ty);
        }
        p.expect_punct(')' as i32)?;
        Ok(Some(ty))
    }

    fn parse_postfix(p: &mut Parser) -> Result<Expr, CompileError> {
        let mut e = Self::parse_primary(p)?;
        loop {
            if p.eat_punct('[' as i32)? {
                let base = Self::decay(e);
                let index = Self::decay(Self::parse_expression(p)?);
                p.expect_punct(']' as i32)?;
                let added = Self::make_binary(p, BinOp::Add, base, index)?;
                let ty = added
                    .ty
                    .borrow()
                    .pointee
                    .clone()
                    .ok_or_else(|| CompileError::semantic("subscripted value is not an array or pointer"))?;
                e = Expr {
                    kind: ExprKind::Deref(Box::new(added)),
                    ty,
                };
            } else if p.eat_punct('.' as i32)? {
                let field_name = p.expect_identifier()?;
                let (offset, ty) = Self::field_lookup(&e.ty, &field_name)?;
                e = Expr {
                    kind: ExprKind::Field {
                        target: Box::new(e),
                        offset,
                    },
                    ty,
                };
            } else if p.eat_punct(punct::ARROW)? {
                let field_name = p.expect_identifier()?;
                let pointee = e
                    .ty
                    .borrow()
                    .pointee
                    .clone()
                    .ok_or_else(|| CompileError::semantic("-> on a non-pointer"))?;
                let (offset, ty) = Self::field_lookup(&pointee, &field_name)?;
                e = Expr {
                    kind: ExprKind::Field {
                        target: Box::new(e),
                        offset,
                    },
                    ty,
                };
            } else if p.eat_punct(punct::INCREMENT)? {
                Self::check_lvalue(&e)?;
                let ty = e.ty.clone();
                e = Expr {
                    kind: ExprKind::IncDec {
                        op: IncDec::PostInc,
                        target: Box::new(e),
                    },
                    ty,
                };
            } else if p.eat_punct(punct::DECREMENT)? {
                Self::check_lvalue(&e)?;
                let ty = e.ty.clone();
                e = Expr {
                    kind: ExprKind::IncDec {
                        op: IncDec::PostDec,
                        target: Box::new(e),
                    },
                    ty,
                };
            } else {
                break;
            }
        }
        Ok(e)
    }

    fn field_lookup(ty: &TypeRef, name: &str) -> Result<(i64, TypeRef), CompileError> {
        let t = ty.borrow();
        t.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| (f.offset, f.ty.clone()))
            .ok_or_else(|| CompileError::semantic(format!("no member named '{name}'")))
    }

    fn parse_primary(p: &mut Parser) -> Result<Expr, CompileError> {
        match p.advance()? {
            Some(Token::Number(text)) => Self::parse_number(p, &text),
            Some(Token::Char(v)) => Ok(Expr {
                kind: ExprKind::IntLit(v),
                ty: p.prim.int.clone(),
            }),
            Some(Token::Str(bytes)) => {
                let mut with_nul = bytes.clone();
                with_nul.push(0);
                let len = with_nul.len() as i64;
                let lit = p.add_string(with_nul);
                Ok(Expr {
                    kind: ExprKind::StringLit(lit),
                    ty: Type::array_of(p.prim.char.clone(), len),
                })
            }
            Some(Token::Identifier(name)) => Self::parse_identifier(p, name),
            Some(Token::Punct(c)) if c == '(' as i32 => {
                let inner = Self::parse_expression(p)?;
                p.expect_punct(')' as i32)?;
                Ok(inner)
            }
            other => Err(CompileError::parser(
                p.pos(),
                format!("unexpected token in expression: {other:?}"),
            )),
        }
    }

    fn parse_identifier(p: &mut Parser, name: String) -> Result<Expr, CompileError> {
        if p.check_punct('(' as i32)? {
            return Self::parse_call(p, name);
        }
        if let Some(var) = p.lookup_var(&name) {
            let ty = var.ty.clone();
            let kind = if var.is_local {
                ExprKind::LocalVar(var)
            } else {
                ExprKind::GlobalVar(var)
            };
            return Ok(Expr { kind, ty });
        }
        Err(CompileError::undeclared(name))
    }

    fn parse_call(p: &mut Parser, name: String) -> Result<Expr, CompileError> {
        p.advance()?; // '('
        let mut args = Vec::new();
        if !p.check_punct(')' as i32)? {
            loop {
                args.push(Self::decay(Self::parse_assignment(p)?));
                if !p.eat_punct(',' as i32)? {
                    break;
                }
            }
        }
        p.expect_punct(')' as i32)?;

        if args.len() > 6 {
            return Err(CompileError::semantic("too many function arguments"));
        }

        let fn_ty = p.functions.get(&name).cloned();
        let (ret_ty, param_types, is_vararg) = match &fn_ty {
            Some(t) => {
                let b = t.borrow();
                (b.returning.clone().unwrap_or_else(|| p.prim.int.clone()), Some(b.params.clone()), b.is_vararg)
            }
            None => (p.prim.int.clone(), None, true),
        };
        Ok(Expr {
            kind: ExprKind::Call {
                name,
                args,
                param_types,
                is_vararg,
            },
            ty: ret_ty,
        })
    }

    fn parse_number(p: &mut Parser, text: &str) -> Result<Expr, CompileError> {
        let is_float = text.contains('.')
            || ((text.contains('e') || text.contains('E')) && !text.starts_with("0x") && !text.starts_with("0X"));
        if is_float {
            let mut digits = text.to_string();
            let is_f32 = digits.ends_with('f') || digits.ends_with('F');
            if is_f32 {
                digits.pop();
            }
            let value: f64 = digits
                .parse()
                .map_err(|_| CompileError::lexer(p.pos(), format!("invalid floating literal '{text}'")))?;
            let lit = p.add_float(value, is_f32);
            let ty = if is_f32 { p.prim.float.clone() } else { p.prim.double.clone() };
            return Ok(Expr {
                kind: ExprKind::FloatLit(lit),
                ty,
            });
        }

        let (digits, radix) = if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            (rest, 16)
        } else if text.starts_with('0') && text.len() > 1 {
            (&text[1..], 8)
        } else {
            (text, 10)
        };

        let mut end = 0;
        for (i, c) in digits.char_indices() {
            if c.to_digit(radix).is_some() {
                end = i + c.len_utf8();
            } else {
                break;
            }
        }
        let (num_part, suffix) = digits.split_at(end);
        let value = i64::from_str_radix(num_part, radix)
            .map_err(|_| CompileError::lexer(p.pos(), format!("invalid integer literal '{text}'")))?;

        let mut unsigned = false;
        let mut longs = 0u32;
        for c in suffix.chars() {
            match c {
                'u' | 'U' => unsigned = true,
                'l' | 'L' => longs += 1,
                _ => {
                    return Err(CompileError::lexer(
                        p.pos(),
                        format!("invalid integer suffix in '{text}'"),
                    ));
                }
            }
        }
        let ty = match (longs, unsigned) {
            (0, false) => p.prim.int.clone(),
            (0, true) => p.prim.uint.clone(),
            (1, false) => p.prim.long.clone(),
            (1, true) => p.prim.ulong.clone(),
            (_, false) => p.prim.llong.clone(),
            (_, true) => p.prim.ullong.clone(),
        };
        Ok(Expr {
            kind: ExprKind::IntLit(value),
            ty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::common::Parser;

    fn parse_expr(src: &str) -> Expr {
        let mut p = Parser::new(src);
        ExpressionParser::parse_expression(&mut p).unwrap()
    }

    #[test]
    fn precedence_binds_multiplication_tighter_than_addition() {
        let e = parse_expr("1 + 2 * 3");
        match e.kind {
            ExprKind::Binary { op: BinOp::Add, rhs, .. } => {
                assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("expected top-level add, got {other:?}"),
        }
    }

    #[test]
    fn sizeof_expr_yields_constant_without_evaluating_operand() {
        let e = parse_expr("sizeof(1 + 2)");
        assert!(matches!(e.kind, ExprKind::IntLit(4)));
    }

    #[test]
    fn sizeof_type_name_yields_pointer_size() {
        let e = parse_expr("sizeof(int*)");
        assert!(matches!(e.kind, ExprKind::IntLit(8)));
    }

    #[test]
    fn ternary_is_right_associative_and_decays_branches() {
        let e = parse_expr("1 ? 2 : 3 ? 4 : 5");
        assert!(matches!(e.kind, ExprKind::Ternary { .. }));
    }
}
