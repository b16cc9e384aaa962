//! # Initialisers
//!
//! Flattens any braced or nested initialiser shape into an ordered list of
//! `(offset, field-type, value-expr)` triples, patching an unknown array
//! length once the element count is known. Designated initialisers
//! (`.field = x`, `[i] = x`) are not part of this language subset.

use crate::ast::nodes::{Expr, ExprKind, InitElem};
use crate::ast::types::{Type, TypeKind, TypeRef};
use crate::compiler::error::CompileError;
use crate::compiler::lexer::Token;
use crate::compiler::parser::common::Parser;
use crate::compiler::parser::expression_parser::ExpressionParser;

pub struct InitializerParser;

impl InitializerParser {
    pub fn parse_initializer(p: &mut Parser, ty: &TypeRef) -> Result<Vec<InitElem>, CompileError> {
        if Self::is_char_array(ty) {
            if let Some(Token::Str(_)) = p.peek()? {
                return Self::parse_string_item(p, ty, 0);
            }
        }
        if p.eat_punct('{' as i32)? {
            let elems = Self::parse_braced_list(p, ty, 0)?;
            p.expect_punct('}' as i32)?;
            Ok(elems)
        } else {
            Self::parse_item(p, ty, 0)
        }
    }

    fn is_char_array(ty: &TypeRef) -> bool {
        let t = ty.borrow();
        t.kind == TypeKind::Array
            && t.pointee
                .as_ref()
                .is_some_and(|p| p.borrow().kind == TypeKind::Char)
    }

    fn parse_braced_list(
        p: &mut Parser,
        ty: &TypeRef,
        base_offset: i64,
    ) -> Result<Vec<InitElem>, CompileError> {
        let kind = ty.borrow().kind;
        let mut elems = Vec::new();
        match kind {
            TypeKind::Structure => {
                let is_struct = ty.borrow().is_struct;
                let fields = ty.borrow().fields.clone();
                for field in fields.iter() {
                    if p.check_punct('}' as i32)? {
                        break;
                    }
                    elems.extend(Self::parse_item(p, &field.ty, base_offset + field.offset)?);
                    if !is_struct {
                        // Union initialisers set only the first member.
                        break;
                    }
                    if !p.eat_punct(',' as i32)? {
                        break;
                    }
                }
                let _ = p.eat_punct(',' as i32)?;
            }
            TypeKind::Array => {
                let elem_ty = ty.borrow().pointee.clone().unwrap();
                let elem_size = elem_ty.borrow().size;
                let mut count = 0i64;
                loop {
                    if p.check_punct('}' as i32)? {
                        break;
                    }
                    elems.extend(Self::parse_item(p, &elem_ty, base_offset + count * elem_size)?);
                    count += 1;
                    if !p.eat_punct(',' as i32)? {
                        break;
                    }
                }
                if ty.borrow().length < 0 {
                    Type::complete_array_len(ty, count);
                }
            }
            _ => {
                elems.extend(Self::parse_item(p, ty, base_offset)?);
                let _ = p.eat_punct(',' as i32)?;
            }
        }
        Ok(elems)
    }

    fn parse_item(p: &mut Parser, ty: &TypeRef, offset: i64) -> Result<Vec<InitElem>, CompileError> {
        if p.check_punct('{' as i32)? {
            p.advance()?;
            let inner = Self::parse_braced_list(p, ty, offset)?;
            p.expect_punct('}' as i32)?;
            return Ok(inner);
        }
        if Self::is_char_array(ty) {
            if let Some(Token::Str(_)) = p.peek()? {
                return Self::parse_string_item(p, ty, offset);
            }
        }
        let value = ExpressionParser::decay(ExpressionParser::parse_assignment(p)?);
        Ok(vec![InitElem {
            offset,
            ty: ty.clone(),
            value,
        }])
    }

    /// `char[]` initialised from a string literal expands to one element
    /// per byte plus a NUL terminator; an unspecified array length is set
    /// accordingly.
    fn parse_string_item(p: &mut Parser, ty: &TypeRef, offset: i64) -> Result<Vec<InitElem>, CompileError> {
        let Some(Token::Str(bytes)) = p.advance()? else {
            unreachable!("caller already confirmed a string token");
        };
        let mut with_nul = bytes;
        with_nul.push(0);
        if ty.borrow().length < 0 {
            Type::complete_array_len(ty, with_nul.len() as i64);
        }
        let char_ty = ty.borrow().pointee.clone().unwrap();
        let elems = with_nul
            .iter()
            .enumerate()
            .map(|(i, b)| InitElem {
                offset: offset + i as i64,
                ty: char_ty.clone(),
                value: Expr {
                    kind: ExprKind::IntLit(*b as i64),
                    ty: char_ty.clone(),
                },
            })
            .collect();
        Ok(elems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::Primitives;

    #[test]
    fn char_array_from_string_sets_length_including_nul() {
        let mut p = Parser::new(r#""abc""#);
        let prim = Primitives::new();
        let ty = Type::array_of(prim.char.clone(), -1);
        let elems = InitializerParser::parse_initializer(&mut p, &ty).unwrap();
        assert_eq!(elems.len(), 4);
        assert_eq!(ty.borrow().length, 4);
    }

    #[test]
    fn braced_array_initialiser_sets_unknown_length_from_element_count() {
        let mut p = Parser::new("{1, 2, 3}");
        let prim = Primitives::new();
        let ty = Type::array_of(prim.int.clone(), -1);
        let elems = InitializerParser::parse_initializer(&mut p, &ty).unwrap();
        assert_eq!(elems.len(), 3);
        assert_eq!(ty.borrow().length, 3);
    }
}
