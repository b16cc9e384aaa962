//! # Declarators and Type Construction
//!
//! Parses declaration specifiers (storage class + type specifiers),
//! struct/union/enum specifiers with field layout, and declarators
//! (pointers, arrays, function parameter lists), producing the [`TypeRef`]
//! the rest of the parser attaches to declared names.

use crate::ast::types::{Field, Type, TypeKind, TypeRef};
use crate::compiler::error::CompileError;
use crate::compiler::lexer::Token;
use crate::compiler::parser::common::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    None,
    Typedef,
    Extern,
    Static,
    Auto,
    Register,
}

pub struct DeclSpec {
    pub storage: StorageClass,
    pub ty: TypeRef,
}

pub struct DeclarationParser;

impl DeclarationParser {
    /// Parses a `decl-specifiers` sequence. Returns `None` if the current
    /// token cannot start one (used by callers that need to distinguish a
    /// declaration from an expression statement).
    pub fn try_parse_decl_specs(p: &mut Parser) -> Result<Option<DeclSpec>, CompileError> {
        if !Self::starts_decl_specs(p)? {
            return Ok(None);
        }
        Ok(Some(Self::parse_decl_specs(p)?))
    }

    pub fn starts_decl_specs(p: &mut Parser) -> Result<bool, CompileError> {
        let is_kw = matches!(
            p.peek()?,
            Some(Token::Identifier(s)) if matches!(
                s.as_str(),
                "void" | "char" | "short" | "int" | "long" | "signed" | "unsigned" | "float"
                    | "double" | "struct" | "union" | "enum" | "typedef" | "extern" | "static"
                    | "auto" | "register" | "const" | "volatile" | "restrict"
            )
        );
        if is_kw {
            return Ok(true);
        }
        if let Some(Token::Identifier(name)) = p.peek()?.cloned().as_ref() {
            return Ok(p.lookup_typedef(name).is_some());
        }
        Ok(false)
    }

    pub fn parse_decl_specs(p: &mut Parser) -> Result<DeclSpec, CompileError> {
        let mut storage = StorageClass::None;
        let mut signed_seen = false;
        let mut unsigned_seen = false;
        let mut long_count = 0u32;
        let mut short_seen = false;
        let mut base: Option<TypeRef> = None;

        loop {
            let Some(Token::Identifier(word)) = p.peek()?.cloned() else {
                break;
            };
            match word.as_str() {
                "const" | "volatile" | "restrict" => {
                    p.advance()?;
                }
                "typedef" => {
                    storage = StorageClass::Typedef;
                    p.advance()?;
                }
                "extern" => {
                    storage = StorageClass::Extern;
                    p.advance()?;
                }
                "static" => {
                    storage = StorageClass::Static;
                    p.advance()?;
                }
                "auto" => {
                    storage = StorageClass::Auto;
                    p.advance()?;
                }
                "register" => {
                    storage = StorageClass::Register;
                    p.advance()?;
                }
                "signed" => {
                    signed_seen = true;
                    p.advance()?;
                }
                "unsigned" => {
                    unsigned_seen = true;
                    p.advance()?;
                }
                "short" => {
                    short_seen = true;
                    p.advance()?;
                }
                "long" => {
                    long_count += 1;
                    p.advance()?;
                }
                "void" => {
                    p.advance()?;
                    base = Some(p.prim.void.clone());
                }
                "char" => {
                    p.advance()?;
                    base = Some(p.prim.char.clone());
                }
                "int" => {
                    p.advance()?;
                    if base.is_none() {
                        base = Some(p.prim.int.clone());
                    }
                }
                "float" => {
                    p.advance()?;
                    base = Some(p.prim.float.clone());
                }
                "double" => {
                    p.advance()?;
                    base = Some(p.prim.double.clone());
                }
                "struct" => {
                    base = Some(Self::parse_struct_or_union(p, true)?);
                }
                "union" => {
                    base = Some(Self::parse_struct_or_union(p, false)?);
                }
                "enum" => {
                    base = Some(Self::parse_enum(p)?);
                }
                _ => {
                    if base.is_none() && storage == StorageClass::None && !signed_seen && !unsigned_seen {
                        if let Some(ty) = p.lookup_typedef(&word) {
                            p.advance()?;
                            base = Some(ty);
                            continue;
                        }
                    }
                    break;
                }
            }
        }

        let mut ty = base.unwrap_or_else(|| p.prim.int.clone());
        let base_kind = ty.borrow().kind;
        if base_kind == TypeKind::Double && long_count >= 1 {
            ty = p.prim.ldouble.clone();
        } else if short_seen {
            ty = if unsigned_seen { p.prim.ushort.clone() } else { p.prim.short.clone() };
        } else if long_count == 1 {
            ty = if unsigned_seen { p.prim.ulong.clone() } else { p.prim.long.clone() };
        } else if long_count >= 2 {
            ty = if unsigned_seen { p.prim.ullong.clone() } else { p.prim.llong.clone() };
        } else if unsigned_seen && ty.borrow().kind == TypeKind::Int {
            ty = p.prim.uint.clone();
        } else if unsigned_seen && ty.borrow().kind == TypeKind::Char {
            ty = p.prim.uchar.clone();
        }

        Ok(DeclSpec { storage, ty })
    }

    fn parse_struct_or_union(p: &mut Parser, is_struct: bool) -> Result<TypeRef, CompileError> {
        p.advance()?; // 'struct' / 'union'
        let tag = if let Some(Token::Identifier(_)) = p.peek()? {
            Some(p.expect_identifier()?)
        } else {
            None
        };

        if !p.check_punct('{' as i32)? {
            // Reference to a tag with no body: must already exist, or is a
            // forward declaration (a stub).
            let name = tag.ok_or_else(|| {
                CompileError::parser(p.pos(), "expected tag name or '{' after struct/union")
            })?;
            let existing = if is_struct {
                p.lookup_struct_tag(&name)
            } else {
                p.lookup_union_tag(&name)
            };
            return Ok(existing.unwrap_or_else(|| {
                let stub = Type::stub(name.clone(), is_struct);
                if is_struct {
                    p.declare_struct_tag(name, stub.clone());
                } else {
                    p.declare_union_tag(name, stub.clone());
                }
                stub
            }));
        }

        p.advance()?; // '{'
        let mut fields = Vec::new();
        let mut offset: i64 = 0;
        while !p.eat_punct('}' as i32)? {
            let spec = Self::parse_decl_specs(p)?;

            // An unnamed nested `struct { ... };` / `union { ... };` member
            // has no declarator at all; splice its own fields straight into
            // the enclosing table instead of nesting them under one name.
            if spec.ty.borrow().kind == TypeKind::Structure && p.check_punct(';' as i32)? {
                let nested = spec.ty.borrow();
                let align = nested.align();
                let base_offset = if is_struct {
                    if align > 0 {
                        offset = offset.div_ceil(align) * align;
                    }
                    offset
                } else {
                    0
                };
                for f in &nested.fields {
                    fields.push(Field {
                        name: f.name.clone(),
                        ty: f.ty.clone(),
                        offset: base_offset + f.offset,
                    });
                }
                if is_struct {
                    offset += nested.size;
                }
                drop(nested);
                p.advance()?; // ';'
                continue;
            }

            loop {
                let (name, field_ty) = Self::parse_declarator(p, spec.ty.clone())?;
                let align = field_ty.borrow().align();
                let field_size = field_ty.borrow().size;
                if is_struct {
                    if align > 0 {
                        offset = offset.div_ceil(align) * align;
                    }
                    fields.push(Field {
                        name,
                        ty: field_ty,
                        offset,
                    });
                    offset += field_size;
                } else {
                    fields.push(Field {
                        name,
                        ty: field_ty,
                        offset: 0,
                    });
                }
                if !p.eat_punct(',' as i32)? {
                    break;
                }
            }
            p.expect_punct(';' as i32)?;
        }

        let align = fields.iter().map(|f| f.ty.borrow().align()).max().unwrap_or(1);
        let size = if is_struct {
            offset.div_ceil(align.max(1)) * align.max(1)
        } else {
            fields.iter().map(|f| f.ty.borrow().size).max().unwrap_or(0)
        };

        let ty = Type::structure(tag.clone(), is_struct, fields, size);
        if let Some(name) = tag {
            if is_struct {
                p.declare_struct_tag(name, ty.clone());
            } else {
                p.declare_union_tag(name, ty.clone());
            }
        }
        Ok(ty)
    }

    /// `enum` contributes no type of its own: every enumerator is entered
    /// into the global environment as a constant-valued `int`, and the
    /// specifier itself resolves to plain `int`.
    fn parse_enum(p: &mut Parser) -> Result<TypeRef, CompileError> {
        p.advance()?; // 'enum'
        if let Some(Token::Identifier(_)) = p.peek()? {
            p.advance()?;
        }
        if p.eat_punct('{' as i32)? {
            let mut next_value: i64 = 0;
            loop {
                if p.check_punct('}' as i32)? {
                    break;
                }
                let name = p.expect_identifier()?;
                if p.eat_punct('=' as i32)? {
                    let expr = super::expression_parser::ExpressionParser::parse_assignment(p)?;
                    next_value = crate::compiler::constant::parse_evaluate(&expr)?;
                }
                let var = crate::ast::nodes::Var::new_global(name.clone(), p.prim.int.clone(), false);
                var.const_value.set(Some(next_value));
                p.declare_var(var);
                next_value += 1;
                if !p.eat_punct(',' as i32)? {
                    break;
                }
            }
            p.expect_punct('}' as i32)?;
        }
        Ok(p.prim.int.clone())
    }

    /// Parses a full declarator (pointer prefixes + direct declarator +
    /// suffixes) and returns the declared name together with its type.
    pub fn parse_declarator(p: &mut Parser, base: TypeRef) -> Result<(String, TypeRef), CompileError> {
        let mut ty = base;
        while p.eat_punct('*' as i32)? {
            while p.eat_keyword("const")? || p.eat_keyword("volatile")? || p.eat_keyword("restrict")? {}
            ty = Type::pointer_to(ty);
        }
        Self::direct_declarator(p, ty)
    }

    fn direct_declarator(p: &mut Parser, ty: TypeRef) -> Result<(String, TypeRef), CompileError> {
        if p.eat_punct('(' as i32)? {
            let placeholder = Type::stub(String::new(), true);
            let (name, outer) = Self::parse_declarator(p, placeholder.clone())?;
            p.expect_punct(')' as i32)?;
            let suffixed = Self::type_suffix(p, ty)?;
            *placeholder.borrow_mut() = suffixed.borrow().clone();
            Ok((name, outer))
        } else {
            let name = p.expect_identifier()?;
            let suffixed = Self::type_suffix(p, ty)?;
            Ok((name, suffixed))
        }
    }

    fn type_suffix(p: &mut Parser, ty: TypeRef) -> Result<TypeRef, CompileError> {
        if p.eat_punct('[' as i32)? {
            let len = if p.check_punct(']' as i32)? {
                -1
            } else {
                let expr = super::expression_parser::ExpressionParser::parse_assignment(p)?;
                crate::compiler::constant::parse_evaluate(&expr)?
            };
            p.expect_punct(']' as i32)?;
            let inner = Self::type_suffix(p, ty)?;
            Ok(Type::array_of(inner, len))
        } else if p.eat_punct('(' as i32)? {
            let (named, is_vararg) = Self::parse_param_list_named(p)?;
            p.expect_punct(')' as i32)?;
            p.pending_param_names = named.iter().map(|(n, _)| n.clone()).collect();
            let params = named.into_iter().map(|(_, t)| t).collect();
            Ok(Type::function(ty, params, is_vararg))
        } else {
            Ok(ty)
        }
    }

    /// Parses a parenthesised parameter list (the opening `(` has already
    /// been consumed), returning each parameter's name (empty for an
    /// abstract/unnamed parameter in a prototype) and type, together with
    /// whether the list ends in `...`.
    pub fn parse_param_list_named(
        p: &mut Parser,
    ) -> Result<(Vec<(String, TypeRef)>, bool), CompileError> {
        let mut params = Vec::new();
        let mut vararg = false;
        if p.check_punct(')' as i32)? {
            return Ok((params, false));
        }
        loop {
            if p.eat_punct(crate::compiler::lexer::punct::ELLIPSIS)? {
                vararg = true;
                break;
            }
            let spec = Self::parse_decl_specs(p)?;
            if params.is_empty() && spec.ty.borrow().kind == TypeKind::Void && p.check_punct(')' as i32)? {
                // `(void)` spells a zero-parameter list, not one `void` parameter.
                break;
            }
            if p.check_punct(',' as i32)? || p.check_punct(')' as i32)? {
                params.push((String::new(), spec.ty));
            } else {
                let (name, ty) = Self::parse_declarator(p, spec.ty)?;
                params.push((name, ty));
            }
            if !p.eat_punct(',' as i32)? {
                break;
            }
        }
        if params.len() > 6 {
            return Err(CompileError::semantic("too many function arguments"));
        }
        Ok((params, vararg))
    }
}
