//! # Parser Module
//!
//! The entry point for the fused syntactic-and-semantic analysis phase. It
//! drives top-level declaration parsing, disambiguating a function
//! definition from a prototype or a global-variable declaration by whether
//! a declarator's type is a function type and whether a `{` follows.

pub mod common;
pub mod declarations;
pub mod expression_parser;
pub mod initializers;
pub mod statement_parser;

use std::rc::Rc;

use crate::ast::nodes::{FunctionDef, Program, TopLevel, Var};
use crate::ast::types::TypeKind;
use crate::compiler::error::CompileError;
use common::Parser;
use declarations::{DeclarationParser, StorageClass};
use initializers::InitializerParser;
use statement_parser::StatementParser;

pub fn parse(source: &str) -> Result<Program, CompileError> {
    let mut parser = Parser::new(source);
    let mut items = Vec::new();

    while !parser.is_at_end()? {
        parse_top_level(&mut parser, &mut items)?;
    }

    Ok(Program {
        items,
        strings: parser.strings,
        floats: parser.floats,
    })
}

fn parse_top_level(p: &mut Parser, items: &mut Vec<TopLevel>) -> Result<(), CompileError> {
    let spec = DeclarationParser::parse_decl_specs(p)?;

    // A bare `struct foo { ... };` / `enum { ... };` with no declarator.
    if p.eat_punct(';' as i32)? {
        return Ok(());
    }

    loop {
        let (name, ty) = DeclarationParser::parse_declarator(p, spec.ty.clone())?;

        if spec.storage == StorageClass::Typedef {
            p.typedefs.insert(name, ty);
        } else if ty.borrow().kind == TypeKind::Function {
            p.functions.entry(name.clone()).or_insert_with(|| ty.clone());
            if p.check_punct('{' as i32)? {
                let def = parse_function_body(p, name, ty, spec.storage == StorageClass::Static)?;
                items.push(TopLevel::Function(Rc::new(def)));
                return Ok(());
            }
        } else {
            let is_static = spec.storage == StorageClass::Static;
            let var = Var::new_global(name, ty.clone(), is_static);
            let init = if p.eat_punct('=' as i32)? {
                InitializerParser::parse_initializer(p, &var.ty)?
            } else {
                Vec::new()
            };
            if let [elem] = init.as_slice() {
                if elem.offset == 0 {
                    if let Ok(value) = crate::compiler::constant::parse_evaluate(&elem.value) {
                        var.const_value.set(Some(value));
                    }
                }
            }
            p.declare_var(var.clone());
            items.push(TopLevel::GlobalVar { var, init });
        }

        if !p.eat_punct(',' as i32)? {
            break;
        }
    }
    p.expect_punct(';' as i32)?;
    Ok(())
}

fn parse_function_body(
    p: &mut Parser,
    name: String,
    ty: crate::ast::types::TypeRef,
    is_static: bool,
) -> Result<FunctionDef, CompileError> {
    p.reset_labels();
    p.push_scope();

    let param_types = ty.borrow().params.clone();
    let param_names = std::mem::take(&mut p.pending_param_names);
    let mut params = Vec::with_capacity(param_types.len());
    for (i, param_ty) in param_types.iter().enumerate() {
        let pname = param_names
            .get(i)
            .filter(|n| !n.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("__param{i}"));
        let var = Var::new_local(pname, param_ty.clone());
        p.declare_var(var.clone());
        params.push(var);
    }

    let body = StatementParser::parse_compound(p)?;
    p.check_gotos_resolved()?;

    let locals = p.take_fn_locals();
    p.pop_scope();

    Ok(FunctionDef {
        name,
        ty,
        params,
        locals: std::cell::RefCell::new(locals),
        body,
        is_static,
        gotos: std::cell::RefCell::new(p.gotos.drain(..).collect()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_function_definition_with_a_call() {
        let program = parse("int add(int a, int b) { return a + b; }\nint main(void) { return add(1, 2); }").unwrap();
        assert_eq!(program.items.len(), 2);
        assert!(matches!(program.items[0], TopLevel::Function(_)));
    }

    #[test]
    fn parses_a_global_with_constant_initialiser() {
        let program = parse("int counter = 42;").unwrap();
        match &program.items[0] {
            TopLevel::GlobalVar { var, .. } => assert_eq!(var.const_value.get(), Some(42)),
            other => panic!("expected GlobalVar, got {other:?}"),
        }
    }

    #[test]
    fn parses_a_prototype_without_a_body() {
        let program = parse("int puts(const char *s);\nint main(void) { return puts(\"hi\"); }").unwrap();
        assert_eq!(program.items.len(), 1);
    }
}
