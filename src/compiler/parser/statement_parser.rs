//! # Statement Parser
//!
//! Recursive-descent parsing of statements and local declarations. Break,
//! continue, and switch/case label bookkeeping happen purely structurally
//! here as plain AST nodes; the label-stack management that realises them
//! in assembly (save/restore per nested construct) belongs to the code
//! generator.

use std::rc::Rc;

use crate::ast::nodes::{GotoTarget, Stmt, Var};
use crate::compiler::constant::parse_evaluate;
use crate::compiler::error::CompileError;
use crate::compiler::lexer::Token;
use crate::compiler::parser::common::Parser;
use crate::compiler::parser::declarations::{DeclarationParser, StorageClass};
use crate::compiler::parser::expression_parser::ExpressionParser;
use crate::compiler::parser::initializers::InitializerParser;

pub struct StatementParser;

impl StatementParser {
    pub fn parse_statement(p: &mut Parser) -> Result<Stmt, CompileError> {
        if p.check_punct('{' as i32)? {
            return Self::parse_compound(p);
        }
        if p.check_keyword("if")? {
            return Self::parse_if(p);
        }
        if p.check_keyword("while")? {
            return Self::parse_while(p);
        }
        if p.check_keyword("do")? {
            return Self::parse_do_while(p);
        }
        if p.check_keyword("for")? {
            return Self::parse_for(p);
        }
        if p.check_keyword("switch")? {
            return Self::parse_switch(p);
        }
        if p.eat_keyword("case")? {
            let expr = ExpressionParser::parse_assignment(p)?;
            let value = parse_evaluate(&expr)?;
            p.expect_punct(':' as i32)?;
            return Ok(Stmt::Case(value));
        }
        if p.eat_keyword("default")? {
            p.expect_punct(':' as i32)?;
            return Ok(Stmt::Default);
        }
        if p.eat_keyword("break")? {
            p.expect_punct(';' as i32)?;
            return Ok(Stmt::Break);
        }
        if p.eat_keyword("continue")? {
            p.expect_punct(';' as i32)?;
            return Ok(Stmt::Continue);
        }
        if p.eat_keyword("return")? {
            if p.eat_punct(';' as i32)? {
                return Ok(Stmt::Return(None));
            }
            let expr = ExpressionParser::parse_expression(p)?;
            p.expect_punct(';' as i32)?;
            return Ok(Stmt::Return(Some(expr)));
        }
        if p.eat_keyword("goto")? {
            let name = p.expect_identifier()?;
            p.expect_punct(';' as i32)?;
            let label = p.label_for(&name);
            let target = Rc::new(GotoTarget {
                name,
                resolved_label: std::cell::RefCell::new(Some(label)),
            });
            p.gotos.push(target.clone());
            return Ok(Stmt::Goto(target));
        }
        if p.eat_punct(';' as i32)? {
            return Ok(Stmt::Empty);
        }

        // `identifier ':'` is a label statement. Tentatively consume the
        // identifier and check for the colon; put it back otherwise so it
        // can be reparsed as a declaration or expression.
        if let Some(Token::Identifier(name)) = p.peek()?.cloned() {
            if p.lookup_typedef(&name).is_none() {
                p.advance()?;
                if p.eat_punct(':' as i32)? {
                    return Self::parse_label(p, name);
                }
                p.unget(Token::Identifier(name));
            }
        }

        if DeclarationParser::starts_decl_specs(p)? {
            return Self::parse_local_declaration(p);
        }

        let expr = ExpressionParser::parse_expression(p)?;
        p.expect_punct(';' as i32)?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_label(p: &mut Parser, name: String) -> Result<Stmt, CompileError> {
        if !p.define_label(&name) {
            return Err(CompileError::semantic(format!(
                "label '{name}' defined more than once"
            )));
        }
        let label = p.label_for(&name);
        Ok(Stmt::Label(label))
    }

    pub fn parse_compound(p: &mut Parser) -> Result<Stmt, CompileError> {
        p.expect_punct('{' as i32)?;
        p.push_scope();
        let mut stmts = Vec::new();
        while !p.eat_punct('}' as i32)? {
            stmts.push(Self::parse_statement(p)?);
        }
        p.pop_scope();
        Ok(Stmt::Compound(stmts))
    }

    fn parse_if(p: &mut Parser) -> Result<Stmt, CompileError> {
        p.advance()?; // 'if'
        p.expect_punct('(' as i32)?;
        let cond = ExpressionParser::parse_expression(p)?;
        p.expect_punct(')' as i32)?;
        let then_branch = Box::new(Self::parse_statement(p)?);
        let else_branch = if p.eat_keyword("else")? {
            Some(Box::new(Self::parse_statement(p)?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(p: &mut Parser) -> Result<Stmt, CompileError> {
        p.advance()?; // 'while'
        p.expect_punct('(' as i32)?;
        let cond = ExpressionParser::parse_expression(p)?;
        p.expect_punct(')' as i32)?;
        let body = Box::new(Self::parse_statement(p)?);
        Ok(Stmt::While { cond, body })
    }

    fn parse_do_while(p: &mut Parser) -> Result<Stmt, CompileError> {
        p.advance()?; // 'do'
        let body = Box::new(Self::parse_statement(p)?);
        if !p.eat_keyword("while")? {
            return Err(CompileError::parser(
                p.pos(),
                "expected 'while' after do-statement body",
            ));
        }
        p.expect_punct('(' as i32)?;
        let cond = ExpressionParser::parse_expression(p)?;
        p.expect_punct(')' as i32)?;
        p.expect_punct(';' as i32)?;
        Ok(Stmt::DoWhile { body, cond })
    }

    fn parse_for(p: &mut Parser) -> Result<Stmt, CompileError> {
        p.advance()?; // 'for'
        p.expect_punct('(' as i32)?;
        p.push_scope();
        let init = if p.eat_punct(';' as i32)? {
            None
        } else if DeclarationParser::starts_decl_specs(p)? {
            Some(Box::new(Self::parse_local_declaration(p)?))
        } else {
            let e = ExpressionParser::parse_expression(p)?;
            p.expect_punct(';' as i32)?;
            Some(Box::new(Stmt::Expr(e)))
        };
        let cond = if p.check_punct(';' as i32)? {
            None
        } else {
            Some(ExpressionParser::parse_expression(p)?)
        };
        p.expect_punct(';' as i32)?;
        let step = if p.check_punct(')' as i32)? {
            None
        } else {
            Some(ExpressionParser::parse_expression(p)?)
        };
        p.expect_punct(')' as i32)?;
        let body = Box::new(Self::parse_statement(p)?);
        p.pop_scope();
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
        })
    }

    fn parse_switch(p: &mut Parser) -> Result<Stmt, CompileError> {
        p.advance()?; // 'switch'
        p.expect_punct('(' as i32)?;
        let selector = ExpressionParser::parse_expression(p)?;
        p.expect_punct(')' as i32)?;
        let body = Box::new(Self::parse_statement(p)?);
        Ok(Stmt::Switch { selector, body })
    }

    fn parse_local_declaration(p: &mut Parser) -> Result<Stmt, CompileError> {
        let spec = DeclarationParser::parse_decl_specs(p)?;
        let (name, ty) = DeclarationParser::parse_declarator(p, spec.ty)?;

        if spec.storage == StorageClass::Typedef {
            p.typedefs.insert(name, ty);
            p.expect_punct(';' as i32)?;
            return Ok(Stmt::Empty);
        }

        let is_static = spec.storage == StorageClass::Static;
        let var = if is_static {
            let label = p.fresh_label();
            Var::new_global(format!("__static_{name}{label}"), ty, true)
        } else {
            Var::new_local(name, ty)
        };
        p.declare_var(var.clone());

        let init = if p.eat_punct('=' as i32)? {
            InitializerParser::parse_initializer(p, &var.ty)?
        } else {
            Vec::new()
        };
        p.expect_punct(';' as i32)?;
        Ok(Stmt::Decl { var, init })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(src: &str) -> Stmt {
        let mut p = Parser::new(src);
        let stmt = StatementParser::parse_statement(&mut p).unwrap();
        p.check_gotos_resolved().unwrap();
        stmt
    }

    #[test]
    fn if_else_nests_branches() {
        let stmt = body_of("if (1) return 1; else return 2;");
        match stmt {
            Stmt::If { else_branch, .. } => assert!(else_branch.is_some()),
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn for_init_declaration_scopes_to_the_loop() {
        let stmt = body_of("for (int i = 0; i < 10; i = i + 1) { i; }");
        match stmt {
            Stmt::For { init, .. } => {
                assert!(matches!(init, Some(b) if matches!(*b, Stmt::Decl { .. })))
            }
            other => panic!("expected For, got {other:?}"),
        }
    }

    #[test]
    fn switch_accepts_case_labels_nested_arbitrarily_deep() {
        let stmt = body_of("switch (x) { case 1: { case 2: break; } default: break; }");
        assert!(matches!(stmt, Stmt::Switch { .. }));
    }

    #[test]
    fn goto_before_its_label_resolves_once_the_label_is_seen() {
        let mut p = Parser::new("{ goto done; done: ; }");
        let stmt = StatementParser::parse_statement(&mut p).unwrap();
        p.check_gotos_resolved().unwrap();
        assert!(matches!(stmt, Stmt::Compound(_)));
    }

    #[test]
    fn goto_with_no_matching_label_is_rejected() {
        let mut p = Parser::new("{ goto nowhere; }");
        StatementParser::parse_statement(&mut p).unwrap();
        assert!(p.check_gotos_resolved().is_err());
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let mut p = Parser::new("{ a: ; a: ; }");
        assert!(StatementParser::parse_statement(&mut p).is_err());
    }
}
