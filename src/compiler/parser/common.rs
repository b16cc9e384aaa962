//! # Parser Core
//!
//! The [`Parser`] struct owns the token stream and every symbol table named
//! in the data model: the global environment, the local-scope stack, the
//! struct/union tag tables, the typedef table, and the per-function label
//! table. Declarator, expression, and statement parsing are implemented as
//! associated functions in sibling modules that borrow `&mut Parser`.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::nodes::{FloatLit, GotoTarget, StringLit, Var};
use crate::ast::types::{Primitives, TypeRef};
use crate::compiler::error::CompileError;
use crate::compiler::lexer::{Lexer, Token};

/// One lexical scope of local variables. A fresh one is pushed at each
/// function body and at each compound statement.
#[derive(Default)]
pub struct Scope {
    pub vars: HashMap<String, Rc<Var>>,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    /// One token of lookahead beyond the lexer's own pushback, so `peek`
    /// and `check` don't need `&mut` gymnastics at every call site.
    current: Option<Token>,
    pub prim: Primitives,

    pub globals: HashMap<String, Rc<Var>>,
    pub functions: HashMap<String, TypeRef>,
    pub typedefs: HashMap<String, TypeRef>,

    /// Index 0 is the file-scope tag table; scopes are pushed for function
    /// bodies and compound statements, mirroring `locals`.
    pub struct_tags: Vec<HashMap<String, TypeRef>>,
    pub union_tags: Vec<HashMap<String, TypeRef>>,
    pub locals: Vec<Scope>,

    /// label name -> generated assembly label, reset per function.
    pub labels: HashMap<String, String>,
    pub gotos: Vec<Rc<GotoTarget>>,
    /// Names that have actually appeared as a `label:` definition, used to
    /// catch both duplicate labels and gotos with no matching definition.
    defined_labels: std::collections::HashSet<String>,
    /// Every local (including parameters and nested-block locals) declared
    /// since the last [`Parser::reset_labels`], for the enclosing
    /// `FunctionDef::locals` table the code generator uses to lay out the
    /// stack frame.
    fn_locals: Vec<Rc<Var>>,
    /// Parameter names captured by the most recently parsed function-type
    /// declarator suffix. A defining declarator reads this immediately
    /// after `parse_declarator` returns, since only one parameter list is
    /// relevant to a function definition.
    pub pending_param_names: Vec<String>,

    pub strings: Vec<Rc<StringLit>>,
    pub floats: Vec<Rc<FloatLit>>,

    label_counter: u64,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(source),
            current: None,
            prim: Primitives::new(),
            globals: HashMap::new(),
            functions: HashMap::new(),
            typedefs: HashMap::new(),
            struct_tags: vec![HashMap::new()],
            union_tags: vec![HashMap::new()],
            locals: Vec::new(),
            labels: HashMap::new(),
            gotos: Vec::new(),
            defined_labels: std::collections::HashSet::new(),
            fn_locals: Vec::new(),
            pending_param_names: Vec::new(),
            strings: Vec::new(),
            floats: Vec::new(),
            label_counter: 0,
        }
    }

    pub fn pos(&self) -> usize {
        self.lexer.pos()
    }

    fn fill(&mut self) -> Result<(), CompileError> {
        if self.current.is_none() {
            self.current = self.lexer.next()?;
        }
        Ok(())
    }

    /// Returns the current token without consuming it.
    pub fn peek(&mut self) -> Result<Option<&Token>, CompileError> {
        self.fill()?;
        Ok(self.current.as_ref())
    }

    /// Consumes and returns the current token.
    pub fn advance(&mut self) -> Result<Option<Token>, CompileError> {
        self.fill()?;
        Ok(self.current.take())
    }

    /// Pushes a token back in front of the stream, e.g. to backtrack out of
    /// a speculative declarator parse.
    pub fn unget(&mut self, tok: Token) {
        if let Some(cur) = self.current.take() {
            self.lexer.unget(cur);
        }
        self.current = Some(tok);
    }

    pub fn is_at_end(&mut self) -> Result<bool, CompileError> {
        Ok(self.peek()?.is_none())
    }

    /// True if the current token is the given punctuator, without consuming it.
    pub fn check_punct(&mut self, code: i32) -> Result<bool, CompileError> {
        Ok(matches!(self.peek()?, Some(Token::Punct(c)) if *c == code))
    }

    /// Consumes the current token if it is the given punctuator.
    pub fn eat_punct(&mut self, code: i32) -> Result<bool, CompileError> {
        if self.check_punct(code)? {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consumes the given punctuator or raises a syntax error.
    pub fn expect_punct(&mut self, code: i32) -> Result<(), CompileError> {
        if self.eat_punct(code)? {
            Ok(())
        } else {
            Err(CompileError::parser(
                self.pos(),
                format!("expected '{}'", describe_punct(code)),
            ))
        }
    }

    /// Consumes an identifier token and returns its text, or raises a
    /// syntax error.
    pub fn expect_identifier(&mut self) -> Result<String, CompileError> {
        match self.advance()? {
            Some(Token::Identifier(name)) => Ok(name),
            _ => Err(CompileError::parser(self.pos(), "expected identifier")),
        }
    }

    /// True if the current token is the identifier with this exact text
    /// (used to recognize keywords, which the lexer does not classify).
    pub fn check_keyword(&mut self, kw: &str) -> Result<bool, CompileError> {
        Ok(matches!(self.peek()?, Some(Token::Identifier(s)) if s == kw))
    }

    pub fn eat_keyword(&mut self, kw: &str) -> Result<bool, CompileError> {
        if self.check_keyword(kw)? {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // --- Scoping -----------------------------------------------------

    pub fn push_scope(&mut self) {
        self.locals.push(Scope::default());
        self.struct_tags.push(HashMap::new());
        self.union_tags.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.locals.pop();
        self.struct_tags.pop();
        self.union_tags.pop();
    }

    /// Declares a local in the innermost scope, or a global if no local
    /// scope is active.
    pub fn declare_var(&mut self, var: Rc<Var>) {
        if let Some(scope) = self.locals.last_mut() {
            scope.vars.insert(var.name.clone(), var.clone());
            if var.is_local {
                self.fn_locals.push(var);
            }
        } else {
            self.globals.insert(var.name.clone(), var);
        }
    }

    /// Drains the locals accumulated for the function currently being
    /// parsed, leaving the accumulator empty for the next one.
    pub fn take_fn_locals(&mut self) -> Vec<Rc<Var>> {
        std::mem::take(&mut self.fn_locals)
    }

    /// Looks a name up through the local scope chain (innermost first),
    /// falling back to the global environment.
    pub fn lookup_var(&self, name: &str) -> Option<Rc<Var>> {
        for scope in self.locals.iter().rev() {
            if let Some(v) = scope.vars.get(name) {
                return Some(v.clone());
            }
        }
        self.globals.get(name).cloned()
    }

    pub fn lookup_struct_tag(&self, name: &str) -> Option<TypeRef> {
        for table in self.struct_tags.iter().rev() {
            if let Some(t) = table.get(name) {
                return Some(t.clone());
            }
        }
        None
    }

    pub fn lookup_union_tag(&self, name: &str) -> Option<TypeRef> {
        for table in self.union_tags.iter().rev() {
            if let Some(t) = table.get(name) {
                return Some(t.clone());
            }
        }
        None
    }

    pub fn declare_struct_tag(&mut self, name: String, ty: TypeRef) {
        self.struct_tags.last_mut().unwrap().insert(name, ty);
    }

    pub fn declare_union_tag(&mut self, name: String, ty: TypeRef) {
        self.union_tags.last_mut().unwrap().insert(name, ty);
    }

    pub fn lookup_typedef(&self, name: &str) -> Option<TypeRef> {
        self.typedefs.get(name).cloned()
    }

    // --- Labels --------------------------------------------------------

    /// Resets per-function label state at the start of each function body.
    pub fn reset_labels(&mut self) {
        self.labels.clear();
        self.gotos.clear();
        self.defined_labels.clear();
    }

    /// Records a `label:` definition. Returns `false` if the name was
    /// already defined in this function, which the caller reports as a
    /// semantic error.
    pub fn define_label(&mut self, name: &str) -> bool {
        self.defined_labels.insert(name.to_string())
    }

    /// Checks that every `goto` target referenced so far was actually
    /// defined by a `label:` statement, after a function body is complete.
    pub fn check_gotos_resolved(&self) -> Result<(), CompileError> {
        for target in &self.gotos {
            if !self.defined_labels.contains(&target.name) {
                return Err(CompileError::semantic(format!(
                    "goto to undefined label '{}'",
                    target.name
                )));
            }
        }
        Ok(())
    }

    /// Returns the generated label for a named C label, creating one on
    /// first reference (from either the `label:` definition or an earlier
    /// `goto`).
    pub fn label_for(&mut self, name: &str) -> String {
        if let Some(existing) = self.labels.get(name) {
            return existing.clone();
        }
        let generated = self.fresh_label();
        self.labels.insert(name.to_string(), generated.clone());
        generated
    }

    pub fn fresh_label(&mut self) -> String {
        let n = self.label_counter;
        self.label_counter += 1;
        format!(".L{n}")
    }

    pub fn add_string(&mut self, bytes: Vec<u8>) -> Rc<StringLit> {
        let label = self.fresh_label();
        let lit = Rc::new(StringLit { bytes, label });
        self.strings.push(lit.clone());
        lit
    }

    pub fn add_float(&mut self, value: f64, is_float: bool) -> Rc<FloatLit> {
        let label = self.fresh_label();
        let lit = Rc::new(FloatLit {
            value,
            is_float,
            label,
        });
        self.floats.push(lit.clone());
        lit
    }
}

fn describe_punct(code: i32) -> String {
    use crate::compiler::lexer::punct;
    match code {
        punct::INCREMENT => "++".to_string(),
        punct::DECREMENT => "--".to_string(),
        punct::ARROW => "->".to_string(),
        punct::PLUS_EQ => "+=".to_string(),
        punct::MINUS_EQ => "-=".to_string(),
        punct::STAR_EQ => "*=".to_string(),
        punct::SLASH_EQ => "/=".to_string(),
        punct::PERCENT_EQ => "%=".to_string(),
        punct::AND_EQ => "&=".to_string(),
        punct::OR_EQ => "|=".to_string(),
        punct::XOR_EQ => "^=".to_string(),
        punct::AND_AND => "&&".to_string(),
        punct::OR_OR => "||".to_string(),
        punct::EQ_EQ => "==".to_string(),
        punct::NOT_EQ => "!=".to_string(),
        punct::LE => "<=".to_string(),
        punct::GE => ">=".to_string(),
        punct::SHL => "<<".to_string(),
        punct::SHR => ">>".to_string(),
        punct::SHL_EQ => "<<=".to_string(),
        punct::SHR_EQ => ">>=".to_string(),
        punct::ELLIPSIS => "...".to_string(),
        c if (0x20..0x7f).contains(&c) => (c as u8 as char).to_string(),
        c => format!("<punct {c:#x}>"),
    }
}
