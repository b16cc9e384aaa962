//! # AST Nodes
//!
//! This module defines the fundamental data structures (nodes) that make up
//! the typed Abstract Syntax Tree produced by the parser. Every expression
//! node carries a pointer to its result type; statements and declarations
//! carry the `void` primitive instead.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::ast::types::TypeRef;

/// The root of a translation unit: an ordered list of top-level declarations
/// and function definitions, in source order.
#[derive(Debug)]
pub struct Program {
    pub items: Vec<TopLevel>,
    /// Every string literal seen during parsing, in first-use order, for
    /// `.rodata` emission.
    pub strings: Vec<Rc<StringLit>>,
    /// Every floating literal seen during parsing, for bit-pattern emission.
    pub floats: Vec<Rc<FloatLit>>,
}

#[derive(Debug)]
pub enum TopLevel {
    Function(Rc<FunctionDef>),
    GlobalVar {
        var: Rc<Var>,
        init: Vec<InitElem>,
    },
}

/// A declared variable: local, parameter, or global.
#[derive(Debug)]
pub struct Var {
    pub name: String,
    pub ty: TypeRef,
    pub is_local: bool,
    pub is_static: bool,
    /// Frame offset from `%rbp`, filled in by the code generator. Negative
    /// for locals and spilled parameters.
    pub offset: Cell<i64>,
    /// Assembly label for globals (and `static` locals, which get a unique
    /// generated label since they are emitted once in `.data`/`.bss`).
    pub label: RefCell<Option<String>>,
    /// Compile-time constant value, set for globals whose initialiser folds
    /// to a constant and for enum constants.
    pub const_value: Cell<Option<i64>>,
}

impl Var {
    pub fn new_local(name: String, ty: TypeRef) -> Rc<Var> {
        Rc::new(Var {
            name,
            ty,
            is_local: true,
            is_static: false,
            offset: Cell::new(0),
            label: RefCell::new(None),
            const_value: Cell::new(None),
        })
    }

    pub fn new_global(name: String, ty: TypeRef, is_static: bool) -> Rc<Var> {
        let label = if is_static { None } else { Some(name.clone()) };
        Rc::new(Var {
            name,
            ty,
            is_local: false,
            is_static,
            offset: Cell::new(0),
            label: RefCell::new(label),
            const_value: Cell::new(None),
        })
    }
}

#[derive(Debug)]
pub struct StringLit {
    pub bytes: Vec<u8>,
    pub label: String,
}

#[derive(Debug)]
pub struct FloatLit {
    pub value: f64,
    pub is_float: bool,
    pub label: String,
}

/// A function definition: signature, locals, and body.
#[derive(Debug)]
pub struct FunctionDef {
    pub name: String,
    pub ty: TypeRef,
    pub params: Vec<Rc<Var>>,
    pub locals: RefCell<Vec<Rc<Var>>>,
    pub body: Stmt,
    pub is_static: bool,
    /// Every `goto` inside this function, collected so their targets can be
    /// resolved once the whole body has been parsed.
    pub gotos: RefCell<Vec<Rc<GotoTarget>>>,
}

/// The resolution cell shared between a `goto` statement and the label table
/// entry its name refers to; patched once the matching `label:` is parsed
/// (the label may come before OR after the goto).
#[derive(Debug)]
pub struct GotoTarget {
    pub name: String,
    pub resolved_label: RefCell<Option<String>>,
}

/// One element of a flattened initialiser: a byte offset within the
/// declared object, the type stored there, and the value expression.
#[derive(Debug)]
pub struct InitElem {
    pub offset: i64,
    pub ty: TypeRef,
    pub value: Expr,
}

/// All binary operators, including the wide ones given distinct kinds
/// (`<<`, `>>`, `==`, `!=`, `<=`, `>=`, `&&`, `||`) rather than reusing
/// single-char ASCII codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    LogAnd,
    LogOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDec {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

/// A typed expression node.
#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeRef,
}

#[derive(Debug)]
pub enum ExprKind {
    IntLit(i64),
    FloatLit(Rc<FloatLit>),
    StringLit(Rc<StringLit>),
    /// Reference to a local variable or parameter.
    LocalVar(Rc<Var>),
    /// Reference to a global variable.
    GlobalVar(Rc<Var>),
    /// A call to a named function; `param_types` is `Some` for a call to a
    /// known-prototyped function (used to classify integer/float args at
    /// codegen time), `None` for an implicit/unprototyped call.
    Call {
        name: String,
        args: Vec<Expr>,
        param_types: Option<Vec<TypeRef>>,
        is_vararg: bool,
    },
    AddrOf(Box<Expr>),
    Deref(Box<Expr>),
    /// `target.field` / `target->field`, already reduced to a flat offset
    /// from `target`'s address.
    Field {
        target: Box<Expr>,
        offset: i64,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// An explicit `(type)expr` cast; the target type is `self.ty`.
    Cast(Box<Expr>),
    IncDec {
        op: IncDec,
        target: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A compound assignment (`+=`, `-=`, ...), kept distinct from a plain
    /// assignment of a binary expression so codegen can avoid re-evaluating
    /// the lvalue's address twice.
    CompoundAssign {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    BitNot,
}

/// A statement node. Statements have type `void`; they carry no `ty` field
/// of their own.
#[derive(Debug)]
pub enum Stmt {
    Expr(Expr),
    Decl {
        var: Rc<Var>,
        init: Vec<InitElem>,
    },
    Compound(Vec<Stmt>),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Switch {
        selector: Expr,
        body: Box<Stmt>,
    },
    Case(i64),
    Default,
    Break,
    Continue,
    Return(Option<Expr>),
    Goto(Rc<GotoTarget>),
    Label(String),
    Empty,
}
