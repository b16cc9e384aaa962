//! # Type Descriptors
//!
//! This module defines the set of type descriptors available in the subset of
//! C implemented by `lice`, and implements the structural equality and usual
//! arithmetic conversion rules the parser needs while building the typed AST.

use std::cell::RefCell;
use std::rc::Rc;

/// A shared, mutably-patchable type descriptor.
///
/// Types are allocated once and shared by reference (every AST node that has
/// a given type holds a clone of the same `Rc`), mirroring the arena-owned,
/// never-freed type table described by the source this compiler is modelled
/// on. `RefCell` lets an array's `length`/`size` be patched in place once an
/// initialiser determines an unspecified bound (see `Type::complete_array_len`).
pub type TypeRef = Rc<RefCell<Type>>;

/// The tag identifying which shape a [`Type`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Void,
    Char,
    Short,
    Int,
    Long,
    LLong,
    Float,
    Double,
    LDouble,
    Array,
    Pointer,
    Structure,
    Function,
    /// A forward-declared struct/union tag with no body yet.
    Stub,
}

impl TypeKind {
    /// Whether this kind denotes an integer type for the purposes of the
    /// usual arithmetic conversions and codegen register class selection.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            TypeKind::Char | TypeKind::Short | TypeKind::Int | TypeKind::Long | TypeKind::LLong
        )
    }

    /// Whether this kind denotes a floating type (carried in `xmm` registers).
    pub fn is_floating(self) -> bool {
        matches!(self, TypeKind::Float | TypeKind::Double | TypeKind::LDouble)
    }

    pub fn is_pointer_like(self) -> bool {
        matches!(self, TypeKind::Pointer | TypeKind::Array)
    }
}

/// One field of a struct/union type.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    pub offset: i64,
}

/// A type descriptor.
///
/// Carries primitive tag, byte size, signedness, an array length (`-1` when
/// unknown/incomplete), a pointee for pointers/arrays, a field table for
/// aggregates, and a return/parameter/varargs signature for functions.
#[derive(Debug, Clone)]
pub struct Type {
    pub kind: TypeKind,
    pub size: i64,
    pub is_unsigned: bool,
    /// Element count for `Array`, `-1` when unknown. Unused otherwise.
    pub length: i64,
    /// Pointee type for `Pointer`/`Array`.
    pub pointee: Option<TypeRef>,
    /// Field table for `Structure`.
    pub fields: Vec<Field>,
    /// `true` for `struct`, `false` for `union` (only meaningful when
    /// `kind == Structure`).
    pub is_struct: bool,
    /// Tag name, for named struct/union/stub types.
    pub tag: Option<String>,
    /// Return type for `Function`.
    pub returning: Option<TypeRef>,
    /// Parameter types for `Function` (empty for stub/unprototyped).
    pub params: Vec<TypeRef>,
    pub is_vararg: bool,
    pub is_static: bool,
}

impl Type {
    fn primitive(kind: TypeKind, size: i64, is_unsigned: bool) -> TypeRef {
        Rc::new(RefCell::new(Type {
            kind,
            size,
            is_unsigned,
            length: -1,
            pointee: None,
            fields: Vec::new(),
            is_struct: true,
            tag: None,
            returning: None,
            params: Vec::new(),
            is_vararg: false,
            is_static: false,
        }))
    }

    pub fn pointer_to(pointee: TypeRef) -> TypeRef {
        Rc::new(RefCell::new(Type {
            kind: TypeKind::Pointer,
            size: 8,
            is_unsigned: true,
            length: -1,
            pointee: Some(pointee),
            fields: Vec::new(),
            is_struct: true,
            tag: None,
            returning: None,
            params: Vec::new(),
            is_vararg: false,
            is_static: false,
        }))
    }

    /// Builds an array type. `length < 0` means unspecified/incomplete, in
    /// which case `size` is also `-1` until `complete_array_len` patches it.
    /// Invariant: `size == -1` iff `length == -1`.
    pub fn array_of(elem: TypeRef, length: i64) -> TypeRef {
        let elem_size = elem.borrow().size;
        let size = if length < 0 { -1 } else { elem_size * length };
        Rc::new(RefCell::new(Type {
            kind: TypeKind::Array,
            size,
            is_unsigned: true,
            length,
            pointee: Some(elem),
            fields: Vec::new(),
            is_struct: true,
            tag: None,
            returning: None,
            params: Vec::new(),
            is_vararg: false,
            is_static: false,
        }))
    }

    /// Patches an array's element count once an initialiser determines it:
    /// if the array size was unknown, it becomes the number of consumed
    /// initialisers.
    pub fn complete_array_len(self_ref: &TypeRef, length: i64) {
        let mut t = self_ref.borrow_mut();
        debug_assert_eq!(t.kind, TypeKind::Array);
        let elem_size = t.pointee.as_ref().unwrap().borrow().size;
        t.length = length;
        t.size = elem_size * length;
    }

    pub fn function(returning: TypeRef, params: Vec<TypeRef>, is_vararg: bool) -> TypeRef {
        Rc::new(RefCell::new(Type {
            kind: TypeKind::Function,
            size: 0,
            is_unsigned: false,
            length: -1,
            pointee: None,
            fields: Vec::new(),
            is_struct: true,
            tag: None,
            returning: Some(returning),
            params,
            is_vararg,
            is_static: false,
        }))
    }

    /// Builds a complete struct/union type from its laid-out field table.
    pub fn structure(tag: Option<String>, is_struct: bool, fields: Vec<Field>, size: i64) -> TypeRef {
        Rc::new(RefCell::new(Type {
            kind: TypeKind::Structure,
            size,
            is_unsigned: false,
            length: -1,
            pointee: None,
            fields,
            is_struct,
            tag,
            returning: None,
            params: Vec::new(),
            is_vararg: false,
            is_static: false,
        }))
    }

    pub fn stub(tag: String, is_struct: bool) -> TypeRef {
        Rc::new(RefCell::new(Type {
            kind: TypeKind::Stub,
            size: 0,
            is_unsigned: false,
            length: -1,
            pointee: None,
            fields: Vec::new(),
            is_struct,
            tag: Some(tag),
            returning: None,
            params: Vec::new(),
            is_vararg: false,
            is_static: false,
        }))
    }

    /// Natural alignment for this type, capped at 16.
    pub fn align(&self) -> i64 {
        match self.kind {
            TypeKind::Structure => self
                .fields
                .iter()
                .map(|f| f.ty.borrow().align())
                .max()
                .unwrap_or(1),
            TypeKind::Array => self.pointee.as_ref().map(|p| p.borrow().align()).unwrap_or(1),
            _ => self.size.clamp(1, 16),
        }
    }

    /// Structural equivalence used for result-type computation; aggregates
    /// are identified nominally by tag.
    pub fn structurally_eq(a: &TypeRef, b: &TypeRef) -> bool {
        if Rc::ptr_eq(a, b) {
            return true;
        }
        let (ta, tb) = (a.borrow(), b.borrow());
        if ta.kind != tb.kind {
            return false;
        }
        match ta.kind {
            TypeKind::Structure | TypeKind::Stub => ta.tag == tb.tag,
            TypeKind::Pointer | TypeKind::Array => match (&ta.pointee, &tb.pointee) {
                (Some(pa), Some(pb)) => Type::structurally_eq(pa, pb),
                _ => false,
            },
            _ => ta.size == tb.size && ta.is_unsigned == tb.is_unsigned,
        }
    }
}

/// The preallocated table of canonical primitive types.
pub struct Primitives {
    pub void: TypeRef,
    pub char: TypeRef,
    pub uchar: TypeRef,
    pub short: TypeRef,
    pub ushort: TypeRef,
    pub int: TypeRef,
    pub uint: TypeRef,
    pub long: TypeRef,
    pub ulong: TypeRef,
    pub llong: TypeRef,
    pub ullong: TypeRef,
    pub float: TypeRef,
    pub double: TypeRef,
    pub ldouble: TypeRef,
}

impl Primitives {
    pub fn new() -> Self {
        Self {
            void: Type::primitive(TypeKind::Void, 0, false),
            char: Type::primitive(TypeKind::Char, 1, false),
            uchar: Type::primitive(TypeKind::Char, 1, true),
            short: Type::primitive(TypeKind::Short, 2, false),
            ushort: Type::primitive(TypeKind::Short, 2, true),
            int: Type::primitive(TypeKind::Int, 4, false),
            uint: Type::primitive(TypeKind::Int, 4, true),
            long: Type::primitive(TypeKind::Long, 8, false),
            ulong: Type::primitive(TypeKind::Long, 8, true),
            llong: Type::primitive(TypeKind::LLong, 8, false),
            ullong: Type::primitive(TypeKind::LLong, 8, true),
            float: Type::primitive(TypeKind::Float, 4, false),
            double: Type::primitive(TypeKind::Double, 8, false),
            ldouble: Type::primitive(TypeKind::LDouble, 16, false),
        }
    }
}

impl Default for Primitives {
    fn default() -> Self {
        Self::new()
    }
}

/// Ranks integer types for the usual arithmetic conversions (wider wins;
/// same width, unsigned wins). Floating types are handled before this is
/// consulted: long double outranks double outranks float outranks any
/// integer type.
pub fn integer_rank(t: &Type) -> i32 {
    let width = match t.kind {
        TypeKind::Char => 1,
        TypeKind::Short => 2,
        TypeKind::Int => 3,
        TypeKind::Long | TypeKind::LLong => 4,
        _ => 0,
    };
    width * 2 + if t.is_unsigned { 1 } else { 0 }
}

/// Applies C's usual arithmetic conversions to select the common operand
/// type of a binary arithmetic/comparison expression.
pub fn usual_arithmetic_conversion(lhs: &TypeRef, rhs: &TypeRef, prim: &Primitives) -> TypeRef {
    let (lk, rk) = (lhs.borrow().kind, rhs.borrow().kind);
    if lk == TypeKind::LDouble || rk == TypeKind::LDouble {
        return prim.ldouble.clone();
    }
    if lk == TypeKind::Double || rk == TypeKind::Double {
        return prim.double.clone();
    }
    if lk == TypeKind::Float || rk == TypeKind::Float {
        return prim.float.clone();
    }
    // Integer promotion: anything narrower than `int` promotes to `int`.
    let promote = |t: &TypeRef| -> TypeRef {
        let b = t.borrow();
        if b.size < 4 {
            prim.int.clone()
        } else {
            t.clone()
        }
    };
    let lp = promote(lhs);
    let rp = promote(rhs);
    if integer_rank(&lp.borrow()) >= integer_rank(&rp.borrow()) {
        lp
    } else {
        rp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_size_matches_invariant() {
        let prim = Primitives::new();
        let arr = Type::array_of(prim.int.clone(), 5);
        assert_eq!(arr.borrow().size, 20);
        let unspecified = Type::array_of(prim.char.clone(), -1);
        assert_eq!(unspecified.borrow().size, -1);
        Type::complete_array_len(&unspecified, 4);
        assert_eq!(unspecified.borrow().size, 4);
    }

    #[test]
    fn arithmetic_conversion_prefers_floating_and_wider_unsigned() {
        let prim = Primitives::new();
        let r = usual_arithmetic_conversion(&prim.int, &prim.double, &prim);
        assert_eq!(r.borrow().kind, TypeKind::Double);
        let r = usual_arithmetic_conversion(&prim.int, &prim.ulong, &prim);
        assert_eq!(r.borrow().kind, TypeKind::Long);
        assert!(r.borrow().is_unsigned);
        let r = usual_arithmetic_conversion(&prim.char, &prim.short, &prim);
        assert_eq!(r.borrow().kind, TypeKind::Int);
    }

    #[test]
    fn struct_types_compare_nominally_by_tag() {
        let a = Type::stub("point".to_string(), true);
        let b = Type::stub("point".to_string(), true);
        let c = Type::stub("other".to_string(), true);
        assert!(Type::structurally_eq(&a, &b));
        assert!(!Type::structurally_eq(&a, &c));
    }
}
