//! # Code Generation Context
//!
//! [`CodeGen`] owns the output buffer and the bookkeeping that is shared
//! across expression and statement generation: an internal label counter
//! (kept in a namespace distinct from the parser's own `.L<n>` labels),
//! the break/continue/switch label stacks that get explicitly saved and
//! restored around each nested loop or switch, and the running `%rsp`
//! depth used to keep call sites 16-byte aligned.

use std::rc::Rc;

use crate::ast::nodes::Var;

/// Per-switch state: the label a `break` or a fallthrough past the last
/// case jumps to, plus the chain of `(case value, label)` pairs collected
/// while generating the body, dispatched once the body is fully emitted.
pub struct SwitchContext {
    pub end_label: String,
    pub cases: Vec<(i64, String)>,
    pub default_label: Option<String>,
}

pub struct CodeGen {
    pub out: String,
    label_counter: u64,
    pub break_labels: Vec<String>,
    pub continue_labels: Vec<String>,
    pub switches: Vec<SwitchContext>,
    /// Bytes currently pushed onto the stack beyond the 16-byte-aligned
    /// frame, so call sites can pad to keep `%rsp` aligned at the `call`.
    pub gen_stack: i64,
}

impl CodeGen {
    pub fn new() -> Self {
        CodeGen {
            out: String::new(),
            label_counter: 0,
            break_labels: Vec::new(),
            continue_labels: Vec::new(),
            switches: Vec::new(),
            gen_stack: 0,
        }
    }

    pub fn emit(&mut self, line: impl AsRef<str>) {
        self.out.push('\t');
        self.out.push_str(line.as_ref());
        self.out.push('\n');
    }

    pub fn emit_label(&mut self, label: &str) {
        self.out.push_str(label);
        self.out.push_str(":\n");
    }

    pub fn emit_raw(&mut self, line: impl AsRef<str>) {
        self.out.push_str(line.as_ref());
        self.out.push('\n');
    }

    /// A fresh internal label, `.LC<n>`, distinct from the parser's own
    /// `.L<n>` goto/case labels.
    pub fn fresh_label(&mut self) -> String {
        let n = self.label_counter;
        self.label_counter += 1;
        format!(".LC{n}")
    }

    pub fn push_loop_labels(&mut self, break_label: String, continue_label: String) {
        self.break_labels.push(break_label);
        self.continue_labels.push(continue_label);
    }

    pub fn pop_loop_labels(&mut self) {
        self.break_labels.pop();
        self.continue_labels.pop();
    }
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new()
    }
}

/// Assigns a `%rbp`-relative frame offset to every local and parameter in
/// declaration order (which is also the order parameters and nested-block
/// locals were registered in), and returns the total frame size rounded up
/// to 16 bytes. Each variable is pushed below the previous one, aligned to
/// its own natural alignment.
pub fn layout_frame(locals: &[Rc<Var>]) -> i64 {
    let mut offset: i64 = 0;
    let mut seen = std::collections::HashSet::new();
    for var in locals {
        let ptr = Rc::as_ptr(var) as usize;
        if !seen.insert(ptr) {
            continue;
        }
        let size = var.ty.borrow().size;
        offset = (offset + size).div_ceil(8) * 8;
        var.offset.set(-offset);
    }
    offset.div_ceil(16) * 16
}

/// Classifies a parameter/argument type for System V register assignment:
/// integer-class values go in the integer register file, floating-class
/// values in `xmm`.
pub fn is_float_class(ty: &crate::ast::types::TypeRef) -> bool {
    ty.borrow().kind.is_floating()
}

pub const INT_ARG_REGS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];
pub const INT_ARG_REGS_32: [&str; 6] = ["%edi", "%esi", "%edx", "%ecx", "%r8d", "%r9d"];
pub const INT_ARG_REGS_16: [&str; 6] = ["%di", "%si", "%dx", "%cx", "%r8w", "%r9w"];
pub const INT_ARG_REGS_8: [&str; 6] = ["%dil", "%sil", "%dl", "%cl", "%r8b", "%r9b"];
