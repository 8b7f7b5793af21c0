//! Immediate words
//!
//! An immediate word runs at the point of reference inside a definition,
//! rewriting the compiler's emission buffers directly instead of emitting
//! a call. Each one is a sealed variant here; the actual buffer surgery
//! lives on [`Compiler`] so the variants stay declarative.

use crate::compiler::Compiler;
use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Immediate {
    /// Push the canonical true flag (-1).
    True,
    /// Push the canonical false flag (0).
    False,
    /// Two-branch conditional over two pending quotations.
    If,
    /// Loop combinator; dispatches on one or two pending quotations.
    Times,
    Dup,
    Drop,
    Swap,
    Over,
    Rot,
}

impl Immediate {
    pub(crate) fn compile(self, comp: &mut Compiler) -> Result<(), CompileError> {
        match self {
            Immediate::True => comp.compile_number(-1),
            Immediate::False => comp.compile_number(0),
            Immediate::If => comp.compile_if(),
            Immediate::Times => comp.compile_times(),
            Immediate::Dup => comp.compile_dup(),
            Immediate::Drop => comp.compile_drop(),
            Immediate::Swap => comp.compile_swap(),
            Immediate::Over => comp.compile_over(),
            Immediate::Rot => comp.compile_rot(),
        }
    }
}
