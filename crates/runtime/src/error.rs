//! Engine error type.

/// Runtime failures. Any of these aborts the current `run` call; the
/// engine's stacks are left as they were at the fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Operand stack underflow in the named primitive.
    StackUnderflow(&'static str),
    /// Return stack underflow in the named primitive.
    ReturnStackUnderflow(&'static str),
    /// A cell that does not decode, or a symbol/bulk-literal cell the
    /// engine does not execute.
    MalformedCell(u64),
    /// `branch`/`0branch` was not followed by a literal offset cell.
    MissingBranchOffset,
    /// Integer division or modulo by zero.
    DivisionByZero,
    /// `free` of an address the heap does not own (double free included).
    UnknownBlock(u64),
    /// Array access outside `0..count`.
    IndexOutOfBounds { index: i64, count: u64 },
    /// `alloc` request above the engine's allocation cap.
    AllocTooLarge(u64),
    /// `array-concat` of arrays with different element sizes.
    ConcatMismatch { left: u8, right: u8 },
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmError::StackUnderflow(op) => write!(f, "operand stack underflow in '{op}'"),
            VmError::ReturnStackUnderflow(op) => {
                write!(f, "return stack underflow in '{op}'")
            }
            VmError::MalformedCell(raw) => write!(f, "malformed cell 0x{raw:016x}"),
            VmError::MissingBranchOffset => {
                write!(f, "branch primitive not followed by a literal offset")
            }
            VmError::DivisionByZero => write!(f, "division by zero"),
            VmError::UnknownBlock(addr) => {
                write!(f, "free of unowned address 0x{addr:x}")
            }
            VmError::IndexOutOfBounds { index, count } => {
                write!(f, "index {index} out of bounds for array of {count}")
            }
            VmError::AllocTooLarge(size) => {
                write!(f, "allocation of {size} bytes exceeds the engine cap")
            }
            VmError::ConcatMismatch { left, right } => {
                write!(
                    f,
                    "array-concat element size mismatch: {left} vs {right}"
                )
            }
        }
    }
}

impl std::error::Error for VmError {}
