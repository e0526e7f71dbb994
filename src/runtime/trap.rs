//! Runtime traps (§7 "Runtime traps ... surfaced to guest via trap, not to
//! core callers"): the closed list of conditions the interpreter can raise
//! while executing an op-stream. Distinct from [`crate::ParseError`] and
//! [`crate::CodeValidationError`], which unwind out of their phase instead
//! of being recovered locally.
//!
//! New relative to the teacher, whose `ExecutionError` (`exec/error.rs`)
//! conflates a handful of these (`Trap(&'static str)`, `PopOnEmptyOperandStack`)
//! with what this crate treats as internal invariants rather than guest-
//! observable traps (an empty-stack pop can only happen on a mis-lowered
//! op-stream, which is this crate's bug, not the guest's).

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum Trap {
    #[error("unreachable instruction executed")]
    Unreachable,

    #[error("integer divide by zero")]
    IntegerDivideByZero,

    #[error("integer overflow")]
    IntegerOverflow,

    #[error("invalid conversion to integer")]
    InvalidConversionToInteger,

    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,

    #[error("out of bounds memory access")]
    OutOfBoundsMemoryAccess,

    #[error("out of bounds table access")]
    OutOfBoundsTableAccess,

    #[error("call to a null table entry")]
    CallIndirectNull,

    #[error("call stack exhausted")]
    StackOverflow,
}
