//! Uniform structured diagnostics: one error enum per phase (parser,
//! validator), composed into a `Diagnostic` record with a byte-offset
//! anchor and a pluggable text renderer.
//!
//! Grounded in the teacher's `parse::error::ParsingError` /
//! `exec::error::ExecutionError` (`thiserror`-derived leaf enums), composed
//! here into the `{kind, anchor_offset, payload}` record the spec's
//! external diagnostics interface names.

use thiserror::Error;

use crate::limits::LimitCategory;
use crate::parser::types::{ExportKind, Opcode, SectionId};
use crate::types::ValType;
use crate::validator::CodeValidationError;

/// Parse-phase failures. Every variant anchors the byte offset at which the
/// problem was first observable.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    #[error("not a WebAssembly module (bad magic number)")]
    NotAWasmModule,

    #[error("unsupported version {version:?}")]
    IllegalVersion { version: [u8; 4] },

    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("truncated LEB128 integer at offset {offset}")]
    TruncatedLeb128 { offset: usize },

    #[error("non-canonical LEB128 integer at offset {offset}")]
    NonCanonicalLeb128 { offset: usize },

    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("unknown section id {id} at offset {offset}")]
    UnknownSectionId { id: u8, offset: usize },

    #[error("section {section:?} appears out of canonical order at offset {offset}")]
    SectionOutOfOrder { section: SectionId, offset: usize },

    #[error("section {section:?} is duplicated at offset {offset}")]
    DuplicateSection { section: SectionId, offset: usize },

    #[error(
        "section {section:?} length mismatch: declared {declared} bytes, consumed {consumed} at offset {offset}"
    )]
    SectionLengthMismatch {
        section: SectionId,
        declared: u32,
        consumed: usize,
        offset: usize,
    },

    #[error("invalid function-type prefix {byte:#x} at offset {offset}")]
    InvalidFunctionTypePrefix { byte: u8, offset: usize },

    #[error("function type has {count} results; MVP allows at most 1, at offset {offset}")]
    TooManyResults { count: usize, offset: usize },

    #[error("invalid value-type byte {byte:#x} at offset {offset}")]
    InvalidValType { byte: u8, offset: usize },

    #[error("malformed limits (min {min} > max {max}) at offset {offset}")]
    MalformedLimits { min: u32, max: u32, offset: usize },

    #[error("invalid limits flag {byte:#x} at offset {offset}")]
    InvalidLimitsFlag { byte: u8, offset: usize },

    #[error("type index {index} out of bounds ({count} types defined) at offset {offset}")]
    InvalidTypeIndex {
        index: u32,
        count: usize,
        offset: usize,
    },

    #[error("function index {index} out of bounds ({count} functions defined) at offset {offset}")]
    InvalidFunctionIndex {
        index: u32,
        count: usize,
        offset: usize,
    },

    #[error("table index {index} out of bounds ({count} tables defined) at offset {offset}")]
    InvalidTableIndex {
        index: u32,
        count: usize,
        offset: usize,
    },

    #[error("memory index {index} out of bounds ({count} memories defined) at offset {offset}")]
    InvalidMemoryIndex {
        index: u32,
        count: usize,
        offset: usize,
    },

    #[error("global index {index} out of bounds ({count} globals defined) at offset {offset}")]
    InvalidGlobalIndex {
        index: u32,
        count: usize,
        offset: usize,
    },

    #[error("unknown export kind {byte:#x} at offset {offset}")]
    InvalidExportKind { byte: u8, offset: usize },

    #[error("duplicate export name {name:?} at offset {offset}")]
    DuplicateExportName { name: String, offset: usize },

    #[error("unknown opcode {byte:#x} at offset {offset}")]
    IllegalOpcode { byte: u8, offset: usize },

    #[error("constant expression is not constant (opcode {opcode:?}) at offset {offset}")]
    NonConstantExpr { opcode: Opcode, offset: usize },

    #[error(
        "constant expression type mismatch: expected {expected:?}, got {actual:?} at offset {offset}"
    )]
    ConstExprTypeMismatch {
        expected: ValType,
        actual: ValType,
        offset: usize,
    },

    #[error(
        "code section declares {defined_code} bodies but function section declares {defined_func} functions"
    )]
    CodeFunctionCountMismatch {
        defined_code: usize,
        defined_func: usize,
    },

    #[error("trailing bytes after the last section at offset {offset}")]
    TrailingBytes { offset: usize },

    #[error("resource limit for {category:?} exceeded (limit {limit})")]
    ResourceLimitExceeded { category: LimitCategory, limit: u32 },

    #[error("unsupported export kind {kind:?} at offset {offset}")]
    UnsupportedExportKind { kind: ExportKind, offset: usize },

    #[error("data segment addressed memory out of bounds at offset {offset}")]
    DataSegmentOutOfBounds { offset: usize },
}

/// Diagnostic render flags: which ANSI/Win32 affordances the caller's
/// terminal supports.
#[derive(Debug, Default, Clone, Copy)]
pub struct RenderFlags {
    pub enable_ansi: bool,
    pub use_win32_text_attributes: bool,
}

/// A uniform structured error record: a discriminated kind, a byte offset
/// anchor, and (via `Display`) a one-line renderer.
#[derive(Debug, Clone)]
pub enum Diagnostic {
    Parse(ParseError),
    Validation {
        function_index: usize,
        error: CodeValidationError,
    },
}

impl Diagnostic {
    pub fn from_parse_error(error: ParseError) -> Self {
        Diagnostic::Parse(error)
    }

    pub fn from_validation_error((function_index, error): (usize, CodeValidationError)) -> Self {
        Diagnostic::Validation {
            function_index,
            error,
        }
    }

    pub fn anchor_offset(&self) -> usize {
        match self {
            Diagnostic::Parse(e) => parse_error_offset(e),
            Diagnostic::Validation { error, .. } => error.offset(),
        }
    }

    /// Renders a one-line, human-readable message honoring `flags`.
    pub fn render(&self, flags: RenderFlags) -> String {
        let (prefix, reset) = if flags.enable_ansi {
            ("\u{1b}[31m[error]\u{1b}[0m ", "")
        } else {
            ("[error] ", "")
        };
        match self {
            Diagnostic::Parse(e) => format!("{prefix}{e}{reset}"),
            Diagnostic::Validation {
                function_index,
                error,
            } => format!("{prefix}in function {function_index}: {error}{reset}"),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render(RenderFlags::default()))
    }
}

impl std::error::Error for Diagnostic {}

fn parse_error_offset(e: &ParseError) -> usize {
    use ParseError::*;
    match *e {
        UnexpectedEof { offset }
        | TruncatedLeb128 { offset }
        | NonCanonicalLeb128 { offset }
        | InvalidUtf8 { offset }
        | UnknownSectionId { offset, .. }
        | SectionOutOfOrder { offset, .. }
        | DuplicateSection { offset, .. }
        | SectionLengthMismatch { offset, .. }
        | InvalidFunctionTypePrefix { offset, .. }
        | TooManyResults { offset, .. }
        | InvalidValType { offset, .. }
        | MalformedLimits { offset, .. }
        | InvalidLimitsFlag { offset, .. }
        | InvalidTypeIndex { offset, .. }
        | InvalidFunctionIndex { offset, .. }
        | InvalidTableIndex { offset, .. }
        | InvalidMemoryIndex { offset, .. }
        | InvalidGlobalIndex { offset, .. }
        | InvalidExportKind { offset, .. }
        | DuplicateExportName { offset, .. }
        | IllegalOpcode { offset, .. }
        | NonConstantExpr { offset, .. }
        | ConstExprTypeMismatch { offset, .. }
        | TrailingBytes { offset }
        | UnsupportedExportKind { offset, .. }
        | DataSegmentOutOfBounds { offset } => offset,
        NotAWasmModule | IllegalVersion { .. } => 0,
        CodeFunctionCountMismatch { .. } => 0,
        ResourceLimitExceeded { .. } => 0,
    }
}
