//! A from-scratch WebAssembly 1.0 (MVP) virtual machine core: a binary-format
//! parser, a code validator, and a threaded interpreter code generator.
//!
//! Post-MVP proposals (reference types, bulk memory, SIMD, threads, GC,
//! multi-memory, memory64, exceptions) are not implemented; the module and
//! instruction enumerations leave room to grow into them but nothing beyond
//! MVP is decoded or validated today.

pub mod codegen;
pub mod decode;
pub mod diagnostics;
pub mod limits;
pub mod module;
pub mod parser;
pub mod runtime;
pub mod sync;
pub mod types;
pub mod validator;

pub use diagnostics::{Diagnostic, ParseError, RenderFlags};
pub use limits::ParserLimits;
pub use module::ModuleStorage;
pub use runtime::trap::Trap;
pub use validator::CodeValidationError;

/// Parses and fully validates `bytes`, returning a module ready for lazy
/// compilation and execution.
///
/// This is the one call most embedders need: it runs the parser and then
/// runs the validator over every locally defined function, matching the
/// propagation policy in the spec (parse errors and validation errors both
/// unwind immediately with full payload).
pub fn load_module(bytes: &[u8], limits: &ParserLimits) -> Result<ModuleStorage<'_>, Diagnostic> {
    let module = parser::parse_module(bytes, limits).map_err(Diagnostic::from_parse_error)?;
    validator::validate_module(&module).map_err(Diagnostic::from_validation_error)?;
    Ok(module)
}
