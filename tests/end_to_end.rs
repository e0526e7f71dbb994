//! Integration tests for the six end-to-end scenarios named in
//! SPEC_FULL.md's testable-properties section, driving the crate through
//! the same public surface `bin/wrtmini.rs` uses (`load_module`, then
//! `Instance::instantiate`/`call` for the scenarios that execute).

use wrtmini::limits::ParserLimits;
use wrtmini::runtime::{Instance, NoImports};
use wrtmini::types::Value;
use wrtmini::validator::CodeValidationError;
use wrtmini::{load_module, Diagnostic};

const HEADER: [u8; 8] = [0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];

/// Builds a single-type, single-function module whose body is exactly
/// `code`, with the given parameter/result arity (MVP: at most one result).
fn module_with_body(params: &[u8], results: &[u8], code: &[u8]) -> Vec<u8> {
    let mut bytes = HEADER.to_vec();

    let mut type_payload = vec![0x01]; // one type entry
    type_payload.push(0x60); // func
    type_payload.push(params.len() as u8);
    type_payload.extend_from_slice(params);
    type_payload.push(results.len() as u8);
    type_payload.extend_from_slice(results);
    bytes.push(0x01); // type section id
    bytes.push(type_payload.len() as u8);
    bytes.extend_from_slice(&type_payload);

    bytes.extend_from_slice(&[0x03, 0x02, 0x01, 0x00]); // function section: one function of type 0

    let mut code_payload = vec![0x01]; // one body
    code_payload.push((1 + code.len()) as u8); // body size: locals-count byte + code
    code_payload.push(0x00); // zero local groups
    code_payload.extend_from_slice(code);
    bytes.push(0x0A); // code section id
    bytes.push(code_payload.len() as u8);
    bytes.extend_from_slice(&code_payload);

    bytes
}

/// Scenario 1: the minimal empty module parses, validates, and (having no
/// start section) runs with no side effects.
#[test]
fn minimal_empty_module() {
    let module = load_module(&HEADER, &ParserLimits::default()).expect("empty module is valid");
    let instance = Instance::instantiate(&module, NoImports).expect("no start section to fail");
    assert!(instance.memory().is_none());
}

/// Scenario 2: `local.get 0; local.get 1; i32.add; end` over `(i32, i32) -> i32`
/// computes the sum, regardless of which fusion (if any) the generator picks.
#[test]
fn i32_add_identity() {
    let code = [0x20, 0x00, 0x20, 0x01, 0x6A, 0x0B];
    let bytes = module_with_body(&[0x7F, 0x7F], &[0x7F], &code);
    let module = load_module(&bytes, &ParserLimits::default()).expect("add function validates");
    let mut instance = Instance::instantiate(&module, NoImports).unwrap();
    let results = instance.call(0, &[Value::I32(40), Value::I32(2)]).unwrap();
    assert_eq!(results, vec![Value::I32(42)]);
}

/// Scenario 3: `i32.add; end` with nothing pushed first underflows the
/// operand stack; the validator reports required=2, actual=0 anchored at
/// the `i32.add` opcode byte.
#[test]
fn operand_stack_underflow() {
    let code = [0x6A, 0x0B]; // i32.add; end
    let bytes = module_with_body(&[0x7F, 0x7F], &[0x7F], &code);
    let err = load_module(&bytes, &ParserLimits::default()).expect_err("i32.add with empty stack must fail");
    match err {
        Diagnostic::Validation { error, .. } => match error {
            CodeValidationError::OperandStackUnderflow { required, actual, .. } => {
                assert_eq!(required, 2);
                assert_eq!(actual, 0);
            }
            other => panic!("expected OperandStackUnderflow, got {other:?}"),
        },
        other => panic!("expected a validation diagnostic, got {other:?}"),
    }
}

/// Scenario 4: `i32.const 1; f64.const 2.0; i32.const 0; select; end` mixes
/// an i32 arm with an f64 arm; the validator rejects the type mismatch.
#[test]
fn select_type_mismatch() {
    let mut code = vec![0x41, 0x01]; // i32.const 1
    code.extend_from_slice(&[0x44]); // f64.const
    code.extend_from_slice(&2.0f64.to_le_bytes());
    code.extend_from_slice(&[0x41, 0x00]); // i32.const 0
    code.push(0x1B); // select
    code.push(0x0B); // end
    let bytes = module_with_body(&[], &[0x7F], &code);
    let err = load_module(&bytes, &ParserLimits::default()).expect_err("mismatched select arms must fail");
    match err {
        Diagnostic::Validation { error, .. } => match error {
            CodeValidationError::SelectTypeMismatch { v1, v2, .. } => {
                assert_eq!(v1, wrtmini::types::ValType::I32);
                assert_eq!(v2, wrtmini::types::ValType::F64);
            }
            other => panic!("expected SelectTypeMismatch, got {other:?}"),
        },
        other => panic!("expected a validation diagnostic, got {other:?}"),
    }
}

/// Scenario 5: `br 5; end` inside a function whose only control frame is
/// the implicit outer one (max valid label is 0) is an out-of-range branch.
#[test]
fn br_out_of_range() {
    let code = [0x0C, 0x05, 0x0B]; // br 5; end
    let bytes = module_with_body(&[], &[], &code);
    let err = load_module(&bytes, &ParserLimits::default()).expect_err("br 5 with one control frame must fail");
    match err {
        Diagnostic::Validation { error, .. } => match error {
            CodeValidationError::InvalidBranchLabel { label, max, .. } => {
                assert_eq!(label, 5);
                assert_eq!(max, 0);
            }
            other => panic!("expected InvalidBranchLabel, got {other:?}"),
        },
        other => panic!("expected a validation diagnostic, got {other:?}"),
    }
}

/// Scenario 6: the function section declares two functions but the code
/// section supplies only one body; this is a structural mismatch caught
/// before validation ever runs.
#[test]
fn code_function_count_mismatch() {
    let mut bytes = HEADER.to_vec();
    // type 0: () -> ()
    bytes.extend_from_slice(&[0x01, 0x04, 0x01, 0x60, 0x00, 0x00]);
    // function section: two functions, both of type 0
    bytes.extend_from_slice(&[0x03, 0x03, 0x02, 0x00, 0x00]);
    // code section: one body only
    let code = [0x0B]; // end
    let mut code_payload = vec![0x01];
    code_payload.push((1 + code.len()) as u8);
    code_payload.push(0x00);
    code_payload.extend_from_slice(&code);
    bytes.push(0x0A);
    bytes.push(code_payload.len() as u8);
    bytes.extend_from_slice(&code_payload);

    let err = load_module(&bytes, &ParserLimits::default()).expect_err("code/function count mismatch must fail");
    match err {
        Diagnostic::Parse(wrtmini::ParseError::CodeFunctionCountMismatch {
            defined_code,
            defined_func,
        }) => {
            assert_eq!(defined_code, 1);
            assert_eq!(defined_func, 2);
        }
        other => panic!("expected CodeFunctionCountMismatch, got {other:?}"),
    }
}
