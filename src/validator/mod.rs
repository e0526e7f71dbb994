//! Code validator: the forward, stack-polymorphic abstract interpreter
//! over a function body's raw bytes.
//!
//! The teacher has no validator at all (it trusts whatever the parser
//! decoded); this module is new, grounded directly in the distilled spec's
//! §3 "Validator state" and §4.2, with the per-opcode signature table
//! built from the MVP opcode list in `parser::types::Opcode`.

pub mod error;

pub use error::CodeValidationError;

use crate::decode::Cursor;
use crate::diagnostics::ParseError;
use crate::module::ModuleStorage;
use crate::parser::instructions::{access_width, decode_one, Instr};
use crate::parser::types::{BlockType, Opcode};
use crate::types::ValType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackEntry {
    Known(ValType),
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Block,
    Loop,
    If,
    IfElse,
    Function,
}

#[derive(Debug, Clone)]
struct ControlFrame {
    kind: FrameKind,
    label_types: Vec<ValType>,
    end_types: Vec<ValType>,
    height: usize,
    unreachable: bool,
}

struct Validator {
    stack: Vec<StackEntry>,
    frames: Vec<ControlFrame>,
    locals: Vec<ValType>,
}

impl Validator {
    fn cur(&self) -> &ControlFrame {
        self.frames.last().expect("function frame is never popped while validating")
    }

    fn cur_mut(&mut self) -> &mut ControlFrame {
        self.frames.last_mut().expect("function frame is never popped while validating")
    }

    fn push_entry(&mut self, entry: StackEntry) {
        self.stack.push(entry);
    }

    fn push(&mut self, ty: ValType) {
        self.push_entry(StackEntry::Known(ty));
    }

    fn push_many(&mut self, tys: &[ValType]) {
        for ty in tys {
            self.push(*ty);
        }
    }

    /// Pops one operand, honoring stack-polymorphism: once the current
    /// frame is `unreachable` and the stack has been drained back to the
    /// frame's entry height, further pops are free `Unknown` values rather
    /// than underflows.
    fn pop_any(&mut self, opcode: Opcode, offset: usize) -> Result<StackEntry, CodeValidationError> {
        let height = self.cur().height;
        let unreachable = self.cur().unreachable;
        if self.stack.len() == height {
            if unreachable {
                return Ok(StackEntry::Unknown);
            }
            return Err(CodeValidationError::OperandStackUnderflow {
                opcode,
                required: 1,
                actual: 0,
                offset,
            });
        }
        Ok(self.stack.pop().expect("checked non-empty above frame height"))
    }

    fn pop_expect(&mut self, expected: ValType, opcode: Opcode, offset: usize) -> Result<(), CodeValidationError> {
        match self.pop_any(opcode, offset)? {
            StackEntry::Unknown => Ok(()),
            StackEntry::Known(actual) if actual == expected => Ok(()),
            StackEntry::Known(actual) => Err(CodeValidationError::TypeMismatch {
                opcode,
                expected,
                actual,
                offset,
            }),
        }
    }

    /// Marks the current frame unreachable (post branch / unconditional
    /// trap) and drains the stack back to the frame's entry height; further
    /// pops in this frame become free polymorphic values.
    fn set_unreachable(&mut self) {
        let height = self.cur().height;
        self.stack.truncate(height);
        self.cur_mut().unreachable = true;
    }

    fn push_ctrl(&mut self, kind: FrameKind, label_types: Vec<ValType>, end_types: Vec<ValType>) {
        self.frames.push(ControlFrame {
            kind,
            label_types,
            end_types,
            height: self.stack.len(),
            unreachable: false,
        });
    }

    /// Verifies the current frame's declared `end_types` are exactly the
    /// top of the stack above the frame's entry height, then pops the
    /// frame. Used by both `else` (to close the `then` arm) and `end`.
    fn pop_ctrl(&mut self, opcode: Opcode, offset: usize) -> Result<ControlFrame, CodeValidationError> {
        let frame = self.cur().clone();
        for ty in frame.end_types.iter().rev() {
            self.pop_expect(*ty, opcode, offset)?;
        }
        if self.stack.len() != frame.height {
            return Err(CodeValidationError::StackMismatchAtEnd {
                expected: frame.end_types.clone(),
                offset,
            });
        }
        self.frames.pop();
        Ok(frame)
    }

    fn label_types_for(&self, label: u32, offset: usize) -> Result<Vec<ValType>, CodeValidationError> {
        let idx = label as usize;
        if idx >= self.frames.len() {
            return Err(CodeValidationError::InvalidBranchLabel {
                label,
                max: self.frames.len().saturating_sub(1),
                offset,
            });
        }
        Ok(self.frames[self.frames.len() - 1 - idx].label_types.clone())
    }

    fn step(&mut self, module: &ModuleStorage<'_>, instr: Instr, offset: usize) -> Result<(), CodeValidationError> {
        match instr {
            Instr::Unreachable => self.set_unreachable(),
            Instr::Nop => {}

            Instr::Block(bt) => {
                let results = block_result_types(bt);
                self.push_ctrl(FrameKind::Block, results.clone(), results);
            }
            Instr::Loop(bt) => {
                let results = block_result_types(bt);
                self.push_ctrl(FrameKind::Loop, Vec::new(), results);
            }
            Instr::If(bt) => {
                self.pop_expect(ValType::I32, Opcode::If, offset)?;
                let results = block_result_types(bt);
                self.push_ctrl(FrameKind::If, results.clone(), results);
            }
            Instr::Else => {
                if self.cur().kind != FrameKind::If {
                    return Err(CodeValidationError::IllegalOpcode { byte: 0x05, offset });
                }
                let frame = self.pop_ctrl(Opcode::Else, offset)?;
                self.frames.push(ControlFrame {
                    kind: FrameKind::IfElse,
                    label_types: frame.label_types,
                    end_types: frame.end_types,
                    height: frame.height,
                    unreachable: false,
                });
            }
            Instr::End => {
                let frame = self.pop_ctrl(Opcode::End, offset)?;
                if frame.kind == FrameKind::If && !frame.end_types.is_empty() {
                    return Err(CodeValidationError::IfThenResultMismatch {
                        results: frame.end_types,
                        offset,
                    });
                }
                if !self.frames.is_empty() {
                    self.push_many(&frame.end_types);
                }
            }

            Instr::Br(label) => {
                let label_types = self.label_types_for(label, offset)?;
                for ty in label_types.iter().rev() {
                    self.pop_expect(*ty, Opcode::Br, offset)?;
                }
                self.set_unreachable();
            }
            Instr::BrIf(label) => {
                self.pop_expect(ValType::I32, Opcode::BrIf, offset)?;
                let label_types = self.label_types_for(label, offset)?;
                let mut popped = Vec::with_capacity(label_types.len());
                for ty in label_types.iter().rev() {
                    self.pop_expect(*ty, Opcode::BrIf, offset)?;
                    popped.push(*ty);
                }
                for ty in popped.into_iter().rev() {
                    self.push(ty);
                }
            }
            Instr::BrTable { targets, default } => {
                self.pop_expect(ValType::I32, Opcode::BrTable, offset)?;
                let default_types = self.label_types_for(default, offset)?;
                for target in &targets {
                    let target_types = self.label_types_for(*target, offset)?;
                    if target_types != default_types {
                        return Err(CodeValidationError::InvalidBranchLabel {
                            label: *target,
                            max: self.frames.len().saturating_sub(1),
                            offset,
                        });
                    }
                }
                for ty in default_types.iter().rev() {
                    self.pop_expect(*ty, Opcode::BrTable, offset)?;
                }
                self.set_unreachable();
            }
            Instr::Return => {
                let result_types = self.frames[0].end_types.clone();
                for ty in result_types.iter().rev() {
                    self.pop_expect(*ty, Opcode::Return, offset)?;
                }
                self.set_unreachable();
            }

            Instr::Call(index) => {
                let func_type = module
                    .function_type(index)
                    .ok_or(CodeValidationError::InvalidFunctionIndex {
                        index,
                        count: module.total_function_count(),
                        offset,
                    })?
                    .clone();
                for ty in func_type.params.iter().rev() {
                    self.pop_expect(*ty, Opcode::Call, offset)?;
                }
                self.push_many(&func_type.results);
            }
            Instr::CallIndirect { type_index } => {
                if module.total_table_count() == 0 {
                    return Err(CodeValidationError::IndirectCallNoTable { offset });
                }
                let func_type = module
                    .types
                    .get(type_index as usize)
                    .ok_or(CodeValidationError::InvalidTypeIndex {
                        index: type_index,
                        count: module.types.len(),
                        offset,
                    })?
                    .clone();
                self.pop_expect(ValType::I32, Opcode::CallIndirect, offset)?;
                for ty in func_type.params.iter().rev() {
                    self.pop_expect(*ty, Opcode::CallIndirect, offset)?;
                }
                self.push_many(&func_type.results);
            }

            Instr::Drop => {
                self.pop_any(Opcode::Drop, offset)?;
            }
            Instr::Select => {
                let cond = self.pop_any(Opcode::Select, offset)?;
                if let StackEntry::Known(actual) = cond {
                    if actual != ValType::I32 {
                        return Err(CodeValidationError::SelectCondNotI32 { actual, offset });
                    }
                }
                let v2 = self.pop_any(Opcode::Select, offset)?;
                let v1 = self.pop_any(Opcode::Select, offset)?;
                let result = match (v1, v2) {
                    (StackEntry::Known(t1), StackEntry::Known(t2)) => {
                        if t1 != t2 {
                            return Err(CodeValidationError::SelectTypeMismatch { v1: t1, v2: t2, offset });
                        }
                        StackEntry::Known(t1)
                    }
                    (StackEntry::Known(t), StackEntry::Unknown) | (StackEntry::Unknown, StackEntry::Known(t)) => {
                        StackEntry::Known(t)
                    }
                    (StackEntry::Unknown, StackEntry::Unknown) => StackEntry::Unknown,
                };
                self.push_entry(result);
            }

            Instr::LocalGet(index) => {
                let ty = *self
                    .locals
                    .get(index as usize)
                    .ok_or(CodeValidationError::InvalidLocalIndex {
                        index,
                        count: self.locals.len(),
                        offset,
                    })?;
                self.push(ty);
            }
            Instr::LocalSet(index) => {
                let ty = *self
                    .locals
                    .get(index as usize)
                    .ok_or(CodeValidationError::InvalidLocalIndex {
                        index,
                        count: self.locals.len(),
                        offset,
                    })?;
                match self.pop_any(Opcode::LocalSet, offset)? {
                    StackEntry::Unknown => {}
                    StackEntry::Known(actual) if actual == ty => {}
                    StackEntry::Known(actual) => {
                        return Err(CodeValidationError::LocalSetTypeMismatch {
                            expected: ty,
                            actual,
                            offset,
                        })
                    }
                }
            }
            Instr::LocalTee(index) => {
                let ty = *self
                    .locals
                    .get(index as usize)
                    .ok_or(CodeValidationError::InvalidLocalIndex {
                        index,
                        count: self.locals.len(),
                        offset,
                    })?;
                match self.pop_any(Opcode::LocalTee, offset)? {
                    StackEntry::Unknown => {}
                    StackEntry::Known(actual) if actual == ty => {}
                    StackEntry::Known(actual) => {
                        return Err(CodeValidationError::LocalTeeTypeMismatch {
                            expected: ty,
                            actual,
                            offset,
                        })
                    }
                }
                self.push(ty);
            }

            Instr::GlobalGet(index) => {
                let global = module.global_type(index).ok_or(CodeValidationError::InvalidGlobalIndex {
                    index,
                    count: module.total_global_count(),
                    offset,
                })?;
                self.push(global.value_type);
            }
            Instr::GlobalSet(index) => {
                let global = module.global_type(index).ok_or(CodeValidationError::InvalidGlobalIndex {
                    index,
                    count: module.total_global_count(),
                    offset,
                })?;
                if !global.mutable {
                    return Err(CodeValidationError::GlobalSetImmutable { index, offset });
                }
                self.pop_expect(global.value_type, Opcode::GlobalSet, offset)?;
            }

            Instr::Load { opcode, arg } => {
                if module.total_memory_count() == 0 {
                    return Err(CodeValidationError::NoMemory { opcode, offset });
                }
                check_align(opcode, arg.align, offset)?;
                self.pop_expect(ValType::I32, opcode, offset)?;
                self.push(load_value_type(opcode));
            }
            Instr::Store { opcode, arg } => {
                if module.total_memory_count() == 0 {
                    return Err(CodeValidationError::NoMemory { opcode, offset });
                }
                check_align(opcode, arg.align, offset)?;
                self.pop_expect(store_value_type(opcode), opcode, offset)?;
                self.pop_expect(ValType::I32, opcode, offset)?;
            }
            Instr::MemorySize => {
                if module.total_memory_count() == 0 {
                    return Err(CodeValidationError::NoMemory { opcode: Opcode::MemorySize, offset });
                }
                self.push(ValType::I32);
            }
            Instr::MemoryGrow => {
                if module.total_memory_count() == 0 {
                    return Err(CodeValidationError::NoMemory { opcode: Opcode::MemoryGrow, offset });
                }
                self.pop_expect(ValType::I32, Opcode::MemoryGrow, offset)?;
                self.push(ValType::I32);
            }

            Instr::I32Const(_) => self.push(ValType::I32),
            Instr::I64Const(_) => self.push(ValType::I64),
            Instr::F32Const(_) => self.push(ValType::F32),
            Instr::F64Const(_) => self.push(ValType::F64),

            Instr::Cmp(opcode) => {
                let ty = cmp_operand_type(opcode);
                if !cmp_is_unary(opcode) {
                    self.pop_expect(ty, opcode, offset)?;
                }
                self.pop_expect(ty, opcode, offset)?;
                self.push(ValType::I32);
            }
            Instr::NumOp(opcode) => {
                let ty = numop_type(opcode);
                if !numop_is_unary(opcode) {
                    self.pop_expect(ty, opcode, offset)?;
                }
                self.pop_expect(ty, opcode, offset)?;
                self.push(ty);
            }
            Instr::Cvt(opcode) => {
                let (from, to) = cvt_signature(opcode);
                self.pop_expect(from, opcode, offset)?;
                self.push(to);
            }
        }
        Ok(())
    }
}

fn block_result_types(bt: BlockType) -> Vec<ValType> {
    match bt {
        BlockType::Empty => Vec::new(),
        BlockType::Value(ty) => vec![ty],
    }
}

fn check_align(opcode: Opcode, align: u32, offset: usize) -> Result<(), CodeValidationError> {
    let max_align = access_width(opcode).trailing_zeros();
    if align > max_align {
        return Err(CodeValidationError::MemoryAlignTooLarge { opcode, align, offset });
    }
    Ok(())
}

pub(crate) fn load_value_type(opcode: Opcode) -> ValType {
    use Opcode::*;
    match opcode {
        I32Load | I32Load8S | I32Load8U | I32Load16S | I32Load16U => ValType::I32,
        I64Load | I64Load8S | I64Load8U | I64Load16S | I64Load16U | I64Load32S | I64Load32U => ValType::I64,
        F32Load => ValType::F32,
        F64Load => ValType::F64,
        _ => unreachable!("load_value_type called on non-load opcode"),
    }
}

pub(crate) fn store_value_type(opcode: Opcode) -> ValType {
    use Opcode::*;
    match opcode {
        I32Store | I32Store8 | I32Store16 => ValType::I32,
        I64Store | I64Store8 | I64Store16 | I64Store32 => ValType::I64,
        F32Store => ValType::F32,
        F64Store => ValType::F64,
        _ => unreachable!("store_value_type called on non-store opcode"),
    }
}

pub(crate) fn cmp_operand_type(opcode: Opcode) -> ValType {
    use Opcode::*;
    match opcode {
        I32Eqz | I32Eq | I32Ne | I32LtS | I32LtU | I32GtS | I32GtU | I32LeS | I32LeU | I32GeS | I32GeU => ValType::I32,
        I64Eqz | I64Eq | I64Ne | I64LtS | I64LtU | I64GtS | I64GtU | I64LeS | I64LeU | I64GeS | I64GeU => ValType::I64,
        F32Eq | F32Ne | F32Lt | F32Gt | F32Le | F32Ge => ValType::F32,
        F64Eq | F64Ne | F64Lt | F64Gt | F64Le | F64Ge => ValType::F64,
        _ => unreachable!("cmp_operand_type called on non-comparison opcode"),
    }
}

pub(crate) fn cmp_is_unary(opcode: Opcode) -> bool {
    matches!(opcode, Opcode::I32Eqz | Opcode::I64Eqz)
}

pub(crate) fn numop_type(opcode: Opcode) -> ValType {
    use Opcode::*;
    match opcode {
        I32Clz | I32Ctz | I32Popcnt | I32Add | I32Sub | I32Mul | I32DivS | I32DivU | I32RemS | I32RemU | I32And
        | I32Or | I32Xor | I32Shl | I32ShrS | I32ShrU | I32Rotl | I32Rotr => ValType::I32,
        I64Clz | I64Ctz | I64Popcnt | I64Add | I64Sub | I64Mul | I64DivS | I64DivU | I64RemS | I64RemU | I64And
        | I64Or | I64Xor | I64Shl | I64ShrS | I64ShrU | I64Rotl | I64Rotr => ValType::I64,
        F32Abs | F32Neg | F32Ceil | F32Floor | F32Trunc | F32Nearest | F32Sqrt | F32Add | F32Sub | F32Mul | F32Div
        | F32Min | F32Max | F32Copysign => ValType::F32,
        F64Abs | F64Neg | F64Ceil | F64Floor | F64Trunc | F64Nearest | F64Sqrt | F64Add | F64Sub | F64Mul | F64Div
        | F64Min | F64Max | F64Copysign => ValType::F64,
        _ => unreachable!("numop_type called on non-numeric opcode"),
    }
}

pub(crate) fn numop_is_unary(opcode: Opcode) -> bool {
    use Opcode::*;
    matches!(
        opcode,
        I32Clz
            | I32Ctz
            | I32Popcnt
            | I64Clz
            | I64Ctz
            | I64Popcnt
            | F32Abs
            | F32Neg
            | F32Ceil
            | F32Floor
            | F32Trunc
            | F32Nearest
            | F32Sqrt
            | F64Abs
            | F64Neg
            | F64Ceil
            | F64Floor
            | F64Trunc
            | F64Nearest
            | F64Sqrt
    )
}

pub(crate) fn cvt_signature(opcode: Opcode) -> (ValType, ValType) {
    use Opcode::*;
    match opcode {
        I32WrapI64 => (ValType::I64, ValType::I32),
        I32TruncF32S | I32TruncF32U => (ValType::F32, ValType::I32),
        I32TruncF64S | I32TruncF64U => (ValType::F64, ValType::I32),
        I64ExtendI32S | I64ExtendI32U => (ValType::I32, ValType::I64),
        I64TruncF32S | I64TruncF32U => (ValType::F32, ValType::I64),
        I64TruncF64S | I64TruncF64U => (ValType::F64, ValType::I64),
        F32ConvertI32S | F32ConvertI32U => (ValType::I32, ValType::F32),
        F32ConvertI64S | F32ConvertI64U => (ValType::I64, ValType::F32),
        F32DemoteF64 => (ValType::F64, ValType::F32),
        F64ConvertI32S | F64ConvertI32U => (ValType::I32, ValType::F64),
        F64ConvertI64S | F64ConvertI64U => (ValType::I64, ValType::F64),
        F64PromoteF32 => (ValType::F32, ValType::F64),
        I32ReinterpretF32 => (ValType::F32, ValType::I32),
        I64ReinterpretF64 => (ValType::F64, ValType::I64),
        F32ReinterpretI32 => (ValType::I32, ValType::F32),
        F64ReinterpretI64 => (ValType::I64, ValType::F64),
        _ => unreachable!("cvt_signature called on non-conversion opcode"),
    }
}

/// `decode_one` can only fail with one of these four kinds when reading a
/// function body (malformed LEB128, a bad block-type byte, or an unknown
/// opcode); everything else is unreachable in this call site.
fn translate_decode_error(error: ParseError) -> CodeValidationError {
    match error {
        ParseError::IllegalOpcode { byte, offset } => CodeValidationError::IllegalOpcode { byte, offset },
        ParseError::UnexpectedEof { offset }
        | ParseError::TruncatedLeb128 { offset }
        | ParseError::NonCanonicalLeb128 { offset }
        | ParseError::InvalidValType { offset, .. } => CodeValidationError::MalformedInstruction { offset },
        _ => unreachable!("decode_one over a function body cannot produce other ParseError kinds"),
    }
}

/// Validates one locally defined function, identified by its absolute
/// index in the module's function index space (imports counted first).
pub fn validate_function(module: &ModuleStorage<'_>, function_index: usize) -> Result<(), CodeValidationError> {
    let imported = module.imported_function_count();
    let local_index = function_index - imported;
    let code = &module.codes[local_index];
    let func_type = module
        .function_type(function_index as u32)
        .expect("function index is within bounds once the parser has accepted the module");

    let mut locals = func_type.params.clone();
    for (count, ty) in &code.locals {
        for _ in 0..*count {
            locals.push(*ty);
        }
    }

    let mut validator = Validator {
        stack: Vec::new(),
        frames: vec![ControlFrame {
            kind: FrameKind::Function,
            label_types: func_type.results.clone(),
            end_types: func_type.results.clone(),
            height: 0,
            unreachable: false,
        }],
        locals,
    };

    let mut cursor = Cursor::at(module.bytes, code.expr_begin);
    loop {
        if validator.frames.is_empty() {
            break;
        }
        if cursor.pos() >= code.code_end {
            return Err(CodeValidationError::MissingEnd { offset: code.code_end });
        }
        let (offset, instr) = decode_one(&mut cursor).map_err(translate_decode_error)?;
        validator.step(module, instr, offset)?;
    }
    if cursor.pos() != code.code_end {
        return Err(CodeValidationError::TrailingBytesAfterEnd { offset: cursor.pos() });
    }
    Ok(())
}

/// Validates every locally defined function in `module`, stopping at the
/// first failure and reporting which absolute function index it occurred
/// in.
pub fn validate_module(module: &ModuleStorage<'_>) -> Result<(), (usize, CodeValidationError)> {
    let imported = module.imported_function_count();
    for local_index in 0..module.codes.len() {
        let function_index = imported + local_index;
        validate_function(module, function_index).map_err(|error| (function_index, error))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ParserLimits;
    use crate::parser::parse_module;

    fn wrap_function(type_bytes: &[u8], code_bytes: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];
        // type section: one func type
        let mut type_section = vec![0x01u8];
        type_section.extend_from_slice(type_bytes);
        bytes.push(0x01);
        bytes.push(type_section.len() as u8);
        bytes.extend_from_slice(&type_section);
        // function section: one function, type 0
        bytes.extend_from_slice(&[0x03, 0x02, 0x01, 0x00]);
        // code section: one body
        let mut body = vec![0x00u8]; // zero local-decl groups
        body.extend_from_slice(code_bytes);
        let mut code_section = vec![0x01u8];
        code_section.push(body.len() as u8);
        code_section.extend_from_slice(&body);
        bytes.push(0x0A);
        bytes.push(code_section.len() as u8);
        bytes.extend_from_slice(&code_section);
        bytes
    }

    #[test]
    fn validates_i32_add_identity() {
        // (i32, i32) -> i32
        let type_bytes = [0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F];
        // local.get 0; local.get 1; i32.add; end
        let code_bytes = [0x20, 0x00, 0x20, 0x01, 0x6A, 0x0B];
        let bytes = wrap_function(&type_bytes, &code_bytes);
        let module = parse_module(&bytes, &ParserLimits::default()).unwrap();
        assert!(validate_module(&module).is_ok());
    }

    #[test]
    fn rejects_operand_stack_underflow() {
        let type_bytes = [0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F];
        // i32.add; end -- with nothing pushed
        let code_bytes = [0x6A, 0x0B];
        let bytes = wrap_function(&type_bytes, &code_bytes);
        let module = parse_module(&bytes, &ParserLimits::default()).unwrap();
        match validate_module(&module) {
            Err((_, CodeValidationError::OperandStackUnderflow { opcode: Opcode::I32Add, required: 1, actual: 0, .. })) => {}
            other => panic!("expected operand_stack_underflow, got {other:?}"),
        }
    }

    #[test]
    fn rejects_select_type_mismatch() {
        let type_bytes = [0x60, 0x00, 0x01, 0x7F];
        // i32.const 1; f64.const 2.0; i32.const 0; select; end
        let mut code_bytes = vec![0x41, 0x01, 0x44];
        code_bytes.extend_from_slice(&2.0f64.to_le_bytes());
        code_bytes.extend_from_slice(&[0x41, 0x00, 0x1B, 0x0B]);
        let bytes = wrap_function(&type_bytes, &code_bytes);
        let module = parse_module(&bytes, &ParserLimits::default()).unwrap();
        match validate_module(&module) {
            Err((_, CodeValidationError::SelectTypeMismatch { .. })) => {}
            other => panic!("expected select_type_mismatch, got {other:?}"),
        }
    }

    #[test]
    fn rejects_branch_out_of_range() {
        let type_bytes = [0x60, 0x00, 0x00];
        // br 5; end -- single outer (function) frame, max valid label is 0
        let code_bytes = [0x0C, 0x05, 0x0B];
        let bytes = wrap_function(&type_bytes, &code_bytes);
        let module = parse_module(&bytes, &ParserLimits::default()).unwrap();
        match validate_module(&module) {
            Err((_, CodeValidationError::InvalidBranchLabel { label: 5, max: 0, .. })) => {}
            other => panic!("expected invalid_branch_label, got {other:?}"),
        }
    }
}
