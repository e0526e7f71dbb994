//! The interpreter runtime (§4.4, ambient: "required for the generator's
//! output to be executable" but not itself one of the three core
//! components): the dispatch loop that walks a [`crate::codegen::OpSlot`]
//! stream, plus the `Instance`/`Frame` data structures it operates over.
//!
//! Grounded in the teacher's `exec::instance::Instance`/`InstanceRef`
//! split (an owning struct plus a borrowed view the dispatch loop
//! threads through), generalized from "interpret the decoded instruction
//! tree directly" to "drive the generated op-stream," and from
//! unconditional recursive tail-call-shaped dispatch to the explicit
//! depth-checked recursion the Rust realization note in §4.3 sanctions
//! (recursion here plays the role of the trampoline: each `call` recurses
//! one Rust stack frame, bounded by [`MAX_CALL_DEPTH`] so a runaway guest
//! call chain raises `Trap::StackOverflow` instead of aborting the host
//! process).

pub mod host;
pub mod memory;
pub mod ops;
pub mod trap;

use std::cell::Cell;

use thiserror::Error;
use tracing::{debug_span, trace};

use crate::codegen::{generate_function, CompiledFunction, OpSlot};
use crate::decode::Cursor;
use crate::module::ModuleStorage;
use crate::parser::instructions::{decode_one, Instr};
use crate::sync::LazyCompiled;
use crate::types::{ImportDesc, Value, ValType};
use crate::validator::{cmp_is_unary, numop_is_unary};

pub use host::{HostFnHandle, HostImports, ImportDescKind, NoImports, ResolvedImport};
pub use memory::Memory;
pub use trap::Trap;

/// Bounds recursive `call`/`call_indirect` depth. Not named by the
/// distilled spec (which assumes a native call stack and a signal-based
/// guard page); a fixed ceiling is this crate's safe-Rust equivalent,
/// chosen generously enough that no MVP test fixture legitimately needs
/// more.
const MAX_CALL_DEPTH: usize = 4096;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InstantiationError {
    #[error("unresolved import {module}.{field}")]
    UnresolvedImport { module: String, field: String },
    #[error(transparent)]
    Trap(#[from] Trap),
}

/// A module in execution: resolved imports, linear memory, globals, table,
/// and the per-function lazy-compilation cells backing `call`.
///
/// Grounded in `exec::instance::Instance` (`functions`, `memory`,
/// `operand_stack`, `call_stack`), generalized: the teacher's single
/// global `operand_stack`/`call_stack` pair is replaced by one `Frame` per
/// call (each `Frame` owns its own operand stack), which is what makes
/// recursive calls and the depth counter in this module correct instead of
/// sharing mutable state across calls.
pub struct Instance<'m, H: HostImports> {
    module: &'m ModuleStorage<'m>,
    host: H,
    compiled: Vec<LazyCompiled<CompiledFunction>>,
    imported_functions: Vec<HostFnHandle>,
    memory: Option<Memory>,
    globals: Vec<Value>,
    table: Vec<Option<u32>>,
    depth: Cell<usize>,
}

impl<'m, H: HostImports> Instance<'m, H> {
    /// Instantiates `module` against `host`: resolves every import,
    /// allocates and zero-fills linear memory, evaluates global
    /// initializers, populates the table from element segments, copies
    /// data segments into memory, and runs the start function if one is
    /// declared.
    pub fn instantiate(module: &'m ModuleStorage<'m>, mut host: H) -> Result<Self, InstantiationError> {
        let _span = debug_span!("instantiate").entered();

        let mut imported_functions = Vec::new();
        let mut globals = Vec::new();
        for import in &module.imports {
            match &import.desc {
                ImportDesc::Function(_) => {
                    match host.lookup_import(&import.module, &import.field, ImportDescKind::Function) {
                        Some(ResolvedImport::Function(handle)) => imported_functions.push(handle),
                        _ => {
                            return Err(InstantiationError::UnresolvedImport {
                                module: import.module.clone(),
                                field: import.field.clone(),
                            })
                        }
                    }
                }
                ImportDesc::Global(_) => match host.lookup_import(&import.module, &import.field, ImportDescKind::Global)
                {
                    Some(ResolvedImport::Global(value)) => globals.push(value),
                    _ => {
                        return Err(InstantiationError::UnresolvedImport {
                            module: import.module.clone(),
                            field: import.field.clone(),
                        })
                    }
                },
                // Imported tables/memories are resolved at the host boundary but,
                // in this interpreter-only runtime, not backed by a local `Memory`/
                // table -- see DESIGN.md's "imported memory/table" note.
                ImportDesc::Table(_) | ImportDesc::Memory(_) => {}
            }
        }

        for (global_type, begin, _) in &module.globals {
            let value = eval_const_expr(module, *begin, &globals);
            debug_assert_eq!(value.val_type(), global_type.value_type);
            globals.push(value);
        }

        let mut memory = module.memories.first().map(|mt| Memory::new(mt.limits));

        let mut table: Vec<Option<u32>> =
            module.tables.first().map(|tt| vec![None; tt.limits.min as usize]).unwrap_or_default();

        for element in &module.elements {
            let offset = eval_const_expr(module, element.offset_expr_begin, &globals)
                .as_i32()
                .expect("element offset validated as i32") as u32 as usize;
            let needed = offset + element.function_indices.len();
            if needed > table.len() {
                table.resize(needed, None);
            }
            for (i, func_index) in element.function_indices.iter().enumerate() {
                table[offset + i] = Some(*func_index);
            }
        }

        for segment in &module.data {
            if segment.passive {
                continue;
            }
            let offset = eval_const_expr(module, segment.offset_expr_begin, &globals)
                .as_i32()
                .expect("data offset validated as i32") as u32 as usize;
            let mem = memory.as_mut().ok_or(Trap::OutOfBoundsMemoryAccess)?;
            if !mem.write_bytes(offset, &segment.bytes) {
                return Err(InstantiationError::Trap(Trap::OutOfBoundsMemoryAccess));
            }
        }

        let compiled = (0..module.functions.len()).map(|_| LazyCompiled::uncompiled()).collect();

        let mut instance = Instance {
            module,
            host,
            compiled,
            imported_functions,
            memory,
            globals,
            table,
            depth: Cell::new(0),
        };

        if let Some(start) = module.start {
            instance.call(start, &[])?;
        }

        Ok(instance)
    }

    pub fn memory(&self) -> Option<&Memory> {
        self.memory.as_ref()
    }

    pub fn global(&self, index: u32) -> Option<Value> {
        self.globals.get(index as usize).copied()
    }

    /// Calls the function at `function_index` (spanning the import and
    /// local-definition index spaces, per [`ModuleStorage::function_type`])
    /// with `args`, returning its results or the trap that stopped it.
    pub fn call(&mut self, function_index: u32, args: &[Value]) -> Result<Vec<Value>, Trap> {
        let imported = self.module.imported_function_count();
        if (function_index as usize) < imported {
            let handle = self.imported_functions[function_index as usize];
            let func_type = self
                .module
                .function_type(function_index)
                .expect("function index validated in range");
            let mut results = vec![Value::I32(0); func_type.results.len()];
            self.host.invoke_host_function(handle, args, &mut results)?;
            return Ok(results);
        }

        if self.depth.get() >= MAX_CALL_DEPTH {
            return Err(Trap::StackOverflow);
        }
        self.depth.set(self.depth.get() + 1);

        let local_index = function_index as usize - imported;
        let module = self.module;
        // Cloned out from under the cell's borrow so the dispatch loop
        // below can take `&mut self` freely; `CompiledFunction` is cheap
        // reference-counted-in-spirit data (a handful of `Vec`s), and this
        // clone only ever happens once per function, not once per call,
        // since `get_or_init` already memoized it.
        let compiled = self.compiled[local_index]
            .get_or_init(|| {
                generate_function(module, function_index as usize)
                    .expect("generate_function only runs on an already-validated module")
            })
            .clone();

        let _span = debug_span!("call", function_index).entered();
        // Plain get/set around the recursive call rather than an RAII guard:
        // a guard would need to hold a `&Cell<usize>` borrowed from `self`
        // alive across `run_frame`'s `&mut self`, which the borrow checker
        // won't allow. Decrementing unconditionally after capturing the
        // result (instead of via `?`) still restores the counter on every
        // exit path, traps included.
        let frame_result = self.run_frame(&compiled, &module.codes[local_index], args);
        self.depth.set(self.depth.get() - 1);
        frame_result
    }

    fn run_frame(&mut self, compiled: &CompiledFunction, code: &crate::types::CodeEntry, args: &[Value]) -> Result<Vec<Value>, Trap> {
        let mut locals = Vec::with_capacity((compiled.param_count + compiled.local_count) as usize);
        locals.extend_from_slice(args);
        // Declared (non-parameter) locals zero-initialize to their type's
        // default, per the Wasm spec.
        for (count, ty) in &code.locals {
            for _ in 0..*count {
                locals.push(zero_value(*ty));
            }
        }

        let mut frame = Frame { locals, stack: Vec::new() };
        self.exec_ops(&compiled.ops, &mut frame)
    }

    fn exec_ops(&mut self, ops: &[OpSlot], frame: &mut Frame) -> Result<Vec<Value>, Trap> {
        let mut ip = 0usize;
        loop {
            let op = &ops[ip];
            trace!(ip, ?op, "executing op");
            match op {
                OpSlot::Unreachable => return Err(Trap::Unreachable),
                OpSlot::Drop => {
                    frame.stack.pop();
                }
                OpSlot::Select => {
                    let cond = pop_i32(frame);
                    let v2 = frame.stack.pop().expect("validated stack shape");
                    let v1 = frame.stack.pop().expect("validated stack shape");
                    frame.stack.push(if cond != 0 { v1 } else { v2 });
                }
                OpSlot::LocalGet(index) => frame.stack.push(frame.locals[*index as usize]),
                OpSlot::LocalSet(index) => {
                    let v = frame.stack.pop().expect("validated stack shape");
                    frame.locals[*index as usize] = v;
                }
                OpSlot::LocalTee(index) => {
                    let v = *frame.stack.last().expect("validated stack shape");
                    frame.locals[*index as usize] = v;
                }
                OpSlot::GlobalGet(index) => frame.stack.push(self.globals[*index as usize]),
                OpSlot::GlobalSet(index) => {
                    let v = frame.stack.pop().expect("validated stack shape");
                    self.globals[*index as usize] = v;
                }
                OpSlot::I32Const(v) => frame.stack.push(Value::I32(*v)),
                OpSlot::I64Const(v) => frame.stack.push(Value::I64(*v)),
                OpSlot::F32Const(v) => frame.stack.push(Value::F32(*v)),
                OpSlot::F64Const(v) => frame.stack.push(Value::F64(*v)),
                OpSlot::Cmp(opcode) => {
                    let result = if cmp_is_unary(*opcode) {
                        let a = frame.stack.pop().expect("validated stack shape");
                        ops::eval_cmp(*opcode, a, None)
                    } else {
                        let b = frame.stack.pop().expect("validated stack shape");
                        let a = frame.stack.pop().expect("validated stack shape");
                        ops::eval_cmp(*opcode, a, Some(b))
                    };
                    frame.stack.push(result);
                }
                OpSlot::NumOp(opcode) => {
                    let result = if numop_is_unary(*opcode) {
                        let a = frame.stack.pop().expect("validated stack shape");
                        ops::eval_numop(*opcode, a, None)?
                    } else {
                        let b = frame.stack.pop().expect("validated stack shape");
                        let a = frame.stack.pop().expect("validated stack shape");
                        ops::eval_numop(*opcode, a, Some(b))?
                    };
                    frame.stack.push(result);
                }
                OpSlot::Cvt(opcode) => {
                    let a = frame.stack.pop().expect("validated stack shape");
                    frame.stack.push(ops::eval_cvt(*opcode, a)?);
                }
                OpSlot::Load { opcode, arg } => {
                    let addr = pop_i32(frame) as u32;
                    let value = self.load(*opcode, addr, arg.offset)?;
                    frame.stack.push(value);
                }
                OpSlot::Store { opcode, arg } => {
                    let value = frame.stack.pop().expect("validated stack shape");
                    let addr = pop_i32(frame) as u32;
                    self.store(*opcode, addr, arg.offset, value)?;
                }
                OpSlot::MemorySize => {
                    let pages = self.memory.as_ref().map(|m| m.page_count()).unwrap_or(0);
                    frame.stack.push(Value::I32(pages as i32));
                }
                OpSlot::MemoryGrow => {
                    let delta = pop_i32(frame) as u32;
                    let result = match self.memory.as_mut() {
                        Some(mem) => mem.grow(delta).map(|p| p as i32).unwrap_or(-1),
                        None => -1,
                    };
                    frame.stack.push(Value::I32(result));
                }
                OpSlot::BrIfFalse { target } => {
                    let cond = pop_i32(frame);
                    if cond == 0 {
                        ip = *target;
                        continue;
                    }
                }
                OpSlot::Br { target, unwind_height, carries_value } => {
                    unwind(frame, *unwind_height, *carries_value);
                    ip = *target;
                    continue;
                }
                OpSlot::BrIf { target, unwind_height, carries_value } => {
                    let cond = pop_i32(frame);
                    if cond != 0 {
                        unwind(frame, *unwind_height, *carries_value);
                        ip = *target;
                        continue;
                    }
                }
                OpSlot::BrTable { targets, target_heights, default, default_height, carries_value } => {
                    let index = pop_i32(frame) as u32 as usize;
                    let (target, height) = if index < targets.len() {
                        (targets[index], target_heights[index])
                    } else {
                        (*default, *default_height)
                    };
                    unwind(frame, height, *carries_value);
                    ip = target;
                    continue;
                }
                OpSlot::Return => return Ok(frame.stack.clone()),
                OpSlot::Call(index) => {
                    let func_type = self.module.function_type(*index).expect("call target validated in range");
                    let n = func_type.params.len();
                    let split = frame.stack.len() - n;
                    let args: Vec<Value> = frame.stack.split_off(split);
                    let results = self.call(*index, &args)?;
                    frame.stack.extend(results);
                }
                OpSlot::CallIndirect { type_index } => {
                    let table_index = pop_i32(frame) as u32 as usize;
                    let func_index = *self
                        .table
                        .get(table_index)
                        .ok_or(Trap::OutOfBoundsTableAccess)?
                        .as_ref()
                        .ok_or(Trap::CallIndirectNull)?;
                    let expected = &self.module.types[*type_index as usize];
                    let actual = self.module.function_type(func_index).expect("element function index is valid");
                    if actual != expected {
                        return Err(Trap::IndirectCallTypeMismatch);
                    }
                    let n = expected.params.len();
                    let split = frame.stack.len() - n;
                    let args: Vec<Value> = frame.stack.split_off(split);
                    let results = self.call(func_index, &args)?;
                    frame.stack.extend(results);
                }
                OpSlot::LocalGetAdd(index) => {
                    let b = pop_i32(frame);
                    let a = frame.locals[*index as usize].as_i32().expect("fusion only applies to i32 locals");
                    frame.stack.push(Value::I32(a.wrapping_add(b)));
                }
                OpSlot::LocalGetAddImm(index, imm) => {
                    let a = frame.locals[*index as usize].as_i32().expect("fusion only applies to i32 locals");
                    frame.stack.push(Value::I32(a.wrapping_add(*imm)));
                }
                OpSlot::EqBrIf { target, unwind_height, carries_value } => {
                    let b = pop_i32(frame);
                    let a = pop_i32(frame);
                    if a == b {
                        unwind(frame, *unwind_height, *carries_value);
                        ip = *target;
                        continue;
                    }
                }
                OpSlot::LocalGetI32Load { local, offset } => {
                    let addr = frame.locals[*local as usize].as_i32().expect("fusion only applies to i32 locals") as u32;
                    let value = self.load(crate::parser::types::Opcode::I32Load, addr, *offset)?;
                    frame.stack.push(value);
                }
                OpSlot::DoubleLocalGet(a, b) => {
                    frame.stack.push(frame.locals[*a as usize]);
                    frame.stack.push(frame.locals[*b as usize]);
                }
                OpSlot::Spill(_) | OpSlot::Refill(_) => {
                    // No-op in this safe-Rust realization: the register
                    // cache and the overflow stack share one `Vec<Value>`
                    // backing (`frame.stack`), so there is nothing to move.
                    // See DESIGN.md's stack-top cache realization note.
                }
            }
            ip += 1;
        }
    }

    fn effective_address(&self, addr: u32, offset: u32, width: u32) -> Result<usize, Trap> {
        let start = addr.checked_add(offset).ok_or(Trap::OutOfBoundsMemoryAccess)?;
        let end = start.checked_add(width).ok_or(Trap::OutOfBoundsMemoryAccess)?;
        let mem = self.memory.as_ref().ok_or(Trap::OutOfBoundsMemoryAccess)?;
        if end as usize > mem.data().len() {
            return Err(Trap::OutOfBoundsMemoryAccess);
        }
        Ok(start as usize)
    }

    fn load(&self, opcode: crate::parser::types::Opcode, addr: u32, offset: u32) -> Result<Value, Trap> {
        use crate::parser::types::Opcode::*;
        let width = crate::parser::instructions::access_width(opcode);
        let start = self.effective_address(addr, offset, width)?;
        let mem = self.memory.as_ref().expect("effective_address already checked memory exists");
        let bytes = mem.read_bytes(start, width as usize).expect("bounds already checked");
        Ok(match opcode {
            I32Load => Value::I32(i32::from_le_bytes(bytes.try_into().unwrap())),
            I64Load => Value::I64(i64::from_le_bytes(bytes.try_into().unwrap())),
            F32Load => Value::F32(f32::from_le_bytes(bytes.try_into().unwrap())),
            F64Load => Value::F64(f64::from_le_bytes(bytes.try_into().unwrap())),
            I32Load8S => Value::I32(bytes[0] as i8 as i32),
            I32Load8U => Value::I32(bytes[0] as i32),
            I32Load16S => Value::I32(i16::from_le_bytes(bytes.try_into().unwrap()) as i32),
            I32Load16U => Value::I32(u16::from_le_bytes(bytes.try_into().unwrap()) as i32),
            I64Load8S => Value::I64(bytes[0] as i8 as i64),
            I64Load8U => Value::I64(bytes[0] as i64),
            I64Load16S => Value::I64(i16::from_le_bytes(bytes.try_into().unwrap()) as i64),
            I64Load16U => Value::I64(u16::from_le_bytes(bytes.try_into().unwrap()) as i64),
            I64Load32S => Value::I64(i32::from_le_bytes(bytes.try_into().unwrap()) as i64),
            I64Load32U => Value::I64(u32::from_le_bytes(bytes.try_into().unwrap()) as i64),
            _ => unreachable!("load called with a non-load opcode"),
        })
    }

    fn store(&mut self, opcode: crate::parser::types::Opcode, addr: u32, offset: u32, value: Value) -> Result<(), Trap> {
        use crate::parser::types::Opcode::*;
        let width = crate::parser::instructions::access_width(opcode);
        let start = self.effective_address(addr, offset, width)?;
        let bytes: Vec<u8> = match (opcode, value) {
            (I32Store, Value::I32(v)) => v.to_le_bytes().to_vec(),
            (I64Store, Value::I64(v)) => v.to_le_bytes().to_vec(),
            (F32Store, Value::F32(v)) => v.to_le_bytes().to_vec(),
            (F64Store, Value::F64(v)) => v.to_le_bytes().to_vec(),
            (I32Store8, Value::I32(v)) => vec![v as u8],
            (I32Store16, Value::I32(v)) => (v as u16).to_le_bytes().to_vec(),
            (I64Store8, Value::I64(v)) => vec![v as u8],
            (I64Store16, Value::I64(v)) => (v as u16).to_le_bytes().to_vec(),
            (I64Store32, Value::I64(v)) => (v as u32).to_le_bytes().to_vec(),
            _ => unreachable!("store called with a mismatched opcode/value pair"),
        };
        let mem = self.memory.as_mut().expect("effective_address already checked memory exists");
        mem.write_bytes(start, &bytes);
        Ok(())
    }
}

struct Frame {
    locals: Vec<Value>,
    stack: Vec<Value>,
}

fn pop_i32(frame: &mut Frame) -> i32 {
    frame.stack.pop().expect("validated stack shape").as_i32().expect("validated stack shape")
}

fn unwind(frame: &mut Frame, height: usize, carries_value: bool) {
    if carries_value {
        let v = frame.stack.pop().expect("validated stack shape");
        frame.stack.truncate(height);
        frame.stack.push(v);
    } else {
        frame.stack.truncate(height);
    }
}

fn zero_value(ty: ValType) -> Value {
    match ty {
        ValType::I32 => Value::I32(0),
        ValType::I64 => Value::I64(0),
        ValType::F32 => Value::F32(0.0),
        ValType::F64 => Value::F64(0.0),
    }
}

/// Evaluates a constant expression starting at `begin` (`global.init`, an
/// active element/data segment's offset): one `i32.const`/`i64.const`/
/// `f32.const`/`f64.const`/`global.get` instruction, exactly the shape
/// `parser::sections::parse_const_expr` already checked at parse time.
/// `global.get` may only name an already-resolved import (enforced there
/// too), which is why `globals` only needs to hold the imports resolved so
/// far when this runs during instantiation.
fn eval_const_expr(module: &ModuleStorage<'_>, begin: usize, globals: &[Value]) -> Value {
    let mut cursor = Cursor::at(module.bytes, begin);
    let (_, instr) = decode_one(&mut cursor).expect("parse_const_expr already validated this range decodes cleanly");
    match instr {
        Instr::I32Const(v) => Value::I32(v),
        Instr::I64Const(v) => Value::I64(v),
        Instr::F32Const(v) => Value::F32(v),
        Instr::F64Const(v) => Value::F64(v),
        Instr::GlobalGet(index) => globals[index as usize],
        other => unreachable!("parse_const_expr only ever admits const/global.get, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ParserLimits;
    use crate::parser::parse_module;
    use crate::validator::validate_module;

    fn compile(bytes: &[u8]) -> crate::module::ModuleStorage<'_> {
        parse_module(bytes, &ParserLimits::default()).unwrap()
    }

    fn module_with_add_function() -> Vec<u8> {
        let mut bytes = vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];
        // type 0: (i32, i32) -> i32
        bytes.extend_from_slice(&[0x01, 0x07, 0x01, 0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F]);
        bytes.extend_from_slice(&[0x03, 0x02, 0x01, 0x00]); // function 0: type 0
        let code = [0x20, 0x00, 0x20, 0x01, 0x6A, 0x0B]; // local.get 0; local.get 1; i32.add; end
        bytes.push(0x0A); // code section
        bytes.push((3 + code.len()) as u8);
        bytes.push(0x01); // one body
        bytes.push((1 + code.len()) as u8);
        bytes.push(0x00); // zero local groups
        bytes.extend_from_slice(&code);
        bytes
    }

    #[test]
    fn i32_add_identity_scenario() {
        let bytes = module_with_add_function();
        let module = compile(&bytes);
        validate_module(&module).unwrap();
        let mut instance = Instance::instantiate(&module, NoImports).unwrap();
        let results = instance.call(0, &[Value::I32(40), Value::I32(2)]).unwrap();
        assert_eq!(results, vec![Value::I32(42)]);
    }

    #[test]
    fn division_by_zero_traps() {
        let mut bytes = vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&[0x01, 0x06, 0x01, 0x60, 0x01, 0x7F, 0x01, 0x7F]); // (i32) -> i32
        bytes.extend_from_slice(&[0x03, 0x02, 0x01, 0x00]);
        let code = [0x20, 0x00, 0x41, 0x00, 0x6D, 0x0B]; // local.get 0; i32.const 0; i32.div_s; end
        bytes.push(0x0A);
        bytes.push((3 + code.len()) as u8);
        bytes.push(0x01);
        bytes.push((1 + code.len()) as u8);
        bytes.push(0x00);
        bytes.extend_from_slice(&code);
        let module = compile(&bytes);
        validate_module(&module).unwrap();
        let mut instance = Instance::instantiate(&module, NoImports).unwrap();
        let trap = instance.call(0, &[Value::I32(1)]).unwrap_err();
        assert_eq!(trap, Trap::IntegerDivideByZero);
    }

    #[test]
    fn empty_module_has_no_start_side_effects() {
        let bytes = [0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];
        let module = compile(&bytes);
        validate_module(&module).unwrap();
        let instance = Instance::instantiate(&module, NoImports).unwrap();
        assert!(instance.memory().is_none());
    }

    #[test]
    fn value_producing_if_else_selects_the_right_arm() {
        // local.get 0; if (result i32) i32.const 10 else i32.const 20 end; end
        let mut bytes = vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&[0x01, 0x06, 0x01, 0x60, 0x01, 0x7F, 0x01, 0x7F]); // (i32) -> i32
        bytes.extend_from_slice(&[0x03, 0x02, 0x01, 0x00]);
        let code = [0x20, 0x00, 0x04, 0x7F, 0x41, 0x0A, 0x05, 0x41, 0x14, 0x0B, 0x0B];
        bytes.push(0x0A);
        bytes.push((3 + code.len()) as u8);
        bytes.push(0x01);
        bytes.push((1 + code.len()) as u8);
        bytes.push(0x00);
        bytes.extend_from_slice(&code);
        let module = compile(&bytes);
        validate_module(&module).unwrap();
        let mut instance = Instance::instantiate(&module, NoImports).unwrap();
        assert_eq!(instance.call(0, &[Value::I32(1)]).unwrap(), vec![Value::I32(10)]);
        assert_eq!(instance.call(0, &[Value::I32(0)]).unwrap(), vec![Value::I32(20)]);
    }

    #[test]
    fn nested_if_else_does_not_corrupt_outer_stack_value() {
        // local.get 0; local.get 0;
        // if (result i32) local.get 0; if (result i32) i32.const 1 else i32.const 2 end
        // else i32.const 3 end
        // i32.add; end
        //
        // The outer `local.get 0` sits below the if/else on the operand
        // stack; a buggy unwind that truncates to height 0 would discard it
        // before the trailing i32.add, corrupting the result.
        let mut bytes = vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&[0x01, 0x06, 0x01, 0x60, 0x01, 0x7F, 0x01, 0x7F]); // (i32) -> i32
        bytes.extend_from_slice(&[0x03, 0x02, 0x01, 0x00]);
        let code = [
            0x20, 0x00, // local.get 0
            0x20, 0x00, // local.get 0
            0x04, 0x7F, // if (result i32)
            0x20, 0x00, // local.get 0
            0x04, 0x7F, // if (result i32)
            0x41, 0x01, // i32.const 1
            0x05, // else
            0x41, 0x02, // i32.const 2
            0x0B, // end (inner if)
            0x05, // else
            0x41, 0x03, // i32.const 3
            0x0B, // end (outer if)
            0x6A, // i32.add
            0x0B, // end (function)
        ];
        bytes.push(0x0A);
        bytes.push((3 + code.len()) as u8);
        bytes.push(0x01);
        bytes.push((1 + code.len()) as u8);
        bytes.push(0x00);
        bytes.extend_from_slice(&code);
        let module = compile(&bytes);
        validate_module(&module).unwrap();
        let mut instance = Instance::instantiate(&module, NoImports).unwrap();
        // condition nonzero: outer local.get 0 (1) + inner if's then-arm (1) = 2
        assert_eq!(instance.call(0, &[Value::I32(1)]).unwrap(), vec![Value::I32(2)]);
        // condition zero: outer local.get 0 (0) + outer if's else-arm (3) = 3
        assert_eq!(instance.call(0, &[Value::I32(0)]).unwrap(), vec![Value::I32(3)]);
    }
}
