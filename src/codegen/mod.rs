//! The interpreter code generator (§4.3): a second forward pass over a
//! validated function body's raw bytes, lowering it into a flat
//! `Vec<OpSlot>` threaded op-stream with branch targets pre-resolved to
//! absolute offsets, the four enumerated peephole fusions applied, and
//! stack-top register-cache spill/refill bookkeeping inserted where the
//! compile-time cursor simulation says it is needed.
//!
//! New relative to the teacher, which has no lowering pass at all (it
//! interprets its decoded instruction tree directly) -- grounded in the
//! distilled spec's own §4.3 description plus `examples/original_source`'s
//! `uwvm_int` register-ring test files for the cache's exact ring-order
//! spill/refill semantics (see [`cache`]). The op-function ABI the distilled
//! spec describes (`fn(ip, sp, local_base, cache...) -> ControlFlow`) is
//! realized here as data (`OpSlot`) rather than function pointers: the
//! actual per-category op-function tables and the `Dispatch` trampoline
//! that walks this stream live in [`crate::runtime`], which is the thing
//! that actually executes what this module produces.

pub mod cache;

use crate::module::ModuleStorage;
use crate::parser::instructions::{decode_one, Instr};
use crate::parser::types::{MemArg, Opcode};
use crate::types::ValType;
use crate::decode::Cursor;
use crate::diagnostics::ParseError;
use crate::validator::{cmp_is_unary, cvt_signature, load_value_type, numop_is_unary, numop_type};

use cache::{CacheConfig, CacheCursor, Category};

/// One slot of the generated op-stream. Each variant names the runtime
/// operation and carries its resolved immediates; there is no separate
/// "function pointer" field because the runtime's dispatch loop switches on
/// the variant itself rather than indirecting through a pointer -- the
/// safe-Rust equivalent of the distilled spec's `[fptr][imm...]` slot the
/// §4.3 Rust-realization note describes.
#[derive(Debug, Clone, PartialEq)]
pub enum OpSlot {
    Unreachable,
    Drop,
    Select,

    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),

    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),

    Cmp(Opcode),
    NumOp(Opcode),
    Cvt(Opcode),

    Load { opcode: Opcode, arg: MemArg },
    Store { opcode: Opcode, arg: MemArg },
    MemorySize,
    MemoryGrow,

    /// Conditional jump-if-false used only to lower `if`/`else`; not a
    /// wasm opcode in its own right, just the two-way branch `if` needs
    /// and `br_if` (which only ever branches on "truthy") does not give us.
    BrIfFalse { target: usize },

    Br { target: usize, unwind_height: usize, carries_value: bool },
    BrIf { target: usize, unwind_height: usize, carries_value: bool },
    BrTable {
        targets: Vec<usize>,
        target_heights: Vec<usize>,
        default: usize,
        default_height: usize,
        carries_value: bool,
    },
    Return,

    Call(u32),
    CallIndirect { type_index: u32 },

    // The four peephole fusions named in §4.3.
    LocalGetAdd(u32),
    LocalGetAddImm(u32, i32),
    EqBrIf { target: usize, unwind_height: usize, carries_value: bool },
    LocalGetI32Load { local: u32, offset: u32 },
    DoubleLocalGet(u32, u32),

    Spill(Category),
    Refill(Category),
}

/// The product of lowering one function: its op-stream plus the bookkeeping
/// the runtime needs to set up a call frame (how many locals to reserve,
/// how many of those are parameters supplied by the caller, and the
/// function's result types for the final `Return`/fallthrough).
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub ops: Vec<OpSlot>,
    pub param_count: u32,
    pub local_count: u32,
    pub results: Vec<ValType>,
    pub cache_config: CacheConfig,
}

fn category_of(ty: ValType) -> Category {
    match ty {
        ValType::I32 => Category::I32,
        ValType::I64 => Category::I64,
        ValType::F32 => Category::F32,
        ValType::F64 => Category::F64,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GenFrameKind {
    Block,
    Loop,
    If,
    IfElse,
    Function,
}

#[derive(Debug, Clone, Copy)]
enum PatchSite {
    /// `ops[index]` is one of `Br`/`BrIf`/`EqBrIf`/`BrIfFalse`; its
    /// `target` field gets overwritten.
    Simple(usize),
    /// `ops[index]` is `BrTable`; `arm` is an index into `targets`, or
    /// `usize::MAX` to mean the `default` arm.
    BrTableArm { index: usize, arm: usize },
}

struct GenFrame {
    kind: GenFrameKind,
    loop_start: usize,
    else_patch: Option<usize>,
    end_patches: Vec<PatchSite>,
    height: usize,
    result_present: bool,
}

struct Generator {
    ops: Vec<OpSlot>,
    frames: Vec<GenFrame>,
    cache: CacheCursor,
    cache_config: CacheConfig,
    type_stack: Vec<ValType>,
    unreachable: bool,
    locals: Vec<ValType>,
}

impl Generator {
    fn before_push(&mut self, ty: ValType) {
        if self.unreachable {
            return;
        }
        self.type_stack.push(ty);
        if self.cache.account_push(&self.cache_config, category_of(ty)) {
            self.ops.push(OpSlot::Spill(category_of(ty)));
        }
    }

    fn before_pop(&mut self) -> Option<ValType> {
        if self.unreachable {
            return None;
        }
        let ty = self.type_stack.pop();
        if let Some(t) = ty {
            if self.cache.account_pop(&self.cache_config, category_of(t)) {
                self.ops.push(OpSlot::Refill(category_of(t)));
            }
        }
        ty
    }

    /// Spills every category still holding a cached value, matching §4.3's
    /// "at block boundaries and joins, normalises the cache state."
    fn normalize(&mut self) {
        for category in self.cache.normalize() {
            self.ops.push(OpSlot::Spill(category));
        }
    }

    /// Resolves the frame `depth` labels targets: `Some(offset)` if the
    /// frame is a loop (branches there always land on its first op, known
    /// immediately), `None` if the branch needs a forward patch once the
    /// frame's `end` is reached. Always returns the frame's recorded
    /// operand-stack height and whether its label carries one value.
    fn resolve_target(&self, depth: u32) -> (Option<usize>, usize, bool) {
        let frame_idx = self.frames.len() - 1 - depth as usize;
        let frame = &self.frames[frame_idx];
        let carries_value = frame.result_present && frame.kind != GenFrameKind::Loop;
        if frame.kind == GenFrameKind::Loop {
            (Some(frame.loop_start), frame.height, carries_value)
        } else {
            (None, frame.height, carries_value)
        }
    }

    fn patch(&mut self, site: PatchSite, target: usize) {
        match site {
            PatchSite::Simple(index) => match &mut self.ops[index] {
                OpSlot::Br { target: t, .. }
                | OpSlot::BrIf { target: t, .. }
                | OpSlot::EqBrIf { target: t, .. }
                | OpSlot::BrIfFalse { target: t } => *t = target,
                _ => unreachable!("patch site does not point at a branch op"),
            },
            PatchSite::BrTableArm { index, arm } => match &mut self.ops[index] {
                OpSlot::BrTable { targets, default, .. } => {
                    if arm == usize::MAX {
                        *default = target;
                    } else {
                        targets[arm] = target;
                    }
                }
                _ => unreachable!("patch site does not point at a br_table op"),
            },
        }
    }

    fn emit_br(&mut self, depth: u32) {
        self.normalize();
        let (immediate, height, carries_value) = self.resolve_target(depth);
        match immediate {
            Some(target) => self.ops.push(OpSlot::Br { target, unwind_height: height, carries_value }),
            None => {
                let index = self.ops.len();
                self.ops.push(OpSlot::Br { target: 0, unwind_height: height, carries_value });
                let frame_idx = self.frames.len() - 1 - depth as usize;
                self.frames[frame_idx].end_patches.push(PatchSite::Simple(index));
            }
        }
        self.unreachable = true;
    }

    fn emit_br_if(&mut self, depth: u32) {
        self.before_pop(); // the i32 condition
        self.normalize();
        let (immediate, height, carries_value) = self.resolve_target(depth);
        match immediate {
            Some(target) => self.ops.push(OpSlot::BrIf { target, unwind_height: height, carries_value }),
            None => {
                let index = self.ops.len();
                self.ops.push(OpSlot::BrIf { target: 0, unwind_height: height, carries_value });
                let frame_idx = self.frames.len() - 1 - depth as usize;
                self.frames[frame_idx].end_patches.push(PatchSite::Simple(index));
            }
        }
    }

    fn emit_eq_br_if(&mut self, depth: u32) {
        self.before_pop();
        self.before_pop();
        self.normalize();
        let (immediate, height, carries_value) = self.resolve_target(depth);
        match immediate {
            Some(target) => self.ops.push(OpSlot::EqBrIf { target, unwind_height: height, carries_value }),
            None => {
                let index = self.ops.len();
                self.ops.push(OpSlot::EqBrIf { target: 0, unwind_height: height, carries_value });
                let frame_idx = self.frames.len() - 1 - depth as usize;
                self.frames[frame_idx].end_patches.push(PatchSite::Simple(index));
            }
        }
    }

    fn emit_br_table(&mut self, depths: &[u32], default_depth: u32) {
        self.before_pop(); // the i32 selector
        self.normalize();
        let op_index = self.ops.len();
        let mut targets = Vec::with_capacity(depths.len());
        let mut target_heights = Vec::with_capacity(depths.len());
        let mut carries_value = false;
        for (arm, depth) in depths.iter().enumerate() {
            let (immediate, height, carries) = self.resolve_target(*depth);
            carries_value = carries;
            target_heights.push(height);
            match immediate {
                Some(t) => targets.push(t),
                None => {
                    targets.push(0);
                    let frame_idx = self.frames.len() - 1 - *depth as usize;
                    self.frames[frame_idx].end_patches.push(PatchSite::BrTableArm { index: op_index, arm });
                }
            }
        }
        let (default_immediate, default_height, default_carries) = self.resolve_target(default_depth);
        carries_value = carries_value || default_carries;
        let default = match default_immediate {
            Some(t) => t,
            None => {
                let frame_idx = self.frames.len() - 1 - default_depth as usize;
                frame_idx_push_default_patch(self, frame_idx, op_index);
                0
            }
        };
        self.ops.push(OpSlot::BrTable { targets, target_heights, default, default_height, carries_value });
        self.unreachable = true;
    }

    fn emit(&mut self, op: OpSlot) {
        self.ops.push(op);
    }
}

fn frame_idx_push_default_patch(gen: &mut Generator, frame_idx: usize, op_index: usize) {
    gen.frames[frame_idx].end_patches.push(PatchSite::BrTableArm { index: op_index, arm: usize::MAX });
}

/// A one-instruction-deep lookahead buffer over `decode_one`, used to
/// recognize the fusable two- and three-instruction patterns without
/// abandoning the single forward pass over the function body: the buffer
/// never holds more than the few pending instructions a fusion's lookahead
/// needs, unlike the teacher's eager whole-body decode into a tree.
struct RawStream<'c, 'm> {
    cursor: &'c mut Cursor<'m>,
    buf: Vec<(usize, Instr)>,
    code_end: usize,
}

impl<'c, 'm> RawStream<'c, 'm> {
    fn new(cursor: &'c mut Cursor<'m>, code_end: usize) -> Self {
        RawStream { cursor, buf: Vec::new(), code_end }
    }

    fn fill(&mut self, n: usize) -> Result<(), ParseError> {
        while self.buf.len() < n && self.cursor.pos() < self.code_end {
            let (offset, instr) = decode_one(self.cursor)?;
            self.buf.push((offset, instr));
        }
        Ok(())
    }

    fn peek(&mut self, i: usize) -> Result<Option<(usize, Instr)>, ParseError> {
        self.fill(i + 1)?;
        Ok(self.buf.get(i).cloned())
    }

    fn pop(&mut self) -> Option<(usize, Instr)> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf.remove(0))
        }
    }

    fn pop_required(&mut self) -> Result<(usize, Instr), ParseError> {
        self.fill(1)?;
        Ok(self.pop().expect("generate_function only runs on already-validated, well-formed bodies"))
    }
}

/// Lowers one locally defined function, identified by its absolute index in
/// the module's function index space (imports counted first, matching
/// [`crate::validator::validate_function`]'s convention). Callers are
/// expected to have validated the function first; this makes no attempt to
/// produce a friendly diagnostic for malformed input and will panic on the
/// `pop_required` bottom-out instead.
pub fn generate_function(module: &ModuleStorage<'_>, function_index: usize) -> Result<CompiledFunction, ParseError> {
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

    let mut gen = Generator {
        ops: Vec::new(),
        frames: vec![GenFrame {
            kind: GenFrameKind::Function,
            loop_start: 0,
            else_patch: None,
            end_patches: Vec::new(),
            height: 0,
            result_present: !func_type.results.is_empty(),
        }],
        cache: CacheCursor::default(),
        cache_config: CacheConfig::default_depth(),
        type_stack: Vec::new(),
        unreachable: false,
        locals,
    };

    let mut cursor = Cursor::at(module.bytes, code.expr_begin);
    let mut stream = RawStream::new(&mut cursor, code.code_end);

    while !gen.frames.is_empty() {
        step(&mut gen, &mut stream, module)?;
    }

    Ok(CompiledFunction {
        ops: gen.ops,
        param_count: func_type.params.len() as u32,
        local_count: (gen.locals.len() - func_type.params.len()) as u32,
        results: func_type.results.clone(),
        cache_config: gen.cache_config,
    })
}

fn step(gen: &mut Generator, stream: &mut RawStream<'_, '_>, module: &ModuleStorage<'_>) -> Result<(), ParseError> {
    let (_offset, instr) = stream.pop_required()?;
    match instr {
        Instr::Unreachable => {
            gen.emit(OpSlot::Unreachable);
            gen.unreachable = true;
        }
        Instr::Nop => {}
        Instr::Block(bt) => {
            gen.normalize();
            gen.frames.push(GenFrame {
                kind: GenFrameKind::Block,
                loop_start: 0,
                else_patch: None,
                end_patches: Vec::new(),
                height: gen.type_stack.len(),
                result_present: matches!(bt, crate::parser::types::BlockType::Value(_)),
            });
            gen.unreachable = false;
        }
        Instr::Loop(bt) => {
            gen.normalize();
            gen.frames.push(GenFrame {
                kind: GenFrameKind::Loop,
                loop_start: gen.ops.len(),
                else_patch: None,
                end_patches: Vec::new(),
                height: gen.type_stack.len(),
                result_present: matches!(bt, crate::parser::types::BlockType::Value(_)),
            });
            gen.unreachable = false;
        }
        Instr::If(bt) => {
            gen.before_pop(); // condition
            gen.normalize();
            let else_index = gen.ops.len();
            gen.ops.push(OpSlot::BrIfFalse { target: 0 });
            gen.frames.push(GenFrame {
                kind: GenFrameKind::If,
                loop_start: 0,
                else_patch: Some(else_index),
                end_patches: Vec::new(),
                height: gen.type_stack.len(),
                result_present: matches!(bt, crate::parser::types::BlockType::Value(_)),
            });
            gen.unreachable = false;
        }
        Instr::Else => {
            gen.normalize();
            let (height, result_present) = {
                let frame = gen.frames.last().expect("else always has a matching if frame");
                (frame.height, frame.result_present)
            };
            let else_patch;
            {
                let skip_index = gen.ops.len();
                gen.ops.push(OpSlot::Br { target: 0, unwind_height: height, carries_value: result_present });
                let frame = gen.frames.last_mut().expect("else always has a matching if frame");
                else_patch = frame.else_patch.take();
                frame.end_patches.push(PatchSite::Simple(skip_index));
                frame.kind = GenFrameKind::IfElse;
            }
            if let Some(site) = else_patch {
                gen.patch(PatchSite::Simple(site), gen.ops.len());
            }
            gen.unreachable = false;
            // The else arm starts from the same operand-stack height the
            // then arm did; re-seed the type stack to that depth so cache
            // accounting for the else arm is independent of whatever the
            // then arm happened to leave behind.
            gen.type_stack.truncate(height);
        }
        Instr::End => {
            gen.normalize();
            let frame = gen.frames.pop().expect("end always has a matching frame");
            if frame.kind == GenFrameKind::Function {
                let return_index = gen.ops.len();
                gen.ops.push(OpSlot::Return);
                for site in frame.end_patches {
                    gen.patch(site, return_index);
                }
            } else {
                let end_index = gen.ops.len();
                for site in frame.end_patches {
                    gen.patch(site, end_index);
                }
                if let Some(site) = frame.else_patch {
                    gen.patch(PatchSite::Simple(site), end_index);
                }
                gen.unreachable = false;
                gen.type_stack.truncate(frame.height);
                if frame.result_present {
                    // The block produced exactly one value; it is already
                    // sitting on top of the (possibly truncated) stack from
                    // whichever arm fell through to here.
                    gen.type_stack.push(ValType::I32); // placeholder type, only length matters downstream
                }
            }
        }
        Instr::Br(n) => gen.emit_br(n),
        Instr::BrIf(n) => gen.emit_br_if(n),
        Instr::BrTable { targets, default } => gen.emit_br_table(&targets, default),
        Instr::Return => {
            let depth = gen.frames.len() as u32 - 1;
            gen.emit_br(depth);
        }
        Instr::Call(index) => {
            let callee_type = module.function_type(index).expect("call target validated in range");
            for _ in &callee_type.params {
                gen.before_pop();
            }
            let results = callee_type.results.clone();
            gen.ops.push(OpSlot::Call(index));
            for ty in results {
                gen.before_push(ty);
            }
        }
        Instr::CallIndirect { type_index } => {
            gen.before_pop(); // table index
            let callee_type = &module.types[type_index as usize];
            for _ in &callee_type.params {
                gen.before_pop();
            }
            let results = callee_type.results.clone();
            gen.ops.push(OpSlot::CallIndirect { type_index });
            for ty in results {
                gen.before_push(ty);
            }
        }
        Instr::Drop => {
            gen.before_pop();
            gen.emit(OpSlot::Drop);
        }
        Instr::Select => {
            gen.before_pop(); // condition
            let ty2 = gen.before_pop();
            let _ty1 = gen.before_pop();
            gen.emit(OpSlot::Select);
            if let Some(ty) = ty2 {
                gen.before_push(ty);
            }
        }
        Instr::LocalGet(index) => emit_local_get(gen, stream, index)?,
        Instr::LocalSet(index) => {
            gen.before_pop();
            gen.emit(OpSlot::LocalSet(index));
        }
        Instr::LocalTee(index) => {
            let ty = gen.before_pop();
            gen.emit(OpSlot::LocalTee(index));
            if let Some(ty) = ty {
                gen.before_push(ty);
            }
        }
        Instr::GlobalGet(index) => {
            let ty = module.global_type(index).expect("global index validated in range").value_type;
            gen.emit(OpSlot::GlobalGet(index));
            gen.before_push(ty);
        }
        Instr::GlobalSet(index) => {
            gen.before_pop();
            gen.emit(OpSlot::GlobalSet(index));
        }
        Instr::Load { opcode, arg } => {
            gen.before_pop(); // address
            gen.emit(OpSlot::Load { opcode, arg });
            gen.before_push(load_value_type(opcode));
        }
        Instr::Store { opcode, arg } => {
            gen.before_pop(); // value
            gen.before_pop(); // address
            gen.emit(OpSlot::Store { opcode, arg });
        }
        Instr::MemorySize => {
            gen.emit(OpSlot::MemorySize);
            gen.before_push(ValType::I32);
        }
        Instr::MemoryGrow => {
            gen.before_pop();
            gen.emit(OpSlot::MemoryGrow);
            gen.before_push(ValType::I32);
        }
        Instr::I32Const(v) => {
            gen.emit(OpSlot::I32Const(v));
            gen.before_push(ValType::I32);
        }
        Instr::I64Const(v) => {
            gen.emit(OpSlot::I64Const(v));
            gen.before_push(ValType::I64);
        }
        Instr::F32Const(v) => {
            gen.emit(OpSlot::F32Const(v));
            gen.before_push(ValType::F32);
        }
        Instr::F64Const(v) => {
            gen.emit(OpSlot::F64Const(v));
            gen.before_push(ValType::F64);
        }
        Instr::Cmp(op) => emit_cmp(gen, stream, op)?,
        Instr::NumOp(op) => {
            if numop_is_unary(op) {
                gen.before_pop();
            } else {
                gen.before_pop();
                gen.before_pop();
            }
            gen.emit(OpSlot::NumOp(op));
            gen.before_push(numop_type(op));
        }
        Instr::Cvt(op) => {
            let (_from, to) = cvt_signature(op);
            gen.before_pop();
            gen.emit(OpSlot::Cvt(op));
            gen.before_push(to);
        }
    }
    Ok(())
}

fn emit_local_get(gen: &mut Generator, stream: &mut RawStream<'_, '_>, index: u32) -> Result<(), ParseError> {
    let local_ty = gen.locals[index as usize];

    if let Some((_, Instr::NumOp(Opcode::I32Add))) = stream.peek(0)? {
        stream.pop();
        gen.before_pop(); // the existing stack operand being added to
        gen.emit(OpSlot::LocalGetAdd(index));
        gen.before_push(ValType::I32);
        return Ok(());
    }
    if let Some((_, Instr::I32Const(c))) = stream.peek(0)? {
        if let Some((_, Instr::NumOp(Opcode::I32Add))) = stream.peek(1)? {
            stream.pop();
            stream.pop();
            gen.emit(OpSlot::LocalGetAddImm(index, c));
            gen.before_push(ValType::I32);
            return Ok(());
        }
    }
    if let Some((_, Instr::Load { opcode: Opcode::I32Load, arg })) = stream.peek(0)? {
        stream.pop();
        gen.emit(OpSlot::LocalGetI32Load { local: index, offset: arg.offset });
        gen.before_push(ValType::I32);
        return Ok(());
    }
    if let Some((_, Instr::LocalGet(second))) = stream.peek(0)? {
        stream.pop();
        let second_ty = gen.locals[second as usize];
        gen.emit(OpSlot::DoubleLocalGet(index, second));
        gen.before_push(local_ty);
        gen.before_push(second_ty);
        return Ok(());
    }

    gen.emit(OpSlot::LocalGet(index));
    gen.before_push(local_ty);
    Ok(())
}

fn emit_cmp(gen: &mut Generator, stream: &mut RawStream<'_, '_>, op: Opcode) -> Result<(), ParseError> {
    if op == Opcode::I32Eq {
        if let Some((_, Instr::BrIf(n))) = stream.peek(0)? {
            stream.pop();
            gen.emit_eq_br_if(n);
            return Ok(());
        }
    }
    if cmp_is_unary(op) {
        gen.before_pop();
    } else {
        gen.before_pop();
        gen.before_pop();
    }
    gen.emit(OpSlot::Cmp(op));
    gen.before_push(ValType::I32);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ParserLimits;
    use crate::parser::parse_module;

    fn module_with_function(code_bytes: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];
        bytes.extend_from_slice(&[0x01, 0x06, 0x01, 0x60, 0x01, 0x7F, 0x01, 0x7F]); // type: (i32) -> i32
        bytes.extend_from_slice(&[0x03, 0x02, 0x01, 0x00]); // function 0: type 0
        let mut code_section = vec![0x01]; // one function body
        let body_len = 1 + code_bytes.len(); // locals-count byte (0) + expr
        code_section.push(body_len as u8);
        code_section.push(0x00); // zero local groups
        code_section.extend_from_slice(code_bytes);
        bytes.push(0x0A); // code section id
        bytes.push(code_section.len() as u8);
        bytes.extend_from_slice(&code_section);
        bytes
    }

    #[test]
    fn generates_identity_function() {
        // local.get 0; end
        let bytes = module_with_function(&[0x20, 0x00, 0x0B]);
        let module = parse_module(&bytes, &ParserLimits::default()).unwrap();
        let compiled = generate_function(&module, 0).unwrap();
        assert_eq!(compiled.param_count, 1);
        assert_eq!(compiled.local_count, 0);
        assert!(matches!(compiled.ops.last(), Some(OpSlot::Return)));
        assert!(matches!(compiled.ops[0], OpSlot::LocalGet(0)));
    }

    #[test]
    fn fuses_local_get_and_add() {
        // local.get 0; local.get 0; i32.add; end
        let bytes = module_with_function(&[0x20, 0x00, 0x20, 0x00, 0x6A, 0x0B]);
        let module = parse_module(&bytes, &ParserLimits::default()).unwrap();
        let compiled = generate_function(&module, 0).unwrap();
        assert!(compiled.ops.iter().any(|op| matches!(op, OpSlot::LocalGetAdd(0))));
    }

    #[test]
    fn resolves_forward_branch_target() {
        // block; br 0; end; end  (br exits the block to its own end)
        let bytes = module_with_function(&[0x02, 0x40, 0x0C, 0x00, 0x0B, 0x0B]);
        let module = parse_module(&bytes, &ParserLimits::default()).unwrap();
        let compiled = generate_function(&module, 0).unwrap();
        let br = compiled.ops.iter().find(|op| matches!(op, OpSlot::Br { .. })).unwrap();
        if let OpSlot::Br { target, .. } = br {
            assert_eq!(*target, compiled.ops.len() - 1); // lands on the trailing Return
        }
    }

    #[test]
    fn resolves_backward_loop_branch_immediately() {
        // loop; br 0; end; end
        let bytes = module_with_function(&[0x03, 0x40, 0x0C, 0x00, 0x0B, 0x0B]);
        let module = parse_module(&bytes, &ParserLimits::default()).unwrap();
        let compiled = generate_function(&module, 0).unwrap();
        let loop_start_index = 0; // the loop's first (and only) op is the br itself
        if let OpSlot::Br { target, .. } = &compiled.ops[0] {
            assert_eq!(*target, loop_start_index);
        } else {
            panic!("expected Br as the first op");
        }
    }
}
