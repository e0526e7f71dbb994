//! Instruction decoding: a single `decode_one` step shared by the validator
//! and the code generator, each of which makes its own forward pass over a
//! function body's raw bytes (§4.3: "The generator performs a second
//! forward pass").
//!
//! The teacher decodes a whole function body eagerly into a `Vec<Instruction>`
//! tree (nesting `Block`/`Loop`/`If` bodies as child vectors). This crate
//! flattens that: `block`/`loop`/`if`/`else`/`end` each decode to their own
//! `Instr` marker with no child list, because the validator's control-stack
//! and the generator's branch-target resolution both want linear addressing
//! into the byte stream, not a tree to walk back out of.

use num_enum::TryFromPrimitive;

use crate::decode::Cursor;
use crate::diagnostics::ParseError;
use crate::parser::types::{BlockType, MemArg, Opcode};
use crate::types::ValType;

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Unreachable,
    Nop,
    Block(BlockType),
    Loop(BlockType),
    If(BlockType),
    Else,
    End,
    Br(u32),
    BrIf(u32),
    BrTable { targets: Vec<u32>, default: u32 },
    Return,
    Call(u32),
    CallIndirect { type_index: u32 },

    Drop,
    Select,

    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),

    Load { opcode: Opcode, arg: MemArg },
    Store { opcode: Opcode, arg: MemArg },
    MemorySize,
    MemoryGrow,

    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),

    Cmp(Opcode),
    NumOp(Opcode),
    Cvt(Opcode),
}

/// Decodes one instruction at `cursor`, returning it along with the byte
/// offset its opcode started at (for diagnostics anchoring).
pub fn decode_one(cursor: &mut Cursor<'_>) -> Result<(usize, Instr), ParseError> {
    let start = cursor.pos();
    let byte = cursor.read_u8()?;
    let opcode =
        Opcode::try_from_primitive(byte).map_err(|_| ParseError::IllegalOpcode { byte, offset: start })?;
    let instr = match opcode {
        Opcode::Unreachable => Instr::Unreachable,
        Opcode::Nop => Instr::Nop,
        Opcode::Block => Instr::Block(decode_block_type(cursor)?),
        Opcode::Loop => Instr::Loop(decode_block_type(cursor)?),
        Opcode::If => Instr::If(decode_block_type(cursor)?),
        Opcode::Else => Instr::Else,
        Opcode::End => Instr::End,
        Opcode::Br => Instr::Br(cursor.read_u32_leb()?),
        Opcode::BrIf => Instr::BrIf(cursor.read_u32_leb()?),
        Opcode::BrTable => {
            let count = cursor.read_u32_leb()? as usize;
            let mut targets = Vec::with_capacity(count);
            for _ in 0..count {
                targets.push(cursor.read_u32_leb()?);
            }
            let default = cursor.read_u32_leb()?;
            Instr::BrTable { targets, default }
        }
        Opcode::Return => Instr::Return,
        Opcode::Call => Instr::Call(cursor.read_u32_leb()?),
        Opcode::CallIndirect => {
            let type_index = cursor.read_u32_leb()?;
            let _table_index = cursor.read_u8()?; // reserved 0x00 in MVP
            Instr::CallIndirect { type_index }
        }

        Opcode::Drop => Instr::Drop,
        Opcode::Select => Instr::Select,

        Opcode::LocalGet => Instr::LocalGet(cursor.read_u32_leb()?),
        Opcode::LocalSet => Instr::LocalSet(cursor.read_u32_leb()?),
        Opcode::LocalTee => Instr::LocalTee(cursor.read_u32_leb()?),
        Opcode::GlobalGet => Instr::GlobalGet(cursor.read_u32_leb()?),
        Opcode::GlobalSet => Instr::GlobalSet(cursor.read_u32_leb()?),

        Opcode::I32Load
        | Opcode::I64Load
        | Opcode::F32Load
        | Opcode::F64Load
        | Opcode::I32Load8S
        | Opcode::I32Load8U
        | Opcode::I32Load16S
        | Opcode::I32Load16U
        | Opcode::I64Load8S
        | Opcode::I64Load8U
        | Opcode::I64Load16S
        | Opcode::I64Load16U
        | Opcode::I64Load32S
        | Opcode::I64Load32U => Instr::Load {
            opcode,
            arg: decode_memarg(cursor)?,
        },
        Opcode::I32Store
        | Opcode::I64Store
        | Opcode::F32Store
        | Opcode::F64Store
        | Opcode::I32Store8
        | Opcode::I32Store16
        | Opcode::I64Store8
        | Opcode::I64Store16
        | Opcode::I64Store32 => Instr::Store {
            opcode,
            arg: decode_memarg(cursor)?,
        },
        Opcode::MemorySize => {
            let _reserved = cursor.read_u8()?;
            Instr::MemorySize
        }
        Opcode::MemoryGrow => {
            let _reserved = cursor.read_u8()?;
            Instr::MemoryGrow
        }

        Opcode::I32Const => Instr::I32Const(cursor.read_i32_leb()?),
        Opcode::I64Const => Instr::I64Const(cursor.read_i64_leb()?),
        Opcode::F32Const => Instr::F32Const(f32::from_le_bytes(cursor.read_array::<4>()?)),
        Opcode::F64Const => Instr::F64Const(f64::from_le_bytes(cursor.read_array::<8>()?)),

        Opcode::I32Eqz
        | Opcode::I32Eq
        | Opcode::I32Ne
        | Opcode::I32LtS
        | Opcode::I32LtU
        | Opcode::I32GtS
        | Opcode::I32GtU
        | Opcode::I32LeS
        | Opcode::I32LeU
        | Opcode::I32GeS
        | Opcode::I32GeU
        | Opcode::I64Eqz
        | Opcode::I64Eq
        | Opcode::I64Ne
        | Opcode::I64LtS
        | Opcode::I64LtU
        | Opcode::I64GtS
        | Opcode::I64GtU
        | Opcode::I64LeS
        | Opcode::I64LeU
        | Opcode::I64GeS
        | Opcode::I64GeU
        | Opcode::F32Eq
        | Opcode::F32Ne
        | Opcode::F32Lt
        | Opcode::F32Gt
        | Opcode::F32Le
        | Opcode::F32Ge
        | Opcode::F64Eq
        | Opcode::F64Ne
        | Opcode::F64Lt
        | Opcode::F64Gt
        | Opcode::F64Le
        | Opcode::F64Ge => Instr::Cmp(opcode),

        Opcode::I32Clz
        | Opcode::I32Ctz
        | Opcode::I32Popcnt
        | Opcode::I32Add
        | Opcode::I32Sub
        | Opcode::I32Mul
        | Opcode::I32DivS
        | Opcode::I32DivU
        | Opcode::I32RemS
        | Opcode::I32RemU
        | Opcode::I32And
        | Opcode::I32Or
        | Opcode::I32Xor
        | Opcode::I32Shl
        | Opcode::I32ShrS
        | Opcode::I32ShrU
        | Opcode::I32Rotl
        | Opcode::I32Rotr
        | Opcode::I64Clz
        | Opcode::I64Ctz
        | Opcode::I64Popcnt
        | Opcode::I64Add
        | Opcode::I64Sub
        | Opcode::I64Mul
        | Opcode::I64DivS
        | Opcode::I64DivU
        | Opcode::I64RemS
        | Opcode::I64RemU
        | Opcode::I64And
        | Opcode::I64Or
        | Opcode::I64Xor
        | Opcode::I64Shl
        | Opcode::I64ShrS
        | Opcode::I64ShrU
        | Opcode::I64Rotl
        | Opcode::I64Rotr
        | Opcode::F32Abs
        | Opcode::F32Neg
        | Opcode::F32Ceil
        | Opcode::F32Floor
        | Opcode::F32Trunc
        | Opcode::F32Nearest
        | Opcode::F32Sqrt
        | Opcode::F32Add
        | Opcode::F32Sub
        | Opcode::F32Mul
        | Opcode::F32Div
        | Opcode::F32Min
        | Opcode::F32Max
        | Opcode::F32Copysign
        | Opcode::F64Abs
        | Opcode::F64Neg
        | Opcode::F64Ceil
        | Opcode::F64Floor
        | Opcode::F64Trunc
        | Opcode::F64Nearest
        | Opcode::F64Sqrt
        | Opcode::F64Add
        | Opcode::F64Sub
        | Opcode::F64Mul
        | Opcode::F64Div
        | Opcode::F64Min
        | Opcode::F64Max
        | Opcode::F64Copysign => Instr::NumOp(opcode),

        Opcode::I32WrapI64
        | Opcode::I32TruncF32S
        | Opcode::I32TruncF32U
        | Opcode::I32TruncF64S
        | Opcode::I32TruncF64U
        | Opcode::I64ExtendI32S
        | Opcode::I64ExtendI32U
        | Opcode::I64TruncF32S
        | Opcode::I64TruncF32U
        | Opcode::I64TruncF64S
        | Opcode::I64TruncF64U
        | Opcode::F32ConvertI32S
        | Opcode::F32ConvertI32U
        | Opcode::F32ConvertI64S
        | Opcode::F32ConvertI64U
        | Opcode::F32DemoteF64
        | Opcode::F64ConvertI32S
        | Opcode::F64ConvertI32U
        | Opcode::F64ConvertI64S
        | Opcode::F64ConvertI64U
        | Opcode::F64PromoteF32
        | Opcode::I32ReinterpretF32
        | Opcode::I64ReinterpretF64
        | Opcode::F32ReinterpretI32
        | Opcode::F64ReinterpretI64 => Instr::Cvt(opcode),
    };
    Ok((start, instr))
}

fn decode_block_type(cursor: &mut Cursor<'_>) -> Result<BlockType, ParseError> {
    let start = cursor.pos();
    let byte = cursor.read_u8()?;
    if byte == 0x40 {
        return Ok(BlockType::Empty);
    }
    ValType::from_byte(byte)
        .map(BlockType::Value)
        .ok_or(ParseError::InvalidValType { byte, offset: start })
}

fn decode_memarg(cursor: &mut Cursor<'_>) -> Result<MemArg, ParseError> {
    Ok(MemArg {
        align: cursor.read_u32_leb()?,
        offset: cursor.read_u32_leb()?,
    })
}

/// The natural access width in bytes for a memory instruction's opcode,
/// used by the validator's `align <= log2(access_width)` check.
pub fn access_width(opcode: Opcode) -> u32 {
    use Opcode::*;
    match opcode {
        I32Load | I32Store | F32Load | F32Store => 4,
        I64Load | I64Store | F64Load | F64Store => 8,
        I32Load8S | I32Load8U | I32Store8 | I64Load8S | I64Load8U | I64Store8 => 1,
        I32Load16S | I32Load16U | I32Store16 | I64Load16S | I64Load16U | I64Store16 => 2,
        I64Load32S | I64Load32U | I64Store32 => 4,
        _ => unreachable!("access_width called on non-memory opcode"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_i32_add() {
        let bytes = [0x6A];
        let mut c = Cursor::new(&bytes);
        let (_off, instr) = decode_one(&mut c).unwrap();
        assert_eq!(instr, Instr::NumOp(Opcode::I32Add));
    }

    #[test]
    fn decodes_local_get() {
        let bytes = [0x20, 0x01];
        let mut c = Cursor::new(&bytes);
        let (_off, instr) = decode_one(&mut c).unwrap();
        assert_eq!(instr, Instr::LocalGet(1));
    }

    #[test]
    fn decodes_block_with_empty_type() {
        let bytes = [0x02, 0x40];
        let mut c = Cursor::new(&bytes);
        let (_off, instr) = decode_one(&mut c).unwrap();
        assert_eq!(instr, Instr::Block(BlockType::Empty));
    }

    #[test]
    fn rejects_unknown_opcode() {
        let bytes = [0xFF];
        let mut c = Cursor::new(&bytes);
        assert!(matches!(
            decode_one(&mut c),
            Err(ParseError::IllegalOpcode { byte: 0xFF, offset: 0 })
        ));
    }
}
