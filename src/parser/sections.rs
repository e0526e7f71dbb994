//! Typed section parsers: one function per section kind, each enforcing
//! its own section-local invariants at the point they first become
//! observable (index bounds, limits well-formedness, constant-expression
//! shape, etc).
//!
//! Grounded in the teacher's `parse::parser::Parser` (`parse_type_section`,
//! `parse_function_section`, `parse_export_section`, ...), regenerated
//! against a slice+cursor instead of `io::Read` so every check can anchor
//! an exact byte offset, and extended with the sections the teacher never
//! implemented (table, global, start, element) plus the index-bound and
//! limits checks the teacher's version skips.

use std::collections::HashSet;

use crate::decode::Cursor;
use crate::diagnostics::ParseError;
use crate::limits::{LimitCategory, ParserLimits};
use crate::module::ElementSegment;
use crate::parser::instructions::{decode_one, Instr};
use crate::parser::types::ExportKind as RawExportKind;
use crate::types::{
    CodeEntry, DataMode, DataSegment, Export, ExportKind, FuncType, GlobalType, Import, ImportDesc,
    Limits, MemoryType, TableType, ValType,
};

pub fn parse_type_section(cursor: &mut Cursor<'_>, _limits: &ParserLimits) -> Result<Vec<FuncType>, ParseError> {
    let count = cursor.read_u32_leb()?;
    let mut types = Vec::with_capacity(count as usize);
    for _ in 0..count {
        types.push(parse_func_type(cursor)?);
    }
    // No `--wasm-set-parser-limit` category covers the type section itself
    // (§6 enumerates only import/local-defined resource categories), so
    // there is nothing to check here beyond what the per-entry parse does.
    Ok(types)
}

fn parse_func_type(cursor: &mut Cursor<'_>) -> Result<FuncType, ParseError> {
    let start = cursor.pos();
    let tag = cursor.read_u8()?;
    if tag != 0x60 {
        return Err(ParseError::InvalidFunctionTypePrefix { byte: tag, offset: start });
    }
    let params = parse_val_type_vec(cursor)?;
    let results = parse_val_type_vec(cursor)?;
    if results.len() > 1 {
        return Err(ParseError::TooManyResults {
            count: results.len(),
            offset: start,
        });
    }
    Ok(FuncType { params, results })
}

fn parse_val_type_vec(cursor: &mut Cursor<'_>) -> Result<Vec<ValType>, ParseError> {
    let count = cursor.read_u32_leb()? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(parse_val_type(cursor)?);
    }
    Ok(out)
}

fn parse_val_type(cursor: &mut Cursor<'_>) -> Result<ValType, ParseError> {
    let start = cursor.pos();
    let byte = cursor.read_u8()?;
    ValType::from_byte(byte).ok_or(ParseError::InvalidValType { byte, offset: start })
}

fn parse_limits(cursor: &mut Cursor<'_>) -> Result<Limits, ParseError> {
    let start = cursor.pos();
    let flag = cursor.read_u8()?;
    let (min, max) = match flag {
        0x00 => (cursor.read_u32_leb()?, None),
        0x01 => {
            let min = cursor.read_u32_leb()?;
            let max = cursor.read_u32_leb()?;
            (min, Some(max))
        }
        other => return Err(ParseError::InvalidLimitsFlag { byte: other, offset: start }),
    };
    Limits::new(min, max).ok_or(ParseError::MalformedLimits {
        min,
        max: max.unwrap_or(u32::MAX),
        offset: start,
    })
}

pub fn parse_import_section(
    cursor: &mut Cursor<'_>,
    types_len: usize,
    limits: &ParserLimits,
) -> Result<Vec<Import>, ParseError> {
    let count = cursor.read_u32_leb()?;
    let mut imports = Vec::with_capacity(count as usize);
    let mut func_count = 0u32;
    let mut table_count = 0u32;
    let mut mem_count = 0u32;
    let mut global_count = 0u32;
    for _ in 0..count {
        let module = cursor.read_name()?.to_owned();
        let field = cursor.read_name()?.to_owned();
        let kind_offset = cursor.pos();
        let kind_byte = cursor.read_u8()?;
        let kind = RawExportKind::try_from(kind_byte)
            .map_err(|_| ParseError::InvalidExportKind { byte: kind_byte, offset: kind_offset })?;
        let desc = match kind {
            ExportKind::Function => {
                let idx_offset = cursor.pos();
                let type_index = cursor.read_u32_leb()?;
                if type_index as usize >= types_len {
                    return Err(ParseError::InvalidTypeIndex {
                        index: type_index,
                        count: types_len,
                        offset: idx_offset,
                    });
                }
                func_count += 1;
                ImportDesc::Function(type_index)
            }
            ExportKind::Table => {
                table_count += 1;
                ImportDesc::Table(TableType {
                    limits: parse_limits_with_elemkind(cursor)?,
                })
            }
            ExportKind::Memory => {
                mem_count += 1;
                ImportDesc::Memory(MemoryType { limits: parse_limits(cursor)? })
            }
            ExportKind::Global => {
                global_count += 1;
                let value_type = parse_val_type(cursor)?;
                let mutable = cursor.read_u8()? != 0;
                ImportDesc::Global(GlobalType { value_type, mutable })
            }
        };
        imports.push(Import { module, field, desc });
    }
    limits.check(LimitCategory::ImportedFunctions, func_count)?;
    limits.check(LimitCategory::ImportedTables, table_count)?;
    limits.check(LimitCategory::ImportedMemories, mem_count)?;
    limits.check(LimitCategory::ImportedGlobals, global_count)?;
    Ok(imports)
}

fn parse_limits_with_elemkind(cursor: &mut Cursor<'_>) -> Result<Limits, ParseError> {
    // MVP's only element kind is funcref (0x70); it precedes the limits.
    let start = cursor.pos();
    let elemkind = cursor.read_u8()?;
    if elemkind != 0x70 {
        return Err(ParseError::InvalidValType { byte: elemkind, offset: start });
    }
    parse_limits(cursor)
}

pub fn parse_function_section(cursor: &mut Cursor<'_>, types_len: usize, limits: &ParserLimits) -> Result<Vec<u32>, ParseError> {
    let count = cursor.read_u32_leb()?;
    let mut functions = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let offset = cursor.pos();
        let type_index = cursor.read_u32_leb()?;
        if type_index as usize >= types_len {
            return Err(ParseError::InvalidTypeIndex {
                index: type_index,
                count: types_len,
                offset,
            });
        }
        functions.push(type_index);
    }
    limits.check(LimitCategory::LocalDefinedFunctions, count)?;
    Ok(functions)
}

pub fn parse_table_section(cursor: &mut Cursor<'_>, limits: &ParserLimits) -> Result<Vec<TableType>, ParseError> {
    let count = cursor.read_u32_leb()?;
    let mut tables = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let start = cursor.pos();
        let elemkind = cursor.read_u8()?;
        if elemkind != 0x70 {
            return Err(ParseError::InvalidValType { byte: elemkind, offset: start });
        }
        tables.push(TableType { limits: parse_limits(cursor)? });
    }
    limits.check(LimitCategory::LocalDefinedTables, count)?;
    Ok(tables)
}

pub fn parse_memory_section(cursor: &mut Cursor<'_>, limits: &ParserLimits) -> Result<Vec<MemoryType>, ParseError> {
    let count = cursor.read_u32_leb()?;
    let mut memories = Vec::with_capacity(count as usize);
    for _ in 0..count {
        memories.push(MemoryType { limits: parse_limits(cursor)? });
    }
    limits.check(LimitCategory::LocalDefinedMemories, count)?;
    Ok(memories)
}

/// Parses a constant expression used as a global initializer / element or
/// data offset: one constant-producing instruction of `expected` type,
/// followed by `end`. `global.get` is only legal when it names an
/// *imported* global (the only globals guaranteed constant before this
/// module's own globals are initialized).
pub fn parse_const_expr(
    cursor: &mut Cursor<'_>,
    expected: ValType,
    imported_global_types: &[ValType],
) -> Result<(usize, usize), ParseError> {
    let begin = cursor.pos();
    let (op_offset, instr) = decode_one(cursor)?;
    let actual = match &instr {
        Instr::I32Const(_) => ValType::I32,
        Instr::I64Const(_) => ValType::I64,
        Instr::F32Const(_) => ValType::F32,
        Instr::F64Const(_) => ValType::F64,
        Instr::GlobalGet(index) => {
            let ty = imported_global_types.get(*index as usize).copied().ok_or(
                ParseError::InvalidGlobalIndex {
                    index: *index,
                    count: imported_global_types.len(),
                    offset: op_offset,
                },
            )?;
            ty
        }
        other => {
            return Err(ParseError::NonConstantExpr {
                opcode: instr_opcode_hint(other),
                offset: op_offset,
            })
        }
    };
    if actual != expected {
        return Err(ParseError::ConstExprTypeMismatch {
            expected,
            actual,
            offset: op_offset,
        });
    }
    let (end_offset, end_instr) = decode_one(cursor)?;
    if end_instr != Instr::End {
        return Err(ParseError::NonConstantExpr {
            opcode: instr_opcode_hint(&end_instr),
            offset: end_offset,
        });
    }
    Ok((begin, cursor.pos()))
}

fn instr_opcode_hint(instr: &Instr) -> crate::parser::types::Opcode {
    use crate::parser::types::Opcode;
    match instr {
        Instr::Unreachable => Opcode::Unreachable,
        Instr::Block(_) => Opcode::Block,
        Instr::Call(_) => Opcode::Call,
        _ => Opcode::Nop,
    }
}

pub fn imported_global_types(imports: &[Import]) -> Vec<ValType> {
    imports
        .iter()
        .filter_map(|i| match i.desc {
            ImportDesc::Global(gt) => Some(gt.value_type),
            _ => None,
        })
        .collect()
}

pub fn parse_global_section(
    cursor: &mut Cursor<'_>,
    imports: &[Import],
    limits: &ParserLimits,
) -> Result<Vec<(GlobalType, usize, usize)>, ParseError> {
    let imported_globals = imported_global_types(imports);
    let count = cursor.read_u32_leb()?;
    let mut globals = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let value_type = parse_val_type(cursor)?;
        let mutable = cursor.read_u8()? != 0;
        let (begin, end) = parse_const_expr(cursor, value_type, &imported_globals)?;
        globals.push((GlobalType { value_type, mutable }, begin, end));
    }
    limits.check(LimitCategory::LocalDefinedGlobals, count)?;
    Ok(globals)
}

pub fn parse_export_section(
    cursor: &mut Cursor<'_>,
    total_functions: usize,
    total_tables: usize,
    total_memories: usize,
    total_globals: usize,
) -> Result<Vec<Export>, ParseError> {
    let count = cursor.read_u32_leb()?;
    let mut exports = Vec::with_capacity(count as usize);
    let mut seen = HashSet::new();
    for _ in 0..count {
        let name_offset = cursor.pos();
        let name = cursor.read_name()?.to_owned();
        if !seen.insert(name.clone()) {
            return Err(ParseError::DuplicateExportName { name, offset: name_offset });
        }
        let kind_offset = cursor.pos();
        let kind_byte = cursor.read_u8()?;
        let kind = RawExportKind::try_from(kind_byte)
            .map_err(|_| ParseError::InvalidExportKind { byte: kind_byte, offset: kind_offset })?;
        let idx_offset = cursor.pos();
        let index = cursor.read_u32_leb()?;
        let bound = match kind {
            ExportKind::Function => total_functions,
            ExportKind::Table => total_tables,
            ExportKind::Memory => total_memories,
            ExportKind::Global => total_globals,
        };
        if index as usize >= bound {
            return Err(match kind {
                ExportKind::Function => ParseError::InvalidFunctionIndex { index, count: bound, offset: idx_offset },
                ExportKind::Table => ParseError::InvalidTableIndex { index, count: bound, offset: idx_offset },
                ExportKind::Memory => ParseError::InvalidMemoryIndex { index, count: bound, offset: idx_offset },
                ExportKind::Global => ParseError::InvalidGlobalIndex { index, count: bound, offset: idx_offset },
            });
        }
        exports.push(Export { name, kind, index });
    }
    Ok(exports)
}

pub fn parse_start_section(cursor: &mut Cursor<'_>, total_functions: usize) -> Result<u32, ParseError> {
    let offset = cursor.pos();
    let index = cursor.read_u32_leb()?;
    if index as usize >= total_functions {
        return Err(ParseError::InvalidFunctionIndex {
            index,
            count: total_functions,
            offset,
        });
    }
    Ok(index)
}

pub fn parse_element_section(
    cursor: &mut Cursor<'_>,
    imports: &[Import],
    total_tables: usize,
    total_functions: usize,
    limits: &ParserLimits,
) -> Result<Vec<ElementSegment>, ParseError> {
    let imported_globals = imported_global_types(imports);
    let count = cursor.read_u32_leb()?;
    let mut elements = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let table_offset = cursor.pos();
        let table_index = cursor.read_u32_leb()?;
        if table_index as usize >= total_tables {
            return Err(ParseError::InvalidTableIndex {
                index: table_index,
                count: total_tables,
                offset: table_offset,
            });
        }
        let (offset_expr_begin, offset_expr_end) = parse_const_expr(cursor, ValType::I32, &imported_globals)?;
        let func_count = cursor.read_u32_leb()?;
        let mut function_indices = Vec::with_capacity(func_count as usize);
        for _ in 0..func_count {
            let idx_offset = cursor.pos();
            let func_index = cursor.read_u32_leb()?;
            if func_index as usize >= total_functions {
                return Err(ParseError::InvalidFunctionIndex {
                    index: func_index,
                    count: total_functions,
                    offset: idx_offset,
                });
            }
            function_indices.push(func_index);
        }
        elements.push(ElementSegment {
            table_index,
            offset_expr_begin,
            offset_expr_end,
            function_indices,
        });
    }
    limits.check(LimitCategory::LocalDefinedElements, count)?;
    Ok(elements)
}

pub fn parse_code_section(
    cursor: &mut Cursor<'_>,
    limits: &ParserLimits,
) -> Result<Vec<CodeEntry>, ParseError> {
    let count = cursor.read_u32_leb()?;
    let mut codes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let body_size = cursor.read_u32_leb()? as usize;
        let body_start = cursor.pos();
        let locals_count = cursor.read_u32_leb()?;
        let mut locals = Vec::with_capacity(locals_count as usize);
        for _ in 0..locals_count {
            let group_count = cursor.read_u32_leb()?;
            let value_type = parse_val_type(cursor)?;
            locals.push((group_count, value_type));
        }
        let expr_begin = cursor.pos();
        let code_end = body_start + body_size;
        if code_end < expr_begin || code_end > cursor.bytes().len() {
            return Err(ParseError::UnexpectedEof { offset: expr_begin });
        }
        // Skip to the declared end; the validator/generator re-walk this
        // range instruction-by-instruction on their own passes.
        *cursor = Cursor::at(cursor.bytes(), code_end);
        codes.push(CodeEntry {
            locals,
            expr_begin,
            code_end,
        });
    }
    limits.check(LimitCategory::LocalDefinedCodes, count)?;
    Ok(codes)
}

pub fn parse_data_section(
    cursor: &mut Cursor<'_>,
    imports: &[Import],
    total_memories: usize,
    limits: &ParserLimits,
) -> Result<Vec<DataSegment>, ParseError> {
    let imported_globals = imported_global_types(imports);
    let count = cursor.read_u32_leb()?;
    let mut segments = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mode_offset = cursor.pos();
        let mode_byte = cursor.read_u8()?;
        let mode = DataMode::try_from(mode_byte)
            .map_err(|_| ParseError::InvalidLimitsFlag { byte: mode_byte, offset: mode_offset })?;
        let (memory_index, offset_expr_begin, offset_expr_end, passive) = match mode {
            DataMode::ActiveMemory0 => {
                if total_memories == 0 {
                    return Err(ParseError::InvalidMemoryIndex { index: 0, count: 0, offset: mode_offset });
                }
                let (b, e) = parse_const_expr(cursor, ValType::I32, &imported_globals)?;
                (0, b, e, false)
            }
            DataMode::Active => {
                let idx_offset = cursor.pos();
                let memory_index = cursor.read_u32_leb()?;
                if memory_index as usize >= total_memories {
                    return Err(ParseError::InvalidMemoryIndex {
                        index: memory_index,
                        count: total_memories,
                        offset: idx_offset,
                    });
                }
                let (b, e) = parse_const_expr(cursor, ValType::I32, &imported_globals)?;
                (memory_index, b, e, false)
            }
            DataMode::Passive => (0, cursor.pos(), cursor.pos(), true),
        };
        let len = cursor.read_u32_leb()? as usize;
        let bytes = cursor.read_slice(len)?.to_vec();
        segments.push(DataSegment {
            memory_index,
            offset_expr_begin,
            offset_expr_end,
            bytes,
            passive,
        });
    }
    limits.check(LimitCategory::LocalDefinedDatas, count)?;
    Ok(segments)
}
