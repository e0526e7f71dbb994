//! Module-level parsing: header check, section-by-section dispatch in
//! canonical order, and assembly of the final `ModuleStorage`.
//!
//! Grounded in the teacher's `parse::parser::Parser::parse`, restructured
//! around a `Cursor` over the whole input (rather than an `io::Read`) so
//! every error can anchor an exact offset, and extended with the ordering,
//! duplication and length-mismatch checks from §4.1 that the teacher's
//! version does not enforce.

pub mod instructions;
pub mod sections;
pub mod types;

use num_enum::TryFromPrimitive;

use crate::decode::Cursor;
use crate::diagnostics::ParseError;
use crate::limits::ParserLimits;
use crate::module::ModuleStorage;
use crate::parser::types::{SectionId, CANONICAL_ORDER};

const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];
const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Parses `bytes` into a `ModuleStorage`, enforcing the binary header, the
/// canonical section ordering/uniqueness rule, and every section-local
/// invariant. Does not run the validator -- see [`crate::load_module`].
pub fn parse_module(bytes: &[u8], limits: &ParserLimits) -> Result<ModuleStorage<'_>, ParseError> {
    let mut cursor = Cursor::new(bytes);

    let magic = cursor.read_array::<4>()?;
    if magic != MAGIC {
        return Err(ParseError::NotAWasmModule);
    }
    let version = cursor.read_array::<4>()?;
    if version != VERSION {
        return Err(ParseError::IllegalVersion { version });
    }

    let mut storage = ModuleStorage {
        bytes,
        module_begin: 0,
        module_end: bytes.len(),
        types: Vec::new(),
        imports: Vec::new(),
        functions: Vec::new(),
        tables: Vec::new(),
        memories: Vec::new(),
        globals: Vec::new(),
        exports: Vec::new(),
        start: None,
        elements: Vec::new(),
        codes: Vec::new(),
        data: Vec::new(),
    };

    // Index into CANONICAL_ORDER of the highest known section seen so far,
    // used to reject out-of-order known sections. Custom sections are
    // exempt from ordering and may repeat anywhere.
    let mut last_known_order: Option<usize> = None;
    let mut seen: [bool; 11] = [false; 11];

    while !cursor.is_empty() {
        let section_offset = cursor.pos();
        let id_byte = cursor.read_u8()?;
        let section_id = SectionId::try_from_primitive(id_byte)
            .map_err(|_| ParseError::UnknownSectionId { id: id_byte, offset: section_offset })?;
        let declared_len = cursor.read_u32_leb()? as usize;
        let body_start = cursor.pos();
        let body_end = body_start
            .checked_add(declared_len)
            .filter(|&e| e <= bytes.len())
            .ok_or(ParseError::UnexpectedEof { offset: body_start })?;

        if section_id != SectionId::Custom {
            let order_index = CANONICAL_ORDER
                .iter()
                .position(|s| *s == section_id)
                .expect("every non-custom SectionId appears in CANONICAL_ORDER");
            if seen[section_id as usize] {
                return Err(ParseError::DuplicateSection { section: section_id, offset: section_offset });
            }
            if let Some(last) = last_known_order {
                if order_index <= last {
                    return Err(ParseError::SectionOutOfOrder { section: section_id, offset: section_offset });
                }
            }
            last_known_order = Some(order_index);
            seen[section_id as usize] = true;
        }

        let mut body_cursor = Cursor::at(bytes, body_start);
        match section_id {
            SectionId::Custom => {
                // Custom sections are opaque payload; skip without
                // interpretation.
            }
            SectionId::Type => {
                storage.types = sections::parse_type_section(&mut body_cursor, limits)?;
            }
            SectionId::Import => {
                storage.imports = sections::parse_import_section(&mut body_cursor, storage.types.len(), limits)?;
            }
            SectionId::Function => {
                storage.functions = sections::parse_function_section(&mut body_cursor, storage.types.len(), limits)?;
            }
            SectionId::Table => {
                storage.tables = sections::parse_table_section(&mut body_cursor, limits)?;
            }
            SectionId::Memory => {
                storage.memories = sections::parse_memory_section(&mut body_cursor, limits)?;
            }
            SectionId::Global => {
                storage.globals = sections::parse_global_section(&mut body_cursor, &storage.imports, limits)?;
            }
            SectionId::Export => {
                storage.exports = sections::parse_export_section(
                    &mut body_cursor,
                    storage.total_function_count(),
                    storage.total_table_count(),
                    storage.total_memory_count(),
                    storage.total_global_count(),
                )?;
            }
            SectionId::Start => {
                storage.start = Some(sections::parse_start_section(&mut body_cursor, storage.total_function_count())?);
            }
            SectionId::Element => {
                storage.elements = sections::parse_element_section(
                    &mut body_cursor,
                    &storage.imports,
                    storage.total_table_count(),
                    storage.total_function_count(),
                    limits,
                )?;
            }
            SectionId::Code => {
                storage.codes = sections::parse_code_section(&mut body_cursor, limits)?;
            }
            SectionId::Data => {
                storage.data = sections::parse_data_section(
                    &mut body_cursor,
                    &storage.imports,
                    storage.total_memory_count(),
                    limits,
                )?;
            }
        }

        if section_id != SectionId::Custom && body_cursor.pos() != body_end {
            return Err(ParseError::SectionLengthMismatch {
                section: section_id,
                declared: declared_len as u32,
                consumed: body_cursor.pos() - body_start,
                offset: section_offset,
            });
        }

        cursor = Cursor::at(bytes, body_end);
    }

    if storage.functions.len() != storage.codes.len() {
        return Err(ParseError::CodeFunctionCountMismatch {
            defined_code: storage.codes.len(),
            defined_func: storage.functions.len(),
        });
    }

    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_module_bytes() -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&MAGIC);
        v.extend_from_slice(&VERSION);
        v
    }

    #[test]
    fn parses_minimal_empty_module() {
        let bytes = empty_module_bytes();
        let module = parse_module(&bytes, &ParserLimits::default()).unwrap();
        assert_eq!(module.total_function_count(), 0);
        assert_eq!(module.module_end, bytes.len());
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        assert!(matches!(
            parse_module(&bytes, &ParserLimits::default()),
            Err(ParseError::NotAWasmModule)
        ));
    }

    #[test]
    fn rejects_bad_version() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]);
        assert!(matches!(
            parse_module(&bytes, &ParserLimits::default()),
            Err(ParseError::IllegalVersion { .. })
        ));
    }

    #[test]
    fn parses_type_section() {
        let mut bytes = empty_module_bytes();
        // section 1 (Type), length 4: count=1, (params=0, results=0) func type 0x60 0x00 0x00
        bytes.extend_from_slice(&[0x01, 0x04, 0x01, 0x60, 0x00, 0x00]);
        let module = parse_module(&bytes, &ParserLimits::default()).unwrap();
        assert_eq!(module.types.len(), 1);
        assert!(module.types[0].params.is_empty());
        assert!(module.types[0].results.is_empty());
    }

    #[test]
    fn rejects_out_of_order_sections() {
        let mut bytes = empty_module_bytes();
        // Function section (3) before Type section (1).
        bytes.extend_from_slice(&[0x03, 0x01, 0x00]); // function section, count=0
        bytes.extend_from_slice(&[0x01, 0x01, 0x00]); // type section, count=0
        assert!(matches!(
            parse_module(&bytes, &ParserLimits::default()),
            Err(ParseError::SectionOutOfOrder { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_sections() {
        let mut bytes = empty_module_bytes();
        bytes.extend_from_slice(&[0x01, 0x01, 0x00]); // type section, count=0
        bytes.extend_from_slice(&[0x01, 0x01, 0x00]); // type section again
        assert!(matches!(
            parse_module(&bytes, &ParserLimits::default()),
            Err(ParseError::DuplicateSection { .. })
        ));
    }

    #[test]
    fn rejects_code_function_count_mismatch() {
        let mut bytes = empty_module_bytes();
        bytes.extend_from_slice(&[0x01, 0x04, 0x01, 0x60, 0x00, 0x00]); // one type
        bytes.extend_from_slice(&[0x03, 0x02, 0x01, 0x00]); // one function, type 0
                                                             // no code section at all
        assert!(matches!(
            parse_module(&bytes, &ParserLimits::default()),
            Err(ParseError::CodeFunctionCountMismatch { defined_code: 0, defined_func: 1 })
        ));
    }
}
