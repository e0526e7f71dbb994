//! `ModuleStorage`: the product of all section storages plus the byte span
//! they were parsed from.
//!
//! Grounded in the teacher's `parse::types::Module`, generalized to borrow
//! the input buffer (lifetime `'m`) instead of each section owning
//! separately-allocated data disconnected from its source offsets -- the
//! safe-Rust equivalent of the spec's "stable references into the byte span."

use crate::types::{CodeEntry, DataSegment, Export, FuncType, GlobalType, Import, MemoryType, TableType};

/// A fully parsed (but not yet validated) WebAssembly module.
///
/// `module_begin..module_end` is always `0..bytes.len()`; it is kept as an
/// explicit field because the parser round-trip property (§8) wants to
/// name it, and because a future multi-module embedder may want a module
/// span relative to a larger buffer.
pub struct ModuleStorage<'m> {
    pub bytes: &'m [u8],
    pub module_begin: usize,
    pub module_end: usize,

    pub types: Vec<FuncType>,
    pub imports: Vec<Import>,
    /// One type index per locally defined function (i.e. not counting
    /// imported functions).
    pub functions: Vec<u32>,
    pub tables: Vec<TableType>,
    pub memories: Vec<MemoryType>,
    pub globals: Vec<(GlobalType, usize, usize)>, // (type, init_expr_begin, init_expr_end)
    pub exports: Vec<Export>,
    pub start: Option<u32>,
    pub elements: Vec<ElementSegment>,
    pub codes: Vec<CodeEntry>,
    pub data: Vec<DataSegment>,
}

#[derive(Debug, Clone)]
pub struct ElementSegment {
    pub table_index: u32,
    pub offset_expr_begin: usize,
    pub offset_expr_end: usize,
    pub function_indices: Vec<u32>,
}

impl<'m> ModuleStorage<'m> {
    /// The number of imported functions, i.e. the index-space offset at
    /// which locally defined functions begin.
    pub fn imported_function_count(&self) -> usize {
        self.imports
            .iter()
            .filter(|i| matches!(i.desc, crate::types::ImportDesc::Function(_)))
            .count()
    }

    /// Total function count across the import and local-definition index
    /// spaces.
    pub fn total_function_count(&self) -> usize {
        self.imported_function_count() + self.functions.len()
    }

    /// Resolves a function index to its `FuncType`, across both the import
    /// and local-definition index spaces.
    pub fn function_type(&self, index: u32) -> Option<&FuncType> {
        let imported_funcs: Vec<u32> = self
            .imports
            .iter()
            .filter_map(|i| match i.desc {
                crate::types::ImportDesc::Function(type_index) => Some(type_index),
                _ => None,
            })
            .collect();
        let type_index = if (index as usize) < imported_funcs.len() {
            imported_funcs[index as usize]
        } else {
            let local_index = index as usize - imported_funcs.len();
            *self.functions.get(local_index)?
        };
        self.types.get(type_index as usize)
    }

    pub fn total_table_count(&self) -> usize {
        self.imports
            .iter()
            .filter(|i| matches!(i.desc, crate::types::ImportDesc::Table(_)))
            .count()
            + self.tables.len()
    }

    pub fn total_memory_count(&self) -> usize {
        self.imports
            .iter()
            .filter(|i| matches!(i.desc, crate::types::ImportDesc::Memory(_)))
            .count()
            + self.memories.len()
    }

    pub fn total_global_count(&self) -> usize {
        self.imports
            .iter()
            .filter(|i| matches!(i.desc, crate::types::ImportDesc::Global(_)))
            .count()
            + self.globals.len()
    }

    /// Resolves a global index to its `GlobalType`, across both index
    /// spaces.
    pub fn global_type(&self, index: u32) -> Option<GlobalType> {
        let imported: Vec<GlobalType> = self
            .imports
            .iter()
            .filter_map(|i| match i.desc {
                crate::types::ImportDesc::Global(gt) => Some(gt),
                _ => None,
            })
            .collect();
        if (index as usize) < imported.len() {
            Some(imported[index as usize])
        } else {
            let local_index = index as usize - imported.len();
            self.globals.get(local_index).map(|(gt, _, _)| *gt)
        }
    }
}
