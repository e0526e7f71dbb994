//! Parser resource limits: the categories named by the `--wasm-set-parser-limit`
//! CLI surface, as a plain config struct consulted by the section parsers.
//!
//! New relative to the teacher (which has no resource-limiting at all);
//! grounded directly in the distilled spec's §6 CLI surface category list.

/// One entry per resource category the CLI surface can bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitCategory {
    RuntimeModules,
    ImportedFunctions,
    ImportedTables,
    ImportedMemories,
    ImportedGlobals,
    LocalDefinedFunctions,
    LocalDefinedCodes,
    LocalDefinedTables,
    LocalDefinedMemories,
    LocalDefinedGlobals,
    LocalDefinedElements,
    LocalDefinedDatas,
}

/// A ceiling per category; `None` means unbounded. Default is unbounded
/// everywhere, matching a library caller that has not opted into limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParserLimits {
    pub runtime_modules: Option<u32>,
    pub imported_functions: Option<u32>,
    pub imported_tables: Option<u32>,
    pub imported_memories: Option<u32>,
    pub imported_globals: Option<u32>,
    pub local_defined_functions: Option<u32>,
    pub local_defined_codes: Option<u32>,
    pub local_defined_tables: Option<u32>,
    pub local_defined_memories: Option<u32>,
    pub local_defined_globals: Option<u32>,
    pub local_defined_elements: Option<u32>,
    pub local_defined_datas: Option<u32>,
}

impl ParserLimits {
    fn field(self, category: LimitCategory) -> Option<u32> {
        use LimitCategory::*;
        match category {
            RuntimeModules => self.runtime_modules,
            ImportedFunctions => self.imported_functions,
            ImportedTables => self.imported_tables,
            ImportedMemories => self.imported_memories,
            ImportedGlobals => self.imported_globals,
            LocalDefinedFunctions => self.local_defined_functions,
            LocalDefinedCodes => self.local_defined_codes,
            LocalDefinedTables => self.local_defined_tables,
            LocalDefinedMemories => self.local_defined_memories,
            LocalDefinedGlobals => self.local_defined_globals,
            LocalDefinedElements => self.local_defined_elements,
            LocalDefinedDatas => self.local_defined_datas,
        }
    }

    pub fn set(&mut self, category: LimitCategory, limit: u32) {
        use LimitCategory::*;
        let slot = match category {
            RuntimeModules => &mut self.runtime_modules,
            ImportedFunctions => &mut self.imported_functions,
            ImportedTables => &mut self.imported_tables,
            ImportedMemories => &mut self.imported_memories,
            ImportedGlobals => &mut self.imported_globals,
            LocalDefinedFunctions => &mut self.local_defined_functions,
            LocalDefinedCodes => &mut self.local_defined_codes,
            LocalDefinedTables => &mut self.local_defined_tables,
            LocalDefinedMemories => &mut self.local_defined_memories,
            LocalDefinedGlobals => &mut self.local_defined_globals,
            LocalDefinedElements => &mut self.local_defined_elements,
            LocalDefinedDatas => &mut self.local_defined_datas,
        };
        *slot = Some(limit);
    }

    /// Checks `count` against the configured ceiling for `category`,
    /// producing a `ResourceLimitExceeded` error on breach. Indistinguishable
    /// from a malformed module at the call site, per the propagation policy.
    pub fn check(&self, category: LimitCategory, count: u32) -> Result<(), crate::ParseError> {
        if let Some(limit) = self.field(category) {
            if count > limit {
                return Err(crate::ParseError::ResourceLimitExceeded { category, limit });
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for LimitCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use LimitCategory::*;
        Ok(match s {
            "runtime_modules" => RuntimeModules,
            "imported_functions" => ImportedFunctions,
            "imported_tables" => ImportedTables,
            "imported_memories" => ImportedMemories,
            "imported_globals" => ImportedGlobals,
            "local_defined_functions" => LocalDefinedFunctions,
            "local_defined_codes" => LocalDefinedCodes,
            "local_defined_tables" => LocalDefinedTables,
            "local_defined_memories" => LocalDefinedMemories,
            "local_defined_globals" => LocalDefinedGlobals,
            "local_defined_elements" => LocalDefinedElements,
            "local_defined_datas" => LocalDefinedDatas,
            other => return Err(format!("unknown parser limit category {other:?}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_by_default() {
        let limits = ParserLimits::default();
        assert!(limits.check(LimitCategory::ImportedFunctions, u32::MAX).is_ok());
    }

    #[test]
    fn breach_is_reported() {
        let mut limits = ParserLimits::default();
        limits.set(LimitCategory::LocalDefinedFunctions, 2);
        assert!(limits.check(LimitCategory::LocalDefinedFunctions, 2).is_ok());
        assert!(limits.check(LimitCategory::LocalDefinedFunctions, 3).is_err());
    }
}
