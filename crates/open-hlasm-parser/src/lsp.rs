//! Cross-reference tables consumed by editor tooling.
//!
//! The engine records symbol definitions and occurrences as it processes
//! statements. Ordinary-symbol records are *deferred*: labels may be
//! referenced before the statement that defines them, so occurrences are
//! collected during the run and resolved against the ordinary symbol table
//! once the drive loop finishes (skipped on cancellation).

use open_hlasm_lang_core::Location;

use crate::context::ids::Id;
use crate::context::ordinary::{OrdinarySymbolTable, SymbolValue};

/// A name observed at a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolOccurrence {
    pub name: Id,
    pub location: Location,
}

/// A resolved ordinary-symbol definition with display strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdinaryDefinition {
    pub name: Id,
    pub location: Location,
    /// Display lines: value, value kind, then defined attributes.
    pub value_desc: Vec<String>,
}

/// Cross-reference state collected during one analysis run.
#[derive(Debug, Default)]
pub struct LspContext {
    /// Ordinary-symbol definitions awaiting resolution.
    pub deferred_ord_defs: Vec<SymbolOccurrence>,
    /// Ordinary-symbol occurrences awaiting resolution.
    pub deferred_ord_occs: Vec<SymbolOccurrence>,

    /// Resolved ordinary-symbol definitions.
    pub ordinary_definitions: Vec<OrdinaryDefinition>,
    /// Resolved ordinary-symbol occurrences.
    pub ordinary_occurrences: Vec<SymbolOccurrence>,
    /// Macro definitions.
    pub macro_definitions: Vec<SymbolOccurrence>,
    /// Sequence-symbol definitions.
    pub seq_symbol_definitions: Vec<SymbolOccurrence>,
    /// Sequence-symbol references (branch targets).
    pub seq_symbol_references: Vec<SymbolOccurrence>,
}

impl LspContext {
    /// Record a deferred ordinary-symbol definition.
    pub fn defer_definition(&mut self, name: Id, location: Location) {
        self.deferred_ord_defs.push(SymbolOccurrence { name, location });
    }

    /// Record a deferred ordinary-symbol occurrence.
    pub fn defer_occurrence(&mut self, name: Id, location: Location) {
        self.deferred_ord_occs.push(SymbolOccurrence { name, location });
    }

    /// Record a macro definition.
    pub fn add_macro_definition(&mut self, name: Id, location: Location) {
        self.macro_definitions.push(SymbolOccurrence { name, location });
    }

    /// Record a sequence-symbol definition.
    pub fn add_seq_definition(&mut self, name: Id, location: Location) {
        self.seq_symbol_definitions.push(SymbolOccurrence { name, location });
    }

    /// Record a sequence-symbol reference.
    pub fn add_seq_reference(&mut self, name: Id, location: Location) {
        self.seq_symbol_references.push(SymbolOccurrence { name, location });
    }

    /// Resolve deferred records against the finished ordinary symbol table.
    ///
    /// Definitions whose symbol never made it into the table are dropped;
    /// occurrences resolve whenever the symbol exists.
    pub fn flush(&mut self, ord: &OrdinarySymbolTable) {
        for deferred in std::mem::take(&mut self.deferred_ord_defs) {
            let Some(symbol) = ord.lookup(deferred.name) else {
                continue;
            };
            let mut value_desc = Vec::new();
            match symbol.value {
                SymbolValue::Absolute(v) => {
                    value_desc.push(v.to_string());
                    value_desc.push("Absolute Symbol".to_string());
                }
                SymbolValue::Relocatable { offset, .. } => {
                    value_desc.push(offset.to_string());
                    value_desc.push("Relocatable Symbol".to_string());
                }
            }
            value_desc.push(format!("L: {}", symbol.attributes.length));
            value_desc.push(format!("T: {}", symbol.attributes.type_attr));
            self.ordinary_definitions.push(OrdinaryDefinition {
                name: deferred.name,
                location: deferred.location,
                value_desc,
            });
        }

        for deferred in std::mem::take(&mut self.deferred_ord_occs) {
            if ord.is_defined(deferred.name) {
                self.ordinary_occurrences.push(deferred);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ordinary::{OrdinarySymbol, SymbolAttributes};
    use open_hlasm_lang_core::{FileId, Range};

    #[test]
    fn test_flush_resolves_defined_symbols() {
        let mut lsp = LspContext::default();
        let mut ord = OrdinarySymbolTable::new();
        let name = Id::EMPTY;
        ord.define(OrdinarySymbol {
            name,
            value: SymbolValue::Absolute(8),
            attributes: SymbolAttributes::default(),
            location: Location::default(),
            from_lookahead: false,
        });
        lsp.defer_definition(name, Location::new(FileId::MAIN, Range::default()));
        lsp.defer_occurrence(name, Location::new(FileId::MAIN, Range::default()));

        lsp.flush(&ord);

        assert_eq!(lsp.ordinary_definitions.len(), 1);
        assert_eq!(lsp.ordinary_occurrences.len(), 1);
        let desc = &lsp.ordinary_definitions[0].value_desc;
        assert!(desc.contains(&"Absolute Symbol".to_string()));
    }

    #[test]
    fn test_flush_drops_unknown_symbols() {
        let mut lsp = LspContext::default();
        let ord = OrdinarySymbolTable::new();
        lsp.defer_definition(Id::EMPTY, Location::default());
        lsp.defer_occurrence(Id::EMPTY, Location::default());

        lsp.flush(&ord);

        assert!(lsp.ordinary_definitions.is_empty());
        assert!(lsp.ordinary_occurrences.is_empty());
    }
}
