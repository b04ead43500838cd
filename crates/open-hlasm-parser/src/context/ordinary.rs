//! Ordinary symbol table.
//!
//! Tracks assembler labels with their value (absolute or relocatable), the
//! location counter, the current section, and the data attributes consumed
//! by attribute references: L' (length), T' (type), S' (scale), I' (integer).

use std::collections::HashMap;

use open_hlasm_lang_core::Location;

use crate::context::ids::Id;

/// The value of an ordinary symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolValue {
    /// An absolute value (EQU).
    Absolute(i64),
    /// A section-relative address.
    Relocatable { section: Id, offset: i64 },
}

impl SymbolValue {
    /// Numeric view: absolute value or relocatable offset.
    pub fn numeric(&self) -> i64 {
        match self {
            SymbolValue::Absolute(v) => *v,
            SymbolValue::Relocatable { offset, .. } => *offset,
        }
    }
}

/// Data attributes of an ordinary symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolAttributes {
    /// L' — length in bytes.
    pub length: u32,
    /// T' — type attribute character.
    pub type_attr: char,
    /// S' — scale attribute.
    pub scale: i32,
    /// I' — integer attribute.
    pub integer: i32,
}

impl Default for SymbolAttributes {
    fn default() -> Self {
        Self {
            length: 1,
            type_attr: 'U',
            scale: 0,
            integer: 0,
        }
    }
}

/// An ordinary symbol table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrdinarySymbol {
    pub name: Id,
    pub value: SymbolValue,
    pub attributes: SymbolAttributes,
    pub location: Location,
    /// Whether the entry was produced by attribute lookahead rather than a
    /// real definition (lookahead entries may be overwritten).
    pub from_lookahead: bool,
}

/// The ordinary symbol table.
#[derive(Debug, Default)]
pub struct OrdinarySymbolTable {
    symbols: HashMap<Id, OrdinarySymbol>,
    /// Current location counter.
    pub location_counter: i64,
    /// Current control section.
    pub current_section: Id,
}

impl OrdinarySymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a symbol. A real definition overwrites a lookahead entry;
    /// returns `false` when the name is already properly defined.
    pub fn define(&mut self, symbol: OrdinarySymbol) -> bool {
        match self.symbols.get(&symbol.name) {
            Some(existing) if !existing.from_lookahead && !symbol.from_lookahead => false,
            Some(existing) if existing.from_lookahead && symbol.from_lookahead => true,
            _ => {
                if symbol.from_lookahead && self.symbols.contains_key(&symbol.name) {
                    return true;
                }
                self.symbols.insert(symbol.name, symbol);
                true
            }
        }
    }

    /// Look up a symbol.
    pub fn lookup(&self, name: Id) -> Option<&OrdinarySymbol> {
        self.symbols.get(&name)
    }

    /// Whether a symbol is defined (lookahead entries count).
    pub fn is_defined(&self, name: Id) -> bool {
        self.symbols.contains_key(&name)
    }

    /// The L' attribute, if defined.
    pub fn length_attr(&self, name: Id) -> Option<u32> {
        self.symbols.get(&name).map(|s| s.attributes.length)
    }

    /// The T' attribute, if defined.
    pub fn type_attr(&self, name: Id) -> Option<char> {
        self.symbols.get(&name).map(|s| s.attributes.type_attr)
    }

    /// The S' attribute, if defined.
    pub fn scale_attr(&self, name: Id) -> Option<i32> {
        self.symbols.get(&name).map(|s| s.attributes.scale)
    }

    /// The I' attribute, if defined.
    pub fn integer_attr(&self, name: Id) -> Option<i32> {
        self.symbols.get(&name).map(|s| s.attributes.integer)
    }

    /// Advance the location counter.
    pub fn advance(&mut self, bytes: i64) {
        self.location_counter += bytes;
    }

    /// Round the location counter up to a boundary.
    pub fn align(&mut self, boundary: i64) {
        if boundary > 1 {
            let rem = self.location_counter.rem_euclid(boundary);
            if rem != 0 {
                self.location_counter += boundary - rem;
            }
        }
    }

    /// Enter a new control section: reset the counter.
    pub fn set_section(&mut self, name: Id) {
        self.current_section = name;
        self.location_counter = 0;
    }

    /// Number of defined symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use open_hlasm_lang_core::{FileId, Range};

    fn entry(name: Id, from_lookahead: bool) -> OrdinarySymbol {
        OrdinarySymbol {
            name,
            value: SymbolValue::Absolute(1),
            attributes: SymbolAttributes::default(),
            location: Location::new(FileId::MAIN, Range::default()),
            from_lookahead,
        }
    }

    #[test]
    fn test_define_and_lookup() {
        let mut table = OrdinarySymbolTable::new();
        let name = Id::EMPTY;
        assert!(table.define(entry(name, false)));
        assert!(table.is_defined(name));
        assert_eq!(table.lookup(name).unwrap().value, SymbolValue::Absolute(1));
    }

    #[test]
    fn test_redefinition_rejected() {
        let mut table = OrdinarySymbolTable::new();
        assert!(table.define(entry(Id::EMPTY, false)));
        assert!(!table.define(entry(Id::EMPTY, false)));
    }

    #[test]
    fn test_real_definition_overwrites_lookahead() {
        let mut table = OrdinarySymbolTable::new();
        assert!(table.define(entry(Id::EMPTY, true)));
        assert!(table.define(entry(Id::EMPTY, false)));
        assert!(!table.lookup(Id::EMPTY).unwrap().from_lookahead);
    }

    #[test]
    fn test_lookahead_does_not_overwrite_real() {
        let mut table = OrdinarySymbolTable::new();
        let mut real = entry(Id::EMPTY, false);
        real.value = SymbolValue::Absolute(99);
        assert!(table.define(real));
        assert!(table.define(entry(Id::EMPTY, true)));
        assert_eq!(table.lookup(Id::EMPTY).unwrap().value, SymbolValue::Absolute(99));
    }

    #[test]
    fn test_align() {
        let mut table = OrdinarySymbolTable::new();
        table.location_counter = 3;
        table.align(4);
        assert_eq!(table.location_counter, 4);
        table.align(4);
        assert_eq!(table.location_counter, 4);
    }

    #[test]
    fn test_set_section_resets_counter() {
        let mut table = OrdinarySymbolTable::new();
        table.location_counter = 100;
        table.set_section(Id::EMPTY);
        assert_eq!(table.location_counter, 0);
    }
}
