//! The data-definition type registry.
//!
//! Maps `(type_char, extension_char)` to its [`DataDefType`] record. Bounds
//! follow the HLASM data-definition tables; the fixed-point bounds (length
//! 1-8, bit length 1-64, scale -187..346, exponent -85..75) and the
//! packed/zoned bounds (length 1-16, bit length 1-128) are the reference
//! values the checker enforces.

use std::collections::HashMap;

use super::data_def_type::{
    Alignment, DataDefType, ImplicitLength, ModifierSpec, NominalKind, Validator,
};

/// Known type extensions, used by the operand parser to split `FD` from
/// `F` + modifier.
const KNOWN_EXTENSIONS: &[(char, char)] = &[
    ('C', 'A'),
    ('C', 'E'),
    ('C', 'U'),
    ('F', 'D'),
    ('A', 'D'),
    ('S', 'Y'),
    ('R', 'D'),
    ('V', 'D'),
    ('Q', 'D'),
    ('Q', 'Y'),
    ('J', 'D'),
    ('E', 'H'),
    ('E', 'D'),
    ('E', 'B'),
    ('D', 'H'),
    ('D', 'B'),
    ('D', 'D'),
    ('L', 'H'),
    ('L', 'Q'),
    ('L', 'D'),
    ('L', 'B'),
];

/// Whether `(type_char, ext)` names a registered two-character type.
pub fn is_known_extension(type_char: char, ext: char) -> bool {
    KNOWN_EXTENSIONS.contains(&(type_char, ext))
}

/// Registry of all data-definition types.
#[derive(Debug)]
pub struct DataDefRegistry {
    types: HashMap<(char, char), DataDefType>,
}

impl Default for DataDefRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DataDefRegistry {
    /// Build the registry with all supported type codes.
    pub fn new() -> Self {
        let mut registry = Self {
            types: HashMap::new(),
        };
        registry.register_string_types();
        registry.register_fixed_point_types();
        registry.register_decimal_types();
        registry.register_address_types();
        registry.register_single_symbol_types();
        registry.register_float_types();
        registry
    }

    /// Look up a type by its characters.
    pub fn get(&self, type_char: char, extension: Option<char>) -> Option<&DataDefType> {
        self.types
            .get(&(type_char, extension.unwrap_or('\0')))
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn insert(&mut self, t: DataDefType) {
        self.types.insert((t.type_char, t.extension), t);
    }

    // -----------------------------------------------------------------------
    //  String types: B, C, CA, CE, CU, G, X
    // -----------------------------------------------------------------------

    fn register_string_types(&mut self) {
        self.insert(DataDefType {
            type_char: 'B',
            extension: '\0',
            type_str: "B",
            length: ModifierSpec::Bound { min: 1, max: 256 },
            bit_length: ModifierSpec::Bound { min: 1, max: 2048 },
            scale: ModifierSpec::NotAllowed,
            exponent: ModifierSpec::NotAllowed,
            exact_length: None,
            nominal_kind: NominalKind::String,
            validator: Validator::BitString,
            alignment: Alignment::Byte,
            implicit_length: ImplicitLength::AsNeeded,
            literal_range: None,
        });

        for (ext, type_str) in [('\0', "C"), ('A', "CA"), ('E', "CE")] {
            self.insert(DataDefType {
                type_char: 'C',
                extension: ext,
                type_str,
                length: ModifierSpec::Bound { min: 1, max: 256 },
                bit_length: ModifierSpec::Bound { min: 1, max: 2048 },
                scale: ModifierSpec::NotAllowed,
                exponent: ModifierSpec::NotAllowed,
                exact_length: None,
                nominal_kind: NominalKind::String,
                validator: Validator::CharString,
                alignment: Alignment::Byte,
                implicit_length: ImplicitLength::AsNeeded,
                literal_range: None,
            });
        }

        self.insert(DataDefType {
            type_char: 'C',
            extension: 'U',
            type_str: "CU",
            length: ModifierSpec::Bound { min: 1, max: 256 },
            bit_length: ModifierSpec::NotAllowed,
            scale: ModifierSpec::NotAllowed,
            exponent: ModifierSpec::NotAllowed,
            exact_length: None,
            nominal_kind: NominalKind::String,
            validator: Validator::UnicodeString,
            alignment: Alignment::Halfword,
            implicit_length: ImplicitLength::AsNeeded,
            literal_range: None,
        });

        self.insert(DataDefType {
            type_char: 'G',
            extension: '\0',
            type_str: "G",
            length: ModifierSpec::Bound { min: 1, max: 256 },
            bit_length: ModifierSpec::NotAllowed,
            scale: ModifierSpec::NotAllowed,
            exponent: ModifierSpec::NotAllowed,
            exact_length: None,
            nominal_kind: NominalKind::String,
            validator: Validator::Graphic,
            alignment: Alignment::Byte,
            implicit_length: ImplicitLength::AsNeeded,
            literal_range: None,
        });

        self.insert(DataDefType {
            type_char: 'X',
            extension: '\0',
            type_str: "X",
            length: ModifierSpec::Bound { min: 1, max: 256 },
            bit_length: ModifierSpec::Bound { min: 1, max: 2048 },
            scale: ModifierSpec::NotAllowed,
            exponent: ModifierSpec::NotAllowed,
            exact_length: None,
            nominal_kind: NominalKind::String,
            validator: Validator::Hex,
            alignment: Alignment::Byte,
            implicit_length: ImplicitLength::AsNeeded,
            literal_range: None,
        });
    }

    // -----------------------------------------------------------------------
    //  Fixed point: H, F, FD
    // -----------------------------------------------------------------------

    fn register_fixed_point_types(&mut self) {
        for (type_char, ext, type_str, width, alignment) in [
            ('H', '\0', "H", 2, Alignment::Halfword),
            ('F', '\0', "F", 4, Alignment::Fullword),
            ('F', 'D', "FD", 8, Alignment::Doubleword),
        ] {
            self.insert(DataDefType {
                type_char,
                extension: ext,
                type_str,
                length: ModifierSpec::Bound { min: 1, max: 8 },
                bit_length: ModifierSpec::Bound { min: 1, max: 64 },
                scale: ModifierSpec::Bound { min: -187, max: 346 },
                exponent: ModifierSpec::Bound { min: -85, max: 75 },
                exact_length: None,
                nominal_kind: NominalKind::String,
                validator: Validator::NumberList { allow_u_sign: true },
                alignment,
                implicit_length: ImplicitLength::Fixed(width),
                literal_range: None,
            });
        }
    }

    // -----------------------------------------------------------------------
    //  Packed / zoned decimal: P, Z
    // -----------------------------------------------------------------------

    fn register_decimal_types(&mut self) {
        for (type_char, type_str) in [('P', "P"), ('Z', "Z")] {
            self.insert(DataDefType {
                type_char,
                extension: '\0',
                type_str,
                length: ModifierSpec::Bound { min: 1, max: 16 },
                bit_length: ModifierSpec::Bound { min: 1, max: 128 },
                scale: ModifierSpec::NotAllowed,
                exponent: ModifierSpec::NotAllowed,
                exact_length: None,
                nominal_kind: NominalKind::String,
                validator: Validator::SignedIntList,
                alignment: Alignment::Byte,
                implicit_length: ImplicitLength::AsNeeded,
                literal_range: None,
            });
        }
    }

    // -----------------------------------------------------------------------
    //  Address constants: A, AD, Y, S, SY
    // -----------------------------------------------------------------------

    fn register_address_types(&mut self) {
        self.insert(DataDefType {
            type_char: 'A',
            extension: '\0',
            type_str: "A",
            length: ModifierSpec::Bound { min: 1, max: 4 },
            bit_length: ModifierSpec::Bound { min: 1, max: 128 },
            scale: ModifierSpec::NotAllowed,
            exponent: ModifierSpec::NotAllowed,
            exact_length: None,
            nominal_kind: NominalKind::Expressions,
            validator: Validator::ExpressionList,
            alignment: Alignment::Fullword,
            implicit_length: ImplicitLength::Fixed(4),
            literal_range: Some((i32::MIN as i64, u32::MAX as i64)),
        });

        self.insert(DataDefType {
            type_char: 'A',
            extension: 'D',
            type_str: "AD",
            length: ModifierSpec::Bound { min: 1, max: 8 },
            bit_length: ModifierSpec::Bound { min: 1, max: 128 },
            scale: ModifierSpec::NotAllowed,
            exponent: ModifierSpec::NotAllowed,
            exact_length: None,
            nominal_kind: NominalKind::Expressions,
            validator: Validator::ExpressionList,
            alignment: Alignment::Doubleword,
            implicit_length: ImplicitLength::Fixed(8),
            literal_range: None,
        });

        self.insert(DataDefType {
            type_char: 'Y',
            extension: '\0',
            type_str: "Y",
            length: ModifierSpec::Bound { min: 1, max: 2 },
            bit_length: ModifierSpec::Bound { min: 1, max: 16 },
            scale: ModifierSpec::NotAllowed,
            exponent: ModifierSpec::NotAllowed,
            exact_length: None,
            nominal_kind: NominalKind::Expressions,
            validator: Validator::ExpressionList,
            alignment: Alignment::Halfword,
            implicit_length: ImplicitLength::Fixed(2),
            literal_range: Some((-32768, 65535)),
        });

        self.insert(DataDefType {
            type_char: 'S',
            extension: '\0',
            type_str: "S",
            length: ModifierSpec::Bound { min: 2, max: 2 },
            bit_length: ModifierSpec::NotAllowed,
            scale: ModifierSpec::NotAllowed,
            exponent: ModifierSpec::NotAllowed,
            exact_length: None,
            nominal_kind: NominalKind::Expressions,
            validator: Validator::BaseDisplacement,
            alignment: Alignment::Halfword,
            implicit_length: ImplicitLength::Fixed(2),
            literal_range: Some((0, 4095)),
        });

        self.insert(DataDefType {
            type_char: 'S',
            extension: 'Y',
            type_str: "SY",
            length: ModifierSpec::Bound { min: 3, max: 3 },
            bit_length: ModifierSpec::NotAllowed,
            scale: ModifierSpec::NotAllowed,
            exponent: ModifierSpec::NotAllowed,
            exact_length: None,
            nominal_kind: NominalKind::Expressions,
            validator: Validator::BaseDisplacement,
            alignment: Alignment::Byte,
            implicit_length: ImplicitLength::Fixed(3),
            literal_range: Some((-524288, 524287)),
        });
    }

    // -----------------------------------------------------------------------
    //  Single-symbol types: R, RD, V, VD, Q, QD, QY, J, JD
    // -----------------------------------------------------------------------

    fn register_single_symbol_types(&mut self) {
        // (type, ext, mnemonic, implicit length, alignment, exact length)
        let entries: &[(char, char, &'static str, u64, Alignment, Option<u64>)] = &[
            ('R', '\0', "R", 4, Alignment::Fullword, None),
            ('R', 'D', "RD", 8, Alignment::Doubleword, Some(8)),
            ('V', '\0', "V", 4, Alignment::Fullword, None),
            ('V', 'D', "VD", 8, Alignment::Doubleword, Some(8)),
            ('Q', '\0', "Q", 4, Alignment::Fullword, None),
            ('Q', 'D', "QD", 8, Alignment::Doubleword, None),
            ('Q', 'Y', "QY", 3, Alignment::Byte, None),
            ('J', '\0', "J", 4, Alignment::Fullword, None),
            ('J', 'D', "JD", 8, Alignment::Doubleword, Some(8)),
        ];
        for &(type_char, ext, type_str, width, alignment, exact) in entries {
            self.insert(DataDefType {
                type_char,
                extension: ext,
                type_str,
                length: ModifierSpec::Bound { min: 3, max: 8 },
                bit_length: ModifierSpec::NotAllowed,
                scale: ModifierSpec::NotAllowed,
                exponent: ModifierSpec::NotAllowed,
                exact_length: exact,
                nominal_kind: NominalKind::Expressions,
                validator: Validator::SingleSymbol,
                alignment,
                implicit_length: ImplicitLength::Fixed(width),
                literal_range: None,
            });
        }
    }

    // -----------------------------------------------------------------------
    //  Floating point: E, EH, ED, EB, D, DH, DB, DD, L, LH, LQ, LD, LB
    // -----------------------------------------------------------------------

    fn register_float_types(&mut self) {
        // (type, ext, mnemonic, width, alignment, scale bound)
        let entries: &[(char, char, &'static str, u64, Alignment, ModifierSpec)] = &[
            ('E', '\0', "E", 4, Alignment::Fullword, ModifierSpec::Bound { min: 0, max: 14 }),
            ('E', 'H', "EH", 4, Alignment::Fullword, ModifierSpec::Bound { min: 0, max: 14 }),
            ('E', 'D', "ED", 4, Alignment::Fullword, ModifierSpec::NotAllowed),
            ('E', 'B', "EB", 4, Alignment::Fullword, ModifierSpec::NotAllowed),
            ('D', '\0', "D", 8, Alignment::Doubleword, ModifierSpec::Bound { min: 0, max: 14 }),
            ('D', 'H', "DH", 8, Alignment::Doubleword, ModifierSpec::Bound { min: 0, max: 14 }),
            ('D', 'B', "DB", 8, Alignment::Doubleword, ModifierSpec::NotAllowed),
            ('D', 'D', "DD", 8, Alignment::Doubleword, ModifierSpec::NotAllowed),
            ('L', '\0', "L", 16, Alignment::Doubleword, ModifierSpec::Bound { min: 0, max: 28 }),
            ('L', 'H', "LH", 16, Alignment::Doubleword, ModifierSpec::Bound { min: 0, max: 28 }),
            ('L', 'Q', "LQ", 16, Alignment::Quadword, ModifierSpec::Bound { min: 0, max: 28 }),
            ('L', 'D', "LD", 16, Alignment::Doubleword, ModifierSpec::NotAllowed),
            ('L', 'B', "LB", 16, Alignment::Doubleword, ModifierSpec::NotAllowed),
        ];
        for &(type_char, ext, type_str, width, alignment, scale) in entries {
            let max_length = if type_char == 'L' { 16 } else { 8 };
            self.insert(DataDefType {
                type_char,
                extension: ext,
                type_str,
                length: ModifierSpec::Bound { min: 1, max: max_length },
                bit_length: ModifierSpec::Bound { min: 1, max: max_length * 8 },
                scale,
                exponent: ModifierSpec::Bound { min: -85, max: 75 },
                exact_length: None,
                nominal_kind: NominalKind::String,
                validator: Validator::NumberList { allow_u_sign: false },
                alignment,
                implicit_length: ImplicitLength::Fixed(width),
                literal_range: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_coverage() {
        let reg = DataDefRegistry::new();
        // 7 string + 3 fixed + 2 decimal + 5 address + 9 single-symbol
        // + 13 float.
        assert_eq!(reg.len(), 39);
        for (t, e) in [
            ('B', None),
            ('C', Some('U')),
            ('F', Some('D')),
            ('P', None),
            ('A', None),
            ('S', Some('Y')),
            ('R', Some('D')),
            ('L', Some('Q')),
        ] {
            assert!(reg.get(t, e).is_some(), "missing type {t}{e:?}");
        }
        assert!(reg.get('W', None).is_none());
    }

    #[test]
    fn test_known_extensions() {
        assert!(is_known_extension('F', 'D'));
        assert!(is_known_extension('C', 'U'));
        assert!(!is_known_extension('F', 'L'));
        assert!(!is_known_extension('H', 'E'));
    }

    #[test]
    fn test_fixed_point_bounds() {
        let reg = DataDefRegistry::new();
        let f = reg.get('F', None).unwrap();
        assert!(f.length.allows(8));
        assert!(!f.length.allows(9));
        assert!(f.scale.allows(-187));
        assert!(f.scale.allows(346));
        assert!(f.exponent.allows(75));
        assert!(!f.exponent.allows(76));
    }

    #[test]
    fn test_exact_lengths() {
        let reg = DataDefRegistry::new();
        assert_eq!(reg.get('R', Some('D')).unwrap().exact_length, Some(8));
        assert_eq!(reg.get('V', Some('D')).unwrap().exact_length, Some(8));
        assert_eq!(reg.get('J', Some('D')).unwrap().exact_length, Some(8));
        assert_eq!(reg.get('Q', Some('D')).unwrap().exact_length, None);
    }
}
