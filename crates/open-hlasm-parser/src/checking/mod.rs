//! DC/DS operand checking and emitted-length computation.
//!
//! For every data-definition operand the checker answers two questions:
//! is the operand well-formed, and how many bytes does it emit. Validation
//! is driven entirely by the type registry.

pub mod data_def_type;
pub mod operand;
pub mod registry;

pub use data_def_type::{Alignment, DataDefType, ImplicitLength, ModifierSpec, NominalKind, Validator};
pub use operand::{parse_data_def_operands, DataDefOperand, NominalPayload, NominalValue};
pub use registry::{is_known_extension, DataDefRegistry};

use open_hlasm_lang_core::Position;

use crate::diags::{self, DiagnosticSink};

/// Result of checking one DC/DS statement's operand field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDefCheck {
    /// Total bytes emitted by all operands.
    pub total_bytes: u64,
    /// L' attribute for a label on the statement (first operand's item
    /// length).
    pub label_length: u64,
    /// T' attribute for a label (first operand's type character).
    pub label_type: char,
    /// Alignment applied before the first operand (identity when an explicit
    /// length modifier suppresses alignment).
    pub alignment: Alignment,
    /// Whether every operand checked clean.
    pub ok: bool,
}

/// Parse and check a DC/DS operand field. `is_dc` selects nominal-value
/// validation (DS operands keep their nominal unvalidated) and makes the
/// nominal mandatory.
pub fn check_data_def(
    text: &str,
    base: Position,
    is_dc: bool,
    registry: &DataDefRegistry,
    sink: &mut DiagnosticSink,
) -> DataDefCheck {
    let (operands, parse_diags) = parse_data_def_operands(text, base);
    let mut ok = parse_diags.is_empty();
    for d in parse_diags {
        sink.add(d);
    }

    let mut total_bytes = 0u64;
    let mut label_length = 1u64;
    let mut label_type = 'U';
    let mut alignment = Alignment::Byte;

    for (index, op) in operands.iter().enumerate() {
        let Some(def_type) = registry.get(op.type_char, op.extension) else {
            sink.add(diags::error_d021(&op.type_str(), op.range));
            ok = false;
            continue;
        };

        if !def_type.check(op, is_dc, sink) {
            ok = false;
        }
        total_bytes += def_type.operand_length(op);

        if index == 0 {
            label_length = def_type.item_length(op);
            label_type = op.type_char;
            // An explicit length modifier suppresses boundary alignment.
            alignment = if op.length.is_some() {
                Alignment::Byte
            } else {
                def_type.alignment
            };
        }
    }

    DataDefCheck {
        total_bytes,
        label_length,
        label_type,
        alignment,
        ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(text: &str, is_dc: bool) -> (DataDefCheck, Vec<String>) {
        let registry = DataDefRegistry::new();
        let mut sink = DiagnosticSink::new();
        let result = check_data_def(text, Position::default(), is_dc, &registry, &mut sink);
        let codes = sink.into_diagnostics().into_iter().map(|d| d.code).collect();
        (result, codes)
    }

    #[test]
    fn test_fullword_list() {
        let (result, codes) = check("F'1,-2E3,+4.5'", true);
        assert!(codes.is_empty());
        assert!(result.ok);
        assert_eq!(result.total_bytes, 12);
        assert_eq!(result.label_length, 4);
        assert_eq!(result.alignment, Alignment::Fullword);
    }

    #[test]
    fn test_packed_lengths() {
        let (result, codes) = check("P'12,-345'", true);
        assert!(codes.is_empty());
        // ceil(3/2) + ceil(4/2) = 2 + 2.
        assert_eq!(result.total_bytes, 4);
    }

    #[test]
    fn test_packed_five_digits() {
        let (result, _) = check("P'12345'", true);
        assert_eq!(result.total_bytes, 3);
    }

    #[test]
    fn test_zoned_lengths() {
        let (result, _) = check("Z'12345'", true);
        assert_eq!(result.total_bytes, 5);
    }

    #[test]
    fn test_bit_lengths() {
        let (result, _) = check("B'101'", true);
        assert_eq!(result.total_bytes, 1);
        let (result, _) = check("B'10000000,1'", true);
        assert_eq!(result.total_bytes, 2);
    }

    #[test]
    fn test_trailing_comma_rejected() {
        let (result, codes) = check("H'1,'", true);
        assert!(!result.ok);
        assert_eq!(codes, vec!["D010".to_string()]);
    }

    #[test]
    fn test_char_length() {
        let (result, _) = check("C'ABC'", true);
        assert_eq!(result.total_bytes, 3);
        assert_eq!(result.label_length, 3);
    }

    #[test]
    fn test_hex_length() {
        let (result, _) = check("X'1F,2'", true);
        assert_eq!(result.total_bytes, 2);
    }

    #[test]
    fn test_duplication_and_explicit_length() {
        let (result, _) = check("3XL2'FF,FF'", true);
        // dup 3 x (L2 x 2 constants).
        assert_eq!(result.total_bytes, 12);
        assert_eq!(result.label_length, 2);
        assert_eq!(result.alignment, Alignment::Byte);
    }

    #[test]
    fn test_address_constants() {
        let (result, codes) = check("A(X,Y)", true);
        assert!(codes.is_empty());
        assert_eq!(result.total_bytes, 8);
    }

    #[test]
    fn test_y_range_check() {
        let (_, codes) = check("Y(70000)", true);
        assert_eq!(codes, vec!["D020".to_string()]);
    }

    #[test]
    fn test_single_symbol_types() {
        let (result, codes) = check("V(ENTRY1)", true);
        assert!(codes.is_empty());
        assert_eq!(result.total_bytes, 4);

        let (_, codes) = check("V(1+2)", true);
        assert_eq!(codes, vec!["D010".to_string()]);
    }

    #[test]
    fn test_vd_length_constraint() {
        let (_, codes) = check("VDL8(ENTRY1)", true);
        assert!(codes.is_empty());
        let (_, codes) = check("VDL4(ENTRY1)", true);
        assert_eq!(codes, vec!["D005".to_string()]);
    }

    #[test]
    fn test_ds_without_nominal() {
        let (result, codes) = check("F", false);
        assert!(codes.is_empty());
        assert!(result.ok);
        assert_eq!(result.total_bytes, 4);
    }

    #[test]
    fn test_dc_requires_nominal() {
        let (result, codes) = check("F", true);
        assert!(!result.ok);
        assert_eq!(codes, vec!["D016".to_string()]);
    }

    #[test]
    fn test_ds_packed_implicit_length() {
        let (result, _) = check("P", false);
        assert_eq!(result.total_bytes, 1);
    }

    #[test]
    fn test_unknown_type() {
        let (result, codes) = check("W'1'", true);
        assert!(!result.ok);
        assert_eq!(codes, vec!["D021".to_string()]);
    }

    #[test]
    fn test_comma_list_sums() {
        // Invariant: a comma list's length is the sum of its parts.
        let (whole, _) = check("P'1,22,333'", true);
        let (a, _) = check("P'1'", true);
        let (b, _) = check("P'22'", true);
        let (c, _) = check("P'333'", true);
        assert_eq!(
            whole.total_bytes,
            a.total_bytes + b.total_bytes + c.total_bytes
        );
    }

    #[test]
    fn test_float_validator() {
        let (result, codes) = check("E'1.5,-2.25E-3'", true);
        assert!(codes.is_empty());
        assert_eq!(result.total_bytes, 8);

        // The U sign is a fixed-point spelling, not float.
        let (_, codes) = check("E'U2'", true);
        assert_eq!(codes, vec!["D010".to_string()]);
    }

    #[test]
    fn test_fixed_u_sign_allowed() {
        let (_, codes) = check("F'U2'", true);
        assert!(codes.is_empty());
    }

    #[test]
    fn test_graphic_validator() {
        let (_, codes) = check("G'\u{0e}AB\u{0f}'", true);
        assert!(codes.is_empty());
        let (_, codes) = check("G'AB'", true);
        assert_eq!(codes, vec!["D010".to_string()]);
    }

    #[test]
    fn test_scale_out_of_range() {
        let (_, codes) = check("HS400'1'", true);
        assert_eq!(codes, vec!["D007".to_string()]);
    }

    #[test]
    fn test_bit_length_where_not_applicable() {
        let (_, codes) = check("CUL.8'AB'", true);
        assert_eq!(codes, vec!["D006".to_string()]);
    }
}
