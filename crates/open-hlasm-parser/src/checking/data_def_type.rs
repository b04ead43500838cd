//! Data-definition type records: modifier bounds, validators, length rules.
//!
//! The ~30 DC/DS type codes collapse into a single record plus a validator
//! kind:
//!
//! - **NumberList** — H/F/FD and the E/D/L floating families: comma lists of
//!   `[sign] digits [. digits] [E [sign] digits]`
//! - **SignedIntList** — P/Z: comma lists of `[+|-] digits`
//! - **SingleSymbol** — R/V/Q/J families: one ordinary symbol per element
//! - per-type validators for B, C/CA/CE, CU, G, X, A/AD/Y, S/SY
//!
//! All nominal-value failures emit `D010`; modifier violations emit the
//! `D005`-`D008` family; range violations `D020`.

use open_hlasm_lang_core::Range;

use crate::diags::{self, DiagnosticSink};

use super::operand::{DataDefOperand, NominalPayload, NominalValue};

// ---------------------------------------------------------------------------
//  Registry record pieces
// ---------------------------------------------------------------------------

/// Bound of one modifier: a closed interval or "not applicable".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierSpec {
    Bound { min: i64, max: i64 },
    NotAllowed,
}

impl ModifierSpec {
    /// Whether `value` satisfies the spec.
    pub fn allows(&self, value: i64) -> bool {
        match self {
            ModifierSpec::Bound { min, max } => (*min..=*max).contains(&value),
            ModifierSpec::NotAllowed => false,
        }
    }
}

/// Storage alignment of a type (applied when no explicit length is given).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Alignment {
    Byte,
    Halfword,
    Fullword,
    Doubleword,
    Quadword,
}

impl Alignment {
    /// The boundary in bytes.
    pub fn boundary(self) -> i64 {
        match self {
            Alignment::Byte => 1,
            Alignment::Halfword => 2,
            Alignment::Fullword => 4,
            Alignment::Doubleword => 8,
            Alignment::Quadword => 16,
        }
    }
}

/// Which nominal form the type takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NominalKind {
    /// Quoted: `'...'`.
    String,
    /// Parenthesized expression list: `(a,b)`.
    Expressions,
}

/// Implicit length when no nominal value and no length modifier is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplicitLength {
    Fixed(u64),
    /// Length follows the nominal value; one byte when absent.
    AsNeeded,
}

/// Nominal-value validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    /// `B`: strings of 0/1 split by commas.
    BitString,
    /// `C`/`CA`/`CE`: any character payload.
    CharString,
    /// `CU`: UTF payload, kept as-is.
    UnicodeString,
    /// `G`: shift-out ... shift-in with paired inner bytes.
    Graphic,
    /// `X`: hex digits split by commas.
    Hex,
    /// Fixed/float families; `allow_u_sign` admits the `U` sign of
    /// fixed-point constants.
    NumberList { allow_u_sign: bool },
    /// `P`/`Z`: signed decimal integers only.
    SignedIntList,
    /// Address constants: expression list (literal elements range-checked).
    ExpressionList,
    /// `S`/`SY`: expression or `disp(base)`.
    BaseDisplacement,
    /// `R`/`V`/`Q`/`J` families: exactly one ordinary symbol per element.
    SingleSymbol,
}

/// One entry of the data-definition type registry.
#[derive(Debug, Clone)]
pub struct DataDefType {
    pub type_char: char,
    /// `'\0'` when the type has no extension character.
    pub extension: char,
    /// Mnemonic for messages, e.g. `"FD"`.
    pub type_str: &'static str,
    pub length: ModifierSpec,
    pub bit_length: ModifierSpec,
    pub scale: ModifierSpec,
    pub exponent: ModifierSpec,
    /// An exact required value of the length modifier (RD/VD/JD).
    pub exact_length: Option<u64>,
    pub nominal_kind: NominalKind,
    pub validator: Validator,
    pub alignment: Alignment,
    pub implicit_length: ImplicitLength,
    /// Range check applied to literal elements of expression nominals.
    pub literal_range: Option<(i64, i64)>,
}

impl DataDefType {
    // -----------------------------------------------------------------------
    //  Checking
    // -----------------------------------------------------------------------

    /// Validate an operand against this type. `check_nominal` is set for DC
    /// (DS operands keep their nominal unvalidated). Appends diagnostics and
    /// returns overall ok-ness.
    pub fn check(&self, op: &DataDefOperand, check_nominal: bool, sink: &mut DiagnosticSink) -> bool {
        let mut ok = self.check_modifiers(op, sink);

        match &op.nominal {
            None => {
                if check_nominal {
                    sink.add(diags::error_d016(self.type_str, op.range));
                    ok = false;
                }
            }
            Some(nominal) => {
                let kind_matches = matches!(
                    (&nominal.payload, self.nominal_kind),
                    (NominalPayload::Str(_), NominalKind::String)
                        | (NominalPayload::Exprs(_), NominalKind::Expressions)
                );
                if !kind_matches {
                    sink.add(diags::error_d010(self.type_str, nominal.range));
                    return false;
                }
                if check_nominal && !self.check_nominal(nominal, sink) {
                    ok = false;
                }
            }
        }

        ok
    }

    fn check_modifiers(&self, op: &DataDefOperand, sink: &mut DiagnosticSink) -> bool {
        let mut ok = true;

        if let Some(length) = op.length {
            if op.length_in_bits {
                // A bit-length modifier is rejected where not applicable
                // (type B always admits it).
                if !self.bit_length.allows(length as i64) {
                    sink.add(diags::error_d006(self.type_str, op.range));
                    ok = false;
                }
            } else if let Some(exact) = self.exact_length {
                if length != exact {
                    sink.add(diags::error_d005(self.type_str, op.range));
                    ok = false;
                }
            } else if !self.length.allows(length as i64) {
                sink.add(diags::error_d005(self.type_str, op.range));
                ok = false;
            }
        }

        if let Some(scale) = op.scale {
            if !self.scale.allows(scale) {
                sink.add(diags::error_d007(self.type_str, op.range));
                ok = false;
            }
        }

        if let Some(exponent) = op.exponent {
            if !self.exponent.allows(exponent) {
                sink.add(diags::error_d008(self.type_str, op.range));
                ok = false;
            }
        }

        ok
    }

    fn check_nominal(&self, nominal: &NominalValue, sink: &mut DiagnosticSink) -> bool {
        match (&nominal.payload, self.validator) {
            (NominalPayload::Str(s), Validator::BitString) => {
                self.check_comma_list(s, nominal.range, sink, |part| {
                    !part.is_empty() && part.chars().all(|c| c == '0' || c == '1')
                })
            }
            (NominalPayload::Str(_), Validator::CharString) => true,
            (NominalPayload::Str(_), Validator::UnicodeString) => true,
            (NominalPayload::Str(s), Validator::Graphic) => {
                let bytes = s.as_bytes();
                let ok = bytes.len() >= 2
                    && bytes[0] == 0x0E
                    && bytes[bytes.len() - 1] == 0x0F
                    && (bytes.len() - 2) % 2 == 0;
                if !ok {
                    sink.add(diags::error_d010(self.type_str, nominal.range));
                }
                ok
            }
            (NominalPayload::Str(s), Validator::Hex) => {
                self.check_comma_list(s, nominal.range, sink, |part| {
                    !part.is_empty() && part.chars().all(|c| c.is_ascii_hexdigit())
                })
            }
            (NominalPayload::Str(s), Validator::NumberList { allow_u_sign }) => {
                self.check_comma_list(s, nominal.range, sink, |part| {
                    check_number(part, allow_u_sign, true)
                })
            }
            (NominalPayload::Str(s), Validator::SignedIntList) => {
                self.check_comma_list(s, nominal.range, sink, |part| {
                    check_number_no_fraction(part)
                })
            }
            (NominalPayload::Exprs(exprs), Validator::ExpressionList) => {
                self.check_expr_list(exprs, nominal.range, sink)
            }
            (NominalPayload::Exprs(exprs), Validator::BaseDisplacement) => {
                let mut ok = true;
                for expr in exprs {
                    if expr.is_empty() {
                        sink.add(diags::error_d010(self.type_str, nominal.range));
                        ok = false;
                        continue;
                    }
                    if let Some((disp, base)) = split_base_displacement(expr) {
                        if let (Ok(d), Ok(b)) = (disp.parse::<i64>(), base.parse::<i64>()) {
                            let disp_ok = self
                                .literal_range
                                .map(|(min, max)| (min..=max).contains(&d))
                                .unwrap_or(true);
                            if !disp_ok || !(0..=15).contains(&b) {
                                sink.add(diags::error_d020(self.type_str, nominal.range));
                                ok = false;
                            }
                        }
                    }
                }
                ok
            }
            (NominalPayload::Exprs(exprs), Validator::SingleSymbol) => {
                let mut ok = true;
                for expr in exprs {
                    if !is_symbol_name(expr) {
                        sink.add(diags::error_d010(self.type_str, nominal.range));
                        ok = false;
                    }
                }
                ok
            }
            // Kind mismatches are rejected before the validator runs.
            _ => {
                sink.add(diags::error_d010(self.type_str, nominal.range));
                false
            }
        }
    }

    fn check_comma_list(
        &self,
        payload: &str,
        range: Range,
        sink: &mut DiagnosticSink,
        part_ok: impl Fn(&str) -> bool,
    ) -> bool {
        if payload.is_empty() || payload.ends_with(',') {
            sink.add(diags::error_d010(self.type_str, range));
            return false;
        }
        for part in payload.split(',') {
            if !part_ok(part) {
                sink.add(diags::error_d010(self.type_str, range));
                return false;
            }
        }
        true
    }

    fn check_expr_list(&self, exprs: &[String], range: Range, sink: &mut DiagnosticSink) -> bool {
        let mut ok = true;
        for expr in exprs {
            if expr.is_empty() {
                sink.add(diags::error_d010(self.type_str, range));
                ok = false;
                continue;
            }
            if let (Ok(value), Some((min, max))) = (expr.parse::<i64>(), self.literal_range) {
                if !(min..=max).contains(&value) {
                    sink.add(diags::error_d020(self.type_str, range));
                    ok = false;
                }
            }
        }
        ok
    }

    // -----------------------------------------------------------------------
    //  Length computation
    // -----------------------------------------------------------------------

    /// Bytes occupied by the nominal value alone (no duplication, no
    /// explicit length). Absent nominals take the implicit length.
    pub fn nominal_length(&self, nominal: Option<&NominalValue>) -> u64 {
        let Some(nominal) = nominal else {
            return match self.implicit_length {
                ImplicitLength::Fixed(n) => n,
                ImplicitLength::AsNeeded => 1,
            };
        };

        match (&nominal.payload, self.validator) {
            (NominalPayload::Str(s), Validator::BitString) => s
                .split(',')
                .map(|part| (part.len() as u64).div_ceil(8))
                .sum(),
            (NominalPayload::Str(s), Validator::CharString) => s.len() as u64,
            (NominalPayload::Str(s), Validator::UnicodeString) => {
                2 * s.encode_utf16().count() as u64
            }
            (NominalPayload::Str(s), Validator::Graphic) => (s.len() as u64).saturating_sub(2),
            (NominalPayload::Str(s), Validator::Hex) => s
                .split(',')
                .map(|part| (part.len() as u64).div_ceil(2))
                .sum(),
            (NominalPayload::Str(s), Validator::NumberList { .. }) => {
                let width = match self.implicit_length {
                    ImplicitLength::Fixed(n) => n,
                    ImplicitLength::AsNeeded => 1,
                };
                width * (s.split(',').count() as u64)
            }
            (NominalPayload::Str(s), Validator::SignedIntList) => {
                if self.type_char == 'P' {
                    // Each digit is a half-byte; a sign nibble is added per
                    // constant.
                    s.split(',')
                        .map(|part| {
                            let digits = part.chars().filter(char::is_ascii_digit).count() as u64;
                            (digits + 1).div_ceil(2)
                        })
                        .sum()
                } else {
                    // Zoned: one byte per digit.
                    s.chars().filter(char::is_ascii_digit).count() as u64
                }
            }
            (NominalPayload::Exprs(exprs), _) => {
                let width = match self.implicit_length {
                    ImplicitLength::Fixed(n) => n,
                    ImplicitLength::AsNeeded => 1,
                };
                width * exprs.len() as u64
            }
            // Kind mismatch: fall back to the implicit length.
            _ => match self.implicit_length {
                ImplicitLength::Fixed(n) => n,
                ImplicitLength::AsNeeded => 1,
            },
        }
    }

    /// Total bytes emitted by an operand: duplication times either the
    /// explicit length per constant or the nominal length.
    pub fn operand_length(&self, op: &DataDefOperand) -> u64 {
        let unit = if let Some(length) = op.length {
            let count = self.constant_count(op.nominal.as_ref());
            if op.length_in_bits {
                (length * count).div_ceil(8)
            } else {
                length * count
            }
        } else {
            self.nominal_length(op.nominal.as_ref())
        };
        op.dup_factor * unit
    }

    /// The L' attribute value of a label on this operand: the explicit
    /// length, or the length of the first constant.
    pub fn item_length(&self, op: &DataDefOperand) -> u64 {
        if let Some(length) = op.length {
            if op.length_in_bits {
                return length.div_ceil(8).max(1);
            }
            return length;
        }
        match self.implicit_length {
            ImplicitLength::Fixed(n) => n,
            ImplicitLength::AsNeeded => match op.nominal.as_ref().map(|n| &n.payload) {
                Some(NominalPayload::Str(s)) => {
                    let first = match self.validator {
                        Validator::BitString => {
                            return (s.split(',').next().unwrap_or("").len() as u64).div_ceil(8).max(1)
                        }
                        Validator::Hex => {
                            return (s.split(',').next().unwrap_or("").len() as u64).div_ceil(2).max(1)
                        }
                        Validator::SignedIntList => {
                            let part = s.split(',').next().unwrap_or("");
                            let digits = part.chars().filter(char::is_ascii_digit).count() as u64;
                            return if self.type_char == 'P' {
                                (digits + 1).div_ceil(2).max(1)
                            } else {
                                digits.max(1)
                            };
                        }
                        _ => s.len() as u64,
                    };
                    first.max(1)
                }
                _ => 1,
            },
        }
    }

    /// Number of constants in the nominal (1 when absent).
    fn constant_count(&self, nominal: Option<&NominalValue>) -> u64 {
        match nominal.map(|n| &n.payload) {
            Some(NominalPayload::Str(s)) => match self.validator {
                Validator::BitString
                | Validator::Hex
                | Validator::NumberList { .. }
                | Validator::SignedIntList => s.split(',').count() as u64,
                _ => 1,
            },
            Some(NominalPayload::Exprs(exprs)) => exprs.len() as u64,
            None => 1,
        }
    }
}

// ---------------------------------------------------------------------------
//  Shared character-level checks
// ---------------------------------------------------------------------------

/// `[sign] digits [. digits] [E [sign] digits]`
fn check_number(part: &str, allow_u_sign: bool, allow_exponent: bool) -> bool {
    let chars: Vec<char> = part.chars().collect();
    let mut i = 0usize;

    match chars.first() {
        Some('+') | Some('-') => i = 1,
        Some('U') | Some('u') if allow_u_sign => i = 1,
        _ => {}
    }

    let digits_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return false;
    }

    if i < chars.len() && chars[i] == '.' {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }

    if i < chars.len() && (chars[i] == 'E' || chars[i] == 'e') {
        if !allow_exponent {
            return false;
        }
        i += 1;
        if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
            i += 1;
        }
        let exp_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == chars.len()
}

/// `[+|-] digits` only.
fn check_number_no_fraction(part: &str) -> bool {
    let rest = part
        .strip_prefix('+')
        .or_else(|| part.strip_prefix('-'))
        .unwrap_or(part);
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

fn is_symbol_name(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || matches!(c, '$' | '#' | '@' | '_') => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '$' | '#' | '@' | '_'))
}

/// Split `disp(base)` into its parts; `None` for a plain expression.
fn split_base_displacement(text: &str) -> Option<(&str, &str)> {
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    if close != text.len() - 1 || close <= open {
        return None;
    }
    Some((&text[..open], &text[open + 1..close]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_number_fixed_point() {
        assert!(check_number("1", true, true));
        assert!(check_number("U2", true, true));
        assert!(check_number("-2E3", true, true));
        assert!(check_number("+4.5", true, true));
        assert!(check_number("1.5E-2", true, true));
        assert!(!check_number("", true, true));
        assert!(!check_number("U2", false, true));
        assert!(!check_number("2E3", true, false));
        assert!(!check_number("1.2.3", true, true));
        assert!(!check_number("E3", true, true));
        assert!(!check_number("1E", true, true));
    }

    #[test]
    fn test_check_number_no_fraction() {
        assert!(check_number_no_fraction("12"));
        assert!(check_number_no_fraction("-345"));
        assert!(!check_number_no_fraction("U2"));
        assert!(!check_number_no_fraction("1.5"));
        assert!(!check_number_no_fraction(""));
        assert!(!check_number_no_fraction("+"));
    }

    #[test]
    fn test_is_symbol_name() {
        assert!(is_symbol_name("ENTRY1"));
        assert!(is_symbol_name("$SYS"));
        assert!(!is_symbol_name("1ABC"));
        assert!(!is_symbol_name(""));
        assert!(!is_symbol_name("A+B"));
    }

    #[test]
    fn test_split_base_displacement() {
        assert_eq!(split_base_displacement("512(12)"), Some(("512", "12")));
        assert_eq!(split_base_displacement("X"), None);
    }

    #[test]
    fn test_modifier_spec() {
        let bound = ModifierSpec::Bound { min: 1, max: 8 };
        assert!(bound.allows(1));
        assert!(bound.allows(8));
        assert!(!bound.allows(0));
        assert!(!bound.allows(9));
        assert!(!ModifierSpec::NotAllowed.allows(1));
    }

    #[test]
    fn test_alignment_boundary() {
        assert_eq!(Alignment::Byte.boundary(), 1);
        assert_eq!(Alignment::Doubleword.boundary(), 8);
    }
}
