//! DC/DS operand model and parsing.
//!
//! A data-definition operand is `[dup]T[ext][modifiers][nominal]`:
//!
//! ```text
//! 3FL2'1,2'    dup 3, type F, length 2, nominal string "1,2"
//! CL8'NAME'    type C, length 8
//! A(X,Y)       type A, nominal expressions X and Y
//! HL.10'5'     type H, bit length 10
//! ```
//!
//! Modifiers: `L` length (`L.n` = bit length), `S` scale, `E` exponent,
//! `P` program type. Parsing is purely syntactic; bounds and nominal
//! validation are driven by the type registry.

use open_hlasm_lang_core::{Diagnostic, Position, Range};

use crate::diags;

use super::registry::is_known_extension;

/// The literal content of a nominal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NominalPayload {
    /// Quoted form: `'...'` with doubled quotes collapsed.
    Str(String),
    /// Parenthesized form: `(expr,expr,...)`.
    Exprs(Vec<String>),
}

/// A nominal value with its source range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NominalValue {
    pub payload: NominalPayload,
    pub range: Range,
}

/// One parsed DC/DS operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDefOperand {
    /// Duplication factor; 1 when absent.
    pub dup_factor: u64,
    pub type_char: char,
    pub extension: Option<char>,
    /// `P` modifier value.
    pub program_type: Option<u64>,
    /// `L` modifier value (bytes, or bits when [`Self::length_in_bits`]).
    pub length: Option<u64>,
    pub length_in_bits: bool,
    /// `S` modifier value.
    pub scale: Option<i64>,
    /// `E` modifier value.
    pub exponent: Option<i64>,
    pub nominal: Option<NominalValue>,
    pub range: Range,
}

impl DataDefOperand {
    /// The type mnemonic for messages, e.g. `"FD"`.
    pub fn type_str(&self) -> String {
        match self.extension {
            Some(e) => format!("{}{}", self.type_char, e),
            None => self.type_char.to_string(),
        }
    }
}

/// Parse a full DC/DS operand field (comma-separated operands).
///
/// Returns the successfully parsed operands; malformed operands produce a
/// diagnostic and are dropped.
pub fn parse_data_def_operands(
    text: &str,
    base: Position,
) -> (Vec<DataDefOperand>, Vec<Diagnostic>) {
    let mut operands = Vec::new();
    let mut diagnostics = Vec::new();
    for (piece, range) in crate::semantics::split_operands(text, base) {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            diagnostics.push(diags::error_d021("", range));
            continue;
        }
        match parse_one(trimmed, range) {
            Ok(op) => operands.push(op),
            Err(d) => diagnostics.push(d),
        }
    }
    (operands, diagnostics)
}

fn parse_one(text: &str, range: Range) -> Result<DataDefOperand, Diagnostic> {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0usize;

    // Duplication factor: digits or a parenthesized decimal.
    let mut dup_factor = 1u64;
    if chars[i].is_ascii_digit() {
        let digits = take_digits(&chars, &mut i);
        dup_factor = digits.parse().map_err(|_| diags::error_d021(text, range))?;
    } else if chars[i] == '(' {
        let inner = take_parenthesized(&chars, &mut i).ok_or_else(|| diags::error_d021(text, range))?;
        dup_factor = inner
            .trim()
            .parse()
            .map_err(|_| diags::error_d021(text, range))?;
    }

    // Type character and optional extension.
    let type_char = match chars.get(i) {
        Some(c) if c.is_ascii_alphabetic() => c.to_ascii_uppercase(),
        _ => return Err(diags::error_d021(text, range)),
    };
    i += 1;
    let mut extension = None;
    if let Some(c) = chars.get(i) {
        let upper = c.to_ascii_uppercase();
        if upper.is_ascii_alphabetic() && is_known_extension(type_char, upper) {
            extension = Some(upper);
            i += 1;
        }
    }

    let type_str = match extension {
        Some(e) => format!("{type_char}{e}"),
        None => type_char.to_string(),
    };

    // Modifiers.
    let mut length = None;
    let mut length_in_bits = false;
    let mut scale = None;
    let mut exponent = None;
    let mut program_type = None;
    loop {
        match chars.get(i).map(|c| c.to_ascii_uppercase()) {
            Some('L') => {
                i += 1;
                if chars.get(i) == Some(&'.') {
                    length_in_bits = true;
                    i += 1;
                }
                let digits = take_digits(&chars, &mut i);
                length = Some(
                    digits
                        .parse()
                        .map_err(|_| diags::error_d005(&type_str, range))?,
                );
            }
            Some('S') => {
                i += 1;
                let value = take_signed_digits(&chars, &mut i)
                    .ok_or_else(|| diags::error_d007(&type_str, range))?;
                scale = Some(value);
            }
            Some('E') => {
                i += 1;
                let value = take_signed_digits(&chars, &mut i)
                    .ok_or_else(|| diags::error_d008(&type_str, range))?;
                exponent = Some(value);
            }
            Some('P') => {
                i += 1;
                let digits = take_digits(&chars, &mut i);
                program_type = Some(
                    digits
                        .parse()
                        .map_err(|_| diags::error_d021(text, range))?,
                );
            }
            _ => break,
        }
    }

    // Nominal value.
    let nominal = match chars.get(i) {
        None => None,
        Some('\'') => {
            let start = i;
            let payload = take_quoted(&chars, &mut i)
                .ok_or_else(|| diags::error_d010(&type_str, range))?;
            let nominal_range = sub_range(range, start, i);
            Some(NominalValue {
                payload: NominalPayload::Str(payload),
                range: nominal_range,
            })
        }
        Some('(') => {
            let start = i;
            let inner = take_parenthesized(&chars, &mut i)
                .ok_or_else(|| diags::error_d010(&type_str, range))?;
            let exprs = split_expr_list(&inner);
            let nominal_range = sub_range(range, start, i);
            Some(NominalValue {
                payload: NominalPayload::Exprs(exprs),
                range: nominal_range,
            })
        }
        Some(_) => return Err(diags::error_d010(&type_str, range)),
    };

    if i < chars.len() {
        return Err(diags::error_d010(&type_str, range));
    }

    Ok(DataDefOperand {
        dup_factor,
        type_char,
        extension,
        program_type,
        length,
        length_in_bits,
        scale,
        exponent,
        nominal,
        range,
    })
}

fn take_digits(chars: &[char], i: &mut usize) -> String {
    let mut out = String::new();
    while let Some(c) = chars.get(*i) {
        if c.is_ascii_digit() {
            out.push(*c);
            *i += 1;
        } else {
            break;
        }
    }
    out
}

fn take_signed_digits(chars: &[char], i: &mut usize) -> Option<i64> {
    let mut negative = false;
    match chars.get(*i) {
        Some('+') => *i += 1,
        Some('-') => {
            negative = true;
            *i += 1;
        }
        _ => {}
    }
    let digits = take_digits(chars, i);
    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Quoted text with `''` collapsed; cursor on the opening quote.
fn take_quoted(chars: &[char], i: &mut usize) -> Option<String> {
    debug_assert_eq!(chars.get(*i), Some(&'\''));
    *i += 1;
    let mut out = String::new();
    loop {
        match chars.get(*i) {
            None => return None,
            Some('\'') => {
                *i += 1;
                if chars.get(*i) == Some(&'\'') {
                    out.push('\'');
                    *i += 1;
                } else {
                    return Some(out);
                }
            }
            Some(c) => {
                out.push(*c);
                *i += 1;
            }
        }
    }
}

/// Parenthesized text; cursor on the opening parenthesis.
fn take_parenthesized(chars: &[char], i: &mut usize) -> Option<String> {
    debug_assert_eq!(chars.get(*i), Some(&'('));
    *i += 1;
    let mut depth = 1usize;
    let mut out = String::new();
    loop {
        match chars.get(*i) {
            None => return None,
            Some('(') => {
                depth += 1;
                out.push('(');
                *i += 1;
            }
            Some(')') => {
                depth -= 1;
                *i += 1;
                if depth == 0 {
                    return Some(out);
                }
                out.push(')');
            }
            Some(c) => {
                out.push(*c);
                *i += 1;
            }
        }
    }
}

/// Split an expression list on top-level commas.
fn split_expr_list(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => out.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    out.push(current.trim().to_string());
    out
}

fn sub_range(range: Range, start: usize, end: usize) -> Range {
    Range::in_line(
        range.start.line,
        range.start.column + start,
        range.start.column + end,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> DataDefOperand {
        let (ops, diags) = parse_data_def_operands(text, Position::default());
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert_eq!(ops.len(), 1);
        ops.into_iter().next().unwrap()
    }

    #[test]
    fn test_parse_simple() {
        let op = parse("F'1'");
        assert_eq!(op.type_char, 'F');
        assert_eq!(op.extension, None);
        assert_eq!(op.dup_factor, 1);
        assert_eq!(
            op.nominal.unwrap().payload,
            NominalPayload::Str("1".to_string())
        );
    }

    #[test]
    fn test_parse_dup_and_length() {
        let op = parse("3FL2'1,2'");
        assert_eq!(op.dup_factor, 3);
        assert_eq!(op.length, Some(2));
        assert!(!op.length_in_bits);
    }

    #[test]
    fn test_parse_extension() {
        let op = parse("FD'8'");
        assert_eq!(op.type_char, 'F');
        assert_eq!(op.extension, Some('D'));
        assert_eq!(op.type_str(), "FD");
    }

    #[test]
    fn test_parse_bit_length() {
        let op = parse("BL.3'101'");
        assert!(op.length_in_bits);
        assert_eq!(op.length, Some(3));
    }

    #[test]
    fn test_parse_scale_and_exponent() {
        let op = parse("HS2E-1'5'");
        assert_eq!(op.scale, Some(2));
        assert_eq!(op.exponent, Some(-1));
    }

    #[test]
    fn test_parse_expr_nominal() {
        let op = parse("A(X,Y+2)");
        match op.nominal.unwrap().payload {
            NominalPayload::Exprs(exprs) => assert_eq!(exprs, vec!["X", "Y+2"]),
            other => panic!("expected expressions, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_nested_parens_in_exprs() {
        let op = parse("S(512(12))");
        match op.nominal.unwrap().payload {
            NominalPayload::Exprs(exprs) => assert_eq!(exprs, vec!["512(12)"]),
            other => panic!("expected expressions, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_quote_escape() {
        let op = parse("C'IT''S'");
        assert_eq!(
            op.nominal.unwrap().payload,
            NominalPayload::Str("IT'S".to_string())
        );
    }

    #[test]
    fn test_parse_multiple_operands() {
        let (ops, diags) = parse_data_def_operands("F'1',H'2'", Position::default());
        assert!(diags.is_empty());
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].type_char, 'H');
    }

    #[test]
    fn test_parse_no_nominal() {
        let op = parse("F");
        assert!(op.nominal.is_none());
    }

    #[test]
    fn test_parse_unterminated_nominal() {
        let (ops, diags) = parse_data_def_operands("C'ABC", Position::default());
        assert!(ops.is_empty());
        assert_eq!(diags[0].code, "D010");
    }

    #[test]
    fn test_parse_garbage_type() {
        let (ops, diags) = parse_data_def_operands("1'X'", Position::default());
        assert!(ops.is_empty());
        assert_eq!(diags[0].code, "D021");
    }
}
