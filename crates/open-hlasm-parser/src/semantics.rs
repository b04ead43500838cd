//! Statement model and statement-field parsing.
//!
//! A [`Statement`] is a logical source line with its name field classified
//! (ordinary label, variable symbol, sequence symbol, or empty) and its raw
//! operand text retained. Operands are parsed on demand according to the
//! instruction that consumes them:
//!
//! - [`parse_ca_operands`] — conditional-assembly operands
//!   (expressions, variable references, sequence symbols, `(expr).seq`
//!   branches)
//! - [`parse_operand_list`] — plain comma-separated operand strings
//!   (macro arguments, assembler operands)
//!
//! Deferred parsing matches the engine's substitution model: macro-body
//! statements are re-parsed through these entry points after variable
//! substitution.

use open_hlasm_lang_core::{FileId, Position, Range};

use crate::context::ids::{Id, IdStorage};
use crate::expressions::{self, CaExpr, VarSymRef};
use crate::lexer::LogicalLine;

// ---------------------------------------------------------------------------
//  Label field
// ---------------------------------------------------------------------------

/// The classified name field of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelField {
    /// No name.
    Empty,
    /// An ordinary assembler label.
    Ordinary { name: Id, range: Range },
    /// A variable symbol reference (assignment target or model label).
    Variable { sym: VarSymRef },
    /// A sequence symbol (`.NAME`).
    Sequence { name: Id, range: Range },
}

impl LabelField {
    /// Whether the field carries no name.
    pub fn is_empty(&self) -> bool {
        matches!(self, LabelField::Empty)
    }

    /// The range of the field, if present.
    pub fn range(&self) -> Option<Range> {
        match self {
            LabelField::Empty => None,
            LabelField::Ordinary { range, .. } | LabelField::Sequence { range, .. } => Some(*range),
            LabelField::Variable { sym } => Some(sym.range),
        }
    }
}

// ---------------------------------------------------------------------------
//  Statements
// ---------------------------------------------------------------------------

/// A parsed logical statement.
///
/// Operand text is kept raw; the consuming processor parses it according to
/// the instruction category (and re-parses after macro substitution).
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub file: FileId,
    /// 0-indexed first raw line of the statement.
    pub line: usize,
    /// Classified name field.
    pub label: LabelField,
    /// Raw name field text (used for macro-body re-parsing).
    pub label_text: String,
    pub label_range: Range,
    /// Interned instruction name; [`Id::EMPTY`] when the operation field is
    /// blank.
    pub instruction: Id,
    pub instruction_text: String,
    pub instruction_range: Range,
    /// Raw operand field text.
    pub operands_text: String,
    pub operands_range: Range,
    /// Range of the whole statement.
    pub range: Range,
}

impl Statement {
    /// Build a statement from a lexed logical line.
    pub fn from_line(line: &LogicalLine, ids: &mut IdStorage) -> Statement {
        build_statement(
            line.file,
            line.line,
            &line.name.text,
            line.name.range,
            &line.operation.text,
            line.operation.range,
            &line.operands.text,
            line.operands.range,
            ids,
        )
    }

    /// Re-parse statement fields after macro substitution.
    ///
    /// The label keeps its raw (unsubstituted) text; instruction and operand
    /// fields carry the substituted text.
    pub fn reparse(&self, instruction_text: &str, operands_text: &str, ids: &mut IdStorage) -> Statement {
        build_statement(
            self.file,
            self.line,
            &self.label_text,
            self.label_range,
            instruction_text,
            self.instruction_range,
            operands_text,
            self.operands_range,
            ids,
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn build_statement(
    file: FileId,
    line: usize,
    label_text: &str,
    label_range: Range,
    instruction_text: &str,
    instruction_range: Range,
    operands_text: &str,
    operands_range: Range,
    ids: &mut IdStorage,
) -> Statement {
    let label = parse_label(label_text, label_range, ids);
    let instruction = if instruction_text.is_empty() {
        Id::EMPTY
    } else {
        ids.add(instruction_text)
    };
    let range = label_range.extend(instruction_range).extend(operands_range);
    Statement {
        file,
        line,
        label,
        label_text: label_text.to_string(),
        label_range,
        instruction,
        instruction_text: instruction_text.to_string(),
        instruction_range,
        operands_text: operands_text.to_string(),
        operands_range,
        range,
    }
}

/// Classify a raw name field.
pub fn parse_label(text: &str, range: Range, ids: &mut IdStorage) -> LabelField {
    if text.is_empty() {
        return LabelField::Empty;
    }
    if let Some(seq) = text.strip_prefix('.') {
        return LabelField::Sequence {
            name: ids.add(seq),
            range,
        };
    }
    if text.starts_with('&') {
        match expressions::parse_variable_ref(text, range.start, ids) {
            Ok(sym) => return LabelField::Variable { sym },
            Err(_) => {
                // Malformed variable label: fall through to ordinary so the
                // consumer can diagnose the field kind.
            }
        }
    }
    LabelField::Ordinary {
        name: ids.add(text),
        range,
    }
}

// ---------------------------------------------------------------------------
//  CA operands
// ---------------------------------------------------------------------------

/// A parsed conditional-assembly operand.
#[derive(Debug, Clone, PartialEq)]
pub enum CaOperand {
    /// Nothing between two commas (or a trailing comma).
    Empty { range: Range },
    /// A general CA expression.
    Expr { expr: CaExpr, range: Range },
    /// A lone variable-symbol reference.
    Var { sym: VarSymRef, range: Range },
    /// A sequence symbol (`.NAME`).
    Seq { name: Id, range: Range },
    /// A `(condition).target` branch operand.
    Branch {
        condition: CaExpr,
        target: Id,
        target_range: Range,
        range: Range,
    },
    /// Operand text that failed to parse; carries the parse error text.
    Invalid { message: String, range: Range },
}

impl CaOperand {
    /// The operand's source range.
    pub fn range(&self) -> Range {
        match self {
            CaOperand::Empty { range }
            | CaOperand::Expr { range, .. }
            | CaOperand::Var { range, .. }
            | CaOperand::Seq { range, .. }
            | CaOperand::Branch { range, .. }
            | CaOperand::Invalid { range, .. } => *range,
        }
    }
}

/// Parse a CA operand field into classified operands.
pub fn parse_ca_operands(text: &str, base: Position, ids: &mut IdStorage) -> Vec<CaOperand> {
    split_operands(text, base)
        .into_iter()
        .map(|(piece, range)| classify_ca_operand(piece, range, ids))
        .collect()
}

fn classify_ca_operand(piece: &str, range: Range, ids: &mut IdStorage) -> CaOperand {
    let trimmed = piece.trim();
    if trimmed.is_empty() {
        return CaOperand::Empty { range };
    }

    if let Some(seq) = trimmed.strip_prefix('.') {
        if !seq.is_empty() && seq.chars().all(is_name_char) {
            return CaOperand::Seq {
                name: ids.add(seq),
                range,
            };
        }
    }

    // `(expr).target` branch form.
    if trimmed.starts_with('(') {
        if let Some((cond_text, target)) = split_branch(trimmed) {
            let cond_base = Position::new(range.start.line, range.start.column + 1);
            let target_start = range.start.column + cond_text.len() + 3;
            let target_range = Range::in_line(
                range.start.line,
                target_start,
                target_start + target.len(),
            );
            match expressions::parse_expression(cond_text, cond_base, ids) {
                Ok(condition) => {
                    return CaOperand::Branch {
                        condition,
                        target: ids.add(target),
                        target_range,
                        range,
                    };
                }
                Err(e) => {
                    return CaOperand::Invalid {
                        message: e.to_string(),
                        range,
                    };
                }
            }
        }
    }

    if trimmed.starts_with('&') {
        if let Ok(sym) = expressions::parse_variable_ref(trimmed, range.start, ids) {
            return CaOperand::Var { sym, range };
        }
    }

    match expressions::parse_expression(trimmed, range.start, ids) {
        Ok(expr) => CaOperand::Expr { expr, range },
        Err(e) => CaOperand::Invalid {
            message: e.to_string(),
            range,
        },
    }
}

/// Split `(cond).TARGET` into the condition text and target name.
fn split_branch(text: &str) -> Option<(&str, &str)> {
    debug_assert!(text.starts_with('('));
    let mut depth = 0usize;
    let mut in_quotes = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth -= 1;
                if depth == 0 {
                    let rest = &text[i + 1..];
                    let target = rest.strip_prefix('.')?;
                    if !target.is_empty() && target.chars().all(is_name_char) {
                        return Some((&text[1..i], target));
                    }
                    return None;
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
//  Plain operand lists
// ---------------------------------------------------------------------------

/// Split an operand field on top-level commas, respecting quotes and parens.
/// Returns each piece with its range; empty pieces are kept.
pub fn split_operands(text: &str, base: Position) -> Vec<(&str, Range)> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut start = 0usize;
    let bytes = text.as_bytes();
    let mut prev = b'\0';
    for i in 0..bytes.len() {
        let c = bytes[i] as char;
        match c {
            '\'' => {
                if in_quotes {
                    in_quotes = false;
                } else if !is_attr_quote_at(prev, bytes.get(i + 1).copied()) {
                    in_quotes = true;
                }
            }
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => depth = depth.saturating_sub(1),
            ',' if !in_quotes && depth == 0 => {
                out.push(piece(text, base, start, i));
                start = i + 1;
            }
            _ => {}
        }
        prev = bytes[i];
    }
    out.push(piece(text, base, start, bytes.len()));
    out
}

fn piece(text: &str, base: Position, start: usize, end: usize) -> (&str, Range) {
    (
        &text[start..end],
        Range::in_line(base.line, base.column + start, base.column + end),
    )
}

fn is_attr_quote_at(prev: u8, next: Option<u8>) -> bool {
    let prev = (prev as char).to_ascii_uppercase();
    if !matches!(prev, 'L' | 'T' | 'S' | 'I' | 'D' | 'K' | 'N' | 'O') {
        return false;
    }
    match next {
        Some(n) => {
            let n = n as char;
            n == '&' || n.is_ascii_alphabetic()
        }
        None => false,
    }
}

/// Parse a plain operand list into trimmed strings with ranges.
pub fn parse_operand_list(text: &str, base: Position) -> Vec<(String, Range)> {
    split_operands(text, base)
        .into_iter()
        .map(|(s, r)| (s.trim().to_string(), r))
        .collect()
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '$' | '#' | '@' | '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex_source;

    fn stmt(src: &str) -> (Statement, IdStorage) {
        let mut ids = IdStorage::new();
        let lines = lex_source(src, FileId::MAIN);
        let s = Statement::from_line(&lines[0], &mut ids);
        (s, ids)
    }

    #[test]
    fn test_label_classification() {
        let (s, _) = stmt("LABEL    ANOP");
        assert!(matches!(s.label, LabelField::Ordinary { .. }));

        let (s, _) = stmt(".SEQ     ANOP");
        assert!(matches!(s.label, LabelField::Sequence { .. }));

        let (s, _) = stmt("&VAR     SETA  1");
        assert!(matches!(s.label, LabelField::Variable { .. }));

        let (s, _) = stmt("         ANOP");
        assert!(s.label.is_empty());
    }

    #[test]
    fn test_variable_label_with_subscript() {
        let (s, ids) = stmt("&ARR(3)  SETA  1");
        match s.label {
            LabelField::Variable { sym } => {
                assert_eq!(ids.text_of(sym.name), "ARR");
                assert_eq!(sym.subscript.len(), 1);
            }
            other => panic!("expected variable label, got {other:?}"),
        }
    }

    #[test]
    fn test_instruction_interned_uppercase() {
        let (s, ids) = stmt("         seta  1");
        assert_eq!(ids.text_of(s.instruction), "SETA");
    }

    #[test]
    fn test_ca_operands_seq_and_branch() {
        let mut ids = IdStorage::new();
        let ops = parse_ca_operands("(2).L1,.L2,.L3", Position::default(), &mut ids);
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[0], CaOperand::Branch { .. }));
        assert!(matches!(ops[1], CaOperand::Seq { .. }));
        assert!(matches!(ops[2], CaOperand::Seq { .. }));
    }

    #[test]
    fn test_ca_operands_branch_with_condition() {
        let mut ids = IdStorage::new();
        let ops = parse_ca_operands("(&I LT 5).LOOP", Position::default(), &mut ids);
        match &ops[0] {
            CaOperand::Branch { target, .. } => {
                assert_eq!(ids.text_of(*target), "LOOP");
            }
            other => panic!("expected branch, got {other:?}"),
        }
    }

    #[test]
    fn test_ca_operands_empty_kept() {
        let mut ids = IdStorage::new();
        let ops = parse_ca_operands("(&A EQ 1).X,", Position::default(), &mut ids);
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[1], CaOperand::Empty { .. }));
    }

    #[test]
    fn test_ca_operands_var() {
        let mut ids = IdStorage::new();
        let ops = parse_ca_operands("&X", Position::default(), &mut ids);
        assert!(matches!(ops[0], CaOperand::Var { .. }));
    }

    #[test]
    fn test_split_operands_respects_quotes_and_parens() {
        let pieces = split_operands("C'A,B',F'1',A(X,Y)", Position::default());
        let texts: Vec<&str> = pieces.iter().map(|(s, _)| *s).collect();
        assert_eq!(texts, vec!["C'A,B'", "F'1'", "A(X,Y)"]);
    }

    #[test]
    fn test_split_operands_attr_quote() {
        // The quote in L'X must not open a string.
        let pieces = split_operands("L'X,1", Position::default());
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].0, "L'X");
    }

    #[test]
    fn test_reparse_after_substitution() {
        let (s, mut ids) = stmt("&L       MVC   &A,&B");
        let re = s.reparse("MVC", "FLD1,FLD2", &mut ids);
        assert_eq!(re.operands_text, "FLD1,FLD2");
        assert!(matches!(re.label, LabelField::Variable { .. }));
    }
}
