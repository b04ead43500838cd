//! HLASM fixed-format source lexer.
//!
//! HLASM source format:
//! - **Column 1**: name field start (space = no name, `*` = comment,
//!   `.*` = conditional-assembly comment)
//! - **Column 10+**: operation code (free position after the name field)
//! - **Column 16+**: operand field
//! - **Column 72**: continuation character (non-blank = continued)
//! - **Columns 73-80**: sequence number (ignored)
//!
//! The lexer merges continuation lines and splits each logical line into
//! name / operation / operands / remarks, tracking the column range of each
//! field so diagnostics can point at the offending text.

use open_hlasm_lang_core::{FileId, Range};

// ---------------------------------------------------------------------------
//  Logical lines
// ---------------------------------------------------------------------------

/// One raw field of a logical line: its text and source range.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Field {
    pub text: String,
    pub range: Range,
}

impl Field {
    fn new(text: &str, line: usize, start_col: usize) -> Self {
        Self {
            text: text.to_string(),
            range: Range::in_line(line, start_col, start_col + text.len()),
        }
    }
}

/// A logical source line with continuations merged and fields split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// The file this line belongs to.
    pub file: FileId,
    /// 0-indexed number of the first raw line.
    pub line: usize,
    /// Name field (columns 1-n), empty text if absent.
    pub name: Field,
    /// Operation code field, empty text if absent.
    pub operation: Field,
    /// Operand field, empty text if absent.
    pub operands: Field,
    /// Trailing remarks.
    pub remarks: String,
}

// ---------------------------------------------------------------------------
//  Lexing
// ---------------------------------------------------------------------------

/// The continuation indicator column (0-indexed 71).
const CONTINUE_COL: usize = 71;
/// Continued lines resume at column 16 (0-indexed 15).
const CONTINUE_RESUME_COL: usize = 15;

/// Lex a complete source file into logical lines.
///
/// Comment lines (`*` or `.*` in column 1) and blank lines yield no logical
/// line. Continuations (non-blank column 72) are merged into the previous
/// line before field splitting.
pub fn lex_source(source: &str, file: FileId) -> Vec<LogicalLine> {
    let raw: Vec<&str> = source.lines().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < raw.len() {
        let line = raw[i];
        let first = i;

        if is_comment(line) || line.trim().is_empty() {
            i += 1;
            continue;
        }

        let mut logical = content_of(line).to_string();
        while i < raw.len() && is_continued(raw[i]) {
            i += 1;
            if i >= raw.len() {
                break;
            }
            let cont = raw[i];
            let resumed = if cont.len() > CONTINUE_RESUME_COL {
                &cont[CONTINUE_RESUME_COL..cont.len().min(CONTINUE_COL)]
            } else {
                ""
            };
            logical.push_str(resumed.trim_end());
        }
        i += 1;

        if let Some(fields) = split_fields(&logical, first, file) {
            out.push(fields);
        }
    }

    out
}

fn is_comment(line: &str) -> bool {
    line.starts_with('*') || line.starts_with(".*")
}

fn is_continued(line: &str) -> bool {
    line.len() > CONTINUE_COL && line.as_bytes()[CONTINUE_COL] != b' '
}

/// Meaningful content of a raw line: columns 1-71.
fn content_of(line: &str) -> &str {
    let end = line.len().min(CONTINUE_COL);
    (&line[..end]).trim_end()
}

/// Split a logical line into name / operation / operands / remarks.
fn split_fields(logical: &str, line: usize, file: FileId) -> Option<LogicalLine> {
    if logical.trim().is_empty() {
        return None;
    }

    // Name field: starts in column 1 if non-blank.
    let (name, after_name_col) = if logical.starts_with(' ') {
        (Field::new("", line, 0), 0)
    } else {
        let end = logical.find(' ').unwrap_or(logical.len());
        (Field::new(&logical[..end], line, 0), end)
    };

    let rest = &logical[after_name_col..];
    let op_off = rest.len() - rest.trim_start().len();
    let op_col = after_name_col + op_off;
    let rest = rest.trim_start();

    if rest.is_empty() {
        // Name-only line.
        return Some(LogicalLine {
            file,
            line,
            name,
            operation: Field::new("", line, op_col),
            operands: Field::new("", line, op_col),
            remarks: String::new(),
        });
    }

    let op_end = rest.find(' ').unwrap_or(rest.len());
    let operation = Field::new(&rest[..op_end], line, op_col);

    let after_op = &rest[op_end..];
    let operand_off = after_op.len() - after_op.trim_start().len();
    let operand_col = op_col + op_end + operand_off;
    let after_op = after_op.trim_start();

    let (operand_text, remarks) = split_operands_remarks(after_op);
    let operands = Field::new(operand_text, line, operand_col);

    Some(LogicalLine {
        file,
        line,
        name,
        operation,
        operands,
        remarks: remarks.trim().to_string(),
    })
}

/// The operand field ends at the first blank outside quotes and parentheses;
/// the remainder is remarks.
fn split_operands_remarks(text: &str) -> (&str, &str) {
    let chars: Vec<char> = text.chars().collect();
    let mut in_quotes = false;
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '\'' => {
                if in_quotes {
                    in_quotes = false;
                } else if !is_attr_quote(&chars, i) {
                    in_quotes = true;
                }
            }
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => depth = depth.saturating_sub(1),
            ' ' if !in_quotes && depth == 0 => {
                let byte: usize = chars[..i].iter().map(|c| c.len_utf8()).sum();
                return (&text[..byte], &text[byte..]);
            }
            _ => {}
        }
    }
    (text, "")
}

/// Whether the quote at index `i` introduces an attribute reference
/// (`L'X`, `T'&V`, ...) rather than a string.
///
/// The attribute letter must stand alone (not the tail of a longer name) and
/// the quote must be followed by a symbol or variable reference — nominal
/// values of the L/D/... data-definition types start with digits or signs
/// and therefore still read as strings.
fn is_attr_quote(chars: &[char], i: usize) -> bool {
    if i == 0 {
        return false;
    }
    let prev = chars[i - 1].to_ascii_uppercase();
    if !matches!(prev, 'L' | 'T' | 'S' | 'I' | 'D' | 'K' | 'N' | 'O') {
        return false;
    }
    if i >= 2 {
        let before = chars[i - 2];
        if before.is_ascii_alphanumeric() || matches!(before, '$' | '#' | '@' | '_') {
            return false;
        }
    }
    match chars.get(i + 1) {
        Some(&n) => n == '&' || n.is_ascii_alphabetic() || matches!(n, '$' | '#' | '@' | '_'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<LogicalLine> {
        lex_source(src, FileId::MAIN)
    }

    #[test]
    fn test_lex_simple_statement() {
        let lines = lex("LABEL    LR    1,2       load");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].name.text, "LABEL");
        assert_eq!(lines[0].operation.text, "LR");
        assert_eq!(lines[0].operands.text, "1,2");
        assert_eq!(lines[0].remarks, "load");
    }

    #[test]
    fn test_lex_no_name() {
        let lines = lex("         SETA  5");
        assert_eq!(lines[0].name.text, "");
        assert_eq!(lines[0].operation.text, "SETA");
        assert_eq!(lines[0].operands.text, "5");
    }

    #[test]
    fn test_lex_comment_lines_skipped() {
        let lines = lex("* a comment\n.* a CA comment\n         ANOP");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].operation.text, "ANOP");
        assert_eq!(lines[0].line, 2);
    }

    #[test]
    fn test_lex_blank_lines_skipped() {
        let lines = lex("\n   \n         ANOP");
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_lex_operand_with_quoted_blank() {
        let lines = lex("         DC    C'A B'    remark");
        assert_eq!(lines[0].operands.text, "C'A B'");
        assert_eq!(lines[0].remarks, "remark");
    }

    #[test]
    fn test_lex_operand_with_paren_blank() {
        let lines = lex("         AIF   (&A EQ 1).X");
        assert_eq!(lines[0].operands.text, "(&A EQ 1).X");
    }

    #[test]
    fn test_lex_continuation() {
        let first = format!("{:<71}X", "         DC    C'AB',");
        let src = format!("{first}\n               F'1'");
        let lines = lex(&src);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].operands.text, "C'AB',F'1'");
    }

    #[test]
    fn test_lex_field_ranges() {
        let lines = lex("LBL      ANOP");
        let l = &lines[0];
        assert_eq!(l.name.range, Range::in_line(0, 0, 3));
        assert_eq!(l.operation.range, Range::in_line(0, 9, 13));
    }

    #[test]
    fn test_lex_name_only_line() {
        let lines = lex(".HERE");
        assert_eq!(lines[0].name.text, ".HERE");
        assert_eq!(lines[0].operation.text, "");
    }
}
