//! Conditional-assembly expression trees.
//!
//! CA operands (`SETA`/`SETB`/`SETC` values, `AIF` conditions, `AGO` branch
//! selectors, variable subscripts) are parsed into [`CaExpr`] trees here and
//! evaluated against the assembly context by the [`crate::evaluator`] module.
//!
//! Grammar (loosest to tightest binding):
//!
//! ```text
//! or    := and (OR and)*
//! and   := rel (AND rel)*
//! rel   := add ((EQ|NE|LT|GT|LE|GE) add)?
//! add   := mul (('+'|'-') mul)*
//! mul   := unary (('*'|'/') unary)*
//! unary := ('+'|'-'|NOT)? primary
//! ```
//!
//! Primaries: decimal numbers, self-defining terms (`X'1F'`, `B'101'`,
//! `C'A'`), quoted strings with embedded variable references, variable
//! symbols (`&NAME`, `&NAME(subscript)`), attribute references (`L'SYM`,
//! `T'&VAR`, ...), ordinary symbol names, and parenthesized subexpressions.

use open_hlasm_lang_core::{Position, Range};

use crate::context::ids::{Id, IdStorage};

// ---------------------------------------------------------------------------
//  Errors
// ---------------------------------------------------------------------------

/// Hard parse failure of a CA expression.
///
/// Converted into a `CE004` diagnostic at the statement that contains the
/// expression; the statement is then skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum ExprError {
    /// The expression ended where a term or operator was expected.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// An unparseable token was found.
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    /// A string literal or self-defining term is missing its closing quote.
    #[error("unterminated string")]
    UnterminatedString,

    /// A self-defining term or number does not fit its value space.
    #[error("invalid term '{0}'")]
    InvalidTerm(String),
}

// ---------------------------------------------------------------------------
//  Expression tree
// ---------------------------------------------------------------------------

/// Reference to a variable symbol, e.g. `&I` or `&ARR(&N+1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarSymRef {
    /// Interned (uppercased) name, without the leading `&`.
    pub name: Id,
    /// Subscript expressions; empty for a scalar reference.
    pub subscript: Vec<CaExpr>,
    /// Range of the whole reference.
    pub range: Range,
}

/// Target of an attribute reference (`L'X` vs `L'&V`).
#[derive(Debug, Clone, PartialEq)]
pub enum AttrTarget {
    /// An ordinary symbol name.
    Symbol(Id, Range),
    /// A variable symbol whose value names the symbol.
    Var(VarSymRef),
}

/// One piece of a character literal: literal text or an embedded variable.
#[derive(Debug, Clone, PartialEq)]
pub enum StrPart {
    Lit(String),
    Var(VarSymRef),
}

/// Binary operators of CA expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

/// Unary operators of CA expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

/// A parsed CA expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CaExpr {
    /// Decimal number or self-defining term.
    Num { value: i32, range: Range },
    /// Quoted character literal, possibly with embedded variable references.
    Str { parts: Vec<StrPart>, range: Range },
    /// Variable symbol reference.
    Var(VarSymRef),
    /// Ordinary symbol term (meaningful in assembler expressions, e.g. EQU).
    Symbol { name: Id, range: Range },
    /// The location counter reference `*` (assembler expressions only).
    LocCounter { range: Range },
    /// Attribute reference such as `L'SYM` or `T'&VAR`.
    Attr {
        attr: char,
        target: AttrTarget,
        range: Range,
    },
    Unary {
        op: UnOp,
        expr: Box<CaExpr>,
        range: Range,
    },
    Binary {
        op: BinOp,
        lhs: Box<CaExpr>,
        rhs: Box<CaExpr>,
        range: Range,
    },
}

impl CaExpr {
    /// The source range covered by this node.
    pub fn range(&self) -> Range {
        match self {
            CaExpr::Num { range, .. }
            | CaExpr::Str { range, .. }
            | CaExpr::Symbol { range, .. }
            | CaExpr::LocCounter { range }
            | CaExpr::Attr { range, .. }
            | CaExpr::Unary { range, .. }
            | CaExpr::Binary { range, .. } => *range,
            CaExpr::Var(v) => v.range,
        }
    }

    /// Collect ordinary symbols referenced through data attributes
    /// (`L'`, `T'`, `S'`, `I'`, `D'`). Used to drive attribute lookahead.
    pub fn collect_attr_symbols(&self, out: &mut Vec<(Id, Range)>) {
        match self {
            CaExpr::Attr {
                attr,
                target: AttrTarget::Symbol(name, range),
                ..
            } if matches!(attr, 'L' | 'T' | 'S' | 'I' | 'D') => {
                out.push((*name, *range));
            }
            CaExpr::Unary { expr, .. } => expr.collect_attr_symbols(out),
            CaExpr::Binary { lhs, rhs, .. } => {
                lhs.collect_attr_symbols(out);
                rhs.collect_attr_symbols(out);
            }
            CaExpr::Var(v) => {
                for sub in &v.subscript {
                    sub.collect_attr_symbols(out);
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
//  Parser
// ---------------------------------------------------------------------------

/// Parse a complete CA expression; the whole input must be consumed.
pub fn parse_expression(
    text: &str,
    base: Position,
    ids: &mut IdStorage,
) -> Result<CaExpr, ExprError> {
    let mut s = Scanner::new(text, base);
    let expr = parse_or(&mut s, ids)?;
    s.skip_blanks();
    if !s.at_end() {
        return Err(ExprError::UnexpectedToken(s.rest().to_string()));
    }
    Ok(expr)
}

/// Parse a complete variable symbol reference (`&NAME` or `&NAME(sub,...)`);
/// the whole input must be consumed.
pub fn parse_variable_ref(
    text: &str,
    base: Position,
    ids: &mut IdStorage,
) -> Result<VarSymRef, ExprError> {
    let mut s = Scanner::new(text, base);
    s.skip_blanks();
    if !s.eat('&') {
        return Err(ExprError::UnexpectedToken(s.rest().to_string()));
    }
    let var = parse_var_after_amp(&mut s, ids)?;
    if !s.at_end() {
        return Err(ExprError::UnexpectedToken(s.rest().to_string()));
    }
    Ok(var)
}

struct Scanner<'a> {
    chars: Vec<char>,
    pos: usize,
    base: Position,
    text: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str, base: Position) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            base,
            text,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, off: usize) -> Option<char> {
        self.chars.get(self.pos + off).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_blanks(&mut self) {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
    }

    fn here(&self) -> Position {
        Position::new(self.base.line, self.base.column + self.pos)
    }

    fn range_from(&self, start: Position) -> Range {
        Range::new(start, self.here())
    }

    fn rest(&self) -> &str {
        let taken: usize = self.chars[..self.pos].iter().map(|c| c.len_utf8()).sum();
        &self.text[taken..]
    }

    /// Peek the alphanumeric word at the cursor without consuming it.
    fn peek_word(&self) -> Option<String> {
        let c = self.peek()?;
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let mut word = String::new();
        let mut off = 0;
        while let Some(c) = self.peek_at(off) {
            if c.is_ascii_alphanumeric() {
                word.push(c.to_ascii_uppercase());
                off += 1;
            } else {
                break;
            }
        }
        Some(word)
    }

    fn consume_word(&mut self, word: &str) {
        self.pos += word.len();
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '$' | '#' | '@' | '_')
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '$' | '#' | '@' | '_')
}

fn parse_or(s: &mut Scanner, ids: &mut IdStorage) -> Result<CaExpr, ExprError> {
    let mut lhs = parse_and(s, ids)?;
    loop {
        s.skip_blanks();
        match s.peek_word().as_deref() {
            Some("OR") => {
                s.consume_word("OR");
                let rhs = parse_and(s, ids)?;
                lhs = binary(BinOp::Or, lhs, rhs);
            }
            _ => return Ok(lhs),
        }
    }
}

fn parse_and(s: &mut Scanner, ids: &mut IdStorage) -> Result<CaExpr, ExprError> {
    let mut lhs = parse_rel(s, ids)?;
    loop {
        s.skip_blanks();
        match s.peek_word().as_deref() {
            Some("AND") => {
                s.consume_word("AND");
                let rhs = parse_rel(s, ids)?;
                lhs = binary(BinOp::And, lhs, rhs);
            }
            _ => return Ok(lhs),
        }
    }
}

fn parse_rel(s: &mut Scanner, ids: &mut IdStorage) -> Result<CaExpr, ExprError> {
    let lhs = parse_add(s, ids)?;
    s.skip_blanks();
    let word = s.peek_word();
    let op = match word.as_deref() {
        Some("EQ") => BinOp::Eq,
        Some("NE") => BinOp::Ne,
        Some("LT") => BinOp::Lt,
        Some("GT") => BinOp::Gt,
        Some("LE") => BinOp::Le,
        Some("GE") => BinOp::Ge,
        _ => return Ok(lhs),
    };
    s.consume_word(word.as_deref().unwrap_or_default());
    let rhs = parse_add(s, ids)?;
    Ok(binary(op, lhs, rhs))
}

fn parse_add(s: &mut Scanner, ids: &mut IdStorage) -> Result<CaExpr, ExprError> {
    let mut lhs = parse_mul(s, ids)?;
    loop {
        s.skip_blanks();
        if s.eat('+') {
            let rhs = parse_mul(s, ids)?;
            lhs = binary(BinOp::Add, lhs, rhs);
        } else if s.eat('-') {
            let rhs = parse_mul(s, ids)?;
            lhs = binary(BinOp::Sub, lhs, rhs);
        } else {
            return Ok(lhs);
        }
    }
}

fn parse_mul(s: &mut Scanner, ids: &mut IdStorage) -> Result<CaExpr, ExprError> {
    let mut lhs = parse_unary(s, ids)?;
    loop {
        s.skip_blanks();
        if s.eat('*') {
            let rhs = parse_unary(s, ids)?;
            lhs = binary(BinOp::Mul, lhs, rhs);
        } else if s.eat('/') {
            let rhs = parse_unary(s, ids)?;
            lhs = binary(BinOp::Div, lhs, rhs);
        } else {
            return Ok(lhs);
        }
    }
}

fn parse_unary(s: &mut Scanner, ids: &mut IdStorage) -> Result<CaExpr, ExprError> {
    s.skip_blanks();
    let start = s.here();
    if s.eat('+') {
        return parse_primary(s, ids);
    }
    if s.eat('-') {
        let expr = parse_primary(s, ids)?;
        let range = start_to(start, expr.range());
        return Ok(CaExpr::Unary {
            op: UnOp::Neg,
            expr: Box::new(expr),
            range,
        });
    }
    if s.peek_word().as_deref() == Some("NOT") {
        s.consume_word("NOT");
        let expr = parse_unary(s, ids)?;
        let range = start_to(start, expr.range());
        return Ok(CaExpr::Unary {
            op: UnOp::Not,
            expr: Box::new(expr),
            range,
        });
    }
    parse_primary(s, ids)
}

fn parse_primary(s: &mut Scanner, ids: &mut IdStorage) -> Result<CaExpr, ExprError> {
    s.skip_blanks();
    let start = s.here();
    let c = s.peek().ok_or(ExprError::UnexpectedEnd)?;

    if c == '(' {
        s.bump();
        let inner = parse_or(s, ids)?;
        s.skip_blanks();
        if !s.eat(')') {
            return Err(ExprError::UnexpectedToken(s.rest().to_string()));
        }
        return Ok(inner);
    }

    if c == '*' {
        s.bump();
        return Ok(CaExpr::LocCounter {
            range: s.range_from(start),
        });
    }

    if c == '&' {
        s.bump();
        let var = parse_var_after_amp(s, ids)?;
        return Ok(CaExpr::Var(var));
    }

    if c.is_ascii_digit() {
        let mut digits = String::new();
        while let Some(d) = s.peek() {
            if d.is_ascii_digit() {
                digits.push(d);
                s.bump();
            } else {
                break;
            }
        }
        let value: i32 = digits
            .parse()
            .map_err(|_| ExprError::InvalidTerm(digits.clone()))?;
        return Ok(CaExpr::Num {
            value,
            range: s.range_from(start),
        });
    }

    if c == '\'' {
        let parts = parse_string_body(s, ids)?;
        return Ok(CaExpr::Str {
            parts,
            range: s.range_from(start),
        });
    }

    if is_name_start(c) {
        // Self-defining term (X'..'/B'..'/C'..') or attribute reference
        // (L'SYM etc.); the introducing letters are disjoint sets.
        if s.peek_at(1) == Some('\'') {
            let letter = c.to_ascii_uppercase();
            if matches!(letter, 'X' | 'B' | 'C') {
                s.bump();
                s.bump();
                return parse_self_defining(s, letter, start);
            }
            if matches!(letter, 'L' | 'T' | 'S' | 'I' | 'D' | 'K' | 'N' | 'O') {
                s.bump();
                s.bump();
                return parse_attribute(s, ids, letter, start);
            }
        }
        let mut name = String::new();
        while let Some(nc) = s.peek() {
            if is_name_char(nc) {
                name.push(nc);
                s.bump();
            } else {
                break;
            }
        }
        return Ok(CaExpr::Symbol {
            name: ids.add(&name),
            range: s.range_from(start),
        });
    }

    Err(ExprError::UnexpectedToken(s.rest().to_string()))
}

/// Variable reference with the leading `&` already consumed.
fn parse_var_after_amp(s: &mut Scanner, ids: &mut IdStorage) -> Result<VarSymRef, ExprError> {
    let start = Position::new(s.base.line, s.here().column.saturating_sub(1));
    let mut name = String::new();
    match s.peek() {
        Some(c) if is_name_start(c) => {}
        _ => return Err(ExprError::UnexpectedToken(s.rest().to_string())),
    }
    while let Some(c) = s.peek() {
        if is_name_char(c) {
            name.push(c);
            s.bump();
        } else {
            break;
        }
    }
    let mut subscript = Vec::new();
    if s.peek() == Some('(') {
        s.bump();
        loop {
            subscript.push(parse_or(s, ids)?);
            s.skip_blanks();
            if s.eat(',') {
                continue;
            }
            if s.eat(')') {
                break;
            }
            return Err(ExprError::UnexpectedToken(s.rest().to_string()));
        }
    }
    Ok(VarSymRef {
        name: ids.add(&name),
        subscript,
        range: s.range_from(start),
    })
}

/// Body of a quoted string, cursor on the opening quote.
fn parse_string_body(s: &mut Scanner, ids: &mut IdStorage) -> Result<Vec<StrPart>, ExprError> {
    debug_assert_eq!(s.peek(), Some('\''));
    s.bump();
    let mut parts = Vec::new();
    let mut lit = String::new();
    loop {
        match s.bump() {
            None => return Err(ExprError::UnterminatedString),
            Some('\'') => {
                if s.peek() == Some('\'') {
                    s.bump();
                    lit.push('\'');
                } else {
                    break;
                }
            }
            Some('&') => {
                if s.peek() == Some('&') {
                    s.bump();
                    lit.push('&');
                } else {
                    if !lit.is_empty() {
                        parts.push(StrPart::Lit(std::mem::take(&mut lit)));
                    }
                    let var = parse_var_after_amp(s, ids)?;
                    // A dot after a variable reference is the concatenation
                    // marker; it is consumed, not part of the text.
                    s.eat('.');
                    parts.push(StrPart::Var(var));
                }
            }
            Some(c) => lit.push(c),
        }
    }
    if !lit.is_empty() {
        parts.push(StrPart::Lit(lit));
    }
    Ok(parts)
}

/// Self-defining term with the letter and quote consumed.
fn parse_self_defining(s: &mut Scanner, letter: char, start: Position) -> Result<CaExpr, ExprError> {
    let mut body = String::new();
    loop {
        match s.bump() {
            None => return Err(ExprError::UnterminatedString),
            Some('\'') => break,
            Some(c) => body.push(c),
        }
    }
    let value = match letter {
        'X' => i64::from_str_radix(&body, 16).map_err(|_| ExprError::InvalidTerm(body.clone()))?,
        'B' => i64::from_str_radix(&body, 2).map_err(|_| ExprError::InvalidTerm(body.clone()))?,
        // Character term: fold bytes big-endian, at most four characters.
        'C' => {
            if body.len() > 4 {
                return Err(ExprError::InvalidTerm(body));
            }
            body.bytes().fold(0i64, |acc, b| (acc << 8) | b as i64)
        }
        _ => unreachable!("self-defining letter checked by caller"),
    };
    if value > u32::MAX as i64 {
        return Err(ExprError::InvalidTerm(body));
    }
    Ok(CaExpr::Num {
        value: value as u32 as i32,
        range: s.range_from(start),
    })
}

/// Attribute reference with the letter and quote consumed.
fn parse_attribute(
    s: &mut Scanner,
    ids: &mut IdStorage,
    attr: char,
    start: Position,
) -> Result<CaExpr, ExprError> {
    if s.peek() == Some('&') {
        s.bump();
        let var = parse_var_after_amp(s, ids)?;
        let range = s.range_from(start);
        return Ok(CaExpr::Attr {
            attr,
            target: AttrTarget::Var(var),
            range,
        });
    }
    let name_start = s.here();
    let mut name = String::new();
    match s.peek() {
        Some(c) if is_name_start(c) => {}
        _ => return Err(ExprError::UnexpectedToken(s.rest().to_string())),
    }
    while let Some(c) = s.peek() {
        if is_name_char(c) {
            name.push(c);
            s.bump();
        } else {
            break;
        }
    }
    let name_range = s.range_from(name_start);
    let range = s.range_from(start);
    Ok(CaExpr::Attr {
        attr,
        target: AttrTarget::Symbol(ids.add(&name), name_range),
        range,
    })
}

fn binary(op: BinOp, lhs: CaExpr, rhs: CaExpr) -> CaExpr {
    let range = lhs.range().extend(rhs.range());
    CaExpr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        range,
    }
}

fn start_to(start: Position, inner: Range) -> Range {
    Range::new(start, inner.end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> CaExpr {
        let mut ids = IdStorage::new();
        parse_expression(text, Position::default(), &mut ids).unwrap()
    }

    #[test]
    fn test_parse_number() {
        match parse("42") {
            CaExpr::Num { value, .. } => assert_eq!(value, 42),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_precedence() {
        // 2+3*4 parses as 2+(3*4).
        match parse("2+3*4") {
            CaExpr::Binary { op: BinOp::Add, rhs, .. } => match *rhs {
                CaExpr::Binary { op: BinOp::Mul, .. } => {}
                other => panic!("expected multiplication on the right, got {other:?}"),
            },
            other => panic!("expected addition, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_parenthesized() {
        match parse("(2+3)*4") {
            CaExpr::Binary { op: BinOp::Mul, lhs, .. } => match *lhs {
                CaExpr::Binary { op: BinOp::Add, .. } => {}
                other => panic!("expected addition on the left, got {other:?}"),
            },
            other => panic!("expected multiplication, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_var_with_subscript() {
        match parse("&ARR(2)") {
            CaExpr::Var(v) => assert_eq!(v.subscript.len(), 1),
            other => panic!("expected variable, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_relation_keywords() {
        match parse("&I LT 5") {
            CaExpr::Binary { op: BinOp::Lt, .. } => {}
            other => panic!("expected LT relation, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_logical() {
        match parse("&A EQ 1 AND &B EQ 2") {
            CaExpr::Binary { op: BinOp::And, .. } => {}
            other => panic!("expected AND, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_not() {
        match parse("NOT (&A EQ 1)") {
            CaExpr::Unary { op: UnOp::Not, .. } => {}
            other => panic!("expected NOT, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_self_defining_terms() {
        match parse("X'FF'") {
            CaExpr::Num { value, .. } => assert_eq!(value, 255),
            other => panic!("expected number, got {other:?}"),
        }
        match parse("B'101'") {
            CaExpr::Num { value, .. } => assert_eq!(value, 5),
            other => panic!("expected number, got {other:?}"),
        }
        match parse("C'A'") {
            CaExpr::Num { value, .. } => assert_eq!(value, 65),
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_attribute_reference() {
        match parse("L'FIELD") {
            CaExpr::Attr { attr: 'L', target: AttrTarget::Symbol(..), .. } => {}
            other => panic!("expected attribute, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_string_with_var() {
        match parse("'AB&X.C'") {
            CaExpr::Str { parts, .. } => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(parts[0], StrPart::Lit(ref s) if s == "AB"));
                assert!(matches!(parts[1], StrPart::Var(_)));
                assert!(matches!(parts[2], StrPart::Lit(ref s) if s == "C"));
            }
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_string_quote_escape() {
        match parse("'IT''S'") {
            CaExpr::Str { parts, .. } => {
                assert!(matches!(parts[0], StrPart::Lit(ref s) if s == "IT'S"));
            }
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_trailing_garbage_rejected() {
        let mut ids = IdStorage::new();
        assert!(parse_expression("1 2", Position::default(), &mut ids).is_err());
    }

    #[test]
    fn test_parse_unterminated_string() {
        let mut ids = IdStorage::new();
        assert_eq!(
            parse_expression("'ABC", Position::default(), &mut ids),
            Err(ExprError::UnterminatedString)
        );
    }

    #[test]
    fn test_parse_variable_ref_entry() {
        let mut ids = IdStorage::new();
        let v = parse_variable_ref("&ARR(1,2)", Position::default(), &mut ids).unwrap();
        assert_eq!(v.subscript.len(), 2);
        assert_eq!(ids.text_of(v.name), "ARR");
    }

    #[test]
    fn test_collect_attr_symbols() {
        let mut ids = IdStorage::new();
        let e = parse_expression("L'FLD+T'OTHER", Position::default(), &mut ids).unwrap();
        let mut refs = Vec::new();
        e.collect_attr_symbols(&mut refs);
        assert_eq!(refs.len(), 2);
    }
}
