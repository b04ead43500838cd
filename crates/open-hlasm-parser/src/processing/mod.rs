//! The statement-processing pipeline.
//!
//! Statements flow from *providers* (macro body, COPY member, opencode file)
//! to *processors* (ordinary, macro-definition capture, COPY capture,
//! lookahead, empty) under the control of the [`manager::ProcessingManager`].
//!
//! Processors cannot hold references back into the manager; instead a
//! processor returns [`ProcessingRequest`]s which the manager applies after
//! the statement handler returns. A newly pushed processor is picked up on
//! the next iteration of the drive loop, which preserves the reentrant
//! call-back semantics without cyclic references.

pub mod ca_processor;
pub mod copy_processor;
pub mod empty_processor;
pub mod lookahead_processor;
pub mod macrodef_processor;
pub mod manager;
pub mod ordinary_processor;
pub mod processor;
pub mod provider;

use open_hlasm_lang_core::{FileId, Location, Range};

use crate::context::ids::Id;
use crate::context::{AsmContext, WellKnownIds};
use crate::diags::DiagnosticSink;
use crate::evaluator;
use crate::expressions;
use crate::semantics::Statement;

pub use manager::ProcessingManager;
pub use processor::{Processor, StatementProcessor};
pub use provider::{CopyProvider, MacroProvider, OpencodeProvider, ProviderKind, StatementProvider};

// ---------------------------------------------------------------------------
//  Requests
// ---------------------------------------------------------------------------

/// An action a processor asks the manager to perform after the current
/// statement.
#[derive(Debug)]
pub enum ProcessingRequest {
    /// Register a sequence symbol at the current statement.
    RegisterSequenceSymbol { name: Id, location: Location },
    /// Perform a CA jump to a sequence symbol.
    Jump { target: Id, location: Location },
    /// Begin macro-definition capture (`MACRO`).
    StartMacroDefinition { location: Location },
    /// Include a COPY member.
    StartCopy {
        member: Id,
        range: Range,
        file: FileId,
    },
    /// Resolve an unknown operation code as an external macro and invoke it.
    ExternalMacroCall { stmt: Statement },
    /// `END` — stop consuming opencode statements.
    EndAssembly,
}

/// Whether `id` is one of the conditional-assembly instructions.
pub fn is_ca_instruction(wk: &WellKnownIds, id: Id) -> bool {
    id == wk.seta
        || id == wk.setb
        || id == wk.setc
        || id == wk.lcla
        || id == wk.lclb
        || id == wk.lclc
        || id == wk.gbla
        || id == wk.gblb
        || id == wk.gblc
        || id == wk.anop
        || id == wk.actr
        || id == wk.ago
        || id == wk.aif
        || id == wk.r#macro
        || id == wk.mend
        || id == wk.mexit
        || id == wk.aread
        || id == wk.aspace
        || id == wk.aeject
        || id.is_empty()
}

// ---------------------------------------------------------------------------
//  Variable substitution
// ---------------------------------------------------------------------------

/// Substitute variable symbols in a text field with their current values.
///
/// Used when fetching macro-body statements (instruction and operand fields
/// of non-CA statements) and when binding macro arguments. Unknown variables
/// are left verbatim so that CA evaluation can diagnose them later. `&&`
/// stays untouched (it is the escaped ampersand), and the concatenation dot
/// after a substituted reference is consumed.
pub fn substitute_variables(text: &str, ctx: &AsmContext, sink: &mut DiagnosticSink) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0usize;

    while i < chars.len() {
        if chars[i] != '&' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        if chars.get(i + 1) == Some(&'&') {
            out.push_str("&&");
            i += 2;
            continue;
        }

        // Read the variable name.
        let name_start = i + 1;
        let mut j = name_start;
        while j < chars.len() && is_name_char(chars[j]) {
            j += 1;
        }
        if j == name_start {
            out.push('&');
            i += 1;
            continue;
        }
        let name: String = chars[name_start..j].iter().collect();

        // Optional subscript.
        let mut subscript_text = None;
        let mut k = j;
        if chars.get(k) == Some(&'(') {
            let mut depth = 0usize;
            let sub_start = k + 1;
            let mut end = None;
            while k < chars.len() {
                match chars[k] {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            end = Some(k);
                            break;
                        }
                    }
                    _ => {}
                }
                k += 1;
            }
            if let Some(end) = end {
                subscript_text = Some(chars[sub_start..end].iter().collect::<String>());
                k = end + 1;
            } else {
                k = j;
            }
        }

        let id = ctx.ids.find(&name);
        let var = id.and_then(|id| ctx.get_var(id));
        match var {
            None => {
                // Leave the reference verbatim.
                let verbatim: String = chars[i..k].iter().collect();
                out.push_str(&verbatim);
            }
            Some(crate::context::variables::VariableSymbol::MacroParam(p)) => {
                out.push_str(&p.value);
                if chars.get(k) == Some(&'.') {
                    k += 1;
                }
            }
            Some(crate::context::variables::VariableSymbol::Set(set)) => {
                let idx = match &subscript_text {
                    None => 1,
                    Some(sub) => {
                        // The subscript may itself reference variables.
                        let substituted = substitute_variables(sub, ctx, sink);
                        match expressions_parse_arith(&substituted, ctx, sink) {
                            Some(v) if v >= 1 => v as usize,
                            _ => 1,
                        }
                    }
                };
                out.push_str(&set.get(idx).as_char());
                if chars.get(k) == Some(&'.') {
                    k += 1;
                }
            }
        }
        i = k;
    }

    out
}

/// Parse and evaluate a small arithmetic expression during substitution.
fn expressions_parse_arith(text: &str, ctx: &AsmContext, sink: &mut DiagnosticSink) -> Option<i32> {
    // The interner is behind a shared borrow here; names in subscripts have
    // already been interned when the statement was parsed, so parsing against
    // a scratch interner and evaluating literal-only expressions is enough
    // for the common `&ARR(&I)` shapes (the variable part was substituted
    // above).
    let mut scratch = crate::context::ids::IdStorage::new();
    let expr =
        expressions::parse_expression(text, open_hlasm_lang_core::Position::default(), &mut scratch)
            .ok()?;
    Some(evaluator::evaluate(&expr, ctx, sink).as_arith())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '$' | '#' | '@' | '_')
}

/// Parse macro invocation arguments: positional values and `KEY=value`
/// keywords (keys that name a keyword parameter of `def`).
pub fn parse_macro_arguments(
    stmt: &Statement,
    def: &crate::context::macros::MacroDef,
    ctx: &mut AsmContext,
    sink: &mut DiagnosticSink,
) -> (Vec<String>, std::collections::HashMap<Id, String>) {
    let substituted = substitute_variables(&stmt.operands_text, ctx, sink);
    let mut positional = Vec::new();
    let mut keywords = std::collections::HashMap::new();

    for (piece, _range) in crate::semantics::split_operands(&substituted, stmt.operands_range.start)
    {
        let piece = piece.trim();
        if let Some((key, value)) = piece.split_once('=') {
            if let Some(key_id) = ctx.ids.find(key) {
                let is_keyword_param = def.params.iter().any(|p| {
                    p.name == key_id
                        && matches!(p.kind, crate::context::macros::MacroParamKind::Keyword { .. })
                });
                if is_keyword_param {
                    keywords.insert(key_id, value.to_string());
                    continue;
                }
            }
        }
        positional.push(piece.to_string());
    }

    (positional, keywords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::variables::{SetKind, SetValue, VariableSymbol};

    fn ctx_with_var(name: &str, value: SetValue) -> AsmContext {
        let mut ctx = AsmContext::new("t");
        let id = ctx.ids.add(name);
        let kind = value.kind();
        ctx.declare_local(id, kind, true);
        match ctx.get_var_mut(id) {
            Some(VariableSymbol::Set(sym)) => sym.set(1, value),
            _ => unreachable!(),
        }
        ctx
    }

    #[test]
    fn test_substitute_simple() {
        let ctx = ctx_with_var("N", SetValue::A(5));
        let mut sink = DiagnosticSink::new();
        assert_eq!(substitute_variables("F'&N'", &ctx, &mut sink), "F'5'");
    }

    #[test]
    fn test_substitute_concat_dot() {
        let ctx = ctx_with_var("P", SetValue::C("AB".into()));
        let mut sink = DiagnosticSink::new();
        assert_eq!(substitute_variables("&P.C", &ctx, &mut sink), "ABC");
    }

    #[test]
    fn test_substitute_unknown_left_verbatim() {
        let ctx = AsmContext::new("t");
        let mut sink = DiagnosticSink::new();
        assert_eq!(substitute_variables("&NOPE+1", &ctx, &mut sink), "&NOPE+1");
    }

    #[test]
    fn test_substitute_double_ampersand() {
        let ctx = AsmContext::new("t");
        let mut sink = DiagnosticSink::new();
        assert_eq!(substitute_variables("C'&&'", &ctx, &mut sink), "C'&&'");
    }

    #[test]
    fn test_substitute_subscript() {
        let mut ctx = AsmContext::new("t");
        let id = ctx.ids.add("ARR");
        ctx.declare_local(id, SetKind::Arith, false);
        match ctx.get_var_mut(id) {
            Some(VariableSymbol::Set(sym)) => {
                sym.set(1, SetValue::A(10));
                sym.set(2, SetValue::A(20));
            }
            _ => unreachable!(),
        }
        let mut sink = DiagnosticSink::new();
        assert_eq!(substitute_variables("&ARR(2)", &ctx, &mut sink), "20");
    }

    #[test]
    fn test_is_ca_instruction() {
        let ctx = AsmContext::new("t");
        assert!(is_ca_instruction(&ctx.well_known, ctx.well_known.aif));
        assert!(is_ca_instruction(&ctx.well_known, Id::EMPTY));
        assert!(!is_ca_instruction(&ctx.well_known, ctx.well_known.dc));
    }
}
