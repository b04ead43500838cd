//! CA expression evaluation.
//!
//! Evaluates [`CaExpr`] trees to typed [`SetValue`]s against the assembly
//! context. Evaluation never fails hard: problems (undefined symbols,
//! division by zero, bad subscripts) are reported to the diagnostic sink and
//! a default value keeps the statement going.

use crate::context::variables::{SetValue, VariableSymbol};
use crate::context::AsmContext;
use crate::diags::{self, DiagnosticSink};
use crate::expressions::{AttrTarget, BinOp, CaExpr, StrPart, UnOp, VarSymRef};

/// Evaluate an expression to a SET value.
pub fn evaluate(expr: &CaExpr, ctx: &AsmContext, sink: &mut DiagnosticSink) -> SetValue {
    match expr {
        CaExpr::Num { value, .. } => SetValue::A(*value),

        CaExpr::Str { parts, .. } => {
            let mut out = String::new();
            for part in parts {
                match part {
                    StrPart::Lit(text) => out.push_str(text),
                    StrPart::Var(var) => out.push_str(&eval_var(var, ctx, sink).as_char()),
                }
            }
            SetValue::C(out)
        }

        CaExpr::Var(var) => eval_var(var, ctx, sink),

        CaExpr::Symbol { name, range } => match ctx.ord.lookup(*name) {
            Some(sym) => SetValue::A(sym.value.numeric() as i32),
            None => {
                sink.add(diags::error_ce003(ctx.ids.text_of(*name), *range));
                SetValue::A(0)
            }
        },

        CaExpr::LocCounter { .. } => SetValue::A(ctx.ord.location_counter as i32),

        CaExpr::Attr { attr, target, range } => eval_attr(*attr, target, *range, ctx, sink),

        CaExpr::Unary { op, expr, .. } => {
            let value = evaluate(expr, ctx, sink);
            match op {
                UnOp::Neg => SetValue::A(value.as_arith().wrapping_neg()),
                UnOp::Not => SetValue::B(!value.as_bool()),
            }
        }

        CaExpr::Binary { op, lhs, rhs, range } => {
            let left = evaluate(lhs, ctx, sink);
            match op {
                // Boolean operators short-circuit; the right side is only
                // evaluated when it can affect the result.
                BinOp::And => {
                    if !left.as_bool() {
                        return SetValue::B(false);
                    }
                    SetValue::B(evaluate(rhs, ctx, sink).as_bool())
                }
                BinOp::Or => {
                    if left.as_bool() {
                        return SetValue::B(true);
                    }
                    SetValue::B(evaluate(rhs, ctx, sink).as_bool())
                }
                _ => {
                    let right = evaluate(rhs, ctx, sink);
                    match op {
                        BinOp::Add => SetValue::A(left.as_arith().wrapping_add(right.as_arith())),
                        BinOp::Sub => SetValue::A(left.as_arith().wrapping_sub(right.as_arith())),
                        BinOp::Mul => SetValue::A(left.as_arith().wrapping_mul(right.as_arith())),
                        BinOp::Div => {
                            let divisor = right.as_arith();
                            if divisor == 0 {
                                sink.add(diags::error_ce002(*range));
                                SetValue::A(0)
                            } else {
                                SetValue::A(left.as_arith().wrapping_div(divisor))
                            }
                        }
                        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                            SetValue::B(compare(*op, &left, &right))
                        }
                        BinOp::And | BinOp::Or => unreachable!("handled above"),
                    }
                }
            }
        }
    }
}

/// Evaluate an expression and take its numeric value.
pub fn evaluate_arith(expr: &CaExpr, ctx: &AsmContext, sink: &mut DiagnosticSink) -> i32 {
    evaluate(expr, ctx, sink).as_arith()
}

/// Evaluate an expression and take its boolean value.
pub fn evaluate_bool(expr: &CaExpr, ctx: &AsmContext, sink: &mut DiagnosticSink) -> bool {
    evaluate(expr, ctx, sink).as_bool()
}

/// Resolve a variable reference to its current value.
pub fn eval_var(var: &VarSymRef, ctx: &AsmContext, sink: &mut DiagnosticSink) -> SetValue {
    match ctx.get_var(var.name) {
        None => {
            sink.add(diags::error_ce001(ctx.ids.text_of(var.name), var.range));
            SetValue::A(0)
        }
        Some(VariableSymbol::MacroParam(param)) => SetValue::C(param.value.clone()),
        Some(VariableSymbol::Set(_)) => {
            let idx = if var.subscript.is_empty() {
                1
            } else {
                let value = evaluate_arith(&var.subscript[0], ctx, sink);
                if value < 1 {
                    sink.add(diags::error_e012(
                        "subscript value has to be 1 or more",
                        var.range,
                    ));
                    return SetValue::A(0);
                }
                value as usize
            };
            // Re-resolve: subscript evaluation may have emitted diagnostics
            // but cannot have changed the variable itself.
            match ctx.get_var(var.name) {
                Some(VariableSymbol::Set(sym)) => sym.get(idx),
                _ => SetValue::A(0),
            }
        }
    }
}

fn compare(op: BinOp, left: &SetValue, right: &SetValue) -> bool {
    use std::cmp::Ordering;
    let ordering = match (left, right) {
        (SetValue::C(l), SetValue::C(r)) => l.cmp(r),
        _ => left.as_arith().cmp(&right.as_arith()),
    };
    match op {
        BinOp::Eq => ordering == Ordering::Equal,
        BinOp::Ne => ordering != Ordering::Equal,
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        _ => unreachable!("comparison operator expected"),
    }
}

fn eval_attr(
    attr: char,
    target: &AttrTarget,
    range: open_hlasm_lang_core::Range,
    ctx: &AsmContext,
    sink: &mut DiagnosticSink,
) -> SetValue {
    // K' and N' apply to the variable itself, not to a named symbol.
    if let AttrTarget::Var(var) = target {
        match attr {
            'K' => return SetValue::A(eval_var(var, ctx, sink).as_char().len() as i32),
            'N' => {
                let count = match ctx.get_var(var.name) {
                    Some(VariableSymbol::Set(sym)) => sym.count() as i32,
                    Some(VariableSymbol::MacroParam(_)) => 1,
                    None => 0,
                };
                return SetValue::A(count);
            }
            _ => {}
        }
    }

    let name = match target {
        AttrTarget::Symbol(id, _) => Some(*id),
        AttrTarget::Var(var) => {
            let text = eval_var(var, ctx, sink).as_char();
            if text.is_empty() {
                None
            } else {
                ctx.ids.find(&text)
            }
        }
    };

    match attr {
        'L' => SetValue::A(name.and_then(|n| ctx.ord.length_attr(n)).unwrap_or(1) as i32),
        'T' => {
            let t = name.and_then(|n| ctx.ord.type_attr(n)).unwrap_or('U');
            SetValue::C(t.to_string())
        }
        'S' => SetValue::A(name.and_then(|n| ctx.ord.scale_attr(n)).unwrap_or(0)),
        'I' => SetValue::A(name.and_then(|n| ctx.ord.integer_attr(n)).unwrap_or(0)),
        'D' => SetValue::B(name.map(|n| ctx.ord.is_defined(n)).unwrap_or(false)),
        'K' => SetValue::A(name.map(|n| ctx.ids.text_of(n).len() as i32).unwrap_or(0)),
        'N' => SetValue::A(0),
        _ => {
            sink.add(diags::error_ce004(
                &format!("unsupported attribute {attr}'"),
                range,
            ));
            SetValue::A(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ordinary::{OrdinarySymbol, SymbolAttributes, SymbolValue};
    use crate::context::variables::SetKind;
    use crate::expressions::parse_expression;
    use open_hlasm_lang_core::{Location, Position};

    fn eval_text(ctx: &mut AsmContext, text: &str) -> (SetValue, Vec<String>) {
        let mut sink = DiagnosticSink::new();
        let expr = {
            let ids = &mut ctx.ids;
            parse_expression(text, Position::default(), ids).unwrap()
        };
        let value = evaluate(&expr, ctx, &mut sink);
        let codes = sink
            .into_diagnostics()
            .into_iter()
            .map(|d| d.code)
            .collect();
        (value, codes)
    }

    #[test]
    fn test_arithmetic() {
        let mut ctx = AsmContext::new("t");
        assert_eq!(eval_text(&mut ctx, "2+3*4").0, SetValue::A(14));
        assert_eq!(eval_text(&mut ctx, "(2+3)*4").0, SetValue::A(20));
        assert_eq!(eval_text(&mut ctx, "-5+10").0, SetValue::A(5));
    }

    #[test]
    fn test_division_by_zero_diagnosed() {
        let mut ctx = AsmContext::new("t");
        let (value, codes) = eval_text(&mut ctx, "10/0");
        assert_eq!(value, SetValue::A(0));
        assert_eq!(codes, vec!["CE002".to_string()]);
    }

    #[test]
    fn test_variable_resolution() {
        let mut ctx = AsmContext::new("t");
        let name = ctx.ids.add("I");
        ctx.declare_local(name, SetKind::Arith, true);
        match ctx.get_var_mut(name) {
            Some(VariableSymbol::Set(sym)) => sym.set(1, SetValue::A(7)),
            _ => unreachable!(),
        }
        assert_eq!(eval_text(&mut ctx, "&I+1").0, SetValue::A(8));
    }

    #[test]
    fn test_undefined_variable_diagnosed() {
        let mut ctx = AsmContext::new("t");
        let (value, codes) = eval_text(&mut ctx, "&NOPE");
        assert_eq!(value, SetValue::A(0));
        assert_eq!(codes, vec!["CE001".to_string()]);
    }

    #[test]
    fn test_string_concatenation() {
        let mut ctx = AsmContext::new("t");
        let name = ctx.ids.add("X");
        ctx.declare_local(name, SetKind::Char, true);
        match ctx.get_var_mut(name) {
            Some(VariableSymbol::Set(sym)) => sym.set(1, SetValue::C("MID".into())),
            _ => unreachable!(),
        }
        assert_eq!(
            eval_text(&mut ctx, "'A&X.B'").0,
            SetValue::C("AMIDB".into())
        );
    }

    #[test]
    fn test_comparisons() {
        let mut ctx = AsmContext::new("t");
        assert_eq!(eval_text(&mut ctx, "1 LT 2").0, SetValue::B(true));
        assert_eq!(eval_text(&mut ctx, "'A' EQ 'A'").0, SetValue::B(true));
        assert_eq!(eval_text(&mut ctx, "2 LE 1").0, SetValue::B(false));
    }

    #[test]
    fn test_logical_short_circuit() {
        let mut ctx = AsmContext::new("t");
        // The right side would emit CE001; AND short-circuits past it.
        let (value, codes) = eval_text(&mut ctx, "0 AND &UNDEF");
        assert_eq!(value, SetValue::B(false));
        assert!(codes.is_empty());
    }

    #[test]
    fn test_length_attribute() {
        let mut ctx = AsmContext::new("t");
        let name = ctx.ids.add("FLD");
        ctx.ord.define(OrdinarySymbol {
            name,
            value: SymbolValue::Relocatable {
                section: crate::context::ids::Id::EMPTY,
                offset: 0,
            },
            attributes: SymbolAttributes {
                length: 20,
                type_attr: 'C',
                scale: 0,
                integer: 0,
            },
            location: Location::default(),
            from_lookahead: false,
        });
        assert_eq!(eval_text(&mut ctx, "L'FLD").0, SetValue::A(20));
        assert_eq!(eval_text(&mut ctx, "T'FLD").0, SetValue::C("C".into()));
        assert_eq!(eval_text(&mut ctx, "D'FLD").0, SetValue::B(true));
    }

    #[test]
    fn test_undefined_attribute_defaults() {
        let mut ctx = AsmContext::new("t");
        assert_eq!(eval_text(&mut ctx, "L'NOSUCH").0, SetValue::A(1));
        assert_eq!(eval_text(&mut ctx, "T'NOSUCH").0, SetValue::C("U".into()));
        assert_eq!(eval_text(&mut ctx, "D'NOSUCH").0, SetValue::B(false));
    }
}
