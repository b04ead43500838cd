//! Ordinary statement processing.
//!
//! Routes each statement by instruction: conditional assembly to the CA
//! interpreter, `DC`/`DS` to the data-definition checker, `EQU`/`COPY` and
//! the assembler directives to their handlers, registered macro names to
//! macro invocation, machine mnemonics to label definition and location
//! counter bookkeeping. Anything left is resolved as an external macro
//! through the library provider (by the manager) or diagnosed `E049`.

use open_hlasm_lang_core::{Location, Range, Severity};

use crate::checking::{check_data_def, DataDefRegistry};
use crate::context::ids::Id;
use crate::context::ordinary::{OrdinarySymbol, SymbolAttributes, SymbolValue};
use crate::context::{AsmContext, ProcessingKind};
use crate::diags::{self, DiagnosticSink};
use crate::evaluator;
use crate::expressions::{self, CaExpr};
use crate::instructions::MnemonicCatalog;
use crate::semantics::{parse_operand_list, LabelField, Statement};

use super::ca_processor::CaProcessor;
use super::processor::StatementProcessor;
use super::provider::ProviderKind;
use super::{parse_macro_arguments, ProcessingRequest};

/// The ordinary statement processor.
#[derive(Debug)]
pub struct OrdinaryProcessor {
    ca: CaProcessor,
    registry: DataDefRegistry,
    mnemonics: MnemonicCatalog,
}

impl OrdinaryProcessor {
    pub fn new(ctx: &AsmContext) -> Self {
        Self {
            ca: CaProcessor::new(&ctx.well_known),
            registry: DataDefRegistry::new(),
            mnemonics: MnemonicCatalog::new(),
        }
    }

    // -----------------------------------------------------------------------
    //  Label helpers
    // -----------------------------------------------------------------------

    /// Resolve the statement's name field to an ordinary symbol name.
    /// Variable labels evaluate to their character value (model statements).
    fn ordinary_label(
        stmt: &Statement,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Option<(Id, Range)> {
        match &stmt.label {
            LabelField::Ordinary { name, range } => Some((*name, *range)),
            LabelField::Variable { sym } => {
                let text = evaluator::eval_var(sym, ctx, sink).as_char();
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some((ctx.ids.add(trimmed), sym.range))
                }
            }
            _ => None,
        }
    }

    /// Sequence labels on assembler statements register like CA labels.
    fn seq_label_request(stmt: &Statement) -> Vec<ProcessingRequest> {
        if let LabelField::Sequence { name, range } = &stmt.label {
            vec![ProcessingRequest::RegisterSequenceSymbol {
                name: *name,
                location: Location::new(stmt.file, *range),
            }]
        } else {
            Vec::new()
        }
    }

    fn define_label(
        stmt: &Statement,
        name: Id,
        range: Range,
        value: SymbolValue,
        attributes: SymbolAttributes,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) {
        let location = Location::new(stmt.file, range);
        let defined = ctx.ord.define(OrdinarySymbol {
            name,
            value,
            attributes,
            location,
            from_lookahead: false,
        });
        if !defined {
            sink.add(diags::error_e031(ctx.ids.text_of(name), range));
            return;
        }
        ctx.lsp.defer_definition(name, location);
    }

    // -----------------------------------------------------------------------
    //  DC / DS
    // -----------------------------------------------------------------------

    fn process_data_def(
        &self,
        stmt: &Statement,
        is_dc: bool,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let reqs = Self::seq_label_request(stmt);

        let operands = super::substitute_variables(&stmt.operands_text, ctx, sink);
        let check = check_data_def(
            &operands,
            stmt.operands_range.start,
            is_dc,
            &self.registry,
            sink,
        );

        ctx.ord.align(check.alignment.boundary());
        if let Some((name, range)) = Self::ordinary_label(stmt, ctx, sink) {
            let value = SymbolValue::Relocatable {
                section: ctx.ord.current_section,
                offset: ctx.ord.location_counter,
            };
            let attributes = SymbolAttributes {
                length: check.label_length as u32,
                type_attr: check.label_type,
                scale: 0,
                integer: 0,
            };
            Self::define_label(stmt, name, range, value, attributes, ctx, sink);
        }
        ctx.ord.advance(check.total_bytes as i64);

        reqs
    }

    // -----------------------------------------------------------------------
    //  EQU
    // -----------------------------------------------------------------------

    fn process_equ(
        &self,
        stmt: &Statement,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let reqs = Self::seq_label_request(stmt);

        let operands = parse_operand_list(&stmt.operands_text, stmt.operands_range.start);
        let Some((value_text, value_range)) = operands.first().filter(|(t, _)| !t.is_empty())
        else {
            sink.add(diags::error_e022("EQU", stmt.instruction_range));
            return reqs;
        };

        let value = match expressions::parse_expression(value_text, value_range.start, &mut ctx.ids)
        {
            Ok(expr) => {
                Self::record_symbol_occurrences(&expr, stmt, ctx);
                evaluator::evaluate_arith(&expr, ctx, sink) as i64
            }
            Err(e) => {
                sink.add(diags::error_ce004(&e.to_string(), *value_range));
                return reqs;
            }
        };

        let length = operands
            .get(1)
            .filter(|(t, _)| !t.is_empty())
            .and_then(|(t, r)| {
                expressions::parse_expression(t, r.start, &mut ctx.ids)
                    .ok()
                    .map(|expr| evaluator::evaluate_arith(&expr, ctx, sink))
            })
            .unwrap_or(1)
            .max(0) as u32;

        if let Some((name, range)) = Self::ordinary_label(stmt, ctx, sink) {
            let attributes = SymbolAttributes {
                length,
                type_attr: 'U',
                scale: 0,
                integer: 0,
            };
            Self::define_label(
                stmt,
                name,
                range,
                SymbolValue::Absolute(value),
                attributes,
                ctx,
                sink,
            );
        }
        reqs
    }

    fn record_symbol_occurrences(expr: &CaExpr, stmt: &Statement, ctx: &mut AsmContext) {
        match expr {
            CaExpr::Symbol { name, range } => {
                ctx.lsp
                    .defer_occurrence(*name, Location::new(stmt.file, *range));
            }
            CaExpr::Attr { target, .. } => {
                if let expressions::AttrTarget::Symbol(name, range) = target {
                    ctx.lsp
                        .defer_occurrence(*name, Location::new(stmt.file, *range));
                }
            }
            CaExpr::Unary { expr, .. } => Self::record_symbol_occurrences(expr, stmt, ctx),
            CaExpr::Binary { lhs, rhs, .. } => {
                Self::record_symbol_occurrences(lhs, stmt, ctx);
                Self::record_symbol_occurrences(rhs, stmt, ctx);
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    //  COPY
    // -----------------------------------------------------------------------

    fn process_copy(
        &self,
        stmt: &Statement,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let mut reqs = Self::seq_label_request(stmt);

        let operands = super::substitute_variables(&stmt.operands_text, ctx, sink);
        let pieces = parse_operand_list(&operands, stmt.operands_range.start);
        match pieces.as_slice() {
            [(name, range)] if !name.is_empty() => {
                let member = ctx.ids.add(name);
                reqs.push(ProcessingRequest::StartCopy {
                    member,
                    range: *range,
                    file: stmt.file,
                });
            }
            [] => sink.add(diags::error_e022("COPY", stmt.instruction_range)),
            _ => sink.add(diags::error_e010("operand", stmt.operands_range)),
        }
        reqs
    }

    // -----------------------------------------------------------------------
    //  Sections, directives, MNOTE
    // -----------------------------------------------------------------------

    fn process_section(
        &self,
        stmt: &Statement,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let reqs = Self::seq_label_request(stmt);
        let name = Self::ordinary_label(stmt, ctx, sink);
        let section = name.map(|(id, _)| id).unwrap_or(Id::EMPTY);
        ctx.ord.set_section(section);
        if let Some((name, range)) = name {
            let attributes = SymbolAttributes {
                length: 1,
                type_attr: 'J',
                scale: 0,
                integer: 0,
            };
            let value = SymbolValue::Relocatable {
                section,
                offset: 0,
            };
            Self::define_label(stmt, name, range, value, attributes, ctx, sink);
        }
        reqs
    }

    fn process_mnote(
        &self,
        stmt: &Statement,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let reqs = Self::seq_label_request(stmt);

        let operands = super::substitute_variables(&stmt.operands_text, ctx, sink);
        let pieces = parse_operand_list(&operands, stmt.operands_range.start);
        let (severity, message) = match pieces.as_slice() {
            [(single, _)] => (Severity::Warning, single.clone()),
            [(sev, _), rest @ ..] => {
                let severity = if sev == "*" {
                    Severity::Info
                } else {
                    match sev.parse::<u32>() {
                        Ok(n) if n >= 8 => Severity::Error,
                        Ok(_) => Severity::Warning,
                        Err(_) => Severity::Warning,
                    }
                };
                let message = rest
                    .iter()
                    .map(|(t, _)| t.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                (severity, message)
            }
            [] => (Severity::Warning, String::new()),
        };
        let message = message.trim_matches('\'').to_string();
        sink.add(diags::mnote(severity, &message, stmt.operands_range));
        reqs
    }

    // -----------------------------------------------------------------------
    //  Machine instructions and macro invocation
    // -----------------------------------------------------------------------

    fn process_machine(
        &self,
        stmt: &Statement,
        length: u8,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let reqs = Self::seq_label_request(stmt);
        ctx.ord.align(2);
        if let Some((name, range)) = Self::ordinary_label(stmt, ctx, sink) {
            let value = SymbolValue::Relocatable {
                section: ctx.ord.current_section,
                offset: ctx.ord.location_counter,
            };
            let attributes = SymbolAttributes {
                length: length as u32,
                type_attr: 'I',
                scale: 0,
                integer: 0,
            };
            Self::define_label(stmt, name, range, value, attributes, ctx, sink);
        }
        ctx.ord.advance(length as i64);
        reqs
    }

}

/// Invoke a registered macro: bind the name field and arguments, push the
/// invocation scope. Also used by the manager after external resolution.
pub fn invoke_macro(stmt: &Statement, ctx: &mut AsmContext, sink: &mut DiagnosticSink) {
    let Some(def) = ctx.get_macro(stmt.instruction).cloned() else {
        return;
    };

    let name_value = match &stmt.label {
        LabelField::Ordinary { .. } => stmt.label_text.clone(),
        LabelField::Variable { sym } => evaluator::eval_var(sym, ctx, sink).as_char(),
        _ => String::new(),
    };

    let (positional, keywords) = parse_macro_arguments(stmt, &def, ctx, sink);
    ctx.enter_macro(def, name_value, positional, keywords);
}

impl StatementProcessor for OrdinaryProcessor {
    fn kind(&self) -> ProcessingKind {
        ProcessingKind::Ordinary
    }

    fn finished(&self) -> bool {
        false
    }

    fn terminal_condition(&self, provider_kind: ProviderKind) -> bool {
        provider_kind == ProviderKind::Opencode
    }

    fn process_statement(
        &mut self,
        stmt: Statement,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        if self.ca.handles(stmt.instruction) {
            return self.ca.process(&stmt, ctx, sink);
        }

        let wk = ctx.well_known;
        let id = stmt.instruction;

        if id == wk.dc || id == wk.ds {
            return self.process_data_def(&stmt, id == wk.dc, ctx, sink);
        }
        if id == wk.equ {
            return self.process_equ(&stmt, ctx, sink);
        }
        if id == wk.copy {
            return self.process_copy(&stmt, ctx, sink);
        }
        if id == wk.csect || id == wk.dsect || id == wk.start {
            return self.process_section(&stmt, ctx, sink);
        }
        if id == wk.end {
            let mut reqs = Self::seq_label_request(&stmt);
            reqs.push(ProcessingRequest::EndAssembly);
            return reqs;
        }
        if id == wk.mnote {
            return self.process_mnote(&stmt, ctx, sink);
        }
        if id == wk.using
            || id == wk.drop
            || id == wk.org
            || id == wk.ltorg
            || id == wk.print
            || id == wk.title
            || id == wk.space
            || id == wk.eject
        {
            // Accepted without semantic effect in the analysis engine.
            return Self::seq_label_request(&stmt);
        }

        if ctx.get_macro(id).is_some() {
            let reqs = Self::seq_label_request(&stmt);
            invoke_macro(&stmt, ctx, sink);
            return reqs;
        }

        if let Some(length) = self.mnemonics.length_of(&stmt.instruction_text) {
            return self.process_machine(&stmt, length, ctx, sink);
        }

        // Unknown operation code: let the manager try the library.
        vec![ProcessingRequest::ExternalMacroCall { stmt }]
    }

    fn end_processing(&mut self, _ctx: &mut AsmContext, _sink: &mut DiagnosticSink) {}
}
