//! Lookahead — forward scanning with snapshot rollback.
//!
//! Two modes:
//!
//! - **Sequence**: scan forward for a named sequence symbol. Every sequence
//!   label passed on the way is registered so the eventual jump resolves;
//!   on failure the manager restores the start snapshot, consumes one
//!   statement with the empty processor, and reports `E047`.
//! - **Attributes**: scan forward for definitions of forward-referenced
//!   ordinary symbols (`L'X` before `X DS F`); found definitions enter the
//!   ordinary table marked as lookahead results.
//!
//! While a lookahead is active only the COPY and opencode providers drive
//! it; macro bodies are never scanned.

use std::collections::HashSet;

use open_hlasm_lang_core::Location;

use crate::checking::{check_data_def, DataDefRegistry};
use crate::context::ids::Id;
use crate::context::ordinary::{OrdinarySymbol, SymbolAttributes, SymbolValue};
use crate::context::source::SourceSnapshot;
use crate::context::{AsmContext, ProcessingKind};
use crate::diags::DiagnosticSink;
use crate::semantics::{parse_operand_list, LabelField, Statement};

use super::processor::StatementProcessor;
use super::provider::ProviderKind;
use super::ProcessingRequest;

#[derive(Debug)]
enum Mode {
    Sequence {
        target: Id,
        location: Location,
        found: bool,
    },
    Attributes {
        pending: HashSet<Id>,
    },
}

/// Result of a finished sequence lookahead.
#[derive(Debug)]
pub struct LookaheadResult {
    pub target: Id,
    pub location: Location,
    pub found: bool,
    /// Snapshot of the statement that requested the jump.
    pub restore: SourceSnapshot,
}

/// Forward scanner.
#[derive(Debug)]
pub struct LookaheadProcessor {
    mode: Mode,
    restore: SourceSnapshot,
    registry: DataDefRegistry,
}

impl LookaheadProcessor {
    /// Scan for a sequence symbol; `restore` re-delivers the statement that
    /// requested the jump.
    pub fn new_sequence(target: Id, location: Location, restore: SourceSnapshot) -> Self {
        Self {
            mode: Mode::Sequence {
                target,
                location,
                found: false,
            },
            restore,
            registry: DataDefRegistry::new(),
        }
    }

    /// Scan for definitions of forward-referenced symbols.
    pub fn new_attributes(symbols: Vec<Id>, restore: SourceSnapshot) -> Self {
        Self {
            mode: Mode::Attributes {
                pending: symbols.into_iter().collect(),
            },
            restore,
            registry: DataDefRegistry::new(),
        }
    }

    /// The sequence-mode result; panics for attribute mode.
    pub fn into_sequence_result(self) -> LookaheadResult {
        match self.mode {
            Mode::Sequence {
                target,
                location,
                found,
            } => LookaheadResult {
                target,
                location,
                found,
                restore: self.restore,
            },
            Mode::Attributes { .. } => unreachable!("attribute lookahead has no jump result"),
        }
    }

    /// Whether this is a sequence-mode lookahead.
    pub fn is_sequence(&self) -> bool {
        matches!(self.mode, Mode::Sequence { .. })
    }

    /// Try to harvest an ordinary-symbol definition from a scanned
    /// statement (attribute mode).
    fn harvest_definition(&mut self, stmt: &Statement, ctx: &mut AsmContext) {
        let Mode::Attributes { pending } = &mut self.mode else {
            return;
        };
        let LabelField::Ordinary { name, range } = &stmt.label else {
            return;
        };
        if !pending.contains(name) {
            return;
        }

        let wk = ctx.well_known;
        let (value, attributes) = if stmt.instruction == wk.dc || stmt.instruction == wk.ds {
            let check = check_data_def(
                &stmt.operands_text,
                stmt.operands_range.start,
                false,
                &self.registry,
                // Lookahead validation is repeated when the statement is
                // really processed; swallow diagnostics here.
                &mut DiagnosticSink::new(),
            );
            (
                SymbolValue::Relocatable {
                    section: ctx.ord.current_section,
                    offset: ctx.ord.location_counter,
                },
                SymbolAttributes {
                    length: check.label_length as u32,
                    type_attr: check.label_type,
                    scale: 0,
                    integer: 0,
                },
            )
        } else if stmt.instruction == wk.equ {
            let ops = parse_operand_list(&stmt.operands_text, stmt.operands_range.start);
            let value = ops
                .first()
                .and_then(|(text, _)| text.parse::<i64>().ok())
                .unwrap_or(0);
            (SymbolValue::Absolute(value), SymbolAttributes::default())
        } else {
            return;
        };

        let name = *name;
        pending.remove(&name);
        ctx.ord.define(OrdinarySymbol {
            name,
            value,
            attributes,
            location: Location::new(stmt.file, *range),
            from_lookahead: true,
        });
    }
}

impl StatementProcessor for LookaheadProcessor {
    fn kind(&self) -> ProcessingKind {
        ProcessingKind::Lookahead
    }

    fn finished(&self) -> bool {
        match &self.mode {
            Mode::Sequence { found, .. } => *found,
            Mode::Attributes { pending } => pending.is_empty(),
        }
    }

    fn terminal_condition(&self, provider_kind: ProviderKind) -> bool {
        matches!(provider_kind, ProviderKind::Copy | ProviderKind::Opencode)
    }

    fn process_statement(
        &mut self,
        stmt: Statement,
        ctx: &mut AsmContext,
        _sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let mut reqs = Vec::new();

        // Sequence labels are harvested in both modes.
        if let LabelField::Sequence { name, range } = &stmt.label {
            reqs.push(ProcessingRequest::RegisterSequenceSymbol {
                name: *name,
                location: Location::new(stmt.file, *range),
            });
            if let Mode::Sequence { target, found, .. } = &mut self.mode {
                if name == target {
                    *found = true;
                }
            }
        }

        self.harvest_definition(&stmt, ctx);

        // Follow COPY inclusions so symbols inside members are reachable.
        if stmt.instruction == ctx.well_known.copy {
            let ops = parse_operand_list(&stmt.operands_text, stmt.operands_range.start);
            if let Some((name, range)) = ops.first() {
                if !name.is_empty() {
                    let member = ctx.ids.add(name);
                    reqs.push(ProcessingRequest::StartCopy {
                        member,
                        range: *range,
                        file: stmt.file,
                    });
                }
            }
        }

        reqs
    }

    fn end_processing(&mut self, _ctx: &mut AsmContext, _sink: &mut DiagnosticSink) {}
}
