//! Macro-definition capture.
//!
//! Active between `MACRO` and its matching `MEND`. The first captured
//! statement is the prototype (name parameter, macro name, symbolic
//! parameters); everything after it is recorded verbatim into the body.
//! Nested `MACRO`/`MEND` pairs are tracked by depth and captured as part of
//! the body. Sequence symbols at nesting depth zero are collected into the
//! macro's label table.

use std::collections::HashMap;
use std::rc::Rc;

use open_hlasm_lang_core::Location;

use crate::context::ids::Id;
use crate::context::macros::{MacroArgSpec, MacroDef, MacroParamKind};
use crate::context::{AsmContext, ProcessingKind};
use crate::diags::{self, DiagnosticSink};
use crate::semantics::{parse_operand_list, LabelField, Statement};

use super::processor::StatementProcessor;
use super::provider::ProviderKind;
use super::ProcessingRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// External definitions start with their own `MACRO` statement.
    ExpectingMacro,
    ExpectingPrototype,
    Body,
    Done,
}

/// Captures one macro definition.
#[derive(Debug)]
pub struct MacroDefProcessor {
    state: State,
    /// For external resolution: the operation code being resolved.
    external_name: Option<Id>,
    name: Id,
    name_param: Id,
    params: Vec<MacroArgSpec>,
    body: Vec<Rc<Statement>>,
    sequence_symbols: HashMap<Id, usize>,
    nest_depth: usize,
    invalid: bool,
    location: Location,
}

impl MacroDefProcessor {
    /// Capture started by a `MACRO` statement in open processing.
    pub fn new_inline(location: Location) -> Self {
        Self {
            state: State::ExpectingPrototype,
            external_name: None,
            name: Id::EMPTY,
            name_param: Id::EMPTY,
            params: Vec::new(),
            body: Vec::new(),
            sequence_symbols: HashMap::new(),
            nest_depth: 0,
            invalid: false,
            location,
        }
    }

    /// Capture of an external macro definition fetched from a library.
    pub fn new_external(name: Id, location: Location) -> Self {
        Self {
            state: State::ExpectingMacro,
            external_name: Some(name),
            name: Id::EMPTY,
            name_param: Id::EMPTY,
            params: Vec::new(),
            body: Vec::new(),
            sequence_symbols: HashMap::new(),
            nest_depth: 0,
            invalid: false,
            location,
        }
    }

    /// The completed definition, unless the capture was invalid.
    pub fn into_result(self) -> Option<MacroDef> {
        if self.invalid || self.name.is_empty() {
            return None;
        }
        Some(MacroDef {
            name: self.name,
            name_param: self.name_param,
            params: self.params,
            body: self.body,
            sequence_symbols: self.sequence_symbols,
            location: self.location,
        })
    }

    fn process_prototype(&mut self, stmt: &Statement, ctx: &mut AsmContext, sink: &mut DiagnosticSink) {
        if stmt.instruction.is_empty() {
            sink.add(diags::error_e010("macro prototype", stmt.range));
            self.invalid = true;
            self.state = State::Body;
            return;
        }

        self.name = stmt.instruction;
        if let Some(external) = self.external_name {
            if external != self.name {
                // A library member must define the operation code it was
                // fetched for.
                self.invalid = true;
            }
        }

        match &stmt.label {
            LabelField::Empty => {}
            LabelField::Variable { sym } if sym.subscript.is_empty() => {
                self.name_param = sym.name;
            }
            _ => {
                sink.add(diags::error_e010("macro prototype name field", stmt.label_range));
            }
        }

        for (text, range) in parse_operand_list(&stmt.operands_text, stmt.operands_range.start) {
            if text.is_empty() {
                continue;
            }
            let Some(name_text) = text.strip_prefix('&') else {
                sink.add(diags::error_e010("symbolic parameter", range));
                continue;
            };
            match name_text.split_once('=') {
                Some((name, default)) => {
                    if !is_param_name(name) {
                        sink.add(diags::error_e010("symbolic parameter", range));
                        continue;
                    }
                    self.params.push(MacroArgSpec {
                        name: ctx.ids.add(name),
                        kind: MacroParamKind::Keyword {
                            default: default.to_string(),
                        },
                    });
                }
                None => {
                    if !is_param_name(name_text) {
                        sink.add(diags::error_e010("symbolic parameter", range));
                        continue;
                    }
                    self.params.push(MacroArgSpec {
                        name: ctx.ids.add(name_text),
                        kind: MacroParamKind::Positional,
                    });
                }
            }
        }

        self.state = State::Body;
    }

    fn capture(&mut self, stmt: Statement, ctx: &AsmContext, sink: &mut DiagnosticSink) {
        if self.nest_depth == 0 {
            if let LabelField::Sequence { name, range } = &stmt.label {
                if self.sequence_symbols.contains_key(name) {
                    // The first registration stays in effect.
                    sink.add(diags::error_e045(ctx.ids.text_of(*name), *range));
                } else {
                    self.sequence_symbols.insert(*name, self.body.len());
                }
            }
        }
        self.body.push(Rc::new(stmt));
    }
}

impl StatementProcessor for MacroDefProcessor {
    fn kind(&self) -> ProcessingKind {
        ProcessingKind::Macro
    }

    fn finished(&self) -> bool {
        self.state == State::Done
    }

    fn terminal_condition(&self, _provider_kind: ProviderKind) -> bool {
        // End of input terminates the capture (a missing MEND).
        true
    }

    fn process_statement(
        &mut self,
        stmt: Statement,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let wk = ctx.well_known;
        match self.state {
            State::Done => {}
            State::ExpectingMacro => {
                if stmt.instruction == wk.r#macro {
                    self.state = State::ExpectingPrototype;
                } else {
                    sink.add(diags::error_e010("macro definition", stmt.range));
                    self.invalid = true;
                    self.state = State::Done;
                }
            }
            State::ExpectingPrototype => {
                if stmt.instruction == wk.mend {
                    sink.add(diags::error_e010("macro prototype", stmt.range));
                    self.invalid = true;
                    self.state = State::Done;
                } else {
                    self.process_prototype(&stmt, ctx, sink);
                }
            }
            State::Body => {
                if stmt.instruction == wk.r#macro {
                    self.nest_depth += 1;
                    self.capture(stmt, ctx, sink);
                } else if stmt.instruction == wk.mend {
                    if self.nest_depth == 0 {
                        self.state = State::Done;
                    } else {
                        self.nest_depth -= 1;
                        self.capture(stmt, ctx, sink);
                    }
                } else {
                    self.capture(stmt, ctx, sink);
                }
            }
        }
        Vec::new()
    }

    fn end_processing(&mut self, _ctx: &mut AsmContext, _sink: &mut DiagnosticSink) {}
}

fn is_param_name(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || matches!(c, '$' | '#' | '@' | '_') => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '$' | '#' | '@' | '_'))
}
