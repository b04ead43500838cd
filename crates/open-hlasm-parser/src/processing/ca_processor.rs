//! The conditional-assembly interpreter.
//!
//! Dispatches CA instructions through a per-context table keyed by interned
//! instruction id: `SET{A,B,C}`, `LCL*`/`GBL*`, `ANOP`, `ACTR`, `AGO`,
//! `AIF`, `MACRO`/`MEND`/`MEXIT`, and the `AREAD`/`ASPACE`/`AEJECT` stubs.
//! Handlers validate their statement, mutate the context, and return
//! requests (jumps, macro-definition starts) for the manager.

use std::collections::HashMap;

use open_hlasm_lang_core::Location;

use crate::context::ids::Id;
use crate::context::variables::{SetKind, VariableSymbol};
use crate::context::{AsmContext, WellKnownIds};
use crate::diags::{self, DiagnosticSink};
use crate::evaluator;
use crate::expressions::VarSymRef;
use crate::semantics::{parse_ca_operands, CaOperand, LabelField, Statement};

use super::ProcessingRequest;

/// One entry of the CA dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaInstruction {
    Set(SetKind),
    Declare { kind: SetKind, global: bool },
    Anop,
    Actr,
    Ago,
    Aif,
    MacroDef,
    Mend,
    Mexit,
    // AREAD, ASPACE, AEJECT are accepted without effect.
    Stub,
    Empty,
}

/// The CA instruction dispatcher.
#[derive(Debug)]
pub struct CaProcessor {
    table: HashMap<Id, CaInstruction>,
}

impl CaProcessor {
    /// Build the dispatch table from the context's well-known ids.
    pub fn new(wk: &WellKnownIds) -> Self {
        let mut table = HashMap::new();
        table.insert(wk.seta, CaInstruction::Set(SetKind::Arith));
        table.insert(wk.setb, CaInstruction::Set(SetKind::Bool));
        table.insert(wk.setc, CaInstruction::Set(SetKind::Char));
        table.insert(wk.lcla, CaInstruction::Declare { kind: SetKind::Arith, global: false });
        table.insert(wk.lclb, CaInstruction::Declare { kind: SetKind::Bool, global: false });
        table.insert(wk.lclc, CaInstruction::Declare { kind: SetKind::Char, global: false });
        table.insert(wk.gbla, CaInstruction::Declare { kind: SetKind::Arith, global: true });
        table.insert(wk.gblb, CaInstruction::Declare { kind: SetKind::Bool, global: true });
        table.insert(wk.gblc, CaInstruction::Declare { kind: SetKind::Char, global: true });
        table.insert(wk.anop, CaInstruction::Anop);
        table.insert(wk.actr, CaInstruction::Actr);
        table.insert(wk.ago, CaInstruction::Ago);
        table.insert(wk.aif, CaInstruction::Aif);
        table.insert(wk.r#macro, CaInstruction::MacroDef);
        table.insert(wk.mend, CaInstruction::Mend);
        table.insert(wk.mexit, CaInstruction::Mexit);
        table.insert(wk.aread, CaInstruction::Stub);
        table.insert(wk.aspace, CaInstruction::Stub);
        table.insert(wk.aeject, CaInstruction::Stub);
        table.insert(Id::EMPTY, CaInstruction::Empty);
        Self { table }
    }

    /// Whether the instruction is handled here.
    pub fn handles(&self, instruction: Id) -> bool {
        self.table.contains_key(&instruction)
    }

    /// Process one CA statement.
    pub fn process(
        &self,
        stmt: &Statement,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let instruction = *self
            .table
            .get(&stmt.instruction)
            .expect("caller checked handles()");
        match instruction {
            CaInstruction::Set(kind) => self.process_set(stmt, kind, ctx, sink),
            CaInstruction::Declare { kind, global } => {
                self.process_declare(stmt, kind, global, ctx, sink)
            }
            CaInstruction::Anop => register_seq_sym(stmt, sink),
            CaInstruction::Actr => self.process_actr(stmt, ctx, sink),
            CaInstruction::Ago => self.process_ago(stmt, ctx, sink),
            CaInstruction::Aif => self.process_aif(stmt, ctx, sink),
            CaInstruction::MacroDef => {
                let mut reqs = register_seq_sym(stmt, sink);
                reqs.push(ProcessingRequest::StartMacroDefinition {
                    location: Location::new(stmt.file, stmt.range),
                });
                reqs
            }
            CaInstruction::Mend => {
                if !ctx.is_in_macro() {
                    sink.add(diags::error_e054(stmt.range));
                }
                Vec::new()
            }
            CaInstruction::Mexit => {
                if !ctx.is_in_macro() {
                    sink.add(diags::error_e054(stmt.range));
                } else {
                    ctx.leave_macro();
                }
                Vec::new()
            }
            CaInstruction::Stub | CaInstruction::Empty => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    //  SET
    // -----------------------------------------------------------------------

    fn process_set(
        &self,
        stmt: &Statement,
        kind: SetKind,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let LabelField::Variable { sym } = &stmt.label else {
            sink.add(diags::error_e010("label field", stmt.label_range));
            return Vec::new();
        };

        let Some(idx) = test_symbol_for_assignment(sym, kind, ctx, sink) else {
            return Vec::new();
        };

        // Evaluate the operand values before touching the symbol.
        let operands = parse_ca_operands(&stmt.operands_text, stmt.operands_range.start, &mut ctx.ids);
        let mut values = Vec::new();
        let mut has_operand = false;
        for op in &operands {
            match op {
                CaOperand::Empty { .. } => continue,
                CaOperand::Expr { expr, .. } => {
                    has_operand = true;
                    values.push(evaluator::evaluate(expr, ctx, sink));
                }
                CaOperand::Var { sym, .. } => {
                    has_operand = true;
                    values.push(evaluator::eval_var(sym, ctx, sink));
                }
                CaOperand::Invalid { message, range } => {
                    sink.add(diags::error_ce004(message, *range));
                    return Vec::new();
                }
                CaOperand::Seq { range, .. } | CaOperand::Branch { range, .. } => {
                    sink.add(diags::error_e012("SET instruction", *range));
                    return Vec::new();
                }
            }
        }
        if !has_operand {
            sink.add(diags::error_e022("SET instruction", stmt.instruction_range));
            return Vec::new();
        }

        if ctx.get_var(sym.name).is_none() {
            ctx.declare_local(sym.name, kind, sym.subscript.is_empty());
        }
        let base_idx = idx.unwrap_or(1);
        if let Some(VariableSymbol::Set(set_sym)) = ctx.get_var_mut(sym.name) {
            for (k, value) in values.into_iter().enumerate() {
                set_sym.set(base_idx + k, value);
            }
        }
        Vec::new()
    }

    // -----------------------------------------------------------------------
    //  LCL / GBL
    // -----------------------------------------------------------------------

    fn process_declare(
        &self,
        stmt: &Statement,
        kind: SetKind,
        global: bool,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let operands = parse_ca_operands(&stmt.operands_text, stmt.operands_range.start, &mut ctx.ids);
        let mut declared: Vec<(Id, bool)> = Vec::new();
        let mut has_operand = false;

        for op in &operands {
            match op {
                CaOperand::Empty { .. } => continue,
                CaOperand::Var { sym, .. } => {
                    has_operand = true;
                    let name_text = ctx.ids.text_of(sym.name).to_string();
                    match ctx.get_var(sym.name) {
                        Some(VariableSymbol::Set(_)) => {
                            sink.add(diags::error_e051(&name_text, sym.range));
                            continue;
                        }
                        Some(VariableSymbol::MacroParam(_)) => {
                            sink.add(diags::error_e052(&name_text, sym.range));
                            continue;
                        }
                        None => {}
                    }
                    if declared.iter().any(|(name, _)| *name == sym.name) {
                        sink.add(diags::error_e051(&name_text, sym.range));
                    } else {
                        declared.push((sym.name, sym.subscript.is_empty()));
                    }
                }
                other => {
                    sink.add(diags::error_e010("operand", other.range()));
                    return Vec::new();
                }
            }
        }

        if !has_operand {
            sink.add(diags::error_e022(
                "variable symbol definition",
                stmt.instruction_range,
            ));
            return Vec::new();
        }

        if !stmt.label.is_empty() {
            sink.add(diags::warning_w010("label field", stmt.label_range));
        }

        for (name, is_scalar) in declared {
            if global {
                ctx.declare_global(name, kind, is_scalar);
            } else {
                ctx.declare_local(name, kind, is_scalar);
            }
        }
        Vec::new()
    }

    // -----------------------------------------------------------------------
    //  ACTR
    // -----------------------------------------------------------------------

    fn process_actr(
        &self,
        stmt: &Statement,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let reqs = register_seq_sym(stmt, sink);

        let operands = parse_ca_operands(&stmt.operands_text, stmt.operands_range.start, &mut ctx.ids);
        if operands.len() != 1 {
            sink.add(diags::error_e020("operands", stmt.instruction_range));
            return reqs;
        }
        match &operands[0] {
            CaOperand::Expr { expr, .. } => {
                let counter = evaluator::evaluate_arith(expr, ctx, sink);
                ctx.set_branch_counter(counter);
            }
            CaOperand::Var { sym, .. } => {
                let counter = evaluator::eval_var(sym, ctx, sink).as_arith();
                ctx.set_branch_counter(counter);
            }
            other => sink.add(diags::error_e010("operand", other.range())),
        }
        reqs
    }

    // -----------------------------------------------------------------------
    //  AGO
    // -----------------------------------------------------------------------

    fn process_ago(
        &self,
        stmt: &Statement,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let mut reqs = register_seq_sym(stmt, sink);

        let operands = parse_ca_operands(&stmt.operands_text, stmt.operands_range.start, &mut ctx.ids);
        if operands.is_empty() {
            sink.add(diags::error_e022("AGO", stmt.instruction_range));
            return reqs;
        }
        for op in &operands {
            if matches!(op, CaOperand::Empty { .. }) {
                sink.add(diags::error_e010("operand", op.range()));
                return reqs;
            }
        }

        let branch: i32;
        let mut targets: Vec<(Id, open_hlasm_lang_core::Range)> = Vec::new();

        match &operands[0] {
            CaOperand::Seq { name, range } => {
                if operands.len() != 1 {
                    sink.add(diags::error_e010("operand", *range));
                    return reqs;
                }
                branch = 1;
                targets.push((*name, *range));
            }
            CaOperand::Branch {
                condition,
                target,
                target_range,
                ..
            } => {
                branch = evaluator::evaluate_arith(condition, ctx, sink);
                targets.push((*target, *target_range));
                for op in &operands[1..] {
                    match op {
                        CaOperand::Seq { name, range } => targets.push((*name, *range)),
                        other => {
                            sink.add(diags::error_e010("operand", other.range()));
                            return reqs;
                        }
                    }
                }
            }
            other => {
                sink.add(diags::error_e010("operand", other.range()));
                return reqs;
            }
        }

        if branch > 0 && (branch as usize) <= targets.len() {
            let (target, range) = targets[branch as usize - 1];
            reqs.push(ProcessingRequest::Jump {
                target,
                location: Location::new(stmt.file, range),
            });
        }
        reqs
    }

    // -----------------------------------------------------------------------
    //  AIF
    // -----------------------------------------------------------------------

    fn process_aif(
        &self,
        stmt: &Statement,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        let mut reqs = register_seq_sym(stmt, sink);

        let operands = parse_ca_operands(&stmt.operands_text, stmt.operands_range.start, &mut ctx.ids);
        if operands.is_empty() {
            sink.add(diags::error_e022("AIF", stmt.instruction_range));
            return reqs;
        }

        let mut condition = false;
        let mut target: Option<(Id, open_hlasm_lang_core::Range)> = None;
        let mut has_operand = false;

        for (i, op) in operands.iter().enumerate() {
            match op {
                CaOperand::Empty { range } => {
                    // A trailing empty operand is permitted.
                    if i + 1 == operands.len() {
                        continue;
                    }
                    sink.add(diags::error_e010("operand", *range));
                    return reqs;
                }
                CaOperand::Branch {
                    condition: expr,
                    target: name,
                    target_range,
                    ..
                } => {
                    has_operand = true;
                    // The first true condition short-circuits the rest.
                    if !condition && evaluator::evaluate_bool(expr, ctx, sink) {
                        condition = true;
                        target = Some((*name, *target_range));
                    }
                }
                other => {
                    sink.add(diags::error_e010("operand", other.range()));
                    return reqs;
                }
            }
        }

        if !has_operand {
            sink.add(diags::error_e022("AIF", stmt.instruction_range));
            return reqs;
        }

        if let Some((name, range)) = target {
            reqs.push(ProcessingRequest::Jump {
                target: name,
                location: Location::new(stmt.file, range),
            });
        }
        reqs
    }
}

// ---------------------------------------------------------------------------
//  Shared helpers
// ---------------------------------------------------------------------------

/// Register a sequence-symbol label; any other non-empty label is ignored
/// with a warning.
pub fn register_seq_sym(stmt: &Statement, sink: &mut DiagnosticSink) -> Vec<ProcessingRequest> {
    match &stmt.label {
        LabelField::Sequence { name, range } => vec![ProcessingRequest::RegisterSequenceSymbol {
            name: *name,
            location: Location::new(stmt.file, *range),
        }],
        LabelField::Empty => Vec::new(),
        _ => {
            sink.add(diags::warning_w010("name field", stmt.label_range));
            Vec::new()
        }
    }
}

/// Validate a SET assignment target.
///
/// Checks, in order: not a macro parameter (E030), at most one subscript
/// (E020), subscript at least 1 (E012), matching SET kind (E013), matching
/// scalar shape (E013). Returns `Some(subscript)` on success (`None` inside
/// means "no subscript").
fn test_symbol_for_assignment(
    sym: &VarSymRef,
    kind: SetKind,
    ctx: &mut AsmContext,
    sink: &mut DiagnosticSink,
) -> Option<Option<usize>> {
    if let Some(VariableSymbol::MacroParam(_)) = ctx.get_var(sym.name) {
        sink.add(diags::error_e030("symbolic parameter", sym.range));
        return None;
    }

    if sym.subscript.len() > 1 {
        sink.add(diags::error_e020("variable symbol subscripts", sym.range));
        return None;
    }

    let idx = if sym.subscript.len() == 1 {
        let value = evaluator::evaluate_arith(&sym.subscript[0], ctx, sink);
        if value < 1 {
            sink.add(diags::error_e012(
                "subscript value has to be 1 or more",
                sym.range,
            ));
            return None;
        }
        Some(value as usize)
    } else {
        None
    };

    if let Some(VariableSymbol::Set(existing)) = ctx.get_var(sym.name) {
        if existing.kind != kind {
            sink.add(diags::error_e013("wrong type of variable symbol", sym.range));
            return None;
        }
        let subscripted = idx.is_some();
        if existing.is_scalar == subscripted {
            sink.add(diags::error_e013("subscript error", sym.range));
            return None;
        }
    }

    Some(idx)
}
