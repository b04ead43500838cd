//! Statement providers.
//!
//! A provider is a pull source of logical statements. Providers are totally
//! ordered by priority: macro body > COPY member > opencode. The manager
//! always drives the highest-priority unfinished provider.

use std::rc::Rc;

use crate::context::source::SourcePosition;
use crate::context::AsmContext;
use crate::diags::DiagnosticSink;
use crate::semantics::Statement;

use super::{is_ca_instruction, substitute_variables};

/// Provider kinds, in priority order (highest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Macro,
    Copy,
    Opencode,
}

/// A pull source of statements.
pub trait StatementProvider {
    /// This provider's kind.
    fn kind(&self) -> ProviderKind;

    /// Whether the provider has no more statements to deliver.
    fn finished(&self, ctx: &AsmContext) -> bool;

    /// Fetch the next statement, advancing the cursor. `None` means the
    /// provider only performed internal bookkeeping (e.g. popping an
    /// exhausted frame) — the drive loop simply re-iterates.
    fn fetch(&mut self, ctx: &mut AsmContext, sink: &mut DiagnosticSink) -> Option<Statement>;
}

// ---------------------------------------------------------------------------
//  Opencode provider
// ---------------------------------------------------------------------------

/// Delivers the pre-parsed statements of the opencode file. The cursor lives
/// in the context's source state so that snapshots capture it.
#[derive(Debug)]
pub struct OpencodeProvider {
    statements: Vec<Rc<Statement>>,
}

impl OpencodeProvider {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            statements: statements.into_iter().map(Rc::new).collect(),
        }
    }

    /// Number of statements in the file.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the file has no statements.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Re-seat the cursor at a prior position (sequence-symbol jump or
    /// lookahead rollback).
    pub fn rewind_input(&self, ctx: &mut AsmContext, position: SourcePosition) {
        ctx.source.next_statement = position.statement_index;
        ctx.source.current_line = position.file_line;
    }
}

impl StatementProvider for OpencodeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Opencode
    }

    fn finished(&self, ctx: &AsmContext) -> bool {
        ctx.source.next_statement >= self.statements.len()
    }

    fn fetch(&mut self, ctx: &mut AsmContext, _sink: &mut DiagnosticSink) -> Option<Statement> {
        let idx = ctx.source.next_statement;
        let stmt = self.statements.get(idx)?;
        ctx.source.next_statement = idx + 1;
        ctx.source.current_line = stmt.line;
        Some(stmt.as_ref().clone())
    }
}

// ---------------------------------------------------------------------------
//  COPY provider
// ---------------------------------------------------------------------------

/// Replays registered COPY member bodies through the context's COPY stack.
/// Nested `COPY` statements push further frames during processing.
#[derive(Debug, Default)]
pub struct CopyProvider;

impl StatementProvider for CopyProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Copy
    }

    fn finished(&self, ctx: &AsmContext) -> bool {
        !ctx.source.copy_stack.iter().any(|frame| {
            ctx.copy_members
                .get(&frame.member)
                .map(|m| frame.statement_offset < m.body.len())
                .unwrap_or(false)
        })
    }

    fn fetch(&mut self, ctx: &mut AsmContext, _sink: &mut DiagnosticSink) -> Option<Statement> {
        loop {
            let frame = ctx.source.copy_stack.last()?;
            let member = Rc::clone(ctx.copy_members.get(&frame.member)?);
            if frame.statement_offset >= member.body.len() {
                ctx.source.copy_stack.pop();
                continue;
            }
            let offset = frame.statement_offset;
            ctx.source
                .copy_stack
                .last_mut()
                .expect("frame checked above")
                .statement_offset = offset + 1;
            return Some(member.body[offset].as_ref().clone());
        }
    }
}

// ---------------------------------------------------------------------------
//  Macro provider
// ---------------------------------------------------------------------------

/// Expands the innermost macro invocation. Parameter and variable
/// substitution happens during statement fetch; the substituted fields are
/// re-parsed through the statement-field parser. Operands of CA statements
/// are left unsubstituted — their variable references are resolved by the
/// evaluator against the invocation scope.
#[derive(Debug, Default)]
pub struct MacroProvider;

impl StatementProvider for MacroProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Macro
    }

    fn finished(&self, ctx: &AsmContext) -> bool {
        !ctx.is_in_macro()
    }

    fn fetch(&mut self, ctx: &mut AsmContext, sink: &mut DiagnosticSink) -> Option<Statement> {
        let scope = ctx.current_scope();
        let def = Rc::clone(scope.macro_def.as_ref()?);
        let idx = scope.current_statement;

        if idx >= def.body.len() {
            ctx.leave_macro();
            return None;
        }
        ctx.current_scope_mut().current_statement = idx + 1;

        let raw = def.body[idx].as_ref();
        let instruction = substitute_variables(&raw.instruction_text, ctx, sink);

        // CA operands are evaluated against the scope, not substituted;
        // substituting would destroy assignment targets and declarations.
        let is_ca = ctx
            .ids
            .find(&instruction)
            .map(|id| !id.is_empty() && is_ca_instruction(&ctx.well_known, id))
            .unwrap_or(false);
        let operands = if is_ca {
            raw.operands_text.clone()
        } else {
            substitute_variables(&raw.operands_text, ctx, sink)
        };

        Some(raw.reparse(&instruction, &operands, &mut ctx.ids))
    }
}
