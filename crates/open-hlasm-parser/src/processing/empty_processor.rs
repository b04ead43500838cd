//! The empty processor: consumes one statement with no effects.
//!
//! Used after a failed lookahead to guarantee forward progress — the
//! statement that triggered the failed jump is consumed here so the drive
//! loop cannot retry it forever.

use crate::context::{AsmContext, ProcessingKind};
use crate::diags::DiagnosticSink;
use crate::semantics::Statement;

use super::processor::StatementProcessor;
use super::provider::ProviderKind;
use super::ProcessingRequest;

#[derive(Debug, Default)]
pub struct EmptyProcessor {
    consumed: bool,
}

impl EmptyProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatementProcessor for EmptyProcessor {
    fn kind(&self) -> ProcessingKind {
        ProcessingKind::Ordinary
    }

    fn finished(&self) -> bool {
        self.consumed
    }

    fn terminal_condition(&self, _provider_kind: ProviderKind) -> bool {
        true
    }

    fn process_statement(
        &mut self,
        _stmt: Statement,
        _ctx: &mut AsmContext,
        _sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        self.consumed = true;
        Vec::new()
    }

    fn end_processing(&mut self, _ctx: &mut AsmContext, _sink: &mut DiagnosticSink) {}
}
