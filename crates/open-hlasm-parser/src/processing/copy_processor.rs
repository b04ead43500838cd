//! COPY member capture.
//!
//! Captures the statements of a fetched library member verbatim — including
//! nested `COPY` statements, which are re-processed when the member body is
//! replayed.

use std::rc::Rc;

use open_hlasm_lang_core::{FileId, Location};

use crate::context::copy_member::CopyMember;
use crate::context::ids::Id;
use crate::context::{AsmContext, ProcessingKind};
use crate::diags::DiagnosticSink;
use crate::semantics::Statement;

use super::processor::StatementProcessor;
use super::provider::ProviderKind;
use super::ProcessingRequest;

#[derive(Debug)]
pub struct CopyProcessor {
    member: Id,
    body: Vec<Rc<Statement>>,
}

impl CopyProcessor {
    pub fn new(member: Id) -> Self {
        Self {
            member,
            body: Vec::new(),
        }
    }

    /// Finish the capture into a registry record.
    pub fn into_member(self, location: Location, file: FileId) -> CopyMember {
        CopyMember {
            name: self.member,
            body: self.body,
            location,
            file,
        }
    }
}

impl StatementProcessor for CopyProcessor {
    fn kind(&self) -> ProcessingKind {
        ProcessingKind::Copy
    }

    fn finished(&self) -> bool {
        false
    }

    fn terminal_condition(&self, _provider_kind: ProviderKind) -> bool {
        true
    }

    fn process_statement(
        &mut self,
        stmt: Statement,
        _ctx: &mut AsmContext,
        _sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        self.body.push(Rc::new(stmt));
        Vec::new()
    }

    fn end_processing(&mut self, _ctx: &mut AsmContext, _sink: &mut DiagnosticSink) {}
}
