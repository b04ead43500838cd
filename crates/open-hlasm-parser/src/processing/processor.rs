//! Statement processors.
//!
//! A processor consumes statements under one processing state. The manager
//! keeps a stack of processors; the top one receives every delivered
//! statement until it reports `finished()` or its terminal condition is met.

use crate::context::{AsmContext, ProcessingKind};
use crate::diags::DiagnosticSink;
use crate::semantics::Statement;

use super::copy_processor::CopyProcessor;
use super::empty_processor::EmptyProcessor;
use super::lookahead_processor::LookaheadProcessor;
use super::macrodef_processor::MacroDefProcessor;
use super::ordinary_processor::OrdinaryProcessor;
use super::provider::ProviderKind;
use super::ProcessingRequest;

/// Contract of a statement processor.
pub trait StatementProcessor {
    /// The processing kind this processor implements.
    fn kind(&self) -> ProcessingKind;

    /// Whether the processor has completed on its own.
    fn finished(&self) -> bool;

    /// Whether the exhaustion of a provider of `provider_kind` ends this
    /// processor.
    fn terminal_condition(&self, provider_kind: ProviderKind) -> bool;

    /// Consume one statement; returns requests for the manager.
    fn process_statement(
        &mut self,
        stmt: Statement,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest>;

    /// Called once when the processor is finished and popped.
    fn end_processing(&mut self, ctx: &mut AsmContext, sink: &mut DiagnosticSink);
}

/// The processor stack element.
#[derive(Debug)]
pub enum Processor {
    Ordinary(Box<OrdinaryProcessor>),
    MacroDef(MacroDefProcessor),
    Copy(CopyProcessor),
    Lookahead(LookaheadProcessor),
    Empty(EmptyProcessor),
}

impl StatementProcessor for Processor {
    fn kind(&self) -> ProcessingKind {
        match self {
            Processor::Ordinary(p) => p.kind(),
            Processor::MacroDef(p) => p.kind(),
            Processor::Copy(p) => p.kind(),
            Processor::Lookahead(p) => p.kind(),
            Processor::Empty(p) => p.kind(),
        }
    }

    fn finished(&self) -> bool {
        match self {
            Processor::Ordinary(p) => p.finished(),
            Processor::MacroDef(p) => p.finished(),
            Processor::Copy(p) => p.finished(),
            Processor::Lookahead(p) => p.finished(),
            Processor::Empty(p) => p.finished(),
        }
    }

    fn terminal_condition(&self, provider_kind: ProviderKind) -> bool {
        match self {
            Processor::Ordinary(p) => p.terminal_condition(provider_kind),
            Processor::MacroDef(p) => p.terminal_condition(provider_kind),
            Processor::Copy(p) => p.terminal_condition(provider_kind),
            Processor::Lookahead(p) => p.terminal_condition(provider_kind),
            Processor::Empty(p) => p.terminal_condition(provider_kind),
        }
    }

    fn process_statement(
        &mut self,
        stmt: Statement,
        ctx: &mut AsmContext,
        sink: &mut DiagnosticSink,
    ) -> Vec<ProcessingRequest> {
        match self {
            Processor::Ordinary(p) => p.process_statement(stmt, ctx, sink),
            Processor::MacroDef(p) => p.process_statement(stmt, ctx, sink),
            Processor::Copy(p) => p.process_statement(stmt, ctx, sink),
            Processor::Lookahead(p) => p.process_statement(stmt, ctx, sink),
            Processor::Empty(p) => p.process_statement(stmt, ctx, sink),
        }
    }

    fn end_processing(&mut self, ctx: &mut AsmContext, sink: &mut DiagnosticSink) {
        match self {
            Processor::Ordinary(p) => p.end_processing(ctx, sink),
            Processor::MacroDef(p) => p.end_processing(ctx, sink),
            Processor::Copy(p) => p.end_processing(ctx, sink),
            Processor::Lookahead(p) => p.end_processing(ctx, sink),
            Processor::Empty(p) => p.end_processing(ctx, sink),
        }
    }
}
