//! The processing manager.
//!
//! Couples providers and processors: selects the highest-priority unfinished
//! provider, routes its next statement to the top processor, and applies the
//! processor's requests — sequence-symbol registration, CA jumps with
//! snapshot rewinding, macro-definition capture, COPY member inclusion,
//! lookahead, and external macro resolution. The loop ends when the
//! processor stack empties or cancellation is raised; deferred LSP
//! definitions flush only on a normal end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use open_hlasm_lang_core::{normalize_line_endings, Location, Range};

use crate::context::ids::Id;
use crate::context::sequence_symbol::OpencodeSequenceSymbol;
use crate::context::source::{CopyFrame, SourcePosition, SourceSnapshot};
use crate::context::{AsmContext, ProcessingKind, ResolvedSequenceSymbol};
use crate::diags::{self, DiagnosticSink};
use crate::lexer::lex_source;
use crate::library::LibraryProvider;
use crate::semantics::Statement;

use super::copy_processor::CopyProcessor;
use super::empty_processor::EmptyProcessor;
use super::lookahead_processor::{LookaheadProcessor, LookaheadResult};
use super::macrodef_processor::MacroDefProcessor;
use super::ordinary_processor::{invoke_macro, OrdinaryProcessor};
use super::processor::{Processor, StatementProcessor};
use super::provider::{
    CopyProvider, MacroProvider, OpencodeProvider, ProviderKind, StatementProvider,
};
use super::ProcessingRequest;

/// The drive-loop coordinator for one analysis run.
pub struct ProcessingManager<'a> {
    ctx: AsmContext,
    sink: DiagnosticSink,
    lib: &'a dyn LibraryProvider,
    cancel: Option<Arc<AtomicBool>>,
    procs: Vec<Processor>,
    opencode: OpencodeProvider,
    copy_provider: CopyProvider,
    macro_provider: MacroProvider,
}

impl<'a> ProcessingManager<'a> {
    /// Build a manager over the opencode statements for ordinary processing.
    pub fn new(
        ctx: AsmContext,
        statements: Vec<Statement>,
        lib: &'a dyn LibraryProvider,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Self {
        let ordinary = OrdinaryProcessor::new(&ctx);
        Self {
            ctx,
            sink: DiagnosticSink::new(),
            lib,
            cancel,
            procs: vec![Processor::Ordinary(Box::new(ordinary))],
            opencode: OpencodeProvider::new(statements),
            copy_provider: CopyProvider,
            macro_provider: MacroProvider,
        }
    }

    /// Run the drive loop to completion (or cancellation).
    pub fn run(&mut self) {
        while !self.procs.is_empty() {
            if self.cancelled() {
                return;
            }

            let prov_kind = self.select_provider();
            let proc = self.procs.last().expect("checked non-empty");
            if (self.provider_finished(prov_kind) && proc.terminal_condition(prov_kind))
                || proc.finished()
            {
                self.finish_processor();
                continue;
            }

            self.process_next(prov_kind);
        }

        // Flush deferred ordinary-symbol cross references.
        self.ctx.flush_lsp();
    }

    /// Tear the manager apart into its results.
    pub fn into_parts(self) -> (AsmContext, DiagnosticSink) {
        (self.ctx, self.sink)
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    // -----------------------------------------------------------------------
    //  Providers
    // -----------------------------------------------------------------------

    /// The highest-priority unfinished provider for the current processor.
    /// Lookahead is never driven by the macro provider.
    fn select_provider(&self) -> ProviderKind {
        let lookahead_active = matches!(self.procs.last(), Some(Processor::Lookahead(_)));
        if !lookahead_active && !self.macro_provider.finished(&self.ctx) {
            return ProviderKind::Macro;
        }
        if !self.copy_provider.finished(&self.ctx) {
            return ProviderKind::Copy;
        }
        ProviderKind::Opencode
    }

    fn provider_finished(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Macro => self.macro_provider.finished(&self.ctx),
            ProviderKind::Copy => self.copy_provider.finished(&self.ctx),
            ProviderKind::Opencode => self.opencode.finished(&self.ctx),
        }
    }

    fn fetch_from(&mut self, kind: ProviderKind) -> Option<Statement> {
        match kind {
            ProviderKind::Macro => self.macro_provider.fetch(&mut self.ctx, &mut self.sink),
            ProviderKind::Copy => self.copy_provider.fetch(&mut self.ctx, &mut self.sink),
            ProviderKind::Opencode => self.opencode.fetch(&mut self.ctx, &mut self.sink),
        }
    }

    fn process_next(&mut self, kind: ProviderKind) {
        // The pending snapshot re-delivers the statement about to be
        // fetched; sequence-symbol registration captures it.
        self.ctx.source.pending = self.ctx.source.create_snapshot();

        let Some(stmt) = self.fetch_from(kind) else {
            return;
        };

        // Forward-referenced attribute lookups are resolved before the CA
        // statement that needs them is evaluated.
        if matches!(self.procs.last(), Some(Processor::Ordinary(_))) {
            let refs = self.undefined_attr_refs(&stmt);
            if !refs.is_empty() {
                self.lookup_forward_attribute_references(refs);
            }
        }

        let requests = self
            .procs
            .last_mut()
            .expect("checked non-empty")
            .process_statement(stmt, &mut self.ctx, &mut self.sink);
        self.apply_requests(requests);
    }

    // -----------------------------------------------------------------------
    //  Requests
    // -----------------------------------------------------------------------

    fn apply_requests(&mut self, requests: Vec<ProcessingRequest>) {
        for request in requests {
            match request {
                ProcessingRequest::RegisterSequenceSymbol { name, location } => {
                    self.register_sequence_symbol(name, location);
                }
                ProcessingRequest::Jump { target, location } => {
                    self.ctx.lsp.add_seq_reference(target, location);
                    self.jump_in_statements(target, location);
                }
                ProcessingRequest::StartMacroDefinition { location } => {
                    self.start_macro_definition(location);
                }
                ProcessingRequest::StartCopy {
                    member,
                    range,
                    file,
                } => {
                    self.start_copy_member(member, range, file);
                }
                ProcessingRequest::ExternalMacroCall { stmt } => {
                    self.handle_external_macro(stmt);
                }
                ProcessingRequest::EndAssembly => {
                    let end = SourcePosition {
                        statement_index: self.opencode.len(),
                        file_line: self.ctx.source.current_line,
                    };
                    self.opencode.rewind_input(&mut self.ctx, end);
                    self.ctx.source.copy_stack.clear();
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    //  Sequence symbols and jumps
    // -----------------------------------------------------------------------

    /// Register a sequence symbol at the statement being processed. In
    /// macro bodies the definition lives on the macro's own table; in
    /// opencode a re-registration at a different position is `E045`.
    fn register_sequence_symbol(&mut self, name: Id, location: Location) {
        self.ctx.lsp.add_seq_definition(name, location);

        if self.ctx.is_in_macro() {
            return;
        }

        let new_symbol = OpencodeSequenceSymbol {
            name,
            location,
            position: self.ctx.source.pending.position,
            snapshot: self.ctx.source.pending.clone(),
        };
        match self.ctx.opencode_sequence_symbols.get(&name) {
            None => {
                self.ctx.opencode_sequence_symbols.insert(name, new_symbol);
            }
            Some(existing) => {
                if !existing.same_position(&new_symbol) {
                    self.sink
                        .add(diags::error_e045(self.ctx.ids.text_of(name), location.range));
                }
            }
        }
    }

    /// Resolve and perform a CA jump; unresolved opencode targets spawn a
    /// lookahead. Every successful jump decrements the branch counter; an
    /// exhausted counter terminates the macro invocation instead.
    fn jump_in_statements(&mut self, target: Id, location: Location) {
        match self.ctx.resolve_sequence_symbol(target) {
            Some(ResolvedSequenceSymbol::Macro(offset)) => {
                if self.ctx.decrement_branch_counter() {
                    self.ctx.current_scope_mut().current_statement = offset;
                } else {
                    self.ctx.leave_macro();
                }
            }
            Some(ResolvedSequenceSymbol::Opencode(symbol)) => {
                if self.ctx.decrement_branch_counter() {
                    self.perform_opencode_jump(symbol.position, symbol.snapshot);
                }
            }
            None => {
                if self.ctx.is_in_macro() {
                    self.sink.add(diags::error_e047(
                        self.ctx.ids.text_of(target),
                        location.range,
                    ));
                } else {
                    self.start_lookahead(target, location);
                }
            }
        }
    }

    fn perform_opencode_jump(&mut self, position: SourcePosition, snapshot: SourceSnapshot) {
        self.opencode.rewind_input(&mut self.ctx, position);
        self.ctx.source.apply_snapshot(snapshot);
    }

    // -----------------------------------------------------------------------
    //  Sub-processing starts and finishes
    // -----------------------------------------------------------------------

    fn start_macro_definition(&mut self, location: Location) {
        self.ctx.push_processing(ProcessingKind::Macro);
        self.procs
            .push(Processor::MacroDef(MacroDefProcessor::new_inline(location)));
    }

    fn start_lookahead(&mut self, target: Id, location: Location) {
        self.ctx.push_processing(ProcessingKind::Lookahead);
        self.procs.push(Processor::Lookahead(
            LookaheadProcessor::new_sequence(target, location, self.ctx.source.pending.clone()),
        ));
    }

    fn finish_processor(&mut self) {
        let mut processor = self.procs.pop().expect("caller checked non-empty");
        processor.end_processing(&mut self.ctx, &mut self.sink);
        match processor {
            Processor::MacroDef(p) => {
                self.ctx.pop_processing();
                if let Some(def) = p.into_result() {
                    self.ctx.lsp.add_macro_definition(def.name, def.location);
                    self.ctx.add_macro(def);
                }
            }
            Processor::Lookahead(p) => {
                self.ctx.pop_processing();
                if p.is_sequence() {
                    let result = p.into_sequence_result();
                    self.finish_lookahead(result);
                }
            }
            Processor::Ordinary(_) | Processor::Copy(_) | Processor::Empty(_) => {}
        }
    }

    fn finish_lookahead(&mut self, result: LookaheadResult) {
        if result.found {
            // The target was registered during the scan; this resolves now
            // and performs the rewind.
            self.jump_in_statements(result.target, result.location);
        } else {
            self.perform_opencode_jump(result.restore.position, result.restore);
            // Consume one statement with the empty processor so the failed
            // jump statement cannot loop forever.
            self.consume_one_statement();
            self.sink.add(diags::error_e047(
                self.ctx.ids.text_of(result.target),
                result.location.range,
            ));
        }
    }

    fn consume_one_statement(&mut self) {
        let kind = if !self.copy_provider.finished(&self.ctx) {
            ProviderKind::Copy
        } else {
            ProviderKind::Opencode
        };
        if self.provider_finished(kind) {
            return;
        }
        self.ctx.source.pending = self.ctx.source.create_snapshot();
        if let Some(stmt) = self.fetch_from(kind) {
            let mut empty = EmptyProcessor::new();
            let requests = empty.process_statement(stmt, &mut self.ctx, &mut self.sink);
            debug_assert!(requests.is_empty());
        }
    }

    // -----------------------------------------------------------------------
    //  COPY members
    // -----------------------------------------------------------------------

    /// Include a COPY member: capture it on first use (nested
    /// sub-processing over the fetched member text), then push a replay
    /// frame.
    fn start_copy_member(&mut self, member: Id, range: Range, file: open_hlasm_lang_core::FileId) {
        if self.ctx.source.is_copy_active(member) {
            self.sink
                .add(diags::error_e062(self.ctx.ids.text_of(member), range));
            return;
        }

        if !self.ctx.copy_members.contains_key(&member) {
            let member_name = self.ctx.ids.text_of(member).to_string();
            let Some(text) = self.lib.fetch(&member_name) else {
                self.sink.add(diags::error_e058(&member_name, range));
                return;
            };

            let member_file = self.ctx.register_file(&member_name);
            let normalized = normalize_line_endings(&text);
            let statements: Vec<Statement> = lex_source(&normalized, member_file)
                .iter()
                .map(|line| Statement::from_line(line, &mut self.ctx.ids))
                .collect();

            self.ctx.push_processing(ProcessingKind::Copy);
            let mut capture = CopyProcessor::new(member);
            for stmt in statements {
                let requests = capture.process_statement(stmt, &mut self.ctx, &mut self.sink);
                debug_assert!(requests.is_empty());
            }
            capture.end_processing(&mut self.ctx, &mut self.sink);
            self.ctx.pop_processing();

            let record = capture.into_member(Location::new(file, range), member_file);
            self.ctx.add_copy_member(record);
        }

        self.ctx.source.copy_stack.push(CopyFrame {
            member,
            statement_offset: 0,
        });
    }

    // -----------------------------------------------------------------------
    //  External macros
    // -----------------------------------------------------------------------

    /// Resolve an unknown operation code through the library: capture the
    /// member as a macro definition and invoke it, else `E049`.
    fn handle_external_macro(&mut self, stmt: Statement) {
        let name = stmt.instruction;
        let name_text = self.ctx.ids.text_of(name).to_string();

        let Some(text) = self.lib.fetch(&name_text) else {
            self.sink
                .add(diags::error_e049(&name_text, stmt.instruction_range));
            return;
        };

        let member_file = self.ctx.register_file(&name_text);
        let normalized = normalize_line_endings(&text);
        let statements: Vec<Statement> = lex_source(&normalized, member_file)
            .iter()
            .map(|line| Statement::from_line(line, &mut self.ctx.ids))
            .collect();

        self.ctx.push_processing(ProcessingKind::Macro);
        let mut capture = MacroDefProcessor::new_external(
            name,
            Location::new(member_file, Range::default()),
        );
        for stmt in statements {
            if capture.finished() {
                break;
            }
            let requests = capture.process_statement(stmt, &mut self.ctx, &mut self.sink);
            debug_assert!(requests.is_empty());
        }
        capture.end_processing(&mut self.ctx, &mut self.sink);
        self.ctx.pop_processing();

        if let Some(def) = capture.into_result() {
            self.ctx.lsp.add_macro_definition(def.name, def.location);
            self.ctx.add_macro(def);
        }

        if self.ctx.get_macro(name).is_some() {
            invoke_macro(&stmt, &mut self.ctx, &mut self.sink);
        } else {
            self.sink
                .add(diags::error_e049(&name_text, stmt.instruction_range));
        }
    }

    // -----------------------------------------------------------------------
    //  Attribute lookahead
    // -----------------------------------------------------------------------

    /// Undefined ordinary symbols referenced through data attributes in the
    /// CA operands of `stmt`.
    fn undefined_attr_refs(&mut self, stmt: &Statement) -> Vec<Id> {
        let wk = self.ctx.well_known;
        let relevant = stmt.instruction == wk.seta
            || stmt.instruction == wk.setb
            || stmt.instruction == wk.setc
            || stmt.instruction == wk.aif
            || stmt.instruction == wk.ago
            || stmt.instruction == wk.actr;
        if !relevant || !stmt.operands_text.contains('\'') {
            return Vec::new();
        }

        let operands = crate::semantics::parse_ca_operands(
            &stmt.operands_text,
            stmt.operands_range.start,
            &mut self.ctx.ids,
        );
        let mut refs = Vec::new();
        for op in &operands {
            match op {
                crate::semantics::CaOperand::Expr { expr, .. } => {
                    expr.collect_attr_symbols(&mut refs);
                }
                crate::semantics::CaOperand::Branch { condition, .. } => {
                    condition.collect_attr_symbols(&mut refs);
                }
                _ => {}
            }
        }

        let mut out: Vec<Id> = Vec::new();
        for (name, _) in refs {
            if !self.ctx.ord.is_defined(name) && !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }

    /// Scan forward for definitions of the referenced symbols, then restore
    /// the cursor. Only the COPY and opencode providers drive the scan —
    /// attribute lookahead is never relevant inside macro bodies.
    fn lookup_forward_attribute_references(&mut self, refs: Vec<Id>) {
        let resume = self.ctx.source.create_snapshot();
        let mut scanner = LookaheadProcessor::new_attributes(refs, resume.clone());

        loop {
            if self.cancelled() {
                break;
            }
            let kind = if !self.copy_provider.finished(&self.ctx) {
                ProviderKind::Copy
            } else {
                ProviderKind::Opencode
            };
            if self.provider_finished(kind) || scanner.finished() {
                break;
            }
            self.ctx.source.pending = self.ctx.source.create_snapshot();
            let Some(stmt) = self.fetch_from(kind) else {
                continue;
            };
            let requests = scanner.process_statement(stmt, &mut self.ctx, &mut self.sink);
            self.apply_requests(requests);
        }

        self.perform_opencode_jump(resume.position, resume);
    }

    // -----------------------------------------------------------------------
    //  Accessors
    // -----------------------------------------------------------------------

    /// The context (for inspection in tests and tooling).
    pub fn context(&self) -> &AsmContext {
        &self.ctx
    }

    /// Diagnostics collected so far.
    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.sink
    }
}
