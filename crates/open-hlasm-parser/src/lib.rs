//! HLASM static-analysis engine.
//!
//! This crate provides the core of an HLASM language-server engine:
//!
//! - **Lexer** — fixed-format card-image parsing with continuation handling
//! - **Statement pipeline** — cooperating statement providers (opencode,
//!   COPY member, macro body) and processors (ordinary, macro-definition
//!   capture, COPY capture, lookahead) under a reentrant processing manager
//! - **Conditional assembly** — `SET*`, `LCL*`/`GBL*`, `ACTR`, `AGO`, `AIF`,
//!   `MACRO`/`MEND`/`MEXIT` with forward-label lookahead, branch-counter
//!   limiting, and sequence-symbol jumps
//! - **Data definitions** — the `DC`/`DS` type system across ~30 type codes
//!   with modifier-range enforcement and emitted-length computation
//! - **Cross references** — ordinary-symbol, macro, and sequence-symbol
//!   definitions and occurrences for editor tooling
//!
//! Diagnostics are data: the engine never aborts on malformed source.
//!
//! # Example
//!
//! ```
//! use open_hlasm_parser::{Analyzer, MapLibrary};
//!
//! let source = "\
//! &I       SETA  5
//! X        DS    F
//! ";
//! let lib = MapLibrary::new();
//! let result = Analyzer::new(source, "example.hlasm", &lib).analyze();
//! assert!(result.diagnostics.is_empty());
//! ```

pub mod checking;
pub mod context;
pub mod diags;
pub mod evaluator;
pub mod expressions;
pub mod instructions;
pub mod lexer;
pub mod library;
pub mod lsp;
pub mod processing;
pub mod semantics;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use open_hlasm_lang_core::{normalize_line_endings, Diagnostic, FileId};

use context::AsmContext;
use processing::ProcessingManager;
use semantics::Statement;

pub use library::{EmptyLibrary, LibraryProvider, MapLibrary};
pub use lsp::LspContext;

/// Everything one analysis run produces.
#[derive(Debug)]
pub struct AnalysisResult {
    /// Diagnostics in emission order.
    pub diagnostics: Vec<Diagnostic>,
    /// The final assembly context (symbol tables, registries, cross
    /// references).
    pub context: AsmContext,
}

impl AnalysisResult {
    /// The cross-reference tables.
    pub fn xref(&self) -> &LspContext {
        &self.context.lsp
    }

    /// Diagnostic codes in emission order (convenience for tooling/tests).
    pub fn codes(&self) -> Vec<&str> {
        self.diagnostics.iter().map(|d| d.code.as_str()).collect()
    }
}

/// One-shot analyzer for a single source unit.
pub struct Analyzer<'a> {
    source: &'a str,
    file_name: &'a str,
    lib: &'a dyn LibraryProvider,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Analyzer<'a> {
    /// Create an analyzer over `source`. COPY members and external macros
    /// resolve through `lib`.
    pub fn new(source: &'a str, file_name: &'a str, lib: &'a dyn LibraryProvider) -> Self {
        Self {
            source,
            file_name,
            lib,
            cancel: None,
        }
    }

    /// Attach a cancellation flag; the drive loop consults it before every
    /// statement.
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run the analysis.
    pub fn analyze(self) -> AnalysisResult {
        let mut ctx = AsmContext::new(self.file_name);

        let normalized = normalize_line_endings(self.source);
        let statements: Vec<Statement> = lexer::lex_source(&normalized, FileId::MAIN)
            .iter()
            .map(|line| Statement::from_line(line, &mut ctx.ids))
            .collect();

        let mut manager = ProcessingManager::new(ctx, statements, self.lib, self.cancel);
        manager.run();
        let (context, sink) = manager.into_parts();

        AnalysisResult {
            diagnostics: sink.into_diagnostics(),
            context,
        }
    }
}
