//! The assembly context — mutable state of one analysis run.
//!
//! [`AsmContext`] owns the interner, the variable-symbol scopes (global
//! storage plus the invocation stack), the ordinary symbol table, the macro
//! and COPY registries, the opencode source state, the processing-kind
//! stack, and the LSP cross-reference tables. Exactly one processor mutates
//! it at a time.

pub mod copy_member;
pub mod ids;
pub mod macros;
pub mod ordinary;
pub mod sequence_symbol;
pub mod source;
pub mod variables;

use std::collections::HashMap;
use std::rc::Rc;

use open_hlasm_lang_core::FileId;

use crate::lsp::LspContext;
use copy_member::CopyMember;
use ids::{Id, IdStorage};
use macros::{CodeScope, MacroDef, MacroParamKind};
use ordinary::OrdinarySymbolTable;
use sequence_symbol::OpencodeSequenceSymbol;
use source::SourceState;
use variables::{MacroParamValue, SetKind, SetSymbol, VariableSymbol};

// ---------------------------------------------------------------------------
//  Processing kinds
// ---------------------------------------------------------------------------

/// What kind of statement processing is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingKind {
    Ordinary,
    Macro,
    Copy,
    Lookahead,
}

// ---------------------------------------------------------------------------
//  Well-known instruction ids
// ---------------------------------------------------------------------------

/// Interned ids of the instructions the engine dispatches on, built once at
/// context start.
#[derive(Debug, Clone, Copy)]
pub struct WellKnownIds {
    pub seta: Id,
    pub setb: Id,
    pub setc: Id,
    pub lcla: Id,
    pub lclb: Id,
    pub lclc: Id,
    pub gbla: Id,
    pub gblb: Id,
    pub gblc: Id,
    pub anop: Id,
    pub actr: Id,
    pub ago: Id,
    pub aif: Id,
    pub r#macro: Id,
    pub mend: Id,
    pub mexit: Id,
    pub aread: Id,
    pub aspace: Id,
    pub aeject: Id,

    pub dc: Id,
    pub ds: Id,
    pub equ: Id,
    pub copy: Id,
    pub csect: Id,
    pub dsect: Id,
    pub start: Id,
    pub end: Id,
    pub using: Id,
    pub drop: Id,
    pub org: Id,
    pub ltorg: Id,
    pub print: Id,
    pub title: Id,
    pub space: Id,
    pub eject: Id,
    pub mnote: Id,
}

impl WellKnownIds {
    fn new(ids: &mut IdStorage) -> Self {
        Self {
            seta: ids.add("SETA"),
            setb: ids.add("SETB"),
            setc: ids.add("SETC"),
            lcla: ids.add("LCLA"),
            lclb: ids.add("LCLB"),
            lclc: ids.add("LCLC"),
            gbla: ids.add("GBLA"),
            gblb: ids.add("GBLB"),
            gblc: ids.add("GBLC"),
            anop: ids.add("ANOP"),
            actr: ids.add("ACTR"),
            ago: ids.add("AGO"),
            aif: ids.add("AIF"),
            r#macro: ids.add("MACRO"),
            mend: ids.add("MEND"),
            mexit: ids.add("MEXIT"),
            aread: ids.add("AREAD"),
            aspace: ids.add("ASPACE"),
            aeject: ids.add("AEJECT"),
            dc: ids.add("DC"),
            ds: ids.add("DS"),
            equ: ids.add("EQU"),
            copy: ids.add("COPY"),
            csect: ids.add("CSECT"),
            dsect: ids.add("DSECT"),
            start: ids.add("START"),
            end: ids.add("END"),
            using: ids.add("USING"),
            drop: ids.add("DROP"),
            org: ids.add("ORG"),
            ltorg: ids.add("LTORG"),
            print: ids.add("PRINT"),
            title: ids.add("TITLE"),
            space: ids.add("SPACE"),
            eject: ids.add("EJECT"),
            mnote: ids.add("MNOTE"),
        }
    }
}

// ---------------------------------------------------------------------------
//  A resolved sequence symbol
// ---------------------------------------------------------------------------

/// Result of resolving a sequence symbol in the current scope.
#[derive(Debug, Clone)]
pub enum ResolvedSequenceSymbol {
    /// Offset into the current macro body.
    Macro(usize),
    /// An opencode symbol with rewind state.
    Opencode(OpencodeSequenceSymbol),
}

// ---------------------------------------------------------------------------
//  The context
// ---------------------------------------------------------------------------

/// Mutable state of one analysis run.
#[derive(Debug)]
pub struct AsmContext {
    /// Identifier interner.
    pub ids: IdStorage,
    /// Well-known instruction ids.
    pub well_known: WellKnownIds,
    /// Global SET symbol storage (`GBL*`).
    pub globals: HashMap<Id, VariableSymbol>,
    /// Scope stack; the bottom frame is the opencode scope.
    pub scope_stack: Vec<CodeScope>,
    /// Ordinary symbol table.
    pub ord: OrdinarySymbolTable,
    /// Registered macros by name.
    pub macros: HashMap<Id, Rc<MacroDef>>,
    /// Registered COPY members by name.
    pub copy_members: HashMap<Id, Rc<CopyMember>>,
    /// Opencode sequence symbols.
    pub opencode_sequence_symbols: HashMap<Id, OpencodeSequenceSymbol>,
    /// Opencode source state (cursor, COPY stack, snapshots).
    pub source: SourceState,
    /// Active statement-processing kinds, outermost first.
    pub processing_stack: Vec<ProcessingKind>,
    /// Cross-reference tables.
    pub lsp: LspContext,
    /// Registered source files; index is the [`FileId`].
    files: Vec<String>,
    /// Monotonic macro invocation counter (`&SYSNDX`).
    invocation_counter: u32,
}

impl AsmContext {
    /// Create a fresh context for one analysis run.
    pub fn new(main_file: &str) -> Self {
        let mut ids = IdStorage::new();
        let well_known = WellKnownIds::new(&mut ids);
        Self {
            ids,
            well_known,
            globals: HashMap::new(),
            scope_stack: vec![CodeScope::opencode()],
            ord: OrdinarySymbolTable::new(),
            macros: HashMap::new(),
            copy_members: HashMap::new(),
            opencode_sequence_symbols: HashMap::new(),
            source: SourceState::default(),
            processing_stack: vec![ProcessingKind::Ordinary],
            lsp: LspContext::default(),
            files: vec![main_file.to_string()],
            invocation_counter: 0,
        }
    }

    // --- files -------------------------------------------------------------

    /// Register a source file and return its id.
    pub fn register_file(&mut self, name: &str) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(name.to_string());
        id
    }

    /// The name of a registered file.
    pub fn file_name(&self, file: FileId) -> &str {
        &self.files[file.0 as usize]
    }

    // --- scopes and variables ----------------------------------------------

    /// The current (innermost) scope.
    pub fn current_scope(&self) -> &CodeScope {
        self.scope_stack.last().expect("scope stack never empty")
    }

    /// The current (innermost) scope, mutably.
    pub fn current_scope_mut(&mut self) -> &mut CodeScope {
        self.scope_stack.last_mut().expect("scope stack never empty")
    }

    /// Whether a macro invocation is active.
    pub fn is_in_macro(&self) -> bool {
        self.current_scope().is_macro()
    }

    /// Resolve a variable symbol visible in the current scope: locals and
    /// bound parameters first, then names declared global in this scope.
    pub fn get_var(&self, name: Id) -> Option<&VariableSymbol> {
        let scope = self.current_scope();
        if let Some(var) = scope.variables.get(&name) {
            return Some(var);
        }
        if scope.global_links.contains(&name) {
            return self.globals.get(&name);
        }
        None
    }

    /// Mutable variant of [`Self::get_var`].
    pub fn get_var_mut(&mut self, name: Id) -> Option<&mut VariableSymbol> {
        let scope = self.scope_stack.last_mut().expect("scope stack never empty");
        if scope.variables.contains_key(&name) {
            return scope.variables.get_mut(&name);
        }
        if scope.global_links.contains(&name) {
            return self.globals.get_mut(&name);
        }
        None
    }

    /// Declare a local SET symbol in the current scope.
    pub fn declare_local(&mut self, name: Id, kind: SetKind, is_scalar: bool) {
        self.current_scope_mut()
            .variables
            .insert(name, VariableSymbol::Set(SetSymbol::new(kind, is_scalar)));
    }

    /// Declare a global SET symbol and link it into the current scope.
    /// An existing global of the same name is reused.
    pub fn declare_global(&mut self, name: Id, kind: SetKind, is_scalar: bool) {
        self.globals
            .entry(name)
            .or_insert_with(|| VariableSymbol::Set(SetSymbol::new(kind, is_scalar)));
        self.current_scope_mut().global_links.insert(name);
    }

    // --- macros ------------------------------------------------------------

    /// Register a completed macro definition.
    pub fn add_macro(&mut self, def: MacroDef) {
        self.macros.insert(def.name, Rc::new(def));
    }

    /// Look up a registered macro.
    pub fn get_macro(&self, name: Id) -> Option<&Rc<MacroDef>> {
        self.macros.get(&name)
    }

    /// Enter a macro invocation: push a scope with bound parameters.
    pub fn enter_macro(
        &mut self,
        def: Rc<MacroDef>,
        name_value: String,
        positional: Vec<String>,
        keywords: HashMap<Id, String>,
    ) {
        self.invocation_counter += 1;
        let mut scope = CodeScope::invocation(Rc::clone(&def));

        if !def.name_param.is_empty() {
            scope.variables.insert(
                def.name_param,
                VariableSymbol::MacroParam(MacroParamValue { value: name_value }),
            );
        }

        let mut next_positional = positional.into_iter();
        for param in &def.params {
            let value = match &param.kind {
                MacroParamKind::Positional => next_positional.next().unwrap_or_default(),
                MacroParamKind::Keyword { default } => keywords
                    .get(&param.name)
                    .cloned()
                    .unwrap_or_else(|| default.clone()),
            };
            scope
                .variables
                .insert(param.name, VariableSymbol::MacroParam(MacroParamValue { value }));
        }

        let sysndx = self.ids.add("SYSNDX");
        scope.variables.insert(
            sysndx,
            VariableSymbol::MacroParam(MacroParamValue {
                value: format!("{:04}", self.invocation_counter),
            }),
        );

        self.scope_stack.push(scope);
    }

    /// Leave the current macro invocation.
    pub fn leave_macro(&mut self) {
        debug_assert!(self.is_in_macro());
        if self.scope_stack.len() > 1 {
            self.scope_stack.pop();
        }
    }

    // --- branch counter ----------------------------------------------------

    /// Set the current scope's branch counter (`ACTR`).
    pub fn set_branch_counter(&mut self, value: i32) {
        self.current_scope_mut().branch_counter = value;
    }

    /// The current scope's branch counter.
    pub fn branch_counter(&self) -> i32 {
        self.current_scope().branch_counter
    }

    /// Account for a successful CA jump. Returns `false` when the counter is
    /// exhausted — the jump must not be taken and, inside a macro, the
    /// invocation terminates.
    pub fn decrement_branch_counter(&mut self) -> bool {
        let scope = self.current_scope_mut();
        if scope.branch_counter <= 0 {
            return false;
        }
        scope.branch_counter -= 1;
        true
    }

    // --- sequence symbols --------------------------------------------------

    /// Resolve a sequence symbol in the current scope.
    pub fn resolve_sequence_symbol(&self, name: Id) -> Option<ResolvedSequenceSymbol> {
        if let Some(def) = &self.current_scope().macro_def {
            return def
                .sequence_symbols
                .get(&name)
                .map(|&off| ResolvedSequenceSymbol::Macro(off));
        }
        self.opencode_sequence_symbols
            .get(&name)
            .map(|sym| ResolvedSequenceSymbol::Opencode(sym.clone()))
    }

    // --- COPY members ------------------------------------------------------

    /// Register a captured COPY member.
    pub fn add_copy_member(&mut self, member: CopyMember) {
        self.copy_members.insert(member.name, Rc::new(member));
    }

    // --- processing kinds --------------------------------------------------

    /// Push a processing kind (entering nested sub-processing).
    pub fn push_processing(&mut self, kind: ProcessingKind) {
        self.processing_stack.push(kind);
    }

    /// Pop the innermost processing kind.
    pub fn pop_processing(&mut self) {
        debug_assert!(self.processing_stack.len() > 1);
        self.processing_stack.pop();
    }

    /// The innermost active processing kind.
    pub fn current_processing(&self) -> ProcessingKind {
        *self
            .processing_stack
            .last()
            .expect("processing stack never empty")
    }

    // --- cross references ----------------------------------------------------

    /// Resolve deferred LSP records against the ordinary symbol table.
    pub fn flush_lsp(&mut self) {
        let Self { lsp, ord, .. } = self;
        lsp.flush(ord);
    }

    // --- test/tooling access -----------------------------------------------

    /// Read a SET symbol value by name (scalar: index 1).
    pub fn set_symbol_value(&self, name: &str, idx: usize) -> Option<variables::SetValue> {
        let id = self.ids.find(name)?;
        match self.get_var(id)? {
            VariableSymbol::Set(sym) => Some(sym.get(idx)),
            VariableSymbol::MacroParam(_) => None,
        }
    }

    /// Read a global SET symbol value directly.
    pub fn global_value(&self, name: &str, idx: usize) -> Option<variables::SetValue> {
        let id = self.ids.find(name)?;
        match self.globals.get(&id)? {
            VariableSymbol::Set(sym) => Some(sym.get(idx)),
            VariableSymbol::MacroParam(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macros::MacroArgSpec;
    use open_hlasm_lang_core::Location;

    #[test]
    fn test_scope_stack_starts_with_opencode() {
        let ctx = AsmContext::new("main.hlasm");
        assert_eq!(ctx.scope_stack.len(), 1);
        assert!(!ctx.is_in_macro());
        assert_eq!(ctx.current_processing(), ProcessingKind::Ordinary);
    }

    #[test]
    fn test_declare_and_get_local() {
        let mut ctx = AsmContext::new("main.hlasm");
        let name = ctx.ids.add("I");
        ctx.declare_local(name, SetKind::Arith, true);
        assert!(matches!(ctx.get_var(name), Some(VariableSymbol::Set(_))));
    }

    #[test]
    fn test_global_requires_link() {
        let mut ctx = AsmContext::new("main.hlasm");
        let name = ctx.ids.add("G");
        ctx.declare_global(name, SetKind::Arith, true);
        assert!(ctx.get_var(name).is_some());

        // A fresh macro scope does not see the global until declared there.
        let def = Rc::new(MacroDef {
            name: ctx.ids.add("M"),
            name_param: Id::EMPTY,
            params: Vec::new(),
            body: Vec::new(),
            sequence_symbols: HashMap::new(),
            location: Location::default(),
        });
        ctx.enter_macro(def, String::new(), Vec::new(), HashMap::new());
        assert!(ctx.get_var(name).is_none());
        ctx.declare_global(name, SetKind::Arith, true);
        assert!(ctx.get_var(name).is_some());
        ctx.leave_macro();
    }

    #[test]
    fn test_branch_counter_trips_at_zero() {
        let mut ctx = AsmContext::new("main.hlasm");
        ctx.set_branch_counter(1);
        assert!(ctx.decrement_branch_counter());
        assert!(!ctx.decrement_branch_counter());
    }

    #[test]
    fn test_branch_counter_negative_trips_immediately() {
        let mut ctx = AsmContext::new("main.hlasm");
        ctx.set_branch_counter(-5);
        assert!(!ctx.decrement_branch_counter());
    }

    #[test]
    fn test_enter_macro_binds_params() {
        let mut ctx = AsmContext::new("main.hlasm");
        let p1 = ctx.ids.add("P1");
        let key = ctx.ids.add("KEY");
        let def = Rc::new(MacroDef {
            name: ctx.ids.add("M"),
            name_param: ctx.ids.add("LBL"),
            params: vec![
                MacroArgSpec {
                    name: p1,
                    kind: MacroParamKind::Positional,
                },
                MacroArgSpec {
                    name: key,
                    kind: MacroParamKind::Keyword {
                        default: "DFLT".to_string(),
                    },
                },
            ],
            body: Vec::new(),
            sequence_symbols: HashMap::new(),
            location: Location::default(),
        });
        ctx.enter_macro(def, "NAME".into(), vec!["ARG1".into()], HashMap::new());

        let got = |ctx: &AsmContext, n: &str| -> String {
            let id = ctx.ids.find(n).unwrap();
            ctx.get_var(id)
                .and_then(|v| v.as_macro_param())
                .map(|p| p.value.clone())
                .unwrap()
        };
        assert_eq!(got(&ctx, "P1"), "ARG1");
        assert_eq!(got(&ctx, "KEY"), "DFLT");
        assert_eq!(got(&ctx, "LBL"), "NAME");
        assert_eq!(got(&ctx, "SYSNDX"), "0001");
    }
}
