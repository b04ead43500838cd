//! Macro definitions and invocation scopes.
//!
//! A [`MacroDef`] is the immutable result of macro-definition capture: the
//! prototype (name, name parameter, positional/keyword parameters), the
//! captured body, and the sequence symbols within it. A [`CodeScope`] is one
//! frame of the invocation stack; the bottom frame is the opencode scope.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use open_hlasm_lang_core::Location;

use crate::context::ids::Id;
use crate::context::variables::VariableSymbol;
use crate::semantics::Statement;

/// Default branch counter of a fresh scope (HLASM `ACTR` default).
pub const DEFAULT_BRANCH_COUNTER: i32 = 4096;

/// Kind of a prototype parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroParamKind {
    /// Bound by position at invocation.
    Positional,
    /// Bound by `NAME=value`; the default applies when absent.
    Keyword { default: String },
}

/// One symbolic parameter of a macro prototype.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroArgSpec {
    pub name: Id,
    pub kind: MacroParamKind,
}

/// An immutable macro definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    pub name: Id,
    /// The name-field parameter of the prototype (`&LABEL MAC ...`), or
    /// [`Id::EMPTY`].
    pub name_param: Id,
    pub params: Vec<MacroArgSpec>,
    /// Captured body statements (raw; substituted at expansion).
    pub body: Vec<Rc<Statement>>,
    /// Sequence symbols within the body: name to statement offset.
    pub sequence_symbols: HashMap<Id, usize>,
    pub location: Location,
}

/// One frame of the scope stack.
///
/// The bottom frame (opencode) has no macro definition. Each frame owns its
/// local variable symbols, its links to globals, and its branch counter.
#[derive(Debug)]
pub struct CodeScope {
    /// The macro being expanded, if this is an invocation frame.
    pub macro_def: Option<Rc<MacroDef>>,
    /// Index of the next body statement to expand.
    pub current_statement: usize,
    /// Local SET symbols and bound macro parameters.
    pub variables: HashMap<Id, VariableSymbol>,
    /// Names declared with `GBL*` in this scope; they resolve to the global
    /// storage.
    pub global_links: HashSet<Id>,
    /// `ACTR` branch counter for this scope.
    pub branch_counter: i32,
}

impl CodeScope {
    /// The opencode (bottom) scope.
    pub fn opencode() -> Self {
        Self {
            macro_def: None,
            current_statement: 0,
            variables: HashMap::new(),
            global_links: HashSet::new(),
            branch_counter: DEFAULT_BRANCH_COUNTER,
        }
    }

    /// A macro invocation frame.
    pub fn invocation(def: Rc<MacroDef>) -> Self {
        Self {
            macro_def: Some(def),
            current_statement: 0,
            variables: HashMap::new(),
            global_links: HashSet::new(),
            branch_counter: DEFAULT_BRANCH_COUNTER,
        }
    }

    /// Whether this frame expands a macro.
    pub fn is_macro(&self) -> bool {
        self.macro_def.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opencode_scope() {
        let scope = CodeScope::opencode();
        assert!(!scope.is_macro());
        assert_eq!(scope.branch_counter, DEFAULT_BRANCH_COUNTER);
    }

    #[test]
    fn test_invocation_scope() {
        let def = Rc::new(MacroDef {
            name: Id::EMPTY,
            name_param: Id::EMPTY,
            params: Vec::new(),
            body: Vec::new(),
            sequence_symbols: HashMap::new(),
            location: Location::default(),
        });
        let scope = CodeScope::invocation(def);
        assert!(scope.is_macro());
        assert_eq!(scope.current_statement, 0);
    }
}
