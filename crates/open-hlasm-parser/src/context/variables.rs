//! Variable symbols: SET symbols and macro parameters.
//!
//! SET symbols carry one of three value kinds (arithmetic, boolean,
//! character) and are either scalar or subscripted; subscripted symbols are
//! sparse 1-based arrays. Macro parameters are read-only character values
//! bound at macro entry.

use std::collections::HashMap;
use std::fmt;

/// The declared kind of a SET symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetKind {
    /// `SETA` — signed 32-bit arithmetic.
    Arith,
    /// `SETB` — boolean.
    Bool,
    /// `SETC` — character string.
    Char,
}

impl fmt::Display for SetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetKind::Arith => write!(f, "SETA"),
            SetKind::Bool => write!(f, "SETB"),
            SetKind::Char => write!(f, "SETC"),
        }
    }
}

/// A SET symbol value.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    A(i32),
    B(bool),
    C(String),
}

impl SetValue {
    /// The kind this value belongs to.
    pub fn kind(&self) -> SetKind {
        match self {
            SetValue::A(_) => SetKind::Arith,
            SetValue::B(_) => SetKind::Bool,
            SetValue::C(_) => SetKind::Char,
        }
    }

    /// The default (zero) value of a kind.
    pub fn default_of(kind: SetKind) -> SetValue {
        match kind {
            SetKind::Arith => SetValue::A(0),
            SetKind::Bool => SetValue::B(false),
            SetKind::Char => SetValue::C(String::new()),
        }
    }

    /// Arithmetic view: booleans become 0/1, characters parse as decimal
    /// (invalid text yields 0).
    pub fn as_arith(&self) -> i32 {
        match self {
            SetValue::A(v) => *v,
            SetValue::B(b) => *b as i32,
            SetValue::C(s) => s.trim().parse().unwrap_or(0),
        }
    }

    /// Boolean view: numbers are true when non-zero, characters when they
    /// parse to a non-zero number.
    pub fn as_bool(&self) -> bool {
        match self {
            SetValue::A(v) => *v != 0,
            SetValue::B(b) => *b,
            SetValue::C(s) => s.trim().parse::<i32>().map(|v| v != 0).unwrap_or(false),
        }
    }

    /// Character view: numbers print in decimal, booleans as `0`/`1`.
    pub fn as_char(&self) -> String {
        match self {
            SetValue::A(v) => v.to_string(),
            SetValue::B(b) => if *b { "1" } else { "0" }.to_string(),
            SetValue::C(s) => s.clone(),
        }
    }

    /// Convert into the given kind.
    pub fn convert(&self, kind: SetKind) -> SetValue {
        match kind {
            SetKind::Arith => SetValue::A(self.as_arith()),
            SetKind::Bool => SetValue::B(self.as_bool()),
            SetKind::Char => SetValue::C(self.as_char()),
        }
    }
}

/// A SET symbol: declared kind, shape, and sparse 1-based values.
#[derive(Debug, Clone, PartialEq)]
pub struct SetSymbol {
    pub kind: SetKind,
    /// Scalar symbols hold exactly one value at index 1.
    pub is_scalar: bool,
    values: HashMap<usize, SetValue>,
}

impl SetSymbol {
    /// Create an empty SET symbol.
    pub fn new(kind: SetKind, is_scalar: bool) -> Self {
        Self {
            kind,
            is_scalar,
            values: HashMap::new(),
        }
    }

    /// Read the value at `idx` (1-based); unset entries read as the kind's
    /// default.
    pub fn get(&self, idx: usize) -> SetValue {
        self.values
            .get(&idx)
            .cloned()
            .unwrap_or_else(|| SetValue::default_of(self.kind))
    }

    /// Store `value` at `idx` (1-based), converting to the declared kind.
    pub fn set(&mut self, idx: usize, value: SetValue) {
        self.values.insert(idx, value.convert(self.kind));
    }

    /// Number of set entries (the `N'` attribute).
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Highest subscript with a stored value.
    pub fn max_index(&self) -> usize {
        self.values.keys().copied().max().unwrap_or(0)
    }
}

/// A macro parameter bound at invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroParamValue {
    pub value: String,
}

/// A variable symbol visible in a scope.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableSymbol {
    Set(SetSymbol),
    MacroParam(MacroParamValue),
}

impl VariableSymbol {
    /// The SET symbol view, if this is one.
    pub fn as_set(&self) -> Option<&SetSymbol> {
        match self {
            VariableSymbol::Set(s) => Some(s),
            VariableSymbol::MacroParam(_) => None,
        }
    }

    /// The macro-parameter view, if this is one.
    pub fn as_macro_param(&self) -> Option<&MacroParamValue> {
        match self {
            VariableSymbol::MacroParam(p) => Some(p),
            VariableSymbol::Set(_) => None,
        }
    }
}
