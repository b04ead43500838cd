//! Diagnostic sink and the engine's diagnostic codes.
//!
//! Errors are data, not exceptions: every handler appends zero or more
//! diagnostics and reports ok-ness to its caller. The constructors below fix
//! the code/severity/wording of each record so call sites stay uniform.

use open_hlasm_lang_core::{Diagnostic, Range, Severity};

/// Append-only diagnostic collector for one analysis run.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// All collected diagnostics, in emission order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of collected diagnostics.
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Whether nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Whether any error-severity diagnostic was collected.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Consume the sink.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

// ---------------------------------------------------------------------------
//  Statement-level codes
// ---------------------------------------------------------------------------

/// E010 — a field or operand has the wrong kind for the instruction.
pub fn error_e010(what: &str, range: Range) -> Diagnostic {
    Diagnostic::error("E010", format!("invalid {what}"), range)
}

/// E012 — an operand or subscript is malformed or out of its value space.
pub fn error_e012(what: &str, range: Range) -> Diagnostic {
    Diagnostic::error("E012", format!("invalid operand: {what}"), range)
}

/// E013 — SET symbol used with the wrong kind or shape.
pub fn error_e013(what: &str, range: Range) -> Diagnostic {
    Diagnostic::error("E013", format!("inconsistent SET symbol usage: {what}"), range)
}

/// E020 — too many subscripts or operands.
pub fn error_e020(what: &str, range: Range) -> Diagnostic {
    Diagnostic::error("E020", format!("too many {what}"), range)
}

/// E022 — a required operand is missing.
pub fn error_e022(what: &str, range: Range) -> Diagnostic {
    Diagnostic::error("E022", format!("missing operand of {what}"), range)
}

/// E030 — assignment target is a macro parameter.
pub fn error_e030(what: &str, range: Range) -> Diagnostic {
    Diagnostic::error("E030", format!("cannot assign value to {what}"), range)
}

/// E031 — an ordinary symbol is already defined.
pub fn error_e031(name: &str, range: Range) -> Diagnostic {
    Diagnostic::error("E031", format!("symbol {name} is already defined"), range)
}

/// E045 — a sequence symbol is already defined at a different position.
pub fn error_e045(name: &str, range: Range) -> Diagnostic {
    Diagnostic::error(
        "E045",
        format!("sequence symbol .{name} already defined at a different position"),
        range,
    )
}

/// E047 — a sequence symbol could not be found (after lookahead in
/// opencode).
pub fn error_e047(name: &str, range: Range) -> Diagnostic {
    Diagnostic::error("E047", format!("sequence symbol .{name} not found"), range)
}

/// E049 — the operation code is not defined.
pub fn error_e049(name: &str, range: Range) -> Diagnostic {
    Diagnostic::error("E049", format!("undefined operation code {name}"), range)
}

/// E051 — duplicate variable declaration against a SET symbol.
pub fn error_e051(name: &str, range: Range) -> Diagnostic {
    Diagnostic::error(
        "E051",
        format!("variable symbol &{name} already declared as a SET symbol"),
        range,
    )
}

/// E052 — duplicate variable declaration against a macro parameter.
pub fn error_e052(name: &str, range: Range) -> Diagnostic {
    Diagnostic::error(
        "E052",
        format!("variable symbol &{name} already declared as a macro parameter"),
        range,
    )
}

/// E054 — `MEND`/`MEXIT` outside a macro definition or invocation.
pub fn error_e054(range: Range) -> Diagnostic {
    Diagnostic::error(
        "E054",
        "statement is only allowed inside a macro definition",
        range,
    )
}

/// E058 — COPY member not found in any library.
pub fn error_e058(name: &str, range: Range) -> Diagnostic {
    Diagnostic::error("E058", format!("copy member {name} not found"), range)
}

/// E062 — recursive COPY inclusion.
pub fn error_e062(name: &str, range: Range) -> Diagnostic {
    Diagnostic::error("E062", format!("recursive COPY of member {name}"), range)
}

/// W010 — a field that should be empty carries text.
pub fn warning_w010(what: &str, range: Range) -> Diagnostic {
    Diagnostic::warning("W010", format!("{what} is ignored"), range)
}

// ---------------------------------------------------------------------------
//  Data-definition codes
// ---------------------------------------------------------------------------

/// D005 — length modifier not allowed or out of range.
pub fn error_d005(type_str: &str, range: Range) -> Diagnostic {
    Diagnostic::error(
        "D005",
        format!("invalid length modifier for type {type_str}"),
        range,
    )
}

/// D006 — bit-length modifier not allowed or out of range.
pub fn error_d006(type_str: &str, range: Range) -> Diagnostic {
    Diagnostic::error(
        "D006",
        format!("invalid bit-length modifier for type {type_str}"),
        range,
    )
}

/// D007 — scale modifier not allowed or out of range.
pub fn error_d007(type_str: &str, range: Range) -> Diagnostic {
    Diagnostic::error(
        "D007",
        format!("invalid scale modifier for type {type_str}"),
        range,
    )
}

/// D008 — exponent modifier not allowed or out of range.
pub fn error_d008(type_str: &str, range: Range) -> Diagnostic {
    Diagnostic::error(
        "D008",
        format!("invalid exponent modifier for type {type_str}"),
        range,
    )
}

/// D010 — malformed nominal value.
pub fn error_d010(type_str: &str, range: Range) -> Diagnostic {
    Diagnostic::error(
        "D010",
        format!("invalid nominal value of type {type_str}"),
        range,
    )
}

/// D016 — DC operand without a nominal value.
pub fn error_d016(type_str: &str, range: Range) -> Diagnostic {
    Diagnostic::error(
        "D016",
        format!("nominal value required for DC operand of type {type_str}"),
        range,
    )
}

/// D020 — a nominal value is outside the type's representable range.
pub fn error_d020(type_str: &str, range: Range) -> Diagnostic {
    Diagnostic::error(
        "D020",
        format!("nominal value out of range for type {type_str}"),
        range,
    )
}

/// D021 — unknown data-definition type.
pub fn error_d021(type_str: &str, range: Range) -> Diagnostic {
    Diagnostic::error("D021", format!("unknown data definition type {type_str}"), range)
}

/// MNOTE — a message produced by an `MNOTE` statement.
pub fn mnote(severity: Severity, message: &str, range: Range) -> Diagnostic {
    match severity {
        Severity::Error => Diagnostic::error("MNOTE", message, range),
        Severity::Warning => Diagnostic::warning("MNOTE", message, range),
        Severity::Info => Diagnostic::info("MNOTE", message, range),
    }
}

// ---------------------------------------------------------------------------
//  CA expression codes
// ---------------------------------------------------------------------------

/// CE001 — reference to an undefined variable symbol.
pub fn error_ce001(name: &str, range: Range) -> Diagnostic {
    Diagnostic::error("CE001", format!("undefined variable symbol &{name}"), range)
}

/// CE002 — division by zero in a CA expression.
pub fn error_ce002(range: Range) -> Diagnostic {
    Diagnostic::error("CE002", "division by zero", range)
}

/// CE003 — reference to an undefined ordinary symbol in an expression.
pub fn error_ce003(name: &str, range: Range) -> Diagnostic {
    Diagnostic::error("CE003", format!("undefined symbol {name}"), range)
}

/// CE004 — a CA expression failed to parse.
pub fn error_ce004(detail: &str, range: Range) -> Diagnostic {
    Diagnostic::error("CE004", format!("invalid expression: {detail}"), range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_collects_in_order() {
        let mut sink = DiagnosticSink::new();
        sink.add(error_e010("label", Range::default()));
        sink.add(warning_w010("name field", Range::default()));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.diagnostics()[0].code, "E010");
        assert_eq!(sink.diagnostics()[1].code, "W010");
        assert!(sink.has_errors());
    }

    #[test]
    fn test_code_constructors() {
        assert_eq!(error_e047("MISSING", Range::default()).code, "E047");
        assert_eq!(error_d010("P", Range::default()).code, "D010");
        assert!(warning_w010("x", Range::default()).is_warning());
    }
}
