//! Diagnostic types for analysis error/warning reporting.
//!
//! These types provide a uniform way for the engine to report errors,
//! warnings, and informational messages with source location context.
//! Diagnostics are append-only data: the engine never aborts on one.

use std::fmt;

use crate::position::Range;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error — the statement or operation is rejected.
    Error,
    /// Warning — analysis continues but something looks suspicious.
    Warning,
    /// Informational — not a problem, but worth noting.
    Info,
}

/// A diagnostic record produced during analysis.
///
/// Each diagnostic carries a stable code (e.g. `E013`, `D010`, `W010`),
/// a severity, a human-readable message, and the source range it applies to.
///
/// # Example
///
/// ```
/// use open_hlasm_lang_core::{Diagnostic, Range, Severity};
///
/// let d = Diagnostic::error("E047", "sequence symbol .MISSING not found", Range::in_line(4, 10, 18));
/// assert_eq!(d.severity, Severity::Error);
/// assert_eq!(d.code, "E047");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Severity of the diagnostic.
    pub severity: Severity,
    /// Stable diagnostic code (e.g. "E010", "D010", "W010").
    pub code: String,
    /// Human-readable message describing the issue.
    pub message: String,
    /// Source range the diagnostic applies to.
    pub range: Range,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(code: impl Into<String>, message: impl Into<String>, range: Range) -> Self {
        Self {
            severity: Severity::Error,
            code: code.into(),
            message: message.into(),
            range,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(code: impl Into<String>, message: impl Into<String>, range: Range) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
            range,
        }
    }

    /// Create a new info diagnostic.
    pub fn info(code: impl Into<String>, message: impl Into<String>, range: Range) -> Self {
        Self {
            severity: Severity::Info,
            code: code.into(),
            message: message.into(),
            range,
        }
    }

    /// Returns `true` if this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Returns `true` if this diagnostic is a warning.
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_error() {
        let d = Diagnostic::error("E013", "wrong type of variable symbol", Range::default());
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.code, "E013");
        assert!(d.is_error());
        assert!(!d.is_warning());
    }

    #[test]
    fn test_diagnostic_warning() {
        let d = Diagnostic::warning("W010", "label field is ignored", Range::default());
        assert!(d.is_warning());
        assert!(!d.is_error());
    }

    #[test]
    fn test_diagnostic_info() {
        let d = Diagnostic::info("MNOTE", "macro note", Range::default());
        assert_eq!(d.severity, Severity::Info);
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(format!("{}", Severity::Error), "error");
        assert_eq!(format!("{}", Severity::Warning), "warning");
        assert_eq!(format!("{}", Severity::Info), "info");
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::error("E054", "misplaced MEND", Range::default());
        assert_eq!(format!("{}", d), "error[E054]: misplaced MEND");
    }
}
