//! Compile diagnostics

use gridscript_core::GridScriptError;
use serde::Serialize;
use std::fmt;

/// Diagnostic classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// Malformed or unterminated literal
    Lexical,
    /// Unexpected token or mismatched construct
    Syntax,
    /// Undeclared name, type mismatch, no matching overload
    Semantic,
    /// A defect in the compiler itself rather than in the script
    Internal,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticKind::Lexical => "lexical error",
            DiagnosticKind::Syntax => "syntax error",
            DiagnosticKind::Semantic => "semantic error",
            DiagnosticKind::Internal => "internal compiler error",
        })
    }
}

/// One line-numbered compile problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("line {line}: {kind}: {message}")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            message: message.into(),
        }
    }

    pub fn lexical(line: usize, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Lexical, line, message)
    }

    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Syntax, line, message)
    }

    pub fn semantic(line: usize, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Semantic, line, message)
    }

    pub fn internal(line: usize, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Internal, line, message)
    }

    pub fn is_internal(&self) -> bool {
        self.kind == DiagnosticKind::Internal
    }
}

/// Every diagnostic produced by one compile attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("compilation failed with {} diagnostic(s)", .diagnostics.len())]
pub struct CompileReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileReport {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    pub fn first(&self) -> Option<&Diagnostic> {
        self.diagnostics.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Whether any diagnostic points at a compiler defect
    pub fn has_internal(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_internal)
    }

    /// One `origin:line: kind: message` line per diagnostic
    pub fn render(&self, origin: &str) -> String {
        let mut out = String::new();
        for d in &self.diagnostics {
            out.push_str(&format!("{}:{}: {}: {}\n", origin, d.line, d.kind, d.message));
        }
        out
    }
}

impl From<Diagnostic> for CompileReport {
    fn from(diagnostic: Diagnostic) -> Self {
        Self::new(vec![diagnostic])
    }
}

impl From<CompileReport> for GridScriptError {
    fn from(report: CompileReport) -> Self {
        let detail = report
            .first()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "no diagnostics".into());
        GridScriptError::Compile(format!("{} (first: {})", report, detail))
    }
}

pub type Result<T> = std::result::Result<T, Diagnostic>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_rendering() {
        let report = CompileReport::new(vec![
            Diagnostic::syntax(3, "expected ';'"),
            Diagnostic::internal(9, "label L2 was never marked"),
        ]);

        assert!(report.has_internal());
        assert_eq!(
            report.render("door.lsl"),
            "door.lsl:3: syntax error: expected ';'\ndoor.lsl:9: internal compiler error: label L2 was never marked\n"
        );
    }

    #[test]
    fn test_user_errors_are_not_internal() {
        let report: CompileReport = Diagnostic::semantic(1, "undeclared identifier 'x'").into();
        assert!(!report.has_internal());
        assert_eq!(report.first().unwrap().line, 1);
    }
}
