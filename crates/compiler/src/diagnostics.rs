//! Diagnostics sink
//!
//! Errors and warnings are collected here with their source line; nothing in
//! the library prints to stderr directly (only the CLI drains the sink).
//! Two counters are kept: `error_count` covers syntactic and semantic errors
//! together and gates IR emission, `semantic_error_count` covers only the
//! semantic subset.

/// Severity of a collected diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    SyntaxError,
    SemanticError,
    Warning,
}

/// One formatted diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    /// The one-line stderr rendering.
    pub fn render(&self) -> String {
        match self.severity {
            Severity::SyntaxError => format!("Syntax Error on line {}: {}", self.line, self.message),
            Severity::SemanticError => {
                format!("Semantic Error on line {}: {}", self.line, self.message)
            }
            Severity::Warning => format!("Warning on line {}: {}", self.line, self.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    pub error_count: usize,
    pub semantic_error_count: usize,
    /// Set by the parser while skipping tokens after a syntax error so only
    /// the first error of a recovery window is reported.
    pub recovering_from_error: bool,
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Report a syntax error. Suppressed (but still counted on the first
    /// occurrence) while the parser is recovering from a previous one.
    pub fn syntax_error(&mut self, line: usize, message: impl Into<String>) {
        if self.recovering_from_error {
            return;
        }
        self.recovering_from_error = true;
        self.error_count += 1;
        self.diagnostics.push(Diagnostic {
            severity: Severity::SyntaxError,
            line,
            message: message.into(),
        });
    }

    /// Leave the recovery window; the next syntax error reports again.
    pub fn recovered(&mut self) {
        self.recovering_from_error = false;
    }

    /// Report a semantic error. Bumps both counters.
    pub fn semantic_error(&mut self, line: usize, message: impl Into<String>) {
        self.error_count += 1;
        self.semantic_error_count += 1;
        self.diagnostics.push(Diagnostic {
            severity: Severity::SemanticError,
            line,
            message: message.into(),
        });
    }

    /// Report a warning; does not affect the error counters.
    pub fn warning(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            line,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// All diagnostics rendered one per line, ready for stderr.
    pub fn render(&self) -> String {
        let lines: Vec<String> = self.diagnostics.iter().map(Diagnostic::render).collect();
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_error_bumps_both_counters() {
        let mut diags = Diagnostics::new();
        diags.semantic_error(3, "bad");
        assert_eq!(diags.error_count, 1);
        assert_eq!(diags.semantic_error_count, 1);
        assert!(diags.has_errors());
    }

    #[test]
    fn test_warning_does_not_count_as_error() {
        let mut diags = Diagnostics::new();
        diags.warning(1, "narrowing conversion");
        assert_eq!(diags.error_count, 0);
        assert!(!diags.has_errors());
        assert_eq!(diags.diagnostics().len(), 1);
    }

    #[test]
    fn test_recovery_window_suppresses_cascade() {
        let mut diags = Diagnostics::new();
        diags.syntax_error(5, "unexpected token");
        diags.syntax_error(5, "unexpected token again");
        assert_eq!(diags.error_count, 1);
        assert_eq!(diags.diagnostics().len(), 1);

        diags.recovered();
        diags.syntax_error(9, "another problem");
        assert_eq!(diags.error_count, 2);
    }

    #[test]
    fn test_render_format() {
        let mut diags = Diagnostics::new();
        diags.semantic_error(7, "'x' undeclared (first use in this function)");
        assert_eq!(
            diags.render(),
            "Semantic Error on line 7: 'x' undeclared (first use in this function)"
        );
    }
}
