//! User-friendly diagnostic messages.
//!
//! Every error the CLI prints carries the root cause, the offending values
//! and, where one exists, a concrete next step.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    fn with_severity(message: impl Into<String>, severity: Severity) -> Self {
        Diagnostic {
            message: message.into(),
            severity,
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_severity(message, Severity::Error)
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_severity(message, Severity::Warning)
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Render for the terminal; `color` adds ANSI styling to the labels.
    pub fn format(&self, color: bool) -> String {
        use std::fmt::Write as _;

        let label = match self.severity {
            Severity::Error => paint("1;31", "error", color),
            Severity::Warning => paint("1;33", "warning", color),
        };
        let mut out = String::new();
        let _ = writeln!(out, "{}: {}", label, self.message);
        for line in &self.context {
            let _ = writeln!(out, "  → {}", line);
        }
        if !self.suggestions.is_empty() {
            let _ = writeln!(out, "\n{}: consider:", paint("1;32", "help", color));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                let _ = writeln!(out, "  {}. {}", i + 1, suggestion);
            }
        }
        out
    }
}

fn paint(code: &str, text: &str, color: bool) -> String {
    if color {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// A profile line that could not be parsed.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("invalid profile line: {reason}")]
#[diagnostic(
    code(pantry::profile::parse),
    help("Profile lines look like `key=value`, `pattern:key=value` or `[section]`")
)]
pub struct ProfileParseError {
    pub reason: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("here")]
    pub span: SourceSpan,
}

impl ProfileParseError {
    /// Build an error pointing at line `line_no` (zero-based) of `text`.
    pub fn at_line(name: &str, text: &str, line_no: usize, reason: impl Into<String>) -> Self {
        let mut offset = 0;
        let mut len = 0;
        for (i, line) in text.lines().enumerate() {
            if i == line_no {
                len = line.len();
                break;
            }
            offset += line.len() + 1;
        }
        ProfileParseError {
            reason: reason.into(),
            src: NamedSource::new(name, text.to_string()),
            span: (offset, len).into(),
        }
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
