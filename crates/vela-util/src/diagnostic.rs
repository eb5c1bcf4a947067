//! Diagnostic reporting: error/warning collection with source snippets,
//! used by every compilation stage (HIR lowering, normalization,
//! monomorphization) to report problems without aborting the pass.

use crate::Span;
use std::cell::RefCell;
use std::fmt;

/// Diagnostic severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
    Note,
    Help,
}

impl Level {
    pub fn is_error(&self) -> bool {
        matches!(self, Level::Error)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warning => write!(f, "warning"),
            Level::Note => write!(f, "note"),
            Level::Help => write!(f, "help"),
        }
    }
}

/// A unique `{prefix}{number}` code identifying a diagnostic, e.g. `E2001`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DiagnosticCode {
    pub prefix: &'static str,
    pub number: u32,
}

impl DiagnosticCode {
    pub const fn new(prefix: &'static str, number: u32) -> Self {
        Self { prefix, number }
    }

    pub fn as_str(&self) -> String {
        format!("{}{:04}", self.prefix, self.number)
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub const E_LOWER_UNSUPPORTED_NODE: DiagnosticCode = DiagnosticCode::new("E", 4001);
pub const E_MONO_DEPTH_EXCEEDED: DiagnosticCode = DiagnosticCode::new("E", 4002);
pub const E_MONO_UNRESOLVED_CALLEE: DiagnosticCode = DiagnosticCode::new("E", 4003);
pub const E_NORMALIZE_RESIDUAL_SUGAR: DiagnosticCode = DiagnosticCode::new("E", 4004);
pub const W_MONO_DEAD_INSTANCE: DiagnosticCode = DiagnosticCode::new("W", 4101);

/// A rendered line of source with an optional caret label, attached to a
/// diagnostic for terminal-style display.
#[derive(Clone, Debug)]
pub struct SourceSnippet {
    pub line: String,
    pub line_number: usize,
    pub column: usize,
    pub label: Option<String>,
}

impl SourceSnippet {
    pub fn point(line: impl Into<String>, line_number: usize, column: usize) -> Self {
        Self { line: line.into(), line_number, column, label: None }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn format(&self) -> String {
        let gutter = format!("{} | ", self.line_number);
        let caret_pad = " ".repeat(gutter.len() + self.column.saturating_sub(1));
        let mut out = format!("{gutter}{}\n{caret_pad}^", self.line);
        if let Some(label) = &self.label {
            out.push(' ');
            out.push_str(label);
        }
        out
    }
}

/// A single error/warning/note message produced by a compiler pass.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    pub span: Span,
    pub code: Option<DiagnosticCode>,
    pub notes: Vec<String>,
    pub helps: Vec<String>,
    pub snippets: Vec<SourceSnippet>,
}

impl Diagnostic {
    pub fn new(level: Level, message: impl Into<String>, span: Span) -> Self {
        Self {
            level,
            message: message.into(),
            span,
            code: None,
            notes: Vec::new(),
            helps: Vec::new(),
            snippets: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Error, message, span)
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Warning, message, span)
    }

    pub fn with_code(mut self, code: DiagnosticCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.helps.push(help.into());
        self
    }

    pub fn with_snippet(mut self, snippet: SourceSnippet) -> Self {
        self.snippets.push(snippet);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "{}[{}]: {}", self.level, code, self.message)
        } else {
            write!(f, "{}: {}", self.level, self.message)
        }
    }
}

/// Fluent builder mirroring [`Diagnostic`]'s fields; the preferred way to
/// construct a diagnostic and `emit` it straight to a [`Handler`].
pub struct DiagnosticBuilder {
    diagnostic: Diagnostic,
}

impl DiagnosticBuilder {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self { diagnostic: Diagnostic::new(level, message, Span::DUMMY) }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Level::Warning, message)
    }

    pub fn code(mut self, code: DiagnosticCode) -> Self {
        self.diagnostic.code = Some(code);
        self
    }

    pub fn span(mut self, span: Span) -> Self {
        self.diagnostic.span = span;
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.diagnostic.notes.push(note.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.diagnostic.helps.push(help.into());
        self
    }

    pub fn snippet(mut self, snippet: SourceSnippet) -> Self {
        self.diagnostic.snippets.push(snippet);
        self
    }

    pub fn build(self) -> Diagnostic {
        self.diagnostic
    }

    pub fn emit(self, handler: &Handler) {
        handler.emit_diagnostic(self.build());
    }
}

/// Collects diagnostics emitted during a compilation pass.
///
/// Not `Sync`: each pass (lowering, normalization, monomorphization) runs
/// single-threaded per module and owns its own `Handler`.
#[derive(Default)]
pub struct Handler {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self, message: impl Into<String>, span: Span) {
        self.emit_diagnostic(Diagnostic::error(message, span));
    }

    pub fn warning(&self, message: impl Into<String>, span: Span) {
        self.emit_diagnostic(Diagnostic::warning(message, span));
    }

    pub fn emit_diagnostic(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    pub fn build_error(&self, span: Span, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::error(message).span(span)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.borrow().iter().any(|d| d.level.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.borrow().iter().filter(|d| d.level.is_error()).count()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn clear(&self) {
        self.diagnostics.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_tracks_error_count() {
        let handler = Handler::new();
        handler.error("bad thing", Span::DUMMY);
        handler.warning("minor thing", Span::DUMMY);
        assert_eq!(handler.error_count(), 1);
        assert!(handler.has_errors());
    }

    #[test]
    fn builder_emits_into_handler() {
        let handler = Handler::new();
        DiagnosticBuilder::error("unresolved callee")
            .code(E_MONO_UNRESOLVED_CALLEE)
            .span(Span::DUMMY)
            .help("check the instantiation map")
            .emit(&handler);
        assert_eq!(handler.error_count(), 1);
        let diags = handler.diagnostics();
        assert_eq!(diags[0].code, Some(E_MONO_UNRESOLVED_CALLEE));
        assert_eq!(diags[0].helps.len(), 1);
    }

    #[test]
    fn diagnostic_code_formats_with_padding() {
        assert_eq!(DiagnosticCode::new("E", 7).as_str(), "E0007");
    }
}
