use std::fmt;

use thiserror::Error;

/// A 1-based line/column position within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: usize,
    pub column: usize,
}

impl SourcePos {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Classification of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    Name,
    Type,
    Module,
    Runtime,
}

impl DiagnosticKind {
    fn label(self) -> &'static str {
        match self {
            DiagnosticKind::Lexer => "lex error",
            DiagnosticKind::Parser => "syntax error",
            DiagnosticKind::Name => "name error",
            DiagnosticKind::Type => "type error",
            DiagnosticKind::Module => "module error",
            DiagnosticKind::Runtime => "runtime error",
        }
    }
}

/// Rich diagnostic information surfaced to end users.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub pos: Option<SourcePos>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            pos: None,
            notes: Vec::new(),
        }
    }

    pub fn with_pos(mut self, pos: SourcePos) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)?;
        if let Some(pos) = self.pos {
            write!(f, " at {pos}")?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the pypp toolchain.
#[derive(Debug, Error)]
pub enum PyppError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PyppError {
    pub fn kind(&self) -> Option<DiagnosticKind> {
        match self {
            PyppError::Diagnostic(diag) => Some(diag.kind),
            PyppError::Io(_) => None,
        }
    }

    /// Attaches `pos` unless the diagnostic already carries a position.
    pub fn at(self, pos: SourcePos) -> Self {
        match self {
            PyppError::Diagnostic(mut diag) => {
                if diag.pos.is_none() {
                    diag.pos = Some(pos);
                }
                PyppError::Diagnostic(diag)
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, PyppError>;

pub(crate) fn name_error(message: impl Into<String>, pos: SourcePos) -> PyppError {
    PyppError::from(Diagnostic::new(DiagnosticKind::Name, message).with_pos(pos))
}

pub(crate) fn type_error(message: impl Into<String>) -> PyppError {
    PyppError::from(Diagnostic::new(DiagnosticKind::Type, message))
}

pub(crate) fn runtime_error(message: impl Into<String>) -> PyppError {
    PyppError::from(Diagnostic::new(DiagnosticKind::Runtime, message))
}
