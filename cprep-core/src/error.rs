use std::fmt;

/// All fatal conditions the preprocessing core can raise, plus the one
/// non-fatal diagnostic kind. Mirrors the flat "one enum, hand-written
/// Display" shape used throughout this codebase instead of pulling in an
/// error-derive crate.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// End-of-file reached while still inside a function-like macro's
    /// argument list.
    UnbalancedInvocation,
    /// `defined` used without a following identifier, or with a `(` that
    /// is never closed.
    BadDefined,
    /// `consume` was asked for one token kind and got another.
    UnexpectedToken { expected: String, actual: String },
    /// Token pasting (`##`) produced something that doesn't re-tokenize
    /// as a single token.
    InvalidPaste(String),
    /// A function-like macro invocation did not supply the number of
    /// arguments its definition requires.
    ArityMismatch { name: String, expected: usize, got: usize },
    /// `#include`d file could not be opened.
    IncludeNotFound(String),
    /// `#error` directive was hit.
    UserError(String),
    /// Malformed directive line (unknown directive, missing argument, ...).
    BadDirective(String),
    /// Non-fatal: reported but does not stop preprocessing.
    DiagnosticWarning(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnbalancedInvocation => {
                write!(f, "unbalanced function-like macro invocation")
            }
            ErrorKind::BadDefined => write!(f, "operator \"defined\" requires an identifier"),
            ErrorKind::UnexpectedToken { expected, actual } => {
                write!(f, "expected {expected}, found {actual}")
            }
            ErrorKind::InvalidPaste(s) => write!(f, "pasting produced invalid token \"{s}\""),
            ErrorKind::ArityMismatch { name, expected, got } => write!(
                f,
                "macro \"{name}\" expects {expected} argument(s), got {got}"
            ),
            ErrorKind::IncludeNotFound(path) => write!(f, "cannot open include file \"{path}\""),
            ErrorKind::UserError(msg) => write!(f, "#error {msg}"),
            ErrorKind::BadDirective(msg) => write!(f, "{msg}"),
            ErrorKind::DiagnosticWarning(msg) => write!(f, "warning: {msg}"),
        }
    }
}

impl ErrorKind {
    /// Every kind except the warning terminates preprocessing.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ErrorKind::DiagnosticWarning(_))
    }
}

/// Error sink for one translation unit, owned by `Context` and reached
/// through `Preprocessor::diagnostics`. Fatal errors print
/// `(file:line) error: ...` and exit the process; non-fatal ones (an
/// unparseable pp-number reconverted deep in the pipeline) just bump the
/// counter and keep going, the same two-tier policy the host
/// assembler's `Session` applies via `report_error` + `should_assemble`.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub error_count: usize,
    pub file: String,
}

impl Diagnostics {
    pub fn new(file: impl Into<String>) -> Self {
        Diagnostics { error_count: 0, file: file.into() }
    }

    pub fn report(&mut self, kind: &ErrorKind, line: u32) {
        self.error_count += 1;
        eprintln!("({}:{}) error: {}", self.file, line, kind);
        if kind.is_fatal() {
            std::process::exit(1);
        }
    }
}

pub type PrepResult<T> = Result<T, ErrorKind>;
