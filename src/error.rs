//! Error type shared by every component of the rasterizer.
//!
//! Errors form a causal chain: a failing leaf operation produces an [`Error`],
//! and each caller that propagates it may wrap it with [`Error::context`] so
//! the outer error keeps the inner one as its [`source`](std::error::Error::source).
//! [`Error::report`] prints the chain innermost-first.

use std::fmt;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation on an empty vector, matrix or buffer.
    NotInitialized,
    /// Binary operation between differently sized operands.
    LengthMismatch,
    /// Mathematically or structurally invalid request.
    InvalidOperation,
    /// Index outside the valid extent.
    IndexOutOfBound,
    /// Input shape the ingestion logic cannot decompose.
    Unhandled,
    /// Mesh, configuration or image file could not be read or written.
    Load,
    /// Device memory backend failure.
    Device,
}

impl ErrorKind {
    /// Stable numeric code reported alongside the message.
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::NotInitialized => 100,
            ErrorKind::LengthMismatch => 300,
            ErrorKind::InvalidOperation => 400,
            ErrorKind::IndexOutOfBound => 500,
            ErrorKind::Unhandled => 600,
            ErrorKind::Load => 700,
            ErrorKind::Device => 800,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotInitialized => "NotInitialized",
            ErrorKind::LengthMismatch => "LengthMismatch",
            ErrorKind::InvalidOperation => "InvalidOperation",
            ErrorKind::IndexOutOfBound => "IndexOutOfBound",
            ErrorKind::Unhandled => "Unhandled",
            ErrorKind::Load => "Load",
            ErrorKind::Device => "Device",
        };
        f.write_str(name)
    }
}

/// A failure with an optional inner cause.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} ({code}): {message}", code = .kind.code())]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<Box<Error>>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn not_initialized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotInitialized, message)
    }

    pub fn length_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LengthMismatch, message)
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidOperation, message)
    }

    pub fn index_out_of_bound(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IndexOutOfBound, message)
    }

    pub fn unhandled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unhandled, message)
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Load, message)
    }

    pub fn device(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Device, message)
    }

    /// Wraps `self` as the cause of a new error of the same kind.
    pub fn context(self, message: impl Into<String>) -> Self {
        Self {
            kind: self.kind,
            message: message.into(),
            cause: Some(Box::new(self)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> u32 {
        self.kind.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The directly wrapped error, if any.
    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_deref()
    }

    /// The innermost error of the chain.
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Some(inner) = current.cause() {
            current = inner;
        }
        current
    }

    /// Iterates from this error down to the root cause.
    pub fn chain(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |e| e.cause())
    }

    /// Renders the chain innermost-first, one line per link.
    pub fn report(&self) -> String {
        let links: Vec<&Error> = self.chain().collect();
        links
            .iter()
            .rev()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A value produced by a lenient lookup that could not serve the request.
///
/// Carries the designated fallback value together with the typed error, so the
/// caller can keep going with `value` or surface `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct Degraded<T> {
    pub value: T,
    pub error: Error,
}

impl<T> Degraded<T> {
    pub fn into_value(self) -> T {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn context_keeps_kind_and_links_cause() {
        let inner = Error::index_out_of_bound("vertex 9 out of bound 3");
        let outer = inner.clone().context("failed to ingest model");

        assert_eq!(outer.kind(), ErrorKind::IndexOutOfBound);
        assert_eq!(outer.cause(), Some(&inner));
        assert_eq!(outer.root_cause(), &inner);
        assert!(outer.source().is_some());
        assert_eq!(outer.chain().count(), 2);
    }

    #[test]
    fn report_prints_innermost_first() {
        let err = Error::invalid_operation("degenerate triangle")
            .context("triangle 4 failed to build")
            .context("scene build failed");

        let report = err.report();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("degenerate triangle"));
        assert!(lines[2].ends_with("scene build failed"));
        assert!(lines[0].starts_with("InvalidOperation (400)"));
    }

    #[test]
    fn codes_are_distinct() {
        let kinds = [
            ErrorKind::NotInitialized,
            ErrorKind::LengthMismatch,
            ErrorKind::InvalidOperation,
            ErrorKind::IndexOutOfBound,
            ErrorKind::Unhandled,
            ErrorKind::Load,
            ErrorKind::Device,
        ];
        let mut codes: Vec<u32> = kinds.iter().map(|k| k.code()).collect();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }
}
