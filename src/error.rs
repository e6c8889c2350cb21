//! Error types for route validation and server lifecycle.

use std::net::SocketAddr;

/// A single problem found in one route record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    /// The record is not a key/value map.
    #[error("route {index}: expected an object, found {found}")]
    NotAnObject { index: usize, found: &'static str },

    /// A required field is absent.
    #[error("route {index}: please include a '{field}' key")]
    MissingField { index: usize, field: &'static str },

    /// A field is present but holds the wrong JSON type.
    #[error("route {index}: '{field}' must be {expected}, found {found}")]
    TypeMismatch {
        index: usize,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// `url` or `content_type` is an empty string.
    #[error("route {index}: '{field}' cannot be empty")]
    EmptyField { index: usize, field: &'static str },

    /// Status code outside 200..=599, as written in the settings.
    #[error("route {index}: invalid status code {value}")]
    InvalidStatusCode { index: usize, value: String },

    /// Content type that cannot be sent as a header value.
    #[error("route {index}: content type {value:?} is not a valid header value")]
    InvalidContentType { index: usize, value: String },
}

impl Violation {
    /// Index of the offending record in the input sequence.
    pub fn index(&self) -> usize {
        match self {
            Violation::NotAnObject { index, .. }
            | Violation::MissingField { index, .. }
            | Violation::TypeMismatch { index, .. }
            | Violation::EmptyField { index, .. }
            | Violation::InvalidStatusCode { index, .. }
            | Violation::InvalidContentType { index, .. } => *index,
        }
    }
}

/// Route settings rejected before any socket was opened.
///
/// Carries every violation found, not just the first one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", format_violations(.violations))]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub(crate) fn new(violations: Vec<Violation>) -> Self {
        debug_assert!(!violations.is_empty());
        Self { violations }
    }

    /// All violations, in the order they were found.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Whether any record lacks the given field.
    pub fn is_missing(&self, field: &str) -> bool {
        self.violations
            .iter()
            .any(|v| matches!(v, Violation::MissingField { field: f, .. } if *f == field))
    }
}

fn format_violations(violations: &[Violation]) -> String {
    let mut message = format!(
        "invalid route settings ({} violation{})",
        violations.len(),
        if violations.len() == 1 { "" } else { "s" }
    );
    for violation in violations {
        message.push_str("; ");
        message.push_str(&violation.to_string());
    }
    message
}

/// A JSON route whose content does not parse. Raised per request.
#[derive(Debug, thiserror::Error)]
#[error("route {path} has malformed JSON content: {source}")]
pub struct MalformedJsonError {
    pub path: String,
    #[source]
    pub source: serde_json::Error,
}

/// Errors returned by the server lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to bind {addr}: {source}")]
    PortBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("mock server already running on {addr}")]
    AlreadyRunning { addr: SocketAddr },
}
