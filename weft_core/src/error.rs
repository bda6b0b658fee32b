//! Error types for pattern compilation.
//!
//! The compiler never partially succeeds: any error aborts the whole
//! compilation. There are deliberately only three kinds of failure - a
//! construct the backend does not implement, a backreference that resolves to
//! no capture, and an internal invariant violation.

use thiserror::Error;

/// The result type used throughout the compiler.
pub type CompileResult<T> = Result<T, CompileError>;

/// Failure modes of pattern compilation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A tree shape the backend deliberately does not implement.
    #[error("unsupported construct: {0}")]
    Unsupported(String),

    /// A symbolic or named backreference with no matching capture.
    #[error("no capture for reference '{0}'")]
    UncapturedReference(String),

    /// An invariant violation; signals a bug in the compiler or its caller.
    #[error("internal invariant violated: {0}")]
    Unreachable(String),
}

impl CompileError {
    /// Create an unsupported-construct error.
    #[must_use]
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported(feature.into())
    }

    /// Create an unresolved-reference error.
    #[must_use]
    pub fn uncaptured(reference: impl Into<String>) -> Self {
        Self::UncapturedReference(reference.into())
    }

    /// Create an internal-invariant error.
    #[must_use]
    pub fn unreachable(diagnostic: impl Into<String>) -> Self {
        Self::Unreachable(diagnostic.into())
    }
}
