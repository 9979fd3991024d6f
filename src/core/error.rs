// This module defines error types for the qcc code generator using the thiserror crate for
// idiomatic Rust error handling. CompileError is the main error enum covering every fatal
// condition the back end can hit: conflicting or duplicate function signatures, references
// to unknown functions or variables, type violations caught by the type model, known
// limitations of the emitted code (such as more than eight call arguments), and internal
// consistency violations of the reservation allocator. Each variant carries the context
// needed for a useful diagnostic. ErrorKind separates user-facing diagnostics from codegen
// defects so a driver can report them differently. The module also provides CompileResult<T>
// as a convenience alias for Result<T, CompileError>.

//! Error types for the qcc code generator.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

/// Broad classification of a [`CompileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input program is wrong.
    User,
    /// The input uses something the back end knowingly does not handle.
    Limitation,
    /// The back end broke one of its own invariants.
    Internal,
}

/// Main error type for code generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Tried to redeclare function {name} with different types")]
    SignatureConflict {
        name: String,
    },

    #[error("Tried to redefine function {name}")]
    Redefinition {
        name: String,
    },

    #[error("Function {name} is not declared")]
    UndefinedFunction {
        name: String,
    },

    #[error("Undefined variable: {name}")]
    UndefinedVariable {
        name: String,
    },

    #[error("Type violation: {reason}")]
    TypeViolation {
        reason: String,
    },

    #[error("Unsupported: {feature}")]
    Unsupported {
        feature: String,
    },

    #[error("Internal compiler error: {reason}")]
    Internal {
        reason: String,
    },
}

impl CompileError {
    pub fn type_violation(reason: impl Into<String>) -> Self {
        Self::TypeViolation { reason: reason.into() }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal { reason: reason.into() }
    }

    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported { feature: feature.into() }
    }

    /// Classify the error for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Internal { .. } => ErrorKind::Internal,
            Self::Unsupported { .. } => ErrorKind::Limitation,
            _ => ErrorKind::User,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
