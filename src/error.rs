//! Errors raised while building or driving a request specification.
//!
//! Every variant is a programmer/specification error: they are reported
//! synchronously by the call that detected them and are never retried.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// A request or field with this name already exists.
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// Unknown request or field name.
    #[error("not found: {0}")]
    NotFound(String),

    /// A modifier named a block that is still open.
    #[error("dangling reference: block '{0}' is still open")]
    DanglingReference(String),

    /// Malformed hex input, unknown algorithm/operator/encoding, bad bounds, ...
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("no open block to close")]
    EmptyStack,

    #[error("no current request (call init first)")]
    NoCurrentRequest,

    /// Legacy operation that is deliberately not provided.
    #[error("unsupported operation {operation}: {hint}")]
    Unsupported { operation: String, hint: String },
}

impl SpecError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SpecError::InvalidParameter(msg.into())
    }
}
