//! Error taxonomy shared by the registry, broadcaster, and directory bridge.
//!
//! - [`ValidationError`]: malformed `OperatorInfo` or `Task`
//! - [`StoreError`]: persistence failure, propagated unmodified by the registry
//! - [`RegistryError`]: everything a registry caller can observe
//! - [`TransportError`]: per-operator send failure, only ever recorded in metrics
//! - [`ChainError`]: transaction submission or confirmation failure

use thiserror::Error;

/// Malformed operator or task input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid operator address {address:?}: {reason}")]
    Address { address: String, reason: &'static str },
    #[error("operator {address} has an invalid endpoint {endpoint:?}")]
    Endpoint { address: String, endpoint: String },
    #[error("operator {address} has no last-seen timestamp")]
    MissingTimestamp { address: String },
    #[error("task id must not be empty")]
    EmptyTaskId,
}

/// Failure reported by an [`OperatorStore`](crate::traits::OperatorStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("operator store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt operator record for {address}: {reason}")]
    Corrupt { address: String, reason: String },
}

/// Errors returned by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("operator not found: {0}")]
    NotFound(String),
    #[error("operator already registered: {0}")]
    Duplicate(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coarse classification of a [`TransportError`], used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    Unreachable,
    Rejected,
    Timeout,
    Encode,
}

impl TransportErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unreachable => "unreachable",
            Self::Rejected => "rejected",
            Self::Timeout => "timeout",
            Self::Encode => "encode",
        }
    }
}

/// A single delivery attempt to one operator failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("endpoint {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },
    #[error("endpoint {endpoint} rejected task (status {status})")]
    Rejected { endpoint: String, status: u16 },
    #[error("send to {endpoint} timed out")]
    Timeout { endpoint: String },
    #[error("failed to encode task: {0}")]
    Encode(String),
}

impl TransportError {
    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Unreachable { .. } => TransportErrorKind::Unreachable,
            Self::Rejected { .. } => TransportErrorKind::Rejected,
            Self::Timeout { .. } => TransportErrorKind::Timeout,
            Self::Encode(_) => TransportErrorKind::Encode,
        }
    }
}

/// Transaction submission or confirmation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
    /// The operator record would be refused by the registry; nothing was submitted.
    #[error("operator rejected before submission: {0}")]
    InvalidOperator(ValidationError),
    #[error("invalid signer: {0}")]
    InvalidSigner(String),
    #[error("invalid operator signature: {0}")]
    InvalidSignature(String),
    #[error("nonce conflict: expected {expected}, got {got}")]
    NonceConflict { expected: u64, got: u64 },
    #[error("gas error: {0}")]
    Gas(String),
    #[error("transaction {hash} reverted: {reason}")]
    Reverted { hash: String, reason: String },
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("transaction {hash} not confirmed within {timeout_ms}ms")]
    ConfirmationTimeout { hash: String, timeout_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_passes_through_registry_error_unchanged() {
        let store = StoreError::Unavailable("connection reset".to_string());
        let err: RegistryError = store.clone().into();
        assert_eq!(err, RegistryError::Store(store.clone()));
        assert_eq!(err.to_string(), store.to_string());
    }

    #[test]
    fn transport_error_kinds() {
        let err = TransportError::Rejected {
            endpoint: "10.0.0.1".to_string(),
            status: 503,
        };
        assert_eq!(err.kind(), TransportErrorKind::Rejected);
        assert_eq!(err.kind().as_str(), "rejected");
        assert_eq!(
            TransportError::Timeout {
                endpoint: "x".to_string()
            }
            .kind(),
            TransportErrorKind::Timeout
        );
    }

    #[test]
    fn chain_error_display() {
        let err = ChainError::NonceConflict {
            expected: 4,
            got: 3,
        };
        assert_eq!(err.to_string(), "nonce conflict: expected 4, got 3");
    }
}
