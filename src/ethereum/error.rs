use alloy::primitives::{Address, B256};
use thiserror::Error;

/// Failure reported by a chain client (RPC transport, node rejection).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ClientError(pub String);

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Everything a binding operation can fail with.
///
/// Encoding and signing variants are raised before any bytes reach the chain
/// client. Transport variants carry the client's message verbatim and are never
/// retried by this crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    #[error("Argument count mismatch for '{function}': expected {expected}, got {got}")]
    ArgumentCountMismatch {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("Invalid argument #{index} for '{function}': expected a value of type '{expected}'")]
    InvalidArgument {
        function: String,
        index: usize,
        expected: String,
    },

    #[error("Function '{0}' not found in contract interface")]
    UnknownFunction(String),

    #[error("Interface type could not be resolved: {0}")]
    InvalidInterface(String),

    #[error("Contract has no bytecode to deploy")]
    MissingBytecode,

    #[error("Contract has no address; deploy it or bind it to an existing address first")]
    MissingAddress,

    #[error("Private key cannot be empty for a signed transaction; configure a signing key")]
    MissingKey,

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Invalid transaction options: {0}")]
    InvalidOptions(String),

    #[error("Failed to resolve pending nonce for {address}: {message}")]
    NonceResolutionFailed { address: Address, message: String },

    #[error("Failed to sign transaction: {0}")]
    Signing(String),

    #[error("Transaction rejected: {0}")]
    SubmissionRejected(String),

    #[error("Transaction 0x{hash:x} was sent but confirmation failed: {message}")]
    ConfirmationFailed { hash: B256, message: String },

    #[error("Call to '{function}' failed: {message}")]
    CallFailed { function: String, message: String },

    #[error("Could not decode {item}: {message}")]
    DecodeMismatch { item: String, message: String },

    #[error("Transaction 0x{0:x} not found")]
    TransactionNotFound(B256),

    #[error("Compilation failed: {0}")]
    Compilation(String),
}

/// Fieldless view of [`BindingError`] for matching on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ArgumentCountMismatch,
    InvalidArgument,
    UnknownFunction,
    InvalidInterface,
    MissingBytecode,
    MissingAddress,
    MissingKey,
    InvalidKey,
    InvalidOptions,
    NonceResolutionFailed,
    Signing,
    SubmissionRejected,
    ConfirmationFailed,
    CallFailed,
    DecodeMismatch,
    TransactionNotFound,
    Compilation,
}

impl BindingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ArgumentCountMismatch { .. } => ErrorKind::ArgumentCountMismatch,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::UnknownFunction(_) => ErrorKind::UnknownFunction,
            Self::InvalidInterface(_) => ErrorKind::InvalidInterface,
            Self::MissingBytecode => ErrorKind::MissingBytecode,
            Self::MissingAddress => ErrorKind::MissingAddress,
            Self::MissingKey => ErrorKind::MissingKey,
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
            Self::InvalidOptions(_) => ErrorKind::InvalidOptions,
            Self::NonceResolutionFailed { .. } => ErrorKind::NonceResolutionFailed,
            Self::Signing(_) => ErrorKind::Signing,
            Self::SubmissionRejected(_) => ErrorKind::SubmissionRejected,
            Self::ConfirmationFailed { .. } => ErrorKind::ConfirmationFailed,
            Self::CallFailed { .. } => ErrorKind::CallFailed,
            Self::DecodeMismatch { .. } => ErrorKind::DecodeMismatch,
            Self::TransactionNotFound(_) => ErrorKind::TransactionNotFound,
            Self::Compilation(_) => ErrorKind::Compilation,
        }
    }

    pub(crate) fn decode(item: impl Into<String>, message: impl ToString) -> Self {
        Self::DecodeMismatch {
            item: item.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let err = BindingError::ArgumentCountMismatch {
            function: "transfer".to_string(),
            expected: 2,
            got: 1,
        };
        assert_eq!(err.kind(), ErrorKind::ArgumentCountMismatch);
        assert_eq!(BindingError::MissingKey.kind(), ErrorKind::MissingKey);
    }

    #[test]
    fn test_messages_carry_context() {
        let err = BindingError::ConfirmationFailed {
            hash: B256::repeat_byte(0xab),
            message: "dropped".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("0xabab"));
        assert!(rendered.contains("dropped"));

        let err = BindingError::decode("event 'Transfer'", "missing topic");
        assert!(err.to_string().contains("Transfer"));
    }
}
