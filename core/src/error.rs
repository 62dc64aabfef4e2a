// Error taxonomy shared by every component of the overlay

use thiserror::Error;

use crate::registry::NodeId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OnionError {
    #[error("Node {0} is already registered")]
    RegistrationConflict(NodeId),
    #[error("No private key stored for node {0}")]
    KeyNotFound(NodeId),
    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),
    #[error("Encryption failed")]
    EncryptionFailure,
    #[error("Not enough nodes for a circuit (need {required}, have {available})")]
    InsufficientNodes { required: usize, available: usize },
    #[error("Forwarding to port {address} failed: {reason}")]
    ForwardingFailure { address: u16, reason: String },
    #[error("Invalid key material: {0}")]
    InvalidKey(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid circuit length {0}")]
    InvalidCircuitLength(usize),
    #[error("Malformed request: {0}")]
    BadRequest(String),
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Remote node answered {status} ({reason}): {message}")]
    Remote {
        status: u16,
        reason: String,
        message: String,
    },
}

impl OnionError {
    /// Stable machine-readable code carried in error replies.
    pub fn reason(&self) -> &'static str {
        match self {
            OnionError::RegistrationConflict(_) => "registration_conflict",
            OnionError::KeyNotFound(_) => "key_not_found",
            OnionError::DecryptionFailure(_) => "decryption_failure",
            OnionError::EncryptionFailure => "encryption_failure",
            OnionError::InsufficientNodes { .. } => "insufficient_nodes",
            OnionError::ForwardingFailure { .. } => "forwarding_failure",
            OnionError::InvalidKey(_) => "invalid_key",
            OnionError::InvalidAddress(_) => "invalid_address",
            OnionError::InvalidCircuitLength(_) => "invalid_circuit_length",
            OnionError::BadRequest(_) => "bad_request",
            OnionError::RegistryUnavailable(_) => "registry_unavailable",
            OnionError::IoError(_) => "io_error",
            OnionError::Remote { .. } => "remote_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, OnionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_distinct() {
        let errors = vec![
            OnionError::RegistrationConflict(1),
            OnionError::KeyNotFound(1),
            OnionError::DecryptionFailure("x".into()),
            OnionError::EncryptionFailure,
            OnionError::InsufficientNodes { required: 3, available: 1 },
            OnionError::ForwardingFailure { address: 4001, reason: "x".into() },
            OnionError::InvalidKey("x".into()),
            OnionError::InvalidAddress("x".into()),
            OnionError::InvalidCircuitLength(0),
            OnionError::BadRequest("x".into()),
            OnionError::RegistryUnavailable("x".into()),
            OnionError::IoError("x".into()),
            OnionError::Remote {
                status: 503,
                reason: "insufficient_nodes".into(),
                message: "x".into(),
            },
        ];

        let mut codes: Vec<_> = errors.iter().map(|e| e.reason()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_error_display() {
        let err = OnionError::InsufficientNodes { required: 3, available: 2 };
        assert!(err.to_string().contains("need 3"));

        let err = OnionError::RegistrationConflict(7);
        assert!(err.to_string().contains('7'));
    }
}
