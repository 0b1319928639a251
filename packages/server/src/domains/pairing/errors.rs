use std::time::Duration;

use thiserror::Error;

use super::types::LOGGED_OUT_STATUS;

/// Pairing errors, from request validation to post-response delivery
#[derive(Error, Debug)]
pub enum PairingError {
    #[error("Please provide a valid phone number")]
    Validation,

    #[error("Failed to allocate session workspace: {0}")]
    Allocation(#[source] std::io::Error),

    #[error("Pairing code request failed: {0}")]
    PairingRequest(String),

    #[error("Credential delivery failed: {0}")]
    Delivery(String),

    #[error("Connection closed (status {status_code:?})")]
    TransientDisconnect { status_code: Option<u16> },

    #[error("Session was logged out")]
    TerminalDisconnect,

    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl PairingError {
    /// Classify a transport close event.
    pub fn from_close(status_code: Option<u16>) -> Self {
        if status_code == Some(LOGGED_OUT_STATUS) {
            PairingError::TerminalDisconnect
        } else {
            PairingError::TransientDisconnect { status_code }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, PairingError::TransientDisconnect { .. })
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, PairingError::Validation)
    }

    /// Message safe to show the HTTP caller. Internal details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            PairingError::Validation => "Please provide a valid phone number",
            PairingError::PairingRequest(_) => "Pairing failed. Try again later.",
            _ => "Service Unavailable. Try again later.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logged_out_close_is_terminal() {
        let err = PairingError::from_close(Some(401));
        assert!(matches!(err, PairingError::TerminalDisconnect));
        assert!(!err.is_retryable());
    }

    #[test]
    fn other_closes_are_transient() {
        for code in [None, Some(408), Some(428), Some(500), Some(515)] {
            assert!(PairingError::from_close(code).is_retryable(), "{:?}", code);
        }
    }

    #[test]
    fn public_messages_hide_internals() {
        let err = PairingError::PairingRequest("upstream said 429 with token abc".into());
        assert_eq!(err.public_message(), "Pairing failed. Try again later.");

        let err = PairingError::Unavailable("disk exploded".into());
        assert_eq!(err.public_message(), "Service Unavailable. Try again later.");
        assert!(!err.is_client_error());
        assert!(PairingError::Validation.is_client_error());
    }
}
