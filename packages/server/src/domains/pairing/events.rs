use super::types::{CredentialBundle, PairingCode};
use crate::kernel::CredentialState;

/// Pairing events - facts about what happened to a session
///
/// Transport events (credentials, open, close) come from the messaging
/// library; the rest are emitted by the controller after running a command.
#[derive(Debug, Clone)]
pub enum PairingEvent {
    /// Controller task started
    Started,

    /// Protocol session created from the stored credentials
    SessionOpened { registered: bool },

    /// Loading credentials or opening the session failed
    SessionInitFailed { reason: String },

    PairingCodeIssued { code: PairingCode },

    PairingCodeFailed { reason: String },

    /// The library updated its credential document
    CredentialsChanged { state: CredentialState },

    /// Transport authenticated as `account_id`
    ConnectionOpened { account_id: String },

    ConnectionClosed { status_code: Option<u16> },

    /// Credential bytes read back after the open settle delay
    BundleRead { bundle: CredentialBundle },

    BundleUnavailable { reason: String },

    CredentialsDelivered,

    DeliveryFailed { reason: String },

    /// Reconnect backoff elapsed
    ReconnectDue,

    /// Session lifetime exceeded
    SessionExpired,

    /// Session closed and workspace released
    TornDown,
}
