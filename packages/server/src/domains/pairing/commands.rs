use std::time::Duration;

use super::types::{CredentialBundle, PhoneNumber, SessionOutcome};
use crate::kernel::CredentialState;

/// Pairing commands - IO the controller performs on behalf of the machine
#[derive(Debug, Clone)]
pub enum PairingCommand {
    /// Load credentials from the workspace and open a protocol session
    OpenSession,

    /// Settle, then ask the library for a pairing code
    RequestPairingCode { phone: PhoneNumber },

    /// Write the latest credential document to the workspace
    PersistCredentials { state: CredentialState },

    /// Settle, then read the credential bytes back
    ReadBundle,

    /// Send the credentials document and the notice to the linked account
    DeliverCredentials {
        recipient: String,
        bundle: CredentialBundle,
    },

    /// Drop the dead session and wait before reopening
    ScheduleReconnect {
        attempt: u32,
        delay: Duration,
        status_code: Option<u16>,
    },

    /// Close the session, release the workspace, answer the caller if still pending
    Teardown { flush: bool, outcome: SessionOutcome },
}
