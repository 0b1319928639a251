// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no pairing logic.
// The pairing state machine lives in domains/pairing and drives these traits.
//
// Naming convention: Base* for trait names (e.g., BaseMessagingClient)

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

// =============================================================================
// Credential State (opaque, owned by the messaging library)
// =============================================================================

/// Credential document produced and updated by the messaging library.
///
/// The only field read here is `registered`, which flips to `true` once the
/// account owner has entered the pairing code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialState(Value);

impl CredentialState {
    /// Empty document; the library fills it in on first connect.
    pub fn fresh() -> Self {
        Self(Value::Object(Default::default()))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn is_registered(&self) -> bool {
        self.0
            .get("registered")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

// =============================================================================
// Session Events
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionUpdate {
    /// Transport authenticated; `account_id` is the linked account's address.
    Open { account_id: String },
    /// Transport closed; `status_code` is the library's disconnect reason.
    Close { status_code: Option<u16> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CredentialsChanged(CredentialState),
    Connection(ConnectionUpdate),
}

// =============================================================================
// Transport Options
// =============================================================================

/// Browser the linked session presents itself as on the phone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserDescriptor {
    pub platform: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    pub browser: BrowserDescriptor,
    pub print_qr_in_terminal: bool,
    pub link_previews: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            browser: BrowserDescriptor {
                platform: "macOS".to_string(),
                name: "Safari".to_string(),
            },
            print_qr_in_terminal: false,
            link_previews: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingMessage {
    Document {
        bytes: Vec<u8>,
        mimetype: String,
        file_name: String,
        caption: Option<String>,
    },
    Text {
        body: String,
    },
}

// =============================================================================
// Messaging Traits (Infrastructure - multi-device messaging library)
// =============================================================================

/// A live protocol session plus the channel its lifecycle events arrive on.
pub struct OpenedSession {
    pub handle: Box<dyn BaseMessagingSession>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

#[async_trait]
pub trait BaseMessagingClient: Send + Sync {
    /// Open a protocol session using previously persisted credentials
    async fn open_session(
        &self,
        session_id: &str,
        credentials: &CredentialState,
        options: &TransportOptions,
    ) -> Result<OpenedSession>;
}

#[async_trait]
pub trait BaseMessagingSession: Send + Sync {
    /// Ask the library for a pairing code bound to `phone_number`
    async fn request_pairing_code(&self, phone_number: &str) -> Result<String>;

    async fn send_message(&self, recipient: &str, message: OutgoingMessage) -> Result<()>;

    /// Close the transport (best-effort)
    async fn close(&self) -> Result<()>;
}
