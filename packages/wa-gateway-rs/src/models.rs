use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub session_id: String,
    /// Credential document as last persisted by the caller (`{}` when fresh).
    pub credentials: Value,
    /// `[platform, browser]`, e.g. `["macOS", "Safari"]`.
    pub browser: [String; 2],
    pub print_qr_in_terminal: bool,
    pub generate_high_quality_link_preview: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingCodeRequest {
    pub phone_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairingCodeResponse {
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub to: String,
    #[serde(flatten)]
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Document {
        /// Base64 encoded file contents.
        document: String,
        mimetype: String,
        #[serde(rename = "fileName")]
        file_name: String,
        caption: Option<String>,
    },
    Text {
        text: String,
    },
}

/// One line of the `/sessions/{id}/events` stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayEvent {
    #[serde(rename = "creds.update")]
    CredsUpdate { creds: Value },

    #[serde(rename = "connection.update")]
    ConnectionUpdate {
        connection: Option<ConnectionState>,
        #[serde(rename = "lastDisconnect")]
        last_disconnect: Option<LastDisconnect>,
        user: Option<GatewayUser>,
    },

    /// Any event type this client does not act on (message upserts, presence, ...).
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastDisconnect {
    pub status_code: Option<u16>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayUser {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayErrorBody {
    pub error: String,
}
