//! Pairing domain data types

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::errors::PairingError;

/// Close-reason code meaning the account logged the session out.
pub const LOGGED_OUT_STATUS: u16 = 401;

/// Server suffix for personal account addresses.
const USER_SERVER: &str = "s.whatsapp.net";

/// Unique per-request session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digit-only phone number taken from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Strip every non-digit character; an empty result is a validation error.
    pub fn parse(raw: &str) -> Result<Self, PairingError> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(PairingError::Validation);
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address of the account owning this number.
    pub fn to_jid(&self) -> String {
        format!("{}@{}", self.0, USER_SERVER)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Code the user types on their phone to link the new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PairingCode(String);

impl PairingCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw bytes of the persisted credentials file.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle(Vec<u8>);

impl CredentialBundle {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

// Never print key material.
impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialBundle({} bytes)", self.0.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Init,
    AwaitingPairRequest,
    PairedOpen,
    DeliveringCredentials,
    Reconnecting,
    Closing,
    Done,
    Failed,
}

impl PairingState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PairingState::Done | PairingState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PairingState::Init => "init",
            PairingState::AwaitingPairRequest => "awaiting_pair_request",
            PairingState::PairedOpen => "paired_open",
            PairingState::DeliveringCredentials => "delivering_credentials",
            PairingState::Reconnecting => "reconnecting",
            PairingState::Closing => "closing",
            PairingState::Done => "done",
            PairingState::Failed => "failed",
        }
    }
}

impl fmt::Display for PairingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Delivered,
    DeliveryFailed,
    LoggedOut,
    InitFailed,
    PairingFailed,
    ReconnectsExhausted,
    Expired,
}

impl SessionOutcome {
    /// Terminal state reached once teardown finishes.
    pub fn terminal_state(self) -> PairingState {
        match self {
            SessionOutcome::Delivered | SessionOutcome::DeliveryFailed | SessionOutcome::LoggedOut => {
                PairingState::Done
            }
            SessionOutcome::InitFailed
            | SessionOutcome::PairingFailed
            | SessionOutcome::ReconnectsExhausted
            | SessionOutcome::Expired => PairingState::Failed,
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionOutcome::Delivered => "delivered",
            SessionOutcome::DeliveryFailed => "delivery_failed",
            SessionOutcome::LoggedOut => "logged_out",
            SessionOutcome::InitFailed => "init_failed",
            SessionOutcome::PairingFailed => "pairing_failed",
            SessionOutcome::ReconnectsExhausted => "reconnects_exhausted",
            SessionOutcome::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Final summary of a controller run, logged when the background task ends.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub state: PairingState,
    pub outcome: Option<SessionOutcome>,
    pub reconnects: u32,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}
