// TestDependencies - mock implementations for testing
//
// Provides a scripted messaging client that can be injected into ServerDeps for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use super::{
    BaseMessagingClient, BaseMessagingSession, CredentialState, OpenedSession, OutgoingMessage,
    SessionEvent, TransportOptions,
};
use crate::domains::pairing::{PairingSettings, ReconnectPolicy};

/// Pairing code returned when no other code is configured
pub const MOCK_PAIRING_CODE: &str = "MOCK-CODE";

/// A call made against the mock messaging client
#[derive(Debug, Clone, PartialEq)]
pub enum MessagingCall {
    OpenSession {
        session_id: String,
        credentials: CredentialState,
    },
    RequestPairingCode {
        phone_number: String,
    },
    SendMessage {
        recipient: String,
        message: OutgoingMessage,
    },
    CloseSession {
        /// Entries under the probed workspace root at the moment of close
        workspace_entries: Option<usize>,
    },
}

// =============================================================================
// Mock Messaging Client
// =============================================================================

#[derive(Clone)]
pub struct MockMessagingClient {
    calls: Arc<Mutex<Vec<MessagingCall>>>,
    scripts: Arc<Mutex<VecDeque<Vec<SessionEvent>>>>,
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>>,
    pairing_code: String,
    pairing_failure: Option<String>,
    open_failure: Option<String>,
    send_failure: Option<String>,
    workspace_probe: Option<PathBuf>,
}

impl MockMessagingClient {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            scripts: Arc::new(Mutex::new(VecDeque::new())),
            senders: Arc::new(Mutex::new(Vec::new())),
            pairing_code: MOCK_PAIRING_CODE.to_string(),
            pairing_failure: None,
            open_failure: None,
            send_failure: None,
            workspace_probe: None,
        }
    }

    pub fn with_pairing_code(mut self, code: &str) -> Self {
        self.pairing_code = code.to_string();
        self
    }

    /// Make every pairing code request fail
    pub fn with_pairing_failure(mut self, reason: &str) -> Self {
        self.pairing_failure = Some(reason.to_string());
        self
    }

    /// Make every open_session call fail
    pub fn with_open_failure(mut self, reason: &str) -> Self {
        self.open_failure = Some(reason.to_string());
        self
    }

    /// Make every send_message call fail
    pub fn with_send_failure(mut self, reason: &str) -> Self {
        self.send_failure = Some(reason.to_string());
        self
    }

    /// Queue the events emitted by the next opened session (one call per open)
    pub fn with_events_on_open(self, events: Vec<SessionEvent>) -> Self {
        self.scripts.lock().unwrap().push_back(events);
        self
    }

    /// Count the entries under `root` whenever a session is closed
    pub fn with_workspace_probe(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_probe = Some(root.into());
        self
    }

    /// Get all calls in the order they were made
    pub fn calls(&self) -> Vec<MessagingCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MessagingCall::OpenSession { .. }))
            .count()
    }

    pub fn pairing_requests(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MessagingCall::RequestPairingCode { .. }))
            .count()
    }

    pub fn sent_messages(&self) -> Vec<(String, OutgoingMessage)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                MessagingCall::SendMessage { recipient, message } => {
                    Some((recipient.clone(), message.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn was_closed(&self) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| matches!(c, MessagingCall::CloseSession { .. }))
    }

    /// Push an event into the most recently opened session
    pub fn emit(&self, event: SessionEvent) -> bool {
        match self.senders.lock().unwrap().last() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

impl Default for MockMessagingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseMessagingClient for MockMessagingClient {
    async fn open_session(
        &self,
        session_id: &str,
        credentials: &CredentialState,
        _options: &TransportOptions,
    ) -> Result<OpenedSession> {
        self.calls.lock().unwrap().push(MessagingCall::OpenSession {
            session_id: session_id.to_string(),
            credentials: credentials.clone(),
        });

        if let Some(reason) = &self.open_failure {
            return Err(anyhow!("{}", reason));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        for event in script {
            let _ = tx.send(event);
        }
        // Sender stays alive so the stream only ends when the test says so
        self.senders.lock().unwrap().push(tx);

        Ok(OpenedSession {
            handle: Box::new(MockSession {
                client: self.clone(),
            }),
            events: rx,
        })
    }
}

struct MockSession {
    client: MockMessagingClient,
}

impl MockSession {
    fn record(&self, call: MessagingCall) {
        self.client.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BaseMessagingSession for MockSession {
    async fn request_pairing_code(&self, phone_number: &str) -> Result<String> {
        self.record(MessagingCall::RequestPairingCode {
            phone_number: phone_number.to_string(),
        });

        match &self.client.pairing_failure {
            Some(reason) => Err(anyhow!("{}", reason)),
            None => Ok(self.client.pairing_code.clone()),
        }
    }

    async fn send_message(&self, recipient: &str, message: OutgoingMessage) -> Result<()> {
        self.record(MessagingCall::SendMessage {
            recipient: recipient.to_string(),
            message,
        });

        match &self.client.send_failure {
            Some(reason) => Err(anyhow!("{}", reason)),
            None => Ok(()),
        }
    }

    async fn close(&self) -> Result<()> {
        let workspace_entries = self
            .client
            .workspace_probe
            .as_ref()
            .map(|root| std::fs::read_dir(root).map(|dir| dir.count()).unwrap_or(0));
        self.record(MessagingCall::CloseSession { workspace_entries });
        Ok(())
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Pairing settings with millisecond delays so tests run quickly
pub fn fast_pairing_settings() -> PairingSettings {
    PairingSettings {
        pairing_settle: Duration::from_millis(5),
        open_settle: Duration::from_millis(5),
        flush_settle: Duration::from_millis(5),
        reconnect: ReconnectPolicy {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            max_attempts: 2,
        },
        call_timeout: Duration::from_secs(2),
        session_ttl: Duration::from_secs(5),
        ..PairingSettings::default()
    }
}
