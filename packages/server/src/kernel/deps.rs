//! Server dependencies and the gateway-backed messaging adapter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wa_gateway::models::{ConnectionState, CreateSessionRequest, GatewayEvent};
use wa_gateway::{GatewayError, GatewayService};

use super::traits::{
    BaseMessagingClient, BaseMessagingSession, ConnectionUpdate, CredentialState, OpenedSession,
    OutgoingMessage, SessionEvent, TransportOptions,
};
use crate::domains::pairing::{PairingSettings, WorkspaceRoot};

// =============================================================================
// Gateway Adapter
// =============================================================================

/// Wrapper to implement BaseMessagingClient for the messaging gateway
pub struct GatewayAdapter(pub Arc<GatewayService>);

impl GatewayAdapter {
    pub fn new(service: Arc<GatewayService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseMessagingClient for GatewayAdapter {
    async fn open_session(
        &self,
        session_id: &str,
        credentials: &CredentialState,
        options: &TransportOptions,
    ) -> Result<OpenedSession> {
        let request = CreateSessionRequest {
            session_id: session_id.to_string(),
            credentials: credentials.as_value().clone(),
            browser: [
                options.browser.platform.clone(),
                options.browser.name.clone(),
            ],
            print_qr_in_terminal: options.print_qr_in_terminal,
            generate_high_quality_link_preview: options.link_previews,
        };

        self.0
            .create_session(&request)
            .await
            .context("Failed to create gateway session")?;

        let stream = self
            .0
            .subscribe_events(session_id)
            .await
            .context("Failed to subscribe to gateway events")?;

        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_events(session_id.to_string(), stream, tx));

        Ok(OpenedSession {
            handle: Box::new(GatewaySession {
                service: self.0.clone(),
                session_id: session_id.to_string(),
                pump,
            }),
            events: rx,
        })
    }
}

/// Forward gateway events into the session channel until either side goes away.
async fn pump_events<S>(session_id: String, stream: S, tx: mpsc::UnboundedSender<SessionEvent>)
where
    S: Stream<Item = Result<GatewayEvent, GatewayError>> + Send + 'static,
{
    let mut stream = Box::pin(stream);

    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                let Some(event) = map_gateway_event(event) else {
                    continue;
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
            Err(e) => warn!(session_id = %session_id, error = %e, "dropping unreadable gateway event"),
        }
    }

    debug!(session_id = %session_id, "gateway event stream ended");
}

fn map_gateway_event(event: GatewayEvent) -> Option<SessionEvent> {
    match event {
        GatewayEvent::CredsUpdate { creds } => Some(SessionEvent::CredentialsChanged(
            CredentialState::from_value(creds),
        )),
        GatewayEvent::ConnectionUpdate {
            connection: Some(ConnectionState::Open),
            user,
            ..
        } => Some(SessionEvent::Connection(ConnectionUpdate::Open {
            account_id: user.map(|u| u.id).unwrap_or_default(),
        })),
        GatewayEvent::ConnectionUpdate {
            connection: Some(ConnectionState::Close),
            last_disconnect,
            ..
        } => Some(SessionEvent::Connection(ConnectionUpdate::Close {
            status_code: last_disconnect.and_then(|d| d.status_code),
        })),
        GatewayEvent::ConnectionUpdate { .. } | GatewayEvent::Unknown => None,
    }
}

struct GatewaySession {
    service: Arc<GatewayService>,
    session_id: String,
    pump: JoinHandle<()>,
}

#[async_trait]
impl BaseMessagingSession for GatewaySession {
    async fn request_pairing_code(&self, phone_number: &str) -> Result<String> {
        self.service
            .request_pairing_code(&self.session_id, phone_number)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
    }

    async fn send_message(&self, recipient: &str, message: OutgoingMessage) -> Result<()> {
        let sent = match message {
            OutgoingMessage::Document {
                bytes,
                mimetype,
                file_name,
                caption,
            } => {
                self.service
                    .send_document(
                        &self.session_id,
                        recipient,
                        &bytes,
                        &mimetype,
                        &file_name,
                        caption.as_deref(),
                    )
                    .await
            }
            OutgoingMessage::Text { body } => {
                self.service
                    .send_text(&self.session_id, recipient, &body)
                    .await
            }
        };
        sent.map_err(|e| anyhow::anyhow!("{}", e))
    }

    async fn close(&self) -> Result<()> {
        self.pump.abort();
        self.service
            .close_session(&self.session_id)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

// =============================================================================
// Active Session Counter
// =============================================================================

/// Number of pairing controllers currently running
#[derive(Clone, Default)]
pub struct ActiveSessions(Arc<AtomicUsize>);

impl ActiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Count a session until the returned guard is dropped.
    pub fn enter(&self) -> ActiveSessionGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        ActiveSessionGuard(self.0.clone())
    }
}

pub struct ActiveSessionGuard(Arc<AtomicUsize>);

impl Drop for ActiveSessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies shared by every request (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub messaging: Arc<dyn BaseMessagingClient>,
    pub workspaces: WorkspaceRoot,
    pub settings: PairingSettings,
    pub active_sessions: ActiveSessions,
}

impl ServerDeps {
    pub fn new(
        messaging: Arc<dyn BaseMessagingClient>,
        workspaces: WorkspaceRoot,
        settings: PairingSettings,
    ) -> Self {
        Self {
            messaging,
            workspaces,
            settings,
            active_sessions: ActiveSessions::new(),
        }
    }
}
