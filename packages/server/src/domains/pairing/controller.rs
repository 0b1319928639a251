//! Pairing session controller - executes the machine's commands.
//!
//! One controller owns one session: its workspace, its credential store, the
//! live protocol session and the pending HTTP response. It runs as a detached
//! task. Each loop iteration takes the next event (facts produced by its own
//! commands first, then transport events in arrival order), lets the
//! [`PairingMachine`] decide, and executes the resulting command.
//!
//! Settle delays keep listening to the transport: credential updates are
//! persisted as they arrive, everything else is deferred to the main loop.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, timeout_at, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::commands::PairingCommand;
use super::credentials::CredentialStore;
use super::errors::PairingError;
use super::events::PairingEvent;
use super::machines::PairingMachine;
use super::responder::Responder;
use super::settings::PairingSettings;
use super::types::{
    CredentialBundle, PairingCode, PhoneNumber, SessionId, SessionOutcome, SessionReport,
};
use super::workspace::{Workspace, CREDENTIALS_FILE};
use crate::kernel::{
    ActiveSessions, BaseMessagingClient, BaseMessagingSession, ConnectionUpdate, CredentialState,
    OutgoingMessage, SessionEvent,
};

const CREDENTIALS_MIMETYPE: &str = "application/json";

const DOCUMENT_CAPTION: &str =
    "Your session file (creds.json)\n\nKeep it safe and never share it.";

pub struct PairingController {
    session_id: SessionId,
    phone: PhoneNumber,
    workspace: Workspace,
    store: CredentialStore,
    responder: Responder,
    messaging: Arc<dyn BaseMessagingClient>,
    settings: PairingSettings,
    session: Option<Box<dyn BaseMessagingSession>>,
    transport: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    /// Transport events received during a settle delay, in arrival order
    deferred: VecDeque<PairingEvent>,
}

impl PairingController {
    pub fn new(
        phone: PhoneNumber,
        workspace: Workspace,
        responder: Responder,
        messaging: Arc<dyn BaseMessagingClient>,
        settings: PairingSettings,
    ) -> Self {
        Self {
            session_id: workspace.session_id().clone(),
            store: CredentialStore::for_workspace(&workspace),
            phone,
            workspace,
            responder,
            messaging,
            settings,
            session: None,
            transport: None,
            deferred: VecDeque::new(),
        }
    }

    /// Run the controller as a detached task. The report is only logged.
    pub fn spawn(self, active: ActiveSessions) -> JoinHandle<SessionReport> {
        let span = info_span!(
            "pairing_session",
            session_id = %self.session_id,
            phone = %self.phone
        );

        tokio::spawn(
            async move {
                let _active = active.enter();
                let report = self.run().await;
                info!(
                    state = %report.state,
                    outcome = ?report.outcome,
                    reconnects = report.reconnects,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "pairing session finished"
                );
                report
            }
            .instrument(span),
        )
    }

    /// Drive the session until it reaches DONE or FAILED.
    pub async fn run(mut self) -> SessionReport {
        let started_at = Utc::now();
        let started = Instant::now();
        let deadline = started + self.settings.session_ttl;

        let mut machine = PairingMachine::new(self.phone.clone(), self.settings.reconnect);
        let mut queue = VecDeque::from([PairingEvent::Started]);

        while !machine.state().is_terminal() {
            let event = match queue.pop_front().or_else(|| self.deferred.pop_front()) {
                Some(event) => event,
                None => self.next_transport_event(deadline).await,
            };

            let before = machine.state();
            let command = machine.decide(&event);
            if machine.state() != before {
                debug!(from = %before, to = %machine.state(), "pairing state changed");
            }

            if let Some(command) = command {
                if let Some(follow_up) = self.execute(command).await {
                    queue.push_back(follow_up);
                }
            }
        }

        SessionReport {
            session_id: self.session_id.clone(),
            state: machine.state(),
            outcome: machine.outcome(),
            reconnects: machine.reconnects(),
            started_at,
            elapsed: started.elapsed(),
        }
    }

    async fn next_transport_event(&mut self, deadline: Instant) -> PairingEvent {
        let Some(events) = self.transport.as_mut() else {
            sleep_until(deadline).await;
            return PairingEvent::SessionExpired;
        };

        match timeout_at(deadline, events.recv()).await {
            Err(_) => PairingEvent::SessionExpired,
            Ok(received) => self.transport_event(received),
        }
    }

    fn transport_event(&mut self, received: Option<SessionEvent>) -> PairingEvent {
        match received {
            Some(SessionEvent::CredentialsChanged(state)) => {
                PairingEvent::CredentialsChanged { state }
            }
            Some(SessionEvent::Connection(ConnectionUpdate::Open { account_id })) => {
                info!(account_id = %account_id, "connection opened");
                PairingEvent::ConnectionOpened { account_id }
            }
            Some(SessionEvent::Connection(ConnectionUpdate::Close { status_code })) => {
                PairingEvent::ConnectionClosed { status_code }
            }
            None => {
                debug!("transport event stream ended");
                self.transport = None;
                PairingEvent::ConnectionClosed { status_code: None }
            }
        }
    }

    /// Wait `delay` while still draining the transport.
    async fn settle(&mut self, delay: Duration) {
        let wake = Instant::now() + delay;

        loop {
            let Some(events) = self.transport.as_mut() else {
                sleep_until(wake).await;
                return;
            };

            let received = tokio::select! {
                _ = sleep_until(wake) => return,
                received = events.recv() => received,
            };

            match received {
                Some(SessionEvent::CredentialsChanged(state)) => self.persist(&state).await,
                other => {
                    let event = self.transport_event(other);
                    self.deferred.push_back(event);
                }
            }
        }
    }

    async fn persist(&self, state: &CredentialState) {
        // A failed write is logged; the next update rewrites the whole file.
        if let Err(e) = self.store.save(state).await {
            warn!(error = %e, "failed to persist credentials");
        }
    }

    /// Close the live session, if any, without letting its failure matter.
    async fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) =
                with_timeout(self.settings.call_timeout, "close session", session.close()).await
            {
                debug!(error = %e, "ignoring close failure");
            }
        }
    }

    async fn execute(&mut self, command: PairingCommand) -> Option<PairingEvent> {
        match command {
            PairingCommand::OpenSession => Some(self.open_session().await),
            PairingCommand::RequestPairingCode { phone } => {
                Some(self.request_pairing_code(&phone).await)
            }
            PairingCommand::PersistCredentials { state } => {
                self.persist(&state).await;
                None
            }
            PairingCommand::ReadBundle => Some(self.read_bundle().await),
            PairingCommand::DeliverCredentials { recipient, bundle } => {
                Some(self.deliver_credentials(&recipient, bundle).await)
            }
            PairingCommand::ScheduleReconnect {
                attempt,
                delay,
                status_code,
            } => {
                // Events of the dead session are moot once it is gone.
                self.transport = None;
                self.deferred.clear();
                self.close_session().await;
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    cause = %PairingError::from_close(status_code),
                    "connection closed, reconnecting"
                );
                sleep(delay).await;
                Some(PairingEvent::ReconnectDue)
            }
            PairingCommand::Teardown { flush, outcome } => {
                self.teardown(flush, outcome).await;
                Some(PairingEvent::TornDown)
            }
        }
    }

    async fn open_session(&mut self) -> PairingEvent {
        let credentials = match self.store.load().await {
            Ok(credentials) => credentials,
            Err(e) => {
                let reason = format!("{:#}", e);
                error!(error = %reason, "failed to load credentials");
                return PairingEvent::SessionInitFailed { reason };
            }
        };

        let opened = with_timeout(
            self.settings.call_timeout,
            "open session",
            self.messaging.open_session(
                self.session_id.as_str(),
                &credentials,
                &self.settings.transport,
            ),
        )
        .await;

        match opened {
            Ok(opened) => {
                let registered = credentials.is_registered();
                self.session = Some(opened.handle);
                self.transport = Some(opened.events);
                info!(registered, "protocol session opened");
                PairingEvent::SessionOpened { registered }
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                error!(error = %reason, "failed to open protocol session");
                PairingEvent::SessionInitFailed { reason }
            }
        }
    }

    async fn request_pairing_code(&mut self, phone: &PhoneNumber) -> PairingEvent {
        self.settle(self.settings.pairing_settle).await;

        let Some(session) = self.session.as_ref() else {
            return self.pairing_failed("no open protocol session".to_string());
        };

        let result = with_timeout(
            self.settings.call_timeout,
            "pairing code request",
            session.request_pairing_code(phone.as_str()),
        )
        .await;

        match result {
            Ok(code) => {
                let code = PairingCode::new(code);
                info!(code = %code, "pairing code issued");
                if !self.responder.respond(Ok(code.clone())) {
                    debug!("response already sent, pairing code not forwarded");
                }
                PairingEvent::PairingCodeIssued { code }
            }
            Err(e) => self.pairing_failed(format!("{:#}", e)),
        }
    }

    fn pairing_failed(&self, reason: String) -> PairingEvent {
        error!(error = %reason, "pairing code generation failed");
        self.responder
            .respond(Err(PairingError::PairingRequest(reason.clone())));
        PairingEvent::PairingCodeFailed { reason }
    }

    async fn read_bundle(&mut self) -> PairingEvent {
        self.settle(self.settings.open_settle).await;

        match self.store.read_bundle().await {
            Ok(bundle) => {
                debug!(bytes = bundle.len(), "credential bundle read");
                PairingEvent::BundleRead { bundle }
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                error!(error = %reason, "credential bundle unavailable");
                PairingEvent::BundleUnavailable { reason }
            }
        }
    }

    async fn deliver_credentials(&mut self, recipient: &str, bundle: CredentialBundle) -> PairingEvent {
        let Some(session) = self.session.as_ref() else {
            let error = PairingError::Delivery("no open protocol session".to_string());
            error!(error = %error, "session error");
            return PairingEvent::DeliveryFailed {
                reason: error.to_string(),
            };
        };

        let document = OutgoingMessage::Document {
            bytes: bundle.into_bytes(),
            mimetype: CREDENTIALS_MIMETYPE.to_string(),
            file_name: CREDENTIALS_FILE.to_string(),
            caption: Some(DOCUMENT_CAPTION.to_string()),
        };
        let notice = OutgoingMessage::Text {
            body: self.settings.banner.clone(),
        };
        let limit = self.settings.call_timeout;

        let result = async {
            with_timeout(limit, "send credentials", session.send_message(recipient, document))
                .await?;
            with_timeout(limit, "send notice", session.send_message(recipient, notice)).await
        }
        .await;

        match result {
            Ok(()) => {
                info!(recipient = %recipient, "session credentials delivered");
                PairingEvent::CredentialsDelivered
            }
            Err(e) => {
                let error = PairingError::Delivery(format!("{:#}", e));
                error!(error = %error, "session error");
                PairingEvent::DeliveryFailed {
                    reason: error.to_string(),
                }
            }
        }
    }

    async fn teardown(&mut self, flush: bool, outcome: SessionOutcome) {
        if flush {
            self.settle(self.settings.flush_settle).await;
        }

        self.transport = None;
        self.deferred.clear();
        self.close_session().await;

        self.workspace.release();

        let fallback = PairingError::Unavailable(format!("session ended: {}", outcome));
        if self.responder.respond(Err(fallback)) {
            warn!(outcome = %outcome, "session ended before a pairing code was issued");
        }

        info!(outcome = %outcome, "session closed and cleaned up");
    }
}

/// Bound an external call; elapsing counts as that call failing.
async fn with_timeout<T>(
    limit: Duration,
    operation: &'static str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(PairingError::Timeout { operation, limit }.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::pairing::responder::PairingReply;
    use crate::domains::pairing::types::PairingState;
    use crate::domains::pairing::workspace::WorkspaceRoot;
    use crate::kernel::test_dependencies::{
        fast_pairing_settings, MessagingCall, MockMessagingClient, MOCK_PAIRING_CODE,
    };
    use crate::kernel::CredentialState;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    const ACCOUNT: &str = "15550001111:7@s.whatsapp.net";

    struct Harness {
        _root: TempDir,
        root: PathBuf,
        dir: PathBuf,
        controller: PairingController,
        reply: oneshot::Receiver<PairingReply>,
    }

    fn harness(mock: &MockMessagingClient, settings: PairingSettings) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let workspace = WorkspaceRoot::new(root.path())
            .acquire(&SessionId::new())
            .unwrap();
        let dir = workspace.path().to_path_buf();
        let (responder, reply) = Responder::channel();
        let controller = PairingController::new(
            PhoneNumber::parse("+1 (555) 000-1111").unwrap(),
            workspace,
            responder,
            Arc::new(mock.clone()),
            settings,
        );

        Harness {
            root: root.path().to_path_buf(),
            _root: root,
            dir,
            controller,
            reply,
        }
    }

    fn registered_creds() -> Value {
        json!({ "registered": true, "me": { "id": ACCOUNT } })
    }

    fn creds_changed(value: Value) -> SessionEvent {
        SessionEvent::CredentialsChanged(CredentialState::from_value(value))
    }

    fn opened(account_id: &str) -> SessionEvent {
        SessionEvent::Connection(ConnectionUpdate::Open {
            account_id: account_id.to_string(),
        })
    }

    fn closed(status_code: Option<u16>) -> SessionEvent {
        SessionEvent::Connection(ConnectionUpdate::Close { status_code })
    }

    #[tokio::test]
    async fn delivers_credentials_then_closes_and_releases() {
        let mock = MockMessagingClient::new()
            .with_events_on_open(vec![creds_changed(registered_creds()), opened(ACCOUNT)]);
        let h = harness(&mock, fast_pairing_settings());
        let mock = mock.with_workspace_probe(&h.root);
        let controller = PairingController {
            messaging: Arc::new(mock.clone()),
            ..h.controller
        };

        let report = controller.run().await;

        assert_eq!(report.state, PairingState::Done);
        assert_eq!(report.outcome, Some(SessionOutcome::Delivered));
        assert_eq!(report.reconnects, 0);

        let code = h.reply.await.unwrap().unwrap();
        assert_eq!(code.as_str(), MOCK_PAIRING_CODE);

        let sent = mock.sent_messages();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(recipient, _)| recipient == ACCOUNT));
        match &sent[0].1 {
            OutgoingMessage::Document {
                bytes,
                file_name,
                mimetype,
                ..
            } => {
                assert_eq!(file_name, CREDENTIALS_FILE);
                assert_eq!(mimetype, "application/json");
                let delivered: Value = serde_json::from_slice(bytes).unwrap();
                assert_eq!(delivered, registered_creds());
            }
            other => panic!("expected document first, got {:?}", other),
        }
        assert!(matches!(&sent[1].1, OutgoingMessage::Text { .. }));

        // Close happens while the workspace still exists, then it is gone
        assert_eq!(
            mock.calls().last(),
            Some(&MessagingCall::CloseSession {
                workspace_entries: Some(1)
            })
        );
        assert!(!h.dir.exists());
    }

    #[tokio::test]
    async fn falls_back_to_phone_address_without_account_id() {
        let mock = MockMessagingClient::new()
            .with_events_on_open(vec![creds_changed(registered_creds()), opened("")]);
        let h = harness(&mock, fast_pairing_settings());

        let report = h.controller.run().await;

        assert_eq!(report.outcome, Some(SessionOutcome::Delivered));
        let sent = mock.sent_messages();
        assert_eq!(sent[0].0, "15550001111@s.whatsapp.net");
    }

    #[tokio::test]
    async fn reconnect_reuses_session_and_persisted_credentials() {
        let mock = MockMessagingClient::new()
            .with_events_on_open(vec![creds_changed(registered_creds()), closed(Some(515))])
            .with_events_on_open(vec![opened(ACCOUNT)]);
        let h = harness(&mock, fast_pairing_settings());

        let report = h.controller.run().await;

        assert_eq!(report.outcome, Some(SessionOutcome::Delivered));
        assert_eq!(report.reconnects, 1);
        assert_eq!(mock.open_count(), 2);
        // Registered credentials skip the second pairing request
        assert_eq!(mock.pairing_requests(), 1);

        let opens: Vec<_> = mock
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                MessagingCall::OpenSession {
                    session_id,
                    credentials,
                } => Some((session_id, credentials)),
                _ => None,
            })
            .collect();
        assert_eq!(opens[0].0, opens[1].0);
        assert!(!opens[0].1.is_registered());
        assert!(opens[1].1.is_registered());

        // The dead session is closed before the second open
        let calls = mock.calls();
        let first_close = calls
            .iter()
            .position(|c| matches!(c, MessagingCall::CloseSession { .. }))
            .unwrap();
        let second_open = calls
            .iter()
            .rposition(|c| matches!(c, MessagingCall::OpenSession { .. }))
            .unwrap();
        assert!(first_close < second_open);
        assert!(!h.dir.exists());
    }

    #[tokio::test]
    async fn credentials_updated_during_open_settle_are_delivered() {
        let mock = MockMessagingClient::new()
            .with_events_on_open(vec![creds_changed(registered_creds()), opened(ACCOUNT)]);
        let settings = PairingSettings {
            open_settle: Duration::from_millis(300),
            ..fast_pairing_settings()
        };
        let h = harness(&mock, settings);
        let run = tokio::spawn(h.controller.run());

        // The code goes out before the open event is handled, so the open
        // settle delay is still ahead of us here.
        h.reply.await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let synced = json!({ "registered": true, "me": { "id": ACCOUNT }, "signalKey": "synced" });
        assert!(mock.emit(creds_changed(synced.clone())));

        let report = run.await.unwrap();

        assert_eq!(report.outcome, Some(SessionOutcome::Delivered));
        match &mock.sent_messages()[0].1 {
            OutgoingMessage::Document { bytes, .. } => {
                let delivered: Value = serde_json::from_slice(bytes).unwrap();
                assert_eq!(delivered, synced);
            }
            other => panic!("expected document first, got {:?}", other),
        }
        assert!(!h.dir.exists());
    }

    #[tokio::test]
    async fn events_during_pairing_settle_keep_their_order() {
        // Everything below arrives while the pairing request is still settling
        let mock = MockMessagingClient::new().with_events_on_open(vec![
            creds_changed(registered_creds()),
            opened(ACCOUNT),
            closed(Some(401)),
        ]);
        let settings = PairingSettings {
            pairing_settle: Duration::from_millis(50),
            ..fast_pairing_settings()
        };
        let h = harness(&mock, settings);

        let report = h.controller.run().await;

        // Open is handled before the close, so delivery happens first
        assert_eq!(report.outcome, Some(SessionOutcome::Delivered));
        assert_eq!(mock.pairing_requests(), 1);
        assert_eq!(mock.sent_messages().len(), 2);
        assert!(!h.dir.exists());
    }

    #[tokio::test]
    async fn logged_out_close_ends_without_reconnect() {
        let mock = MockMessagingClient::new().with_events_on_open(vec![closed(Some(401))]);
        let h = harness(&mock, fast_pairing_settings());

        let report = h.controller.run().await;

        assert_eq!(report.state, PairingState::Done);
        assert_eq!(report.outcome, Some(SessionOutcome::LoggedOut));
        assert_eq!(mock.open_count(), 1);
        assert!(mock.sent_messages().is_empty());
        assert!(h.reply.await.unwrap().is_ok());
        assert!(!h.dir.exists());
    }

    #[tokio::test]
    async fn gives_up_after_max_reconnects() {
        let mock = MockMessagingClient::new()
            .with_events_on_open(vec![closed(Some(428))])
            .with_events_on_open(vec![closed(Some(428))])
            .with_events_on_open(vec![closed(Some(428))]);
        let h = harness(&mock, fast_pairing_settings());

        let report = h.controller.run().await;

        assert_eq!(report.state, PairingState::Failed);
        assert_eq!(report.outcome, Some(SessionOutcome::ReconnectsExhausted));
        assert_eq!(report.reconnects, 2);
        assert_eq!(mock.open_count(), 3);
        assert!(!h.dir.exists());
    }

    #[tokio::test]
    async fn pairing_failure_answers_caller_and_cleans_up() {
        let mock = MockMessagingClient::new().with_pairing_failure("rate limited");
        let h = harness(&mock, fast_pairing_settings());

        let report = h.controller.run().await;

        assert_eq!(report.state, PairingState::Failed);
        assert_eq!(report.outcome, Some(SessionOutcome::PairingFailed));
        assert!(matches!(
            h.reply.await.unwrap(),
            Err(PairingError::PairingRequest(_))
        ));
        assert_eq!(mock.open_count(), 1);
        assert!(mock.was_closed());
        assert!(!h.dir.exists());
    }

    #[tokio::test]
    async fn init_failure_answers_unavailable() {
        let mock = MockMessagingClient::new().with_open_failure("gateway down");
        let h = harness(&mock, fast_pairing_settings());

        let report = h.controller.run().await;

        assert_eq!(report.outcome, Some(SessionOutcome::InitFailed));
        assert!(matches!(
            h.reply.await.unwrap(),
            Err(PairingError::Unavailable(_))
        ));
        assert_eq!(mock.pairing_requests(), 0);
        assert!(!mock.was_closed());
        assert!(!h.dir.exists());
    }

    #[tokio::test]
    async fn delivery_failure_still_cleans_up() {
        let mock = MockMessagingClient::new()
            .with_events_on_open(vec![creds_changed(registered_creds()), opened(ACCOUNT)])
            .with_send_failure("recipient unreachable");
        let h = harness(&mock, fast_pairing_settings());

        let report = h.controller.run().await;

        assert_eq!(report.state, PairingState::Done);
        assert_eq!(report.outcome, Some(SessionOutcome::DeliveryFailed));
        // The notice is not sent once the document fails
        assert_eq!(mock.sent_messages().len(), 1);
        assert!(mock.was_closed());
        assert!(!h.dir.exists());
    }

    #[tokio::test]
    async fn missing_credentials_file_skips_delivery() {
        let mock = MockMessagingClient::new().with_events_on_open(vec![opened(ACCOUNT)]);
        let h = harness(&mock, fast_pairing_settings());

        let report = h.controller.run().await;

        assert_eq!(report.outcome, Some(SessionOutcome::DeliveryFailed));
        assert!(mock.sent_messages().is_empty());
        assert!(!h.dir.exists());
    }

    #[tokio::test]
    async fn session_expires_when_nothing_happens() {
        let mock = MockMessagingClient::new();
        let settings = PairingSettings {
            session_ttl: Duration::from_millis(100),
            ..fast_pairing_settings()
        };
        let h = harness(&mock, settings);

        let report = h.controller.run().await;

        assert_eq!(report.state, PairingState::Failed);
        assert_eq!(report.outcome, Some(SessionOutcome::Expired));
        assert!(h.reply.await.unwrap().is_ok());
        assert!(mock.was_closed());
        assert!(!h.dir.exists());
    }

    #[tokio::test]
    async fn hung_pairing_call_times_out() {
        let mock = MockMessagingClient::new();
        let settings = PairingSettings {
            pairing_settle: Duration::from_millis(50),
            call_timeout: Duration::from_millis(10),
            ..fast_pairing_settings()
        };
        let h = harness(&mock, settings);
        let controller = PairingController {
            messaging: Arc::new(HangingClient(mock.clone())),
            ..h.controller
        };

        let report = controller.run().await;

        assert_eq!(report.outcome, Some(SessionOutcome::PairingFailed));
        assert!(matches!(
            h.reply.await.unwrap(),
            Err(PairingError::PairingRequest(_))
        ));
        assert!(!h.dir.exists());
    }

    /// Opens normally but never answers a pairing request
    struct HangingClient(MockMessagingClient);

    struct HangingSession(Box<dyn BaseMessagingSession>);

    #[async_trait::async_trait]
    impl BaseMessagingClient for HangingClient {
        async fn open_session(
            &self,
            session_id: &str,
            credentials: &CredentialState,
            options: &crate::kernel::TransportOptions,
        ) -> Result<crate::kernel::OpenedSession> {
            let opened = self.0.open_session(session_id, credentials, options).await?;
            Ok(crate::kernel::OpenedSession {
                handle: Box::new(HangingSession(opened.handle)),
                events: opened.events,
            })
        }
    }

    #[async_trait::async_trait]
    impl BaseMessagingSession for HangingSession {
        async fn request_pairing_code(&self, _phone_number: &str) -> Result<String> {
            std::future::pending().await
        }

        async fn send_message(&self, recipient: &str, message: OutgoingMessage) -> Result<()> {
            self.0.send_message(recipient, message).await
        }

        async fn close(&self) -> Result<()> {
            self.0.close().await
        }
    }

    #[tokio::test]
    async fn spawned_session_is_counted_while_running() {
        let mock = MockMessagingClient::new()
            .with_events_on_open(vec![creds_changed(registered_creds()), opened(ACCOUNT)]);
        let h = harness(&mock, fast_pairing_settings());
        let active = ActiveSessions::new();

        let handle = h.controller.spawn(active.clone());
        let code = h.reply.await.unwrap().unwrap();
        assert_eq!(code.as_str(), MOCK_PAIRING_CODE);

        let report = handle.await.unwrap();
        assert_eq!(report.outcome, Some(SessionOutcome::Delivered));
        assert_eq!(active.count(), 0);
    }
}
