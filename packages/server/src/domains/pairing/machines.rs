//! Pairing machine - the session lifecycle as a pure state machine.
//!
//! The machine interprets [`PairingEvent`]s and decides on at most one
//! [`PairingCommand`] per event. It does no IO; the controller executes the
//! command and feeds the resulting fact back in.
//!
//! ```text
//! INIT ──► AWAITING_PAIR_REQUEST ──► PAIRED_OPEN ──► DELIVERING_CREDENTIALS
//!  ▲              │                      │                    │
//!  │              └──── close ≠ 401 ─────┤                    ▼
//!  └────────── RECONNECTING ◄────────────┘                 CLOSING ──► DONE | FAILED
//! ```

use super::commands::PairingCommand;
use super::errors::PairingError;
use super::events::PairingEvent;
use super::settings::ReconnectPolicy;
use super::types::{PairingState, PhoneNumber, SessionOutcome};

pub struct PairingMachine {
    phone: PhoneNumber,
    policy: ReconnectPolicy,
    state: PairingState,
    reconnects: u32,
    pairing_requests: u32,
    recipient: Option<String>,
    outcome: Option<SessionOutcome>,
}

impl PairingMachine {
    pub fn new(phone: PhoneNumber, policy: ReconnectPolicy) -> Self {
        Self {
            phone,
            policy,
            state: PairingState::Init,
            reconnects: 0,
            pairing_requests: 0,
            recipient: None,
            outcome: None,
        }
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    pub fn pairing_requests(&self) -> u32 {
        self.pairing_requests
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.outcome
    }

    /// Process an event and optionally return a command.
    ///
    /// Terminal machines ignore everything. Events that make no sense in the
    /// current state are dropped.
    pub fn decide(&mut self, event: &PairingEvent) -> Option<PairingCommand> {
        use PairingEvent as E;
        use PairingState as S;

        if self.state.is_terminal() {
            return None;
        }

        match (self.state, event) {
            (S::Init, E::Started) => Some(PairingCommand::OpenSession),

            (S::Init, E::SessionOpened { registered }) => {
                self.state = S::AwaitingPairRequest;
                if *registered {
                    None
                } else {
                    self.pairing_requests += 1;
                    Some(PairingCommand::RequestPairingCode {
                        phone: self.phone.clone(),
                    })
                }
            }

            (S::Closing, E::TornDown) => {
                self.state = self
                    .outcome
                    .map(SessionOutcome::terminal_state)
                    .unwrap_or(S::Failed);
                None
            }

            // Teardown is already running; late transport events are moot.
            (S::Closing, _) => None,

            (_, E::SessionInitFailed { .. }) => self.teardown(SessionOutcome::InitFailed, false),

            (_, E::PairingCodeFailed { .. }) => self.teardown(SessionOutcome::PairingFailed, false),

            (_, E::SessionExpired) => self.teardown(SessionOutcome::Expired, false),

            (_, E::CredentialsChanged { state }) => Some(PairingCommand::PersistCredentials {
                state: state.clone(),
            }),

            (S::AwaitingPairRequest, E::ConnectionOpened { account_id }) => {
                self.state = S::PairedOpen;
                // The open event may omit the address; fall back to the phone's.
                self.recipient = (!account_id.is_empty()).then(|| account_id.clone());
                Some(PairingCommand::ReadBundle)
            }

            (S::PairedOpen, E::BundleRead { bundle }) => {
                self.state = S::DeliveringCredentials;
                Some(PairingCommand::DeliverCredentials {
                    recipient: self.recipient.clone().unwrap_or_else(|| self.phone.to_jid()),
                    bundle: bundle.clone(),
                })
            }

            (S::PairedOpen, E::BundleUnavailable { .. }) => {
                self.teardown(SessionOutcome::DeliveryFailed, true)
            }

            (S::DeliveringCredentials, E::CredentialsDelivered) => {
                self.teardown(SessionOutcome::Delivered, true)
            }

            (S::DeliveringCredentials, E::DeliveryFailed { .. }) => {
                self.teardown(SessionOutcome::DeliveryFailed, true)
            }

            (S::AwaitingPairRequest | S::PairedOpen, E::ConnectionClosed { status_code }) => {
                let cause = PairingError::from_close(*status_code);
                if !cause.is_retryable() {
                    return self.teardown(SessionOutcome::LoggedOut, false);
                }
                if self.reconnects >= self.policy.max_attempts {
                    return self.teardown(SessionOutcome::ReconnectsExhausted, false);
                }

                self.reconnects += 1;
                self.state = S::Reconnecting;
                Some(PairingCommand::ScheduleReconnect {
                    attempt: self.reconnects,
                    delay: self.policy.delay_for(self.reconnects),
                    status_code: *status_code,
                })
            }

            (S::Reconnecting, E::ReconnectDue) => {
                self.state = S::Init;
                Some(PairingCommand::OpenSession)
            }

            _ => None,
        }
    }

    fn teardown(&mut self, outcome: SessionOutcome, flush: bool) -> Option<PairingCommand> {
        self.state = PairingState::Closing;
        self.outcome = Some(outcome);
        Some(PairingCommand::Teardown { flush, outcome })
    }
}
