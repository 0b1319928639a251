//! One-shot HTTP response token shared between the handler and its controller.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use super::errors::PairingError;
use super::types::PairingCode;

pub type PairingReply = Result<PairingCode, PairingError>;

/// Completes the pending HTTP response at most once.
///
/// Cloning shares the same slot. The first `respond` takes the sender under
/// the lock; every later call is a no-op that returns `false`.
#[derive(Clone)]
pub struct Responder {
    slot: Arc<Mutex<Option<oneshot::Sender<PairingReply>>>>,
}

impl Responder {
    pub fn channel() -> (Self, oneshot::Receiver<PairingReply>) {
        let (tx, rx) = oneshot::channel();
        let responder = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (responder, rx)
    }

    /// Send `reply` if nothing has been sent yet. Returns whether this call won.
    pub fn respond(&self, reply: PairingReply) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match sender {
            // A dropped receiver still counts as responded: the caller is gone.
            Some(tx) => {
                let _ = tx.send(reply);
                true
            }
            None => false,
        }
    }

    pub fn is_sent(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }
}
