//! Pairing domain - links a messaging account by pairing code and hands the
//! resulting session credentials back to the account owner.
//!
//! `machines` decides, `controller` executes. Everything a session touches on
//! disk lives in its own [`Workspace`], which is released on every exit path.

pub mod commands;
pub mod controller;
pub mod credentials;
pub mod errors;
pub mod events;
pub mod machines;
pub mod responder;
pub mod settings;
pub mod types;
pub mod workspace;

pub use commands::PairingCommand;
pub use controller::PairingController;
pub use credentials::CredentialStore;
pub use errors::PairingError;
pub use events::PairingEvent;
pub use machines::PairingMachine;
pub use responder::{PairingReply, Responder};
pub use settings::{PairingSettings, ReconnectPolicy, DEFAULT_BANNER};
pub use types::*;
pub use workspace::{Workspace, WorkspaceRoot, CREDENTIALS_FILE};
