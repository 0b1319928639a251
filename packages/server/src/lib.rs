// Pairing Service - Core
//
// HTTP service that issues messaging pairing codes and delivers the linked
// session's credentials to the account that paired.
//
// Each request gets its own session controller (domains/pairing) running as a
// detached task; infrastructure sits behind the traits in kernel/.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
