//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod test_dependencies;
pub mod traits;

pub use deps::{ActiveSessionGuard, ActiveSessions, GatewayAdapter, ServerDeps};
pub use traits::*;
