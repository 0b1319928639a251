use std::time::Duration;

use crate::kernel::TransportOptions;

/// Notice sent after the credentials document.
pub const DEFAULT_BANNER: &str = "Your session has been linked.\n\n\
    The attached creds.json lets a client reconnect as this device.\n\
    Never share it: anyone holding it can read and send messages as you.\n\
    To revoke it, open Linked Devices on your phone and log the device out.";

/// Bounded, doubling reconnect delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay before reconnect number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            max_attempts: 5,
        }
    }
}

/// Timing and presentation knobs for one pairing session.
#[derive(Debug, Clone)]
pub struct PairingSettings {
    /// Wait after opening before asking for a pairing code.
    pub pairing_settle: Duration,
    /// Wait after the transport opens before reading credentials.
    pub open_settle: Duration,
    /// Wait after delivery so outgoing sends flush before close.
    pub flush_settle: Duration,
    pub reconnect: ReconnectPolicy,
    /// Upper bound for every external call.
    pub call_timeout: Duration,
    /// Upper bound for the whole session.
    pub session_ttl: Duration,
    pub transport: TransportOptions,
    pub banner: String,
}

impl Default for PairingSettings {
    fn default() -> Self {
        Self {
            pairing_settle: Duration::from_millis(1500),
            open_settle: Duration::from_millis(4000),
            flush_settle: Duration::from_millis(1500),
            reconnect: ReconnectPolicy::default(),
            call_timeout: Duration::from_secs(30),
            session_ttl: Duration::from_secs(300),
            transport: TransportOptions::default(),
            banner: DEFAULT_BANNER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_doubles_up_to_cap() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(20));
        assert_eq!(policy.delay_for(4), Duration::from_secs(40));
        assert_eq!(policy.delay_for(5), Duration::from_secs(60));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn zero_attempt_uses_base_delay() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
    }
}
