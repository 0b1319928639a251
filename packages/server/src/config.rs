use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::domains::pairing::{PairingSettings, ReconnectPolicy, DEFAULT_BANNER};
use crate::kernel::{BrowserDescriptor, TransportOptions};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub session_root: PathBuf,
    pub gateway_url: String,
    pub gateway_api_key: Option<String>,
    pub browser_platform: String,
    pub browser_name: String,
    pub pairing_settle_ms: u64,
    pub open_settle_ms: u64,
    pub flush_settle_ms: u64,
    pub reconnect_backoff_ms: u64,
    pub max_reconnect_backoff_ms: u64,
    pub max_reconnect_attempts: u32,
    pub call_timeout_secs: u64,
    pub session_ttl_secs: u64,
    pub session_banner: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: parse_var("PORT", 8080)?,
            session_root: env::var("SESSION_ROOT")
                .unwrap_or_else(|_| "./temp".to_string())
                .into(),
            gateway_url: env::var("GATEWAY_URL").context("GATEWAY_URL must be set")?,
            gateway_api_key: env::var("GATEWAY_API_KEY").ok(),
            browser_platform: env::var("BROWSER_PLATFORM")
                .unwrap_or_else(|_| "macOS".to_string()),
            browser_name: env::var("BROWSER_NAME").unwrap_or_else(|_| "Safari".to_string()),
            pairing_settle_ms: parse_var("PAIRING_SETTLE_MS", 1500)?,
            open_settle_ms: parse_var("OPEN_SETTLE_MS", 4000)?,
            flush_settle_ms: parse_var("FLUSH_SETTLE_MS", 1500)?,
            reconnect_backoff_ms: parse_var("RECONNECT_BACKOFF_MS", 5000)?,
            max_reconnect_backoff_ms: parse_var("MAX_RECONNECT_BACKOFF_MS", 60_000)?,
            max_reconnect_attempts: parse_var("MAX_RECONNECT_ATTEMPTS", 5)?,
            call_timeout_secs: parse_var("CALL_TIMEOUT_SECS", 30)?,
            session_ttl_secs: parse_var("SESSION_TTL_SECS", 300)?,
            session_banner: env::var("SESSION_BANNER")
                .unwrap_or_else(|_| DEFAULT_BANNER.to_string()),
        })
    }

    /// Per-session settings handed to every pairing controller
    pub fn pairing_settings(&self) -> PairingSettings {
        PairingSettings {
            pairing_settle: Duration::from_millis(self.pairing_settle_ms),
            open_settle: Duration::from_millis(self.open_settle_ms),
            flush_settle: Duration::from_millis(self.flush_settle_ms),
            reconnect: ReconnectPolicy {
                base_delay: Duration::from_millis(self.reconnect_backoff_ms),
                max_delay: Duration::from_millis(self.max_reconnect_backoff_ms),
                max_attempts: self.max_reconnect_attempts,
            },
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            session_ttl: Duration::from_secs(self.session_ttl_secs),
            transport: TransportOptions {
                browser: BrowserDescriptor {
                    platform: self.browser_platform.clone(),
                    name: self.browser_name.clone(),
                },
                ..TransportOptions::default()
            },
            banner: self.session_banner.clone(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .ok()
            .with_context(|| format!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}
