//! Settlement relay configuration.
//!
//! Read from the environment at startup. The signing key is mandatory:
//! a missing or malformed key fails here, before the service accepts any
//! request.

use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

/// Default relay endpoint (a local node or relay sidecar).
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:8545";

/// Configuration for [`crate::HttpSettlementClient`].
///
/// Custom `Debug` implementation redacts the signing key.
#[derive(Clone)]
pub struct SettlementConfig {
    /// Base URL of the settlement relay.
    pub relay_url: Url,
    /// Hex-encoded 32-byte Ed25519 seed used to sign transfer intents.
    pub signing_key_hex: Zeroizing<String>,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Delay between confirmation polls.
    pub poll_interval: Duration,
    /// Polls before a pending transfer is reported unconfirmed.
    pub max_polls: u32,
}

impl std::fmt::Debug for SettlementConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementConfig")
            .field("relay_url", &self.relay_url)
            .field("signing_key_hex", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("poll_interval", &self.poll_interval)
            .field("max_polls", &self.max_polls)
            .finish()
    }
}

impl SettlementConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `SETTLEMENT_RELAY_URL` (default: `http://127.0.0.1:8545`)
    /// - `SETTLEMENT_SIGNING_KEY_HEX` (required)
    /// - `SETTLEMENT_HTTP_TIMEOUT_SECS` (default: 30)
    /// - `SETTLEMENT_POLL_INTERVAL_MS` (default: 1000)
    /// - `SETTLEMENT_MAX_POLLS` (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        let signing_key_hex = std::env::var("SETTLEMENT_SIGNING_KEY_HEX")
            .map(Zeroizing::new)
            .map_err(|_| ConfigError::MissingSigningKey)?;

        Ok(Self {
            relay_url: env_url("SETTLEMENT_RELAY_URL", DEFAULT_RELAY_URL)?,
            signing_key_hex,
            timeout_secs: env_parse("SETTLEMENT_HTTP_TIMEOUT_SECS", 30)?,
            poll_interval: Duration::from_millis(env_parse("SETTLEMENT_POLL_INTERVAL_MS", 1000)?),
            max_polls: env_parse("SETTLEMENT_MAX_POLLS", 60)?,
        })
    }

    /// A configuration pointing at a local relay, with fast polling.
    pub fn local(relay_url: Url, signing_key_hex: &str) -> Self {
        Self {
            relay_url,
            signing_key_hex: Zeroizing::new(signing_key_hex.to_string()),
            timeout_secs: 5,
            poll_interval: Duration::from_millis(10),
            max_polls: 5,
        }
    }
}

/// Read a URL variable, falling back to `default`.
pub fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Read and parse a numeric variable, falling back to `default` when unset.
pub fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("SETTLEMENT_SIGNING_KEY_HEX environment variable is required")]
    MissingSigningKey,
    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_signing_key() {
        let cfg = SettlementConfig::local(Url::parse(DEFAULT_RELAY_URL).unwrap(), "deadbeef");
        let dbg = format!("{cfg:?}");
        assert!(dbg.contains("[REDACTED]"));
        assert!(!dbg.contains("deadbeef"));
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("CIRCLES_NONEXISTENT_URL_VAR", "https://relay.example.com").unwrap();
        assert_eq!(url.as_str(), "https://relay.example.com/");
    }

    #[test]
    fn env_url_rejects_invalid_url() {
        std::env::set_var("CIRCLES_TEST_BAD_URL", "not a url");
        let result = env_url("CIRCLES_TEST_BAD_URL", "https://example.com");
        std::env::remove_var("CIRCLES_TEST_BAD_URL");
        assert!(matches!(result, Err(ConfigError::InvalidUrl(..))));
    }

    #[test]
    fn env_parse_defaults_and_rejects_garbage() {
        assert_eq!(env_parse("CIRCLES_NONEXISTENT_NUM_VAR", 42u32).unwrap(), 42);
        std::env::set_var("CIRCLES_TEST_BAD_NUM", "soon");
        let result = env_parse("CIRCLES_TEST_BAD_NUM", 1u64);
        std::env::remove_var("CIRCLES_TEST_BAD_NUM");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
