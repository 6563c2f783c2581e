//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! AppState holds:
//! - **Ledger**: every circle, and the finalize pipeline.
//! - **Whitelist oracle**: the cached authorized-address set consulted by
//!   the whitelist middleware.
//! - **Prometheus handle**: renders `/metrics` when a recorder is installed.

use std::sync::Arc;
use std::time::Duration;

use circles_chain::config::{env_parse, env_url};
use circles_chain::{ConfigError, SettlementConfig};
use circles_core::{ValidationError, WalletAddress};
use circles_ledger::{
    Ledger, LedgerConfig, WhitelistOracle, DEFAULT_WHITELIST_FAILURE_BACKOFF, DEFAULT_WHITELIST_TTL,
};
use circles_state::DEFAULT_FEE_BPS;
use metrics_exporter_prometheus::PrometheusHandle;
use url::Url;

// -- Configuration ------------------------------------------------------------

/// Where the authorized address list comes from.
#[derive(Debug, Clone)]
pub enum WhitelistConfig {
    /// Fetched from an HTTP endpoint and cached for the TTL.
    Remote(Url),
    /// A fixed list given at startup.
    Static(Vec<WalletAddress>),
}

/// Service configuration, read from the environment at startup.
///
/// `Debug` is safe to log: the settlement signing key is redacted by
/// [`SettlementConfig`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub treasury: WalletAddress,
    pub fee_bps: u32,
    pub settlement_timeout: Duration,
    pub whitelist_ttl: Duration,
    pub whitelist_failure_backoff: Duration,
    pub whitelist: WhitelistConfig,
    pub settlement: SettlementConfig,
}

/// Errors loading [`AppConfig`].
#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("TREASURY_ADDRESS environment variable is required")]
    MissingTreasury,
    #[error("invalid TREASURY_ADDRESS: {0}")]
    InvalidTreasury(ValidationError),
    #[error("invalid entry in WHITELIST_ADDRESSES: {0}")]
    InvalidWhitelistEntry(ValidationError),
    #[error(transparent)]
    Env(#[from] ConfigError),
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `PORT` (default: 8080)
    /// - `TREASURY_ADDRESS` (required)
    /// - `FEE_BPS` (default: 500)
    /// - `SETTLEMENT_TIMEOUT_SECS` (default: 120)
    /// - `WHITELIST_TTL_SECS` (default: 300)
    /// - `WHITELIST_FAILURE_BACKOFF_SECS` (default: 30)
    /// - `WHITELIST_URL`, else `WHITELIST_ADDRESSES` (comma-separated)
    /// - the `SETTLEMENT_*` variables read by [`SettlementConfig::from_env`]
    pub fn from_env() -> Result<Self, AppConfigError> {
        let treasury = std::env::var("TREASURY_ADDRESS").map_err(|_| AppConfigError::MissingTreasury)?;
        let treasury = WalletAddress::parse(&treasury).map_err(AppConfigError::InvalidTreasury)?;

        let whitelist = match std::env::var("WHITELIST_URL") {
            Ok(_) => WhitelistConfig::Remote(env_url("WHITELIST_URL", "")?),
            Err(_) => {
                let raw = std::env::var("WHITELIST_ADDRESSES").unwrap_or_default();
                WhitelistConfig::Static(parse_address_list(&raw)?)
            }
        };

        Ok(Self {
            port: env_parse("PORT", 8080)?,
            treasury,
            fee_bps: env_parse("FEE_BPS", DEFAULT_FEE_BPS)?,
            settlement_timeout: Duration::from_secs(env_parse("SETTLEMENT_TIMEOUT_SECS", 120)?),
            whitelist_ttl: Duration::from_secs(
                env_parse("WHITELIST_TTL_SECS", DEFAULT_WHITELIST_TTL.as_secs())?,
            ),
            whitelist_failure_backoff: Duration::from_secs(env_parse(
                "WHITELIST_FAILURE_BACKOFF_SECS",
                DEFAULT_WHITELIST_FAILURE_BACKOFF.as_secs(),
            )?),
            whitelist,
            settlement: SettlementConfig::from_env()?,
        })
    }

    /// The ledger settings derived from this configuration.
    pub fn ledger_config(&self) -> Result<LedgerConfig, ValidationError> {
        Ok(LedgerConfig::new(self.treasury.clone())
            .with_fee_bps(self.fee_bps)?
            .with_settlement_timeout(self.settlement_timeout))
    }

    /// Per-request timeout for outbound HTTP calls.
    pub fn settlement_http_timeout(&self) -> Duration {
        Duration::from_secs(self.settlement.timeout_secs)
    }
}

/// Parse a comma-separated address list. Blank entries are ignored.
pub fn parse_address_list(raw: &str) -> Result<Vec<WalletAddress>, AppConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| WalletAddress::parse(s).map_err(AppConfigError::InvalidWhitelistEntry))
        .collect()
}

// -- Application State ---------------------------------------------------------

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub whitelist: Arc<WhitelistOracle>,
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("ledger", &self.ledger)
            .field("whitelist_ttl", &self.whitelist.ttl())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl AppState {
    /// State without a metrics exporter; `/metrics` answers 404.
    pub fn new(ledger: Ledger, whitelist: Arc<WhitelistOracle>) -> Self {
        Self {
            ledger,
            whitelist,
            metrics: None,
        }
    }

    /// Attach the Prometheus handle used to render `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
