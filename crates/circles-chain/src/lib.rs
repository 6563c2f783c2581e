//! # circles-chain: HTTP Collaborators
//!
//! Concrete implementations of the ledger's external interfaces:
//!
//! - [`HttpSettlementClient`]: signs transfer intents with Ed25519,
//!   submits them to a settlement relay and waits for confirmation.
//! - [`HttpWhitelistSource`]: fetches the authorized address list.
//!
//! Transfer submission is never retried. Idempotent reads (confirmation
//! polls, whitelist fetches) back off and retry on transport errors and
//! gateway statuses.

pub mod config;
pub mod error;
pub mod keys;
pub(crate) mod retry;
pub mod settlement;
pub mod whitelist;

pub use config::{ConfigError, SettlementConfig};
pub use error::ChainError;
pub use keys::SettlementSigner;
pub use settlement::{HttpSettlementClient, TransferIntent, TransferStatus};
pub use whitelist::HttpWhitelistSource;
