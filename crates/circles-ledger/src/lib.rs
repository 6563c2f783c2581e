//! # circles-ledger: Circle Ledger and Whitelist Oracle
//!
//! Owns every circle for the lifetime of the process and drives round
//! settlement through an injected [`SettlementClient`]. Also provides the
//! [`WhitelistOracle`], a TTL-cached view of the authorized address list.
//!
//! External collaborators are traits ([`SettlementClient`],
//! [`WhitelistSource`], [`Clock`]) so the ledger runs against in-process
//! fakes in tests and against HTTP implementations from `circles-chain`
//! in production.

pub mod config;
pub mod error;
pub mod ledger;
pub mod settlement;
pub mod store;
pub mod whitelist;

pub use config::{LedgerConfig, DEFAULT_SETTLEMENT_TIMEOUT};
pub use error::{ErrorKind, LedgerError};
pub use ledger::Ledger;
pub use settlement::{SettlementClient, TransferError, TransferReceipt};
pub use store::Store;
pub use whitelist::{
    Clock, StaticWhitelistSource, SystemClock, WhitelistFetchError, WhitelistOracle,
    WhitelistSource, DEFAULT_WHITELIST_FAILURE_BACKOFF, DEFAULT_WHITELIST_TTL,
};
