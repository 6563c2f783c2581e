//! # Settlement Client Interface
//!
//! The ledger moves money only through [`SettlementClient`]. A transfer
//! returns once it is confirmed on chain; there is no fire-and-forget path.

use std::time::Duration;

use async_trait::async_trait;
use circles_core::{TokenAmount, WalletAddress};
use thiserror::Error;

/// Why a transfer did not confirm.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The network or relay refused the transfer.
    #[error("transfer rejected: {0}")]
    Rejected(String),

    /// The transfer could not be submitted or its outcome is unknown.
    #[error("transfer failed: {0}")]
    Failed(String),

    /// No confirmation arrived within the allowed time.
    #[error("transfer not confirmed within {0:?}")]
    Timeout(Duration),
}

/// A confirmed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Chain transaction reference (hash).
    pub transaction_ref: String,
}

impl TransferReceipt {
    pub fn new(transaction_ref: impl Into<String>) -> Self {
        Self {
            transaction_ref: transaction_ref.into(),
        }
    }
}

/// Executes on-chain transfers.
#[async_trait]
pub trait SettlementClient: Send + Sync + 'static {
    /// Transfer `amount` to `to` and wait for confirmation.
    async fn transfer(
        &self,
        to: &WalletAddress,
        amount: TokenAmount,
    ) -> Result<TransferReceipt, TransferError>;
}
