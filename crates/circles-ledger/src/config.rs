//! # Ledger Configuration

use std::time::Duration;

use circles_core::{ValidationError, WalletAddress};
use circles_state::{FeePolicy, DEFAULT_FEE_BPS};

/// Default upper bound on a single settlement call.
pub const DEFAULT_SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Settlement parameters for a [`crate::Ledger`].
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Treasury fee rate and destination.
    pub fee: FeePolicy,
    /// Each transfer must confirm within this time or finalize fails.
    pub settlement_timeout: Duration,
}

impl LedgerConfig {
    /// Default fee rate and timeout, paying fees to `treasury`.
    pub fn new(treasury: WalletAddress) -> Self {
        Self {
            fee: FeePolicy::standard(treasury),
            settlement_timeout: DEFAULT_SETTLEMENT_TIMEOUT,
        }
    }

    /// Override the fee rate, in basis points.
    pub fn with_fee_bps(mut self, fee_bps: u32) -> Result<Self, ValidationError> {
        self.fee = FeePolicy::new(fee_bps, self.fee.treasury().clone())?;
        Ok(self)
    }

    pub fn with_settlement_timeout(mut self, timeout: Duration) -> Self {
        self.settlement_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treasury() -> WalletAddress {
        WalletAddress::parse("0x00000000000000000000000000000000000000ff").unwrap()
    }

    #[test]
    fn defaults() {
        let cfg = LedgerConfig::new(treasury());
        assert_eq!(cfg.fee.fee_bps(), DEFAULT_FEE_BPS);
        assert_eq!(cfg.settlement_timeout, Duration::from_secs(120));
    }

    #[test]
    fn fee_override_is_validated() {
        assert_eq!(LedgerConfig::new(treasury()).with_fee_bps(250).unwrap().fee.fee_bps(), 250);
        assert!(LedgerConfig::new(treasury()).with_fee_bps(10_001).is_err());
    }
}
