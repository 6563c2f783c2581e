//! # Wallet Addresses
//!
//! A `WalletAddress` identifies a chain account. Comparison and hashing
//! are case-insensitive; the spelling as given is kept for display and
//! for the transfer payload.
//!
//! Accepted forms:
//! - `0x`-prefixed EVM-style addresses: exactly 40 hex digits after the prefix.
//! - Any other non-empty token of at most 128 characters without whitespace
//!   or control characters (non-EVM chains).

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Upper bound on address length for non-EVM formats.
const MAX_ADDRESS_LEN: usize = 128;

/// A validated, case-insensitive chain account identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Validate and wrap an address. Surrounding whitespace is trimmed.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let invalid = |reason| ValidationError::InvalidAddress {
            value: raw.to_string(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(ValidationError::MissingField("address"));
        }
        if trimmed.len() > MAX_ADDRESS_LEN {
            return Err(invalid("longer than 128 characters"));
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(invalid("contains whitespace or control characters"));
        }
        if let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            if hex.len() != 40 {
                return Err(invalid("0x addresses must have 40 hex digits"));
            }
            if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid("0x addresses must be hexadecimal"));
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The address as originally spelled.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for WalletAddress {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for WalletAddress {}

impl Hash for WalletAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WalletAddress> for String {
    fn from(addr: WalletAddress) -> Self {
        addr.0
    }
}

impl std::str::FromStr for WalletAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const LOWER: &str = "0xabcdef0123456789abcdef0123456789abcdef01";
    const MIXED: &str = "0xAbCdEf0123456789ABCDEF0123456789abcdef01";

    #[test]
    fn comparison_ignores_case() {
        let a = WalletAddress::parse(LOWER).unwrap();
        let b = WalletAddress::parse(MIXED).unwrap();
        assert_eq!(a, b);
        assert_eq!(b.as_str(), MIXED, "spelling is preserved");
    }

    #[test]
    fn hash_agrees_with_eq() {
        let mut set = HashSet::new();
        set.insert(WalletAddress::parse(LOWER).unwrap());
        assert!(set.contains(&WalletAddress::parse(MIXED).unwrap()));
    }

    #[test]
    fn distinct_addresses_differ() {
        let a = WalletAddress::parse(LOWER).unwrap();
        let b = WalletAddress::parse("0xabcdef0123456789abcdef0123456789abcdef02").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn blank_is_missing() {
        assert_eq!(
            WalletAddress::parse("   "),
            Err(ValidationError::MissingField("address"))
        );
    }

    #[test]
    fn short_hex_rejected() {
        assert!(matches!(
            WalletAddress::parse("0x1234"),
            Err(ValidationError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn non_hex_rejected() {
        assert!(WalletAddress::parse("0xzzcdef0123456789abcdef0123456789abcdef01").is_err());
    }

    #[test]
    fn inner_whitespace_rejected() {
        assert!(WalletAddress::parse("alice wallet").is_err());
    }

    #[test]
    fn non_evm_token_accepted() {
        let addr = WalletAddress::parse("  cosmos1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7xu ").unwrap();
        assert_eq!(addr.as_str(), "cosmos1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7xu");
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<WalletAddress, _> = serde_json::from_str(&format!("\"{LOWER}\""));
        assert!(ok.is_ok());
        let bad: Result<WalletAddress, _> = serde_json::from_str("\"0x12\"");
        assert!(bad.is_err());
    }
}
