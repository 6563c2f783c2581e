//! # Transfer Signing Key
//!
//! The settlement relay authenticates transfer intents by an Ed25519
//! signature over the SHA-256 digest of the intent's JSON encoding.
//!
//! The private key is never serialized or logged. `SettlementSigner` does
//! not implement `Serialize` and its `Debug` output shows only the public
//! key.

use ed25519_dalek::Signer;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::config::ConfigError;

/// Ed25519 key that signs transfer intents.
pub struct SettlementSigner {
    signing_key: ed25519_dalek::SigningKey,
}

impl SettlementSigner {
    /// Load a key from a hex-encoded 32-byte seed (an optional `0x` prefix is allowed).
    pub fn from_hex(hex: &str) -> Result<Self, ConfigError> {
        let trimmed = hex.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(hex_decode(digits).map_err(ConfigError::InvalidSigningKey)?);
        let seed: Zeroizing<[u8; 32]> = Zeroizing::new(bytes.as_slice().try_into().map_err(|_| {
            ConfigError::InvalidSigningKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            ))
        })?);
        Ok(Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&seed),
        })
    }

    /// Hex-encoded public key; this is the `from` of every intent.
    pub fn public_key_hex(&self) -> String {
        to_hex(self.signing_key.verifying_key().as_bytes())
    }

    /// Sign the SHA-256 digest of `message`. Returns the hex signature.
    pub fn sign(&self, message: &[u8]) -> String {
        let digest = Sha256::digest(message);
        to_hex(&self.signing_key.sign(&digest).to_bytes())
    }
}

impl std::fmt::Debug for SettlementSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementSigner({})", self.public_key_hex())
    }
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub(crate) fn hex_decode(hex: &str) -> Result<Vec<u8>, String> {
    if hex.len() % 2 != 0 {
        return Err("hex string must have even length".to_string());
    }
    if !hex.is_ascii() {
        return Err("hex string must be ASCII".to_string());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| format!("invalid hex at position {i}: {e}"))
        })
        .collect()
}
