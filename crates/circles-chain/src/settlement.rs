//! # Settlement Relay Client
//!
//! Submits signed transfer intents to a settlement relay and waits for
//! on-chain confirmation.
//!
//! ## Relay API
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | POST | `/v1/transfers` | `{intent, signature}` | `{tx_hash, status}` |
//! | GET | `/v1/transfers/{tx_hash}` | - | `{tx_hash, status, reason?}` |
//!
//! `status` is one of `pending`, `confirmed`, `failed`, `rejected`.
//!
//! ## Signing
//!
//! The intent is `{from, to, amount, nonce}`: `from` is the hex public key,
//! `amount` the decimal token string, `nonce` strictly increasing per
//! client (seeded from the wall clock so restarts do not reuse nonces).
//! The signature is Ed25519 over the SHA-256 of the intent's JSON bytes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use circles_core::{TokenAmount, WalletAddress};
use circles_ledger::{SettlementClient, TransferError, TransferReceipt};
use serde::{Deserialize, Serialize};

use crate::config::SettlementConfig;
use crate::error::ChainError;
use crate::keys::SettlementSigner;

/// Signed payload the relay executes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferIntent {
    pub from: String,
    pub to: String,
    pub amount: String,
    pub nonce: u64,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    intent: &'a TransferIntent,
    signature: String,
}

/// Relay-reported transfer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Confirmed,
    Failed,
    Rejected,
}

impl TransferStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransferStatusResponse {
    tx_hash: String,
    status: TransferStatus,
    #[serde(default)]
    reason: Option<String>,
}

/// [`SettlementClient`] backed by a settlement relay.
#[derive(Debug)]
pub struct HttpSettlementClient {
    http: reqwest::Client,
    base_url: String,
    signer: SettlementSigner,
    nonce: AtomicU64,
    poll_interval: Duration,
    max_polls: u32,
}

impl HttpSettlementClient {
    /// Build a client. Fails if the signing key is missing or malformed.
    pub fn new(config: SettlementConfig) -> Result<Self, ChainError> {
        let signer = SettlementSigner::from_hex(&config.signing_key_hex)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChainError::Http {
                endpoint: "client builder".into(),
                source: e,
            })?;
        let seed = chrono::Utc::now().timestamp_millis().max(0) as u64;
        tracing::info!(
            relay = %config.relay_url,
            signer = %signer.public_key_hex(),
            "settlement client ready"
        );
        Ok(Self {
            http,
            base_url: config.relay_url.as_str().trim_end_matches('/').to_string(),
            signer,
            nonce: AtomicU64::new(seed),
            poll_interval: config.poll_interval,
            max_polls: config.max_polls,
        })
    }

    /// Hex public key identifying this client to the relay.
    pub fn public_key_hex(&self) -> String {
        self.signer.public_key_hex()
    }

    fn intent(&self, to: &WalletAddress, amount: TokenAmount) -> TransferIntent {
        TransferIntent {
            from: self.signer.public_key_hex(),
            to: to.as_str().to_string(),
            amount: amount.to_string(),
            nonce: self.nonce.fetch_add(1, Ordering::SeqCst),
        }
    }

    /// Submit a signed intent. Never retried.
    async fn submit(&self, intent: &TransferIntent) -> Result<TransferStatusResponse, ChainError> {
        let endpoint = "POST /v1/transfers".to_string();
        let url = format!("{}/v1/transfers", self.base_url);
        let message = serde_json::to_vec(intent).map_err(ChainError::Encode)?;
        let body = SubmitRequest {
            intent,
            signature: self.signer.sign(&message),
        };

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        read_status(endpoint, resp).await
    }

    async fn poll(&self, tx_hash: &str) -> Result<TransferStatusResponse, ChainError> {
        let endpoint = format!("GET /v1/transfers/{tx_hash}");
        let url = format!("{}/v1/transfers/{tx_hash}", self.base_url);
        let resp = crate::retry::retry_read(&endpoint, || self.http.get(&url).send())
            .await
            .map_err(|e| ChainError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        read_status(endpoint, resp).await
    }

    /// Submit and wait for a terminal status.
    pub async fn transfer_confirmed(
        &self,
        to: &WalletAddress,
        amount: TokenAmount,
    ) -> Result<String, ChainError> {
        let intent = self.intent(to, amount);
        let mut current = self.submit(&intent).await?;
        tracing::info!(
            tx_hash = %current.tx_hash,
            to = %intent.to,
            amount = %intent.amount,
            nonce = intent.nonce,
            status = current.status.as_str(),
            "transfer submitted"
        );

        let mut polls = 0;
        loop {
            match current.status {
                TransferStatus::Confirmed => return Ok(current.tx_hash),
                TransferStatus::Failed | TransferStatus::Rejected => {
                    return Err(ChainError::TransferFailed {
                        status: current.status.as_str().to_string(),
                        reason: current.reason.unwrap_or_else(|| "no reason given".into()),
                        tx_hash: current.tx_hash,
                    });
                }
                TransferStatus::Pending if polls >= self.max_polls => {
                    return Err(ChainError::Unconfirmed {
                        tx_hash: current.tx_hash,
                        polls,
                    });
                }
                TransferStatus::Pending => {
                    tokio::time::sleep(self.poll_interval).await;
                    polls += 1;
                    current = self.poll(&current.tx_hash).await?;
                }
            }
        }
    }
}

async fn read_status(endpoint: String, resp: reqwest::Response) -> Result<TransferStatusResponse, ChainError> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(ChainError::Api {
            endpoint,
            status,
            body,
        });
    }
    resp.json()
        .await
        .map_err(|e| ChainError::Deserialization { endpoint, source: e })
}

#[async_trait]
impl SettlementClient for HttpSettlementClient {
    async fn transfer(
        &self,
        to: &WalletAddress,
        amount: TokenAmount,
    ) -> Result<TransferReceipt, TransferError> {
        let tx_hash = self.transfer_confirmed(to, amount).await?;
        tracing::info!(%tx_hash, to = %to, %amount, "transfer confirmed");
        Ok(TransferReceipt::new(tx_hash))
    }
}
