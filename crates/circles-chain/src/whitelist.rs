//! Remote whitelist source.
//!
//! Fetches the authorized address list with a GET. The body is either a
//! JSON array of address strings or an object with an `addresses` array.
//! Entries that are not valid addresses are skipped with a warning so a
//! single bad row cannot lock everyone out.

use std::time::Duration;

use async_trait::async_trait;
use circles_core::WalletAddress;
use circles_ledger::{WhitelistFetchError, WhitelistSource};
use serde::Deserialize;
use url::Url;

use crate::error::ChainError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WhitelistBody {
    List(Vec<serde_json::Value>),
    Wrapped { addresses: Vec<serde_json::Value> },
}

impl WhitelistBody {
    fn into_entries(self) -> Vec<serde_json::Value> {
        match self {
            Self::List(entries) | Self::Wrapped { addresses: entries } => entries,
        }
    }
}

/// [`WhitelistSource`] backed by an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpWhitelistSource {
    http: reqwest::Client,
    url: Url,
}

impl HttpWhitelistSource {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Http {
                endpoint: "client builder".into(),
                source: e,
            })?;
        Ok(Self { http, url })
    }

    /// Fetch and parse the list.
    pub async fn fetch_addresses(&self) -> Result<Vec<WalletAddress>, ChainError> {
        let endpoint = format!("GET {}", self.url);
        let resp = crate::retry::retry_read(&endpoint, || self.http.get(self.url.clone()).send())
            .await
            .map_err(|e| ChainError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChainError::Api {
                endpoint,
                status,
                body,
            });
        }
        let body: WhitelistBody = resp
            .json()
            .await
            .map_err(|e| ChainError::Deserialization { endpoint, source: e })?;

        let mut addresses = Vec::new();
        for entry in body.into_entries() {
            match entry.as_str().map(WalletAddress::parse) {
                Some(Ok(addr)) => addresses.push(addr),
                Some(Err(e)) => tracing::warn!(error = %e, "skipping invalid whitelist entry"),
                None => tracing::warn!(entry = %entry, "skipping non-string whitelist entry"),
            }
        }
        Ok(addresses)
    }
}

#[async_trait]
impl WhitelistSource for HttpWhitelistSource {
    async fn fetch(&self) -> Result<Vec<WalletAddress>, WhitelistFetchError> {
        Ok(self.fetch_addresses().await?)
    }
}
