//! Settlement relay and whitelist client error types.

use circles_ledger::{TransferError, WhitelistFetchError};

/// Errors from relay and whitelist HTTP calls.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The remote returned a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// A transfer intent could not be encoded for signing.
    #[error("failed to encode transfer intent: {0}")]
    Encode(serde_json::Error),
    /// The chain reported the transfer as failed.
    #[error("transfer {tx_hash} {status}: {reason}")]
    TransferFailed {
        tx_hash: String,
        status: String,
        reason: String,
    },
    /// The transfer was still pending after the last poll.
    #[error("transfer {tx_hash} still pending after {polls} polls")]
    Unconfirmed { tx_hash: String, polls: u32 },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl From<ChainError> for TransferError {
    fn from(err: ChainError) -> Self {
        match &err {
            ChainError::Api { status, .. } if (400..500).contains(status) => {
                TransferError::Rejected(err.to_string())
            }
            ChainError::TransferFailed { .. } => TransferError::Rejected(err.to_string()),
            _ => TransferError::Failed(err.to_string()),
        }
    }
}

impl From<ChainError> for WhitelistFetchError {
    fn from(err: ChainError) -> Self {
        WhitelistFetchError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_become_rejections() {
        let err = ChainError::Api {
            endpoint: "POST /v1/transfers".into(),
            status: 422,
            body: "insufficient balance".into(),
        };
        let transfer: TransferError = err.into();
        assert!(matches!(transfer, TransferError::Rejected(ref m) if m.contains("insufficient balance")));
    }

    #[test]
    fn server_errors_and_timeouts_are_failures() {
        let err = ChainError::Api {
            endpoint: "POST /v1/transfers".into(),
            status: 503,
            body: String::new(),
        };
        assert!(matches!(TransferError::from(err), TransferError::Failed(_)));
        let pending = ChainError::Unconfirmed {
            tx_hash: "0x1".into(),
            polls: 3,
        };
        assert!(matches!(TransferError::from(pending), TransferError::Failed(_)));
    }
}
