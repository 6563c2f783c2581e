//! # Whitelist Middleware
//!
//! Gates every mutating request on the whitelist oracle. Read requests
//! pass through untouched.
//!
//! ## Subject Address
//!
//! The subject is the first non-empty string among these JSON body fields:
//!
//! ```text
//! wallet_address → creator → participant → sender → from → address
//! ```
//!
//! falling back to the `X-Wallet-Address` header. No address is a 422,
//! a malformed one is a 422, and an address the oracle does not know is a
//! 403. On success the resolved [`CallerAddress`] is placed in the request
//! extensions and the buffered body is handed on unchanged.

use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use circles_core::WalletAddress;

use crate::error::AppError;
use crate::state::AppState;

/// Body fields that may carry the subject address, highest priority first.
pub const ADDRESS_FIELDS: [&str; 6] = [
    "wallet_address",
    "creator",
    "participant",
    "sender",
    "from",
    "address",
];

/// Header consulted when no body field carries an address.
pub const ADDRESS_HEADER: &str = "x-wallet-address";

/// Largest body the middleware will buffer.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// The whitelisted address a request was authorized for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerAddress(pub WalletAddress);

impl<S: Send + Sync> FromRequestParts<S> for CallerAddress {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerAddress>()
            .cloned()
            .ok_or_else(|| AppError::Internal("whitelist middleware did not run".to_string()))
    }
}

/// Find the subject address of a request.
///
/// A body that is not a JSON object contributes nothing; the handler
/// reports malformed JSON itself.
pub fn resolve_address(headers: &HeaderMap, body: &[u8]) -> Result<WalletAddress, AppError> {
    let json: Option<serde_json::Map<String, serde_json::Value>> = serde_json::from_slice(body).ok();
    let from_body = json.as_ref().and_then(|obj| {
        ADDRESS_FIELDS.iter().find_map(|field| {
            obj.get(*field)
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
        })
    });

    let raw = from_body
        .or_else(|| {
            headers
                .get(ADDRESS_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|s| !s.trim().is_empty())
        })
        .ok_or_else(|| {
            AppError::Validation(format!(
                "no wallet address in request: set one of {} or the X-Wallet-Address header",
                ADDRESS_FIELDS.join(", ")
            ))
        })?;
    Ok(WalletAddress::parse(raw)?)
}

/// Axum middleware enforcing the whitelist on POST requests.
pub async fn whitelist_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::POST {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let bytes: Bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return AppError::BadRequest(format!("failed to read request body: {e}")).into_response()
        }
    };

    let address = match resolve_address(&parts.headers, &bytes) {
        Ok(address) => address,
        Err(e) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "request has no usable wallet address");
            return e.into_response();
        }
    };

    if !state.whitelist.is_authorized(&address).await {
        tracing::warn!(path = %parts.uri.path(), %address, "address not whitelisted");
        return AppError::Forbidden(format!("address {address} is not whitelisted")).into_response();
    }

    parts.extensions.insert(CallerAddress(address));
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const A: &str = "0x00000000000000000000000000000000000000a1";
    const B: &str = "0x00000000000000000000000000000000000000b2";

    fn header(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ADDRESS_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn body_fields_follow_priority_order() {
        let body = serde_json::json!({"address": B, "creator": A}).to_string();
        let resolved = resolve_address(&HeaderMap::new(), body.as_bytes()).unwrap();
        assert_eq!(resolved, WalletAddress::parse(A).unwrap());

        let body = serde_json::json!({"from": B, "wallet_address": A}).to_string();
        let resolved = resolve_address(&HeaderMap::new(), body.as_bytes()).unwrap();
        assert_eq!(resolved, WalletAddress::parse(A).unwrap());
    }

    #[test]
    fn body_wins_over_header() {
        let body = serde_json::json!({"sender": A}).to_string();
        let resolved = resolve_address(&header(B), body.as_bytes()).unwrap();
        assert_eq!(resolved, WalletAddress::parse(A).unwrap());
    }

    #[test]
    fn header_used_for_empty_or_non_object_body() {
        assert_eq!(
            resolve_address(&header(B), b"").unwrap(),
            WalletAddress::parse(B).unwrap()
        );
        assert_eq!(
            resolve_address(&header(B), b"[1, 2]").unwrap(),
            WalletAddress::parse(B).unwrap()
        );
    }

    #[test]
    fn blank_and_non_string_fields_are_skipped() {
        let body = serde_json::json!({"wallet_address": "  ", "creator": 7, "participant": A}).to_string();
        let resolved = resolve_address(&HeaderMap::new(), body.as_bytes()).unwrap();
        assert_eq!(resolved, WalletAddress::parse(A).unwrap());
    }

    #[test]
    fn missing_or_malformed_address_is_validation_error() {
        let err = resolve_address(&HeaderMap::new(), br#"{"name": "x"}"#).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("X-Wallet-Address")));

        let err = resolve_address(&HeaderMap::new(), br#"{"creator": "0x12"}"#).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
