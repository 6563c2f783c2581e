//! # Request Extraction & Validation
//!
//! Provides the [`Validate`] trait for request DTOs and helpers that turn
//! JSON bodies into domain values, mapping parse failures to
//! [`AppError::BadRequest`] and rule violations to [`AppError::Validation`].

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use circles_core::{TokenAmount, ValidationError};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Request types that check business rules beyond what serde enforces.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Parse a body that may be absent.
///
/// An empty (or whitespace-only) body yields `T::default()`. The content
/// type is not checked, so callers may POST with no headers at all.
pub fn extract_optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {e}")))
}

/// Read an optional amount given as a decimal string or a JSON number.
pub fn parse_amount(
    field: &'static str,
    value: Option<&serde_json::Value>,
) -> Result<Option<TokenAmount>, AppError> {
    let raw = match value {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(AppError::Validation(format!(
                "{field} must be a decimal string or number, got {other}"
            )))
        }
    };
    TokenAmount::parse(&raw)
        .map(Some)
        .map_err(|e| AppError::from(ValidationError::InvalidAmount(e)))
}
