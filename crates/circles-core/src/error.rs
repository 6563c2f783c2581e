//! # Error Types
//!
//! Input validation errors shared by every layer. State machine and
//! ledger errors live next to the code that raises them.

use thiserror::Error;

/// A request value failed validation before anything was mutated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required field was absent or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// A wallet address could not be accepted.
    #[error("invalid address {value:?}: {reason}")]
    InvalidAddress {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A percentage was not a finite number in [0, 100].
    #[error("percentage must be a finite number between 0 and 100, got {0}")]
    InvalidPercentage(f64),

    /// A monetary amount could not be parsed.
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),
}

/// Error parsing or computing a [`crate::TokenAmount`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// The input string was empty.
    #[error("amount must not be empty")]
    Empty,

    /// Negative amounts are never valid.
    #[error("amount must not be negative: {0}")]
    Negative(String),

    /// The input is not a plain decimal number.
    #[error("amount is not a decimal number: {0}")]
    Malformed(String),

    /// More fractional digits than the token supports.
    #[error("amount {value} has more than {max} decimal places")]
    TooManyDecimals {
        /// The rejected input.
        value: String,
        /// Maximum supported fractional digits.
        max: u32,
    },

    /// The value does not fit in 128 bits of base units.
    #[error("amount overflows: {0}")]
    Overflow(String),
}
