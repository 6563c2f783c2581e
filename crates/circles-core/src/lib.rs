//! # circles-core: Foundational Types for Gift Circles
//!
//! Defines the primitives every other crate in the workspace builds on.
//! It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `CircleId`, `MemberId` and
//!    `RoundId` cannot be swapped for one another.
//!
//! 2. **Addresses compare case-insensitively.** `WalletAddress` keeps the
//!    spelling it was given but hashes and compares on its lowercase form,
//!    so `0xAB..` and `0xab..` are the same member.
//!
//! 3. **No floating point in currency.** `TokenAmount` is an 18-decimal
//!    fixed-point `u128`. Percentages stay `f64` for bookkeeping and are
//!    converted to integer micro-percent before they touch an amount.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `circles-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod address;
pub mod amount;
pub mod error;
pub mod identity;
pub mod percent;

pub use address::WalletAddress;
pub use amount::TokenAmount;
pub use error::{AmountError, ValidationError};
pub use identity::{CircleId, MemberId, RoundId};
pub use percent::Percentage;
