//! # circles-state: Gift Circle Domain Model
//!
//! Pure, synchronous domain logic. No I/O, no locking, no clocks beyond
//! `Utc::now()` stamps on creation.
//!
//! ## Round Lifecycle
//!
//! ```text
//!            allocate (replaces contributor entry)
//!              ┌────┐
//!              ▼    │
//!  start ──▶  Open ─┘ ──finalize ok──▶ Finalized (terminal)
//!              ▲  │
//!              └──┘ finalize failed (stays open, progress kept)
//! ```
//!
//! A round is an enum with validated transitions rather than typestate
//! types: rounds live inside a circle's `Vec` and are addressed by id at
//! runtime, so the status has to be a value.
//!
//! ## Modules
//!
//! - **Circle** (`circle.rs`): members, join, round creation, allocation
//!   validation.
//! - **Round** (`round.rs`): status machine, allocation storage, recorded
//!   settlement progress and results.
//! - **Settlement** (`settlement.rs`): fee policy and the payout plan
//!   computed from a round's allocations.

pub mod circle;
pub mod round;
pub mod settlement;

pub use circle::{Circle, CircleError, Member, MIN_ROUND_MEMBERS};
pub use round::{
    AllocationMap, CompletedLeg, LegKind, Round, RoundError, RoundStatus, SettlementProgress,
};
pub use settlement::{FeePolicy, MemberSettlement, PayoutRecord, SettlementPlan, DEFAULT_FEE_BPS};
