//! # Settlement Plan
//!
//! Turns a round's allocations into per-member payouts.
//!
//! ```text
//! per_member_budget = budget / member_count
//! total[target]    += per_member_budget × percent / 100   (every contributor → target)
//! fee               = total × fee_bps / 10_000
//! payout            = total − fee
//! ```
//!
//! Members whose total is zero are left out of the plan entirely. Entries
//! follow circle-member order, which is also the order transfers are
//! issued in.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use circles_core::amount::BPS_DENOMINATOR;
use circles_core::{MemberId, TokenAmount, ValidationError, WalletAddress};
use serde::{Deserialize, Serialize};

use crate::circle::Member;
use crate::round::AllocationMap;

/// Default treasury fee: 5 %.
pub const DEFAULT_FEE_BPS: u32 = 500;

/// Treasury fee rate and destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    fee_bps: u32,
    treasury: WalletAddress,
}

impl FeePolicy {
    /// Build a policy. The rate is in basis points and may not exceed 10 000.
    pub fn new(fee_bps: u32, treasury: WalletAddress) -> Result<Self, ValidationError> {
        if fee_bps > BPS_DENOMINATOR {
            return Err(ValidationError::InvalidPercentage(fee_bps as f64 / 100.0));
        }
        Ok(Self { fee_bps, treasury })
    }

    /// The default 5 % policy paying into `treasury`.
    pub fn standard(treasury: WalletAddress) -> Self {
        Self {
            fee_bps: DEFAULT_FEE_BPS,
            treasury,
        }
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    pub fn treasury(&self) -> &WalletAddress {
        &self.treasury
    }

    /// Split a gross total into `(fee, payout)`. The two always sum to `total`.
    pub fn split(&self, total: TokenAmount) -> (TokenAmount, TokenAmount) {
        let fee = total.bps_of(self.fee_bps);
        let payout = total.checked_sub(fee).unwrap_or(TokenAmount::ZERO);
        (fee, payout)
    }
}

/// What one member is owed from a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSettlement {
    pub member_id: MemberId,
    pub address: WalletAddress,
    /// Pre-fee total received from all contributors.
    pub gross: TokenAmount,
    pub fee: TokenAmount,
    pub payout: TokenAmount,
}

/// The ordered list of payouts for a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub per_member_budget: TokenAmount,
    pub fee_bps: u32,
    pub treasury: WalletAddress,
    pub entries: Vec<MemberSettlement>,
    pub computed_at: DateTime<Utc>,
}

impl SettlementPlan {
    /// Compute the plan for `budget` shared by `members`.
    pub fn compute(
        members: &[Member],
        budget: TokenAmount,
        allocations: &BTreeMap<MemberId, AllocationMap>,
        fee: &FeePolicy,
    ) -> Self {
        let per_member_budget = budget.split_evenly(members.len());
        let entries = incoming_totals(members, per_member_budget, allocations)
            .into_iter()
            .filter(|(_, gross)| !gross.is_zero())
            .map(|(member, gross)| {
                let (fee_amount, payout) = fee.split(gross);
                MemberSettlement {
                    member_id: member.id,
                    address: member.address.clone(),
                    gross,
                    fee: fee_amount,
                    payout,
                }
            })
            .collect();

        Self {
            per_member_budget,
            fee_bps: fee.fee_bps(),
            treasury: fee.treasury().clone(),
            entries,
            computed_at: Utc::now(),
        }
    }

    /// Sum of all gross totals in the plan.
    pub fn gross_total(&self) -> TokenAmount {
        self.entries
            .iter()
            .fold(TokenAmount::ZERO, |acc, e| acc.saturating_add(e.gross))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Incoming total for every member, in member order, zeros included.
pub fn incoming_totals<'a>(
    members: &'a [Member],
    per_member_budget: TokenAmount,
    allocations: &BTreeMap<MemberId, AllocationMap>,
) -> Vec<(&'a Member, TokenAmount)> {
    let mut totals: BTreeMap<MemberId, TokenAmount> = BTreeMap::new();
    for split in allocations.values() {
        for (target, percent) in split {
            let share = per_member_budget.percent_of(*percent);
            let entry = totals.entry(*target).or_insert(TokenAmount::ZERO);
            *entry = entry.saturating_add(share);
        }
    }
    members
        .iter()
        .map(|m| (m, totals.get(&m.id).copied().unwrap_or(TokenAmount::ZERO)))
        .collect()
}

/// One paid member in a finalized round's results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub member_id: MemberId,
    pub address: WalletAddress,
    /// Amount transferred to the member, after the fee.
    pub amount: TokenAmount,
    /// Amount routed to the treasury.
    pub fee: TokenAmount,
    pub transaction_ref: String,
    /// Absent when the fee rounded to zero and no fee transfer was issued.
    pub fee_transaction_ref: Option<String>,
}
