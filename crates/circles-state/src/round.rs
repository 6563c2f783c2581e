//! # Round Lifecycle State Machine
//!
//! A round collects allocations while `Open` and becomes `Finalized`
//! exactly once, when every payout has been confirmed.
//!
//! ## Settlement progress
//!
//! Transfers confirmed during a finalize attempt are recorded on the round
//! as [`CompletedLeg`]s together with the [`SettlementPlan`] they belong to.
//! A later attempt resumes from that plan and skips confirmed legs, so a
//! retry after a mid-loop failure never pays anyone twice. While progress
//! exists the allocations are frozen.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use circles_core::{MemberId, Percentage, RoundId, TokenAmount};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settlement::{PayoutRecord, SettlementPlan};

/// A contributor's split: target member → percentage.
pub type AllocationMap = BTreeMap<MemberId, Percentage>;

/// Round status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    /// Accepting allocations.
    Open,
    /// Payouts settled; terminal.
    Finalized,
}

impl RoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Finalized => "finalized",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized)
    }
}

impl std::fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from round transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoundError {
    /// The round has already been finalized.
    #[error("{0} is already finalized")]
    AlreadyFinalized(RoundId),

    /// Transfers for this round have already been confirmed; allocations
    /// can no longer change.
    #[error("{0} has confirmed transfers from an interrupted finalize; allocations are frozen")]
    SettlementInProgress(RoundId),

    /// A leg was recorded against a different plan than the one in progress.
    #[error("{0} already has a settlement plan in progress")]
    PlanMismatch(RoundId),
}

/// Which transfer of a member's settlement a leg is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegKind {
    /// Treasury fee.
    Fee,
    /// Member payout.
    Payout,
}

impl LegKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fee => "fee",
            Self::Payout => "payout",
        }
    }
}

impl std::fmt::Display for LegKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A confirmed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedLeg {
    pub member_id: MemberId,
    pub kind: LegKind,
    pub amount: TokenAmount,
    pub transaction_ref: String,
    pub confirmed_at: DateTime<Utc>,
}

/// The frozen plan of an interrupted finalize plus the legs already confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementProgress {
    pub plan: SettlementPlan,
    pub legs: Vec<CompletedLeg>,
}

impl SettlementProgress {
    /// The confirmed leg for `member` of `kind`, if any.
    pub fn leg(&self, member: MemberId, kind: LegKind) -> Option<&CompletedLeg> {
        self.legs
            .iter()
            .find(|l| l.member_id == member && l.kind == kind)
    }
}

/// One allocation cycle within a circle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    id: RoundId,
    budget: TokenAmount,
    status: RoundStatus,
    allocations: BTreeMap<MemberId, AllocationMap>,
    results: Option<Vec<PayoutRecord>>,
    settlement: Option<SettlementProgress>,
    created_at: DateTime<Utc>,
    finalized_at: Option<DateTime<Utc>>,
}

impl Round {
    /// A fresh open round.
    pub(crate) fn open(budget: TokenAmount) -> Self {
        Self {
            id: RoundId::new(),
            budget,
            status: RoundStatus::Open,
            allocations: BTreeMap::new(),
            results: None,
            settlement: None,
            created_at: Utc::now(),
            finalized_at: None,
        }
    }

    pub fn id(&self) -> RoundId {
        self.id
    }

    pub fn budget(&self) -> TokenAmount {
        self.budget
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == RoundStatus::Open
    }

    pub fn allocations(&self) -> &BTreeMap<MemberId, AllocationMap> {
        &self.allocations
    }

    /// The stored split of one contributor.
    pub fn allocation_of(&self, contributor: MemberId) -> Option<&AllocationMap> {
        self.allocations.get(&contributor)
    }

    /// `None` until finalized.
    pub fn results(&self) -> Option<&[PayoutRecord]> {
        self.results.as_deref()
    }

    pub fn settlement(&self) -> Option<&SettlementProgress> {
        self.settlement.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
        self.finalized_at
    }

    /// Fails if the round is finalized.
    pub fn ensure_open(&self) -> Result<(), RoundError> {
        match self.status {
            RoundStatus::Open => Ok(()),
            RoundStatus::Finalized => Err(RoundError::AlreadyFinalized(self.id)),
        }
    }

    /// Fails unless allocations may still change.
    pub fn ensure_allocatable(&self) -> Result<(), RoundError> {
        self.ensure_open()?;
        if self.settlement.is_some() {
            return Err(RoundError::SettlementInProgress(self.id));
        }
        Ok(())
    }

    /// Replace a contributor's split. Callers validate targets first.
    pub(crate) fn replace_allocation(&mut self, contributor: MemberId, split: AllocationMap) {
        self.allocations.insert(contributor, split);
    }

    /// Record a confirmed transfer. The first leg freezes `plan` on the round.
    pub fn record_leg(&mut self, plan: &SettlementPlan, leg: CompletedLeg) -> Result<(), RoundError> {
        self.ensure_open()?;
        let progress = self.settlement.get_or_insert_with(|| SettlementProgress {
            plan: plan.clone(),
            legs: Vec::new(),
        });
        if progress.plan != *plan {
            return Err(RoundError::PlanMismatch(self.id));
        }
        progress.legs.push(leg);
        Ok(())
    }

    /// `Open → Finalized`. Fires at most once.
    pub fn finalize(&mut self, results: Vec<PayoutRecord>) -> Result<(), RoundError> {
        self.ensure_open()?;
        self.status = RoundStatus::Finalized;
        self.results = Some(results);
        self.finalized_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::FeePolicy;
    use circles_core::WalletAddress;

    fn empty_plan() -> SettlementPlan {
        let treasury = WalletAddress::parse("0x00000000000000000000000000000000000000ff").unwrap();
        SettlementPlan::compute(
            &[],
            TokenAmount::ZERO,
            &BTreeMap::new(),
            &FeePolicy::standard(treasury),
        )
    }

    fn leg(kind: LegKind) -> CompletedLeg {
        CompletedLeg {
            member_id: MemberId::new(),
            kind,
            amount: TokenAmount::parse("1").unwrap(),
            transaction_ref: "0xabc".into(),
            confirmed_at: Utc::now(),
        }
    }

    #[test]
    fn new_round_is_open_and_empty() {
        let round = Round::open(TokenAmount::parse("10").unwrap());
        assert!(round.is_open());
        assert!(round.allocations().is_empty());
        assert!(round.results().is_none());
        assert!(round.finalized_at().is_none());
    }

    #[test]
    fn finalize_fires_once() {
        let mut round = Round::open(TokenAmount::ZERO);
        round.finalize(vec![]).unwrap();
        assert_eq!(round.status(), RoundStatus::Finalized);
        assert_eq!(round.results(), Some(&[][..]));
        assert!(round.finalized_at().is_some());

        let err = round.finalize(vec![]).unwrap_err();
        assert_eq!(err, RoundError::AlreadyFinalized(round.id()));
    }

    #[test]
    fn recorded_leg_freezes_allocations() {
        let mut round = Round::open(TokenAmount::ZERO);
        assert!(round.ensure_allocatable().is_ok());
        round.record_leg(&empty_plan(), leg(LegKind::Fee)).unwrap();
        assert_eq!(
            round.ensure_allocatable(),
            Err(RoundError::SettlementInProgress(round.id()))
        );
        assert!(round.ensure_open().is_ok(), "still open for a retry");
    }

    #[test]
    fn legs_must_belong_to_frozen_plan() {
        let mut round = Round::open(TokenAmount::ZERO);
        let plan = empty_plan();
        round.record_leg(&plan, leg(LegKind::Fee)).unwrap();
        let mut other = empty_plan();
        other.fee_bps = 0;
        assert_eq!(
            round.record_leg(&other, leg(LegKind::Payout)),
            Err(RoundError::PlanMismatch(round.id()))
        );
        assert!(round.record_leg(&plan, leg(LegKind::Payout)).is_ok());
    }

    #[test]
    fn progress_looks_up_legs_by_member_and_kind() {
        let mut round = Round::open(TokenAmount::ZERO);
        let fee = leg(LegKind::Fee);
        let member = fee.member_id;
        round.record_leg(&empty_plan(), fee).unwrap();
        let progress = round.settlement().unwrap();
        assert!(progress.leg(member, LegKind::Fee).is_some());
        assert!(progress.leg(member, LegKind::Payout).is_none());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RoundStatus::Open).unwrap(), "\"open\"");
        assert_eq!(RoundStatus::Finalized.to_string(), "finalized");
        assert!(RoundStatus::Finalized.is_terminal());
    }
}
