//! # Circles and Members
//!
//! A [`Circle`] owns its members and rounds. Every operation validates
//! fully before it mutates, so a rejected request leaves the circle
//! exactly as it was.

use chrono::{DateTime, Utc};
use circles_core::{CircleId, MemberId, Percentage, RoundId, TokenAmount, ValidationError, WalletAddress};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::round::{AllocationMap, CompletedLeg, Round, RoundError};
use crate::settlement::{FeePolicy, PayoutRecord, SettlementPlan};

/// Members required before a round can start.
pub const MIN_ROUND_MEMBERS: usize = 2;

/// Display name given to members who join without one.
pub const DEFAULT_MEMBER_NAME: &str = "Anonymous";

/// Errors from circle operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CircleError {
    #[error("address {0} is already a member of this circle")]
    DuplicateMember(WalletAddress),

    #[error("a round needs at least {required} members, circle has {have}")]
    NotEnoughMembers { have: usize, required: usize },

    #[error("{0} not found")]
    RoundNotFound(RoundId),

    #[error("contributor {0} is not a member of this circle")]
    UnknownContributor(MemberId),

    #[error("allocation target {0} is not a member of this circle")]
    UnknownTarget(MemberId),

    #[error("{0} cannot allocate to itself")]
    SelfAllocation(MemberId),

    #[error("allocations from {contributor} total {total}%, which exceeds 100%")]
    AllocationExceedsLimit { contributor: MemberId, total: f64 },

    #[error(transparent)]
    Round(#[from] RoundError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl CircleError {
    /// Whether this error means an addressed entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RoundNotFound(_))
    }
}

/// A participant of a circle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub address: WalletAddress,
    pub name: String,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    /// A new member. A missing or blank name becomes `"Anonymous"`.
    pub fn new(address: WalletAddress, name: Option<String>) -> Self {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_MEMBER_NAME.to_string());
        Self {
            id: MemberId::new(),
            address,
            name,
            joined_at: Utc::now(),
        }
    }
}

/// A gift circle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circle {
    id: CircleId,
    name: String,
    funding_pool: TokenAmount,
    members: Vec<Member>,
    rounds: Vec<Round>,
    created_at: DateTime<Utc>,
}

impl Circle {
    /// Create an empty circle. The funding pool defaults to zero.
    pub fn new(name: &str, funding_pool: Option<TokenAmount>) -> Result<Self, CircleError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name").into());
        }
        Ok(Self {
            id: CircleId::new(),
            name: name.to_string(),
            funding_pool: funding_pool.unwrap_or(TokenAmount::ZERO),
            members: Vec::new(),
            rounds: Vec::new(),
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> CircleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn funding_pool(&self) -> TokenAmount {
        self.funding_pool
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn is_member(&self, address: &WalletAddress) -> bool {
        self.members.iter().any(|m| &m.address == address)
    }

    pub fn round(&self, id: RoundId) -> Option<&Round> {
        self.rounds.iter().find(|r| r.id() == id)
    }

    fn round_mut(&mut self, id: RoundId) -> Result<&mut Round, CircleError> {
        self.rounds
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(CircleError::RoundNotFound(id))
    }

    /// Add a member. Addresses are unique per circle, ignoring case.
    pub fn join(&mut self, address: WalletAddress, name: Option<String>) -> Result<&Member, CircleError> {
        if self.is_member(&address) {
            return Err(CircleError::DuplicateMember(address));
        }
        self.members.push(Member::new(address, name));
        let idx = self.members.len() - 1;
        Ok(&self.members[idx])
    }

    /// Open a new round with `budget`, or the circle's funding pool.
    pub fn start_round(&mut self, budget: Option<TokenAmount>) -> Result<&Round, CircleError> {
        if self.members.len() < MIN_ROUND_MEMBERS {
            return Err(CircleError::NotEnoughMembers {
                have: self.members.len(),
                required: MIN_ROUND_MEMBERS,
            });
        }
        self.rounds
            .push(Round::open(budget.unwrap_or(self.funding_pool)));
        let idx = self.rounds.len() - 1;
        Ok(&self.rounds[idx])
    }

    /// Replace `from`'s allocation in a round and return the stored map.
    pub fn allocate(
        &mut self,
        round_id: RoundId,
        from: MemberId,
        split: AllocationMap,
    ) -> Result<AllocationMap, CircleError> {
        let round = self
            .round(round_id)
            .ok_or(CircleError::RoundNotFound(round_id))?;
        round.ensure_allocatable()?;
        self.validate_split(from, &split)?;

        self.round_mut(round_id)?
            .replace_allocation(from, split.clone());
        Ok(split)
    }

    fn validate_split(&self, from: MemberId, split: &AllocationMap) -> Result<(), CircleError> {
        if self.member(from).is_none() {
            return Err(CircleError::UnknownContributor(from));
        }
        for target in split.keys() {
            if *target == from {
                return Err(CircleError::SelfAllocation(from));
            }
            if self.member(*target).is_none() {
                return Err(CircleError::UnknownTarget(*target));
            }
        }
        if !Percentage::within_limit(split.values()) {
            return Err(CircleError::AllocationExceedsLimit {
                contributor: from,
                total: Percentage::total(split.values()),
            });
        }
        Ok(())
    }

    /// The payout plan for a round.
    ///
    /// A round with confirmed transfers keeps the plan those transfers were
    /// made under; otherwise the plan is computed from current members and
    /// allocations.
    pub fn settlement_plan(&self, round_id: RoundId, fee: &FeePolicy) -> Result<SettlementPlan, CircleError> {
        let round = self
            .round(round_id)
            .ok_or(CircleError::RoundNotFound(round_id))?;
        round.ensure_open()?;
        if let Some(progress) = round.settlement() {
            return Ok(progress.plan.clone());
        }
        Ok(SettlementPlan::compute(
            &self.members,
            round.budget(),
            round.allocations(),
            fee,
        ))
    }

    /// Record a confirmed leg against a round.
    pub fn record_leg(
        &mut self,
        round_id: RoundId,
        plan: &SettlementPlan,
        leg: CompletedLeg,
    ) -> Result<(), CircleError> {
        self.round_mut(round_id)?.record_leg(plan, leg)?;
        Ok(())
    }

    /// Finalize a round with its payout results.
    pub fn finalize_round(&mut self, round_id: RoundId, results: Vec<PayoutRecord>) -> Result<&Round, CircleError> {
        let round = self.round_mut(round_id)?;
        round.finalize(results)?;
        Ok(&*round)
    }
}
