//! # Circle Ledger
//!
//! The owned repository of all circles. Constructed once at startup and
//! shared (it is cheap to clone) with every request handler.
//!
//! ## Concurrency
//!
//! Synchronous operations run their whole read-validate-mutate step under
//! the store's write lock. Finalize spans many awaited transfers, so each
//! round also has an async gate: finalize holds it for the entire
//! settlement loop, and allocate takes it without waiting, failing fast
//! while a finalize is in flight. The store lock is never held across an
//! `.await`.
//!
//! ## Finalize
//!
//! ```text
//! plan (frozen if legs already confirmed)
//!   └─ for each entry, in member order
//!        ├─ fee leg    → treasury   (skipped if zero or already confirmed)
//!        └─ payout leg → member     (skipped if already confirmed)
//!   └─ Open → Finalized, results written
//! ```
//!
//! Every confirmed leg is recorded on the round as it completes. A failed
//! finalize leaves the round open with those legs in place; the retry
//! reuses the recorded plan and does not pay anyone twice.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use circles_core::{CircleId, MemberId, RoundId, TokenAmount, WalletAddress};
use circles_state::{
    AllocationMap, Circle, CircleError, CompletedLeg, LegKind, Member, PayoutRecord, Round,
    SettlementPlan,
};
use parking_lot::Mutex;

use crate::config::LedgerConfig;
use crate::error::{ErrorKind, LedgerError};
use crate::settlement::{SettlementClient, TransferError, TransferReceipt};
use crate::store::Store;

type Gate = Arc<tokio::sync::Mutex<()>>;

/// One transfer to execute.
struct Leg<'a> {
    member_id: MemberId,
    kind: LegKind,
    to: &'a WalletAddress,
    amount: TokenAmount,
}

/// The circle repository and finalize pipeline.
#[derive(Clone)]
pub struct Ledger {
    circles: Store<CircleId, Circle>,
    gates: Arc<Mutex<HashMap<RoundId, Gate>>>,
    settlement: Arc<dyn SettlementClient>,
    config: LedgerConfig,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("circles", &self.circles.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    pub fn new(settlement: Arc<dyn SettlementClient>, config: LedgerConfig) -> Self {
        Self {
            circles: Store::new(),
            gates: Arc::new(Mutex::new(HashMap::new())),
            settlement,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Number of circles held.
    pub fn circle_count(&self) -> usize {
        self.circles.len()
    }

    pub fn create_circle(
        &self,
        name: &str,
        funding_pool: Option<TokenAmount>,
    ) -> Result<Circle, LedgerError> {
        let circle = Circle::new(name, funding_pool)?;
        self.circles.insert(circle.id(), circle.clone());
        tracing::info!(
            circle_id = %circle.id(),
            funding_pool = %circle.funding_pool(),
            "circle created"
        );
        Ok(circle)
    }

    pub fn get_circle(&self, circle_id: CircleId) -> Result<Circle, LedgerError> {
        self.circles
            .get(&circle_id)
            .ok_or(LedgerError::CircleNotFound(circle_id))
    }

    pub fn join_circle(
        &self,
        circle_id: CircleId,
        address: WalletAddress,
        name: Option<String>,
    ) -> Result<Member, LedgerError> {
        let member = self.update(circle_id, |c| c.join(address, name).cloned())?;
        tracing::info!(%circle_id, member_id = %member.id, address = %member.address, "member joined");
        Ok(member)
    }

    pub fn start_round(
        &self,
        circle_id: CircleId,
        budget: Option<TokenAmount>,
    ) -> Result<Round, LedgerError> {
        let round = self.update(circle_id, |c| c.start_round(budget).cloned())?;
        tracing::info!(%circle_id, round_id = %round.id(), budget = %round.budget(), "round started");
        Ok(round)
    }

    pub fn get_round(&self, circle_id: CircleId, round_id: RoundId) -> Result<Round, LedgerError> {
        self.circles
            .read(&circle_id, |c| c.round(round_id).cloned())
            .ok_or(LedgerError::CircleNotFound(circle_id))?
            .ok_or_else(|| CircleError::RoundNotFound(round_id).into())
    }

    /// Replace `from`'s allocation in an open round.
    ///
    /// Rejected while the round is being finalized or once any of its
    /// transfers have been confirmed.
    pub fn allocate(
        &self,
        circle_id: CircleId,
        round_id: RoundId,
        from: MemberId,
        split: AllocationMap,
    ) -> Result<AllocationMap, LedgerError> {
        self.ensure_round(circle_id, round_id)?;
        let gate = self.gate(round_id);
        let _guard = gate
            .try_lock()
            .map_err(|_| LedgerError::FinalizeInProgress(round_id))?;

        let targets = split.len();
        let stored = self.update(circle_id, |c| c.allocate(round_id, from, split))?;
        tracing::debug!(%circle_id, %round_id, from = %from, targets, "allocation stored");
        Ok(stored)
    }

    /// Settle a round and mark it finalized.
    ///
    /// Concurrent calls on the same round are serialized; only the first
    /// can succeed, later ones see a finalized round.
    pub async fn finalize(
        &self,
        circle_id: CircleId,
        round_id: RoundId,
    ) -> Result<Vec<PayoutRecord>, LedgerError> {
        self.ensure_round(circle_id, round_id)?;
        let gate = self.gate(round_id);
        let _guard = gate.lock().await;

        let started = Instant::now();
        let outcome = self.settle(circle_id, round_id).await;

        let label = match &outcome {
            Ok(_) => "ok",
            Err(e) if e.kind() == ErrorKind::Settlement => "settlement_error",
            Err(_) => "rejected",
        };
        metrics::counter!("circles_finalize_total", "outcome" => label).increment(1);
        metrics::histogram!("circles_finalize_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        outcome
    }

    async fn settle(
        &self,
        circle_id: CircleId,
        round_id: RoundId,
    ) -> Result<Vec<PayoutRecord>, LedgerError> {
        let (plan, confirmed) = self
            .circles
            .read(&circle_id, |c| {
                c.settlement_plan(round_id, &self.config.fee).map(|plan| {
                    let legs = c
                        .round(round_id)
                        .and_then(Round::settlement)
                        .map(|p| p.legs.clone())
                        .unwrap_or_default();
                    (plan, legs)
                })
            })
            .ok_or(LedgerError::CircleNotFound(circle_id))??;

        tracing::info!(
            %circle_id,
            %round_id,
            payees = plan.entries.len(),
            resumed_legs = confirmed.len(),
            per_member_budget = %plan.per_member_budget,
            gross_total = %plan.gross_total(),
            "finalizing round"
        );

        let mut results = Vec::with_capacity(plan.entries.len());
        for entry in &plan.entries {
            let fee_ref = if entry.fee.is_zero() {
                None
            } else {
                let leg = Leg {
                    member_id: entry.member_id,
                    kind: LegKind::Fee,
                    to: &plan.treasury,
                    amount: entry.fee,
                };
                Some(self.settle_leg(circle_id, round_id, &plan, &confirmed, leg).await?)
            };

            // A 100 % fee leaves nothing to pay out.
            if entry.payout.is_zero() {
                continue;
            }
            let leg = Leg {
                member_id: entry.member_id,
                kind: LegKind::Payout,
                to: &entry.address,
                amount: entry.payout,
            };
            let transaction_ref = self.settle_leg(circle_id, round_id, &plan, &confirmed, leg).await?;

            results.push(PayoutRecord {
                member_id: entry.member_id,
                address: entry.address.clone(),
                amount: entry.payout,
                fee: entry.fee,
                transaction_ref,
                fee_transaction_ref: fee_ref,
            });
        }

        let recorded = results.clone();
        self.update(circle_id, |c| c.finalize_round(round_id, recorded).map(|_| ()))?;
        tracing::info!(%circle_id, %round_id, payouts = results.len(), "round finalized");
        Ok(results)
    }

    /// Execute one leg, or return the reference of an earlier confirmation.
    async fn settle_leg(
        &self,
        circle_id: CircleId,
        round_id: RoundId,
        plan: &SettlementPlan,
        confirmed: &[CompletedLeg],
        leg: Leg<'_>,
    ) -> Result<String, LedgerError> {
        if let Some(done) = confirmed
            .iter()
            .find(|l| l.member_id == leg.member_id && l.kind == leg.kind)
        {
            tracing::debug!(
                %round_id,
                member_id = %leg.member_id,
                leg = %leg.kind,
                transaction_ref = %done.transaction_ref,
                "leg already confirmed, skipping"
            );
            return Ok(done.transaction_ref.clone());
        }

        let receipt = match self.transfer(leg.to, leg.amount).await {
            Ok(receipt) => receipt,
            Err(source) => {
                tracing::warn!(
                    %circle_id,
                    %round_id,
                    member_id = %leg.member_id,
                    leg = %leg.kind,
                    amount = %leg.amount,
                    error = %source,
                    "settlement transfer failed"
                );
                metrics::counter!(
                    "circles_settlement_transfers_total",
                    "leg" => leg.kind.as_str(),
                    "outcome" => "error"
                )
                .increment(1);
                return Err(LedgerError::Settlement {
                    member: leg.member_id,
                    leg: leg.kind,
                    source,
                });
            }
        };
        metrics::counter!(
            "circles_settlement_transfers_total",
            "leg" => leg.kind.as_str(),
            "outcome" => "ok"
        )
        .increment(1);

        let completed = CompletedLeg {
            member_id: leg.member_id,
            kind: leg.kind,
            amount: leg.amount,
            transaction_ref: receipt.transaction_ref.clone(),
            confirmed_at: Utc::now(),
        };
        self.update(circle_id, |c| c.record_leg(round_id, plan, completed))?;
        tracing::debug!(
            %round_id,
            member_id = %leg.member_id,
            leg = %leg.kind,
            to = %leg.to,
            amount = %leg.amount,
            transaction_ref = %receipt.transaction_ref,
            "leg confirmed"
        );
        Ok(receipt.transaction_ref)
    }

    async fn transfer(
        &self,
        to: &WalletAddress,
        amount: TokenAmount,
    ) -> Result<TransferReceipt, TransferError> {
        let limit = self.config.settlement_timeout;
        match tokio::time::timeout(limit, self.settlement.transfer(to, amount)).await {
            Ok(result) => result,
            Err(_) => Err(TransferError::Timeout(limit)),
        }
    }

    fn update<R>(
        &self,
        circle_id: CircleId,
        f: impl FnOnce(&mut Circle) -> Result<R, CircleError>,
    ) -> Result<R, LedgerError> {
        self.circles
            .try_update(&circle_id, f)
            .ok_or(LedgerError::CircleNotFound(circle_id))?
            .map_err(LedgerError::from)
    }

    fn ensure_round(&self, circle_id: CircleId, round_id: RoundId) -> Result<(), LedgerError> {
        match self.circles.read(&circle_id, |c| c.round(round_id).is_some()) {
            None => Err(LedgerError::CircleNotFound(circle_id)),
            Some(false) => Err(CircleError::RoundNotFound(round_id).into()),
            Some(true) => Ok(()),
        }
    }

    fn gate(&self, round_id: RoundId) -> Gate {
        Arc::clone(self.gates.lock().entry(round_id).or_default())
    }
}
