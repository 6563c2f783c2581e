//! # Ledger Errors

use circles_core::{CircleId, MemberId, RoundId, ValidationError};
use circles_state::{CircleError, LegKind};
use thiserror::Error;

use crate::settlement::TransferError;

/// Failure class of a [`LedgerError`], used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An addressed circle or round does not exist.
    NotFound,
    /// The request was rejected before anything changed.
    Validation,
    /// A transfer failed mid-finalize. Earlier transfers stand.
    Settlement,
}

/// Errors returned by [`crate::Ledger`] operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{0} not found")]
    CircleNotFound(CircleId),

    #[error(transparent)]
    Circle(#[from] CircleError),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Another request is finalizing this round.
    #[error("{0} is being finalized")]
    FinalizeInProgress(RoundId),

    /// The settlement client failed or timed out.
    #[error("settlement failed on {leg} transfer for {member}: {source}")]
    Settlement {
        member: MemberId,
        leg: LegKind,
        source: TransferError,
    },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CircleNotFound(_) => ErrorKind::NotFound,
            Self::Circle(e) if e.is_not_found() => ErrorKind::NotFound,
            Self::Circle(_) | Self::Invalid(_) | Self::FinalizeInProgress(_) => ErrorKind::Validation,
            Self::Settlement { .. } => ErrorKind::Settlement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_not_found() {
        assert_eq!(LedgerError::CircleNotFound(CircleId::new()).kind(), ErrorKind::NotFound);
        let round = LedgerError::from(CircleError::RoundNotFound(RoundId::new()));
        assert_eq!(round.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn classifies_validation_and_settlement() {
        let dup = LedgerError::from(CircleError::NotEnoughMembers { have: 1, required: 2 });
        assert_eq!(dup.kind(), ErrorKind::Validation);
        let settle = LedgerError::Settlement {
            member: MemberId::new(),
            leg: LegKind::Payout,
            source: TransferError::Rejected("insufficient funds".into()),
        };
        assert_eq!(settle.kind(), ErrorKind::Settlement);
        assert!(settle.to_string().contains("insufficient funds"));
        assert!(settle.to_string().contains("payout"));
    }
}
