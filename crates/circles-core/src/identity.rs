//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the identifiers of the circle domain. These
//! prevent accidental identifier confusion: a `MemberId` cannot be passed
//! where a `RoundId` is expected.
//!
//! All three serialize as the bare UUID string so they can be used as
//! JSON object keys.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a gift circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircleId(pub Uuid);

/// Unique identifier for a member within a circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub Uuid);

/// Unique identifier for an allocation round within a circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(pub Uuid);

impl CircleId {
    /// Generate a new random circle identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl MemberId {
    /// Generate a new random member identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl RoundId {
    /// Generate a new random round identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CircleId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for RoundId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CircleId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<Uuid> for MemberId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<Uuid> for RoundId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CircleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "circle:{}", self.0)
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "member:{}", self.0)
    }
}

impl std::fmt::Display for RoundId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "round:{}", self.0)
    }
}
