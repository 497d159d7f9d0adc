//! Identifiers for the entities a user can toggle.
//!
//! Visits (a logged meal at a place) can be liked and saved; users can be
//! followed. Both are ULIDs on the wire.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use std::hash::Hash;
use std::str::FromStr;
use ulid::Ulid;

/// Anything that can key per-entity toggle state.
pub trait EntityId: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static {}

impl<T> EntityId for T where T: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static {}

/// Identifier of a visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitId(pub Ulid);

impl VisitId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for VisitId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VisitId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Identifier of a user profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Ulid);

impl UserId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_id_roundtrips_through_string() {
        let id = VisitId::new();
        let parsed: VisitId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_ids_serialize_as_bare_strings() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    #[test]
    fn test_invalid_id_rejected() {
        assert!("not-a-ulid".parse::<VisitId>().is_err());
    }
}
