//! Access roles supplied with each request.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Numeric role identifier as stored in the role/menu store.
pub type RoleId = u32;

/// The set of roles a caller holds for the duration of one request.
///
/// Backed by an ordered set so that two requests with the same roles in a
/// different order compare (and hash) equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<RoleId>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, role: RoleId) -> bool {
        self.0.contains(&role)
    }

    /// True if any of `roles` is in this set.
    pub fn contains_any<'a>(&self, roles: impl IntoIterator<Item = &'a RoleId>) -> bool {
        roles.into_iter().any(|r| self.0.contains(r))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = RoleId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<RoleId> for RoleSet {
    fn from_iter<I: IntoIterator<Item = RoleId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<&[RoleId]> for RoleSet {
    fn from(roles: &[RoleId]) -> Self {
        roles.iter().copied().collect()
    }
}

impl FromStr for RoleSet {
    type Err = Error;

    /// Parse a comma-separated list such as `"2,10,7"`. Blank entries are
    /// ignored; anything non-numeric is a client input error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<RoleId>()
                    .map_err(|_| Error::ClientInput(format!("Invalid role identifier: '{part}'")))
            })
            .collect()
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.0.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", ids.join(","))
    }
}
