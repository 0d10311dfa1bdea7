//! Identifier types shared by the client and the samplers.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a user in the upstream social network.
///
/// Samplers treat the value as opaque; only the uniform samplers do
/// arithmetic on it to move through the ID space.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl UserId {
    /// Returns the ID `offset` positions further along the ID space.
    pub fn checked_add(self, offset: u64) -> Option<UserId> {
        self.0.checked_add(offset).map(UserId)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(UserId)
    }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        UserId(value)
    }
}

/// Ordered friend list of a user, as returned by the upstream.
pub type FriendSet = Vec<UserId>;
