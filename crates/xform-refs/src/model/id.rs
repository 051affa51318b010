//! Stable node identities.
//!
//! Node names and paths change on every rename or move. A [`Ufid`] does not,
//! so references and translation slots are keyed by it.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// A document node's stable identity, backed by a UUID.
///
/// Displayed as non-hyphenated lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ufid(Uuid);

impl Ufid {
    /// A fresh random (v4) identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Builds an identity from a fixed value. Handy for tests and fixtures.
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Parses hex, with or without hyphens.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::try_parse(s).ok().map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for Ufid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Ufid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for Ufid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::try_parse(s).map(Self)
    }
}
