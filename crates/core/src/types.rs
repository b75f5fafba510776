//! Store data types
//!
//! Keys and values are raw byte strings ordered lexicographically. Versions are
//! the store's commit clock: every committed transaction advances it, and a
//! transaction reads the database as of one version.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw key bytes
pub type Key = Vec<u8>;

/// Raw value bytes
pub type Value = Vec<u8>;

/// Commit version of the store
///
/// Versions are totally ordered. A read at version `v` observes every
/// transaction that committed at a version `<= v`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Version(pub u64);

impl Version {
    /// The version of an empty store
    pub const ZERO: Version = Version(0);

    /// Raw version number
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Version immediately after this one
    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Smallest key strictly greater than every key starting with `prefix`
///
/// Trailing `0xff` bytes are stripped and the last remaining byte is
/// incremented. Returns `None` when the prefix is empty or all `0xff`, since
/// no such key exists.
pub fn prefix_successor(prefix: &[u8]) -> Option<Key> {
    let end = prefix.iter().rposition(|&b| b != 0xff)?;
    let mut key = prefix[..=end].to_vec();
    key[end] += 1;
    Some(key)
}

/// Half-open key interval `[begin, end)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyRange {
    /// First key in the range (inclusive)
    pub begin: Key,
    /// First key past the range (exclusive)
    pub end: Key,
}

impl KeyRange {
    /// Create a range from explicit bounds
    pub fn new(begin: impl Into<Key>, end: impl Into<Key>) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
        }
    }

    /// Range containing exactly `key`
    pub fn single_key(key: &[u8]) -> Self {
        let mut end = key.to_vec();
        end.push(0);
        Self {
            begin: key.to_vec(),
            end,
        }
    }

    /// Range of every key starting with `prefix`
    ///
    /// Returns `None` when the prefix has no successor (see [`prefix_successor`]).
    pub fn prefix(prefix: &[u8]) -> Option<Self> {
        prefix_successor(prefix).map(|end| Self {
            begin: prefix.to_vec(),
            end,
        })
    }

    /// The user keyspace `["", "\xff")`
    pub fn all() -> Self {
        Self {
            begin: Vec::new(),
            end: vec![0xff],
        }
    }

    /// True if the range contains no keys
    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }

    /// True if `key` lies inside the range
    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.begin.as_slice() && key < self.end.as_slice()
    }

    /// True if the two ranges share at least one key
    pub fn intersects(&self, other: &KeyRange) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.begin < other.end
            && other.begin < self.end
    }
}
