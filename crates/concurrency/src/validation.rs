//! Transaction validation for OCC
//!
//! Conflict detection is range based:
//! - every point read records a single-key read conflict range, every range
//!   read records the scanned range, and callers may add extra ranges
//! - every committed transaction leaves its write conflict ranges in the
//!   commit history, tagged with its commit version
//! - a transaction conflicts when a write range committed after its read
//!   version intersects one of its read ranges (first-committer-wins)
//!
//! Blind writes never conflict and read-only transactions always commit.

use rwbench_core::{KeyRange, StoreError, Version};
use std::collections::VecDeque;

/// Write conflict ranges of one committed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Commit version of the transaction
    pub version: Version,
    /// Ranges the transaction wrote (or declared as written)
    pub write_ranges: Vec<KeyRange>,
}

/// Types of conflicts that can occur during transaction validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// A range this transaction read was written by a later commit
    ReadWriteConflict {
        /// The read conflict range that was invalidated
        read_range: KeyRange,
        /// The intersecting write range
        write_range: KeyRange,
        /// Version of the transaction that wrote it
        committed_at: Version,
    },

    /// The read version fell out of the retained commit history, so
    /// conflicts can no longer be checked
    TooOld {
        /// Read version of the transaction
        read_version: Version,
        /// Oldest version still covered by the history
        oldest_retained: Version,
    },
}

/// Result of transaction validation
///
/// Accumulates all conflicts found during validation.
/// A transaction commits only if is_valid() returns true.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// All conflicts detected during validation
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// Create a successful validation result (no conflicts)
    pub fn ok() -> Self {
        ValidationResult {
            conflicts: Vec::new(),
        }
    }

    /// Create a validation result with a single conflict
    pub fn conflict(conflict: ConflictType) -> Self {
        ValidationResult {
            conflicts: vec![conflict],
        }
    }

    /// Check if validation passed (no conflicts)
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Get the number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// Store error a client sees for this result, `None` if valid
    pub fn to_store_error(&self) -> Option<StoreError> {
        let first = self.conflicts.first()?;
        Some(match first {
            ConflictType::TooOld { .. } => StoreError::TransactionTooOld,
            ConflictType::ReadWriteConflict { .. } => StoreError::NotCommitted,
        })
    }
}

/// Check read ranges against every commit newer than `read_version`
///
/// Reports at most one conflict per read range.
pub fn validate_read_ranges(
    read_version: Version,
    read_ranges: &[KeyRange],
    history: &VecDeque<CommitRecord>,
) -> ValidationResult {
    let mut result = ValidationResult::ok();

    for read_range in read_ranges {
        let hit = history
            .iter()
            .rev()
            .take_while(|record| record.version > read_version)
            .find_map(|record| {
                record
                    .write_ranges
                    .iter()
                    .find(|write_range| write_range.intersects(read_range))
                    .map(|write_range| (record.version, write_range))
            });

        if let Some((committed_at, write_range)) = hit {
            result.conflicts.push(ConflictType::ReadWriteConflict {
                read_range: read_range.clone(),
                write_range: write_range.clone(),
                committed_at,
            });
        }
    }

    result
}

/// Validate a complete transaction against the commit history
///
/// `history` must hold every commit newer than `oldest_retained`, in
/// ascending version order.
///
/// # Arguments
/// * `read_version` - Version the transaction read at
/// * `read_ranges` - Its read conflict ranges
/// * `is_read_only` - True if it has no writes and no write conflict ranges
/// * `history` - Recent commits
/// * `oldest_retained` - Oldest read version the history can still validate
pub fn validate_transaction(
    read_version: Version,
    read_ranges: &[KeyRange],
    is_read_only: bool,
    history: &VecDeque<CommitRecord>,
    oldest_retained: Version,
) -> ValidationResult {
    if is_read_only {
        return ValidationResult::ok();
    }

    if read_version < oldest_retained {
        return ValidationResult::conflict(ConflictType::TooOld {
            read_version,
            oldest_retained,
        });
    }

    validate_read_ranges(read_version, read_ranges, history)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: u64, keys: &[&[u8]]) -> CommitRecord {
        CommitRecord {
            version: Version(version),
            write_ranges: keys.iter().map(|k| KeyRange::single_key(k)).collect(),
        }
    }

    fn history(records: Vec<CommitRecord>) -> VecDeque<CommitRecord> {
        records.into_iter().collect()
    }

    #[test]
    fn test_read_only_always_valid() {
        let h = history(vec![record(5, &[b"a"])]);
        let reads = vec![KeyRange::single_key(b"a")];
        let result = validate_transaction(Version(1), &reads, true, &h, Version(0));
        assert!(result.is_valid());
    }

    #[test]
    fn test_later_write_to_read_key_conflicts() {
        let h = history(vec![record(3, &[b"x"]), record(5, &[b"a"])]);
        let reads = vec![KeyRange::single_key(b"a")];
        let result = validate_transaction(Version(4), &reads, false, &h, Version(0));
        assert_eq!(result.conflict_count(), 1);
        assert_eq!(result.to_store_error(), Some(StoreError::NotCommitted));
        match &result.conflicts[0] {
            ConflictType::ReadWriteConflict { committed_at, .. } => {
                assert_eq!(*committed_at, Version(5))
            }
            other => panic!("Wrong conflict: {:?}", other),
        }
    }

    #[test]
    fn test_write_at_or_before_read_version_does_not_conflict() {
        let h = history(vec![record(4, &[b"a"])]);
        let reads = vec![KeyRange::single_key(b"a")];
        let result = validate_transaction(Version(4), &reads, false, &h, Version(0));
        assert!(result.is_valid());
    }

    #[test]
    fn test_range_read_conflicts_with_write_inside_range() {
        let h = history(vec![record(7, &[b"m"])]);
        let reads = vec![KeyRange::new(b"a".to_vec(), b"z".to_vec())];
        let result = validate_transaction(Version(6), &reads, false, &h, Version(0));
        assert!(!result.is_valid());
    }

    #[test]
    fn test_disjoint_ranges_do_not_conflict() {
        let h = history(vec![record(7, &[b"q"])]);
        let reads = vec![KeyRange::single_key(b"a"), KeyRange::single_key(b"b")];
        let result = validate_transaction(Version(6), &reads, false, &h, Version(0));
        assert!(result.is_valid());
    }

    #[test]
    fn test_read_version_older_than_history_is_too_old() {
        let h = history(vec![record(10, &[b"q"])]);
        let result = validate_transaction(Version(2), &[], false, &h, Version(5));
        assert_eq!(result.to_store_error(), Some(StoreError::TransactionTooOld));
    }

    #[test]
    fn test_merge_accumulates_conflicts() {
        let conflict = ConflictType::TooOld {
            read_version: Version(1),
            oldest_retained: Version(2),
        };
        let mut a = ValidationResult::conflict(conflict.clone());
        a.merge(ValidationResult::conflict(conflict));
        assert_eq!(a.conflict_count(), 2);
        assert!(ValidationResult::ok().to_store_error().is_none());
    }
}
