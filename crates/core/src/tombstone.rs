//! Tombstone (soft-delete) naming.
//!
//! A tombstoned aggregate keeps its row and all historical intervals, but
//! its name is rewritten with a suffix that breaks uniqueness so the
//! original name becomes available for reuse.

use crate::types::{DbId, Timestamp};

/// Build the replacement name for a tombstoned aggregate.
///
/// The suffix includes the row id and a second-resolution timestamp, which
/// keeps the renamed row unique even if the same name is deleted twice.
pub fn tombstone_name(name: &str, id: DbId, deleted_at: Timestamp) -> String {
    format!(
        "{name} [deleted {id} {}]",
        deleted_at.format("%Y%m%d%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;

    #[test]
    fn suffix_contains_id_and_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 45).unwrap();
        let renamed = tombstone_name("Platform", 42, at);
        assert_eq!(renamed, "Platform [deleted 42 20260301123045]");
    }

    #[test]
    fn same_name_deleted_twice_stays_distinct() {
        let a = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 1).unwrap();
        assert_ne!(tombstone_name("Platform", 7, a), tombstone_name("Platform", 7, b));
        assert_ne!(tombstone_name("Platform", 7, a), tombstone_name("Platform", 8, a));
    }
}
