//! The process-wide in-memory progress map.

use parking_lot::RwLock;

use crate::domain::models::{PositionRecord, ProgressMap};
use crate::domain::reconcile::merge;

/// Authoritative in-memory `ProgressMap` for the running process.
///
/// Only two mutations exist: [`ProgressState::apply_optimistic_update`] (one book, from the
/// live reading session) and [`ProgressState::replace_with_merge_result`] (whole map, from a
/// sync). Neither edits a record partially.
#[derive(Debug, Default)]
pub struct ProgressState {
    map: RwLock<ProgressMap>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressMap {
        self.map.read().clone()
    }

    pub fn position_of(&self, book_id: &str) -> Option<PositionRecord> {
        self.map.read().get(book_id).cloned()
    }

    /// Replace the record of `book_id` with a freshly stamped one and return it.
    pub fn apply_optimistic_update(&self, book_id: &str, position: &str) -> PositionRecord {
        let mut map = self.map.write();
        let record = PositionRecord::stamped(position, map.get(book_id));
        map.insert(book_id, record.clone());
        record
    }

    /// Install a sync result without losing entries that became newer while the sync was in
    /// flight: the merge result is reconciled against the current map, whose strictly newer
    /// records win.
    pub fn replace_with_merge_result(&self, merged: ProgressMap) -> ProgressMap {
        let mut map = self.map.write();
        let reconciled = merge(&merged, &map);
        *map = reconciled.clone();
        reconciled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimistic_update_is_visible_immediately() {
        let state = ProgressState::new();
        let rec = state.apply_optimistic_update("book1", "p1");
        assert_eq!(state.position_of("book1"), Some(rec));
    }

    #[test]
    fn optimistic_updates_are_monotonic_per_book() {
        let state = ProgressState::new();
        let first = state.apply_optimistic_update("book1", "p1");
        let second = state.apply_optimistic_update("book1", "p2");
        assert!(second.updated_at > first.updated_at);
        assert_eq!(state.position_of("book1").unwrap().position, "p2");
    }

    #[test]
    fn merge_result_does_not_clobber_newer_memory() {
        let state = ProgressState::new();
        let live = state.apply_optimistic_update("book1", "live");

        let mut merged = ProgressMap::new();
        merged.insert("book1", PositionRecord::new("stale", live.updated_at - 10));
        merged.insert("book2", PositionRecord::new("other", 5));

        let result = state.replace_with_merge_result(merged);
        assert_eq!(result.get("book1").unwrap().position, "live");
        assert_eq!(result.get("book2").unwrap().position, "other");
        assert_eq!(state.snapshot(), result);
    }

    #[test]
    fn merge_result_replaces_older_memory() {
        let state = ProgressState::new();
        state.replace_with_merge_result(
            [("book1".to_string(), PositionRecord::new("old", 1))]
                .into_iter()
                .collect(),
        );
        let result = state.replace_with_merge_result(
            [("book1".to_string(), PositionRecord::new("new", 2))]
                .into_iter()
                .collect(),
        );
        assert_eq!(result.get("book1").unwrap().position, "new");
    }

    #[test]
    fn update_after_max_timestamp_does_not_overflow() {
        let state = ProgressState::new();
        state.replace_with_merge_result(
            [("book1".to_string(), PositionRecord::new("remote", i64::MAX))]
                .into_iter()
                .collect(),
        );
        let rec = state.apply_optimistic_update("book1", "local");
        assert_eq!(rec.updated_at, i64::MAX);
        assert_eq!(state.position_of("book1").unwrap().position, "local");
    }
}
