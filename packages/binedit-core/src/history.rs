//! Bounded undo/redo ring attached to each open document.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::node::Node;
use crate::value::Value;

/// Default ring capacity; overridden from the config document's
/// `max_undos` at startup.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Successive edits to one path within this window merge into one record,
/// keeping per-keystroke entry edits from flooding the ring.
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(500);

/// What one edit did. Inverses are derived from the same record: undo
/// applies the `before` side, redo the `after` side.
#[derive(Debug, Clone)]
pub enum EditPayload {
    /// A leaf value replacement.
    Leaf { before: Value, after: Value },
    /// An array resize or wholesale element replacement.
    Array { before: Vec<Node>, after: Vec<Node> },
    /// An element reorder. Identity-preserving.
    Move { from: usize, to: usize },
}

#[derive(Debug, Clone)]
pub struct EditRecord {
    /// Dot-delimited node path from the document root.
    pub path: String,
    pub payload: EditPayload,
    pub at: Instant,
}

/// Ring buffer of edit records with a cursor.
///
/// Records before the cursor are undoable, records at and after it are
/// redoable. Committing while the cursor sits mid-ring discards the redo
/// tail first, which is the standard branch-free undo model.
#[derive(Debug)]
pub struct EditHistory {
    records: VecDeque<EditRecord>,
    cursor: usize,
    capacity: usize,
    coalesce_window: Duration,
}

impl EditHistory {
    pub fn new(capacity: usize) -> Self {
        Self::with_window(capacity, DEFAULT_COALESCE_WINDOW)
    }

    pub fn with_window(capacity: usize, coalesce_window: Duration) -> Self {
        Self {
            records: VecDeque::new(),
            cursor: 0,
            capacity: capacity.max(1),
            coalesce_window,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.records.len()
    }

    /// Shrinks or grows the ring. Oldest records are evicted on shrink and
    /// the cursor follows them.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.records.len() > self.capacity {
            self.records.pop_front();
            self.cursor = self.cursor.saturating_sub(1);
        }
    }

    /// Appends an edit. Discards any redo tail, merges with the previous
    /// record when it touched the same path inside the coalescing window,
    /// and evicts the oldest record once past capacity.
    pub fn commit(&mut self, record: EditRecord) {
        self.records.truncate(self.cursor);

        if let Some(last) = self.records.back_mut() {
            let within_window = record
                .at
                .checked_duration_since(last.at)
                .is_some_and(|d| d <= self.coalesce_window);
            if within_window && last.path == record.path {
                if let (
                    EditPayload::Leaf { after: last_after, .. },
                    EditPayload::Leaf { after, .. },
                ) = (&mut last.payload, &record.payload)
                {
                    *last_after = after.clone();
                    last.at = record.at;
                    return;
                }
            }
        }

        self.records.push_back(record);
        if self.records.len() > self.capacity {
            self.records.pop_front();
        }
        self.cursor = self.records.len();
    }

    /// Steps the cursor back and returns the record whose `before` side
    /// should be applied. The ring itself is unchanged.
    pub fn undo(&mut self) -> Option<&EditRecord> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.records.get(self.cursor)
    }

    /// Steps the cursor forward and returns the record whose `after` side
    /// should be applied.
    pub fn redo(&mut self) -> Option<&EditRecord> {
        if self.cursor >= self.records.len() {
            return None;
        }
        let record = self.records.get(self.cursor);
        self.cursor += 1;
        record
    }
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_edit(path: &str, before: u64, after: u64, at: Instant) -> EditRecord {
        EditRecord {
            path: path.to_string(),
            payload: EditPayload::Leaf {
                before: Value::UInt(before),
                after: Value::UInt(after),
            },
            at,
        }
    }

    #[test]
    fn undo_redo_walk_the_cursor() {
        let mut h = EditHistory::with_window(10, Duration::ZERO);
        let t = Instant::now();
        h.commit(leaf_edit("a", 0, 1, t));
        h.commit(leaf_edit("b", 0, 2, t + Duration::from_secs(1)));
        assert!(h.can_undo());
        assert_eq!(h.cursor(), 2);

        assert_eq!(h.undo().unwrap().path, "b");
        assert_eq!(h.undo().unwrap().path, "a");
        assert!(h.undo().is_none());

        assert_eq!(h.redo().unwrap().path, "a");
        assert_eq!(h.redo().unwrap().path, "b");
        assert!(h.redo().is_none());
    }

    #[test]
    fn commit_discards_redo_tail() {
        let mut h = EditHistory::with_window(10, Duration::ZERO);
        let t = Instant::now();
        h.commit(leaf_edit("a", 0, 1, t));
        h.commit(leaf_edit("b", 0, 2, t + Duration::from_secs(1)));
        h.undo();
        h.commit(leaf_edit("c", 0, 3, t + Duration::from_secs(2)));
        assert_eq!(h.len(), 2);
        assert_eq!(h.undo().unwrap().path, "c");
        assert_eq!(h.undo().unwrap().path, "a");
    }

    #[test]
    fn coalesces_rapid_edits_to_same_path() {
        let mut h = EditHistory::new(10);
        let t = Instant::now();
        h.commit(leaf_edit("field", 0, 1, t));
        h.commit(leaf_edit("field", 1, 12, t + Duration::from_millis(100)));
        h.commit(leaf_edit("field", 12, 123, t + Duration::from_millis(200)));
        assert_eq!(h.len(), 1);
        let record = h.undo().unwrap();
        match &record.payload {
            EditPayload::Leaf { before, after } => {
                assert_eq!(before, &Value::UInt(0));
                assert_eq!(after, &Value::UInt(123));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn slow_edits_do_not_coalesce() {
        let mut h = EditHistory::new(10);
        let t = Instant::now();
        h.commit(leaf_edit("field", 0, 1, t));
        h.commit(leaf_edit("field", 1, 2, t + Duration::from_secs(5)));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn different_paths_do_not_coalesce() {
        let mut h = EditHistory::new(10);
        let t = Instant::now();
        h.commit(leaf_edit("a", 0, 1, t));
        h.commit(leaf_edit("b", 0, 1, t + Duration::from_millis(1)));
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn capacity_evicts_oldest_and_keeps_cursor_valid() {
        let mut h = EditHistory::with_window(3, Duration::ZERO);
        let t = Instant::now();
        for i in 0..5u64 {
            h.commit(leaf_edit("a", i, i + 1, t + Duration::from_secs(i)));
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.cursor(), 3);
        // Only the newest three remain undoable.
        let mut undone = 0;
        while h.undo().is_some() {
            undone += 1;
        }
        assert_eq!(undone, 3);
    }

    #[test]
    fn shrinking_capacity_follows_cursor() {
        let mut h = EditHistory::with_window(10, Duration::ZERO);
        let t = Instant::now();
        for i in 0..6u64 {
            h.commit(leaf_edit("a", i, i + 1, t + Duration::from_secs(i)));
        }
        h.set_capacity(2);
        assert_eq!(h.len(), 2);
        assert_eq!(h.cursor(), 2);
        assert!(h.can_undo());
    }
}
