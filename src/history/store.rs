//! History store: bounded, most-recent-first list of clipboard entries.
//!
//! Owns deduplication, move-to-front, favorite-aware eviction,
//! favorite toggling and removal. Pure state transitions, no I/O:
//! the caller decides whether to persist and notify based on the
//! returned outcome.

use std::collections::VecDeque;

use super::{ClipContent, ClipEntry, EntryId, Observation, epoch_millis};

/// Result of [`HistoryStore::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Nothing changed: empty text, or text already at the front.
    Unchanged,
    /// An existing text entry was moved to the front.
    MovedToFront(EntryId),
    /// A new entry was inserted at the front. `evicted` is the entry
    /// removed to stay within capacity, if any.
    Inserted {
        id: EntryId,
        evicted: Option<EntryId>,
    },
    /// The new entry was evicted straight away because every other
    /// entry is a favorite. The history is unchanged.
    Discarded,
}

impl IngestOutcome {
    /// Whether the history was mutated.
    pub fn changed(&self) -> bool {
        !matches!(self, IngestOutcome::Unchanged | IngestOutcome::Discarded)
    }
}

/// Ordered clipboard history, newest entry at the front.
///
/// Invariants:
/// - no two text entries share the same content
/// - `len() <= capacity()` after every operation
/// - favorites are evicted only when no non-favorite entry remains
#[derive(Debug)]
pub struct HistoryStore {
    entries: VecDeque<ClipEntry>,
    capacity: usize,
    /// Last timestamp handed out, keeps capture times strictly increasing.
    last_timestamp: u64,
}

impl HistoryStore {
    /// Create an empty store. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            last_timestamp: 0,
        }
    }

    /// Seed a store from previously persisted entries (newest first).
    pub fn from_entries(entries: Vec<ClipEntry>, capacity: usize) -> Self {
        let mut store = Self::new(capacity);
        store.replace_all(entries);
        store
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a newly observed clipboard value.
    ///
    /// Text: blank text is ignored; text already in the history is moved
    /// to the front (no-op when it is already first); anything else is
    /// inserted at the front. Images are always inserted, never
    /// deduplicated.
    pub fn ingest(&mut self, observation: Observation) -> IngestOutcome {
        let entry = match observation {
            Observation::Text(text) => {
                if text.trim().is_empty() {
                    return IngestOutcome::Unchanged;
                }
                match self.position_of_text(&text) {
                    Some(0) => return IngestOutcome::Unchanged,
                    Some(index) => {
                        let Some(existing) = self.entries.remove(index) else {
                            return IngestOutcome::Unchanged;
                        };
                        let id = existing.id;
                        self.entries.push_front(existing);
                        return IngestOutcome::MovedToFront(id);
                    }
                    None => ClipEntry::text(text, self.next_timestamp()),
                }
            }
            Observation::Image { data, mime_type } => {
                ClipEntry::image(Some(data), mime_type, self.next_timestamp())
            }
        };

        let id = entry.id;
        self.entries.push_front(entry);
        match self.enforce_capacity().into_iter().next() {
            Some(evicted) if evicted == id => IngestOutcome::Discarded,
            evicted => IngestOutcome::Inserted { id, evicted },
        }
    }

    /// Remove the entry with the given identity. Order of the remaining
    /// entries is unchanged. Returns `None` if no such entry exists.
    pub fn remove(&mut self, id: EntryId) -> Option<ClipEntry> {
        let index = self.index_of(id)?;
        self.entries.remove(index)
    }

    /// Remove every entry, favorites included. Returns whether anything
    /// was removed.
    pub fn clear(&mut self) -> bool {
        let had_entries = !self.entries.is_empty();
        self.entries.clear();
        had_entries
    }

    /// Flip the favorite flag of an entry without moving it.
    ///
    /// Returns the new flag value, or `None` if no such entry exists.
    pub fn toggle_favorite(&mut self, id: EntryId) -> Option<bool> {
        let index = self.index_of(id)?;
        let entry = &mut self.entries[index];
        entry.favorite = !entry.favorite;
        Some(entry.favorite)
    }

    /// Look up an entry by identity.
    pub fn get(&self, id: EntryId) -> Option<&ClipEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Iterate entries newest first.
    pub fn iter(&self) -> impl Iterator<Item = &ClipEntry> {
        self.entries.iter()
    }

    /// Ordered copy of the current entries. Never aliases the store.
    pub fn snapshot(&self) -> Vec<ClipEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Replace the whole history (load or import).
    ///
    /// Duplicate text entries keep their first (newest) occurrence and
    /// the result is trimmed to capacity with the eviction policy.
    pub fn replace_all(&mut self, entries: Vec<ClipEntry>) {
        self.entries.clear();
        for entry in entries {
            if let ClipContent::Text(text) = &entry.content
                && self.position_of_text(text).is_some()
            {
                continue;
            }
            self.last_timestamp = self.last_timestamp.max(entry.created_at);
            self.entries.push_back(entry);
        }
        self.enforce_capacity();
    }

    /// Evict until within capacity.
    ///
    /// Scans from the oldest entry toward the newest for the first
    /// non-favorite and removes it. When every entry is a favorite the
    /// oldest is removed regardless.
    fn enforce_capacity(&mut self) -> Vec<EntryId> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            let last = self.entries.len() - 1;
            let index = self
                .entries
                .iter()
                .rposition(|e| !e.favorite)
                .unwrap_or(last);
            if let Some(entry) = self.entries.remove(index) {
                evicted.push(entry.id);
            }
        }
        evicted
    }

    fn position_of_text(&self, text: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| matches!(&e.content, ClipContent::Text(t) if t == text))
    }

    fn index_of(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Capture timestamp: wall clock, forced strictly increasing.
    fn next_timestamp(&mut self) -> u64 {
        let now = epoch_millis().max(self.last_timestamp + 1);
        self.last_timestamp = now;
        now
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::history::DEFAULT_IMAGE_MIME;

    fn text(s: &str) -> Observation {
        Observation::Text(s.to_string())
    }

    fn image() -> Observation {
        Observation::Image {
            data: Bytes::from_static(b"\x89PNG\r\n"),
            mime_type: DEFAULT_IMAGE_MIME.to_string(),
        }
    }

    fn texts(store: &HistoryStore) -> Vec<String> {
        store
            .iter()
            .map(|e| e.as_text().unwrap_or("[image]").to_string())
            .collect()
    }

    fn id_of(store: &HistoryStore, content: &str) -> EntryId {
        store
            .iter()
            .find(|e| e.as_text() == Some(content))
            .map(|e| e.id())
            .unwrap()
    }

    // -- Ingest / dedup --

    #[test]
    fn ingest_inserts_at_front() {
        let mut s = HistoryStore::new(20);
        assert!(s.ingest(text("a")).changed());
        assert!(s.ingest(text("b")).changed());
        assert_eq!(texts(&s), vec!["b", "a"]);
    }

    #[test]
    fn ingest_blank_text_is_noop() {
        let mut s = HistoryStore::new(20);
        assert_eq!(s.ingest(text("")), IngestOutcome::Unchanged);
        assert_eq!(s.ingest(text("   \n\t")), IngestOutcome::Unchanged);
        assert!(s.is_empty());
    }

    #[test]
    fn reingest_moves_to_front_without_growing() {
        let mut s = HistoryStore::new(20);
        s.ingest(text("abc"));
        s.ingest(text("xyz"));
        let abc = id_of(&s, "abc");
        assert_eq!(s.ingest(text("abc")), IngestOutcome::MovedToFront(abc));
        assert_eq!(texts(&s), vec!["abc", "xyz"]);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn reingest_front_entry_is_noop() {
        let mut s = HistoryStore::new(20);
        s.ingest(text("abc"));
        assert_eq!(s.ingest(text("abc")), IngestOutcome::Unchanged);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn move_to_front_keeps_identity_and_favorite() {
        let mut s = HistoryStore::new(20);
        s.ingest(text("abc"));
        let abc = id_of(&s, "abc");
        s.toggle_favorite(abc);
        s.ingest(text("xyz"));
        s.ingest(text("abc"));
        let front = s.iter().next().unwrap();
        assert_eq!(front.id(), abc);
        assert!(front.is_favorite());
    }

    #[test]
    fn no_duplicate_text_after_many_ingests() {
        let mut s = HistoryStore::new(50);
        for word in ["a", "b", "a", "c", "b", "b", "d", "a", "c"] {
            s.ingest(text(word));
        }
        let mut seen = texts(&s);
        let total = seen.len();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), total);
        assert_eq!(texts(&s), vec!["c", "a", "d", "b"]);
    }

    #[test]
    fn text_match_is_exact() {
        let mut s = HistoryStore::new(20);
        s.ingest(text("abc"));
        s.ingest(text("ABC"));
        s.ingest(text("abc "));
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn images_are_never_deduplicated() {
        let mut s = HistoryStore::new(20);
        s.ingest(image());
        s.ingest(image());
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn timestamps_strictly_increase() {
        let mut s = HistoryStore::new(20);
        s.ingest(text("a"));
        s.ingest(text("b"));
        s.ingest(image());
        let stamps: Vec<u64> = s.iter().map(|e| e.created_at()).collect();
        assert!(stamps[0] > stamps[1]);
        assert!(stamps[1] > stamps[2]);
    }

    // -- Eviction --

    #[test]
    fn eviction_without_favorites_drops_oldest() {
        let mut s = HistoryStore::new(3);
        for word in ["a", "b", "c"] {
            s.ingest(text(word));
        }
        let a = id_of(&s, "a");
        let outcome = s.ingest(text("d"));
        assert!(matches!(
            outcome,
            IngestOutcome::Inserted { evicted: Some(id), .. } if id == a
        ));
        assert_eq!(texts(&s), vec!["d", "c", "b"]);
    }

    #[test]
    fn eviction_skips_favorites() {
        let mut s = HistoryStore::new(2);
        s.ingest(text("a"));
        let a = id_of(&s, "a");
        s.toggle_favorite(a);
        s.ingest(text("b"));
        s.ingest(text("c"));
        assert_eq!(texts(&s), vec!["c", "a"]);
    }

    #[test]
    fn eviction_skips_run_of_oldest_favorites() {
        let mut s = HistoryStore::new(4);
        for word in ["a", "b", "c", "d"] {
            s.ingest(text(word));
        }
        s.toggle_favorite(id_of(&s, "a"));
        s.toggle_favorite(id_of(&s, "b"));
        s.ingest(text("e"));
        assert_eq!(texts(&s), vec!["e", "d", "b", "a"]);
    }

    #[test]
    fn eviction_evicts_new_entry_when_rest_are_favorites() {
        let mut s = HistoryStore::new(2);
        s.ingest(text("a"));
        s.ingest(text("b"));
        s.toggle_favorite(id_of(&s, "a"));
        s.toggle_favorite(id_of(&s, "b"));
        let outcome = s.ingest(text("c"));
        // "c" is the only non-favorite, so it is the one evicted.
        assert_eq!(outcome, IngestOutcome::Discarded);
        assert!(!outcome.changed());
        assert_eq!(texts(&s), vec!["b", "a"]);
        assert!(s.iter().all(|e| e.as_text() != Some("c")));
    }

    #[test]
    fn image_discarded_when_rest_are_favorites() {
        let mut s = HistoryStore::new(1);
        s.ingest(text("keep"));
        s.toggle_favorite(id_of(&s, "keep"));
        assert_eq!(s.ingest(image()), IngestOutcome::Discarded);
        assert_eq!(texts(&s), vec!["keep"]);
    }

    #[test]
    fn eviction_everything_favorite_drops_tail() {
        let mut s = HistoryStore::from_entries(
            vec![
                ClipEntry::text("b", 2).with_favorite(true),
                ClipEntry::text("a", 1).with_favorite(true),
            ],
            2,
        );
        let head = ClipEntry::text("c", 3).with_favorite(true);
        let mut entries = s.snapshot();
        entries.insert(0, head);
        s.replace_all(entries);
        assert_eq!(texts(&s), vec!["c", "b"]);
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut s = HistoryStore::new(5);
        for i in 0..40 {
            s.ingest(text(&format!("item-{i}")));
            if i % 3 == 0 {
                let front = s.iter().next().unwrap().id();
                s.toggle_favorite(front);
            }
            assert!(s.len() <= 5);
        }
    }

    #[test]
    fn reload_with_smaller_capacity_evicts_non_favorites_first() {
        let mut s = HistoryStore::new(10);
        for word in ["a", "b", "c", "d"] {
            s.ingest(text(word));
        }
        s.toggle_favorite(id_of(&s, "a"));
        let s = HistoryStore::from_entries(s.snapshot(), 2);
        assert_eq!(texts(&s), vec!["d", "a"]);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut s = HistoryStore::new(0);
        s.ingest(text("a"));
        s.ingest(text("b"));
        assert_eq!(s.capacity(), 1);
        assert_eq!(texts(&s), vec!["b"]);
    }

    // -- Remove / clear / favorite --

    #[test]
    fn remove_by_identity_preserves_order() {
        let mut s = HistoryStore::new(20);
        for word in ["a", "b", "c"] {
            s.ingest(text(word));
        }
        let b = id_of(&s, "b");
        let removed = s.remove(b).unwrap();
        assert_eq!(removed.as_text(), Some("b"));
        assert_eq!(texts(&s), vec!["c", "a"]);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut s = HistoryStore::new(20);
        s.ingest(text("a"));
        assert!(s.remove(EntryId::from_raw(u64::MAX)).is_none());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn remove_twice_is_noop() {
        let mut s = HistoryStore::new(20);
        s.ingest(text("a"));
        let a = id_of(&s, "a");
        assert!(s.remove(a).is_some());
        assert!(s.remove(a).is_none());
    }

    #[test]
    fn clear_removes_favorites_and_is_idempotent() {
        let mut s = HistoryStore::new(20);
        s.ingest(text("a"));
        s.toggle_favorite(id_of(&s, "a"));
        s.ingest(image());
        assert!(s.clear());
        assert!(s.is_empty());
        assert!(!s.clear());
    }

    #[test]
    fn toggle_favorite_flips_without_moving() {
        let mut s = HistoryStore::new(20);
        s.ingest(text("a"));
        s.ingest(text("b"));
        let a = id_of(&s, "a");
        assert_eq!(s.toggle_favorite(a), Some(true));
        assert_eq!(texts(&s), vec!["b", "a"]);
        assert!(s.get(a).unwrap().is_favorite());
        assert_eq!(s.toggle_favorite(a), Some(false));
        assert!(!s.get(a).unwrap().is_favorite());
    }

    #[test]
    fn toggle_unknown_is_none() {
        let mut s = HistoryStore::new(20);
        assert_eq!(s.toggle_favorite(EntryId::from_raw(u64::MAX)), None);
    }

    // -- Snapshot / seeding --

    #[test]
    fn snapshot_does_not_alias_store() {
        let mut s = HistoryStore::new(20);
        s.ingest(text("a"));
        let snap = s.snapshot();
        s.toggle_favorite(snap[0].id());
        s.ingest(text("b"));
        assert_eq!(snap.len(), 1);
        assert!(!snap[0].is_favorite());
    }

    #[test]
    fn from_entries_drops_duplicate_text_and_trims() {
        let s = HistoryStore::from_entries(
            vec![
                ClipEntry::text("a", 4),
                ClipEntry::text("b", 3),
                ClipEntry::text("a", 2),
                ClipEntry::image(None, DEFAULT_IMAGE_MIME, 1),
            ],
            2,
        );
        assert_eq!(texts(&s), vec!["a", "b"]);
    }

    #[test]
    fn seeded_timestamps_keep_increasing() {
        let far_future = u64::MAX / 2;
        let mut s = HistoryStore::from_entries(vec![ClipEntry::text("old", far_future)], 20);
        s.ingest(text("new"));
        assert!(s.iter().next().unwrap().created_at() > far_future);
    }
}
