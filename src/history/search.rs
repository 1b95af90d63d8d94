//! Search filter: sectioned, case-insensitive view over a snapshot.
//!
//! Pure function, safe to call on every keystroke.

use super::ClipEntry;

/// Anything that can be listed and searched like a history entry.
pub trait Searchable {
    /// Text matched against the query; `None` for images.
    fn search_text(&self) -> Option<&str>;
    fn is_favorite(&self) -> bool;
}

impl Searchable for ClipEntry {
    fn search_text(&self) -> Option<&str> {
        self.as_text()
    }

    fn is_favorite(&self) -> bool {
        ClipEntry::is_favorite(self)
    }
}

/// Filtered view of the history, favorites first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredView<T = ClipEntry> {
    pub favorites: Vec<T>,
    pub others: Vec<T>,
}

impl<T> Default for FilteredView<T> {
    fn default() -> Self {
        Self {
            favorites: Vec::new(),
            others: Vec::new(),
        }
    }
}

impl<T> FilteredView<T> {
    pub fn has_results(&self) -> bool {
        !self.favorites.is_empty() || !self.others.is_empty()
    }

    pub fn len(&self) -> usize {
        self.favorites.len() + self.others.len()
    }
}

/// Filter `entries` by `query` and split favorites from the rest.
///
/// The query is trimmed and lowercased; an empty query matches
/// everything. Text entries match on a lowercase substring. Images
/// only appear when the query is empty. Both sections keep the
/// input order.
pub fn apply<T: Searchable + Clone>(entries: &[T], query: &str) -> FilteredView<T> {
    let needle = query.trim().to_lowercase();
    let mut view = FilteredView::default();

    for entry in entries.iter().filter(|&e| matches(e, &needle)) {
        if entry.is_favorite() {
            view.favorites.push(entry.clone());
        } else {
            view.others.push(entry.clone());
        }
    }

    view
}

fn matches<T: Searchable>(entry: &T, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    entry
        .search_text()
        .is_some_and(|text| text.to_lowercase().contains(needle))
}
