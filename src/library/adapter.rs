use super::models::Searchable;
use tokio::sync::watch;

/// Holds the authoritative snapshot of a collection plus a filtered view of
/// it, selected by a case-insensitive substring query.
///
/// The instance is either **unfiltered** (the view equals the snapshot) or
/// **filtered** by the current query. The view is recomputed from scratch on
/// every query change and every snapshot replacement, never patched
/// incrementally, and always preserves the snapshot's relative order.
///
/// Mutation methods are not reentrant and are meant to be called from the
/// single owner of the list (typically the UI task driving it).
pub struct FilterableList<T> {
    snapshot: Vec<T>,
    filtered: Vec<T>,
    query: Option<String>,
    generation: u64,
    changes: watch::Sender<u64>,
}

impl<T> FilterableList<T>
where
    T: Searchable + Clone,
{
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            snapshot: Vec::new(),
            filtered: Vec::new(),
            query: None,
            generation: 0,
            changes,
        }
    }

    pub fn with_snapshot(snapshot: Vec<T>) -> Self {
        let mut list = Self::new();
        list.on_snapshot_replaced(snapshot);
        list
    }

    /// Sets the filter query. An empty query returns the list to the
    /// unfiltered state; anything else selects records whose search text
    /// contains the query, case-insensitively.
    pub fn set_query(&mut self, query: &str) {
        self.query = if query.is_empty() {
            None
        } else {
            Some(query.to_lowercase())
        };
        self.recompute();
    }

    /// Replaces the underlying snapshot, re-applying the current query.
    pub fn on_snapshot_replaced(&mut self, snapshot: Vec<T>) {
        self.snapshot = snapshot;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.filtered = match &self.query {
            None => self.snapshot.clone(),
            Some(query) => self
                .snapshot
                .iter()
                .filter(|record| record.search_text().to_lowercase().contains(query.as_str()))
                .cloned()
                .collect(),
        };
        self.generation += 1;
        // Full-list invalidation: observers re-read everything.
        let _ = self.changes.send(self.generation);
    }

    /// Number of records in the current view.
    pub fn count(&self) -> usize {
        self.filtered.len()
    }

    /// The record at `index` in the current view.
    ///
    /// # Panics
    ///
    /// Panics if `index >= count()`; out-of-range access is a programming
    /// error, not a recoverable condition.
    pub fn record_at(&self, index: usize) -> &T {
        &self.filtered[index]
    }

    /// The current view in snapshot order.
    pub fn records(&self) -> &[T] {
        &self.filtered
    }

    pub fn is_filtered(&self) -> bool {
        self.query.is_some()
    }

    /// A receiver bumped on every view recomputation.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

impl<T> Default for FilterableList<T>
where
    T: Searchable + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
