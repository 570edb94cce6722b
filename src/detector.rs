//! Change detection between consecutive snapshots.

use crate::record::Snapshot;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Change {
    Unchanged,
    Changed(Arc<Snapshot>),
}

impl Change {
    pub fn is_changed(&self) -> bool {
        matches!(self, Change::Changed(_))
    }
}

/// Remembers the last published snapshot and suppresses repeats.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_published: Option<Arc<Snapshot>>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `snapshot` with the last published one, ignoring row order.
    ///
    /// The first snapshot ever applied always counts as a change, even when
    /// it has no rows.
    pub fn apply(&mut self, snapshot: Snapshot) -> Change {
        if let Some(last) = &self.last_published {
            if last.same_content(&snapshot) {
                return Change::Unchanged;
            }
        }
        let snapshot = Arc::new(snapshot);
        self.last_published = Some(Arc::clone(&snapshot));
        Change::Changed(snapshot)
    }

    pub fn last_published(&self) -> Option<&Arc<Snapshot>> {
        self.last_published.as_ref()
    }
}
