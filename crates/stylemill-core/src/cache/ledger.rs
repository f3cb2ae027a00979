use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Record of the files each source transitively includes
///
/// A source with no entry is "unresolved": it has never compiled
/// successfully, or a compile for it is in flight. The ledger lives only as
/// long as the middleware that owns it.
#[derive(Debug, Default)]
pub struct ImportLedger {
    entries: RwLock<FxHashMap<PathBuf, Vec<PathBuf>>>,
}

impl ImportLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Includes recorded for `source`, or `None` when unresolved
    pub fn includes(&self, source: &Path) -> Option<Vec<PathBuf>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .cloned()
    }

    pub fn is_resolved(&self, source: &Path) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(source)
    }

    /// Record the include list of a completed compile, replacing any prior value
    pub fn record(&self, source: PathBuf, includes: Vec<PathBuf>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source, includes);
    }

    /// Mark `source` unresolved ahead of a compile
    pub fn clear(&self, source: &Path) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(source);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
