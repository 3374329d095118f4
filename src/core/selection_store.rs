use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/*
 * Sparse mapping from file path to its selected flag. A path that was never
 * observed is simply absent and reads as unselected. Keys are kept sorted by
 * path, which is also the order the merge walks them in.
 *
 * The store knows nothing about folders: folder toggles are expanded into
 * per-file `set` calls by the tree manager, which owns the tree index.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionStore {
    states: BTreeMap<PathBuf, bool>,
}

impl SelectionStore {
    pub fn new() -> Self {
        SelectionStore::default()
    }

    /// Records a newly discovered file as unselected; existing entries are kept.
    pub fn observe(&mut self, path: &Path) {
        self.states.entry(path.to_path_buf()).or_insert(false);
    }

    pub fn set(&mut self, path: &Path, selected: bool) {
        self.states.insert(path.to_path_buf(), selected);
    }

    pub fn is_selected(&self, path: &Path) -> bool {
        self.states.get(path).copied().unwrap_or(false)
    }

    #[cfg(test)]
    pub fn contains(&self, path: &Path) -> bool {
        self.states.contains_key(path)
    }

    /*
     * Drops every entry whose path was not seen by the latest scan. Returns the
     * number of entries removed.
     */
    pub fn prune(&mut self, current_paths: &HashSet<PathBuf>) -> usize {
        let before = self.states.len();
        self.states.retain(|path, _| current_paths.contains(path));
        let removed = before - self.states.len();
        if removed > 0 {
            log::debug!("SelectionStore: Pruned {removed} stale entries.");
        }
        removed
    }

    pub fn selected_paths(&self) -> impl Iterator<Item = &Path> {
        self.states
            .iter()
            .filter(|(_, selected)| **selected)
            .map(|(path, _)| path.as_path())
    }

    #[cfg(test)]
    pub fn selected_count(&self) -> usize {
        self.states.values().filter(|s| **s).count()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn as_map(&self) -> &BTreeMap<PathBuf, bool> {
        &self.states
    }

    pub fn replace_all(&mut self, states: BTreeMap<PathBuf, bool>) {
        self.states = states;
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_path_reads_unselected() {
        let store = SelectionStore::new();
        assert!(!store.is_selected(Path::new("/p/a.cs")));
        assert!(!store.contains(Path::new("/p/a.cs")));
    }

    #[test]
    fn test_observe_does_not_override_existing_selection() {
        let mut store = SelectionStore::new();
        let path = Path::new("/p/a.cs");
        store.set(path, true);

        store.observe(path);
        store.observe(Path::new("/p/b.cs"));

        assert!(store.is_selected(path));
        assert!(store.contains(Path::new("/p/b.cs")));
        assert!(!store.is_selected(Path::new("/p/b.cs")));
    }

    #[test]
    fn test_prune_removes_only_stale_keys() {
        // Arrange
        let mut store = SelectionStore::new();
        store.set(Path::new("/p/keep.cs"), true);
        store.set(Path::new("/p/gone.cs"), true);
        store.set(Path::new("/p/also_gone.cs"), false);
        let current: HashSet<PathBuf> = [PathBuf::from("/p/keep.cs")].into_iter().collect();

        // Act
        let removed = store.prune(&current);

        // Assert
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
        assert!(store.is_selected(Path::new("/p/keep.cs")));
        assert!(!store.contains(Path::new("/p/gone.cs")));
    }

    #[test]
    fn test_selected_paths_are_sorted_by_path() {
        let mut store = SelectionStore::new();
        store.set(Path::new("/p/b/z.uxml"), true);
        store.set(Path::new("/p/a/y.cs"), false);
        store.set(Path::new("/p/a/x.cs"), true);

        let selected: Vec<&Path> = store.selected_paths().collect();

        assert_eq!(selected, vec![Path::new("/p/a/x.cs"), Path::new("/p/b/z.uxml")]);
        assert_eq!(store.selected_count(), 2);
    }
}
