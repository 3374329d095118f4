/*
 * Derived folder-level state: for each folder, whether every allow-listed file
 * below it (recursively) is selected. Values are never set by the user; they
 * are recomputed from the selection store whenever a file or folder toggle
 * happens, starting at the changed node and walking up to the tree root.
 *
 * Each recomputation evaluates the folder's subtree fresh rather than trusting
 * cached values of its children. A folder the tree index has not scanned is
 * never "all selected"; a scanned folder with no files anywhere below it is
 * vacuously all selected (and invisible in the presentation model).
 */
use super::selection_store::SelectionStore;
use super::tree_index::TreeIndex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct FolderAggregateCache {
    states: HashMap<PathBuf, bool>,
}

impl FolderAggregateCache {
    pub fn new() -> Self {
        FolderAggregateCache::default()
    }

    /// Cached value; folders never computed read as not all selected.
    pub fn is_all_selected(&self, folder: &Path) -> bool {
        self.states.get(folder).copied().unwrap_or(false)
    }

    #[cfg(test)]
    pub fn get(&self, folder: &Path) -> Option<bool> {
        self.states.get(folder).copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn all_selected(index: &TreeIndex, store: &SelectionStore, folder: &Path) -> bool {
        if !index.is_scanned(folder) {
            return false;
        }
        if !index.files_in(folder).iter().all(|f| store.is_selected(f)) {
            return false;
        }
        index
            .subfolders_of(folder)
            .iter()
            .all(|sub| Self::all_selected(index, store, sub))
    }

    /*
     * Recomputes `start` and every ancestor of it up to the index root,
     * overwriting the cached flag at each step. Paths outside the root are
     * ignored.
     */
    pub fn recompute_from(&mut self, index: &TreeIndex, store: &SelectionStore, start: &Path) {
        let root = index.root();
        let mut current = Some(start);
        while let Some(folder) = current {
            if !folder.starts_with(root) {
                break;
            }
            let value = Self::all_selected(index, store, folder);
            self.states.insert(folder.to_path_buf(), value);
            if folder == root {
                break;
            }
            current = folder.parent();
        }
    }

    /// Entry point after a single file changed: starts at the file's folder.
    pub fn recompute_ancestors(
        &mut self,
        index: &TreeIndex,
        store: &SelectionStore,
        changed_path: &Path,
    ) {
        if let Some(parent) = changed_path.parent() {
            self.recompute_from(index, store, parent);
        }
    }

    /*
     * After a folder toggle every folder below it may have flipped as well:
     * rebuilds that subtree bottom-up, then walks the ancestors.
     */
    pub fn recompute_folder(&mut self, index: &TreeIndex, store: &SelectionStore, folder: &Path) {
        self.rebuild_subtree(index, store, folder);
        if folder != index.root() {
            self.recompute_ancestors(index, store, folder);
        }
    }

    /*
     * Rebuilds the whole cache bottom-up in one pass over the cached tree, used
     * after a rescan has replaced the index wholesale.
     */
    pub fn rebuild_all(&mut self, index: &TreeIndex, store: &SelectionStore) {
        self.states.clear();
        let root = index.root().to_path_buf();
        self.rebuild_subtree(index, store, &root);
        log::trace!("FolderAggregateCache: Rebuilt {} folders.", self.states.len());
    }

    fn rebuild_subtree(&mut self, index: &TreeIndex, store: &SelectionStore, folder: &Path) -> bool {
        let mut all = index.is_scanned(folder)
            && index.files_in(folder).iter().all(|f| store.is_selected(f));
        for sub in index.subfolders_of(folder) {
            let sub_all = self.rebuild_subtree(index, store, sub);
            all = all && sub_all;
        }
        self.states.insert(folder.to_path_buf(), all);
        all
    }
}
