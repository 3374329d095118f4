/*
 * The tree manager is the single owner of the engine's mutable state: the tree
 * index cache, the selection store, the folder aggregate cache and the
 * expansion flags. Presentation code reads through its queries and writes back
 * through its toggle operations; nothing else holds references into the state.
 *
 * Lifecycle:
 * - `activate` restores persisted selection and expansion, then rescans.
 * - `tick` consumes the change signal and rescans at most once per call.
 * - `deactivate` flushes both mappings to the key-value store.
 *
 * Every mutation runs to completion before returning, on the caller's thread.
 */
use super::archiver::{ArchiverOperations, CombineOutcome};
use super::change_detector::ChangeSignal;
use super::file_system::{self, FileSystemReaderOperations};
use super::folder_aggregate::FolderAggregateCache;
use super::models::{
    ExpansionState, ExtensionFilter, PathState, SelectionSummary, TreeRow, TreeRowKind,
};
use super::persistence::{self, KeyValueStoreOperations, PersistenceAdapter};
use super::selection_store::SelectionStore;
use super::tree_index::{ScanSnapshot, TreeIndex};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    UnknownPath(PathBuf),
    NotAFolder(PathBuf),
}

impl std::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionError::UnknownPath(p) => write!(f, "Path is not part of the tree: {p:?}"),
            SelectionError::NotAFolder(p) => write!(f, "Path is a file, not a folder: {p:?}"),
        }
    }
}

impl std::error::Error for SelectionError {}

pub type Result<T> = std::result::Result<T, SelectionError>;

pub struct TreeManager {
    root: PathBuf,
    fs: Box<dyn FileSystemReaderOperations>,
    index: TreeIndex,
    selection: SelectionStore,
    aggregates: FolderAggregateCache,
    expansion: ExpansionState,
    persistence: PersistenceAdapter,
    signal: ChangeSignal,
}

impl TreeManager {
    pub fn new(
        root: PathBuf,
        filter: ExtensionFilter,
        fs: Box<dyn FileSystemReaderOperations>,
    ) -> Self {
        let persistence = PersistenceAdapter::for_workspace(&root);
        TreeManager {
            index: TreeIndex::new(root.clone(), filter),
            root,
            fs,
            selection: SelectionStore::new(),
            aggregates: FolderAggregateCache::new(),
            expansion: ExpansionState::new(),
            persistence,
            signal: ChangeSignal::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filter(&self) -> &ExtensionFilter {
        self.index.filter()
    }

    /*
     * Restores persisted state and performs the first rescan. A mapping that
     * fails to decode is logged and reset to empty; the other mapping and the
     * rest of the activation are unaffected.
     */
    pub fn activate(
        &mut self,
        store: &dyn KeyValueStoreOperations,
    ) -> file_system::Result<ScanSnapshot> {
        log::debug!("TreeManager: Activating for {:?}.", self.root);
        match self.persistence.load_selection(store) {
            Ok(Some(mapping)) => self.selection.replace_all(mapping),
            Ok(None) => {}
            Err(e) => {
                log::error!("TreeManager: Could not restore selection, starting empty: {e}");
                self.selection.clear();
            }
        }
        match self.persistence.load_expansion(store) {
            Ok(Some(mapping)) => self.expansion.replace_all(mapping),
            Ok(None) => {}
            Err(e) => {
                log::error!("TreeManager: Could not restore expansion, starting empty: {e}");
                self.expansion.clear();
            }
        }
        self.rescan()
    }

    pub fn deactivate(&self, store: &dyn KeyValueStoreOperations) -> persistence::Result<()> {
        log::debug!("TreeManager: Deactivating for {:?}.", self.root);
        self.persistence
            .save(store, self.selection.as_map(), self.expansion.as_map())
    }

    /*
     * Rebuilds the tree index from scratch, records newly discovered files as
     * unselected, drops selection entries for files that are gone and
     * recomputes every folder aggregate.
     */
    pub fn rescan(&mut self) -> file_system::Result<ScanSnapshot> {
        let snapshot = self.index.rescan(self.fs.as_ref())?;
        for file in &snapshot.files {
            self.selection.observe(file);
        }
        self.selection.prune(&snapshot.files);
        self.aggregates.rebuild_all(&self.index, &self.selection);
        log::info!(
            "TreeManager: Rescanned {:?}: {} files in {} folders.",
            self.root,
            snapshot.files.len(),
            snapshot.folder_count
        );
        Ok(snapshot)
    }

    pub fn change_signal(&self) -> ChangeSignal {
        self.signal.clone()
    }

    /*
     * One polling cycle. Returns `Ok(true)` when a pending change was consumed
     * and a rescan ran.
     */
    pub fn tick(&mut self) -> file_system::Result<bool> {
        if !self.signal.take() {
            return Ok(false);
        }
        log::debug!("TreeManager: Change detected, rescanning.");
        self.rescan()?;
        Ok(true)
    }

    pub fn toggle_file(&mut self, path: &Path, selected: bool) -> Result<()> {
        if !self.index.contains_file(path) {
            return Err(SelectionError::UnknownPath(path.to_path_buf()));
        }
        self.selection.set(path, selected);
        self.aggregates
            .recompute_ancestors(&self.index, &self.selection, path);
        log::debug!("TreeManager: File {path:?} selected={selected}.");
        Ok(())
    }

    /*
     * Sets every file below `folder` to `selected`. The subtree is scanned
     * deeply first so collapsed or never-displayed subfolders are included.
     */
    pub fn toggle_folder(&mut self, folder: &Path, selected: bool) -> Result<()> {
        if !self.index.contains_folder(folder) {
            if self.index.contains_file(folder) {
                return Err(SelectionError::NotAFolder(folder.to_path_buf()));
            }
            return Err(SelectionError::UnknownPath(folder.to_path_buf()));
        }
        if let Err(e) = self.index.scan_deep(self.fs.as_ref(), folder) {
            log::warn!("TreeManager: Could not fully scan {folder:?}: {e}");
        }
        let files = self.index.files_under(folder);
        for file in &files {
            self.selection.set(file, selected);
        }
        self.aggregates
            .recompute_folder(&self.index, &self.selection, folder);
        log::debug!(
            "TreeManager: Folder {folder:?} selected={selected} ({} files).",
            files.len()
        );
        Ok(())
    }

    /// Dispatches to `toggle_folder` or `toggle_file` depending on what `path` is.
    pub fn toggle(&mut self, path: &Path, selected: bool) -> Result<()> {
        if self.index.contains_folder(path) {
            self.toggle_folder(path, selected)
        } else {
            self.toggle_file(path, selected)
        }
    }

    pub fn is_selected(&self, path: &Path) -> bool {
        self.selection.is_selected(path)
    }

    pub fn is_folder_selected(&self, folder: &Path) -> bool {
        self.aggregates.is_all_selected(folder)
    }

    #[cfg(test)]
    pub fn selection(&self) -> &SelectionStore {
        &self.selection
    }

    pub fn selected_paths(&self) -> Vec<PathBuf> {
        self.selection
            .selected_paths()
            .map(Path::to_path_buf)
            .collect()
    }

    /// Expanded flag as displayed; folders never displayed read as expanded.
    pub fn is_expanded(&self, folder: &Path) -> bool {
        self.expansion.get(folder).unwrap_or(true)
    }

    #[cfg(test)]
    pub fn expansion(&self) -> &std::collections::BTreeMap<PathBuf, bool> {
        self.expansion.as_map()
    }

    /// Selection state of one indexed file or folder.
    pub fn path_state(&self, path: &Path) -> Result<PathState> {
        if self.index.contains_folder(path) {
            Ok(PathState::Folder {
                all_selected: self.is_folder_selected(path),
                expanded: self.is_expanded(path),
            })
        } else if self.index.contains_file(path) {
            Ok(PathState::File {
                selected: self.is_selected(path),
            })
        } else {
            Err(SelectionError::UnknownPath(path.to_path_buf()))
        }
    }

    /*
     * Records the folder's expanded flag. Expanding materialises one level of
     * the folder if the index has not cached it yet; newly seen files enter the
     * selection store unselected.
     */
    pub fn set_expanded(&mut self, folder: &Path, expanded: bool) -> Result<()> {
        if !self.index.contains_folder(folder) {
            return Err(SelectionError::UnknownPath(folder.to_path_buf()));
        }
        self.expansion.set(folder, expanded);
        if expanded {
            self.materialize_level(folder);
        }
        Ok(())
    }

    fn materialize_level(&mut self, folder: &Path) {
        match self.index.scan_shallow(self.fs.as_ref(), folder) {
            Ok(true) => {
                for file in self.index.files_in(folder) {
                    self.selection.observe(file);
                }
                self.aggregates
                    .recompute_from(&self.index, &self.selection, folder);
            }
            Ok(false) => {}
            Err(e) => log::warn!("TreeManager: Could not list {folder:?}: {e}"),
        }
    }

    /*
     * The presentation model: the root row followed by its visible
     * descendants, depth first, subfolders before files. Collapsed folders
     * contribute their own row only. Folders with no allow-listed file anywhere
     * below them are hidden, the root included: an empty workspace has no rows.
     * The first display of a folder records its expansion entry.
     */
    pub fn visible_rows(&mut self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        let root = self.root.clone();
        if self.index.is_scanned(&root) && !self.index.has_visible_content(&root) {
            return rows;
        }
        self.push_folder_rows(&root, 0, &mut rows);
        rows
    }

    fn push_folder_rows(&mut self, folder: &Path, depth: usize, rows: &mut Vec<TreeRow>) {
        let expanded = self.expansion.ensure(folder);
        if expanded {
            self.materialize_level(folder);
        }
        rows.push(TreeRow {
            path: folder.to_path_buf(),
            name: row_name(folder),
            depth,
            kind: TreeRowKind::Folder { expanded },
            checked: self.aggregates.is_all_selected(folder),
        });
        if !expanded {
            return;
        }

        let subfolders = self.index.subfolders_of(folder).to_vec();
        for sub in subfolders {
            if self.index.is_scanned(&sub) && !self.index.has_visible_content(&sub) {
                continue;
            }
            self.push_folder_rows(&sub, depth + 1, rows);
        }
        for file in self.index.files_in(folder) {
            rows.push(TreeRow {
                path: file.clone(),
                name: row_name(file),
                depth: depth + 1,
                kind: TreeRowKind::File,
                checked: self.selection.is_selected(file),
            });
        }
    }

    pub fn selection_summary(&self, archiver: &dyn ArchiverOperations) -> SelectionSummary {
        archiver.summarize_selection(&self.selected_paths(), self.fs.as_ref())
    }

    /// Merges the selected files in path order.
    pub fn combine(&self, archiver: &dyn ArchiverOperations) -> CombineOutcome {
        archiver.create_archive_content(&self.selected_paths(), &self.root, self.fs.as_ref())
    }
}

fn row_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
