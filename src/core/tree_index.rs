/*
 * The tree index discovers the folders and allow-listed files below a root and
 * caches, per folder, the files directly inside it and its direct subfolders.
 *
 * Two traversal modes share the same listing primitive (`scan_shallow`):
 * - shallow: materialises exactly one folder level, used while rendering and
 *   when a folder is expanded;
 * - deep: materialises a whole subtree unconditionally, used by rescans, folder
 *   toggles and aggregate recomputation, so that selection correctness never
 *   depends on which folders happen to be expanded.
 *
 * A cached folder is never listed again until `invalidate` drops the whole
 * cache; there is no per-folder invalidation.
 */
use super::file_system::{FileSystemReaderOperations, Result};
use super::models::ExtensionFilter;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/*
 * The result of a full rescan: every allow-listed file observed and the number
 * of folders that were materialised.
 */
#[derive(Debug, Clone, Default)]
pub struct ScanSnapshot {
    pub files: HashSet<PathBuf>,
    pub folder_count: usize,
}

pub struct TreeIndex {
    root: PathBuf,
    filter: ExtensionFilter,
    folder_files: HashMap<PathBuf, Vec<PathBuf>>,
    folder_subdirs: HashMap<PathBuf, Vec<PathBuf>>,
}

impl TreeIndex {
    pub fn new(root: PathBuf, filter: ExtensionFilter) -> Self {
        TreeIndex {
            root,
            filter,
            folder_files: HashMap::new(),
            folder_subdirs: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filter(&self) -> &ExtensionFilter {
        &self.filter
    }

    pub fn invalidate(&mut self) {
        log::trace!(
            "TreeIndex: Invalidating cache ({} folders).",
            self.folder_files.len()
        );
        self.folder_files.clear();
        self.folder_subdirs.clear();
    }

    pub fn is_scanned(&self, folder: &Path) -> bool {
        self.folder_files.contains_key(folder)
    }

    /*
     * Lists one folder level and caches the result. Returns `Ok(false)` without
     * touching the file system when the folder is already cached.
     */
    pub fn scan_shallow(
        &mut self,
        fs: &dyn FileSystemReaderOperations,
        folder: &Path,
    ) -> Result<bool> {
        if self.is_scanned(folder) {
            return Ok(false);
        }
        let subdirs = fs.list_directories(folder)?;
        let files: Vec<PathBuf> = fs
            .list_files(folder)?
            .into_iter()
            .filter(|f| self.filter.matches(f))
            .collect();
        log::trace!(
            "TreeIndex: Scanned {folder:?}: {} matching files, {} subfolders.",
            files.len(),
            subdirs.len()
        );
        self.folder_files.insert(folder.to_path_buf(), files);
        self.folder_subdirs.insert(folder.to_path_buf(), subdirs);
        Ok(true)
    }

    /*
     * Materialises `folder` and everything below it. A subfolder that cannot be
     * listed (typically because it vanished after its parent was listed) is
     * dropped from its parent for this pass instead of failing the whole scan.
     * Only a failure to list `folder` itself is returned as an error.
     */
    pub fn scan_deep(&mut self, fs: &dyn FileSystemReaderOperations, folder: &Path) -> Result<()> {
        self.scan_shallow(fs, folder)?;
        let subdirs = self.subfolders_of(folder).to_vec();
        for sub in subdirs {
            if let Err(e) = self.scan_deep(fs, &sub) {
                log::warn!("TreeIndex: Skipping folder {sub:?} for this scan pass: {e}");
                self.forget_subfolder(folder, &sub);
            }
        }
        Ok(())
    }

    /*
     * Drops the whole cache and deep-scans from the root. The returned snapshot
     * is what the selection store is pruned against.
     */
    pub fn rescan(&mut self, fs: &dyn FileSystemReaderOperations) -> Result<ScanSnapshot> {
        self.invalidate();
        let root = self.root.clone();
        self.scan_deep(fs, &root)?;
        let snapshot = ScanSnapshot {
            files: self.all_files(),
            folder_count: self.folder_files.len(),
        };
        log::debug!(
            "TreeIndex: Rescan of {:?} found {} files in {} folders.",
            self.root,
            snapshot.files.len(),
            snapshot.folder_count
        );
        Ok(snapshot)
    }

    fn forget_subfolder(&mut self, parent: &Path, sub: &Path) {
        if let Some(subdirs) = self.folder_subdirs.get_mut(parent) {
            subdirs.retain(|d| d != sub);
        }
    }

    pub fn files_in(&self, folder: &Path) -> &[PathBuf] {
        self.folder_files
            .get(folder)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn subfolders_of(&self, folder: &Path) -> &[PathBuf] {
        self.folder_subdirs
            .get(folder)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every cached file below `folder`, in discovery order (direct files first).
    pub fn files_under(&self, folder: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut stack = vec![folder.to_path_buf()];
        while let Some(current) = stack.pop() {
            out.extend(self.files_in(&current).iter().cloned());
            for sub in self.subfolders_of(&current).iter().rev() {
                stack.push(sub.clone());
            }
        }
        out
    }

    pub fn all_files(&self) -> HashSet<PathBuf> {
        self.folder_files.values().flatten().cloned().collect()
    }

    pub fn contains_file(&self, path: &Path) -> bool {
        path.parent()
            .is_some_and(|parent| self.files_in(parent).iter().any(|f| f == path))
    }

    pub fn contains_folder(&self, path: &Path) -> bool {
        if path == self.root || self.is_scanned(path) {
            return true;
        }
        path.parent()
            .is_some_and(|parent| self.subfolders_of(parent).iter().any(|d| d == path))
    }

    /*
     * The visibility rule: a folder is shown only if it holds a matching file
     * directly, or some descendant folder (recursively, as far as the cache
     * knows) does.
     */
    pub fn has_visible_content(&self, folder: &Path) -> bool {
        if !self.files_in(folder).is_empty() {
            return true;
        }
        self.subfolders_of(folder)
            .iter()
            .any(|sub| self.has_visible_content(sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::MockFileSystem;

    fn sample_fs() -> MockFileSystem {
        let fs = MockFileSystem::new("/proj");
        fs.add_file("a/x.cs", "one\ntwo\n");
        fs.add_file("a/y.cs", "1\n2\n3\n");
        fs.add_file("a/notes.txt", "ignored");
        fs.add_file("a/deep/inner/w.uss", "w");
        fs.add_file("b/z.uxml", "z");
        fs.add_dir("empty/nested");
        fs
    }

    #[test]
    fn test_shallow_scan_materializes_one_level_only() -> Result<()> {
        // Arrange
        let fs = sample_fs();
        let mut index = TreeIndex::new(fs.root(), ExtensionFilter::default());

        // Act
        let newly = index.scan_shallow(&fs, &fs.path("a"))?;

        // Assert
        assert!(newly);
        assert_eq!(index.files_in(&fs.path("a")), &[fs.path("a/x.cs"), fs.path("a/y.cs")]);
        assert_eq!(index.subfolders_of(&fs.path("a")), &[fs.path("a/deep")]);
        assert!(!index.is_scanned(&fs.path("a/deep")));
        Ok(())
    }

    #[test]
    fn test_cached_folder_is_not_listed_again_until_invalidated() -> Result<()> {
        let fs = sample_fs();
        let mut index = TreeIndex::new(fs.root(), ExtensionFilter::default());
        index.scan_shallow(&fs, &fs.path("a"))?;
        let calls_after_first = fs.list_call_count();

        assert!(!index.scan_shallow(&fs, &fs.path("a"))?);
        assert_eq!(fs.list_call_count(), calls_after_first);

        index.invalidate();
        assert!(index.scan_shallow(&fs, &fs.path("a"))?);
        assert!(fs.list_call_count() > calls_after_first);
        Ok(())
    }

    #[test]
    fn test_rescan_deep_scans_every_folder_and_filters_extensions() -> Result<()> {
        let fs = sample_fs();
        let mut index = TreeIndex::new(fs.root(), ExtensionFilter::default());

        let snapshot = index.rescan(&fs)?;

        let expected: HashSet<PathBuf> = ["a/x.cs", "a/y.cs", "a/deep/inner/w.uss", "b/z.uxml"]
            .iter()
            .map(|p| fs.path(p))
            .collect();
        assert_eq!(snapshot.files, expected);
        // root, a, a/deep, a/deep/inner, b, empty, empty/nested
        assert_eq!(snapshot.folder_count, 7);
        assert!(index.is_scanned(&fs.path("a/deep/inner")));
        Ok(())
    }

    #[test]
    fn test_visibility_hides_branches_without_matching_files() -> Result<()> {
        let fs = sample_fs();
        fs.add_file("docs/readme.txt", "not allow-listed");
        let mut index = TreeIndex::new(fs.root(), ExtensionFilter::default());
        index.rescan(&fs)?;

        assert!(index.has_visible_content(&fs.root()));
        assert!(index.has_visible_content(&fs.path("a/deep")));
        assert!(!index.has_visible_content(&fs.path("empty")));
        assert!(!index.has_visible_content(&fs.path("docs")));
        Ok(())
    }

    #[test]
    fn test_vanished_subfolder_is_skipped_not_fatal() -> Result<()> {
        let fs = sample_fs();
        fs.fail_listing("a/deep");
        let mut index = TreeIndex::new(fs.root(), ExtensionFilter::default());

        let snapshot = index.rescan(&fs)?;

        assert!(!snapshot.files.contains(&fs.path("a/deep/inner/w.uss")));
        assert!(snapshot.files.contains(&fs.path("a/x.cs")));
        assert!(index.subfolders_of(&fs.path("a")).is_empty());
        Ok(())
    }

    #[test]
    fn test_rescan_of_missing_root_is_an_error() {
        let fs = MockFileSystem::new("/proj");
        let mut index = TreeIndex::new(PathBuf::from("/elsewhere"), ExtensionFilter::default());
        assert!(index.rescan(&fs).is_err());
    }

    #[test]
    fn test_files_under_and_membership_queries() -> Result<()> {
        let fs = sample_fs();
        let mut index = TreeIndex::new(fs.root(), ExtensionFilter::default());
        index.rescan(&fs)?;

        let under_a = index.files_under(&fs.path("a"));

        assert_eq!(
            under_a,
            vec![fs.path("a/x.cs"), fs.path("a/y.cs"), fs.path("a/deep/inner/w.uss")]
        );
        assert!(index.contains_file(&fs.path("b/z.uxml")));
        assert!(!index.contains_file(&fs.path("a/notes.txt")));
        assert!(index.contains_folder(&fs.path("empty/nested")));
        assert!(index.contains_folder(&fs.root()));
        assert!(!index.contains_folder(&fs.path("a/x.cs")));
        Ok(())
    }
}
