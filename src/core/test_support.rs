/*
 * In-memory collaborators for unit tests: a mock file system whose tree can be
 * edited between calls (to simulate external changes), and a key-value store
 * backed by a map.
 */
use super::file_system::{FileSystemError, FileSystemReaderOperations, Result};
use super::persistence::{KeyValueStoreOperations, PersistenceError};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct MockTree {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, String>,
    unreadable: HashSet<PathBuf>,
    failing_listings: HashSet<PathBuf>,
}

pub struct MockFileSystem {
    root: PathBuf,
    tree: Mutex<MockTree>,
    list_calls: AtomicUsize,
    read_calls: AtomicUsize,
}

impl MockFileSystem {
    pub fn new(root: &str) -> Self {
        let root = PathBuf::from(root);
        let mut tree = MockTree::default();
        tree.dirs.insert(root.clone());
        MockFileSystem {
            root,
            tree: Mutex::new(tree),
            list_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.root.clone()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    fn add_dir_locked(tree: &mut MockTree, root: &Path, dir: &Path) {
        let mut current = Some(dir);
        while let Some(d) = current {
            if !d.starts_with(root) {
                break;
            }
            tree.dirs.insert(d.to_path_buf());
            current = d.parent();
        }
    }

    pub fn add_dir(&self, rel: &str) {
        let mut tree = self.tree.lock().unwrap();
        Self::add_dir_locked(&mut tree, &self.root, &self.root.join(rel));
    }

    pub fn add_file(&self, rel: &str, content: &str) {
        let path = self.root.join(rel);
        let mut tree = self.tree.lock().unwrap();
        if let Some(parent) = path.parent() {
            Self::add_dir_locked(&mut tree, &self.root, parent);
        }
        tree.files.insert(path, content.to_string());
    }

    /// Removes a file, or a folder together with everything below it.
    pub fn remove(&self, rel: &str) {
        let path = self.root.join(rel);
        let mut tree = self.tree.lock().unwrap();
        tree.files.retain(|p, _| !p.starts_with(&path));
        tree.dirs.retain(|d| !d.starts_with(&path));
    }

    pub fn make_unreadable(&self, rel: &str) {
        self.tree.lock().unwrap().unreadable.insert(self.root.join(rel));
    }

    /// The folder stays visible in its parent's listing but cannot itself be listed.
    pub fn fail_listing(&self, rel: &str) {
        self.tree
            .lock()
            .unwrap()
            .failing_listings
            .insert(self.root.join(rel));
    }

    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn read_call_count(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    fn check_listable(tree: &MockTree, path: &Path) -> Result<()> {
        if !tree.dirs.contains(path) {
            return Err(FileSystemError::InvalidPath(path.to_path_buf()));
        }
        if tree.failing_listings.contains(path) {
            return Err(FileSystemError::Io(
                io::Error::new(io::ErrorKind::NotFound, "vanished"),
                path.to_path_buf(),
            ));
        }
        Ok(())
    }
}

impl FileSystemReaderOperations for MockFileSystem {
    fn list_directories(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let tree = self.tree.lock().unwrap();
        Self::check_listable(&tree, path)?;
        Ok(tree
            .dirs
            .iter()
            .filter(|d| d.parent() == Some(path))
            .cloned()
            .collect())
    }

    fn list_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let tree = self.tree.lock().unwrap();
        Self::check_listable(&tree, path)?;
        Ok(tree
            .files
            .keys()
            .filter(|f| f.parent() == Some(path))
            .cloned()
            .collect())
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let tree = self.tree.lock().unwrap();
        if tree.unreadable.contains(path) {
            return Err(FileSystemError::Io(
                io::Error::new(io::ErrorKind::PermissionDenied, "unreadable"),
                path.to_path_buf(),
            ));
        }
        tree.files.get(path).cloned().ok_or_else(|| {
            FileSystemError::Io(
                io::Error::new(io::ErrorKind::NotFound, "no such file"),
                path.to_path_buf(),
            )
        })
    }

    fn read_lines(&self, path: &Path) -> Result<Vec<String>> {
        Ok(self
            .read_text(path)?
            .lines()
            .map(str::to_string)
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        MemoryKeyValueStore::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl KeyValueStoreOperations for MemoryKeyValueStore {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, PersistenceError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> std::result::Result<(), PersistenceError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
