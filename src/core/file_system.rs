use glob::Pattern;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/*
 * This module provides the engine's only window onto the file system: listing
 * the direct subdirectories and files of a directory, and reading file content
 * either as one string or as lines. It defines errors specific to these
 * operations, a trait `FileSystemReaderOperations` so the engine can be driven
 * by an in-memory tree in tests, and a concrete implementation
 * `CoreFileSystemReader` backed by `walkdir`.
 */

/*
 * Defines custom error types for file system operations.
 * `Io` carries the path that failed, which is what callers log when they skip
 * an entry that vanished between listing and reading.
 */
#[derive(Debug)]
pub enum FileSystemError {
    Io(io::Error, PathBuf),
    InvalidPath(PathBuf),
}

impl FileSystemError {
    pub fn path(&self) -> &Path {
        match self {
            FileSystemError::Io(_, p) => p,
            FileSystemError::InvalidPath(p) => p,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            FileSystemError::Io(e, _) => e.kind() == io::ErrorKind::NotFound,
            FileSystemError::InvalidPath(_) => true,
        }
    }
}

impl std::fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSystemError::Io(e, p) => write!(f, "I/O error for {p:?}: {e}"),
            FileSystemError::InvalidPath(p) => write!(f, "Invalid path: {p:?}"),
        }
    }
}

impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileSystemError::Io(e, _) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FileSystemError>;

/*
 * Defines the file system primitives the engine depends on.
 * Listings return direct children only, in a stable order. Any of these calls
 * may fail with `FileSystemError::Io` if the path vanished after it was listed;
 * callers treat that as a skip, never as a reason to abort a whole scan or merge.
 */
pub trait FileSystemReaderOperations: Send + Sync {
    fn list_directories(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn list_files(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn read_text(&self, path: &Path) -> Result<String>;
    fn read_lines(&self, path: &Path) -> Result<Vec<String>>;
}

/*
 * The core implementation of `FileSystemReaderOperations`.
 * Entries are listed one level deep with `walkdir`, sorted by file name so
 * that discovery order is reproducible across platforms. Entries whose name
 * matches one of the exclude patterns are never listed.
 *
 * Symbolic links are followed and listed under their own name. A linked
 * folder whose target is the listed folder or one of its ancestors would make
 * the tree infinite, so it is skipped with a warning, as are dangling links.
 */
pub struct CoreFileSystemReader {
    exclude_patterns: Vec<Pattern>,
}

impl CoreFileSystemReader {
    pub fn new() -> Self {
        CoreFileSystemReader {
            exclude_patterns: Vec::new(),
        }
    }

    /*
     * Creates a reader that skips entries whose file name matches any of the
     * given glob patterns. Invalid patterns are logged and ignored.
     */
    pub fn with_exclude_patterns(patterns: &[String]) -> Self {
        let mut compiled = Vec::new();
        for raw in patterns {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            match Pattern::new(trimmed) {
                Ok(p) => compiled.push(p),
                Err(e) => {
                    log::warn!("FileSystemReader: Invalid exclude pattern '{trimmed}': {e}");
                }
            }
        }
        CoreFileSystemReader {
            exclude_patterns: compiled,
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.exclude_patterns.iter().any(|p| p.matches(name))
    }

    fn list_entries(&self, path: &Path, want_dirs: bool) -> Result<Vec<PathBuf>> {
        if !path.is_dir() {
            return Err(FileSystemError::InvalidPath(path.to_path_buf()));
        }
        let mut entries = Vec::new();
        let walker = WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        for entry_result in walker {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    // A single unreadable entry does not invalidate the listing.
                    log::warn!("FileSystemReader: Skipping entry under {path:?}: {e}");
                    continue;
                }
            };
            let is_dir = entry.file_type().is_dir();
            if is_dir != want_dirs {
                continue;
            }
            if !want_dirs && !entry.file_type().is_file() {
                continue;
            }
            if is_dir && entry.path_is_symlink() {
                match fs::canonicalize(entry.path()) {
                    Ok(target) if is_cyclic_link(path, &target) => {
                        log::warn!(
                            "FileSystemReader: Skipping {:?}, it links back to {target:?}.",
                            entry.path()
                        );
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("FileSystemReader: Cannot resolve {:?}: {e}", entry.path());
                        continue;
                    }
                }
            }
            let entry_path = entry.into_path();
            if self.is_excluded(&entry_path) {
                log::trace!("FileSystemReader: Excluded by pattern: {entry_path:?}");
                continue;
            }
            entries.push(entry_path);
        }
        Ok(entries)
    }
}

/// True when `target` is the resolved form of `listing` or of any of its ancestors.
fn is_cyclic_link(listing: &Path, target: &Path) -> bool {
    listing
        .ancestors()
        .any(|ancestor| fs::canonicalize(ancestor).is_ok_and(|resolved| resolved == target))
}

impl Default for CoreFileSystemReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystemReaderOperations for CoreFileSystemReader {
    fn list_directories(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.list_entries(path, true)
    }

    fn list_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.list_entries(path, false)
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| FileSystemError::Io(e, path.to_path_buf()))
    }

    /*
     * Reads a file and splits it into lines. A trailing newline does not
     * produce an extra empty line, and `\r\n` endings are stripped.
     */
    fn read_lines(&self, path: &Path) -> Result<Vec<String>> {
        let text = self.read_text(path)?;
        Ok(text.lines().map(str::to_string).collect())
    }
}
