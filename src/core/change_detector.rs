/*
 * Change detection is split in two halves that never run I/O together:
 *
 * - `ChangeSignal` is a dirty flag. Notification handlers only raise it; any
 *   number of events between two ticks collapse into one pending rescan.
 * - `FsChangeWatcher` subscribes to the file system below the workspace root
 *   (via `notify`) and raises the signal for events that can affect the tree.
 *   Dropping the watcher unsubscribes.
 *
 * The periodic tick that consumes the flag lives in the tree manager.
 */
use super::models::ExtensionFilter;
use notify::event::{CreateKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct ChangeSignal {
    dirty: Arc<AtomicBool>,
}

impl ChangeSignal {
    pub fn new() -> Self {
        ChangeSignal::default()
    }

    /// Safe to call from any thread; never does file system work.
    pub fn notify(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Clears the flag and reports whether it was set.
    pub fn take(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }
}

/*
 * Whether a watcher event could change what the tree index would observe.
 * Pure access events are ignored, and at least one path must lie under `root`.
 * Removals, renames and folder creations count whatever the name looks like,
 * since a folder may carry a dot (`Game.Scripts`). Other events need a path
 * with an allowed extension or with no extension at all.
 */
pub fn is_relevant_event(event: &Event, root: &Path, filter: &ExtensionFilter) -> bool {
    let any_name = match event.kind {
        EventKind::Access(_) => return false,
        EventKind::Remove(_)
        | EventKind::Modify(ModifyKind::Name(_))
        | EventKind::Create(CreateKind::Folder) => true,
        _ => false,
    };
    event.paths.iter().any(|path| {
        path.starts_with(root)
            && (any_name || path.extension().is_none() || filter.matches(path))
    })
}

pub struct FsChangeWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl FsChangeWatcher {
    pub fn start(
        root: &Path,
        filter: ExtensionFilter,
        signal: ChangeSignal,
    ) -> notify::Result<Self> {
        let watched_root = root.to_path_buf();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_relevant_event(&event, &watched_root, &filter) {
                    log::trace!("FsChangeWatcher: {:?} on {:?}", event.kind, event.paths);
                    signal.notify();
                }
            }
            Err(e) => log::warn!("FsChangeWatcher: Watch error: {e}"),
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        log::debug!("FsChangeWatcher: Watching {root:?} recursively.");
        Ok(FsChangeWatcher {
            root: root.to_path_buf(),
            _watcher: watcher,
        })
    }
}

impl Drop for FsChangeWatcher {
    fn drop(&mut self) {
        log::debug!("FsChangeWatcher: Stopped watching {:?}.", self.root);
    }
}
