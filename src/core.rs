/*
 * This module consolidates the core, platform-agnostic logic of the application:
 * the tree index, the selection store and its folder aggregates, change
 * detection, persistence, and the merge engine, all owned by `TreeManager`.
 * Collaborators that touch the outside world (file system, key-value storage,
 * clipboard, configuration) are abstracted behind `...Operations` traits with a
 * `Core...` production implementation each.
 */
pub mod archiver;
pub mod change_detector;
pub mod clipboard;
pub mod config;
pub mod file_system;
pub mod folder_aggregate;
pub mod models;
pub mod path_utils;
pub mod persistence;
pub mod selection_store;
pub mod tree_index;
pub mod tree_manager;

#[cfg(test)]
mod test_support;

// Re-export key structures and enums
pub use models::{TreeRow, TreeRowKind};

pub use file_system::CoreFileSystemReader;

pub use archiver::{ArchiverOperations, CombineOutcome, CoreArchiver};

pub use change_detector::FsChangeWatcher;

pub use clipboard::{ClipboardSinkOperations, CoreClipboardSink};

pub use config::{APP_NAME, AppConfig, ConfigManagerOperations, CoreConfigManager};

pub use persistence::CoreKeyValueStore;

pub use tree_manager::{SelectionError, TreeManager};
