/*
 * Persists the selection mapping and the expansion mapping between sessions.
 *
 * Storage is an abstract string key-value store (`KeyValueStoreOperations`).
 * The production store (`CoreKeyValueStore`) keeps all keys in a single JSON
 * document under the per-user local config directory and replaces it with a
 * write-to-temp-then-rename, so every `set` is one atomic put.
 *
 * Each mapping is written under its own key, scoped by the workspace identity
 * hash, as a plain JSON object `{ "<path>": true, ... }`. Loading also accepts
 * the older parallel-list shape `{ "keys": [...], "values": [...] }`; a length
 * mismatch between those lists is a format error for that mapping only.
 */
use super::path_utils;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

const PREFS_FILENAME: &str = "prefs.json";
const KEY_PREFIX: &str = "CodeCombiner";

#[derive(Debug)]
pub enum PersistenceError {
    Io(io::Error),
    Serde(serde_json::Error),
    KeyCountMismatch { keys: usize, values: usize },
    NoConfigDirectory,
}

impl From<io::Error> for PersistenceError {
    fn from(err: io::Error) -> Self {
        PersistenceError::Io(err)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serde(err)
    }
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::Io(e) => write!(f, "Persistence I/O error: {e}"),
            PersistenceError::Serde(e) => write!(f, "Persisted state is malformed: {e}"),
            PersistenceError::KeyCountMismatch { keys, values } => write!(
                f,
                "Persisted state has {keys} keys but {values} values"
            ),
            PersistenceError::NoConfigDirectory => {
                write!(f, "Could not determine a directory for persisted state")
            }
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::Io(e) => Some(e),
            PersistenceError::Serde(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/*
 * Durable string-keyed storage. `get` returns `Ok(None)` for a key that was
 * never written.
 */
pub trait KeyValueStoreOperations: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

pub struct CoreKeyValueStore {
    file_path: PathBuf,
}

impl CoreKeyValueStore {
    /*
     * Opens the store in the application's local config directory, resolved via
     * `path_utils::get_base_app_config_local_dir`.
     */
    pub fn new(app_name: &str) -> Result<Self> {
        let dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(PersistenceError::NoConfigDirectory)?;
        Ok(CoreKeyValueStore {
            file_path: dir.join(PREFS_FILENAME),
        })
    }

    #[cfg(test)]
    pub fn with_file(file_path: PathBuf) -> Self {
        CoreKeyValueStore { file_path }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.file_path.exists() {
            return Ok(BTreeMap::new());
        }
        let file = File::open(&self.file_path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.file_path.with_extension("json.tmp");
        {
            let file = File::create(&tmp)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, values)?;
        }
        fs::rename(&tmp, &self.file_path)?;
        Ok(())
    }
}

impl KeyValueStoreOperations for CoreKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.get(key).cloned())
    }

    /*
     * A malformed store file is replaced rather than left to block every later
     * save; the keys it held are lost.
     */
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = match self.read_all() {
            Ok(values) => values,
            Err(PersistenceError::Serde(e)) => {
                log::error!(
                    "CoreKeyValueStore: {:?} is malformed ({e}); starting a fresh store.",
                    self.file_path
                );
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values)?;
        log::trace!("CoreKeyValueStore: Stored key '{key}' in {:?}.", self.file_path);
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredMapping {
    Parallel { keys: Vec<String>, values: Vec<bool> },
    Map(BTreeMap<String, bool>),
}

pub fn encode_mapping(mapping: &BTreeMap<PathBuf, bool>) -> Result<String> {
    let by_string: BTreeMap<String, bool> = mapping
        .iter()
        .map(|(path, value)| (path.to_string_lossy().into_owned(), *value))
        .collect();
    Ok(serde_json::to_string(&by_string)?)
}

pub fn decode_mapping(blob: &str) -> Result<BTreeMap<PathBuf, bool>> {
    let stored: StoredMapping = serde_json::from_str(blob)?;
    match stored {
        StoredMapping::Map(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (PathBuf::from(k), v))
            .collect()),
        StoredMapping::Parallel { keys, values } => {
            if keys.len() != values.len() {
                return Err(PersistenceError::KeyCountMismatch {
                    keys: keys.len(),
                    values: values.len(),
                });
            }
            Ok(keys
                .into_iter()
                .map(PathBuf::from)
                .zip(values)
                .collect())
        }
    }
}

/*
 * Saves and restores the two persisted mappings of one workspace.
 */
pub struct PersistenceAdapter {
    selection_key: String,
    expansion_key: String,
}

impl PersistenceAdapter {
    pub fn for_workspace(root: &Path) -> Self {
        let identity = path_utils::workspace_identity(root);
        PersistenceAdapter {
            selection_key: format!("{KEY_PREFIX}_FileSelectionStates_{identity}"),
            expansion_key: format!("{KEY_PREFIX}_FoldoutStates_{identity}"),
        }
    }

    #[cfg(test)]
    pub fn selection_key(&self) -> &str {
        &self.selection_key
    }

    #[cfg(test)]
    pub fn expansion_key(&self) -> &str {
        &self.expansion_key
    }

    pub fn save(
        &self,
        store: &dyn KeyValueStoreOperations,
        selection: &BTreeMap<PathBuf, bool>,
        expansion: &BTreeMap<PathBuf, bool>,
    ) -> Result<()> {
        store.set(&self.selection_key, &encode_mapping(selection)?)?;
        store.set(&self.expansion_key, &encode_mapping(expansion)?)?;
        log::debug!(
            "PersistenceAdapter: Saved {} selection and {} expansion entries.",
            selection.len(),
            expansion.len()
        );
        Ok(())
    }

    pub fn load_selection(
        &self,
        store: &dyn KeyValueStoreOperations,
    ) -> Result<Option<BTreeMap<PathBuf, bool>>> {
        Self::load_mapping(store, &self.selection_key)
    }

    pub fn load_expansion(
        &self,
        store: &dyn KeyValueStoreOperations,
    ) -> Result<Option<BTreeMap<PathBuf, bool>>> {
        Self::load_mapping(store, &self.expansion_key)
    }

    fn load_mapping(
        store: &dyn KeyValueStoreOperations,
        key: &str,
    ) -> Result<Option<BTreeMap<PathBuf, bool>>> {
        let Some(blob) = store.get(key)? else {
            log::debug!("PersistenceAdapter: No stored value for '{key}'.");
            return Ok(None);
        };
        let mapping = decode_mapping(&blob)?;
        log::debug!(
            "PersistenceAdapter: Loaded {} entries from '{key}'.",
            mapping.len()
        );
        Ok(Some(mapping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::MemoryKeyValueStore;
    use tempfile::tempdir;

    fn random_mapping(size: usize) -> BTreeMap<PathBuf, bool> {
        (0..size)
            .map(|i| {
                (
                    PathBuf::from(format!("/proj/dir{}/file_{i}_{}.cs", i % 17, rand::random::<u32>())),
                    rand::random::<bool>(),
                )
            })
            .collect()
    }

    #[test]
    fn test_mapping_round_trip_empty_single_and_large() -> Result<()> {
        let empty = BTreeMap::new();
        let mut single = BTreeMap::new();
        single.insert(PathBuf::from("/proj/a/x.cs"), true);
        let large = random_mapping(1000);
        assert_eq!(large.len(), 1000);

        for mapping in [empty, single, large] {
            let blob = encode_mapping(&mapping)?;
            assert_eq!(decode_mapping(&blob)?, mapping);
        }
        Ok(())
    }

    #[test]
    fn test_decode_accepts_parallel_lists() -> Result<()> {
        let blob = r#"{"keys":["Assets/a.cs","Assets/b.cs"],"values":[true,false]}"#;

        let mapping = decode_mapping(blob)?;

        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get(Path::new("Assets/a.cs")), Some(&true));
        assert_eq!(mapping.get(Path::new("Assets/b.cs")), Some(&false));
        Ok(())
    }

    #[test]
    fn test_decode_rejects_key_count_mismatch() {
        let blob = r#"{"keys":["Assets/a.cs","Assets/b.cs"],"values":[true]}"#;
        let result = decode_mapping(blob);
        assert!(matches!(
            result,
            Err(PersistenceError::KeyCountMismatch { keys: 2, values: 1 })
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_mapping("not json at all"),
            Err(PersistenceError::Serde(_))
        ));
    }

    #[test]
    fn test_adapter_keys_are_scoped_per_workspace() {
        let a = PersistenceAdapter::for_workspace(Path::new("/one/Assets"));
        let b = PersistenceAdapter::for_workspace(Path::new("/two/Assets"));

        assert!(a.selection_key().starts_with("CodeCombiner_FileSelectionStates_"));
        assert!(a.expansion_key().starts_with("CodeCombiner_FoldoutStates_"));
        assert_ne!(a.selection_key(), b.selection_key());
        assert_ne!(a.expansion_key(), b.expansion_key());
    }

    #[test]
    fn test_adapter_missing_keys_load_as_none() -> Result<()> {
        let store = MemoryKeyValueStore::new();
        let adapter = PersistenceAdapter::for_workspace(Path::new("/proj"));

        assert!(adapter.load_selection(&store)?.is_none());
        assert!(adapter.load_expansion(&store)?.is_none());
        Ok(())
    }

    #[test]
    fn test_adapter_save_then_load() -> Result<()> {
        // Arrange
        let store = MemoryKeyValueStore::new();
        let adapter = PersistenceAdapter::for_workspace(Path::new("/proj"));
        let selection = random_mapping(25);
        let mut expansion = BTreeMap::new();
        expansion.insert(PathBuf::from("/proj/a"), false);

        // Act
        adapter.save(&store, &selection, &expansion)?;

        // Assert
        assert_eq!(adapter.load_selection(&store)?, Some(selection));
        assert_eq!(adapter.load_expansion(&store)?, Some(expansion));
        assert_eq!(store.keys().len(), 2);
        Ok(())
    }

    #[test]
    fn test_core_store_set_get_and_overwrite() -> Result<()> {
        let dir = tempdir()?;
        let store = CoreKeyValueStore::with_file(dir.path().join("nested").join(PREFS_FILENAME));

        assert_eq!(store.get("missing")?, None);
        store.set("k1", "v1")?;
        store.set("k2", "v2")?;
        store.set("k1", "v1b")?;

        let reopened = CoreKeyValueStore::with_file(store.file_path.clone());
        assert_eq!(reopened.get("k1")?, Some("v1b".to_string()));
        assert_eq!(reopened.get("k2")?, Some("v2".to_string()));
        assert!(!store.file_path.with_extension("json.tmp").exists());
        Ok(())
    }

    #[test]
    fn test_core_store_corrupt_file_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(PREFS_FILENAME);
        fs::write(&path, "{ broken")?;
        let store = CoreKeyValueStore::with_file(path);

        assert!(matches!(store.get("k"), Err(PersistenceError::Serde(_))));
        Ok(())
    }

    #[test]
    fn test_core_store_corrupt_file_does_not_block_saving() -> Result<()> {
        // Arrange
        let dir = tempdir()?;
        let path = dir.path().join(PREFS_FILENAME);
        fs::write(&path, "{ broken")?;
        let store = CoreKeyValueStore::with_file(path);
        let adapter = PersistenceAdapter::for_workspace(Path::new("/proj"));
        let mut selection = BTreeMap::new();
        selection.insert(PathBuf::from("/proj/a/x.cs"), true);

        // Act
        store.set("k", "v")?;
        adapter.save(&store, &selection, &BTreeMap::new())?;

        // Assert
        assert_eq!(store.get("k")?, Some("v".to_string()));
        assert_eq!(adapter.load_selection(&store)?, Some(selection));
        Ok(())
    }
}
