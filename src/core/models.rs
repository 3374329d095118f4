use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/*
 * The default allow-list: code files, UI markup files and UI style files.
 */
pub const DEFAULT_EXTENSIONS: [&str; 3] = [".cs", ".uxml", ".uss"];

/*
 * Decides which regular files take part in the tree. Extensions are stored with
 * their leading dot and compared case-sensitively against the final extension
 * of a file name, so `Foo.CS` is not a `.cs` file and `a.tar.cs` is.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ext in extensions {
            let trimmed = ext.as_ref().trim();
            if trimmed.is_empty() {
                continue;
            }
            let with_dot = if trimmed.starts_with('.') {
                trimmed.to_string()
            } else {
                format!(".{trimmed}")
            };
            if !normalized.contains(&with_dot) {
                normalized.push(with_dot);
            }
        }
        ExtensionFilter {
            extensions: normalized,
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|allowed| allowed.len() == ext.len() + 1 && allowed.ends_with(ext))
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        ExtensionFilter::new(DEFAULT_EXTENSIONS)
    }
}

/*
 * Expanded/collapsed flags for folders, keyed by path. Entries are created the
 * first time a folder is displayed and are never pruned; a folder that
 * disappears keeps its dangling entry.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    states: BTreeMap<PathBuf, bool>,
}

impl ExpansionState {
    pub fn new() -> Self {
        ExpansionState::default()
    }

    /// Returns the flag for `path`, recording the default (expanded) on first sight.
    pub fn ensure(&mut self, path: &Path) -> bool {
        *self.states.entry(path.to_path_buf()).or_insert(true)
    }

    pub fn get(&self, path: &Path) -> Option<bool> {
        self.states.get(path).copied()
    }

    pub fn set(&mut self, path: &Path, expanded: bool) {
        self.states.insert(path.to_path_buf(), expanded);
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeRowKind {
    Folder { expanded: bool },
    File,
}

/*
 * One line of the presentation model. For folder rows `checked` is the
 * aggregate "every file below is selected" flag; for file rows it is the
 * file's own selection flag.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub path: PathBuf,
    pub name: String,
    pub depth: usize,
    pub kind: TreeRowKind,
    pub checked: bool,
}

/*
 * Selection state of a single tree entry. For a folder, `all_selected` is the
 * aggregate flag and `expanded` the displayed expansion flag.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    Folder { all_selected: bool, expanded: bool },
    File { selected: bool },
}

/*
 * Totals shown next to the tree: how many files are selected and how many
 * lines they hold. Files that could not be read are counted in `skipped`.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionSummary {
    pub file_count: usize,
    pub line_count: usize,
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_matches_code_markup_and_style_extensions() {
        let filter = ExtensionFilter::default();
        assert!(filter.matches(Path::new("Assets/Player.cs")));
        assert!(filter.matches(Path::new("Assets/Ui/Main.uxml")));
        assert!(filter.matches(Path::new("Assets/Ui/Main.uss")));
        assert!(!filter.matches(Path::new("Assets/Player.cs.meta")));
        assert!(!filter.matches(Path::new("Assets/Player.CS")));
        assert!(!filter.matches(Path::new("Assets/README")));
        assert!(!filter.matches(Path::new("Assets/file.xcs")));
    }

    #[test]
    fn test_filter_normalizes_missing_dots_and_duplicates() {
        let filter = ExtensionFilter::new(["rs", ".rs", " toml ", ""]);
        assert_eq!(filter.extensions(), &[".rs".to_string(), ".toml".to_string()]);
        assert!(filter.matches(Path::new("src/main.rs")));
        assert!(filter.matches(Path::new("Cargo.toml")));
    }

    #[test]
    fn test_expansion_ensure_defaults_to_expanded_and_keeps_user_choice() {
        let mut expansion = ExpansionState::new();
        let folder = Path::new("/root/a");

        assert_eq!(expansion.get(folder), None);
        assert!(expansion.ensure(folder));

        expansion.set(folder, false);
        assert!(!expansion.ensure(folder));
        assert_eq!(expansion.as_map().len(), 1);
    }
}
