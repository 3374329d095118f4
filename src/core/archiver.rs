// src/core/archiver.rs

use super::file_system::FileSystemReaderOperations;
use super::models::SelectionSummary;
use super::path_utils;
use std::path::{Path, PathBuf};

/*
 * The merge engine: concatenates the content of the selected files into one
 * buffer. Every file is preceded by a delimiter line embedding its path
 * (relative to the workspace root) and followed by a blank line:
 *
 *   //--------------a/x.cs----------------
 *   <content>
 *   <blank>
 *
 * A file that cannot be read is skipped with a warning and reported in the
 * outcome instead of aborting the whole merge.
 */

pub const DELIMITER_PREFIX: &str = "//--------------";
pub const DELIMITER_SUFFIX: &str = "----------------";

pub fn delimiter_line(display_path: &str) -> String {
    format!("{DELIMITER_PREFIX}{display_path}{DELIMITER_SUFFIX}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/*
 * The merged buffer plus totals. `file_count` and `line_count` only cover the
 * files that made it into `content`.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombinedArchive {
    pub content: String,
    pub file_count: usize,
    pub line_count: usize,
    pub skipped: Vec<SkippedFile>,
}

/*
 * `NothingSelected` is an informational outcome, not a failure: the user asked
 * for a merge with an empty selection.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombineOutcome {
    NothingSelected,
    Combined(CombinedArchive),
}

pub trait ArchiverOperations: Send + Sync {
    /*
     * Merges `selected` in the given order. Paths in delimiter lines are
     * rendered relative to `root_for_display`.
     */
    fn create_archive_content(
        &self,
        selected: &[PathBuf],
        root_for_display: &Path,
        fs: &dyn FileSystemReaderOperations,
    ) -> CombineOutcome;

    /*
     * Counts the selected files and the sum of their lines, reading each file
     * with a line-splitting read. Unreadable files are skipped and counted as
     * such.
     */
    fn summarize_selection(
        &self,
        selected: &[PathBuf],
        fs: &dyn FileSystemReaderOperations,
    ) -> SelectionSummary;
}

pub struct CoreArchiver {}

impl CoreArchiver {
    pub fn new() -> Self {
        CoreArchiver {}
    }
}

impl Default for CoreArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiverOperations for CoreArchiver {
    fn create_archive_content(
        &self,
        selected: &[PathBuf],
        root_for_display: &Path,
        fs: &dyn FileSystemReaderOperations,
    ) -> CombineOutcome {
        if selected.is_empty() {
            log::debug!("Archiver: Nothing to merge.");
            return CombineOutcome::NothingSelected;
        }

        let mut archive = CombinedArchive::default();
        for path in selected {
            let read = fs.read_text(path).map(|text| (text.lines().count(), text));
            let (line_count, content) = match read {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("Archiver: Skipping unreadable file {path:?}: {e}");
                    archive.skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let display = path_utils::display_path(root_for_display, path);
            archive.content.push_str(&delimiter_line(&display));
            archive.content.push('\n');
            archive.content.push_str(&content);
            archive.content.push('\n');
            archive.content.push('\n');
            archive.file_count += 1;
            archive.line_count += line_count;
        }

        log::debug!(
            "Archiver: Merged {} files ({} lines), skipped {}.",
            archive.file_count,
            archive.line_count,
            archive.skipped.len()
        );
        CombineOutcome::Combined(archive)
    }

    fn summarize_selection(
        &self,
        selected: &[PathBuf],
        fs: &dyn FileSystemReaderOperations,
    ) -> SelectionSummary {
        let mut summary = SelectionSummary::default();
        for path in selected {
            match fs.read_lines(path) {
                Ok(lines) => {
                    summary.file_count += 1;
                    summary.line_count += lines.len();
                }
                Err(e) => {
                    log::warn!("Archiver: Cannot count lines of {path:?}: {e}");
                    summary.skipped += 1;
                }
            }
        }
        summary
    }
}
