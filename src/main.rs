// src/main.rs

mod core;

use crate::core::clipboard;
use crate::core::config::ConfigError;
use crate::core::file_system::FileSystemError;
use crate::core::models::PathState;
use crate::core::persistence::PersistenceError;
use crate::core::{
    APP_NAME, AppConfig, ArchiverOperations, ClipboardSinkOperations, CombineOutcome,
    ConfigManagerOperations, CoreArchiver, CoreClipboardSink, CoreConfigManager,
    CoreFileSystemReader, CoreKeyValueStore, FsChangeWatcher, SelectionError, TreeManager,
    TreeRow, TreeRowKind,
};
use clap::{ArgAction, Parser, Subcommand};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;
use std::thread;

/// code_combiner – select source files in a tree and merge them into one buffer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// Allowed file extension; repeat to allow several. Overrides the configuration.
    #[arg(long = "ext", value_name = "EXTENSION")]
    extensions: Vec<String>,

    /// Glob pattern for entry names to skip; repeat to add more. Overrides the configuration.
    #[arg(long = "exclude", value_name = "PATTERN")]
    excludes: Vec<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the visible tree with selection marks
    Tree,
    /// Print the number of selected files and their total line count, or the
    /// selection state of the given paths
    Status { paths: Vec<PathBuf> },
    /// Select files or whole folders
    Select {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Deselect files or whole folders
    Deselect {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Expand a folder in the tree view
    Expand { path: PathBuf },
    /// Collapse a folder in the tree view
    Collapse { path: PathBuf },
    /// Merge the selected files and copy the result to the clipboard
    Combine {
        /// Write the merged content to stdout instead of the clipboard
        #[arg(long)]
        stdout: bool,
    },
    /// Watch the workspace and rescan whenever allowed files change
    Watch,
    /// Print the effective configuration
    Config {
        /// Store the effective configuration, overrides included
        #[arg(long)]
        save: bool,
    },
}

#[derive(Debug)]
enum AppError {
    Scan(FileSystemError),
    Persistence(PersistenceError),
    Selection(SelectionError),
    Watch(notify::Error),
    Config(ConfigError),
    Logger(log::SetLoggerError),
}

impl From<FileSystemError> for AppError {
    fn from(err: FileSystemError) -> Self {
        AppError::Scan(err)
    }
}

impl From<PersistenceError> for AppError {
    fn from(err: PersistenceError) -> Self {
        AppError::Persistence(err)
    }
}

impl From<SelectionError> for AppError {
    fn from(err: SelectionError) -> Self {
        AppError::Selection(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<notify::Error> for AppError {
    fn from(err: notify::Error) -> Self {
        AppError::Watch(err)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Scan(e) if e.is_not_found() => {
                write!(f, "Workspace root not found: {:?}", e.path())
            }
            AppError::Scan(e) => write!(f, "Scan failed: {e}"),
            AppError::Persistence(e) => write!(f, "Could not access saved state: {e}"),
            AppError::Selection(e) => write!(f, "{e}"),
            AppError::Watch(e) => write!(f, "Could not watch the workspace: {e}"),
            AppError::Config(e) => write!(f, "Could not save the configuration: {e}"),
            AppError::Logger(e) => write!(f, "Could not initialise logging: {e}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Scan(e) => Some(e),
            AppError::Persistence(e) => Some(e),
            AppError::Selection(e) => Some(e),
            AppError::Watch(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Logger(e) => Some(e),
        }
    }
}

fn main() -> ExitCode {
    if clipboard::is_daemon_invocation() {
        return match clipboard::run_daemon() {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        };
    }
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) -> Result<(), AppError> {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .map_err(AppError::Logger)
}

fn load_config(cli: &Cli) -> AppConfig {
    let config = match CoreConfigManager::new().load_config(APP_NAME) {
        Ok(config) => config,
        Err(e @ ConfigError::Serde(_)) => {
            log::error!("Main: Configuration file is malformed, using defaults: {e}");
            AppConfig::default()
        }
        Err(e) => {
            log::warn!("Main: Could not load configuration, using defaults: {e}");
            AppConfig::default()
        }
    };
    config.with_overrides(&cli.extensions, &cli.excludes)
}

/*
 * One activation per invocation: restore and rescan, run the command, then
 * flush state even when the command failed. `config` touches no workspace.
 */
fn run(cli: Cli) -> Result<(), AppError> {
    init_logging(cli.verbose)?;
    let config = load_config(&cli);
    if let Command::Config { save } = cli.command {
        return show_config(&config, save);
    }

    let root = match cli.root.canonicalize() {
        Ok(root) => root,
        Err(e) => {
            log::warn!("Main: Cannot canonicalize {:?}: {e}", cli.root);
            cli.root.clone()
        }
    };
    log::debug!(
        "Main: Root {root:?}, extensions {:?}, excludes {:?}.",
        config.extensions,
        config.exclude_patterns
    );

    let kv = CoreKeyValueStore::new(APP_NAME)?;
    let fs = CoreFileSystemReader::with_exclude_patterns(&config.exclude_patterns);
    let mut manager = TreeManager::new(root, config.extension_filter(), Box::new(fs));
    manager.activate(&kv)?;

    let outcome = execute(&cli.command, &mut manager, &kv, &config);
    let flushed = manager.deactivate(&kv);
    outcome?;
    flushed?;
    Ok(())
}

fn execute(
    command: &Command,
    manager: &mut TreeManager,
    kv: &CoreKeyValueStore,
    config: &AppConfig,
) -> Result<(), AppError> {
    let archiver = CoreArchiver::new();
    match command {
        Command::Tree => {
            for row in manager.visible_rows() {
                println!("{}", format_row(&row));
            }
            print_summary(manager, &archiver);
        }
        Command::Status { paths } if paths.is_empty() => print_summary(manager, &archiver),
        Command::Status { paths } => {
            for path in paths {
                let path = resolve_path(manager.root(), path);
                let state = manager.path_state(&path)?;
                println!("{}", format_state(manager.root(), &path, state));
            }
        }
        Command::Select { paths } => set_selection(manager, paths, true)?,
        Command::Deselect { paths } => set_selection(manager, paths, false)?,
        Command::Expand { path } => {
            let path = resolve_path(manager.root(), path);
            manager.set_expanded(&path, true)?;
        }
        Command::Collapse { path } => {
            let path = resolve_path(manager.root(), path);
            manager.set_expanded(&path, false)?;
        }
        Command::Combine { stdout } => combine(manager, &archiver, *stdout),
        Command::Watch => watch(manager, kv, config, &archiver)?,
        Command::Config { .. } => {}
    }
    Ok(())
}

fn set_selection(
    manager: &mut TreeManager,
    paths: &[PathBuf],
    selected: bool,
) -> Result<(), AppError> {
    for path in paths {
        let path = resolve_path(manager.root(), path);
        manager.toggle(&path, selected)?;
    }
    Ok(())
}

fn combine(manager: &TreeManager, archiver: &dyn ArchiverOperations, to_stdout: bool) {
    let archive = match manager.combine(archiver) {
        CombineOutcome::NothingSelected => {
            log::warn!("No files selected.");
            return;
        }
        CombineOutcome::Combined(archive) => archive,
    };
    for skipped in &archive.skipped {
        log::warn!("Skipped {:?}: {}", skipped.path, skipped.reason);
    }
    if archive.file_count == 0 {
        log::warn!("None of the selected files could be read.");
        return;
    }

    if to_stdout {
        print!("{}", archive.content);
    } else {
        match CoreClipboardSink::new().write(&archive.content) {
            Ok(()) => log::info!("Merged content copied to clipboard."),
            Err(e) => log::error!("Main: {e}"),
        }
    }
    log::info!(
        "Merged {} files, {} lines.",
        archive.file_count,
        archive.line_count
    );
}

/*
 * Polls the change signal at the configured interval and rescans when it was
 * raised. State is flushed after every rescan since this loop only ends when
 * the process is interrupted.
 */
fn watch(
    manager: &mut TreeManager,
    kv: &CoreKeyValueStore,
    config: &AppConfig,
    archiver: &dyn ArchiverOperations,
) -> Result<(), AppError> {
    let _watcher = FsChangeWatcher::start(
        manager.root(),
        manager.filter().clone(),
        manager.change_signal(),
    )?;
    log::info!(
        "Watching {:?} every {} ms. Press Ctrl+C to stop.",
        manager.root(),
        config.poll_interval_ms
    );
    loop {
        thread::sleep(config.poll_interval());
        match manager.tick() {
            Ok(true) => {
                if let Err(e) = manager.deactivate(kv) {
                    log::error!("Main: Could not save state: {e}");
                }
                print_summary(manager, archiver);
            }
            Ok(false) => {}
            Err(e) => log::error!("Main: Rescan failed: {e}"),
        }
    }
}

fn print_summary(manager: &TreeManager, archiver: &dyn ArchiverOperations) {
    let summary = manager.selection_summary(archiver);
    println!(
        "Selected: {} files, {} lines",
        summary.file_count, summary.line_count
    );
    if summary.skipped > 0 {
        println!("Unreadable: {} files", summary.skipped);
    }
}

fn show_config(config: &AppConfig, save: bool) -> Result<(), AppError> {
    println!("extensions: {}", config.extension_filter().extensions().join(" "));
    println!("exclude patterns: {}", config.exclude_patterns.join(" "));
    println!("poll interval: {} ms", config.poll_interval_ms);
    if save {
        CoreConfigManager::new().save_config(APP_NAME, config)?;
        log::info!("Configuration saved.");
    }
    Ok(())
}

fn format_state(root: &Path, path: &Path, state: PathState) -> String {
    let display = path.strip_prefix(root).unwrap_or(path).display();
    match state {
        PathState::Folder {
            all_selected,
            expanded,
        } => format!(
            "{display}/: {}, {}",
            if all_selected { "all selected" } else { "not all selected" },
            if expanded { "expanded" } else { "collapsed" }
        ),
        PathState::File { selected } => format!(
            "{display}: {}",
            if selected { "selected" } else { "not selected" }
        ),
    }
}

fn format_row(row: &TreeRow) -> String {
    let indent = "  ".repeat(row.depth);
    let mark = if row.checked { "[x]" } else { "[ ]" };
    match row.kind {
        TreeRowKind::Folder { expanded: true } => format!("{indent}{mark} {}/", row.name),
        TreeRowKind::Folder { expanded: false } => format!("{indent}{mark} {}/ ...", row.name),
        TreeRowKind::File => format!("{indent}{mark} {}", row.name),
    }
}

/// Joins relative paths onto the root and drops `.` components.
fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
