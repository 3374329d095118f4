use std::fmt;
use std::io;

/*
 * The clipboard sink receives the merged buffer. It is a seam so that the
 * tree manager and the CLI can be exercised without a desktop session.
 *
 * On Linux the clipboard contents are owned by the writing process and vanish
 * when it exits, so `CoreClipboardSink` hands the text to a detached copy of
 * the current executable started with `DAEMON_FLAG`. That copy serves the
 * selection until another program takes ownership of the clipboard.
 */

pub const DAEMON_FLAG: &str = "__clipboard_daemon";

#[derive(Debug)]
pub enum ClipboardError {
    Unavailable(String),
}

impl fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipboardError::Unavailable(msg) => write!(f, "Clipboard unavailable: {msg}"),
        }
    }
}

impl std::error::Error for ClipboardError {}

impl From<arboard::Error> for ClipboardError {
    fn from(err: arboard::Error) -> Self {
        ClipboardError::Unavailable(err.to_string())
    }
}

impl From<io::Error> for ClipboardError {
    fn from(err: io::Error) -> Self {
        ClipboardError::Unavailable(err.to_string())
    }
}

pub trait ClipboardSinkOperations: Send + Sync {
    fn write(&self, text: &str) -> Result<(), ClipboardError>;
}

/// True when the first argument after the program name is `DAEMON_FLAG`.
pub fn is_daemon_invocation_from<I>(args: I) -> bool
where
    I: IntoIterator<Item = String>,
{
    args.into_iter().nth(1).is_some_and(|arg| arg == DAEMON_FLAG)
}

pub fn is_daemon_invocation() -> bool {
    is_daemon_invocation_from(std::env::args())
}

/*
 * Body of the detached clipboard process: reads the text from stdin, takes
 * clipboard ownership and blocks until another program replaces the contents.
 */
#[cfg(target_os = "linux")]
pub fn run_daemon() -> Result<(), ClipboardError> {
    use arboard::SetExtLinux;

    let text = io::read_to_string(io::stdin())?;
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set().wait().text(text)?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn run_daemon() -> Result<(), ClipboardError> {
    Err(ClipboardError::Unavailable(format!(
        "{DAEMON_FLAG} is only used on Linux"
    )))
}

pub struct CoreClipboardSink {}

impl CoreClipboardSink {
    pub fn new() -> Self {
        CoreClipboardSink {}
    }
}

impl Default for CoreClipboardSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardSinkOperations for CoreClipboardSink {
    #[cfg(target_os = "linux")]
    fn write(&self, text: &str) -> Result<(), ClipboardError> {
        use std::io::Write;
        use std::process::{Command, Stdio};

        let mut child = Command::new(std::env::current_exe()?)
            .arg(DAEMON_FLAG)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .current_dir("/")
            .spawn()?;
        let Some(mut stdin) = child.stdin.take() else {
            return Err(ClipboardError::Unavailable(
                "clipboard process has no stdin".to_string(),
            ));
        };
        stdin.write_all(text.as_bytes())?;
        stdin.flush()?;
        log::trace!(
            "CoreClipboardSink: Handed {} bytes to clipboard process {}.",
            text.len(),
            child.id()
        );
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn write(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = arboard::Clipboard::new()?;
        clipboard.set_text(text.to_owned())?;
        log::trace!("CoreClipboardSink: Wrote {} bytes.", text.len());
        Ok(())
    }
}
