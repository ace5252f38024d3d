//! Terminal-backed devices: line input, y/N confirmations, an external
//! clipboard command and the (absent) share sheet.

use std::io::Write;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use convo_core::config::ShareConfig;
use convo_core::confirm::Confirm;
use convo_core::error::{ConvoError, Result};
use convo_session::{Clipboard, ShareSheet};

/// Clipboard commands tried in order when none is configured.
const CLIPBOARD_CANDIDATES: &[&[&str]] = &[
    &["wl-copy"],
    &["xclip", "-selection", "clipboard"],
    &["xsel", "--clipboard", "--input"],
    &["pbcopy"],
    &["clip"],
];

type LineSource = Lines<Box<dyn AsyncBufRead + Unpin + Send>>;

/// Line-oriented terminal I/O. Output goes to stdout; logs stay on stderr.
pub struct Console {
    lines: Mutex<LineSource>,
    assume_yes: bool,
}

impl Console {
    pub fn stdin(assume_yes: bool) -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()), assume_yes)
    }

    /// Read lines from any buffered source, e.g. a script.
    pub fn from_reader<R>(reader: R, assume_yes: bool) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let source: Box<dyn AsyncBufRead + Unpin + Send> = Box::new(reader);
        Self {
            lines: Mutex::new(source.lines()),
            assume_yes,
        }
    }

    #[cfg(test)]
    pub fn scripted(script: &str) -> Self {
        Self::from_reader(std::io::Cursor::new(script.as_bytes().to_vec()), false)
    }

    /// Print `text` without a newline and read one line. `None` at end of input.
    pub async fn prompt(&self, text: &str) -> Option<String> {
        print!("{}", text);
        let _ = std::io::stdout().flush();
        match self.lines.lock().await.next_line().await {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Reading stdin failed");
                None
            }
        }
    }

    pub fn say(&self, text: impl AsRef<str>) {
        println!("{}", text.as_ref());
    }
}

#[async_trait]
impl Confirm for Console {
    async fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            debug!(prompt, "Confirmation assumed");
            return true;
        }
        match self.prompt(&format!("{} [y/N] ", prompt)).await {
            Some(answer) => is_affirmative(&answer),
            None => false,
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Clipboard that pipes text into an external command.
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    candidates: Vec<Vec<String>>,
}

impl CommandClipboard {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            candidates: vec![command],
        }
    }

    /// Use the configured command, or probe the platform defaults.
    pub fn from_config(config: &ShareConfig) -> Self {
        if config.clipboard_command.is_empty() {
            Self {
                candidates: CLIPBOARD_CANDIDATES
                    .iter()
                    .map(|c| c.iter().map(|s| s.to_string()).collect())
                    .collect(),
            }
        } else {
            Self::new(config.clipboard_command.clone())
        }
    }

    async fn pipe(command: &[String], text: &str) -> std::io::Result<bool> {
        let Some((program, args)) = command.split_first() else {
            return Ok(false);
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
        }
        Ok(child.wait().await?.success())
    }
}

#[async_trait]
impl Clipboard for CommandClipboard {
    async fn write_text(&self, text: &str) -> Result<()> {
        for command in &self.candidates {
            match Self::pipe(command, text).await {
                Ok(true) => {
                    debug!(command = ?command, "Copied to clipboard");
                    return Ok(());
                }
                Ok(false) => {
                    return Err(ConvoError::Share(format!(
                        "Clipboard command {:?} failed",
                        command
                    )))
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(command = ?command, "Clipboard command not installed");
                }
                Err(e) => return Err(ConvoError::Share(format!("Clipboard: {}", e))),
            }
        }
        Err(ConvoError::Share("No clipboard command available".to_string()))
    }
}

/// Terminals have no native share action.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShareSheet;

#[async_trait]
impl ShareSheet for NoShareSheet {
    fn is_available(&self) -> bool {
        false
    }

    async fn share(&self, _title: &str, _text: &str) -> Result<()> {
        Err(ConvoError::Share("No share action in a terminal".to_string()))
    }
}
