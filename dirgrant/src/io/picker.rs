//! Directory-selection prompt port.
//!
//! The [`DirectoryPicker`] trait decouples the access manager from the way a
//! user chooses a directory. The outcome is awaited rather than delivered
//! through a callback. Tests use scripted pickers that return predetermined
//! outcomes without touching stdin.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stderr, Stdin,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::core::types::{DirectoryHandle, PickOutcome};

/// Abstraction over directory-selection prompts.
#[allow(async_fn_in_trait)]
pub trait DirectoryPicker {
    /// Let the user pick a directory tree. Resolves once the user answers.
    async fn pick(&self) -> Result<PickOutcome>;
}

/// Resolve `path` to an existing directory and wrap it as a `file://` handle.
pub fn resolve_directory(path: &Path) -> Result<DirectoryHandle> {
    let canonical = std::fs::canonicalize(path)
        .with_context(|| format!("resolve directory {}", path.display()))?;
    if !canonical.is_dir() {
        return Err(anyhow!("not a directory: {}", canonical.display()));
    }
    DirectoryHandle::from_local_dir(&canonical)
}

/// Interactive picker reading a directory path per prompt.
///
/// An empty line or end of input dismisses the prompt.
pub struct PromptPicker<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,
}

impl PromptPicker<BufReader<Stdin>, Stderr> {
    /// Prompt on stderr, read answers from stdin.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stderr())
    }
}

impl<R, W> PromptPicker<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }

    /// Consume the picker, returning everything written to the prompt stream.
    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    async fn say(&self, text: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(text.as_bytes())
            .await
            .context("write prompt")?;
        writer.flush().await.context("flush prompt")
    }
}

impl<R, W> DirectoryPicker for PromptPicker<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn pick(&self) -> Result<PickOutcome> {
        let mut reader = self.reader.lock().await;
        loop {
            self.say("Directory to grant (empty to cancel): ").await?;
            let mut line = String::new();
            let read = reader
                .read_line(&mut line)
                .await
                .context("read directory answer")?;
            let answer = line.trim();
            if read == 0 || answer.is_empty() {
                debug!("directory prompt dismissed");
                return Ok(PickOutcome::Cancelled);
            }
            match resolve_directory(Path::new(answer)) {
                Ok(handle) => {
                    debug!(handle = %handle, "directory chosen");
                    return Ok(PickOutcome::Granted(handle));
                }
                Err(err) => {
                    warn!(answer, "rejected directory answer");
                    self.say(&format!("{err:#}\n")).await?;
                }
            }
        }
    }
}

/// Non-interactive picker answering every prompt with the same directory.
///
/// With no directory configured every prompt is cancelled.
#[derive(Debug, Clone, Default)]
pub struct FixedPicker {
    path: Option<PathBuf>,
}

impl FixedPicker {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl DirectoryPicker for FixedPicker {
    async fn pick(&self) -> Result<PickOutcome> {
        match &self.path {
            Some(path) => Ok(PickOutcome::Granted(resolve_directory(path)?)),
            None => Ok(PickOutcome::Cancelled),
        }
    }
}
