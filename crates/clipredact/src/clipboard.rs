//! System clipboard access.
//!
//! [`SystemClipboard`] adapts `clipboard-rs` to the [`TextSource`] trait.
//! Clipboard calls block, so each one runs on tokio's blocking pool with a
//! fresh context.

use std::fmt;

use async_trait::async_trait;
use clipboard_rs::{Clipboard, ClipboardContext, ContentFormat};
use tracing::trace;

use crate::error::{Error, Result};
use crate::monitor::TextSource;

/// The desktop clipboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    /// Create a handle to the system clipboard.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn read_blocking() -> Result<String> {
        let ctx = ClipboardContext::new().map_err(|e| Error::text_source_read(e.to_string()))?;
        read_text(&ctx)
    }

    fn write_blocking(text: &str) -> Result<()> {
        let ctx = ClipboardContext::new().map_err(|e| Error::text_source_write(e.to_string()))?;
        ctx.set_text(text.to_string())
            .map_err(|e| Error::text_source_write(e.to_string()))
    }
}

/// Read text from `clipboard`.
fn read_text(clipboard: &impl Clipboard) -> Result<String> {
    text_or_empty(clipboard.has(ContentFormat::Text), || clipboard.get_text())
}

/// Images, files and an empty clipboard read as an empty string; a failure
/// to read text that is there is an error.
fn text_or_empty<E: fmt::Display>(
    has_text: bool,
    read: impl FnOnce() -> std::result::Result<String, E>,
) -> Result<String> {
    if !has_text {
        trace!("Clipboard holds no text");
        return Ok(String::new());
    }
    read().map_err(|e| Error::text_source_read(e.to_string()))
}

#[async_trait]
impl TextSource for SystemClipboard {
    async fn read(&self) -> Result<String> {
        tokio::task::spawn_blocking(Self::read_blocking)
            .await
            .map_err(|e| Error::text_source_read(format!("clipboard task failed: {e}")))?
    }

    async fn write(&self, text: &str) -> Result<()> {
        let text = text.to_string();
        tokio::task::spawn_blocking(move || Self::write_blocking(&text))
            .await
            .map_err(|e| Error::text_source_write(format!("clipboard task failed: {e}")))?
    }
}
