//! The monitor loop.
//!
//! A [`Monitor`] polls a [`TextSource`] on a timer, redacts any new text with
//! the current rule snapshot, writes the result back, and reports each
//! redaction to an [`AuditSink`]. Every failure is logged and the loop keeps
//! going; only a [`MonitorHandle::stop`] ends it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, info, trace, warn};

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::redaction::Redactor;
use crate::rules::ConfigManager;

/// Where the monitor reads text from and writes redacted text back to.
#[async_trait]
pub trait TextSource: Send + Sync {
    /// Read the current text. Non-text content reads as an empty string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TextSourceRead`](crate::Error::TextSourceRead) if the
    /// source cannot be read.
    async fn read(&self) -> Result<String>;

    /// Replace the current text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TextSourceWrite`](crate::Error::TextSourceWrite) if
    /// the source cannot be written.
    async fn write(&self, text: &str) -> Result<()>;
}

/// Receives one record per redaction the monitor performs.
pub trait AuditSink: Send + Sync {
    /// Record a redaction. `detections` holds one name per replacement.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be stored. The monitor logs
    /// it and carries on.
    fn record(&self, original: &str, filtered: &str, detections: &[String]) -> Result<()>;
}

/// What one poll of the text source did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The source was empty or held non-text content.
    Empty,
    /// The text was the same as last time.
    Unchanged,
    /// The text exceeded the configured maximum length.
    TooLarge {
        /// Length of the text in bytes.
        len: usize,
    },
    /// New text contained nothing to redact.
    Clean,
    /// New text was redacted and written back.
    Redacted {
        /// One category or rule name per replacement.
        detections: Vec<String>,
    },
    /// Reading the source failed.
    ReadFailed,
    /// Writing the redacted text back failed.
    WriteFailed,
}

#[derive(Debug, Default)]
struct Signals {
    stopped: AtomicBool,
    rescan: AtomicBool,
    notify: Notify,
}

/// A cloneable handle that stops a running [`Monitor`] or asks it to look at
/// the current text again.
#[derive(Debug, Clone, Default)]
pub struct MonitorHandle {
    signal: Arc<Signals>,
}

impl MonitorHandle {
    /// Create a new monitor handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the monitor to stop. A monitor sleeping between polls wakes
    /// immediately.
    pub fn stop(&self) {
        self.signal.stopped.store(true, Ordering::SeqCst);
        self.signal.notify.notify_waiters();
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.signal.stopped.load(Ordering::SeqCst)
    }

    /// Make the next poll treat the current text as new, even if it was
    /// already seen. Used after the rules change.
    pub fn request_rescan(&self) {
        self.signal.rescan.store(true, Ordering::SeqCst);
    }

    fn take_rescan(&self) -> bool {
        self.signal.rescan.swap(false, Ordering::SeqCst)
    }

    /// Wait until [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        loop {
            let notified = self.signal.notify.notified();
            if self.should_stop() {
                return;
            }
            notified.await;
        }
    }
}

/// Polls a text source and redacts what it finds.
pub struct Monitor {
    source: Arc<dyn TextSource>,
    rules: Arc<ConfigManager>,
    redactor: Arc<Redactor>,
    sink: Option<Arc<dyn AuditSink>>,
    config: MonitorConfig,
    handle: MonitorHandle,
    last_hash: Option<blake3::Hash>,
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("config", &self.config)
            .field("has_sink", &self.sink.is_some())
            .field("last_hash", &self.last_hash.map(|h| h.to_hex().to_string()))
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Create a monitor over `source`, using the rules currently held by
    /// `rules` on every poll.
    #[must_use]
    pub fn new(
        source: Arc<dyn TextSource>,
        rules: Arc<ConfigManager>,
        redactor: Arc<Redactor>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            source,
            rules,
            redactor,
            sink: None,
            config,
            handle: MonitorHandle::new(),
            last_hash: None,
        }
    }

    /// Report redactions to `sink`.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Get a handle that can stop this monitor from another task.
    #[must_use]
    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    /// Run one poll cycle.
    pub async fn poll_once(&mut self) -> PollOutcome {
        if self.handle.take_rescan() {
            debug!("Rescan requested");
            self.last_hash = None;
        }

        let text = match self.source.read().await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to read text source");
                return PollOutcome::ReadFailed;
            }
        };

        if text.is_empty() {
            return PollOutcome::Empty;
        }

        if text.len() > self.config.max_content_length {
            trace!(
                len = text.len(),
                max = self.config.max_content_length,
                "Content too large, skipping"
            );
            return PollOutcome::TooLarge { len: text.len() };
        }

        let hash = blake3::hash(text.as_bytes());
        if self.last_hash == Some(hash) {
            trace!("Content unchanged");
            return PollOutcome::Unchanged;
        }
        self.last_hash = Some(hash);

        let rules = self.rules.get();
        let outcome = self.redactor.redact(&text, &rules);
        if !outcome.changed {
            debug!(len = text.len(), "New content, nothing to redact");
            return PollOutcome::Clean;
        }

        if let Err(e) = self.source.write(&outcome.text).await {
            warn!(error = %e, "Failed to write redacted content");
            // Forget the text so the next poll tries again.
            self.last_hash = None;
            return PollOutcome::WriteFailed;
        }
        self.last_hash = Some(blake3::hash(outcome.text.as_bytes()));

        let detections = outcome.summary.names();
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.record(&text, &outcome.text, &detections) {
                warn!(error = %e, "Failed to record redaction");
            }
        }

        if rules.notify_on_change {
            info!(
                replacements = detections.len(),
                detections = ?detections,
                "Redacted sensitive content"
            );
        } else {
            debug!(replacements = detections.len(), "Redacted sensitive content");
        }

        PollOutcome::Redacted { detections }
    }

    /// Poll until the handle is stopped.
    ///
    /// The delay between polls is re-read from the current rule set each
    /// cycle, so interval changes take effect without a restart.
    pub async fn run(mut self) {
        info!("Monitor started");

        while !self.handle.should_stop() {
            let delay = match self.poll_once().await {
                PollOutcome::ReadFailed => self.config.read_error_backoff(),
                _ => self.rules.get().polling_interval(),
            };

            let handle = self.handle.clone();
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = handle.stopped() => break,
            }
        }

        info!("Monitor stopped");
    }
}
