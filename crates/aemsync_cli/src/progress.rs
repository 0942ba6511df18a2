//! Progress reporting for sync cycles.
//!
//! This module provides two modes of progress reporting:
//! - Interactive mode (TTY): one styled line per change and per target
//! - Logging mode (non-TTY): structured logging using tracing

mod interactive;
mod logging;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use aemsync::sync::{ProgressCallback, SyncProgress};
use console::Term;

pub use interactive::InteractiveReporter;
pub use logging::LoggingReporter;

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    /// Styled lines for TTY.
    Interactive(InteractiveReporter),
    /// Structured logging for non-TTY (CI, pipes).
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::interactive()
        } else {
            Self::logging()
        }
    }

    pub fn interactive() -> Self {
        Self::Interactive(InteractiveReporter::new())
    }

    pub fn logging() -> Self {
        Self::Logging(LoggingReporter::new())
    }

    /// Handle a progress event.
    pub fn handle(&self, event: SyncProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Announce the watched path and sync settings.
    pub fn watching(&self, path: &Path, interval: Duration, targets: &[String]) {
        match self {
            Self::Interactive(r) => r.watching(path, interval, targets),
            Self::Logging(r) => r.watching(path, interval, targets),
        }
    }

    /// Convert to a ProgressCallback for the library.
    pub fn as_callback(self: &Arc<Self>) -> Arc<ProgressCallback> {
        let reporter = Arc::clone(self);
        Arc::new(Box::new(move |event| {
            reporter.handle(event);
        }))
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
