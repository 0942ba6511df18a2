//! Sync cycle options, constants and results.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::dispatch::DispatchReport;

/// Default time between sync ticks.
pub const DEFAULT_INTERVAL_MS: u64 = 500;

/// Default upper bound for a single upload. Keeps a hung server from holding
/// the dispatch lock forever.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Options for the sync cycle controller.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Time between ticks.
    pub interval: Duration,
    /// Timeout applied to each upload request.
    pub request_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Result of one sync cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Records in the drained batch after de-duplication.
    pub records: usize,
    /// Content files packaged.
    pub files: usize,
    /// Filter rules packaged.
    pub filters: usize,
    /// Per-target outcomes; empty when nothing was sent.
    pub dispatch: DispatchReport,
    /// Set when the package could not be built.
    pub error: Option<String>,
}

impl CycleReport {
    /// Whether anything was sent to the targets.
    pub fn dispatched(&self) -> bool {
        !self.dispatch.outcomes.is_empty()
    }
}

/// What a single tick decided.
#[derive(Debug)]
pub enum TickOutcome {
    /// An upload is still in flight; the tick was skipped.
    Busy,
    /// Nothing queued.
    Idle,
    /// A cycle was started in the background.
    Started(JoinHandle<CycleReport>),
}
