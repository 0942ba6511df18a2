//! Fixed-interval sync cycles.
//!
//! Each tick looks at the dispatch lock and the change queue and decides
//! whether to start a cycle. The tick itself never waits on file reads or
//! network calls; a started cycle runs on its own task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{CycleReport, SyncOptions, TickOutcome};
use crate::dispatch::{DispatchLock, Dispatcher};
use crate::package::{self, Package};
use crate::queue::{ChangeQueue, ChangeRecord};

/// Drives sync cycles from the change queue to the dispatcher.
pub struct SyncController {
    queue: Arc<ChangeQueue>,
    lock: DispatchLock,
    dispatcher: Dispatcher,
    interval: Duration,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl SyncController {
    pub fn new(queue: Arc<ChangeQueue>, dispatcher: Dispatcher, options: &SyncOptions) -> Self {
        Self {
            queue,
            lock: DispatchLock::new(),
            dispatcher,
            interval: options.interval,
            on_progress: None,
        }
    }

    /// Attach a progress callback shared by every cycle.
    #[must_use]
    pub fn with_progress(mut self, on_progress: Arc<ProgressCallback>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn queue(&self) -> &Arc<ChangeQueue> {
        &self.queue
    }

    pub fn lock(&self) -> &DispatchLock {
        &self.lock
    }

    /// Run one tick.
    ///
    /// Starts a cycle only when no upload is in flight and the queue holds
    /// records. The lock is taken before the queue is drained so the next
    /// tick sees the controller as busy even while the package is building.
    pub fn tick(&self) -> TickOutcome {
        if self.lock.is_busy() {
            tracing::trace!(in_flight = self.lock.in_flight(), "Upload in flight, skipping tick");
            return TickOutcome::Busy;
        }
        if self.queue.is_empty() {
            return TickOutcome::Idle;
        }

        self.lock.acquire(self.dispatcher.targets().len());
        let batch = self.queue.drain_all();

        let handle = tokio::spawn(run_cycle(
            batch,
            self.dispatcher.clone(),
            self.lock.clone(),
            self.on_progress.clone(),
        ));
        TickOutcome::Started(handle)
    }

    /// Tick on a fixed interval until `shutdown` is set.
    ///
    /// A cycle still running when shutdown is observed is awaited, so its
    /// uploads finish (bounded by the request timeout).
    pub async fn run(self, shutdown: Arc<AtomicBool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut current: Option<JoinHandle<CycleReport>> = None;

        loop {
            ticker.tick().await;

            if shutdown.load(Ordering::SeqCst) {
                break;
            }

            if let TickOutcome::Started(handle) = self.tick() {
                current = Some(handle);
            }
        }

        if let Some(handle) = current
            && !handle.is_finished()
        {
            tracing::info!("Waiting for in-flight upload to finish");
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Sync cycle task failed");
            }
        }
        tracing::debug!(pending = self.queue.len(), "Sync controller stopped");
    }
}

/// Build a package from `batch` and upload it to every target.
///
/// The caller must already hold `lock`. It is released by the dispatcher, or
/// cleared here when there is nothing to upload.
pub async fn run_cycle(
    batch: Vec<ChangeRecord>,
    dispatcher: Dispatcher,
    lock: DispatchLock,
    on_progress: Option<Arc<ProgressCallback>>,
) -> CycleReport {
    let progress = on_progress.as_deref();
    let mut report = CycleReport {
        records: batch.len(),
        ..CycleReport::default()
    };

    tracing::debug!(
        records = batch.len(),
        targets = dispatcher.targets().len(),
        "Starting sync cycle"
    );
    emit(
        progress,
        SyncProgress::CycleStarted {
            records: batch.len(),
            targets: dispatcher.targets().len(),
        },
    );

    let build_progress = on_progress.clone();
    let built =
        tokio::task::spawn_blocking(move || package::build(&batch, build_progress.as_deref()))
            .await;

    let package = match built {
        Ok(Ok(package)) => package,
        Ok(Err(e)) => return fail_cycle(report, &lock, e.to_string(), progress),
        Err(e) => {
            return fail_cycle(report, &lock, format!("package build task failed: {e}"), progress);
        }
    };

    match &package {
        Package::Empty => {
            tracing::debug!("Nothing to install");
            lock.clear();
            emit(progress, SyncProgress::NothingToInstall);
            return report;
        }
        Package::Built(built) => {
            report.files = built.file_count;
            report.filters = built.filters.len();
            tracing::debug!(manifest = %built.manifest(), "Workspace filters");
            emit(
                progress,
                SyncProgress::PackageBuilt {
                    files: built.file_count,
                    filters: built.filters.len(),
                    bytes: built.archive.len(),
                },
            );
        }
    }

    report.dispatch = dispatcher.dispatch(&package, &lock, progress).await;

    let (succeeded, failed) = (report.dispatch.succeeded(), report.dispatch.failed());
    tracing::debug!(
        files = report.files,
        filters = report.filters,
        succeeded,
        failed,
        "Sync cycle complete"
    );
    emit(progress, SyncProgress::CycleComplete { succeeded, failed });

    report
}

fn fail_cycle(
    mut report: CycleReport,
    lock: &DispatchLock,
    error: String,
    on_progress: Option<&ProgressCallback>,
) -> CycleReport {
    tracing::debug!(error = %error, records = report.records, "Sync cycle failed, batch dropped");
    lock.clear();
    emit(
        on_progress,
        SyncProgress::CycleFailed {
            error: error.clone(),
        },
    );
    report.error = Some(error);
    report
}
