use std::path::Path;
use std::time::Duration;

use aemsync::http::is_success_status;
use aemsync::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn watching(&self, path: &Path, interval: Duration, targets: &[String]) {
        tracing::info!(
            path = %path.display(),
            interval_ms = interval.as_millis() as u64,
            targets = %targets.join(","),
            "Watching"
        );
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::CycleStarted { records, targets } => {
                tracing::debug!(records, targets, "Sync cycle started");
            }

            SyncProgress::Uploading { repo_path } => {
                tracing::info!(path = %repo_path, "Upload");
            }

            SyncProgress::Deleting { repo_path } => {
                tracing::info!(path = %repo_path, "Delete");
            }

            SyncProgress::FileSkipped { path, error } => {
                tracing::warn!(path = %path.display(), error = %error, "Skipped unreadable file");
            }

            SyncProgress::NothingToInstall => {
                tracing::debug!("Nothing to install");
            }

            SyncProgress::PackageBuilt {
                files,
                filters,
                bytes,
            } => {
                tracing::debug!(files, filters, bytes, "Package built");
            }

            SyncProgress::Uploaded { target, status } => {
                if is_success_status(status) {
                    tracing::info!(server = %target, status, "Installed");
                } else {
                    tracing::warn!(server = %target, status, "Upload rejected");
                }
            }

            SyncProgress::UploadFailed { target, error } => {
                tracing::warn!(server = %target, error = %error, "Upload failed");
            }

            SyncProgress::CycleComplete { succeeded, failed } => {
                tracing::debug!(succeeded, failed, "Sync cycle complete");
            }

            SyncProgress::CycleFailed { error } => {
                tracing::error!(error = %error, "Sync cycle failed");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
