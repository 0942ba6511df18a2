//! Progress reporting types for sync cycles.
//!
//! The engine never prints; it emits these events through an optional
//! callback and the caller decides how to render them.

use std::path::PathBuf;

/// Progress events emitted while running sync cycles.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// A cycle drained the queue and is building a package.
    CycleStarted {
        /// Records in the batch after de-duplication.
        records: usize,
        /// Number of targets the package will be sent to.
        targets: usize,
    },

    /// A file was added to the package.
    Uploading {
        /// Path inside the package, starting at `jcr_root`.
        repo_path: String,
    },

    /// A replace filter was added for a removed path.
    Deleting {
        /// Path inside the package, starting at `jcr_root`.
        repo_path: String,
    },

    /// A file could not be read and was left out of the package.
    FileSkipped {
        /// Local path of the file.
        path: PathBuf,
        /// Error message.
        error: String,
    },

    /// The batch produced no filters; nothing is sent.
    NothingToInstall,

    /// Package is finalized and about to be uploaded.
    PackageBuilt {
        /// Number of content files.
        files: usize,
        /// Number of filter rules.
        filters: usize,
        /// Archive size in bytes.
        bytes: usize,
    },

    /// A target answered the upload.
    Uploaded {
        /// `host:port` of the target.
        target: String,
        /// HTTP status code.
        status: u16,
    },

    /// A target could not be reached or rejected the upload.
    UploadFailed {
        /// `host:port` of the target.
        target: String,
        /// Error message or status description.
        error: String,
    },

    /// All targets of a cycle have answered.
    CycleComplete {
        /// Targets that accepted the package.
        succeeded: usize,
        /// Targets that failed.
        failed: usize,
    },

    /// The package could not be built; the batch is dropped.
    CycleFailed {
        /// Error message.
        error: String,
    },

    /// Warning message (non-fatal).
    Warning {
        /// Warning message.
        message: String,
    },
}

/// Callback for progress updates during sync cycles.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
