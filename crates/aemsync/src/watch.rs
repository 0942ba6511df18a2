//! Filesystem change source.
//!
//! Watches a content tree recursively and turns every relevant event into a
//! [`ChangeRecord`] on the shared queue. Whether a path becomes an upload or
//! a delete is decided by whether it exists when the event arrives.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;

use crate::classify::REPO_ROOT_MARKER;
use crate::queue::{Action, ChangeQueue, ChangeRecord};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch path '{}' is not a directory", .0.display())]
    InvalidPath(PathBuf),

    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Whether a changed path should be queued.
///
/// The path must contain a `jcr_root` segment followed by at least one more
/// segment. No segment before the marker and no directory after it may be
/// hidden. The last segment may be (`.content.xml` is the common case).
pub fn is_watchable(path: &Path) -> bool {
    let segments: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();

    let Some(marker) = segments.iter().position(|s| *s == REPO_ROOT_MARKER) else {
        return false;
    };
    let inner = &segments[marker + 1..];
    let Some((_, dirs)) = inner.split_last() else {
        return false;
    };

    let hidden = |s: &&str| s.starts_with('.');
    !segments[..marker].iter().any(hidden) && !dirs.iter().any(hidden)
}

/// Upload when the path is present, delete otherwise.
pub fn action_for(path: &Path) -> Action {
    if path.symlink_metadata().is_ok() {
        Action::Upload
    } else {
        Action::Delete
    }
}

/// Queue every watchable path of a notify event. Access events are ignored.
pub fn handle_event(event: &Event, queue: &ChangeQueue) {
    if matches!(event.kind, EventKind::Access(_)) {
        return;
    }
    for path in &event.paths {
        if !is_watchable(path) {
            continue;
        }
        queue.push(ChangeRecord::new(action_for(path), path));
    }
}

/// A running recursive watcher. Events stop when this is dropped.
pub struct ChangeWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ChangeWatcher {
    /// Start watching `root` and push changes into `queue`.
    pub fn start(root: &Path, queue: Arc<ChangeQueue>) -> Result<Self, WatchError> {
        if !root.is_dir() {
            return Err(WatchError::InvalidPath(root.to_path_buf()));
        }

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => handle_event(&event, &queue),
            Err(e) => tracing::warn!(error = %e, "File watcher error"),
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        tracing::debug!(root = %root.display(), "File watcher started");
        Ok(Self {
            root: root.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
