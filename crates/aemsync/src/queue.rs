//! Pending change records awaiting the next sync cycle.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// What to do with a changed path on the remote server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// The path exists locally and should be (re)installed.
    Upload,
    /// The path was removed locally and should be removed remotely.
    Delete,
}

impl Action {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Upload => "U",
            Action::Delete => "D",
        }
    }
}

/// A single queued change.
///
/// Identity is the action plus the raw path text, so `a//b` and `a/b` are
/// different records even though they name the same file.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub action: Action,
    pub local_path: PathBuf,
}

impl ChangeRecord {
    pub fn new(action: Action, local_path: impl Into<PathBuf>) -> Self {
        Self {
            action,
            local_path: local_path.into(),
        }
    }

    pub fn upload(local_path: impl Into<PathBuf>) -> Self {
        Self::new(Action::Upload, local_path)
    }

    pub fn delete(local_path: impl Into<PathBuf>) -> Self {
        Self::new(Action::Delete, local_path)
    }

    pub fn path(&self) -> &Path {
        &self.local_path
    }
}

impl PartialEq for ChangeRecord {
    fn eq(&self, other: &Self) -> bool {
        self.action == other.action && self.local_path.as_os_str() == other.local_path.as_os_str()
    }
}

impl Eq for ChangeRecord {}

impl Hash for ChangeRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.action.hash(state);
        self.local_path.as_os_str().hash(state);
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action.as_str(), self.local_path.display())
    }
}

/// Thread-safe ordered queue of change records.
///
/// Pushes come from the watcher thread, drains from the sync timer. Exact
/// duplicates are collapsed at drain time; an upload and a delete of the same
/// path are distinct records and both survive in push order.
#[derive(Debug, Default)]
pub struct ChangeQueue {
    records: Mutex<Vec<ChangeRecord>>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: ChangeRecord) {
        tracing::trace!(record = %record, "Queued change");
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }

    /// Take every pending record, leaving the queue empty.
    ///
    /// Returns records in push order with only the first occurrence of each
    /// identical record kept.
    pub fn drain_all(&self) -> Vec<ChangeRecord> {
        let drained = std::mem::take(&mut *self.records.lock().unwrap_or_else(|e| e.into_inner()));
        dedup_first(drained)
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn dedup_first(records: Vec<ChangeRecord>) -> Vec<ChangeRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert(record.clone()))
        .collect()
}
