//! Mapping of local filesystem paths onto repository paths and workspace filters.
//!
//! A file at `/proj/jcr_root/apps/foo/.content.xml` lives at repository path
//! `jcr_root/apps/foo/.content.xml` inside a package and is covered by a
//! workspace filter rooted at `/apps/foo`.

use std::path::Path;

use thiserror::Error;

/// Path segment that marks the start of repository-relative paths.
pub const REPO_ROOT_MARKER: &str = "jcr_root";

/// Suffix of directories that hold a node's children when the node itself is
/// serialized as a sibling `.xml` file.
pub const DIR_SUFFIX: &str = ".dir";

/// Trailing segment (after `.xml` stripping) of a node's content descriptor.
pub const CONTENT_DESCRIPTOR: &str = "/.content";

/// Child node that holds the properties described by a content descriptor.
pub const JCR_CONTENT: &str = "jcr:content";

/// Errors that can occur when classifying a local path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("path does not contain a {REPO_ROOT_MARKER} segment: {0}")]
    MissingMarker(String),

    #[error("path points at the {REPO_ROOT_MARKER} directory itself: {0}")]
    EmptyRepositoryPath(String),
}

/// Include/exclude pair restricting a filter to a node's own properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeExclude {
    /// Pattern excluding everything below the node.
    pub exclude: String,
    /// Pattern re-including the node's `jcr:content` child.
    pub include: String,
}

/// Result of classifying a single local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Archive location, starting at the `jcr_root` segment.
    pub repo_path: String,
    /// Root attribute of the workspace filter.
    pub filter: String,
    /// Present when only a content descriptor changed.
    pub include_exclude: Option<IncludeExclude>,
}

impl Classification {
    /// Whether this path is a node's content descriptor.
    pub fn is_content_descriptor(&self) -> bool {
        self.include_exclude.is_some()
    }
}

/// Normalize a local path to a `/`-separated string.
pub fn normalize(local_path: &Path) -> String {
    local_path.to_string_lossy().replace('\\', "/")
}

/// Byte offset of the first segment named exactly [`REPO_ROOT_MARKER`].
fn marker_offset(path: &str) -> Option<usize> {
    let mut offset = 0;
    for segment in path.split('/') {
        if segment == REPO_ROOT_MARKER {
            return Some(offset);
        }
        offset += segment.len() + 1;
    }
    None
}

/// Project a local path onto the repository, starting at the marker segment.
pub fn repo_path(local_path: &Path) -> Result<String, ClassifyError> {
    let normalized = normalize(local_path);
    let start = marker_offset(&normalized)
        .ok_or_else(|| ClassifyError::MissingMarker(normalized.clone()))?;

    let repo_path = normalized[start..].trim_end_matches('/');
    if repo_path.len() == REPO_ROOT_MARKER.len() {
        return Err(ClassifyError::EmptyRepositoryPath(normalized));
    }
    Ok(repo_path.to_string())
}

/// Derive the workspace filter root for a repository path.
///
/// Drops the marker prefix, the `.dir` suffix of every segment and any
/// trailing `.xml`, so `jcr_root/apps/foo.dir/bar.xml` becomes `/apps/foo/bar`.
/// A segment is never stripped down to nothing: `.dir` and `.xml` on their
/// own are kept as names.
pub fn filter_root(repo_path: &str) -> String {
    let relative = repo_path
        .strip_prefix(REPO_ROOT_MARKER)
        .unwrap_or(repo_path);

    let mut filter = relative
        .split('/')
        .map(|segment| strip_segment_suffix(segment, DIR_SUFFIX).unwrap_or(segment))
        .collect::<Vec<_>>()
        .join("/");

    loop {
        if let Some(stripped) = strip_segment_suffix(&filter, ".xml") {
            filter.truncate(stripped.len());
        } else if let Some(stripped) = strip_segment_suffix(&filter, DIR_SUFFIX) {
            filter.truncate(stripped.len());
        } else {
            break;
        }
    }
    filter
}

/// Strip `suffix` unless that would leave the last segment empty.
fn strip_segment_suffix<'a>(path: &'a str, suffix: &str) -> Option<&'a str> {
    path.strip_suffix(suffix)
        .filter(|rest| !rest.is_empty() && !rest.ends_with('/'))
}

/// Classify a local path into its repository path and filter rule.
pub fn classify(local_path: &Path) -> Result<Classification, ClassifyError> {
    let repo_path = repo_path(local_path)?;
    let mut filter = filter_root(&repo_path);

    let descriptor_node = filter.strip_suffix(CONTENT_DESCRIPTOR).map(str::to_string);
    let include_exclude = descriptor_node.map(|node| {
        filter = node;
        IncludeExclude {
            exclude: format!("{filter}/.*"),
            include: format!("{filter}/{JCR_CONTENT}"),
        }
    });

    Ok(Classification {
        repo_path,
        filter,
        include_exclude,
    })
}
