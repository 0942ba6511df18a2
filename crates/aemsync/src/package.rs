//! Building installable content packages from a batch of change records.
//!
//! A package is a zip archive holding the vault metadata skeleton, every
//! uploaded file at its repository path, and a `META-INF/vault/filter.xml`
//! listing one workspace filter per record in batch order.
//!
//! # Example
//!
//! ```ignore
//! use aemsync::package::{Package, build};
//! use aemsync::queue::ChangeRecord;
//!
//! let batch = vec![ChangeRecord::upload("/proj/jcr_root/apps/foo/.content.xml")];
//! match build(&batch, None)? {
//!     Package::Empty => println!("nothing to install"),
//!     Package::Built(pkg) => println!("{} files, {} bytes", pkg.file_count, pkg.archive.len()),
//! }
//! ```

mod archive;
mod filter;

use std::io::ErrorKind;
use std::sync::Arc;

use thiserror::Error;

pub use archive::{ArchiveError, BOOTSTRAP_ENTRIES, PackageArchive};
pub use filter::{FILTER_MANIFEST_PATH, FilterRule, render_manifest};

use crate::classify::classify;
use crate::queue::{Action, ChangeRecord};
use crate::sync::{ProgressCallback, SyncProgress, emit};

/// Package name reported to the package manager.
pub const PACKAGE_NAME: &str = "aemsync";

/// File name of the uploaded archive.
pub const PACKAGE_FILE_NAME: &str = "aemsync.zip";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("failed to assemble package archive: {0}")]
    Archive(#[from] ArchiveError),
}

/// A finalized package ready for upload.
#[derive(Debug, Clone)]
pub struct BuiltPackage {
    /// Finalized zip bytes, shared between upload tasks.
    pub archive: Arc<Vec<u8>>,
    /// Filter rules in manifest order.
    pub filters: Vec<FilterRule>,
    /// Number of content files in the archive.
    pub file_count: usize,
}

impl BuiltPackage {
    /// The rendered `filter.xml` document.
    pub fn manifest(&self) -> String {
        render_manifest(&self.filters)
    }
}

/// Output of a build: either nothing to install or a finished package.
#[derive(Debug, Clone)]
pub enum Package {
    Empty,
    Built(BuiltPackage),
}

impl Package {
    pub fn is_empty(&self) -> bool {
        matches!(self, Package::Empty)
    }
}

/// Build a package from a drained batch.
///
/// Uploads whose path is no longer a plain file are skipped silently. A file
/// that exists but cannot be read is skipped and reported as
/// [`SyncProgress::FileSkipped`]; the rest of the batch is still packaged.
/// Only failures of the archive writer itself abort the build.
pub fn build(
    batch: &[ChangeRecord],
    on_progress: Option<&ProgressCallback>,
) -> Result<Package, PackageError> {
    let mut archive = PackageArchive::with_bootstrap()?;
    let mut filters: Vec<FilterRule> = Vec::new();

    for record in batch {
        let classification = match classify(record.path()) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(record = %record, error = %e, "Skipping unclassifiable path");
                emit(
                    on_progress,
                    SyncProgress::Warning {
                        message: e.to_string(),
                    },
                );
                continue;
            }
        };

        match record.action {
            Action::Upload => {
                match std::fs::symlink_metadata(record.path()) {
                    Ok(meta) if meta.is_file() => {}
                    Ok(_) => {
                        tracing::debug!(path = %record.path().display(), "Not a plain file, skipping");
                        continue;
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        tracing::debug!(path = %record.path().display(), "File vanished before build, skipping");
                        continue;
                    }
                    Err(e) => {
                        skip_file(record, &e, on_progress);
                        continue;
                    }
                }

                let bytes = match std::fs::read(record.path()) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        skip_file(record, &e, on_progress);
                        continue;
                    }
                };

                match archive.add_file(&classification.repo_path, &bytes) {
                    Ok(()) => {}
                    Err(ArchiveError::DuplicateEntry(path)) => {
                        let message = format!("{path} is already in this package, skipping");
                        tracing::debug!(record = %record, "{message}");
                        emit(on_progress, SyncProgress::Warning { message });
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }

                emit(
                    on_progress,
                    SyncProgress::Uploading {
                        repo_path: classification.repo_path.clone(),
                    },
                );
                filters.push(FilterRule::for_upload(&classification));
            }
            Action::Delete => {
                // Deleting a descriptor replaces the whole node, not just its properties.
                if classification.is_content_descriptor() {
                    let message = format!(
                        "{} deleted; replace filter removes the whole node at {}",
                        classification.repo_path, classification.filter
                    );
                    tracing::debug!("{message}");
                    emit(on_progress, SyncProgress::Warning { message });
                }

                emit(
                    on_progress,
                    SyncProgress::Deleting {
                        repo_path: classification.repo_path.clone(),
                    },
                );
                filters.push(FilterRule::for_delete(&classification));
            }
        }
    }

    if filters.is_empty() {
        tracing::debug!(records = batch.len(), "No filters produced, nothing to install");
        return Ok(Package::Empty);
    }

    let manifest = render_manifest(&filters);
    archive.add_static_entry(FILTER_MANIFEST_PATH, manifest.as_bytes())?;
    let file_count = archive.file_count();
    let bytes = archive.finish()?;

    tracing::debug!(
        files = file_count,
        filters = filters.len(),
        bytes = bytes.len(),
        "Package built"
    );

    Ok(Package::Built(BuiltPackage {
        archive: Arc::new(bytes),
        filters,
        file_count,
    }))
}

fn skip_file(record: &ChangeRecord, error: &std::io::Error, on_progress: Option<&ProgressCallback>) {
    tracing::debug!(path = %record.path().display(), error = %error, "Failed to read file, skipping");
    emit(
        on_progress,
        SyncProgress::FileSkipped {
            path: record.local_path.clone(),
            error: error.to_string(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use std::path::Path;
    use std::sync::Mutex;

    use zip::ZipArchive;

    fn content_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("jcr_root/apps/foo")).unwrap();
        dir
    }

    fn write(root: &Path, rel: &str, contents: &str) -> std::path::PathBuf {
        let path = root.join(rel);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn entry_names(pkg: &BuiltPackage) -> Vec<String> {
        let zip = ZipArchive::new(Cursor::new(pkg.archive.as_slice())).unwrap();
        zip.file_names().map(str::to_string).collect()
    }

    fn read_entry(pkg: &BuiltPackage, name: &str) -> String {
        let mut zip = ZipArchive::new(Cursor::new(pkg.archive.as_slice())).unwrap();
        let mut out = String::new();
        zip.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    fn built(package: Package) -> BuiltPackage {
        match package {
            Package::Built(pkg) => pkg,
            Package::Empty => panic!("expected a built package"),
        }
    }

    #[test]
    fn empty_batch_builds_empty_package() {
        assert!(build(&[], None).unwrap().is_empty());
    }

    #[test]
    fn missing_upload_files_build_empty_package() {
        let dir = content_tree();
        let batch = vec![ChangeRecord::upload(dir.path().join("jcr_root/apps/foo/gone.txt"))];
        assert!(build(&batch, None).unwrap().is_empty());
    }

    #[test]
    fn directories_are_not_uploaded() {
        let dir = content_tree();
        let batch = vec![ChangeRecord::upload(dir.path().join("jcr_root/apps/foo"))];
        assert!(build(&batch, None).unwrap().is_empty());
    }

    #[test]
    fn descriptor_upload_produces_entry_and_restricted_filter() {
        let dir = content_tree();
        let path = write(dir.path(), "jcr_root/apps/foo/.content.xml", "<jcr:root/>");

        let pkg = built(build(&[ChangeRecord::upload(&path)], None).unwrap());
        assert_eq!(pkg.file_count, 1);
        assert_eq!(pkg.filters.len(), 1);
        assert_eq!(read_entry(&pkg, "jcr_root/apps/foo/.content.xml"), "<jcr:root/>");

        let manifest = read_entry(&pkg, FILTER_MANIFEST_PATH);
        assert!(manifest.contains(
            r#"<filter root="/apps/foo"><exclude pattern="/apps/foo/.*" /><include pattern="/apps/foo/jcr:content" /></filter>"#
        ));
        assert_eq!(manifest, pkg.manifest());
    }

    #[test]
    fn package_carries_bootstrap_entries() {
        let dir = content_tree();
        let path = write(dir.path(), "jcr_root/apps/foo/a.txt", "a");
        let pkg = built(build(&[ChangeRecord::upload(&path)], None).unwrap());

        let names = entry_names(&pkg);
        for (bootstrap, _) in BOOTSTRAP_ENTRIES {
            assert!(names.iter().any(|n| n == bootstrap), "missing {bootstrap}");
        }
        assert!(names.iter().any(|n| n == FILTER_MANIFEST_PATH));
    }

    #[test]
    fn delete_produces_replace_filter_without_entry() {
        let dir = content_tree();
        let path = dir.path().join("jcr_root/apps/foo/old.html");

        let pkg = built(build(&[ChangeRecord::delete(&path)], None).unwrap());
        assert_eq!(pkg.file_count, 0);
        assert_eq!(
            pkg.filters,
            vec![FilterRule::Replace {
                root: "/apps/foo/old.html".to_string()
            }]
        );
        assert!(!entry_names(&pkg).iter().any(|n| n.starts_with("jcr_root/")));
    }

    #[test]
    fn upload_then_delete_of_existing_file_emits_both_rules_in_order() {
        let dir = content_tree();
        let path = write(dir.path(), "jcr_root/apps/foo/.content.xml", "x");

        let batch = vec![ChangeRecord::upload(&path), ChangeRecord::delete(&path)];
        let pkg = built(build(&batch, None).unwrap());

        assert_eq!(pkg.file_count, 1);
        assert_eq!(pkg.filters.len(), 2);
        assert!(matches!(&pkg.filters[0], FilterRule::Include { root, .. } if root == "/apps/foo"));
        assert!(matches!(&pkg.filters[1], FilterRule::Replace { root } if root == "/apps/foo"));
    }

    #[test]
    fn upload_then_delete_of_missing_file_emits_only_replace() {
        let dir = content_tree();
        let path = dir.path().join("jcr_root/apps/foo/.content.xml");

        let batch = vec![ChangeRecord::upload(&path), ChangeRecord::delete(&path)];
        let pkg = built(build(&batch, None).unwrap());

        assert_eq!(pkg.file_count, 0);
        assert_eq!(
            pkg.filters,
            vec![FilterRule::Replace {
                root: "/apps/foo".to_string()
            }]
        );
    }

    #[test]
    fn unclassifiable_records_are_skipped_with_warning() {
        let events = std::sync::Arc::new(Mutex::new(Vec::new()));
        let capture = std::sync::Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            capture.lock().unwrap_or_else(|e| e.into_inner()).push(event);
        });

        let batch = vec![ChangeRecord::delete("/somewhere/else.txt")];
        assert!(build(&batch, Some(&callback)).unwrap().is_empty());

        let events = events.lock().unwrap();
        assert!(matches!(events.as_slice(), [SyncProgress::Warning { .. }]));
    }

    #[test]
    fn descriptor_delete_is_flagged() {
        let events = std::sync::Arc::new(Mutex::new(Vec::new()));
        let capture = std::sync::Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            capture.lock().unwrap_or_else(|e| e.into_inner()).push(event);
        });

        let batch = vec![ChangeRecord::delete("/p/jcr_root/apps/foo/.content.xml")];
        let pkg = built(build(&batch, Some(&callback)).unwrap());
        assert_eq!(
            pkg.filters,
            vec![FilterRule::Replace {
                root: "/apps/foo".to_string()
            }]
        );

        let events = events.lock().unwrap();
        assert!(matches!(events[0], SyncProgress::Warning { .. }));
        assert!(matches!(&events[1], SyncProgress::Deleting { repo_path } if repo_path == "jcr_root/apps/foo/.content.xml"));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_skipped_and_cycle_continues() {
        use std::os::unix::fs::PermissionsExt;

        let dir = content_tree();
        let locked = write(dir.path(), "jcr_root/apps/foo/locked.txt", "secret");
        let fine = write(dir.path(), "jcr_root/apps/foo/fine.txt", "ok");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Root can read anything; nothing to assert in that environment.
        if std::fs::read(&locked).is_ok() {
            return;
        }

        let events = std::sync::Arc::new(Mutex::new(Vec::new()));
        let capture = std::sync::Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            capture.lock().unwrap_or_else(|e| e.into_inner()).push(event);
        });

        let batch = vec![ChangeRecord::upload(&locked), ChangeRecord::upload(&fine)];
        let pkg = built(build(&batch, Some(&callback)).unwrap());
        assert_eq!(pkg.file_count, 1);
        assert_eq!(pkg.filters.len(), 1);

        let events = events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(e, SyncProgress::FileSkipped { .. })));
    }
}
