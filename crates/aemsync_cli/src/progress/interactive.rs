use std::path::Path;
use std::time::Duration;

use aemsync::http::is_success_status;
use aemsync::sync::SyncProgress;
use console::{Term, style};

/// Line-per-event reporter for terminals.
pub struct InteractiveReporter {
    term: Term,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    pub fn handle(&self, event: SyncProgress) {
        if let Some(line) = render(&event) {
            let _ = self.term.write_line(&line);
        }
    }

    pub fn watching(&self, path: &Path, interval: Duration, targets: &[String]) {
        let _ = self.term.write_line(&format!(
            "Watching: {}. Update interval: {} ms.",
            style(path.display()).cyan(),
            interval.as_millis()
        ));
        for target in targets {
            let _ = self
                .term
                .write_line(&format!("  {} {}", style("→").dim(), target));
        }
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// The terminal line for an event, if it gets one.
fn render(event: &SyncProgress) -> Option<String> {
    let line = match event {
        SyncProgress::Uploading { repo_path } => format!("Upload: {repo_path}"),
        SyncProgress::Deleting { repo_path } => format!("Delete: {repo_path}"),
        SyncProgress::FileSkipped { path, error } => format!(
            "{} {} ({})",
            style("Skipped:").yellow().bold(),
            path.display(),
            error
        ),
        SyncProgress::NothingToInstall => style("Nothing to install").dim().to_string(),
        SyncProgress::Uploaded { target, status } => {
            let status = if is_success_status(*status) {
                style(status).green()
            } else {
                style(status).red()
            };
            format!("  {target} -> {status}")
        }
        SyncProgress::UploadFailed { target, error } => {
            format!("  {target} -> {}", style(error).red())
        }
        SyncProgress::CycleFailed { error } => {
            format!("{} {error}", style("Sync failed:").red().bold())
        }
        SyncProgress::Warning { message } => {
            format!("{} {message}", style("⚠").yellow())
        }
        _ => return None,
    };
    Some(line)
}
