//! Watch a content tree and sync it until interrupted.

use std::path::Path;
use std::sync::Arc;

use aemsync::http::reqwest_transport::ReqwestTransport;
use aemsync::{
    ChangeQueue, ChangeWatcher, Dispatcher, SyncController, SyncOptions, Target, parse_targets,
};
use console::style;

use crate::progress::ProgressReporter;
use crate::shutdown;

/// Exit code for unusable target URLs.
const EXIT_INVALID_TARGETS: i32 = 2;

/// Run the watcher and the sync loop until shutdown.
///
/// An unusable watch path is logged and leaves the process running without
/// a watcher, so nothing is ever queued.
pub(crate) async fn handle_watch(
    targets: &str,
    path: &Path,
    options: SyncOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let targets = match parse_targets(targets) {
        Ok(targets) => targets,
        Err(e) => {
            eprintln!("{} {e}", style("error:").red().bold());
            std::process::exit(EXIT_INVALID_TARGETS);
        }
    };

    let reporter = Arc::new(ProgressReporter::new());
    let queue = Arc::new(ChangeQueue::new());

    let _watcher = match ChangeWatcher::start(path, Arc::clone(&queue)) {
        Ok(watcher) => {
            let labels: Vec<String> = targets.iter().map(Target::label).collect();
            reporter.watching(watcher.root(), options.interval, &labels);
            Some(watcher)
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Invalid path");
            None
        }
    };

    let transport = ReqwestTransport::with_timeout(options.request_timeout)?;
    let dispatcher = Dispatcher::new(Arc::new(transport), targets);
    let controller =
        SyncController::new(queue, dispatcher, &options).with_progress(reporter.as_callback());

    controller.run(shutdown::shutdown_flag()).await;
    Ok(())
}
