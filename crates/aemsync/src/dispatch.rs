//! Uploading built packages to every configured target.
//!
//! Each target gets its own task. The [`DispatchLock`] counts targets whose
//! upload is still in flight; every finished task releases one unit whether
//! it succeeded, failed, or panicked.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::http::{
    FormPart, HttpError, HttpRequest, HttpResponse, HttpTransport, is_success_status,
    short_error_message,
};
use crate::package::{BuiltPackage, PACKAGE_FILE_NAME, PACKAGE_NAME, Package};
use crate::sync::{ProgressCallback, SyncProgress, emit};
use crate::target::Target;

/// Number of targets with an upload still in flight.
///
/// Cloning shares the counter.
#[derive(Debug, Clone, Default)]
pub struct DispatchLock {
    in_flight: Arc<AtomicUsize>,
}

impl DispatchLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `targets` uploads as in flight.
    pub fn acquire(&self, targets: usize) {
        self.in_flight.store(targets, Ordering::SeqCst);
    }

    /// Release one in-flight upload. Never goes below zero.
    pub fn release(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Drop every in-flight mark, e.g. when a cycle ends without uploading.
    pub fn clear(&self) {
        self.in_flight.store(0, Ordering::SeqCst);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight() > 0
    }

    fn completion_guard(&self) -> CompletionGuard {
        CompletionGuard { lock: self.clone() }
    }
}

/// Releases one unit of the lock when dropped, including during a panic.
struct CompletionGuard {
    lock: DispatchLock,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// Result of uploading to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    /// `host:port` of the target.
    pub target: String,
    /// HTTP status on a response, error message otherwise.
    pub result: Result<u16, String>,
    /// Status reported by the package manager in the response body.
    pub service_status: Option<ServiceStatus>,
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        let http_ok = matches!(self.result, Ok(status) if is_success_status(status));
        let service_ok = self
            .service_status
            .as_ref()
            .is_none_or(ServiceStatus::is_success);
        http_ok && service_ok
    }
}

/// `<status code="...">message</status>` from a package manager response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub code: u16,
    pub message: String,
}

impl ServiceStatus {
    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}

/// Extract the service status from a package manager XML response.
///
/// Returns `None` for bodies without a `<status>` element (HTML error pages,
/// empty bodies).
pub fn parse_service_status(body: &[u8]) -> Option<ServiceStatus> {
    let text = std::str::from_utf8(body).ok()?;
    let mut reader = Reader::from_str(text);
    let mut code: Option<u16> = None;
    let mut message = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"status" => {
                code = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == b"code")
                    .and_then(|a| a.unescape_value().ok()?.trim().parse().ok());
            }
            Ok(Event::Text(t)) if code.is_some() => {
                if let Ok(s) = t.unescape() {
                    message.push_str(s.trim());
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"status" => {
                return code.map(|code| ServiceStatus { code, message });
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Summary of one dispatch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// One entry per target, in configuration order.
    pub outcomes: Vec<TargetOutcome>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Builds the package manager request for one target.
pub fn upload_request(target: &Target, package: &BuiltPackage) -> HttpRequest {
    let mut headers = Vec::new();
    if let Some(auth) = target.basic_auth() {
        headers.push(("Authorization".to_string(), auth));
    }

    HttpRequest {
        url: target.endpoint(),
        headers,
        form: vec![
            FormPart::File {
                name: "file".to_string(),
                file_name: PACKAGE_FILE_NAME.to_string(),
                content_type: "application/zip".to_string(),
                bytes: package.archive.to_vec(),
            },
            FormPart::text("name", PACKAGE_NAME),
            FormPart::text("force", "true"),
            FormPart::text("install", "true"),
        ],
    }
}

/// Sends packages to a fixed list of targets.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn HttpTransport>,
    targets: Arc<[Target]>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn HttpTransport>, targets: Vec<Target>) -> Self {
        Self {
            transport,
            targets: targets.into(),
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Upload `package` to every target concurrently and wait for all of them.
    ///
    /// The lock is set to the target count before the first request and is
    /// back at zero when this returns. An empty package sends nothing and
    /// clears the lock.
    pub async fn dispatch(
        &self,
        package: &Package,
        lock: &DispatchLock,
        on_progress: Option<&ProgressCallback>,
    ) -> DispatchReport {
        let Package::Built(package) = package else {
            lock.clear();
            return DispatchReport::default();
        };

        lock.acquire(self.targets.len());

        let mut handles = Vec::with_capacity(self.targets.len());
        for target in self.targets.iter() {
            let transport = Arc::clone(&self.transport);
            let request = upload_request(target, package);
            let guard = lock.completion_guard();

            let handle = tokio::spawn(async move {
                let _guard = guard;
                transport.send(request).await
            });
            handles.push((target.label(), handle));
        }

        let mut report = DispatchReport {
            outcomes: Vec::with_capacity(handles.len()),
        };

        for (target, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(response)) => response_outcome(target, &response),
                Ok(Err(e)) => error_outcome(target, &e),
                Err(e) => TargetOutcome {
                    target,
                    result: Err(format!("upload task failed: {e}")),
                    service_status: None,
                },
            };
            report_outcome(&outcome, on_progress);
            report.outcomes.push(outcome);
        }

        report
    }
}

fn response_outcome(target: String, response: &HttpResponse) -> TargetOutcome {
    TargetOutcome {
        target,
        result: Ok(response.status),
        service_status: parse_service_status(&response.body),
    }
}

fn error_outcome(target: String, error: &HttpError) -> TargetOutcome {
    TargetOutcome {
        target,
        result: Err(short_error_message(error)),
        service_status: None,
    }
}

fn report_outcome(outcome: &TargetOutcome, on_progress: Option<&ProgressCallback>) {
    match &outcome.result {
        Ok(status) => {
            tracing::debug!(
                server = %outcome.target,
                status,
                service_status = ?outcome.service_status,
                "Upload delivered"
            );
            emit(
                on_progress,
                SyncProgress::Uploaded {
                    target: outcome.target.clone(),
                    status: *status,
                },
            );
            if let Some(service) = outcome.service_status.as_ref().filter(|s| !s.is_success()) {
                emit(
                    on_progress,
                    SyncProgress::Warning {
                        message: format!(
                            "{}: package manager reported {} {}",
                            outcome.target, service.code, service.message
                        ),
                    },
                );
            }
        }
        Err(error) => {
            tracing::debug!(server = %outcome.target, error = %error, "Upload failed");
            emit(
                on_progress,
                SyncProgress::UploadFailed {
                    target: outcome.target.clone(),
                    error: error.clone(),
                },
            );
        }
    }
}
