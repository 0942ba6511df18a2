//! Timer-driven sync cycles.
//!
//! # Module Structure
//!
//! - [`types`] - `SyncOptions`, `CycleReport`, `TickOutcome`, constants
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`controller`] - `SyncController`: drains the queue and runs cycles
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use aemsync::dispatch::Dispatcher;
//! use aemsync::http::reqwest_transport::ReqwestTransport;
//! use aemsync::queue::ChangeQueue;
//! use aemsync::sync::{SyncController, SyncOptions};
//!
//! let options = SyncOptions::default();
//! let transport = ReqwestTransport::with_timeout(options.request_timeout)?;
//! let dispatcher = Dispatcher::new(Arc::new(transport), targets);
//! let controller = SyncController::new(Arc::new(ChangeQueue::new()), dispatcher, &options);
//! controller.run(shutdown_flag).await;
//! ```

pub mod controller;
mod progress;
mod types;

pub use controller::{SyncController, run_cycle};
pub use progress::{ProgressCallback, SyncProgress, emit};
pub use types::{
    CycleReport, DEFAULT_INTERVAL_MS, DEFAULT_REQUEST_TIMEOUT_SECS, SyncOptions, TickOutcome,
};
