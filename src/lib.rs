//! logfetch: Log Fetcher.
//!
//! HTTP service returning the latest lines of a log file, newest first,
//! optionally keyword-filtered, either from this host (`/logs`) or merged
//! from several logfetch servers (`/logs-from-servers`).
//!
//! # Architecture
//!
//! ```text
//! routes ──► logfetch_core::ReverseFileReader ──► BackpressureSink ──► response body
//!    │
//!    └─────► logfetch_remote::MultiSourceAggregator ──► BackpressureSink ──► response body
//! ```
//!
//! Each request runs its retrieval on a background task that feeds the
//! response body through a bounded channel. Dropping the body (client
//! disconnect) cancels the task.

pub mod fixtures;
pub mod routes;
pub mod server;

pub use routes::{router, AppState};
