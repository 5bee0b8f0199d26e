//! logfetch-core: reverse log-tailing engine.
//!
//! This crate reads a log file backward in bounded chunks and streams its
//! lines newest-first into a [`LineSink`]. Nothing here knows about HTTP; the
//! server and the multi-server aggregator sit on top of it.
//!
//! # Architecture
//!
//! ```text
//! file ──► ReverseFileReader ──► Transcoder ──► BackwardSegmenter ──► LineSink
//!              (cursor)            (UTF-8)        (carry, scanner)     (backpressure)
//! ```
//!
//! Each retrieval is a single task. Suspension points are the chunk reads and
//! the sink writes; a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! is checked at both.

pub mod config;
pub mod error;
pub mod reader;
pub mod scanner;
pub mod segmenter;
pub mod sink;
pub mod transcode;
pub mod types;

pub use error::RetrievalError;
pub use reader::{retrieve, ReverseFileReader};
pub use sink::{BackpressureSink, ChannelTransport, LineSink, Transport, WriteStatus};
pub use transcode::LogEncoding;
pub use types::{RetrievalRequest, RetrievalSummary};
