//! logfetch-remote: fan a log retrieval out to several logfetch servers.
//!
//! Each remote `/logs` response is streamed chunk by chunk and re-emitted as
//! NUL-terminated frames on one shared output:
//!
//! ```text
//! <endpoint-url>\n<chunk bytes>\0
//! ```
//!
//! A failing endpoint produces an `Error: ...` frame instead of failing its
//! siblings. Only a failure of the shared output aborts the aggregate.

pub mod aggregate;
pub mod fetch;
pub mod frame;

pub use aggregate::{AggregateError, AggregateSummary, MultiSourceAggregator};
pub use fetch::{ChunkStream, EndpointError, HttpFetcher, SourceFetcher};
pub use frame::{Frame, FrameDecoder, TruncatedStream, FRAME_TERMINATOR};
