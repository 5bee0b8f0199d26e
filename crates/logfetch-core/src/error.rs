//! Retrieval error kinds.
//!
//! Everything except [`RetrievalError::StreamingFailure`] and
//! [`RetrievalError::Cancelled`] is raised before the first line reaches the
//! sink, so callers can still answer with an ordinary error status.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Bad chunk size, unsupported encoding or malformed request parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("{} is not a regular file", .0.display())]
    NotAFile(PathBuf),

    #[error("{} is not readable: {source}", path.display())]
    NotReadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An I/O failure on the file or the sink once the read loop has started.
    /// Lines already delivered stay delivered.
    #[error("streaming failed after {lines_emitted} line(s): {source}")]
    StreamingFailure {
        lines_emitted: usize,
        #[source]
        source: io::Error,
    },

    /// The consumer went away and the cancellation token fired.
    #[error("retrieval cancelled after {lines_emitted} line(s)")]
    Cancelled { lines_emitted: usize },
}

impl RetrievalError {
    /// Classify an error from opening or inspecting `path`.
    pub fn from_open(path: PathBuf, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::NotReadable { path, source: err },
        }
    }

    /// True for errors raised before any output could have been produced.
    pub fn is_pre_stream(&self) -> bool {
        !matches!(
            self,
            Self::StreamingFailure { .. } | Self::Cancelled { .. }
        )
    }

    /// Number of lines handed to the sink before the failure.
    pub fn lines_emitted(&self) -> usize {
        match self {
            Self::StreamingFailure { lines_emitted, .. } | Self::Cancelled { lines_emitted } => {
                *lines_emitted
            }
            _ => 0,
        }
    }
}
