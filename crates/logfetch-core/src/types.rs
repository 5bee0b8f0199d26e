//! Core types for logfetch-core.
//!
//! [`RetrievalRequest`] describes one backward read and is immutable once
//! built; [`RetrievalSummary`] reports what the read did.

use std::path::{Path, PathBuf};

use crate::error::RetrievalError;
use crate::transcode::LogEncoding;

/// Parameters of a single backward read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    path: PathBuf,
    encoding: LogEncoding,
    chunk_size: usize,
    max_lines: Option<usize>,
    keyword: Option<String>,
}

impl RetrievalRequest {
    /// Build a request, rejecting chunk sizes that would split a code unit
    /// of `encoding`.
    pub fn new(
        path: impl Into<PathBuf>,
        encoding: LogEncoding,
        chunk_size: usize,
    ) -> Result<Self, RetrievalError> {
        encoding.validate_chunk_size(chunk_size)?;
        Ok(Self {
            path: path.into(),
            encoding,
            chunk_size,
            max_lines: None,
            keyword: None,
        })
    }

    /// Limit the number of emitted lines. `None` reads the whole file.
    pub fn with_max_lines(mut self, max_lines: Option<usize>) -> Self {
        self.max_lines = max_lines;
        self
    }

    /// Only emit lines containing `keyword`. An empty keyword disables the
    /// filter.
    pub fn with_keyword(mut self, keyword: Option<String>) -> Self {
        self.keyword = keyword.filter(|k| !k.is_empty());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoding(&self) -> LogEncoding {
        self.encoding
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn max_lines(&self) -> Option<usize> {
        self.max_lines
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }
}

/// Counters reported at the end of a retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrievalSummary {
    /// Lines handed to the sink.
    pub lines_emitted: usize,
    /// Lines segmented, whether or not they matched the keyword.
    pub lines_scanned: usize,
    pub chunks_read: usize,
    pub bytes_read: u64,
}
