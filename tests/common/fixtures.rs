//! Log corpora and helpers for putting them on disk and reading them back.

use bytes::Bytes;
use logfetch_core::{retrieve, LogEncoding, RetrievalRequest, RetrievalSummary};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Mixed-shape lines as they show up in real service logs.
pub const CORPUS_MIXED: &[&str] = &[
    r#"{"ts":"2024-01-15T10:00:00Z","level":"INFO","message":"api-gateway started"}"#,
    "ts=2024-01-15T10:00:01Z level=info msg=\"auth-service ready\" port=9090",
    "2024-01-15 10:00:02 ERROR worker-1: task queue overflow",
    r#"{"ts":"2024-01-15T10:00:03Z","level":"ERROR","request_id":"req-xyz","message":"upstream timeout"}"#,
    "",
    "ts=2024-01-15T10:00:04Z level=warn msg=\"retry\" attempt=2 max=3",
    "2024-01-15 10:00:05 INFO  Graceful shutdown complete — bye ✓",
];

/// `Test log line 0\n` .. `Test log line {n-1}\n`; the first `with_keyword`
/// lines also carry `special_keyword`.
pub fn numbered_lines(n: usize, with_keyword: usize) -> String {
    (0..n)
        .map(|i| {
            if i < with_keyword {
                format!("Test log line with special_keyword {i}\n")
            } else {
                format!("Test log line {i}\n")
            }
        })
        .collect()
}

/// Write `contents` to `<dir>/<name>` and return the full path.
pub fn write_log(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write log fixture");
    path
}

/// Split `contents` into lines the way the reader does (LF kept), in file
/// order.
pub fn lines_of(contents: &[u8]) -> Vec<Bytes> {
    contents
        .split_inclusive(|b| *b == b'\n')
        .map(Bytes::copy_from_slice)
        .collect()
}

/// Run a full UTF-8 retrieval into a `Vec`.
pub async fn read_back(
    path: &Path,
    chunk_size: usize,
    max_lines: Option<usize>,
    keyword: Option<&str>,
) -> (Vec<Bytes>, RetrievalSummary) {
    read_back_encoded(path, LogEncoding::utf8(), chunk_size, max_lines, keyword).await
}

pub async fn read_back_encoded(
    path: &Path,
    encoding: LogEncoding,
    chunk_size: usize,
    max_lines: Option<usize>,
    keyword: Option<&str>,
) -> (Vec<Bytes>, RetrievalSummary) {
    let request = RetrievalRequest::new(path, encoding, chunk_size)
        .expect("valid request")
        .with_max_lines(max_lines)
        .with_keyword(keyword.map(str::to_string));
    let mut lines = Vec::new();
    let summary = retrieve(request, &mut lines, &CancellationToken::new())
        .await
        .expect("retrieval succeeds");
    (lines, summary)
}
