//! ReverseFileReader: newest-first line retrieval from a single file.
//!
//! The reader owns the file handle and a cursor that only moves toward the
//! start of the file. Each step reads `min(chunk_size, cursor)` bytes ending
//! at the cursor, converts them to UTF-8, segments them against the carry and
//! emits the completed lines newest-first, applying the keyword filter and
//! the line limit as it goes.
//!
//! ```text
//! Opened ──► Reading ──► Draining final carry ──► Closed
//!    └──────────┴──────────────┴──► Failed ──► Closed
//! ```
//!
//! The handle is dropped with the reader, so every exit path releases it.

use std::io::SeekFrom;

use bytes::Bytes;
use memchr::memmem;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn, Instrument, Span};

use crate::error::RetrievalError;
use crate::segmenter::BackwardSegmenter;
use crate::sink::LineSink;
use crate::types::{RetrievalRequest, RetrievalSummary};

/// Open `request.path()` and stream its lines newest-first into `sink`.
pub async fn retrieve<S: LineSink>(
    request: RetrievalRequest,
    sink: &mut S,
    cancel: &CancellationToken,
) -> Result<RetrievalSummary, RetrievalError> {
    ReverseFileReader::open(request)
        .await?
        .stream(sink, cancel)
        .await
}

/// An opened file, ready to be read backward exactly once.
#[derive(Debug)]
pub struct ReverseFileReader {
    request: RetrievalRequest,
    file: File,
    file_size: u64,
    span: Span,
}

impl ReverseFileReader {
    /// Check and open the file. All argument and access errors surface here,
    /// before anything has been written anywhere.
    pub async fn open(request: RetrievalRequest) -> Result<Self, RetrievalError> {
        let path = request.path().to_path_buf();
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| RetrievalError::from_open(path.clone(), e))?;
        if !metadata.is_file() {
            return Err(RetrievalError::NotAFile(path));
        }
        let file = File::open(&path)
            .await
            .map_err(|e| RetrievalError::from_open(path.clone(), e))?;

        let mut file_size = metadata.len();
        let width = request.encoding().code_unit_width() as u64;
        if file_size % width != 0 {
            warn!(
                path = %path.display(),
                file_size,
                encoding = %request.encoding(),
                "ignoring trailing partial code unit"
            );
            file_size -= file_size % width;
        }

        let span = tracing::debug_span!(
            "retrieve",
            path = %path.display(),
            encoding = %request.encoding(),
            chunk_size = request.chunk_size(),
        );
        Ok(Self {
            request,
            file,
            file_size,
            span,
        })
    }

    /// Log under `span` instead of the reader's own `retrieve` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Number of bytes the reader will consider (the file size at open time,
    /// minus any partial trailing code unit).
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn request(&self) -> &RetrievalRequest {
        &self.request
    }

    /// Run the backward read to completion, the line limit, or the first
    /// error. Errors are logged before being returned; lines already accepted
    /// by `sink` are never retracted.
    pub async fn stream<S: LineSink>(
        self,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<RetrievalSummary, RetrievalError> {
        let span = self.span.clone();
        async move {
            let result = self.run(sink, cancel).await;
            match &result {
                Ok(summary) => debug!(
                    lines = summary.lines_emitted,
                    scanned = summary.lines_scanned,
                    chunks = summary.chunks_read,
                    bytes = summary.bytes_read,
                    "retrieval complete"
                ),
                Err(err @ RetrievalError::Cancelled { .. }) => debug!(%err, "retrieval stopped"),
                Err(err) => error!(%err, "retrieval failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run<S: LineSink>(
        mut self,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<RetrievalSummary, RetrievalError> {
        let encoding = self.request.encoding();
        let limit = self.request.max_lines().unwrap_or(usize::MAX);
        let keyword = self
            .request
            .keyword()
            .map(|k| memmem::Finder::new(k.as_bytes()).into_owned());
        let matches = |line: &[u8]| keyword.as_ref().map_or(true, |f| f.find(line).is_some());

        let chunk_size = self.request.chunk_size() as u64;
        let mut buffer = vec![0u8; chunk_size.min(self.file_size) as usize];
        let mut segmenter = BackwardSegmenter::new();
        let mut summary = RetrievalSummary::default();
        let mut cursor = self.file_size;

        while cursor > 0 && summary.lines_emitted < limit {
            if cancel.is_cancelled() {
                return Err(RetrievalError::Cancelled {
                    lines_emitted: summary.lines_emitted,
                });
            }

            let read_len = chunk_size.min(cursor);
            cursor -= read_len;
            let chunk = &mut buffer[..read_len as usize];
            self.read_at(cursor, chunk)
                .await
                .map_err(|source| RetrievalError::StreamingFailure {
                    lines_emitted: summary.lines_emitted,
                    source,
                })?;

            let deferred = encoding.deferred_prefix_len(chunk, cursor == 0);
            cursor += deferred as u64;
            let raw = &chunk[deferred..];
            summary.chunks_read += 1;
            summary.bytes_read += raw.len() as u64;

            let lines = segmenter.segment(&encoding.normalize(raw, cursor == 0));
            summary.lines_scanned += lines.len();
            for line in lines.into_iter().rev() {
                if !matches(&line[..]) {
                    continue;
                }
                emit(sink, line, cancel, &mut summary).await?;
                if summary.lines_emitted >= limit {
                    break;
                }
            }
        }

        if cursor == 0 && summary.lines_emitted < limit {
            if let Some(first) = segmenter.finish() {
                summary.lines_scanned += 1;
                if matches(&first[..]) {
                    emit(sink, first, cancel, &mut summary).await?;
                }
            }
        }

        Ok(summary)
    }

    async fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.read_exact(buf).await?;
        Ok(())
    }
}

/// Hand one line to the sink, giving up as soon as `cancel` fires even if
/// the sink is stuck waiting out backpressure.
async fn emit<S: LineSink>(
    sink: &mut S,
    line: Bytes,
    cancel: &CancellationToken,
    summary: &mut RetrievalSummary,
) -> Result<(), RetrievalError> {
    let lines_emitted = summary.lines_emitted;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RetrievalError::Cancelled { lines_emitted }),
        sent = sink.send(line) => {
            sent.map_err(|source| RetrievalError::StreamingFailure { lines_emitted, source })
        }
    }?;
    summary.lines_emitted += 1;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::LogEncoding;
    use pretty_assertions::assert_eq;
    use std::io;
    use std::path::Path;

    fn write_log(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    async fn collect(
        path: &Path,
        encoding: LogEncoding,
        chunk_size: usize,
        max_lines: Option<usize>,
        keyword: Option<&str>,
    ) -> Result<(Vec<Bytes>, RetrievalSummary), RetrievalError> {
        let request = RetrievalRequest::new(path, encoding, chunk_size)?
            .with_max_lines(max_lines)
            .with_keyword(keyword.map(str::to_string));
        let mut lines = Vec::new();
        let summary = retrieve(request, &mut lines, &CancellationToken::new()).await?;
        Ok((lines, summary))
    }

    #[tokio::test]
    async fn three_lines_chunk_two() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(&dir, "abc.log", b"A\nB\nC\n");

        let (lines, summary) = collect(&path, LogEncoding::utf8(), 2, None, None).await.unwrap();
        assert_eq!(lines, vec!["C\n", "B\n", "A\n"]);
        assert_eq!(summary.chunks_read, 3);
        assert_eq!(summary.bytes_read, 6);

        let (lines, _) = collect(&path, LogEncoding::utf8(), 2, Some(2), None).await.unwrap();
        assert_eq!(lines, vec!["C\n", "B\n"]);
    }

    #[tokio::test]
    async fn limit_stops_reading_early() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (0..1000).map(|i| format!("Test log line {i}\n")).collect();
        let path = write_log(&dir, "big.log", body.as_bytes());

        let (lines, summary) = collect(&path, LogEncoding::utf8(), 64, Some(1), None)
            .await
            .unwrap();
        assert_eq!(lines, vec!["Test log line 999\n"]);
        assert!(summary.bytes_read < 200);
    }

    #[tokio::test]
    async fn zero_lines_reads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(&dir, "app.log", b"one\ntwo\n");
        let (lines, summary) = collect(&path, LogEncoding::utf8(), 4, Some(0), None).await.unwrap();
        assert!(lines.is_empty());
        assert_eq!(summary.chunks_read, 0);
    }

    #[tokio::test]
    async fn keyword_applies_to_first_line_too() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(&dir, "kw.log", b"match first\nskip\nmatch last");
        let (lines, _) = collect(&path, LogEncoding::utf8(), 3, None, Some("match"))
            .await
            .unwrap();
        assert_eq!(lines, vec!["match last", "match first\n"]);
    }

    #[tokio::test]
    async fn missing_file_and_directory_fail_before_streaming() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect(&dir.path().join("nope.log"), LogEncoding::utf8(), 16, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::NotFound(_)));

        let err = collect(dir.path(), LogEncoding::utf8(), 16, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::NotAFile(_)));
        assert!(err.is_pre_stream());
    }

    #[tokio::test]
    async fn utf16_surrogate_pairs_survive_every_chunk_size() {
        let text = "first \u{1F600}\nsecond \u{1F680}\u{1F680}\nthird é\n";
        let dir = tempfile::tempdir().unwrap();
        let mut bytes: Vec<u8> = vec![0xFF, 0xFE];
        bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
        let path = write_log(&dir, "wide.log", &bytes);
        let utf16 = LogEncoding::parse("utf16le").unwrap();

        for chunk_size in [4, 6, 8, 10, 64, bytes.len() + (bytes.len() % 2)] {
            let (lines, _) = collect(&path, utf16, chunk_size, None, None).await.unwrap();
            assert_eq!(
                lines,
                vec!["third é\n", "second \u{1F680}\u{1F680}\n", "first \u{1F600}\n"],
                "chunk_size = {chunk_size}"
            );
        }
    }

    #[tokio::test]
    async fn utf16_trailing_odd_byte_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes: Vec<u8> = "a\nb\n".encode_utf16().flat_map(u16::to_le_bytes).collect();
        bytes.push(b'c');
        let path = write_log(&dir, "odd.log", &bytes);
        let (lines, _) = collect(&path, LogEncoding::parse("utf16le").unwrap(), 4, None, None)
            .await
            .unwrap();
        assert_eq!(lines, vec!["b\n", "a\n"]);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(&dir, "app.log", b"one\ntwo\n");
        let request = RetrievalRequest::new(&path, LogEncoding::utf8(), 4).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut lines = Vec::new();
        let err = retrieve(request, &mut lines, &cancel).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Cancelled { lines_emitted: 0 }));
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn cancel_interrupts_a_backpressured_send() {
        use crate::sink::{BackpressureSink, ChannelTransport};
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let path = write_log(&dir, "app.log", b"A\nB\nC\n");
        let request = RetrievalRequest::new(&path, LogEncoding::utf8(), 64).unwrap();
        // Room for one line and nobody draining: the second send waits forever.
        let (transport, mut rx) = ChannelTransport::channel(1);
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let mut sink = BackpressureSink::new(transport);
                let outcome = retrieve(request, &mut sink, &cancel).await;
                (outcome, sink.retries())
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        cancel.cancel();

        let (outcome, retries) = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("reader stops once cancelled")
            .unwrap();
        assert!(matches!(outcome, Err(RetrievalError::Cancelled { lines_emitted: 1 })));
        assert_eq!(retries, 1);
        assert_eq!(rx.recv().await.unwrap().unwrap(), "C\n");
    }

    /// Accepts `remaining` lines, then fails like a reset connection.
    struct FailAfter {
        remaining: usize,
        got: Vec<Bytes>,
    }

    impl LineSink for FailAfter {
        async fn send(&mut self, line: Bytes) -> io::Result<()> {
            if self.remaining == 0 {
                return Err(io::Error::from(io::ErrorKind::ConnectionReset));
            }
            self.remaining -= 1;
            self.got.push(line);
            Ok(())
        }
    }

    #[tokio::test]
    async fn sink_failure_mid_stream_keeps_sent_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(&dir, "app.log", b"1\n2\n3\n4\n");
        let request = RetrievalRequest::new(&path, LogEncoding::utf8(), 3).unwrap();
        let mut sink = FailAfter {
            remaining: 2,
            got: Vec::new(),
        };
        let err = retrieve(request, &mut sink, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            RetrievalError::StreamingFailure {
                lines_emitted,
                source,
            } => {
                assert_eq!(lines_emitted, 2);
                assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
            }
            other => panic!("expected StreamingFailure, got {other:?}"),
        }
        assert_eq!(sink.got, vec!["4\n", "3\n"]);
    }
}
