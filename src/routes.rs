//! HTTP routes.
//!
//! | Route                     | Handler               |
//! |---------------------------|-----------------------|
//! | `GET /logs`               | [`logs`]              |
//! | `GET /logs-from-servers`  | [`logs_from_servers`] |
//! | `GET /healthz`            | plain `ok`            |
//!
//! Both log routes answer `200` as soon as the first unit of output exists
//! and then stream. A failure after that point cannot change the status any
//! more, so the body is ended with an error instead: the chunked response
//! stops without its terminating chunk and clients must treat that as a
//! server-side failure.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use logfetch_core::config::ValidatedSettings;
use logfetch_core::sink::ChunkReceiver;
use logfetch_core::{
    BackpressureSink, ChannelTransport, LineSink, RetrievalError, RetrievalRequest,
    RetrievalSummary, ReverseFileReader,
};
use logfetch_remote::{HttpFetcher, MultiSourceAggregator};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

/// Lines buffered between the reader task and the response body.
const LINE_BUFFER: usize = 1;
/// Frames buffered between the aggregator and the response body.
const FRAME_BUFFER: usize = 1;

/// Shared, read-only state for all handlers.
#[derive(Clone)]
pub struct AppState {
    settings: Arc<ValidatedSettings>,
    aggregator: Arc<MultiSourceAggregator<HttpFetcher>>,
}

impl AppState {
    pub fn new(settings: ValidatedSettings) -> Self {
        let fetcher = HttpFetcher::new(Some(settings.connect_timeout));
        Self {
            settings: Arc::new(settings),
            aggregator: Arc::new(MultiSourceAggregator::new(fetcher)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/logs", get(logs))
        .route("/logs-from-servers", get(logs_from_servers))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// /logs
// ---------------------------------------------------------------------------

/// Query string of `GET /logs`.
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// File name relative to the configured log directory.
    pub filename: String,
    /// Number of latest lines to return; all lines when absent.
    pub lines: Option<usize>,
    /// Only return lines containing this substring.
    pub keyword: Option<String>,
}

/// Latest lines of one local log file, newest first.
pub async fn logs(State(state): State<AppState>, Query(query): Query<LogsQuery>) -> Response {
    match open_reader(&state.settings, query).await {
        Ok(reader) => stream_lines(reader).await,
        Err(err) => ApiError(err).into_response(),
    }
}

async fn open_reader(
    settings: &ValidatedSettings,
    query: LogsQuery,
) -> Result<ReverseFileReader, RetrievalError> {
    let path = resolve_log_path(&settings.log_dir, &query.filename)?;
    let request = RetrievalRequest::new(path, settings.encoding, settings.chunk_size)?
        .with_max_lines(query.lines)
        .with_keyword(query.keyword);
    ReverseFileReader::open(request).await
}

/// Join `filename` onto `log_dir`, refusing anything that could leave it.
pub fn resolve_log_path(log_dir: &Path, filename: &str) -> Result<PathBuf, RetrievalError> {
    let relative = Path::new(filename);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if filename.is_empty() || !contained {
        return Err(RetrievalError::InvalidArgument(format!(
            "filename must be a relative path inside the log directory, received: {filename:?}"
        )));
    }
    Ok(log_dir.join(relative))
}

async fn stream_lines(reader: ReverseFileReader) -> Response {
    let (transport, mut rx) = ChannelTransport::channel(LINE_BUFFER);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    spawn_retrieval(reader, transport, cancel);

    // Nothing has been sent yet, so a failure here still gets a real status.
    match rx.recv().await {
        Some(Err(err)) => {
            debug!(%err, "retrieval failed before first line");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error in logs_handler").into_response()
        }
        first => streaming_response(body_stream(first, rx, guard)),
    }
}

/// Run `reader` on its own task. The output ends cleanly on success and is
/// aborted on any failure, so a truncated body is never mistaken for a
/// complete one.
fn spawn_retrieval(
    reader: ReverseFileReader,
    transport: ChannelTransport,
    cancel: CancellationToken,
) -> JoinHandle<Result<RetrievalSummary, RetrievalError>> {
    tokio::spawn(async move {
        let mut sink = BackpressureSink::new(transport);
        let outcome = reader.stream(&mut sink, &cancel).await;
        match &outcome {
            Ok(_) => sink.close(),
            Err(err) => sink.abort(io::Error::other(err.to_string())).await,
        }
        outcome
    })
}

// ---------------------------------------------------------------------------
// /logs-from-servers
// ---------------------------------------------------------------------------

/// Merge `/logs` output from several servers into NUL-terminated frames.
///
/// Takes one or more `urls` parameters (`?urls=a&urls=b`), each a complete
/// `/logs` URL on a remote logfetch server.
pub async fn logs_from_servers(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let urls: Vec<String> = params
        .into_iter()
        .filter(|(key, _)| key == "urls" || key == "urls[]")
        .map(|(_, url)| url)
        .collect();
    if urls.is_empty() {
        return ApiError(RetrievalError::InvalidArgument(
            "at least one `urls` parameter is required".to_string(),
        ))
        .into_response();
    }

    let (transport, rx) = ChannelTransport::channel(FRAME_BUFFER);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let aggregator = state.aggregator.clone();

    tokio::spawn(async move {
        let sink = BackpressureSink::new(transport);
        if let Err(err) = aggregator.aggregate(urls, sink, &cancel).await {
            debug!(%err, "aggregate ended early");
        }
    });

    streaming_response(body_stream(None, rx, guard))
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Body stream: `first` (if any) followed by everything left in `rx`.
///
/// `guard` lives as long as the body; when hyper drops the body because the
/// client went away, the producing task is cancelled.
fn body_stream(
    first: Option<io::Result<Bytes>>,
    rx: ChunkReceiver,
    guard: DropGuard,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    let rest = futures::stream::unfold((rx, guard), |(mut rx, guard)| async move {
        rx.recv().await.map(|item| (item, (rx, guard)))
    });
    futures::stream::iter(first).chain(rest)
}

fn streaming_response<S>(stream: S) -> Response
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// A retrieval error raised before any output, mapped to a status code.
struct ApiError(RetrievalError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let (status, message) = match &err {
            RetrievalError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            RetrievalError::NotFound(_) => {
                (StatusCode::NOT_FOUND, "log file not found".to_string())
            }
            RetrievalError::NotAFile(_) => {
                (StatusCode::BAD_REQUEST, "not a regular file".to_string())
            }
            RetrievalError::NotReadable { .. } => {
                (StatusCode::FORBIDDEN, "log file is not readable".to_string())
            }
            RetrievalError::StreamingFailure { .. } | RetrievalError::Cancelled { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error in logs_handler".to_string(),
            ),
        };
        warn!(%err, status = status.as_u16(), "request rejected");
        (status, message).into_response()
    }
}
