//! MultiSourceAggregator: concurrent fan-out with isolated failures.
//!
//! One task per unique endpoint. Tasks share exactly one resource, the output
//! sink, behind a `tokio::sync::Mutex`; a frame is written in a single
//! `send` while the lock is held, so frames never interleave.

use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use logfetch_core::LineSink;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn, Instrument, Span};

use crate::fetch::{EndpointError, SourceFetcher};
use crate::frame;

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("no endpoints to aggregate")]
    NoEndpoints,

    /// Writing to the shared output failed; nothing more can be delivered.
    #[error("writing aggregated output failed: {0}")]
    Sink(#[source] io::Error),
}

/// Per-endpoint tallies for one aggregate request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    pub endpoints: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub frames: usize,
}

#[derive(Debug)]
enum EndpointOutcome {
    Delivered { frames: usize },
    Failed { frames: usize },
    Cancelled { frames: usize },
}

/// Fans a retrieval out to several endpoints and multiplexes the results.
#[derive(Debug)]
pub struct MultiSourceAggregator<F> {
    fetcher: Arc<F>,
    span: Span,
}

impl<F: SourceFetcher> MultiSourceAggregator<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            span: tracing::debug_span!("aggregate"),
        }
    }

    /// Log under `span` instead of the aggregator's own span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Stream every endpoint into `sink` and close it once all are done.
    ///
    /// Duplicate endpoints are collapsed (first occurrence wins the order).
    /// Endpoint failures are reported in-band as error frames; only a sink
    /// failure is returned, after the remaining tasks have been cancelled.
    pub async fn aggregate<S, I>(
        &self,
        endpoints: I,
        sink: S,
        cancel: &CancellationToken,
    ) -> Result<AggregateSummary, AggregateError>
    where
        S: LineSink + 'static,
        I: IntoIterator<Item = String>,
    {
        let endpoints = dedup(endpoints);
        let sink = Arc::new(Mutex::new(sink));
        if endpoints.is_empty() {
            sink.lock().await.close();
            return Err(AggregateError::NoEndpoints);
        }

        let cancel = cancel.child_token();
        let mut summary = AggregateSummary {
            endpoints: endpoints.len(),
            ..Default::default()
        };
        let mut tasks = JoinSet::new();
        for url in endpoints {
            let span = tracing::debug_span!(parent: &self.span, "endpoint", %url);
            tasks.spawn(
                pump(self.fetcher.clone(), url, sink.clone(), cancel.clone()).instrument(span),
            );
        }

        let mut fatal = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    let frames = match outcome {
                        EndpointOutcome::Delivered { frames } => {
                            summary.succeeded += 1;
                            frames
                        }
                        EndpointOutcome::Failed { frames } => {
                            summary.failed += 1;
                            frames
                        }
                        EndpointOutcome::Cancelled { frames } => {
                            summary.cancelled += 1;
                            frames
                        }
                    };
                    summary.frames += frames;
                }
                Ok(Err(err)) => {
                    if fatal.is_none() {
                        self.span.in_scope(|| error!(%err, "aggregated output failed"));
                        cancel.cancel();
                        fatal = Some(err);
                    }
                    summary.failed += 1;
                }
                Err(join_err) => {
                    self.span
                        .in_scope(|| error!(%join_err, "endpoint task did not finish"));
                    summary.failed += 1;
                }
            }
        }

        sink.lock().await.close();
        self.span.in_scope(|| debug!(?summary, "aggregate complete"));
        match fatal {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }
}

fn dedup(endpoints: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    endpoints
        .into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Copy one endpoint's chunks into the shared sink as frames.
async fn pump<F, S>(
    fetcher: Arc<F>,
    url: String,
    sink: Arc<Mutex<S>>,
    cancel: CancellationToken,
) -> Result<EndpointOutcome, AggregateError>
where
    F: SourceFetcher,
    S: LineSink,
{
    let fetched = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(EndpointOutcome::Cancelled { frames: 0 }),
        fetched = fetcher.fetch(&url) => fetched,
    };
    let mut chunks = match fetched {
        Ok(chunks) => chunks,
        Err(err) => return report_failure(&url, &err, &sink, 0).await,
    };

    let mut frames = 0;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(EndpointOutcome::Cancelled { frames }),
            next = chunks.next() => next,
        };
        match next {
            None => {
                debug!(frames, "endpoint complete");
                return Ok(EndpointOutcome::Delivered { frames });
            }
            Some(Ok(chunk)) if chunk.is_empty() => {}
            Some(Ok(chunk)) => {
                write_frame(&sink, frame::encode(&url, &chunk)).await?;
                frames += 1;
            }
            Some(Err(err)) => return report_failure(&url, &err, &sink, frames).await,
        }
    }
}

async fn report_failure<S: LineSink>(
    url: &str,
    err: &EndpointError,
    sink: &Mutex<S>,
    frames: usize,
) -> Result<EndpointOutcome, AggregateError> {
    let message = err.report();
    warn!(error = %message, "endpoint failed");
    write_frame(sink, frame::encode_error(url, &message)).await?;
    Ok(EndpointOutcome::Failed { frames: frames + 1 })
}

async fn write_frame<S: LineSink>(sink: &Mutex<S>, frame: Bytes) -> Result<(), AggregateError> {
    sink.lock().await.send(frame).await.map_err(AggregateError::Sink)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
