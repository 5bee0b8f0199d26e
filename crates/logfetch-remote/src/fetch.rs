//! Remote sources: how a single endpoint's log stream is obtained.
//!
//! [`SourceFetcher`] is the seam between the aggregator and the network;
//! [`HttpFetcher`] is the production implementation over hyper's pooled
//! client. Responses are never buffered: the body is handed back as a stream
//! of chunks as they arrive.

use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use http_body_util::{BodyExt, Empty};
use hyper::{StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

/// Chunks of one endpoint's response body, in arrival order.
pub type ChunkStream = BoxStream<'static, Result<Bytes, EndpointError>>;

/// Failure confined to a single endpoint.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: hyper::http::uri::InvalidUri,
    },

    #[error("request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("server responded with {0}")]
    Status(StatusCode),

    #[error("response body failed: {0}")]
    Body(#[source] hyper::Error),
}

impl EndpointError {
    /// The error and all of its sources, joined with `": "`.
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        message
    }
}

/// Opens the log stream of one endpoint.
pub trait SourceFetcher: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<ChunkStream, EndpointError>> + Send;
}

/// [`SourceFetcher`] issuing plain HTTP/1 `GET` requests.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HttpFetcher {
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(connect_timeout);
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }
}

impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<ChunkStream, EndpointError> {
        let uri: Uri = url.parse().map_err(|source| EndpointError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let response = self.client.get(uri).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EndpointError::Status(status));
        }
        Ok(response
            .into_body()
            .into_data_stream()
            .map_err(EndpointError::Body)
            .boxed())
    }
}
