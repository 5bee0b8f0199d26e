//! Throwaway HTTP servers for aggregation tests.
//!
//! [`serve`] runs any router on a random 127.0.0.1 port. [`FakeUpstream`]
//! is a misbehaving log server:
//! - `GET /fail`: `500` with a plain-text body
//! - `GET /broken`: sends one chunk, then aborts the chunked body
//! - `GET /slow`: one chunk, then never finishes

use axum::{body::Body, http::StatusCode, response::IntoResponse, routing::get, Router};
use bytes::Bytes;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Serve `app` in the background; returns once the socket is bound.
pub async fn serve(app: Router) -> std::io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok(addr)
}

/// A port with nothing listening on it.
pub fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Handle to the running misbehaving server.
pub struct FakeUpstream {
    addr: SocketAddr,
}

impl FakeUpstream {
    pub async fn start() -> std::io::Result<Self> {
        let app = Router::new()
            .route("/fail", get(fail))
            .route("/broken", get(broken))
            .route("/slow", get(slow));
        Ok(Self {
            addr: serve(app).await?,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn fail() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "Error in logs_handler")
}

async fn broken() -> impl IntoResponse {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"partial line\n")),
        Err(std::io::Error::other("disk went away")),
    ];
    Body::from_stream(futures::stream::iter(chunks))
}

async fn slow() -> impl IntoResponse {
    let first = futures::stream::iter([Ok::<_, std::io::Error>(Bytes::from_static(b"first\n"))]);
    Body::from_stream(futures::StreamExt::chain(first, futures::stream::pending()))
}
