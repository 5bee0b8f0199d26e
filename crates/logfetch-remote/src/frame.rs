//! Aggregated stream framing.
//!
//! A frame is `<endpoint>\n<payload>\0`. The NUL byte is the only frame
//! delimiter, so a reader buffers until it sees one; a stream that ends with
//! unterminated bytes was cut short by a failure upstream.

use bytes::{BufMut, Bytes, BytesMut};

/// Byte closing every frame.
pub const FRAME_TERMINATOR: u8 = 0;

const ERROR_PREFIX: &[u8] = b"Error: ";

/// Build the frame carrying `payload` from `endpoint`.
pub fn encode(endpoint: &str, payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(endpoint.len() + payload.len() + 2);
    frame.put_slice(endpoint.as_bytes());
    frame.put_u8(b'\n');
    frame.put_slice(payload);
    frame.put_u8(FRAME_TERMINATOR);
    frame.freeze()
}

/// Build the frame reporting that `endpoint` failed with `message`.
pub fn encode_error(endpoint: &str, message: &str) -> Bytes {
    encode(endpoint, format!("Error: {message}\n").as_bytes())
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub endpoint: String,
    pub payload: Bytes,
}

impl Frame {
    /// True when the payload is an endpoint failure report.
    pub fn is_error(&self) -> bool {
        self.payload.starts_with(ERROR_PREFIX)
    }
}

/// The aggregated stream ended in the middle of a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("aggregated stream ended with {0} unterminated byte(s)")]
pub struct TruncatedStream(pub usize);

/// Incremental decoder for the aggregated stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes and return every frame they complete.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.pending.extend_from_slice(data);
        let mut frames = Vec::new();
        while let Some(end) = memchr::memchr(FRAME_TERMINATOR, &self.pending) {
            let mut raw = self.pending.split_to(end + 1).freeze();
            raw.truncate(end);
            frames.push(split_frame(raw));
        }
        frames
    }

    /// Call once the stream has ended.
    pub fn finish(self) -> Result<(), TruncatedStream> {
        match self.pending.len() {
            0 => Ok(()),
            n => Err(TruncatedStream(n)),
        }
    }
}

fn split_frame(raw: Bytes) -> Frame {
    match memchr::memchr(b'\n', &raw) {
        Some(lf) => Frame {
            endpoint: String::from_utf8_lossy(&raw[..lf]).into_owned(),
            payload: raw.slice(lf + 1..),
        },
        None => Frame {
            endpoint: String::from_utf8_lossy(&raw).into_owned(),
            payload: Bytes::new(),
        },
    }
}
