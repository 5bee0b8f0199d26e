//! Backward line segmentation.
//!
//! The file is read right to left, so each new chunk sits *before* everything
//! seen so far:
//!
//! ```text
//! File(|--chunkN--|-- ... --|--chunk2--|--chunk1--|)
//! ```
//!
//! A line is the byte range `(previous LF, LF]`, trailing delimiter included.
//! The bytes from the start of a chunk up to and including its first LF cannot
//! be completed yet (their start lies in an earlier chunk); they are held as
//! the *carry* until the next chunk, or [`BackwardSegmenter::finish`], closes
//! them off.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use crate::scanner::{find_all, NEWLINE};

/// Stateful segmenter owning the carry between successive backward chunks.
///
/// At the start of every [`segment`](Self::segment) call the carry is either
/// empty or holds exactly one dangling line fragment, kept as owned pieces in
/// file order so that a long line spread over many chunks is copied once.
#[derive(Debug, Default)]
pub struct BackwardSegmenter {
    carry: VecDeque<Bytes>,
    carry_len: usize,
}

impl BackwardSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of carried bytes waiting for an earlier chunk.
    pub fn carry_len(&self) -> usize {
        self.carry_len
    }

    /// Consume the chunk immediately preceding everything segmented so far.
    ///
    /// Returns the lines completed by this chunk in file (top-to-bottom)
    /// order. Callers wanting newest-first output iterate the result in
    /// reverse.
    pub fn segment(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        if chunk.is_empty() {
            return Vec::new();
        }
        let chunk = Bytes::copy_from_slice(chunk);
        let positions = find_all(&chunk, NEWLINE);

        let (Some(&first), Some(&last)) = (positions.first(), positions.last()) else {
            self.push_front(chunk);
            return Vec::new();
        };

        let mut lines = Vec::with_capacity(positions.len());
        for pair in positions.windows(2) {
            lines.push(chunk.slice(pair[0] + 1..=pair[1]));
        }

        // Empty only for the first chunk of a file that ends with LF.
        let completed = self.take_carry(chunk.slice(last + 1..));
        if !completed.is_empty() {
            lines.push(completed);
        }

        self.push_front(chunk.slice(..=first));
        lines
    }

    /// Close off the carry once the start of the file has been reached.
    ///
    /// The remaining fragment is the file's first line: nothing precedes it,
    /// so it is complete even though no LF was seen before it.
    pub fn finish(mut self) -> Option<Bytes> {
        let line = self.take_carry(Bytes::new());
        (!line.is_empty()).then_some(line)
    }

    fn push_front(&mut self, piece: Bytes) {
        self.carry_len += piece.len();
        self.carry.push_front(piece);
    }

    /// Join `head` with the carried pieces, leaving the carry empty.
    fn take_carry(&mut self, head: Bytes) -> Bytes {
        let carry_len = std::mem::take(&mut self.carry_len);
        match (head.is_empty(), self.carry.len()) {
            (_, 0) => head,
            (true, 1) => self.carry.pop_front().unwrap_or_default(),
            _ => {
                let mut line = BytesMut::with_capacity(head.len() + carry_len);
                line.extend_from_slice(&head);
                for piece in self.carry.drain(..) {
                    line.extend_from_slice(&piece);
                }
                line.freeze()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
