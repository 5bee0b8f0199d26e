//! Transcoder: brings raw chunks into UTF-8 before line scanning.
//!
//! UTF-8 input passes through untouched. Single-byte encodings and UTF-16 are
//! decoded chunk by chunk with `encoding_rs`; after this step the segmenter
//! only ever sees UTF-8, so keyword filtering and delivery never mix
//! encodings.
//!
//! Encodings whose character boundaries cannot be recovered when reading
//! backward (Shift_JIS, GBK, EUC-*, ISO-2022-*) are rejected up front.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};

use crate::error::RetrievalError;

/// A validated source encoding for log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEncoding {
    encoding: &'static Encoding,
    /// Each byte is the code point of the same value (ISO-8859-1 proper).
    latin1: bool,
}

impl Default for LogEncoding {
    fn default() -> Self {
        Self::utf8()
    }
}

impl std::fmt::Display for LogEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl LogEncoding {
    pub fn utf8() -> Self {
        Self {
            encoding: UTF_8,
            latin1: false,
        }
    }

    fn latin1() -> Self {
        Self {
            encoding: WINDOWS_1252,
            latin1: true,
        }
    }

    /// Resolve an encoding label.
    ///
    /// Accepts WHATWG labels (`utf-8`, `utf-16le`, `iso-8859-2`, ...) plus the
    /// short aliases `utf8`, `ucs2`, `ucs-2`, `utf16le`, `utf16be`, `latin1`,
    /// `binary` and `ascii`. Labels are case-insensitive and an empty label
    /// means UTF-8.
    ///
    /// The short aliases `latin1`, `binary` and `ascii` map every byte to the
    /// code point of the same value, so 0x80..=0x9F become C1 controls.
    /// WHATWG labels such as `iso-8859-1` and `us-ascii` keep their web
    /// meaning and decode as windows-1252.
    pub fn parse(label: &str) -> Result<Self, RetrievalError> {
        let normalized = label.trim().to_ascii_lowercase();
        let encoding = match normalized.as_str() {
            "" | "utf8" => UTF_8,
            "ucs2" | "ucs-2" | "utf16le" => UTF_16LE,
            "utf16be" => UTF_16BE,
            "latin1" | "binary" | "ascii" => return Ok(Self::latin1()),
            other => Encoding::for_label(other.as_bytes()).ok_or_else(|| {
                RetrievalError::InvalidArgument(format!("unknown encoding: {label:?}"))
            })?,
        };

        let supported = encoding == UTF_8
            || encoding == UTF_16LE
            || encoding == UTF_16BE
            || encoding.is_single_byte();
        if !supported {
            return Err(RetrievalError::InvalidArgument(format!(
                "encoding {} cannot be read backward; use UTF-8, UTF-16 or a single-byte encoding",
                encoding.name()
            )));
        }
        Ok(Self {
            encoding,
            latin1: false,
        })
    }

    pub fn name(&self) -> &'static str {
        if self.latin1 {
            "ISO-8859-1"
        } else {
            self.encoding.name()
        }
    }

    /// Width in bytes of one code unit.
    pub fn code_unit_width(&self) -> usize {
        if self.is_utf16() {
            2
        } else {
            1
        }
    }

    pub fn requires_transcoding(&self) -> bool {
        self.encoding != UTF_8
    }

    fn is_utf16(&self) -> bool {
        self.encoding == UTF_16LE || self.encoding == UTF_16BE
    }

    /// Check that chunks of `chunk_size` bytes never split a code unit.
    ///
    /// UTF-16 additionally needs room for one full surrogate pair, so that a
    /// chunk can always hand a dangling low surrogate back to its predecessor
    /// and still make progress.
    pub fn validate_chunk_size(&self, chunk_size: usize) -> Result<(), RetrievalError> {
        if chunk_size == 0 {
            return Err(RetrievalError::InvalidArgument(
                "chunk size must be a positive integer".to_string(),
            ));
        }
        if self.is_utf16() && (chunk_size % 2 != 0 || chunk_size < 4) {
            return Err(RetrievalError::InvalidArgument(format!(
                "chunk size for {} must be an even number of at least 4 bytes, received: {chunk_size}",
                self.name()
            )));
        }
        Ok(())
    }

    /// Number of leading bytes of `chunk` that belong with the preceding
    /// chunk.
    ///
    /// Non-zero only for a UTF-16 chunk that opens with the low half of a
    /// surrogate pair; handing that unit back keeps the pair together.
    pub fn deferred_prefix_len(&self, chunk: &[u8], at_file_start: bool) -> usize {
        if at_file_start || chunk.len() <= 2 {
            return 0;
        }
        let unit = if self.encoding == UTF_16LE {
            u16::from_le_bytes([chunk[0], chunk[1]])
        } else if self.encoding == UTF_16BE {
            u16::from_be_bytes([chunk[0], chunk[1]])
        } else {
            return 0;
        };
        if (0xDC00..=0xDFFF).contains(&unit) {
            2
        } else {
            0
        }
    }

    /// Convert one raw chunk to UTF-8.
    ///
    /// `at_file_start` marks the chunk read at offset 0, where a byte-order
    /// mark is dropped. Malformed sequences decode to U+FFFD.
    pub fn normalize<'a>(&self, raw: &'a [u8], at_file_start: bool) -> Cow<'a, [u8]> {
        if !self.requires_transcoding() {
            return Cow::Borrowed(raw);
        }
        if self.latin1 {
            return match encoding_rs::mem::decode_latin1(raw) {
                Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
                Cow::Owned(s) => Cow::Owned(s.into_bytes()),
            };
        }
        let (text, _) = if at_file_start {
            self.encoding.decode_with_bom_removal(raw)
        } else {
            self.encoding.decode_without_bom_handling(raw)
        };
        match text {
            Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
            Cow::Owned(s) => Cow::Owned(s.into_bytes()),
        }
    }
}
