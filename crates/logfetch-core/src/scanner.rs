//! Delimiter scanning over raw byte buffers.

/// Line terminator used for segmentation (ASCII line feed).
pub const NEWLINE: u8 = b'\n';

/// Return the offset of every `delimiter` in `buffer`, in ascending order.
///
/// An empty vector means the buffer holds no delimiter at all.
pub fn find_all(buffer: &[u8], delimiter: u8) -> Vec<usize> {
    memchr::memchr_iter(delimiter, buffer).collect()
}
