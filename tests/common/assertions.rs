//! Domain-specific assertion macros for logfetch harnesses.
//!
//! These wrap `pretty_assertions` and add context-rich failure messages that
//! make it clear which retrieval invariant was violated.

/// Assert that `lines` (newest first) is exactly `expected` reversed, i.e.
/// that reading backward and flipping the result reproduces the file.
#[macro_export]
macro_rules! assert_newest_first {
    ($lines:expr, $expected_file_order:expr) => {{
        let mut flipped: Vec<bytes::Bytes> = $lines.iter().cloned().collect();
        flipped.reverse();
        let expected: Vec<bytes::Bytes> = $expected_file_order.iter().cloned().collect();
        if flipped != expected {
            pretty_assertions::assert_eq!(
                flipped
                    .iter()
                    .map(|l| String::from_utf8_lossy(l).into_owned())
                    .collect::<Vec<_>>(),
                expected
                    .iter()
                    .map(|l| String::from_utf8_lossy(l).into_owned())
                    .collect::<Vec<_>>(),
                "assert_newest_first! failed: reversed output differs from file order"
            );
        }
    }};
}

/// Assert every line contains `keyword`.
#[macro_export]
macro_rules! assert_all_contain {
    ($lines:expr, $keyword:expr) => {{
        let keyword: &str = $keyword;
        for (i, line) in $lines.iter().enumerate() {
            let text = String::from_utf8_lossy(line);
            if !text.contains(keyword) {
                panic!(
                    "assert_all_contain! failed: line #{} {:?} does not contain {:?}",
                    i, text, keyword
                );
            }
        }
    }};
}
