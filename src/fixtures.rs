//! Synthetic log files for benchmarks and manual testing.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Write `Log Line 1\n`, `Log Line 2\n`, ... to `path` until the file holds
/// at least `target_bytes` bytes. Returns the number of lines written.
pub fn generate_log_file(path: &Path, target_bytes: u64) -> io::Result<u64> {
    let mut out = BufWriter::new(File::create(path)?);
    let mut written = 0u64;
    let mut line_number = 0u64;
    while written < target_bytes {
        line_number += 1;
        let line = format!("Log Line {line_number}\n");
        out.write_all(line.as_bytes())?;
        written += line.len() as u64;
    }
    out.flush()?;
    Ok(line_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_at_least_target_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("large_log_file.log");
        let lines = generate_log_file(&path, 100).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.len() >= 100);
        assert_eq!(body.lines().count() as u64, lines);
        assert!(body.ends_with(&format!("Log Line {lines}\n")));
    }
}
