//! Engine log viewing.

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::EngineError;

const CHUNK: u64 = 8 * 1024;

/// Last `n` lines of the file at `path`, oldest first.
///
/// Reads backwards from the end so large logs are not loaded whole.
pub async fn tail_lines(path: &Path, n: usize) -> Result<Vec<String>, EngineError> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut file = File::open(path).await?;
    let len = file.metadata().await?.len();

    let mut pos = len;
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let newlines = buf.iter().filter(|&&b| b == b'\n').count();
        // One extra newline: the file usually ends with one.
        if pos == 0 || newlines > n {
            break;
        }
        let step = CHUNK.min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos)).await?;
        let mut chunk = vec![0u8; usize::try_from(step).unwrap_or(usize::MAX)];
        file.read_exact(&mut chunk).await?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
    }

    let text = String::from_utf8_lossy(&buf);
    let lines: Vec<&str> = text.lines().collect();
    // Drop a possibly partial first line when we stopped mid-file.
    let start = if pos > 0 { 1 } else { 0 };
    let lines = &lines[start.min(lines.len())..];
    Ok(lines[lines.len().saturating_sub(n)..]
        .iter()
        .map(|s| s.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_lines(count: usize) -> tempfile::NamedTempFile {
        let f = tempfile::NamedTempFile::new().unwrap();
        let body: String = (1..=count).map(|i| format!("line {i}\n")).collect();
        tokio::fs::write(f.path(), body).await.unwrap();
        f
    }

    #[tokio::test]
    async fn short_file() {
        let f = write_lines(3).await;
        let lines = tail_lines(f.path(), 10).await.unwrap();
        assert_eq!(lines, ["line 1", "line 2", "line 3"]);
    }

    #[tokio::test]
    async fn spans_chunks() {
        let f = write_lines(5000).await;
        let lines = tail_lines(f.path(), 3).await.unwrap();
        assert_eq!(lines, ["line 4998", "line 4999", "line 5000"]);

        let many = tail_lines(f.path(), 2000).await.unwrap();
        assert_eq!(many.len(), 2000);
        assert_eq!(many[0], "line 3001");
    }

    #[tokio::test]
    async fn zero_lines_and_missing_file() {
        let f = write_lines(3).await;
        assert!(tail_lines(f.path(), 0).await.unwrap().is_empty());
        assert!(matches!(
            tail_lines(Path::new("/nonexistent/relayctl.log"), 5).await,
            Err(EngineError::Io(_))
        ));
    }
}
