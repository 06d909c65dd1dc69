//! Newline-delimited JSON framing
//!
//! One JSON object per `\n`-terminated line. Partial lines are buffered across
//! reads by the underlying `BufReader`; a line that does not decode is reported
//! and skipped without ending the stream.

use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Longest excerpt of a rejected line carried in [`FrameEvent::Malformed`].
const MALFORMED_EXCERPT_LEN: usize = 120;

/// Framing errors. Only transport faults end a stream.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One step of a framed stream.
#[derive(Debug)]
pub enum FrameEvent<T> {
    /// A line that decoded into `T`.
    Record(T),
    /// A line that did not decode; already discarded.
    Malformed { excerpt: String, error: String },
    /// Peer closed the stream. Any unterminated trailing bytes are dropped.
    Disconnected,
}

/// Lazy decoder of newline-delimited JSON records from one byte stream.
///
/// Bound to a single connection; a new connection gets a new reader.
pub struct JsonLineReader<R, T> {
    reader: BufReader<R>,
    line: Vec<u8>,
    lines_read: u64,
    _record: PhantomData<fn() -> T>,
}

impl<R, T> JsonLineReader<R, T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            line: Vec::with_capacity(256),
            lines_read: 0,
            _record: PhantomData,
        }
    }

    /// Number of non-blank lines seen so far, decoded or not.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Read until the next record, malformed line or end of stream.
    ///
    /// Blank lines are skipped silently. Returns `Err` only on a read fault,
    /// after which the stream should be abandoned.
    pub async fn next_event(&mut self) -> Result<FrameEvent<T>, FrameError> {
        loop {
            self.line.clear();
            let n = self.reader.read_until(b'\n', &mut self.line).await?;
            if n == 0 {
                return Ok(FrameEvent::Disconnected);
            }
            if self.line.last() != Some(&b'\n') {
                tracing::debug!(bytes = n, "Dropping unterminated record at end of stream");
                return Ok(FrameEvent::Disconnected);
            }

            let record = self.line.trim_ascii();
            if record.is_empty() {
                continue;
            }
            self.lines_read += 1;

            return Ok(match serde_json::from_slice::<T>(record) {
                Ok(value) => FrameEvent::Record(value),
                Err(e) => FrameEvent::Malformed {
                    excerpt: excerpt(record),
                    error: e.to_string(),
                },
            });
        }
    }
}

fn excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    match text.char_indices().nth(MALFORMED_EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Reading;
    use tokio::io::AsyncWriteExt;

    const GOOD: &str = r#"{"sensor_id":"sensor_1","temperature":21.5,"humidity":48.0,"timestamp":"2025-03-14T09:00:00Z"}"#;

    #[tokio::test]
    async fn test_records_then_disconnect() {
        let input = format!("{GOOD}\n{GOOD}\n");
        let mut reader: JsonLineReader<_, Reading> = JsonLineReader::new(input.as_bytes());

        assert!(matches!(reader.next_event().await.unwrap(), FrameEvent::Record(_)));
        assert!(matches!(reader.next_event().await.unwrap(), FrameEvent::Record(_)));
        assert!(matches!(reader.next_event().await.unwrap(), FrameEvent::Disconnected));
        assert_eq!(reader.lines_read(), 2);
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped_and_stream_continues() {
        let input = format!("not json\n{{\"sensor_id\":\"x\"}}\n{GOOD}\n");
        let mut reader: JsonLineReader<_, Reading> = JsonLineReader::new(input.as_bytes());

        match reader.next_event().await.unwrap() {
            FrameEvent::Malformed { excerpt, .. } => assert_eq!(excerpt, "not json"),
            other => panic!("expected malformed, got {other:?}"),
        }
        // Valid JSON, wrong shape
        assert!(matches!(reader.next_event().await.unwrap(), FrameEvent::Malformed { .. }));
        match reader.next_event().await.unwrap() {
            FrameEvent::Record(r) => assert_eq!(r.sensor_id, "sensor_1"),
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blank_lines_and_crlf() {
        let input = format!("\n\r\n{GOOD}\r\n");
        let mut reader: JsonLineReader<_, Reading> = JsonLineReader::new(input.as_bytes());
        assert!(matches!(reader.next_event().await.unwrap(), FrameEvent::Record(_)));
        assert_eq!(reader.lines_read(), 1);
    }

    #[tokio::test]
    async fn test_unterminated_tail_is_dropped() {
        let input = format!("{GOOD}\n{}", &GOOD[..20]);
        let mut reader: JsonLineReader<_, Reading> = JsonLineReader::new(input.as_bytes());
        assert!(matches!(reader.next_event().await.unwrap(), FrameEvent::Record(_)));
        assert!(matches!(reader.next_event().await.unwrap(), FrameEvent::Disconnected));
    }

    #[tokio::test]
    async fn test_record_split_across_writes() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            let bytes = format!("{GOOD}\n");
            let (head, tail) = bytes.as_bytes().split_at(17);
            tx.write_all(head).await.unwrap();
            tokio::task::yield_now().await;
            tx.write_all(tail).await.unwrap();
        });

        let mut reader: JsonLineReader<_, Reading> = JsonLineReader::new(rx);
        match reader.next_event().await.unwrap() {
            FrameEvent::Record(r) => assert_eq!(r.temperature, 21.5),
            other => panic!("expected record, got {other:?}"),
        }
        writer.await.unwrap();
        assert!(matches!(reader.next_event().await.unwrap(), FrameEvent::Disconnected));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = "x".repeat(500);
        let e = excerpt(long.as_bytes());
        assert!(e.ends_with("..."));
        assert_eq!(e.len(), MALFORMED_EXCERPT_LEN + 3);
    }
}
