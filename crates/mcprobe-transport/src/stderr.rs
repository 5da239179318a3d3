//! Background capture of a server's standard error.
//!
//! A server that writes enough to stderr will block once the pipe buffer
//! fills, so the stream is drained continuously by a background task into a
//! bounded buffer that keeps the most recent output.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::debug;

/// Default number of stderr bytes retained (64 KiB).
pub const DEFAULT_STDERR_CAPACITY: usize = 64 * 1024;

/// Marker placed in front of drained output when older bytes were dropped.
pub const TRUNCATION_MARKER: &str = "...(truncated)\n";

#[derive(Debug)]
struct Buffer {
    bytes: Vec<u8>,
    capacity: usize,
    truncated: bool,
}

impl Buffer {
    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        if self.bytes.len() > self.capacity {
            let excess = self.bytes.len() - self.capacity;
            self.bytes.drain(..excess);
            self.truncated = true;
        }
    }

    fn take(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.bytes).into_owned();
        self.bytes.clear();
        if std::mem::take(&mut self.truncated) {
            format!("{TRUNCATION_MARKER}{text}")
        } else {
            text
        }
    }
}

/// Collects a stream of diagnostic output in the background.
#[derive(Debug)]
pub struct StderrCapture {
    buffer: Arc<Mutex<Buffer>>,
    task: Option<JoinHandle<()>>,
}

impl StderrCapture {
    /// Start draining `reader` into a buffer of at most `capacity` bytes.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<R>(reader: R, capacity: usize, label: impl Into<String>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Buffer {
            bytes: Vec::new(),
            capacity: capacity.max(1),
            truncated: false,
        }));
        let label = label.into();
        let task = tokio::spawn(collect(reader, Arc::clone(&buffer), label));

        Self {
            buffer,
            task: Some(task),
        }
    }

    /// Take the buffered output, leaving the buffer empty.
    pub fn drain(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Wait up to `wait` for the stream to reach end-of-input, so that the
    /// last words of an exiting process end up in the buffer.
    ///
    /// If the stream is still open after `wait` the collector is abandoned.
    pub async fn finish(&mut self, wait: Duration) {
        let Some(mut task) = self.task.take() else {
            return;
        };
        if tokio::time::timeout(wait, &mut task).await.is_err() {
            task.abort();
        }
    }
}

impl Drop for StderrCapture {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn collect<R>(mut reader: R, buffer: Arc<Mutex<Buffer>>, label: String)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let bytes = &chunk[..n];
                for line in String::from_utf8_lossy(bytes).lines() {
                    debug!(target: "mcprobe::server_stderr", server = %label, "{line}");
                }
                buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(bytes);
            }
            Err(e) => {
                debug!(server = %label, error = %e, "Stopped reading server stderr");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_buffer_keeps_most_recent_bytes() {
        let mut buffer = Buffer {
            bytes: Vec::new(),
            capacity: 8,
            truncated: false,
        };
        buffer.push(b"0123456789");
        buffer.push(b"ab");

        assert_eq!(buffer.take(), format!("{TRUNCATION_MARKER}456789ab"));
        assert_eq!(buffer.take(), "");
    }

    #[tokio::test]
    async fn test_capture_collects_until_eof() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut capture = StderrCapture::spawn(reader, DEFAULT_STDERR_CAPACITY, "test");

        writer.write_all(b"line one\nline two\n").await.unwrap();
        drop(writer);
        capture.finish(Duration::from_secs(5)).await;

        assert_eq!(capture.drain(), "line one\nline two\n");
        assert_eq!(capture.drain(), "");
    }

    #[tokio::test]
    async fn test_drain_never_blocks_on_open_stream() {
        let (_writer, reader) = tokio::io::duplex(64);
        let capture = StderrCapture::spawn(reader, 16, "test");
        assert_eq!(capture.drain(), "");
    }
}
