//! Adaptive-timeout line reader

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace, warn};

use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};

/// Size of a single non-blocking read
const READ_CHUNK: usize = 64;

/// A byte stream that yields whole `\n`/`\r` terminated lines
pub struct LineTransport<S> {
    stream: S,
    config: TransportConfig,
    buffer: BytesMut,
}

impl<S> LineTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: TransportConfig) -> Self {
        let buffer = BytesMut::with_capacity(config.max_line);
        Self {
            stream,
            config,
            buffer,
        }
    }

    /// Write the whole string and flush it to the stream
    pub async fn write_str(&mut self, data: &str) -> TransportResult<()> {
        trace!(bytes = data.len(), "Writing");
        self.stream
            .write_all(data.as_bytes())
            .await
            .map_err(TransportError::Write)?;
        self.stream.flush().await.map_err(TransportError::Write)
    }

    /// Read one line using the configured budget.
    ///
    /// `timeout` replaces the configured initial timeout for this call only.
    pub async fn read_line(&mut self, timeout: Option<Duration>) -> TransportResult<String> {
        let initial = timeout.unwrap_or(self.config.initial_timeout);
        let per_char = self.config.per_char_timeout;
        let max_size = self.config.max_line;
        self.read_line_with(max_size, initial, per_char).await
    }

    /// Read one line of at most `max_size` bytes.
    ///
    /// The first wait is bounded by `initial_timeout`; every received byte
    /// pushes the deadline out by `per_char_timeout`. The returned line keeps
    /// its terminator.
    pub async fn read_line_with(
        &mut self,
        max_size: usize,
        initial_timeout: Duration,
        per_char_timeout: Duration,
    ) -> TransportResult<String> {
        self.buffer.clear();

        let started = Instant::now();
        let mut deadline = started + initial_timeout;
        let mut chunk = [0u8; READ_CHUNK];

        while self.buffer.len() < max_size {
            let want = (max_size - self.buffer.len()).min(READ_CHUNK);

            let read = match timeout_at(deadline, self.stream.read(&mut chunk[..want])).await {
                Ok(Ok(0)) => return Err(TransportError::Closed),
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(TransportError::Read(e)),
                Err(_) => {
                    let waited = started.elapsed();
                    warn!(
                        waited_ms = waited.as_millis() as u64,
                        received = self.buffer.len(),
                        "Timed out waiting for line"
                    );
                    return Err(TransportError::Timeout { waited });
                }
            };

            self.buffer.extend_from_slice(&chunk[..read]);
            deadline += per_char_timeout * read as u32;

            if is_line(&self.buffer) {
                let line = String::from_utf8_lossy(&self.buffer).into_owned();
                debug!(line = %line.trim_end(), "Received line");
                return Ok(line);
            }
        }

        warn!(max = max_size, "Line exceeds maximum size");
        Err(TransportError::LineTooLong { max: max_size })
    }
}

/// A lone terminator is not a line
fn is_line(buf: &[u8]) -> bool {
    buf.len() > 1 && matches!(buf.last(), Some(b'\n') | Some(b'\r'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, DuplexStream};

    fn transport(config: TransportConfig) -> (LineTransport<DuplexStream>, DuplexStream) {
        let (client, server) = duplex(256);
        (LineTransport::new(client, config), server)
    }

    fn timing(initial_ms: u64, per_char_ms: u64) -> TransportConfig {
        TransportConfig::default()
            .with_initial_timeout(Duration::from_millis(initial_ms))
            .with_per_char_timeout(Duration::from_millis(per_char_ms))
    }

    #[test]
    fn test_is_line() {
        assert!(!is_line(b""));
        assert!(!is_line(b"\n"));
        assert!(!is_line(b"\r"));
        assert!(!is_line(b"1;"));
        assert!(is_line(b"1\n"));
        assert!(is_line(b"1\r"));
        assert!(is_line(b"\n\n"));
    }

    #[tokio::test]
    async fn test_read_single_line() {
        let (mut line, mut server) = transport(TransportConfig::default());
        server.write_all(b"3.14;1\r\n").await.unwrap();

        let got = line.read_line(None).await.unwrap();
        assert_eq!(got, "3.14;1\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_line_split_across_reads() {
        let (mut line, mut server) = transport(timing(100, 10));

        let writer = tokio::spawn(async move {
            server.write_all(b"+1.0E").await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            server.write_all(b"+00;1\n").await.unwrap();
            server
        });

        let got = line.read_line(None).await.unwrap();
        assert_eq!(got, "+1.0E+00;1\n");
        writer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_lone_terminator_keeps_reading() {
        let (mut line, mut server) = transport(timing(100, 10));

        let writer = tokio::spawn(async move {
            server.write_all(b"\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            server.write_all(b"1\n").await.unwrap();
            server
        });

        let got = line.read_line(None).await.unwrap();
        assert_eq!(got, "\n1\n");
        writer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_data() {
        let (mut line, _server) = transport(timing(300, 1));

        let err = line.read_line(None).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_overrides_initial() {
        let (mut line, mut server) = transport(timing(10, 0));

        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            server.write_all(b"1\n").await.unwrap();
            server
        });

        let got = line.read_line(Some(Duration::from_secs(2))).await.unwrap();
        assert_eq!(got, "1\n");
        writer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_char_allowance_extends_deadline() {
        // 100ms + 5 bytes * 50ms = 350ms, the terminator arrives at 300ms
        let (mut line, mut server) = transport(timing(100, 50));

        let writer = tokio::spawn(async move {
            server.write_all(b"12345").await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            let _ = server.write_all(b"\n").await;
            server
        });

        let got = line.read_line(None).await.unwrap();
        assert_eq!(got, "12345\n");
        writer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_per_char_allowance_times_out() {
        // 100ms + 5 bytes * 10ms = 150ms, the terminator arrives at 300ms
        let (mut line, mut server) = transport(timing(100, 10));

        let writer = tokio::spawn(async move {
            server.write_all(b"12345").await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            let _ = server.write_all(b"\n").await;
            server
        });

        let err = line.read_line(None).await.unwrap_err();
        assert!(err.is_timeout());
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let (mut line, mut server) = transport(TransportConfig::default().with_max_line(4));
        server.write_all(b"abcdefgh\n").await.unwrap();

        let err = line.read_line(None).await.unwrap_err();
        assert!(matches!(err, TransportError::LineTooLong { max: 4 }));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_closed_stream() {
        let (mut line, server) = transport(TransportConfig::default());
        drop(server);

        let err = line.read_line(None).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn test_write_str() {
        let (mut line, mut server) = transport(TransportConfig::default());
        line.write_str("*IDN?;*OPC?\n").await.unwrap();

        let mut buf = [0u8; 12];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"*IDN?;*OPC?\n");
    }

    #[tokio::test]
    async fn test_write_to_closed_stream() {
        let (mut line, server) = transport(TransportConfig::default());
        drop(server);

        let err = line.write_str("INIT;*OPC?\n").await.unwrap_err();
        assert!(matches!(err, TransportError::Write(_)));
    }
}
