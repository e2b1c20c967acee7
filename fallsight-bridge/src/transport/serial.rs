//! Serial line transport: newline-terminated text records.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_serial::SerialStream;

use fallsight_common::Origin;

use super::{Transport, TransportError};

/// Splits a byte stream into lines.
///
/// Partial lines stay buffered across calls, so `next_line` can be raced in
/// `select!` without losing data.
pub struct LineReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            pending: Vec::new(),
        }
    }

    /// Next non-empty line, without its `\n` / `\r\n` terminator.
    pub async fn next_line(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            let read = self
                .inner
                .read_until(b'\n', &mut self.pending)
                .await
                .map_err(|e| TransportError::lost(e.to_string()))?;

            if read == 0 {
                if !self.pending.is_empty() {
                    tracing::debug!(
                        bytes = self.pending.len(),
                        "Discarding partial line at end of stream"
                    );
                    self.pending.clear();
                }
                return Err(TransportError::lost("end of stream"));
            }

            if self.pending.last() != Some(&b'\n') {
                continue;
            }

            let mut line = std::mem::take(&mut self.pending);
            while matches!(line.last(), Some(b'\n' | b'\r')) {
                line.pop();
            }

            if line.iter().all(|b| b.is_ascii_whitespace() || *b == 0) {
                continue;
            }

            return Ok(line);
        }
    }
}

/// Serial port opened at a fixed baud rate.
pub struct SerialTransport {
    port: String,
    baud_rate: u32,
    reader: Option<LineReader<SerialStream>>,
}

impl SerialTransport {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            reader: None,
        }
    }

    /// Check that the port can be opened, without keeping it.
    pub fn probe(port: &str, baud_rate: u32) -> Result<(), TransportError> {
        open(port, baud_rate).map(drop)
    }
}

fn open(port: &str, baud_rate: u32) -> Result<SerialStream, TransportError> {
    let builder = tokio_serial::new(port, baud_rate);
    SerialStream::open(&builder).map_err(|e| {
        TransportError::connect_failed(format!("Serial open of {} failed: {}", port, e))
    })
}

#[async_trait]
impl Transport for SerialTransport {
    fn origin(&self) -> Origin {
        Origin::Serial
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        let stream = open(&self.port, self.baud_rate)?;
        tracing::info!(port = %self.port, baud_rate = self.baud_rate, "Serial port opened");
        self.reader = Some(LineReader::new(stream));
        Ok(())
    }

    async fn next_record(&mut self) -> Result<Vec<u8>, TransportError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| TransportError::lost("serial port not open"))?;

        let result = reader.next_line().await;
        if result.is_err() {
            self.reader = None;
        }
        result
    }

    async fn is_alive(&mut self) -> bool {
        self.reader.is_some()
    }

    async fn disconnect(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!(port = %self.port, "Serial port closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lines_split_across_reads() {
        let mock = tokio_test::io::Builder::new()
            .read(b"temp:25.5,hu")
            .read(b"m:60.2\r\nCAI")
            .read(b"DA\n")
            .build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.next_line().await.unwrap(), b"temp:25.5,hum:60.2");
        assert_eq!(reader.next_line().await.unwrap(), b"CAIDA");
        assert!(matches!(
            reader.next_line().await,
            Err(TransportError::Lost(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_lines_skipped() {
        let mock = tokio_test::io::Builder::new()
            .read(b"\n\r\n  \nOK\n")
            .build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.next_line().await.unwrap(), b"OK");
    }

    #[tokio::test]
    async fn test_partial_line_at_eof_is_dropped() {
        let mock = tokio_test::io::Builder::new()
            .read(b"INIT\ntemp:2")
            .build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.next_line().await.unwrap(), b"INIT");
        assert!(reader.next_line().await.is_err());
    }

    #[tokio::test]
    async fn test_read_error_is_lost() {
        let mock = tokio_test::io::Builder::new()
            .read(b"OK\n")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device unplugged",
            ))
            .build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.next_line().await.unwrap(), b"OK");
        assert_eq!(
            reader.next_line().await,
            Err(TransportError::Lost("device unplugged".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_port_fails_to_connect() {
        let mut transport = SerialTransport::new("/dev/fallsight-does-not-exist", 9600);
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::ConnectFailed(_))
        ));
        assert!(!transport.is_alive().await);
        assert!(transport.next_record().await.is_err());

        transport.disconnect().await;
        transport.disconnect().await;
    }
}
