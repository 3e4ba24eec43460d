//! Message transport
//!
//! Newline-delimited JSON over any duplex byte stream. Serialized JSON never
//! contains a raw newline, so one line is exactly one message.

use crate::types::McpError;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, Stdin, Stdout};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

/// Default upper bound on a single incoming message.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

pub struct MessageReader<R> {
    inner: FramedRead<R, LinesCodec>,
    max_frame_bytes: usize,
    // FramedRead yields a single `None` after a decoder error before it
    // resumes reading; that one must not be taken for end of stream.
    after_error: bool,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            inner: FramedRead::new(reader, LinesCodec::new_with_max_length(max_frame_bytes)),
            max_frame_bytes,
            after_error: false,
        }
    }

    /// Next complete message, or `None` once the peer closed the stream.
    ///
    /// Cancel safe: partially read data stays buffered in the codec.
    pub async fn receive(&mut self) -> Result<Option<String>, McpError> {
        loop {
            let frame = match self.inner.next().await {
                Some(frame) => frame,
                None if self.after_error => {
                    self.after_error = false;
                    continue;
                }
                None => return Ok(None),
            };

            match frame {
                Ok(line) => {
                    self.after_error = false;
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    return Ok(Some(line.to_string()));
                }
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    self.after_error = true;
                    return Err(McpError::FrameTooLarge(self.max_frame_bytes));
                }
                Err(LinesCodecError::Io(e)) => return Err(McpError::Transport(e)),
            }
        }
    }
}

pub struct MessageWriter<W> {
    inner: FramedWrite<W, LinesCodec>,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: FramedWrite::new(writer, LinesCodec::new()),
        }
    }

    /// Write one message and flush it.
    pub async fn send(&mut self, message: &str) -> Result<(), McpError> {
        if message.contains('\n') {
            return Err(McpError::Codec(
                "outgoing message contains a raw newline".to_string(),
            ));
        }

        self.inner.send(message).await.map_err(|e| match e {
            LinesCodecError::Io(e) => McpError::Transport(e),
            LinesCodecError::MaxLineLengthExceeded => McpError::Codec(e.to_string()),
        })
    }
}

/// Reader and writer over the process's standard streams.
pub fn stdio(max_frame_bytes: usize) -> (MessageReader<Stdin>, MessageWriter<Stdout>) {
    (
        MessageReader::new(tokio::io::stdin(), max_frame_bytes),
        MessageWriter::new(tokio::io::stdout()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn test_reads_lines_and_skips_blanks() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = MessageReader::new(server, DEFAULT_MAX_FRAME_BYTES);

        client
            .write_all(b"{\"a\":1}\n\n   \n{\"b\":2}\r\n")
            .await
            .unwrap();
        drop(client);

        assert_eq!(reader.receive().await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(reader.receive().await.unwrap().as_deref(), Some("{\"b\":2}"));
        assert!(reader.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_frame_split_across_writes() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = MessageReader::new(server, DEFAULT_MAX_FRAME_BYTES);

        let pending = tokio::spawn(async move { reader.receive().await });
        client.write_all(b"{\"method\":").await.unwrap();
        client.flush().await.unwrap();
        tokio::task::yield_now().await;
        client.write_all(b"\"ping\"}\n").await.unwrap();

        let frame = pending.await.unwrap().unwrap();
        assert_eq!(frame.as_deref(), Some("{\"method\":\"ping\"}"));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_recoverable() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut reader = MessageReader::new(server, 16);

        client
            .write_all(b"{\"this line is far too long\":true}\n{\"ok\":1}\n")
            .await
            .unwrap();
        drop(client);

        let err = reader.receive().await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(reader.receive().await.unwrap().as_deref(), Some("{\"ok\":1}"));
        assert!(reader.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_fatal() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut reader = MessageReader::new(server, DEFAULT_MAX_FRAME_BYTES);

        client.write_all(&[0xff, 0xfe, b'\n']).await.unwrap();
        drop(client);

        let err = reader.receive().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_writer_appends_newline() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = MessageWriter::new(server);
        let mut lines = BufReader::new(client).lines();

        writer.send("{\"id\":1}").await.unwrap();
        writer.send("{\"id\":2}").await.unwrap();

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("{\"id\":1}"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("{\"id\":2}"));
    }

    #[tokio::test]
    async fn test_writer_rejects_embedded_newline() {
        let (_client, server) = tokio::io::duplex(1024);
        let mut writer = MessageWriter::new(server);

        assert!(writer.send("{\"a\":\n1}").await.is_err());
    }
}
