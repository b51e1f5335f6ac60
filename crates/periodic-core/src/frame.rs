//! Length-prefixed packet I/O.
//!
//! A frame on the wire is `size (u32, big-endian) | payload (size bytes)`.
//! The framer knows nothing of commands; it hands whole payloads up and
//! writes whole payloads down, one flush per packet.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Frames above this size are rejected rather than buffered.
pub const MAX_FRAME: usize = 16 * 1024 * 1024;

/// Boxed read half of a connection, possibly XOR-wrapped.
pub type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
/// Boxed write half of a connection, possibly XOR-wrapped.
pub type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// Reads one length-prefixed payload at a time. Single-reader by design:
/// the receive loop owns this exclusively.
pub struct FrameReader {
    stream: BoxedRead,
}

impl FrameReader {
    pub fn new(stream: BoxedRead) -> FrameReader {
        FrameReader { stream }
    }

    /// Block until one whole payload is available.
    ///
    /// A clean EOF on the frame boundary reports `Closed`; an EOF after the
    /// length prefix was read is a torn frame and reports `Framing`.
    pub async fn receive(&mut self) -> Result<Bytes> {
        let mut prefix = [0u8; 4];
        if let Err(e) = self.stream.read_exact(&mut prefix).await {
            return Err(match e.kind() {
                std::io::ErrorKind::UnexpectedEof => Error::Closed,
                _ => Error::Transport(e),
            });
        }
        let size = u32::from_be_bytes(prefix) as usize;
        if size > MAX_FRAME {
            return Err(Error::Framing(format!(
                "frame of {size} bytes exceeds the {MAX_FRAME} byte cap"
            )));
        }
        let mut payload = vec![0u8; size];
        if let Err(e) = self.stream.read_exact(&mut payload).await {
            return Err(match e.kind() {
                std::io::ErrorKind::UnexpectedEof => {
                    Error::Framing(format!("EOF inside a {size}-byte frame body"))
                }
                _ => Error::Transport(e),
            });
        }
        Ok(Bytes::from(payload))
    }
}

/// Writes one length-prefixed payload per call, prefix and body in a single
/// buffer so a packet is never torn by interleaved writers. Callers that
/// share a writer serialize on a mutex above this layer.
pub struct FrameWriter {
    stream: BoxedWrite,
}

impl FrameWriter {
    pub fn new(stream: BoxedWrite) -> FrameWriter {
        FrameWriter { stream }
    }

    /// Frame and flush one payload.
    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_FRAME {
            return Err(Error::Framing(format!(
                "refusing to send a {} byte frame",
                payload.len()
            )));
        }
        let mut buf = BytesMut::with_capacity(4 + payload.len());
        buf.put_u32(payload.len() as u32);
        buf.put_slice(payload);
        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Shut the write side down, flushing anything buffered.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
