//! Repeating-key XOR transport wrapper.
//!
//! Every byte through the wrapper is XORed with `key[cursor % key.len()]`;
//! each direction keeps its own cursor and never resets it. This matches
//! the periodic server's `--xor` mode. It is obfuscation, not encryption —
//! there is no authentication and a known-plaintext attack recovers the key
//! trivially. Deployments wanting secrecy put the connection inside a real
//! tunnel.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::{Error, Result};

/// Shared XOR key. Rejects empty keys, which would divide by zero and
/// obfuscate nothing.
#[derive(Clone)]
pub struct XorKey(Arc<[u8]>);

impl XorKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<XorKey> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(Error::Argument("XOR key must not be empty".into()));
        }
        Ok(XorKey(bytes.into()))
    }

    fn byte_at(&self, cursor: u64) -> u8 {
        self.0[(cursor % self.0.len() as u64) as usize]
    }
}

impl std::fmt::Debug for XorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print key material
        write!(f, "XorKey({} bytes)", self.0.len())
    }
}

/// Read half: deobfuscates everything the inner stream produces.
pub struct XorReader<R> {
    inner: R,
    key: XorKey,
    cursor: u64,
}

impl<R> XorReader<R> {
    pub fn new(inner: R, key: XorKey) -> XorReader<R> {
        XorReader {
            inner,
            key,
            cursor: 0,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for XorReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                for b in &mut buf.filled_mut()[before..] {
                    *b ^= this.key.byte_at(this.cursor);
                    this.cursor += 1;
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Write half: obfuscates into a scratch buffer, advancing the cursor only
/// by the bytes the inner stream actually accepted so partial writes stay
/// aligned with the key stream.
pub struct XorWriter<W> {
    inner: W,
    key: XorKey,
    cursor: u64,
    scratch: Vec<u8>,
}

impl<W> XorWriter<W> {
    pub fn new(inner: W, key: XorKey) -> XorWriter<W> {
        XorWriter {
            inner,
            key,
            cursor: 0,
            scratch: Vec::new(),
        }
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for XorWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        this.scratch.clear();
        this.scratch.reserve(buf.len());
        for (i, b) in buf.iter().enumerate() {
            this.scratch.push(b ^ this.key.byte_at(this.cursor + i as u64));
        }
        match Pin::new(&mut this.inner).poll_write(cx, &this.scratch) {
            Poll::Ready(Ok(n)) => {
                this.cursor += n as u64;
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
