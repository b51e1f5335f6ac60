//! Packet payload codec.
//!
//! A payload is `agent_id (4 bytes) | command (1 byte) | body`. The agent id
//! is opaque binary chosen by the connection's client side; the server echoes
//! it in replies so the multiplexer can route them. All integers on the wire
//! are big-endian.

use bytes::{BufMut, Bytes, BytesMut};

use crate::command::Command;
use crate::error::{Error, Result};

/// Agent ids are exactly this many bytes, always.
pub const AGENT_ID_LEN: usize = 4;

/// Assemble a packet payload from its three parts.
pub fn encode_packet(agent_id: &[u8; AGENT_ID_LEN], cmd: Command, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(AGENT_ID_LEN + 1 + body.len());
    buf.put_slice(agent_id);
    buf.put_u8(cmd.into());
    buf.put_slice(body);
    buf.freeze()
}

/// Split a payload back into `(agent_id, command, body)`.
///
/// A payload shorter than five bytes still carries a routable agent id, so
/// it decodes with `Command::Unknown` and an empty body. Anything shorter
/// than the agent id itself cannot be routed and is a decode error.
pub fn decode_packet(payload: Bytes) -> Result<([u8; AGENT_ID_LEN], Command, Bytes)> {
    if payload.len() < AGENT_ID_LEN {
        return Err(Error::decode(format!(
            "payload of {} bytes is too short for an agent id",
            payload.len()
        )));
    }
    let mut agent_id = [0u8; AGENT_ID_LEN];
    agent_id.copy_from_slice(&payload[..AGENT_ID_LEN]);

    if payload.len() < AGENT_ID_LEN + 1 {
        return Ok((agent_id, Command::Unknown, Bytes::new()));
    }
    let cmd = Command::from_wire(payload[AGENT_ID_LEN]);
    let body = payload.slice(AGENT_ID_LEN + 1..);
    Ok((agent_id, cmd, body))
}

/// Append `u8 length | utf8 bytes`. Strings longer than 255 bytes do not fit
/// the length prefix and are rejected at the facade boundary.
pub fn put_len8(buf: &mut BytesMut, s: &str) -> Result<()> {
    if s.len() > u8::MAX as usize {
        return Err(Error::Argument(format!(
            "string of {} bytes exceeds the u8 length prefix",
            s.len()
        )));
    }
    buf.put_u8(s.len() as u8);
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Encode a single length-prefixed string.
pub fn encode_len8(s: &str) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(1 + s.len());
    put_len8(&mut buf, s)?;
    Ok(buf.freeze())
}

/// Read a `u8`-length-prefixed UTF-8 string, rejecting truncation.
pub fn read_len8(buf: &mut Bytes) -> Result<String> {
    if buf.is_empty() {
        return Err(Error::decode("missing u8 length prefix"));
    }
    let len = buf[0] as usize;
    if buf.len() < 1 + len {
        return Err(Error::decode(format!(
            "length prefix says {len} bytes but only {} remain",
            buf.len() - 1
        )));
    }
    let raw = buf.slice(1..1 + len);
    let s = std::str::from_utf8(&raw)
        .map_err(|_| Error::decode("length-prefixed string is not UTF-8"))?
        .to_owned();
    *buf = buf.slice(1 + len..);
    Ok(s)
}
