//! The Job wire record and the server-addressable job handle.
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! func_len (u8) | func | name_len (u8) | name
//! args_len (u32) | args
//! sched_at (i64, seconds since epoch)
//! version (u8):  0 — nothing follows
//!                1 — counter (u32)
//!                2 — timeout (u32)
//!                3 — counter (u32), timeout (u32)
//! ```
//!
//! Encoding always picks the lowest version that carries the populated
//! optional fields, so a record with neither counter nor timeout stays in
//! the oldest format every server understands.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{put_len8, read_len8};
use crate::error::{Error, Result};

/// A job as it travels the wire, in both directions: submitted by a client,
/// assigned to a worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSpec {
    /// Function name the job refers to. At most 255 bytes of UTF-8.
    pub func: String,
    /// Job name, unique per function. At most 255 bytes of UTF-8.
    pub name: String,
    /// Opaque workload, may be empty.
    pub args: String,
    /// Absolute Unix seconds at which the job should run. 0 = now.
    pub sched_at: i64,
    /// How many times the job has run. 0 = unset.
    pub counter: u32,
    /// Server-side run timeout in seconds. 0 = unset.
    pub timeout: u32,
}

impl JobSpec {
    /// Shorthand for the common (func, name) pair.
    pub fn new(func: impl Into<String>, name: impl Into<String>) -> JobSpec {
        JobSpec {
            func: func.into(),
            name: name.into(),
            ..JobSpec::default()
        }
    }

    /// The version byte this record needs on the wire.
    fn wire_version(&self) -> u8 {
        match (self.counter > 0, self.timeout > 0) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    /// Encode to the wire layout.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(
            2 + self.func.len() + self.name.len() + 4 + self.args.len() + 8 + 9,
        );
        put_len8(&mut buf, &self.func)?;
        put_len8(&mut buf, &self.name)?;
        buf.put_u32(self.args.len() as u32);
        buf.put_slice(self.args.as_bytes());
        buf.put_i64(self.sched_at);
        let version = self.wire_version();
        buf.put_u8(version);
        if version == 1 || version == 3 {
            buf.put_u32(self.counter);
        }
        if version == 2 || version == 3 {
            buf.put_u32(self.timeout);
        }
        Ok(buf.freeze())
    }

    /// Decode from the wire layout, rejecting any truncation.
    pub fn decode(mut buf: Bytes) -> Result<JobSpec> {
        let func = read_len8(&mut buf)?;
        let name = read_len8(&mut buf)?;
        if buf.remaining() < 4 {
            return Err(Error::decode("job args length truncated"));
        }
        let args_len = buf.get_u32() as usize;
        if buf.remaining() < args_len {
            return Err(Error::decode(format!(
                "job args truncated: want {args_len} bytes, have {}",
                buf.remaining()
            )));
        }
        let args_raw = buf.split_to(args_len);
        let args = String::from_utf8(args_raw.to_vec())
            .map_err(|_| Error::decode("job args are not UTF-8"))?;
        if buf.remaining() < 8 {
            return Err(Error::decode("job sched_at truncated"));
        }
        let sched_at = buf.get_i64();
        if buf.remaining() < 1 {
            return Err(Error::decode("job version byte missing"));
        }
        let version = buf.get_u8();
        let (mut counter, mut timeout) = (0u32, 0u32);
        match version {
            0 => {}
            1 => counter = get_u32(&mut buf, "job counter")?,
            2 => timeout = get_u32(&mut buf, "job timeout")?,
            3 => {
                counter = get_u32(&mut buf, "job counter")?;
                timeout = get_u32(&mut buf, "job timeout")?;
            }
            v => return Err(Error::decode(format!("unknown job version {v}"))),
        }
        Ok(JobSpec {
            func,
            name,
            args,
            sched_at,
            counter,
            timeout,
        })
    }

    /// The handle that addresses this job in WORK_DONE and friends:
    /// `func_len (u8) | func | name_len (u8) | name`.
    pub fn handle(&self) -> Result<Bytes> {
        encode_handle(&self.func, &self.name)
    }
}

/// Encode a job handle from its (func, name) pair.
pub fn encode_handle(func: &str, name: &str) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(2 + func.len() + name.len());
    put_len8(&mut buf, func)?;
    put_len8(&mut buf, name)?;
    Ok(buf.freeze())
}

fn get_u32(buf: &mut Bytes, what: &str) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(Error::decode(format!("{what} truncated")));
    }
    Ok(buf.get_u32())
}
