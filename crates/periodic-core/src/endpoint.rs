//! Server endpoint resolution and connection setup.
//!
//! Resolution order for the address: explicit value → `PERIODIC_PORT`
//! environment variable → the default unix socket. `XOR_FILE` names a key
//! file; when present and non-empty the connection is wrapped in the XOR
//! transport.

use std::path::{Path, PathBuf};

use tokio::net::{TcpStream, UnixStream};

use crate::error::{Error, Result};
use crate::frame::{BoxedRead, BoxedWrite};
use crate::xor::{XorKey, XorReader, XorWriter};

/// Endpoint used when neither an explicit address nor `PERIODIC_PORT` is set.
pub const DEFAULT_ENDPOINT: &str = "unix:///tmp/periodic.sock";

/// A parsed `scheme://address` server endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `tcp://host:port`
    Tcp(String),
    /// `unix:///path.sock`
    Unix(PathBuf),
}

impl Endpoint {
    /// Parse a `tcp://host:port` or `unix:///path` address.
    pub fn parse(addr: &str) -> Result<Endpoint> {
        let (scheme, rest) = addr
            .split_once("://")
            .ok_or_else(|| Error::Argument(format!("endpoint {addr:?} has no scheme")))?;
        if rest.is_empty() {
            return Err(Error::Argument(format!("endpoint {addr:?} has no address")));
        }
        match scheme {
            "tcp" => Ok(Endpoint::Tcp(rest.to_owned())),
            "unix" => Ok(Endpoint::Unix(PathBuf::from(rest))),
            other => Err(Error::Argument(format!(
                "unsupported endpoint scheme {other:?}"
            ))),
        }
    }

    /// Resolve an endpoint: explicit address, else `PERIODIC_PORT`, else
    /// [`DEFAULT_ENDPOINT`].
    pub fn resolve(explicit: Option<&str>) -> Result<Endpoint> {
        if let Some(addr) = explicit {
            return Endpoint::parse(addr);
        }
        if let Ok(addr) = std::env::var("PERIODIC_PORT") {
            if !addr.is_empty() {
                return Endpoint::parse(&addr);
            }
        }
        Endpoint::parse(DEFAULT_ENDPOINT)
    }

    /// Dial the endpoint and split it into framed halves, wrapping both
    /// directions in the XOR transport when a key is given. Each direction
    /// gets its own fresh cursor.
    pub async fn connect(&self, key: Option<XorKey>) -> Result<(BoxedRead, BoxedWrite)> {
        let (read, write): (BoxedRead, BoxedWrite) = match self {
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr).await?;
                let (r, w) = tokio::io::split(stream);
                (Box::new(r), Box::new(w))
            }
            Endpoint::Unix(path) => {
                let stream = UnixStream::connect(path).await?;
                let (r, w) = tokio::io::split(stream);
                (Box::new(r), Box::new(w))
            }
        };
        Ok(match key {
            Some(key) => (
                Box::new(XorReader::new(read, key.clone())),
                Box::new(XorWriter::new(write, key)),
            ),
            None => (read, write),
        })
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Load the XOR key: explicit file path, else `XOR_FILE`. Returns `None`
/// when neither is set or the file is empty — an empty key file means the
/// transport stays plain.
pub fn resolve_xor_key(explicit: Option<&Path>) -> Result<Option<XorKey>> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => std::env::var("XOR_FILE")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from),
    };
    let Some(path) = path else {
        return Ok(None);
    };
    let bytes = std::fs::read(&path)?;
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(XorKey::new(bytes)?))
}
