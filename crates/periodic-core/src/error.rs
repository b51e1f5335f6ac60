//! Error kinds shared by every periodic crate.

use crate::command::Command;

/// Everything that can go wrong between a facade call and the wire.
///
/// `Framing` and `Transport` are fatal to the connection; the receive loop
/// answers them by failing every outstanding waiter with `Closed`. The
/// remaining kinds are per-operation and leave the connection usable.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or oversize frame, or EOF in the middle of one.
    #[error("framing: {0}")]
    Framing(String),

    /// Socket-level read or write failure.
    #[error("transport: {0}")]
    Transport(#[from] std::io::Error),

    /// The connection was shut down while the operation was outstanding.
    #[error("connection closed")]
    Closed,

    /// The server answered a request with an unexpected command.
    /// `detail` carries the reply body as human-readable text.
    #[error("{request} got {reply} reply: {detail}")]
    Protocol {
        request: Command,
        reply: Command,
        detail: String,
    },

    /// Malformed Job record or bad length prefix inside a valid frame.
    #[error("decode: {0}")]
    Decode(String),

    /// A facade argument is invalid, e.g. a name longer than 255 bytes.
    #[error("argument: {0}")]
    Argument(String),
}

impl Error {
    pub(crate) fn decode(msg: impl Into<String>) -> Error {
        Error::Decode(msg.into())
    }

    /// Build the per-request error for a reply that violates the contract.
    pub fn protocol(request: Command, reply: Command, body: &[u8]) -> Error {
        Error::Protocol {
            request,
            reply,
            detail: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
