//! Agent ids and the per-agent waiter mailbox.
//!
//! Every in-flight request owns a 4-byte correlation id; the server echoes
//! it so the receive loop can route the reply back. The waiter comes in two
//! shapes consumed uniformly by the loop: a one-shot mailbox for ordinary
//! request/reply exchanges, and a stream sink for the operations that keep
//! receiving on one id (grab slots, dump).

use bytes::Bytes;
use periodic_core::{Command, Error};
use rand::{distributions::Alphanumeric, Rng};
use tokio::sync::{mpsc, oneshot};

/// 4-byte printable-ASCII correlation id, unique among pending requests on
/// one connection.
pub type AgentId = [u8; 4];

/// One routed inbound packet, or the error that ended the wait.
pub(crate) type Reply = Result<(Command, Bytes), Error>;

/// Draw a fresh candidate id. Uniqueness against the pending set is the
/// waiter map's job; collisions there retry with a new draw.
pub(crate) fn random_id() -> AgentId {
    let mut rng = rand::thread_rng();
    let mut id = [0u8; 4];
    for b in &mut id {
        *b = rng.sample(Alphanumeric);
    }
    id
}

/// Where a routed packet goes.
pub(crate) enum Waiter {
    /// Consumed by delivery; the owning caller resumes with the value.
    Mailbox(oneshot::Sender<Reply>),
    /// Stays installed; every packet for the id is appended to the stream.
    Stream(mpsc::UnboundedSender<Reply>),
}

impl Waiter {
    /// Fail the waiter when the connection dies. Receivers that already
    /// went away are ignored.
    pub(crate) fn fail(self, err: Error) {
        match self {
            Waiter::Mailbox(tx) => {
                let _ = tx.send(Err(err));
            }
            Waiter::Stream(tx) => {
                let _ = tx.send(Err(err));
            }
        }
    }
}
