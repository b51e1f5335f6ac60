//! The connection multiplexer.
//!
//! One `Mux` owns one duplex connection to a periodic server. Many callers
//! issue request/reply exchanges concurrently; each exchange is keyed by a
//! 4-byte agent id, written under a write mutex, and parked on a waiter
//! until the receive loop routes the matching reply back. Server-initiated
//! `JOB_ASSIGN` frames bypass the waiter map and go to the registered
//! pusher channel instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use periodic_core::codec::{decode_packet, encode_packet};
use periodic_core::endpoint::Endpoint;
use periodic_core::frame::{BoxedRead, BoxedWrite, FrameReader, FrameWriter};
use periodic_core::xor::XorKey;
use periodic_core::{ClientType, Command, Error, Result};

use crate::agent::{self, AgentId, Reply, Waiter};

/// A server-initiated job assignment: the server-chosen agent id and the
/// undecoded Job record.
pub type Assignment = (AgentId, Bytes);

/// The request/response correlator for one connection. Shared via `Arc` by
/// every facade object layered on top.
pub struct Mux {
    writer: Mutex<FrameWriter>,
    waiters: DashMap<AgentId, Waiter>,
    pusher: std::sync::Mutex<Option<mpsc::UnboundedSender<Assignment>>>,
    alive: AtomicBool,
    recv_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Mux {
    /// Dial an endpoint and perform the connection handshake: one framed
    /// `ClientType` byte out, one framed connection id back.
    pub async fn connect(
        endpoint: &Endpoint,
        key: Option<XorKey>,
        client_type: ClientType,
    ) -> Result<Arc<Mux>> {
        let (read, write) = endpoint.connect(key).await?;
        Mux::handshake(read, write, client_type).await
    }

    /// Handshake over already-connected halves and start the receive loop.
    /// Split out from [`Mux::connect`] so tests can run over in-memory
    /// streams.
    pub async fn handshake(
        read: BoxedRead,
        write: BoxedWrite,
        client_type: ClientType,
    ) -> Result<Arc<Mux>> {
        let mut reader = FrameReader::new(read);
        let mut writer = FrameWriter::new(write);
        writer.send(&[client_type.into()]).await?;
        let welcome = reader.receive().await?;
        tracing::debug!(
            connection_id = %String::from_utf8_lossy(&welcome),
            "connection established"
        );

        let mux = Arc::new(Mux {
            writer: Mutex::new(writer),
            waiters: DashMap::new(),
            pusher: std::sync::Mutex::new(None),
            alive: AtomicBool::new(true),
            recv_task: std::sync::Mutex::new(None),
        });
        let handle = tokio::spawn(receive_loop(Arc::clone(&mux), reader));
        *mux.recv_task.lock().expect("recv_task lock") = Some(handle);
        Ok(mux)
    }

    /// Whether the connection is still usable.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Install the channel that receives server-initiated `JOB_ASSIGN`
    /// frames. One per connection; a second call replaces the first.
    pub fn set_pusher(&self, tx: mpsc::UnboundedSender<Assignment>) {
        *self.pusher.lock().expect("pusher lock") = Some(tx);
    }

    /// Frame and write one packet. Packets from concurrent callers are
    /// serialized whole; the wire order is the mutex acquisition order.
    pub async fn send(&self, agent_id: &AgentId, cmd: Command, body: &[u8]) -> Result<()> {
        if !self.is_alive() {
            return Err(Error::Closed);
        }
        let payload = encode_packet(agent_id, cmd, body);
        let mut writer = self.writer.lock().await;
        writer.send(&payload).await
    }

    /// One full exchange: allocate an id, send, park until the reply is
    /// routed back, release the id.
    pub async fn send_and_wait(&self, cmd: Command, body: &[u8]) -> Result<(Command, Bytes)> {
        if !self.is_alive() {
            return Err(Error::Closed);
        }
        let (id, rx) = self.register_mailbox();
        if let Err(e) = self.send(&id, cmd, body).await {
            self.waiters.remove(&id);
            return Err(e);
        }
        match rx.await {
            Ok(reply) => reply,
            // sender dropped without a value: the connection tore down
            Err(_) => Err(Error::Closed),
        }
    }

    /// Shut the connection down: unblock every pending waiter with
    /// `Closed`, stop the receive loop, and close the transport. Terminal —
    /// there is no reconnect.
    pub async fn close(&self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.recv_task.lock().expect("recv_task lock").take() {
            task.abort();
        }
        self.fail_all();
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            tracing::debug!(error = %e, "transport shutdown");
        }
    }

    /// Allocate a fresh agent id with a one-shot mailbox installed.
    fn register_mailbox(&self) -> (AgentId, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        let id = self.install(Waiter::Mailbox(tx));
        (id, rx)
    }

    /// Allocate a fresh agent id with a stream waiter that stays installed
    /// until [`Mux::release`]. Used by grab slots and dump.
    pub(crate) fn subscribe(&self) -> (AgentId, mpsc::UnboundedReceiver<Reply>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.install(Waiter::Stream(tx));
        (id, rx)
    }

    /// Drop the waiter for an id, making the id reusable.
    pub(crate) fn release(&self, id: &AgentId) {
        self.waiters.remove(id);
    }

    fn install(&self, waiter: Waiter) -> AgentId {
        loop {
            let id = agent::random_id();
            match self.waiters.entry(id) {
                // truncated short-id collided with a pending request
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(waiter);
                    return id;
                }
            }
        }
    }

    /// Fan `Closed` out to every outstanding waiter and drop the pusher so
    /// the worker side observes the teardown too.
    fn fail_all(&self) {
        *self.pusher.lock().expect("pusher lock") = None;
        let pending: Vec<AgentId> = self.waiters.iter().map(|e| *e.key()).collect();
        for id in pending {
            if let Some((_, waiter)) = self.waiters.remove(&id) {
                waiter.fail(Error::Closed);
            }
        }
    }
}

/// One per connection. Reads frames in arrival order and routes each to its
/// waiter or, for job assignments, to the pusher. Never shares a thread
/// with caller code and never throws to callers: a read error fans `Closed`
/// to every waiter and ends the loop.
async fn receive_loop(mux: Arc<Mux>, mut reader: FrameReader) {
    loop {
        let payload = match reader.receive().await {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(error = %e, "receive loop ending");
                mux.alive.store(false, Ordering::SeqCst);
                mux.fail_all();
                return;
            }
        };
        let (agent_id, cmd, body) = match decode_packet(payload) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(error = %e, "dropping unroutable frame");
                continue;
            }
        };

        if cmd == Command::JobAssign {
            let pusher = mux.pusher.lock().expect("pusher lock").clone();
            if let Some(tx) = pusher {
                if tx.send((agent_id, body)).is_err() {
                    tracing::warn!("job assignment dropped: dispatcher is gone");
                }
                continue;
            }
        }

        // Mailbox waiters are consumed by delivery; stream waiters persist.
        if let Some((_, Waiter::Mailbox(tx))) = mux
            .waiters
            .remove_if(&agent_id, |_, w| matches!(w, Waiter::Mailbox(_)))
        {
            let _ = tx.send(Ok((cmd, body)));
        } else if let Some(entry) = mux.waiters.get(&agent_id) {
            if let Waiter::Stream(tx) = entry.value() {
                let _ = tx.send(Ok((cmd, body)));
            }
        } else {
            tracing::debug!(
                agent = %hex::encode(agent_id),
                cmd = %cmd,
                "agent not found, dropping frame"
            );
        }
    }
}
