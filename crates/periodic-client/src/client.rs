//! The Client facade — typed job submission, queries, and admin commands,
//! each a single request/reply exchange on the shared multiplexer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use periodic_core::codec::{encode_len8, put_len8};
use periodic_core::endpoint::Endpoint;
use periodic_core::xor::XorKey;
use periodic_core::{ClientType, Command, Error, JobSpec, Result};

use crate::mux::Mux;

/// Optional job fields recognized at submission time.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Workload bytes handed to the worker.
    pub args: Option<String>,
    /// Absolute Unix seconds to run at. Unset = run now.
    pub sched_at: Option<i64>,
    /// Server-side run timeout in seconds. `run_job` defaults this to 10.
    pub timeout: Option<u32>,
}

/// A connected periodic client.
///
/// All operations may be called concurrently; the multiplexer correlates
/// the interleaved replies. `close` is terminal — reconnection is a caller
/// concern.
pub struct Client {
    mux: Arc<Mux>,
    healthy: Arc<AtomicBool>,
    health_task: JoinHandle<()>,
}

impl Client {
    /// Connect and handshake as `CLIENT`, then start the once-a-second
    /// healthcheck ping.
    pub async fn connect(endpoint: &Endpoint, key: Option<XorKey>) -> Result<Client> {
        let mux = Mux::connect(endpoint, key, ClientType::Client).await?;
        let healthy = Arc::new(AtomicBool::new(true));
        let health_task = tokio::spawn(healthcheck(Arc::clone(&mux), Arc::clone(&healthy)));
        Ok(Client {
            mux,
            healthy,
            health_task,
        })
    }

    /// Probe the server. True iff it answered `PONG`.
    pub async fn ping(&self) -> bool {
        matches!(
            self.mux.send_and_wait(Command::Ping, b"").await,
            Ok((Command::Pong, _))
        )
    }

    /// Last healthcheck verdict. A failed ping marks the connection
    /// unhealthy without closing it; the next socket error does that.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Queue a job for asynchronous execution.
    pub async fn submit_job(&self, func: &str, name: &str, opts: SubmitOptions) -> Result<()> {
        let job = build_job(func, name, &opts, None);
        let body = job.encode()?;
        self.expect_success(Command::SubmitJob, &body).await
    }

    /// Run a job synchronously and return the worker's result bytes.
    pub async fn run_job(&self, func: &str, name: &str, opts: SubmitOptions) -> Result<Bytes> {
        let job = build_job(func, name, &opts, Some(10));
        let body = job.encode()?;
        let (reply, data) = self.mux.send_and_wait(Command::RunJob, &body).await?;
        match reply {
            Command::Data => Ok(data),
            Command::NoWorker => Err(Error::Protocol {
                request: Command::RunJob,
                reply,
                detail: format!("no worker for function {func:?}"),
            }),
            other => Err(Error::protocol(Command::RunJob, other, &data)),
        }
    }

    /// Per-function queue statistics, one row per function, sorted by the
    /// raw status line: `func, workers, jobs, processing, locked, sched_at`.
    pub async fn status(&self) -> Result<Vec<Vec<String>>> {
        let (_, body) = self.mux.send_and_wait(Command::Status, b"").await?;
        Ok(parse_status(&body))
    }

    /// Drop a function that has no registered workers.
    pub async fn drop_func(&self, func: &str) -> Result<()> {
        let body = encode_len8(func)?;
        self.expect_success(Command::DropFunc, &body).await
    }

    /// Remove a queued job by its (func, name) pair.
    pub async fn remove_job(&self, func: &str, name: &str) -> Result<()> {
        let mut body = BytesMut::with_capacity(2 + func.len() + name.len());
        put_len8(&mut body, func)?;
        put_len8(&mut body, name)?;
        self.expect_success(Command::RemoveJob, &body).await
    }

    /// Stream the server's data into `out`.
    ///
    /// Each streamed body is written back with its reconstructed
    /// `u32` big-endian length header, so the output is a valid frame
    /// sequence that [`Client::load`] accepts. The stream ends at the
    /// sentinel body `EOF`.
    pub async fn dump<W: AsyncWrite + Unpin>(&self, out: &mut W) -> Result<()> {
        let (id, mut frames) = self.mux.subscribe();
        let result = async {
            self.mux.send(&id, Command::Dump, b"").await?;
            loop {
                match frames.recv().await {
                    Some(Ok((_, body))) => {
                        if body.as_ref() == b"EOF" {
                            return Ok(());
                        }
                        out.write_all(&(body.len() as u32).to_be_bytes()).await?;
                        out.write_all(&body).await?;
                    }
                    Some(Err(e)) => return Err(e),
                    None => return Err(Error::Closed),
                }
            }
        }
        .await;
        self.mux.release(&id);
        out.flush().await?;
        result
    }

    /// Load previously dumped bytes back into the server.
    pub async fn load(&self, data: &[u8]) -> Result<()> {
        self.expect_success(Command::Load, data).await
    }

    /// Read a server configuration value.
    pub async fn config_get(&self, key: &str) -> Result<i32> {
        let body = encode_len8(key)?;
        let (reply, data) = self.mux.send_and_wait(Command::ConfigGet, &body).await?;
        if reply != Command::Config || data.len() < 4 {
            return Err(Error::protocol(Command::ConfigGet, reply, &data));
        }
        Ok(i32::from_be_bytes([data[0], data[1], data[2], data[3]]))
    }

    /// Write a server configuration value.
    pub async fn config_set(&self, key: &str, value: i32) -> Result<()> {
        let mut body = BytesMut::with_capacity(1 + key.len() + 4);
        put_len8(&mut body, key)?;
        body.put_i32(value);
        self.expect_success(Command::ConfigSet, &body).await
    }

    /// Ask the server to shut down. Fire-and-forget: the server exits
    /// without replying.
    pub async fn shutdown(&self) -> Result<()> {
        self.mux
            .send(&crate::agent::random_id(), Command::Shutdown, b"")
            .await
    }

    /// Close the connection. Pending operations fail with `Closed`.
    pub async fn close(&self) {
        self.health_task.abort();
        self.mux.close().await;
    }

    async fn expect_success(&self, request: Command, body: &[u8]) -> Result<()> {
        let (reply, data) = self.mux.send_and_wait(request, body).await?;
        if reply == Command::Success {
            Ok(())
        } else {
            Err(Error::protocol(request, reply, &data))
        }
    }
}

fn build_job(func: &str, name: &str, opts: &SubmitOptions, default_timeout: Option<u32>) -> JobSpec {
    JobSpec {
        func: func.to_owned(),
        name: name.to_owned(),
        args: opts.args.clone().unwrap_or_default(),
        sched_at: opts.sched_at.unwrap_or(0),
        counter: 0,
        timeout: opts.timeout.or(default_timeout).unwrap_or(0),
    }
}

fn parse_status(body: &[u8]) -> Vec<Vec<String>> {
    let text = String::from_utf8_lossy(body);
    let mut lines: Vec<&str> = text.split('\n').filter(|line| !line.is_empty()).collect();
    lines.sort_unstable();
    lines
        .iter()
        .map(|line| line.split(',').map(str::to_owned).collect())
        .collect()
}

/// Pings once a second while the connection lives. Failures flip the
/// healthy flag; only the receive loop's own socket error closes things.
async fn healthcheck(mux: Arc<Mux>, healthy: Arc<AtomicBool>) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tick.tick().await; // the first tick fires immediately
    while mux.is_alive() {
        tick.tick().await;
        if !mux.is_alive() {
            return;
        }
        let ok = matches!(
            mux.send_and_wait(Command::Ping, b"").await,
            Ok((Command::Pong, _))
        );
        if !ok && healthy.swap(ok, Ordering::Relaxed) {
            tracing::warn!("healthcheck ping failed, marking connection unhealthy");
        } else {
            healthy.store(ok, Ordering::Relaxed);
        }
    }
}
