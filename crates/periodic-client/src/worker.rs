//! The Worker facade — function registry, grab slots, and the bounded
//! executor that runs assigned jobs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, Notify, Semaphore};

use periodic_core::codec::encode_len8;
use periodic_core::endpoint::Endpoint;
use periodic_core::xor::XorKey;
use periodic_core::{ClientType, Command, Error, JobSpec, Result};

use crate::agent::AgentId;
use crate::job::Job;
use crate::mux::Mux;

type Handler = Arc<dyn Fn(Job) -> BoxFuture<'static, ()> + Send + Sync>;

/// A connected periodic worker.
///
/// Register functions with [`Worker::add_func`], then call [`Worker::work`]
/// to grab and execute jobs until the connection ends. At most `size` jobs
/// run at once; grabs are suppressed while the executor is full so jobs
/// never buffer unbounded on the worker side.
pub struct Worker {
    mux: Arc<Mux>,
    funcs: Arc<Mutex<HashMap<String, Handler>>>,
    permits: Arc<Semaphore>,
    job_done: Arc<Notify>,
    size: usize,
}

impl Worker {
    /// Connect and handshake as `WORKER`. `size` bounds concurrent job
    /// execution; the default is twice the logical CPU count.
    pub async fn connect(
        endpoint: &Endpoint,
        key: Option<XorKey>,
        size: Option<usize>,
    ) -> Result<Worker> {
        let size = size.unwrap_or_else(default_size).max(1);
        let mux = Mux::connect(endpoint, key, ClientType::Worker).await?;
        Ok(Worker {
            mux,
            funcs: Arc::new(Mutex::new(HashMap::new())),
            permits: Arc::new(Semaphore::new(size)),
            job_done: Arc::new(Notify::new()),
            size,
        })
    }

    /// Probe the server. True iff it answered `PONG`.
    pub async fn ping(&self) -> bool {
        matches!(
            self.mux.send_and_wait(Command::Ping, b"").await,
            Ok((Command::Pong, _))
        )
    }

    /// Register a handler for `func`. The server acks with `SUCCESS` before
    /// the registry is updated.
    pub async fn add_func<F, Fut>(&self, func: &str, task: F) -> Result<()>
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(Command::CanDo, func, task).await
    }

    /// Register a broadcast handler: every connected worker gets a copy of
    /// each `func` job.
    pub async fn broadcast<F, Fut>(&self, func: &str, task: F) -> Result<()>
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(Command::Broadcast, func, task).await
    }

    /// Tell the server this worker no longer performs `func` and drop the
    /// local handler.
    pub async fn remove_func(&self, func: &str) -> Result<()> {
        let body = encode_len8(func)?;
        let (reply, data) = self.mux.send_and_wait(Command::CantDo, &body).await?;
        if reply != Command::Success {
            return Err(Error::protocol(Command::CantDo, reply, &data));
        }
        self.funcs.lock().expect("registry lock").remove(func);
        Ok(())
    }

    /// Grab and execute jobs until the connection closes.
    ///
    /// Runs the dispatcher on the calling task: acks every assignment on
    /// the server-chosen agent id, then submits the decoded job to the
    /// executor, blocking here while all `size` slots are busy.
    pub async fn work(&self) -> Result<()> {
        let (assign_tx, mut assignments) = mpsc::unbounded_channel();
        self.mux.set_pusher(assign_tx);

        for _ in 0..self.size {
            tokio::spawn(grab_slot(
                Arc::clone(&self.mux),
                Arc::clone(&self.permits),
                Arc::clone(&self.job_done),
            ));
        }

        while let Some((agent_id, body)) = assignments.recv().await {
            let raw = match JobSpec::decode(body) {
                Ok(raw) => raw,
                Err(e) => {
                    // the server redelivers or times the job out
                    tracing::warn!(error = %e, "dropping malformed job assignment");
                    continue;
                }
            };
            self.acknowledge(&agent_id).await;
            let job = match Job::assigned(Arc::clone(&self.mux), raw) {
                Ok(job) => job,
                Err(e) => {
                    tracing::warn!(error = %e, "dropping unaddressable job assignment");
                    continue;
                }
            };
            self.dispatch(job).await;
        }
        Ok(())
    }

    /// Close the connection. Running jobs keep their handles but every
    /// report will fail with `Closed`.
    pub async fn close(&self) {
        self.mux.close().await;
    }

    async fn register<F, Fut>(&self, cmd: Command, func: &str, task: F) -> Result<()>
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let body = encode_len8(func)?;
        let (reply, data) = self.mux.send_and_wait(cmd, &body).await?;
        if reply != Command::Success {
            return Err(Error::protocol(cmd, reply, &data));
        }
        let handler: Handler = Arc::new(move |job| -> BoxFuture<'static, ()> { Box::pin(task(job)) });
        self.funcs
            .lock()
            .expect("registry lock")
            .insert(func.to_owned(), handler);
        Ok(())
    }

    /// Ack receipt of an assignment with `GRAB_JOB` on its own agent id,
    /// signalling readiness for another before this one even starts.
    async fn acknowledge(&self, agent_id: &AgentId) {
        if let Err(e) = self.mux.send(agent_id, Command::GrabJob, b"").await {
            tracing::warn!(error = %e, "failed to ack job assignment");
        }
    }

    async fn dispatch(&self, job: Job) {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return, // executor torn down
        };
        let handler = self
            .funcs
            .lock()
            .expect("registry lock")
            .get(job.func())
            .cloned();
        match handler {
            Some(task) => {
                let job_done = Arc::clone(&self.job_done);
                tokio::spawn(async move {
                    task(job).await;
                    drop(permit);
                    job_done.notify_one();
                });
            }
            None => {
                drop(permit);
                let func = job.func().to_owned();
                tracing::warn!(func = %func, "assignment for unregistered function");
                if let Err(e) = self.remove_func(&func).await {
                    tracing::warn!(func = %func, error = %e, "CANT_DO for unknown function failed");
                }
                if let Err(e) = job.fail().await {
                    tracing::warn!(func = %func, error = %e, "failing unknown-function job failed");
                }
            }
        }
    }
}

fn default_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(2)
}

/// One grab slot: a long-lived agent id that asks for work every second,
/// or immediately after a job finishes, skipping ticks while the executor
/// is full. `NO_JOB` replies idle the slot; assignments arrive through the
/// pusher under the server's own agent id, so this id stays reusable.
async fn grab_slot(mux: Arc<Mux>, permits: Arc<Semaphore>, job_done: Arc<Notify>) {
    let (id, mut replies) = mux.subscribe();
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = job_done.notified() => {}
        }
        if !mux.is_alive() {
            break;
        }
        if permits.available_permits() == 0 {
            continue;
        }
        if mux.send(&id, Command::GrabJob, b"").await.is_err() {
            break;
        }
        loop {
            match replies.try_recv() {
                Ok(Ok((cmd, _))) => tracing::trace!(reply = %cmd, "grab slot reply"),
                Ok(Err(_)) | Err(mpsc::error::TryRecvError::Disconnected) => {
                    mux.release(&id);
                    return;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
            }
        }
    }
    mux.release(&id);
}
