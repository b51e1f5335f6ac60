//! A job as seen by the worker that was assigned it.
//!
//! Every per-job operation addresses the job by its handle —
//! `len8(func) ‖ len8(name)` — recomputed from the decoded record rather
//! than sliced out of the assignment bytes, matching the handle format the
//! server documents for `WORK_DONE` and friends.

use std::future::Future;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use futures::FutureExt;

use periodic_core::codec::put_len8;
use periodic_core::{Command, Error, JobSpec, Result};

use crate::mux::Mux;

/// An assigned job and the connection to report its outcome on.
#[derive(Clone)]
pub struct Job {
    mux: Arc<Mux>,
    raw: JobSpec,
    handle: Bytes,
}

impl Job {
    pub(crate) fn assigned(mux: Arc<Mux>, raw: JobSpec) -> Result<Job> {
        let handle = raw.handle()?;
        Ok(Job { mux, raw, handle })
    }

    /// Function this job runs under.
    pub fn func(&self) -> &str {
        &self.raw.func
    }

    /// Job name, unique per function.
    pub fn name(&self) -> &str {
        &self.raw.name
    }

    /// Workload bytes, possibly empty.
    pub fn args(&self) -> &str {
        &self.raw.args
    }

    /// The full wire record the server assigned.
    pub fn spec(&self) -> &JobSpec {
        &self.raw
    }

    /// Report success, with optional result bytes for `run_job` callers.
    pub async fn done(&self, data: &[u8]) -> Result<()> {
        let mut body = BytesMut::with_capacity(self.handle.len() + data.len());
        body.put_slice(&self.handle);
        body.put_slice(data);
        self.expect_success(Command::WorkDone, &body).await
    }

    /// Report failure; the server reschedules per its policy.
    pub async fn fail(&self) -> Result<()> {
        let body = self.handle.clone();
        self.expect_success(Command::WorkFail, &body).await
    }

    /// Push the job `delay` seconds into the future, optionally bumping its
    /// run counter.
    pub async fn sched_later(&self, delay: u64, counter: u16) -> Result<()> {
        let mut body = BytesMut::with_capacity(self.handle.len() + 10);
        body.put_slice(&self.handle);
        body.put_u64(delay);
        body.put_u16(counter);
        self.expect_success(Command::SchedLater, &body).await
    }

    /// Try to take `count` slots of the named server-side lock. True iff
    /// the lock was granted; a denial parks the job server-side until the
    /// holder releases.
    pub async fn acquire(&self, lock_name: &str, count: u16) -> Result<bool> {
        let mut body = BytesMut::with_capacity(3 + lock_name.len() + self.handle.len());
        put_len8(&mut body, lock_name)?;
        body.put_u16(count);
        body.put_slice(&self.handle);
        let (reply, data) = self.mux.send_and_wait(Command::Acquire, &body).await?;
        match reply {
            Command::Acquired => Ok(data.first() == Some(&1)),
            other => Err(Error::protocol(Command::Acquire, other, &data)),
        }
    }

    /// Release the named lock on behalf of this job.
    pub async fn release(&self, lock_name: &str) -> Result<()> {
        let mut body = BytesMut::with_capacity(1 + lock_name.len() + self.handle.len());
        put_len8(&mut body, lock_name)?;
        body.put_slice(&self.handle);
        self.expect_success(Command::Release, &body).await
    }

    /// Acquire, run `task`, release — the release happens on every exit
    /// path, including a panicking task. Returns `None` when the lock was
    /// denied and the task never ran.
    pub async fn with_lock<T, F, Fut>(&self, lock_name: &str, count: u16, task: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.acquire(lock_name, count).await? {
            return Ok(None);
        }
        let outcome = std::panic::AssertUnwindSafe(task()).catch_unwind().await;
        let released = self.release(lock_name).await;
        match outcome {
            Ok(value) => {
                released?;
                Ok(Some(value))
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
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

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("func", &self.raw.func)
            .field("name", &self.raw.name)
            .field("args_len", &self.raw.args.len())
            .finish()
    }
}
