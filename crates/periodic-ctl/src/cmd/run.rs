//! `periodic run` — work jobs by handing each one to a shell command.
//!
//! The command gets the job name as `$PERIODIC_NAME`, the function as
//! `$PERIODIC_FUNC`, and the job args on stdin. Its stdout becomes the
//! job result on a zero exit; any other exit fails the job.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use periodic_client::{Job, Worker};
use periodic_core::endpoint::Endpoint;
use periodic_core::xor::XorKey;

use super::{flag, required_flag};

pub async fn run(endpoint: &Endpoint, key: Option<XorKey>, args: &[&str]) -> Result<()> {
    let func = required_flag(args, "-f", "function name")?.to_owned();
    let exec = required_flag(args, "--exec", "command")?.to_owned();
    let size = match flag(args, "-n") {
        Some(n) => Some(n.parse().context("-n must be a number")?),
        None => None,
    };

    let worker = Worker::connect(endpoint, key, size).await?;
    worker
        .add_func(&func, move |job| {
            let exec = exec.clone();
            async move { run_one(&exec, job).await }
        })
        .await?;
    tracing::info!(func = %func, "worker started");
    worker.work().await?;
    Ok(())
}

async fn run_one(exec: &str, job: Job) {
    let outcome = execute(exec, &job).await;
    let report = match outcome {
        Ok(stdout) => job.done(&stdout).await,
        Err(e) => {
            tracing::warn!(name = %job.name(), error = %e, "job command failed");
            job.fail().await
        }
    };
    if let Err(e) = report {
        tracing::warn!(name = %job.name(), error = %e, "failed to report job outcome");
    }
}

async fn execute(exec: &str, job: &Job) -> Result<Vec<u8>> {
    let mut child = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(exec)
        .env("PERIODIC_FUNC", job.func())
        .env("PERIODIC_NAME", job.name())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn {exec:?}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(job.args().as_bytes()).await.ok();
        drop(stdin);
    }
    let output = child.wait_with_output().await?;
    if !output.status.success() {
        anyhow::bail!("command exited with {}", output.status);
    }
    Ok(output.stdout)
}
