use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use periodic_client::{Client, SubmitOptions};
use periodic_core::endpoint::Endpoint;
use periodic_core::xor::XorKey;

use super::{flag, required_flag};

pub async fn run(endpoint: &Endpoint, key: Option<XorKey>, args: &[&str]) -> Result<()> {
    let func = required_flag(args, "-f", "function name")?;
    let name = required_flag(args, "-n", "job name")?;
    let timeout = match flag(args, "-t") {
        Some(t) => Some(t.parse().context("-t must be a number of seconds")?),
        None => None,
    };
    let delay: i64 = match flag(args, "--sched-later") {
        Some(d) => d.parse().context("--sched-later must be a number of seconds")?,
        None => 0,
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before the epoch")?
        .as_secs() as i64;

    let opts = SubmitOptions {
        args: flag(args, "--args").map(str::to_owned),
        sched_at: Some(now + delay),
        timeout,
    };

    let client = Client::connect(endpoint, key).await?;
    let result = client.submit_job(func, name, opts).await;
    client.close().await;
    result?;
    println!("submitted {func}/{name}");
    Ok(())
}
