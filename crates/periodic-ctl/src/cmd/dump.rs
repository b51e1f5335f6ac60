use anyhow::{Context, Result};

use periodic_client::Client;
use periodic_core::endpoint::Endpoint;
use periodic_core::xor::XorKey;

use super::flag;

pub async fn run(endpoint: &Endpoint, key: Option<XorKey>, args: &[&str]) -> Result<()> {
    let path = flag(args, "-o").unwrap_or("periodic.dump");
    let mut out = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create {path}"))?;

    let client = Client::connect(endpoint, key).await?;
    let result = client.dump(&mut out).await;
    client.close().await;
    result?;
    println!("dumped to {path}");
    Ok(())
}
