use anyhow::Result;

use periodic_client::Client;
use periodic_core::endpoint::Endpoint;
use periodic_core::xor::XorKey;

use super::required_flag;

pub async fn run(endpoint: &Endpoint, key: Option<XorKey>, args: &[&str]) -> Result<()> {
    let func = required_flag(args, "-f", "function name")?;
    let name = required_flag(args, "-n", "job name")?;

    let client = Client::connect(endpoint, key).await?;
    let result = client.remove_job(func, name).await;
    client.close().await;
    result?;
    println!("removed {func}/{name}");
    Ok(())
}
