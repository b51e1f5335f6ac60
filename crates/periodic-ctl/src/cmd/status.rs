use anyhow::Result;

use periodic_client::Client;
use periodic_core::endpoint::Endpoint;
use periodic_core::xor::XorKey;

const HEADERS: [&str; 6] = ["FUNCTIONS", "WORKERS", "JOBS", "PROCESSING", "LOCKED", "SCHEDAT"];

pub async fn run(endpoint: &Endpoint, key: Option<XorKey>) -> Result<()> {
    let client = Client::connect(endpoint, key).await?;
    let rows = client.status().await?;
    client.close().await;

    // size each column to its widest cell
    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.len());
        }
    }
    print_row(&widths, HEADERS.iter().map(|h| (*h).to_owned()).collect());
    for row in rows {
        print_row(&widths, row);
    }
    Ok(())
}

fn print_row(widths: &[usize], cells: Vec<String>) {
    let line: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, &w)| format!("{:<w$}", cells.get(i).map(String::as_str).unwrap_or("")))
        .collect();
    println!("{}", line.join("  ").trim_end());
}
