//! periodic — command-line front-end for the Periodic task server.

use std::path::Path;

use anyhow::{Context, Result};

use periodic_core::endpoint::{resolve_xor_key, Endpoint, DEFAULT_ENDPOINT};

mod cmd;

fn print_usage() {
    println!("Usage: periodic [-H <endpoint>] [-x <key_file>] <command>");
    println!();
    println!("Commands");
    println!("  status                          Per-function queue statistics");
    println!("  submit -f <func> -n <name>      Submit a job");
    println!("         [--args <s>] [-t <timeout>] [--sched-later <secs>]");
    println!("  remove -f <func> -n <name>      Remove a queued job");
    println!("  drop -f <func>                  Drop a function with no workers");
    println!("  run -f <func> --exec <cmd>      Work jobs by running a command");
    println!("      [-n <size>]");
    println!("  dump [-o <file>]                Stream the server's data to a file");
    println!();
    println!("Options:");
    println!("  -H <endpoint>                   Server address, e.g. tcp://127.0.0.1:5000");
    println!("                                  (env PERIODIC_PORT, default {DEFAULT_ENDPOINT})");
    println!("  -x <key_file>                   XOR transport key file (env XOR_FILE)");
    println!();
    println!("Examples:");
    println!("  periodic status");
    println!("  periodic submit -f email -n user-42 --args 'hello' --sched-later 60");
    println!("  periodic run -f email -n 8 --exec ./send-email.sh");
    println!("  periodic -H tcp://127.0.0.1:5000 dump -o backup.db");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse the global -H / -x options wherever they appear
    let mut addr: Option<String> = None;
    let mut key_file: Option<String> = None;
    let mut remaining: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-H" => {
                i += 1;
                addr = Some(args.get(i).context("-H requires an endpoint")?.clone());
            }
            "-x" => {
                i += 1;
                key_file = Some(args.get(i).context("-x requires a key file")?.clone());
            }
            _ => remaining.push(args[i].clone()),
        }
        i += 1;
    }

    let endpoint = Endpoint::resolve(addr.as_deref())?;
    let key = resolve_xor_key(key_file.as_deref().map(Path::new))?;

    let remaining_refs: Vec<&str> = remaining.iter().map(|s| s.as_str()).collect();
    match remaining_refs.as_slice() {
        ["status"] => cmd::status::run(&endpoint, key).await,
        ["submit", rest @ ..] => cmd::submit::run(&endpoint, key, rest).await,
        ["remove", rest @ ..] => cmd::remove::run(&endpoint, key, rest).await,
        ["drop", rest @ ..] => cmd::drop::run(&endpoint, key, rest).await,
        ["run", rest @ ..] => cmd::run::run(&endpoint, key, rest).await,
        ["dump", rest @ ..] => cmd::dump::run(&endpoint, key, rest).await,
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
