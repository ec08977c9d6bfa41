//! redrest command-line client
//!
//! Runs a single command against the endpoint configured in the environment:
//!
//! ```text
//! REDIS_REST_URL=... REDIS_REST_TOKEN=... redrest SET greeting hello
//! ```
//!
//! With `-` as the only argument, commands are read from stdin one per line
//! and sent together as a single pipeline.

use anyhow::{bail, Context, Result};
use redrest_client::logging::init_logging;
use redrest_client::{Arg, ClientConfig, Command, Redis};
use serde_json::Value;
use std::io::{self, BufRead};
use tracing::debug;

fn parse_command<I, S>(words: I) -> Option<Command>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<Arg> = words.into_iter().map(|w| Arg::Str(w.into())).collect();
    if args.is_empty() {
        None
    } else {
        Some(Command::from_args(args))
    }
}

fn print_value(value: &Value) -> Result<()> {
    match value {
        Value::String(s) => println!("{}", s),
        other => println!("{}", serde_json::to_string_pretty(other)?),
    }
    Ok(())
}

async fn run_stdin(redis: &Redis) -> Result<()> {
    let mut pipeline = redis.pipeline();
    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        if let Some(command) = parse_command(line.split_whitespace()) {
            pipeline.push(command)?;
        }
    }
    if pipeline.is_empty() {
        bail!("no commands on stdin");
    }

    debug!("sending {} commands from stdin", pipeline.len());
    let mut failed = false;
    for result in pipeline.exec().await? {
        match result {
            Ok(value) => print_value(&value)?,
            Err(err) => {
                failed = true;
                eprintln!("(error) {}", err);
            }
        }
    }
    if failed {
        bail!("one or more commands failed");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        bail!("usage: redrest <COMMAND> [ARGS...] | redrest -");
    }

    let mut config = ClientConfig::from_env()?;
    config.latency_logging = std::env::var_os("REDREST_LATENCY").is_some();
    let redis = Redis::new(config)?;

    if args.len() == 1 && args[0] == "-" {
        return run_stdin(&redis).await;
    }

    let command = parse_command(args).context("missing command")?;
    let value = redis.execute_direct(command).await?;
    print_value(&value)
}
