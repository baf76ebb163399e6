//! Pipe-RPC worker exposing file operations on stdin/stdout.
//!
//! The parent process spawns this binary with the pipe master on the
//! other end of its standard streams. Stdout belongs to the protocol,
//! so all logging goes to stderr. When the parent closes its end the
//! serve loop returns and the process exits.

mod fileops;

use anyhow::Result;
use clap::Parser;
use fileops::FileOps;
use handoff_core::piperpc::PipeSlave;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "handoff-helper", about = "File-operation worker driven over pipe RPC")]
struct Args {
    /// Verbose logging on stderr.
    #[arg(long)]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("helper started");
    PipeSlave::serve(tokio::io::stdin(), tokio::io::stdout(), Arc::new(FileOps)).await?;
    info!("peer closed the pipe, exiting");
    Ok(())
}
