//! Rehydrate CLI Binary
//!
//! Command-line interface for restoring snapshots from an object store.

use anyhow::Context;
use clap::Parser;
use rehydrate::logging::init_logging;
use rehydrate::tooling::cli::{Cli, CliContext};
use std::process;

fn main() {
    match run() {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run() -> anyhow::Result<String> {
    let cli = Cli::parse();

    let context =
        CliContext::new(cli.config.clone()).context("failed to load configuration")?;
    let logging = cli.logging_config(&context.config().logging);
    init_logging(Some(&logging)).context("failed to initialise logging")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let cancel = context.cancellation();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping restore");
                cancel.cancel();
            }
        });
        Ok(context.execute(&cli.command).await?)
    })
}
