//! memostore command-line interface

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod commands;
mod tracing;

use crate::cli::{Cli, Commands};
use crate::tracing::{TracingConfig, init_tracing};
use clap::Parser;
use memostore::CacheContext;
use memostore_remote::{StoreConfig, open_cache_store};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("{error:?}");
        std::process::exit(1);
    }
}

async fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.log_level.into(),
        ..TracingConfig::default()
    })?;

    let config = StoreConfig::load_or_default(&cli.config);

    let output = match cli.command {
        Commands::Fingerprint { id, args, kwargs } => {
            commands::fingerprint(&id, args, kwargs, &config.prefix)?
        }
        Commands::Exists { fingerprint } => {
            let store = open_cache_store(&config)?;
            commands::exists(&store, &fingerprint).await?
        }
        Commands::Inspect { fingerprint } => {
            let store = open_cache_store(&config)?;
            commands::inspect(&store, &fingerprint).await?
        }
        Commands::Bootstrap => {
            let store = open_cache_store(&config)?;
            commands::bootstrap(&store).await?
        }
        Commands::Demo => {
            let context = CacheContext::from_config(&config)?;
            context.bootstrap().await;
            commands::demo(context).await?
        }
    };

    println!("{}", output.trim_end());
    Ok(())
}
