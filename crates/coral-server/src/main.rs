//! Server entry point: configuration, journal recovery, accept loop.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use coral_persistence::Journal;
use coral_server::config::{Cli, Config};
use coral_server::context::ServerContext;
use coral_server::{listener, recovery};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coral=info".into()),
        )
        .init();

    let config = Config::from_cli(Cli::parse());
    info!(
        "config: port={} max_keys={} aof={} rdb={} worker_pool={}",
        config.port,
        config.max_keys,
        config.aof_path.display(),
        config.rdb_path.display(),
        config.use_iocp,
    );
    if config.rdb_path.exists() {
        info!(
            "found snapshot file {} (use LOAD to restore)",
            config.rdb_path.display()
        );
    }

    let mut ctx = ServerContext::new(&config);

    match recovery::replay(&ctx.store, &config.aof_path) {
        Ok(0) => {}
        Ok(applied) => info!("journal replay applied {applied} commands"),
        Err(e) => warn!("journal replay failed: {e}"),
    }

    // the server still runs without a journal, it just isn't durable
    let journal = match Journal::open(&config.aof_path).await {
        Ok(journal) => {
            ctx.journal = Some(journal.handle());
            Some(journal)
        }
        Err(e) => {
            warn!("could not open journal {}: {e}", config.aof_path.display());
            None
        }
    };

    let listener = match listener::bind(config.port) {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind port {}: {e}", config.port);
            return ExitCode::FAILURE;
        }
    };
    info!("listening on 0.0.0.0:{}", config.port);

    let ctx = Arc::new(ctx);
    let exit = tokio::select! {
        result = listener::run(listener, Arc::clone(&ctx), config.use_iocp) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("accept loop failed: {e}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            ExitCode::SUCCESS
        }
    };

    // drain whatever the journal queue still holds before exiting
    if let Some(journal) = journal {
        journal.stop().await;
    }
    exit
}
