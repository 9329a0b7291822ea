#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

mod cli;
mod config;
mod db;
mod discord;
mod recorder;
mod utils;

use config::Config;
use utils::logging::ErrorLog;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let mut config = Config::load(&args.config)?;
    args.apply(&mut config);

    utils::logging::init_tracing(&config.logging.level);
    config.validate()?;
    info!("discord-reporter starting up");

    let db_manager = Arc::new(db::DatabaseManager::open(&config.database)?);
    db_manager.migrate().await?;

    let error_log = Arc::new(ErrorLog::new(&config.logging.error_log));
    let recorder = Arc::new(recorder::RecorderCore::new(db_manager, error_log));
    let processor = Arc::new(discord::EventProcessor::new(recorder));

    let client = Arc::new(discord::DiscordClient::new(&config)?);
    client.set_processor(processor).await;

    let gateway_handle = {
        let client = client.clone();
        tokio::spawn(async move {
            if let Err(err) = client.start().await {
                error!("gateway error: {err:#}");
            }
        })
    };
    tokio::pin!(gateway_handle);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, beginning shutdown");
        },
        _ = &mut gateway_handle => {
            info!("gateway task exited, beginning shutdown");
        },
    }

    client.stop();
    gateway_handle.abort();

    info!("discord-reporter shut down");
    Ok(())
}
