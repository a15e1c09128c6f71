use anyhow::{Context, Result};
use broadside::cli::{init_logging, verify_fleet_file, Cli, Commands, ConfigCommand, RelayConfig};
use broadside::messages::generate_room_id;
use broadside::network::RelayServer;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

async fn run_relay(bind: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let mut config =
        RelayConfig::load(config_path.as_deref()).context("Failed to load relay configuration")?;
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }

    init_logging(&config.log_level);
    info!(
        bind_addr = %config.bind_addr,
        max_rooms = config.max_rooms,
        room_timeout_secs = config.room_timeout_secs,
        "Starting relay"
    );

    let server = RelayServer::bind(&config.bind_addr, config.server_config()).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Relay { bind, config } => run_relay(bind, config).await?,
        Commands::RoomId => {
            println!("{}", generate_room_id());
        }
        Commands::Verify {
            fleet,
            salt,
            digest,
        } => {
            init_logging("warn");
            let report = verify_fleet_file(&fleet, &salt, &digest)?;
            if !report.digest_matches {
                warn!("Revealed fleet does not match the committed digest");
            }
            if let Some(problem) = &report.fleet_error {
                warn!("Revealed fleet is not a legal layout: {}", problem);
            }
            if report.is_honest() {
                println!("✓ Fleet matches commitment");
            } else {
                println!("✗ Fleet does not match commitment");
                std::process::exit(1);
            }
        }
        Commands::Config { command } => match command {
            ConfigCommand::Path => {
                let path = RelayConfig::default_config_file()?;
                println!("{}", path.display());
                if !path.exists() {
                    println!("(file does not exist; defaults are used)");
                }
            }
        },
    }

    Ok(())
}
