use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "broadside")]
#[command(about = "Relay and tooling for fair-play peer-to-peer battleship")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the room relay
    ///
    /// Pairs two players per room and forwards their messages without
    /// looking inside them. Settings come from the config file and the
    /// PORT, BIND_ADDR, MAX_ROOMS, MAX_CLIENTS_PER_ROOM, ROOM_TIMEOUT_MS
    /// and LOG_LEVEL environment variables.
    ///
    /// Examples:
    ///   broadside relay
    ///   broadside relay --bind 0.0.0.0:9000
    ///   broadside relay --config ./relay.toml
    Relay {
        /// Address to listen on (overrides config and environment)
        #[arg(short, long)]
        bind: Option<String>,
        /// Path to a relay config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print a fresh room id to share with an opponent
    RoomId,

    /// Check a revealed fleet against the digest committed before play
    ///
    /// The fleet file holds the JSON array sent in the reveal message.
    ///
    /// Example:
    ///   broadside verify --fleet fleet.json --salt <64 hex> --digest <64 hex>
    Verify {
        /// JSON file with the revealed ship placements
        #[arg(short, long)]
        fleet: PathBuf,
        /// Revealed salt, 64 hex characters
        #[arg(short, long)]
        salt: String,
        /// Digest committed before battle, 64 hex characters
        #[arg(short, long)]
        digest: String,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the default config file location
    Path,
}
