pub mod commands;
pub mod config;
pub mod logging;
pub mod verify;

pub use commands::{Cli, Commands, ConfigCommand};
pub use config::{ConfigError, RelayConfig, CONFIG_FILE_NAME, DEFAULT_BIND_ADDR};
pub use logging::init_logging;
pub use verify::{verify_fleet, verify_fleet_file, VerifyReport};
