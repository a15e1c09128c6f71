use broadside::cli::{ConfigError, RelayConfig};
use std::io::Write;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_full_file_roundtrip() {
    let config = RelayConfig {
        bind_addr: "0.0.0.0:9999".to_string(),
        max_rooms: 12,
        room_timeout_secs: 120,
        ..RelayConfig::default()
    };

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("relay.toml");
    std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = RelayConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
    let server = loaded.server_config();
    assert_eq!(server.rooms.max_rooms, 12);
    assert_eq!(server.rooms.room_timeout, Duration::from_secs(120));
}

#[test]
fn test_missing_file_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    let err = RelayConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_unknown_keys_are_tolerated() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "bind_addr = \"127.0.0.1:7000\"\nfuture_option = true").unwrap();
    let config = RelayConfig::from_file(file.path()).unwrap();
    assert_eq!(config.bind_addr, "127.0.0.1:7000");
}

#[test]
fn test_zero_limits_are_rejected() {
    let config = RelayConfig {
        max_clients_per_room: 0,
        ..RelayConfig::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let config = RelayConfig {
        rate_limit_window_secs: 0,
        ..RelayConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_default_path_is_under_config_dir() {
    if let Ok(path) = RelayConfig::default_config_file() {
        assert!(path.ends_with("relay.toml"));
    }
}
