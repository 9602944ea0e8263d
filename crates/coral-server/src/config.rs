//! Server configuration.
//!
//! Settings come from three layers: built-in defaults, an optional
//! config file of `key = value` lines, and CLI flags. The file is
//! applied over the defaults first, then explicit flags override the
//! file regardless of argument order. Unknown file keys and
//! unparseable values are ignored so an old config file never stops
//! the server from booting.

use std::path::PathBuf;

use clap::Parser;
use tracing::warn;

/// Command-line flags.
#[derive(Debug, Parser, Default)]
#[command(
    name = "coral-server",
    version,
    about = "Redis-compatible in-memory key/value server"
)]
pub struct Cli {
    /// Server port.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Max keys per database before LRU eviction.
    #[arg(short, long)]
    pub max_keys: Option<usize>,

    /// Journal (AOF) file path.
    #[arg(short, long)]
    pub aof: Option<PathBuf>,

    /// Snapshot (RDB) file path.
    #[arg(short, long)]
    pub rdb: Option<PathBuf>,

    /// Serve connections from a fixed worker pool instead of one task
    /// per connection.
    #[arg(long)]
    pub iocp: bool,

    /// Config file path (`key = value` lines, `#` comments).
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Effective server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub max_keys: usize,
    pub aof_path: PathBuf,
    pub rdb_path: PathBuf,
    pub use_iocp: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 6379,
            max_keys: 10_000,
            aof_path: PathBuf::from("coral.aof"),
            rdb_path: PathBuf::from("coral_dump.rdb"),
            use_iocp: false,
        }
    }
}

impl Config {
    /// Resolves the effective configuration from parsed CLI flags.
    pub fn from_cli(cli: Cli) -> Self {
        let mut config = Config::default();

        if let Some(path) = &cli.config {
            match std::fs::read_to_string(path) {
                Ok(text) => config.apply_file(&text),
                Err(e) => warn!("could not read config file {}: {e}", path.display()),
            }
        }

        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(max_keys) = cli.max_keys {
            config.max_keys = max_keys;
        }
        if let Some(aof) = cli.aof {
            config.aof_path = aof;
        }
        if let Some(rdb) = cli.rdb {
            config.rdb_path = rdb;
        }
        if cli.iocp {
            config.use_iocp = true;
        }

        config
    }

    /// Applies `key = value` lines over the current settings.
    pub fn apply_file(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "port" => {
                    if let Ok(port) = value.parse() {
                        self.port = port;
                    }
                }
                "max_keys" => {
                    if let Ok(max_keys) = value.parse() {
                        self.max_keys = max_keys;
                    }
                }
                "aof_path" => self.aof_path = PathBuf::from(value),
                "rdb_path" => self.rdb_path = PathBuf::from(value),
                "use_iocp" => {
                    self.use_iocp = matches!(value, "true" | "1" | "yes");
                }
                _ => {}
            }
        }
    }
}
