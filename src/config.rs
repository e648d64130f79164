//! Process configuration (spec §1 ambient Configuration).
//!
//! Grounded on `examples/mycrl-turn-rs/src/config.rs`: a `clap::Parser` CLI
//! with a single `--config` flag, a `Config` struct deserialized from TOML
//! with `#[serde(default = "...")]` per-field defaults and `kebab-case`
//! renaming, split into nested structs per concern.

use std::fs::read_to_string;
use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Example: socks5-server --config /etc/socks5-server/config.toml
    #[arg(long, short)]
    config: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Socks5 {
    #[serde(default = "Socks5::listen")]
    pub listen: SocketAddr,
}

impl Socks5 {
    fn listen() -> SocketAddr {
        "0.0.0.0:1080".parse().unwrap()
    }
}

impl Default for Socks5 {
    fn default() -> Self {
        Self {
            listen: Self::listen(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Monitor {
    #[serde(default = "Monitor::listen")]
    pub listen: SocketAddr,
}

impl Monitor {
    fn listen() -> SocketAddr {
        "127.0.0.1:1090".parse().unwrap()
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            listen: Self::listen(),
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Users {
    /// Initial `name = "password"` table loaded at startup. Empty means the
    /// server runs with no authentication configured (NO AUTH only).
    #[serde(default)]
    pub initial: std::collections::HashMap<String, String>,
    #[serde(default = "Users::capacity")]
    pub capacity: usize,
}

impl Users {
    fn capacity() -> usize {
        256
    }
}

/// Which destination ports engage the opportunistic credential sniffers
/// (spec §9 Open Question: port list is a config knob; the monitor's
/// `SNIFF` command only toggles activation, not this list).
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct SniffPorts {
    #[serde(default = "SniffPorts::pop3")]
    pub pop3: Vec<u16>,
    #[serde(default = "SniffPorts::http")]
    pub http: Vec<u16>,
}

impl SniffPorts {
    fn pop3() -> Vec<u16> {
        vec![110]
    }

    fn http() -> Vec<u16> {
        vec![80]
    }
}

impl Default for SniffPorts {
    fn default() -> Self {
        Self {
            pop3: Self::pop3(),
            http: Self::http(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Sniff {
    #[serde(default)]
    pub pop3: bool,
    #[serde(default)]
    pub http: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub socks5: Socks5,
    #[serde(default)]
    pub monitor: Monitor,
    #[serde(default)]
    pub users: Users,
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub sniff: Sniff,
    #[serde(default)]
    pub sniff_ports: SniffPorts,
    /// Resolver worker pool size, clamped to 1-4 (spec §4.E) regardless of
    /// what's configured here.
    #[serde(default = "Config::resolver_workers")]
    pub resolver_workers: usize,
    #[serde(default = "Config::buffer_capacity")]
    pub buffer_capacity: usize,
    #[serde(default = "Config::idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Config {
    fn resolver_workers() -> usize {
        crate::resolver::DEFAULT_WORKERS
    }

    fn buffer_capacity() -> usize {
        8 * 1024
    }

    fn idle_timeout_secs() -> u64 {
        120
    }

    /// Loads CLI flags, then the TOML file they point at.
    pub fn load() -> Result<Self> {
        let cli = Cli::parse();
        Ok(toml::from_str(&read_to_string(&cli.config)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_document() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.socks5.listen.port(), 1080);
        assert_eq!(config.resolver_workers, crate::resolver::DEFAULT_WORKERS);
        assert_eq!(config.sniff_ports.pop3, vec![110]);
        assert_eq!(config.sniff_ports.http, vec![80]);
    }

    #[test]
    fn users_initial_table_is_parsed() {
        let toml = r#"
            [users]
            capacity = 10

            [users.initial]
            alice = "pw"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.users.initial.get("alice"), Some(&"pw".to_string()));
    }
}
