//! Server configuration.
//!
//! The listen port is the only operator-facing knob; everything else has a
//! fixed default. A port that cannot be used never stops the server from
//! starting: [`resolve_port`] falls back to [`DEFAULT_PORT`] and logs why.
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use log::warn;
use thiserror::Error;

use crate::store::SqliteStore;

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_PORT: u16 = 7778;
pub const DATABASE_NAME: &str = "sqlgate.db";
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("{0} is not a usable port; expected 1-65535")]
    OutOfRange(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// SQLite file every statement runs against.
    pub database: PathBuf,
    pub busy_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            database: PathBuf::from(DATABASE_NAME),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn store(&self) -> SqliteStore {
        SqliteStore::new(self.database.clone(), self.busy_timeout)
    }
}

pub fn parse_port(raw: &str) -> Result<u16, PortError> {
    let raw = raw.trim();
    let value = raw
        .parse::<i64>()
        .map_err(|_| PortError::NotANumber(raw.to_string()))?;

    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(PortError::OutOfRange(value)),
    }
}

/// Port to listen on, given the optional command line argument.
pub fn resolve_port(raw: Option<&str>) -> u16 {
    let Some(raw) = raw else {
        return DEFAULT_PORT;
    };

    parse_port(raw).unwrap_or_else(|e| {
        warn!("invalid port {e}, falling back to default {DEFAULT_PORT}");
        DEFAULT_PORT
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.address(), "127.0.0.1:7778".parse().unwrap());
        assert_eq!(config.database, PathBuf::from("sqlgate.db"));
        assert_eq!(config.store().path(), PathBuf::from("sqlgate.db"));
    }

    #[test]
    fn parse_valid_ports() {
        assert_eq!(parse_port("8080"), Ok(8080));
        assert_eq!(parse_port(" 1 "), Ok(1));
        assert_eq!(parse_port("65535"), Ok(65535));
    }

    #[test]
    fn parse_invalid_ports() {
        assert_eq!(parse_port("abc"), Err(PortError::NotANumber("abc".into())));
        assert_eq!(parse_port(""), Err(PortError::NotANumber("".into())));
        assert_eq!(parse_port("0"), Err(PortError::OutOfRange(0)));
        assert_eq!(parse_port("-5"), Err(PortError::OutOfRange(-5)));
        assert_eq!(parse_port("70000"), Err(PortError::OutOfRange(70000)));
    }

    #[test]
    fn resolve_falls_back_to_default() {
        assert_eq!(resolve_port(None), DEFAULT_PORT);
        assert_eq!(resolve_port(Some("not-a-port")), DEFAULT_PORT);
        assert_eq!(resolve_port(Some("99999")), DEFAULT_PORT);
        assert_eq!(resolve_port(Some("9000")), 9000);
    }
}
