//! Server configuration from the environment.

use std::net::{AddrParseError, SocketAddr};
use std::num::ParseIntError;
use thiserror::Error;

pub const ADDR_VAR: &str = "INKROOM_ADDR";
pub const CHANNEL_CAPACITY_VAR: &str = "INKROOM_CHANNEL_CAPACITY";

const DEFAULT_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid INKROOM_ADDR {value:?}: {source}")]
    InvalidAddr {
        value: String,
        source: AddrParseError,
    },
    #[error("invalid INKROOM_CHANNEL_CAPACITY {value:?}: {source}")]
    InvalidCapacity {
        value: String,
        source: ParseIntError,
    },
    #[error("INKROOM_CHANNEL_CAPACITY must be at least 1")]
    ZeroCapacity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address
    pub addr: SocketAddr,
    /// Per-room broadcast buffer; slow peers past this lag and miss messages.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset variables use defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr_value = lookup(ADDR_VAR).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_value
            .trim()
            .parse()
            .map_err(|source| ConfigError::InvalidAddr {
                value: addr_value.clone(),
                source,
            })?;

        let channel_capacity = match lookup(CHANNEL_CAPACITY_VAR) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidCapacity {
                    value: value.clone(),
                    source,
                })?,
            None => DEFAULT_CHANNEL_CAPACITY,
        };
        if channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        Ok(Self {
            addr,
            channel_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.addr.port(), 3001);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            (ADDR_VAR, "127.0.0.1:9000"),
            (CHANNEL_CAPACITY_VAR, " 32 "),
        ]))
        .unwrap();
        assert_eq!(config.addr, SocketAddr::from(([127, 0, 0, 1], 9000)));
        assert_eq!(config.channel_capacity, 32);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[(ADDR_VAR, "nowhere")])),
            Err(ConfigError::InvalidAddr { .. })
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[(CHANNEL_CAPACITY_VAR, "lots")])),
            Err(ConfigError::InvalidCapacity { .. })
        ));
        assert!(matches!(
            ServerConfig::from_lookup(lookup(&[(CHANNEL_CAPACITY_VAR, "0")])),
            Err(ConfigError::ZeroCapacity)
        ));
    }
}
