//! Adapter configuration.
//!
//! Loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via EIPKIT_CONFIG)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, String),
}

/// Top-level adapter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub identity: IdentityConfig,
    /// Assembly instances to register at startup.
    pub assemblies: Vec<AssemblyConfig>,
}

impl Config {
    /// Loads configuration from file (if `EIPKIT_CONFIG` is set), then
    /// applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("EIPKIT_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.network.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))
    }
}

/// Network listeners.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// TCP address for explicit messaging.
    pub bind_addr: SocketAddr,
    /// UDP address for implicit I/O.
    pub udp_bind_addr: SocketAddr,
    /// Maximum concurrent TCP connections.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], eipkit_protocol::DEFAULT_PORT)),
            udp_bind_addr: SocketAddr::from(([0, 0, 0, 0], eipkit_protocol::IO_DEFAULT_PORT)),
            max_connections: 64,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("EIPKIT_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }
        if let Ok(addr) = std::env::var("EIPKIT_UDP_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.udp_bind_addr = parsed;
            }
        }
        if let Ok(n) = std::env::var("EIPKIT_MAX_CONNECTIONS") {
            if let Ok(parsed) = n.parse() {
                self.max_connections = parsed;
            }
        }
    }
}

/// Identity-object fields advertised by the adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub vendor_id: u16,
    pub product_code: u16,
    pub product_name: String,
    pub serial_number: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            vendor_id: 0x1337,
            product_code: 1,
            product_name: "eipkit adapter".to_string(),
            serial_number: 0,
        }
    }
}

/// One assembly instance registered at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    pub id: u32,
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.network.bind_addr.port(), 44818);
        assert_eq!(config.network.udp_bind_addr.port(), 2222);
        assert!(config.assemblies.is_empty());
        assert_eq!(config.identity.product_name, "eipkit adapter");
    }

    #[test]
    fn test_yaml_parse() {
        let yaml = r#"
network:
  bind_addr: "127.0.0.1:4481"
  udp_bind_addr: "127.0.0.1:3333"
identity:
  vendor_id: 7
  product_name: "bench rig"
assemblies:
  - id: 100
    size: 32
  - id: 150
    size: 16
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.network.bind_addr.port(), 4481);
        assert_eq!(config.network.max_connections, 64); // default kept
        assert_eq!(config.identity.vendor_id, 7);
        assert_eq!(config.assemblies.len(), 2);
        assert_eq!(config.assemblies[1].id, 150);
    }
}
