//! Configuration schema types for the relay.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod limits;
mod server;
mod stats;

pub use limits::*;
pub use server::*;
pub use stats::*;

use serde::{Deserialize, Serialize};

/// Root configuration for the relay server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub stats: StatsConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: RelayConfig = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.limits.max_name_len, 32);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config: RelayConfig = toml::from_str("[server]\nmystery = true\n").unwrap();
        assert_eq!(config.server.port, 8080);
    }
}
