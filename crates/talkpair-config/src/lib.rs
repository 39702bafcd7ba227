//! TalkPair relay configuration.
//!
//! TOML-based configuration with full validation. Every section uses serde
//! defaults so an empty or partial file is a working config.
//!
//! ```rust,no_run
//! use talkpair_config::load_config;
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("listening on {}", config.server.socket_addr());
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{LimitsConfig, RelayConfig, ServerConfig, StatsConfig};
pub use toml_loader::{default_config_path, load_default, load_from_path};

use std::path::Path;
use talkpair_common::ConfigError;

/// Load config from an explicit path, or from the platform default path
/// when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    match path {
        Some(path) => load_from_path(path),
        None => load_default(),
    }
}
