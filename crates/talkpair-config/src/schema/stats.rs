use serde::{Deserialize, Serialize};

/// Periodic stats logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Seconds between stats log lines.
    pub interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}
