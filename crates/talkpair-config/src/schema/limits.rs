use serde::{Deserialize, Serialize};

/// Per-connection limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Longest accepted display name, in characters, after trimming.
    pub max_name_len: usize,
    /// Capacity of each connection's outbound notification queue.
    pub outbound_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_name_len: 32,
            outbound_buffer: 256,
        }
    }
}
