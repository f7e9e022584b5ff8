//! Client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default broker endpoint.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:3001/ws";

/// Settings for a room session. Every field has a default, so a partial
/// JSON document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the room broker.
    pub server_url: String,
    /// Minimum spacing between outbound cursor updates.
    pub cursor_throttle_ms: u64,
    /// First reconnect delay; doubled on each failed attempt.
    pub reconnect_base_ms: u64,
    /// Upper bound for the reconnect delay.
    pub reconnect_max_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            cursor_throttle_ms: 30,
            reconnect_base_ms: 500,
            reconnect_max_ms: 10_000,
        }
    }
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn cursor_throttle(&self) -> Duration {
        Duration::from_millis(self.cursor_throttle_ms)
    }

    pub fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms.max(self.reconnect_base_ms))
    }
}
