//! Scheduler trigger configuration.

use std::time::Duration;

use serde::Deserialize;

/// Default HTTP port for the trigger endpoint.
pub const DEFAULT_TRIGGER_PORT: u16 = 8080;

/// Trigger endpoint and internal ticker configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Host to bind to.
    pub host: String,
    pub port: u16,
    /// Bearer secret required by the trigger endpoint. Unset disables it.
    pub secret: Option<String>,
    /// Run a tick every N seconds in-process. Unset or zero disables the ticker.
    pub interval_secs: Option<u64>,
}

impl TriggerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Internal ticker period, if enabled.
    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_TRIGGER_PORT,
            secret: None,
            interval_secs: None,
        }
    }
}
