use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deadlines applied to every network operation reachable from the health
/// sweep or the on-demand test/read paths. Each operation is raced against
/// its deadline individually, never as a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationTimeouts {
    /// Connect handshake deadline
    #[serde(default = "OperationTimeouts::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Connectivity test deadline
    #[serde(default = "OperationTimeouts::default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// OPC UA / Modbus read deadline
    #[serde(default = "OperationTimeouts::default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// MQTT subscribe-and-collect window
    #[serde(default = "OperationTimeouts::default_collect_window_ms")]
    pub collect_window_ms: u64,
}

impl OperationTimeouts {
    fn default_connect_timeout_ms() -> u64 {
        5000
    }

    fn default_probe_timeout_ms() -> u64 {
        5000
    }

    fn default_read_timeout_ms() -> u64 {
        10000
    }

    fn default_collect_window_ms() -> u64 {
        5000
    }

    #[inline]
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }

    #[inline]
    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }

    #[inline]
    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.max(1))
    }

    #[inline]
    pub fn collect_window(&self) -> Duration {
        Duration::from_millis(self.collect_window_ms.max(1))
    }
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout_ms: Self::default_connect_timeout_ms(),
            probe_timeout_ms: Self::default_probe_timeout_ms(),
            read_timeout_ms: Self::default_read_timeout_ms(),
            collect_window_ms: Self::default_collect_window_ms(),
        }
    }
}
