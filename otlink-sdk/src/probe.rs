use crate::config::Protocol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted connection health state.
///
/// `status` only transitions on an actual probe outcome, never
/// optimistically; `Inactive` is the CRUD layer's resting state for
/// connections that have not been probed yet or were disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Active,
    Inactive,
    Error,
}

/// One user-configured OT connection as persisted by the external store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub id: String,
    pub org_id: String,
    pub protocol: Protocol,
    /// Protocol-specific config, parsed into a typed config at use time
    pub config: serde_json::Value,
    pub status: ConnectionStatus,
    #[serde(default)]
    pub last_tested_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
}

/// Fields written back to a connection record after every probe, whether or
/// not the status changed — `last_tested_at` must stay fresh for staleness
/// detection in dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: ConnectionStatus,
    pub last_tested_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub latency_ms: Option<u64>,
}

/// Outcome of one connectivity test. Transient; folded into a
/// [`StatusUpdate`] by the health-check sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub success: bool,
    pub message: String,
    pub latency_ms: u64,
}

impl ProbeResult {
    pub fn ok(message: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            success: true,
            message: message.into(),
            latency_ms,
        }
    }

    pub fn failed(message: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            success: false,
            message: message.into(),
            latency_ms,
        }
    }
}

/// Emitted only when a probe flips a connection's persisted status.
/// Delivery is at-most-once and fire-and-forget; a missed event is not
/// replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransitionEvent {
    pub connection_id: String,
    pub protocol: Protocol,
    pub old_status: ConnectionStatus,
    pub new_status: ConnectionStatus,
    pub latency_ms: Option<u64>,
    pub last_error: Option<String>,
}
