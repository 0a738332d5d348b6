use crate::error::{AdapterError, AdapterResult};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::fmt::{self, Display, Formatter};

/// Protocols a connection record may declare. Only the first three carry a
/// compiled driver; the remaining OT-class protocols are registered for
/// health bookkeeping but cannot be probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Protocol {
    #[serde(rename = "opcua")]
    OpcUa,
    Mqtt,
    Modbus,
    Scada,
    Mes,
    DataHistorian,
}

impl Protocol {
    /// Whether a protocol adapter exists for this protocol.
    #[inline]
    pub fn has_driver(&self) -> bool {
        matches!(self, Protocol::OpcUa | Protocol::Mqtt | Protocol::Modbus)
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protocol::OpcUa => "opcua",
            Protocol::Mqtt => "mqtt",
            Protocol::Modbus => "modbus",
            Protocol::Scada => "scada",
            Protocol::Mes => "mes",
            Protocol::DataHistorian => "dataHistorian",
        };
        f.write_str(s)
    }
}

/// Deterministic pool identity derived from the identifying fields of a
/// connection config. Two configs with equal keys are the same logical
/// connection for pooling purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// OPC UA authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum OpcUaAuth {
    Anonymous,
    UserPassword { username: String, password: String },
}

impl OpcUaAuth {
    /// Identity component of the cache key. Sessions opened under different
    /// identities are never interchangeable.
    fn identity(&self) -> &str {
        match self {
            OpcUaAuth::Anonymous => "anonymous",
            OpcUaAuth::UserPassword { username, .. } => username,
        }
    }
}

impl Default for OpcUaAuth {
    fn default() -> Self {
        OpcUaAuth::Anonymous
    }
}

/// OPC UA connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpcUaConfig {
    /// Server endpoint URL, e.g. `opc.tcp://host:4840/path`
    pub endpoint_url: String,
    #[serde(default)]
    pub auth: OpcUaAuth,
    #[serde(default = "OpcUaConfig::default_application_name")]
    pub application_name: String,
    #[serde(default = "OpcUaConfig::default_application_uri")]
    pub application_uri: String,
    /// Session timeout requested from the server
    #[serde(default = "OpcUaConfig::default_session_timeout_ms")]
    pub session_timeout_ms: u32,
    /// Keep alive interval for the session event loop
    #[serde(default = "OpcUaConfig::default_keep_alive_interval_ms")]
    pub keep_alive_interval_ms: u32,
}

impl OpcUaConfig {
    fn default_application_name() -> String {
        "otlink".to_string()
    }

    fn default_application_uri() -> String {
        "urn:otlink:client".to_string()
    }

    fn default_session_timeout_ms() -> u32 {
        30000
    }

    fn default_keep_alive_interval_ms() -> u32 {
        30000
    }
}

/// MQTT connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttConfig {
    pub broker_host: String,
    #[serde(default = "MqttConfig::default_broker_port")]
    pub broker_port: u16,
    /// Stable client id. When absent a random one is generated at connect
    /// time; such configs still pool under the same key.
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "MqttConfig::default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    #[serde(default = "MqttConfig::default_clean_session")]
    pub clean_session: bool,
}

impl MqttConfig {
    fn default_broker_port() -> u16 {
        1883
    }

    fn default_keep_alive_secs() -> u64 {
        30
    }

    fn default_clean_session() -> bool {
        true
    }
}

/// Modbus transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ModbusTransport {
    Tcp {
        host: String,
        #[serde(default = "ModbusTransport::default_tcp_port")]
        port: u16,
    },
    Rtu {
        serial_port: String,
        #[serde(default = "ModbusTransport::default_baud_rate")]
        baud_rate: u32,
        #[serde(default = "ModbusTransport::default_data_bits")]
        data_bits: DataBits,
        #[serde(default = "ModbusTransport::default_stop_bits")]
        stop_bits: StopBits,
        #[serde(default)]
        parity: Parity,
    },
}

impl ModbusTransport {
    fn default_tcp_port() -> u16 {
        502
    }

    fn default_baud_rate() -> u32 {
        9600
    }

    fn default_data_bits() -> DataBits {
        DataBits::Eight
    }

    fn default_stop_bits() -> StopBits {
        StopBits::One
    }
}

/// Serial data bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i16)]
pub enum DataBits {
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
}

/// Serial stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i16)]
pub enum StopBits {
    One = 1,
    Two = 2,
}

/// Serial parity settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize_repr, Deserialize_repr)]
#[repr(i16)]
pub enum Parity {
    #[default]
    None = 0,
    Odd = 1,
    Even = 2,
}

/// Modbus connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModbusConfig {
    pub transport: ModbusTransport,
    /// Slave / unit address; when absent the transport default applies
    #[serde(default)]
    pub unit_id: Option<u8>,
}

/// Typed view over a connection record's persisted config JSON.
///
/// Parsing and validation happen once, before any I/O; adapters receive the
/// matching variant and never see raw JSON.
#[derive(Debug, Clone)]
pub enum ConnectionConfig {
    OpcUa(OpcUaConfig),
    Mqtt(MqttConfig),
    Modbus(ModbusConfig),
}

impl ConnectionConfig {
    /// Parse the persisted config JSON for the given protocol.
    ///
    /// Protocols without a driver are rejected here; the caller decides
    /// whether that is an error (reads) or a synthetic pass (health checks).
    pub fn parse(protocol: Protocol, raw: &serde_json::Value) -> AdapterResult<Self> {
        let parsed = match protocol {
            Protocol::OpcUa => serde_json::from_value::<OpcUaConfig>(raw.clone())
                .map(ConnectionConfig::OpcUa)
                .map_err(|e| AdapterError::ConfigError(format!("invalid OPC UA config: {e}")))?,
            Protocol::Mqtt => serde_json::from_value::<MqttConfig>(raw.clone())
                .map(ConnectionConfig::Mqtt)
                .map_err(|e| AdapterError::ConfigError(format!("invalid MQTT config: {e}")))?,
            Protocol::Modbus => serde_json::from_value::<ModbusConfig>(raw.clone())
                .map(ConnectionConfig::Modbus)
                .map_err(|e| AdapterError::ConfigError(format!("invalid Modbus config: {e}")))?,
            other => return Err(AdapterError::DriverUnavailable(other)),
        };
        parsed.validate()?;
        Ok(parsed)
    }

    #[inline]
    pub fn protocol(&self) -> Protocol {
        match self {
            ConnectionConfig::OpcUa(_) => Protocol::OpcUa,
            ConnectionConfig::Mqtt(_) => Protocol::Mqtt,
            ConnectionConfig::Modbus(_) => Protocol::Modbus,
        }
    }

    /// Reject configs whose identifying fields are missing before any
    /// network attempt is made.
    pub fn validate(&self) -> AdapterResult<()> {
        match self {
            ConnectionConfig::OpcUa(cfg) if cfg.endpoint_url.trim().is_empty() => Err(
                AdapterError::ConfigError("OPC UA endpoint URL is required".to_string()),
            ),
            ConnectionConfig::Mqtt(cfg) if cfg.broker_host.trim().is_empty() => Err(
                AdapterError::ConfigError("MQTT broker host is required".to_string()),
            ),
            ConnectionConfig::Modbus(cfg) => match &cfg.transport {
                ModbusTransport::Tcp { host, .. } if host.trim().is_empty() => Err(
                    AdapterError::ConfigError("Modbus TCP host is required".to_string()),
                ),
                ModbusTransport::Rtu { serial_port, .. } if serial_port.trim().is_empty() => Err(
                    AdapterError::ConfigError("Modbus RTU serial port is required".to_string()),
                ),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Derive the pool identity from the identifying fields only.
    /// Credentials beyond the identity, timeouts and tuning knobs do not
    /// participate.
    pub fn cache_key(&self) -> CacheKey {
        let key = match self {
            ConnectionConfig::OpcUa(cfg) => {
                format!("opcua://{}#{}", cfg.endpoint_url.trim(), cfg.auth.identity())
            }
            ConnectionConfig::Mqtt(cfg) => format!(
                "mqtt://{}:{}#{}",
                cfg.broker_host.trim(),
                cfg.broker_port,
                cfg.client_id.as_deref().unwrap_or("auto")
            ),
            ConnectionConfig::Modbus(cfg) => {
                let unit = cfg
                    .unit_id
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "-".to_string());
                match &cfg.transport {
                    ModbusTransport::Tcp { host, port } => {
                        format!("modbus+tcp://{}:{}#{}", host.trim(), port, unit)
                    }
                    ModbusTransport::Rtu {
                        serial_port,
                        baud_rate,
                        ..
                    } => format!("modbus+rtu://{}:{}#{}", serial_port.trim(), baud_rate, unit),
                }
            }
        };
        CacheKey(key)
    }
}
