use crate::error::AdapterError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::time::Duration;

/// Modbus read function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i16)]
pub enum ModbusFunctionCode {
    /// Read Coils (0x01)
    ReadCoils = 1,
    /// Read Discrete Inputs (0x02)
    ReadDiscreteInputs = 2,
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = 3,
    /// Read Input Registers (0x04)
    ReadInputRegisters = 4,
}

impl TryFrom<u8> for ModbusFunctionCode {
    type Error = AdapterError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ModbusFunctionCode::ReadCoils),
            2 => Ok(ModbusFunctionCode::ReadDiscreteInputs),
            3 => Ok(ModbusFunctionCode::ReadHoldingRegisters),
            4 => Ok(ModbusFunctionCode::ReadInputRegisters),
            _ => Err(AdapterError::ConfigError(format!(
                "Invalid read function code: {value}"
            ))),
        }
    }
}

/// One Modbus address to read
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTarget {
    pub address: u16,
    pub function_code: ModbusFunctionCode,
    #[serde(default = "RegisterTarget::default_quantity")]
    pub quantity: u16,
}

impl RegisterTarget {
    fn default_quantity() -> u16 {
        1
    }
}

/// Protocol-shaped read parameters.
///
/// The three protocols do not share read semantics: OPC UA and Modbus are
/// per-item request/response, MQTT accumulates whatever arrives during a
/// collection window. The request type keeps those shapes distinct instead
/// of forcing a false uniformity.
#[derive(Debug, Clone)]
pub enum ReadRequest {
    OpcUa {
        node_ids: Vec<String>,
    },
    Mqtt {
        topics: Vec<String>,
        collect_window: Duration,
    },
    Modbus {
        targets: Vec<RegisterTarget>,
    },
}

/// Value quality reported for an OPC UA sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleQuality {
    Good,
    Bad,
    Uncertain,
}

/// One OPC UA node read outcome; order follows the request's node id order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpcUaSample {
    pub node_id: String,
    pub value: Option<serde_json::Value>,
    pub status_code: String,
    pub quality: SampleQuality,
}

/// One message collected from a subscribed MQTT topic during the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttSample {
    pub topic: String,
    /// JSON payload when the message parses as JSON, raw string otherwise
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// Decoded values for one Modbus address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ModbusValues {
    Coils { bits: Vec<bool> },
    Registers { words: Vec<u16> },
}

/// One Modbus address outcome. A failing address carries its error here and
/// never aborts the remaining addresses of the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModbusSample {
    pub address: u16,
    pub function_code: ModbusFunctionCode,
    pub values: Option<ModbusValues>,
    pub error: Option<String>,
}

impl ModbusSample {
    pub fn ok(target: &RegisterTarget, values: ModbusValues) -> Self {
        Self {
            address: target.address,
            function_code: target.function_code,
            values: Some(values),
            error: None,
        }
    }

    pub fn failed(target: &RegisterTarget, error: impl Into<String>) -> Self {
        Self {
            address: target.address,
            function_code: target.function_code,
            values: None,
            error: Some(error.into()),
        }
    }
}

/// Protocol-shaped read results, mirroring [`ReadRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "protocol", content = "samples")]
pub enum ReadResult {
    #[serde(rename = "opcua")]
    OpcUa(Vec<OpcUaSample>),
    Mqtt(Vec<MqttSample>),
    Modbus(Vec<ModbusSample>),
}
