//! Shared contract crate for the OT connections manager.
//!
//! Holds everything the pool, the scheduler and the three protocol adapter
//! crates agree on: connection configs and their pool cache keys, the
//! adapter trait, error taxonomy, probe/read value types and operation
//! deadlines.

mod adapter;
mod config;
mod error;
mod policy;
mod probe;
mod read;

pub use adapter::{LiveHandle, ProtocolAdapter};
pub use config::{
    CacheKey, ConnectionConfig, DataBits, ModbusConfig, ModbusTransport, MqttConfig, OpcUaAuth,
    OpcUaConfig, Parity, Protocol, StopBits,
};
pub use error::{AdapterError, AdapterResult};
pub use policy::OperationTimeouts;
pub use probe::{
    ConnectionRecord, ConnectionStatus, ProbeResult, StatusTransitionEvent, StatusUpdate,
};
pub use read::{
    ModbusFunctionCode, ModbusSample, ModbusValues, MqttSample, OpcUaSample, ReadRequest,
    ReadResult, RegisterTarget, SampleQuality,
};
