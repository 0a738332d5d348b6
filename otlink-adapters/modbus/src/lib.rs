//! Modbus TCP/RTU adapter.
//!
//! Wraps `tokio-modbus` behind the uniform [`otlink_sdk::ProtocolAdapter`]
//! contract. Modbus has no independent liveness probe; link health is
//! tracked from read outcomes and reported through `verify_live` as a
//! local flag check.

mod adapter;
mod read;

pub use adapter::{ModbusAdapter, ModbusHandle};
pub use read::{read_register_targets, BatchRead};
