//! OPC UA adapter.
//!
//! Wraps the `opcua` async client behind the uniform
//! [`otlink_sdk::ProtocolAdapter`] contract. A background task drives the
//! session event loop; liveness is verified with a cheap one-node read of
//! the server status.

mod adapter;
mod codec;
mod session;

pub use adapter::{OpcUaAdapter, OpcUaHandle};
pub use codec::variant_to_json;
