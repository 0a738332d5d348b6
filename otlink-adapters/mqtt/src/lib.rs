//! MQTT adapter.
//!
//! Wraps `rumqttc` behind the uniform [`otlink_sdk::ProtocolAdapter`]
//! contract. A background task drives the event loop and maintains the
//! transport's connected flag; "read" is a time-boxed subscribe-and-collect
//! over the requested topics.

mod adapter;
mod topic;

pub use adapter::{MqttAdapter, MqttHandle};
pub use topic::topic_matches;
