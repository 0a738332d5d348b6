use crate::config::Protocol;
use std::time::Duration;
use thiserror::Error;

/// Adapter specific errors
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Connect error: {0}")]
    ConnectError(String),
    #[error("Session error: {0}")]
    SessionError(String),
    #[error("Read error: {0}")]
    ReadError(String),
    #[error("Operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("No driver available for protocol '{0}'")]
    DriverUnavailable(Protocol),
}

pub type AdapterResult<T> = Result<T, AdapterError>;
