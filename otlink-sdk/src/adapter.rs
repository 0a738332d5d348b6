use crate::{
    config::{ConnectionConfig, Protocol},
    error::AdapterResult,
    read::{ReadRequest, ReadResult},
};
use async_trait::async_trait;
use downcast_rs::{impl_downcast, DowncastSync};
use std::sync::Arc;

/// Opaque live transport handle owned by the connection pool.
///
/// Concrete handle types live in the adapter crates and are recovered there
/// via downcasting; nothing outside an adapter inspects a handle.
pub trait LiveHandle: DowncastSync {}
impl_downcast!(sync LiveHandle);

/// Uniform connect/verify/read/disconnect contract implemented once per
/// protocol. All methods are probe-safe: they never panic on a bad handle
/// or config, they return typed errors.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Establish a session/link for the given config.
    ///
    /// Implementations validate that the config variant matches their
    /// protocol and fail with a config error otherwise.
    async fn connect(&self, config: &ConnectionConfig) -> AdapterResult<Arc<dyn LiveHandle>>;

    /// Cheap non-mutating probe confirming the handle still has a live
    /// transport. Protocols without an independent liveness signal
    /// (Modbus) report `true`; their liveness is discovered by the next
    /// read failing.
    async fn verify_live(&self, handle: &Arc<dyn LiveHandle>) -> bool;

    /// Protocol-specific read; see [`ReadRequest`] for the per-protocol
    /// parameter shapes.
    async fn read(
        &self,
        handle: &Arc<dyn LiveHandle>,
        request: &ReadRequest,
    ) -> AdapterResult<ReadResult>;

    /// Best-effort teardown. Failures are logged by the implementation and
    /// never surfaced; teardown errors are not actionable by callers.
    async fn disconnect(&self, handle: Arc<dyn LiveHandle>);
}
