use crate::{
    codec::variant_to_json,
    session::{connect_once, drive_session},
};
use async_trait::async_trait;
use opcua::{
    client::Session,
    types::{NodeId, ReadValueId, TimestampsToReturn},
};
use otlink_sdk::{
    AdapterError, AdapterResult, ConnectionConfig, LiveHandle, OpcUaSample, OperationTimeouts,
    Protocol, ProtocolAdapter, ReadRequest, ReadResult, SampleQuality,
};
use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::oneshot, task::JoinHandle, time::timeout};
use tracing::{debug, instrument, warn};

/// Numeric id of Server_ServerStatus_State, the canonical cheap probe node.
const SERVER_STATUS_STATE: u32 = 2259;

/// Live OPC UA session plus the background task driving its event loop.
pub struct OpcUaHandle {
    session: Arc<Session>,
    /// Mirrors the event loop's view of the transport
    healthy: Arc<AtomicBool>,
    event_task: JoinHandle<()>,
    endpoint: String,
}

impl LiveHandle for OpcUaHandle {}

/// OPC UA protocol adapter
pub struct OpcUaAdapter {
    timeouts: OperationTimeouts,
}

impl OpcUaAdapter {
    pub fn new(timeouts: OperationTimeouts) -> Self {
        Self { timeouts }
    }
}

impl Default for OpcUaAdapter {
    fn default() -> Self {
        Self::new(OperationTimeouts::default())
    }
}

async fn teardown(session: &Arc<Session>, event_task: &JoinHandle<()>) {
    let session = Arc::clone(session);
    let _ = timeout(Duration::from_secs(2), session.disconnect()).await;
    event_task.abort();
}

#[async_trait]
impl ProtocolAdapter for OpcUaAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::OpcUa
    }

    #[instrument(level = "debug", skip_all)]
    async fn connect(&self, config: &ConnectionConfig) -> AdapterResult<Arc<dyn LiveHandle>> {
        let ConnectionConfig::OpcUa(cfg) = config else {
            return Err(AdapterError::ConfigError(
                "OPC UA adapter received a non-OPC UA config".to_string(),
            ));
        };

        let (session, event_loop) = connect_once(cfg).await?;
        let healthy = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();
        let event_task = tokio::spawn(drive_session(
            event_loop,
            Arc::clone(&healthy),
            ready_tx,
        ));

        match timeout(self.timeouts.connect(), ready_rx).await {
            Ok(Ok(Ok(()))) => {
                debug!(endpoint = %cfg.endpoint_url, "OPC UA session activated");
                Ok(Arc::new(OpcUaHandle {
                    session,
                    healthy,
                    event_task,
                    endpoint: cfg.endpoint_url.trim().to_string(),
                }))
            }
            Ok(Ok(Err(reason))) => {
                teardown(&session, &event_task).await;
                Err(AdapterError::ConnectError(format!(
                    "OPC UA session failed: {reason}"
                )))
            }
            Ok(Err(_closed)) => {
                teardown(&session, &event_task).await;
                Err(AdapterError::ConnectError(
                    "OPC UA event loop ended before session activation".to_string(),
                ))
            }
            Err(_elapsed) => {
                teardown(&session, &event_task).await;
                Err(AdapterError::Timeout(self.timeouts.connect()))
            }
        }
    }

    /// Cheap session probe: one bounded read of the server status state
    /// node on the held session.
    async fn verify_live(&self, handle: &Arc<dyn LiveHandle>) -> bool {
        let Some(handle) = handle.downcast_ref::<OpcUaHandle>() else {
            return false;
        };
        if !handle.healthy.load(Ordering::Acquire) {
            return false;
        }
        let probe = vec![ReadValueId::new_value(NodeId::new(0, SERVER_STATUS_STATE))];
        matches!(
            timeout(
                self.timeouts.probe(),
                handle
                    .session
                    .read(&probe, TimestampsToReturn::Neither, 0.0),
            )
            .await,
            Ok(Ok(_))
        )
    }

    #[instrument(level = "debug", skip_all)]
    async fn read(
        &self,
        handle: &Arc<dyn LiveHandle>,
        request: &ReadRequest,
    ) -> AdapterResult<ReadResult> {
        let handle = handle
            .downcast_ref::<OpcUaHandle>()
            .ok_or(AdapterError::SessionError(
                "handle is not an OPC UA handle".to_string(),
            ))?;
        let ReadRequest::OpcUa { node_ids } = request else {
            return Err(AdapterError::ConfigError(
                "OPC UA adapter received a non-OPC UA read request".to_string(),
            ));
        };
        if node_ids.is_empty() {
            return Ok(ReadResult::OpcUa(Vec::new()));
        }

        let mut nodes_to_read = Vec::with_capacity(node_ids.len());
        for raw in node_ids {
            let id = NodeId::from_str(raw).map_err(|_| {
                AdapterError::ConfigError(format!("Invalid OPC UA node id: {raw}"))
            })?;
            nodes_to_read.push(ReadValueId::new_value(id));
        }

        let values = handle
            .session
            .read(&nodes_to_read, TimestampsToReturn::Both, 0.0)
            .await
            .map_err(|sc| AdapterError::ReadError(format!("OPC UA read status: {sc}")))?;

        if values.len() != node_ids.len() {
            // Servers should return one DataValue per requested node, in
            // order; zip below stays in bounds either way.
            warn!(
                endpoint = %handle.endpoint,
                requested = node_ids.len(),
                returned = values.len(),
                "OPC UA read returned unexpected value count"
            );
        }

        let samples = node_ids
            .iter()
            .zip(values.iter())
            .map(|(node_id, dv)| {
                let quality = match dv.status {
                    None => SampleQuality::Good,
                    Some(code) if code.is_good() => SampleQuality::Good,
                    Some(code) if code.is_bad() => SampleQuality::Bad,
                    Some(_) => SampleQuality::Uncertain,
                };
                let value = if quality == SampleQuality::Bad {
                    None
                } else {
                    dv.value.as_ref().and_then(variant_to_json)
                };
                OpcUaSample {
                    node_id: node_id.clone(),
                    value,
                    status_code: dv
                        .status
                        .map(|code| code.to_string())
                        .unwrap_or_else(|| "Good".to_string()),
                    quality,
                }
            })
            .collect();

        Ok(ReadResult::OpcUa(samples))
    }

    async fn disconnect(&self, handle: Arc<dyn LiveHandle>) {
        let Some(handle) = handle.downcast_ref::<OpcUaHandle>() else {
            return;
        };
        teardown(&handle.session, &handle.event_task).await;
        debug!(endpoint = %handle.endpoint, "OPC UA session closed");
    }
}
