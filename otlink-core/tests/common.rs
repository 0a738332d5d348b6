#![allow(dead_code)]

use async_trait::async_trait;
use otlink_core::{
    ConnectionPool, ConnectionStore, NotifyError, OtConnectionManager, StatusChangeNotifier,
    StoreError,
};
use otlink_sdk::{
    AdapterError, AdapterResult, ConnectionConfig, ConnectionRecord, ConnectionStatus, LiveHandle,
    OperationTimeouts, Protocol, ProtocolAdapter, ReadRequest, ReadResult, StatusTransitionEvent,
    StatusUpdate,
};
use serde_json::json;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, Once,
    },
    time::Duration,
};

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .without_time()
            .try_init();
    });
}

pub struct StubHandle;
impl LiveHandle for StubHandle {}

/// Scripted protocol adapter standing in for a real driver. Counters make
/// pool behavior observable; flags script the device's mood.
pub struct StubAdapter {
    protocol: Protocol,
    pub connect_attempts: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub live: AtomicBool,
    pub fail_connect: AtomicBool,
    pub fail_read: AtomicBool,
    pub connect_delay: Mutex<Option<Duration>>,
}

impl StubAdapter {
    pub fn new(protocol: Protocol) -> Arc<Self> {
        Arc::new(Self {
            protocol,
            connect_attempts: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            live: AtomicBool::new(true),
            fail_connect: AtomicBool::new(false),
            fail_read: AtomicBool::new(false),
            connect_delay: Mutex::new(None),
        })
    }

    /// A device that never answers: connect stalls far past any deadline.
    pub fn hanging(protocol: Protocol) -> Arc<Self> {
        let stub = Self::new(protocol);
        *stub.connect_delay.lock().unwrap() = Some(Duration::from_secs(3600));
        stub
    }
}

#[async_trait]
impl ProtocolAdapter for StubAdapter {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn connect(&self, _config: &ConnectionConfig) -> AdapterResult<Arc<dyn LiveHandle>> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(AdapterError::ConnectError("stub device refused".to_string()));
        }
        Ok(Arc::new(StubHandle))
    }

    async fn verify_live(&self, _handle: &Arc<dyn LiveHandle>) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn read(
        &self,
        _handle: &Arc<dyn LiveHandle>,
        _request: &ReadRequest,
    ) -> AdapterResult<ReadResult> {
        if self.fail_read.load(Ordering::SeqCst) {
            return Err(AdapterError::ReadError("stub read failed".to_string()));
        }
        Ok(ReadResult::Modbus(Vec::new()))
    }

    async fn disconnect(&self, _handle: Arc<dyn LiveHandle>) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory connection store. Updates are applied to the held records so
/// a following sweep observes the previously persisted status, and kept in
/// an audit list for assertions.
#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<Vec<ConnectionRecord>>,
    pub list_calls: AtomicUsize,
    pub updates: Mutex<Vec<(String, StatusUpdate)>>,
}

impl MemoryStore {
    pub fn with_records(records: Vec<ConnectionRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
            ..Default::default()
        })
    }

    pub fn record(&self, id: &str) -> Option<ConnectionRecord> {
        self.records.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

#[async_trait]
impl ConnectionStore for MemoryStore {
    async fn list_ot_connections(&self) -> Result<Vec<ConnectionRecord>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.lock().unwrap().clone())
    }

    async fn update_connection_status(
        &self,
        id: &str,
        update: StatusUpdate,
    ) -> Result<(), StoreError> {
        {
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| StoreError::Storage(format!("no record {id}")))?;
            record.status = update.status;
            record.last_tested_at = Some(update.last_tested_at);
            record.last_error = update.last_error.clone();
            record.latency_ms = update.latency_ms;
        }
        self.updates.lock().unwrap().push((id.to_string(), update));
        Ok(())
    }
}

/// Captures transition events; optionally fails every dispatch to prove
/// notifier errors never leak into the sweep.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<StatusTransitionEvent>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl StatusChangeNotifier for RecordingNotifier {
    fn notify(&self, event: StatusTransitionEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event);
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Dispatch("stub notifier down".to_string()));
        }
        Ok(())
    }
}

pub fn manager_with(adapters: Vec<Arc<dyn ProtocolAdapter>>) -> Arc<OtConnectionManager> {
    Arc::new(OtConnectionManager::new(
        Arc::new(ConnectionPool::new(adapters)),
        OperationTimeouts::default(),
    ))
}

pub fn record(
    id: &str,
    protocol: Protocol,
    config: serde_json::Value,
    status: ConnectionStatus,
) -> ConnectionRecord {
    ConnectionRecord {
        id: id.to_string(),
        org_id: "org-1".to_string(),
        protocol,
        config,
        status,
        last_tested_at: None,
        last_error: None,
        latency_ms: None,
    }
}

pub fn modbus_config(host: &str, unit: u8) -> serde_json::Value {
    json!({"transport": {"kind": "tcp", "host": host, "port": 502}, "unitId": unit})
}

pub fn opcua_config(endpoint: &str) -> serde_json::Value {
    json!({"endpointUrl": endpoint})
}

pub fn mqtt_config(host: &str) -> serde_json::Value {
    json!({"brokerHost": host, "clientId": "test-client"})
}
