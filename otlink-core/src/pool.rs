use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use otlink_adapter_modbus::ModbusAdapter;
use otlink_adapter_mqtt::MqttAdapter;
use otlink_adapter_opcua::OpcUaAdapter;
use otlink_sdk::{
    AdapterError, AdapterResult, CacheKey, ConnectionConfig, LiveHandle, OperationTimeouts,
    Protocol, ProtocolAdapter,
};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info};

/// One cached live connection. Pool-private: callers only ever see the
/// results of operations performed through the handle.
struct PooledEntry {
    protocol: Protocol,
    handle: Arc<dyn LiveHandle>,
    created_at: DateTime<Utc>,
}

/// Keyed cache of live adapter handles, shared by the health-check sweep
/// and arbitrary concurrent on-demand callers.
///
/// Invariant: at most one cached handle per key. Concurrent callers may
/// race to create duplicate transient connections on a cache miss; the
/// insert is first-wins and the loser's handle is disconnected once the
/// race is discovered.
pub struct ConnectionPool {
    adapters: HashMap<Protocol, Arc<dyn ProtocolAdapter>>,
    handles: DashMap<CacheKey, PooledEntry>,
}

impl ConnectionPool {
    pub fn new(adapters: Vec<Arc<dyn ProtocolAdapter>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.protocol(), adapter))
            .collect();
        Self {
            adapters,
            handles: DashMap::new(),
        }
    }

    /// Pool wired with the three built-in protocol adapters.
    pub fn with_default_adapters(timeouts: OperationTimeouts) -> Self {
        let adapters: Vec<Arc<dyn ProtocolAdapter>> = vec![
            Arc::new(OpcUaAdapter::new(timeouts)),
            Arc::new(MqttAdapter::new(timeouts)),
            Arc::new(ModbusAdapter::new()),
        ];
        Self::new(adapters)
    }

    /// Adapter for a protocol; registered OT-class protocols without a
    /// compiled driver fail fast here instead of surfacing as a silent
    /// missing capability later.
    pub fn adapter(&self, protocol: Protocol) -> AdapterResult<Arc<dyn ProtocolAdapter>> {
        self.adapters
            .get(&protocol)
            .cloned()
            .ok_or(AdapterError::DriverUnavailable(protocol))
    }

    /// Return a live handle for the config, reusing the cached one when its
    /// liveness check passes. Connect failures are never cached.
    pub async fn get_handle(&self, config: &ConnectionConfig) -> AdapterResult<Arc<dyn LiveHandle>> {
        let key = config.cache_key();
        let adapter = self.adapter(config.protocol())?;

        if let Some(entry) = self.handles.get(&key) {
            let cached = Arc::clone(&entry.handle);
            drop(entry);
            if adapter.verify_live(&cached).await {
                debug!(key = %key, "pool hit, reusing live handle");
                return Ok(cached);
            }
            debug!(key = %key, "cached handle failed liveness check, evicting");
            if let Some((_, stale)) = self.handles.remove(&key) {
                adapter.disconnect(stale.handle).await;
            }
        }

        let fresh = adapter.connect(config).await?;
        let raced_winner = match self.handles.entry(key.clone()) {
            Entry::Occupied(occupied) => Some(Arc::clone(&occupied.get().handle)),
            Entry::Vacant(vacant) => {
                vacant.insert(PooledEntry {
                    protocol: config.protocol(),
                    handle: Arc::clone(&fresh),
                    created_at: Utc::now(),
                });
                None
            }
        };
        if let Some(existing) = raced_winner {
            debug!(key = %key, "lost first-connect race, discarding duplicate handle");
            adapter.disconnect(fresh).await;
            return Ok(existing);
        }
        debug!(key = %key, "pool miss, cached fresh handle");
        Ok(fresh)
    }

    /// Explicit eviction, called by the read path when a read failure means
    /// the handle can no longer be trusted.
    pub async fn invalidate(&self, key: &CacheKey) {
        if let Some((_, entry)) = self.handles.remove(key) {
            debug!(key = %key, created_at = %entry.created_at, "invalidating pooled handle");
            if let Ok(adapter) = self.adapter(entry.protocol) {
                adapter.disconnect(entry.handle).await;
            }
        }
    }

    /// Best-effort disconnect of every cached handle; part of graceful
    /// shutdown.
    pub async fn close_all(&self) {
        let keys: Vec<CacheKey> = self.handles.iter().map(|e| e.key().clone()).collect();
        if !keys.is_empty() {
            info!(count = keys.len(), "closing all pooled handles");
        }
        for key in keys {
            self.invalidate(&key).await;
        }
    }

    pub fn cached_count(&self) -> usize {
        self.handles.len()
    }
}
