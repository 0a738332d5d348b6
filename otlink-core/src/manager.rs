use crate::{pool::ConnectionPool, timed::run_timed};
use otlink_sdk::{
    AdapterResult, ConnectionConfig, OperationTimeouts, ProbeResult, Protocol, ReadRequest,
    ReadResult,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, instrument};

/// Facade the route layer and the health-check scheduler talk to.
///
/// Constructed once at process boot and injected where needed; there is no
/// global instance. Every network operation goes through the deadline race,
/// and every failure reachable from here folds into a typed error or a
/// `ProbeResult` — a broken device never becomes a crash.
pub struct OtConnectionManager {
    pool: Arc<ConnectionPool>,
    timeouts: OperationTimeouts,
}

impl OtConnectionManager {
    pub fn new(pool: Arc<ConnectionPool>, timeouts: OperationTimeouts) -> Self {
        Self { pool, timeouts }
    }

    /// Manager over a pool wired with the three built-in adapters.
    pub fn with_default_adapters(timeouts: OperationTimeouts) -> Self {
        Self::new(
            Arc::new(ConnectionPool::with_default_adapters(timeouts)),
            timeouts,
        )
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Connectivity test for one connection config.
    ///
    /// OT-class protocols without a compiled driver yield a synthetic pass:
    /// a check that cannot run must not alarm. Everything else is a pooled
    /// connect-or-reuse bounded by the probe deadline.
    #[instrument(level = "debug", skip_all, fields(protocol = %protocol))]
    pub async fn test_connection(
        &self,
        protocol: Protocol,
        config: &serde_json::Value,
    ) -> ProbeResult {
        if !protocol.has_driver() {
            return ProbeResult::ok("not auto-checked", 0);
        }

        let started = Instant::now();
        let outcome = run_timed("connectivity-probe", self.timeouts.probe(), async {
            let config = ConnectionConfig::parse(protocol, config)?;
            self.pool.get_handle(&config).await.map(|_| ())
        })
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => ProbeResult::ok("connection ok", latency_ms),
            Err(e) => {
                debug!(error = %e, "connectivity probe failed");
                ProbeResult::failed(e.to_string(), latency_ms)
            }
        }
    }

    /// Protocol-specific read through the pool.
    ///
    /// A failed or stalled read leaves the handle suspect, so its pool
    /// entry is invalidated before the error is returned; the next lookup
    /// reconnects.
    #[instrument(level = "debug", skip_all, fields(protocol = %protocol))]
    pub async fn read_connection(
        &self,
        protocol: Protocol,
        config: &serde_json::Value,
        request: &ReadRequest,
        timeout_override: Option<Duration>,
    ) -> AdapterResult<ReadResult> {
        let config = ConnectionConfig::parse(protocol, config)?;

        let mut deadline = timeout_override.unwrap_or_else(|| self.timeouts.read());
        if let ReadRequest::Mqtt { collect_window, .. } = request {
            // The collection window has to fit inside the race deadline.
            deadline = deadline.max(*collect_window + Duration::from_secs(2));
        }

        let result = run_timed("read", deadline, async {
            let handle = self.pool.get_handle(&config).await?;
            let adapter = self.pool.adapter(protocol)?;
            adapter.read(&handle, request).await
        })
        .await;

        if result.is_err() {
            self.pool.invalidate(&config.cache_key()).await;
        }
        result
    }

    /// Best-effort disconnect of every pooled handle; process-shutdown
    /// hook for deployments not running the scheduler.
    pub async fn shutdown(&self) {
        self.pool.close_all().await;
    }
}
