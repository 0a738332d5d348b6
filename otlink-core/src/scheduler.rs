use crate::{
    manager::OtConnectionManager,
    notify::StatusChangeNotifier,
    store::{ConnectionStore, StoreError},
};
use chrono::Utc;
use otlink_sdk::{ConnectionRecord, ConnectionStatus, StatusTransitionEvent, StatusUpdate};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Background health-check loop over every registered OT connection.
///
/// Singleton per process by construction, not by globals: the composition
/// root creates one and calls `start` at boot and `stop` at shutdown. Both
/// are idempotent and safe to race.
pub struct HealthCheckScheduler {
    inner: Arc<SchedulerInner>,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct SchedulerInner {
    manager: Arc<OtConnectionManager>,
    store: Arc<dyn ConnectionStore>,
    notifier: Arc<dyn StatusChangeNotifier>,
}

impl HealthCheckScheduler {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

    pub fn new(
        manager: Arc<OtConnectionManager>,
        store: Arc<dyn ConnectionStore>,
        notifier: Arc<dyn StatusChangeNotifier>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                manager,
                store,
                notifier,
            }),
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Start the periodic sweep: one run immediately, then every
    /// `interval`. A second call while running is a no-op.
    #[instrument(level = "info", skip_all, fields(interval_ms = interval.as_millis() as u64))]
    pub fn start(&self, interval: Duration) {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("health-check scheduler already running");
            return;
        }

        let token = CancellationToken::new();
        *self.cancel.lock().unwrap() = Some(token.clone());

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Sweeps must never overlap; a sweep that outlives the interval
            // delays the next tick instead of stacking runs.
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!("health-check scheduler started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("health-check scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        inner.sweep().await;
                    }
                }
            }
        });
        *self.task.lock().unwrap() = Some(handle);
    }

    /// Stop the loop and disconnect every pooled handle. Calling `stop` on
    /// an already-stopped scheduler is a no-op.
    pub async fn stop(&self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        if let Some(token) = self.cancel.lock().unwrap().take() {
            token.cancel();
        }
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            if timeout(Duration::from_secs(5), handle).await.is_err() {
                warn!("health-check task did not stop within timeout");
            }
        }
        self.inner.manager.shutdown().await;
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// One on-demand sweep outside the periodic loop.
    pub async fn run_sweep_once(&self) {
        self.inner.sweep().await;
    }
}

impl SchedulerInner {
    #[instrument(name = "health-sweep", skip_all)]
    async fn sweep(&self) {
        let records = match self.store.list_ot_connections().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "failed to load connection records, skipping sweep");
                return;
            }
        };
        debug!(count = records.len(), "sweeping OT connections");

        let mut checked = 0usize;
        let mut failed = 0usize;
        // Strictly sequential: bounds concurrent device load and keeps one
        // slow device from competing with the rest for sockets. Each probe
        // is individually deadline-raced, so the sweep always advances.
        for record in &records {
            match self.check_record(record).await {
                Ok(()) => checked += 1,
                Err(e) => {
                    failed += 1;
                    warn!(connection_id = %record.id, error = %e, "health check bookkeeping failed");
                }
            }
        }
        info!(checked, failed, "health sweep complete");
    }

    /// Probe one record, persist the outcome unconditionally, and emit a
    /// transition event only when the status actually changed.
    async fn check_record(&self, record: &ConnectionRecord) -> Result<(), StoreError> {
        let probe = self
            .manager
            .test_connection(record.protocol, &record.config)
            .await;
        let new_status = if probe.success {
            ConnectionStatus::Active
        } else {
            ConnectionStatus::Error
        };
        let last_error = (!probe.success).then(|| probe.message.clone());

        // Written even when unchanged so last_tested_at stays fresh for
        // staleness detection.
        self.store
            .update_connection_status(
                &record.id,
                StatusUpdate {
                    status: new_status,
                    last_tested_at: Utc::now(),
                    last_error: last_error.clone(),
                    latency_ms: Some(probe.latency_ms),
                },
            )
            .await?;

        if record.status != new_status {
            info!(
                connection_id = %record.id,
                protocol = %record.protocol,
                old_status = ?record.status,
                new_status = ?new_status,
                "connection status changed"
            );
            let event = StatusTransitionEvent {
                connection_id: record.id.clone(),
                protocol: record.protocol,
                old_status: record.status,
                new_status,
                latency_ms: Some(probe.latency_ms),
                last_error,
            };
            if let Err(e) = self.notifier.notify(event) {
                warn!(connection_id = %record.id, error = %e, "status change notification failed");
            }
        }
        Ok(())
    }
}
