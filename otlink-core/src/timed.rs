use otlink_sdk::{AdapterError, AdapterResult};
use std::{future::Future, time::Duration};
use tokio::time::timeout;
use tracing::warn;

/// Race an operation against a deadline, converting a hang into a typed
/// timeout failure.
///
/// Abandon, don't kill: when the timer wins the operation's future is
/// dropped and any still-running I/O inside the adapter is left to its own
/// best-effort cleanup. Callers invoke this per connection, never around a
/// batch, so one stalled device only delays its own slot.
pub async fn run_timed<T, F>(op_label: &'static str, deadline: Duration, fut: F) -> AdapterResult<T>
where
    F: Future<Output = AdapterResult<T>>,
{
    match timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_elapsed) => {
            warn!(
                op = op_label,
                timeout_ms = deadline.as_millis() as u64,
                "operation deadline exceeded, abandoning"
            );
            Err(AdapterError::Timeout(deadline))
        }
    }
}
