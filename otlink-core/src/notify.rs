use otlink_sdk::StatusTransitionEvent;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notifier dispatch failed: {0}")]
    Dispatch(String),
}

/// Downstream broadcast seam for status transitions.
///
/// Fire-and-forget: the sweep logs a failed dispatch and moves on. Events
/// are never queued or replayed; a missed transition is not recoverable.
pub trait StatusChangeNotifier: Send + Sync {
    fn notify(&self, event: StatusTransitionEvent) -> Result<(), NotifyError>;
}
