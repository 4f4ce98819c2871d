//! Queue status snapshots and their broadcast channel.

use repute_core::CachedEntry;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::scheduler::Task;

/// Observers that fall further behind than this skip to the newest snapshot.
const CHANNEL_CAPACITY: usize = 64;

/// Queue state as seen by observers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStatus {
    pub queue: Vec<Task>,
    pub current_task: Option<Task>,
    pub last_error: Option<String>,
}

impl QueueStatus {
    /// Nothing queued and nothing in flight.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.current_task.is_none()
    }
}

/// Queue state plus the cached result for one hostname.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    #[serde(flatten)]
    pub status: QueueStatus,
    pub current_result: Option<CachedEntry>,
}

/// Fans queue status out to any number of observers, including none.
#[derive(Debug, Clone)]
pub struct StatusBroadcaster {
    sender: broadcast::Sender<QueueStatus>,
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueStatus> {
        self.sender.subscribe()
    }

    /// Publish a snapshot. Having no subscribers is not an error.
    pub fn publish(&self, status: QueueStatus) {
        let _ = self.sender.send(status);
    }

    /// Log every status change until the process exits.
    pub fn spawn_logger(&self) -> tokio::task::JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(status) => {
                        tracing::debug!(
                            queued = status.queue.len(),
                            current = status.current_task.as_ref().map(|t| t.hostname.as_str()),
                            retry_attempts = status.current_task.as_ref().map(|t| t.retry_attempts),
                            last_error = status.last_error.as_deref(),
                            "queue status changed"
                        );
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "status logger lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
