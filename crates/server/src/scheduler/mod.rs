//! Single-flight lookup queue.
//!
//! Hostnames are processed one at a time in order of first enqueue. Each
//! hostname has at most one task across the queue and the active slot; a
//! repeat request merges into it. One loop task drains the queue and exits
//! when it is empty; `enqueue` starts it again.
//!
//! Per task: a fresh cache hit is delivered without a lookup (unless forced);
//! otherwise the engine runs. An overloaded upstream keeps the task in the
//! active slot and retries it after a backoff; any other failure drops it and
//! records the message as the last error.

pub mod backoff;
pub mod task;

pub use backoff::RetryPolicy;
pub use task::Task;

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use repute_client::{QueryEngine, QueryOutcome};
use repute_core::{Review, TabId};
use tokio::sync::Mutex;

use crate::sink::ResultSink;
use crate::status::{QueueStatus, StatusBroadcaster, StatusSnapshot};

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<Task>,
    current: Option<Task>,
    last_error: Option<String>,
    /// A loop task is alive; guards against starting a second one.
    running: bool,
}

impl QueueState {
    fn find_mut(&mut self, hostname: &str) -> Option<&mut Task> {
        if let Some(current) = self.current.as_mut().filter(|t| t.hostname == hostname) {
            return Some(current);
        }
        self.queue.iter_mut().find(|t| t.hostname == hostname)
    }

    fn snapshot(&self) -> QueueStatus {
        QueueStatus {
            queue: self.queue.iter().cloned().collect(),
            current_task: self.current.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

struct Inner {
    state: Mutex<QueueState>,
    engine: QueryEngine,
    sink: Arc<dyn ResultSink>,
    status: StatusBroadcaster,
    retry: RetryPolicy,
}

/// Handle to the queue. Cloning shares the same queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(engine: QueryEngine, sink: Arc<dyn ResultSink>, status: StatusBroadcaster, retry: RetryPolicy) -> Self {
        let inner = Inner { state: Mutex::new(QueueState::default()), engine, sink, status, retry };
        Self { inner: Arc::new(inner) }
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.inner.engine
    }

    pub fn sink(&self) -> &dyn ResultSink {
        self.inner.sink.as_ref()
    }

    /// Queue a lookup for `hostname`, merging with any live task for it.
    pub async fn enqueue(&self, hostname: &str, force_refresh: bool, tab_id: Option<TabId>) {
        let (start_loop, snapshot) = {
            let mut state = self.inner.state.lock().await;

            match state.find_mut(hostname) {
                Some(task) => {
                    task.merge(force_refresh, tab_id);
                    tracing::debug!(hostname, force_refresh = task.force_refresh, "merged into pending task");
                }
                None => {
                    state.queue.push_back(Task::new(hostname, force_refresh, tab_id));
                    tracing::debug!(hostname, force_refresh, queued = state.queue.len(), "enqueued lookup");
                }
            }

            let start_loop = !state.running;
            state.running = true;
            (start_loop, state.snapshot())
        };

        self.inner.status.publish(snapshot);

        if start_loop {
            let this = self.clone();
            tokio::spawn(async move { this.run().await });
        }
    }

    /// Current queue state.
    pub async fn queue_status(&self) -> QueueStatus {
        self.inner.state.lock().await.snapshot()
    }

    /// Current queue state plus the cached entry for `hostname`, if given.
    pub async fn status(&self, hostname: Option<&str>) -> Result<StatusSnapshot, repute_core::Error> {
        let status = self.queue_status().await;
        let current_result = match hostname {
            Some(hostname) => {
                let version = self.inner.engine.current_version().await?;
                self.inner.engine.db().get_entry(hostname, &version).await?
            }
            None => None,
        };
        Ok(StatusSnapshot { status, current_result })
    }

    async fn publish(&self) {
        let snapshot = self.queue_status().await;
        self.inner.status.publish(snapshot);
    }

    async fn run(self) {
        loop {
            let task = {
                let mut state = self.inner.state.lock().await;
                if state.current.is_none() {
                    state.current = state.queue.pop_front();
                }
                match state.current.clone() {
                    Some(task) => task,
                    None => {
                        state.running = false;
                        break;
                    }
                }
            };

            let hostname = task.hostname.clone();
            let this = self.clone();
            if let Err(e) = tokio::spawn(async move { this.process(task).await }).await {
                self.abandon(&hostname, &e.to_string()).await;
            }
        }
    }

    /// Clear a task whose processing panicked or was cancelled, so the loop can move on.
    async fn abandon(&self, hostname: &str, reason: &str) {
        tracing::error!(hostname, reason, "task processing aborted");
        let snapshot = {
            let mut state = self.inner.state.lock().await;
            if state.current.as_ref().is_some_and(|t| t.hostname == hostname) {
                state.current = None;
            }
            state.last_error = Some(format!("processing {hostname} aborted: {reason}"));
            state.snapshot()
        };
        self.inner.status.publish(snapshot);
    }

    async fn process(&self, task: Task) {
        let hostname = task.hostname.as_str();
        let engine = &self.inner.engine;

        let version = match engine.current_version().await {
            Ok(version) => version,
            Err(e) => return self.fail(hostname, e.to_string()).await,
        };

        if !task.force_refresh {
            match engine.db().get_entry(hostname, &version).await {
                Ok(Some(hit)) if !hit.is_stale => {
                    tracing::debug!(hostname, "fresh cache hit; skipping lookup");
                    return self.complete(Some(hit.entry.reviews), false).await;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(hostname, error = %e, "cache read failed; querying anyway"),
            }
        }

        self.publish().await;

        match engine.query(hostname).await {
            Ok(QueryOutcome::Stored(stored)) => {
                let reviews = match engine.db().get_entry(hostname, &stored.model_version).await {
                    Ok(Some(hit)) => hit.entry.reviews,
                    _ => stored.reviews,
                };
                self.complete(Some(reviews), true).await;
            }
            Ok(QueryOutcome::Unconfigured) => self.complete(None, false).await,
            Err(e) if e.is_retryable() => self.wait_for_retry(hostname, &e.to_string()).await,
            Err(e) => self.fail(hostname, e.to_string()).await,
        }
    }

    /// Clear the active slot and deliver `reviews` to the task's current tab.
    async fn complete(&self, reviews: Option<Vec<Review>>, clear_error: bool) {
        let (tab_id, snapshot) = {
            let mut state = self.inner.state.lock().await;
            let tab_id = state.current.take().and_then(|t| t.tab_id);
            if clear_error {
                state.last_error = None;
            }
            (tab_id, state.snapshot())
        };

        if let Some(reviews) = reviews {
            self.inner.sink.present(tab_id, &reviews);
        }
        self.inner.status.publish(snapshot);
    }

    async fn fail(&self, hostname: &str, message: String) {
        tracing::warn!(hostname, error = %message, "lookup failed; dropping task");
        let snapshot = {
            let mut state = self.inner.state.lock().await;
            state.current = None;
            state.last_error = Some(message);
            state.snapshot()
        };
        self.inner.status.publish(snapshot);
    }

    /// Stamp the active task with its next attempt time and sleep until then.
    ///
    /// The task stays in the active slot, so later tasks keep waiting behind it.
    async fn wait_for_retry(&self, hostname: &str, message: &str) {
        let (delay, attempts, snapshot) = {
            let mut state = self.inner.state.lock().await;
            let Some(task) = state.current.as_mut() else {
                return;
            };
            let delay = self.inner.retry.delay_for(task.retry_attempts);
            task.next_retry_time =
                Some(Utc::now() + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero()));
            task.retry_attempts += 1;
            (delay, task.retry_attempts, state.snapshot())
        };

        tracing::warn!(hostname, attempts, delay_ms = delay.as_millis() as u64, error = message, "upstream overloaded; retrying");
        self.inner.status.publish(snapshot);

        tokio::time::sleep(delay).await;

        if let Some(task) = self.inner.state.lock().await.current.as_mut() {
            task.next_retry_time = None;
        }
    }
}
