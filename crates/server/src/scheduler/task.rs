//! Queued units of work.

use chrono::{DateTime, Utc};
use repute_core::TabId;
use serde::Serialize;

/// One pending or active lookup for a hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub hostname: String,
    /// Skip the fresh-cache shortcut.
    pub force_refresh: bool,
    /// Tab the result is delivered to.
    pub tab_id: Option<TabId>,
    /// Overloaded responses seen so far.
    pub retry_attempts: u32,
    /// When the next attempt starts, while waiting out a backoff.
    pub next_retry_time: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(hostname: impl Into<String>, force_refresh: bool, tab_id: Option<TabId>) -> Self {
        Self { hostname: hostname.into(), force_refresh, tab_id, retry_attempts: 0, next_retry_time: None }
    }

    /// Fold a duplicate request into this task.
    pub fn merge(&mut self, force_refresh: bool, tab_id: Option<TabId>) {
        self.force_refresh |= force_refresh;
        self.tab_id = tab_id;
    }
}
