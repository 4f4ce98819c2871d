//! Delivery of finished lookups to the presentation layer.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use repute_core::{Review, TabId};

/// Receives `(tab, reviews)` once per completed task.
pub trait ResultSink: Send + Sync {
    fn present(&self, tab_id: Option<TabId>, reviews: &[Review]);
}

/// Keeps the most recent reviews delivered to each tab.
#[derive(Debug, Default)]
pub struct TabBoard {
    tabs: Mutex<HashMap<TabId, Vec<Review>>>,
}

impl TabBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reviews last delivered to `tab_id`.
    pub fn get(&self, tab_id: TabId) -> Option<Vec<Review>> {
        self.tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tab_id)
            .cloned()
    }
}

impl ResultSink for TabBoard {
    fn present(&self, tab_id: Option<TabId>, reviews: &[Review]) {
        let Some(tab_id) = tab_id else {
            tracing::debug!(reviews = reviews.len(), "result has no tab to present to");
            return;
        };

        tracing::debug!(tab_id, reviews = reviews.len(), "presenting result");
        self.tabs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tab_id, reviews.to_vec());
    }
}
