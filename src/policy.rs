//! Serving snapshot of the learned table.
//!
//! Training owns a [`QTable`] exclusively; once a run finishes the table is
//! published here and replaces the previous one in a single swap. Requests
//! take an `Arc` snapshot at start and keep using it even if a newer table
//! is published mid-flight.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::agent::QTable;

/// Cloneable handle to the active table.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    active: Arc<RwLock<Arc<QTable>>>,
}

impl PolicyStore {
    /// Store serving `table` from the start.
    pub fn new(table: QTable) -> Self {
        Self {
            active: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    /// The table currently being served.
    pub fn snapshot(&self) -> Arc<QTable> {
        let guard = self.active.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Replace the served table; returns the one it replaced.
    pub fn publish(&self, table: QTable) -> Arc<QTable> {
        info!(
            entries = table.len(),
            episodes_trained = table.episodes_trained(),
            "publishing route table"
        );
        let next = Arc::new(table);
        let mut guard = self.active.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Whether the served table holds any learned values.
    pub fn is_trained(&self) -> bool {
        !self.snapshot().is_empty()
    }
}
