//! Per-rule set of QoS 1 message ids currently being delivered.

use std::collections::HashSet;
use tokio::sync::Mutex;

/// In-flight ids of one rule. An id is present from dispatch until its completion.
#[derive(Default)]
pub(crate) struct InFlightSet {
    ids: Mutex<HashSet<u64>>,
}

impl InFlightSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Marks `id` in flight. Returns `true` only when it was not already present.
    pub(crate) async fn insert(&self, id: u64) -> bool {
        let mut ids = self.ids.lock().await;
        ids.insert(id)
    }

    /// Clears `id`. Returns `true` only when it was present.
    pub(crate) async fn remove(&self, id: u64) -> bool {
        let mut ids = self.ids.lock().await;
        ids.remove(&id)
    }

    #[cfg(test)]
    pub(crate) async fn contains(&self, id: u64) -> bool {
        self.ids.lock().await.contains(&id)
    }

    pub(crate) async fn len(&self) -> usize {
        self.ids.lock().await.len()
    }
}
