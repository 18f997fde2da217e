// # Memory Connection Store
//
// In-memory implementation of ConnectionStore.
//
// ## Purpose
//
// Keeps connection records for the life of the process only. Useful for
// tests, demos, and deployments where connections are seeded from
// configuration on every start.
//
// ## Crash Behavior
//
// - All connections are lost on restart
// - Seeded connections are recreated with fresh IDs and counters

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::ConnectedProvider;
use crate::traits::ConnectionStore;

/// In-memory connection store
///
/// Records live in a HashMap behind a RwLock. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnectionStore {
    inner: Arc<RwLock<HashMap<String, ConnectedProvider>>>,
    save_count: Arc<AtomicUsize>,
}

impl MemoryConnectionStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Number of `save` calls so far
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionStore for MemoryConnectionStore {
    async fn save(&self, record: &ConnectedProvider) -> Result<(), Error> {
        self.save_count.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.inner.write().await;
        guard.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<ConnectedProvider>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<ConnectedProvider>, Error> {
        let guard = self.inner.read().await;
        let mut records: Vec<ConnectedProvider> = guard.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(id);
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing is buffered
        Ok(())
    }
}
