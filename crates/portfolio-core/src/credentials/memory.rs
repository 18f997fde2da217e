// # Memory Credential Resolver
//
// Holds credential bundles in memory. Useful for tests and for embedding the
// core in a process that already has the secrets at hand.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::model::Credentials;
use crate::traits::CredentialResolver;

/// In-memory credential resolver
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialResolver {
    bundles: Arc<RwLock<HashMap<String, Credentials>>>,
    resolve_count: Arc<AtomicUsize>,
}

impl MemoryCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a bundle
    pub async fn insert(&self, reference: impl Into<String>, credentials: Credentials) {
        self.bundles
            .write()
            .await
            .insert(reference.into(), credentials);
    }

    /// Forget a bundle
    pub async fn remove(&self, reference: &str) {
        self.bundles.write().await.remove(reference);
    }

    /// Number of `resolve` calls so far
    pub fn resolve_count(&self) -> usize {
        self.resolve_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialResolver for MemoryCredentialResolver {
    async fn resolve(&self, reference: &str) -> Result<Credentials> {
        self.resolve_count.fetch_add(1, Ordering::SeqCst);
        self.bundles
            .read()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::UnknownCredentialReference(reference.to_string()))
    }
}
