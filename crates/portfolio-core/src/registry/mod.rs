//! Connected provider registry
//!
//! The registry owns the canonical in-memory [`ConnectedProvider`] records and
//! everything needed to make one usable: validation, credential resolution,
//! client construction and persistence.
//!
//! ## Locking
//!
//! The connection map sits behind one `tokio::sync::RwLock`. Reads (`get`,
//! `list`) take the shared lock; mutations take the exclusive lock. Credential
//! resolution, registrar calls, store writes and scheduler calls all happen
//! with the map lock released.
//!
//! Control-plane calls (`add`, `update`, `remove`, `update_credentials`,
//! `restore`, `arm_all`) also take a `tokio::sync::Mutex`. Under it a change is
//! persisted, committed to the map and then handed to the scheduler, so the
//! armed loops always match the latest committed records. Syncs never take it.
//!
//! ## Sync single-flight
//!
//! Every connection carries a busy flag. A sync that finds it set fails fast
//! with [`Error::SyncInProgress`]; the flag is released when the sync ends or
//! its future is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::{EventSink, SyncEvent};
use crate::factory::ClientFactory;
use crate::model::{
    ConnectRequest, ConnectedProvider, ConnectionStatus, ConnectionUpdate, CredentialSource,
    Credentials, SyncStatus, normalize_interval,
};
use crate::scheduler::{AutoSyncScheduler, SyncCallback};
use crate::traits::{ConnectionStore, CredentialResolver, RegistrarClient, SyncHandler};

struct ConnectionEntry {
    record: ConnectedProvider,
    client: Option<Arc<dyn RegistrarClient>>,
    busy: Arc<AtomicBool>,
}

impl ConnectionEntry {
    fn new(record: ConnectedProvider, client: Option<Arc<dyn RegistrarClient>>) -> Self {
        Self {
            record,
            client,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Clears a connection's busy flag when dropped
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Scheduler callback that runs the registry's sync routine
struct ScheduledSync {
    registry: Weak<ConnectedProviderRegistry>,
    handler: Arc<dyn SyncHandler>,
}

#[async_trait]
impl SyncCallback for ScheduledSync {
    async fn on_tick(&self, id: &str) -> Result<()> {
        let Some(registry) = self.registry.upgrade() else {
            return Ok(());
        };
        registry.sync(id, self.handler.as_ref()).await.map(|_| ())
    }
}

/// Registry of connected registrar accounts
pub struct ConnectedProviderRegistry {
    factory: Arc<ClientFactory>,
    resolver: Arc<dyn CredentialResolver>,
    store: Arc<dyn ConnectionStore>,
    scheduler: Arc<AutoSyncScheduler>,
    events: EventSink,
    connections: RwLock<HashMap<String, ConnectionEntry>>,
    /// Serializes "persist, commit to the map, arm or disarm" across
    /// control-plane calls so the scheduler always sees the latest settings
    control: Mutex<()>,
}

impl ConnectedProviderRegistry {
    /// Create a registry and its scheduler
    ///
    /// Scheduled ticks run `handler` through [`sync`](Self::sync). The
    /// scheduler only holds a weak reference back to the registry.
    pub fn new(
        factory: Arc<ClientFactory>,
        resolver: Arc<dyn CredentialResolver>,
        store: Arc<dyn ConnectionStore>,
        handler: Arc<dyn SyncHandler>,
        events: EventSink,
    ) -> Arc<Self> {
        Arc::new_cyclic(|registry| {
            let callback = Arc::new(ScheduledSync {
                registry: registry.clone(),
                handler,
            });
            Self {
                factory,
                resolver,
                store,
                scheduler: Arc::new(AutoSyncScheduler::new(callback, events.clone())),
                events,
                connections: RwLock::new(HashMap::new()),
                control: Mutex::new(()),
            }
        })
    }

    /// The scheduler driving this registry's auto-sync loops
    pub fn scheduler(&self) -> &Arc<AutoSyncScheduler> {
        &self.scheduler
    }

    /// The client factory
    pub fn factory(&self) -> &Arc<ClientFactory> {
        &self.factory
    }

    async fn resolve(&self, source: &CredentialSource) -> Result<Credentials> {
        match source {
            CredentialSource::Inline(credentials) => Ok(credentials.clone()),
            CredentialSource::Reference(reference) => self.resolver.resolve(reference).await,
        }
    }

    /// Resolve credentials and build a client; no lock is held
    async fn build_client(
        &self,
        provider: &str,
        source: &CredentialSource,
    ) -> Result<Arc<dyn RegistrarClient>> {
        if !self.factory.supports(provider) {
            return Err(Error::UnsupportedProvider(provider.to_string()));
        }
        let credentials = self.resolve(source).await?;
        let client = self.factory.create(provider, &credentials)?;
        Ok(Arc::from(client))
    }

    /// Fetch the domain list once
    async fn probe(client: &dyn RegistrarClient) -> Result<usize> {
        client
            .fetch_domains()
            .await
            .map(|domains| domains.len())
            .map_err(|e| Error::Connectivity(e.to_string()))
    }

    /// Add a connection
    ///
    /// The record is persisted before it becomes visible; any failure leaves
    /// the registry untouched. When the request asks for a connection test,
    /// a failed fetch is reported as [`Error::Connectivity`].
    pub async fn add(&self, request: ConnectRequest) -> Result<ConnectedProvider> {
        request.validate()?;

        let client = self
            .build_client(&request.provider, &request.credentials)
            .await?;

        if request.test_connection {
            let found = Self::probe(client.as_ref()).await?;
            debug!(
                "Connection test for {} found {} domain(s)",
                request.name, found
            );
        }

        let record = ConnectedProvider::from_request(&request);
        let _control = self.control.lock().await;
        self.store.save(&record).await?;

        self.connections
            .write()
            .await
            .insert(record.id.clone(), ConnectionEntry::new(record.clone(), Some(client)));

        info!(
            "Added {} connection '{}' ({}) via {}",
            record.provider,
            record.name,
            record.id,
            record.credentials.describe()
        );
        self.events.emit(SyncEvent::ConnectionAdded {
            id: record.id.clone(),
            provider: record.provider.clone(),
        });

        if record.wants_auto_sync() {
            self.scheduler.add_provider(&record).await;
        }

        Ok(record)
    }

    /// Snapshot of one connection
    pub async fn get(&self, id: &str) -> Result<ConnectedProvider> {
        self.connections
            .read()
            .await
            .get(id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| Error::not_found(id))
    }

    /// Snapshot of every connection, oldest first
    pub async fn list(&self) -> Vec<ConnectedProvider> {
        let connections = self.connections.read().await;
        let mut records = Vec::with_capacity(connections.len());
        records.extend(connections.values().map(|entry| entry.record.clone()));
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// Number of connections
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Check if there are no connections
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Whether a sync of `id` is in flight
    pub async fn is_syncing(&self, id: &str) -> bool {
        self.connections
            .read()
            .await
            .get(id)
            .is_some_and(|entry| entry.busy.load(Ordering::Acquire))
    }

    /// Apply a partial update
    ///
    /// The patched record is persisted before it replaces the in-memory one;
    /// a store failure leaves the connection and its loop as they were.
    /// Turning auto-sync (or the enabled flag) on arms the connection's loop,
    /// turning it off disarms it, and a new interval re-arms it.
    pub async fn update(&self, id: &str, update: ConnectionUpdate) -> Result<ConnectedProvider> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(Error::invalid_input("connection name cannot be empty"));
            }
        }

        let _control = self.control.lock().await;

        let before = self.get(id).await?;
        let mut candidate = before.clone();
        if let Some(name) = update.name {
            candidate.name = name;
        }
        if let Some(enabled) = update.enabled {
            candidate.enabled = enabled;
        }
        if let Some(auto_sync) = update.auto_sync {
            candidate.auto_sync = auto_sync;
        }
        if let Some(interval) = update.sync_interval {
            candidate.sync_interval = normalize_interval(Some(interval));
        }
        candidate.touch();

        self.store.save(&candidate).await?;

        // Sync bookkeeping may have moved on while the store was written
        let after = {
            let mut connections = self.connections.write().await;
            let entry = connections.get_mut(id).ok_or_else(|| Error::not_found(id))?;
            let record = &mut entry.record;
            record.name = candidate.name;
            record.enabled = candidate.enabled;
            record.auto_sync = candidate.auto_sync;
            record.sync_interval = candidate.sync_interval;
            record.updated_at = candidate.updated_at;
            record.clone()
        };

        match (before.wants_auto_sync(), after.wants_auto_sync()) {
            (false, true) => {
                self.scheduler.add_provider(&after).await;
            }
            (true, false) => {
                self.scheduler.remove_provider(id).await;
            }
            (true, true) if before.sync_interval != after.sync_interval => {
                self.scheduler.add_provider(&after).await;
            }
            _ => {}
        }

        debug!("Updated connection {} ({})", after.name, id);
        Ok(after)
    }

    /// Remove a connection
    ///
    /// The polling loop is cancelled and awaited before the record goes away.
    /// If the store delete fails the entry is put back and its loop re-armed.
    pub async fn remove(&self, id: &str) -> Result<ConnectedProvider> {
        let _control = self.control.lock().await;
        if !self.connections.read().await.contains_key(id) {
            return Err(Error::not_found(id));
        }

        self.scheduler.remove_provider(id).await;

        // Out of the map first so a finishing sync cannot write it back
        let entry = self
            .connections
            .write()
            .await
            .remove(id)
            .ok_or_else(|| Error::not_found(id))?;

        if let Err(e) = self.store.delete(id).await {
            warn!("Failed to delete connection {} from the store: {}", id, e);
            let record = entry.record.clone();
            self.connections.write().await.insert(id.to_string(), entry);
            if record.wants_auto_sync() {
                self.scheduler.add_provider(&record).await;
            }
            return Err(e);
        }

        info!("Removed connection '{}' ({})", entry.record.name, id);
        self.events.emit(SyncEvent::ConnectionRemoved { id: id.to_string() });
        Ok(entry.record)
    }

    /// Check credentials against a registrar without touching the registry
    ///
    /// Returns the number of domains found.
    pub async fn test_connection(&self, provider: &str, source: &CredentialSource) -> Result<usize> {
        if let CredentialSource::Reference(reference) = source {
            if reference.trim().is_empty() {
                return Err(Error::invalid_input("credential reference cannot be empty"));
            }
        }
        let client = self.build_client(provider, source).await?;
        Self::probe(client.as_ref()).await
    }

    /// Replace a connection's credential binding
    ///
    /// The new client is built (and optionally tested) before anything
    /// changes, and the new binding is persisted before it is committed.
    pub async fn update_credentials(
        &self,
        id: &str,
        source: CredentialSource,
        test_connection: bool,
    ) -> Result<ConnectedProvider> {
        let provider = self.get(id).await?.provider;
        let client = self.build_client(&provider, &source).await?;
        if test_connection {
            Self::probe(client.as_ref()).await?;
        }

        let _control = self.control.lock().await;
        let mut snapshot = self.get(id).await?;
        snapshot.credentials = source;
        snapshot.connection_status = ConnectionStatus::Connected;
        snapshot.touch();

        self.store.save(&snapshot).await?;

        {
            let mut connections = self.connections.write().await;
            let entry = connections.get_mut(id).ok_or_else(|| Error::not_found(id))?;
            entry.record.credentials = snapshot.credentials.clone();
            entry.record.connection_status = ConnectionStatus::Connected;
            entry.record.updated_at = snapshot.updated_at;
            entry.client = Some(client);
        }
        info!(
            "Credentials for '{}' ({}) now via {}",
            snapshot.name,
            id,
            snapshot.credentials.describe()
        );
        Ok(snapshot)
    }

    /// Load persisted connections and rebuild their clients
    ///
    /// Records already in memory are skipped. A record whose client cannot be
    /// rebuilt is kept with `connection_status = error`; its syncs fail until
    /// its credentials are replaced. Returns the number of records loaded.
    pub async fn restore(&self) -> Result<usize> {
        let records = self.store.load_all().await?;
        let mut restored = 0;

        for mut record in records {
            if self.connections.read().await.contains_key(&record.id) {
                continue;
            }

            let client = match self.build_client(&record.provider, &record.credentials).await {
                Ok(client) => {
                    record.connection_status = ConnectionStatus::Connected;
                    Some(client)
                }
                Err(e) => {
                    warn!(
                        "Restored connection '{}' ({}) has no usable client: {}",
                        record.name, record.id, e
                    );
                    record.connection_status = ConnectionStatus::Error;
                    None
                }
            };

            // A sync cut short by the previous shutdown
            if record.last_sync_status == SyncStatus::Syncing {
                record.last_sync_status = SyncStatus::Failed("interrupted".into());
            }

            let _control = self.control.lock().await;
            {
                let mut connections = self.connections.write().await;
                if connections.contains_key(&record.id) {
                    continue;
                }
                connections.insert(record.id.clone(), ConnectionEntry::new(record.clone(), client));
            }

            if record.wants_auto_sync() {
                self.scheduler.add_provider(&record).await;
            }
            restored += 1;
        }

        info!("Restored {} connection(s) from the store", restored);
        Ok(restored)
    }

    /// Arm the loop of every connection that wants auto-sync
    ///
    /// Connections whose loop is already armed are left alone. Does nothing
    /// while the scheduler is stopped. Returns the number of loops armed.
    pub async fn arm_all(&self) -> usize {
        let _control = self.control.lock().await;
        let mut armed = 0;
        for record in self.list().await {
            if record.wants_auto_sync()
                && !self.scheduler.is_armed(&record.id).await
                && self.scheduler.add_provider(&record).await
            {
                armed += 1;
            }
        }
        armed
    }

    /// Run one sync of a connection
    ///
    /// 1. Reject unknown IDs, disabled connections and syncs already in flight
    /// 2. Mark the connection `syncing` with a fresh timestamp
    /// 3. Run `handler` with the lock released
    /// 4. Record the outcome and persist it
    ///
    /// A failure increments the error counter and is returned to the caller.
    pub async fn sync(&self, id: &str, handler: &dyn SyncHandler) -> Result<usize> {
        let (snapshot, client, _guard) = self.begin_sync(id).await?;
        self.events.emit(SyncEvent::SyncStarted { id: id.to_string() });

        let outcome = match client {
            Some(client) => handler.sync(&snapshot, client.as_ref()).await,
            None => Err(Error::ClientUnavailable(id.to_string())),
        };

        self.finish_sync(id, &outcome).await;
        outcome
    }

    async fn begin_sync(
        &self,
        id: &str,
    ) -> Result<(ConnectedProvider, Option<Arc<dyn RegistrarClient>>, BusyGuard)> {
        let mut connections = self.connections.write().await;
        let entry = connections.get_mut(id).ok_or_else(|| Error::not_found(id))?;

        if !entry.record.enabled {
            return Err(Error::ConnectionDisabled(id.to_string()));
        }

        if entry
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.events.emit(SyncEvent::SyncSkipped { id: id.to_string() });
            return Err(Error::SyncInProgress(id.to_string()));
        }
        let guard = BusyGuard(Arc::clone(&entry.busy));

        entry.record.last_sync_status = SyncStatus::Syncing;
        entry.record.last_sync_at = Some(Utc::now());
        entry.record.touch();

        Ok((entry.record.clone(), entry.client.clone(), guard))
    }

    async fn finish_sync(&self, id: &str, outcome: &Result<usize>) {
        let snapshot = {
            let mut connections = self.connections.write().await;
            // Removed while the sync was running
            let Some(entry) = connections.get_mut(id) else {
                return;
            };
            let record = &mut entry.record;

            match outcome {
                Ok(domains) => {
                    record.domains_synced = *domains;
                    record.last_sync_status = SyncStatus::Success;
                }
                Err(e) => {
                    record.last_sync_status = SyncStatus::Failed(e.to_string());
                    record.error_count += 1;
                }
            }
            record.touch();
            record.clone()
        };

        match outcome {
            Ok(domains) => {
                info!("Synced '{}' ({}): {} domain(s)", snapshot.name, id, domains);
                self.events.emit(SyncEvent::SyncSucceeded {
                    id: id.to_string(),
                    domains: *domains,
                });
            }
            Err(e) => {
                warn!("Sync of '{}' ({}) failed: {}", snapshot.name, id, e);
                self.events.emit(SyncEvent::SyncFailed {
                    id: id.to_string(),
                    error: e.to_string(),
                });
            }
        }

        if let Err(e) = self.store.save(&snapshot).await {
            warn!("Failed to persist sync outcome for {}: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialResolver;
    use crate::mock::{self, MockBehavior, MockClientFactory};
    use crate::store::MemoryConnectionStore;
    use crate::traits::FetchDomainsHandler;

    fn registry_with(behavior: MockBehavior) -> (Arc<ConnectedProviderRegistry>, MemoryConnectionStore) {
        let factory = Arc::new(ClientFactory::new());
        factory.register(
            mock::MOCK_PROVIDER,
            Box::new(MockClientFactory::with_behavior(behavior)),
        );
        let store = MemoryConnectionStore::new();
        let registry = ConnectedProviderRegistry::new(
            factory,
            Arc::new(MemoryCredentialResolver::new()),
            Arc::new(store.clone()),
            Arc::new(FetchDomainsHandler),
            EventSink::disabled(),
        );
        (registry, store)
    }

    #[tokio::test]
    async fn failed_connection_test_leaves_no_record() {
        let behavior = MockBehavior::new();
        behavior.fail_with("503 service unavailable");
        let (registry, store) = registry_with(behavior);

        let err = registry
            .add(ConnectRequest::new("mock", "T1").with_connection_test())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Connectivity(_)));
        assert!(registry.is_empty().await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn sync_records_success_and_failure() {
        let behavior = MockBehavior::new();
        let (registry, _store) = registry_with(behavior.clone());
        let record = registry.add(ConnectRequest::new("mock", "T1")).await.unwrap();

        let domains = registry.sync(&record.id, &FetchDomainsHandler).await.unwrap();
        assert_eq!(domains, 3);
        let synced = registry.get(&record.id).await.unwrap();
        assert_eq!(synced.last_sync_status, SyncStatus::Success);
        assert_eq!(synced.domains_synced, 3);
        assert!(synced.last_sync_at.is_some());

        behavior.fail_with("401 unauthorized");
        assert!(registry.sync(&record.id, &FetchDomainsHandler).await.is_err());
        let failed = registry.get(&record.id).await.unwrap();
        assert!(failed.last_sync_status.is_failed());
        assert_eq!(failed.error_count, 1);
        // Last successful count is kept
        assert_eq!(failed.domains_synced, 3);
    }

    #[tokio::test]
    async fn disabled_connection_is_not_synced() {
        let (registry, _store) = registry_with(MockBehavior::new());
        let record = registry
            .add(ConnectRequest::new("mock", "T1").with_enabled(false))
            .await
            .unwrap();

        let err = registry.sync(&record.id, &FetchDomainsHandler).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionDisabled(_)));
        assert_eq!(registry.get(&record.id).await.unwrap().last_sync_status, SyncStatus::Never);
    }

    #[tokio::test]
    async fn restore_keeps_records_without_a_client() {
        let (registry, store) = registry_with(MockBehavior::new());
        let orphan = ConnectedProvider::from_request(
            &ConnectRequest::new("godaddy", "Legacy").with_credential_reference("gone"),
        );
        store.save(&orphan).await.unwrap();

        assert_eq!(registry.restore().await.unwrap(), 1);
        let restored = registry.get(&orphan.id).await.unwrap();
        assert_eq!(restored.connection_status, ConnectionStatus::Error);

        let err = registry.sync(&orphan.id, &FetchDomainsHandler).await.unwrap_err();
        assert!(matches!(err, Error::ClientUnavailable(_)));
        assert_eq!(registry.get(&orphan.id).await.unwrap().error_count, 1);
    }

    struct SnapshotHandler(std::sync::Mutex<Option<ConnectedProvider>>);

    #[async_trait]
    impl SyncHandler for SnapshotHandler {
        async fn sync(
            &self,
            connection: &ConnectedProvider,
            _client: &dyn RegistrarClient,
        ) -> Result<usize> {
            *self.0.lock().unwrap() = Some(connection.clone());
            Ok(0)
        }
    }

    #[tokio::test]
    async fn marking_a_sync_bumps_updated_at() {
        let (registry, _store) = registry_with(MockBehavior::new());
        let record = registry.add(ConnectRequest::new("mock", "T1")).await.unwrap();

        let handler = SnapshotHandler(std::sync::Mutex::new(None));
        registry.sync(&record.id, &handler).await.unwrap();

        let syncing = handler.0.lock().unwrap().take().unwrap();
        assert_eq!(syncing.last_sync_status, SyncStatus::Syncing);
        assert!(syncing.updated_at >= syncing.last_sync_at.unwrap());
        assert!(syncing.updated_at >= record.updated_at);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let (registry, _store) = registry_with(MockBehavior::new());
        assert!(matches!(registry.get("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(registry.remove("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(
            registry.update("nope", ConnectionUpdate::default().enabled(false)).await,
            Err(Error::NotFound(_))
        ));
    }
}
