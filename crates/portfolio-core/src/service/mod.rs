//! Provider service façade
//!
//! [`ProviderService`] composes the registry and the auto-sync scheduler
//! behind the API the HTTP layer consumes.
//!
//! ## Error recovery at the boundary
//!
//! - Connectivity failures during add/test become reports with
//!   `success: false`
//! - Configuration errors, unknown IDs and storage failures are returned
//! - Sync failures are recorded on the connection; `sync_all` aggregates them
//!
//! ## Usage
//!
//! ```rust,ignore
//! let factory = Arc::new(ClientFactory::new());
//! portfolio_core::mock::register(&factory);
//!
//! let (service, mut events) = ProviderService::from_config(
//!     &PortfolioConfig::default(),
//!     factory,
//!     Arc::new(FetchDomainsHandler),
//! )
//! .await?;
//!
//! let report = service
//!     .add_connection(ConnectRequest::new("mock", "T1").with_auto_sync_hours(1))
//!     .await?;
//! service.start_auto_sync().await;
//! ```

pub mod status;

pub use status::{AddConnectionReport, ConnectionSummary, ServiceStatus, TestConnectionReport};

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::PortfolioConfig;
use crate::credentials::EnvCredentialResolver;
use crate::error::{Error, Result, SyncFailure};
use crate::events::{EventSink, SyncEvent};
use crate::factory::ClientFactory;
use crate::model::{ConnectRequest, ConnectedProvider, ConnectionUpdate, CredentialSource};
use crate::registry::ConnectedProviderRegistry;
use crate::traits::{ConnectionStore, CredentialResolver, SyncHandler};

/// Façade over the connection registry and the auto-sync scheduler
#[derive(Clone)]
pub struct ProviderService {
    registry: Arc<ConnectedProviderRegistry>,
    handler: Arc<dyn SyncHandler>,
    store: Arc<dyn ConnectionStore>,
    events: EventSink,
}

impl ProviderService {
    /// Create a service from its collaborators
    ///
    /// Returns the service and the receiving end of its event channel.
    pub fn new(
        factory: Arc<ClientFactory>,
        resolver: Arc<dyn CredentialResolver>,
        store: Arc<dyn ConnectionStore>,
        handler: Arc<dyn SyncHandler>,
        event_channel_capacity: usize,
    ) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (events, rx) = EventSink::channel(event_channel_capacity);
        let registry = ConnectedProviderRegistry::new(
            factory,
            resolver,
            Arc::clone(&store),
            Arc::clone(&handler),
            events.clone(),
        );

        (
            Self {
                registry,
                handler,
                store,
                events,
            },
            rx,
        )
    }

    /// Create a service from configuration
    ///
    /// Builds the configured store and an environment credential resolver
    /// over the configured bundles.
    pub async fn from_config(
        config: &PortfolioConfig,
        factory: Arc<ClientFactory>,
        handler: Arc<dyn SyncHandler>,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;
        let store = crate::store::from_config(&config.store).await?;
        let resolver = Arc::new(EnvCredentialResolver::from_config(&config.credentials));
        Ok(Self::new(
            factory,
            resolver,
            store,
            handler,
            config.scheduler.event_channel_capacity,
        ))
    }

    /// The underlying registry
    pub fn registry(&self) -> &Arc<ConnectedProviderRegistry> {
        &self.registry
    }

    /// Add a connection
    ///
    /// A failed connection test is reported with `success: false`; other
    /// failures are returned as errors. Either way nothing is created.
    pub async fn add_connection(&self, request: ConnectRequest) -> Result<AddConnectionReport> {
        match self.registry.add(request).await {
            Ok(connection) => Ok(AddConnectionReport {
                success: true,
                message: format!("Connected {} account '{}'", connection.provider, connection.name),
                connection: Some(connection),
            }),
            Err(Error::Connectivity(message)) => Ok(AddConnectionReport {
                success: false,
                connection: None,
                message,
            }),
            Err(e) => Err(e),
        }
    }

    /// Test credentials against a registrar without creating anything
    pub async fn test_connection(
        &self,
        provider: &str,
        credentials: impl Into<CredentialSource>,
    ) -> Result<TestConnectionReport> {
        match self
            .registry
            .test_connection(provider, &credentials.into())
            .await
        {
            Ok(domains_found) => Ok(TestConnectionReport {
                success: true,
                domains_found,
                message: format!("Found {} domain(s)", domains_found),
            }),
            Err(Error::Connectivity(message)) => Ok(TestConnectionReport {
                success: false,
                domains_found: 0,
                message,
            }),
            Err(e) => Err(e),
        }
    }

    /// Apply a partial update to a connection
    pub async fn update_connection(
        &self,
        id: &str,
        update: ConnectionUpdate,
    ) -> Result<ConnectedProvider> {
        self.registry.update(id, update).await
    }

    /// Replace a connection's credentials
    pub async fn update_credentials(
        &self,
        id: &str,
        credentials: impl Into<CredentialSource>,
        test_connection: bool,
    ) -> Result<ConnectedProvider> {
        self.registry
            .update_credentials(id, credentials.into(), test_connection)
            .await
    }

    /// Remove a connection and stop its polling
    pub async fn remove_connection(&self, id: &str) -> Result<ConnectedProvider> {
        self.registry.remove(id).await
    }

    /// One connection
    pub async fn get_connection(&self, id: &str) -> Result<ConnectedProvider> {
        self.registry.get(id).await
    }

    /// Every connection, oldest first
    pub async fn list_connections(&self) -> Vec<ConnectedProvider> {
        self.registry.list().await
    }

    /// Load persisted connections
    pub async fn restore(&self) -> Result<usize> {
        self.registry.restore().await
    }

    /// Start auto-sync and arm every enabled auto-sync connection
    ///
    /// Returns the number of armed loops. Calling it while running only
    /// arms connections that are missing a loop.
    pub async fn start_auto_sync(&self) -> usize {
        let scheduler = self.registry.scheduler();
        scheduler.start().await;

        self.registry.arm_all().await;

        let armed = scheduler.active_tasks().await;
        info!("Auto-sync running with {} loop(s)", armed);
        self.events.emit(SyncEvent::SchedulerStarted { armed });
        armed
    }

    /// Stop auto-sync; idempotent
    pub async fn stop_auto_sync(&self) {
        self.registry.scheduler().stop().await;
    }

    /// Whether auto-sync is running
    pub async fn is_auto_sync_running(&self) -> bool {
        self.registry.scheduler().is_running().await
    }

    /// Sync one connection now
    pub async fn sync_one(&self, id: &str) -> Result<usize> {
        self.registry.sync(id, self.handler.as_ref()).await
    }

    /// Sync every enabled connection
    ///
    /// Every connection is attempted. If any failed, the returned
    /// [`Error::SyncAll`] lists each one. On success returns the total
    /// number of domains synced.
    pub async fn sync_all(&self) -> Result<usize> {
        let mut total = 0;
        let mut failures = Vec::new();

        for connection in self.registry.list().await {
            if !connection.enabled {
                continue;
            }

            match self.registry.sync(&connection.id, self.handler.as_ref()).await {
                Ok(domains) => total += domains,
                Err(e) => failures.push(SyncFailure {
                    id: connection.id,
                    name: connection.name,
                    reason: e.to_string(),
                }),
            }
        }

        if failures.is_empty() {
            Ok(total)
        } else {
            warn!("{} connection(s) failed to sync", failures.len());
            Err(Error::SyncAll { failures })
        }
    }

    /// Aggregate status snapshot
    pub async fn status(&self) -> ServiceStatus {
        let scheduler = self.registry.scheduler();
        let running = scheduler.is_running().await;
        let armed: HashSet<String> = scheduler.armed_ids().await.into_iter().collect();
        let records = self.registry.list().await;

        let connections: Vec<ConnectionSummary> = records
            .iter()
            .map(|record| ConnectionSummary::new(record, armed.contains(&record.id)))
            .collect();

        ServiceStatus {
            running,
            total_connections: records.len(),
            enabled_connections: records.iter().filter(|r| r.enabled).count(),
            auto_sync_connections: records.iter().filter(|r| r.wants_auto_sync()).count(),
            active_tasks: armed.len(),
            connections,
        }
    }

    /// Persist anything the store still buffers
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }

    /// Stop auto-sync and flush the store
    pub async fn shutdown(&self) -> Result<()> {
        self.stop_auto_sync().await;
        self.flush().await
    }
}
