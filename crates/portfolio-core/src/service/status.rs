//! Typed reports and status snapshots returned by the service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::{ConnectedProvider, ConnectionStatus, SyncStatus};

/// Result of an add-connection call that reached the registrar
///
/// `success == false` means the request was processed but the connection
/// test failed; `message` carries the reason and nothing was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddConnectionReport {
    pub success: bool,
    pub connection: Option<ConnectedProvider>,
    pub message: String,
}

/// Result of a side-effect-free connection test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConnectionReport {
    pub success: bool,
    pub domains_found: usize,
    pub message: String,
}

/// Per-connection line of the status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub id: String,
    pub provider: String,
    pub name: String,
    pub enabled: bool,
    pub auto_sync: bool,
    pub sync_interval: Duration,
    /// Whether a polling loop is currently armed
    pub armed: bool,
    pub connection_status: ConnectionStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_status: SyncStatus,
    pub domains_synced: usize,
    pub error_count: u64,
}

impl ConnectionSummary {
    pub fn new(record: &ConnectedProvider, armed: bool) -> Self {
        Self {
            id: record.id.clone(),
            provider: record.provider.clone(),
            name: record.name.clone(),
            enabled: record.enabled,
            auto_sync: record.auto_sync,
            sync_interval: record.sync_interval,
            armed,
            connection_status: record.connection_status,
            last_sync_at: record.last_sync_at,
            last_sync_status: record.last_sync_status.clone(),
            domains_synced: record.domains_synced,
            error_count: record.error_count,
        }
    }
}

/// Aggregate status of the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Whether auto-sync is running
    pub running: bool,
    pub total_connections: usize,
    pub enabled_connections: usize,
    pub auto_sync_connections: usize,
    /// Armed polling loops
    pub active_tasks: usize,
    pub connections: Vec<ConnectionSummary>,
}

impl ServiceStatus {
    /// Summaries whose last sync failed
    pub fn failing(&self) -> impl Iterator<Item = &ConnectionSummary> {
        self.connections
            .iter()
            .filter(|c| c.last_sync_status.is_failed())
    }
}
