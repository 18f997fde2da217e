// # Connection Store Trait
//
// Defines the interface for persisting connection metadata.
//
// ## Purpose
//
// The registry keeps the canonical records in memory. The store makes them
// survive restarts:
// - Descriptive fields and the credential binding
// - Sync settings (enabled, auto-sync, interval)
// - Last sync outcome and counters
//
// ## Implementations
//
// - Memory: `store::MemoryConnectionStore`
// - File: `store::FileConnectionStore` (atomic JSON file)
// - Future: relational database adapter

use async_trait::async_trait;

use crate::model::ConnectedProvider;

/// Trait for connection store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Implementation Guidelines
///
/// - **Async I/O only**: never block the runtime
/// - **Whole-record writes**: `save` replaces the stored record
/// - **Idempotent deletes**: deleting an unknown ID is not an error
/// - **Explicit flush**: `flush()` persists anything still buffered
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Create or replace a record
    async fn save(&self, record: &ConnectedProvider) -> Result<(), crate::Error>;

    /// Load one record
    ///
    /// - `Ok(Some(record))`: found
    /// - `Ok(None)`: no record with that ID
    async fn load(&self, id: &str) -> Result<Option<ConnectedProvider>, crate::Error>;

    /// Load every record
    async fn load_all(&self) -> Result<Vec<ConnectedProvider>, crate::Error>;

    /// Delete a record (no-op if absent)
    async fn delete(&self, id: &str) -> Result<(), crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
