// # Connection Store Implementations
//
// This module provides implementations of the ConnectionStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileConnectionStore;
pub use memory::MemoryConnectionStore;

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::traits::ConnectionStore;

/// Build the store described by the configuration
pub async fn from_config(config: &StoreConfig) -> Result<Arc<dyn ConnectionStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryConnectionStore::new())),
        StoreConfig::File { path } => Ok(Arc::new(FileConnectionStore::new(path).await?)),
    }
}
