//! The fetch-and-reconcile step run by every sync

use async_trait::async_trait;

use super::RegistrarClient;
use crate::model::ConnectedProvider;

/// Caller-supplied fetch-and-reconcile function
///
/// The service invokes it for on-demand syncs and for every scheduler tick.
/// It receives a snapshot of the connection taken when the sync began and the
/// connection's client. It returns the number of domains reconciled.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    async fn sync(
        &self,
        connection: &ConnectedProvider,
        client: &dyn RegistrarClient,
    ) -> Result<usize, crate::Error>;
}

/// Handler that fetches the domain list and reports its size
///
/// Suitable when reconciliation happens elsewhere (or not at all).
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchDomainsHandler;

#[async_trait]
impl SyncHandler for FetchDomainsHandler {
    async fn sync(
        &self,
        connection: &ConnectedProvider,
        client: &dyn RegistrarClient,
    ) -> Result<usize, crate::Error> {
        let domains = client.fetch_domains().await?;
        tracing::debug!(
            "Fetched {} domain(s) for connection {} ({})",
            domains.len(),
            connection.name,
            client.provider_name()
        );
        Ok(domains.len())
    }
}
