// # Registrar Client Trait
//
// Defines the interface every registrar integration implements.
//
// ## Implementations
//
// - Mock: `portfolio_core::mock::MockRegistrarClient`
// - GoDaddy, Namecheap, Hostinger, Cloudflare: registrar crates that plug a
//   `RegistrarClientFactory` into the `ClientFactory`
//
// ## Usage
//
// ```rust,ignore
// use portfolio_core::RegistrarClient;
//
// async fn count(client: &dyn RegistrarClient) -> portfolio_core::Result<usize> {
//     Ok(client.fetch_domains().await?.len())
// }
// ```

use async_trait::async_trait;

use crate::model::{Credentials, DnsRecord, Domain};

/// Trait for registrar client implementations
///
/// A client is bound to one set of resolved credentials. It is shared between
/// the registry and the sync tasks through an `Arc`, but the service never
/// runs two syncs of the same connection at once.
///
/// # Rules for implementations
///
/// - One API round-trip (or one paginated listing) per call
/// - No retries, no background tasks, no scheduling decisions
/// - Normalise payloads into [`Domain`] / [`DnsRecord`]
/// - Report failures as errors; the service records them on the connection
#[async_trait]
pub trait RegistrarClient: Send + Sync {
    /// List every domain in the account
    async fn fetch_domains(&self) -> Result<Vec<Domain>, crate::Error>;

    /// List the DNS records of one domain
    async fn fetch_dns_records(&self, domain: &str) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Provider type of this client (e.g. "godaddy")
    fn provider_name(&self) -> &str;
}

/// Builds clients for one provider type
pub trait RegistrarClientFactory: Send + Sync {
    /// Credential fields that must be present and non-blank
    fn required_fields(&self) -> &[&'static str];

    /// Create a client from validated credentials
    ///
    /// Called only after every field in [`required_fields`](Self::required_fields)
    /// has been checked.
    fn create(&self, credentials: &Credentials) -> Result<Box<dyn RegistrarClient>, crate::Error>;
}
