//! Core traits for the portfolio sync system
//!
//! - [`RegistrarClient`]: fetch domains and DNS records from a registrar
//! - [`RegistrarClientFactory`]: build clients for one provider type
//! - [`CredentialResolver`]: resolve credential references
//! - [`ConnectionStore`]: persist connection records
//! - [`SyncHandler`]: fetch-and-reconcile step run on each sync

pub mod connection_store;
pub mod credential_resolver;
pub mod registrar_client;
pub mod sync_handler;

pub use connection_store::ConnectionStore;
pub use credential_resolver::CredentialResolver;
pub use registrar_client::{RegistrarClient, RegistrarClientFactory};
pub use sync_handler::{FetchDomainsHandler, SyncHandler};
