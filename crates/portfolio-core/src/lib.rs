// # portfolio-core
//
// Core library for keeping a domain portfolio in sync with external
// registrar accounts.
//
// ## Architecture Overview
//
// - **RegistrarClient**: trait for fetching domains and DNS records from a registrar
// - **CredentialResolver**: trait turning credential references into secrets
// - **ConnectionStore**: trait for persisting connection records
// - **ClientFactory**: plugin-based registry of registrar client factories
// - **ConnectedProviderRegistry**: owns the configured connections
// - **AutoSyncScheduler**: one cancellable polling loop per auto-sync connection
// - **ProviderService**: façade over the registry and the scheduler
//
// ## Design Principles
//
// 1. **Independent loops**: one connection's failure or slow registrar never
//    delays another connection's schedule
// 2. **No I/O under the lock**: credential resolution and registrar calls run
//    with the connection map unlocked
// 3. **Single-flight syncs**: at most one sync per connection at a time
// 4. **Plugin-based**: registrars are registered dynamically, no hard-coded match
// 5. **Library-first**: the daemon is a thin layer over this crate

pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod factory;
pub mod mock;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{ConnectionConfig, CredentialsConfig, PortfolioConfig, SchedulerConfig, StoreConfig};
pub use credentials::{EnvCredentialResolver, MemoryCredentialResolver};
pub use error::{Error, Result, SyncFailure};
pub use events::{EventSink, SyncEvent};
pub use factory::{ClientFactory, RegistrarSchema};
pub use model::{
    ConnectRequest, ConnectedProvider, ConnectionStatus, ConnectionUpdate, CredentialSource,
    Credentials, DnsRecord, Domain, DomainStatus, SyncStatus,
};
pub use registry::ConnectedProviderRegistry;
pub use scheduler::{AutoSyncScheduler, SyncCallback};
pub use service::{
    AddConnectionReport, ConnectionSummary, ProviderService, ServiceStatus, TestConnectionReport,
};
pub use store::{FileConnectionStore, MemoryConnectionStore};
pub use traits::{
    ConnectionStore, CredentialResolver, FetchDomainsHandler, RegistrarClient,
    RegistrarClientFactory, SyncHandler,
};
