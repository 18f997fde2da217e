//! Data model shared by the registry, the scheduler and the service

pub mod connection;
pub mod credentials;
pub mod domain;

pub use connection::{
    ConnectRequest, ConnectedProvider, ConnectionStatus, ConnectionUpdate, SyncStatus,
    DEFAULT_SYNC_INTERVAL, normalize_interval,
};
pub use credentials::{CredentialSource, Credentials};
pub use domain::{DnsRecord, Domain, DomainStatus};
