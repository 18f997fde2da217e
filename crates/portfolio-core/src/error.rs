//! Error types for the portfolio sync core
//!
//! Every fallible operation in the crate returns [`Result`]. The variants are
//! grouped the way callers need to react to them:
//!
//! - configuration problems (unsupported provider, missing credential field,
//!   unresolvable credential reference) are returned straight to the caller
//! - connectivity failures during a connection test
//! - runtime sync failures, recorded on the connection by the service
//! - unknown connection IDs

use thiserror::Error;

/// Result type alias for portfolio operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single failed connection inside an aggregate sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Connection ID
    pub id: String,
    /// User-facing connection name
    pub name: String,
    /// Rendered error
    pub reason: String,
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Provider type has no registered client factory
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// A credential field required by the provider is absent or empty
    #[error("Missing configuration for {provider}: {field} is required")]
    MissingConfiguration {
        /// Provider type
        provider: String,
        /// Name of the missing field
        field: String,
    },

    /// Credential reference is not known to the resolver
    #[error("Unknown credential reference: {0}")]
    UnknownCredentialReference(String),

    /// Credential reference is known but a backing secret is absent
    #[error("Secret for field '{field}' of credential reference '{reference}' is not set")]
    SecretNotFound {
        /// Credential reference
        reference: String,
        /// Field whose secret is missing
        field: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Connectivity test against the registrar failed
    #[error("Connection test failed: {0}")]
    Connectivity(String),

    /// Registrar client error
    #[error("Registrar error ({provider}): {message}")]
    Registrar {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Connection not found
    #[error("Connection not found: {0}")]
    NotFound(String),

    /// Connection is disabled and cannot be synced
    #[error("Connection is disabled: {0}")]
    ConnectionDisabled(String),

    /// Another sync for the same connection is still running
    #[error("Sync already in progress for connection {0}")]
    SyncInProgress(String),

    /// Connection has no usable client (credentials could not be rebuilt)
    #[error("No registrar client available for connection {0}")]
    ClientUnavailable(String),

    /// The sync handler failed
    #[error("Sync failed: {0}")]
    SyncFailed(String),

    /// One or more connections failed during a sync of all connections
    #[error("{} connection(s) failed to sync: {}", failures.len(), render_failures(failures))]
    SyncAll {
        /// Every failed connection
        failures: Vec<SyncFailure>,
    },

    /// Connection store errors
    #[error("Connection store error: {0}")]
    Store(String),

    /// Filesystem errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn render_failures(failures: &[SyncFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a missing-configuration error
    pub fn missing_configuration(provider: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingConfiguration {
            provider: provider.into(),
            field: field.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a registrar error
    pub fn registrar(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Registrar {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a "not found" error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create a connection store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Whether this error is a configuration problem the caller must fix
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedProvider(_)
                | Self::MissingConfiguration { .. }
                | Self::UnknownCredentialReference(_)
                | Self::SecretNotFound { .. }
                | Self::Config(_)
                | Self::InvalidInput(_)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
