//! Connected provider records and the requests that create or change them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::credentials::CredentialSource;

/// Interval used when a connection asks for auto-sync without a usable interval
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Replace a missing or zero interval with [`DEFAULT_SYNC_INTERVAL`]
pub fn normalize_interval(interval: Option<Duration>) -> Duration {
    match interval {
        Some(d) if !d.is_zero() => d,
        _ => DEFAULT_SYNC_INTERVAL,
    }
}

/// Outcome of the most recent sync attempt
///
/// Rendered (and serialized) as `"never"`, `"syncing"`, `"success"` or
/// `"failed: <reason>"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SyncStatus {
    #[default]
    Never,
    Syncing,
    Success,
    Failed(String),
}

impl SyncStatus {
    /// Whether the last attempt failed
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncStatus::Failed(_))
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Never => write!(f, "never"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Success => write!(f, "success"),
            SyncStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

impl From<SyncStatus> for String {
    fn from(status: SyncStatus) -> Self {
        status.to_string()
    }
}

impl From<String> for SyncStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" | "never" => SyncStatus::Never,
            "syncing" => SyncStatus::Syncing,
            "success" => SyncStatus::Success,
            other => SyncStatus::Failed(
                other
                    .strip_prefix("failed: ")
                    .unwrap_or(other)
                    .to_string(),
            ),
        }
    }
}

/// Connectivity state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Error,
    Testing,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Error => write!(f, "error"),
            ConnectionStatus::Testing => write!(f, "testing"),
        }
    }
}

/// One configured account at an external registrar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedProvider {
    /// Opaque unique ID, assigned at creation
    pub id: String,
    /// Provider type tag (e.g. "godaddy")
    pub provider: String,
    /// User-facing name
    pub name: String,
    /// Account name at the registrar
    #[serde(default)]
    pub account_name: String,
    /// Credential binding
    pub credentials: CredentialSource,
    /// Whether the connection takes part in syncs
    pub enabled: bool,
    /// Whether the connection is polled in the background
    pub auto_sync: bool,
    /// Background polling interval
    pub sync_interval: Duration,
    /// Start of the most recent sync attempt
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Outcome of the most recent sync attempt
    #[serde(default)]
    pub last_sync_status: SyncStatus,
    /// Connectivity state
    pub connection_status: ConnectionStatus,
    /// Domains seen by the last successful sync
    #[serde(default)]
    pub domains_synced: usize,
    /// Failed sync attempts since creation
    #[serde(default)]
    pub error_count: u64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl ConnectedProvider {
    /// Build a fresh record from an accepted request
    pub(crate) fn from_request(request: &ConnectRequest) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider: request.provider.clone(),
            name: request.name.clone(),
            account_name: request.account_name.clone(),
            credentials: request.credentials.clone(),
            enabled: request.enabled,
            auto_sync: request.auto_sync,
            sync_interval: normalize_interval(request.sync_interval),
            last_sync_at: None,
            last_sync_status: SyncStatus::Never,
            connection_status: ConnectionStatus::Connected,
            domains_synced: 0,
            error_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the scheduler should poll this connection
    pub fn wants_auto_sync(&self) -> bool {
        self.enabled && self.auto_sync
    }

    /// Bump `updated_at`
    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Request to add a connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// Provider type tag
    pub provider: String,
    /// User-facing name
    pub name: String,
    /// Account name at the registrar
    #[serde(default)]
    pub account_name: String,
    /// Credential binding
    #[serde(default)]
    pub credentials: CredentialSource,
    /// Whether the connection starts enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether to poll in the background
    #[serde(default)]
    pub auto_sync: bool,
    /// Polling interval; missing or zero means 24 hours
    #[serde(default)]
    pub sync_interval: Option<Duration>,
    /// Fetch the domain list once before accepting the connection
    #[serde(default)]
    pub test_connection: bool,
}

fn default_true() -> bool {
    true
}

impl ConnectRequest {
    /// Create a request with defaults (enabled, no auto-sync, no test)
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
            account_name: String::new(),
            credentials: CredentialSource::default(),
            enabled: true,
            auto_sync: false,
            sync_interval: None,
            test_connection: false,
        }
    }

    /// Set the account name
    pub fn with_account_name(mut self, account_name: impl Into<String>) -> Self {
        self.account_name = account_name.into();
        self
    }

    /// Set the credential binding
    pub fn with_credentials(mut self, credentials: impl Into<CredentialSource>) -> Self {
        self.credentials = credentials.into();
        self
    }

    /// Bind to a credential reference
    pub fn with_credential_reference(mut self, reference: impl Into<String>) -> Self {
        self.credentials = CredentialSource::Reference(reference.into());
        self
    }

    /// Enable auto-sync with the given interval
    pub fn with_auto_sync(mut self, interval: Duration) -> Self {
        self.auto_sync = true;
        self.sync_interval = Some(interval);
        self
    }

    /// Enable auto-sync with an interval in hours
    pub fn with_auto_sync_hours(self, hours: u64) -> Self {
        self.with_auto_sync(Duration::from_secs(hours.saturating_mul(60 * 60)))
    }

    /// Enable or disable the connection
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Request a connectivity test before creation
    pub fn with_connection_test(mut self) -> Self {
        self.test_connection = true;
        self
    }

    /// Reject requests that cannot describe a connection
    pub fn validate(&self) -> crate::Result<()> {
        if self.provider.trim().is_empty() {
            return Err(crate::Error::invalid_input("provider type cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(crate::Error::invalid_input("connection name cannot be empty"));
        }
        if let CredentialSource::Reference(reference) = &self.credentials {
            if reference.trim().is_empty() {
                return Err(crate::Error::invalid_input(
                    "credential reference cannot be empty",
                ));
            }
        }
        Ok(())
    }
}

/// Partial update of a connection's settings
///
/// Only the fields that are `Some` are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub auto_sync: Option<bool>,
    #[serde(default)]
    pub sync_interval: Option<Duration>,
}

impl ConnectionUpdate {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = Some(auto_sync);
        self
    }

    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Whether the update carries no fields
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.enabled.is_none()
            && self.auto_sync.is_none()
            && self.sync_interval.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_or_missing_interval_defaults_to_a_day() {
        assert_eq!(normalize_interval(None), DEFAULT_SYNC_INTERVAL);
        assert_eq!(normalize_interval(Some(Duration::ZERO)), DEFAULT_SYNC_INTERVAL);
        assert_eq!(
            normalize_interval(Some(Duration::from_secs(90))),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn sync_status_renders_as_plain_strings() {
        assert_eq!(SyncStatus::Syncing.to_string(), "syncing");
        assert_eq!(SyncStatus::Success.to_string(), "success");
        assert_eq!(
            SyncStatus::Failed("timeout".into()).to_string(),
            "failed: timeout"
        );

        let json = serde_json::to_string(&SyncStatus::Failed("401".into())).unwrap();
        assert_eq!(json, "\"failed: 401\"");
        let back: SyncStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SyncStatus::Failed("401".into()));
    }

    #[test]
    fn huge_hour_counts_saturate() {
        let request = ConnectRequest::new("mock", "T1").with_auto_sync_hours(u64::MAX);
        assert_eq!(request.sync_interval, Some(Duration::from_secs(u64::MAX)));

        let request = ConnectRequest::new("mock", "T1").with_auto_sync_hours(2);
        assert_eq!(request.sync_interval, Some(Duration::from_secs(7200)));
    }

    #[test]
    fn request_without_name_is_rejected() {
        let request = ConnectRequest::new("mock", "  ");
        assert!(request.validate().is_err());
    }

    #[test]
    fn record_from_request_starts_connected() {
        let request = ConnectRequest::new("mock", "T1").with_auto_sync_hours(1);
        let record = ConnectedProvider::from_request(&request);

        assert!(!record.id.is_empty());
        assert!(record.wants_auto_sync());
        assert_eq!(record.sync_interval, Duration::from_secs(3600));
        assert_eq!(record.connection_status, ConnectionStatus::Connected);
        assert_eq!(record.created_at, record.updated_at);
    }
}
