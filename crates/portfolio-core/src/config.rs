//! Configuration types for the portfolio sync system
//!
//! The daemon builds a [`PortfolioConfig`] from an optional JSON file and
//! environment overrides; embedders can construct it directly.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use crate::model::{ConnectRequest, CredentialSource, DEFAULT_SYNC_INTERVAL};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Where connection records are persisted
    #[serde(default)]
    pub store: StoreConfig,

    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Credential reference bundles
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Connections created at startup when not already persisted
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

impl PortfolioConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.scheduler.validate()?;
        self.credentials.validate()?;

        let mut names = std::collections::HashSet::new();
        for connection in &self.connections {
            connection.validate()?;
            if !names.insert(connection.name.as_str()) {
                return Err(crate::Error::config(format!(
                    "Duplicate seeded connection name: {}",
                    connection.name
                )));
            }
            if let Some(reference) = &connection.credential_reference {
                if !self.credentials.bundles.contains_key(reference) {
                    return Err(crate::Error::config(format!(
                        "Connection '{}' references unknown credential bundle '{}'",
                        connection.name, reference
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Connection store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// File-based store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.trim().is_empty() => {
                Err(crate::Error::config("File store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Start auto-sync as soon as the service is up
    #[serde(default = "default_autostart")]
    pub autostart: bool,

    /// Interval (seconds) for seeded connections that don't set one
    ///
    /// Default: 86400 (24 hours)
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: u64,

    /// Capacity of the sync event channel
    ///
    /// When full, new events are dropped with a warning.
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.default_interval_secs == 0 {
            return Err(crate::Error::config("Default sync interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Default interval as a duration
    pub fn default_interval(&self) -> Duration {
        Duration::from_secs(self.default_interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            autostart: default_autostart(),
            default_interval_secs: default_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_autostart() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL.as_secs()
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Credential bundles for the environment resolver
///
/// `bundles[reference][field]` is the name of the environment variable that
/// holds the secret for `field`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub bundles: HashMap<String, BTreeMap<String, String>>,
}

impl CredentialsConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (reference, fields) in &self.bundles {
            if reference.trim().is_empty() {
                return Err(crate::Error::config("Credential reference name cannot be empty"));
            }
            if fields.is_empty() {
                return Err(crate::Error::config(format!(
                    "Credential bundle '{}' has no fields",
                    reference
                )));
            }
            if let Some((field, _)) = fields.iter().find(|(_, var)| var.trim().is_empty()) {
                return Err(crate::Error::config(format!(
                    "Credential bundle '{}' field '{}' has no environment variable",
                    reference, field
                )));
            }
        }
        Ok(())
    }
}

/// A connection seeded from configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Provider type tag
    pub provider: String,

    /// User-facing name (used to detect already-persisted seeds)
    pub name: String,

    /// Account name at the registrar
    #[serde(default)]
    pub account_name: String,

    /// Credential bundle to resolve; `None` for providers without secrets
    #[serde(default)]
    pub credential_reference: Option<String>,

    /// Whether the connection is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Whether to poll in the background
    #[serde(default)]
    pub auto_sync: bool,

    /// Polling interval in seconds; falls back to the scheduler default
    #[serde(default)]
    pub interval_secs: Option<u64>,

    /// Fetch once before accepting the connection
    #[serde(default)]
    pub test_connection: bool,
}

fn default_enabled() -> bool {
    true
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.provider.trim().is_empty() {
            return Err(crate::Error::config("Connection provider cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(crate::Error::config("Connection name cannot be empty"));
        }
        if self.interval_secs == Some(0) {
            return Err(crate::Error::config(format!(
                "Connection '{}' interval must be > 0",
                self.name
            )));
        }
        Ok(())
    }

    /// Turn the seed into a connect request
    pub fn to_request(&self, scheduler: &SchedulerConfig) -> ConnectRequest {
        let credentials = match &self.credential_reference {
            Some(reference) => CredentialSource::Reference(reference.clone()),
            None => CredentialSource::default(),
        };

        ConnectRequest {
            provider: self.provider.clone(),
            name: self.name.clone(),
            account_name: self.account_name.clone(),
            credentials,
            enabled: self.enabled,
            auto_sync: self.auto_sync,
            sync_interval: Some(
                self.interval_secs
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| scheduler.default_interval()),
            ),
            test_connection: self.test_connection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PortfolioConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.default_interval_secs, 86_400);
        assert!(matches!(config.store, StoreConfig::Memory));
    }

    #[test]
    fn parses_full_json() {
        let json = r#"{
            "store": { "type": "file", "path": "/var/lib/portfolio/connections.json" },
            "scheduler": { "default_interval_secs": 3600 },
            "credentials": {
                "bundles": {
                    "godaddy-main": { "api_key": "GD_KEY", "api_secret": "GD_SECRET" }
                }
            },
            "connections": [
                { "provider": "godaddy", "name": "Main", "credential_reference": "godaddy-main", "auto_sync": true }
            ]
        }"#;

        let config: PortfolioConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();

        let request = config.connections[0].to_request(&config.scheduler);
        assert!(request.auto_sync);
        assert_eq!(request.sync_interval, Some(Duration::from_secs(3600)));
        assert_eq!(
            request.credentials,
            CredentialSource::Reference("godaddy-main".into())
        );
    }

    #[test]
    fn seed_with_unknown_bundle_is_rejected() {
        let config = PortfolioConfig {
            connections: vec![ConnectionConfig {
                provider: "godaddy".into(),
                name: "Main".into(),
                account_name: String::new(),
                credential_reference: Some("missing".into()),
                enabled: true,
                auto_sync: false,
                interval_secs: None,
                test_connection: false,
            }],
            ..PortfolioConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_default_interval_is_rejected() {
        let config = SchedulerConfig {
            default_interval_secs: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
