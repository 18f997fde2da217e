//! Plugin-based registrar client factory
//!
//! The factory maps provider type names ("godaddy", "mock", ...) to
//! [`RegistrarClientFactory`] implementations, so the registry never carries
//! a hard-coded match over registrars.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use portfolio_core::factory::ClientFactory;
//! use portfolio_core::model::Credentials;
//!
//! let factory = ClientFactory::new();
//! portfolio_core::mock::register(&factory);
//!
//! let client = factory.create("mock", &Credentials::new())?;
//! ```
//!
//! ## Registration
//!
//! Registrar crates expose a `register()` function:
//!
//! ```rust,ignore
//! pub fn register(factory: &ClientFactory) {
//!     factory.register("godaddy", Box::new(GoDaddyFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Error, Result};
use crate::model::Credentials;
use crate::traits::{RegistrarClient, RegistrarClientFactory};

/// Credential fields each known registrar needs
///
/// Registrar crates use these in their `required_fields()` so every
/// integration validates the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrarSchema {
    /// Provider type tag
    pub provider: &'static str,
    /// Fields that must be present and non-blank
    pub required_fields: &'static [&'static str],
}

impl RegistrarSchema {
    pub const GODADDY: Self = Self {
        provider: "godaddy",
        required_fields: &["api_key", "api_secret"],
    };

    pub const NAMECHEAP: Self = Self {
        provider: "namecheap",
        required_fields: &["api_user", "api_key", "username", "client_ip"],
    };

    pub const HOSTINGER: Self = Self {
        provider: "hostinger",
        required_fields: &["api_token"],
    };

    pub const CLOUDFLARE: Self = Self {
        provider: "cloudflare",
        required_fields: &["api_token", "account_id"],
    };

    /// Every known registrar schema
    pub const ALL: &'static [Self] = &[
        Self::GODADDY,
        Self::NAMECHEAP,
        Self::HOSTINGER,
        Self::CLOUDFLARE,
    ];

    /// Look up a schema by provider type
    pub fn find(provider: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.provider == provider)
    }
}

/// Registry of client factories keyed by provider type
///
/// Uses interior mutability with `RwLock`: concurrent lookups, exclusive
/// registration.
#[derive(Default)]
pub struct ClientFactory {
    factories: RwLock<HashMap<String, Arc<dyn RegistrarClientFactory>>>,
}

impl ClientFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client factory for a provider type
    ///
    /// Registering the same name twice replaces the earlier factory.
    pub fn register(&self, provider: impl Into<String>, factory: Box<dyn RegistrarClientFactory>) {
        let provider = provider.into();
        tracing::debug!("Registering registrar client factory: {}", provider);
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        factories.insert(provider, Arc::from(factory));
    }

    /// Look up the factory for a provider type
    fn factory(&self, provider: &str) -> Result<Arc<dyn RegistrarClientFactory>> {
        let factories = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        factories
            .get(provider)
            .cloned()
            .ok_or_else(|| Error::UnsupportedProvider(provider.to_string()))
    }

    /// Check that a provider is supported and the credentials are complete
    pub fn validate(&self, provider: &str, credentials: &Credentials) -> Result<()> {
        let factory = self.factory(provider)?;
        check_required(provider, factory.required_fields(), credentials)
    }

    /// Create a client for a provider type
    ///
    /// # Errors
    ///
    /// - `UnsupportedProvider` if no factory is registered for `provider`
    /// - `MissingConfiguration` naming the first absent required field
    /// - whatever the provider factory returns
    pub fn create(
        &self,
        provider: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn RegistrarClient>> {
        let factory = self.factory(provider)?;
        check_required(provider, factory.required_fields(), credentials)?;
        factory.create(credentials)
    }

    /// Required credential fields of a provider type
    pub fn required_fields(&self, provider: &str) -> Option<Vec<&'static str>> {
        self.factory(provider)
            .ok()
            .map(|f| f.required_fields().to_vec())
    }

    /// Check if a provider type is registered
    pub fn supports(&self, provider: &str) -> bool {
        let factories = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        factories.contains_key(provider)
    }

    /// Registered provider types, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let factories = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = factories.keys().cloned().collect();
        names.sort();
        names
    }
}

fn check_required(provider: &str, required: &[&'static str], credentials: &Credentials) -> Result<()> {
    match required.iter().find(|field| !credentials.has(field)) {
        Some(field) => Err(Error::missing_configuration(provider, *field)),
        None => Ok(()),
    }
}
