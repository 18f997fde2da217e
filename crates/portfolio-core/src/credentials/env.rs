// # Environment Credential Resolver
//
// Resolves a credential reference to a bundle of secrets read from the
// process environment.
//
// A reference names a bundle; the bundle maps each credential field to the
// environment variable holding its secret:
//
// ```json
// {
//   "godaddy-main": { "api_key": "GODADDY_MAIN_KEY", "api_secret": "GODADDY_MAIN_SECRET" }
// }
// ```
//
// Only variable names are ever stored in configuration; the values are read
// on every resolution so rotated secrets are picked up without a restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::CredentialsConfig;
use crate::error::{Error, Result};
use crate::model::Credentials;
use crate::traits::CredentialResolver;

type SecretLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolver backed by environment variables
pub struct EnvCredentialResolver {
    bundles: HashMap<String, BTreeMap<String, String>>,
    lookup: SecretLookup,
}

impl EnvCredentialResolver {
    /// Create a resolver reading `std::env`
    pub fn new(bundles: HashMap<String, BTreeMap<String, String>>) -> Self {
        Self::with_lookup(bundles, |name| std::env::var(name).ok())
    }

    /// Create a resolver from the `credentials` section of the config
    pub fn from_config(config: &CredentialsConfig) -> Self {
        Self::new(config.bundles.clone())
    }

    /// Create a resolver with a custom secret lookup
    pub fn with_lookup<F>(bundles: HashMap<String, BTreeMap<String, String>>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            bundles,
            lookup: Arc::new(lookup),
        }
    }

    /// Known reference names, sorted
    pub fn references(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bundles.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl CredentialResolver for EnvCredentialResolver {
    async fn resolve(&self, reference: &str) -> Result<Credentials> {
        let bundle = self
            .bundles
            .get(reference)
            .ok_or_else(|| Error::UnknownCredentialReference(reference.to_string()))?;

        let mut credentials = Credentials::new();
        for (field, variable) in bundle {
            match (self.lookup)(variable) {
                Some(value) if !value.trim().is_empty() => credentials.insert(field, value),
                _ => {
                    tracing::warn!(
                        "Credential reference '{}' field '{}': variable {} is not set",
                        reference,
                        field,
                        variable
                    );
                    return Err(Error::SecretNotFound {
                        reference: reference.to_string(),
                        field: field.clone(),
                    });
                }
            }
        }

        Ok(credentials)
    }
}
