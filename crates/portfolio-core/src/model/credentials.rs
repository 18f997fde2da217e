//! Credential bundles and how a connection binds to them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resolved credential bundle: field name → secret value
///
/// `Debug` never prints secret values, only field names.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    /// Create an empty bundle
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    /// Insert or replace a field
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Whether the field is present with a non-blank value
    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some_and(|v| !v.trim().is_empty())
    }

    /// Field names in the bundle
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bundle has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Credentials
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Where a connection's credentials come from
///
/// `Inline` bundles are stored with the connection record. `Reference`
/// strings are handed to a [`CredentialResolver`](crate::traits::CredentialResolver)
/// every time a client has to be built, so the raw secrets never touch the
/// connection store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CredentialSource {
    /// Credentials supplied directly
    Inline(Credentials),
    /// Opaque reference resolved lazily
    Reference(String),
}

impl CredentialSource {
    /// Short description safe for logs
    pub fn describe(&self) -> String {
        match self {
            CredentialSource::Inline(creds) => format!("inline ({} field(s))", creds.len()),
            CredentialSource::Reference(reference) => format!("reference '{}'", reference),
        }
    }
}

impl Default for CredentialSource {
    fn default() -> Self {
        CredentialSource::Inline(Credentials::new())
    }
}

impl From<Credentials> for CredentialSource {
    fn from(creds: Credentials) -> Self {
        CredentialSource::Inline(creds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_values() {
        let creds = Credentials::new()
            .with("api_key", "key-123")
            .with("api_secret", "s3cr3t");

        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("api_key"));
        assert!(!rendered.contains("s3cr3t"));
        assert!(!rendered.contains("key-123"));
    }

    #[test]
    fn blank_values_do_not_count_as_present() {
        let creds = Credentials::new().with("api_key", "  ");
        assert!(!creds.has("api_key"));
        assert!(!creds.has("api_secret"));
    }

    #[test]
    fn credential_source_serializes_tagged() {
        let source = CredentialSource::Reference("godaddy-main".into());
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["kind"], "reference");
        assert_eq!(json["value"], "godaddy-main");

        let back: CredentialSource = serde_json::from_value(json).unwrap();
        assert_eq!(back, source);
    }
}
