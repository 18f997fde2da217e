//! Credential reference resolution

use async_trait::async_trait;

use crate::model::Credentials;

/// Turns an opaque credential reference into a secret bundle
///
/// # Errors
///
/// - [`Error::UnknownCredentialReference`](crate::Error::UnknownCredentialReference)
///   when the reference is not known
/// - [`Error::SecretNotFound`](crate::Error::SecretNotFound) when the reference
///   is known but one of its fields has no backing secret
///
/// Resolution may perform I/O (secret managers, CLIs). The registry always
/// calls it outside its connection lock.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<Credentials, crate::Error>;
}
