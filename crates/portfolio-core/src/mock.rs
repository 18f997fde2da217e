// # Mock Registrar
//
// In-process registrar used by tests, demos and the daemon's `mock` feature.
//
// The standard fixture holds three domains. Failures and latency can be
// injected at runtime, and every fetch is counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::error::{Error, Result};
use crate::factory::ClientFactory;
use crate::model::{Credentials, DnsRecord, Domain, DomainStatus};
use crate::traits::{RegistrarClient, RegistrarClientFactory};

/// Provider type under which the mock registers
pub const MOCK_PROVIDER: &str = "mock";

/// The standard three-domain fixture
pub fn fixture_domains() -> Vec<Domain> {
    let expiry = |y, m, d| Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single();

    vec![
        Domain {
            expires_at: expiry(2027, 3, 1),
            auto_renew: true,
            locked: true,
            nameservers: vec!["ns1.mock-registrar.test".into(), "ns2.mock-registrar.test".into()],
            ..Domain::new("example.com", MOCK_PROVIDER)
        },
        Domain {
            expires_at: expiry(2026, 11, 15),
            ..Domain::new("example.net", MOCK_PROVIDER)
        },
        Domain {
            status: DomainStatus::Expired,
            expires_at: expiry(2025, 1, 31),
            ..Domain::new("example.org", MOCK_PROVIDER)
        },
    ]
}

/// Shared knobs for mock clients
///
/// Clones share state, so a test can keep one handle and flip failure mode
/// while the registry owns the client.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    inner: Arc<std::sync::Mutex<BehaviorState>>,
    fetch_count: Arc<AtomicUsize>,
}

#[derive(Debug, Default)]
struct BehaviorState {
    failure: Option<String>,
    latency: Option<Duration>,
    domains: Option<Vec<Domain>>,
}

impl MockBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BehaviorState> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Make every fetch fail with `message`
    pub fn fail_with(&self, message: impl Into<String>) {
        self.state().failure = Some(message.into());
    }

    /// Stop injecting failures
    pub fn succeed(&self) {
        self.state().failure = None;
    }

    /// Delay every fetch
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    /// Replace the domain list returned by fetches
    pub fn set_domains(&self, domains: Vec<Domain>) {
        self.state().domains = Some(domains);
    }

    /// Number of `fetch_domains` calls so far
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

/// Registrar client backed by [`MockBehavior`]
#[derive(Debug, Clone, Default)]
pub struct MockRegistrarClient {
    behavior: MockBehavior,
}

impl MockRegistrarClient {
    /// Client with the standard fixture and no failures
    pub fn new() -> Self {
        Self::default()
    }

    /// Client sharing an existing behavior handle
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self { behavior }
    }
}

#[async_trait]
impl RegistrarClient for MockRegistrarClient {
    async fn fetch_domains(&self) -> Result<Vec<Domain>> {
        self.behavior.fetch_count.fetch_add(1, Ordering::SeqCst);

        let (failure, latency, domains) = {
            let state = self.behavior.state();
            (state.failure.clone(), state.latency, state.domains.clone())
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match failure {
            Some(message) => Err(Error::registrar(MOCK_PROVIDER, message)),
            None => Ok(domains.unwrap_or_else(fixture_domains)),
        }
    }

    async fn fetch_dns_records(&self, domain: &str) -> Result<Vec<DnsRecord>> {
        if let Some(message) = self.behavior.state().failure.clone() {
            return Err(Error::registrar(MOCK_PROVIDER, message));
        }

        Ok(vec![
            DnsRecord {
                name: "@".into(),
                record_type: "A".into(),
                value: "192.0.2.10".into(),
                ttl: Some(3600),
                priority: None,
            },
            DnsRecord {
                name: "www".into(),
                record_type: "CNAME".into(),
                value: domain.to_string(),
                ttl: Some(3600),
                priority: None,
            },
        ])
    }

    fn provider_name(&self) -> &str {
        MOCK_PROVIDER
    }
}

/// Factory producing [`MockRegistrarClient`]s that share one behavior handle
#[derive(Debug, Clone, Default)]
pub struct MockClientFactory {
    behavior: MockBehavior,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose clients share `behavior`
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self { behavior }
    }
}

impl RegistrarClientFactory for MockClientFactory {
    fn required_fields(&self) -> &[&'static str] {
        &[]
    }

    fn create(&self, _credentials: &Credentials) -> Result<Box<dyn RegistrarClient>> {
        Ok(Box::new(MockRegistrarClient::with_behavior(
            self.behavior.clone(),
        )))
    }
}

/// Register the mock registrar with a client factory
pub fn register(factory: &ClientFactory) {
    factory.register(MOCK_PROVIDER, Box::new(MockClientFactory::new()));
}
