//! Test doubles and common utilities for contract tests
//!
//! The doubles count calls so tests can assert on what the service did
//! without a real registrar.

#![allow(dead_code)]

use portfolio_core::error::{Error, Result};
use portfolio_core::factory::{ClientFactory, RegistrarSchema};
use portfolio_core::mock::{self, MockBehavior, MockClientFactory};
use portfolio_core::model::{ConnectedProvider, Credentials, DnsRecord, Domain};
use portfolio_core::traits::{
    ConnectionStore, RegistrarClient, RegistrarClientFactory, SyncHandler,
};
use portfolio_core::{MemoryConnectionStore, MemoryCredentialResolver, ProviderService, SyncEvent};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Sync handler that records every invocation
///
/// Fetches the domain list through the client, optionally sleeps first, and
/// fails for connections whose name was marked with `fail_for`.
#[derive(Clone, Default)]
pub struct CountingHandler {
    calls: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl CountingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every sync of the connection named `name`
    pub fn fail_for(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    /// Sleep this long inside every sync
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Total number of invocations
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of invocations for one connection ID
    pub fn calls_for(&self, id: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == id).count()
    }
}

#[async_trait::async_trait]
impl SyncHandler for CountingHandler {
    async fn sync(&self, connection: &ConnectedProvider, client: &dyn RegistrarClient) -> Result<usize> {
        self.calls.lock().unwrap().push(connection.id.clone());

        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.lock().unwrap().contains(&connection.name) {
            return Err(Error::SyncFailed(format!("{} rejected the API key", connection.name)));
        }

        Ok(client.fetch_domains().await?.len())
    }
}

/// Store wrapping `MemoryConnectionStore` that counts flushes
///
/// Saves can be slowed down, and saves or deletes can be made to fail.
#[derive(Clone, Default)]
pub struct CountingStore {
    inner: MemoryConnectionStore,
    flush_count: Arc<AtomicUsize>,
    save_latency: Arc<Mutex<Option<Duration>>>,
    fail_saves: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_count(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    /// Sleep this long inside every save
    pub fn set_save_latency(&self, latency: Duration) {
        *self.save_latency.lock().unwrap() = Some(latency);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn load_stored(&self, id: &str) -> Option<ConnectedProvider> {
        self.inner.load(id).await.unwrap()
    }
}

#[async_trait::async_trait]
impl ConnectionStore for CountingStore {
    async fn save(&self, record: &ConnectedProvider) -> Result<()> {
        let latency = *self.save_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::store("disk full"));
        }
        self.inner.save(record).await
    }

    async fn load(&self, id: &str) -> Result<Option<ConnectedProvider>> {
        self.inner.load(id).await
    }

    async fn load_all(&self) -> Result<Vec<ConnectedProvider>> {
        self.inner.load_all().await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::store("disk full"));
        }
        self.inner.delete(id).await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        self.inner.flush().await
    }
}

/// GoDaddy stand-in that validates the real field set
pub struct GoDaddyStubFactory;

pub struct GoDaddyStubClient;

#[async_trait::async_trait]
impl RegistrarClient for GoDaddyStubClient {
    async fn fetch_domains(&self) -> Result<Vec<Domain>> {
        Ok(vec![Domain::new("portfolio.dev", "godaddy")])
    }

    async fn fetch_dns_records(&self, _domain: &str) -> Result<Vec<DnsRecord>> {
        Ok(Vec::new())
    }

    fn provider_name(&self) -> &str {
        "godaddy"
    }
}

impl RegistrarClientFactory for GoDaddyStubFactory {
    fn required_fields(&self) -> &[&'static str] {
        RegistrarSchema::GODADDY.required_fields
    }

    fn create(&self, _credentials: &Credentials) -> Result<Box<dyn RegistrarClient>> {
        Ok(Box::new(GoDaddyStubClient))
    }
}

pub fn godaddy_credentials() -> Credentials {
    Credentials::new()
        .with("api_key", "gd-key")
        .with("api_secret", "gd-secret")
}

/// A service wired to counting doubles
pub struct Harness {
    pub service: ProviderService,
    pub events: mpsc::Receiver<SyncEvent>,
    pub behavior: MockBehavior,
    pub handler: CountingHandler,
    pub store: CountingStore,
    pub resolver: MemoryCredentialResolver,
}

impl Harness {
    pub fn new() -> Self {
        let behavior = MockBehavior::new();
        let factory = Arc::new(ClientFactory::new());
        factory.register(
            mock::MOCK_PROVIDER,
            Box::new(MockClientFactory::with_behavior(behavior.clone())),
        );
        factory.register("godaddy", Box::new(GoDaddyStubFactory));

        let handler = CountingHandler::new();
        let store = CountingStore::new();
        let resolver = MemoryCredentialResolver::new();

        let (service, events) = ProviderService::new(
            factory,
            Arc::new(resolver.clone()),
            Arc::new(store.clone()),
            Arc::new(handler.clone()),
            256,
        );

        Self {
            service,
            events,
            behavior,
            handler,
            store,
            resolver,
        }
    }

    /// Drain every event published so far
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Let spawned tasks run without moving the clock
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
