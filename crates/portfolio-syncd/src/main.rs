// # portfolio-syncd - Portfolio Sync Daemon
//
// Thin integration layer over portfolio-core. All registry, scheduling and
// sync logic lives in the library; the daemon only:
// 1. Reads configuration (optional JSON file plus environment overrides)
// 2. Initializes tracing and the runtime
// 3. Registers registrar client factories
// 4. Restores persisted connections and seeds configured ones
// 5. Runs auto-sync until SIGTERM/SIGINT, then stops and flushes
//
// ## Configuration
//
// - `PORTFOLIO_CONFIG`: path to a JSON config file (optional)
// - `PORTFOLIO_STORE_TYPE`: connection store (file, memory)
// - `PORTFOLIO_STORE_PATH`: path to the store file (for file store)
// - `PORTFOLIO_DEFAULT_INTERVAL_SECS`: interval for seeded connections without one
// - `PORTFOLIO_ENABLE_MOCK`: register the mock registrar (true/false)
// - `PORTFOLIO_AUTOSTART`: start auto-sync on startup (true/false)
// - `PORTFOLIO_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export PORTFOLIO_CONFIG=/etc/portfolio/sync.json
// export PORTFOLIO_STORE_TYPE=file
// export PORTFOLIO_STORE_PATH=/var/lib/portfolio/connections.json
// export GODADDY_MAIN_KEY=...
// export GODADDY_MAIN_SECRET=...
//
// portfolio-syncd
// ```

use anyhow::Result;
use portfolio_core::{
    ClientFactory, FetchDomainsHandler, PortfolioConfig, ProviderService, StoreConfig, SyncEvent,
};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SyncdExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SyncdExitCode> for ExitCode {
    fn from(code: SyncdExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
struct Config {
    portfolio: PortfolioConfig,
    enable_mock: bool,
    log_level: String,
}

impl Config {
    /// Load the JSON file (if any) and apply environment overrides
    fn from_env() -> Result<Self> {
        let mut portfolio = match env::var("PORTFOLIO_CONFIG") {
            Ok(path) if !path.trim().is_empty() => PortfolioConfig::from_json_file(&path)
                .map_err(|e| anyhow::anyhow!("PORTFOLIO_CONFIG {}: {}", path, e))?,
            _ => PortfolioConfig::default(),
        };

        if let Ok(store_type) = env::var("PORTFOLIO_STORE_TYPE") {
            portfolio.store = match store_type.to_lowercase().as_str() {
                "memory" => StoreConfig::Memory,
                "file" => StoreConfig::File {
                    path: env::var("PORTFOLIO_STORE_PATH").unwrap_or_default(),
                },
                other => anyhow::bail!(
                    "PORTFOLIO_STORE_TYPE '{}' is not supported. \
                    Supported types: file, memory",
                    other
                ),
            };
        } else if let Ok(path) = env::var("PORTFOLIO_STORE_PATH") {
            portfolio.store = StoreConfig::File { path };
        }

        if let Ok(secs) = env::var("PORTFOLIO_DEFAULT_INTERVAL_SECS") {
            portfolio.scheduler.default_interval_secs = secs.trim().parse().map_err(|_| {
                anyhow::anyhow!(
                    "PORTFOLIO_DEFAULT_INTERVAL_SECS must be a whole number of seconds. Got: {}",
                    secs
                )
            })?;
        }

        if let Some(autostart) = parse_flag("PORTFOLIO_AUTOSTART")? {
            portfolio.scheduler.autostart = autostart;
        }

        Ok(Self {
            portfolio,
            enable_mock: parse_flag("PORTFOLIO_ENABLE_MOCK")?.unwrap_or(false),
            log_level: env::var("PORTFOLIO_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.portfolio.validate()?;

        if let StoreConfig::File { path } = &self.portfolio.store {
            if let Some(parent) = std::path::Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                anyhow::bail!(
                    "PORTFOLIO_STORE_PATH parent directory does not exist: {}. \
                        Create it first: sudo mkdir -p {}",
                    parent.display(),
                    parent.display()
                );
            }
        }

        if self.portfolio.scheduler.default_interval_secs < 60 {
            anyhow::bail!(
                "PORTFOLIO_DEFAULT_INTERVAL_SECS must be at least 60 seconds. Got: {}",
                self.portfolio.scheduler.default_interval_secs
            );
        }

        if self.enable_mock && !cfg!(feature = "mock") {
            anyhow::bail!(
                "PORTFOLIO_ENABLE_MOCK is set but portfolio-syncd was built without the 'mock' feature"
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "PORTFOLIO_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// Parse an optional boolean environment variable
fn parse_flag(name: &str) -> Result<Option<bool>> {
    match env::var(name) {
        Err(_) => Ok(None),
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => anyhow::bail!("{} must be true or false. Got: {}", name, value),
        },
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SyncdExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SyncdExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncdExitCode::ConfigError.into();
    }

    info!("Starting portfolio-syncd");
    info!(
        "Configuration loaded: {} seeded connection(s), {} credential bundle(s)",
        config.portfolio.connections.len(),
        config.portfolio.credentials.bundles.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncdExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            SyncdExitCode::RuntimeError
        } else {
            SyncdExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: Config) -> Result<()> {
    let factory = Arc::new(ClientFactory::new());

    #[cfg(feature = "mock")]
    if config.enable_mock {
        info!("Registering mock registrar");
        portfolio_core::mock::register(&factory);
    }

    if factory.list_providers().is_empty() {
        warn!("No registrar client factories registered; every connection will be unusable");
    } else {
        info!("Registrars available: {}", factory.list_providers().join(", "));
    }

    let (service, events) =
        ProviderService::from_config(&config.portfolio, factory, Arc::new(FetchDomainsHandler))
            .await?;
    tokio::spawn(log_events(events));

    service.restore().await?;
    seed_connections(&service, &config.portfolio).await;

    if config.portfolio.scheduler.autostart {
        service.start_auto_sync().await;
    } else {
        info!("Auto-sync not started (PORTFOLIO_AUTOSTART=false)");
    }

    let status = service.status().await;
    info!(
        "Daemon ready: {} connection(s), {} polled",
        status.total_connections, status.active_tasks
    );

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    service.shutdown().await?;
    Ok(())
}

/// Create configured connections that are not persisted yet
///
/// A seed whose name matches an existing connection is skipped. A seed that
/// fails is logged and the daemon keeps going.
async fn seed_connections(service: &ProviderService, config: &PortfolioConfig) {
    let existing: Vec<String> = service
        .list_connections()
        .await
        .into_iter()
        .map(|c| c.name)
        .collect();

    for seed in &config.connections {
        if existing.contains(&seed.name) {
            debug!("Seeded connection '{}' already exists", seed.name);
            continue;
        }

        match service
            .add_connection(seed.to_request(&config.scheduler))
            .await
        {
            Ok(report) if report.success => info!("Seeded connection '{}'", seed.name),
            Ok(report) => warn!(
                "Seeded connection '{}' failed its connection test: {}",
                seed.name, report.message
            ),
            Err(e) => error!("Failed to seed connection '{}': {}", seed.name, e),
        }
    }
}

/// Log sync events until the service goes away
async fn log_events(mut events: mpsc::Receiver<SyncEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Sync event: {:?}", event);
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
