//! Per-connection auto-sync scheduler
//!
//! The scheduler owns one cancellable polling task per armed connection.
//!
//! ## Lifecycle
//!
//! ```text
//!            start()                     stop()
//!  Stopped ───────────▶ Running ───────────────────▶ Stopped
//!     ▲                  │  ▲                           │
//!     │                  │  │ add_provider / remove     │
//!     └──────────────────┼──┴── (arm / disarm) ◀────────┘
//!                        ▼
//!              one task per connection ID
//! ```
//!
//! - `start` and `stop` are idempotent
//! - arming is a no-op while stopped or when the connection does not want
//!   auto-sync
//! - arming an already armed connection replaces its task
//! - `stop` signals every task through one shared `watch` channel and waits
//!   for all of them to exit
//!
//! ## Tick semantics
//!
//! Each task waits on its own interval timer and calls the scheduler-wide
//! [`SyncCallback`] with the connection ID. A failed callback is logged and
//! the loop keeps going. The callback future is raced against cancellation,
//! so a hung registrar call never delays `stop` or `remove_provider`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::events::{EventSink, SyncEvent};
use crate::model::ConnectedProvider;

/// Invoked on every tick of an armed connection
#[async_trait]
pub trait SyncCallback: Send + Sync {
    async fn on_tick(&self, id: &str) -> Result<()>;
}

struct SyncTask {
    interval: Duration,
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl SyncTask {
    /// Cancel the task and wait for it to exit
    async fn shutdown(self, id: &str) {
        // The task may already be gone; a closed receiver is fine
        let _ = self.cancel.send(());
        if let Err(e) = self.handle.await {
            error!("Auto-sync task for {} ended abnormally: {}", id, e);
        }
    }
}

#[derive(Default)]
struct SchedulerState {
    running: bool,
    shutdown: Option<watch::Sender<bool>>,
    tasks: HashMap<String, SyncTask>,
}

/// Runs one polling loop per auto-sync connection
///
/// All bookkeeping sits behind one async mutex. Task handles are awaited
/// while it is held, so arm/disarm/stop calls never interleave; the polling
/// tasks themselves never touch the mutex.
pub struct AutoSyncScheduler {
    state: Mutex<SchedulerState>,
    callback: Arc<dyn SyncCallback>,
    events: EventSink,
}

impl AutoSyncScheduler {
    /// Create a stopped scheduler
    pub fn new(callback: Arc<dyn SyncCallback>, events: EventSink) -> Self {
        Self {
            state: Mutex::new(SchedulerState::default()),
            callback,
            events,
        }
    }

    /// Transition to running
    ///
    /// Returns `false` if the scheduler was already running.
    pub async fn start(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.running {
            debug!("Auto-sync scheduler already running");
            return false;
        }

        let (tx, _rx) = watch::channel(false);
        state.shutdown = Some(tx);
        state.running = true;
        info!("Auto-sync scheduler started");
        true
    }

    /// Cancel every loop and transition to stopped
    ///
    /// When this returns no tick callback is running and none will fire.
    /// Calling it on a stopped scheduler does nothing.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        if !state.running {
            debug!("Auto-sync scheduler already stopped");
            return;
        }

        state.running = false;
        if let Some(tx) = state.shutdown.take() {
            let _ = tx.send(true);
        }

        let tasks: Vec<(String, SyncTask)> = state.tasks.drain().collect();
        let count = tasks.len();
        for (id, task) in tasks {
            task.shutdown(&id).await;
        }

        info!("Auto-sync scheduler stopped ({} loop(s) cancelled)", count);
        self.events.emit(SyncEvent::SchedulerStopped);
    }

    /// Arm (or re-arm) the polling loop of a connection
    ///
    /// Does nothing unless the scheduler is running and the connection is
    /// enabled with auto-sync on. An existing loop for the same ID is
    /// cancelled and awaited before the new one starts. Returns whether a
    /// loop is now armed with the connection's interval.
    pub async fn add_provider(&self, connection: &ConnectedProvider) -> bool {
        let mut state = self.state.lock().await;
        if !state.running || !connection.wants_auto_sync() {
            return false;
        }

        let Some(shutdown_rx) = state.shutdown.as_ref().map(watch::Sender::subscribe) else {
            return false;
        };

        if let Some(previous) = state.tasks.remove(&connection.id) {
            debug!(
                "Replacing auto-sync loop for {} ({:?} -> {:?})",
                connection.id, previous.interval, connection.sync_interval
            );
            previous.shutdown(&connection.id).await;
        }

        let interval = connection.sync_interval;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let handle = tokio::spawn(run_loop(
            connection.id.clone(),
            interval,
            Arc::clone(&self.callback),
            cancel_rx,
            shutdown_rx,
        ));

        state.tasks.insert(
            connection.id.clone(),
            SyncTask {
                interval,
                cancel: cancel_tx,
                handle,
            },
        );

        info!(
            "Auto-sync armed for {} ({}) every {:?}",
            connection.name, connection.id, interval
        );
        self.events.emit(SyncEvent::LoopArmed {
            id: connection.id.clone(),
            interval,
        });
        true
    }

    /// Cancel the polling loop of a connection
    ///
    /// Safe to call for IDs that were never armed. When this returns, no
    /// further tick for `id` will fire.
    pub async fn remove_provider(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        let Some(task) = state.tasks.remove(id) else {
            return false;
        };

        task.shutdown(id).await;
        info!("Auto-sync disarmed for {}", id);
        self.events.emit(SyncEvent::LoopDisarmed { id: id.to_string() });
        true
    }

    /// Whether the scheduler is running
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    /// Number of armed loops
    pub async fn active_tasks(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    /// Whether a loop is armed for `id`
    pub async fn is_armed(&self, id: &str) -> bool {
        self.state.lock().await.tasks.contains_key(id)
    }

    /// Interval of the loop armed for `id`
    pub async fn armed_interval(&self, id: &str) -> Option<Duration> {
        self.state.lock().await.tasks.get(id).map(|t| t.interval)
    }

    /// IDs of every armed connection
    pub async fn armed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().await.tasks.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Roughly 30 years
const NEVER_TICK: Duration = Duration::from_secs(86_400 * 365 * 30);

async fn run_loop(
    id: String,
    interval: Duration,
    callback: Arc<dyn SyncCallback>,
    mut cancel: oneshot::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    let now = Instant::now();
    // Intervals too large to schedule never tick
    let first = now
        .checked_add(interval)
        .unwrap_or_else(|| now + NEVER_TICK);
    let mut ticker = tokio::time::interval_at(first, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut cancel => break,
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        debug!("Auto-sync tick for {}", id);

        tokio::select! {
            biased;
            _ = &mut cancel => break,
            _ = shutdown.changed() => break,
            result = callback.on_tick(&id) => match result {
                Ok(()) => {}
                Err(Error::SyncInProgress(_)) => {
                    debug!("Skipped tick for {}: sync already in progress", id);
                }
                Err(e) => warn!("Scheduled sync for {} failed: {}", id, e),
            },
        }
    }

    debug!("Auto-sync loop for {} exited", id);
}
