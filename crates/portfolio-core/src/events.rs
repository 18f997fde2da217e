//! Sync events for external monitoring
//!
//! The service publishes [`SyncEvent`]s on a bounded channel. Consumers that
//! fall behind lose events rather than stalling syncs.

use std::time::Duration;

use tokio::sync::mpsc;

/// Events emitted by the provider service and its scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Auto-sync started
    SchedulerStarted {
        /// Loops armed at start
        armed: usize,
    },

    /// Auto-sync stopped
    SchedulerStopped,

    /// A polling loop was (re)armed
    LoopArmed { id: String, interval: Duration },

    /// A polling loop was cancelled
    LoopDisarmed { id: String },

    /// Sync started
    SyncStarted { id: String },

    /// Sync succeeded
    SyncSucceeded { id: String, domains: usize },

    /// Sync failed
    SyncFailed { id: String, error: String },

    /// Sync skipped because another one was still running
    SyncSkipped { id: String },

    /// Connection added
    ConnectionAdded { id: String, provider: String },

    /// Connection removed
    ConnectionRemoved { id: String },
}

/// Sending half of the event channel
///
/// A sink built with [`EventSink::disabled`] swallows every event.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<SyncEvent>>,
}

impl EventSink {
    /// Create a sink and its receiver
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Publish an event without waiting
    pub fn emit(&self, event: SyncEvent) {
        let Some(tx) = &self.tx else {
            return;
        };

        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    "Event channel full, dropping {:?}. Consider increasing event_channel_capacity.",
                    event
                );
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (sink, mut rx) = EventSink::channel(1);
        sink.emit(SyncEvent::SchedulerStarted { armed: 0 });
        sink.emit(SyncEvent::SchedulerStopped);

        assert_eq!(rx.recv().await, Some(SyncEvent::SchedulerStarted { armed: 0 }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disabled_sink_accepts_events() {
        EventSink::disabled().emit(SyncEvent::SchedulerStopped);
    }
}
