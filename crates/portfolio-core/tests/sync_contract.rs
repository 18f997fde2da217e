//! Contract Test: On-Demand Sync
//!
//! Constraints verified:
//! - sync_all attempts every enabled connection and never short-circuits
//! - The aggregate error names exactly the failed connections
//! - Disabled connections are neither synced nor reported
//! - Concurrent syncs of one connection are single-flight
//! - A scheduled tick that meets an in-flight sync is skipped, not counted

mod common;

use common::*;
use portfolio_core::model::{ConnectRequest, SyncStatus};
use portfolio_core::{Error, SyncEvent};
use std::time::Duration;
use tokio_test::assert_err;

async fn add(h: &Harness, request: ConnectRequest) -> String {
    h.service
        .add_connection(request)
        .await
        .unwrap()
        .connection
        .unwrap()
        .id
}

#[tokio::test]
async fn sync_all_reports_exactly_the_failed_connections() {
    let h = Harness::new();
    for name in ["A", "B", "C", "D", "E"] {
        add(&h, ConnectRequest::new("mock", name)).await;
    }
    let disabled = add(&h, ConnectRequest::new("mock", "Off").with_enabled(false)).await;
    h.handler.fail_for("B");
    h.handler.fail_for("D");

    let err = assert_err!(h.service.sync_all().await);
    let Error::SyncAll { failures } = &err else {
        panic!("unexpected error: {err:?}");
    };

    let mut failed: Vec<&str> = failures.iter().map(|f| f.name.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["B", "D"]);
    let rendered = err.to_string();
    assert!(rendered.contains("B: ") && rendered.contains("D: "));
    assert!(!rendered.contains("A: "));

    for connection in h.service.list_connections().await {
        match connection.name.as_str() {
            "B" | "D" => {
                assert!(connection.last_sync_status.is_failed());
                assert_eq!(connection.error_count, 1);
            }
            "Off" => assert_eq!(connection.last_sync_status, SyncStatus::Never),
            _ => {
                assert_eq!(connection.last_sync_status, SyncStatus::Success);
                assert_eq!(connection.domains_synced, 3);
            }
        }
    }

    // 5 enabled attempted, the disabled one skipped
    assert_eq!(h.handler.call_count(), 5);
    assert_eq!(h.handler.calls_for(&disabled), 0);
}

#[tokio::test]
async fn sync_all_returns_total_domains() {
    let h = Harness::new();
    add(&h, ConnectRequest::new("mock", "A")).await;
    add(&h, ConnectRequest::new("mock", "B")).await;

    assert_eq!(h.service.sync_all().await.unwrap(), 6);
}

#[tokio::test]
async fn sync_one_rejects_disabled_and_unknown() {
    let h = Harness::new();
    let id = add(&h, ConnectRequest::new("mock", "Off").with_enabled(false)).await;

    assert!(matches!(
        h.service.sync_one(&id).await,
        Err(Error::ConnectionDisabled(_))
    ));
    assert!(matches!(
        h.service.sync_one("missing").await,
        Err(Error::NotFound(_))
    ));
    assert_eq!(h.service.get_connection(&id).await.unwrap().error_count, 0);
}

#[tokio::test]
async fn registrar_failure_is_recorded_on_the_connection() {
    let mut h = Harness::new();
    let id = add(&h, ConnectRequest::new("mock", "A")).await;
    h.behavior.fail_with("429 too many requests");

    let err = assert_err!(h.service.sync_one(&id).await);
    assert!(err.to_string().contains("429"));

    let connection = h.service.get_connection(&id).await.unwrap();
    assert_eq!(connection.error_count, 1);
    assert!(connection.last_sync_at.is_some());
    assert!(connection.last_sync_status.to_string().contains("429"));

    let events = h.drain_events();
    assert!(events.contains(&SyncEvent::SyncStarted { id: id.clone() }));
    assert!(events
        .iter()
        .any(|e| matches!(e, SyncEvent::SyncFailed { id: failed, .. } if *failed == id)));
}

#[tokio::test(start_paused = true)]
async fn concurrent_sync_of_one_connection_is_rejected() {
    let h = Harness::new();
    h.handler.set_latency(Duration::from_secs(10));
    let id = add(&h, ConnectRequest::new("mock", "A")).await;

    let first = {
        let service = h.service.clone();
        let id = id.clone();
        tokio::spawn(async move { service.sync_one(&id).await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    let connection = h.service.get_connection(&id).await.unwrap();
    assert_eq!(connection.last_sync_status, SyncStatus::Syncing);

    let err = assert_err!(h.service.sync_one(&id).await);
    assert!(matches!(err, Error::SyncInProgress(_)));

    assert_eq!(first.await.unwrap().unwrap(), 3);
    let connection = h.service.get_connection(&id).await.unwrap();
    assert_eq!(connection.last_sync_status, SyncStatus::Success);
    assert_eq!(connection.error_count, 0);
    assert_eq!(h.handler.calls_for(&id), 1);
}

#[tokio::test(start_paused = true)]
async fn scheduled_tick_skips_an_in_flight_sync() {
    let h = Harness::new();
    h.handler.set_latency(Duration::from_secs(10));
    let id = add(
        &h,
        ConnectRequest::new("mock", "A").with_auto_sync(Duration::from_secs(60)),
    )
    .await;
    h.service.start_auto_sync().await;

    tokio::time::sleep(Duration::from_secs(55)).await;
    let manual = {
        let service = h.service.clone();
        let id = id.clone();
        tokio::spawn(async move { service.sync_one(&id).await })
    };

    // Tick at +60 lands while the manual sync runs until +65
    tokio::time::sleep(Duration::from_secs(10)).await;
    manual.await.unwrap().unwrap();

    let connection = h.service.get_connection(&id).await.unwrap();
    assert_eq!(h.handler.calls_for(&id), 1);
    assert_eq!(connection.error_count, 0);
    assert_eq!(connection.last_sync_status, SyncStatus::Success);

    // The loop survives the skip
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.handler.calls_for(&id), 2);

    h.service.stop_auto_sync().await;
}
