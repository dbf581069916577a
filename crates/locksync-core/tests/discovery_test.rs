#![allow(clippy::unwrap_used)]
// Discovery against an in-memory API.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use locksync_core::{CoreError, DeviceKind, DiscoveryService, discover};

use common::{FakeApi, connection, initialized, lock, settle, unauthorized};

#[tokio::test(start_paused = true)]
async fn test_discover_skips_unsupported_types() {
    let api = FakeApi::with_devices(vec![lock(1, 0), lock(2, 2), lock(3, 5), lock(4, 4)]);
    let conn = initialized(&api).await;

    let found = discover(&conn).await.unwrap();

    let ids: Vec<_> = found.iter().map(|d| d.smartlock_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "4"]);
    assert_eq!(found[1].kind, DeviceKind::Opener);
    assert_eq!(found[1].label, "Opener");
    assert_eq!(found[2].label, "Smart Lock 3.0");
    assert_eq!(found[0].name.as_deref(), Some("Device 1"));
}

#[tokio::test(start_paused = true)]
async fn test_discover_without_client_is_not_connected() {
    let api = FakeApi::default();
    let conn = connection(&api);

    assert_eq!(discover(&conn).await, Err(CoreError::NotConnected));
}

#[tokio::test(start_paused = true)]
async fn test_discover_surfaces_api_errors() {
    let api = FakeApi::default();
    let conn = initialized(&api).await;
    api.fail_list(Some(unauthorized("nope")));

    let err = discover(&conn).await.unwrap_err();

    assert_eq!(
        err,
        CoreError::Unauthorized {
            message: "nope".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_scan_reports_each_device_once() {
    let api = FakeApi::with_devices(vec![lock(1, 0)]);
    let conn = initialized(&api).await;
    let service = DiscoveryService::new(conn);

    assert_eq!(service.scan().await.len(), 1);
    assert!(service.scan().await.is_empty());

    api.0.lock().unwrap().devices.push(lock(2, 3));
    let fresh = service.scan().await;
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].label, "Smart Door");
    assert_eq!(fresh[0].kind, DeviceKind::SmartLock);
}

#[tokio::test(start_paused = true)]
async fn test_scan_failure_yields_nothing() {
    let api = FakeApi::with_devices(vec![lock(1, 0)]);
    let conn = initialized(&api).await;
    api.fail_list(Some(unauthorized("expired")));
    let service = DiscoveryService::new(conn);

    assert!(service.scan().await.is_empty());

    api.fail_list(None);
    assert_eq!(service.scan().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_background_discovery_forwards_new_devices() {
    let api = FakeApi::with_devices(vec![lock(1, 0)]);
    let conn = initialized(&api).await;
    let service = Arc::new(DiscoveryService::new(conn));

    let (handle, mut rx) = service.start(Duration::from_secs(300));
    settle().await;
    assert_eq!(rx.try_recv().unwrap().smartlock_id, "1");
    assert!(rx.try_recv().is_err());

    api.0.lock().unwrap().devices.push(lock(7, 2));
    tokio::time::sleep(Duration::from_secs(300)).await;
    settle().await;
    assert_eq!(rx.try_recv().unwrap().smartlock_id, "7");

    handle.cancel();
    api.0.lock().unwrap().devices.push(lock(8, 2));
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(rx.try_recv().is_err());
}
