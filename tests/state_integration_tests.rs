//! Integration tests for SessionManager with session change events
//!
//! These tests verify that the SessionManager correctly:
//! - Emits change events on mutations
//! - Supports multiple subscribers
//! - Handles concurrent access from multiple tasks
//! - Keeps the car grid and track selection consistent

use acsm::services::ServerStatus;
use acsm::{SessionChange, SessionManager};
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::time::{Duration, timeout};

#[tokio::test]
async fn test_grid_change_event_emitted() {
    let session = Arc::new(SessionManager::new());
    let mut rx = session.subscribe();

    let (result, _) = session.update_with(|s| s.model.add_car("ks_mazda_mx5_cup", 8));
    result.unwrap();

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");

    assert!(
        matches!(event, SessionChange::GridChanged { entries: 1, total_slots: 8 }),
        "Expected GridChanged event, got: {:?}",
        event
    );
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let session = Arc::new(SessionManager::new());
    let mut rx1 = session.subscribe();
    let mut rx2 = session.subscribe();
    let mut rx3 = session.subscribe();

    session.set_paths(
        Some(Utf8PathBuf::from("/games/assettocorsa")),
        Some(Utf8PathBuf::from("/srv/acserver")),
    );

    for rx in [&mut rx1, &mut rx2, &mut rx3] {
        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("Channel closed");
        assert!(matches!(
            event,
            SessionChange::PathsChanged { is_fully_configured: true, .. }
        ));
    }
}

#[tokio::test]
async fn test_field_changes_reported_by_name() {
    let session = Arc::new(SessionManager::new());

    let changes = session.update(|s| {
        s.model.set_from_input("server_name", "Sunday Cup").unwrap();
        s.model.set_from_input("abs_mode", "0 - Off").unwrap();
        s.model.set_from_input("tc_mode", "1").unwrap();
    });

    assert_eq!(
        changes,
        vec![SessionChange::FieldsChanged {
            fields: vec!["server_name", "abs_mode"]
        }]
    );
}

#[tokio::test]
async fn test_track_selection_and_layout_switch() {
    let session = Arc::new(SessionManager::new());
    let mut layouts = IndexMap::new();
    layouts.insert("layout_gp_a".to_string(), 38);
    layouts.insert("layout_sprint_a".to_string(), 24);

    session.set_track("ks_nurburgring".into(), "layout_gp_a".into(), layouts);
    assert_eq!(session.read(|s| s.pit_boxes()), 38);

    let changes = session.update(|s| s.model.layout = "layout_sprint_a".into());
    assert_eq!(
        changes,
        vec![SessionChange::TrackChanged {
            track: "ks_nurburgring".into(),
            layout: "layout_sprint_a".into(),
            pit_boxes: 24
        }]
    );
}

#[tokio::test]
async fn test_server_status_events() {
    let session = Arc::new(SessionManager::new());
    let mut rx = session.subscribe();

    session.set_server_status(ServerStatus::Running {
        executable: "AssettoServer".into(),
        pid: Some(4242),
    });
    session.set_server_status(ServerStatus::NotStarted);
    // Same status again: no event
    session.set_server_status(ServerStatus::NotStarted);

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert!(matches!(first, SessionChange::ServerStatusChanged { status } if status.is_running()));
    assert_eq!(
        second,
        SessionChange::ServerStatusChanged {
            status: ServerStatus::NotStarted
        }
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_concurrent_state_access() {
    let session = Arc::new(SessionManager::new());

    // Spawn multiple tasks that grow the grid concurrently
    let mut handles = vec![];

    for i in 0..10 {
        let session_clone = session.clone();
        let handle = tokio::spawn(async move {
            let (result, _) = session_clone.update_with(|s| s.model.add_car(&format!("car_{}", i), 2));
            result.unwrap();
        });
        handles.push(handle);
    }

    // Wait for all tasks to complete
    for handle in handles {
        handle.await.unwrap();
    }

    // No update is lost
    assert_eq!(session.read(|s| s.model.car_grid.len()), 10);
    assert_eq!(session.read(|s| s.model.total_slots()), 20);
}

#[tokio::test]
async fn test_rejected_grid_edit_leaves_state_untouched() {
    let session = Arc::new(SessionManager::new());
    let mut rx = session.subscribe();

    let (result, changes) = session.update_with(|s| s.model.add_car("abarth500", 51));
    assert!(result.is_err());
    assert!(changes.is_empty());
    assert!(rx.try_recv().is_err());
}
