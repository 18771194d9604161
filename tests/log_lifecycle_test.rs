//! Integration tests for the log component lifecycle.

use rust_cld::core::{DataRecord, Lifecycle};
use rust_cld::log_file::{LogComponent, LogSettings};
use rust_cld::{CldError, LifecycleState};
use std::path::Path;

fn sample(value: f64) -> DataRecord {
    DataRecord::now(vec![("ai0".to_string(), value)])
}

fn log_in(dir: &Path) -> LogComponent {
    LogComponent::new(
        "log0",
        LogSettings::new("log0")
            .with_directory(dir)
            .with_file("log.dat")
            .with_title("Data Log")
            .with_columns(vec!["ai0".to_string()]),
    )
}

#[test]
fn test_write_requires_running() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_in(dir.path());

    assert!(matches!(
        log.write(&sample(1.0)),
        Err(CldError::InvalidState { .. })
    ));

    log.open().unwrap();
    log.run().unwrap();
    log.write(&sample(1.0)).unwrap();

    log.stop().unwrap();
    assert!(matches!(
        log.write(&sample(2.0)),
        Err(CldError::InvalidState { .. })
    ));
    assert_eq!(log.records_written(), 1);
}

#[test]
fn test_rotate_requires_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_in(dir.path());
    log.open().unwrap();
    log.run().unwrap();

    assert!(matches!(
        log.rotate(true),
        Err(CldError::InvalidState { .. })
    ));

    log.stop().unwrap();
    log.rotate(true).unwrap();
    assert_eq!(log.current_state(), LifecycleState::Closed);
}

#[test]
fn test_round_trip_produces_two_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_in(dir.path());
    let live = dir.path().join("log.dat");

    log.open().unwrap();
    log.run().unwrap();
    log.write(&sample(4.5)).unwrap();
    log.stop().unwrap();
    let archived = log.rotate(true).unwrap();
    log.open().unwrap();
    log.run().unwrap();

    assert_ne!(archived, live);
    assert!(archived.exists());
    let archived_name = archived.file_name().unwrap().to_string_lossy().into_owned();
    assert!(archived_name.starts_with("log-"));
    assert!(archived_name.ends_with(".dat"));
    assert!(archived_name.chars().any(|c| c.is_ascii_digit()));

    let archived_contents = std::fs::read_to_string(&archived).unwrap();
    assert!(archived_contents.starts_with("# Data Log\ntimestamp,ai0\n"));
    assert!(archived_contents.contains(",4.5"));

    assert_eq!(log.current_path().as_deref(), Some(live.as_path()));
    assert_eq!(std::fs::metadata(&live).unwrap().len(), 0);
}

#[test]
fn test_lifecycle_through_trait_object() {
    let dir = tempfile::tempdir().unwrap();
    let component = log_in(dir.path());
    let log: &dyn Lifecycle = &component;

    let expected = [
        LifecycleState::Open,
        LifecycleState::Running,
        LifecycleState::Stopped,
    ];
    log.open().unwrap();
    assert_eq!(log.current_state(), expected[0]);
    log.run().unwrap();
    assert_eq!(log.current_state(), expected[1]);
    log.stop().unwrap();
    assert_eq!(log.current_state(), expected[2]);
    let archived = log.rotate(false).unwrap();
    assert_eq!(archived, dir.path().join("log-1.dat"));
    assert_eq!(log.current_state(), LifecycleState::Closed);
}

#[test]
fn test_file_handle_exists_outside_closed_only() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_in(dir.path());
    assert!(log.current_path().is_none());

    log.open().unwrap();
    assert!(log.current_state().holds_file() && log.current_path().is_some());
    log.run().unwrap();
    log.stop().unwrap();
    assert!(log.current_path().is_some());
    log.rotate(true).unwrap();
    assert!(log.current_path().is_none());
}
