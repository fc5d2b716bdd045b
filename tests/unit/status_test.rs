//! Tests for status labels and the on-disk marker

use std::fs;

use grid_client::core::{ErrorCode, Status};
use grid_client::infra::status_file::{STATUS_FILE, STATUS_TEMP_FILE};
use grid_client::infra::StatusFile;

#[test]
fn test_storable_statuses() {
    let storable: Vec<Status> = Status::ALL.into_iter().filter(|s| s.is_storable()).collect();
    assert_eq!(
        storable,
        vec![
            Status::Downloading,
            Status::Waiting,
            Status::Computing,
            Status::Finished,
            Status::Uploading,
            Status::Completed,
        ]
    );
}

#[test]
fn test_downloading_group() {
    assert!(Status::Initializing.is_downloading());
    assert!(Status::Defined.is_downloading());
    assert!(Status::Downloading.is_downloading());
    assert!(Status::Waiting.is_downloading());
    assert!(!Status::Created.is_downloading());
    assert!(!Status::Computing.is_downloading());
}

#[test]
fn test_unknown_label_is_rejected() {
    let err = "FAILED".parse::<Status>().unwrap_err();
    assert_eq!(err.to_string(), "unknown status label `FAILED`");
}

#[test]
fn test_marker_overwrite_is_atomic() {
    let dir = tempfile::tempdir().unwrap();
    let marker = StatusFile::new(dir.path());
    marker.write(Status::Downloading).unwrap();
    marker.write(Status::Completed).unwrap();

    assert_eq!(fs::read_to_string(dir.path().join(STATUS_FILE)).unwrap(), "COMPLETED");
    assert!(!dir.path().join(STATUS_TEMP_FILE).exists());
    assert_eq!(marker.read().unwrap(), Some(Status::Completed));
}

#[test]
fn test_failed_is_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let marker = StatusFile::new(dir.path());
    marker.write(Status::Uploading).unwrap();
    marker.write(Status::Failed).unwrap();
    assert_eq!(marker.read().unwrap(), Some(Status::Uploading));
}

#[test]
fn test_marker_in_missing_dir_is_filesystem_error() {
    let dir = tempfile::tempdir().unwrap();
    let marker = StatusFile::new(dir.path().join("gone"));
    let err = marker.write(Status::Waiting).unwrap_err();
    assert_eq!(err.code(), ErrorCode::FileSystem);
}
