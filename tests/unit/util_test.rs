//! Tests for utility functions

use std::fs;

use grid_client::util::fs::{md5_file, md5_hex, password_hash, remove_dir_if_exists, set_file_mode};
use grid_client::util::{init_tracing, Clock, ManualClock, SystemClock};

#[test]
fn test_md5_of_empty_input() {
    assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
}

#[test]
fn test_md5_file_matches_in_memory_digest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blob");
    let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(&path, &data).unwrap();
    assert_eq!(md5_file(&path).unwrap(), md5_hex(&data));
}

#[test]
fn test_password_hash_depends_on_email_case() {
    assert_ne!(password_hash("Me@x.org", "pw"), password_hash("me@x.org", "pw"));
    assert_eq!(password_hash("me@x.org", "pw").len(), 32);
}

#[test]
fn test_remove_dir_recursively() {
    let dir = tempfile::tempdir().unwrap();
    let slot = dir.path().join("0");
    fs::create_dir_all(slot.join("nested")).unwrap();
    fs::write(slot.join("nested").join("f"), b"x").unwrap();
    remove_dir_if_exists(&slot).unwrap();
    assert!(!slot.exists());
}

#[cfg(unix)]
#[test]
fn test_executable_mode() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app");
    fs::write(&path, b"#!/bin/sh\n").unwrap();
    set_file_mode(&path, true).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o700);
    set_file_mode(&path, false).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o600);
}

#[test]
fn test_manual_clock_is_shared_between_clones() {
    let clock = ManualClock::new(100);
    let other = clock.clone();
    clock.advance(5);
    assert_eq!(other.now(), 105);
    other.set(7);
    assert_eq!(clock.now(), 7);
}

#[test]
fn test_system_clock_is_after_2020() {
    assert!(SystemClock.now() > 1_577_836_800);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialised twice without panicking");
}
