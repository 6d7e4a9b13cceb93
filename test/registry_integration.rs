//! Integration Tests for the Host-Facing Registry
//!
//! Drives the full host flow: payloads enter through the handle store,
//! operations are dispatched by name over the integer calling convention,
//! and byte results come back as fresh handles.

use std::fs;

use bytestage::{BufferError, BufferOpRegistry, HandleManager, ManagedByteBuffer};

fn store_bytes(bytes: &[u8]) -> u64 {
    HandleManager::store(ManagedByteBuffer::wrap(bytes))
}

fn take_bytes(handle: u64) -> Vec<u8> {
    let bytes = HandleManager::with(handle, |b| b.readable().to_vec()).unwrap();
    HandleManager::remove(handle);
    bytes
}

#[test]
fn test_host_flow_fill_flip_drain() {
    let registry = BufferOpRegistry::new();
    let mut out = [0u64; 1];

    registry.call_by_name("buf_allocate", &[16], &mut out).unwrap();
    let buf = out[0];

    let payload = store_bytes(b"hello host");
    registry.call_by_name("buf_append", &[buf, payload], &mut out).unwrap();

    registry.call_by_name("buf_remaining", &[buf], &mut out).unwrap();
    assert_eq!(out[0], 6);

    registry.call_by_name("buf_flip", &[buf], &mut out).unwrap();
    registry.call_by_name("buf_limit", &[buf], &mut out).unwrap();
    assert_eq!(out[0], 10);

    registry.call_by_name("buf_drain", &[buf], &mut out).unwrap();
    assert_eq!(take_bytes(out[0]), b"hello host");

    registry.call_by_name("buf_release", &[buf], &mut [0u64; 1]).unwrap();
    HandleManager::remove(payload);
}

#[test]
fn test_host_flow_file_transfer() {
    let path = "/tmp/bytestage_itest_registry_file.txt";
    fs::remove_file(path).ok();

    let registry = BufferOpRegistry::new();
    let mut out = [0u64; 1];

    registry.call_by_name("buf_allocate", &[8], &mut out).unwrap();
    let buf = out[0];
    let payload = store_bytes(b"via host");
    let path_handle = store_bytes(path.as_bytes());

    registry.call_by_name("buf_append", &[buf, payload], &mut out).unwrap();
    registry.call_by_name("buf_flip", &[buf], &mut out).unwrap();
    registry
        .call_by_name("buf_write_file", &[buf, path_handle], &mut out)
        .unwrap();
    assert_eq!(fs::read(path).unwrap(), b"via host");

    // Read it back through a second buffer.
    registry.call_by_name("buf_allocate", &[8], &mut out).unwrap();
    let reader = out[0];
    registry
        .call_by_name("buf_read_file", &[reader, path_handle], &mut out)
        .unwrap();
    registry.call_by_name("buf_flip", &[reader], &mut out).unwrap();
    registry.call_by_name("buf_drain", &[reader], &mut out).unwrap();
    assert_eq!(take_bytes(out[0]), b"via host");

    registry.call_by_name("buf_release", &[buf], &mut [0u64; 1]).unwrap();
    registry.call_by_name("buf_release", &[reader], &mut [0u64; 1]).unwrap();
    HandleManager::remove(payload);
    HandleManager::remove(path_handle);

    // Cleanup
    fs::remove_file(path).ok();
}

#[test]
fn test_host_flow_window_and_queries() {
    let registry = BufferOpRegistry::new();
    let mut out = [0u64; 1];

    let source = store_bytes(b"0123456789");
    registry
        .call_by_name("buf_wrap_window", &[source, 2, 5], &mut out)
        .unwrap();
    let buf = out[0];

    registry.call_by_name("buf_position", &[buf], &mut out).unwrap();
    assert_eq!(out[0], 2);
    registry.call_by_name("buf_limit", &[buf], &mut out).unwrap();
    assert_eq!(out[0], 7);
    registry.call_by_name("buf_capacity", &[buf], &mut out).unwrap();
    assert_eq!(out[0], 10);
    registry.call_by_name("buf_offset", &[buf], &mut out).unwrap();
    assert_eq!(out[0], 2);
    registry.call_by_name("buf_has_remaining", &[buf], &mut out).unwrap();
    assert_eq!(out[0], 1);

    registry.call_by_name("buf_drain", &[buf], &mut out).unwrap();
    assert_eq!(take_bytes(out[0]), b"23456");

    registry.call_by_name("buf_release", &[buf], &mut [0u64; 1]).unwrap();
    HandleManager::remove(source);
}

#[test]
fn test_host_flow_error_paths() {
    let registry = BufferOpRegistry::new();
    let mut out = [0u64; 1];

    // Wrong arg count.
    let err = registry.call_by_name("buf_wrap_window", &[1, 2], &mut out).unwrap_err();
    assert!(matches!(err, BufferError::InvalidArgCount { expected: 3, got: 2 }));

    // Stale handle.
    let err = registry.call_by_name("buf_flip", &[u64::MAX], &mut out).unwrap_err();
    assert!(matches!(err, BufferError::HandleNotFound(_)));

    // Overflow propagates from the buffer core.
    registry.call_by_name("buf_allocate", &[2], &mut out).unwrap();
    let buf = out[0];
    let payload = store_bytes(b"too long");
    let err = registry.call_by_name("buf_append", &[buf, payload], &mut out).unwrap_err();
    assert!(matches!(err, BufferError::Overflow { .. }));

    // Reset with no mark.
    let err = registry.call_by_name("buf_reset", &[buf], &mut out).unwrap_err();
    assert!(matches!(err, BufferError::InvalidState(_)));

    registry.call_by_name("buf_release", &[buf], &mut [0u64; 1]).unwrap();
    HandleManager::remove(payload);
}

#[test]
fn test_host_flow_mark_reset_and_equals() {
    let registry = BufferOpRegistry::new();
    let mut out = [0u64; 1];

    let a = store_bytes(b"abcd");
    let b = store_bytes(b"abcd");

    registry.call_by_name("buf_equals", &[a, b], &mut out).unwrap();
    assert_eq!(out[0], 1);

    // Advance one side; structural equality includes cursor state.
    registry.call_by_name("buf_mark", &[a], &mut out).unwrap();
    registry.call_by_name("buf_read_next", &[a, 2], &mut out).unwrap();
    let chunk = out[0];
    assert_eq!(take_bytes(chunk), b"ab");

    registry.call_by_name("buf_equals", &[a, b], &mut out).unwrap();
    assert_eq!(out[0], 0);

    // Reset restores the marked position and equality.
    registry.call_by_name("buf_reset", &[a], &mut out).unwrap();
    registry.call_by_name("buf_equals", &[a, b], &mut out).unwrap();
    assert_eq!(out[0], 1);

    HandleManager::remove(a);
    HandleManager::remove(b);
}
