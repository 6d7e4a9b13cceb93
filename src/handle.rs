//! Buffer Handle Management
//!
//! Host runtimes address buffers by opaque `u64` handles rather than by
//! reference. The embedding bridge stores a buffer here, hands the handle to
//! the hosted program, and registry operations resolve it back for each
//! call. Removing a handle drops the buffer, which closes any cached file
//! associations it still holds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::buffer::ManagedByteBuffer;

/// A handle to a buffer stored in the global handle manager
pub type BufferHandle = u64;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn next_handle() -> BufferHandle {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

lazy_static::lazy_static! {
    /// Global storage for buffers addressed by the host runtime
    static ref BUFFER_STORAGE: RwLock<HashMap<BufferHandle, ManagedByteBuffer>> =
        RwLock::new(HashMap::new());
}

/// Manager for buffer handles
pub struct HandleManager;

impl HandleManager {
    /// Store a buffer and return its handle
    pub fn store(buffer: ManagedByteBuffer) -> BufferHandle {
        let handle = next_handle();
        let mut storage = BUFFER_STORAGE.write().unwrap();
        storage.insert(handle, buffer);
        handle
    }

    /// Run a closure over a buffer by handle
    pub fn with<F, R>(handle: BufferHandle, f: F) -> Option<R>
    where
        F: FnOnce(&ManagedByteBuffer) -> R,
    {
        let storage = BUFFER_STORAGE.read().unwrap();
        storage.get(&handle).map(f)
    }

    /// Mutate a buffer by handle
    pub fn with_mut<F, R>(handle: BufferHandle, f: F) -> Option<R>
    where
        F: FnOnce(&mut ManagedByteBuffer) -> R,
    {
        let mut storage = BUFFER_STORAGE.write().unwrap();
        storage.get_mut(&handle).map(f)
    }

    /// Remove a buffer by handle and return it
    pub fn remove(handle: BufferHandle) -> Option<ManagedByteBuffer> {
        let mut storage = BUFFER_STORAGE.write().unwrap();
        storage.remove(&handle)
    }

    /// Check if a handle exists
    pub fn exists(handle: BufferHandle) -> bool {
        let storage = BUFFER_STORAGE.read().unwrap();
        storage.contains_key(&handle)
    }

    /// Get the number of stored buffers
    pub fn count() -> usize {
        let storage = BUFFER_STORAGE.read().unwrap();
        storage.len()
    }

    /// Clear all stored buffers
    pub fn clear() {
        let mut storage = BUFFER_STORAGE.write().unwrap();
        storage.clear();
    }
}
