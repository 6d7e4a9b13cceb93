//! Bytestage - Managed Byte Buffer for Embedded Script Runtimes
//!
//! A mutable, position/limit-tracking byte buffer in the classic NIO mold,
//! built to be exposed to a host scripting environment: hosted programs
//! address buffers through opaque handles and invoke the buffer surface by
//! operation name, while the buffer itself stays a single-owner Rust value.
//!
//! # Features
//!
//! - **Cursor protocol**: position, limit, capacity and mark with the full
//!   `flip` / `rewind` / `clear` / `compact` / `mark` / `reset` repertoire
//! - **Fixed-capacity region**: allocated once, never grows; callers needing
//!   more room allocate a new buffer
//! - **Cached file channels**: repeated transfers to or from the same file
//!   reuse one open descriptor per direction, keyed by normalized path
//! - **Handle-based exposure**: a global handle store plus an operation
//!   registry give an embedding runtime a stable integer calling convention
//!
//! # Example
//!
//! ```rust
//! use bytestage::ManagedByteBuffer;
//!
//! let mut buf = ManagedByteBuffer::allocate(8);
//! buf.append(b"ab").unwrap().flip();
//! assert_eq!(buf.remaining(), 2);
//! assert_eq!(buf.drain_all(), b"ab");
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  Hosted program  │  buf_append, buf_flip, buf_write_file, ...
//! └────────┬─────────┘
//!          │ handles + op names
//!          ▼
//! ┌──────────────────┐     ┌───────────────────┐
//! │ BufferOpRegistry │────▶│   HandleManager   │
//! └──────────────────┘     └─────────┬─────────┘
//!                                    │
//!                                    ▼
//!                        ┌─────────────────────┐
//!                        │  ManagedByteBuffer  │  cursors + cached channels
//!                        └─────────────────────┘
//! ```

#![warn(clippy::all)]

pub mod buffer;
pub mod error;
pub mod handle;
pub mod registry;
pub mod transfer;

// Re-export commonly used types
pub use buffer::ManagedByteBuffer;
pub use error::{BufferError, BufferResult};
pub use handle::{BufferHandle, HandleManager};
pub use registry::{op_ids, BufferOpRegistry, OpEntry, OpFn, OpSignature};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_flip_drain_smoke() {
        let mut buf = ManagedByteBuffer::allocate(16);
        buf.append(b"staging").unwrap().flip();
        assert_eq!(buf.drain_all(), b"staging");
    }

    #[test]
    fn test_registry_smoke() {
        let registry = BufferOpRegistry::new();
        let mut out = [0u64; 1];
        registry.call_by_name("buf_allocate", &[4], &mut out).unwrap();
        assert!(HandleManager::exists(out[0]));
        HandleManager::remove(out[0]);
    }

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
