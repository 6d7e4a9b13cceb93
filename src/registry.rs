//! Host-Facing Buffer Operations
//!
//! The registry exposes the buffer surface to an embedding script runtime
//! using an integer calling convention: arguments are `u64` values (buffer
//! handles or scalars), results land in an output slot array, and the
//! scalar return value doubles as the primary result.
//!
//! ```text
//! Host runtime calls:  call_by_name("buf_append", &[dst, src], &mut out)
//!                              |
//!                              v
//! Registry dispatches: entry.func(args, outputs)
//!                              |
//!                              v
//! HandleManager:       resolves handles to ManagedByteBuffer instances
//! ```
//!
//! Byte payloads (including file paths) travel as handles to buffers the
//! bridge stored beforehand; operations that produce bytes store the result
//! and hand back a fresh handle. Mutating cursor operations return the
//! buffer's own handle so hosted code can chain calls. Callers provide at
//! least one output slot.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::buffer::ManagedByteBuffer;
use crate::error::{BufferError, BufferResult};
use crate::handle::{BufferHandle, HandleManager};

/// Operation function signature: (args, outputs) -> Result<return_value, error>
pub type OpFn = Arc<dyn Fn(&[u64], &mut [u64]) -> BufferResult<i64> + Send + Sync>;

/// Operation signature metadata
#[derive(Clone)]
pub struct OpSignature {
    pub name: String,
    pub description: String,
    pub arg_count: usize,
    pub has_return: bool,
}

impl fmt::Debug for OpSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpSignature")
            .field("name", &self.name)
            .field("arg_count", &self.arg_count)
            .field("has_return", &self.has_return)
            .finish()
    }
}

/// A registered operation entry
pub struct OpEntry {
    pub id: u32,
    pub signature: OpSignature,
    pub func: OpFn,
}

impl fmt::Debug for OpEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpEntry")
            .field("id", &self.id)
            .field("signature", &self.signature)
            .finish()
    }
}

// =============================================================================
// Operation IDs
// =============================================================================

/// Predefined operation IDs (stable across releases)
pub mod op_ids {
    // Construction (1-9)
    pub const BUF_ALLOCATE: u32 = 1;
    pub const BUF_WRAP: u32 = 2;
    pub const BUF_WRAP_WINDOW: u32 = 3;

    // Append / drain (10-19)
    pub const BUF_APPEND: u32 = 10;
    pub const BUF_DRAIN: u32 = 11;
    pub const BUF_READ_NEXT: u32 = 12;

    // File transfer (20-29)
    pub const BUF_WRITE_FILE: u32 = 20;
    pub const BUF_READ_FILE: u32 = 21;

    // Cursor protocol (30-49)
    pub const BUF_FLIP: u32 = 30;
    pub const BUF_REWIND: u32 = 31;
    pub const BUF_CLEAR: u32 = 32;
    pub const BUF_COMPACT: u32 = 33;
    pub const BUF_MARK: u32 = 34;
    pub const BUF_RESET: u32 = 35;
    pub const BUF_SET_POSITION: u32 = 36;
    pub const BUF_SET_LIMIT: u32 = 37;

    // Queries (50-69)
    pub const BUF_REMAINING: u32 = 50;
    pub const BUF_HAS_REMAINING: u32 = 51;
    pub const BUF_CAPACITY: u32 = 52;
    pub const BUF_POSITION: u32 = 53;
    pub const BUF_LIMIT: u32 = 54;
    pub const BUF_OFFSET: u32 = 55;
    pub const BUF_EQUALS: u32 = 56;
    pub const BUF_TO_STRING: u32 = 57;

    // Lifecycle (70-79)
    pub const BUF_RELEASE: u32 = 70;
}

// =============================================================================
// Handle Helpers
// =============================================================================

fn with_buffer<R>(handle: BufferHandle, f: impl FnOnce(&ManagedByteBuffer) -> R) -> BufferResult<R> {
    HandleManager::with(handle, f).ok_or(BufferError::HandleNotFound(handle))
}

fn with_buffer_mut<R>(
    handle: BufferHandle,
    f: impl FnOnce(&mut ManagedByteBuffer) -> BufferResult<R>,
) -> BufferResult<R> {
    HandleManager::with_mut(handle, f).ok_or(BufferError::HandleNotFound(handle))?
}

/// Decode a path argument: the readable window of the referenced buffer,
/// interpreted as UTF-8.
fn path_from_handle(handle: BufferHandle) -> BufferResult<String> {
    let bytes = with_buffer(handle, |b| b.readable().to_vec())?;
    String::from_utf8(bytes)
        .map_err(|e| BufferError::InvalidArgument(format!("invalid UTF-8 in path: {}", e)))
}

// =============================================================================
// Registry
// =============================================================================

/// Registry of buffer operations callable by the host runtime
pub struct BufferOpRegistry {
    by_id: HashMap<u32, OpEntry>,
    by_name: HashMap<String, u32>,
}

impl BufferOpRegistry {
    /// Create a new registry with all buffer operations registered
    pub fn new() -> Self {
        let mut registry = Self {
            by_id: HashMap::new(),
            by_name: HashMap::new(),
        };
        registry.register_builtins();
        registry
    }

    /// Register an operation with a specific ID
    pub fn register_with_id(
        &mut self,
        id: u32,
        name: &str,
        description: &str,
        arg_count: usize,
        has_return: bool,
        func: OpFn,
    ) {
        let signature = OpSignature {
            name: name.to_string(),
            description: description.to_string(),
            arg_count,
            has_return,
        };

        self.by_name.insert(name.to_string(), id);
        self.by_id.insert(
            id,
            OpEntry {
                id,
                signature,
                func,
            },
        );
    }

    pub fn get(&self, id: u32) -> Option<&OpEntry> {
        self.by_id.get(&id)
    }

    pub fn get_id(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn get_by_name(&self, name: &str) -> Option<&OpEntry> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    /// Call an operation by ID
    pub fn call(&self, id: u32, args: &[u64], outputs: &mut [u64]) -> BufferResult<i64> {
        let entry = self
            .get(id)
            .ok_or_else(|| BufferError::InvalidArgument(format!("unknown operation: {}", id)))?;

        if args.len() < entry.signature.arg_count {
            return Err(BufferError::InvalidArgCount {
                expected: entry.signature.arg_count,
                got: args.len(),
            });
        }

        (entry.func)(args, outputs)
    }

    /// Call an operation by name
    pub fn call_by_name(&self, name: &str, args: &[u64], outputs: &mut [u64]) -> BufferResult<i64> {
        let id = self.get_id(name).ok_or_else(|| {
            BufferError::InvalidArgument(format!("unknown operation: {}", name))
        })?;
        self.call(id, args, outputs)
    }

    /// List all registered operations
    pub fn list(&self) -> Vec<&OpEntry> {
        self.by_id.values().collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    // =========================================================================
    // Builtin Registration
    // =========================================================================

    fn register_builtins(&mut self) {
        self.register_construction();
        self.register_append_drain();
        self.register_file_transfer();
        self.register_cursor_ops();
        self.register_queries();
        self.register_lifecycle();
    }

    fn register_construction(&mut self) {
        self.register_with_id(
            op_ids::BUF_ALLOCATE,
            "buf_allocate",
            "Allocate a zero-filled buffer. Args: capacity. Returns buffer handle.",
            1,
            true,
            Arc::new(|args, outputs| {
                let capacity = args[0] as usize;
                let handle = HandleManager::store(ManagedByteBuffer::allocate(capacity));
                outputs[0] = handle;
                Ok(handle as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_WRAP,
            "buf_wrap",
            "Wrap a copy of the source window. Args: src_handle. Returns buffer handle.",
            1,
            true,
            Arc::new(|args, outputs| {
                let bytes = with_buffer(args[0], |b| b.readable().to_vec())?;
                let handle = HandleManager::store(ManagedByteBuffer::wrap(&bytes));
                outputs[0] = handle;
                Ok(handle as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_WRAP_WINDOW,
            "buf_wrap_window",
            "Wrap a copy of the source window restricted to [offset, offset+length). \
             Args: src_handle, offset, length. Returns buffer handle.",
            3,
            true,
            Arc::new(|args, outputs| {
                let bytes = with_buffer(args[0], |b| b.readable().to_vec())?;
                let wrapped =
                    ManagedByteBuffer::wrap_window(&bytes, args[1] as usize, args[2] as usize)?;
                let handle = HandleManager::store(wrapped);
                outputs[0] = handle;
                Ok(handle as i64)
            }),
        );
    }

    fn register_append_drain(&mut self) {
        self.register_with_id(
            op_ids::BUF_APPEND,
            "buf_append",
            "Append the source window at the destination's position. \
             Args: dst_handle, src_handle. Returns dst_handle.",
            2,
            true,
            Arc::new(|args, outputs| {
                // Copy the source bytes out first; the handle store is a
                // single lock and must not be entered twice.
                let bytes = with_buffer(args[1], |b| b.readable().to_vec())?;
                with_buffer_mut(args[0], |b| b.append(&bytes).map(|_| ()))?;
                outputs[0] = args[0];
                Ok(args[0] as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_DRAIN,
            "buf_drain",
            "Read every remaining byte, advancing position to limit. \
             Args: handle. Returns handle to the drained bytes.",
            1,
            true,
            Arc::new(|args, outputs| {
                let bytes = with_buffer_mut(args[0], |b| Ok(b.drain_all()))?;
                let handle = HandleManager::store(ManagedByteBuffer::wrap(&bytes));
                outputs[0] = handle;
                Ok(handle as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_READ_NEXT,
            "buf_read_next",
            "Read exactly count bytes if available, else nothing. \
             Args: handle, count. Returns handle to the bytes read.",
            2,
            true,
            Arc::new(|args, outputs| {
                let bytes = with_buffer_mut(args[0], |b| b.read_next(args[1] as usize))?;
                let handle = HandleManager::store(ManagedByteBuffer::wrap(&bytes));
                outputs[0] = handle;
                Ok(handle as i64)
            }),
        );
    }

    fn register_file_transfer(&mut self) {
        self.register_with_id(
            op_ids::BUF_WRITE_FILE,
            "buf_write_file",
            "Append the readable window to a file, reusing the cached handle. \
             Args: handle, path_handle. Returns handle.",
            2,
            true,
            Arc::new(|args, outputs| {
                let path = path_from_handle(args[1])?;
                with_buffer_mut(args[0], |b| b.write_to(&path).map(|_| ()))?;
                outputs[0] = args[0];
                Ok(args[0] as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_READ_FILE,
            "buf_read_file",
            "Fill the writable window from a file, reusing the cached handle. \
             Args: handle, path_handle. Returns handle.",
            2,
            true,
            Arc::new(|args, outputs| {
                let path = path_from_handle(args[1])?;
                with_buffer_mut(args[0], |b| b.read_from(&path).map(|_| ()))?;
                outputs[0] = args[0];
                Ok(args[0] as i64)
            }),
        );
    }

    fn register_cursor_ops(&mut self) {
        self.register_with_id(
            op_ids::BUF_FLIP,
            "buf_flip",
            "Switch from filling to draining. Args: handle. Returns handle.",
            1,
            true,
            Arc::new(|args, outputs| {
                with_buffer_mut(args[0], |b| {
                    b.flip();
                    Ok(())
                })?;
                outputs[0] = args[0];
                Ok(args[0] as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_REWIND,
            "buf_rewind",
            "Reposition to the start of the window. Args: handle. Returns handle.",
            1,
            true,
            Arc::new(|args, outputs| {
                with_buffer_mut(args[0], |b| {
                    b.rewind();
                    Ok(())
                })?;
                outputs[0] = args[0];
                Ok(args[0] as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_CLEAR,
            "buf_clear",
            "Reset cursors for fresh writes. Args: handle. Returns handle.",
            1,
            true,
            Arc::new(|args, outputs| {
                with_buffer_mut(args[0], |b| {
                    b.clear();
                    Ok(())
                })?;
                outputs[0] = args[0];
                Ok(args[0] as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_COMPACT,
            "buf_compact",
            "Shift unread bytes to the start and open the rest for writing. \
             Args: handle. Returns handle.",
            1,
            true,
            Arc::new(|args, outputs| {
                with_buffer_mut(args[0], |b| {
                    b.compact();
                    Ok(())
                })?;
                outputs[0] = args[0];
                Ok(args[0] as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_MARK,
            "buf_mark",
            "Save the current position. Args: handle. Returns handle.",
            1,
            true,
            Arc::new(|args, outputs| {
                with_buffer_mut(args[0], |b| {
                    b.mark();
                    Ok(())
                })?;
                outputs[0] = args[0];
                Ok(args[0] as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_RESET,
            "buf_reset",
            "Restore position from the saved mark. Args: handle. Returns handle.",
            1,
            true,
            Arc::new(|args, outputs| {
                with_buffer_mut(args[0], |b| b.reset().map(|_| ()))?;
                outputs[0] = args[0];
                Ok(args[0] as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_SET_POSITION,
            "buf_set_position",
            "Move the position cursor. Args: handle, position. Returns handle.",
            2,
            true,
            Arc::new(|args, outputs| {
                with_buffer_mut(args[0], |b| b.set_position(args[1] as usize).map(|_| ()))?;
                outputs[0] = args[0];
                Ok(args[0] as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_SET_LIMIT,
            "buf_set_limit",
            "Move the limit cursor. Args: handle, limit. Returns handle.",
            2,
            true,
            Arc::new(|args, outputs| {
                with_buffer_mut(args[0], |b| b.set_limit(args[1] as usize).map(|_| ()))?;
                outputs[0] = args[0];
                Ok(args[0] as i64)
            }),
        );
    }

    fn register_queries(&mut self) {
        self.register_with_id(
            op_ids::BUF_REMAINING,
            "buf_remaining",
            "Bytes left between position and limit. Args: handle. Returns count.",
            1,
            true,
            Arc::new(|args, outputs| {
                let remaining = with_buffer(args[0], |b| b.remaining())?;
                outputs[0] = remaining as u64;
                Ok(remaining as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_HAS_REMAINING,
            "buf_has_remaining",
            "Whether any bytes are left in the window. Args: handle. Returns 1 or 0.",
            1,
            true,
            Arc::new(|args, outputs| {
                let has = with_buffer(args[0], |b| b.has_remaining())?;
                let result = if has { 1 } else { 0 };
                outputs[0] = result as u64;
                Ok(result)
            }),
        );

        self.register_with_id(
            op_ids::BUF_CAPACITY,
            "buf_capacity",
            "Fixed size of the backing storage. Args: handle. Returns capacity.",
            1,
            true,
            Arc::new(|args, outputs| {
                let capacity = with_buffer(args[0], |b| b.capacity())?;
                outputs[0] = capacity as u64;
                Ok(capacity as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_POSITION,
            "buf_position",
            "Cursor for the next read or write. Args: handle. Returns position.",
            1,
            true,
            Arc::new(|args, outputs| {
                let position = with_buffer(args[0], |b| b.position())?;
                outputs[0] = position as u64;
                Ok(position as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_LIMIT,
            "buf_limit",
            "First index not to be read or written. Args: handle. Returns limit.",
            1,
            true,
            Arc::new(|args, outputs| {
                let limit = with_buffer(args[0], |b| b.limit())?;
                outputs[0] = limit as u64;
                Ok(limit as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_OFFSET,
            "buf_offset",
            "Window start within the backing storage. Args: handle. Returns offset.",
            1,
            true,
            Arc::new(|args, outputs| {
                let offset = with_buffer(args[0], |b| b.array_offset())?;
                outputs[0] = offset as u64;
                Ok(offset as i64)
            }),
        );

        self.register_with_id(
            op_ids::BUF_EQUALS,
            "buf_equals",
            "Structural equality of two buffers. Args: a_handle, b_handle. Returns 1 or 0.",
            2,
            true,
            Arc::new(|args, outputs| {
                // Snapshot one side outside the lock; the store's lock is not
                // reentrant, so the two buffers cannot be borrowed at once.
                let lhs = with_buffer(args[0], |b| {
                    (b.capacity(), b.position(), b.limit(), b.readable().to_vec())
                })?;
                let eq = with_buffer(args[1], |b| {
                    b.capacity() == lhs.0
                        && b.position() == lhs.1
                        && b.limit() == lhs.2
                        && b.readable() == &lhs.3[..]
                })?;
                let result = if eq { 1 } else { 0 };
                outputs[0] = result as u64;
                Ok(result)
            }),
        );

        self.register_with_id(
            op_ids::BUF_TO_STRING,
            "buf_to_string",
            "Diagnostic string reporting the cursor state. Args: handle. \
             Returns handle to the string bytes.",
            1,
            true,
            Arc::new(|args, outputs| {
                let display = with_buffer(args[0], |b| b.to_string())?;
                let handle = HandleManager::store(ManagedByteBuffer::wrap(display.as_bytes()));
                outputs[0] = handle;
                Ok(handle as i64)
            }),
        );
    }

    fn register_lifecycle(&mut self) {
        self.register_with_id(
            op_ids::BUF_RELEASE,
            "buf_release",
            "Drop the buffer, closing any cached file handles. Args: handle. Returns 0.",
            1,
            true,
            Arc::new(|args, outputs| {
                HandleManager::remove(args[0]).ok_or(BufferError::HandleNotFound(args[0]))?;
                outputs[0] = 0;
                Ok(0)
            }),
        );
    }
}

impl Default for BufferOpRegistry {
    fn default() -> Self {
        Self::new()
    }
}
