//! Managed Byte Buffer
//!
//! A mutable byte buffer with position/limit cursor tracking, mirroring the
//! classic NIO buffer protocol: fill the buffer (position advances), `flip`
//! to switch into drain mode, read bytes out, then `clear` or `compact` to
//! reuse the region. The backing storage is allocated once and never grows;
//! callers needing more room allocate a new buffer.
//!
//! File transfer on top of the same cursor window lives in
//! [`crate::transfer`]; host-runtime exposure via handles lives in
//! [`crate::handle`] and [`crate::registry`].

use std::fmt;

use crate::error::{BufferError, BufferResult};
use crate::transfer::FileAssociation;

/// A fixed-capacity byte region with position, limit and mark cursors.
///
/// Invariant: `0 <= position <= limit <= capacity` after every operation.
/// Mutating operations return `&mut Self` so calls can be chained.
///
/// # Example
///
/// ```rust
/// use bytestage::ManagedByteBuffer;
///
/// let mut buf = ManagedByteBuffer::allocate(8);
/// buf.append(b"ab").unwrap().flip();
/// assert_eq!(buf.remaining(), 2);
/// assert_eq!(buf.drain_all(), b"ab");
/// ```
pub struct ManagedByteBuffer {
    pub(crate) storage: Vec<u8>,
    pub(crate) position: usize,
    pub(crate) limit: usize,
    mark: Option<usize>,
    /// Window start recorded at wrap time; never moves afterwards.
    origin: usize,
    pub(crate) write_assoc: Option<FileAssociation>,
    pub(crate) read_assoc: Option<FileAssociation>,
}

impl ManagedByteBuffer {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Allocate a zero-filled buffer of exactly `capacity` bytes.
    ///
    /// Position starts at 0 and limit at `capacity`, so the whole region is
    /// immediately writable.
    pub fn allocate(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity],
            position: 0,
            limit: capacity,
            mark: None,
            origin: 0,
            write_assoc: None,
            read_assoc: None,
        }
    }

    /// Wrap a copy of `bytes`; the whole sequence becomes the window.
    pub fn wrap(bytes: &[u8]) -> Self {
        Self {
            storage: bytes.to_vec(),
            position: 0,
            limit: bytes.len(),
            mark: None,
            origin: 0,
            write_assoc: None,
            read_assoc: None,
        }
    }

    /// Wrap a copy of `bytes` with the readable window restricted to
    /// `[offset, offset + length)`.
    ///
    /// Position starts at `offset`, limit at `offset + length`, and capacity
    /// equals the full length of `bytes`.
    pub fn wrap_window(bytes: &[u8], offset: usize, length: usize) -> BufferResult<Self> {
        let end = offset.checked_add(length).ok_or_else(|| {
            BufferError::InvalidArgument(format!("window {} + {} overflows", offset, length))
        })?;
        if end > bytes.len() {
            return Err(BufferError::InvalidArgument(format!(
                "window {}..{} out of bounds for {} bytes",
                offset,
                end,
                bytes.len()
            )));
        }
        Ok(Self {
            storage: bytes.to_vec(),
            position: offset,
            limit: end,
            mark: None,
            origin: offset,
            write_assoc: None,
            read_assoc: None,
        })
    }

    // =========================================================================
    // Append / Drain
    // =========================================================================

    /// Write `bytes` at the current position and advance it.
    ///
    /// Fails without mutating when `bytes` does not fit in `limit - position`.
    pub fn append(&mut self, bytes: &[u8]) -> BufferResult<&mut Self> {
        let remaining = self.remaining();
        if bytes.len() > remaining {
            return Err(BufferError::Overflow {
                requested: bytes.len(),
                remaining,
            });
        }
        self.storage[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(self)
    }

    /// Read every remaining byte from position to limit, advancing position
    /// to limit. May return an empty vec.
    pub fn drain_all(&mut self) -> Vec<u8> {
        let out = self.storage[self.position..self.limit].to_vec();
        self.position = self.limit;
        out
    }

    /// Read exactly `count` bytes if that many remain, advancing position.
    ///
    /// When fewer than `count` bytes remain the result is empty and position
    /// is unchanged; insufficient data is "nothing", not an error and not a
    /// short read. `count` must be at least 1.
    pub fn read_next(&mut self, count: usize) -> BufferResult<Vec<u8>> {
        if count < 1 {
            return Err(BufferError::InvalidArgument(
                "read count must be positive".to_string(),
            ));
        }
        if count > self.remaining() {
            return Ok(Vec::new());
        }
        let out = self.storage[self.position..self.position + count].to_vec();
        self.position += count;
        Ok(out)
    }

    /// Borrow the current readable window without advancing the cursor.
    pub fn readable(&self) -> &[u8] {
        &self.storage[self.position..self.limit]
    }

    // =========================================================================
    // Cursor Protocol
    // =========================================================================

    /// Switch from filling to draining: `limit = position; position = 0`.
    /// Discards the mark.
    pub fn flip(&mut self) -> &mut Self {
        self.limit = self.position;
        self.position = 0;
        self.mark = None;
        self
    }

    /// Re-read already-written content from the start: `position = 0`,
    /// limit unchanged. Discards the mark.
    pub fn rewind(&mut self) -> &mut Self {
        self.position = 0;
        self.mark = None;
        self
    }

    /// Prepare for fresh writes: `position = 0; limit = capacity`. Logical
    /// content is discarded; physical bytes stay until overwritten.
    pub fn clear(&mut self) -> &mut Self {
        self.position = 0;
        self.limit = self.capacity();
        self.mark = None;
        self
    }

    /// Shift unread bytes to the start of storage, then open the rest of the
    /// region for writing: `position = limit - position; limit = capacity`.
    pub fn compact(&mut self) -> &mut Self {
        let remaining = self.remaining();
        self.storage.copy_within(self.position..self.limit, 0);
        self.position = remaining;
        self.limit = self.capacity();
        self.mark = None;
        self
    }

    /// Save the current position as the mark.
    pub fn mark(&mut self) -> &mut Self {
        self.mark = Some(self.position);
        self
    }

    /// Restore position from the saved mark.
    pub fn reset(&mut self) -> BufferResult<&mut Self> {
        match self.mark {
            Some(m) => {
                self.position = m;
                Ok(self)
            }
            None => Err(BufferError::InvalidState(
                "reset called before any mark".to_string(),
            )),
        }
    }

    /// Move the position cursor. Must satisfy `position <= limit`.
    ///
    /// A mark beyond the new position is discarded.
    pub fn set_position(&mut self, position: usize) -> BufferResult<&mut Self> {
        if position > self.limit {
            return Err(BufferError::InvalidArgument(format!(
                "position {} exceeds limit {}",
                position, self.limit
            )));
        }
        self.position = position;
        if matches!(self.mark, Some(m) if m > position) {
            self.mark = None;
        }
        Ok(self)
    }

    /// Move the limit cursor. Must satisfy `position <= limit <= capacity`.
    ///
    /// A mark beyond the new limit is discarded.
    pub fn set_limit(&mut self, limit: usize) -> BufferResult<&mut Self> {
        if limit < self.position || limit > self.capacity() {
            return Err(BufferError::InvalidArgument(format!(
                "limit {} outside {}..={}",
                limit,
                self.position,
                self.capacity()
            )));
        }
        self.limit = limit;
        if matches!(self.mark, Some(m) if m > limit) {
            self.mark = None;
        }
        Ok(self)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Cursor for the next read or write.
    pub fn position(&self) -> usize {
        self.position
    }

    /// First index not to be read or written.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Fixed size of the backing storage.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes left between position and limit.
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    /// Whether any bytes are left between position and limit.
    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    /// Byte offset of the window's start within the backing storage, as
    /// established at wrap time. 0 for freshly allocated buffers.
    pub fn array_offset(&self) -> usize {
        self.origin
    }

    /// Structural equality: same capacity, same cursor state, same readable
    /// bytes. Never identity.
    pub fn content_equals(&self, other: &ManagedByteBuffer) -> bool {
        self.capacity() == other.capacity()
            && self.position == other.position
            && self.limit == other.limit
            && self.readable() == other.readable()
    }
}

impl PartialEq for ManagedByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.content_equals(other)
    }
}

impl Eq for ManagedByteBuffer {}

impl fmt::Debug for ManagedByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedByteBuffer")
            .field("position", &self.position)
            .field("limit", &self.limit)
            .field("capacity", &self.capacity())
            .field("mark", &self.mark)
            .finish()
    }
}

impl fmt::Display for ManagedByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ManagedByteBuffer[pos={} lim={} cap={}]",
            self.position,
            self.limit,
            self.capacity()
        )
    }
}
